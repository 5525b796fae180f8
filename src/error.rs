//! Error codes

/// Errors that can occur when using this library
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// The connection configuration or the enrichment options are malformed.
	#[error("Invalid configuration: {0}")]
	Configuration(String),
	/// A property rule was configured without a `values` key.
	#[error("Property `{0}` is missing its `values` rule")]
	MissingValues(String),
	/// The request did not carry a username under the configured field.
	#[error("Request has no username in field `{0}`")]
	MissingUsername(String),
	/// The directory has no user with the requested name.
	#[error("User `{0}` not found in the directory")]
	UserNotFound(String),
	/// The contents of an attribute did not confirm to the expected syntax.
	#[error("Malformed data: {0}")]
	Invalid(String),
	/// A directory implementation failed for a reason of its own.
	#[error("Directory lookup failed: {0}")]
	Directory(String),
	/// Reading a file, such as a TLS certificate, failed.
	#[error(transparent)]
	Io(#[from] std::io::Error),
	/// An underlying protocol error or similar occurred, or the LDAP library
	/// was used incorrectly.
	#[error(transparent)]
	Ldap(#[from] ldap3::LdapError),
}

impl Error {
	/// Whether this error stems from malformed configuration. These are never
	/// worth retrying.
	#[must_use]
	pub fn is_configuration(&self) -> bool {
		matches!(self, Error::Configuration(_) | Error::MissingValues(_))
	}

	/// Whether this error stems from looking the user up, either because the
	/// directory failed or because the user could not be found.
	#[must_use]
	pub fn is_lookup(&self) -> bool {
		!self.is_configuration()
	}
}

#[cfg(test)]
mod tests {
	use super::Error;

	#[test]
	fn classification() {
		assert!(Error::Configuration("url".to_owned()).is_configuration());
		assert!(Error::MissingValues("groups".to_owned()).is_configuration());
		assert!(Error::UserNotFound("andrew".to_owned()).is_lookup());
		assert!(Error::MissingUsername("username".to_owned()).is_lookup());
		assert!(!Error::Directory("down".to_owned()).is_configuration());
	}
}
