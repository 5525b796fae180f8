//! Assembling the user object from a directory user and the configured
//! property rules
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
	config::Options,
	error::Error,
	ldap::{Directory, UserRecord},
};

/// The user object attached to a request: field names mapped to their values.
pub type EnrichmentObject = Map<String, Value>;

/// Resolves every configured property of a user against a [`Directory`].
#[derive(Debug, Clone, Copy)]
pub struct AttributeResolver<'a> {
	/// Naming and property configuration
	options: &'a Options,
}

impl<'a> AttributeResolver<'a> {
	/// Create a resolver for the properties in `options`.
	#[must_use]
	pub fn new(options: &'a Options) -> Self {
		Self { options }
	}

	/// Build the user object for `user`. It always holds the username under
	/// the configured name, plus one field per property. Fails as a whole if
	/// any property fails to resolve.
	pub async fn resolve<D>(
		&self,
		directory: &D,
		user: &UserRecord,
	) -> Result<EnrichmentObject, Error>
	where
		D: Directory + ?Sized,
	{
		let mut object = EnrichmentObject::new();
		object.insert(self.options.user_object_name.clone(), user.username.clone().into());

		for (property, rule) in &self.options.properties {
			// Misconfigured rules fail before any directory round-trip.
			rule.values(property)?;
			let entries = directory.find_memberships(user, property).await?;
			debug!(username = %user.username, property, found = entries.len(), "Resolving property");
			let value =
				rule.evaluate(property, entries, self.options.custom_parse_function.as_ref())?;
			object.insert(property.clone(), value);
		}

		Ok(object)
	}
}
