//! Config for the directory connection and for shaping the user object.
use std::{collections::BTreeMap, fmt, path::PathBuf, sync::Arc, time::Duration};

use ldap3::{ldap_escape, LdapConnSettings};
use rustls::{Certificate, ClientConfig, PrivateKey, RootCertStore};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
	error::Error,
	rule::{DebugParseFn, ParseFn, PropertyRule},
};

/// How long cached user objects stay valid if no TTL is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// LDAP configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
	/// The URL to connect to the server with. Supports ldap, ldaps, and ldapi
	/// schemes
	pub url: Url,
	/// The search base under which users and their groups are looked up
	pub base_dn: String,
	/// The bind DN or principal of the search user
	pub username: String,
	/// The password for the search user
	pub password: String,
	/// Connection settings.
	#[serde(default)]
	pub connection: ConnectionConfig,
	/// Filters to use for searches
	#[serde(default)]
	pub searches: Searches,
}

impl Config {
	/// Create a config with default connection settings and search filters.
	#[must_use]
	pub fn new(
		url: Url,
		base_dn: impl Into<String>,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		Self {
			url,
			base_dn: base_dn.into(),
			username: username.into(),
			password: password.into(),
			connection: ConnectionConfig::default(),
			searches: Searches::default(),
		}
	}

	/// Check that every connection parameter is present.
	pub fn validate(&self) -> Result<(), Error> {
		match self.url.scheme() {
			"ldap" | "ldaps" if self.url.host_str().is_some_and(|host| !host.is_empty()) => {}
			"ldapi" => {}
			"ldap" | "ldaps" => {
				return Err(Error::Configuration(format!("url `{}` has no host", self.url)))
			}
			scheme => {
				return Err(Error::Configuration(format!("unsupported url scheme `{scheme}`")))
			}
		}
		for (field, value) in
			[("base_dn", &self.base_dn), ("username", &self.username), ("password", &self.password)]
		{
			if value.is_empty() {
				return Err(Error::Configuration(format!("`{field}` must not be empty")));
			}
		}
		Ok(())
	}
}

/// Configuration for how to connect to the LDAP server
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
	/// Timeout to establish a connection in seconds.
	pub timeout: u64,

	/// LDAP operation timeout. For search per reply.
	pub operation_timeout: Duration,

	/// TLS config
	pub tls: TLSConfig,
}

impl Default for ConnectionConfig {
	fn default() -> Self {
		Self { timeout: 5, operation_timeout: Duration::from_secs(30), tls: TLSConfig::default() }
	}
}

/// TLS Configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TLSConfig {
	/// Use StartTLS extended operation for establishing a secure connection,
	/// rather than TLS on a dedicated port.
	pub starttls: bool,

	/// Disable verification of TLS certificates
	pub no_tls_verify: bool,

	/// TLS root certificates path
	pub root_certificates_path: Option<PathBuf>,

	/// Path of the TLS client key to use for the connection
	pub client_key_path: Option<PathBuf>,

	/// Path of the TLS client certificate to use for the connection
	pub client_certificate_path: Option<PathBuf>,
}

impl ConnectionConfig {
	/// Create a [`LdapConnSettings`] based on this [`ConnectionConfig`]
	pub(crate) async fn to_settings(&self) -> Result<LdapConnSettings, Error> {
		let mut settings = LdapConnSettings::new();

		settings = settings.set_conn_timeout(Duration::from_secs(self.timeout));
		settings = settings.set_starttls(self.tls.starttls);
		settings = settings.set_no_tls_verify(self.tls.no_tls_verify);

		if let Some(path) = &self.tls.root_certificates_path {
			let mut roots = RootCertStore::empty();
			let pem = tokio::fs::read(path).await?;
			let certs = rustls_pemfile::certs(&mut &pem[..])?;
			let (added, _) = roots.add_parsable_certificates(&certs[..]);
			if added == 0 {
				return Err(Error::Invalid("Could not read root certificate".to_owned()));
			}
			let builder = ClientConfig::builder().with_safe_defaults().with_root_certificates(roots);

			let config = match (&self.tls.client_key_path, &self.tls.client_certificate_path) {
				(Some(key_path), Some(cert_path)) => {
					let certs = rustls_pemfile::certs(&mut &tokio::fs::read(cert_path).await?[..])?
						.into_iter()
						.map(Certificate)
						.collect();
					let key = rustls_pemfile::pkcs8_private_keys(
						&mut &tokio::fs::read(key_path).await?[..],
					)?
					.into_iter()
					.next()
					.map(PrivateKey)
					.ok_or_else(|| Error::Invalid("Could not read client key".to_owned()))?;
					builder.with_client_auth_cert(certs, key).map_err(|_| {
						Error::Invalid("Could not read client certificates".to_owned())
					})?
				}
				(None, None) => builder.with_no_client_auth(),
				_ => Err(Error::Invalid(
					"Both a client certificate and key file in PKCS8 format must be specified"
						.to_owned(),
				))?,
			};
			settings = settings.set_config(Arc::new(config));
		}
		Ok(settings)
	}
}

/// Configurable filters to use for LDAP searches. `{username}` is replaced
/// with the looked up username and `{dn}` with the DN of the found user, both
/// escaped for use in a filter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Searches {
	/// The search filter to find a user by name
	pub user_filter: String,
	/// The search filter to find the memberships of a user
	pub membership_filter: String,
	/// Membership filters for specific properties, overriding
	/// `membership_filter`
	#[serde(default)]
	pub property_filters: BTreeMap<String, String>,
}

impl Default for Searches {
	fn default() -> Self {
		Self {
			user_filter: "(sAMAccountName={username})".to_owned(),
			membership_filter: "(&(objectClass=group)(member={dn}))".to_owned(),
			property_filters: BTreeMap::new(),
		}
	}
}

impl Searches {
	/// The filter finding the user entry for `username`.
	#[must_use]
	pub fn user_filter(&self, username: &str) -> String {
		self.user_filter.replace("{username}", &ldap_escape(username))
	}

	/// The filter finding the memberships of the user behind `dn` that make
	/// up `property`.
	#[must_use]
	pub fn membership_filter(&self, property: &str, username: &str, dn: &str) -> String {
		self.property_filters
			.get(property)
			.unwrap_or(&self.membership_filter)
			.replace("{username}", &ldap_escape(username))
			.replace("{dn}", &ldap_escape(dn))
	}
}

/// Options controlling where the user object is read from and written to, and
/// which properties it carries.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
	/// Request field holding the username
	pub user_name: String,
	/// Request field the user object is attached under
	pub user_object: String,
	/// Field of the user object holding the username
	pub user_object_name: String,
	/// Fields derived from directory memberships
	pub properties: BTreeMap<String, PropertyRule>,
	/// Converts each membership entry into a value, instead of using its
	/// display name
	#[serde(skip)]
	pub custom_parse_function: Option<ParseFn>,
	/// Whether to cache user objects by username
	pub use_cache: bool,
	/// How long cached user objects are valid for, in milliseconds
	pub ttl: Option<u64>,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			user_name: "username".to_owned(),
			user_object: "user".to_owned(),
			user_object_name: "name".to_owned(),
			properties: BTreeMap::new(),
			custom_parse_function: None,
			use_cache: false,
			ttl: None,
		}
	}
}

impl fmt::Debug for Options {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Options")
			.field("user_name", &self.user_name)
			.field("user_object", &self.user_object)
			.field("user_object_name", &self.user_object_name)
			.field("properties", &self.properties)
			.field("custom_parse_function", &DebugParseFn(&self.custom_parse_function))
			.field("use_cache", &self.use_cache)
			.field("ttl", &self.ttl)
			.finish()
	}
}

impl Options {
	/// Add a property to the user object.
	#[must_use]
	pub fn with_property(mut self, name: impl Into<String>, rule: PropertyRule) -> Self {
		self.properties.insert(name.into(), rule);
		self
	}

	/// Convert membership entries with `parse` instead of using their display
	/// name.
	#[must_use]
	pub fn with_parse_function<F>(mut self, parse: F) -> Self
	where
		F: Fn(&ldap3::SearchEntry) -> serde_json::Value + Send + Sync + 'static,
	{
		self.custom_parse_function = Some(Arc::new(parse));
		self
	}

	/// Cache user objects for `ttl`.
	#[must_use]
	pub fn with_cache(mut self, ttl: Duration) -> Self {
		self.use_cache = true;
		self.ttl = Some(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX));
		self
	}

	/// The configured cache TTL, or [`DEFAULT_TTL`].
	#[must_use]
	pub fn ttl(&self) -> Duration {
		self.ttl.map_or(DEFAULT_TTL, Duration::from_millis)
	}

	/// Check that the field names are usable. Property rules are not checked
	/// here, they are validated when resolved.
	pub fn validate(&self) -> Result<(), Error> {
		for (field, value) in [
			("user_name", &self.user_name),
			("user_object", &self.user_object),
			("user_object_name", &self.user_object_name),
		] {
			if value.is_empty() {
				return Err(Error::Configuration(format!("`{field}` must not be empty")));
			}
		}
		if let Some(name) = self.properties.keys().find(|name| **name == self.user_object_name) {
			return Err(Error::Configuration(format!(
				"property `{name}` would overwrite the username field"
			)));
		}
		Ok(())
	}
}
