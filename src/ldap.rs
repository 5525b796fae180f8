//! Looking users and their memberships up in the directory

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, Scope, SearchEntry};
use tracing::{debug, warn};

use crate::{config::Config, error::Error};

/// A user found in the directory
#[derive(Debug, Clone)]
pub struct UserRecord {
	/// The name the user was looked up by
	pub username: String,
	/// The user's directory entry
	pub entry: SearchEntry,
}

/// The lookups the user object is built from. [`LdapDirectory`] implements
/// this against an LDAP server; other implementations can be substituted,
/// e.g. in tests.
#[async_trait]
pub trait Directory: Send + Sync {
	/// Find the user called `username`, or `None` if there is no such user.
	async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, Error>;

	/// Find the entries (groups, departments, ...) `user` is a member of that
	/// make up `property`. The order of the result is kept in the user
	/// object.
	async fn find_memberships(
		&self,
		user: &UserRecord,
		property: &str,
	) -> Result<Vec<SearchEntry>, Error>;
}

/// A [`Directory`] backed by an LDAP server. A new connection is opened and
/// bound for every lookup.
#[derive(Debug, Clone)]
pub struct LdapDirectory {
	/// The configuration of the LDAP client.
	config: Config,
}

impl LdapDirectory {
	/// Create a new [`LdapDirectory`] with the given configuration. Fails if
	/// the configuration is incomplete.
	pub fn new(config: Config) -> Result<Self, Error> {
		config.validate()?;
		Ok(Self { config })
	}

	/// The configuration this client connects with
	#[must_use]
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Create a connection to an ldap server based on the settings and url
	/// specified in the configuration, and bind as the search user.
	async fn connect(&self) -> Result<Ldap, Error> {
		let settings = self.config.connection.to_settings().await?;
		let (conn, mut ldap) =
			LdapConnAsync::from_url_with_settings(settings, &self.config.url).await?;
		tokio::spawn(async move {
			if let Err(err) = conn.drive().await {
				warn!("Ldap connection error {err}");
			}
		});

		ldap.with_timeout(self.config.connection.operation_timeout)
			.simple_bind(&self.config.username, &self.config.password)
			.await?
			.success()?;
		Ok(ldap)
	}

	/// Perform a subtree search under the base DN
	async fn search(&self, filter: &str) -> Result<Vec<SearchEntry>, Error> {
		let mut ldap = self.connect().await?;
		let (entries, _res) = ldap
			.with_timeout(self.config.connection.operation_timeout)
			.search(&self.config.base_dn, Scope::Subtree, filter, vec!["*"])
			.await?
			.success()?;
		ldap.unbind().await?;
		Ok(entries.into_iter().map(SearchEntry::construct).collect())
	}
}

#[async_trait]
impl Directory for LdapDirectory {
	async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, Error> {
		let filter = self.config.searches.user_filter(username);
		debug!(username, %filter, "Searching for user");
		let mut entries = self.search(&filter).await?;
		if entries.len() > 1 {
			warn!(username, count = entries.len(), "Multiple users matched, using the first");
		}
		Ok((!entries.is_empty())
			.then(|| UserRecord { username: username.to_owned(), entry: entries.swap_remove(0) }))
	}

	async fn find_memberships(
		&self,
		user: &UserRecord,
		property: &str,
	) -> Result<Vec<SearchEntry>, Error> {
		let filter =
			self.config.searches.membership_filter(property, &user.username, &user.entry.dn);
		debug!(dn = %user.entry.dn, property, %filter, "Searching for memberships");
		self.search(&filter).await
	}
}
