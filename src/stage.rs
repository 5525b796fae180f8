//! The request-facing entry point: read the username from a request, build
//! or fetch its user object and attach it
use std::{collections::HashMap, hash::BuildHasher, sync::Arc};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
	cache::ResultCache,
	config::{Config, Options},
	error::Error,
	ldap::{Directory, LdapDirectory},
	resolver::{AttributeResolver, EnrichmentObject},
};

/// A request the user object can be read from and attached to, by field
/// name.
pub trait Request {
	/// The string value of `field`, if the request carries one.
	fn field(&self, field: &str) -> Option<&str>;

	/// Store `user` under `field`, replacing what was there.
	fn attach(&mut self, field: &str, user: EnrichmentObject);
}

impl Request for Map<String, Value> {
	fn field(&self, field: &str) -> Option<&str> {
		self.get(field).and_then(Value::as_str)
	}

	fn attach(&mut self, field: &str, user: EnrichmentObject) {
		self.insert(field.to_owned(), Value::Object(user));
	}
}

impl<S: BuildHasher> Request for HashMap<String, Value, S> {
	fn field(&self, field: &str) -> Option<&str> {
		self.get(field).and_then(Value::as_str)
	}

	fn attach(&mut self, field: &str, user: EnrichmentObject) {
		self.insert(field.to_owned(), Value::Object(user));
	}
}

/// Attaches the directory profile of the requesting user to requests.
///
/// Clones share the directory client and the cache.
#[derive(Debug)]
pub struct EnrichmentStage<D: ?Sized> {
	/// Naming, property and caching configuration
	options: Arc<Options>,
	/// Previously built user objects
	cache: ResultCache,
	/// Where users and memberships are looked up
	directory: Arc<D>,
}

impl<D: ?Sized> Clone for EnrichmentStage<D> {
	fn clone(&self) -> Self {
		Self {
			options: Arc::clone(&self.options),
			cache: self.cache.clone(),
			directory: Arc::clone(&self.directory),
		}
	}
}

impl EnrichmentStage<LdapDirectory> {
	/// Create a stage looking users up on the LDAP server described by
	/// `config`. Fails immediately if `config` or `options` are malformed.
	pub fn new(config: Config, options: Options) -> Result<Self, Error> {
		let directory = LdapDirectory::new(config)?;
		Self::with_directory(directory, options)
	}
}

impl<D: Directory> EnrichmentStage<D> {
	/// Create a stage looking users up in `directory`. Fails immediately if
	/// `options` are malformed.
	pub fn with_directory(directory: D, options: Options) -> Result<Self, Error> {
		Self::with_shared_directory(Arc::new(directory), options)
	}
}

impl<D: Directory + ?Sized> EnrichmentStage<D> {
	/// Like [`EnrichmentStage::with_directory`], for a directory that is
	/// shared with other users, e.g. a `Arc<dyn Directory>`.
	pub fn with_shared_directory(directory: Arc<D>, options: Options) -> Result<Self, Error> {
		options.validate()?;
		let cache = ResultCache::from_options(&options);
		Ok(Self { options: Arc::new(options), cache, directory })
	}

	/// The options this stage was created with
	#[must_use]
	pub fn options(&self) -> &Options {
		&self.options
	}

	/// The cache of built user objects
	#[must_use]
	pub fn cache(&self) -> &ResultCache {
		&self.cache
	}

	/// Get the user object for `username`, from the cache if possible.
	pub async fn enrich(&self, username: &str) -> Result<EnrichmentObject, Error> {
		if let Some(user) = self.cache.get(username).await {
			debug!(username, "Using cached user object");
			return Ok(user);
		}

		let user = self
			.directory
			.find_user(username)
			.await?
			.ok_or_else(|| Error::UserNotFound(username.to_owned()))?;
		let object =
			AttributeResolver::new(&self.options).resolve(&*self.directory, &user).await?;
		self.cache.put(username, object.clone()).await;
		Ok(object)
	}

	/// Attach the user object of the requesting user to `request`. On
	/// failure the request is left untouched.
	pub async fn handle<R>(&self, request: &mut R) -> Result<(), Error>
	where
		R: Request + ?Sized,
	{
		let username = request
			.field(&self.options.user_name)
			.ok_or_else(|| Error::MissingUsername(self.options.user_name.clone()))?
			.to_owned();
		match self.enrich(&username).await {
			Ok(user) => {
				request.attach(&self.options.user_object, user);
				Ok(())
			}
			Err(err) => {
				warn!(%username, "Failed to build user object: {err}");
				Err(err)
			}
		}
	}

	/// Attach the user object to `request`, then hand the outcome to `next`.
	/// `next` is called exactly once, with `Ok(())` if the request was
	/// enriched and with the error otherwise.
	pub async fn process<R, F, T>(&self, request: &mut R, next: F) -> T
	where
		R: Request + ?Sized,
		F: FnOnce(Result<(), Error>) -> T,
	{
		next(self.handle(request).await)
	}
}
