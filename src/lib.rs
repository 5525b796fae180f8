//! Attach a user's directory profile to incoming requests.
//!
//! The library reads the username from a request, looks the user up in an
//! LDAP directory and builds a user object from it: the username plus one
//! field per configured property, each derived from the groups (or other
//! entries) the user is a member of. The object is attached to the request so
//! that application code can use it without knowing how to query the
//! directory. Built objects can optionally be cached per username for a fixed
//! time to save directory round-trips.
//!
//! For a general primer on LDAP, the [introduction] in the `ldap3` crate which
//! is used here for interfacing with LDAP is an excellent resource.
//!
//! [introduction]: https://github.com/inejge/ldap3/blob/master/LDAP-primer.md
//!
//! # Getting started
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::time::Duration;
//!
//! use ldap_user_object::{Config, EnrichmentStage, Options, PropertyRule};
//! use serde_json::{json, Map, Value};
//! use url::Url;
//!
//! // Configuration can also be deserialized with serde. It's hand-constructed
//! // here for demonstration purposes.
//! let config = Config::new(
//! 	Url::parse("ldap://localhost")?,
//! 	"dc=example,dc=com",
//! 	"cn=admin,dc=example,dc=com",
//! 	"verysecret",
//! );
//! let options = Options::default()
//! 	.with_property("groups", PropertyRule::only(["admins", "staff"]))
//! 	.with_property("department", PropertyRule::all().single())
//! 	.with_cache(Duration::from_secs(60));
//! let stage = EnrichmentStage::new(config, options)?;
//!
//! let mut request: Map<String, Value> = Map::new();
//! request.insert("username".to_owned(), json!("jdoe"));
//! stage.handle(&mut request).await?;
//! println!("User object: {:#}", request["user"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Property rules
//! Each property is resolved by asking the directory for the memberships of
//! the user under the property's name (see [`config::Searches`] for how this
//! maps to LDAP filters), then
//! * keeping every entry if the rule's `values` is `"all"`, or only the
//!   entries whose name is listed otherwise,
//! * converting each entry with the custom parse function, or to its display
//!   name,
//! * storing the list, or only its first element if `array` is `false`. No
//!   matches are stored as `null` in both cases.
//!
//! A rule without `values` is only rejected when it is first resolved, which
//! fails the request being handled.

mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod ldap;
mod resolver;
pub mod rule;
mod stage;

pub use ldap3::{self, SearchEntry};

pub use crate::{
	cache::ResultCache,
	config::{Config, ConnectionConfig, Options, Searches, TLSConfig},
	entry::SearchEntryExt,
	error::Error,
	ldap::{Directory, LdapDirectory, UserRecord},
	resolver::{AttributeResolver, EnrichmentObject},
	rule::{ParseFn, PropertyRule, RuleValues},
	stage::{EnrichmentStage, Request},
};
