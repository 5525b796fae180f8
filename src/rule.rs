//! Rules describing how directory memberships become a field of the user
//! object.
use std::{fmt, sync::Arc};

use ldap3::SearchEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{entry::SearchEntryExt, error::Error};

/// Keyword selecting every membership entry without filtering.
const ALL: &str = "all";

/// Transforms a membership entry into the value stored in the user object.
pub type ParseFn = Arc<dyn Fn(&SearchEntry) -> Value + Send + Sync>;

/// How one field of the user object is derived from the memberships the
/// directory reports for the property's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRule {
	/// Which memberships to keep. Left optional so that a missing key is
	/// reported when the property is first resolved.
	#[serde(default)]
	pub values: Option<RuleValues>,
	/// Whether the field holds every match or only the first one.
	#[serde(default = "default_array")]
	pub array: bool,
}

/// Serde default for [`PropertyRule::array`].
const fn default_array() -> bool {
	true
}

impl Default for PropertyRule {
	fn default() -> Self {
		Self { values: None, array: default_array() }
	}
}

/// Selection of membership entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawValues", into = "RawValues")]
pub enum RuleValues {
	/// Keep every entry. Written as `"all"`.
	All,
	/// Keep entries whose display name equals one of these names.
	Only(Vec<String>),
}

/// Wire form of [`RuleValues`].
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawValues {
	/// A keyword, of which only `"all"` is valid
	Keyword(String),
	/// An explicit list of names
	List(Vec<String>),
}

impl TryFrom<RawValues> for RuleValues {
	type Error = String;

	fn try_from(raw: RawValues) -> Result<Self, Self::Error> {
		match raw {
			RawValues::Keyword(keyword) if keyword == ALL => Ok(RuleValues::All),
			RawValues::Keyword(keyword) => {
				Err(format!("expected `{ALL}` or a list of names, found `{keyword}`"))
			}
			RawValues::List(names) => Ok(RuleValues::Only(names)),
		}
	}
}

impl From<RuleValues> for RawValues {
	fn from(values: RuleValues) -> Self {
		match values {
			RuleValues::All => RawValues::Keyword(ALL.to_owned()),
			RuleValues::Only(names) => RawValues::List(names),
		}
	}
}

impl RuleValues {
	/// Keep the entries this selection matches, in the order the directory
	/// returned them.
	#[must_use]
	pub fn select(&self, entries: Vec<SearchEntry>) -> Vec<SearchEntry> {
		match self {
			RuleValues::All => entries,
			RuleValues::Only(names) => entries
				.into_iter()
				.filter(|entry| {
					entry.display_name().is_some_and(|name| names.iter().any(|n| n == name))
				})
				.collect(),
		}
	}
}

impl PropertyRule {
	/// A rule keeping every membership.
	#[must_use]
	pub fn all() -> Self {
		Self { values: Some(RuleValues::All), array: true }
	}

	/// A rule keeping memberships with one of the given names.
	#[must_use]
	pub fn only<I, S>(names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let names = names.into_iter().map(Into::into).collect();
		Self { values: Some(RuleValues::Only(names)), array: true }
	}

	/// Store only the first match instead of all of them.
	#[must_use]
	pub fn single(mut self) -> Self {
		self.array = false;
		self
	}

	/// The configured selection, or [`Error::MissingValues`] naming the
	/// property if there is none.
	pub fn values(&self, property: &str) -> Result<&RuleValues, Error> {
		self.values.as_ref().ok_or_else(|| Error::MissingValues(property.to_owned()))
	}

	/// Turn the membership entries of `property` into the field's value.
	pub fn evaluate(
		&self,
		property: &str,
		entries: Vec<SearchEntry>,
		parse: Option<&ParseFn>,
	) -> Result<Value, Error> {
		let selected = self.values(property)?.select(entries);
		let parsed = selected.iter().map(|entry| match parse {
			Some(parse) => parse(entry),
			None => entry.display_name().map_or(Value::Null, |name| name.to_owned().into()),
		});
		Ok(self.shape(parsed.collect()))
	}

	/// Apply the array-or-scalar shape. Empty results are always `null`, so
	/// that a single falsiness check covers "no matches".
	fn shape(&self, mut values: Vec<Value>) -> Value {
		if values.is_empty() {
			Value::Null
		} else if self.array {
			Value::Array(values)
		} else {
			values.swap_remove(0)
		}
	}
}

/// Debug helper for structs holding an optional [`ParseFn`].
pub(crate) struct DebugParseFn<'a>(pub(crate) &'a Option<ParseFn>);

impl fmt::Debug for DebugParseFn<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(if self.0.is_some() { "Some(<fn>)" } else { "None" })
	}
}
