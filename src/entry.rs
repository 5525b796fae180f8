//! Helper methods for extracting data from search results.
use ldap3::SearchEntry;

/// An extension trait for [`SearchEntry`] that provides convenience methods for
/// extracting data.
pub trait SearchEntryExt {
	/// Get the first value of an attribute. Will return `None` if attribute
	/// value is not valid UTF-8.
	fn attr_first(&self, attr: &str) -> Option<&str>;

	/// The name an entry is matched and displayed by: the first `cn` value,
	/// or the value of the leading RDN of the DN if the entry carries no `cn`.
	fn display_name(&self) -> Option<&str>;
}

impl SearchEntryExt for SearchEntry {
	fn attr_first(&self, attr: &str) -> Option<&str> {
		let attr = self.attrs.get(attr)?;
		attr.first().map(String::as_str)
	}

	fn display_name(&self) -> Option<&str> {
		if let Some(cn) = self.attr_first("cn") {
			return Some(cn);
		}
		let rdn = self.dn.split(',').next()?;
		let (_, value) = rdn.split_once('=')?;
		Some(value.trim())
	}
}
