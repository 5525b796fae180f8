//! Caching of resolved user objects, so repeated requests for the same user do
//! not hit the directory every time
use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{sync::RwLock, time::Instant};

use crate::{config::Options, resolver::EnrichmentObject};

/// User objects keyed by username, each valid for a fixed time after it was
/// stored. Clones share the same entries.
#[derive(Debug, Clone)]
pub struct ResultCache {
	/// The cached entries, if caching is enabled
	entries: CacheEntries,
}

/// Storage backing a [`ResultCache`]
#[derive(Debug, Clone)]
enum CacheEntries {
	/// Keep objects for `ttl` after they were stored.
	Expiring {
		/// How long an entry stays valid
		ttl: Duration,
		/// Entries by username
		entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
	},
	/// Don't cache anything, every lookup misses
	None,
}

/// A resolved user object and the moment it stops being valid
#[derive(Debug, Clone)]
struct CacheEntry {
	/// The cached user object
	value: EnrichmentObject,
	/// The entry is ignored from this point on
	expires_at: Instant,
}

impl ResultCache {
	/// A cache keeping entries for `ttl`.
	#[must_use]
	pub fn new(ttl: Duration) -> Self {
		Self { entries: CacheEntries::Expiring { ttl, entries: Arc::default() } }
	}

	/// A cache that never stores anything.
	#[must_use]
	pub fn disabled() -> Self {
		Self { entries: CacheEntries::None }
	}

	/// The cache configured by `options`.
	#[must_use]
	pub fn from_options(options: &Options) -> Self {
		if options.use_cache {
			Self::new(options.ttl())
		} else {
			Self::disabled()
		}
	}

	/// Whether entries are stored at all
	#[must_use]
	pub fn is_enabled(&self) -> bool {
		matches!(self.entries, CacheEntries::Expiring { .. })
	}

	/// Get a copy of the user object cached for `key`, if there is one and it
	/// has not expired yet.
	pub async fn get(&self, key: &str) -> Option<EnrichmentObject> {
		match &self.entries {
			CacheEntries::Expiring { entries, .. } => {
				let entries = entries.read().await;
				let entry = entries.get(key)?;
				(Instant::now() < entry.expires_at).then(|| entry.value.clone())
			}
			CacheEntries::None => None,
		}
	}

	/// Store `value` for `key`, replacing any previous entry and restarting
	/// its expiry.
	pub async fn put(&self, key: &str, value: EnrichmentObject) {
		if let CacheEntries::Expiring { ttl, entries } = &self.entries {
			let expires_at = Instant::now() + *ttl;
			entries.write().await.insert(key.to_owned(), CacheEntry { value, expires_at });
		}
	}

	/// Drop expired entries, returning how many were removed. Expired entries
	/// are never returned by [`ResultCache::get`], so this only frees memory.
	pub async fn purge_expired(&self) -> usize {
		match &self.entries {
			CacheEntries::Expiring { entries, .. } => {
				let now = Instant::now();
				let mut entries = entries.write().await;
				let before = entries.len();
				entries.retain(|_, entry| now < entry.expires_at);
				before - entries.len()
			}
			CacheEntries::None => 0,
		}
	}

	/// Number of stored entries, including expired ones not yet purged
	pub async fn len(&self) -> usize {
		match &self.entries {
			CacheEntries::Expiring { entries, .. } => entries.read().await.len(),
			CacheEntries::None => 0,
		}
	}

	/// Whether no entries are stored
	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use std::time::Duration;

	use serde_json::json;

	use super::ResultCache;
	use crate::{config::Options, resolver::EnrichmentObject};

	fn user(name: &str) -> EnrichmentObject {
		let mut object = EnrichmentObject::new();
		object.insert("name".to_owned(), json!(name));
		object
	}

	#[tokio::test(start_paused = true)]
	async fn expiry() {
		let cache = ResultCache::new(Duration::from_millis(1000));
		assert_eq!(cache.get("sam").await, None, "Empty cache should miss");

		cache.put("sam", user("sam")).await;
		assert_eq!(cache.get("sam").await, Some(user("sam")));
		assert_eq!(cache.get("andrew").await, None, "Entries are keyed by username");

		tokio::time::advance(Duration::from_millis(999)).await;
		assert_eq!(cache.get("sam").await, Some(user("sam")), "Entry should still be valid");

		tokio::time::advance(Duration::from_millis(1)).await;
		assert_eq!(cache.get("sam").await, None, "Entry should expire after the TTL");
	}

	#[tokio::test(start_paused = true)]
	async fn put_overwrites() {
		let cache = ResultCache::new(Duration::from_millis(1000));
		cache.put("sam", user("old")).await;

		tokio::time::advance(Duration::from_millis(600)).await;
		cache.put("sam", user("new")).await;
		assert_eq!(cache.get("sam").await, Some(user("new")));

		tokio::time::advance(Duration::from_millis(600)).await;
		assert_eq!(cache.get("sam").await, Some(user("new")), "Overwriting restarts the expiry");
	}

	#[tokio::test(start_paused = true)]
	async fn purge() {
		let cache = ResultCache::new(Duration::from_millis(1000));
		cache.put("sam", user("sam")).await;
		tokio::time::advance(Duration::from_millis(500)).await;
		cache.put("andrew", user("andrew")).await;
		tokio::time::advance(Duration::from_millis(500)).await;

		assert_eq!(cache.len().await, 2);
		assert_eq!(cache.purge_expired().await, 1);
		assert_eq!(cache.get("andrew").await, Some(user("andrew")));
		assert_eq!(cache.len().await, 1);
	}

	#[tokio::test]
	async fn disabled() {
		let cache = ResultCache::from_options(&Options::default());
		assert!(!cache.is_enabled());

		cache.put("sam", user("sam")).await;
		assert_eq!(cache.get("sam").await, None, "Disabled cache should always miss");
		assert!(cache.is_empty().await);

		let cache = ResultCache::from_options(&Options::default().with_cache(Duration::from_secs(1)));
		assert!(cache.is_enabled());
	}

	#[tokio::test]
	async fn clones_share_entries() {
		let cache = ResultCache::new(Duration::from_secs(60));
		let clone = cache.clone();
		clone.put("sam", user("sam")).await;
		assert_eq!(cache.get("sam").await, Some(user("sam")));
	}
}
