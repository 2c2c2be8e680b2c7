use tracing::{debug, trace};

use crate::types::UserProfile;

/// Outcome of a profile lookup against the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileLookup {
    /// Cached payload returned synchronously; no network call.
    Hit(UserProfile),
    /// Caller must issue a fetch for the requested ID.
    Fetch,
    /// A fetch for this ID is already outstanding; share its result.
    InFlight,
}

/// Single-key memoized profile cache with single-flight semantics.
///
/// At most one `(id, payload)` pair is retained; each distinct successful
/// lookup overwrites it. Concurrent lookups for the same ID collapse into the
/// one outstanding request. Failures leave the cache untouched.
#[derive(Debug, Default)]
pub struct ProfileCache {
    last_requested_id: Option<String>,
    last_payload: Option<UserProfile>,
    in_flight: Option<String>,
}

impl ProfileCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `user_id`.
    pub fn get(&mut self, user_id: &str) -> ProfileLookup {
        if self.last_requested_id.as_deref() == Some(user_id)
            && let Some(payload) = &self.last_payload
        {
            trace!(user_id = %user_id, "profile cache hit");
            return ProfileLookup::Hit(payload.clone());
        }
        if self.in_flight.as_deref() == Some(user_id) {
            trace!(user_id = %user_id, "profile fetch already in flight");
            return ProfileLookup::InFlight;
        }

        self.in_flight = Some(user_id.to_owned());
        ProfileLookup::Fetch
    }

    /// Apply a successful fetch. Returns `false` when the response no longer
    /// matches the outstanding request.
    pub fn apply_success(&mut self, user_id: &str, profile: UserProfile) -> bool {
        if self.in_flight.as_deref() != Some(user_id) {
            trace!(user_id = %user_id, "stale profile response dropped");
            return false;
        }
        debug!(user_id = %user_id, "profile cached");
        self.in_flight = None;
        self.last_requested_id = Some(user_id.to_owned());
        self.last_payload = Some(profile);
        true
    }

    /// Apply a failed fetch: the cache is left untouched so the caller keeps
    /// the profile view closed. Returns `false` for stale responses.
    pub fn apply_failure(&mut self, user_id: &str) -> bool {
        if self.in_flight.as_deref() != Some(user_id) {
            return false;
        }
        self.in_flight = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(user_id: &str) -> UserProfile {
        UserProfile {
            user_id: user_id.to_owned(),
            display_name: format!("{user_id} name"),
            avatar_url: None,
        }
    }

    #[test]
    fn repeat_lookup_hits_cache_without_fetch() {
        let mut cache = ProfileCache::new();
        assert_eq!(cache.get("user-a"), ProfileLookup::Fetch);
        assert!(cache.apply_success("user-a", profile("user-a")));

        match cache.get("user-a") {
            ProfileLookup::Hit(payload) => assert_eq!(payload.user_id, "user-a"),
            other => panic!("expected cache hit, got {other:?}"),
        }
    }

    #[test]
    fn concurrent_lookups_share_one_outstanding_request() {
        let mut cache = ProfileCache::new();
        assert_eq!(cache.get("user-a"), ProfileLookup::Fetch);
        assert_eq!(cache.get("user-a"), ProfileLookup::InFlight);
        assert_eq!(cache.get("user-a"), ProfileLookup::InFlight);

        assert!(cache.apply_success("user-a", profile("user-a")));
        assert!(matches!(cache.get("user-a"), ProfileLookup::Hit(_)));
    }

    #[test]
    fn failure_leaves_cache_untouched() {
        let mut cache = ProfileCache::new();
        cache.get("user-a");
        assert!(cache.apply_success("user-a", profile("user-a")));

        assert_eq!(cache.get("user-b"), ProfileLookup::Fetch);
        assert!(cache.apply_failure("user-b"));

        // The old entry survives; the failed ID still requires a fetch.
        assert!(matches!(cache.get("user-a"), ProfileLookup::Hit(_)));
        assert_eq!(cache.get("user-b"), ProfileLookup::Fetch);
    }

    #[test]
    fn distinct_success_overwrites_the_single_entry() {
        let mut cache = ProfileCache::new();
        cache.get("user-a");
        cache.apply_success("user-a", profile("user-a"));
        cache.get("user-b");
        cache.apply_success("user-b", profile("user-b"));

        assert!(matches!(cache.get("user-b"), ProfileLookup::Hit(_)));
        assert_eq!(cache.get("user-a"), ProfileLookup::Fetch);
    }

    #[test]
    fn superseded_fetch_result_is_dropped() {
        let mut cache = ProfileCache::new();
        assert_eq!(cache.get("user-a"), ProfileLookup::Fetch);
        // User opens a different profile before the first fetch resolves.
        assert_eq!(cache.get("user-b"), ProfileLookup::Fetch);

        assert!(!cache.apply_success("user-a", profile("user-a")));
        assert!(cache.apply_success("user-b", profile("user-b")));
        assert!(matches!(cache.get("user-b"), ProfileLookup::Hit(_)));
    }
}
