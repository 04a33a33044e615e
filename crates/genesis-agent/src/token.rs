use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// In-memory access-token cache, checked for expiry before every call and
/// renewed otherwise. Same shape as this codebase's disk-backed CLI token
/// cache (`resolve_token`/`generate_token`/`write_token` in the command
/// layer) but held in process memory rather than a file, since the agent
/// has no interactive operator to hand a token to.
pub struct TokenCache {
    credential: String,
    ttl: ChronoDuration,
    token: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(credential: String, ttl_secs: i64) -> Self {
        Self { credential, ttl: ChronoDuration::seconds(ttl_secs), token: Mutex::new(None) }
    }

    /// Returns a cached, unexpired token, minting a fresh one otherwise.
    /// Real token minting is out of scope (OIDC is an external collaborator
    /// per the specification's stated boundary) — this synthesizes an
    /// opaque bearer value the same way the CLI's `generate_token` does.
    pub fn get_or_refresh(&self) -> String {
        let now = Utc::now();
        let mut guard = self.token.lock().expect("token cache mutex poisoned");
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > now {
                return cached.value.clone();
            }
        }
        let value: String = format!(
            "{}.{}",
            self.credential,
            rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect::<String>()
        );
        *guard = Some(CachedToken { value: value.clone(), expires_at: now + self.ttl });
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_token_within_ttl() {
        let cache = TokenCache::new("node-1".to_string(), 60);
        let first = cache.get_or_refresh();
        let second = cache.get_or_refresh();
        assert_eq!(first, second);
    }

    #[test]
    fn renews_after_expiry() {
        let cache = TokenCache::new("node-1".to_string(), -1);
        let first = cache.get_or_refresh();
        let second = cache.get_or_refresh();
        assert_ne!(first, second);
    }
}
