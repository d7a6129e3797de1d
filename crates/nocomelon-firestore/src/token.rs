//! Access tokens for Firestore requests.
//!
//! [`TokenCache`] keeps the current token until shortly before it expires and
//! refreshes it under a write lock so concurrent callers share one refresh.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh this long before expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// OAuth scope for Firestore access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Source of bearer tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetch a fresh token and its expiry.
    async fn fetch(&self) -> FirestoreResult<(String, DateTime<Utc>)>;
}

/// Tokens from Google credentials.
pub struct GcpTokenSource {
    provider: Arc<dyn TokenProvider>,
}

impl GcpTokenSource {
    /// Service account from `GOOGLE_APPLICATION_CREDENTIALS`, else the
    /// default credential chain.
    pub async fn from_env() -> FirestoreResult<Self> {
        let custom = gcp_auth::CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        let provider: Arc<dyn TokenProvider> = match custom {
            Some(sa) => Arc::new(sa),
            None => gcp_auth::provider().await.map_err(|e| {
                FirestoreError::auth_error(format!("No Google credentials available: {}", e))
            })?,
        };

        Ok(Self { provider })
    }
}

#[async_trait]
impl TokenSource for GcpTokenSource {
    async fn fetch(&self) -> FirestoreResult<(String, DateTime<Utc>)> {
        let token = self
            .provider
            .token(&[FIRESTORE_SCOPE])
            .await
            .map_err(|e| FirestoreError::auth_error(format!("Failed to obtain auth token: {}", e)))?;
        Ok((token.as_str().to_string(), token.expires_at()))
    }
}

/// Fixed token, used with the Firestore emulator.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn fetch(&self) -> FirestoreResult<(String, DateTime<Utc>)> {
        Ok((self.0.clone(), DateTime::<Utc>::MAX_UTC))
    }
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(TOKEN_REFRESH_MARGIN)
            .map(|margin| now + margin < self.expires_at)
            .unwrap_or(false)
    }

    fn is_usable(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Thread-safe token cache.
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(None),
        }
    }

    /// Drop the cached token after the server rejected it.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Current token, refreshing when close to expiry.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh(Utc::now())) {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh(Utc::now())) {
            return Ok(cached.access_token.clone());
        }

        match self.source.fetch().await {
            Ok((access_token, expires_at)) => {
                debug!(%expires_at, "Refreshed Firestore auth token");
                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });
                Ok(access_token)
            }
            Err(e) => match cache.as_ref().filter(|c| c.is_usable(Utc::now())) {
                Some(cached) => {
                    warn!("Token refresh failed, using existing token: {}", e);
                    Ok(cached.access_token.clone())
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSource {
        calls: AtomicU32,
        ttl: chrono::Duration,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn fetch(&self) -> FirestoreResult<(String, DateTime<Utc>)> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((format!("token-{n}"), Utc::now() + self.ttl))
        }
    }

    #[tokio::test]
    async fn test_fresh_token_is_reused() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
            ttl: chrono::Duration::minutes(50),
        });
        let cache = TokenCache::new(source.clone());

        assert_eq!(cache.get_token().await.unwrap(), "token-0");
        assert_eq!(cache.get_token().await.unwrap(), "token-0");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        cache.invalidate().await;
        assert_eq!(cache.get_token().await.unwrap(), "token-1");
    }

    #[tokio::test]
    async fn test_token_inside_margin_is_refreshed() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
            ttl: chrono::Duration::seconds(30),
        });
        let cache = TokenCache::new(source.clone());

        cache.get_token().await.unwrap();
        cache.get_token().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
