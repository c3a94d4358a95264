//! Cookie-keyed registry of isolated sessions.
//!
//! Sessions idle for longer than the TTL are dropped the next time the
//! registry is touched.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap, HeaderValue};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::constants::{SESSION_COOKIE, SESSION_TTL_SECS};
use crate::session::Session;

pub type SessionHandle = Arc<Mutex<Session>>;

/// A resolved session plus the cookie to set when it was just created.
pub struct Resolved {
    pub id: Uuid,
    pub session: SessionHandle,
    pub set_cookie: Option<HeaderValue>,
}

struct Entry {
    session: SessionHandle,
    last_seen: Instant,
}

pub struct SessionStore {
    catalog: Arc<Catalog>,
    ttl: Duration,
    sessions: RwLock<HashMap<Uuid, Entry>>,
}

impl SessionStore {
    /// Store whose idle timeout comes from `SYNC_SESSION_TTL_SECS`.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_ttl(catalog, Duration::from_secs(*SESSION_TTL_SECS))
    }

    pub fn with_ttl(catalog: Arc<Catalog>, ttl: Duration) -> Self {
        Self {
            catalog,
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn evict_idle(&self, sessions: &mut HashMap<Uuid, Entry>, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) < self.ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, live = sessions.len(), "Evicted idle sessions");
        }
    }

    /// Session named by the request cookie, if it is still live. Never creates one.
    pub async fn lookup(&self, headers: &HeaderMap) -> Option<SessionHandle> {
        let id = session_id_from_headers(headers)?;
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        self.evict_idle(&mut sessions, now);
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = now;
        Some(entry.session.clone())
    }

    /// Finds the session named by the request cookie, or starts a new one.
    pub async fn resolve(&self, headers: &HeaderMap) -> Resolved {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        self.evict_idle(&mut sessions, now);

        if let Some(id) = session_id_from_headers(headers) {
            if let Some(entry) = sessions.get_mut(&id) {
                entry.last_seen = now;
                return Resolved {
                    id,
                    session: entry.session.clone(),
                    set_cookie: None,
                };
            }
        }

        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(Session::new(self.catalog.clone())));
        sessions.insert(
            id,
            Entry {
                session: session.clone(),
                last_seen: now,
            },
        );
        debug!(%id, live = sessions.len(), "Started new session");
        Resolved {
            id,
            session,
            set_cookie: Some(session_cookie(id)),
        }
    }
}

fn session_cookie(id: Uuid) -> HeaderValue {
    // A hyphenated UUID is always a valid header value.
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, id
    ))
    .unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Reads the session id out of any `Cookie` header on the request.
/// The first well-formed `sync_session` value wins.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| *name == SESSION_COOKIE)
        .find_map(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_cookie_parsing() {
        let id = Uuid::new_v4();
        let headers = headers_with_cookie(&format!("theme=dark; sync_session={}; other=1", id));
        assert_eq!(session_id_from_headers(&headers), Some(id));
        assert_eq!(session_id_from_headers(&headers_with_cookie("sync_session=garbage")), None);
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_malformed_cookie_does_not_hide_valid_one() {
        let id = Uuid::new_v4();
        let headers = headers_with_cookie(&format!("sync_session=garbage; sync_session={}", id));
        assert_eq!(session_id_from_headers(&headers), Some(id));

        let mut split = HeaderMap::new();
        split.append(header::COOKIE, HeaderValue::from_static("sync_session=nope"));
        split.append(header::COOKIE, HeaderValue::from_str(&format!("sync_session={}", id)).unwrap());
        assert_eq!(session_id_from_headers(&split), Some(id));
    }

    #[tokio::test]
    async fn test_idle_session_is_evicted() {
        let store = SessionStore::with_ttl(default_catalog(), Duration::from_millis(20));
        let idle = store.resolve(&HeaderMap::new()).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let fresh = store.resolve(&HeaderMap::new()).await;
        assert_eq!(store.len().await, 1);
        let cookie = headers_with_cookie(&format!("sync_session={}", idle.id));
        assert!(store.lookup(&cookie).await.is_none());

        let cookie = headers_with_cookie(&format!("sync_session={}", fresh.id));
        assert!(store.lookup(&cookie).await.is_some());
    }

    #[tokio::test]
    async fn test_activity_keeps_session_alive() {
        let store = SessionStore::with_ttl(default_catalog(), Duration::from_millis(500));
        let first = store.resolve(&HeaderMap::new()).await;
        let cookie = headers_with_cookie(&format!("sync_session={}", first.id));
        // Total wait exceeds the TTL; each gap does not.
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(150)).await;
            assert!(store.lookup(&cookie).await.is_some());
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_lookup_without_cookie_creates_nothing() {
        let store = SessionStore::new(default_catalog());
        assert!(store.lookup(&HeaderMap::new()).await.is_none());
        let stale = headers_with_cookie(&format!("sync_session={}", Uuid::new_v4()));
        assert!(store.lookup(&stale).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_new_visitor_gets_cookie() {
        let store = SessionStore::new(default_catalog());
        let resolved = store.resolve(&HeaderMap::new()).await;
        let cookie = resolved.set_cookie.unwrap();
        assert!(cookie.to_str().unwrap().starts_with(&format!("sync_session={}", resolved.id)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_known_cookie_reuses_session() {
        let store = SessionStore::new(default_catalog());
        let first = store.resolve(&HeaderMap::new()).await;
        first.session.lock().await.skip().unwrap();

        let again = store
            .resolve(&headers_with_cookie(&format!("sync_session={}", first.id)))
            .await;
        assert!(again.set_cookie.is_none());
        assert_eq!(again.session.lock().await.browse_cursor(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new(default_catalog());
        let a = store.resolve(&HeaderMap::new()).await;
        let b = store.resolve(&HeaderMap::new()).await;
        a.session.lock().await.match_current().unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(b.session.lock().await.matches().len(), 0);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_cookie_starts_fresh_session() {
        let store = SessionStore::new(default_catalog());
        let stale = Uuid::new_v4();
        let resolved = store
            .resolve(&headers_with_cookie(&format!("sync_session={}", stale)))
            .await;
        assert_ne!(resolved.id, stale);
        assert!(resolved.set_cookie.is_some());
    }
}
