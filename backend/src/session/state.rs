use crate::engine::error::GridError;
use crate::session::{SESSION_COOKIE, TOKEN_HEADER};
use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;
use log::{debug, warn};
use std::time::{Duration, Instant};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory table of sessions and their anti-forgery tokens.
///
/// Cloned into every worker through `web::Data`; all clones share the same
/// map. Sessions idle for longer than `ttl` are dropped, and the map never
/// holds more than `capacity` sessions: the least recently used one goes
/// first.
#[derive(Clone)]
pub struct SessionStore {
    /// Session id (the cookie value) to its token.
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    ttl: Duration,
    capacity: usize,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    token: String,
    last_seen: Instant,
}

impl SessionEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.last_seen.elapsed() >= ttl
    }
}

/// Token handed to a caller, with the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub session_id: String,
    pub token: String,
    /// True when a new session was opened and its cookie must be set.
    pub is_new: bool,
}

impl IssuedToken {
    pub fn cookie(&self) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, self.session_id.clone())
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }
}

impl SessionStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        SessionStore {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Returns the token of the caller's session, opening a session when the
    /// request carries no live session cookie.
    pub async fn issue(&self, req: &HttpRequest) -> IssuedToken {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        if let Some(cookie) = req.cookie(SESSION_COOKIE) {
            if let Some(entry) = sessions
                .get_mut(cookie.value())
                .filter(|entry| !entry.is_expired(self.ttl))
            {
                entry.last_seen = now;
                return IssuedToken {
                    session_id: cookie.value().to_string(),
                    token: entry.token.clone(),
                    is_new: false,
                };
            }
        }

        let ttl = self.ttl;
        sessions.retain(|_, entry| !entry.is_expired(ttl));
        while sessions.len() >= self.capacity {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            debug!("Evicted least recently used grid session");
        }

        let session_id = Uuid::new_v4().simple().to_string();
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        sessions.insert(
            session_id.clone(),
            SessionEntry {
                token: token.clone(),
                last_seen: now,
            },
        );
        debug!("Opened grid session ({} live)", sessions.len());
        IssuedToken {
            session_id,
            token,
            is_new: true,
        }
    }

    /// Number of sessions currently held.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Checks the `X-CSRF-Token` header against the caller's session.
    pub async fn verify(&self, req: &HttpRequest) -> Result<(), GridError> {
        let cookie = req.cookie(SESSION_COOKIE).ok_or(GridError::Authorization)?;
        let presented = req
            .headers()
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(GridError::Authorization)?;

        let sessions = self.sessions.read().await;
        match sessions
            .get(cookie.value())
            .filter(|entry| !entry.is_expired(self.ttl))
        {
            Some(entry) if constant_time_eq(entry.token.as_bytes(), presented.as_bytes()) => Ok(()),
            Some(_) => {
                warn!("Rejected {} {}: token mismatch", req.method(), req.path());
                Err(GridError::Authorization)
            }
            None => {
                warn!("Rejected {} {}: unknown or expired session", req.method(), req.path());
                Err(GridError::Authorization)
            }
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
