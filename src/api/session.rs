use std::{collections::HashMap, future::Future, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::error::ApiError;

/// Token pair issued by the API's login endpoint.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Credentials {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl Credentials {
    #[cfg(test)]
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Some(access.into()),
            refresh: Some(refresh.into()),
        }
    }
}

/// Snapshot of the access token taken when a request is built.
#[derive(Clone, Debug)]
pub struct AccessSnapshot {
    pub epoch: u64,
    pub access: Option<String>,
}

#[derive(Debug, Default)]
struct TokenState {
    credentials: Credentials,
    // Bumped on every rotation and on teardown.
    epoch: u64,
}

/// One operator's credentials plus the gate that serializes refreshes.
#[derive(Debug, Default)]
pub struct Session {
    tokens: RwLock<TokenState>,
    refresh_gate: Mutex<()>,
}

impl Session {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            tokens: RwLock::new(TokenState {
                credentials,
                epoch: 0,
            }),
            refresh_gate: Mutex::new(()),
        }
    }

    pub async fn snapshot(&self) -> AccessSnapshot {
        let state = self.tokens.read().await;
        AccessSnapshot {
            epoch: state.epoch,
            access: state.credentials.access.clone(),
        }
    }

    #[cfg(test)]
    pub async fn credentials(&self) -> Credentials {
        self.tokens.read().await.credentials.clone()
    }

    pub async fn is_active(&self) -> bool {
        let state = self.tokens.read().await;
        state.credentials.access.is_some() || state.credentials.refresh.is_some()
    }

    /// Clear both tokens. Safe to call any number of times.
    pub async fn end(&self) {
        let mut state = self.tokens.write().await;
        state.credentials = Credentials::default();
        state.epoch += 1;
    }

    /// Obtain a fresh access token after the caller saw a 401 at `seen_epoch`.
    ///
    /// Only one exchange runs per session at a time. A caller that queued behind
    /// a finished exchange reuses its result instead of rotating again. When no
    /// refresh token is available or the exchange is rejected the session is ended.
    pub async fn rotate<F, Fut>(&self, seen_epoch: u64, exchange: F) -> Result<String, ApiError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Credentials, ApiError>>,
    {
        let _gate = self.refresh_gate.lock().await;

        let refresh = {
            let state = self.tokens.read().await;
            if state.epoch != seen_epoch {
                return match &state.credentials.access {
                    Some(access) => {
                        debug!("reusing access token rotated by a concurrent request");
                        Ok(access.clone())
                    }
                    None => Err(ApiError::SessionExpired),
                };
            }
            state.credentials.refresh.clone()
        };

        let Some(refresh) = refresh else {
            info!("no refresh token available; ending session");
            self.end().await;
            return Err(ApiError::SessionExpired);
        };

        match exchange(refresh).await {
            Ok(issued) => {
                let mut state = self.tokens.write().await;
                let Some(access) = issued.access else {
                    return Err(ApiError::Decode(
                        "refresh response did not include an access token".to_string(),
                    ));
                };
                state.credentials.access = Some(access.clone());
                if issued.refresh.is_some() {
                    state.credentials.refresh = issued.refresh;
                }
                state.epoch += 1;
                Ok(access)
            }
            // Transport failures leave the tokens alone; the operator can retry.
            Err(err @ ApiError::Connectivity(_)) => Err(err),
            Err(err) => {
                info!(?err, "refresh token rejected; ending session");
                self.end().await;
                Err(ApiError::SessionExpired)
            }
        }
    }
}

struct StoredSession {
    session: Arc<Session>,
    expires_at: DateTime<Utc>,
}

/// Server-side registry of sessions keyed by the browser cookie.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, StoredSession>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Register a session created by a successful login.
    pub async fn create(&self, credentials: Credentials) -> (Uuid, Arc<Session>) {
        let id = Uuid::new_v4();
        let session = Arc::new(Session::new(credentials));
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        sessions.retain(|_, stored| stored.expires_at > now);
        sessions.insert(
            id,
            StoredSession {
                session: session.clone(),
                expires_at: now + self.ttl,
            },
        );
        (id, session)
    }

    /// Look up a live session. Expired or torn-down sessions are dropped.
    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        let session = {
            let sessions = self.sessions.read().await;
            let stored = sessions.get(&id)?;
            if stored.expires_at <= Utc::now() {
                None
            } else {
                Some(stored.session.clone())
            }
        };

        match session {
            Some(session) if session.is_active().await => Some(session),
            _ => {
                self.remove(id).await;
                None
            }
        }
    }

    /// Tear down and forget a session. Unknown ids are ignored.
    pub async fn remove(&self, id: Uuid) {
        let removed = self.sessions.write().await.remove(&id);
        if let Some(stored) = removed {
            stored.session.end().await;
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
