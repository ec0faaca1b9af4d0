//! Authentication gate - session resolution and sign-in/sign-out transitions.
//!
//! The record store never talks to the database without a resolved
//! identity. [`resolve_identity`] performs the two checks a request needs:
//! a live session, and a verified user that agrees with it. Any gap or
//! disagreement is reported as [`Error::Unauthenticated`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, instrument, warn};

use crate::errors::{Error, Result};

/// Capacity of the auth event channel. Slow subscribers see `Lagged`.
const EVENT_CAPACITY: usize = 16;

/// A signed-in session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque owner identifier used on every store row
    pub user_id: String,
    /// Bearer token presented to the store
    pub access_token: String,
    /// When this token was issued
    pub issued_at: DateTime<Utc>,
}

/// Identity confirmed by the stricter user check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// Opaque owner identifier
    pub user_id: String,
}

/// Session transitions broadcast by an [`AuthGate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A session was established
    SignedIn(Session),
    /// The session ended
    SignedOut,
    /// Same user, new token
    TokenRefreshed(Session),
}

/// Result of [`check_auth_status`]; never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStatus {
    /// Whether both identity checks passed
    pub authenticated: bool,
    /// The verified user, if any
    pub user_id: Option<String>,
}

/// Source of the current user's session.
#[async_trait]
pub trait AuthGate: Send + Sync {
    /// The locally held session, if any.
    async fn current_session(&self) -> Result<Option<Session>>;

    /// Re-validates the session user. Stricter than [`AuthGate::current_session`]:
    /// a revoked or expired user yields `None` even when a session is held.
    async fn verify_user(&self) -> Result<Option<UserIdentity>>;

    /// Subscribes to future session transitions.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Resolves the caller's identity, requiring both checks to agree.
///
/// # Errors
/// Returns [`Error::Unauthenticated`] when there is no session, the user
/// check fails, or the two checks name different users.
#[instrument(skip(gate))]
pub async fn resolve_identity(gate: &dyn AuthGate) -> Result<UserIdentity> {
    let session = gate
        .current_session()
        .await?
        .ok_or_else(|| Error::unauthenticated("no active session, user needs to sign in"))?;

    let user = gate
        .verify_user()
        .await?
        .ok_or_else(|| Error::unauthenticated("user validation failed"))?;

    if user.user_id != session.user_id {
        warn!(
            "Session user {} does not match verified user {}",
            session.user_id, user.user_id
        );
        return Err(Error::unauthenticated(
            "session and verified user disagree",
        ));
    }

    Ok(user)
}

/// Reports whether the caller is signed in without failing.
pub async fn check_auth_status(gate: &dyn AuthGate) -> AuthStatus {
    match resolve_identity(gate).await {
        Ok(user) => AuthStatus {
            authenticated: true,
            user_id: Some(user.user_id),
        },
        Err(e) => {
            debug!("Auth status check failed: {}", e);
            AuthStatus {
                authenticated: false,
                user_id: None,
            }
        }
    }
}

/// In-process gate holding a single session.
///
/// Used by the binary for a locally configured user and by tests. Sign-in,
/// sign-out and token refresh broadcast the matching [`AuthEvent`].
pub struct LocalAuthGate {
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
    revoked: AtomicBool,
    token_counter: AtomicU64,
}

impl Default for LocalAuthGate {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAuthGate {
    /// Creates a gate with no session.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            session: RwLock::new(None),
            events,
            revoked: AtomicBool::new(false),
            token_counter: AtomicU64::new(0),
        }
    }

    fn issue(&self, user_id: &str) -> Session {
        let n = self.token_counter.fetch_add(1, Ordering::Relaxed) + 1;
        Session {
            user_id: user_id.to_string(),
            access_token: format!("local-{user_id}-{n}"),
            issued_at: Utc::now(),
        }
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine: nobody is listening yet.
        if self.events.send(event).is_err() {
            debug!("Auth event dropped, no subscribers");
        }
    }

    /// Establishes a session for `user_id`, replacing any previous one.
    pub async fn sign_in(&self, user_id: &str) -> Session {
        let session = self.issue(user_id);
        *self.session.write().await = Some(session.clone());
        self.revoked.store(false, Ordering::SeqCst);
        info!("Signed in as {}", user_id);
        self.emit(AuthEvent::SignedIn(session.clone()));
        session
    }

    /// Ends the current session, if any.
    pub async fn sign_out(&self) {
        let previous = self.session.write().await.take();
        if let Some(session) = previous {
            info!("Signed out {}", session.user_id);
        }
        self.emit(AuthEvent::SignedOut);
    }

    /// Issues a new token for the current user.
    ///
    /// # Errors
    /// Returns [`Error::Unauthenticated`] when no session is held.
    pub async fn refresh_token(&self) -> Result<Session> {
        let mut guard = self.session.write().await;
        let user_id = guard
            .as_ref()
            .map(|s| s.user_id.clone())
            .ok_or_else(|| Error::unauthenticated("no session to refresh"))?;
        let session = self.issue(&user_id);
        *guard = Some(session.clone());
        drop(guard);
        debug!("Token refreshed for {}", user_id);
        self.emit(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    /// Marks the user as revoked server-side while the session stays held
    /// locally, so [`AuthGate::verify_user`] starts failing.
    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthGate for LocalAuthGate {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.session.read().await.clone())
    }

    async fn verify_user(&self) -> Result<Option<UserIdentity>> {
        if self.revoked.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.session.read().await.as_ref().map(|s| UserIdentity {
            user_id: s.user_id.clone(),
        }))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
