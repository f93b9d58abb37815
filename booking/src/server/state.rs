//! Application state shared by every handler.
//!
//! Also home to [`Caller`], the extractor that turns a bearer token into a
//! [`Principal`], and [`AppState::dispatch`], the one path by which handlers
//! change fleet state.

use crate::error::{BookingError, BookingResult};
use crate::fleet::{Command, FleetAction, FleetState, FleetStore, Outcome};
use crate::hub::NotificationHub;
use crate::identity::{AuthError, IdentityProvider};
use crate::types::Principal;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use busline_web::handlers::SessionConfig;
use busline_web::{AppError, BearerToken};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Fleet store (write side and queries)
    pub store: FleetStore,
    /// Resolves bearer tokens
    pub identity: Arc<dyn IdentityProvider>,
    /// Live notification channels
    pub hub: NotificationHub,
    /// Keep-alive settings for WebSocket sessions
    pub session: SessionConfig,
    /// How long a request waits for its command to be committed
    pub command_timeout: Duration,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        store: FleetStore,
        identity: Arc<dyn IdentityProvider>,
        session: SessionConfig,
        command_timeout: Duration,
    ) -> Self {
        let hub = store.environment().hub.clone();
        Self {
            store,
            identity,
            hub,
            session,
            command_timeout,
        }
    }

    /// Send a command and wait for its committed outcome.
    ///
    /// Each command gets its own id; the reply is matched on it.
    ///
    /// # Errors
    ///
    /// The command's [`BookingError`], or 503 if the store is shutting down
    /// or the reply does not arrive within `command_timeout`.
    #[tracing::instrument(skip(self, principal), fields(user_id = %principal.user_id, command = command.name()))]
    pub async fn dispatch(&self, principal: Principal, command: Command) -> Result<Outcome, AppError> {
        let correlation_id = Uuid::new_v4();
        let reply = self
            .store
            .send_and_wait_for(
                FleetAction::Command {
                    correlation_id,
                    principal,
                    command,
                },
                |action| action.reply_to() == Some(correlation_id),
                self.command_timeout,
            )
            .await?;

        Ok(reply.into_outcome()?)
    }

    /// Run a read-only view against the current fleet state.
    ///
    /// # Errors
    ///
    /// Whatever the view returns.
    pub async fn query<T, F>(&self, view: F) -> Result<T, AppError>
    where
        F: FnOnce(&FleetState) -> BookingResult<T>,
    {
        Ok(self.store.state(view).await?)
    }
}

impl FromRef<AppState> for Arc<dyn IdentityProvider> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.identity)
    }
}

/// The authenticated caller.
///
/// Use as a handler parameter to require authentication. Deactivated
/// accounts get through here and are refused by the policy gate.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    Arc<dyn IdentityProvider>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let identity = Arc::<dyn IdentityProvider>::from_ref(state);

        match identity.authenticate(&token).await {
            Ok(principal) => Ok(Self(principal)),
            Err(AuthError::UnknownToken) => {
                Err(BookingError::Unauthorized("Invalid or expired token".to_string()).into())
            },
            Err(err @ AuthError::Directory(_)) => {
                Err(AppError::internal("An internal error occurred").with_source(err.into()))
            },
        }
    }
}

/// An outcome of a different kind than the command produces.
pub(crate) fn unexpected(outcome: &Outcome) -> AppError {
    AppError::internal("An internal error occurred")
        .with_source(anyhow::anyhow!("unexpected command outcome: {outcome:?}"))
}
