//! Authenticated identity and the per-client session context.
//!
//! Operations that need a signed-in user take a [`Session`] argument instead
//! of reaching for global state, so the dependency shows up in the signature.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    notice::Notice,
    remote::AuthService,
};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub access_token: String,
}

/// Snapshot of who is signed in, handed to every operation that is gated on
/// authentication.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    identity: Option<Identity>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { identity: None }
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self { identity: Some(identity) }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.identity.as_ref().map(|i| i.user_id)
    }

    pub fn require(&self) -> AppResult<&Identity> {
        self.identity.as_ref().ok_or(AppError::NotAuthenticated)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl Credentials {
    /// Checks the form before anything is sent to the auth service.
    pub fn validate(&self) -> AppResult<()> {
        if !looks_like_email(self.email.trim()) {
            return Err(AppError::Validation("Please enter a valid email".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
}

/// Holds the current identity for one client and notifies subscribers when
/// it changes.
pub struct SessionContext {
    auth: Arc<dyn AuthService>,
    current: watch::Sender<Session>,
}

impl SessionContext {
    pub fn new(auth: Arc<dyn AuthService>) -> Self {
        let (current, _) = watch::channel(Session::anonymous());
        Self { auth, current }
    }

    pub fn session(&self) -> Session {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.current.subscribe()
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Notice {
        if let Err(err) = credentials.validate() {
            return Notice::error(err.public_message());
        }

        match self.auth.sign_in(credentials.email.trim(), &credentials.password).await {
            Ok(identity) => {
                debug!(user_id = %identity.user_id, "signed in");
                self.current.send_replace(Session::signed_in(identity));
                Notice::success("Welcome back!")
            },
            Err(err) => {
                warn!(error = %err, "sign in failed");
                Notice::error(sign_in_message(&err))
            },
        }
    }

    pub async fn sign_up(&self, credentials: &Credentials) -> Notice {
        if let Err(err) = credentials.validate() {
            return Notice::error(err.public_message());
        }

        let full_name = credentials.full_name.as_deref().map(str::trim).unwrap_or_default();
        match self.auth.sign_up(credentials.email.trim(), &credentials.password, full_name).await {
            Ok(Some(identity)) => {
                debug!(user_id = %identity.user_id, "signed up");
                self.current.send_replace(Session::signed_in(identity));
                Notice::success("Account created successfully!")
            },
            Ok(None) => {
                debug!("signed up, awaiting email confirmation");
                Notice::success("Account created successfully!")
            },
            Err(err) => {
                warn!(error = %err, "sign up failed");
                Notice::error(sign_up_message(&err))
            },
        }
    }

    pub async fn sign_out(&self) -> Notice {
        let session = self.session();
        if let Some(identity) = session.identity() {
            if let Err(err) = self.auth.sign_out(identity).await {
                // The local identity is dropped either way.
                warn!(error = %err, "remote sign out failed");
            }
        }
        self.current.send_replace(Session::anonymous());
        Notice::success("Signed out successfully")
    }
}

fn sign_in_message(err: &AppError) -> String {
    match err {
        AppError::Auth(msg) if msg.contains("Invalid login credentials") => {
            "Invalid email or password".to_string()
        },
        AppError::Auth(msg) => msg.clone(),
        _ => "An unexpected error occurred".to_string(),
    }
}

fn sign_up_message(err: &AppError) -> String {
    match err {
        AppError::Auth(msg) if msg.contains("already registered") => {
            "This email is already registered. Please sign in instead.".to_string()
        },
        AppError::Auth(msg) => msg.clone(),
        _ => "An unexpected error occurred".to_string(),
    }
}
