//! Signed-in user record and the login/register/logout flow.

use crate::api::{Credentials, SharedBackend};
use crate::error::{ClientError, ClientResult, AUTH_CONNECTION_ERROR};
use crate::storage::{SharedStore, USER_KEY};
use serde::{Deserialize, Serialize};

/// Authenticated operator, persisted durably as one JSON value
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub name: String,
    pub token: String,
}

impl std::fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserIdentity")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Which entry action the auth screen submits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthAction {
    #[default]
    Login,
    Register,
}

impl AuthAction {
    pub fn display_name(&self) -> &'static str {
        match self {
            AuthAction::Login => "Sign in",
            AuthAction::Register => "Create account",
        }
    }

    pub fn toggled(&self) -> AuthAction {
        match self {
            AuthAction::Login => AuthAction::Register,
            AuthAction::Register => AuthAction::Login,
        }
    }
}

/// Talks to `/login` and `/register` and owns the durable user record
#[derive(Clone)]
pub struct AuthSessionManager {
    backend: SharedBackend,
    store: SharedStore,
}

impl AuthSessionManager {
    pub fn new(backend: SharedBackend, store: SharedStore) -> Self {
        Self { backend, store }
    }

    /// Stored identity, if any. Not re-verified here; the first protected request does that.
    pub fn restore(&self) -> Option<UserIdentity> {
        let raw = match self.store.get(USER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %err, "could not read stored user");
                return None;
            }
        };

        match serde_json::from_str::<UserIdentity>(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable stored user");
                let _ = self.store.remove(USER_KEY);
                None
            }
        }
    }

    /// Run login or register. The identity is persisted only on success.
    pub async fn authenticate(
        &self,
        action: AuthAction,
        credentials: Credentials,
    ) -> ClientResult<UserIdentity> {
        let credentials = validate(credentials)?;

        let grant = match action {
            AuthAction::Login => self.backend.login(&credentials).await,
            AuthAction::Register => self.backend.register(&credentials).await,
        };

        let grant = match grant {
            Ok(grant) => grant,
            Err(err) => {
                tracing::info!(action = ?action, username = %credentials.username, error = %err, "authentication failed");
                return Err(err);
            }
        };

        let user = UserIdentity {
            id: grant.user_id,
            name: credentials.username,
            token: grant.token,
        };
        self.persist(&user)?;
        tracing::info!(action = ?action, user_id = %user.id, "signed in");
        Ok(user)
    }

    /// Remove the durable record. The caller must rebuild every view afterwards.
    pub fn logout(&self) -> anyhow::Result<()> {
        self.store.remove(USER_KEY)?;
        tracing::info!("signed out");
        Ok(())
    }

    fn persist(&self, user: &UserIdentity) -> ClientResult<()> {
        let stored = serde_json::to_string(user)
            .map_err(|err| ClientError::Rejected(format!("Could not store sign-in: {}", err)))?;
        self.store
            .set(USER_KEY, &stored)
            .map_err(|err| ClientError::Rejected(format!("Could not store sign-in: {}", err)))
    }
}

fn validate(credentials: Credentials) -> ClientResult<Credentials> {
    let username = credentials.username.trim();
    if username.is_empty() || credentials.password.trim().is_empty() {
        return Err(ClientError::Validation(
            "Username and password are required".to_string(),
        ));
    }
    Ok(Credentials {
        username: username.to_string(),
        password: credentials.password,
    })
}

/// Text shown under the auth form for a failed attempt
pub fn inline_error(err: &ClientError) -> String {
    match err {
        ClientError::Validation(message) | ClientError::Rejected(message) => message.clone(),
        ClientError::Transport(_) => AUTH_CONNECTION_ERROR.to_string(),
    }
}

/// Field focused on the auth screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthField {
    #[default]
    Username,
    Password,
}

/// View state of the auth screen
#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    pub action: AuthAction,
    pub username: String,
    pub password: String,
    pub focus: AuthField,
    pub error: Option<String>,
    pub submitting: bool,
}

impl AuthForm {
    /// Switch between login and register; only clears the error
    pub fn toggle_action(&mut self) {
        self.action = self.action.toggled();
        self.error = None;
    }

    pub fn next_field(&mut self) {
        self.focus = match self.focus {
            AuthField::Username => AuthField::Password,
            AuthField::Password => AuthField::Username,
        };
    }

    pub fn push_char(&mut self, c: char) {
        self.focused_mut().push(c);
    }

    pub fn backspace(&mut self) {
        self.focused_mut().pop();
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            AuthField::Username => &mut self.username,
            AuthField::Password => &mut self.password,
        }
    }

    pub fn credentials(&self) -> ClientResult<Credentials> {
        validate(Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }
}
