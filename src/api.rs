use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Duration;

/// Body of `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Simulated patient attached to a thread by the server
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatientInfo {
    #[serde(default)]
    pub name: String,
    /// Number once the case exists, `"?"` before
    #[serde(default)]
    pub age: serde_json::Value,
    #[serde(default)]
    pub sex: String,
}

impl PatientInfo {
    pub fn age_label(&self) -> String {
        match &self.age {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) if !s.is_empty() => s.clone(),
            _ => "?".to_string(),
        }
    }

    pub fn summary(&self) -> String {
        let name = if self.name.is_empty() { "Unknown" } else { &self.name };
        let sex = if self.sex.is_empty() { "?" } else { &self.sex };
        format!("{}, {}, {}", name, self.age_label(), sex)
    }
}

/// Successful chat turn
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub patient: Option<PatientInfo>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    response: Option<String>,
    error: Option<String>,
    patient_info: Option<PatientInfo>,
}

/// Body of `POST /login` and `POST /register`
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What the server hands back on successful login/registration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthGrant {
    pub user_id: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponseBody {
    user_id: Option<String>,
    token: Option<String>,
    error: Option<String>,
}

/// One row of `GET /sessions/{user_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySessionSummary {
    pub patient: String,
    pub disease: String,
    pub thread_id: String,
}

/// Remote chat service, as seen by the client controllers
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `Err(Rejected)` when the body carries `error`, `Err(Transport)` when there is no usable body
    async fn chat(&self, request: &ChatRequest, token: Option<&str>) -> ClientResult<ChatReply>;

    async fn login(&self, credentials: &Credentials) -> ClientResult<AuthGrant>;

    async fn register(&self, credentials: &Credentials) -> ClientResult<AuthGrant>;

    async fn sessions(
        &self,
        user_id: &str,
        token: Option<&str>,
    ) -> ClientResult<Vec<HistorySessionSummary>>;
}

pub type SharedBackend = Arc<dyn ChatBackend>;

/// reqwest-backed client for the chat service
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: config.base_url().to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_token(builder: reqwest::RequestBuilder, token: Option<&str>) -> reqwest::RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn authenticate(&self, path: &str, credentials: &Credentials) -> ClientResult<AuthGrant> {
        let response = self
            .client
            .post(self.url(path))
            .json(credentials)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed = serde_json::from_str::<AuthResponseBody>(&body);

        match parsed {
            Ok(AuthResponseBody { error: Some(error), .. }) => Err(ClientError::Rejected(error)),
            Ok(AuthResponseBody {
                user_id: Some(user_id),
                token: Some(token),
                ..
            }) if status.is_success() => Ok(AuthGrant { user_id, token }),
            _ if status.is_success() => Err(ClientError::Transport(format!(
                "malformed {} response",
                path
            ))),
            _ => Err(ClientError::Rejected(format!(
                "Request failed ({})",
                status.as_u16()
            ))),
        }
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn chat(&self, request: &ChatRequest, token: Option<&str>) -> ClientResult<ChatReply> {
        let builder = self.client.post(self.url("/chat")).json(request);
        let response = Self::with_token(builder, token).send().await?;

        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "chat returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: ChatResponseBody = response.json().await?;
        match body {
            ChatResponseBody { error: Some(error), .. } => Err(ClientError::Rejected(error)),
            ChatResponseBody {
                response: Some(text),
                patient_info,
                ..
            } => Ok(ChatReply {
                text,
                patient: patient_info,
            }),
            _ => Err(ClientError::Transport("chat response had no reply".to_string())),
        }
    }

    async fn login(&self, credentials: &Credentials) -> ClientResult<AuthGrant> {
        self.authenticate("/login", credentials).await
    }

    async fn register(&self, credentials: &Credentials) -> ClientResult<AuthGrant> {
        self.authenticate("/register", credentials).await
    }

    async fn sessions(
        &self,
        user_id: &str,
        token: Option<&str>,
    ) -> ClientResult<Vec<HistorySessionSummary>> {
        let builder = self.client.get(self.url(&format!("/sessions/{}", user_id)));
        let response = Self::with_token(builder, token).send().await?;

        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "sessions returned HTTP {}",
                response.status().as_u16()
            )));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chat_request_omits_missing_user() {
        let request = ChatRequest {
            message: "hello".to_string(),
            thread_id: "case_1".to_string(),
            user_id: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, serde_json::json!({"message": "hello", "thread_id": "case_1"}));
    }

    #[test]
    fn patient_summary_handles_placeholder_age() {
        let known: PatientInfo =
            serde_json::from_value(serde_json::json!({"name": "Alex", "age": 30, "sex": "Male"})).unwrap();
        let unknown: PatientInfo =
            serde_json::from_value(serde_json::json!({"name": "Unknown", "age": "?", "sex": "?"})).unwrap();

        assert_eq!(known.summary(), "Alex, 30, Male");
        assert_eq!(unknown.age_label(), "?");
        assert_eq!(PatientInfo::default().summary(), "Unknown, ?, ?");
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials {
            username: "dr_house".to_string(),
            password: "vicodin".to_string(),
        };
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("dr_house"));
        assert!(!rendered.contains("vicodin"));
    }
}
