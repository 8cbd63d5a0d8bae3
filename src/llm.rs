use crate::events::Turn;
use crate::prompts;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Failure of a single completion call, already in a form fit for display
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Network-level failure reaching the service
    #[error("Error generating response. Please try again.")]
    Transport(#[from] reqwest::Error),

    /// Non-success status with a structured error message
    #[error("{message}")]
    Service { status: StatusCode, message: String },

    /// Non-success status without a readable error message
    #[error("Error generating response (HTTP {status}). Please try again.")]
    Status { status: StatusCode },

    /// Success status but the body did not hold a reply
    #[error("The completion service sent a reply that could not be read.")]
    MalformedResponse(String),
}

impl CompletionError {
    /// Single user-visible string for any failure kind
    pub fn human_readable(&self) -> String {
        self.to_string()
    }
}

/// Anything able to turn a conversation plus a new prompt into a reply
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prior: &[Turn], prompt: &str) -> Result<String, CompletionError>;
}

/// Request body for `POST /chat/completions`
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Turn>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Where and how completions are requested
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
}

/// HTTP client for OpenAI-compatible chat completion endpoints
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    settings: CompletionSettings,
    api_key: String,
}

impl LlmClient {
    pub fn new(settings: CompletionSettings, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
            api_key: api_key.into(),
        }
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }

    /// System instruction, then every prior turn, then the new prompt
    pub fn build_request(&self, prior: &[Turn], prompt: &str) -> ChatRequest {
        let mut messages = Vec::with_capacity(prior.len() + 2);
        messages.extend(prompts::system_turn(self.settings.system_prompt.as_deref()));
        messages.extend(prior.iter().cloned());
        messages.push(Turn::user(prompt));

        ChatRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            messages,
        }
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(&self, prior: &[Turn], prompt: &str) -> Result<String, CompletionError> {
        let request = self.build_request(prior, prompt);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "requesting completion"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "completion request failed");
                CompletionError::from(err)
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let error = service_error(status, &body);
            warn!(%status, error = %error, "completion service rejected request");
            return Err(error);
        }

        parse_reply(&body)
    }
}

fn service_error(status: StatusCode, body: &str) -> CompletionError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.trim().is_empty() => CompletionError::Service {
            status,
            message: envelope.error.message,
        },
        _ => CompletionError::Status { status },
    }
}

fn parse_reply(body: &str) -> Result<String, CompletionError> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|err| {
        warn!(error = %err, "unreadable completion body");
        CompletionError::MalformedResponse(err.to_string())
    })?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| CompletionError::MalformedResponse("response has no choices".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Role;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_settings(base_url: String) -> CompletionSettings {
        CompletionSettings {
            base_url,
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 500,
            system_prompt: Some("be sarcastic".to_string()),
        }
    }

    fn reply_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": content } }
            ]
        })
    }

    #[test]
    fn request_replays_history_then_prompt() {
        let client = LlmClient::new(test_settings("http://localhost".to_string()), "key");
        let prior = vec![Turn::user("hi")];

        let request = client.build_request(&prior, "how are you");

        assert_eq!(request.messages[0], Turn::system("be sarcastic"));
        assert_eq!(
            &request.messages[1..],
            &[Turn::user("hi"), Turn::user("how are you")]
        );
        assert_eq!(request.max_tokens, 500);
    }

    #[test]
    fn request_without_system_prompt_starts_with_history() {
        let mut settings = test_settings("http://localhost".to_string());
        settings.system_prompt = None;
        let client = LlmClient::new(settings, "key");

        let request = client.build_request(&[Turn::user("a"), Turn::assistant("b")], "c");

        let roles: Vec<Role> = request.messages.iter().map(Turn::role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    }

    #[test]
    fn error_envelope_message_is_surfaced_verbatim() {
        let error = service_error(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"invalid key","type":"invalid_request_error"}}"#,
        );
        assert_eq!(error.human_readable(), "invalid key");
    }

    #[test]
    fn unstructured_error_body_falls_back_to_status() {
        let error = service_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(error, CompletionError::Status { .. }));
        assert!(error.human_readable().contains("502"));
    }

    #[test]
    fn empty_choices_is_malformed() {
        let error = parse_reply(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(error, CompletionError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn complete_posts_bearer_authenticated_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(header("Content-Type", "application/json"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-3.5-turbo",
                "max_tokens": 500,
                "messages": [
                    { "role": "system", "content": "be sarcastic" },
                    { "role": "user", "content": "2+2?" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("4 🙂")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = LlmClient::new(test_settings(mock_server.uri()), "sk-test");
        let reply = client.complete(&[], "2+2?").await.unwrap();

        assert_eq!(reply, "4 🙂");
    }

    #[tokio::test]
    async fn complete_reports_service_error_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "invalid key" }
            })))
            .mount(&mock_server)
            .await;

        let client = LlmClient::new(test_settings(mock_server.uri()), "sk-wrong");
        let error = client.complete(&[], "hello").await.unwrap_err();

        match &error {
            CompletionError::Service { status, message } => {
                assert_eq!(*status, StatusCode::UNAUTHORIZED);
                assert_eq!(message, "invalid key");
            }
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn complete_rejects_body_without_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [{}] })),
            )
            .mount(&mock_server)
            .await;

        let client = LlmClient::new(test_settings(mock_server.uri()), "sk-test");
        let error = client.complete(&[], "hello").await.unwrap_err();

        assert!(matches!(error, CompletionError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        // Grab a free port and release it so nothing is listening there.
        let uri = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };

        let client = LlmClient::new(test_settings(uri), "sk-test");
        let error = client.complete(&[], "hello").await.unwrap_err();

        assert!(matches!(error, CompletionError::Transport(_)));
        assert_eq!(
            error.human_readable(),
            "Error generating response. Please try again."
        );
    }

    #[tokio::test]
    async fn trailing_slash_in_base_url_is_ignored() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("ok")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = LlmClient::new(test_settings(format!("{}/", mock_server.uri())), "k");
        assert_eq!(client.complete(&[], "ping").await.unwrap(), "ok");
    }
}
