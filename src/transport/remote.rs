use super::Transport;
use crate::{
    Error, Result,
    bridge::{
        ConversationTurn, FailureKind, InferenceRequest, InferenceResult, Role, TokenUsage,
    },
    config::LlmConfig,
};
use async_openai::{
    error::ApiError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_SYSTEM_PROMPT: &str = "Você é o Assistente CPM do Conservatório de Música de \
Pernambuco. Responda com base apenas nos documentos do Processo Seletivo. Responda de forma direta \
e objetiva, cite datas e documentos exatamente. Nunca invente respostas.";

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

const AUTH_CODES: [&str; 4] = [
    "invalid_api_key",
    "invalid_authentication",
    "authentication_error",
    "unauthorized",
];

const RATE_LIMIT_CODES: [&str; 5] = [
    "rate_limit_exceeded",
    "rate_limit_error",
    "insufficient_quota",
    "requests",
    "tokens",
];

/// Error body of an OpenAI-compatible API: `{"error": {...}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

/// Sends each question as one non-streaming chat completion to an
/// OpenAI-compatible API.
///
/// Requests are built and responses parsed with `async-openai` types, but sent
/// with `reqwest` directly so the HTTP status is available for classification
/// and nothing is retried.
pub struct RemoteTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
}

struct Completion {
    text: String,
    usage: Option<TokenUsage>,
}

impl RemoteTransport {
    pub fn new(config: LlmConfig) -> Self {
        let base_url = if config.base_url.is_empty() {
            OPENAI_API_BASE
        } else {
            config.base_url.as_str()
        };
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: config.api_key,
            model: config.model,
            system_prompt: config
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn messages(&self, request: &InferenceRequest) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::with_capacity(request.context().len() + 2);

        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(ChatCompletionRequestSystemMessageContent::Text(
                self.system_prompt.clone(),
            ))
            .build()?;
        messages.push(system.into());

        for turn in request.context() {
            messages.push(to_openai_message(turn)?);
        }

        let question = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Text(
                request.question().as_str().to_string(),
            ))
            .build()?;
        messages.push(question.into());

        Ok(messages)
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<Completion> {
        let messages = self.messages(request)?;

        debug!(
            "Creating chat completion with {} messages",
            messages.len()
        );

        let openai_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&openai_request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(api_error(status, &body));
        }

        let response: CreateChatCompletionResponse = response.json().await?;

        debug!(
            "Received chat completion response with {} choices",
            response.choices.len()
        );

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(Completion { text, usage })
    }
}

#[async_trait]
impl Transport for RemoteTransport {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn infer(&self, request: &InferenceRequest) -> InferenceResult {
        match self.complete(request).await {
            Ok(completion) if completion.text.is_empty() => {
                InferenceResult::failure(FailureKind::Unknown, "empty completion")
            }
            Ok(completion) => InferenceResult::success_with_usage(completion.text, completion.usage),
            Err(e @ Error::Api { .. }) => {
                let kind = classify_api_error(&e);
                warn!("Chat completion rejected ({}): {}", kind, e);
                InferenceResult::failure(kind, e.to_string())
            }
            Err(e) => InferenceResult::failure(FailureKind::Unknown, e.to_string()),
        }
    }
}

fn api_error(status: StatusCode, body: &str) -> Error {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => Error::Api {
            status,
            message: error.message,
            error_type: error.r#type,
            code: error.code,
        },
        Err(_) => Error::Api {
            status,
            message: if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("no body").to_string()
            } else {
                body.trim().to_string()
            },
            error_type: None,
            code: None,
        },
    }
}

/// Maps a rejected completion onto the bridge's failure taxonomy.
///
/// The HTTP status decides first (401/403 auth, 429 rate limit). Other
/// statuses fall back to the error body's `code` and `type`.
pub fn classify_api_error(error: &Error) -> FailureKind {
    let Error::Api {
        status,
        error_type,
        code,
        ..
    } = error
    else {
        return FailureKind::Unknown;
    };

    match *status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return FailureKind::Auth,
        StatusCode::TOO_MANY_REQUESTS => return FailureKind::RateLimited,
        _ => {}
    }

    let markers = [code.as_deref(), error_type.as_deref()];
    let matches_any =
        |codes: &[&str]| markers.iter().flatten().any(|marker| codes.contains(marker));

    if matches_any(&AUTH_CODES) {
        FailureKind::Auth
    } else if matches_any(&RATE_LIMIT_CODES) {
        FailureKind::RateLimited
    } else {
        FailureKind::Unknown
    }
}

fn to_openai_message(turn: &ConversationTurn) -> Result<ChatCompletionRequestMessage> {
    match turn.role {
        Role::User => {
            let msg = ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Text(
                    turn.content.clone(),
                ))
                .build()?;
            Ok(msg.into())
        }
        Role::Assistant => {
            let msg = ChatCompletionRequestAssistantMessageArgs::default()
                .content(ChatCompletionRequestAssistantMessageContent::Text(
                    turn.content.clone(),
                ))
                .build()?;
            Ok(msg.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{ConversationHistory, Question};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn create_test_config() -> LlmConfig {
        LlmConfig {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: "test-api-key".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            system_prompt: None,
            temperature: 0.1,
            max_tokens: 512,
        }
    }

    #[test]
    fn test_default_system_prompt() {
        let transport = RemoteTransport::new(create_test_config());
        assert_eq!(transport.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(transport.model(), "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_messages_order() {
        let transport = RemoteTransport::new(create_test_config());
        let history = ConversationHistory::bounded(
            vec![
                ConversationTurn::user("Tem vaga para piano?"),
                ConversationTurn::assistant("Sim."),
            ],
            10,
        );
        let request = InferenceRequest::new(Question::parse("E violino?").unwrap(), &history, 3);

        let messages = transport.messages(&request).unwrap();

        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[3], ChatCompletionRequestMessage::User(_)));
    }

    fn rejected(status: u16, error_type: Option<&str>, code: Option<&str>) -> Error {
        Error::Api {
            status: StatusCode::from_u16(status).unwrap(),
            message: "rejected".to_string(),
            error_type: error_type.map(str::to_string),
            code: code.map(str::to_string),
        }
    }

    #[test]
    fn test_endpoint_from_base_url() {
        let mut config = create_test_config();
        config.base_url = "https://api.groq.com/openai/v1/".to_string();
        let transport = RemoteTransport::new(config);
        assert_eq!(
            transport.endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );

        let mut config = create_test_config();
        config.base_url.clear();
        let transport = RemoteTransport::new(config);
        assert_eq!(
            transport.endpoint(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[rstest]
    #[case(401, Some("invalid_request_error"), None, FailureKind::Auth)]
    #[case(403, None, None, FailureKind::Auth)]
    #[case(429, Some("rate_limit"), None, FailureKind::RateLimited)]
    #[case(400, Some("invalid_request_error"), Some("invalid_api_key"), FailureKind::Auth)]
    #[case(400, Some("tokens"), Some("rate_limit_exceeded"), FailureKind::RateLimited)]
    #[case(404, Some("invalid_request_error"), Some("model_not_found"), FailureKind::Unknown)]
    #[case(500, None, None, FailureKind::Unknown)]
    fn test_classify_rejections(
        #[case] status: u16,
        #[case] error_type: Option<&str>,
        #[case] code: Option<&str>,
        #[case] expected: FailureKind,
    ) {
        assert_eq!(
            classify_api_error(&rejected(status, error_type, code)),
            expected
        );
    }

    #[test]
    fn test_api_error_parses_envelope() {
        let body = json!({
            "error": {
                "message": "Unauthorized",
                "type": "invalid_request_error",
                "code": null
            }
        })
        .to_string();

        let err = api_error(StatusCode::UNAUTHORIZED, &body);
        assert!(matches!(
            &err,
            Error::Api { message, code: None, .. } if message == "Unauthorized"
        ));

        let err = api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn test_non_api_errors_are_unknown() {
        assert_eq!(
            classify_api_error(&Error::validation("bad")),
            FailureKind::Unknown
        );
    }
}
