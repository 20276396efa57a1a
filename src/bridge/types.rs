use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated question. The stored text is always trimmed and at least
/// [`Question::MIN_CHARS`] characters long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    pub const MIN_CHARS: usize = 2;

    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.chars().count() < Self::MIN_CHARS {
            return Err(Error::validation(format!(
                "question must have at least {} characters",
                Self::MIN_CHARS
            )));
        }
        if has_control_chars(trimmed) {
            return Err(Error::validation(
                "question must not contain control characters",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Line breaks and tabs are ordinary text; NUL in particular cannot be passed
// as a process argument.
fn has_control_chars(text: &str) -> bool {
    text.chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "usuario", alias = "usuário")]
    User,
    #[serde(alias = "assistente")]
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    #[serde(alias = "conteudo", alias = "text")]
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if has_control_chars(&self.content) {
            return Err(Error::validation(
                "history must not contain control characters",
            ));
        }
        Ok(())
    }
}

/// Prior turns of a conversation, capped to the most recent `limit` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    /// Keeps only the last `limit` turns, preserving their order.
    pub fn bounded(mut turns: Vec<ConversationTurn>, limit: usize) -> Self {
        if turns.len() > limit {
            turns.drain(..turns.len() - limit);
        }
        Self { turns }
    }

    /// The trailing `n` turns, oldest first.
    pub fn last(&self, n: usize) -> &[ConversationTurn] {
        &self.turns[self.turns.len().saturating_sub(n)..]
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

}

/// What the transport receives: the question plus the trailing context turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRequest {
    question: Question,
    context: Vec<ConversationTurn>,
}

impl InferenceRequest {
    pub fn new(question: Question, history: &ConversationHistory, context_turns: usize) -> Self {
        Self {
            question,
            context: history.last(context_turns).to_vec(),
        }
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn context(&self) -> &[ConversationTurn] {
        &self.context
    }

    /// Flattens context and question into a single annotated prompt for
    /// transports that only take positional text.
    pub fn prompt(&self) -> String {
        if self.context.is_empty() {
            return self.question.as_str().to_string();
        }

        let mut prompt = String::new();
        for turn in &self.context {
            match turn.role {
                Role::User => prompt.push_str("Usuário perguntou: "),
                Role::Assistant => prompt.push_str("Assistente respondeu: "),
            }
            prompt.push_str(&turn.content);
            prompt.push('\n');
        }
        prompt.push_str("\nNova pergunta do usuário: ");
        prompt.push_str(self.question.as_str());
        prompt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    #[serde(rename = "ValidationError")]
    Validation,
    #[serde(rename = "SpawnError")]
    Spawn,
    #[serde(rename = "ProcessError")]
    Process,
    Timeout,
    #[serde(rename = "AuthError")]
    Auth,
    RateLimited,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::Spawn => "SpawnError",
            Self::Process => "ProcessError",
            Self::Timeout => "Timeout",
            Self::Auth => "AuthError",
            Self::RateLimited => "RateLimited",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceResult {
    Success {
        text: String,
        token_usage: Option<TokenUsage>,
    },
    Failure {
        kind: FailureKind,
        detail: Option<String>,
    },
}

impl InferenceResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self::Success {
            text: text.into(),
            token_usage: None,
        }
    }

    pub fn success_with_usage(text: impl Into<String>, usage: Option<TokenUsage>) -> Self {
        Self::Success {
            text: text.into(),
            token_usage: usage,
        }
    }

    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}
