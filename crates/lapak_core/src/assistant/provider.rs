//! Chat completion seam. Concrete network clients live outside core.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Prompt sent to a provider: fixed instructions, tenant context and the
/// staff member's question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub system: String,
    pub context: String,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub answer: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    Unavailable(String),
    Rejected(String),
    InvalidResponse(String),
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "assistant provider unavailable: {message}"),
            Self::Rejected(message) => write!(f, "assistant provider rejected request: {message}"),
            Self::InvalidResponse(message) => {
                write!(f, "assistant provider returned invalid response: {message}")
            }
        }
    }
}

impl Error for ProviderError {}

/// Language-model backend used by the assistant.
pub trait ChatProvider {
    fn complete(&self, request: &ChatRequest) -> Result<ChatReply, ProviderError>;
}

impl<P: ChatProvider + ?Sized> ChatProvider for &P {
    fn complete(&self, request: &ChatRequest) -> Result<ChatReply, ProviderError> {
        (**self).complete(request)
    }
}

impl<P: ChatProvider + ?Sized> ChatProvider for Box<P> {
    fn complete(&self, request: &ChatRequest) -> Result<ChatReply, ProviderError> {
        (**self).complete(request)
    }
}
