//! OpenAI-compatible extraction service.
//!
//! Works with any endpoint speaking the chat-completions protocol with
//! JSON-mode output: OpenAI, Azure OpenAI, Ollama in compatibility mode,
//! vLLM, LM Studio.
//!
//! Documents are sent according to their content type:
//! - text is inlined into the user prompt (truncated)
//! - images travel as `image_url` parts with a base64 data URL
//! - everything else (PDF, office files) travels as a `file` part

mod backend;
mod error;
mod types;

pub use backend::LlmExtractionService;
pub use error::{to_extraction_error, ProviderErrorCode};
pub use types::*;
