//! Chat-completions request and response types.

use serde::{Deserialize, Serialize};

/// Request body for the chat completions endpoint.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    pub stream: bool,
}

/// Requested output format.
#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            format_type: "json_object".to_string(),
        }
    }
}

/// A single chat message.
#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(content: MessageContent) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

/// Plain text or multi-part message content.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One part of a multi-part user message.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    File { file: FileData },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct FileData {
    pub filename: String,
    /// `data:{mime};base64,{...}`
    pub file_data: String,
}

/// Response from the chat completions endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Error body returned by OpenAI-compatible APIs.
#[derive(Debug, Deserialize)]
pub struct ProviderErrorResponse {
    pub error: ProviderError,
}

#[derive(Debug, Deserialize)]
pub struct ProviderError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_multipart_message_shape() {
        let message = ChatMessage::user(MessageContent::Parts(vec![
            ContentPart::Text {
                text: "Extract".to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "data:image/png;base64,AAAA".to_string(),
                },
            },
        ]));
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "Extract"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
                ]
            })
        );
    }

    #[test]
    fn test_request_includes_json_mode() {
        let request = ChatCompletionRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage::system("s")],
            temperature: Some(0.0),
            response_format: Some(ResponseFormat::json_object()),
            stream: false,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"], json!({"type": "json_object"}));
        assert_eq!(value["messages"][0]["content"], json!("s"));
    }

    #[test]
    fn test_response_tolerates_missing_content() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant"}}]
        }))
        .unwrap();
        assert!(response.choices[0].message.content.is_none());
    }
}
