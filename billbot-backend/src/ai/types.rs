use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Detail level requested for an image content part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    #[default]
    High,
    Auto,
}

/// One unit of multi-modal input for the agent.
///
/// Serialized in the Responses API input format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "input_text")]
    Text { text: String },
    #[serde(rename = "input_image")]
    Image { file_id: String, detail: ImageDetail },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(file_id: impl Into<String>) -> Self {
        ContentPart::Image {
            file_id: file_id.into(),
            detail: ImageDetail::High,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ContentPart::Image { .. })
    }
}

/// A single user-authored message wrapping every content part of one turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

impl InputMessage {
    pub fn user(content: Vec<ContentPart>) -> Self {
        InputMessage {
            role: "user".to_string(),
            content,
        }
    }
}

/// Whether and which tool the agent may call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Agent decides whether/which tool to call
    #[default]
    Auto,
    Required,
    None,
}

/// Fixed agent configuration for a workflow invocation
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub tool_choice: ToolChoice,
}

/// Everything the runtime needs for one invocation
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub config: AgentConfig,
    pub input: Vec<InputMessage>,
    pub max_turns: u32,
    /// Forwarded to the accounting tool so bills land on the sender's ledger
    pub user_id: String,
}

/// Raw result of one agent invocation.
///
/// `trace` holds the runtime's tool-call items exactly as returned; their
/// shape is not fixed and is only interpreted by the chart extractor.
#[derive(Debug, Clone, Default)]
pub struct AgentRun {
    pub final_output: Option<String>,
    pub trace: Vec<Value>,
}

/// Chart image surfaced from the accounting summary tool.
///
/// Exactly one of `base64_data` / `image_url` has to be usable for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartImage {
    pub file_name: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl ChartImage {
    pub fn has_base64(&self) -> bool {
        self.base64_data.as_deref().is_some_and(|d| !d.trim().is_empty())
    }

    pub fn has_url(&self) -> bool {
        self.image_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// Normalized outcome of a workflow run
#[derive(Debug, Clone, Default)]
pub struct WorkflowResult {
    pub output_text: String,
    pub images: Vec<ChartImage>,
}
