use crate::ai::types::{AgentRequest, AgentRun};
use crate::error::BotError;
use async_trait::async_trait;

/// The language-model agent runtime, treated as a black box.
///
/// Implementations own tool execution; callers only see the final output and
/// the raw tool-call trace.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Whether the agent credential is present
    fn is_configured(&self) -> bool;

    /// Store a file in the runtime's file store and return its handle
    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String, BotError>;

    /// Run the agent to completion (bounded by `request.max_turns`)
    async fn run(&self, request: AgentRequest) -> Result<AgentRun, BotError>;
}
