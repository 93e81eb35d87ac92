pub mod charts;
pub mod content;
#[cfg(test)]
pub mod mock;
pub mod openai;
pub mod runtime;
pub mod types;
pub mod workflow;

pub use content::ContentPartBuilder;
#[cfg(test)]
pub use mock::MockAiRuntime;
pub use openai::OpenAiAgentRuntime;
pub use runtime::AgentRuntime;
#[cfg(test)]
pub use types::ContentPart;
pub use types::WorkflowResult;
pub use workflow::WorkflowRunner;
