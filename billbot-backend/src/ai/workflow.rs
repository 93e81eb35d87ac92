use crate::ai::charts::extract_charts;
use crate::ai::runtime::AgentRuntime;
use crate::ai::types::{
    AgentConfig, AgentRequest, ContentPart, InputMessage, ToolChoice, WorkflowResult,
};
use crate::channels::util::preview;
use crate::config::AgentSettings;
use crate::error::BotError;
use std::sync::Arc;

/// Upper bound on reasoning/tool turns per invocation
pub const MAX_TURNS: u32 = 16;

pub const AGENT_NAME: &str = "记账助手";

/// Non-negotiable operating policy for the bookkeeping agent.
pub const AGENT_DIRECTIVE: &str = "\
你是一个记账助手，负责把用户的文字和图片转换成账单记录，并通过记账工具完成操作。

必须遵守以下规则：
1. 每次处理前，先调用 get_categories 查询可用的分类，再根据分类执行后续操作。
2. 如果用户发送了图片（小票、账单截图、转账记录等），先从图片中识别出每一条账单明细：金额、收支类型、分类和描述。
3. 只有一笔交易时调用 record_bill；有多笔交易时调用 record_multiple_bills 一次性记录。
4. 不要在流程中途向用户提问或要求确认，信息不完整时按最合理的方式推断并直接完成。
5. 金额一律传正数，并且必须明确指定类型：支出为 expense，收入为 income。
6. 最终回复中逐条列出本次记录的每一笔账单及其收支类型。
7. 使用自然的中文纯文本回答，不要使用 Markdown、表格或代码块等任何标记格式。

当用户要求查看报表、对比或趋势时，调用 get_expense_summary 等统计工具，并用简洁的语言总结结果。";

/// Runs one agent invocation for a chat turn and normalizes the result.
pub struct WorkflowRunner {
    runtime: Arc<dyn AgentRuntime>,
    config: AgentConfig,
}

impl WorkflowRunner {
    pub fn new(runtime: Arc<dyn AgentRuntime>, settings: &AgentSettings) -> Self {
        Self {
            runtime,
            config: AgentConfig {
                name: AGENT_NAME.to_string(),
                instructions: AGENT_DIRECTIVE.to_string(),
                model: settings.model.clone(),
                temperature: settings.temperature,
                max_output_tokens: settings.max_output_tokens,
                tool_choice: ToolChoice::Auto,
            },
        }
    }

    pub fn runtime(&self) -> &dyn AgentRuntime {
        self.runtime.as_ref()
    }

    /// Invoke the agent with `parts` as one user message.
    ///
    /// `user_id` identifies whose ledger the accounting tool writes to.
    pub async fn run(
        &self,
        parts: Vec<ContentPart>,
        user_id: &str,
    ) -> Result<WorkflowResult, BotError> {
        if !self.runtime.is_configured() {
            return Err(BotError::Configuration(
                "agent API key is not configured".to_string(),
            ));
        }
        if parts.is_empty() {
            return Err(BotError::InvalidInput(
                "workflow needs at least one content part".to_string(),
            ));
        }

        let image_count = parts.iter().filter(|p| p.is_image()).count();
        log::info!(
            "[WORKFLOW] Running agent for user {} ({} part(s), {} image(s), model {})",
            user_id,
            parts.len(),
            image_count,
            self.config.model
        );

        let request = AgentRequest {
            config: self.config.clone(),
            input: vec![InputMessage::user(parts)],
            max_turns: MAX_TURNS,
            user_id: user_id.to_string(),
        };
        let run = self.runtime.run(request).await?;

        let output_text = run
            .final_output
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(BotError::EmptyResult)?;

        let images = extract_charts(&run.trace);
        log::info!(
            "[WORKFLOW] Agent finished: {} trace item(s), {} chart(s), answer: {}",
            run.trace.len(),
            images.len(),
            preview(&output_text, 200)
        );

        Ok(WorkflowResult {
            output_text,
            images,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockAiRuntime;
    use crate::ai::types::AgentRun;
    use serde_json::json;

    fn runner(runtime: Arc<MockAiRuntime>) -> WorkflowRunner {
        WorkflowRunner::new(runtime, &AgentSettings::default())
    }

    #[test]
    fn test_directive_covers_tool_policy() {
        for needle in ["get_categories", "record_bill", "record_multiple_bills", "expense", "income"] {
            assert!(AGENT_DIRECTIVE.contains(needle), "missing {}", needle);
        }
    }

    #[tokio::test]
    async fn test_run_wraps_parts_in_single_user_message() {
        let runtime = Arc::new(MockAiRuntime::answering("已记录：午餐 100 元（支出）", vec![]));
        let result = runner(runtime.clone())
            .run(vec![ContentPart::image("file-1"), ContentPart::text("午餐100元")], "42")
            .await
            .expect("run");

        assert_eq!(result.output_text, "已记录：午餐 100 元（支出）");
        assert!(result.images.is_empty());

        let requests = runtime.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.max_turns, MAX_TURNS);
        assert_eq!(request.user_id, "42");
        assert_eq!(request.config.tool_choice, ToolChoice::Auto);
        assert_eq!(request.input.len(), 1);
        assert_eq!(request.input[0].role, "user");
        assert_eq!(request.input[0].content.len(), 2);
        assert!(request.input[0].content[0].is_image());
    }

    #[tokio::test]
    async fn test_run_attaches_charts() {
        let trace = vec![json!({
            "type": "mcp_call",
            "name": "get_expense_summary",
            "output": r#"{"charts":{"bar_chart":{"base64_data":"AAAA","title":"T"}}}"#
        })];
        let runtime = Arc::new(MockAiRuntime::answering("本月共支出 300 元", trace));
        let result = runner(runtime)
            .run(vec![ContentPart::text("生成最近开销报表")], "42")
            .await
            .expect("run");
        assert_eq!(result.images.len(), 1);
        assert_eq!(result.images[0].caption.as_deref(), Some("T"));
    }

    #[tokio::test]
    async fn test_unconfigured_runtime_fails_fast() {
        let runtime = Arc::new(MockAiRuntime::answering("unused", vec![]).unconfigured());
        let err = runner(runtime.clone())
            .run(vec![ContentPart::text("hi")], "42")
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Configuration(_)));
        assert!(runtime.requests().is_empty());
    }

    #[tokio::test]
    async fn test_empty_parts_rejected() {
        let runtime = Arc::new(MockAiRuntime::answering("unused", vec![]));
        let err = runner(runtime).run(vec![], "42").await.unwrap_err();
        assert!(matches!(err, BotError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_blank_output_is_empty_result() {
        for output in [None, Some("   ".to_string())] {
            let runtime = Arc::new(MockAiRuntime::new(vec![Ok(AgentRun {
                final_output: output,
                trace: vec![],
            })]));
            let err = runner(runtime)
                .run(vec![ContentPart::text("hi")], "42")
                .await
                .unwrap_err();
            assert!(matches!(err, BotError::EmptyResult));
        }
    }

    #[tokio::test]
    async fn test_runtime_error_propagates() {
        let runtime = Arc::new(MockAiRuntime::new(vec![Err(BotError::Agent("boom".to_string()))]));
        let err = runner(runtime)
            .run(vec![ContentPart::text("hi")], "42")
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Agent(_)));
    }
}
