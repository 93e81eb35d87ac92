//! Scripted agent runtime for tests.

use crate::ai::runtime::AgentRuntime;
use crate::ai::types::{AgentRequest, AgentRun};
use crate::error::BotError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Returns pre-configured run results in order and records every call.
///
/// Uploads are answered with sequential handles `file-1`, `file-2`, ...
pub struct MockAiRuntime {
    configured: bool,
    fail_uploads: bool,
    results: Mutex<VecDeque<Result<AgentRun, BotError>>>,
    uploads: Mutex<Vec<RecordedUpload>>,
    requests: Mutex<Vec<AgentRequest>>,
}

impl MockAiRuntime {
    pub fn new(results: Vec<Result<AgentRun, BotError>>) -> Self {
        Self {
            configured: true,
            fail_uploads: false,
            results: Mutex::new(results.into()),
            uploads: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Shorthand for a single successful run with the given answer and trace.
    pub fn answering(text: &str, trace: Vec<serde_json::Value>) -> Self {
        Self::new(vec![Ok(AgentRun {
            final_output: Some(text.to_string()),
            trace,
        })])
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentRuntime for MockAiRuntime {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String, BotError> {
        if self.fail_uploads {
            return Err(BotError::Agent("mock upload failure".to_string()));
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(RecordedUpload {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
        });
        Ok(format!("file-{}", uploads.len()))
    }

    async fn run(&self, request: AgentRequest) -> Result<AgentRun, BotError> {
        self.requests.lock().unwrap().push(request);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BotError::Agent("mock runtime has no scripted result".to_string())))
    }
}
