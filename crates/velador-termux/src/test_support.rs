//! Recording command runner for unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use velador_core::{CommandOutput, CommandRunner, ToolError, ToolResult, command_line};

/// Answers by program name; unknown programs succeed with empty output.
#[derive(Default)]
pub struct RecordingRunner {
    responses: Mutex<HashMap<String, Option<CommandOutput>>>,
    calls: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, program: &str, output: CommandOutput) {
        self.responses.lock().insert(program.to_string(), Some(output));
    }

    pub fn missing(&self, program: &str) {
        self.responses.lock().insert(program.to_string(), None);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn output(&self, program: &str, args: &[&str]) -> ToolResult<CommandOutput> {
        self.calls.lock().push(command_line(program, args));
        match self.responses.lock().get(program) {
            Some(Some(output)) => Ok(output.clone()),
            Some(None) => Err(ToolError::Missing {
                program: program.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
            None => Ok(CommandOutput::ok("")),
        }
    }
}
