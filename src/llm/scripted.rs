//! In-memory backend for tests: returns queued responses and records calls.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::client::{AnalysisBackend, FileHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Upload {
        path: PathBuf,
        content: String,
        display_name: String,
    },
    Generate {
        system_instruction: String,
        file_name: String,
        user_prompt: String,
    },
    Delete(String),
}

#[derive(Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String>>>,
    fail_upload: bool,
    fail_delete: bool,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, text: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!(message.to_string())));
        self
    }

    pub fn failing_upload(mut self) -> Self {
        self.fail_upload = true;
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn generate_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Generate { .. }))
            .count()
    }
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<FileHandle> {
        let content = tokio::fs::read_to_string(path).await?;
        self.calls.lock().unwrap().push(Call::Upload {
            path: path.to_path_buf(),
            content,
            display_name: display_name.to_string(),
        });
        if self.fail_upload {
            anyhow::bail!("upload rejected");
        }
        Ok(FileHandle {
            uri: "https://files.test/files/scripted".to_string(),
            mime_type: mime_type.to_string(),
            name: "files/scripted".to_string(),
        })
    }

    async fn generate(
        &self,
        system_instruction: &str,
        file: &FileHandle,
        user_prompt: &str,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(Call::Generate {
            system_instruction: system_instruction.to_string(),
            file_name: file.name.clone(),
            user_prompt: user_prompt.to_string(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted response left")))
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Delete(name.to_string()));
        if self.fail_delete {
            anyhow::bail!("delete rejected");
        }
        Ok(())
    }
}
