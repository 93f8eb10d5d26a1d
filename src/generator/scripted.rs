//! Scripted generator that replays canned responses.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{GenerationRequest, Generator, GeneratorError, ProducedReport};

/// One scripted generator response
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Report these raw paths
    Reports(Vec<String>),
    /// Fail with this message
    Fail(String),
    /// Sleep before reporting nothing; used to exercise timeouts
    Stall(Duration),
}

impl ScriptStep {
    pub fn reports<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptStep::Reports(paths.into_iter().map(Into::into).collect())
    }
}

/// Generator that returns one scripted step per call.
///
/// Once the script runs out every call reports nothing. Every request is
/// recorded so tests can assert on what the loop asked for.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<ScriptStep>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Generator that reports nothing on every call
    pub fn silent() -> Self {
        Self::default()
    }

    /// Requests received so far, in call order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Steps not yet consumed
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ProducedReport>, GeneratorError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let step = self.script.lock().unwrap_or_else(|e| e.into_inner()).pop_front();

        match step {
            Some(ScriptStep::Reports(paths)) => Ok(paths
                .into_iter()
                .map(|p| ProducedReport::new(p, request.iteration))
                .collect()),
            Some(ScriptStep::Fail(message)) => Err(GeneratorError::Failed(message)),
            Some(ScriptStep::Stall(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }
}
