// Job handlers keyed by kind

use crate::application::retry::RetryPolicy;
use crate::domain::{JobKind, ScheduledJob};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Work performed when a job fires.
///
/// Handlers must tolerate being invoked more than once for the same job:
/// a crash between the side effect and the state write re-fires it.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &ScheduledJob) -> Result<()>;
}

/// A handler together with the retry policy for its kind
#[derive(Clone)]
pub struct Registration {
    pub handler: Arc<dyn JobHandler>,
    pub retry: RetryPolicy,
}

/// Immutable after the scheduler is built
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobKind, Registration>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `kind`
    pub fn register(
        mut self,
        kind: JobKind,
        handler: Arc<dyn JobHandler>,
        retry: RetryPolicy,
    ) -> Self {
        self.handlers.insert(kind, Registration { handler, retry });
        self
    }

    pub fn get(&self, kind: JobKind) -> Option<&Registration> {
        self.handlers.get(&kind)
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// Scripted handler: pops one outcome per call, succeeds once the script runs out
    #[derive(Default)]
    pub struct ScriptedHandler {
        script: Mutex<Vec<Outcome>>,
        calls: Mutex<Vec<String>>,
    }

    #[derive(Debug, Clone, Copy)]
    pub enum Outcome {
        Ok,
        Fail,
        Panic,
    }

    impl ScriptedHandler {
        pub fn new(script: Vec<Outcome>) -> Self {
            let mut script = script;
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Job ids in call order
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobHandler for ScriptedHandler {
        async fn handle(&self, job: &ScheduledJob) -> Result<()> {
            self.calls.lock().unwrap().push(job.id.clone());
            let next = self.script.lock().unwrap().pop().unwrap_or(Outcome::Ok);
            match next {
                Outcome::Ok => Ok(()),
                Outcome::Fail => Err(AppError::HandlerFailure(format!(
                    "scripted failure for {}",
                    job.id
                ))),
                Outcome::Panic => panic!("scripted panic for {}", job.id),
            }
        }
    }
}
