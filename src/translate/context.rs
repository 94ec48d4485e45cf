//! Run-wide state shared by every file of a translation run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::pipeline::PipelineError;

#[derive(Debug)]
pub struct RunContext {
    started: Instant,
    max_runtime: Option<Duration>,
    interrupted: Arc<AtomicBool>,
    pub chars_translated: usize,
    pub chars_cached: usize,
}

impl RunContext {
    /// `max_runtime_secs == 0` means no budget.
    pub fn new(max_runtime_secs: u64) -> Self {
        Self {
            started: Instant::now(),
            max_runtime: (max_runtime_secs > 0).then(|| Duration::from_secs(max_runtime_secs)),
            interrupted: Arc::new(AtomicBool::new(false)),
            chars_translated: 0,
            chars_cached: 0,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Flag raised by the Ctrl-C listener.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Checked before every call to the translation service.
    pub fn check_budget(&self) -> Result<(), PipelineError> {
        if self.is_interrupted() {
            return Err(PipelineError::Interrupted);
        }

        let elapsed = self.elapsed();
        match self.max_runtime {
            Some(limit) if elapsed > limit => Err(PipelineError::MaxRuntimeExceeded {
                elapsed_secs: elapsed.as_secs(),
                limit_secs: limit.as_secs(),
            }),
            Some(limit) => {
                tracing::debug!("Running for {}s/{}s", elapsed.as_secs(), limit.as_secs());
                Ok(())
            }
            None => Ok(()),
        }
    }
}
