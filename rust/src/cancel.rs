//! Cooperative cancellation between pipeline stages.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::EngineError;

/// Pipeline stage a request was about to enter when it observed cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Build,
    Analyze,
    Resolve,
    Optimize,
    Portfolio,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Build => "graph build",
            Stage::Analyze => "critical path analysis",
            Stage::Resolve => "resource resolution",
            Stage::Optimize => "timeline optimization",
            Stage::Portfolio => "portfolio scheduling",
        };
        f.write_str(name)
    }
}

/// Cloneable cancellation flag shared between a caller and a running request.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fail with [`EngineError::Cancelled`] if cancellation was requested.
    pub fn check(&self, stage: Stage) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled { stage })
        } else {
            Ok(())
        }
    }
}
