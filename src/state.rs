//! Process-wide readiness flags and the single-training guard.

use crate::error::{Result, TelemetryError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Flags shared by the engine, its training worker and health checks.
#[derive(Debug, Default)]
pub struct ProcessState {
    models_loaded: AtomicBool,
    training_in_progress: AtomicBool,
}

/// Point-in-time view of [`ProcessState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub models_loaded: bool,
    pub training_in_progress: bool,
}

impl ProcessState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the training slot.
    ///
    /// Fails with `TrainingInProgress` while another guard is alive; the
    /// request is not queued.
    pub fn try_begin_training(self: &Arc<Self>) -> Result<TrainingGuard> {
        match self.training_in_progress.compare_exchange(
            false,
            true,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(TrainingGuard {
                state: Arc::clone(self),
            }),
            Err(_) => {
                warn!("training request rejected: a run is already active");
                Err(TelemetryError::TrainingInProgress)
            }
        }
    }

    pub fn is_training(&self) -> bool {
        self.training_in_progress.load(Ordering::Acquire)
    }

    pub fn mark_models_loaded(&self) {
        self.models_loaded.store(true, Ordering::Release);
    }

    pub fn models_loaded(&self) -> bool {
        self.models_loaded.load(Ordering::Acquire)
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            models_loaded: self.models_loaded(),
            training_in_progress: self.is_training(),
        }
    }
}

/// Holds the training slot; releases it when dropped, including on panic.
#[derive(Debug)]
pub struct TrainingGuard {
    state: Arc<ProcessState>,
}

impl Drop for TrainingGuard {
    fn drop(&mut self) {
        self.state.training_in_progress.store(false, Ordering::Release);
    }
}
