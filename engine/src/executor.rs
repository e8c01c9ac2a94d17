//! Runs a single migration step into a fresh intermediate store.

use std::path::{Path, PathBuf};
use std::time::Instant;

use store_ladder_core::{PolicyRegistry, StoreHandle};
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::StoreBackend;
use crate::error::{MigrationError, Result};
use crate::fs::create_dir_if_missing;
use crate::steps::MigrationStep;

/// Default scratch directory under the system temp directory.
pub fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("store-ladder")
}

/// Output of one executed step.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Intermediate store written by the step.
    pub store: StoreHandle,
    /// Wall-clock time spent in the backend.
    pub duration_ms: u64,
}

/// Applies migration steps, each into a uniquely named scratch store.
#[derive(Debug, Clone)]
pub struct MigrationExecutor {
    scratch_dir: PathBuf,
    policies: PolicyRegistry,
}

impl Default for MigrationExecutor {
    fn default() -> Self {
        Self::new(default_scratch_dir())
    }
}

impl MigrationExecutor {
    /// Creates an executor writing intermediates into `scratch_dir`.
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            policies: PolicyRegistry::new(),
        }
    }

    /// Sets the registry that custom policy names resolve against.
    pub fn with_policies(mut self, policies: PolicyRegistry) -> Self {
        self.policies = policies;
        self
    }

    /// Directory intermediates are written to.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Registered policies.
    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    /// Returns a fresh, collision-free output location for `input`.
    pub fn output_for(&self, input: &StoreHandle) -> StoreHandle {
        let mut name = Uuid::new_v4().to_string();
        if let Some(ext) = input.path().extension() {
            name.push('.');
            name.push_str(&ext.to_string_lossy());
        }
        input.with_path(self.scratch_dir.join(name))
    }

    /// Runs `step` with `input` as the source store.
    ///
    /// `input` is never modified. On failure the partially written output
    /// is left for the caller to destroy; its location is carried in
    /// [`MigrationError::Step`].
    pub fn execute<B: StoreBackend>(
        &self,
        backend: &B,
        step: &MigrationStep,
        input: &StoreHandle,
    ) -> Result<StepOutput> {
        create_dir_if_missing(&self.scratch_dir).map_err(|source| MigrationError::Scratch {
            path: self.scratch_dir.clone(),
            source,
        })?;

        let output = self.output_for(input);
        let from = step.source_version().number();
        let to = step.destination_version().number();
        debug!(
            from,
            to,
            input = %input.path().display(),
            output = %output.path().display(),
            "executing migration step"
        );

        let started = Instant::now();
        backend
            .transform(step, input, &output, &self.policies)
            .map_err(|source| MigrationError::Step {
                from,
                to,
                output: output.path().to_path_buf(),
                source,
            })?;
        let duration_ms = started.elapsed().as_millis() as u64;

        info!(from, to, duration_ms, "migration step complete");
        Ok(StepOutput {
            store: output,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_names_are_unique_and_keep_extension() {
        let executor = MigrationExecutor::new("/scratch");
        let input = StoreHandle::sqlite("/data/Notes.sqlite");

        let a = executor.output_for(&input);
        let b = executor.output_for(&input);

        assert_ne!(a.path(), b.path());
        assert_eq!(a.path().parent(), Some(Path::new("/scratch")));
        assert_eq!(a.path().extension().and_then(|e| e.to_str()), Some("sqlite"));
        assert_eq!(a.store_type(), input.store_type());
    }
}
