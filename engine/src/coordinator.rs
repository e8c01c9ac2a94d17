//! Migration coordination: version check, backup, step chain, swap, cleanup.
//!
//! [`Migrator::migrate`] drives one live store through the state machine
//!
//! ```text
//! Idle -> CheckingVersion -> NotNeeded
//!                         -> Needed -> BackingUp -> Migrating(1..N) -> Swapping
//!                                   -> CleaningUp -> Done
//!         any failure after BackingUp -> RollingBack -> Failed
//! ```
//!
//! The live store location changes only in `Swapping`, through the
//! backend's replace primitive. A failure after the backup exists restores
//! it onto the live location before the error is returned.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use store_ladder_core::StoreHandle;
use tracing::{debug, error, info, warn};

use crate::backend::StoreBackend;
use crate::catalog::VersionCatalog;
use crate::error::{MigrationError, MigrationWarning, Result};
use crate::executor::MigrationExecutor;
use crate::fs::{append_suffix, copy_and_overwrite, remove_file_if_exists};
use crate::resolver::TransformationResolver;
use crate::source::MappingSource;
use crate::steps::{MigrationStep, StepBuilder};

/// Suffix of the pre-migration backup, appended to the live store path.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Coordinator states, recorded in order in [`MigrationReport::transitions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// Nothing has run yet.
    Idle,
    /// Reading the store's metadata and matching it to a catalog version.
    CheckingVersion,
    /// The store is missing or already at the latest version.
    NotNeeded,
    /// The store is older than the latest version.
    Needed,
    /// Copying the live store to its backup.
    BackingUp,
    /// Running one step of the chain.
    Migrating {
        /// 1-based step index.
        step: usize,
        /// Chain length.
        of: usize,
    },
    /// Moving the final output over the live store.
    Swapping,
    /// Removing the backup.
    CleaningUp,
    /// The store is at the latest version.
    Done,
    /// Restoring the live store from the backup.
    RollingBack,
    /// The migration stopped with an error.
    Failed,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationState::Idle => f.write_str("idle"),
            MigrationState::CheckingVersion => f.write_str("checking version"),
            MigrationState::NotNeeded => f.write_str("not needed"),
            MigrationState::Needed => f.write_str("needed"),
            MigrationState::BackingUp => f.write_str("backing up"),
            MigrationState::Migrating { step, of } => write!(f, "migrating step {step} of {of}"),
            MigrationState::Swapping => f.write_str("swapping"),
            MigrationState::CleaningUp => f.write_str("cleaning up"),
            MigrationState::Done => f.write_str("done"),
            MigrationState::RollingBack => f.write_str("rolling back"),
            MigrationState::Failed => f.write_str("failed"),
        }
    }
}

/// Result of comparing the live store against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCheck {
    /// No store, or no readable metadata, at the live location.
    NoStore,
    /// The store kind is never migrated.
    NotMigratable,
    /// The store is at the given version, which is the latest or newer.
    UpToDate(u32),
    /// The store is older than the latest version.
    Needed {
        /// Detected version.
        current: u32,
        /// Latest catalog version.
        latest: u32,
    },
}

impl VersionCheck {
    /// Returns `true` for [`VersionCheck::Needed`].
    pub fn is_needed(&self) -> bool {
        matches!(self, VersionCheck::Needed { .. })
    }
}

impl fmt::Display for VersionCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionCheck::NoStore => f.write_str("no store"),
            VersionCheck::NotMigratable => f.write_str("store type is not migratable"),
            VersionCheck::UpToDate(version) => write!(f, "up to date at version {version}"),
            VersionCheck::Needed { current, latest } => {
                write!(f, "migration needed from version {current} to {latest}")
            }
        }
    }
}

/// One executed step.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Source version number.
    pub from: u32,
    /// Destination version number.
    pub to: u32,
    /// Intermediate the step wrote.
    pub output: PathBuf,
    /// Time spent in the backend.
    pub duration_ms: u64,
}

/// Summary of a successful migration.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    /// Version the store was detected at.
    pub from_version: u32,
    /// Version the store now has.
    pub to_version: u32,
    /// Executed steps, in order.
    pub steps: Vec<StepReport>,
    /// Superseded intermediates destroyed before the swap.
    pub intermediates_destroyed: usize,
    /// Backup location used during the run.
    pub backup_path: PathBuf,
    /// Every state entered, in order.
    pub transitions: Vec<MigrationState>,
    /// Non-fatal problems encountered.
    pub warnings: Vec<MigrationWarning>,
    /// RFC 3339 start time.
    pub started_at: String,
    /// RFC 3339 end time.
    pub finished_at: String,
    /// Total wall-clock time.
    pub duration_ms: u64,
}

/// What [`Migrator::migrate`] did.
#[derive(Debug, Clone)]
pub enum MigrationOutcome {
    /// Nothing was touched.
    NotNeeded(VersionCheck),
    /// The live store was replaced by a migrated one.
    Migrated(MigrationReport),
}

impl MigrationOutcome {
    /// Returns `true` if the store was migrated.
    pub fn is_migrated(&self) -> bool {
        matches!(self, MigrationOutcome::Migrated(_))
    }
}

/// Progressive migration of one live store.
///
/// # Examples
///
/// ```no_run
/// # use store_ladder_core::StoreHandle;
/// # use store_ladder_engine::*;
/// # fn run<B: StoreBackend>(backend: B, source: MemorySource) -> Result<()> {
/// let catalog = VersionCatalog::load(&source, "Notes", None)?;
/// let migrator = Migrator::new(
///     StoreHandle::sqlite("data/Notes.sqlite"),
///     catalog,
///     TransformationResolver::new(source).with_namespace("notes-app"),
///     backend,
/// );
/// if let MigrationOutcome::Migrated(report) = migrator.migrate()? {
///     println!("migrated to version {}", report.to_version);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Migrator<M, B> {
    store: StoreHandle,
    catalog: VersionCatalog,
    resolver: TransformationResolver<M>,
    backend: B,
    executor: MigrationExecutor,
}

impl<M: MappingSource, B: StoreBackend> Migrator<M, B> {
    /// Creates a migrator for the live store at `store`.
    pub fn new(
        store: StoreHandle,
        catalog: VersionCatalog,
        resolver: TransformationResolver<M>,
        backend: B,
    ) -> Self {
        Self {
            store,
            catalog,
            resolver,
            backend,
            executor: MigrationExecutor::default(),
        }
    }

    /// Replaces the step executor (scratch directory and policies).
    pub fn with_executor(mut self, executor: MigrationExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Live store handle.
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Version catalog.
    pub fn catalog(&self) -> &VersionCatalog {
        &self.catalog
    }

    /// Store backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Location of the pre-migration backup.
    pub fn backup_path(&self) -> PathBuf {
        append_suffix(self.store.path(), BACKUP_SUFFIX)
    }

    /// Compares the live store against the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::UnknownStoreFormat`] when the store has
    /// metadata that no catalog version matches.
    pub fn check(&self) -> Result<VersionCheck> {
        if !self.store.store_type().is_migratable() {
            return Ok(VersionCheck::NotMigratable);
        }

        let metadata =
            self.backend
                .metadata(&self.store)
                .map_err(|source| MigrationError::Metadata {
                    path: self.store.path().to_path_buf(),
                    source,
                })?;
        let Some(metadata) = metadata else {
            return Ok(VersionCheck::NoStore);
        };

        let current = self.catalog.compatible_version(&metadata).ok_or_else(|| {
            MigrationError::UnknownStoreFormat {
                path: self.store.path().to_path_buf(),
            }
        })?;
        let latest = self.catalog.latest_version();

        if current >= latest {
            Ok(VersionCheck::UpToDate(current.number()))
        } else {
            Ok(VersionCheck::Needed {
                current: current.number(),
                latest: latest.number(),
            })
        }
    }

    /// Returns `true` if the live store is older than the latest version.
    pub fn requires_migration(&self) -> Result<bool> {
        Ok(self.check()?.is_needed())
    }

    /// Builds the step chain `migrate` would run, without touching any file.
    pub fn plan(&self) -> Result<Vec<MigrationStep>> {
        match self.check()? {
            VersionCheck::Needed { current, latest } => self.build_steps(current, latest),
            _ => Ok(Vec::new()),
        }
    }

    fn build_steps(&self, current: u32, latest: u32) -> Result<Vec<MigrationStep>> {
        let (Some(from), Some(to)) = (self.catalog.version(current), self.catalog.version(latest))
        else {
            return Err(MigrationError::InvalidCatalog(format!(
                "versions {current} and {latest} are not both in the catalog"
            )));
        };
        StepBuilder::new(&self.catalog, &self.resolver).build_steps(from, to)
    }

    /// Migrates the live store to the latest version if it is older.
    ///
    /// # Errors
    ///
    /// Every error is fatal. Errors raised before the backup exists leave
    /// the live store untouched; later ones restore the backup first.
    pub fn migrate(&self) -> Result<MigrationOutcome> {
        let started = Instant::now();
        let started_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut run = Run::default();

        run.enter(MigrationState::Idle);
        run.enter(MigrationState::CheckingVersion);
        let check = self.check()?;
        let (current, latest) = match check {
            VersionCheck::Needed { current, latest } => (current, latest),
            other => {
                run.enter(MigrationState::NotNeeded);
                info!(store = %self.store.path().display(), "{other}");
                return Ok(MigrationOutcome::NotNeeded(other));
            }
        };
        run.enter(MigrationState::Needed);
        info!(
            store = %self.store.path().display(),
            from = current,
            to = latest,
            "store requires migration"
        );

        let steps = self.build_steps(current, latest)?;

        if let Some(version) = self.catalog.version(current) {
            self.backend
                .checkpoint(&self.store, version.model())
                .map_err(|source| MigrationError::Checkpoint {
                    path: self.store.path().to_path_buf(),
                    source,
                })?;
            debug!(store = %self.store.path().display(), "journal flushed");
        }

        run.enter(MigrationState::BackingUp);
        let backup = self.backup_path();
        copy_and_overwrite(self.store.path(), &backup).map_err(|source| MigrationError::Backup {
            path: self.store.path().to_path_buf(),
            backup: backup.clone(),
            source,
        })?;
        debug!(backup = %backup.display(), "backup written");

        let final_store = match self.run_steps(&steps, &mut run) {
            Ok(store) => store,
            Err(err) => return Err(self.roll_back(err, &backup, &mut run)),
        };

        run.enter(MigrationState::Swapping);
        if let Err(source) = self.backend.replace_store(&self.store, &final_store) {
            self.destroy_quietly(&final_store);
            let err = MigrationError::Swap {
                path: self.store.path().to_path_buf(),
                source,
            };
            return Err(self.roll_back(err, &backup, &mut run));
        }
        if final_store.path() != self.store.path() {
            if let Err(err) = self.backend.destroy_store(&final_store) {
                run.warn(MigrationWarning::IntermediateCleanup {
                    path: final_store.path().to_path_buf(),
                    message: err.to_string(),
                });
            }
        }

        run.enter(MigrationState::CleaningUp);
        if let Err(err) = remove_file_if_exists(&backup) {
            run.warn(MigrationWarning::BackupCleanup {
                path: backup.clone(),
                message: err.to_string(),
            });
        }

        run.enter(MigrationState::Done);
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            store = %self.store.path().display(),
            from = current,
            to = latest,
            steps = run.steps.len(),
            duration_ms,
            "migration complete"
        );

        Ok(MigrationOutcome::Migrated(MigrationReport {
            from_version: current,
            to_version: latest,
            steps: run.steps,
            intermediates_destroyed: run.intermediates_destroyed,
            backup_path: backup,
            transitions: run.transitions,
            warnings: run.warnings,
            started_at,
            finished_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            duration_ms,
        }))
    }

    /// Executes every step, threading each output into the next step.
    ///
    /// Returns the final output. On failure, the failed step's output and
    /// the current intermediate are destroyed; the live store never is.
    fn run_steps(&self, steps: &[MigrationStep], run: &mut Run) -> Result<StoreHandle> {
        let mut current = self.store.clone();

        for (index, step) in steps.iter().enumerate() {
            run.enter(MigrationState::Migrating {
                step: index + 1,
                of: steps.len(),
            });

            let output = match self.executor.execute(&self.backend, step, &current) {
                Ok(output) => output,
                Err(err) => {
                    if let MigrationError::Step { output, .. } = &err {
                        self.destroy_quietly(&current.with_path(output));
                    }
                    if current != self.store {
                        self.destroy_quietly(&current);
                    }
                    return Err(err);
                }
            };

            if current != self.store {
                match self.backend.destroy_store(&current) {
                    Ok(()) => run.intermediates_destroyed += 1,
                    Err(err) => run.warn(MigrationWarning::IntermediateCleanup {
                        path: current.path().to_path_buf(),
                        message: err.to_string(),
                    }),
                }
            }

            run.steps.push(StepReport {
                from: step.source_version().number(),
                to: step.destination_version().number(),
                output: output.store.path().to_path_buf(),
                duration_ms: output.duration_ms,
            });
            current = output.store;
        }

        Ok(current)
    }

    fn roll_back(&self, cause: MigrationError, backup: &Path, run: &mut Run) -> MigrationError {
        run.enter(MigrationState::RollingBack);
        error!(
            store = %self.store.path().display(),
            error = %cause,
            "migration failed, restoring backup"
        );

        let backup_store = self.store.with_path(backup);
        let result = self.backend.replace_store(&self.store, &backup_store);
        run.enter(MigrationState::Failed);

        match result {
            Ok(()) => {
                info!(store = %self.store.path().display(), "backup restored");
                cause
            }
            Err(restore) => {
                error!(backup = %backup.display(), error = %restore, "failed to restore backup");
                MigrationError::RestoreFailed {
                    cause: Box::new(cause),
                    backup: backup.to_path_buf(),
                    restore,
                }
            }
        }
    }

    fn destroy_quietly(&self, store: &StoreHandle) {
        if let Err(err) = self.backend.destroy_store(store) {
            warn!(
                path = %store.path().display(),
                error = %err,
                "failed to destroy intermediate store"
            );
        }
    }
}

#[derive(Default)]
struct Run {
    transitions: Vec<MigrationState>,
    steps: Vec<StepReport>,
    warnings: Vec<MigrationWarning>,
    intermediates_destroyed: usize,
}

impl Run {
    fn enter(&mut self, state: MigrationState) {
        debug!(state = %state, "migration state");
        self.transitions.push(state);
    }

    fn warn(&mut self, warning: MigrationWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_check_display() {
        assert_eq!(
            VersionCheck::Needed {
                current: 1,
                latest: 3
            }
            .to_string(),
            "migration needed from version 1 to 3"
        );
        assert!(!VersionCheck::UpToDate(3).is_needed());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            MigrationState::Migrating { step: 2, of: 3 }.to_string(),
            "migrating step 2 of 3"
        );
    }
}
