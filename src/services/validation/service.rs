//! Validator service.
//!
//! Ties the components together, gates them by mode and keeps the report of
//! the last analyze pass for the cleaning and restoring operations.

use std::sync::Arc;
use std::time::Instant;

use tracing::instrument;

use crate::Result;
use crate::config::ValidatorConfig;
use crate::models::{
    InvalidParentEntry, MissingObjectEntry, Mode, ModeController, RefId, UnboundChildEntry,
    UnboundReferenceEntry, ValidationReport, entries_from_json,
};
use crate::storage::{
    ObjectLifecycle, PermissionProvider, RepositoryGateway, SqliteRepository, TrashPurge,
};

use super::analyzer::Analyzer;
use super::cleaner::Cleaner;
use super::compactor::TreeCompactor;
use super::recovery::RecoveryFolderResolver;
use super::restorer::Restorer;
use super::trash::TrashPurger;
use super::types::{Outcome, RestoreReport, RunSummary};

/// Repository integrity validator.
///
/// Every operation checks its mode first and returns [`Outcome::Skipped`]
/// without touching the repository when that mode is disabled:
///
/// | Mode | Operations |
/// |------|------------|
/// | `analyze` | the four `find_*` scans, [`Self::analyze_all`] |
/// | `clean` | `remove_unbound_*`, [`Self::close_gaps_in_tree`] |
/// | `restore` | `restore_*` |
/// | `empty_trash` | [`Self::empty_trash`] |
///
/// Reports are acted upon without re-validation, so the repository must not
/// be modified by anyone else while a clean or restore pass is running.
pub struct ValidatorService {
    modes: ModeController,
    report: ValidationReport,
    analyzer: Analyzer,
    cleaner: Cleaner,
    resolver: RecoveryFolderResolver,
    restorer: Restorer,
    compactor: TreeCompactor,
    purger: TrashPurger,
}

impl ValidatorService {
    /// Creates a validator over explicit collaborators.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn RepositoryGateway>,
        lifecycle: Arc<dyn ObjectLifecycle>,
        permissions: Arc<dyn PermissionProvider>,
        config: ValidatorConfig,
    ) -> Self {
        let parent_ref_id = config.recovery_parent_ref_id();
        let ValidatorConfig {
            root_ref_id,
            recovery_folder,
            object_types,
            modes,
            ..
        } = config;

        Self {
            modes,
            report: ValidationReport::default(),
            analyzer: Analyzer::new(Arc::clone(&gateway), object_types.rbac.clone()),
            cleaner: Cleaner::new(Arc::clone(&gateway)),
            resolver: RecoveryFolderResolver::new(
                Arc::clone(&gateway),
                Arc::clone(&lifecycle),
                recovery_folder,
                object_types.container.clone(),
                parent_ref_id,
            ),
            restorer: Restorer::new(
                Arc::clone(&gateway),
                lifecycle,
                permissions,
                object_types,
            ),
            compactor: TreeCompactor::new(Arc::clone(&gateway), root_ref_id),
            purger: TrashPurger::new(gateway),
        }
    }

    /// Creates a validator backed by a single [`SqliteRepository`].
    #[must_use]
    pub fn with_repository(repository: Arc<SqliteRepository>, config: ValidatorConfig) -> Self {
        Self::new(
            repository.clone(),
            repository.clone(),
            repository,
            config,
        )
    }

    /// Current mode switches.
    #[must_use]
    pub const fn modes(&self) -> &ModeController {
        &self.modes
    }

    /// Mutable access to the mode switches.
    pub const fn modes_mut(&mut self) -> &mut ModeController {
        &mut self.modes
    }

    /// Report of the last analyze pass.
    #[must_use]
    pub const fn report(&self) -> &ValidationReport {
        &self.report
    }

    /// Objects found by the last [`Self::find_missing_objects`].
    #[must_use]
    pub fn missing_objects(&self) -> &[MissingObjectEntry] {
        &self.report.missing_objects
    }

    /// References found by the last [`Self::find_unbound_references`].
    #[must_use]
    pub fn unbound_references(&self) -> &[UnboundReferenceEntry] {
        &self.report.unbound_references
    }

    /// Tree rows found by the last [`Self::find_unbound_childs`].
    #[must_use]
    pub fn unbound_childs(&self) -> &[UnboundChildEntry] {
        &self.report.unbound_childs
    }

    /// Tree rows found by the last [`Self::find_childs_with_invalid_parent`].
    #[must_use]
    pub fn invalid_parent_entries(&self) -> &[InvalidParentEntry] {
        &self.report.invalid_parent_entries
    }

    fn gate(&self, mode: Mode, operation: &'static str) -> bool {
        let enabled = self.modes.enabled(mode);
        if !enabled {
            tracing::debug!(operation, mode = %mode, "Mode disabled, skipping");
            metrics::counter!("validator_operations_skipped_total", "operation" => operation)
                .increment(1);
        }
        enabled
    }

    // =========================================================================
    // Analyze
    // =========================================================================

    /// Scans for objects lacking a reference or a tree node.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    #[instrument(skip(self), fields(operation = "find_missing_objects"))]
    pub fn find_missing_objects(&mut self) -> Result<Outcome<usize>> {
        if !self.gate(Mode::Analyze, "find_missing_objects") {
            return Ok(Outcome::Skipped);
        }
        self.report.missing_objects = self.analyzer.missing_objects()?;
        Ok(Outcome::Ran(self.report.missing_objects.len()))
    }

    /// Scans for references whose object is absent or out of scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    #[instrument(skip(self), fields(operation = "find_unbound_references"))]
    pub fn find_unbound_references(&mut self) -> Result<Outcome<usize>> {
        if !self.gate(Mode::Analyze, "find_unbound_references") {
            return Ok(Outcome::Skipped);
        }
        self.report.unbound_references = self.analyzer.unbound_references()?;
        Ok(Outcome::Ran(self.report.unbound_references.len()))
    }

    /// Scans for tree rows whose child is not a reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    #[instrument(skip(self), fields(operation = "find_unbound_childs"))]
    pub fn find_unbound_childs(&mut self) -> Result<Outcome<usize>> {
        if !self.gate(Mode::Analyze, "find_unbound_childs") {
            return Ok(Outcome::Skipped);
        }
        self.report.unbound_childs = self.analyzer.unbound_childs()?;
        Ok(Outcome::Ran(self.report.unbound_childs.len()))
    }

    /// Scans for live tree rows whose parent is not in the live tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    #[instrument(skip(self), fields(operation = "find_childs_with_invalid_parent"))]
    pub fn find_childs_with_invalid_parent(&mut self) -> Result<Outcome<usize>> {
        if !self.gate(Mode::Analyze, "find_childs_with_invalid_parent") {
            return Ok(Outcome::Skipped);
        }
        self.report.invalid_parent_entries = self.analyzer.childs_with_invalid_parent()?;
        Ok(Outcome::Ran(self.report.invalid_parent_entries.len()))
    }

    /// Runs all four scans, replacing the whole report.
    ///
    /// Returns the total number of findings.
    ///
    /// # Errors
    ///
    /// Returns the first scan error.
    #[instrument(skip(self), fields(operation = "analyze_all"))]
    pub fn analyze_all(&mut self) -> Result<Outcome<usize>> {
        if !self.gate(Mode::Analyze, "analyze_all") {
            return Ok(Outcome::Skipped);
        }
        self.report.clear();
        self.find_missing_objects()?;
        self.find_unbound_references()?;
        self.find_unbound_childs()?;
        self.find_childs_with_invalid_parent()?;
        Ok(Outcome::Ran(self.report.total()))
    }

    // =========================================================================
    // Clean
    // =========================================================================

    /// Deletes unbound references: `entries` if given, else the last report.
    ///
    /// # Errors
    ///
    /// Returns the first repository error.
    #[instrument(skip(self, entries), fields(operation = "remove_unbound_references"))]
    pub fn remove_unbound_references(
        &mut self,
        entries: Option<&[UnboundReferenceEntry]>,
    ) -> Result<Outcome<usize>> {
        if !self.gate(Mode::Clean, "remove_unbound_references") {
            return Ok(Outcome::Skipped);
        }
        let entries = entries.unwrap_or(&self.report.unbound_references);
        self.cleaner.remove_references(entries).map(Outcome::Ran)
    }

    /// Like [`Self::remove_unbound_references`] with a JSON override list.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidParameter`] if `value` is not a list of
    /// reference entries; nothing is deleted in that case.
    pub fn remove_unbound_references_json(
        &mut self,
        value: &serde_json::Value,
    ) -> Result<Outcome<usize>> {
        if !self.gate(Mode::Clean, "remove_unbound_references") {
            return Ok(Outcome::Skipped);
        }
        let entries: Vec<UnboundReferenceEntry> = entries_from_json(value, "unbound_references")?;
        self.remove_unbound_references(Some(&entries))
    }

    /// Deletes unbound tree rows: `entries` if given, else the last report.
    ///
    /// # Errors
    ///
    /// Returns the first repository error.
    #[instrument(skip(self, entries), fields(operation = "remove_unbound_childs"))]
    pub fn remove_unbound_childs(
        &mut self,
        entries: Option<&[UnboundChildEntry]>,
    ) -> Result<Outcome<usize>> {
        if !self.gate(Mode::Clean, "remove_unbound_childs") {
            return Ok(Outcome::Skipped);
        }
        let entries = entries.unwrap_or(&self.report.unbound_childs);
        self.cleaner.remove_childs(entries).map(Outcome::Ran)
    }

    /// Like [`Self::remove_unbound_childs`] with a JSON override list.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidParameter`] if `value` is not a list of
    /// tree entries; nothing is deleted in that case.
    pub fn remove_unbound_childs_json(
        &mut self,
        value: &serde_json::Value,
    ) -> Result<Outcome<usize>> {
        if !self.gate(Mode::Clean, "remove_unbound_childs") {
            return Ok(Outcome::Skipped);
        }
        let entries: Vec<UnboundChildEntry> = entries_from_json(value, "unbound_childs")?;
        self.remove_unbound_childs(Some(&entries))
    }

    /// Renumbers the live tree from the configured root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a live node or the write fails.
    #[instrument(skip(self), fields(operation = "close_gaps_in_tree"))]
    pub fn close_gaps_in_tree(&mut self) -> Result<Outcome<()>> {
        if !self.gate(Mode::Clean, "close_gaps_in_tree") {
            return Ok(Outcome::Skipped);
        }
        self.compactor.close_gaps().map(Outcome::Ran)
    }

    // =========================================================================
    // Restore
    // =========================================================================

    /// Returns the recovery folder id, creating the folder on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be found or created.
    pub fn get_recovery_folder_id(&mut self) -> Result<RefId> {
        self.resolver.resolve()
    }

    fn recovery_folder(&mut self, explicit: Option<RefId>) -> Result<RefId> {
        match explicit {
            Some(ref_id) => Ok(ref_id),
            None => self.resolver.resolve(),
        }
    }

    /// Restores missing objects: `entries` if given, else the last report.
    ///
    /// `rfolder` takes precedence over the resolved recovery folder. The
    /// folder is not resolved (and so not created) when there is nothing to
    /// restore.
    ///
    /// # Errors
    ///
    /// Returns an error if the recovery folder cannot be resolved or is not
    /// a live tree node. Per-entry failures are collected in the
    /// [`RestoreReport`].
    #[instrument(skip(self, entries), fields(operation = "restore_missing_objects"))]
    pub fn restore_missing_objects(
        &mut self,
        rfolder: Option<RefId>,
        entries: Option<&[MissingObjectEntry]>,
    ) -> Result<Outcome<RestoreReport>> {
        if !self.gate(Mode::Restore, "restore_missing_objects") {
            return Ok(Outcome::Skipped);
        }
        let entries = entries.map_or_else(|| self.report.missing_objects.clone(), <[_]>::to_vec);
        if entries.is_empty() {
            return Ok(Outcome::Ran(RestoreReport::default()));
        }
        let rfolder = self.recovery_folder(rfolder)?;
        Ok(Outcome::Ran(self.restorer.restore_missing_objects(&entries, rfolder)?))
    }

    /// Like [`Self::restore_missing_objects`] with a JSON override list.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidParameter`] if `value` is not a list of
    /// missing-object entries; nothing is restored in that case.
    pub fn restore_missing_objects_json(
        &mut self,
        rfolder: Option<RefId>,
        value: &serde_json::Value,
    ) -> Result<Outcome<RestoreReport>> {
        if !self.gate(Mode::Restore, "restore_missing_objects") {
            return Ok(Outcome::Skipped);
        }
        let entries: Vec<MissingObjectEntry> = entries_from_json(value, "missing_objects")?;
        self.restore_missing_objects(rfolder, Some(&entries))
    }

    /// Relocates subtrees with an invalid parent: `entries` if given, else
    /// the last report.
    ///
    /// # Errors
    ///
    /// Returns an error if the recovery folder cannot be resolved or is not
    /// a live tree node. Per-entry failures are collected in the
    /// [`RestoreReport`].
    #[instrument(skip(self, entries), fields(operation = "restore_unbound_childs"))]
    pub fn restore_unbound_childs(
        &mut self,
        rfolder: Option<RefId>,
        entries: Option<&[InvalidParentEntry]>,
    ) -> Result<Outcome<RestoreReport>> {
        if !self.gate(Mode::Restore, "restore_unbound_childs") {
            return Ok(Outcome::Skipped);
        }
        let entries =
            entries.map_or_else(|| self.report.invalid_parent_entries.clone(), <[_]>::to_vec);
        if entries.is_empty() {
            return Ok(Outcome::Ran(RestoreReport::default()));
        }
        let rfolder = self.recovery_folder(rfolder)?;
        Ok(Outcome::Ran(self.restorer.restore_unbound_childs(&entries, rfolder)?))
    }

    /// Like [`Self::restore_unbound_childs`] with a JSON override list.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidParameter`] if `value` is not a list of
    /// invalid-parent entries; nothing is restored in that case.
    pub fn restore_unbound_childs_json(
        &mut self,
        rfolder: Option<RefId>,
        value: &serde_json::Value,
    ) -> Result<Outcome<RestoreReport>> {
        if !self.gate(Mode::Restore, "restore_unbound_childs") {
            return Ok(Outcome::Skipped);
        }
        let entries: Vec<InvalidParentEntry> = entries_from_json(value, "invalid_parent_entries")?;
        self.restore_unbound_childs(rfolder, Some(&entries))
    }

    // =========================================================================
    // Trash
    // =========================================================================

    /// Purges everything outside the live tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the purge fails.
    #[instrument(skip(self), fields(operation = "empty_trash"))]
    pub fn empty_trash(&mut self) -> Result<Outcome<TrashPurge>> {
        if !self.gate(Mode::EmptyTrash, "empty_trash") {
            return Ok(Outcome::Skipped);
        }
        self.purger.purge().map(Outcome::Ran)
    }

    // =========================================================================
    // Full pass
    // =========================================================================

    /// Runs a full pass: analyze, clean, restore, empty trash, close gaps.
    ///
    /// Each step honours its own mode. Cleaning can create new findings: a
    /// removed reference leaves its tree rows unbound, and a removed tree row
    /// leaves its children without a parent. The affected scan is repeated
    /// after each such clean step so the same run picks them up. `findings`
    /// in the summary counts the initial scan only.
    ///
    /// # Errors
    ///
    /// Returns the first error that aborts a step. Restore entry failures do
    /// not abort the run; they are listed in the summary.
    #[instrument(skip(self), fields(operation = "run"))]
    pub fn run(&mut self) -> Result<RunSummary> {
        let start = Instant::now();
        tracing::info!(modes = ?self.modes.snapshot(), "Starting validation run");

        let findings = self.analyze_all()?;
        let references_removed = self.remove_unbound_references(None)?;
        if references_removed.found_anything() {
            self.find_unbound_childs()?;
        }
        let childs_removed = self.remove_unbound_childs(None)?;
        if childs_removed.found_anything() {
            self.find_childs_with_invalid_parent()?;
        }
        let missing_objects = self.restore_missing_objects(None, None)?;
        let unbound_childs = self.restore_unbound_childs(None, None)?;
        let trash = self.empty_trash()?;
        let gaps_closed = self.close_gaps_in_tree()?;

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        metrics::histogram!("validator_run_duration_ms").record(duration_ms as f64);

        let summary = RunSummary {
            findings,
            references_removed,
            childs_removed,
            missing_objects,
            unbound_childs,
            trash,
            gaps_closed,
            duration_ms,
        };
        tracing::info!(summary = %summary.summary(), "Validation run finished");
        Ok(summary)
    }
}
