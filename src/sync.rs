//! Note and asset directory synchronisation
//!
//! Every public operation validates its inputs before touching the
//! filesystem and returns an [`OperationResult`]. Multi-step operations that
//! fail halfway are undone by an explicit rollback step invoked here, at the
//! operation boundary; a failed rollback is logged and noted in the message.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::compliance::{ComplianceReport, ComplianceValidator};
use crate::config::Config;
use crate::error::{io_err, Error, OperationResult, Result};
use crate::util;

#[derive(Debug, Clone, Serialize)]
pub struct CreateOutcome {
    pub note: PathBuf,
    pub asset_dir: PathBuf,
    pub asset_dir_created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveOutcome {
    pub note: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_assets: Option<PathBuf>,
    /// Asset directories of other notes nested in the removed one, left in place
    pub kept: Vec<PathBuf>,
    pub pruned: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub note: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<BatchFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoteMove {
    pub from: PathBuf,
    pub to: PathBuf,
    pub assets_moved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveOutcome {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub notes: Vec<NoteMove>,
    pub other_files: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanOutcome {
    pub dry_run: bool,
    /// Orphaned leaf directories found
    pub orphans: Vec<PathBuf>,
    /// Directories deleted: orphans plus pruned empty ancestors
    pub removed: Vec<PathBuf>,
}

/// One note move, fully resolved before anything is touched
#[derive(Debug, Clone)]
pub struct MovePlan {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub source_assets: PathBuf,
    pub dest_assets: PathBuf,
    /// Whether an existing asset directory travels with the note
    pub move_assets: bool,
    /// Asset directories of other notes inside `source_assets`; they stay
    /// where they are and only the rest of the directory moves
    pub nested: Vec<PathBuf>,
    /// The asset directory travels inside another plan's asset directory
    pub carried: bool,
}

impl MovePlan {
    fn record(&self) -> NoteMove {
        NoteMove {
            from: self.source.clone(),
            to: self.dest.clone(),
            assets_moved: self.move_assets || self.carried,
        }
    }

    /// Whether an entry of `source_assets` belongs to a nested note
    fn is_nested(&self, entry: &Path) -> bool {
        self.nested.iter().any(|dir| dir.starts_with(entry))
    }

    /// Assets move entry by entry when part of the directory stays behind or
    /// the destination lies inside it
    fn moves_entries(&self) -> bool {
        !self.nested.is_empty() || self.dest_assets.starts_with(&self.source_assets)
    }
}

/// Inner plans whose assets sit inside an outer plan's asset directory
/// travel with it, so only the outer directory is moved
fn mark_carried(plans: &mut [MovePlan]) {
    let owners: Vec<(usize, PathBuf, PathBuf)> = plans
        .iter()
        .enumerate()
        .filter(|(_, plan)| plan.move_assets)
        .map(|(i, plan)| (i, plan.source_assets.clone(), plan.dest_assets.clone()))
        .collect();

    for (i, plan) in plans.iter_mut().enumerate() {
        if !plan.move_assets {
            continue;
        }
        let carried = owners.iter().any(|(j, source, dest)| {
            *j != i
                && (plan.source_assets != *source || *j < i)
                && plan
                    .source_assets
                    .strip_prefix(source)
                    .is_ok_and(|rest| dest.join(rest) == plan.dest_assets)
        });
        if carried {
            debug!("Assets of {} travel with an outer directory", plan.source.display());
            plan.move_assets = false;
            plan.carried = true;
        }
    }
}

enum MoveJob {
    Note(MovePlan),
    Directory {
        source: PathBuf,
        dest: PathBuf,
        plans: Vec<MovePlan>,
    },
}

#[derive(Debug, Clone)]
struct CreatePlan {
    note: PathBuf,
    asset_dir: PathBuf,
}

pub struct SyncEngine {
    config: Config,
    notes_root: PathBuf,
    assets_root: PathBuf,
    validator: ComplianceValidator,
}

impl SyncEngine {
    pub fn new(config: &Config) -> Result<Self> {
        let validator = ComplianceValidator::new(config)?;
        Ok(Self {
            config: config.clone(),
            notes_root: validator.notes_root().to_path_buf(),
            assets_root: validator.assets_root().to_path_buf(),
            validator,
        })
    }

    pub fn notes_root(&self) -> &Path {
        &self.notes_root
    }

    pub fn assets_root(&self) -> &Path {
        &self.assets_root
    }

    pub fn validator(&self) -> &ComplianceValidator {
        &self.validator
    }

    /// Asset directory of a note given relative to the working directory or absolute
    pub fn asset_dir(&self, note: &Path) -> Result<PathBuf> {
        let (note, _) = util::resolve_in_root(&self.notes_root, note)?;
        self.validator.expected_dir(&note)
    }

    fn is_in_assets(&self, path: &Path) -> bool {
        self.assets_root.starts_with(&self.notes_root) && path.starts_with(&self.assets_root)
    }

    fn resolve_note(&self, path: &Path) -> Result<PathBuf> {
        let (resolved, _) = util::resolve_in_root(&self.notes_root, path)?;
        if self.is_in_assets(&resolved) {
            return Err(Error::Validation(format!(
                "Path is inside the assets root: {}",
                resolved.display()
            )));
        }
        Ok(resolved)
    }

    /// Reject unsupported extensions and excluded names for a note destination
    fn check_note_name(&self, note: &Path) -> Result<()> {
        if !self.config.is_supported_note(note) {
            return Err(Error::Validation(format!(
                "Unsupported note extension: {}",
                note.display()
            )));
        }
        let name = note.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        if self.config.is_excluded_name(&name) {
            return Err(Error::Validation(format!("Excluded file name: {}", name)));
        }
        Ok(())
    }

    /// Another note with the same stem in the same directory shares the asset
    /// directory; returns it if present
    fn sibling_claim(&self, note: &Path, ignore: Option<&Path>) -> Option<PathBuf> {
        self.config
            .supported_extensions
            .iter()
            .map(|ext| note.with_extension(ext.trim_start_matches('.')))
            .find(|sibling| sibling != note && Some(sibling.as_path()) != ignore && sibling.exists())
    }

    /// Asset directories of other notes that live inside `asset_dir`
    ///
    /// Notes under the folder named after `note` (`cat/x/y.md` next to
    /// `cat/x.md`) map below the note's own asset directory.
    fn nested_claims(&self, note: &Path, asset_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut claims = Vec::new();
        for other in self.validator.scan_notes(&note.with_extension(""))? {
            let dir = self.validator.expected_dir(&other)?;
            if dir.starts_with(asset_dir) && dir != asset_dir {
                claims.push(dir);
            }
        }
        Ok(claims)
    }

    // === Create ===

    /// Write a new note and create its asset directory
    pub fn create(&self, note: &Path, content: &str) -> OperationResult<CreateOutcome> {
        let plan = match self.plan_create(note) {
            Ok(plan) => plan,
            Err(err) => return OperationResult::failed(&err),
        };
        match self.execute_create(&plan, content) {
            Ok(outcome) => {
                info!("Created note {}", plan.note.display());
                OperationResult::ok(
                    format!(
                        "Created {} with asset directory {}",
                        util::display_relative(&outcome.note, &self.notes_root),
                        util::display_relative(&outcome.asset_dir, &self.assets_root)
                    ),
                    outcome,
                )
            }
            Err(err) => {
                let result = OperationResult::failed(&err);
                match self.rollback_create(&plan) {
                    Ok(()) => result.with_note("rolled back"),
                    Err(rollback_err) => {
                        error!("Rollback of create {} failed: {}", plan.note.display(), rollback_err);
                        result.with_note(format!("rollback failed: {}", rollback_err))
                    }
                }
            }
        }
    }

    fn plan_create(&self, note: &Path) -> Result<CreatePlan> {
        let note = self.resolve_note(note)?;
        self.check_note_name(&note)?;
        if note.exists() {
            return Err(Error::Conflict(note));
        }
        if let Some(sibling) = self.sibling_claim(&note, None) {
            return Err(Error::Conflict(sibling));
        }

        let parent = note.parent().unwrap_or(&self.notes_root);
        let report = self.validator.validate_dir(parent)?;
        if !report.is_compliant {
            return Err(Error::Compliance(report.messages()));
        }

        let asset_dir = self.validator.expected_dir(&note)?;
        if asset_dir.exists() && !asset_dir.is_dir() {
            return Err(Error::Conflict(asset_dir));
        }
        Ok(CreatePlan { note, asset_dir })
    }

    fn execute_create(&self, plan: &CreatePlan, content: &str) -> Result<CreateOutcome> {
        if let Some(parent) = plan.note.parent() {
            fs::create_dir_all(parent).map_err(io_err("create", parent))?;
        }
        fs::write(&plan.note, content).map_err(io_err("write", &plan.note))?;

        let asset_dir_created = !plan.asset_dir.exists();
        fs::create_dir_all(&plan.asset_dir).map_err(io_err("create", &plan.asset_dir))?;
        debug!("Asset directory ready: {}", plan.asset_dir.display());

        Ok(CreateOutcome {
            note: plan.note.clone(),
            asset_dir: plan.asset_dir.clone(),
            asset_dir_created,
        })
    }

    fn rollback_create(&self, plan: &CreatePlan) -> Result<()> {
        if plan.note.exists() {
            fs::remove_file(&plan.note).map_err(io_err("remove", &plan.note))?;
        }
        if let Some(parent) = plan.note.parent() {
            util::prune_empty_ancestors(parent, &self.notes_root);
        }
        Ok(())
    }

    // === Remove ===

    /// Delete a note, and optionally its asset directory
    pub fn remove(&self, note: &Path, remove_assets: bool) -> OperationResult<RemoveOutcome> {
        OperationResult::from_result(self.try_remove(note, remove_assets), |outcome| {
            let mut message = format!("Removed {}", util::display_relative(&outcome.note, &self.notes_root));
            if let Some(assets) = &outcome.removed_assets {
                message.push_str(&format!(
                    " and {}",
                    util::display_relative(assets, &self.assets_root)
                ));
            }
            message
        })
    }

    fn try_remove(&self, note: &Path, remove_assets: bool) -> Result<RemoveOutcome> {
        let note = self.resolve_note(note)?;
        if !note.exists() {
            return Err(Error::NotFound(note));
        }
        if note.is_dir() {
            return Err(Error::Validation(format!("Not a note file: {}", note.display())));
        }
        self.check_note_name(&note)?;
        let asset_dir = self.validator.expected_dir(&note)?;
        let nested = if remove_assets {
            self.nested_claims(&note, &asset_dir)?
        } else {
            Vec::new()
        };

        fs::remove_file(&note).map_err(io_err("remove", &note))?;
        info!("Removed note {}", note.display());

        let mut outcome = RemoveOutcome {
            note: note.clone(),
            removed_assets: None,
            kept: Vec::new(),
            pruned: Vec::new(),
        };
        if !remove_assets {
            return Ok(outcome);
        }

        if let Some(sibling) = self.sibling_claim(&note, None) {
            warn!(
                "Keeping {}: still used by {}",
                asset_dir.display(),
                sibling.display()
            );
            return Ok(outcome);
        }
        if !nested.is_empty() && asset_dir.is_dir() {
            self.remove_owned_assets(&asset_dir, &nested)?;
            warn!(
                "Keeping {}: holds the assets of {} nested note(s)",
                asset_dir.display(),
                nested.len()
            );
            outcome.kept = nested;
            return Ok(outcome);
        }
        if asset_dir.is_dir() {
            fs::remove_dir_all(&asset_dir).map_err(io_err("remove", &asset_dir))?;
            info!("Removed asset directory {}", asset_dir.display());
            outcome.removed_assets = Some(asset_dir.clone());
        }
        if let Some(parent) = asset_dir.parent() {
            outcome.pruned = util::prune_empty_ancestors(parent, &self.assets_root);
        }
        Ok(outcome)
    }

    /// Delete the entries of `asset_dir` that hold no nested note's assets
    fn remove_owned_assets(&self, asset_dir: &Path, nested: &[PathBuf]) -> Result<()> {
        let entries = fs::read_dir(asset_dir).map_err(io_err("read", asset_dir))?;
        for entry in entries {
            let path = entry.map_err(io_err("read", asset_dir))?.path();
            if nested.iter().any(|dir| dir.starts_with(&path)) {
                continue;
            }
            if path.is_dir() {
                fs::remove_dir_all(&path).map_err(io_err("remove", &path))?;
            } else {
                fs::remove_file(&path).map_err(io_err("remove", &path))?;
            }
            debug!("Removed {}", path.display());
        }
        Ok(())
    }

    /// Remove several notes, continuing past failures
    pub fn remove_many(&self, notes: &[PathBuf], remove_assets: bool) -> OperationResult<BatchOutcome> {
        let mut batch = BatchOutcome::default();
        for note in notes {
            match self.try_remove(note, remove_assets) {
                Ok(_) => batch.succeeded += 1,
                Err(err) => {
                    warn!("Failed to remove {}: {}", note.display(), err);
                    batch.failed += 1;
                    batch.failures.push(BatchFailure {
                        note: note.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let message = format!("Removed {} note(s), {} failed", batch.succeeded, batch.failed);
        if batch.failed > 0 && batch.succeeded == 0 {
            return OperationResult {
                success: false,
                message,
                error: None,
                data: Some(batch),
            };
        }
        OperationResult::ok(message, batch)
    }

    // === Move ===

    /// Move or rename a note or a directory of notes, `mv` style
    ///
    /// An existing destination directory receives the source under its own
    /// name. Asset directories follow their notes when `move_assets` is set.
    pub fn move_path(&self, source: &Path, dest: &Path, move_assets: bool) -> OperationResult<MoveOutcome> {
        let job = match self.plan_move(source, dest, move_assets) {
            Ok(job) => job,
            Err(err) => return OperationResult::failed(&err),
        };

        match job {
            MoveJob::Note(plan) => match self.execute_move(&plan) {
                Ok(()) => self.moved(plan.source.clone(), plan.dest.clone(), vec![plan.record()], 0),
                Err(err) => self.fail_with_rollback(&err, std::slice::from_ref(&plan), &[], None),
            },
            MoveJob::Directory { source, dest, plans } => {
                for (done, plan) in plans.iter().enumerate() {
                    if let Err(err) = self.execute_move(plan) {
                        return self.fail_with_rollback(&err, &plans[..=done], &[], Some(dest.as_path()));
                    }
                }
                let mut files = Vec::new();
                if let Err(err) = self.move_remaining(&source, &dest, &mut files) {
                    return self.fail_with_rollback(&err, &plans, &files, Some(dest.as_path()));
                }
                if let Err(e) = util::remove_empty_tree(&source) {
                    warn!("Could not remove {}: {}", source.display(), e);
                }
                let records = plans.iter().map(MovePlan::record).collect();
                self.moved(source, dest, records, files.len())
            }
        }
    }

    fn moved(
        &self,
        source: PathBuf,
        destination: PathBuf,
        notes: Vec<NoteMove>,
        other_files: usize,
    ) -> OperationResult<MoveOutcome> {
        let message = format!(
            "Moved {} -> {} ({} note(s))",
            util::display_relative(&source, &self.notes_root),
            util::display_relative(&destination, &self.notes_root),
            notes.len()
        );
        info!("{}", message);
        OperationResult::ok(
            message,
            MoveOutcome {
                source,
                destination,
                notes,
                other_files,
            },
        )
    }

    /// Undo moved files, then note plans, newest first
    ///
    /// `dest_dir` is the destination of a directory move; directories left
    /// empty under it are removed afterwards.
    fn fail_with_rollback(
        &self,
        err: &Error,
        plans: &[MovePlan],
        files: &[(PathBuf, PathBuf)],
        dest_dir: Option<&Path>,
    ) -> OperationResult<MoveOutcome> {
        error!("Move failed: {}", err);
        let mut failures = Vec::new();
        for (from, to) in files.iter().rev() {
            if let Err(rollback_err) = self.restore_file(from, to) {
                error!("Rollback of {} failed: {}", from.display(), rollback_err);
                failures.push(rollback_err.to_string());
            }
        }
        for plan in plans.iter().rev() {
            if let Err(rollback_err) = self.rollback(plan) {
                error!("Rollback of {} failed: {}", plan.source.display(), rollback_err);
                failures.push(rollback_err.to_string());
            }
        }
        if let Some(dir) = dest_dir.filter(|dir| dir.is_dir()) {
            if let Err(e) = util::remove_empty_tree(dir) {
                warn!("Could not remove {}: {}", dir.display(), e);
            }
        }

        let result = OperationResult::failed(err);
        if failures.is_empty() {
            result.with_note("rolled back")
        } else {
            result.with_note(format!("rollback failed: {}", failures.join("; ")))
        }
    }

    fn restore_file(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = from.parent() {
            fs::create_dir_all(parent).map_err(io_err("create", parent))?;
        }
        util::move_path(to, from).map_err(io_err("restore", to))?;
        debug!("Restored {}", from.display());
        Ok(())
    }

    fn plan_move(&self, source: &Path, dest: &Path, move_assets: bool) -> Result<MoveJob> {
        let source = self.resolve_note(source)?;
        if !source.exists() {
            return Err(Error::NotFound(source));
        }

        let mut dest = self.resolve_note(dest)?;
        if dest.is_dir() {
            if let Some(name) = source.file_name() {
                dest = dest.join(name);
            }
        }
        if dest == source {
            return Err(Error::Validation(format!(
                "Source and destination are the same: {}",
                source.display()
            )));
        }
        if dest.exists() {
            return Err(Error::Conflict(dest));
        }

        if !source.is_dir() {
            if !self.config.is_managed_note(&source) {
                return Err(Error::Validation(format!("Not a managed note: {}", source.display())));
            }
            let mut plan = self.plan_note_move(&source, &dest, move_assets)?;
            if plan.move_assets {
                plan.nested = self.nested_claims(&source, &plan.source_assets)?;
            }
            return Ok(MoveJob::Note(plan));
        }

        if dest.starts_with(&source) {
            return Err(Error::Validation(format!(
                "Cannot move a directory into itself: {}",
                source.display()
            )));
        }
        // Every nested note moves in the same job, so no plan keeps any behind
        let mut plans = Vec::new();
        for note in self.validator.scan_notes(&source)? {
            let relative = note.strip_prefix(&source).unwrap_or(&note).to_path_buf();
            plans.push(self.plan_note_move(&note, &dest.join(relative), move_assets)?);
        }
        mark_carried(&mut plans);
        debug!("Planned {} note move(s) under {}", plans.len(), source.display());
        Ok(MoveJob::Directory { source, dest, plans })
    }

    fn plan_note_move(&self, source: &Path, dest: &Path, move_assets: bool) -> Result<MovePlan> {
        self.check_note_name(dest)?;
        if dest.exists() {
            return Err(Error::Conflict(dest.to_path_buf()));
        }
        if let Some(sibling) = self.sibling_claim(dest, Some(source)) {
            return Err(Error::Conflict(sibling));
        }

        let source_assets = self.validator.expected_dir(source)?;
        let dest_assets = self.validator.expected_dir(dest)?;
        let move_assets = move_assets && source_assets.is_dir() && source_assets != dest_assets;
        if move_assets && dest_assets.exists() {
            return Err(Error::Conflict(dest_assets));
        }

        Ok(MovePlan {
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
            source_assets,
            dest_assets,
            move_assets,
            nested: Vec::new(),
            carried: false,
        })
    }

    /// Carry out one planned note move
    pub fn execute_move(&self, plan: &MovePlan) -> Result<()> {
        if let Some(parent) = plan.dest.parent() {
            fs::create_dir_all(parent).map_err(io_err("create", parent))?;
        }
        util::move_path(&plan.source, &plan.dest).map_err(io_err("move", &plan.source))?;
        debug!("Moved {} -> {}", plan.source.display(), plan.dest.display());

        if !plan.move_assets {
            return Ok(());
        }
        if plan.moves_entries() {
            fs::create_dir_all(&plan.dest_assets).map_err(io_err("create", &plan.dest_assets))?;
            self.move_entries(&plan.source_assets, &plan.dest_assets, |entry| {
                plan.is_nested(entry) || plan.dest_assets.starts_with(entry)
            })?;
        } else {
            if let Some(parent) = plan.dest_assets.parent() {
                fs::create_dir_all(parent).map_err(io_err("create", parent))?;
            }
            util::move_path(&plan.source_assets, &plan.dest_assets)
                .map_err(io_err("move", &plan.source_assets))?;
            if let Some(parent) = plan.source_assets.parent() {
                util::prune_empty_ancestors(parent, &self.assets_root);
            }
        }
        debug!(
            "Moved assets {} -> {}",
            plan.source_assets.display(),
            plan.dest_assets.display()
        );
        Ok(())
    }

    /// Undo a partially or fully executed note move
    ///
    /// Moves the note back when only the destination exists, and the asset
    /// directory back when only its destination exists. Entry-wise asset
    /// moves are reversed entry by entry.
    pub fn rollback(&self, plan: &MovePlan) -> Result<()> {
        if plan.dest.exists() && !plan.source.exists() {
            if let Some(parent) = plan.source.parent() {
                fs::create_dir_all(parent).map_err(io_err("create", parent))?;
            }
            util::move_path(&plan.dest, &plan.source).map_err(io_err("restore", &plan.dest))?;
            info!("Rolled back {}", plan.source.display());
        }
        if let Some(parent) = plan.dest.parent() {
            util::prune_empty_ancestors(parent, &self.notes_root);
        }

        if !plan.move_assets || !plan.dest_assets.is_dir() {
            return Ok(());
        }
        if plan.moves_entries() {
            self.move_entries(&plan.dest_assets, &plan.source_assets, |_| false)?;
            util::prune_empty_ancestors(&plan.dest_assets, &self.assets_root);
            info!("Rolled back assets {}", plan.source_assets.display());
        } else if !plan.source_assets.exists() {
            if let Some(parent) = plan.source_assets.parent() {
                fs::create_dir_all(parent).map_err(io_err("create", parent))?;
            }
            util::move_path(&plan.dest_assets, &plan.source_assets)
                .map_err(io_err("restore", &plan.dest_assets))?;
            info!("Rolled back assets {}", plan.source_assets.display());
            if let Some(parent) = plan.dest_assets.parent() {
                util::prune_empty_ancestors(parent, &self.assets_root);
            }
        }
        Ok(())
    }

    /// Move the entries of `from` into `to`, except those `skip` selects
    fn move_entries(&self, from: &Path, to: &Path, skip: impl Fn(&Path) -> bool) -> Result<()> {
        let entries = fs::read_dir(from).map_err(io_err("read", from))?;
        for entry in entries {
            let entry = entry.map_err(io_err("read", from))?;
            let path = entry.path();
            if skip(&path) {
                continue;
            }
            let target = to.join(entry.file_name());
            util::move_path(&path, &target).map_err(io_err("move", &path))?;
        }
        Ok(())
    }

    /// Move the files left in `source` after its notes moved, keeping layout
    ///
    /// Each completed `(from, to)` move is recorded for rollback.
    fn move_remaining(&self, source: &Path, dest: &Path, moved: &mut Vec<(PathBuf, PathBuf)>) -> Result<()> {
        let entries = fs::read_dir(source).map_err(io_err("read", source))?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry.map_err(io_err("read", source))?.path());
        }
        paths.sort();

        for path in paths {
            let Some(name) = path.file_name() else { continue };
            let target = dest.join(name);
            if path.is_dir() {
                self.move_remaining(&path, &target, moved)?;
                continue;
            }
            if target.exists() {
                warn!("Leaving {}: {} already exists", path.display(), target.display());
                continue;
            }
            fs::create_dir_all(dest).map_err(io_err("create", dest))?;
            util::move_path(&path, &target).map_err(io_err("move", &path))?;
            moved.push((path, target));
        }
        Ok(())
    }

    // === Clean ===

    /// Remove asset leaf directories no current note maps to
    ///
    /// A dry run only reports. Otherwise the scan repeats until no orphan is
    /// left, so an immediate second run finds nothing.
    pub fn clean(&self, dry_run: bool) -> OperationResult<CleanOutcome> {
        OperationResult::from_result(self.try_clean(dry_run), |outcome| {
            if outcome.dry_run {
                format!("Found {} orphaned asset director(ies)", outcome.orphans.len())
            } else {
                format!(
                    "Removed {} orphaned asset director(ies)",
                    outcome.orphans.len()
                )
            }
        })
    }

    fn try_clean(&self, dry_run: bool) -> Result<CleanOutcome> {
        if !self.notes_root.is_dir() {
            return Err(Error::NotFound(self.notes_root.clone()));
        }
        let mut outcome = CleanOutcome {
            dry_run,
            ..CleanOutcome::default()
        };
        if !self.assets_root.is_dir() {
            return Ok(outcome);
        }

        let mut expected = BTreeSet::new();
        for note in self.validator.scan_notes(&self.notes_root)? {
            expected.insert(self.validator.expected_dir(&note)?);
        }
        // Ancestors of expected directories are never orphans
        let protected: BTreeSet<PathBuf> = expected
            .iter()
            .flat_map(|dir| dir.ancestors().skip(1))
            .filter(|dir| dir.starts_with(&self.assets_root))
            .map(Path::to_path_buf)
            .collect();

        loop {
            let mut orphans = Vec::new();
            self.collect_orphans(&self.assets_root, &expected, &protected, &mut orphans)?;
            if orphans.is_empty() {
                break;
            }
            outcome.orphans.extend(orphans.iter().cloned());
            if dry_run {
                break;
            }
            for orphan in orphans {
                fs::remove_dir_all(&orphan).map_err(io_err("remove", &orphan))?;
                info!("Removed orphaned asset directory {}", orphan.display());
                outcome.removed.push(orphan.clone());
                if let Some(parent) = orphan.parent() {
                    outcome
                        .removed
                        .extend(util::prune_empty_ancestors(parent, &self.assets_root));
                }
            }
        }
        Ok(outcome)
    }

    /// Leaf directories (no subdirectories) not claimed by any note
    ///
    /// Expected directories are not descended into; their contents belong to
    /// their note. Hidden directories count as subdirectories but are never
    /// reported themselves.
    fn collect_orphans(
        &self,
        dir: &Path,
        expected: &BTreeSet<PathBuf>,
        protected: &BTreeSet<PathBuf>,
        orphans: &mut Vec<PathBuf>,
    ) -> Result<()> {
        let mut subdirs = Vec::new();
        let mut has_subdir = false;
        let entries = fs::read_dir(dir).map_err(io_err("read", dir))?;
        for entry in entries {
            let entry = entry.map_err(io_err("read", dir))?;
            let file_type = entry.file_type().map_err(io_err("read", &entry.path()))?;
            if !file_type.is_dir() {
                continue;
            }
            has_subdir = true;
            let name = entry.file_name();
            if util::is_hidden(&name.to_string_lossy()) {
                continue;
            }
            subdirs.push(entry.path());
        }
        subdirs.sort();

        if !has_subdir && dir != self.assets_root.as_path() && !expected.contains(dir) && !protected.contains(dir) {
            orphans.push(dir.to_path_buf());
        }
        for sub in subdirs {
            // Never descend into expected dirs or the notes tree itself
            if expected.contains(&sub) || sub == self.notes_root {
                continue;
            }
            self.collect_orphans(&sub, expected, protected, orphans)?;
        }
        Ok(())
    }

    // === Validate ===

    pub fn validate(&self) -> OperationResult<ComplianceReport> {
        self.validator.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        notes: PathBuf,
        assets: PathBuf,
        engine: SyncEngine,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let root = dunce::canonicalize(temp_dir.path()).unwrap();
        let notes = root.join("docs");
        let assets = root.join("docs/assets");
        fs::create_dir_all(&assets).unwrap();
        let engine = SyncEngine::new(&Config::new(&notes, &assets)).unwrap();
        Fixture {
            _temp_dir: temp_dir,
            notes,
            assets,
            engine,
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_create_writes_note_and_asset_dir() {
        let fx = fixture();
        let result = fx.engine.create(&fx.notes.join("dsa/sort.md"), "# Sort\n");
        assert!(result.success, "{}", result.message);
        assert_eq!(fs::read_to_string(fx.notes.join("dsa/sort.md")).unwrap(), "# Sort\n");
        assert!(fx.assets.join("dsa.assets/sort").is_dir());
        assert!(result.data.unwrap().asset_dir_created);
    }

    #[test]
    fn test_create_conflicts() {
        let fx = fixture();
        write(&fx.notes.join("a.md"), "");
        let exists = fx.engine.create(&fx.notes.join("a.md"), "");
        assert_eq!(exists.error, Some(ErrorKind::Conflict));

        let excluded = fx.engine.create(&fx.notes.join("index.md"), "");
        assert_eq!(excluded.error, Some(ErrorKind::Validation));
        assert!(!fx.notes.join("index.md").exists());

        let sibling = fx.engine.create(&fx.notes.join("a.ipynb"), "{}");
        assert_eq!(sibling.error, Some(ErrorKind::Conflict));

        let unsupported = fx.engine.create(&fx.notes.join("a.txt"), "");
        assert_eq!(unsupported.error, Some(ErrorKind::Validation));

        let outside = fx.engine.create(&fx.notes.join("../escape.md"), "");
        assert_eq!(outside.error, Some(ErrorKind::Validation));
    }

    #[test]
    fn test_create_requires_compliant_parent() {
        let fx = fixture();
        write(&fx.notes.join("cat/old.md"), "");
        let result = fx.engine.create(&fx.notes.join("cat/new.md"), "");
        assert_eq!(result.error, Some(ErrorKind::Compliance));
        assert!(!fx.notes.join("cat/new.md").exists());

        fs::create_dir_all(fx.assets.join("cat.assets/old")).unwrap();
        assert!(fx.engine.create(&fx.notes.join("cat/new.md"), "").success);
    }

    #[test]
    fn test_create_rolls_back_when_asset_dir_fails() {
        let fx = fixture();
        // A file where the category directory should be
        write(&fx.assets.join("cat.assets"), "not a dir");
        let result = fx.engine.create(&fx.notes.join("cat/new.md"), "x");
        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::Io));
        assert!(result.message.ends_with("(rolled back)"));
        assert!(!fx.notes.join("cat/new.md").exists());
        assert!(!fx.notes.join("cat").exists());
    }

    #[test]
    fn test_remove_with_assets_prunes_ancestors() {
        let fx = fixture();
        write(&fx.notes.join("dsa/anal/iter.md"), "");
        write(&fx.assets.join("dsa.assets/anal/iter/fig.png"), "png");

        let result = fx.engine.remove(&fx.notes.join("dsa/anal/iter.md"), true);
        assert!(result.success, "{}", result.message);
        assert!(!fx.notes.join("dsa/anal/iter.md").exists());
        assert!(!fx.assets.join("dsa.assets").exists());
        assert!(fx.assets.exists());
        assert_eq!(result.data.unwrap().pruned.len(), 2);
    }

    #[test]
    fn test_remove_missing_and_keep_assets() {
        let fx = fixture();
        let missing = fx.engine.remove(&fx.notes.join("nope.md"), true);
        assert_eq!(missing.error, Some(ErrorKind::NotFound));

        write(&fx.notes.join("a.md"), "");
        fs::create_dir_all(fx.assets.join("a")).unwrap();
        assert!(fx.engine.remove(&fx.notes.join("a.md"), false).success);
        assert!(fx.assets.join("a").is_dir());
    }

    #[test]
    fn test_remove_many_counts() {
        let fx = fixture();
        write(&fx.notes.join("a.md"), "");
        write(&fx.notes.join("b.md"), "");
        let notes = vec![fx.notes.join("a.md"), fx.notes.join("b.md"), fx.notes.join("c.md")];
        let result = fx.engine.remove_many(&notes, true);
        assert!(result.success);
        let batch = result.data.unwrap();
        assert_eq!((batch.succeeded, batch.failed), (2, 1));
        assert_eq!(batch.failures[0].note, fx.notes.join("c.md"));
    }

    #[test]
    fn test_move_note_with_assets() {
        let fx = fixture();
        write(&fx.notes.join("old/note.md"), "body");
        write(&fx.assets.join("old.assets/note/img.png"), "png");

        let result = fx.engine.move_path(&fx.notes.join("old/note.md"), &fx.notes.join("new/note.md"), true);
        assert!(result.success, "{}", result.message);
        assert_eq!(fs::read_to_string(fx.notes.join("new/note.md")).unwrap(), "body");
        assert_eq!(fs::read(fx.assets.join("new.assets/note/img.png")).unwrap(), b"png");
        assert!(!fx.assets.join("old.assets").exists());
    }

    #[test]
    fn test_move_into_existing_directory() {
        let fx = fixture();
        write(&fx.notes.join("a.md"), "");
        fs::create_dir_all(fx.notes.join("dir")).unwrap();
        fs::create_dir_all(fx.assets.join("a")).unwrap();

        let result = fx.engine.move_path(&fx.notes.join("a.md"), &fx.notes.join("dir"), true);
        assert!(result.success, "{}", result.message);
        assert!(fx.notes.join("dir/a.md").exists());
        assert!(fx.assets.join("dir.assets/a").is_dir());
    }

    #[test]
    fn test_move_conflict_touches_nothing() {
        let fx = fixture();
        write(&fx.notes.join("a.md"), "a");
        write(&fx.notes.join("b.md"), "b");
        let result = fx.engine.move_path(&fx.notes.join("a.md"), &fx.notes.join("b.md"), true);
        assert_eq!(result.error, Some(ErrorKind::Conflict));
        assert_eq!(fs::read_to_string(fx.notes.join("a.md")).unwrap(), "a");

        let missing = fx.engine.move_path(&fx.notes.join("x.md"), &fx.notes.join("y.md"), true);
        assert_eq!(missing.error, Some(ErrorKind::NotFound));
    }

    #[test]
    fn test_move_rolls_back_on_asset_failure() {
        let fx = fixture();
        write(&fx.notes.join("a.md"), "a");
        write(&fx.assets.join("a/img.png"), "png");
        // Asset destination parent cannot be created
        write(&fx.assets.join("new.assets"), "blocker");

        let result = fx.engine.move_path(&fx.notes.join("a.md"), &fx.notes.join("new/a.md"), true);
        assert!(!result.success);
        assert!(result.message.ends_with("(rolled back)"), "{}", result.message);
        assert_eq!(fs::read_to_string(fx.notes.join("a.md")).unwrap(), "a");
        assert!(!fx.notes.join("new").exists());
        assert_eq!(fs::read(fx.assets.join("a/img.png")).unwrap(), b"png");
    }

    #[test]
    fn test_rollback_restores_completed_move() {
        let fx = fixture();
        write(&fx.notes.join("a.md"), "a");
        write(&fx.assets.join("a/img.png"), "png");
        let plan = fx
            .engine
            .plan_note_move(&fx.notes.join("a.md"), &fx.notes.join("b.md"), true)
            .unwrap();
        fx.engine.execute_move(&plan).unwrap();
        assert!(fx.assets.join("b/img.png").exists());

        fx.engine.rollback(&plan).unwrap();
        assert!(fx.notes.join("a.md").exists());
        assert!(!fx.notes.join("b.md").exists());
        assert!(fx.assets.join("a/img.png").exists());
        assert!(!fx.assets.join("b").exists());
    }

    #[test]
    fn test_move_directory() {
        let fx = fixture();
        write(&fx.notes.join("old/one.md"), "1");
        write(&fx.notes.join("old/sub/two.md"), "2");
        write(&fx.notes.join("old/index.md"), "index");
        write(&fx.notes.join("old/diagram.svg"), "svg");
        write(&fx.assets.join("old.assets/one/a.png"), "a");
        write(&fx.assets.join("old.assets/sub/two/b.png"), "b");

        let result = fx.engine.move_path(&fx.notes.join("old"), &fx.notes.join("new"), true);
        assert!(result.success, "{}", result.message);
        let outcome = result.data.unwrap();
        assert_eq!(outcome.notes.len(), 2);
        assert_eq!(outcome.other_files, 2);

        assert!(!fx.notes.join("old").exists());
        assert!(fx.notes.join("new/one.md").exists());
        assert!(fx.notes.join("new/sub/two.md").exists());
        assert_eq!(fs::read_to_string(fx.notes.join("new/index.md")).unwrap(), "index");
        assert!(fx.notes.join("new/diagram.svg").exists());
        assert!(fx.assets.join("new.assets/one/a.png").exists());
        assert!(fx.assets.join("new.assets/sub/two/b.png").exists());
        assert!(!fx.assets.join("old.assets").exists());
    }

    #[test]
    fn test_move_directory_into_itself() {
        let fx = fixture();
        write(&fx.notes.join("d/a.md"), "");
        let result = fx.engine.move_path(&fx.notes.join("d"), &fx.notes.join("d/inner"), true);
        assert_eq!(result.error, Some(ErrorKind::Validation));
    }

    /// `cat/x.md` next to folder `cat/x/` puts `y`'s assets inside `x`'s
    fn nested_tree(fx: &Fixture) {
        write(&fx.notes.join("cat/x.md"), "x");
        write(&fx.notes.join("cat/x/y.md"), "y");
        write(&fx.assets.join("cat.assets/x/x.png"), "x");
        write(&fx.assets.join("cat.assets/x/y/y.png"), "y");
    }

    #[test]
    fn test_move_directory_with_nested_asset_dirs() {
        let fx = fixture();
        nested_tree(&fx);

        let result = fx.engine.move_path(&fx.notes.join("cat"), &fx.notes.join("new"), true);
        assert!(result.success, "{}", result.message);
        let outcome = result.data.unwrap();
        assert!(outcome.notes.iter().all(|note| note.assets_moved));

        assert!(fx.notes.join("new/x.md").exists());
        assert!(fx.notes.join("new/x/y.md").exists());
        assert!(!fx.notes.join("cat").exists());
        assert_eq!(fs::read(fx.assets.join("new.assets/x/x.png")).unwrap(), b"x");
        assert_eq!(fs::read(fx.assets.join("new.assets/x/y/y.png")).unwrap(), b"y");
        assert!(!fx.assets.join("cat.assets").exists());
    }

    #[test]
    fn test_move_note_leaves_nested_assets_behind() {
        let fx = fixture();
        nested_tree(&fx);

        let result = fx
            .engine
            .move_path(&fx.notes.join("cat/x.md"), &fx.notes.join("other/x.md"), true);
        assert!(result.success, "{}", result.message);
        assert_eq!(fs::read(fx.assets.join("other.assets/x/x.png")).unwrap(), b"x");
        assert!(!fx.assets.join("other.assets/x/y").exists());
        assert!(!fx.assets.join("cat.assets/x/x.png").exists());
        assert_eq!(fs::read(fx.assets.join("cat.assets/x/y/y.png")).unwrap(), b"y");
    }

    #[test]
    fn test_rollback_restores_entry_wise_asset_move() {
        let fx = fixture();
        nested_tree(&fx);
        let mut plan = fx
            .engine
            .plan_note_move(&fx.notes.join("cat/x.md"), &fx.notes.join("other/x.md"), true)
            .unwrap();
        plan.nested = vec![fx.assets.join("cat.assets/x/y")];
        fx.engine.execute_move(&plan).unwrap();
        assert!(fx.assets.join("other.assets/x/x.png").exists());

        fx.engine.rollback(&plan).unwrap();
        assert!(fx.notes.join("cat/x.md").exists());
        assert!(fx.assets.join("cat.assets/x/x.png").exists());
        assert!(fx.assets.join("cat.assets/x/y/y.png").exists());
        assert!(!fx.assets.join("other.assets").exists());
        assert!(!fx.notes.join("other").exists());
    }

    #[test]
    fn test_remove_keeps_nested_note_assets() {
        let fx = fixture();
        nested_tree(&fx);

        let result = fx.engine.remove(&fx.notes.join("cat/x.md"), true);
        assert!(result.success, "{}", result.message);
        let outcome = result.data.unwrap();
        assert_eq!(outcome.kept, vec![fx.assets.join("cat.assets/x/y")]);
        assert!(outcome.removed_assets.is_none());
        assert!(!fx.notes.join("cat/x.md").exists());
        assert!(!fx.assets.join("cat.assets/x/x.png").exists());
        assert_eq!(fs::read(fx.assets.join("cat.assets/x/y/y.png")).unwrap(), b"y");
    }

    #[test]
    fn test_move_directory_rolls_back_earlier_notes() {
        let fx = fixture();
        write(&fx.notes.join("old/sub/b.md"), "b");
        write(&fx.notes.join("old/zz/c.md"), "c");
        write(&fx.assets.join("old.assets/sub/b/x.png"), "x");
        write(&fx.assets.join("old.assets/zz/c/y.png"), "y");
        // Second note's asset parent cannot be created
        write(&fx.assets.join("new.assets/zz"), "blocker");

        let result = fx.engine.move_path(&fx.notes.join("old"), &fx.notes.join("new"), true);
        assert!(!result.success);
        assert!(result.message.ends_with("(rolled back)"), "{}", result.message);
        assert_eq!(fs::read_to_string(fx.notes.join("old/sub/b.md")).unwrap(), "b");
        assert_eq!(fs::read_to_string(fx.notes.join("old/zz/c.md")).unwrap(), "c");
        assert_eq!(fs::read(fx.assets.join("old.assets/sub/b/x.png")).unwrap(), b"x");
        assert_eq!(fs::read(fx.assets.join("old.assets/zz/c/y.png")).unwrap(), b"y");
        assert!(!fx.notes.join("new").exists());
        assert!(!fx.assets.join("new.assets/sub").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_move_directory_rolls_back_moved_files() {
        use std::os::unix::fs::PermissionsExt;

        let fx = fixture();
        write(&fx.notes.join("old/one.md"), "1");
        write(&fx.notes.join("old/a.txt"), "a");
        write(&fx.notes.join("old/z_locked/data.bin"), "data");
        let locked = fx.notes.join("old/z_locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        // Permission bits do not bind a privileged user
        let check = locked.join("writable_check");
        if fs::write(&check, "").is_ok() {
            fs::remove_file(&check).unwrap();
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = fx.engine.move_path(&fx.notes.join("old"), &fx.notes.join("new"), true);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(!result.success);
        assert!(result.message.ends_with("(rolled back)"), "{}", result.message);
        assert_eq!(fs::read_to_string(fx.notes.join("old/a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(fx.notes.join("old/one.md")).unwrap(), "1");
        assert_eq!(fs::read_to_string(locked.join("data.bin")).unwrap(), "data");
        assert!(!fx.notes.join("new").exists());
    }

    #[test]
    fn test_clean_dry_run_and_removal() {
        let fx = fixture();
        write(&fx.notes.join("keep.md"), "");
        write(&fx.notes.join("cat/deep.md"), "");
        fs::create_dir_all(fx.assets.join("keep/sub")).unwrap();
        fs::create_dir_all(fx.assets.join("cat.assets/deep")).unwrap();
        write(&fx.assets.join("ghost/img.png"), "x");
        fs::create_dir_all(fx.assets.join("cat.assets/gone/inner")).unwrap();

        let dry = fx.engine.clean(true).data.unwrap();
        assert_eq!(
            dry.orphans,
            vec![fx.assets.join("cat.assets/gone/inner"), fx.assets.join("ghost")]
        );
        assert!(fx.assets.join("ghost").exists());

        let real = fx.engine.clean(false).data.unwrap();
        assert_eq!(real.orphans.len(), 2);
        assert!(!fx.assets.join("ghost").exists());
        assert!(!fx.assets.join("cat.assets/gone").exists());
        assert!(fx.assets.join("cat.assets/deep").is_dir());
        assert!(fx.assets.join("keep/sub").is_dir());

        let again = fx.engine.clean(false).data.unwrap();
        assert!(again.orphans.is_empty());
        assert!(again.removed.is_empty());
    }

    #[test]
    fn test_clean_repeats_until_no_orphan_left() {
        let fx = fixture();
        write(&fx.notes.join("a.md"), "");
        fs::create_dir_all(fx.assets.join("a")).unwrap();
        write(&fx.assets.join("stale/cover.png"), "x");
        fs::create_dir_all(fx.assets.join("stale/leaf")).unwrap();

        let first = fx.engine.clean(false).data.unwrap();
        assert_eq!(first.orphans, vec![fx.assets.join("stale/leaf"), fx.assets.join("stale")]);
        assert!(fx.engine.clean(false).data.unwrap().orphans.is_empty());
    }
}
