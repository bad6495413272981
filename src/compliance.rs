//! Asset tree compliance
//!
//! A note is compliant when the directory the [`PathMapper`] assigns to it
//! exists, is a directory, and has the expected shape. Violations are only
//! reported; `fix` creates missing directories and touches nothing else.
//! Unexpected top-level asset directories produce warnings and are kept.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::Config;
use crate::error::{io_err, Error, OperationResult, Result};
use crate::path_mapper::PathMapper;
use crate::tree::TreeBuilder;
use crate::util;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Expected asset directory does not exist
    Missing { note: PathBuf, expected: PathBuf },
    /// Expected asset path exists but is not a directory
    NotADirectory { note: PathBuf, expected: PathBuf },
    /// Expected directory is missing but an unsuffixed one exists in its place
    MissingSuffix {
        note: PathBuf,
        expected: PathBuf,
        found: PathBuf,
    },
}

impl Violation {
    pub fn note(&self) -> &Path {
        match self {
            Violation::Missing { note, .. }
            | Violation::NotADirectory { note, .. }
            | Violation::MissingSuffix { note, .. } => note,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Missing { note, expected } => write!(
                f,
                "Asset directory missing for {}: {}",
                note.display(),
                expected.display()
            ),
            Violation::NotADirectory { note, expected } => write!(
                f,
                "Asset path for {} is not a directory: {}",
                note.display(),
                expected.display()
            ),
            Violation::MissingSuffix { note, expected, found } => write!(
                f,
                "Asset directory for {} lacks the category suffix: {} (expected {})",
                note.display(),
                found.display(),
                expected.display()
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplianceReport {
    pub is_compliant: bool,
    pub checked: usize,
    pub violations: Vec<Violation>,
    pub warnings: Vec<String>,
}

impl ComplianceReport {
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FixReport {
    pub created: Vec<PathBuf>,
    pub unresolved: Vec<Violation>,
}

pub struct ComplianceValidator {
    config: Config,
    notes_root: PathBuf,
    assets_root: PathBuf,
    mapper: PathMapper,
}

impl ComplianceValidator {
    pub fn new(config: &Config) -> Result<Self> {
        let (notes_root, assets_root) = config.resolved_roots()?;
        Ok(Self {
            config: config.clone(),
            notes_root,
            assets_root,
            mapper: PathMapper::default(),
        })
    }

    pub fn notes_root(&self) -> &Path {
        &self.notes_root
    }

    pub fn assets_root(&self) -> &Path {
        &self.assets_root
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Managed notes below `scope`; a missing scope has none
    pub fn scan_notes(&self, scope: &Path) -> Result<Vec<PathBuf>> {
        if !scope.is_dir() {
            return Ok(Vec::new());
        }
        let tree = TreeBuilder::from_config(&self.config, &self.assets_root)
            .parse_metadata(false)
            .build(scope)?;
        Ok(tree.note_paths())
    }

    /// Absolute asset directory of an absolute note path
    pub fn expected_dir(&self, note: &Path) -> Result<PathBuf> {
        self.mapper.map_absolute(&self.notes_root, &self.assets_root, note)
    }

    /// Check one note, `None` when compliant
    pub fn check_note(&self, note: &Path) -> Result<Option<Violation>> {
        let expected = self.expected_dir(note)?;
        let note = note.to_path_buf();

        let violation = if expected.is_dir() {
            None
        } else if expected.exists() {
            Some(Violation::NotADirectory { note, expected })
        } else {
            match self.unsuffixed_dir(&note).filter(|dir| dir.is_dir()) {
                Some(found) => Some(Violation::MissingSuffix { note, expected, found }),
                None => Some(Violation::Missing { note, expected }),
            }
        };
        Ok(violation)
    }

    /// Where the asset directory of a nested note would sit without the
    /// category suffix; `None` for root-level notes
    fn unsuffixed_dir(&self, note: &Path) -> Option<PathBuf> {
        let relative = note.strip_prefix(&self.notes_root).ok()?.with_extension("");
        if self.mapper.is_conforming(&relative) {
            return None;
        }
        Some(self.assets_root.join(relative))
    }

    /// Check every note under the notes root
    pub fn validate(&self) -> OperationResult<ComplianceReport> {
        OperationResult::from_result(self.try_validate(), describe_report)
    }

    fn try_validate(&self) -> Result<ComplianceReport> {
        if !self.notes_root.is_dir() {
            return Err(Error::NotFound(self.notes_root.clone()));
        }
        let notes = self.scan_notes(&self.notes_root)?;
        let mut report = self.check_notes(&notes)?;
        report.warnings = self.extra_dirs(&notes)?;
        for warning in &report.warnings {
            warn!("{}", warning);
        }
        Ok(report)
    }

    /// Check only the notes under `scope` (a directory inside the notes root)
    pub fn validate_dir(&self, scope: &Path) -> Result<ComplianceReport> {
        let notes = self.scan_notes(scope)?;
        self.check_notes(&notes)
    }

    fn check_notes(&self, notes: &[PathBuf]) -> Result<ComplianceReport> {
        let mut violations = Vec::new();
        for note in notes {
            if let Some(violation) = self.check_note(note)? {
                debug!("{}", violation);
                violations.push(violation);
            }
        }
        Ok(ComplianceReport {
            is_compliant: violations.is_empty(),
            checked: notes.len(),
            violations,
            warnings: Vec::new(),
        })
    }

    /// Top-level asset directories no note maps into
    fn extra_dirs(&self, notes: &[PathBuf]) -> Result<Vec<String>> {
        if !self.assets_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut expected_tops = BTreeSet::new();
        for note in notes {
            let relative = self.mapper.map(note.strip_prefix(&self.notes_root).unwrap_or(note))?;
            if let Some(top) = relative.components().next() {
                expected_tops.insert(top.as_os_str().to_os_string());
            }
        }

        let mut warnings = Vec::new();
        let entries = fs::read_dir(&self.assets_root).map_err(io_err("read", &self.assets_root))?;
        for entry in entries {
            let entry = entry.map_err(io_err("read", &self.assets_root))?;
            let name = entry.file_name();
            if util::is_hidden(&name.to_string_lossy()) || !entry.path().is_dir() {
                continue;
            }
            if !expected_tops.contains(&name) {
                warnings.push(format!(
                    "Unexpected asset directory (kept): {}",
                    util::display_path(&entry.path())
                ));
            }
        }
        Ok(warnings)
    }

    /// Create every missing expected asset directory
    pub fn fix(&self) -> OperationResult<FixReport> {
        OperationResult::from_result(self.try_fix(), |report| {
            format!(
                "Created {} asset director{}, {} unresolved",
                report.created.len(),
                if report.created.len() == 1 { "y" } else { "ies" },
                report.unresolved.len()
            )
        })
    }

    fn try_fix(&self) -> Result<FixReport> {
        let report = self.try_validate()?;
        let mut fixed = FixReport::default();
        for violation in report.violations {
            match &violation {
                Violation::Missing { expected, .. } => {
                    fs::create_dir_all(expected).map_err(io_err("create", expected))?;
                    info!("Created asset directory: {}", expected.display());
                    fixed.created.push(expected.clone());
                }
                _ => fixed.unresolved.push(violation),
            }
        }
        Ok(fixed)
    }
}

fn describe_report(report: &ComplianceReport) -> String {
    if report.is_compliant {
        format!("All {} note(s) have compliant asset directories", report.checked)
    } else {
        format!(
            "{} of {} note(s) violate the asset layout",
            report.violations.len(),
            report.checked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Config) {
        let temp_dir = TempDir::new().unwrap();
        let root = dunce::canonicalize(temp_dir.path()).unwrap();
        fs::create_dir_all(root.join("docs")).unwrap();
        let config = Config::new(root.join("docs"), root.join("docs/assets"));
        (temp_dir, config)
    }

    fn write(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "content").unwrap();
    }

    #[test]
    fn test_validate_reports_missing_and_non_dir() {
        let (_temp_dir, config) = setup();
        write(&config.notes_root.join("root.md"));
        write(&config.notes_root.join("dsa/sort.md"));
        write(&config.notes_root.join("dsa/anal/iter.md"));
        fs::create_dir_all(config.assets_root.join("root")).unwrap();
        write(&config.assets_root.join("dsa.assets/sort"));

        let validator = ComplianceValidator::new(&config).unwrap();
        let result = validator.validate();
        assert!(result.success);
        let report = result.data.unwrap();
        assert!(!report.is_compliant);
        assert_eq!(report.checked, 3);
        assert_eq!(
            report.violations,
            vec![
                Violation::Missing {
                    note: config.notes_root.join("dsa/anal/iter.md"),
                    expected: config.assets_root.join("dsa.assets/anal/iter"),
                },
                Violation::NotADirectory {
                    note: config.notes_root.join("dsa/sort.md"),
                    expected: config.assets_root.join("dsa.assets/sort"),
                },
            ]
        );
    }

    #[test]
    fn test_fix_creates_missing_only() {
        let (_temp_dir, config) = setup();
        write(&config.notes_root.join("a.md"));
        write(&config.notes_root.join("cat/b.md"));
        write(&config.assets_root.join("a"));

        let validator = ComplianceValidator::new(&config).unwrap();
        let fixed = validator.fix().data.unwrap();
        assert_eq!(fixed.created, vec![config.assets_root.join("cat.assets/b")]);
        assert_eq!(fixed.unresolved.len(), 1);
        assert!(config.assets_root.join("cat.assets/b").is_dir());
        assert!(config.assets_root.join("a").is_file());
    }

    #[test]
    fn test_unsuffixed_dir_is_reported_not_fixed() {
        let (_temp_dir, config) = setup();
        write(&config.notes_root.join("dsa/sort.md"));
        write(&config.assets_root.join("dsa/sort/fig.png"));

        let validator = ComplianceValidator::new(&config).unwrap();
        let report = validator.validate().data.unwrap();
        assert_eq!(
            report.violations,
            vec![Violation::MissingSuffix {
                note: config.notes_root.join("dsa/sort.md"),
                expected: config.assets_root.join("dsa.assets/sort"),
                found: config.assets_root.join("dsa/sort"),
            }]
        );

        let fixed = validator.fix().data.unwrap();
        assert!(fixed.created.is_empty());
        assert_eq!(fixed.unresolved.len(), 1);
        assert!(!config.assets_root.join("dsa.assets").exists());
        assert!(config.assets_root.join("dsa/sort/fig.png").is_file());
    }

    #[test]
    fn test_extra_dirs_are_warnings_only() {
        let (_temp_dir, config) = setup();
        write(&config.notes_root.join("a.md"));
        fs::create_dir_all(config.assets_root.join("a")).unwrap();
        fs::create_dir_all(config.assets_root.join("stray/inner")).unwrap();

        let validator = ComplianceValidator::new(&config).unwrap();
        let report = validator.validate().data.unwrap();
        assert!(report.is_compliant);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("stray"));

        validator.fix();
        assert!(config.assets_root.join("stray/inner").is_dir());
    }

    #[test]
    fn test_assets_inside_notes_root_are_not_notes() {
        let (_temp_dir, config) = setup();
        write(&config.notes_root.join("a.md"));
        write(&config.assets_root.join("a/attached.md"));

        let validator = ComplianceValidator::new(&config).unwrap();
        let report = validator.validate().data.unwrap();
        assert_eq!(report.checked, 1);
        assert!(report.is_compliant);
    }

    #[test]
    fn test_validate_dir_scope() {
        let (_temp_dir, config) = setup();
        write(&config.notes_root.join("a.md"));
        write(&config.notes_root.join("cat/b.md"));
        fs::create_dir_all(config.assets_root.join("cat.assets/b")).unwrap();

        let validator = ComplianceValidator::new(&config).unwrap();
        assert!(validator.validate_dir(&config.notes_root.join("cat")).unwrap().is_compliant);
        assert!(!validator.validate_dir(&config.notes_root).unwrap().is_compliant);
    }

    #[test]
    fn test_missing_notes_root() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::new(temp_dir.path().join("nope"), temp_dir.path().join("assets"));
        let validator = ComplianceValidator::new(&config).unwrap();
        let result = validator.validate();
        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::NotFound));
    }
}
