//! Consistency check between exported ABIs, storage layouts and the
//! upgradeable contracts allow-list
//!
//! A contract exposing `initialize` is meant to live behind a proxy, so it must
//! be on the allow-list; every allow-listed contract must have a storage
//! layout snapshot to diff upgrades against.

use std::{
    collections::BTreeSet,
    fmt::{self, Display},
    fs,
    path::{Path, PathBuf},
};

use alloy::json_abi::JsonAbi;

use crate::{
    config::AllowList,
    constants::{INITIALIZER_FN, JSON_EXTENSION},
    errors::DeployError,
};

/// The problems found by [`check_upgradeable_contracts`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Contracts with an initializer that are not on the allow-list
    pub unmarked: Vec<String>,
    /// Allow-listed contracts without a storage layout
    pub missing_layouts: Vec<String>,
}

impl AuditReport {
    /// Whether nothing was found
    pub fn is_clean(&self) -> bool {
        self.unmarked.is_empty() && self.missing_layouts.is_empty()
    }
}

impl Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.unmarked.is_empty() {
            writeln!(f, "mark as upgradeable: {}", self.unmarked.join(", "))?;
        }
        if !self.missing_layouts.is_empty() {
            writeln!(f, "update storage layouts for: {}", self.missing_layouts.join(", "))?;
        }
        Ok(())
    }
}

/// Audit the ABIs in `abi_dir` and the layouts in `storage_layout_dir`
/// against the allow-list
///
/// Fails with [`DeployError::Io`] if either directory is missing; the
/// returned report collects every violation.
pub fn check_upgradeable_contracts(
    abi_dir: &Path,
    storage_layout_dir: &Path,
    allow_list: &AllowList,
) -> Result<AuditReport, DeployError> {
    let abi_files = json_files(abi_dir)?;
    let layouts: BTreeSet<String> = json_files(storage_layout_dir)?
        .iter()
        .filter_map(|path| file_stem(path))
        .collect();

    let mut report = AuditReport::default();
    for path in abi_files {
        let contents = fs::read_to_string(&path)
            .map_err(|e| DeployError::Io(format!("{}: {e}", path.display())))?;
        let abi: JsonAbi = serde_json::from_str(&contents)
            .map_err(|e| DeployError::Artifact(format!("{}: {e}", path.display())))?;

        let Some(name) = file_stem(&path) else { continue };
        if abi.functions.contains_key(INITIALIZER_FN) && !allow_list.contains(&name) {
            report.unmarked.push(name);
        }
    }

    report.missing_layouts = allow_list
        .iter()
        .filter(|name| !layouts.contains(*name))
        .map(str::to_string)
        .collect();

    Ok(report)
}

/// The `.json` files directly under `dir`, sorted
fn json_files(dir: &Path) -> Result<Vec<PathBuf>, DeployError> {
    if !dir.is_dir() {
        return Err(DeployError::Io(format!("{} does not exist", dir.display())));
    }

    let entries =
        fs::read_dir(dir).map_err(|e| DeployError::Io(format!("{}: {e}", dir.display())))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| DeployError::Io(format!("{}: {e}", dir.display())))?
            .path();
        if path.extension().is_some_and(|ext| ext == JSON_EXTENSION) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// The file name without its extension
fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
}
