//! Bulk renaming of already-filed photos.
//!
//! Renames are planned in full before anything touches the disk. When several
//! files would end up with the same name, or the name is already taken, every
//! file in that group gets a ledger suffix (`_a`, `_b`, ...) in file-name
//! order, so no rename can collide at execution time.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::SuffixOverflow;
use crate::ledger::NamingLedger;

/// One row of the mapping CSV: substrings to replace in file names.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RenameMapping {
    pub original: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRename {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct RenamePlan {
    pub operations: Vec<PlannedRename>,
    /// Files left alone, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct RenameResult {
    pub succeeded: Vec<PlannedRename>,
    pub failed: Vec<(PathBuf, String)>,
}

pub fn load_mappings(path: &Path) -> Result<Vec<RenameMapping>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open mapping file {}", path.display()))?;

    let mut mappings = Vec::new();
    for row in reader.deserialize() {
        let mapping: RenameMapping =
            row.with_context(|| format!("Invalid row in mapping file {}", path.display()))?;
        if mapping.original.is_empty() {
            continue;
        }
        mappings.push(mapping);
    }
    Ok(mappings)
}

/// Plan substituting `mapping.new` for `mapping.original` in every file name
/// that contains it. Each file is claimed by the first mapping that matches.
pub fn plan_mapped_renames(directory: &Path, mappings: &[RenameMapping]) -> Result<RenamePlan> {
    let files = list_files(directory)?;
    let mut claimed: HashSet<&PathBuf> = HashSet::new();
    // target name -> sources, both in deterministic order
    let mut targets: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

    for mapping in mappings {
        for file in &files {
            if claimed.contains(file) {
                continue;
            }
            let name = file_name(file);
            if !name.contains(&mapping.original) {
                continue;
            }
            claimed.insert(file);
            let target = name.replace(&mapping.original, &mapping.new);
            targets.entry(target).or_default().push(file.clone());
        }
    }

    let mut plan = RenamePlan::default();
    let mut ledger = NamingLedger::new(SuffixOverflow::Extend);
    let mut taken: HashSet<PathBuf> = HashSet::new();

    for (target, mut sources) in targets {
        sources.sort();
        let plain = directory.join(&target);

        if sources.len() == 1 && (sources[0] == plain || (!plain.exists() && !taken.contains(&plain))) {
            let source = sources.remove(0);
            if source == plain {
                plan.skipped.push((source, "Name unchanged".to_string()));
            } else {
                taken.insert(plain.clone());
                plan.operations.push(PlannedRename {
                    source,
                    destination: plain,
                });
            }
            continue;
        }

        for source in sources {
            let destination = loop {
                let suffix = ledger.next_suffix(&target)?;
                let candidate = directory.join(with_suffix(&target, &suffix));
                if !candidate.exists() && !taken.contains(&candidate) {
                    break candidate;
                }
            };
            taken.insert(destination.clone());
            plan.operations.push(PlannedRename {
                source,
                destination,
            });
        }
    }

    Ok(plan)
}

/// Plan removing a leading `<prefix>_` and a trailing `_a` from file stems.
pub fn plan_prefix_strip(directory: &Path, prefix: &str) -> Result<RenamePlan> {
    let files = list_files(directory)?;
    let leading = format!("{}_", prefix);
    let mut plan = RenamePlan::default();
    let mut taken: HashSet<PathBuf> = HashSet::new();

    for file in files {
        let name = file_name(&file);
        let (stem, extension) = split_extension(&name);

        let without_prefix = stem.strip_prefix(&leading).unwrap_or(stem);
        let stripped = without_prefix.strip_suffix("_a").unwrap_or(without_prefix);
        if stripped == stem {
            continue;
        }
        if stripped.is_empty() {
            plan.skipped.push((file, "Nothing left after stripping".to_string()));
            continue;
        }

        let destination = directory.join(format!("{}{}", stripped, extension));
        if destination.exists() || taken.contains(&destination) {
            plan.skipped
                .push((file, format!("{} already exists", file_name(&destination))));
            continue;
        }

        taken.insert(destination.clone());
        plan.operations.push(PlannedRename {
            source: file,
            destination,
        });
    }

    Ok(plan)
}

/// Apply a plan. Individual failures are collected rather than aborting.
pub fn execute_plan(plan: &RenamePlan) -> RenameResult {
    let mut result = RenameResult::default();

    for op in &plan.operations {
        match fs::rename(&op.source, &op.destination) {
            Ok(()) => {
                info!("Renamed {:?} -> {:?}", op.source, op.destination);
                result.succeeded.push(op.clone());
            }
            Err(e) => {
                warn!("Failed to rename {:?}: {}", op.source, e);
                result.failed.push((op.source.clone(), e.to_string()));
            }
        }
    }

    result
}

fn list_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(directory)
        .with_context(|| format!("Failed to read directory {}", directory.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// `("IMG_1", ".jpg")`; names without a dot have an empty extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

fn with_suffix(name: &str, suffix: &str) -> String {
    let (stem, extension) = split_extension(name);
    format!("{}_{}{}", stem, suffix, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), name).unwrap();
    }

    fn mapping(original: &str, new: &str) -> RenameMapping {
        RenameMapping {
            original: original.to_string(),
            new: new.to_string(),
        }
    }

    fn destinations(plan: &RenamePlan) -> Vec<String> {
        plan.operations
            .iter()
            .map(|op| file_name(&op.destination))
            .collect()
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a_b.jpg"), ("a_b", ".jpg"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
        assert_eq!(with_suffix("12345.jpg", "b"), "12345_b.jpg");
    }

    #[test]
    fn test_unique_targets_rename_plainly() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "IMG_001.jpg");
        touch(dir.path(), "IMG_002.jpg");

        let plan = plan_mapped_renames(
            dir.path(),
            &[mapping("IMG_001", "12345"), mapping("IMG_002", "678")],
        )
        .unwrap();

        let mut names = destinations(&plan);
        names.sort();
        assert_eq!(names, vec!["12345.jpg", "678.jpg"]);
    }

    #[test]
    fn test_shared_target_gets_ledger_suffixes() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "IMG_001.jpg");
        touch(dir.path(), "IMG_002.jpg");

        let plan = plan_mapped_renames(
            dir.path(),
            &[mapping("IMG_002", "12345"), mapping("IMG_001", "12345")],
        )
        .unwrap();

        let pairs: Vec<(String, String)> = plan
            .operations
            .iter()
            .map(|op| (file_name(&op.source), file_name(&op.destination)))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("IMG_001.jpg".to_string(), "12345_a.jpg".to_string()),
                ("IMG_002.jpg".to_string(), "12345_b.jpg".to_string()),
            ]
        );
    }

    #[test]
    fn test_existing_target_is_not_overwritten() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "12345.jpg");
        touch(dir.path(), "12345_a.jpg");
        touch(dir.path(), "IMG_001.jpg");

        let plan = plan_mapped_renames(dir.path(), &[mapping("IMG_001", "12345")]).unwrap();
        assert_eq!(destinations(&plan), vec!["12345_b.jpg"]);

        let result = execute_plan(&plan);
        assert_eq!(result.succeeded.len(), 1);
        assert!(result.failed.is_empty());
        assert_eq!(fs::read_to_string(dir.path().join("12345.jpg")).unwrap(), "12345.jpg");
        assert_eq!(
            fs::read_to_string(dir.path().join("12345_b.jpg")).unwrap(),
            "IMG_001.jpg"
        );
    }

    #[test]
    fn test_load_mappings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("newnames.csv");
        fs::write(&path, "original,new\nIMG_001, 12345\n,ignored\n").unwrap();

        let mappings = load_mappings(&path).unwrap();
        assert_eq!(mappings, vec![mapping("IMG_001", "12345")]);
    }

    #[test]
    fn test_prefix_strip() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "LACMIP_12345_a.jpg");
        touch(dir.path(), "LACMIP_678_Pecten_a.jpg");
        touch(dir.path(), "LACMIP_999_a.jpg");
        touch(dir.path(), "999.jpg");
        touch(dir.path(), "other.jpg");

        let plan = plan_prefix_strip(dir.path(), "LACMIP").unwrap();
        assert_eq!(destinations(&plan), vec!["12345.jpg", "678_Pecten.jpg"]);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(file_name(&plan.skipped[0].0), "LACMIP_999_a.jpg");

        let result = execute_plan(&plan);
        assert_eq!(result.succeeded.len(), 2);
        assert!(dir.path().join("12345.jpg").exists());
        assert!(!dir.path().join("LACMIP_12345_a.jpg").exists());
    }
}
