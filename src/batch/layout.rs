//! Output directory layout and handling of processed originals.
//!
//! ```text
//! <root>/
//! ├── successes/2024-03_successes/LACMIP_12345_Trigonia_hondana_a.jpg
//! ├── failures/2024-03_failures/IMG_0042_2024-03-15_FAILURE.jpg
//! └── originals/2024-03-15_originals/IMG_0041.jpg
//! ```

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::{ArchivePolicy, OutputConfig, Partition};

/// Dates stamped on directories, failure filenames and the run record.
#[derive(Debug, Clone)]
pub struct RunDate {
    started_at: NaiveDateTime,
}

impl RunDate {
    pub fn now() -> Self {
        Self::at(Local::now().naive_local())
    }

    pub fn at(started_at: NaiveDateTime) -> Self {
        Self { started_at }
    }

    /// `YYYY-MM-DD`
    pub fn date(&self) -> String {
        self.started_at.format("%Y-%m-%d").to_string()
    }

    /// `YYYY-MM`
    pub fn month(&self) -> String {
        self.started_at.format("%Y-%m").to_string()
    }

    pub fn timestamp(&self) -> String {
        self.started_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn partition(&self, partition: Partition) -> String {
        match partition {
            Partition::Month => self.month(),
            Partition::Day => self.date(),
        }
    }
}

/// Resolved output directories for one run.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub successes: PathBuf,
    pub failures: PathBuf,
    pub originals: PathBuf,
    archive: ArchivePolicy,
}

impl OutputLayout {
    pub fn new(root: &Path, config: &OutputConfig, date: &RunDate) -> Self {
        let partition = date.partition(config.partition);
        Self {
            successes: root
                .join("successes")
                .join(format!("{}_successes", partition)),
            failures: root.join("failures").join(format!("{}_failures", partition)),
            originals: root
                .join("originals")
                .join(format!("{}_originals", date.date())),
            archive: config.archive,
        }
    }

    /// Create the output directories the run will write into.
    pub fn ensure_dirs(&self) -> Result<()> {
        let mut dirs = vec![&self.successes, &self.failures];
        if self.archive == ArchivePolicy::Move {
            dirs.push(&self.originals);
        }
        for dir in dirs {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn archive_policy(&self) -> ArchivePolicy {
        self.archive
    }

    /// Copy a photo's bytes into `dir`, returning the new path.
    ///
    /// An existing file is never replaced: a taken `filename` becomes
    /// `<stem>_<n>.<ext>` for the first free `n`.
    pub fn copy_into(&self, source: &Path, dir: &Path, filename: &str) -> Result<PathBuf> {
        let destination = free_name(dir, filename);
        if destination.file_name() != Some(std::ffi::OsStr::new(filename)) {
            warn!("{} already exists, writing {:?}", filename, destination);
        }
        fs::copy(source, &destination).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                source.display(),
                destination.display()
            )
        })?;
        Ok(destination)
    }

    /// Remove the original from the input directory according to the archive
    /// policy. Returns the archived path when the file was moved.
    pub fn retire_original(&self, path: &Path) -> Result<Option<PathBuf>> {
        match self.archive {
            ArchivePolicy::Delete => {
                fs::remove_file(path)
                    .with_context(|| format!("Failed to delete original {}", path.display()))?;
                debug!("Deleted original {:?}", path);
                Ok(None)
            }
            ArchivePolicy::Move => {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let destination = free_name(&self.originals, &file_name);
                move_file(path, &destination)?;
                debug!("Archived original {:?} to {:?}", path, destination);
                Ok(Some(destination))
            }
        }
    }
}

/// `dir/<file_name>`, or `dir/<stem>_<n>.<ext>` for the first free `n`.
fn free_name(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, extension) = match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name.split_at(idx),
        _ => (file_name, ""),
    };

    let mut counter = 1;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, extension));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Rename, falling back to copy + delete across filesystems.
fn move_file(source: &Path, destination: &Path) -> Result<()> {
    match fs::rename(source, destination) {
        Ok(_) => Ok(()),
        Err(_) => {
            fs::copy(source, destination).with_context(|| {
                format!("Failed to copy original {} to archive", source.display())
            })?;
            fs::remove_file(source).with_context(|| {
                format!(
                    "Failed to remove original {} after archiving",
                    source.display()
                )
            })?;
            Ok(())
        }
    }
}
