//! Batch orchestration: one pass over an input directory.
//!
//! Each photo is loaded, prepared, decoded, named and filed before the next
//! one starts. With `parallel_decode` the load/prepare/decode stage fans out
//! over a thread pool first, but naming and filing still run in discovery
//! order so suffixes never depend on completion order.

pub mod discovery;
pub mod layout;
pub mod records;

use anyhow::Result;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::decoder::BarcodeDecoder;
use crate::ledger::{LedgerError, NamingLedger};
use crate::naming::{self, SpecimenFilename};
use crate::preprocess::preprocess_for_decode;
use crate::taxonomy::TaxonomyTable;

pub use discovery::discover_photos;
pub use layout::{OutputLayout, RunDate};
pub use records::{append_run_record, RunStats};

/// Payload that marks a photo of specimen labels rather than the specimen.
pub const LABELS_SENTINEL: &str = "LABELS";

/// Reasons a single photo lands in the failures directory.
#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("cannot load {path} as an image: {source}")]
    DecodeInput {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no barcode decoded")]
    NoBarcode,

    #[error("only the LABELS marker was decoded")]
    LabelsWithoutCatalogNumber,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// What the decoded payloads say about a photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarcodeRead {
    Specimen { barcode: String },
    Labels { barcode: String },
}

impl BarcodeRead {
    /// Interpret decoded payloads: the first non-sentinel payload is the
    /// catalog number, and any `LABELS` payload marks a label-only photo.
    pub fn classify(payloads: &[String]) -> Result<Self, PhotoError> {
        if payloads.is_empty() {
            return Err(PhotoError::NoBarcode);
        }

        let is_labels = payloads.iter().any(|p| p == LABELS_SENTINEL);
        let barcode = payloads
            .iter()
            .find(|p| p.as_str() != LABELS_SENTINEL)
            .cloned()
            .ok_or(PhotoError::LabelsWithoutCatalogNumber)?;

        Ok(if is_labels {
            BarcodeRead::Labels { barcode }
        } else {
            BarcodeRead::Specimen { barcode }
        })
    }
}

#[derive(Debug)]
pub enum PhotoOutcome {
    Success {
        /// Ledger key, e.g. `12345` or `99_labels`.
        barcode: String,
        taxon: Option<String>,
        destination: PathBuf,
    },
    Failure {
        reason: PhotoError,
        destination: PathBuf,
    },
}

#[derive(Debug)]
pub struct PhotoReport {
    pub source: PathBuf,
    pub outcome: PhotoOutcome,
    /// Where the original went under the move policy.
    pub archived_to: Option<PathBuf>,
}

impl PhotoReport {
    /// `<stem>: <barcode>` for successes, `<stem>: Null` for failures.
    pub fn status_line(&self) -> String {
        let stem = file_stem(&self.source);
        match &self.outcome {
            PhotoOutcome::Success { barcode, .. } => format!("{}: {}", stem, barcode),
            PhotoOutcome::Failure { .. } => format!("{}: Null", stem),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, PhotoOutcome::Success { .. })
    }
}

#[derive(Debug)]
pub enum BatchProgress {
    Started { total_files: usize },
    Photo { current: usize, total: usize, status: String },
    Completed { stats: RunStats },
}

#[derive(Debug)]
pub struct BatchResult {
    pub stats: RunStats,
    pub reports: Vec<PhotoReport>,
    /// Whether a row was appended to the run ledger.
    pub recorded: bool,
    pub elapsed: Duration,
}

/// Mutable state that lives for exactly one run.
#[derive(Debug)]
pub struct RunState {
    pub ledger: NamingLedger,
    pub stats: RunStats,
}

impl RunState {
    pub fn new(config: &Config, date: &RunDate) -> Self {
        Self {
            ledger: NamingLedger::new(config.ledger.overflow),
            stats: RunStats::new(date.timestamp()),
        }
    }
}

pub struct BatchRunner<D: BarcodeDecoder> {
    config: Config,
    decoder: D,
    taxonomy: TaxonomyTable,
    layout: OutputLayout,
    date: RunDate,
}

impl<D: BarcodeDecoder> BatchRunner<D> {
    pub fn new(config: Config, decoder: D, taxonomy: TaxonomyTable, date: RunDate) -> Self {
        let layout = OutputLayout::new(&config.output_root(), &config.output, &date);
        Self {
            config,
            decoder,
            taxonomy,
            layout,
            date,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Process every photo in the input directory.
    ///
    /// Per-photo problems become failures; output I/O errors abort the run.
    pub fn run(&self, progress_tx: Option<mpsc::Sender<BatchProgress>>) -> Result<BatchResult> {
        let start = Instant::now();

        self.layout.ensure_dirs()?;
        let photos = discover_photos(&self.config.input_dir, &self.config.image_extensions)?;
        let total = photos.len();
        info!("Found {} photos in {:?}", total, self.config.input_dir);

        if let Some(ref tx) = progress_tx {
            let _ = tx.send(BatchProgress::Started { total_files: total });
        }

        let mut predecoded: Vec<Option<Result<Vec<String>, PhotoError>>> =
            if self.config.parallel_decode {
                photos
                    .par_iter()
                    .map(|path| Some(self.read_barcodes(path)))
                    .collect()
            } else {
                Vec::new()
            };

        let mut state = RunState::new(&self.config, &self.date);
        let mut reports = Vec::with_capacity(total);

        for (index, path) in photos.iter().enumerate() {
            let payloads = match predecoded.get_mut(index).and_then(Option::take) {
                Some(payloads) => payloads,
                None => self.read_barcodes(path),
            };

            let report = self.file_photo(path, payloads, &mut state)?;

            if let Some(ref tx) = progress_tx {
                let _ = tx.send(BatchProgress::Photo {
                    current: index + 1,
                    total,
                    status: report.status_line(),
                });
            }
            reports.push(report);
        }

        let recorded = append_run_record(&self.config.records_path(), &state.stats)?;

        info!(
            "Run finished: {} successes, {} failures, {} total",
            state.stats.successes, state.stats.failures, state.stats.total
        );

        if let Some(ref tx) = progress_tx {
            let _ = tx.send(BatchProgress::Completed {
                stats: state.stats.clone(),
            });
        }

        Ok(BatchResult {
            stats: state.stats,
            reports,
            recorded,
            elapsed: start.elapsed(),
        })
    }

    /// Load a photo as grayscale, prepare it, and run the decoder once.
    pub fn read_barcodes(&self, path: &Path) -> Result<Vec<String>, PhotoError> {
        let image = image::open(path)
            .map_err(|source| PhotoError::DecodeInput {
                path: path.to_path_buf(),
                source,
            })?
            .to_luma8();

        let prepared = preprocess_for_decode(&image, &self.config.preprocess);
        Ok(self.decoder.decode(&prepared))
    }

    /// Name a decoded photo, resolving its taxon unless it is a label shot.
    fn name_photo(
        &self,
        read: BarcodeRead,
        ledger: &mut NamingLedger,
    ) -> Result<(String, String, Option<String>), PhotoError> {
        let (barcode, taxon) = match read {
            BarcodeRead::Specimen { barcode } => {
                let key = naming::lookup_key(&self.config.collection_prefix, &barcode);
                let taxon = self.taxonomy.resolve(&key);
                if taxon.is_none() {
                    info!("No taxon for {}", key);
                }
                (barcode, taxon)
            }
            BarcodeRead::Labels { barcode } => (naming::labels_barcode(&barcode), None),
        };

        // Distinct raw barcodes can format to the same name, and earlier runs
        // may share this partition, so taken suffixes are skipped.
        let filename = loop {
            let filename = SpecimenFilename {
                prefix: self.config.collection_prefix.clone(),
                barcode: barcode.clone(),
                taxon: taxon.clone(),
                suffix: ledger.next_suffix(&barcode)?,
            }
            .to_filename();

            if !self.layout.successes.join(&filename).exists() {
                break filename;
            }
            debug!("{} already filed, trying the next suffix", filename);
        };

        Ok((filename, barcode, taxon))
    }

    fn file_photo(
        &self,
        path: &Path,
        payloads: Result<Vec<String>, PhotoError>,
        state: &mut RunState,
    ) -> Result<PhotoReport> {
        let named = payloads
            .and_then(|payloads| BarcodeRead::classify(&payloads))
            .and_then(|read| self.name_photo(read, &mut state.ledger));

        let outcome = match named {
            Ok((filename, barcode, taxon)) => {
                let destination = self
                    .layout
                    .copy_into(path, &self.layout.successes, &filename)?;
                state.stats.record_success();
                info!("{:?} -> {}", path, filename);
                PhotoOutcome::Success {
                    barcode,
                    taxon,
                    destination,
                }
            }
            Err(reason) => {
                let filename = naming::failure_filename(&file_stem(path), &self.date.date());
                let destination = self
                    .layout
                    .copy_into(path, &self.layout.failures, &filename)?;
                state.stats.record_failure();
                warn!("{:?} failed: {}", path, reason);
                PhotoOutcome::Failure {
                    reason,
                    destination,
                }
            }
        };

        let archived_to = self.layout.retire_original(path)?;

        Ok(PhotoReport {
            source: path.to_path_buf(),
            outcome,
            archived_to,
        })
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
