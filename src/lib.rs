//! Barcode-driven filing of herbarium specimen photographs.
//!
//! A run walks an input directory, decodes the barcode on each photo,
//! derives a taxon label from the reference table, and files the photo as
//! `{prefix}_{catalog}_{taxon}_{suffix}.jpg` or as a dated failure.

pub mod batch;
pub mod config;
pub mod decoder;
pub mod ledger;
pub mod logging;
pub mod naming;
pub mod preprocess;
pub mod rename;
pub mod taxonomy;

pub use batch::{BatchProgress, BatchResult, BatchRunner, PhotoError, RunDate, RunStats};
pub use config::Config;
pub use decoder::{BarcodeDecoder, MultiFormatDecoder, QrDecoder};
pub use ledger::{LedgerError, NamingLedger};
pub use taxonomy::{TaxonRank, TaxonomyError, TaxonomyTable};
