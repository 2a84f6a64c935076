//! Reference table lookups and taxon label derivation.
//!
//! Rows are validated once at load time: the rank string becomes a
//! [`TaxonRank`] (sub-ranks folded onto their parent) so resolution is a plain
//! field selection afterwards.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("reference table not found at {0}")]
    Missing(PathBuf),

    #[error("failed to read reference table {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Taxonomic ranks that can supply a filename label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaxonRank {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl FromStr for TaxonRank {
    type Err = String;

    /// Case-insensitive; a leading `Sub` is dropped so `Subfamily` reads as `Family`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let base = lower.strip_prefix("sub").unwrap_or(&lower);
        match base {
            "kingdom" => Ok(TaxonRank::Kingdom),
            "phylum" => Ok(TaxonRank::Phylum),
            "class" => Ok(TaxonRank::Class),
            "order" => Ok(TaxonRank::Order),
            "family" => Ok(TaxonRank::Family),
            "genus" => Ok(TaxonRank::Genus),
            "species" => Ok(TaxonRank::Species),
            _ => Err(format!("unrecognised taxon rank '{}'", s.trim())),
        }
    }
}

impl fmt::Display for TaxonRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaxonRank::Kingdom => "Kingdom",
            TaxonRank::Phylum => "Phylum",
            TaxonRank::Class => "Class",
            TaxonRank::Order => "Order",
            TaxonRank::Family => "Family",
            TaxonRank::Genus => "Genus",
            TaxonRank::Species => "Species",
        };
        f.write_str(name)
    }
}

/// One row of `taxonomy.csv`. Columns other than `catalogNumber` may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyRecord {
    pub catalog_number: String,
    #[serde(default)]
    pub kingdom: Option<String>,
    #[serde(default)]
    pub phylum: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub genus: Option<String>,
    #[serde(default)]
    pub specific_epithet: Option<String>,
    #[serde(default)]
    pub taxon_rank: Option<String>,
}

impl TaxonomyRecord {
    /// Column value for a single-name rank, `None` when blank.
    fn rank_value(&self, rank: TaxonRank) -> Option<&str> {
        let value = match rank {
            TaxonRank::Kingdom => &self.kingdom,
            TaxonRank::Phylum => &self.phylum,
            TaxonRank::Class => &self.class,
            TaxonRank::Order => &self.order,
            TaxonRank::Family => &self.family,
            TaxonRank::Genus => &self.genus,
            TaxonRank::Species => &self.specific_epithet,
        };
        non_blank(value)
    }
}

#[derive(Debug, Clone)]
struct TaxonEntry {
    record: TaxonomyRecord,
    rank: Option<TaxonRank>,
}

/// Read-only snapshot of the reference table, keyed by catalog number.
#[derive(Debug, Default)]
pub struct TaxonomyTable {
    entries: HashMap<String, TaxonEntry>,
}

impl TaxonomyTable {
    pub fn load(path: &Path) -> Result<Self, TaxonomyError> {
        if !path.exists() {
            return Err(TaxonomyError::Missing(path.to_path_buf()));
        }

        let malformed = |source| TaxonomyError::Malformed {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(malformed)?;

        let mut records = Vec::new();
        for row in reader.deserialize::<TaxonomyRecord>() {
            records.push(row.map_err(malformed)?);
        }

        let table = Self::from_records(records);
        info!("Loaded {} taxonomy records from {:?}", table.len(), path);
        Ok(table)
    }

    /// Build a table; the first row for a catalog number wins.
    pub fn from_records(records: impl IntoIterator<Item = TaxonomyRecord>) -> Self {
        let mut entries = HashMap::new();

        for record in records {
            let rank = match non_blank(&record.taxon_rank) {
                Some(raw) => match raw.parse::<TaxonRank>() {
                    Ok(rank) => Some(rank),
                    Err(e) => {
                        warn!("{}: {}", record.catalog_number, e);
                        None
                    }
                },
                None => None,
            };

            if entries.contains_key(&record.catalog_number) {
                debug!("Ignoring duplicate row for {}", record.catalog_number);
                continue;
            }
            entries.insert(record.catalog_number.clone(), TaxonEntry { record, rank });
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Derive the filename label for a catalog number.
    ///
    /// Returns `None` for unknown catalog numbers, unrecognised ranks, blank
    /// label columns, and rows at rank Kingdom whose kingdom is `Unknown`.
    pub fn resolve(&self, catalog_number: &str) -> Option<String> {
        let entry = self.entries.get(catalog_number)?;
        let record = &entry.record;

        let label = match entry.rank? {
            TaxonRank::Species => {
                let genus = record.rank_value(TaxonRank::Genus)?;
                let epithet = record.rank_value(TaxonRank::Species)?;
                format!("{}_{}", genus, epithet)
            }
            TaxonRank::Kingdom if non_blank(&record.kingdom) == Some("Unknown") => return None,
            rank => record.rank_value(rank)?.to_string(),
        };

        Some(label.split_whitespace().collect::<Vec<_>>().join("_"))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
