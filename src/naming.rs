//! Output filename construction.
//!
//! Successes are named `{prefix}_{catalog}_{taxon}_{suffix}.jpg`, with the
//! taxon segment dropped when there is none. Failures keep the original stem
//! and are stamped with the run date.

/// Appended to the catalog segment of label-only photos.
pub const LABELS_MARKER: &str = "labels";

/// Characters that cannot appear in a filename on common filesystems.
const INVALID_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Components of a success filename.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecimenFilename {
    pub prefix: String,
    /// Raw barcode value, `.` separators not yet replaced.
    pub barcode: String,
    pub taxon: Option<String>,
    pub suffix: String,
}

impl SpecimenFilename {
    pub fn to_filename(&self) -> String {
        let mut parts = Vec::new();

        if !self.prefix.is_empty() {
            parts.push(sanitize_component(&self.prefix));
        }

        parts.push(format_catalog_number(&self.barcode));

        if let Some(taxon) = &self.taxon {
            let taxon = sanitize_component(taxon);
            if !taxon.is_empty() {
                parts.push(taxon);
            }
        }

        parts.push(self.suffix.clone());

        format!("{}.jpg", parts.join("_"))
    }
}

/// Filesystem form of a catalog number: `.` becomes `-`.
pub fn format_catalog_number(raw: &str) -> String {
    sanitize_component(&raw.replace('.', "-"))
}

/// Key used to find a barcode in the reference table, e.g. `LACMIP 12345`.
pub fn lookup_key(prefix: &str, barcode: &str) -> String {
    if prefix.is_empty() {
        barcode.to_string()
    } else {
        format!("{} {}", prefix, barcode)
    }
}

/// Barcode value for a label-only photo, e.g. `99_labels`.
pub fn labels_barcode(barcode: &str) -> String {
    format!("{}_{}", barcode, LABELS_MARKER)
}

pub fn failure_filename(original_stem: &str, run_date: &str) -> String {
    format!("{}_{}_FAILURE.jpg", sanitize_component(original_stem), run_date)
}

/// Replace path separators and other reserved characters, collapse whitespace.
fn sanitize_component(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if INVALID_CHARS.contains(&c) { '_' } else { c })
        .collect();

    replaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_species_filename() {
        let name = SpecimenFilename {
            prefix: "LACMIP".to_string(),
            barcode: "12345".to_string(),
            taxon: Some("Trigonia_hondana".to_string()),
            suffix: "a".to_string(),
        };
        assert_eq!(name.to_filename(), "LACMIP_12345_Trigonia_hondana_a.jpg");
    }

    #[test]
    fn test_missing_taxon_drops_segment() {
        let name = SpecimenFilename {
            prefix: "LACMIP".to_string(),
            barcode: "12345".to_string(),
            taxon: None,
            suffix: "b".to_string(),
        };
        assert_eq!(name.to_filename(), "LACMIP_12345_b.jpg");
    }

    #[test]
    fn test_labels_filename() {
        let name = SpecimenFilename {
            prefix: "LACMIP".to_string(),
            barcode: labels_barcode("99"),
            taxon: None,
            suffix: "a".to_string(),
        };
        assert_eq!(name.to_filename(), "LACMIP_99_labels_a.jpg");
    }

    #[test]
    fn test_catalog_number_separator() {
        assert_eq!(format_catalog_number("1234.5"), "1234-5");
        assert_eq!(format_catalog_number("12/34"), "12_34");
    }

    #[test]
    fn test_lookup_key() {
        assert_eq!(lookup_key("LACMIP", "12345"), "LACMIP 12345");
        assert_eq!(lookup_key("", "12345"), "12345");
        assert_eq!(lookup_key("LACMIP", "1234.5"), "LACMIP 1234.5");
    }

    #[test]
    fn test_failure_filename() {
        assert_eq!(
            failure_filename("IMG_0042", "2024-03-15"),
            "IMG_0042_2024-03-15_FAILURE.jpg"
        );
    }
}
