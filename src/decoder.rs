//! Barcode decoding seam.
//!
//! The batch only needs "image in, payload strings out"; the symbology work
//! is delegated to an external decoder behind [`BarcodeDecoder`].
//! [`MultiFormatDecoder`] reads the 1-D label symbologies (Code 128, Code 39,
//! EAN/UPC, ...) as well as QR and Data Matrix. [`QrDecoder`] reads QR only.

use image::GrayImage;
use rqrr::PreparedImage;
use tracing::debug;

use crate::config::{DecoderBackend, DecoderConfig};

/// Decodes every barcode found in a prepared image, in detection order.
pub trait BarcodeDecoder: Send + Sync {
    fn decode(&self, image: &GrayImage) -> Vec<String>;
}

impl BarcodeDecoder for Box<dyn BarcodeDecoder> {
    fn decode(&self, image: &GrayImage) -> Vec<String> {
        (**self).decode(image)
    }
}

/// Build the decoder selected by `[decoder] backend`.
pub fn from_config(config: &DecoderConfig) -> Box<dyn BarcodeDecoder> {
    match config.backend {
        DecoderBackend::Multi => Box::new(MultiFormatDecoder),
        DecoderBackend::Qr => Box::new(QrDecoder),
    }
}

/// Every symbology `rxing` supports, 1-D and 2-D.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiFormatDecoder;

impl BarcodeDecoder for MultiFormatDecoder {
    fn decode(&self, image: &GrayImage) -> Vec<String> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Vec::new();
        }

        match rxing::helpers::detect_multiple_in_luma(image.as_raw().clone(), w, h) {
            Ok(results) => {
                for result in &results {
                    debug!("Read {} symbol", result.getBarcodeFormat());
                }
                clean_payloads(results.iter().map(|r| r.getText().to_string()))
            }
            Err(e) => {
                debug!("No symbols found: {:?}", e);
                Vec::new()
            }
        }
    }
}

/// QR decoder backed by `rqrr`.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecoder;

impl BarcodeDecoder for QrDecoder {
    fn decode(&self, image: &GrayImage) -> Vec<String> {
        let (w, h) = (image.width() as usize, image.height() as usize);
        if w == 0 || h == 0 {
            return Vec::new();
        }

        let raw = image.as_raw();
        let mut prepared = PreparedImage::prepare_from_greyscale(w, h, |x, y| raw[y * w + x]);
        let grids = prepared.detect_grids();
        debug!("Detected {} candidate grids", grids.len());

        let payloads = grids.iter().filter_map(|grid| match grid.decode() {
            Ok((_, content)) => Some(content),
            Err(e) => {
                debug!("Grid failed to decode: {:?}", e);
                None
            }
        });

        clean_payloads(payloads)
    }
}

/// Trim payloads and drop the empty ones.
pub fn clean_payloads(payloads: impl IntoIterator<Item = String>) -> Vec<String> {
    payloads
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_blank_image_has_no_payloads() {
        let image = GrayImage::from_pixel(64, 64, Luma([255]));
        assert!(QrDecoder.decode(&image).is_empty());
    }

    #[test]
    fn test_empty_image_has_no_payloads() {
        let image = GrayImage::new(0, 0);
        assert!(QrDecoder.decode(&image).is_empty());
    }

    #[test]
    fn test_multi_format_blank_and_empty_images() {
        assert!(MultiFormatDecoder
            .decode(&GrayImage::from_pixel(64, 64, Luma([255])))
            .is_empty());
        assert!(MultiFormatDecoder.decode(&GrayImage::new(0, 0)).is_empty());
    }

    #[test]
    fn test_from_config_selects_backend() {
        let image = GrayImage::from_pixel(32, 32, Luma([255]));
        for backend in [DecoderBackend::Multi, DecoderBackend::Qr] {
            let decoder = from_config(&DecoderConfig { backend });
            assert!(decoder.decode(&image).is_empty());
        }
    }

    /// Code 39 for "12345": start/stop `*`, narrow = 1, wide = 3 modules.
    fn code39_12345() -> GrayImage {
        // bar/space widths per character, bar first, 9 elements each
        const PATTERNS: [(char, &str); 6] = [
            ('*', "nwnnwnwnn"),
            ('1', "wnnwnnnnw"),
            ('2', "nnwwnnnnw"),
            ('3', "wnwwnnnnn"),
            ('4', "nnnwwnnnw"),
            ('5', "wnnwwnnnn"),
        ];
        let module = 3u32;
        let quiet = 20 * module;
        let mut runs: Vec<(bool, u32)> = vec![(false, quiet)];
        for ch in ['*', '1', '2', '3', '4', '5', '*'] {
            let (_, pattern) = PATTERNS.iter().find(|(c, _)| *c == ch).unwrap();
            for (i, element) in pattern.chars().enumerate() {
                let width = if element == 'w' { 3 * module } else { module };
                runs.push((i % 2 == 0, width));
            }
            runs.push((false, module));
        }
        runs.push((false, quiet));

        let width: u32 = runs.iter().map(|(_, w)| w).sum();
        let height = 80;
        let mut columns = Vec::with_capacity(width as usize);
        for (is_bar, w) in runs {
            columns.extend(std::iter::repeat(if is_bar { 0u8 } else { 255u8 }).take(w as usize));
        }
        GrayImage::from_fn(width, height, |x, _| Luma([columns[x as usize]]))
    }

    #[test]
    fn test_multi_format_reads_code39() {
        let payloads = MultiFormatDecoder.decode(&code39_12345());
        assert_eq!(payloads, vec!["12345"]);
    }

    #[test]
    fn test_clean_payloads() {
        let cleaned = clean_payloads(vec![" 12345\n".to_string(), "  ".to_string(), "LABELS".to_string()]);
        assert_eq!(cleaned, vec!["12345", "LABELS"]);
    }
}
