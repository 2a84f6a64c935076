//! Image preparation for barcode decoding.
//!
//! The decoder copes best with hard black/white edges, so the grayscale photo
//! is levelled, binarised and then sharpened with an unsharp mask. None of
//! this touches the archived file; every step returns a new buffer.

use image::{GrayImage, Luma};

use crate::config::{PreprocessConfig, MAX_KERNEL_SIZE};

/// Run the full decode preparation chain over a copy of `image`.
pub fn preprocess_for_decode(image: &GrayImage, config: &PreprocessConfig) -> GrayImage {
    let levelled = apply_brightness_contrast(image, config.brightness, config.contrast);
    let binary = binarize(&levelled, config.threshold);
    unsharp_mask(
        &binary,
        config.kernel_size,
        config.sigma,
        config.sharpen_amount,
        config.mask_threshold,
    )
}

/// Linear brightness then contrast adjustment; zero for both returns a plain copy.
pub fn apply_brightness_contrast(image: &GrayImage, brightness: i32, contrast: i32) -> GrayImage {
    let mut buf = image.clone();

    if brightness != 0 {
        let brightness = brightness.clamp(-255, 255);
        let (shadow, highlight) = if brightness > 0 {
            (brightness, 255)
        } else {
            (0, 255 + brightness)
        };
        let alpha = (highlight - shadow) as f32 / 255.0;
        let gamma = shadow as f32;
        map_pixels(&mut buf, |v| v * alpha + gamma);
    }

    if contrast != 0 {
        let contrast = contrast.clamp(-127, 127) as f32;
        let f = 131.0 * (contrast + 127.0) / (127.0 * (131.0 - contrast));
        let gamma = 127.0 * (1.0 - f);
        map_pixels(&mut buf, |v| v * f + gamma);
    }

    buf
}

/// Fixed-threshold conversion: values below `threshold` become 0, the rest 255.
pub fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = if pixel.0[0] < threshold { 0 } else { 255 };
    }
    out
}

/// Separable Gaussian blur with reflect-101 borders.
pub fn gaussian_blur(image: &GrayImage, kernel_size: u32, sigma: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let kernel = gaussian_kernel(kernel_size, sigma);
    let radius = (kernel.len() / 2) as isize;
    let (w, h) = (width as usize, height as usize);
    let src = image.as_raw();

    let mut horizontal = vec![0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = reflect_101(x as isize + k as isize - radius, w);
                acc += weight * src[y * w + sx] as f32;
            }
            horizontal[y * w + x] = acc;
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let mut acc = 0.0;
        for (k, weight) in kernel.iter().enumerate() {
            let sy = reflect_101(y as isize + k as isize - radius, h);
            acc += weight * horizontal[sy * w + x];
        }
        Luma([saturate(acc)])
    })
}

/// Unsharp mask: `(amount + 1) * original - amount * blurred`, clamped to 0-255.
///
/// With `mask_threshold > 0`, pixels where the original and the blurred copy
/// differ by less than the threshold keep their original value.
pub fn unsharp_mask(
    image: &GrayImage,
    kernel_size: u32,
    sigma: f32,
    amount: f32,
    mask_threshold: u8,
) -> GrayImage {
    let blurred = gaussian_blur(image, kernel_size, sigma);
    let mut sharpened = image.clone();

    for ((out, orig), blur) in sharpened
        .pixels_mut()
        .zip(image.pixels())
        .zip(blurred.pixels())
    {
        let original = orig.0[0];
        let smooth = blur.0[0];

        if mask_threshold > 0 && original.abs_diff(smooth) < mask_threshold {
            out.0[0] = original;
            continue;
        }

        let value = (amount + 1.0) * original as f32 - amount * smooth as f32;
        out.0[0] = saturate(value);
    }

    sharpened
}

/// Normalised 1-D Gaussian weights. A non-positive sigma is derived from the
/// kernel size; even sizes are bumped to the next odd width.
fn gaussian_kernel(kernel_size: u32, sigma: f32) -> Vec<f32> {
    let size = (kernel_size.max(1) | 1).min(MAX_KERNEL_SIZE) as usize;
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
    };

    let center = (size / 2) as f32;
    let mut weights: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Mirror an out-of-range index without repeating the edge pixel (`gfedcb|abcdefgh|gfedcba`).
fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let i = index.rem_euclid(period);
    if i >= len as isize {
        (period - i) as usize
    } else {
        i as usize
    }
}

fn map_pixels(image: &mut GrayImage, f: impl Fn(f32) -> f32) {
    for pixel in image.pixels_mut() {
        pixel.0[0] = saturate(f(pixel.0[0] as f32));
    }
}

fn saturate(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
