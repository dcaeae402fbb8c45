//! Image answers compared by root-mean-square pixel difference.
//!
//! Both images are cropped to the same box and reduced to the configured
//! colour mode, with channel values scaled to `0.0..=1.0`. Two images whose
//! cropped sizes differ never match. Otherwise the output matches when
//! `rms(expected - actual) <= threshold`; the default threshold is 1% of
//! `rms(expected)`.

use super::OutputMatcher;
use code_runner::kernel::OutputEvent;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Luma at or above this is white in [`ColourMode::Binary`].
const BINARY_CUTOFF: u8 = 128;

const DEFAULT_THRESHOLD_RATIO: f64 = 0.01;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColourMode {
    #[default]
    Rgb,
    Grey,
    /// Black and white only.
    Binary,
}

/// Pixel box `(left, upper, right, lower)`; right and lower are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct CropBox {
    pub left: u32,
    pub upper: u32,
    pub right: u32,
    pub lower: u32,
}

impl From<[u32; 4]> for CropBox {
    fn from([left, upper, right, lower]: [u32; 4]) -> Self {
        Self {
            left,
            upper,
            right,
            lower,
        }
    }
}

impl From<CropBox> for [u32; 4] {
    fn from(b: CropBox) -> Self {
        [b.left, b.upper, b.right, b.lower]
    }
}

/// An image reduced to comparable channel values.
#[derive(Debug, Clone, PartialEq)]
struct Prepared {
    width: u32,
    height: u32,
    values: Vec<f64>,
}

fn prepare(image: &DynamicImage, crop: Option<CropBox>, mode: ColourMode) -> Prepared {
    let view = match crop {
        Some(b) => image.crop_imm(
            b.left,
            b.upper,
            b.right.saturating_sub(b.left),
            b.lower.saturating_sub(b.upper),
        ),
        None => image.clone(),
    };
    let scale = |v: u8| f64::from(v) / 255.0;
    let values = match mode {
        ColourMode::Rgb => view.to_rgb8().into_raw().into_iter().map(scale).collect(),
        ColourMode::Grey => view.to_luma8().into_raw().into_iter().map(scale).collect(),
        ColourMode::Binary => view
            .to_luma8()
            .into_raw()
            .into_iter()
            .map(|v| if v >= BINARY_CUTOFF { 1.0 } else { 0.0 })
            .collect(),
    };
    Prepared {
        width: view.width(),
        height: view.height(),
        values,
    }
}

/// Root mean square of `values`; 0 for an empty image.
pub fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

#[derive(Debug, Clone)]
pub struct ImageAnswer {
    pub mark: f64,
    pub name: Option<String>,
    crop: Option<CropBox>,
    mode: ColourMode,
    threshold: f64,
    expected: Prepared,
}

impl ImageAnswer {
    pub fn new(mark: f64, expected: &DynamicImage, crop: Option<CropBox>, mode: ColourMode) -> Self {
        let expected = prepare(expected, crop, mode);
        let threshold = DEFAULT_THRESHOLD_RATIO * rms(&expected.values);
        Self {
            mark,
            name: None,
            crop,
            mode,
            threshold,
            expected,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// RMS difference to `image`, or `None` if the cropped sizes differ.
    pub fn rms_diff(&self, image: &DynamicImage) -> Option<f64> {
        let actual = prepare(image, self.crop, self.mode);
        if (actual.width, actual.height) != (self.expected.width, self.expected.height) {
            return None;
        }
        let diffs: Vec<f64> = self
            .expected
            .values
            .iter()
            .zip(&actual.values)
            .map(|(e, a)| e - a)
            .collect();
        Some(rms(&diffs))
    }
}

impl OutputMatcher for ImageAnswer {
    fn matches(&self, output: &OutputEvent) -> bool {
        output
            .image()
            .and_then(|image| self.rms_diff(image))
            .is_some_and(|diff| diff <= self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::test_support::{picture, text};
    use image::{Rgb, RgbImage};

    fn gradient() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(40, 30, |x, y| {
            Rgb([(x * 6) as u8, (y * 8) as u8, 120])
        }))
    }

    #[test]
    fn test_identical_image_matches() {
        let answer = ImageAnswer::new(10.0, &gradient(), Some([5, 5, 35, 25].into()), ColourMode::Rgb);
        assert!(answer.matches(&picture(gradient())));
        assert_eq!(answer.rms_diff(&gradient()), Some(0.0));
    }

    #[test]
    fn test_inverted_region_does_not_match() {
        let answer = ImageAnswer::new(10.0, &gradient(), None, ColourMode::Rgb);
        let mut altered = gradient().to_rgb8();
        for x in 0..10 {
            for y in 0..10 {
                let Rgb([r, g, b]) = *altered.get_pixel(x, y);
                altered.put_pixel(x, y, Rgb([255 - r, 255 - g, 255 - b]));
            }
        }
        assert!(!answer.matches(&picture(DynamicImage::ImageRgb8(altered))));
    }

    #[test]
    fn test_changes_outside_crop_are_ignored() {
        let crop = CropBox::from([10, 10, 30, 20]);
        let answer = ImageAnswer::new(1.0, &gradient(), Some(crop), ColourMode::Grey);
        let mut altered = gradient().to_rgb8();
        altered.put_pixel(0, 0, Rgb([0, 0, 0]));
        altered.put_pixel(39, 29, Rgb([255, 255, 255]));
        assert!(answer.matches(&picture(DynamicImage::ImageRgb8(altered))));
    }

    #[test]
    fn test_size_mismatch_never_matches() {
        let answer = ImageAnswer::new(1.0, &gradient(), None, ColourMode::Rgb).with_threshold(1.0);
        let small = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        assert_eq!(answer.rms_diff(&small), None);
        assert!(!answer.matches(&picture(small)));
        assert!(!answer.matches(&text("plot")));
    }

    #[test]
    fn test_binary_mode_ignores_shading() {
        let light = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([200, 200, 200])));
        let lighter = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([250, 250, 250])));
        let answer = ImageAnswer::new(1.0, &light, None, ColourMode::Binary);
        assert!(answer.matches(&picture(lighter.clone())));
        let rgb = ImageAnswer::new(1.0, &light, None, ColourMode::Rgb);
        assert!(!rgb.matches(&picture(lighter)));
    }

    #[test]
    fn test_crop_box_serde() {
        let b: CropBox = serde_json::from_str("[44, 81, 800, 770]").unwrap();
        assert_eq!(b, CropBox { left: 44, upper: 81, right: 800, lower: 770 });
        assert_eq!(serde_json::to_string(&b).unwrap(), "[44,81,800,770]");
    }
}
