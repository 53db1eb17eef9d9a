//! Offline image description from pixel statistics.

use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use vassago_core::{Error, Result};

use crate::model::VisionModel;

/// Side length of the thumbnail used for colour statistics.
const SAMPLE_SIZE: u32 = 64;

const PALETTE: &[(&str, [f32; 3])] = &[
    ("black", [0.0, 0.0, 0.0]),
    ("white", [255.0, 255.0, 255.0]),
    ("gray", [128.0, 128.0, 128.0]),
    ("red", [200.0, 30.0, 30.0]),
    ("green", [40.0, 160.0, 60.0]),
    ("blue", [30.0, 60.0, 200.0]),
    ("yellow", [230.0, 210.0, 40.0]),
    ("orange", [240.0, 140.0, 30.0]),
    ("purple", [130.0, 50.0, 160.0]),
    ("pink", [240.0, 150.0, 190.0]),
    ("brown", [120.0, 75.0, 40.0]),
    ("cyan", [40.0, 200.0, 210.0]),
];

/// Measured properties of an image.
#[derive(Debug, Clone, PartialEq)]
struct Summary {
    width: u32,
    height: u32,
    orientation: &'static str,
    colour: &'static str,
    brightness: &'static str,
}

/// Sides within 10% of each other count as square.
fn orientation(width: u32, height: u32) -> &'static str {
    let (width, height) = (u64::from(width), u64::from(height));
    if width * 10 > height * 11 {
        "landscape"
    } else if height * 10 > width * 11 {
        "portrait"
    } else {
        "square"
    }
}

impl Summary {
    /// Measures `image` on the blocking pool.
    async fn measure(image: Arc<DynamicImage>) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::of(&image))
            .await
            .map_err(|e| Error::vision(format!("image analysis crashed: {e}")))
    }

    fn of(image: &DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let orientation = orientation(width, height);

        let sample = image.thumbnail(SAMPLE_SIZE, SAMPLE_SIZE).to_rgb8();
        #[allow(clippy::cast_precision_loss)]
        let pixels = ((sample.width() * sample.height()) as f32).max(1.0);
        let mut sum = [0.0f32; 3];
        for pixel in sample.pixels() {
            for (total, channel) in sum.iter_mut().zip(pixel.0) {
                *total += f32::from(channel);
            }
        }
        let mean = sum.map(|total| total / pixels);

        let luma = 0.299 * mean[0] + 0.587 * mean[1] + 0.114 * mean[2];
        let brightness = if luma < 60.0 {
            "dark"
        } else if luma > 190.0 {
            "bright"
        } else {
            "moderately lit"
        };

        Self {
            width,
            height,
            orientation,
            colour: nearest_colour(mean),
            brightness,
        }
    }

    fn sentence(&self) -> String {
        format!(
            "A {}x{} {} image, predominantly {} and {}.",
            self.width, self.height, self.orientation, self.colour, self.brightness
        )
    }
}

fn nearest_colour(rgb: [f32; 3]) -> &'static str {
    PALETTE
        .iter()
        .map(|(name, reference)| {
            let distance: f32 = reference
                .iter()
                .zip(rgb)
                .map(|(r, c)| (r - c) * (r - c))
                .sum();
            (*name, distance)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or("gray", |(name, _)| name)
}

/// Describes images by size, orientation, dominant colour, and brightness.
///
/// It cannot recognize objects. Questions it has no measurement for get the
/// general description instead.
#[derive(Debug, Clone, Default)]
pub struct BasicVision;

impl BasicVision {
    /// Creates the describer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VisionModel for BasicVision {
    async fn caption(&self, image: Arc<DynamicImage>, hint: Option<&str>) -> Result<String> {
        let caption = Summary::measure(image).await?.sentence();
        Ok(match hint.map(str::trim).filter(|h| !h.is_empty()) {
            Some(hint) => format!("{caption} Requested focus: {hint}."),
            None => caption,
        })
    }

    async fn answer(&self, image: Arc<DynamicImage>, question: &str) -> Result<String> {
        let summary = Summary::measure(image).await?;
        let question = question.to_lowercase();
        let asks = |words: &[&str]| words.iter().any(|w| question.contains(w));

        Ok(if asks(&["colour", "color"]) {
            format!("The image is predominantly {}.", summary.colour)
        } else if asks(&["size", "dimension", "resolution", "how big", "wide", "tall"]) {
            format!("The image is {}x{} pixels.", summary.width, summary.height)
        } else if asks(&["bright", "dark", "light"]) {
            format!("The image is {}.", summary.brightness)
        } else if asks(&["orientation", "landscape", "portrait"]) {
            format!("The image is {}.", summary.orientation)
        } else {
            summary.sentence()
        })
    }

    fn name(&self) -> &'static str {
        "basic"
    }
}
