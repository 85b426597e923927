//! Renderer: audiogram record → chart image.
//!
//! ```text
//!   Audiogram + EarSide
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  layout   │  lines + non-empty marker layers + legend labels
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  chart    │  axes, grid, series, legend → RGB buffer (plotters)
//!   └──────────┘
//!        │
//!        ▼
//!      PNG (image)
//! ```

use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;

use image::{ImageFormat, RgbImage};
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};

use crate::data::model::{Audiogram, EarSide};
use crate::error::{AudiogramError, Result};

pub mod chart;
pub mod layout;
pub mod marker;

pub use chart::{CANVAS_HEIGHT, CANVAS_WIDTH, DPI};
pub use layout::ChartLayout;
pub use marker::MarkerShape;

/// Family name the embedded font is registered under.
pub const FONT_FAMILY: &str = "sans-serif";

static FONT_BYTES: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
static FONT_REGISTRATION: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Register the embedded font with plotters (once per process).
fn ensure_font() -> Result<()> {
    FONT_REGISTRATION
        .get_or_init(|| {
            register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES)
                .map_err(|_| "embedded font could not be parsed".to_string())
        })
        .clone()
        .map_err(AudiogramError::Render)
}

/// Render the audiogram of one ear into an RGB image.
pub fn render_audiogram(gram: &Audiogram, side: EarSide) -> Result<RgbImage> {
    ensure_font()?;
    let layout = ChartLayout::new(gram, side);

    let mut buf = vec![0u8; (CANVAS_WIDTH * CANVAS_HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (CANVAS_WIDTH, CANVAS_HEIGHT))
            .into_drawing_area();
        chart::draw_chart(&root, &layout)?;
        root.present()
            .map_err(|e| AudiogramError::Render(e.to_string()))?;
    }

    RgbImage::from_raw(CANVAS_WIDTH, CANVAS_HEIGHT, buf)
        .ok_or_else(|| AudiogramError::Render("pixel buffer has the wrong size".into()))
}

/// PNG-encode a rendered chart.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Render one ear and write it to `path` as PNG.
pub fn save_audiogram(gram: &Audiogram, side: EarSide, path: &Path) -> Result<()> {
    let img = render_audiogram(gram, side)?;
    std::fs::write(path, encode_png(&img)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::ThresholdSeries;

    fn gram() -> Audiogram {
        Audiogram {
            ac_left: ThresholdSeries::new(
                vec![10, 15, 30, 45, 70, 100],
                vec![false, false, true, true, false, false],
                vec![false, false, false, false, false, true],
            ),
            ac_right: ThresholdSeries::unflagged(vec![20, 25, 30, 35, 40, 45]),
            bc_left: ThresholdSeries::unflagged(vec![5, 10, 25, 40, 60]),
            bc_right: ThresholdSeries::new(
                vec![15, 20, 25, 30, 35],
                vec![true; 5],
                vec![false, false, false, false, true],
            ),
        }
    }

    fn count_pixels(img: &RgbImage, rgb: [u8; 3]) -> usize {
        img.pixels().filter(|p| p.0 == rgb).count()
    }

    #[test]
    fn canvas_is_five_by_six_inches_at_300_dpi() {
        let img = render_audiogram(&gram(), EarSide::Left).unwrap();
        assert_eq!(img.dimensions(), (1500, 1800));
        assert_eq!((CANVAS_WIDTH as f64 / DPI, CANVAS_HEIGHT as f64 / DPI), (5.0, 6.0));
    }

    #[test]
    fn ear_colour_follows_side() {
        let left = render_audiogram(&gram(), EarSide::Left).unwrap();
        let right = render_audiogram(&gram(), EarSide::Right).unwrap();

        assert!(count_pixels(&left, [0, 0, 255]) > 0);
        assert_eq!(count_pixels(&left, [255, 0, 0]), 0);
        assert!(count_pixels(&right, [255, 0, 0]) > 0);
        assert_eq!(count_pixels(&right, [0, 0, 255]), 0);
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = encode_png(&render_audiogram(&gram(), EarSide::Right).unwrap()).unwrap();
        let b = encode_png(&render_audiogram(&gram(), EarSide::Right).unwrap()).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(b"\x89PNG"));
    }

    #[test]
    fn saved_file_is_a_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0-left.png");
        save_audiogram(&gram(), EarSide::Left, &path).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (1500, 1800));
    }
}
