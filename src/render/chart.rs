use plotters::coord::Shift;
use plotters::element::DashedPathElement;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::data::model::{Conduction, FREQUENCY_LABELS};
use crate::error::{AudiogramError, Result};

use super::layout::ChartLayout;
use super::FONT_FAMILY;

// ---------------------------------------------------------------------------
// Geometry (pixels on a 1500×1800 canvas, i.e. 5×6 in at 300 DPI)
// ---------------------------------------------------------------------------

pub const CANVAS_WIDTH: u32 = 1500;
pub const CANVAS_HEIGHT: u32 = 1800;
pub const DPI: f64 = 300.0;

/// Figure fractions of the axes box before the legend shrink.
const AXES_LEFT_FRAC: f64 = 0.125;
const AXES_RIGHT_FRAC: f64 = 0.9;
const AXES_BOTTOM_FRAC: f64 = 0.11;
const AXES_TOP_FRAC: f64 = 0.88;
/// Share of the axes height handed over to the legend.
const LEGEND_SHRINK: f64 = 0.1;

const X_MIN: f64 = -0.5;
const X_MAX: f64 = 5.5;
const DB_TOP: f64 = -20.0;
const DB_BOTTOM: f64 = 125.0;
const MAJOR_STEP: i32 = 10;
const MINOR_STEP: i32 = 5;
/// Last tick is 110; the axis itself runs on to 125.
const TICK_END: i32 = 120;

const GRAY: RGBColor = RGBColor(128, 128, 128);
const LEGEND_EDGE: RGBColor = RGBColor(204, 204, 204);

/// Points to pixels at the output resolution.
fn pt(points: f64) -> f64 {
    points * DPI / 72.0
}

fn px(points: f64) -> i32 {
    pt(points).round() as i32
}

fn render_err<E: std::fmt::Display>(e: E) -> AudiogramError {
    AudiogramError::Render(e.to_string())
}

// ---------------------------------------------------------------------------
// Axes – data to pixel mapping
// ---------------------------------------------------------------------------

/// Pixel rectangle of the plot area with an inverted dBHL scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axes {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl Axes {
    /// Default figure margins, with the bottom 10% given to the legend.
    pub fn standard() -> Self {
        let w = CANVAS_WIDTH as f64;
        let h = CANVAS_HEIGHT as f64;
        let height = AXES_TOP_FRAC - AXES_BOTTOM_FRAC;
        let bottom = AXES_BOTTOM_FRAC + height * LEGEND_SHRINK;
        Self {
            left: (w * AXES_LEFT_FRAC).round() as i32,
            right: (w * AXES_RIGHT_FRAC).round() as i32,
            top: (h * (1.0 - AXES_TOP_FRAC)).round() as i32,
            bottom: (h * (1.0 - bottom)).round() as i32,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Pixel column of a frequency slot.
    pub fn x(&self, slot: f64) -> i32 {
        let t = (slot - X_MIN) / (X_MAX - X_MIN);
        self.left + (t * self.width() as f64).round() as i32
    }

    /// Pixel row of a dBHL value; louder is lower on the chart.
    pub fn y(&self, db: f64) -> i32 {
        let t = (db - DB_TOP) / (DB_BOTTOM - DB_TOP);
        self.top + (t * self.height() as f64).round() as i32
    }

    pub fn point(&self, slot: usize, db: i32) -> (i32, i32) {
        (self.x(slot as f64), self.y(db as f64))
    }

    /// The parts of `path` inside the axes box, one run per visible stretch.
    pub fn clip_path(&self, path: &[(i32, i32)]) -> Vec<Vec<(i32, i32)>> {
        let mut runs = Vec::new();
        let mut current: Vec<(i32, i32)> = Vec::new();
        for pair in path.windows(2) {
            match self.clip_segment(pair[0], pair[1]) {
                Some((a, b)) => {
                    if current.last() != Some(&a) {
                        if current.len() > 1 {
                            runs.push(std::mem::take(&mut current));
                        }
                        current.clear();
                        current.push(a);
                    }
                    current.push(b);
                }
                None => {
                    if current.len() > 1 {
                        runs.push(std::mem::take(&mut current));
                    }
                    current.clear();
                }
            }
        }
        if current.len() > 1 {
            runs.push(current);
        }
        runs
    }

    /// Liang-Barsky clip of one segment against the axes box.
    fn clip_segment(&self, p0: (i32, i32), p1: (i32, i32)) -> Option<((i32, i32), (i32, i32))> {
        let (x0, y0) = (p0.0 as f64, p0.1 as f64);
        let (dx, dy) = (p1.0 as f64 - x0, p1.1 as f64 - y0);
        let (mut t0, mut t1) = (0.0f64, 1.0f64);
        for (p, q) in [
            (-dx, x0 - self.left as f64),
            (dx, self.right as f64 - x0),
            (-dy, y0 - self.top as f64),
            (dy, self.bottom as f64 - y0),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
        let at = |t: f64| ((x0 + t * dx).round() as i32, (y0 + t * dy).round() as i32);
        Some((at(t0), at(t1)))
    }
}

// ---------------------------------------------------------------------------
// Drawing
// ---------------------------------------------------------------------------

fn text_style<'a>(size_pt: f64, pos: Pos) -> TextStyle<'a> {
    TextStyle::from((FONT_FAMILY, pt(size_pt)).into_font())
        .color(&BLACK)
        .pos(pos)
}

/// Tick labels use a real minus sign.
fn tick_label(value: i32) -> String {
    if value < 0 {
        format!("\u{2212}{}", -value)
    } else {
        value.to_string()
    }
}

/// Draw the complete audiogram for `layout` onto `area`.
pub fn draw_chart<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    layout: &ChartLayout,
) -> Result<()> {
    let axes = Axes::standard();
    area.fill(&WHITE).map_err(render_err)?;

    draw_grid(area, &axes)?;
    draw_series(area, &axes, layout)?;
    draw_frame_and_ticks(area, &axes)?;
    draw_titles(area, &axes, &layout.title)?;
    draw_legend(area, &axes, layout)?;
    Ok(())
}

fn draw_grid<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, axes: &Axes) -> Result<()> {
    let style = GRAY.stroke_width(px(0.8) as u32);
    let (on, off) = (px(3.7), px(1.6));

    let mut lines = Vec::new();
    for slot in 0..FREQUENCY_LABELS.len() {
        let x = axes.x(slot as f64);
        lines.push([(x, axes.top), (x, axes.bottom)]);
    }
    for db in (DB_TOP as i32..TICK_END).step_by(MAJOR_STEP as usize) {
        let y = axes.y(db as f64);
        lines.push([(axes.left, y), (axes.right, y)]);
    }

    for line in lines {
        area.draw(&DashedPathElement::new(line, on, off, style))
            .map_err(render_err)?;
    }
    Ok(())
}

fn draw_series<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    axes: &Axes,
    layout: &ChartLayout,
) -> Result<()> {
    for line in &layout.lines {
        let pixels: Vec<(i32, i32)> = line.points.iter().map(|&(s, v)| axes.point(s, v)).collect();
        match line.conduction {
            Conduction::Air => {
                let style = line.color.stroke_width(px(1.0) as u32);
                for run in axes.clip_path(&pixels) {
                    area.draw(&PathElement::new(run, style)).map_err(render_err)?;
                }
            }
            Conduction::Bone => {
                // Dotted: dashes as long as the line is wide.
                let width = px(1.5);
                let style = line.color.stroke_width(width as u32);
                let gap = (width as f64 * 1.65).round() as i32;
                for run in axes.clip_path(&pixels) {
                    area.draw(&DashedPathElement::new(run, width, gap, style))
                        .map_err(render_err)?;
                }
            }
        }
    }

    let radius = pt(200f64.sqrt()) / 2.0;
    let marker_width = px(1.5) as u32;
    for layer in &layout.layers {
        let style = layer.color.stroke_width(marker_width);
        for &(slot, db) in &layer.points {
            for path in layer.shape.pixel_paths(axes.point(slot, db), radius) {
                for run in axes.clip_path(&path) {
                    area.draw(&PathElement::new(run, style)).map_err(render_err)?;
                }
            }
        }
    }
    Ok(())
}

fn draw_frame_and_ticks<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, axes: &Axes) -> Result<()> {
    let frame = BLACK.stroke_width(px(0.8) as u32);
    area.draw(&Rectangle::new(
        [(axes.left, axes.top), (axes.right, axes.bottom)],
        frame,
    ))
    .map_err(render_err)?;

    let major_len = px(3.5);
    let minor_len = px(2.0);
    let label_pad = px(3.5);
    let tick = BLACK.stroke_width(px(0.8) as u32);
    let minor_tick = BLACK.stroke_width(px(0.6) as u32);

    // Frequency ticks along the top edge.
    let x_label = text_style(6.5, Pos::new(HPos::Center, VPos::Bottom));
    for (slot, label) in FREQUENCY_LABELS.iter().enumerate() {
        let x = axes.x(slot as f64);
        area.draw(&PathElement::new(vec![(x, axes.top), (x, axes.top - major_len)], tick))
            .map_err(render_err)?;
        area.draw_text(label, &x_label, (x, axes.top - major_len - label_pad))
            .map_err(render_err)?;
    }

    // dBHL ticks along the left edge.
    let y_label = text_style(6.5, Pos::new(HPos::Right, VPos::Center));
    for db in (DB_TOP as i32..TICK_END).step_by(MINOR_STEP as usize) {
        let y = axes.y(db as f64);
        if db % MAJOR_STEP == 0 {
            area.draw(&PathElement::new(vec![(axes.left - major_len, y), (axes.left, y)], tick))
                .map_err(render_err)?;
            area.draw_text(
                &tick_label(db),
                &y_label,
                (axes.left - major_len - label_pad, y),
            )
            .map_err(render_err)?;
        } else {
            area.draw(&PathElement::new(vec![(axes.left - minor_len, y), (axes.left, y)], minor_tick))
                .map_err(render_err)?;
        }
    }
    Ok(())
}

fn draw_titles<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, axes: &Axes, title: &str) -> Result<()> {
    let tick_labels_top = axes.top - px(3.5) - px(3.5) - px(6.5);

    // "Freq / Hz" sits above the frequency labels, flush right.
    let x_caption_bottom = tick_labels_top - px(4.0);
    area.draw_text(
        "Freq / Hz",
        &text_style(10.0, Pos::new(HPos::Right, VPos::Bottom)),
        (axes.right, x_caption_bottom),
    )
    .map_err(render_err)?;

    let title_bottom = x_caption_bottom - px(10.0) - px(6.0);
    area.draw_text(
        title,
        &text_style(12.0, Pos::new(HPos::Center, VPos::Bottom)),
        (axes.left + axes.width() / 2, title_bottom),
    )
    .map_err(render_err)?;

    let y_caption = text_style(10.0, Pos::new(HPos::Center, VPos::Center))
        .transform(FontTransform::Rotate270);
    area.draw_text(
        "Intensity / dBHL",
        &y_caption,
        (axes.left - px(3.5) - px(3.5) - px(20.0), axes.top + axes.height() / 2),
    )
    .map_err(render_err)?;
    Ok(())
}

fn draw_legend<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    axes: &Axes,
    layout: &ChartLayout,
) -> Result<()> {
    if layout.layers.is_empty() {
        return Ok(());
    }

    let columns = 2;
    let rows = layout.layers.len().div_ceil(columns);
    let row_height = px(14.0);
    let pad = px(4.0);
    let top = axes.bottom + px(6.0);
    let bottom = top + 2 * pad + rows as i32 * row_height;
    let column_width = axes.width() / columns as i32;

    area.draw(&Rectangle::new(
        [(axes.left, top), (axes.right, bottom)],
        LEGEND_EDGE.stroke_width(px(0.8) as u32),
    ))
    .map_err(render_err)?;

    let radius = pt(200f64.sqrt()) / 2.0;
    let marker_width = px(1.5) as u32;
    let label_style = text_style(10.0, Pos::new(HPos::Left, VPos::Center));

    // Entries fill the first column before the second.
    for (i, layer) in layout.layers.iter().enumerate() {
        let col = (i / rows) as i32;
        let row = (i % rows) as i32;
        let x = axes.left + col * column_width + pad + radius.round() as i32;
        let y = top + pad + row * row_height + row_height / 2;

        let style = layer.color.stroke_width(marker_width);
        for path in layer.shape.pixel_paths((x, y), radius) {
            area.draw(&PathElement::new(path, style)).map_err(render_err)?;
        }
        area.draw_text(
            &layer.label,
            &label_style,
            (x + radius.round() as i32 + pad * 2, y),
        )
        .map_err(render_err)?;
    }
    Ok(())
}
