use eframe::egui::{self, Ui};
use egui_extras::{Column, TableBuilder};

use crate::state::{AppState, ChartImage};

const NOTES: &str = "AC: air-conducted thresholds at 250, 500, 1K, 2K, 4K, 8K Hz\n\
BC: bone-conducted thresholds at 250, 500, 1K, 2K, 4K Hz\n\
PTA: air-conducted average at 500, 1K, 2K, 4K Hz\n\
(R) / (L): right ear / left ear";

// ---------------------------------------------------------------------------
// Patient view (central panel)
// ---------------------------------------------------------------------------

/// Summary table followed by the right and left audiograms.
pub fn patient_view(ui: &mut Ui, state: &AppState) {
    let Some(summary) = &state.summary else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("No patient to show  (File → Open archive…)");
        });
        return;
    };

    ui.heading("Patient Information");
    TableBuilder::new(ui)
        .striped(true)
        .vscroll(false)
        .column(Column::auto().at_least(90.0))
        .column(Column::remainder())
        .body(|mut body| {
            for (key, value) in summary.fields() {
                body.row(18.0, |mut row| {
                    row.col(|ui| {
                        ui.strong(key);
                    });
                    row.col(|ui| {
                        ui.label(value);
                    });
                });
            }
        });
    ui.label(egui::RichText::new(NOTES).small().weak());
    ui.separator();

    ui.columns(2, |cols| {
        chart(&mut cols[0], state.right_chart.as_ref());
        chart(&mut cols[1], state.left_chart.as_ref());
    });
}

fn chart(ui: &mut Ui, image: Option<&ChartImage>) {
    match image {
        Some(img) => {
            ui.add(
                egui::Image::from_bytes(img.uri.clone(), img.bytes.clone())
                    .max_width(ui.available_width())
                    .maintain_aspect_ratio(true),
            );
        }
        None => {
            ui.label("Chart unavailable");
        }
    }
}
