use eframe::egui::{self, Color32, RichText, Ui};

use audiogram_annotator::annotation::{Choice, Configuration, Degree, EarJudgment, LossType};

use crate::state::{AppState, Status};

const HELP: &str = "1. Choose your name under Audiologist Name.\n\
2. Move the index slider to show a patient's summary and audiograms.\n\
3. Pick degree, type and configuration for each ear.\n\
4. Press Submit to save the annotation.";

// ---------------------------------------------------------------------------
// Left side panel – patient selection and submission
// ---------------------------------------------------------------------------

/// Render the left review panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Patient");
    ui.separator();

    if state.cache.is_empty() {
        ui.label("The archive holds no patients.");
        return;
    }

    let mut index = state.index;
    let last = state.cache.len() - 1;
    let slider = ui.add(egui::Slider::new(&mut index, 0..=last).text("index"));
    if slider.changed() && index != state.index {
        state.select(index);
    }

    ui.add_space(8.0);
    ui.strong("Audiologist Name");
    let selected = state.reviewer.clone().unwrap_or_default();
    egui::ComboBox::from_id_salt("reviewer")
        .selected_text(&selected)
        .show_ui(ui, |ui: &mut Ui| {
            for name in &state.reviewers {
                ui.selectable_value(&mut state.reviewer, Some(name.clone()), name);
            }
        });

    ui.add_space(8.0);
    if ui.button("Submit").clicked() {
        state.submit();
    }

    if let Some(status) = &state.status {
        let text = match status {
            Status::Info(msg) => RichText::new(msg).color(Color32::DARK_GREEN),
            Status::Error(msg) => RichText::new(msg).color(Color32::RED),
        };
        ui.label(text);
    }

    ui.add_space(12.0);
    egui::CollapsingHeader::new("How to use")
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            ui.label(HELP);
        });
}

// ---------------------------------------------------------------------------
// Judgment form
// ---------------------------------------------------------------------------

fn choice_combo<C: Choice>(ui: &mut Ui, id: &str, value: &mut Option<C>) {
    egui::ComboBox::from_id_salt(id)
        .selected_text(value.map(C::label).unwrap_or(""))
        .show_ui(ui, |ui: &mut Ui| {
            ui.selectable_value(value, None, "–");
            for &choice in C::ALL {
                ui.selectable_value(value, Some(choice), choice.label());
            }
        });
}

fn ear_column(ui: &mut Ui, tag: &str, judgment: &mut EarJudgment) {
    ui.label(format!("Degree ({tag})"));
    choice_combo::<Degree>(ui, &format!("degree_{tag}"), &mut judgment.degree);
    ui.end_row();
    ui.label(format!("Type ({tag})"));
    choice_combo::<LossType>(ui, &format!("type_{tag}"), &mut judgment.loss_type);
    ui.end_row();
    ui.label(format!("Configuration ({tag})"));
    choice_combo::<Configuration>(ui, &format!("configuration_{tag}"), &mut judgment.configuration);
    ui.end_row();
}

/// Six drop-downs: degree, type and configuration for each ear.
pub fn judgment_form(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Annotation");
    ui.columns(2, |cols| {
        egui::Grid::new("judgments_right")
            .num_columns(2)
            .show(&mut cols[0], |ui| ear_column(ui, "R", &mut state.right));
        egui::Grid::new("judgments_left")
            .num_columns(2)
            .show(&mut cols[1], |ui| ear_column(ui, "L", &mut state.left));
    });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open archive…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();
        ui.label(format!(
            "{} patients, cache at {}",
            state.cache.len(),
            state.cache.cache_dir().display()
        ));
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open patient archive")
        .add_filter("Patient archives", &["xz", "gz", "json", "parquet", "pq"])
        .add_filter("All files", &["*"])
        .pick_file();

    if let Some(path) = file {
        if let Err(e) = state.open_archive(&path) {
            log::error!("Failed to open {}: {e}", path.display());
            state.status = Some(Status::Error(format!("Error: {e}")));
        }
    }
}
