use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::state::AppState;
use crate::transfer::{ViewAxis, ViewMode};

// ---------------------------------------------------------------------------
// Left side panel – channel and tone controls
// ---------------------------------------------------------------------------

const CHANNEL_NAMES: [&str; 3] = ["Red", "Green", "Blue"];

/// Render the left control panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Display");
    ui.separator();

    let Some(bundle) = &state.bundle else {
        ui.label("No bundle loaded.");
        return;
    };
    let shape = bundle.shape();
    let channel_map = bundle.meta.channel_map;

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- View selection ----
            ui.strong("View");
            let mut changed = false;
            egui::ComboBox::from_id_salt("view_axis")
                .selected_text(format!("{} axis", state.view_axis.label()))
                .show_ui(ui, |ui: &mut Ui| {
                    for axis in [ViewAxis::Z, ViewAxis::Y, ViewAxis::X] {
                        let selected = state.view_axis == axis;
                        if ui
                            .selectable_label(selected, format!("{} axis", axis.label()))
                            .clicked()
                            && !selected
                        {
                            state.view_axis = axis;
                            state.slice_index = 0;
                            changed = true;
                        }
                    }
                });
            ui.horizontal(|ui: &mut Ui| {
                for (mode, label) in [(ViewMode::Slice, "Slice"), (ViewMode::Projection, "MIP")] {
                    if ui
                        .selectable_label(state.view_mode == mode, label)
                        .clicked()
                        && state.view_mode != mode
                    {
                        state.view_mode = mode;
                        changed = true;
                    }
                }
            });
            if state.view_mode == ViewMode::Slice {
                let max = state.max_slice();
                let slider = egui::Slider::new(&mut state.slice_index, 0..=max)
                    .text(format!("{} index", state.view_axis.label()));
                if ui.add(slider).changed() {
                    changed = true;
                }
            }
            ui.separator();

            // ---- Per-channel controls ----
            for (idx, name) in CHANNEL_NAMES.iter().enumerate() {
                let source = channel_map.0[idx];
                let header = format!("{name}  (source ch {source})");
                egui::CollapsingHeader::new(RichText::new(header).strong())
                    .id_salt(name)
                    .default_open(true)
                    .show(ui, |ui: &mut Ui| {
                        let ch = &mut state.channels[idx];
                        if ui.checkbox(&mut ch.visible, "Visible").changed() {
                            changed = true;
                        }
                        ui.horizontal(|ui: &mut Ui| {
                            ui.label("Tint");
                            if ui.color_edit_button_srgba(&mut ch.tint).changed() {
                                changed = true;
                            }
                        });
                        if ui
                            .add(egui::Slider::new(&mut ch.threshold, 0.0..=1.0).text("Threshold"))
                            .changed()
                        {
                            changed = true;
                        }
                        if ui
                            .add(egui::Slider::new(&mut ch.opacity, 0.0..=1.0).text("Opacity"))
                            .changed()
                        {
                            changed = true;
                        }
                    });
            }
            ui.separator();

            // ---- Global tone mapping ----
            ui.strong("Tone mapping");
            if ui
                .add(egui::Slider::new(&mut state.tone.lo, 0.0..=1.0).text("Lo"))
                .changed()
            {
                changed = true;
            }
            if ui
                .add(egui::Slider::new(&mut state.tone.hi, 0.0..=1.0).text("Hi"))
                .changed()
            {
                changed = true;
            }
            if ui
                .add(egui::Slider::new(&mut state.tone.gamma, 0.1..=4.0).text("Gamma"))
                .changed()
            {
                changed = true;
            }
            if ui.button("Reset controls").clicked() {
                state.reset_controls();
            }

            ui.separator();
            ui.label(format!("Volume Z×Y×X: {}×{}×{}", shape.0, shape.1, shape.2));

            if changed {
                state.mark_dirty();
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open bundle…").clicked() {
                open_bundle_dialog(state);
                ui.close_menu();
            }
            let can_snapshot = state.rendered_image().is_some();
            if ui
                .add_enabled(can_snapshot, egui::Button::new("Save snapshot…"))
                .clicked()
            {
                save_snapshot_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(bundle) = &state.bundle {
            let (z, y, x) = bundle.shape();
            let m = &bundle.meta;
            ui.label(format!(
                "{}  |  {z}×{y}×{x}  |  voxel µm ({:.3}, {:.3}, {:.3})  |  ds {}",
                m.file, m.vx_um, m.vy_um, m.vz_um, m.ds
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_bundle_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open volume bundle")
        .add_filter("Volume bundle", &["npz"])
        .pick_file();

    if let Some(path) = file {
        match crate::data::loader::load_bundle(&path) {
            Ok(bundle) => {
                let (z, y, x) = bundle.shape();
                log::info!(
                    "Loaded {} ({z}×{y}×{x}, ds {})",
                    bundle.meta.file,
                    bundle.meta.ds
                );
                state.set_bundle(bundle);
            }
            Err(e) => {
                log::error!("Failed to load bundle: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}

pub fn save_snapshot_dialog(state: &mut AppState) {
    let Some(image) = state.rendered_image() else {
        return;
    };

    let file = rfd::FileDialog::new()
        .set_title("Save snapshot")
        .add_filter("PNG image", &["png"])
        .set_file_name("snapshot.png")
        .save_file();

    if let Some(path) = file {
        let [width, height] = image.size;
        let bytes: Vec<u8> = image
            .pixels
            .iter()
            .flat_map(|p| [p.r(), p.g(), p.b(), p.a()])
            .collect();

        let result = image::RgbaImage::from_raw(width as u32, height as u32, bytes)
            .ok_or_else(|| anyhow::anyhow!("snapshot buffer size mismatch"))
            .and_then(|img| img.save(&path).map_err(Into::into));

        match result {
            Ok(()) => log::info!("Saved snapshot to {}", path.display()),
            Err(e) => {
                log::error!("Failed to save snapshot: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
