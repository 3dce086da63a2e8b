use eframe::egui::{self, Ui, Vec2};
use egui_plot::{Line, Plot, PlotPoints, VLine};

use crate::state::AppState;
use crate::transfer::{self, histogram};

const HISTOGRAM_BINS: usize = 64;
const HISTOGRAM_HEIGHT: f32 = 150.0;

// ---------------------------------------------------------------------------
// Central panel – composited volume view + intensity histogram
// ---------------------------------------------------------------------------

/// Render the central volume view.
pub fn volume_view(ui: &mut Ui, state: &mut AppState) {
    if state.bundle.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a bundle to view the volume  (File → Open bundle…)");
        });
        return;
    }

    // TextureHandle is cheap to clone; detaching it from `state` lets the
    // widgets below borrow state again.
    let texture = state.view_texture(ui.ctx()).cloned();
    let Some(texture) = texture else { return };
    let Some(bundle) = state.bundle.as_ref() else {
        return;
    };

    // Fit the image to the available space at the physical aspect ratio
    // (ds-corrected voxel spacing), not the pixel aspect ratio.
    let (w_um, h_um) = transfer::plane_size_um(bundle.shape(), &bundle.meta, state.view_axis);
    let avail = ui.available_size() - Vec2::new(0.0, HISTOGRAM_HEIGHT + 12.0);
    let scale = (avail.x as f64 / w_um)
        .min(avail.y as f64 / h_um)
        .max(f64::MIN_POSITIVE);
    let display = Vec2::new((w_um * scale) as f32, (h_um * scale) as f32);

    ui.vertical_centered(|ui: &mut Ui| {
        ui.add(egui::Image::new(&texture).fit_to_exact_size(display));
    });

    ui.separator();
    intensity_histogram(ui, state);
}

/// Per-channel intensity histogram with the tone-mapping window marked.
fn intensity_histogram(ui: &mut Ui, state: &AppState) {
    let Some(bundle) = &state.bundle else { return };

    Plot::new("intensity_histogram")
        .height(HISTOGRAM_HEIGHT)
        .x_axis_label("Intensity")
        .y_axis_label("Voxels")
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .include_x(0.0)
        .include_x(1.0)
        .show(ui, |plot_ui| {
            for (&volume, settings) in bundle.channels().iter().zip(&state.channels) {
                if !settings.visible {
                    continue;
                }
                let counts = histogram(volume, HISTOGRAM_BINS);
                let points: PlotPoints = counts
                    .iter()
                    .enumerate()
                    .map(|(i, &c)| {
                        let center = (i as f64 + 0.5) / HISTOGRAM_BINS as f64;
                        [center, c as f64]
                    })
                    .collect();
                plot_ui.line(Line::new(points).color(settings.tint).width(1.5));
            }

            plot_ui.vline(VLine::new(state.tone.lo as f64).name("Lo"));
            plot_ui.vline(VLine::new(state.tone.hi as f64).name("Hi"));
        });
}
