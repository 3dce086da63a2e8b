use eframe::egui::{ColorImage, Context, TextureHandle, TextureOptions};

use crate::data::model::VolumeBundle;
use crate::transfer::{self, ChannelSettings, ToneParams, ViewAxis, ViewMode};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Loaded bundle (None until the user opens a file).
    pub bundle: Option<VolumeBundle>,

    /// Per-channel rendering controls (R, G, B).
    pub channels: [ChannelSettings; 3],

    /// Global Lo/Hi/Gamma tone mapping.
    pub tone: ToneParams,

    pub view_axis: ViewAxis,
    pub view_mode: ViewMode,
    pub slice_index: usize,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Last composited image, kept for snapshot export.
    rendered: Option<ColorImage>,
    texture: Option<TextureHandle>,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            bundle: None,
            channels: [
                ChannelSettings::for_channel(0),
                ChannelSettings::for_channel(1),
                ChannelSettings::for_channel(2),
            ],
            tone: ToneParams::default(),
            view_axis: ViewAxis::Z,
            view_mode: ViewMode::Slice,
            slice_index: 0,
            status_message: None,
            rendered: None,
            texture: None,
            dirty: false,
        }
    }
}

impl AppState {
    /// Ingest a newly loaded bundle, replacing whatever was shown before.
    pub fn set_bundle(&mut self, bundle: VolumeBundle) {
        self.slice_index = bundle.shape().0 / 2;
        self.bundle = Some(bundle);
        self.status_message = None;
        self.mark_dirty();
    }

    /// Restore default channel and tone controls.
    pub fn reset_controls(&mut self) {
        self.channels = [
            ChannelSettings::for_channel(0),
            ChannelSettings::for_channel(1),
            ChannelSettings::for_channel(2),
        ];
        self.tone = ToneParams::default();
        self.mark_dirty();
    }

    /// Any control change invalidates the cached composite.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Largest valid slice index along the current view axis.
    pub fn max_slice(&self) -> usize {
        self.bundle
            .as_ref()
            .map(|b| self.view_axis.len(b.shape()).saturating_sub(1))
            .unwrap_or(0)
    }

    /// The texture for the current view, recompositing if stale.
    pub fn view_texture(&mut self, ctx: &Context) -> Option<&TextureHandle> {
        let bundle = self.bundle.as_ref()?;

        if self.dirty || self.texture.is_none() {
            let image = transfer::render_view(
                bundle,
                self.view_axis,
                self.view_mode,
                self.slice_index,
                &self.channels,
                &self.tone,
            );
            self.texture =
                Some(ctx.load_texture("volume_view", image.clone(), TextureOptions::NEAREST));
            self.rendered = Some(image);
            self.dirty = false;
        }
        self.texture.as_ref()
    }

    /// The last composited image (for PNG snapshot export).
    pub fn rendered_image(&self) -> Option<&ColorImage> {
        self.rendered.as_ref()
    }
}
