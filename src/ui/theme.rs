//! Visual theme
//!
//! Light, LINE-style chat palette: tinted user bubbles on the right, plain
//! assistant bubbles on the left, amber system notices.

use egui::Color32;

pub struct Theme {
    pub bg_primary: Color32,
    pub bg_secondary: Color32,
    pub bubble_user: Color32,
    pub bubble_assistant: Color32,
    pub bubble_system: Color32,
    pub text_primary: Color32,
    pub text_muted: Color32,
    pub error: Color32,
    pub spacing: f32,
    pub spacing_sm: f32,
}

impl Theme {
    pub fn light() -> Self {
        Self {
            bg_primary: Color32::from_rgb(0xf5, 0xf7, 0xfc),
            bg_secondary: Color32::from_rgb(0xdc, 0xe4, 0xf2),
            bubble_user: Color32::from_rgb(0xd1, 0xea, 0xff),
            bubble_assistant: Color32::from_rgb(0xf2, 0xf4, 0xf8),
            bubble_system: Color32::from_rgb(0xff, 0xf4, 0xd6),
            text_primary: Color32::from_rgb(0x20, 0x20, 0x20),
            text_muted: Color32::from_rgb(0x70, 0x70, 0x70),
            error: Color32::from_rgb(0xc0, 0x39, 0x2b),
            spacing: 10.0,
            spacing_sm: 6.0,
        }
    }

    pub fn apply(&self, ctx: &egui::Context) {
        ctx.set_visuals(egui::Visuals::light());
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::light()
    }
}
