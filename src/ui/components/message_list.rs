//! Chat history display
//!
//! LINE-style bubbles: user entries on the right, assistant on the left,
//! system notices centered and tinted.

use crate::memory::ChatRole;
use crate::ui::state::AppState;
use crate::ui::theme::Theme;
use egui::{Align, Layout, RichText};

pub struct MessageList<'a> {
    state: &'a AppState,
    theme: &'a Theme,
}

impl<'a> MessageList<'a> {
    pub fn new(state: &'a AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    pub fn show(self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                ui.add_space(self.theme.spacing_sm);
                for entry in self.state.memory.entries() {
                    self.show_entry(ui, entry.role, &entry.text);
                    ui.add_space(self.theme.spacing_sm);
                }
                if self.state.is_busy() {
                    ui.with_layout(Layout::top_down(Align::Min), |ui| {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label(RichText::new("考え中…").color(self.theme.text_muted));
                        });
                    });
                }
            });
    }

    fn show_entry(&self, ui: &mut egui::Ui, role: ChatRole, text: &str) {
        let (fill, align) = match role {
            ChatRole::User => (self.theme.bubble_user, Align::Max),
            ChatRole::Assistant => (self.theme.bubble_assistant, Align::Min),
            ChatRole::System => (self.theme.bubble_system, Align::Center),
        };

        ui.with_layout(Layout::top_down(align), |ui| {
            let max_width = ui.available_width() * 0.82;
            egui::Frame::none()
                .fill(fill)
                .rounding(8.0)
                .inner_margin(egui::Margin::symmetric(8.0, 6.0))
                .show(ui, |ui| {
                    ui.set_max_width(max_width);
                    ui.label(RichText::new(text).color(self.theme.text_primary));
                });
        });
    }
}
