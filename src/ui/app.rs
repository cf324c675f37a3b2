//! Main application window and eframe integration
//!
//! The egui update loop is the consuming thread: each frame polls the app
//! state (deadline check + bridge drain) before rendering. Nothing here
//! blocks on worker completion.

use crate::memory::ChatRole;
use crate::ui::components::{InputBar, MessageList, SettingsPanel};
use crate::ui::state::AppState;
use crate::ui::theme::Theme;
use egui::{Align, CentralPanel, Layout, RichText, TopBottomPanel};
use std::time::{Duration, Instant};

pub struct MochaApp {
    state: AppState,
    theme: Theme,
}

impl MochaApp {
    pub fn new(cc: &eframe::CreationContext<'_>, state: AppState) -> Self {
        let theme = Theme::light();
        theme.apply(&cc.egui_ctx);
        Self { state, theme }
    }

    fn show_header(&mut self, ctx: &egui::Context) {
        TopBottomPanel::top("header")
            .frame(
                egui::Frame::none()
                    .fill(self.theme.bg_secondary)
                    .inner_margin(10.0),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let name = self.state.config.snapshot().mascot.name.clone();
                    ui.label(
                        RichText::new(name)
                            .size(18.0)
                            .strong()
                            .color(self.theme.text_primary),
                    );

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if ui.button("⚙").on_hover_text("設定").clicked() {
                            self.state.open_settings();
                        }
                        if ui.button("🗑").on_hover_text("履歴を消す").clicked() {
                            self.state.clear_conversation();
                        }
                        if self.state.is_busy() {
                            if ui.button("✕").on_hover_text("応答を待たない").clicked() {
                                self.state.cancel_turn();
                            }
                        }
                    });
                });
            });
    }

    fn show_bubble(&self, ctx: &egui::Context) {
        let Some(bubble) = &self.state.bubble else {
            return;
        };
        let fill = match bubble.role {
            ChatRole::User => self.theme.bubble_user,
            ChatRole::Assistant => self.theme.bubble_assistant,
            ChatRole::System => self.theme.bubble_system,
        };

        TopBottomPanel::top("bubble")
            .frame(
                egui::Frame::none()
                    .fill(self.theme.bg_primary)
                    .inner_margin(self.theme.spacing_sm),
            )
            .show(ctx, |ui| {
                egui::Frame::none()
                    .fill(fill)
                    .rounding(8.0)
                    .inner_margin(egui::Margin::symmetric(10.0, 8.0))
                    .show(ui, |ui| {
                        ui.set_width(ui.available_width());
                        ui.label(RichText::new(&bubble.text).color(self.theme.text_primary));
                    });
            });
    }

    fn show_input_area(&mut self, ctx: &egui::Context) {
        TopBottomPanel::bottom("input_area")
            .frame(
                egui::Frame::none()
                    .fill(self.theme.bg_primary)
                    .inner_margin(self.theme.spacing),
            )
            .show(ctx, |ui| {
                InputBar::show(ui, &mut self.state, &self.theme);
            });
    }

    fn show_content(&mut self, ctx: &egui::Context) {
        CentralPanel::default()
            .frame(egui::Frame::none().fill(self.theme.bg_primary))
            .show(ctx, |ui| {
                MessageList::new(&self.state, &self.theme).show(ui);
            });
    }
}

impl eframe::App for MochaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Drain worker outcomes before rendering this frame.
        self.state.poll(Instant::now());

        self.show_header(ctx);
        self.show_bubble(ctx);
        self.show_input_area(ctx);
        self.show_content(ctx);
        SettingsPanel::show(ctx, &mut self.state, &self.theme);

        // Keep polling at a steady cadence even without input events; the
        // deadline timer and auto-talk run off this loop.
        ctx.request_repaint_after(Duration::from_millis(100));
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.state.shutdown();
    }
}
