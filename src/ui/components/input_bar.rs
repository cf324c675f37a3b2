//! Input bar: text entry, push-to-talk button, send button
//!
//! Submitting while a reply is pending is allowed: the coordinator cancels
//! the in-flight turn and starts a new one. The mic button works as
//! press-and-hold: capture runs while the pointer is down on it, and
//! release hands the clip to recognition.

use crate::ui::state::AppState;
use crate::ui::theme::Theme;

pub struct InputBar;

impl InputBar {
    pub fn show(ui: &mut egui::Ui, state: &mut AppState, _theme: &Theme) {
        ui.horizontal(|ui| {
            let edit = egui::TextEdit::singleline(&mut state.input_text)
                .hint_text("モカに話しかける… Enterで送信")
                .desired_width(ui.available_width() - 100.0);
            let response = ui.add(edit);
            response.widget_info(|| {
                egui::WidgetInfo::labeled(egui::WidgetType::TextEdit, true, "Message input")
            });
            if response.lost_focus()
                && ui.input(|i| i.key_pressed(egui::Key::Enter))
                && !state.input_text.trim().is_empty()
            {
                state.submit_input();
                response.request_focus();
            }

            #[cfg(feature = "audio-io")]
            {
                let mic_enabled = state.voice_available() && !state.voice_pending;
                let mic = ui
                    .add_enabled(mic_enabled, egui::Button::new("🎤"))
                    .on_hover_text("押している間だけ録音（プッシュトーク）");
                state.set_mic_held(mic.is_pointer_button_down_on());
            }
            #[cfg(not(feature = "audio-io"))]
            {
                ui.add_enabled(false, egui::Button::new("🎤"))
                    .on_hover_text("音声入力はこのビルドでは無効です");
            }

            let can_send = !state.input_text.trim().is_empty();
            let send = ui.add_enabled(can_send, egui::Button::new("送信"));
            send.widget_info(|| {
                egui::WidgetInfo::labeled(egui::WidgetType::Button, can_send, "Send message")
            });
            if send.clicked() {
                state.submit_input();
            }
        });
    }
}
