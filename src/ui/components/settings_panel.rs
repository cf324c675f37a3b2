//! Schema-driven settings window
//!
//! Renders widgets from the pure settings schema and edits a JSON draft of
//! the configuration by dotted path. Save goes through the state's
//! validate-then-swap path; a rejected draft stays open with the error
//! shown and the live configuration untouched.

use crate::config::schema::{self, FieldDescriptor, FieldKind};
use crate::ui::state::AppState;
use crate::ui::theme::Theme;
use serde_json::Value;

pub struct SettingsPanel;

impl SettingsPanel {
    pub fn show(ctx: &egui::Context, state: &mut AppState, theme: &Theme) {
        let Some(mut draft) = state.settings.take() else {
            return;
        };

        let tabs = schema::settings_schema();
        let mut open = true;
        let mut close = false;

        egui::Window::new("設定")
            .open(&mut open)
            .resizable(true)
            .default_width(380.0)
            .show(ctx, |ui| {
                ui.horizontal_wrapped(|ui| {
                    for (index, tab) in tabs.iter().enumerate() {
                        ui.selectable_value(&mut draft.selected_tab, index, tab.title);
                    }
                });
                ui.separator();

                let tab = &tabs[draft.selected_tab.min(tabs.len() - 1)];
                egui::Grid::new(tab.title)
                    .num_columns(2)
                    .spacing([12.0, 8.0])
                    .show(ui, |ui| {
                        for field in tab.fields {
                            let label = ui.label(field.label);
                            if !field.hint.is_empty() {
                                label.on_hover_text(field.hint);
                            }
                            Self::show_field(ui, &mut draft.value, field);
                            ui.end_row();
                        }
                    });

                if let Some(error) = &draft.error {
                    ui.add_space(4.0);
                    ui.colored_label(theme.error, error);
                }

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("保存").clicked() {
                        match state.save_settings(&draft.value) {
                            Ok(()) => close = true,
                            Err(e) => draft.error = Some(e.to_string()),
                        }
                    }
                    if ui.button("キャンセル").clicked() {
                        close = true;
                    }
                });
            });

        if open && !close {
            state.settings = Some(draft);
        }
    }

    fn show_field(ui: &mut egui::Ui, document: &mut Value, field: &FieldDescriptor) {
        match field.kind {
            FieldKind::Bool => {
                let mut value = schema::value_at(document, field.path)
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if ui.checkbox(&mut value, "").changed() {
                    schema::set_value(document, field.path, Value::Bool(value));
                }
            }
            FieldKind::Int { min, max } => {
                let mut value = schema::value_at(document, field.path)
                    .and_then(Value::as_i64)
                    .unwrap_or(min);
                if ui
                    .add(egui::DragValue::new(&mut value).range(min..=max))
                    .changed()
                {
                    schema::set_value(document, field.path, Value::from(value));
                }
            }
            FieldKind::Float { min, max } => {
                let mut value = schema::value_at(document, field.path)
                    .and_then(Value::as_f64)
                    .unwrap_or(min);
                if ui
                    .add(egui::DragValue::new(&mut value).range(min..=max).speed(0.05))
                    .changed()
                {
                    schema::set_value(document, field.path, Value::from(value));
                }
            }
            FieldKind::Text | FieldKind::Password => {
                let mut value = schema::value_at(document, field.path)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let edit = egui::TextEdit::singleline(&mut value)
                    .password(field.kind == FieldKind::Password)
                    .desired_width(200.0);
                if ui.add(edit).changed() {
                    schema::set_value(document, field.path, Value::String(value));
                }
            }
            FieldKind::TextArea => {
                let mut value = schema::value_at(document, field.path)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if ui
                    .add(egui::TextEdit::multiline(&mut value).desired_rows(3))
                    .changed()
                {
                    schema::set_value(document, field.path, Value::String(value));
                }
            }
            FieldKind::StringList => {
                let mut value = schema::value_at(document, field.path)
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .collect::<Vec<_>>()
                            .join("\n")
                    })
                    .unwrap_or_default();
                if ui
                    .add(egui::TextEdit::multiline(&mut value).desired_rows(3))
                    .changed()
                {
                    let items: Vec<Value> = value
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(|line| Value::String(line.to_string()))
                        .collect();
                    schema::set_value(document, field.path, Value::Array(items));
                }
            }
        }
    }
}
