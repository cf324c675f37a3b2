//! egui user interface
//!
//! `MochaApp` drives the single window; `AppState` holds all mutable
//! domain state and is mutated only from the update loop.

mod app;
pub mod components;
mod state;
mod theme;

pub use app::MochaApp;
pub use state::{AppState, Bubble, SettingsDraft};
pub use theme::Theme;
