//! Terminal front end: one module per command group plus shared styling.

pub mod alerts;
pub mod info;
pub mod rate;
pub mod setup;
pub mod ui;
