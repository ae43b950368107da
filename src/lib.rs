pub mod api;
pub mod app;
pub mod search;
pub mod settings;
