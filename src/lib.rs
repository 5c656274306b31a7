pub mod animation;
pub mod app;
pub mod cli;
pub mod error;
pub mod lua;
pub mod model;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod timeline;
pub mod ui;

pub const CONFY_APP_NAME: &str = "rbvis-rs";
