// Library surface shared by the binary and the integration tests.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod controller;
pub mod exercise;
pub mod generation;
pub mod keyboard;
pub mod lesson;
pub mod logging;
pub mod runtime;
pub mod session;
pub mod ui;
pub mod util;
