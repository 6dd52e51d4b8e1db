pub mod app;
pub mod auth;
pub mod captcha;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod course;
pub mod error;
pub mod orchestrator;
pub mod portal;
pub mod probe;
pub mod process_guard;
pub mod progress;
pub mod selection;
pub mod simulator;
pub mod ui;
pub mod util;
