pub mod api;
pub mod app;
pub mod baas;
pub mod bot;
pub mod cli;
pub mod config;
pub mod db;
pub mod global;
pub mod media;
pub mod summarize;
pub mod transcript;
pub mod transcription;
