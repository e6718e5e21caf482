pub mod capture;
pub mod classifier;
pub mod config;
pub mod media;
pub mod presentation;
pub mod tips;
pub mod ui;
