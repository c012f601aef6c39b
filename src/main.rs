// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod config;
mod controls;
mod gui;
mod scheduler;
mod scope;
mod session;
mod transport;
mod types;
use anyhow::{anyhow, Result};
use config::ViewerConfig;
use eframe::egui;
use log::info;
use std::path::PathBuf;
// 入口函数：可选的第一个参数是 JSON 配置文件路径
fn main() -> Result<()> {
    env_logger::init();
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = ViewerConfig::load(config_path.as_deref())?;
    info!("streaming from {}", config.endpoint());
    let app = gui::ScopeApp::new(&config)?;
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([
            config.surface_width as f32 + 260.0,
            config.surface_height as f32 + 40.0,
        ])
        .with_title("Bioscope");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native("Bioscope", options, Box::new(move |_cc| Box::new(app)))
        .map_err(|e| anyhow!("window closed with error: {e}"))
}
