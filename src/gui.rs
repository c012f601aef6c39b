// src/gui.rs
use eframe::egui;
use egui::{Color32, ColorImage, TextureHandle, TextureOptions};
use log::{info, warn};
use std::path::PathBuf;

use crate::config::ViewerConfig;
use crate::controls::ControlPanel;
use crate::scope::{ChannelBuffer, PixmapSurface, ScopeError, ScrollRenderer, Surface2D};
use crate::scheduler::Scheduler;
use crate::session::{ConnectionState, Session};
use crate::transport::WsConnector;

const SNAPSHOT_FILE: &str = "bioscope-snapshot.png";

pub struct ScopeApp {
    scheduler: Scheduler<WsConnector, PixmapSurface>,
    panel: ControlPanel,
    texture: Option<TextureHandle>,
    snapshot_path: PathBuf,
    messages_received: usize,
}

impl ScopeApp {
    pub fn new(config: &ViewerConfig) -> Result<Self, ScopeError> {
        let surface = PixmapSurface::new(config.surface_width, config.surface_height)?;
        let session = Session::new(WsConnector, config.endpoint());
        let renderer = ScrollRenderer::new(config.window_seconds, config.activity_scale);
        let mut panel = ControlPanel::default();
        panel.log(&format!("Streaming from {}", config.endpoint()));
        Ok(Self {
            scheduler: Scheduler::new(session, renderer, surface),
            panel,
            texture: None,
            snapshot_path: PathBuf::from(SNAPSHOT_FILE),
            messages_received: 0,
        })
    }

    fn upload(&mut self, ctx: &egui::Context) {
        let surface = self.scheduler.surface();
        let (width, height) = surface.size();
        let image =
            ColorImage::from_rgba_premultiplied([width as usize, height as usize], surface.data());
        match &mut self.texture {
            Some(texture) => texture.set(image, TextureOptions::NEAREST),
            None => {
                self.texture = Some(ctx.load_texture("scope", image, TextureOptions::NEAREST));
            }
        }
    }

    fn save_snapshot(&mut self) {
        let result = self
            .scheduler
            .surface()
            .encode_png()
            .and_then(|png| {
                std::fs::write(&self.snapshot_path, png)
                    .map_err(|e| ScopeError::Snapshot(e.to_string()))
            });
        match result {
            Ok(()) => {
                info!("snapshot written to {}", self.snapshot_path.display());
                self.panel
                    .log(&format!("Saved {}", self.snapshot_path.display()));
            }
            Err(e) => {
                warn!("{e}");
                self.panel.log(&e.to_string());
            }
        }
    }

    fn connection_label(state: ConnectionState) -> egui::RichText {
        let (text, color) = match state {
            ConnectionState::Open => ("CONNECTED", Color32::GREEN),
            ConnectionState::Connecting => ("CONNECTING...", Color32::YELLOW),
            ConnectionState::Disconnected | ConnectionState::Closed => ("DISCONNECTED", Color32::RED),
        };
        egui::RichText::new(text).color(color).strong()
    }
}

impl eframe::App for ScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. 重连 / 消息处理 / 绘制
        let report = self.scheduler.tick(&mut self.panel);
        if report.reconnected {
            self.panel.log("Connecting...");
        }
        self.messages_received += report.messages;
        if report.paint.is_dirty() || self.texture.is_none() {
            self.upload(ctx);
        }
        ctx.request_repaint();

        // 2. UI 绘制
        let mut visuals = egui::Visuals::dark();
        visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(10, 10, 15);
        ctx.set_visuals(visuals);

        egui::SidePanel::left("L").min_width(240.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("Bioscope");
            ui.label(self.scheduler.session().endpoint());
            ui.label(Self::connection_label(self.scheduler.session().state()));
            ui.label(format!("{} messages", self.messages_received));
            let store = self.scheduler.store();
            if store.is_empty() {
                ui.label("Waiting for data.");
            }
            for index in 0..store.len() {
                if let Some(server) = store.server(index) {
                    let idle = server.channels().iter().all(ChannelBuffer::is_empty);
                    let status = if idle { "idle" } else { "live" };
                    ui.monospace(format!(
                        "#{index} {status} t={:.2}",
                        server.latest_received_frame_time()
                    ));
                }
            }
            ui.separator();

            let mut enabled = self.scheduler.session().enabled();
            if ui.checkbox(&mut enabled, "Enabled").changed() {
                self.scheduler.session_mut().set_enabled(enabled);
            }

            ui.add_space(10.0);
            ui.label("VARIABLES");
            let mut changed = Vec::new();
            for (name, value) in self.panel.variables_mut().iter_mut() {
                ui.horizontal(|ui| {
                    ui.label(name.as_str());
                    if ui.add(egui::DragValue::new(value).speed(0.01)).changed() {
                        changed.push((name.clone(), *value));
                    }
                });
            }
            for (name, value) in changed {
                self.scheduler.session_mut().set_variable(&name, value);
            }

            ui.add_space(10.0);
            ui.label("FOLLOWERS");
            for follower in self.panel.followers() {
                ui.monospace(format!("{:<12} {:.2}", follower.name, follower.latest_move_time));
            }

            ui.add_space(10.0);
            ui.separator();
            if ui.button("SAVE PNG").clicked() {
                self.save_snapshot();
            }
            egui::ScrollArea::vertical().max_height(120.0).show(ui, |ui| {
                for m in self.panel.log_messages() {
                    ui.monospace(m);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(texture) = &self.texture {
                ui.add(egui::Image::new(texture).shrink_to_fit());
            }
        });
    }
}
