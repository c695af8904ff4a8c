//! Windowed run mode on eframe.
//!
//! The render step runs inside the eframe update callback, once per
//! refresh. Presented frames are handed to the window through a shared
//! [`Surface`] and painted letterboxed into the central panel.

use std::sync::{Arc, Mutex, MutexGuard};

use eframe::egui;

use gazer_common::error::{GazerError, GazerResult};
use gazer_frame_model::{HostImage, PixelFormat, Swizzle, TextureHandle};

use crate::device::GpuDevice;
use crate::display::{DisplayGeometry, DisplaySink};
use crate::resource::{ContextMode, LoopExit, RenderControl, RenderLoop, RenderStep};

/// Display server the window would attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    Wayland,
    X11,
    Native,
    Unavailable,
}

/// Detect a usable display server from the environment.
pub fn detect_display_server() -> DisplayServer {
    if cfg!(any(target_os = "windows", target_os = "macos")) {
        return DisplayServer::Native;
    }
    display_server_from(
        std::env::var("WAYLAND_DISPLAY").ok(),
        std::env::var("DISPLAY").ok(),
    )
}

fn display_server_from(wayland: Option<String>, x11: Option<String>) -> DisplayServer {
    let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
    if set(&wayland) {
        DisplayServer::Wayland
    } else if set(&x11) {
        DisplayServer::X11
    } else {
        DisplayServer::Unavailable
    }
}

/// State shared between the window and its display sink.
#[derive(Debug, Default)]
struct Surface {
    /// Drawable size in physical pixels.
    size: (u32, u32),
    geometry: Option<DisplayGeometry>,
    pending: Option<HostImage>,
}

type SharedSurface = Arc<Mutex<Surface>>;

fn lock(surface: &SharedSurface) -> GazerResult<MutexGuard<'_, Surface>> {
    surface
        .lock()
        .map_err(|_| GazerError::present("window surface poisoned"))
}

/// Render loop driven by an eframe window.
#[derive(Debug)]
pub struct WindowLoop {
    title: String,
    width: u32,
    height: u32,
    surface: SharedSurface,
}

impl WindowLoop {
    /// Fails with `ResourceUnavailable` when no display server is reachable.
    pub fn new(title: &str, width: u32, height: u32) -> GazerResult<Self> {
        let server = detect_display_server();
        if server == DisplayServer::Unavailable {
            return Err(GazerError::resource_unavailable(
                "no display server (WAYLAND_DISPLAY and DISPLAY are unset)",
            ));
        }
        tracing::debug!(?server, "Display server detected");
        Ok(Self {
            title: title.to_string(),
            width,
            height,
            surface: Arc::new(Mutex::new(Surface {
                size: (width, height),
                ..Surface::default()
            })),
        })
    }
}

impl RenderLoop for WindowLoop {
    fn mode(&self) -> ContextMode {
        ContextMode::Windowed
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        if let Ok(mut surface) = lock(&self.surface) {
            surface.size = (width, height);
        }
    }

    fn display_sink(&mut self, device: Arc<dyn GpuDevice>) -> Option<Box<dyn DisplaySink>> {
        Some(Box::new(WindowDisplay {
            device,
            surface: Arc::clone(&self.surface),
            frame_size: (self.width, self.height),
        }))
    }

    fn run(&mut self, step: &mut RenderStep<'_>) -> GazerResult<LoopExit> {
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([self.width as f32, self.height as f32])
                .with_title(&self.title),
            ..Default::default()
        };

        let mut outcome = LoopOutcome::default();
        let app = PipelineApp {
            step,
            surface: Arc::clone(&self.surface),
            outcome: &mut outcome,
            texture: None,
        };

        eframe::run_native(&self.title, options, Box::new(|_cc| Ok(Box::new(app))))
            .map_err(|e| GazerError::resource_unavailable(format!("window loop: {e}")))?;

        match outcome {
            LoopOutcome { error: Some(e), .. } => Err(e),
            LoopOutcome {
                exhausted: true, ..
            } => Ok(LoopExit::Exhausted),
            _ => {
                tracing::info!("Window closed by user");
                Ok(LoopExit::Closed)
            }
        }
    }
}

#[derive(Default)]
struct LoopOutcome {
    exhausted: bool,
    error: Option<GazerError>,
}

impl LoopOutcome {
    fn finished(&self) -> bool {
        self.exhausted || self.error.is_some()
    }
}

struct PipelineApp<'s, 'f> {
    step: &'s mut RenderStep<'f>,
    surface: SharedSurface,
    outcome: &'s mut LoopOutcome,
    texture: Option<egui::TextureHandle>,
}

impl PipelineApp<'_, '_> {
    fn pump(&mut self, ctx: &egui::Context) {
        if self.outcome.finished() {
            return;
        }
        match (self.step)() {
            Ok(RenderControl::Continue) => ctx.request_repaint(),
            Ok(RenderControl::Stop) => {
                self.outcome.exhausted = true;
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
            Err(e) => {
                self.outcome.error = Some(e);
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }

    fn paint(&mut self, ctx: &egui::Context) {
        let pixels_per_point = ctx.pixels_per_point();
        let (pending, geometry) = match lock(&self.surface) {
            Ok(mut surface) => (surface.pending.take(), surface.geometry),
            Err(_) => (None, None),
        };

        if let Some(image) = pending {
            let color_image = egui::ColorImage::from_rgba_unmultiplied(
                [image.width as usize, image.height as usize],
                &image.data,
            );
            match self.texture.as_mut() {
                Some(texture) => texture.set(color_image, egui::TextureOptions::LINEAR),
                None => {
                    self.texture = Some(ctx.load_texture(
                        "gazer-frame",
                        color_image,
                        egui::TextureOptions::LINEAR,
                    ))
                }
            }
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::default().fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let panel = ui.max_rect();
                if let Ok(mut surface) = lock(&self.surface) {
                    surface.size = (
                        (panel.width() * pixels_per_point).round() as u32,
                        (panel.height() * pixels_per_point).round() as u32,
                    );
                }

                let (Some(texture), Some(geometry)) = (self.texture.as_ref(), geometry) else {
                    return;
                };
                let min = panel.min
                    + egui::vec2(geometry.offset_x, geometry.offset_y) / pixels_per_point;
                let rect = egui::Rect::from_min_size(
                    min,
                    egui::vec2(geometry.width, geometry.height) / pixels_per_point,
                );
                ui.painter().image(
                    texture.id(),
                    rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            });
    }
}

impl eframe::App for PipelineApp<'_, '_> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.pump(ctx);
        self.paint(ctx);
    }
}

/// Display sink that feeds a [`WindowLoop`] surface.
pub struct WindowDisplay {
    device: Arc<dyn GpuDevice>,
    surface: SharedSurface,
    frame_size: (u32, u32),
}

impl DisplaySink for WindowDisplay {
    fn init(&mut self, width: u32, height: u32, format: PixelFormat) -> GazerResult<()> {
        tracing::debug!(width, height, %format, "Window display initialised");
        self.frame_size = (width, height);
        let mut surface = lock(&self.surface)?;
        surface.geometry = Some(DisplayGeometry::fit(self.frame_size, surface.size));
        Ok(())
    }

    fn surface_size(&self) -> (u32, u32) {
        lock(&self.surface).map(|s| s.size).unwrap_or(self.frame_size)
    }

    fn set_display_geometry(&mut self, geometry: DisplayGeometry) {
        if let Ok(mut surface) = lock(&self.surface) {
            surface.geometry = Some(geometry);
        }
    }

    fn present(&mut self, texture: TextureHandle) -> GazerResult<()> {
        let mut image = self
            .device
            .read_pixels(texture)
            .map_err(|e| GazerError::present(format!("readback of {texture}: {e}")))?;
        if image.format != PixelFormat::Rgba {
            let swizzle = Swizzle::between(image.format, PixelFormat::Rgba);
            let mut rgba = vec![0u8; image.data.len()];
            swizzle.apply(&image.data, &mut rgba);
            image.data = rgba;
            image.format = PixelFormat::Rgba;
        }
        lock(&self.surface)?.pending = Some(image);
        Ok(())
    }
}
