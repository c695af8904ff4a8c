//! GPU context resource and its run-mode strategies.
//!
//! A [`GpuResource`] pairs a device with a [`RenderLoop`]. The loop decides
//! how the per-frame step is pumped: by a platform event loop for windowed
//! contexts, or back-to-back for headless ones.

use std::sync::Arc;
use std::thread::ThreadId;

use gazer_common::config::GpuBackendKind;
use gazer_common::error::{GazerError, GazerResult};

use crate::device::{create_device, GpuDevice};
use crate::display::DisplaySink;

/// Whether the context is bound to an on-screen window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    Windowed,
    Headless,
}

impl std::fmt::Display for ContextMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextMode::Windowed => f.write_str("windowed"),
            ContextMode::Headless => f.write_str("headless"),
        }
    }
}

/// Returned by the render step to keep or stop the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderControl {
    Continue,
    Stop,
}

/// How a render loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The step returned `Stop`.
    Exhausted,
    /// The user closed the window.
    Closed,
}

/// One iteration of the frame cycle.
pub type RenderStep<'a> = dyn FnMut() -> GazerResult<RenderControl> + 'a;

/// Run-mode strategy for a GPU context.
pub trait RenderLoop: Send {
    fn mode(&self) -> ContextMode;

    /// Adjust the backing surface. Headless loops ignore this.
    fn resize(&mut self, width: u32, height: u32);

    /// A display bound to this loop's surface, if it has one.
    fn display_sink(&mut self, device: Arc<dyn GpuDevice>) -> Option<Box<dyn DisplaySink>>;

    /// Pump `step` until it stops, fails, or the surface is closed.
    fn run(&mut self, step: &mut RenderStep<'_>) -> GazerResult<LoopExit>;
}

/// Calls the step back-to-back without suspending.
#[derive(Debug, Default)]
pub struct HeadlessLoop;

impl RenderLoop for HeadlessLoop {
    fn mode(&self) -> ContextMode {
        ContextMode::Headless
    }

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn display_sink(&mut self, _device: Arc<dyn GpuDevice>) -> Option<Box<dyn DisplaySink>> {
        None
    }

    fn run(&mut self, step: &mut RenderStep<'_>) -> GazerResult<LoopExit> {
        while step()? == RenderControl::Continue {}
        Ok(LoopExit::Exhausted)
    }
}

/// A GPU context, optionally bound to a window.
pub struct GpuResource {
    name: String,
    render_loop: Box<dyn RenderLoop>,
    device: Arc<dyn GpuDevice>,
    owner: Option<ThreadId>,
}

impl GpuResource {
    /// Create the context.
    ///
    /// Windowed mode needs a display server and the `window` feature;
    /// otherwise, or when the requested device backend cannot be created,
    /// this fails with `ResourceUnavailable` and nothing stays allocated.
    pub fn new(
        name: &str,
        width: u32,
        height: u32,
        mode: ContextMode,
        backend: GpuBackendKind,
    ) -> GazerResult<Self> {
        let render_loop: Box<dyn RenderLoop> = match mode {
            ContextMode::Headless => Box::new(HeadlessLoop),
            ContextMode::Windowed => windowed_loop(name, width, height)?,
        };
        let device = create_device(backend)?;

        tracing::info!(
            context = name,
            mode = %mode,
            backend = device.backend_name(),
            width,
            height,
            "GPU context created"
        );

        Ok(Self::from_parts(name, render_loop, device))
    }

    /// Assemble a context from an explicit loop and device.
    pub fn from_parts(
        name: &str,
        render_loop: Box<dyn RenderLoop>,
        device: Arc<dyn GpuDevice>,
    ) -> Self {
        Self {
            name: name.to_string(),
            render_loop,
            device,
            owner: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ContextMode {
        self.render_loop.mode()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        tracing::debug!(context = %self.name, width, height, "Resizing context");
        self.render_loop.resize(width, height);
    }

    /// Make the context current on the calling thread.
    ///
    /// Repeated calls from the owning thread are no-ops; calls from any
    /// other thread fail.
    pub fn activate(&mut self) -> GazerResult<()> {
        let current = std::thread::current().id();
        match self.owner {
            None => {
                self.owner = Some(current);
                tracing::debug!(context = %self.name, "Context activated");
                Ok(())
            }
            Some(owner) if owner == current => Ok(()),
            Some(_) => Err(GazerError::context_inactive(format!(
                "context '{}' is owned by another thread",
                self.name
            ))),
        }
    }

    pub fn is_active(&self) -> bool {
        self.owner == Some(std::thread::current().id())
    }

    pub fn device(&self) -> Arc<dyn GpuDevice> {
        Arc::clone(&self.device)
    }

    /// Display bound to the context's window; `None` when headless.
    pub fn display_sink(&mut self) -> Option<Box<dyn DisplaySink>> {
        let device = self.device();
        self.render_loop.display_sink(device)
    }

    /// Pump `step` with this context's run-mode strategy. Blocks until the
    /// loop ends. The context must be active on the calling thread.
    pub fn run(&mut self, step: &mut RenderStep<'_>) -> GazerResult<LoopExit> {
        if !self.is_active() {
            return Err(GazerError::context_inactive(format!(
                "context '{}' must be activated on this thread before run",
                self.name
            )));
        }
        self.render_loop.run(step)
    }
}

impl std::fmt::Debug for GpuResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuResource")
            .field("name", &self.name)
            .field("mode", &self.mode())
            .field("backend", &self.device.backend_name())
            .field("owner", &self.owner)
            .finish()
    }
}

#[cfg(feature = "window")]
fn windowed_loop(name: &str, width: u32, height: u32) -> GazerResult<Box<dyn RenderLoop>> {
    Ok(Box::new(crate::window::WindowLoop::new(name, width, height)?))
}

#[cfg(not(feature = "window"))]
fn windowed_loop(_name: &str, _width: u32, _height: u32) -> GazerResult<Box<dyn RenderLoop>> {
    Err(GazerError::resource_unavailable(
        "built without the `window` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareDevice;

    fn headless() -> GpuResource {
        GpuResource::from_parts(
            "test",
            Box::new(HeadlessLoop),
            Arc::new(SoftwareDevice::new()),
        )
    }

    #[test]
    fn headless_runs_until_stop() {
        let mut resource = headless();
        resource.activate().unwrap();
        let mut calls = 0;
        let exit = resource
            .run(&mut || {
                calls += 1;
                Ok(if calls < 5 {
                    RenderControl::Continue
                } else {
                    RenderControl::Stop
                })
            })
            .unwrap();
        assert_eq!(exit, LoopExit::Exhausted);
        assert_eq!(calls, 5);
    }

    #[test]
    fn step_error_ends_the_loop() {
        let mut resource = headless();
        resource.activate().unwrap();
        let mut calls = 0;
        let result = resource.run(&mut || {
            calls += 1;
            Err(GazerError::processing("boom"))
        });
        assert!(matches!(result, Err(GazerError::Processing { .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn run_requires_activation() {
        let mut resource = headless();
        let result = resource.run(&mut || Ok(RenderControl::Stop));
        assert!(matches!(result, Err(GazerError::ContextInactive { .. })));
    }

    #[test]
    fn activation_is_idempotent_on_owner_and_rejected_elsewhere() {
        let mut resource = headless();
        resource.activate().unwrap();
        resource.activate().unwrap();
        let result = std::thread::scope(|s| s.spawn(|| resource.activate()).join());
        assert!(matches!(result, Ok(Err(GazerError::ContextInactive { .. }))));
    }

    #[test]
    fn headless_has_no_display_and_ignores_resize() {
        let mut resource = headless();
        resource.resize(1920, 1080);
        assert_eq!(resource.mode(), ContextMode::Headless);
        assert!(resource.display_sink().is_none());
    }

    #[test]
    fn new_headless_software_context() {
        let resource = GpuResource::new(
            "gazer",
            64,
            48,
            ContextMode::Headless,
            GpuBackendKind::Software,
        )
        .unwrap();
        assert_eq!(resource.device().backend_name(), "software");
    }
}
