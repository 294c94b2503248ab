//! Capability seams for the rendering backend.
//!
//! The path tracer proper lives behind these traits; the driver only needs a
//! factory that hands out a renderer, a scene controller and output buffers.
//! The crate ships one implementation, [`cpu::CpuRenderFactory`], which
//! accumulates a deterministic pattern so the pipeline runs without a GPU
//! backend attached.

use std::sync::Arc;

use anyhow::Result;
use glam::Vec4;

use crate::camera::PerspectiveCamera;
use crate::config::Light;
use crate::scene::Scene;

pub mod cpu;

/// Output channels the renderer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Color,
    ViewShadingNormal,
    Depth,
    Albedo,
    Gloss,
}

impl OutputKind {
    pub const ALL: [OutputKind; 5] = [
        OutputKind::Color,
        OutputKind::ViewShadingNormal,
        OutputKind::Depth,
        OutputKind::Albedo,
        OutputKind::Gloss,
    ];
}

/// Describes one output channel to capture: which buffer to read and how the
/// file it lands in is named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDesc {
    pub kind: OutputKind,
    pub name: String,
    pub file_ext: String,
}

impl OutputDesc {
    pub fn new(kind: OutputKind, name: &str, file_ext: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            file_ext: file_ext.to_string(),
        }
    }

    /// The default capture set: all five channels as PNG.
    pub fn standard_set() -> Vec<OutputDesc> {
        vec![
            OutputDesc::new(OutputKind::Color, "color", "png"),
            OutputDesc::new(OutputKind::ViewShadingNormal, "view_shading_normal", "png"),
            OutputDesc::new(OutputKind::Depth, "depth", "png"),
            OutputDesc::new(OutputKind::Albedo, "albedo", "png"),
            OutputDesc::new(OutputKind::Gloss, "gloss", "png"),
        ]
    }
}

/// Accumulation buffer for one output channel.
///
/// Pixels are RGBA where the alpha channel carries the accumulation weight.
/// Row 0 is the bottom of the image, matching the renderer's layout.
pub trait Output {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Overwrites every pixel with `value`.
    fn clear(&mut self, value: Vec4);
    /// Adds one sample into the pixel at (`x`, `y`).
    fn add_sample(&mut self, x: u32, y: u32, value: Vec4);
    /// Reads the buffer back, row-major from the bottom row.
    fn data(&self) -> Vec<Vec4>;
}

/// Snapshot of the scene in the form the renderer consumes.
#[derive(Debug, Clone)]
pub struct CompiledScene {
    pub revision: u64,
    pub camera: Option<PerspectiveCamera>,
    pub lights: Vec<Light>,
}

impl CompiledScene {
    pub fn snapshot(scene: &Scene) -> Self {
        Self {
            revision: scene.revision(),
            camera: scene.camera().cloned(),
            lights: scene.lights().to_vec(),
        }
    }
}

/// Compiles scenes into renderer-consumable form, caching by scene revision
/// so accumulating many samples for one camera pays the translation cost
/// once.
pub trait SceneController {
    fn compiled_scene(&mut self, scene: &Scene) -> Result<Arc<CompiledScene>>;
}

/// Progressive renderer: each `render` call accumulates one pass into every
/// bound output.
pub trait Renderer {
    fn set_output(&mut self, kind: OutputKind, output: Box<dyn Output>);
    fn output(&self, kind: OutputKind) -> Option<&dyn Output>;
    fn output_mut(&mut self, kind: OutputKind) -> Option<&mut dyn Output>;
    fn render(&mut self, scene: &CompiledScene) -> Result<()>;
}

/// Creates the backend pieces the driver wires together at startup.
pub trait RenderFactory {
    fn create_renderer(&self) -> Box<dyn Renderer>;
    fn create_scene_controller(&self) -> Box<dyn SceneController>;
    fn create_output(&self, width: u32, height: u32) -> Box<dyn Output>;
}
