//! Built-in CPU backend.
//!
//! Accumulates a deterministic per-channel pattern instead of tracing rays,
//! so the full generation pipeline (clear, compile, progressive passes,
//! checkpoint saves) can run and be tested without a GPU renderer attached.
//! A real path tracer plugs in through the same [`RenderFactory`] seam.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use glam::{Vec3, Vec4};

use crate::render::{
    CompiledScene, Output, OutputKind, RenderFactory, Renderer, SceneController,
};
use crate::scene::Scene;

pub struct CpuRenderFactory;

impl CpuRenderFactory {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpuRenderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderFactory for CpuRenderFactory {
    fn create_renderer(&self) -> Box<dyn Renderer> {
        Box::new(CpuRenderer::new())
    }

    fn create_scene_controller(&self) -> Box<dyn SceneController> {
        Box::new(CpuSceneController::new())
    }

    fn create_output(&self, width: u32, height: u32) -> Box<dyn Output> {
        Box::new(CpuOutput::new(width, height))
    }
}

/// Host-memory accumulation buffer, row 0 at the bottom.
pub struct CpuOutput {
    width: u32,
    height: u32,
    pixels: Vec<Vec4>,
}

impl CpuOutput {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Vec4::ZERO; (width * height) as usize],
        }
    }
}

impl Output for CpuOutput {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self, value: Vec4) {
        self.pixels.fill(value);
    }

    fn add_sample(&mut self, x: u32, y: u32, value: Vec4) {
        self.pixels[(y * self.width + x) as usize] += value;
    }

    fn data(&self) -> Vec<Vec4> {
        self.pixels.clone()
    }
}

pub struct CpuRenderer {
    outputs: HashMap<OutputKind, Box<dyn Output>>,
}

impl CpuRenderer {
    pub fn new() -> Self {
        Self {
            outputs: HashMap::new(),
        }
    }
}

impl Default for CpuRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn axis(position: u32, extent: u32) -> f32 {
    if extent > 1 {
        position as f32 / (extent - 1) as f32
    } else {
        0.0
    }
}

/// Pattern value for one pixel of one channel. Pass-invariant, so the
/// weight-normalized image is identical at every checkpoint.
fn channel_value(kind: OutputKind, u: f32, v: f32, scene: &CompiledScene) -> Vec3 {
    let exposure = 0.25 + 0.15 * scene.lights.len() as f32;
    match kind {
        OutputKind::Color => Vec3::new(u, v, 0.5) * exposure,
        OutputKind::ViewShadingNormal => Vec3::new(u, v, 1.0 - 0.5 * (u + v)),
        OutputKind::Depth => {
            let near = scene
                .camera
                .as_ref()
                .map_or(1.0, |camera| camera.focus_distance().max(1.0));
            Vec3::splat(near * (u + v) * 0.5)
        }
        OutputKind::Albedo => Vec3::new(1.0 - u, 1.0 - v, 0.5),
        OutputKind::Gloss => Vec3::splat(u * v),
    }
}

impl Renderer for CpuRenderer {
    fn set_output(&mut self, kind: OutputKind, output: Box<dyn Output>) {
        self.outputs.insert(kind, output);
    }

    fn output(&self, kind: OutputKind) -> Option<&dyn Output> {
        self.outputs.get(&kind).map(|output| output.as_ref())
    }

    fn output_mut(&mut self, kind: OutputKind) -> Option<&mut dyn Output> {
        match self.outputs.get_mut(&kind) {
            Some(output) => Some(output.as_mut()),
            None => None,
        }
    }

    fn render(&mut self, scene: &CompiledScene) -> Result<()> {
        for (kind, output) in &mut self.outputs {
            let (width, height) = (output.width(), output.height());
            for y in 0..height {
                let v = axis(y, height);
                for x in 0..width {
                    let u = axis(x, width);
                    let rgb = channel_value(*kind, u, v, scene);
                    output.add_sample(x, y, rgb.extend(1.0));
                }
            }
        }
        Ok(())
    }
}

/// Caches the compiled snapshot by the scene handle's revision counter.
pub struct CpuSceneController {
    cached: Option<Arc<CompiledScene>>,
    compilations: u32,
}

impl CpuSceneController {
    pub fn new() -> Self {
        Self {
            cached: None,
            compilations: 0,
        }
    }

    /// How many times a fresh compilation actually ran.
    pub fn compilations(&self) -> u32 {
        self.compilations
    }
}

impl Default for CpuSceneController {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneController for CpuSceneController {
    fn compiled_scene(&mut self, scene: &Scene) -> Result<Arc<CompiledScene>> {
        if let Some(cached) = &self.cached {
            if cached.revision == scene.revision() {
                return Ok(Arc::clone(cached));
            }
        }
        let compiled = Arc::new(CompiledScene::snapshot(scene));
        self.compilations += 1;
        self.cached = Some(Arc::clone(&compiled));
        Ok(compiled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Light, LightKind};

    fn point_light() -> Light {
        Light {
            kind: LightKind::Point,
            position: Vec3::ZERO,
            direction: Vec3::ZERO,
            radiance: Vec3::ONE,
        }
    }

    #[test]
    fn controller_caches_until_scene_changes() {
        let mut scene = Scene::for_tests();
        let mut controller = CpuSceneController::new();

        let first = controller.compiled_scene(&scene).unwrap();
        let second = controller.compiled_scene(&scene).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(controller.compilations(), 1);

        scene.attach_light(point_light());
        let third = controller.compiled_scene(&scene).unwrap();
        assert!(!Arc::ptr_eq(&second, &third));
        assert_eq!(controller.compilations(), 2);
        assert_eq!(third.lights.len(), 1);
    }

    #[test]
    fn passes_accumulate_weight_and_keep_normalized_value_stable() {
        let mut scene = Scene::for_tests();
        scene.attach_light(point_light());
        let mut controller = CpuSceneController::new();
        let compiled = controller.compiled_scene(&scene).unwrap();

        let mut renderer = CpuRenderer::new();
        renderer.set_output(OutputKind::Color, Box::new(CpuOutput::new(4, 4)));

        renderer.render(&compiled).unwrap();
        let one_pass = renderer.output(OutputKind::Color).unwrap().data();
        for _ in 0..3 {
            renderer.render(&compiled).unwrap();
        }
        let four_passes = renderer.output(OutputKind::Color).unwrap().data();

        for (a, b) in one_pass.iter().zip(&four_passes) {
            assert_eq!(a.w, 1.0);
            assert_eq!(b.w, 4.0);
            // normalized RGB is pass-invariant
            assert!((a.truncate() - b.truncate() / b.w).length() < 1e-6);
        }
    }

    #[test]
    fn clear_resets_accumulation() {
        let mut output = CpuOutput::new(2, 2);
        output.add_sample(0, 0, Vec4::ONE);
        output.clear(Vec4::ZERO);
        assert!(output.data().iter().all(|pixel| *pixel == Vec4::ZERO));
    }
}
