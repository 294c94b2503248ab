//! The dataset generation driver: wires the backend together, loads the run
//! configuration and drives the per-camera render/checkpoint loop.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec2, Vec4};
use log::{debug, info, warn};

use crate::camera::PerspectiveCamera;
use crate::config::{self, CameraInfo};
use crate::device::ComputeContext;
use crate::output::{resolve_frame, write_image};
use crate::render::cpu::CpuRenderFactory;
use crate::render::{OutputDesc, RenderFactory, Renderer, SceneController};
use crate::scene::Scene;

/// Progressive passes accumulated per camera.
pub const NUM_ITERATIONS: u32 = 4096;

/// Orchestrates a dataset run: one scene, N cameras, progressive rendering
/// with snapshots of every configured output channel at each checkpoint.
pub struct Generator {
    renderer: Box<dyn Renderer>,
    controller: Box<dyn SceneController>,
    outputs: Vec<OutputDesc>,
    width: u32,
    height: u32,
    scene: Scene,
    cameras: Vec<CameraInfo>,
    checkpoints: BTreeSet<u32>,
    compute: Option<ComputeContext>,
}

impl Generator {
    /// Opens `scene_path` and sets up the default backend at the given
    /// output resolution, capturing the standard channel set.
    ///
    /// The scene path is validated before any device work. A compute device
    /// is then selected and a context created; when no device can be
    /// acquired the run continues on the host backend.
    pub fn new(scene_path: &Path, width: u32, height: u32) -> Result<Self> {
        let scene = Scene::load(scene_path)?;
        let compute = match ComputeContext::acquire() {
            Ok(context) => {
                info!(
                    "rendering on '{}' ({:?}, {:?})",
                    context.info.name, context.info.backend, context.info.device_type
                );
                Some(context)
            }
            Err(err) => {
                warn!("no compute device acquired, continuing on the host: {err:#}");
                None
            }
        };
        Self::assemble(
            &CpuRenderFactory::new(),
            scene,
            width,
            height,
            OutputDesc::standard_set(),
            compute,
        )
    }

    /// Dependency-injected constructor: caller supplies the backend factory
    /// and the output channel set. No device acquisition happens here.
    pub fn with_factory(
        factory: &dyn RenderFactory,
        scene_path: &Path,
        width: u32,
        height: u32,
        outputs: Vec<OutputDesc>,
    ) -> Result<Self> {
        let scene = Scene::load(scene_path)?;
        Self::assemble(factory, scene, width, height, outputs, None)
    }

    fn assemble(
        factory: &dyn RenderFactory,
        scene: Scene,
        width: u32,
        height: u32,
        outputs: Vec<OutputDesc>,
        compute: Option<ComputeContext>,
    ) -> Result<Self> {
        let mut renderer = factory.create_renderer();
        let controller = factory.create_scene_controller();
        for desc in &outputs {
            renderer.set_output(desc.kind, factory.create_output(width, height));
        }
        Ok(Self {
            renderer,
            controller,
            outputs,
            width,
            height,
            scene,
            cameras: Vec::new(),
            checkpoints: BTreeSet::new(),
            compute,
        })
    }

    /// Loads the camera list descriptor, replacing any previous list.
    pub fn load_cameras(&mut self, path: &Path) -> Result<()> {
        let xml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to open camera list '{}'", path.display()))?;
        self.cameras = config::parse_cameras(&xml)
            .with_context(|| format!("failed to parse camera list '{}'", path.display()))?;
        info!("loaded {} camera(s) from '{}'", self.cameras.len(), path.display());
        Ok(())
    }

    /// Loads the light list descriptor and attaches every light to the
    /// scene. Cumulative across calls.
    pub fn load_lights(&mut self, path: &Path) -> Result<()> {
        let xml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to open light list '{}'", path.display()))?;
        let texture_root = path.parent().unwrap_or(Path::new("."));
        let attached = config::load_lights_into(&mut self.scene, &xml, texture_root)
            .with_context(|| format!("failed to parse light list '{}'", path.display()))?;
        info!("attached {attached} light(s) from '{}'", path.display());
        Ok(())
    }

    /// Loads the sample-count checkpoint descriptor, replacing the previous
    /// set.
    pub fn load_checkpoints(&mut self, path: &Path) -> Result<()> {
        let xml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to open checkpoint list '{}'", path.display()))?;
        self.checkpoints = config::parse_checkpoints(&xml)
            .with_context(|| format!("failed to parse checkpoint list '{}'", path.display()))?;
        info!(
            "capturing at {} sample count(s) from '{}'",
            self.checkpoints.len(),
            path.display()
        );
        Ok(())
    }

    /// Loads material overrides if the file is readable; a missing file is
    /// not an error, a readable but malformed one is.
    pub fn load_material_overrides(&mut self, path: &Path) -> Result<()> {
        let xml = match std::fs::read_to_string(path) {
            Ok(xml) => xml,
            Err(err) => {
                debug!("skipping material overrides '{}': {err}", path.display());
                return Ok(());
            }
        };
        let overrides = config::parse_material_overrides(&xml)
            .with_context(|| format!("failed to parse material overrides '{}'", path.display()))?;
        info!(
            "replacing {} material(s) from '{}'",
            overrides.materials.len(),
            path.display()
        );
        self.scene.apply_material_overrides(overrides);
        Ok(())
    }

    pub fn cameras(&self) -> &[CameraInfo] {
        &self.cameras
    }

    pub fn checkpoints(&self) -> &BTreeSet<u32> {
        &self.checkpoints
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Compute context the run is bound to, if one was acquired.
    pub fn compute_context(&self) -> Option<&ComputeContext> {
        self.compute.as_ref()
    }

    /// Renders every camera and writes all checkpoint snapshots into
    /// `out_dir`. Returns the number of files written.
    pub fn generate(&mut self, out_dir: &Path) -> Result<u64> {
        let cameras = self.cameras.clone();
        let mut saved = 0u64;

        for (position, state) in cameras.iter().enumerate() {
            let cam_index = position as u32 + 1;

            if self.scene.camera().is_none() {
                let mut camera = PerspectiveCamera::new(state.position, state.target, state.up);
                camera.set_sensor_size(Vec2::splat(0.036));
                camera.set_depth_range(Vec2::new(0.0, 100_000.0));
                camera.set_focal_length(0.035);
                camera.set_focus_distance(1.0);
                camera.set_aperture(0.0);
                self.scene.set_camera(camera);
            }
            let camera = self
                .scene
                .camera_mut()
                .ok_or_else(|| anyhow!("scene lost its camera"))?;
            update_camera_settings(camera, state);

            for desc in &self.outputs {
                if let Some(output) = self.renderer.output_mut(desc.kind) {
                    output.clear(Vec4::ZERO);
                }
            }

            let compiled = self.controller.compiled_scene(&self.scene)?;

            for iteration in 1..=NUM_ITERATIONS {
                self.renderer.render(&compiled)?;
                if self.checkpoints.contains(&iteration) {
                    for desc in &self.outputs {
                        self.save_output(desc, out_dir, cam_index, iteration)?;
                        saved += 1;
                    }
                    info!("camera {cam_index}: captured checkpoint at {iteration} spp");
                }
            }
            info!("camera {cam_index}/{} done", cameras.len());
        }
        Ok(saved)
    }

    /// Saves one output channel for (`cam_index`, `spp`) into `out_dir`.
    fn save_output(
        &self,
        desc: &OutputDesc,
        out_dir: &Path,
        cam_index: u32,
        spp: u32,
    ) -> Result<()> {
        if out_dir.file_name().is_none() {
            bail!(
                "output directory '{}' has no final path component",
                out_dir.display()
            );
        }
        let path = out_dir.join(output_file_name(desc, cam_index, spp));

        let output = self
            .renderer
            .output(desc.kind)
            .ok_or_else(|| anyhow!("no output bound for channel '{}'", desc.name))?;
        let frame = resolve_frame(&output.data(), output.width(), output.height());
        write_image(&path, &frame, self.width, self.height, &desc.file_ext)
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("outputs", &self.outputs)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("scene", &self.scene)
            .field("cameras", &self.cameras)
            .field("checkpoints", &self.checkpoints)
            .field("compute", &self.compute.as_ref().map(|context| &context.info))
            .finish_non_exhaustive()
    }
}

/// File name for one (camera, channel, sample count) snapshot.
pub fn output_file_name(desc: &OutputDesc, cam_index: u32, spp: u32) -> PathBuf {
    PathBuf::from(format!(
        "cam_{cam_index}_{}_spp_{spp}.{}",
        desc.name, desc.file_ext
    ))
}

/// Pushes `state` to the renderer camera, touching only the values that
/// actually differ (exact floating-point comparison; orientation is compared
/// and re-applied as a group).
fn update_camera_settings(camera: &mut PerspectiveCamera, state: &CameraInfo) {
    if state.aperture != camera.aperture() {
        camera.set_aperture(state.aperture);
    }
    if state.focal_length != camera.focal_length() {
        camera.set_focal_length(state.focal_length);
    }
    if state.focus_distance != camera.focus_distance() {
        camera.set_focus_distance(state.focus_distance);
    }
    if state.position != camera.eye() || state.target != camera.target() || state.up != camera.up()
    {
        camera.look_at(state.position, state.target, state.up);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::fs;

    fn write_fixtures(dir: &Path) -> PathBuf {
        let scene = dir.join("scene.obj");
        fs::write(&scene, "o cube\n").unwrap();
        scene
    }

    fn one_camera() -> CameraInfo {
        CameraInfo {
            position: Vec3::new(0.0, 1.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            focal_length: 0.05,
            focus_distance: 2.0,
            aperture: 0.2,
        }
    }

    fn generator(dir: &Path, outputs: Vec<OutputDesc>) -> Generator {
        let scene = write_fixtures(dir);
        Generator::with_factory(&CpuRenderFactory::new(), &scene, 8, 8, outputs).unwrap()
    }

    #[test]
    fn construction_fails_on_scene_path_without_parent() {
        let err = Generator::with_factory(
            &CpuRenderFactory::new(),
            Path::new("scene.obj"),
            8,
            8,
            OutputDesc::standard_set(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no parent directory"));
    }

    #[test]
    fn update_camera_settings_is_idempotent_under_exact_equality() {
        let state = one_camera();
        let mut camera = PerspectiveCamera::new(Vec3::ZERO, Vec3::Z, Vec3::Y);

        update_camera_settings(&mut camera, &state);
        let after_first = camera.revision();
        assert!(after_first > 0);

        update_camera_settings(&mut camera, &state);
        assert_eq!(camera.revision(), after_first);
    }

    #[test]
    fn update_camera_settings_applies_only_changed_fields() {
        let state = one_camera();
        let mut camera = PerspectiveCamera::new(state.position, state.target, state.up);
        camera.set_focal_length(state.focal_length);
        camera.set_focus_distance(state.focus_distance);
        camera.set_aperture(state.aperture);
        let baseline = camera.revision();

        let mut changed = state;
        changed.aperture = 0.4;
        update_camera_settings(&mut camera, &changed);
        // one setter call, orientation untouched
        assert_eq!(camera.revision(), baseline + 1);
        assert_eq!(camera.aperture(), 0.4);
    }

    #[test]
    fn generate_writes_every_checkpoint_for_every_channel() {
        let dir = tempfile::tempdir().unwrap();
        let mut generator = generator(dir.path(), OutputDesc::standard_set());
        generator.cameras = vec![one_camera()];
        generator.checkpoints = BTreeSet::from([10, 50]);

        let out_dir = dir.path().join("out");
        fs::create_dir(&out_dir).unwrap();
        let saved = generator.generate(&out_dir).unwrap();
        assert_eq!(saved, 10);

        for channel in ["color", "view_shading_normal", "depth", "albedo", "gloss"] {
            for spp in [10, 50] {
                let file = out_dir.join(format!("cam_1_{channel}_spp_{spp}.png"));
                assert!(file.is_file(), "missing {}", file.display());
            }
        }
    }

    #[test]
    fn generate_applies_camera_defaults_then_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut generator = generator(
            dir.path(),
            vec![OutputDesc::new(crate::render::OutputKind::Color, "color", "png")],
        );
        generator.cameras = vec![one_camera()];
        // no checkpoints: loop runs but nothing is saved
        generator.checkpoints = BTreeSet::new();

        let out_dir = dir.path().join("out");
        fs::create_dir(&out_dir).unwrap();
        assert_eq!(generator.generate(&out_dir).unwrap(), 0);

        let camera = generator.scene().camera().unwrap();
        assert_eq!(camera.sensor_size(), Vec2::splat(0.036));
        assert_eq!(camera.depth_range(), Vec2::new(0.0, 100_000.0));
        assert_eq!(camera.eye(), Vec3::new(0.0, 1.0, 5.0));
        assert_eq!(camera.focal_length(), 0.05);
        assert_eq!(camera.aperture(), 0.2);
    }

    #[test]
    fn saved_pixels_equal_normalized_flipped_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let desc = OutputDesc::new(crate::render::OutputKind::Color, "color", "exr");
        let mut generator = generator(dir.path(), vec![desc.clone()]);
        generator.cameras = vec![one_camera()];
        generator.checkpoints = BTreeSet::from([7]);

        let out_dir = dir.path().join("out");
        fs::create_dir(&out_dir).unwrap();
        generator.generate(&out_dir).unwrap();

        let raw = generator.renderer.output(desc.kind).unwrap().data();
        let expected = resolve_frame(&raw, 8, 8);
        let reread = image::open(out_dir.join("cam_1_color_spp_7.exr"))
            .unwrap()
            .into_rgb32f();
        for y in 0..8u32 {
            for x in 0..8u32 {
                let want = expected[(y * 8 + x) as usize];
                // accumulation continued past the checkpoint, but the
                // normalized pattern is pass-invariant
                let got = reread.get_pixel(x, y).0;
                for c in 0..3 {
                    assert!((got[c] - want[c]).abs() < 1e-5);
                }
            }
        }
    }

    #[test]
    fn save_output_rejects_directory_without_final_component() {
        let dir = tempfile::tempdir().unwrap();
        let mut generator = generator(dir.path(), OutputDesc::standard_set());
        generator.cameras = vec![one_camera()];
        generator.checkpoints = BTreeSet::from([1]);

        let err = generator.generate(Path::new("/")).unwrap_err();
        assert!(err.to_string().contains("no final path component"));
    }
}
