use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::camera::PerspectiveCamera;
use crate::config::{Light, MaterialOverrides};

/// Handle to the scene being rendered for the whole run.
///
/// Geometry stays opaque to this layer; the handle tracks the source path,
/// attached lights, the bound camera and material overrides, and bumps a
/// revision counter on every change so the scene controller knows when its
/// cached compilation is stale.
#[derive(Debug)]
pub struct Scene {
    path: PathBuf,
    lights: Vec<Light>,
    camera: Option<PerspectiveCamera>,
    material_overrides: Option<MaterialOverrides>,
    revision: u64,
}

impl Scene {
    /// Opens the scene at `path`. The path must carry a file name and a
    /// parent directory (resource lookups are relative to it), and the file
    /// must be readable.
    pub fn load(path: &Path) -> Result<Self> {
        if path.file_name().is_none() {
            bail!("scene path '{}' has no file name", path.display());
        }
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {}
            _ => bail!("scene path '{}' has no parent directory", path.display()),
        }
        std::fs::metadata(path)
            .with_context(|| format!("failed to open scene file '{}'", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            lights: Vec::new(),
            camera: None,
            material_overrides: None,
            revision: 0,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            path: PathBuf::from("test/scene.obj"),
            lights: Vec::new(),
            camera: None,
            material_overrides: None,
            revision: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn attach_light(&mut self, light: Light) {
        self.lights.push(light);
        self.revision += 1;
    }

    pub fn camera(&self) -> Option<&PerspectiveCamera> {
        self.camera.as_ref()
    }

    /// Mutable camera access. Marks the scene dirty: the next compilation
    /// request re-snapshots even if the caller ends up changing nothing.
    pub fn camera_mut(&mut self) -> Option<&mut PerspectiveCamera> {
        self.revision += 1;
        self.camera.as_mut()
    }

    pub fn set_camera(&mut self, camera: PerspectiveCamera) {
        self.camera = Some(camera);
        self.revision += 1;
    }

    pub fn material_overrides(&self) -> Option<&MaterialOverrides> {
        self.material_overrides.as_ref()
    }

    /// Replaces the scene's materials with the override set.
    pub fn apply_material_overrides(&mut self, overrides: MaterialOverrides) {
        self.material_overrides = Some(overrides);
        self.revision += 1;
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LightKind;
    use glam::Vec3;

    #[test]
    fn load_rejects_path_without_parent_directory() {
        let err = Scene::load(Path::new("scene.obj")).unwrap_err();
        assert!(err.to_string().contains("no parent directory"));
    }

    #[test]
    fn load_rejects_path_without_file_name() {
        let err = Scene::load(Path::new("/tmp/..")).unwrap_err();
        assert!(err.to_string().contains("no file name"));
    }

    #[test]
    fn load_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Scene::load(&dir.path().join("missing.obj")).unwrap_err();
        assert!(err.to_string().contains("failed to open scene file"));
    }

    #[test]
    fn load_opens_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.obj");
        std::fs::write(&path, "o cube\n").unwrap();
        let scene = Scene::load(&path).unwrap();
        assert_eq!(scene.path(), path);
        assert_eq!(scene.revision(), 0);
    }

    #[test]
    fn mutations_bump_revision() {
        let mut scene = Scene::for_tests();
        scene.attach_light(Light {
            kind: LightKind::Point,
            position: Vec3::ZERO,
            direction: Vec3::ZERO,
            radiance: Vec3::ONE,
        });
        assert_eq!(scene.revision(), 1);
        scene.apply_material_overrides(MaterialOverrides::default());
        assert_eq!(scene.revision(), 2);
        assert!(scene.material_overrides().is_some());
    }
}
