//! Loaders for the XML descriptors driving a dataset run: camera poses,
//! lights, sample-count checkpoints and optional material overrides.
//!
//! Attribute parsing follows the descriptors as written by the authoring
//! tools: a float attribute that is absent or malformed reads as `0.0`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use image::DynamicImage;
use roxmltree::{Document, Node};
use thiserror::Error;

use crate::scene::Scene;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open {document}: no <{root}> root element")]
    MissingRoot {
        document: &'static str,
        root: &'static str,
    },
    #[error("invalid light type '{0}'")]
    InvalidLightType(String),
    #[error("failed to load IBL texture {path}")]
    Texture {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Xml(#[from] roxmltree::Error),
}

/// One camera pose from the camera list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraInfo {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub focal_length: f32,
    pub focus_distance: f32,
    pub aperture: f32,
}

/// Kind-specific light payload, selected once at parse time.
#[derive(Debug, Clone)]
pub enum LightKind {
    Point,
    Directional,
    Spot { cone_shape: Vec2 },
    ImageBased { texture: DynamicImage, multiplier: f32 },
}

/// A light as attached to the scene.
#[derive(Debug, Clone)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub radiance: Vec3,
}

/// Material override set: named material records plus a name-remapping
/// table, both opaque to this layer and handed to the scene as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialOverrides {
    pub materials: Vec<MaterialRecord>,
    pub mappings: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialRecord {
    pub name: String,
    pub parameters: Vec<(String, String)>,
}

fn float_attr(node: &Node<'_, '_>, name: &str) -> f32 {
    node.attribute(name)
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(0.0)
}

fn vec3_attrs(node: &Node<'_, '_>, x: &str, y: &str, z: &str) -> Vec3 {
    Vec3::new(float_attr(node, x), float_attr(node, y), float_attr(node, z))
}

fn root_element<'a>(
    doc: &'a Document<'a>,
    document: &'static str,
    root: &'static str,
) -> Result<Node<'a, 'a>, ConfigError> {
    let element = doc.root_element();
    if element.has_tag_name(root) {
        Ok(element)
    } else {
        Err(ConfigError::MissingRoot { document, root })
    }
}

/// Parses a `<cam_list>` descriptor into camera poses in document order.
pub fn parse_cameras(xml: &str) -> Result<Vec<CameraInfo>, ConfigError> {
    let doc = Document::parse(xml)?;
    let root = root_element(&doc, "camera list", "cam_list")?;

    let mut cameras = Vec::new();
    for node in root.children().filter(|n| n.has_tag_name("camera")) {
        cameras.push(CameraInfo {
            position: vec3_attrs(&node, "cpx", "cpy", "cpz"),
            target: vec3_attrs(&node, "tpx", "tpy", "tpz"),
            up: vec3_attrs(&node, "upx", "upy", "upz"),
            focal_length: float_attr(&node, "focal_length"),
            focus_distance: float_attr(&node, "focus_dist"),
            aperture: float_attr(&node, "aperture"),
        });
    }
    Ok(cameras)
}

/// Parses a `<spp_list>` descriptor into the set of sample counts at which
/// outputs are captured. Duplicate entries collapse.
pub fn parse_checkpoints(xml: &str) -> Result<BTreeSet<u32>, ConfigError> {
    let doc = Document::parse(xml)?;
    let root = root_element(&doc, "sample checkpoint list", "spp_list")?;

    let mut checkpoints = BTreeSet::new();
    for node in root.children().filter(|n| n.has_tag_name("spp")) {
        let iterations = node
            .attribute("iter_num")
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(0);
        checkpoints.insert(iterations);
    }
    Ok(checkpoints)
}

/// Parses a `<light_list>` descriptor and attaches each light to `scene` as
/// it is read; lights already attached (including earlier entries of this
/// document) stay attached if a later entry fails. IBL texture paths are
/// resolved against `texture_root`.
pub fn load_lights_into(
    scene: &mut Scene,
    xml: &str,
    texture_root: &Path,
) -> Result<usize, ConfigError> {
    let doc = Document::parse(xml)?;
    let root = root_element(&doc, "light list", "light_list")?;

    let mut attached = 0;
    for node in root.children().filter(|n| n.has_tag_name("light")) {
        let type_name = node.attribute("type").unwrap_or("");
        let kind = match type_name {
            "point" => LightKind::Point,
            "direct" => LightKind::Directional,
            "spot" => LightKind::Spot {
                cone_shape: Vec2::new(float_attr(&node, "csx"), float_attr(&node, "csy")),
            },
            "ibl" => {
                let path = texture_root.join(node.attribute("tex").unwrap_or(""));
                let texture = image::open(&path)
                    .map_err(|source| ConfigError::Texture { path, source })?;
                LightKind::ImageBased {
                    texture,
                    multiplier: float_attr(&node, "mul"),
                }
            }
            other => return Err(ConfigError::InvalidLightType(other.to_string())),
        };

        scene.attach_light(Light {
            kind,
            position: vec3_attrs(&node, "posx", "posy", "posz"),
            direction: vec3_attrs(&node, "dirx", "diry", "dirz"),
            radiance: vec3_attrs(&node, "radx", "rady", "radz"),
        });
        attached += 1;
    }
    Ok(attached)
}

/// Parses a material override document: `<material name=..>` records with
/// their remaining attributes kept as parameters, and `<mapping from=.. to=..>`
/// remapping pairs.
pub fn parse_material_overrides(xml: &str) -> Result<MaterialOverrides, ConfigError> {
    let doc = Document::parse(xml)?;

    let mut overrides = MaterialOverrides::default();
    for node in doc.descendants() {
        if node.has_tag_name("material") {
            let mut record = MaterialRecord::default();
            for attr in node.attributes() {
                if attr.name() == "name" {
                    record.name = attr.value().to_string();
                } else {
                    record
                        .parameters
                        .push((attr.name().to_string(), attr.value().to_string()));
                }
            }
            overrides.materials.push(record);
        } else if node.has_tag_name("mapping") {
            overrides.mappings.push((
                node.attribute("from").unwrap_or("").to_string(),
                node.attribute("to").unwrap_or("").to_string(),
            ));
        }
    }
    Ok(overrides)
}
