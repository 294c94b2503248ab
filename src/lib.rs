//! Dataset generation driver for a progressive path-tracing renderer.
//!
//! The crate loads a scene, camera poses, lights and sample-count
//! checkpoints from XML descriptors, then renders each camera progressively
//! and snapshots the configured output channels to disk at every checkpoint.
//! The path tracer itself sits behind the capability traits in [`render`];
//! a deterministic CPU backend ships with the crate so the pipeline stays
//! runnable and testable without a GPU renderer attached.

pub mod camera;
pub mod config;
pub mod device;
pub mod driver;
pub mod output;
pub mod render;
pub mod scene;

pub use camera::PerspectiveCamera;
pub use config::{CameraInfo, ConfigError, Light, LightKind, MaterialOverrides};
pub use device::{select_device, ComputeContext, DeviceInfo};
pub use driver::{output_file_name, Generator, NUM_ITERATIONS};
pub use render::cpu::CpuRenderFactory;
pub use render::{CompiledScene, Output, OutputDesc, OutputKind, RenderFactory, Renderer, SceneController};
pub use scene::Scene;
