use anyhow::{Context, Result};
use log::debug;

/// Identity of an enumerated compute device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
}

impl From<wgpu::AdapterInfo> for DeviceInfo {
    fn from(info: wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name,
            backend: info.backend,
            device_type: info.device_type,
        }
    }
}

fn is_gpu_class(device_type: wgpu::DeviceType) -> bool {
    matches!(
        device_type,
        wgpu::DeviceType::DiscreteGpu
            | wgpu::DeviceType::IntegratedGpu
            | wgpu::DeviceType::VirtualGpu
    )
}

/// Picks the device to render on: the first GPU-class device in enumeration
/// order, or device 0 when no GPU is present. `None` only when nothing was
/// enumerated at all.
pub fn select_device(devices: &[DeviceInfo]) -> Option<usize> {
    devices
        .iter()
        .position(|device| is_gpu_class(device.device_type))
        .or(if devices.is_empty() { None } else { Some(0) })
}

/// Compute context bound to the selected device. A GPU rendering backend
/// attaches through this; the built-in CPU backend runs without one.
pub struct ComputeContext {
    pub info: DeviceInfo,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl ComputeContext {
    /// Enumerates all adapters, selects one and creates a device/queue pair
    /// bound to it.
    pub fn acquire() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapters: Vec<wgpu::Adapter> = instance
            .enumerate_adapters(wgpu::Backends::all())
            .collect();
        let infos: Vec<DeviceInfo> = adapters
            .iter()
            .map(|adapter| DeviceInfo::from(adapter.get_info()))
            .collect();
        for info in &infos {
            debug!(
                "found compute device '{}' ({:?}, {:?})",
                info.name, info.backend, info.device_type
            );
        }

        let index = select_device(&infos).context("no compute devices available")?;
        let info = infos[index].clone();
        let adapter = adapters
            .into_iter()
            .nth(index)
            .context("selected adapter disappeared during enumeration")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("datagen-device"),
                features: wgpu::Features::empty(),
                limits: wgpu::Limits::default(),
            },
            None,
        ))
        .with_context(|| format!("failed to create a context on device '{}'", info.name))?;

        Ok(Self { info, device, queue })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, device_type: wgpu::DeviceType) -> DeviceInfo {
        DeviceInfo {
            name: name.to_string(),
            backend: wgpu::Backend::Vulkan,
            device_type,
        }
    }

    #[test]
    fn prefers_first_gpu_class_device() {
        let devices = vec![
            device("llvmpipe", wgpu::DeviceType::Cpu),
            device("iGPU", wgpu::DeviceType::IntegratedGpu),
            device("dGPU", wgpu::DeviceType::DiscreteGpu),
        ];
        assert_eq!(select_device(&devices), Some(1));
    }

    #[test]
    fn falls_back_to_first_device_without_gpu() {
        let devices = vec![
            device("llvmpipe", wgpu::DeviceType::Cpu),
            device("other", wgpu::DeviceType::Other),
        ];
        assert_eq!(select_device(&devices), Some(0));
    }

    #[test]
    fn empty_enumeration_selects_nothing() {
        assert_eq!(select_device(&[]), None);
    }
}
