//! Platform and device selection.
//!
//! A *platform* is a `wgpu` backend that exposes at least one adapter. A
//! *device* is one of that backend's adapters. Both are picked by position,
//! in the order below, so the same indices select the same hardware from one
//! run to the next.

use log::debug;

use crate::{
    error::Error,
    grid::{Size, WorkgroupSize},
};

/// Backends searched for platforms, in platform index order.
const BACKENDS: [(wgpu::Backend, wgpu::Backends); 5] = [
    (wgpu::Backend::Vulkan, wgpu::Backends::VULKAN),
    (wgpu::Backend::Metal, wgpu::Backends::METAL),
    (wgpu::Backend::Dx12, wgpu::Backends::DX12),
    (wgpu::Backend::Dx11, wgpu::Backends::DX11),
    (wgpu::Backend::Gl, wgpu::Backends::GL),
];

pub struct Platform {
    pub backend: wgpu::Backend,
    adapters: Vec<wgpu::Adapter>,
}

/// Every backend with at least one adapter.
pub fn platforms(instance: &wgpu::Instance) -> Vec<Platform> {
    BACKENDS
        .iter()
        .filter_map(|(backend, backends)| {
            let adapters: Vec<wgpu::Adapter> = instance.enumerate_adapters(*backends).collect();
            for adapter in &adapters {
                let info = adapter.get_info();
                debug!(
                    "{:?} adapter: {} ({:?})",
                    backend, info.name, info.device_type
                );
            }

            if adapters.is_empty() {
                None
            } else {
                Some(Platform {
                    backend: *backend,
                    adapters,
                })
            }
        })
        .collect()
}

/// Take the `index`th item, or explain how many there were.
fn select<A>(items: Vec<A>, index: usize, what: &str) -> Result<A, Error> {
    let available = items.len();
    items.into_iter().nth(index).ok_or_else(|| {
        Error::Configuration(format!(
            "{what} index {index} is out of range ({available} available)"
        ))
    })
}

/// An open device and its queue.
///
/// Fields drop in declaration order, so the instance outlives everything
/// created from it.
pub struct Context {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
    pub limits: wgpu::Limits,
    _instance: wgpu::Instance,
}

impl Context {
    /// Open device `device_index` of platform `platform_index`.
    pub fn configure(platform_index: usize, device_index: usize) -> Result<Self, Error> {
        let instance = wgpu::Instance::new(wgpu::Backends::all());

        let platform = select(platforms(&instance), platform_index, "platform")?;
        let adapter = select(platform.adapters, device_index, "device")?;

        let adapter_info = adapter.get_info();
        // Ask for everything the adapter has; the defaults cap storage
        // buffers at 128 MiB, which is only a 4096×8192 grid.
        let limits = adapter.limits();

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("device"),
                features: wgpu::Features::empty(),
                limits: limits.clone(),
            },
            None,
        ))
        .map_err(|e| Error::Configuration(format!("device request failed: {e}")))?;

        debug!("opened {:?} device {}", adapter_info.backend, adapter_info.name);

        Ok(Context {
            device,
            queue,
            adapter_info,
            limits,
            _instance: instance,
        })
    }

    pub fn platform_name(&self) -> String {
        format!("{:?}", self.adapter_info.backend)
    }

    pub fn device_name(&self) -> &str {
        &self.adapter_info.name
    }
}

/// Check a work-group shape against the device limits.
pub fn validate_workgroup_size(
    limits: &wgpu::Limits,
    workgroup_size: WorkgroupSize,
) -> Result<(), Error> {
    if workgroup_size.x > limits.max_compute_workgroup_size_x
        || workgroup_size.y > limits.max_compute_workgroup_size_y
    {
        return Err(Error::Configuration(format!(
            "local work size {} exceeds the device maximum of ( {}, {} )",
            workgroup_size,
            limits.max_compute_workgroup_size_x,
            limits.max_compute_workgroup_size_y
        )));
    }

    if workgroup_size.invocations() > limits.max_compute_invocations_per_workgroup {
        return Err(Error::Configuration(format!(
            "local work size {} has {} invocations, more than the device maximum of {}",
            workgroup_size,
            workgroup_size.invocations(),
            limits.max_compute_invocations_per_workgroup
        )));
    }

    Ok(())
}

/// Check that `size` can be covered in a single dispatch of `workgroup_size`
/// work-groups.
pub fn validate_dispatch_size(
    limits: &wgpu::Limits,
    size: Size,
    workgroup_size: WorkgroupSize,
) -> Result<(u32, u32, u32), Error> {
    let dispatch_size = workgroup_size.dispatch_size(size);
    let max = limits.max_compute_workgroups_per_dimension;
    if dispatch_size.0 > max || dispatch_size.1 > max {
        return Err(Error::Configuration(format!(
            "global work size {} needs ( {}, {} ) work-groups of {}, more than the device maximum of {} per dimension",
            size, dispatch_size.0, dispatch_size.1, workgroup_size, max
        )));
    }
    Ok(dispatch_size)
}
