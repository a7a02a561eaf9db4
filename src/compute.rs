use bytemuck::{Pod, Zeroable};
use log::debug;

use crate::{
    error::Error,
    grid::{Size, WorkgroupSize},
    julia::{self, Complex},
};

/// Entry point in `julia.wgsl`.
pub const JULIA_ENTRY_POINT: &str = "julia";

/// Corresponds to `julia.wgsl#Params`.
#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, Debug)]
pub struct KernelParams {
    pub size: Size,
    pub c: Complex,
}

/**
WGSL source for `julia.wgsl#julia`, specialised for `workgroup_size`.

The WGSL accepted by `wgpu` 0.14 has no pipeline-overridable constants, and
`@workgroup_size` only takes literals, so the shape is substituted into the
source text. The viewport and iteration bound come from [`julia`] so that
the device and the host reference can't drift apart.
*/
pub fn kernel_source(workgroup_size: WorkgroupSize) -> String {
    include_str!("julia.wgsl")
        .replace("{{WORKGROUP_X}}", &workgroup_size.x.to_string())
        .replace("{{WORKGROUP_Y}}", &workgroup_size.y.to_string())
        .replace("{{VIEW_MIN}}", &format!("{:?}", julia::VIEW_MIN))
        .replace("{{VIEW_MAX}}", &format!("{:?}", julia::VIEW_MAX))
        .replace("{{ITERATIONS}}", &julia::ITERATIONS.to_string())
}

pub fn bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("julia-bind-group-layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    })
}

/// Compile `julia.wgsl#julia` for `workgroup_size`.
///
/// Shader and pipeline validation errors are caught with an error scope and
/// returned as [`Error::Compile`] instead of reaching the device's uncaptured
/// error handler, which panics.
pub fn create_pipeline(
    device: &wgpu::Device,
    pipeline_layout: &wgpu::PipelineLayout,
    workgroup_size: WorkgroupSize,
) -> Result<wgpu::ComputePipeline, Error> {
    debug!("compiling julia kernel for workgroup size {}", workgroup_size);

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("julia-shader"),
        source: wgpu::ShaderSource::Wgsl(kernel_source(workgroup_size).into()),
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("julia-pipeline"),
        layout: Some(pipeline_layout),
        module: &module,
        entry_point: JULIA_ENTRY_POINT,
    });

    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(pipeline),
        Some(error) => Err(Error::Compile(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_match_wgsl_layout() {
        // width: u32, height: u32, cr: f32, ci: f32
        assert_eq!(std::mem::size_of::<KernelParams>(), 16);

        let params = KernelParams {
            size: Size {
                width: 3,
                height: 4,
            },
            c: Complex::RABBIT,
        };
        let words: &[u32] = bytemuck::cast_slice(bytemuck::bytes_of(&params));
        assert_eq!(words[0], 3);
        assert_eq!(words[1], 4);
        assert_eq!(f32::from_bits(words[2]), -0.123);
        assert_eq!(f32::from_bits(words[3]), 0.745);
    }

    #[test]
    fn kernel_source_is_fully_substituted() {
        let source = kernel_source(WorkgroupSize { x: 16, y: 4 });
        assert!(!source.contains("{{"), "{}", source);
        assert!(source.contains("@workgroup_size(16, 4, 1)"));
        assert!(source.contains("let iterations = 16;"));
        assert!(source.contains("let min_x = -1.5;"));
        assert!(source.contains("let max_y = 1.5;"));
        assert!(source.contains(&format!("fn {}(", JULIA_ENTRY_POINT)));
    }
}
