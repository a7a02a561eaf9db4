pub trait CommandEncoderExt {
    /// Record a compute pass that runs `pipeline` over `dispatch_size` work-groups,
    /// with `bind_group` at index 0.
    fn dispatch(
        &mut self,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        dispatch_size: (u32, u32, u32),
    );
}

impl CommandEncoderExt for wgpu::CommandEncoder {
    fn dispatch(
        &mut self,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        (x, y, z): (u32, u32, u32),
    ) {
        self.push_debug_group(label);
        {
            let mut compute_pass = self.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
            });

            compute_pass.set_pipeline(pipeline);
            compute_pass.set_bind_group(0, bind_group, &[]);
            compute_pass.dispatch_workgroups(x, y, z);
        }
        self.pop_debug_group();
    }
}

/// Record a command buffer with `function`.
pub fn create(
    device: &wgpu::Device,
    label: &str,
    function: impl FnOnce(&mut wgpu::CommandEncoder),
) -> wgpu::CommandBuffer {
    let mut command_encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
    function(&mut command_encoder);
    command_encoder.finish()
}
