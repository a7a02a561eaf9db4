//! Repeated dispatch of the Julia kernel over one output buffer.

use std::time::{Duration, Instant};

use fnv::FnvHashMap;
use log::{debug, trace};

use crate::{
    command::{self, CommandEncoderExt},
    compute::{self, KernelParams},
    device::{self, Context},
    error::Error,
    grid::{Size, WorkgroupSize},
    julia::{Bgra, Complex},
    typed_buffer, var,
};

/**
A compiled kernel with its output buffer, ready to dispatch.

Created by [`Session::prepare`]. The session borrows its [`Context`], so it
is released before the device is.

# Ordering

Every dispatch and the read-back copy go through the context's one queue, in
submission order. [`Session::read_back`] maps the buffer only after the copy,
and so every dispatch before it, has completed.
*/
pub struct Session<'a> {
    context: &'a Context,
    size: Size,
    pixels: typed_buffer::Buffer<Bgra>,
    staging: typed_buffer::Buffer<Bgra>,
    params: var::Var<KernelParams>,
    pipeline_layout: wgpu::PipelineLayout,
    bind_group: wgpu::BindGroup,
    pipelines: FnvHashMap<WorkgroupSize, wgpu::ComputePipeline>,
    dispatches: u64,
}

impl<'a> Session<'a> {
    /// Compile the kernel and allocate a `size.width * size.height` pixel buffer.
    pub fn prepare(context: &'a Context, size: Size, c: Complex) -> Result<Self, Error> {
        let device = &context.device;

        let pixels_builder = typed_buffer::Builder::<Bgra>::new(size.pixel_count() as u64)
            .with_label("julia-pixels")
            .with_usage(wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC);

        let max = context.limits.max_storage_buffer_binding_size as u64;
        if pixels_builder.size_in_bytes() > max {
            return Err(Error::Allocation(format!(
                "a {} grid needs {} bytes, but the device binds at most {} bytes",
                size,
                pixels_builder.size_in_bytes(),
                max
            )));
        }

        debug!(
            "allocating {} bytes of pixels for a {} grid",
            pixels_builder.size_in_bytes(),
            size
        );

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let pixels = pixels_builder.create(device);
        let staging = typed_buffer::Builder::<Bgra>::new(size.pixel_count() as u64)
            .with_label("julia-staging")
            .with_usage(wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST)
            .create(device);
        let params = var::Builder::new(KernelParams { size, c })
            .with_label("julia-params")
            .create(device);
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(Error::Allocation(error.to_string()));
        }

        let bind_group_layout = compute::bind_group_layout(device);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("julia-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("julia-bind-group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: pixels.binding_resource(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params.binding_resource(),
                },
            ],
        });

        let mut pipelines = FnvHashMap::default();
        let pipeline = compute::create_pipeline(
            device,
            &pipeline_layout,
            WorkgroupSize::IMPLICIT,
        )?;
        pipelines.insert(WorkgroupSize::IMPLICIT, pipeline);

        Ok(Session {
            context,
            size,
            pixels,
            staging,
            params,
            pipeline_layout,
            bind_group,
            pipelines,
            dispatches: 0,
        })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Total dispatches issued over the session's lifetime.
    pub fn dispatches(&self) -> u64 {
        self.dispatches
    }

    /// Compile the pipeline for `workgroup_size` unless it already exists.
    fn ensure_pipeline(&mut self, workgroup_size: WorkgroupSize) -> Result<(), Error> {
        if !self.pipelines.contains_key(&workgroup_size) {
            device::validate_workgroup_size(&self.context.limits, workgroup_size)?;
            let pipeline = compute::create_pipeline(
                &self.context.device,
                &self.pipeline_layout,
                workgroup_size,
            )?;
            self.pipelines.insert(workgroup_size, pipeline);
        }
        Ok(())
    }

    /**
    Dispatch the kernel over the whole grid `repeat` times, one submission
    per dispatch, and return how long the device took.

    The queue is drained before the clock starts and again before it stops,
    so the interval covers the dispatches and nothing queued earlier.

    `workgroup_size` picks the local work-group shape; `None` leaves it to
    [`WorkgroupSize::IMPLICIT`].
    */
    pub fn run(
        &mut self,
        repeat: u32,
        workgroup_size: Option<WorkgroupSize>,
    ) -> Result<Duration, Error> {
        let workgroup_size = workgroup_size.unwrap_or(WorkgroupSize::IMPLICIT);

        // Validates the shape, and compiles before the clock starts.
        self.ensure_pipeline(workgroup_size)?;

        let dispatch_size =
            device::validate_dispatch_size(&self.context.limits, self.size, workgroup_size)?;
        debug!(
            "dispatching {:?} work-groups of {}",
            dispatch_size, workgroup_size
        );

        let context = self.context;
        let bind_group = &self.bind_group;
        let pipeline = &self.pipelines[&workgroup_size];

        context.device.poll(wgpu::Maintain::Wait);

        let start = Instant::now();
        for _ in 0..repeat {
            trace!("submitting dispatch");
            let command_buffer = command::create(&context.device, "julia", |command_encoder| {
                command_encoder.dispatch("julia", pipeline, bind_group, dispatch_size);
            });
            context.queue.submit([command_buffer]);
        }
        context.device.poll(wgpu::Maintain::Wait);
        let elapsed = start.elapsed();

        self.dispatches += repeat as u64;
        Ok(elapsed)
    }

    /**
    Call `function` with the pixels, row-major from `y = 0`, then release them.

    Blocks until every dispatch has finished writing. The pixels are only
    borrowed for the duration of `function`.

    # Panics

    If no dispatch has been issued yet. The buffer's contents are unspecified
    until the kernel has run at least once.
    */
    pub fn read_back<R>(&self, function: impl FnOnce(&[Bgra]) -> R) -> Result<R, Error> {
        assert!(
            self.dispatches > 0,
            "read_back called before the kernel was dispatched"
        );

        let command_buffer =
            command::create(&self.context.device, "julia-read-back", |command_encoder| {
                typed_buffer::copy_buffer_to_buffer(command_encoder, &self.pixels, &self.staging);
            });
        self.context.queue.submit([command_buffer]);

        self.staging.read(&self.context.device, function)
    }

    /// Free the session's device memory now rather than when the device is dropped.
    pub fn release(self) {
        self.pixels.destroy();
        self.staging.destroy();
        self.params.destroy();
    }
}
