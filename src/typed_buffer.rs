/*!
Typed `wgpu` buffers.

[`bytemuck`](https://docs.rs/bytemuck/latest/bytemuck/) seems to be the
recommended way to cast Rust datatypes to bytes that can be sent to the GPU
([example](https://github.com/gfx-rs/wgpu/blob/d3ab5a197ed61b80d264bde150f76538d0c129a6/wgpu/examples/cube/main.rs)).

Casting in applications is error prone; you might create a buffer that's "supposed to"
contain `A`s, but nothing will stop you from reading a bunch of `B`s out of it.

This module provides a type safe buffer API.
*/

use std::{
    marker::PhantomData,
    mem::size_of,
    ops::{Deref, RangeBounds},
};

use log::trace;

use crate::error::Error;

pub struct Buffer<A> {
    buffer: wgpu::Buffer,
    len: u64,
    phantom_data: PhantomData<A>,
}

impl<A: bytemuck::Pod + bytemuck::Zeroable> Buffer<A> {
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Number of `A`s the buffer holds.
    fn len(&self) -> u64 {
        self.len
    }

    pub fn slice<S: RangeBounds<wgpu::BufferAddress>>(&self, bounds: S) -> Slice<A> {
        Slice {
            slice: self.buffer.slice(bounds),
            phantom_data: PhantomData,
        }
    }

    pub fn binding_resource(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }

    /**
    Map the whole buffer for reading, call `function` on its contents, then unmap.

    Blocks until every submitted command that writes to the buffer has completed.
    The view can't outlive `function`, so the buffer is always unmapped before
    this returns. The buffer must have been created with
    [`wgpu::BufferUsages::MAP_READ`].
    */
    pub fn read<R>(
        &self,
        device: &wgpu::Device,
        function: impl FnOnce(&[A]) -> R,
    ) -> Result<R, Error> {
        let slice = self.slice(..);

        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // Only fails if the receiver is gone, and then nobody is waiting.
            let _ = sender.send(result);
        });

        trace!("waiting for buffer map");
        device.poll(wgpu::Maintain::Wait);

        match pollster::block_on(receiver.receive()) {
            Some(result) => result?,
            None => return Err(Error::Map(wgpu::BufferAsyncError)),
        }

        let result = {
            let view = slice.get_mapped_range();
            function(&view)
        };
        self.buffer.unmap();
        trace!("buffer unmapped");

        Ok(result)
    }

    pub fn destroy(self) {
        self.buffer.destroy()
    }
}

pub struct Slice<'a, A> {
    slice: wgpu::BufferSlice<'a>,
    phantom_data: PhantomData<A>,
}

impl<'a, A> Slice<'a, A> {
    pub fn map_async(
        &self,
        mode: wgpu::MapMode,
        callback: impl FnOnce(Result<(), wgpu::BufferAsyncError>) + Send + 'static,
    ) {
        self.slice.map_async(mode, callback)
    }

    pub fn get_mapped_range(&self) -> View<'a, A> {
        View {
            view: self.slice.get_mapped_range(),
            phantom_data: PhantomData,
        }
    }
}

pub struct View<'a, A> {
    view: wgpu::BufferView<'a>,
    phantom_data: PhantomData<A>,
}

impl<'a, A: bytemuck::Pod + bytemuck::Zeroable> Deref for View<'a, A> {
    type Target = [A];

    fn deref(&self) -> &Self::Target {
        bytemuck::cast_slice(&*self.view)
    }
}

pub struct Builder<'a, A> {
    label: Option<&'a str>,
    len: u64,
    usage: wgpu::BufferUsages,
    phantom_data: PhantomData<A>,
}

impl<'a, A: bytemuck::Pod + bytemuck::Zeroable> Builder<'a, A> {
    /// An uninitialised buffer of `len` `A`s.
    pub fn new(len: u64) -> Self {
        Self {
            label: None,
            len,
            usage: wgpu::BufferUsages::empty(),
            phantom_data: PhantomData,
        }
    }

    pub fn with_label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_usage(mut self, usage: wgpu::BufferUsages) -> Self {
        self.usage |= usage;
        self
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.len * size_of::<A>() as u64
    }

    pub fn create(self, device: &wgpu::Device) -> Buffer<A> {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: self.label,
            size: self.size_in_bytes(),
            usage: self.usage,
            mapped_at_creation: false,
        });

        Buffer {
            buffer,
            len: self.len,
            phantom_data: PhantomData,
        }
    }
}

pub fn copy_buffer_to_buffer<A: bytemuck::Pod + bytemuck::Zeroable>(
    command_encoder: &mut wgpu::CommandEncoder,
    source: &Buffer<A>,
    destination: &Buffer<A>,
) {
    debug_assert_eq!(source.len(), destination.len());

    command_encoder.copy_buffer_to_buffer(
        source.buffer(),
        0,
        destination.buffer(),
        0,
        source.len() * size_of::<A>() as u64,
    )
}
