//! Optional visible-count readback.
//!
//! Reading the counter back forces a full CPU/GPU sync and costs a lot of
//! frame time; it exists for diagnostics only and is gated behind
//! `GrassConfig::preview_visible_count`.

use crate::core::types::Result;
use crate::core::error::Error;

/// Single-u32 readback of the GPU visible-blade counter
pub struct VisibleCountReadback {
    /// Debug copy target for the append counter
    debug_buffer: wgpu::Buffer,
    /// Mappable staging mirror
    staging_buffer: wgpu::Buffer,
    /// Whether a readback is in flight
    pending: bool,
}

impl VisibleCountReadback {
    pub fn new(device: &wgpu::Device) -> Self {
        let debug_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_visible_count"),
            size: std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_visible_count_staging"),
            size: std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            debug_buffer,
            staging_buffer,
            pending: false,
        }
    }

    /// The buffer the culling pass copies the counter into
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.debug_buffer
    }

    /// Queue the copy into the mappable staging buffer (call after the
    /// counter copy has been encoded)
    pub fn schedule(&mut self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_buffer_to_buffer(
            &self.debug_buffer,
            0,
            &self.staging_buffer,
            0,
            std::mem::size_of::<u32>() as u64,
        );
        self.pending = true;
    }

    /// Block until the scheduled readback completes and return the count.
    ///
    /// This is the one deliberate CPU/GPU sync point in the renderer. Call
    /// after submitting the frame's commands; returns Ok(None) when nothing
    /// was scheduled.
    pub fn resolve(&mut self, device: &wgpu::Device) -> Result<Option<u32>> {
        if !self.pending {
            return Ok(None);
        }
        self.pending = false;

        let slice = self.staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::PollType::Wait { submission_index: None, timeout: None });

        match rx.recv() {
            Ok(Ok(())) => {
                let data = slice.get_mapped_range();
                let count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                drop(data);
                self.staging_buffer.unmap();
                Ok(Some(count))
            }
            Ok(Err(e)) => Err(Error::Gpu(format!("visible-count map failed: {e}"))),
            Err(_) => Err(Error::Gpu("visible-count map callback dropped".into())),
        }
    }
}
