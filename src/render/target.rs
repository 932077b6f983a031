//! Cached render targets with reallocate-on-descriptor-change semantics

use wgpu::{Device, Texture, TextureView};

/// Descriptor for a cached render target.
///
/// Compared against the previously allocated target; the texture is only
/// recreated when something here actually changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

impl TargetDesc {
    /// A render-attachment target that is also sampled/loaded by shaders
    pub fn attachment(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        }
    }
}

/// An owned render-target slot.
///
/// `ensure` allocates on first use and reallocates only when the requested
/// descriptor differs from the current one; otherwise the existing texture
/// is reused across frames.
pub struct TargetCache {
    label: &'static str,
    current: Option<(TargetDesc, Texture, TextureView)>,
}

impl TargetCache {
    /// Create an empty slot
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            current: None,
        }
    }

    /// Make sure the target matches `desc`, reallocating if needed.
    /// Returns true when a (re)allocation happened.
    pub fn ensure(&mut self, device: &Device, desc: TargetDesc) -> bool {
        if let Some((current_desc, _, _)) = &self.current {
            if *current_desc == desc {
                return false;
            }
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(self.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        log::debug!("allocated target '{}' {}x{} {:?}", self.label, desc.width, desc.height, desc.format);
        self.current = Some((desc, texture, view));
        true
    }

    /// View of the allocated target; None before the first `ensure`
    pub fn view(&self) -> Option<&TextureView> {
        self.current.as_ref().map(|(_, _, view)| view)
    }

    /// The allocated texture; None before the first `ensure`
    pub fn texture(&self) -> Option<&Texture> {
        self.current.as_ref().map(|(_, texture, _)| texture)
    }

    /// Drop the allocated target, if any
    pub fn release(&mut self) {
        self.current = None;
    }

    /// Whether a target is currently allocated
    pub fn is_allocated(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desc_equality() {
        let a = TargetDesc::attachment(2048, 2048, wgpu::TextureFormat::Rg32Float);
        let b = TargetDesc::attachment(2048, 2048, wgpu::TextureFormat::Rg32Float);
        let c = TargetDesc::attachment(1024, 1024, wgpu::TextureFormat::Rg32Float);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_empty_slot() {
        let cache = TargetCache::new("test");
        assert!(!cache.is_allocated());
        assert!(cache.view().is_none());
    }
}
