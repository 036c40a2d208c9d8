use glam::UVec2;

use crate::error::UploadError;

/// Texel format of every tile layer.
pub const TILE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Check that a `grid × tile_size` array with `layers` layers fits the
/// device. Returns the texel extent of one layer.
pub fn validate_extent(
    grid_size: UVec2,
    tile_size: u32,
    layers: u32,
    limits: &wgpu::Limits,
) -> Result<UVec2, UploadError> {
    let width = grid_size.x.saturating_mul(tile_size);
    let height = grid_size.y.saturating_mul(tile_size);
    let max_dimension = limits.max_texture_dimension_2d;
    let max_layers = limits.max_texture_array_layers;
    if width > max_dimension || height > max_dimension || layers > max_layers {
        return Err(UploadError::TextureTooLarge {
            width,
            height,
            layers,
            max_dimension,
            max_layers,
        });
    }
    Ok(UVec2::new(width, height))
}

/// 2D-array texture holding the resident tiles: one layer per level, each
/// layer a `grid × tile_size` toroidal mosaic.
pub struct TileArray {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    extent: UVec2,
    layers: u32,
}

impl TileArray {
    pub fn new(
        device: &wgpu::Device,
        grid_size: UVec2,
        tile_size: u32,
        layers: u32,
    ) -> Result<Self, UploadError> {
        let extent = validate_extent(grid_size, tile_size, layers, &device.limits())?;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("tile-array"),
            size: wgpu::Extent3d {
                width: extent.x,
                height: extent.y,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TILE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("tile-array-view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            array_layer_count: Some(layers),
            ..Default::default()
        });
        log::info!(
            "TileArray: {}x{} texels x {} layers",
            extent.x,
            extent.y,
            layers
        );
        Ok(Self {
            texture,
            view,
            extent,
            layers,
        })
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn extent(&self) -> UVec2 {
        self.extent
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid_fits_default_limits() {
        let limits = wgpu::Limits::default();
        let extent = validate_extent(UVec2::new(6, 4), 256, 8, &limits).expect("fits");
        assert_eq!(extent, UVec2::new(1536, 1024));
    }

    #[test]
    fn test_oversized_layer_rejected() {
        let limits = wgpu::Limits::default();
        let err = validate_extent(UVec2::new(64, 4), 256, 8, &limits).unwrap_err();
        assert!(matches!(
            err,
            UploadError::TextureTooLarge { width: 16384, .. }
        ));
    }

    #[test]
    fn test_too_many_layers_rejected() {
        let limits = wgpu::Limits::default();
        let layers = limits.max_texture_array_layers + 1;
        assert!(validate_extent(UVec2::new(6, 4), 256, layers, &limits).is_err());
    }
}
