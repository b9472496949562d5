//! Turning raw arrays and decoded images into device resources.

use crate::device::{BufferTarget, Device, TextureOptions};

pub fn upload_floats<D: Device>(device: &mut D, data: &[f32]) -> D::Buffer {
    device.create_buffer(BufferTarget::Vertex, bytemuck::cast_slice(data))
}

pub fn upload_indices<D: Device>(device: &mut D, indices: &[u16]) -> D::Buffer {
    device.create_buffer(BufferTarget::Index, bytemuck::cast_slice(indices))
}

/// Upload a decoded image as an RGBA8 2D texture.
pub fn upload_texture<D: Device>(
    device: &mut D,
    image: &image::DynamicImage,
    options: TextureOptions,
) -> D::Texture {
    let rgba = image.to_rgba8();
    log::debug!(
        "uploading {}x{} texture ({:?})",
        rgba.width(),
        rgba.height(),
        options
    );
    device.create_texture(&rgba, options)
}
