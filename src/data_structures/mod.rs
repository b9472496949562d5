//! Device-side data held by the wgpu backend.

pub mod texture;
