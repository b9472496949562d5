//! Shader programs for the wgpu backend.
//!
//! - `reflect` compiles a single WGSL stage with naga and reads its interface
//! - `program` links two stages and builds the render pipeline drawing with them

pub mod program;
pub mod reflect;
