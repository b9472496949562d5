//! tumble
//!
//! Asynchronously loaded, spinning entities rendered with wgpu on native
//! targets and in the browser. Entities are described by small JSON files
//! naming their shaders, geometry and (optionally) a texture; they are fetched
//! concurrently, uploaded to the device and then rotated and drawn once per
//! display refresh.
//!
//! High-level modules
//! - `config`: viewer settings (camera, projection, asset root)
//! - `context`: the wgpu backed device and render surface
//! - `data_structures`: device-side textures
//! - `device`: the graphics device seam entities draw through
//! - `entity`: entity descriptors, loading and per-frame behaviour
//! - `errors`: load and fetch errors
//! - `flow`: the frame scheduler and the application event loop
//! - `pipelines`: WGSL reflection, program linking and render pipelines
//! - `resources`: resource fetching, shader programs and uploads
//! - `scene`: the ordered entity collection and its camera
//!

pub mod config;
pub mod context;
pub mod data_structures;
pub mod device;
pub mod entity;
pub mod errors;
pub mod flow;
pub mod pipelines;
pub mod resources;
pub mod scene;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use config::ViewerConfig;
pub use errors::{FetchError, LoadError};

/// Browser entry point: renders the bundled scene into the `canvas` element.
///
/// Only setup failures before the event loop starts reach the `Err` branch.
/// Once the loop runs, [`flow::run`] never returns, and load failures are
/// reported through the console log instead.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() -> Result<(), wasm_bindgen::JsValue> {
    let paths = config::DEFAULT_SCENE.iter().map(|path| path.to_string()).collect();
    flow::run(ViewerConfig::default(), paths)
        .map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{:#}", e)))
}
