//! Viewer configuration.
//!
//! Everything here has a default matching the bundled demo scene, so an empty
//! JSON object (or no configuration at all) yields a working viewer.

use serde::Deserialize;

/// Descriptor files rendered when none are named.
pub const DEFAULT_SCENE: [&str; 3] = ["colored-cube.json", "colored-pyramid.json", "textured-cube.json"];

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// RGBA, each channel in `0.0..=1.0`.
    pub clear_colour: [f64; 4],
    /// Vertical field of view.
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Translation applied to every entity before the projection.
    pub camera_offset: [f32; 3],
    /// Distance along x between consecutive entities of a descriptor list.
    pub entity_spacing: f32,
    /// Directory (native) or path below the page origin (web) that assets are
    /// fetched from.
    pub asset_root: String,
    pub window_title: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            clear_colour: [0.0, 0.0, 0.0, 1.0],
            fov_degrees: 90.0,
            near: 0.1,
            far: 100.0,
            camera_offset: [3.0, 0.0, -7.0],
            entity_spacing: -3.0,
            asset_root: "assets".to_string(),
            window_title: "tumble".to_string(),
        }
    }
}

impl ViewerConfig {
    /// Parse a possibly partial configuration; missing fields keep their defaults.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn clear_colour(&self) -> wgpu::Color {
        let [r, g, b, a] = self.clear_colour;
        wgpu::Color { r, g, b, a }
    }
}
