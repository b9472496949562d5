#![allow(dead_code)]

pub mod test_utils;

use tumble::entity::{ColoredDescriptor, EntityDescriptor, TexturedDescriptor};

/// A colored descriptor with `triangles` triangles and RGBA colours.
pub fn colored(triangles: usize, elements: Option<Vec<u16>>) -> EntityDescriptor {
    let vertex_count = triangles * 3;
    EntityDescriptor::Colored(ColoredDescriptor {
        vertex_shader_path: "colored.vert".to_string(),
        fragment_shader_path: "colored.frag".to_string(),
        vertices: (0..vertex_count * 3).map(|i| i as f32).collect(),
        colors: vec![0.5; vertex_count * 4],
        elements,
    })
}

/// A textured quad made of two indexed triangles.
pub fn textured_quad() -> EntityDescriptor {
    EntityDescriptor::Textured(TexturedDescriptor {
        vertex_shader_path: "textured.vert".to_string(),
        fragment_shader_path: "textured.frag".to_string(),
        vertices: vec![
            -1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0, 1.0, 0.0, -1.0, 1.0, 0.0,
        ],
        texture_image_path: "crate.png".to_string(),
        texture_coords: vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
        elements: vec![0, 1, 2, 0, 2, 3],
    })
}
