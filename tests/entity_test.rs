mod common;

use std::time::Duration;

use futures::executor::block_on;
use tumble::{
    Vector3,
    device::{BufferTarget, TextureFilter},
    entity::{DrawMode, Entity},
    errors::{LoadError, ShaderStage},
};

use crate::common::{
    colored,
    test_utils::{Call, MemoryFetcher, RecordingDevice, marker_image},
    textured_quad,
};

fn origin() -> Vector3<f32> {
    Vector3::new(0.0, 0.0, 0.0)
}

#[test]
fn colored_without_elements_draws_arrays() {
    let mut device = RecordingDevice::new();
    let fetcher = MemoryFetcher::with_shaders();
    let entity = block_on(Entity::load(&mut device, &fetcher, &colored(4, None), origin())).unwrap();

    assert_eq!(entity.draw_mode(), DrawMode::Arrays { vertex_count: 12 });
    assert_eq!(
        device.count(|call| matches!(call, Call::CreateBuffer { target: BufferTarget::Index, .. })),
        0
    );

    device.calls.clear();
    entity.draw(&mut device, &tumble::Matrix4::from_scale(1.0), &tumble::Matrix4::from_scale(1.0));
    assert_eq!(device.calls.last(), Some(&Call::DrawArrays(12)));
    assert_eq!(device.count(|call| matches!(call, Call::DrawElements { .. })), 0);
}

#[test]
fn colored_with_elements_draws_indexed() {
    let mut device = RecordingDevice::new();
    let fetcher = MemoryFetcher::with_shaders();
    let descriptor = colored(2, Some(vec![0, 1, 2, 3, 4, 5, 0, 2, 4]));
    let entity = block_on(Entity::load(&mut device, &fetcher, &descriptor, origin())).unwrap();

    assert_eq!(entity.draw_mode(), DrawMode::Elements { index_count: 9 });
    let index_buffer = device
        .calls
        .iter()
        .find_map(|call| match call {
            Call::CreateBuffer {
                handle,
                target: BufferTarget::Index,
                len,
            } => Some((*handle, *len)),
            _ => None,
        })
        .unwrap();
    assert_eq!(index_buffer.1, 9 * std::mem::size_of::<u16>());

    device.calls.clear();
    entity.draw(&mut device, &tumble::Matrix4::from_scale(1.0), &tumble::Matrix4::from_scale(1.0));
    assert_eq!(
        device.calls.last(),
        Some(&Call::DrawElements {
            buffer: index_buffer.0,
            count: 9
        })
    );
}

#[test]
fn vertex_compile_failure_stops_everything_else() {
    let mut device = RecordingDevice::new();
    let fetcher = MemoryFetcher::with_shaders().text("colored.vert", "#error");

    let result = block_on(Entity::load(&mut device, &fetcher, &colored(1, None), origin()));

    match result {
        Err(LoadError::ShaderCompile { stage, .. }) => assert_eq!(stage, ShaderStage::Vertex),
        other => panic!("expected a vertex compile error, got {:?}", other.map(|e| e.kind())),
    }
    assert_eq!(device.calls, [Call::CompileShader(ShaderStage::Vertex)]);
}

#[test]
fn fragment_compile_failure_releases_the_vertex_stage() {
    let mut device = RecordingDevice::new();
    let fetcher = MemoryFetcher::with_shaders().text("colored.frag", "#error");

    let result = block_on(Entity::load(&mut device, &fetcher, &colored(1, None), origin()));

    assert!(matches!(
        result,
        Err(LoadError::ShaderCompile {
            stage: ShaderStage::Fragment,
            ..
        })
    ));
    assert!(matches!(device.calls.last(), Some(Call::DeleteShader(_))));
    assert_eq!(device.count(|call| matches!(call, Call::LinkProgram { .. })), 0);
    assert!(device.created_buffers().is_empty());
}

#[test]
fn link_failure_uploads_nothing() {
    let mut device = RecordingDevice::new();
    let fetcher = MemoryFetcher::with_shaders().text("colored.frag", "varying vColor; #link-error");

    let result = block_on(Entity::load(&mut device, &fetcher, &colored(1, None), origin()));

    match result {
        Err(LoadError::ProgramLink { log }) => assert!(log.contains("varyings")),
        other => panic!("expected a link error, got {:?}", other.map(|e| e.kind())),
    }
    assert!(device.created_buffers().is_empty());
}

#[test]
fn missing_shader_is_a_fetch_error_naming_the_path() {
    let mut device = RecordingDevice::new();
    let fetcher = MemoryFetcher::new().text("colored.vert", "attribute aVertex;");

    let result = block_on(Entity::load(&mut device, &fetcher, &colored(1, None), origin()));

    match result {
        Err(LoadError::Fetch(e)) => assert_eq!(e.path, "colored.frag"),
        other => panic!("expected a fetch error, got {:?}", other.map(|e| e.kind())),
    }
    assert!(device.calls.is_empty());
}

#[test]
fn invalid_descriptor_is_rejected_before_fetching() {
    let mut device = RecordingDevice::new();
    let fetcher = MemoryFetcher::with_shaders();
    let mut descriptor = colored(1, None);
    if let tumble::entity::EntityDescriptor::Colored(d) = &mut descriptor {
        d.colors.pop();
    }

    let result = block_on(Entity::load(&mut device, &fetcher, &descriptor, origin()));

    assert!(matches!(result, Err(LoadError::InvalidDescriptor(_))));
    assert!(fetcher.requests.borrow().is_empty());
    assert!(device.calls.is_empty());
}

#[test]
fn textured_draw_binds_texture_unit_zero() {
    let mut device = RecordingDevice::new();
    let fetcher = MemoryFetcher::with_shaders().image("crate.png", marker_image());
    let entity = block_on(Entity::load(&mut device, &fetcher, &textured_quad(), origin())).unwrap();

    let (texture, options, bottom_left) = device
        .calls
        .iter()
        .find_map(|call| match call {
            Call::CreateTexture {
                handle,
                options,
                bottom_left,
            } => Some((*handle, *options, *bottom_left)),
            _ => None,
        })
        .unwrap();
    assert_eq!(options.filter, TextureFilter::Nearest);
    assert!(options.flip_y);
    assert_eq!(bottom_left, [255, 0, 0, 255]);

    device.calls.clear();
    entity.draw(&mut device, &tumble::Matrix4::from_scale(1.0), &tumble::Matrix4::from_scale(1.0));

    let sampler_unit = device.calls.iter().find_map(|call| match call {
        Call::SetUniformSampler { location, unit } => Some((*location, *unit)),
        _ => None,
    });
    let (location, unit) = sampler_unit.unwrap();
    assert!(!location.is_none());
    assert_eq!(unit, 0);
    assert!(device.calls.contains(&Call::BindTexture { unit: 0, texture }));
    assert!(matches!(
        device.calls.last(),
        Some(Call::DrawElements { count: 6, .. })
    ));
}

#[test]
fn draw_rebinds_everything_it_needs() {
    let mut device = RecordingDevice::new();
    let fetcher = MemoryFetcher::with_shaders();
    let entity = block_on(Entity::load(&mut device, &fetcher, &colored(1, None), origin())).unwrap();

    device.calls.clear();
    let identity = tumble::Matrix4::from_scale(1.0);
    entity.draw(&mut device, &identity, &identity);
    entity.draw(&mut device, &identity, &identity);

    // use program, two attributes, two matrices and the draw call, twice
    assert_eq!(device.calls.len(), 12);
    assert_eq!(device.calls[..6], device.calls[6..]);
    assert!(matches!(device.calls[0], Call::UseProgram(_)));
    assert_eq!(
        device.count(|call| matches!(call, Call::BindAttribute { components: 4, .. })),
        2
    );
}

#[test]
fn tick_only_moves_the_rotation() {
    let mut device = RecordingDevice::new();
    let fetcher = MemoryFetcher::with_shaders();
    let position = Vector3::new(1.0, 2.0, 3.0);
    let mut entity = block_on(Entity::load(&mut device, &fetcher, &colored(1, None), position)).unwrap();

    let before = *entity.motion();
    entity.tick(Duration::from_millis(500));
    let after = *entity.motion();

    assert_eq!(after.position, before.position);
    assert_eq!(after.axis, before.axis);
    assert!((after.rotation.0 - std::f32::consts::FRAC_PI_4).abs() < 1e-5);
}

#[test]
fn dispose_releases_each_handle_once() {
    let mut device = RecordingDevice::new();
    let fetcher = MemoryFetcher::with_shaders().image("crate.png", marker_image());
    let entity = block_on(Entity::load(&mut device, &fetcher, &textured_quad(), origin())).unwrap();

    entity.dispose(&mut device);

    let mut created = device.created_buffers();
    let mut deleted = device.deleted_buffers();
    created.sort_unstable();
    deleted.sort_unstable();
    assert_eq!(created.len(), 3);
    assert_eq!(created, deleted);
    assert_eq!(device.count(|call| matches!(call, Call::DeleteProgram(_))), 1);
    assert_eq!(device.count(|call| matches!(call, Call::DeleteTexture(_))), 1);
}
