//! The ordered entity collection and the camera it is drawn with.
//!
//! Draw order is insertion order, which is descriptor order for scenes built by
//! [`Scene::load`] and [`Scene::load_files`].

use std::time::Duration;

use cgmath::{Deg, Matrix4, Vector3};
use futures::{
    StreamExt,
    future::try_join_all,
    stream::FuturesUnordered,
};

use crate::{
    config::ViewerConfig,
    device::Device,
    entity::{Entity, EntityDescriptor, Sources},
    errors::Result,
    resources::Fetcher,
};

pub struct Scene<D: Device> {
    entities: Vec<Entity<D>>,
    view: Matrix4<f32>,
    projection: Matrix4<f32>,
}

impl<D: Device> Scene<D> {
    /// An empty scene. The projection is fixed here and never follows later
    /// changes of the surface's aspect ratio.
    ///
    /// The projection maps depth onto GL's -1..1 clip range; backends with a
    /// different depth range correct it when the matrix is uploaded.
    pub fn new(config: &ViewerConfig, aspect: f32) -> Self {
        let view = Matrix4::from_translation(Vector3::from(config.camera_offset));
        let projection =
            cgmath::perspective(Deg(config.fov_degrees), aspect, config.near, config.far);
        Self {
            entities: Vec::new(),
            view,
            projection,
        }
    }

    /// Load every `(descriptor, position)` pair into a new scene.
    ///
    /// All descriptors are validated before anything is fetched. The
    /// resources of every entity are then fetched concurrently, and each
    /// entity is built on the device as soon as its own resources arrive.
    ///
    /// The first failure, a fetch or a build, rejects the whole load at once:
    /// fetches still in flight are dropped, the entities built so far are
    /// disposed and nothing is returned. On success the entities are in list
    /// order regardless of the order their fetches finished in.
    pub async fn load<F: Fetcher>(
        device: &mut D,
        fetcher: &F,
        placements: &[(EntityDescriptor, Vector3<f32>)],
        config: &ViewerConfig,
        aspect: f32,
    ) -> Result<Self> {
        for (descriptor, _) in placements {
            descriptor.validate()?;
        }

        let mut pending: FuturesUnordered<_> = placements
            .iter()
            .enumerate()
            .map(|(index, (descriptor, _))| async move {
                (index, Sources::fetch(fetcher, descriptor).await)
            })
            .collect();
        let mut built: Vec<Option<Entity<D>>> = placements.iter().map(|_| None).collect();

        while let Some((index, fetched)) = pending.next().await {
            let (descriptor, position) = &placements[index];
            let entity = fetched
                .and_then(|sources| Entity::build(device, descriptor, sources, *position));
            match entity {
                Ok(entity) => built[index] = Some(entity),
                Err(e) => {
                    drop(pending);
                    for entity in built.into_iter().flatten() {
                        entity.dispose(device);
                    }
                    return Err(e);
                }
            }
        }

        let mut scene = Self::new(config, aspect);
        scene.entities = built.into_iter().flatten().collect();
        log::info!("scene loaded with {} entities", scene.entities.len());
        Ok(scene)
    }

    /// Fetch and parse JSON descriptor files, then [`load`](Self::load) them.
    ///
    /// Entity `i` is placed at `[i * entity_spacing, 0, 0]`.
    pub async fn load_files<F: Fetcher>(
        device: &mut D,
        fetcher: &F,
        paths: &[String],
        config: &ViewerConfig,
        aspect: f32,
    ) -> Result<Self> {
        let texts = try_join_all(paths.iter().map(|path| fetcher.fetch_text(path))).await?;
        let placements = paths
            .iter()
            .zip(texts)
            .enumerate()
            .map(|(i, (path, text))| {
                let descriptor = EntityDescriptor::from_json(path, &text)?;
                let position = Vector3::new(i as f32 * config.entity_spacing, 0.0, 0.0);
                Ok((descriptor, position))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::load(device, fetcher, &placements, config, aspect).await
    }

    pub fn tick(&mut self, dt: Duration) {
        for entity in &mut self.entities {
            entity.tick(dt);
        }
    }

    /// Clear colour and depth, then draw every entity in order.
    pub fn draw(&self, device: &mut D) {
        device.clear();
        for entity in &self.entities {
            entity.draw(device, &self.view, &self.projection);
        }
    }

    /// Release every entity's device resources, in order.
    pub fn dispose(self, device: &mut D) {
        for entity in self.entities {
            entity.dispose(device);
        }
    }

    pub fn entities(&self) -> &[Entity<D>] {
        &self.entities
    }

    pub fn view(&self) -> &Matrix4<f32> {
        &self.view
    }

    pub fn projection(&self) -> &Matrix4<f32> {
        &self.projection
    }
}
