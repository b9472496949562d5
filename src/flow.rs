//! Frame scheduling and the application event loop.
//!
//! # User-facing types
//!
//! - [`FrameScheduler`] runs one animate/draw cycle per display refresh
//! - [`CancelToken`] stops a scheduler from requesting further frames
//! - [`run`] opens a window, loads a scene from descriptor files and drives it
//!
//! # Lifecycle Flow
//!
//! Every scheduled frame:
//! 1. Compute the time elapsed since the previous frame
//! 2. Resize the backing store if the visible surface size changed
//! 3. Reset the viewport to the full backing store
//! 4. Tick, then draw the scene
//! 5. Present and ask for the next frame, unless cancelled

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    config::ViewerConfig,
    context::Context,
    device::{Device, RenderSurface},
    resources::AssetFetcher,
    scene::Scene,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Shared flag that ends a frame loop.
///
/// Clones observe the same flag, so the owner of the event loop can cancel a
/// scheduler it has handed away.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What the caller should do after a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// Request another frame.
    Scheduled,
    /// The loop is over; request nothing.
    Stopped,
}

/// Drives `tick` and `draw` once per refresh.
///
/// Timestamps are measured from the start of the loop. The first frame's
/// elapsed time is its raw timestamp.
#[derive(Debug)]
pub struct FrameScheduler {
    previous: Duration,
    token: CancelToken,
}

impl FrameScheduler {
    pub fn new(token: CancelToken) -> Self {
        Self {
            previous: Duration::ZERO,
            token,
        }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Run a single frame at `timestamp`.
    ///
    /// Does nothing once the token is cancelled. A frame that is cancelled
    /// while running still completes, but reports [`FrameStatus::Stopped`].
    pub fn frame<T>(&mut self, timestamp: Duration, scene: &mut Scene<T>, target: &mut T) -> FrameStatus
    where
        T: Device + RenderSurface,
    {
        if self.token.is_cancelled() {
            return FrameStatus::Stopped;
        }

        let dt = timestamp.saturating_sub(self.previous);
        self.previous = timestamp;

        let visible = target.visible_size();
        if visible != target.backing_size() {
            target.resize_backing(visible.0, visible.1);
        }
        let (width, height) = target.backing_size();
        target.set_viewport(width, height);

        scene.tick(dt);
        scene.draw(target);
        target.present();

        if self.token.is_cancelled() {
            FrameStatus::Stopped
        } else {
            FrameStatus::Scheduled
        }
    }
}

/// A window's device context together with the scene drawn into it.
pub struct Viewer {
    pub ctx: Context,
    pub scene: Scene<Context>,
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("entities", &self.scene.entities().len())
            .finish()
    }
}

impl Viewer {
    async fn load(
        window: Arc<Window>,
        config: ViewerConfig,
        paths: Vec<String>,
    ) -> anyhow::Result<Self> {
        let mut ctx = Context::new(window.clone(), config.clear_colour()).await?;
        let size = window.inner_size();
        let aspect = size.width.max(1) as f32 / size.height.max(1) as f32;
        let fetcher = AssetFetcher::new(config.asset_root.clone());
        let scene = Scene::load_files(&mut ctx, &fetcher, &paths, &config, aspect).await?;
        Ok(Self { ctx, scene })
    }
}

pub(crate) enum ViewerEvent {
    #[allow(dead_code)]
    Loaded(anyhow::Result<Viewer>),
}

impl std::fmt::Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded(Ok(viewer)) => f.debug_tuple("Loaded").field(viewer).finish(),
            Self::Loaded(Err(e)) => f.debug_tuple("Failed").field(&e.to_string()).finish(),
        }
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[allow(dead_code)]
    proxy: winit::event_loop::EventLoopProxy<ViewerEvent>,
    config: ViewerConfig,
    paths: Vec<String>,
    loading: bool,
    viewer: Option<Viewer>,
    scheduler: FrameScheduler,
    started: Instant,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(
        event_loop: &EventLoop<ViewerEvent>,
        config: ViewerConfig,
        paths: Vec<String>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy: event_loop.create_proxy(),
            config,
            paths,
            loading: false,
            viewer: None,
            scheduler: FrameScheduler::new(CancelToken::new()),
            started: Instant::now(),
            failure: None,
        })
    }

    fn on_loaded(&mut self, event_loop: &ActiveEventLoop, result: anyhow::Result<Viewer>) {
        self.loading = false;
        match result {
            Ok(viewer) => {
                log::info!("rendering {} entities", viewer.scene.entities().len());
                viewer.ctx.window().request_redraw();
                self.started = Instant::now();
                self.viewer = Some(viewer);
            }
            Err(e) => {
                log::error!("Cannot load the scene: {:#}", e);
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.loading || self.viewer.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(&self.config.window_title);

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create a window: {}", e);
                self.failure = Some(e.into());
                event_loop.exit();
                return;
            }
        };

        self.loading = true;
        let load = Viewer::load(window, self.config.clone(), self.paths.clone());

        #[cfg(not(target_arch = "wasm32"))]
        {
            let result = self.async_runtime.block_on(load);
            self.on_loaded(event_loop, result);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = load.await;
                if proxy.send_event(ViewerEvent::Loaded(result)).is_err() {
                    log::error!("The event loop closed before the scene finished loading");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Loaded(result) => self.on_loaded(event_loop, result),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.scheduler.token().cancel();
                if let Some(Viewer { mut ctx, scene }) = self.viewer.take() {
                    scene.dispose(&mut ctx);
                }
                event_loop.exit();
            }
            WindowEvent::Resized(_) => {
                // The next frame picks the new size up from the window.
                if let Some(viewer) = &self.viewer {
                    viewer.ctx.window().request_redraw();
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(viewer) = &mut self.viewer else {
                    return;
                };
                let timestamp = self.started.elapsed();
                match self.scheduler.frame(timestamp, &mut viewer.scene, &mut viewer.ctx) {
                    FrameStatus::Scheduled => viewer.ctx.window().request_redraw(),
                    FrameStatus::Stopped => log::info!("frame loop stopped"),
                }
            }
            _ => {}
        }
    }
}

/// Open a window and render the entities described by `paths`, each relative
/// to the configured asset root, until the window is closed.
///
/// A scene that fails to load is logged and returned as an error; nothing is
/// rendered in that case.
///
/// On the web the event loop never hands control back, so this function does
/// not return at all. A failed load only shows up as a `log::error!` in the
/// browser console there.
pub fn run(config: ViewerConfig, paths: Vec<String>) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config, paths)?;

    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
