use std::sync::Arc;

use glam::Vec2;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::assets::AssetBundle;
use crate::config::SceneConfig;
use crate::error::SceneError;
use crate::gpu::GpuContext;
use crate::material::Lighting;
use crate::particles::EmitterConfig;
use crate::picking::Ray;
use crate::renderer::GpuRenderer;
use crate::scene::{SceneEvent, SceneHandle};

/// Open a window, mount the scene into it and run until the window closes.
///
/// A scene that fails to set up is logged and the window stays empty.
///
/// ```no_run
/// use letterfall::SceneConfig;
///
/// letterfall::run(SceneConfig::new().title("letterfall").assets_dir("assets")).unwrap();
/// ```
pub fn run(config: SceneConfig) -> Result<(), winit::error::EventLoopError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = LetterfallApp::Pending { config };
    event_loop.run_app(&mut app)
}

enum LetterfallApp {
    Pending {
        config: SceneConfig,
    },
    Running {
        window: Arc<Window>,
        scene: SceneHandle<GpuRenderer>,
        cursor: Option<Vec2>,
    },
    /// Setup failed; the window (if any) stays open and empty.
    Failed {
        _window: Option<Arc<Window>>,
    },
}

/// Everything `resumed` needs to build before the first tick.
fn mount(window: &Arc<Window>, config: &SceneConfig) -> Result<SceneHandle<GpuRenderer>, SceneError> {
    let gpu = GpuContext::new(window.clone())?;
    let assets = AssetBundle::load(&config.assets)?;
    let renderer = GpuRenderer::new(
        gpu,
        &assets,
        &Lighting::scene_default(),
        EmitterConfig::fountain().capacity,
    );
    SceneHandle::new(&assets, Some(renderer), config)
}

fn resize_event(window: &Window) -> SceneEvent {
    let size = window.inner_size();
    SceneEvent::Resize {
        logical_width: (size.width as f64 / window.scale_factor()) as f32,
        width: size.width,
        height: size.height,
    }
}

impl ApplicationHandler for LetterfallApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let LetterfallApp::Pending { config } = self else {
            return;
        };

        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("failed to create window: {}", e);
                *self = LetterfallApp::Failed { _window: None };
                return;
            }
        };

        match mount(&window, config) {
            Ok(mut scene) => {
                scene.queue(resize_event(&window));
                window.request_redraw();
                *self = LetterfallApp::Running {
                    window,
                    scene,
                    cursor: None,
                };
            }
            Err(e) => {
                log::error!("scene setup failed: {}", e);
                *self = LetterfallApp::Failed {
                    _window: Some(window),
                };
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let LetterfallApp::Running {
            window,
            scene,
            cursor,
        } = self
        else {
            if matches!(event, WindowEvent::CloseRequested) {
                event_loop.exit();
            }
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                scene.dispose();
                event_loop.exit();
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                scene.queue(resize_event(window));
            }
            WindowEvent::CursorMoved { position, .. } => {
                *cursor = Some(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                if let Some(cursor) = *cursor {
                    let size = window.inner_size();
                    let ray = Ray::from_camera(
                        cursor,
                        Vec2::new(size.width as f32, size.height as f32),
                        &scene.camera(),
                    );
                    scene.queue(SceneEvent::PointerDown(ray));
                }
            }
            WindowEvent::RedrawRequested => {
                scene.tick();
                window.request_redraw();
            }
            _ => {}
        }
    }
}
