//! A spinning scene under one directional light: ground plane, triangle,
//! cube, and sphere, with variance-shadow-mapped shadows.

use std::sync::Arc;
use std::time::Instant;

use umbra::*;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

const TRIANGLE: usize = 1;
const CUBE: usize = 2;

fn build_scene() -> Scene {
    let mut scene = Scene::new();

    scene.add_mesh(Mesh::new(Geometry::plane(10.0, 10.0)));

    let triangle = Geometry::triangle(
        Vec3::new(-0.8, 3.5, 0.0),
        Vec3::new(0.0, 3.5, 1.8),
        Vec3::new(0.8, 3.5, 0.0),
        [
            Vec3::new(1.0, 0.5, 0.0),
            Vec3::new(1.0, 0.5, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        ],
    );
    scene.add_mesh(
        Mesh::new(triangle).with_transform(Transform::from_position(Vec3::new(1.2, 0.0, 0.0))),
    );

    scene.add_mesh(Mesh::new(Geometry::cube(
        Vec3::new(0.0, 1.5, 0.0),
        1.0,
        1.0,
        1.0,
    )));

    scene.add_mesh(Mesh::new(Geometry::sphere(
        Vec3::new(1.5, 1.5, 1.5),
        0.5,
        32,
        16,
    )));

    scene.add_light(Light::Directional {
        direction: Vec3::new(0.0, -1.0, 0.0),
        model: LightModel::new(Vec3::splat(0.2), Vec3::splat(0.4), Vec3::splat(0.5)),
    });

    scene
}

enum App {
    Pending,
    Running {
        window: Arc<Window>,
        gpu: GpuContext,
        renderer: Renderer,
        scene: Scene,
        camera: Camera,
        frames: u32,
        last_report: Instant,
    },
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let App::Pending = self {
            let window_attrs = WindowAttributes::default()
                .with_title("umbra: shadowed scene")
                .with_inner_size(winit::dpi::LogicalSize::new(1024, 768));
            let window = Arc::new(event_loop.create_window(window_attrs).unwrap());
            let gpu = GpuContext::new(window.clone());

            let mut renderer = Renderer::new();
            renderer.add_pass(ShadowPass::new());
            renderer.add_pass(DisplayPass::new(&Vsm).expect("display shader composition"));

            *self = App::Running {
                window,
                gpu,
                renderer,
                scene: build_scene(),
                camera: Camera::new(Vec3::new(0.0, 7.0, 9.0), Vec3::ZERO).with_fov(45.0),
                frames: 0,
                last_report: Instant::now(),
            };
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let App::Running {
            window,
            gpu,
            renderer,
            scene,
            camera,
            frames,
            last_report,
        } = self
        else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                gpu.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                // Animate between frames; the renderer reads an immutable
                // snapshot during the call.
                let meshes = scene.meshes_mut();
                meshes[TRIANGLE].transform.rotate(0.02, Vec3::Y);
                meshes[CUBE].transform.rotate(0.01, Vec3::Y);

                renderer.render(gpu, scene, camera);

                *frames += 1;
                if last_report.elapsed().as_secs_f32() >= 5.0 {
                    log::info!(
                        "{:.1} fps",
                        *frames as f32 / last_report.elapsed().as_secs_f32()
                    );
                    *frames = 0;
                    *last_report = Instant::now();
                }

                window.request_redraw();
            }
            _ => {}
        }
    }
}

fn main() {
    env_logger::init();

    let event_loop = EventLoop::new().unwrap();
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::Pending;
    event_loop.run_app(&mut app).unwrap();
}
