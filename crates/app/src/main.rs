//! Cell Grid - Main Entry Point
//!
//! A Vulkan-rendered Conway's Game of Life on a toroidal grid, with a
//! free-flying camera and JSON save/load.

use std::fs;

use anyhow::Result;
use glam::{Vec2, Vec3};
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use cellgrid_core::{TickTimer, Timer};
use cellgrid_platform::{InputState, KeyCode, Window};
use cellgrid_render::Renderer;
use cellgrid_scene::FlyCamera;
use cellgrid_sim::{CellGeometry, Simulation};

const GRID_SIZE: usize = 40;
const TICKS_PER_SEC: f32 = 5.0;
const WINDOW_WIDTH: u32 = 1024;
const WINDOW_HEIGHT: u32 = 768;
const SAVE_PATH: &str = "save.json";

struct App {
    window: Option<Window>,
    renderer: Option<Renderer>,
    input: InputState,
    timer: Timer,
    tick_timer: TickTimer,
    simulation: Simulation,
    geometry: CellGeometry,
    camera: FlyCamera,
    paused: bool,
    step_once: bool,
}

impl App {
    fn new() -> Self {
        let mut simulation = Simulation::new(GRID_SIZE);
        simulation.randomize();

        let mut geometry = CellGeometry::new();
        geometry.bind_cells(&simulation);

        // Start behind the grid, looking down -Z at its center
        let camera = FlyCamera::new(
            Vec3::new(0.0, 0.0, GRID_SIZE as f32),
            WINDOW_WIDTH as f32 / WINDOW_HEIGHT as f32,
        );

        Self {
            window: None,
            renderer: None,
            input: InputState::new(),
            timer: Timer::new(),
            tick_timer: TickTimer::new(TICKS_PER_SEC),
            simulation,
            geometry,
            camera,
            paused: false,
            step_once: false,
        }
    }

    /// Applies single-shot key commands: pause, step, randomize,
    /// save/load, quit.
    fn handle_commands(&mut self, event_loop: &ActiveEventLoop) {
        if self.input.is_key_just_pressed(KeyCode::Escape) {
            info!("Escape pressed, shutting down");
            event_loop.exit();
            return;
        }

        if self.input.is_key_just_pressed(KeyCode::KeyP) {
            self.paused = !self.paused;
            info!("Simulation {}", if self.paused { "paused" } else { "running" });
        }

        if self.input.is_key_just_pressed(KeyCode::Space) {
            self.step_once = true;
        }

        if self.input.is_key_just_pressed(KeyCode::KeyR) {
            self.simulation.randomize();
            self.geometry.bind_cells(&self.simulation);
            self.camera.reset();
            info!("Grid randomized: {} live cells", self.simulation.live_count());
        }

        if self.input.is_key_just_pressed(KeyCode::F2) {
            self.save_simulation();
        }

        if self.input.is_key_just_pressed(KeyCode::F3) {
            self.load_simulation();
        }
    }

    fn save_simulation(&self) {
        let json = match self.simulation.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize simulation: {}", e);
                return;
            }
        };

        match fs::write(SAVE_PATH, json) {
            Ok(()) => info!("Simulation saved to {}", SAVE_PATH),
            Err(e) => error!("Failed to write {}: {}", SAVE_PATH, e),
        }
    }

    fn load_simulation(&mut self) {
        let json = match fs::read_to_string(SAVE_PATH) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to read {}: {}", SAVE_PATH, e);
                return;
            }
        };

        match Simulation::from_json(&json) {
            Ok(simulation) => {
                info!(
                    "Simulation loaded from {}: grid {} with {} live cells",
                    SAVE_PATH,
                    simulation.grid_size(),
                    simulation.live_count()
                );
                self.simulation = simulation;
                self.geometry.bind_cells(&self.simulation);
                self.camera.reset();
                self.paused = true;
            }
            Err(e) => error!("Failed to load {}: {}", SAVE_PATH, e),
        }
    }

    /// Applies WASD/QE movement and mouse look to the camera.
    fn update_camera(&mut self, delta_secs: f32) {
        let mut direction = Vec3::ZERO;
        if self.input.is_key_pressed(KeyCode::KeyW) {
            direction.z -= 1.0;
        }
        if self.input.is_key_pressed(KeyCode::KeyS) {
            direction.z += 1.0;
        }
        if self.input.is_key_pressed(KeyCode::KeyA) {
            direction.x -= 1.0;
        }
        if self.input.is_key_pressed(KeyCode::KeyD) {
            direction.x += 1.0;
        }
        if self.input.is_key_pressed(KeyCode::KeyQ) {
            direction.y -= 1.0;
        }
        if self.input.is_key_pressed(KeyCode::KeyE) {
            direction.y += 1.0;
        }

        if direction != Vec3::ZERO {
            self.camera.apply_movement(direction, delta_secs);
        }

        let (dx, dy) = self.input.mouse_delta();
        if dx != 0.0 || dy != 0.0 {
            self.camera.apply_look(Vec2::new(dx, dy));
        }
    }

    fn render(&mut self, event_loop: &ActiveEventLoop) {
        let delta = self.timer.delta_secs();
        self.tick_timer.new_frame(delta);

        self.handle_commands(event_loop);
        if event_loop.exiting() {
            return;
        }

        self.update_camera(delta);

        if (!self.paused && self.tick_timer.ticked()) || self.step_once {
            self.simulation.step();
            self.geometry.bind_cells(&self.simulation);
            self.step_once = false;
        }

        if let Some(ref mut renderer) = self.renderer {
            renderer.new_frame();
            if let Err(e) = renderer.draw_frame(&mut self.geometry, &self.camera) {
                error!("Render error: {:?}", e);
            }
        }

        self.input.begin_frame();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            match Window::new(event_loop, WINDOW_WIDTH, WINDOW_HEIGHT, "Cell Grid") {
                Ok(window) => match Renderer::new(&window) {
                    Ok(renderer) => {
                        info!("Initialization complete, entering main loop");
                        self.camera.set_aspect(window.aspect_ratio());
                        self.renderer = Some(renderer);
                        self.window = Some(window);
                    }
                    Err(e) => {
                        error!("Failed to create renderer: {:?}", e);
                        event_loop.exit();
                    }
                },
                Err(e) => {
                    error!("Failed to create window: {}", e);
                    event_loop.exit();
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(ref mut window) = self.window {
                    window.resize(size.width, size.height);
                    if !window.is_minimized() {
                        self.camera.set_aspect(window.aspect_ratio());
                    }
                }
                if let Some(ref mut renderer) = self.renderer {
                    renderer.resize_framebuffer(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                self.render(event_loop);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::PhysicalKey;
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input.on_mouse_moved(position.x as f32, position.y as f32);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            // Sleep while minimized instead of spinning on empty frames
            if window.is_minimized() {
                event_loop.set_control_flow(ControlFlow::Wait);
            } else {
                event_loop.set_control_flow(ControlFlow::Poll);
                window.request_redraw();
            }
        }
    }
}

fn main() -> Result<()> {
    cellgrid_core::init_logging();
    info!("Starting Cell Grid ({}x{} cells)", GRID_SIZE, GRID_SIZE);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app)?;

    Ok(())
}
