//! Headless Viewport Demo
//!
//! Scripts a short editing session against the viewport core without a window:
//! - Builds a small level (crates, a light, a label, a move handle)
//! - Frames it, orbits and dollies the perspective camera
//! - Draws a frame through a logging backend
//! - Picks under a few pointer positions and box-selects everything
//! - Saves the camera state to a RON file next to the config
//!
//! Usage: `viewport_demo [config.toml|config.ron]`

use viewport_core::camera::{ControllerState, RonCameraStore};
use viewport_core::prelude::*;
use viewport_core::render::RenderEntry;

const DOCUMENT: &str = "/levels/demo.collection";
const CRATE_COUNT: i32 = 5;
const CRATE_SPACING: f64 = 3.0;

/// Draw backend that logs instead of drawing
#[derive(Default)]
struct LoggingBackend {
    draws: usize,
}

impl DrawBackend for LoggingBackend {
    fn begin_pass(&mut self, pass: Pass, camera: &Camera) {
        log::info!("-- pass {:?} ({} camera)", pass, camera.kind().as_str());
    }

    fn draw(&mut self, entry: &RenderEntry, model: &Mat4) {
        self.draws += 1;
        log::info!(
            "   draw {:?} {:?} key={:#018x} at ({:.2}, {:.2}, {:.2})",
            entry.kind,
            entry.node,
            entry.sort_key,
            model.m14,
            model.m24,
            model.m34
        );
    }
}

fn build_level(scene: &mut SceneGraph) -> Result<Vec<NodeId>, SceneError> {
    let root = scene.root();
    let unit = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

    let mut crates = Vec::new();
    for i in 0..CRATE_COUNT {
        let instance = scene.spawn(root, NodeKind::Instance, format!("crate{i}"))?;
        let mesh = scene.spawn(instance, NodeKind::Model, "mesh")?;
        scene.set_aabb(mesh, unit)?;
        scene.set_translation(instance, Vec3::new(f64::from(i - CRATE_COUNT / 2) * CRATE_SPACING, 0.0, 0.0))?;
        scene.set_euler(instance, Vec3::new(0.0, f64::from(i) * 15.0, 0.0))?;
        crates.push(instance);
    }

    let decal = scene.spawn(crates[0], NodeKind::Sprite, "decal")?;
    scene.set_aabb(decal, Aabb::new(Vec3::new(-1.0, -1.0, 1.0), Vec3::new(1.0, 1.0, 1.1)))?;
    scene.set_override_index(decal, Some(1))?;

    let sun = scene.spawn(root, NodeKind::Light, "sun")?;
    scene.set_translation(sun, Vec3::new(0.0, 8.0, 4.0))?;

    let label = scene.spawn(crates[2], NodeKind::Label, "crate2-name")?;
    scene.set_translation(label, Vec3::new(0.0, 1.5, 0.0))?;

    let handle = scene.spawn(crates[2], NodeKind::Manipulator, "move-handle")?;
    scene.set_aabb(handle, Aabb::new(Vec3::new(-0.1, -0.1, -0.1), Vec3::new(2.0, 2.0, 2.0)))?;
    scene.set_flags(handle, NodeFlags::NO_INHERIT_ROTATION | NodeFlags::NO_INHERIT_SCALE)?;

    log::info!("Level built: {} nodes", scene.len());
    Ok(crates)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => ViewportConfig::load_from_file(&path)?,
        None => ViewportConfig::default(),
    };
    viewport_core::foundation::logging::init_with_level(&config.log_level);
    log::info!("Starting headless viewport demo");

    let mut scene = SceneGraph::new();
    let crates = build_level(&mut scene)?;
    let bounds = scene.world_aabb(scene.root())?;
    log::info!("Scene bounds: {:?} .. {:?}", bounds.min, bounds.max);

    let mut view = SceneView::new(&config)?;
    // Requested before the viewport has a size, runs on the first resize
    view.camera_mut().set_viewport(0, 0, 0, 0);
    view.frame_selection(&mut scene)?;
    view.resize(800, 600, &mut scene)?;
    log::info!("Orthographic field after framing: {:.3}", view.camera().fov());

    let mut backend = LoggingBackend::default();
    view.render_frame(&scene, &mut backend)?;

    // Perspective: the switch keeps the level in view, then frame the middle
    // crate, orbit, and dolly in with the wheel
    view.set_projection_kind(ProjectionKind::Perspective);
    log::info!("Perspective camera after switch: {:?}", view.camera().position());
    view.set_selection(vec![crates[2]]);
    view.frame_selection(&mut scene)?;

    if view.mouse_down(400, 300, PointerButton::Left, Modifiers::ALT) == ControllerState::Rotate {
        for step in 1..=10 {
            view.mouse_move(400 + step * 8, 300 - step * 3);
        }
        view.mouse_up();
    }
    view.mouse_scrolled(-3);
    log::info!("Perspective camera at {:?}", view.camera().position());

    let mut backend = LoggingBackend::default();
    let list = view.render_frame(&scene, &mut backend)?;
    log::info!("Frame drew {} of {} entries", backend.draws, list.len());

    let mut select = BoundsSelectBackend::new();
    for (x, y) in [(400, 300), (120, 300), (700, 80)] {
        match view.pick(&scene, x, y, &mut select)? {
            Some(node) => log::info!("Pick ({x}, {y}) -> {}", scene.node(node)?.name()),
            None => log::info!("Pick ({x}, {y}) -> nothing"),
        }
    }
    let boxed = view.pick_box(&scene, (0, 0), (800, 600), &mut select)?;
    log::info!("Box select: {} nodes", boxed.len());

    let (origin, direction) = view.view_to_world(400, 300)?;
    log::info!("Center ray: {:?} -> {:?}", origin, direction);

    let store_path = std::env::temp_dir().join("viewport_demo_cameras.ron");
    let mut store = RonCameraStore::open(&store_path)?;
    view.save_camera_state(&mut store, DOCUMENT)?;
    log::info!("Camera state saved to {}", store_path.display());

    Ok(())
}
