//! Interactive camera controller
//!
//! Turns pointer drags and wheel clicks into camera motion: orbit around a
//! focus point, track (pan) in the view plane, and dolly. The controller holds
//! no camera of its own; every event receives the camera it should drive, so the
//! host can switch between perspective and orthographic views freely.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::projection::{Camera, ProjectionError, ProjectionKind};
use crate::config::ControllerConfig;
use crate::foundation::math::{Quat, Unit, Vec3, Vec4};
use crate::scene::Aabb;

/// Pointer buttons the controller understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerButton {
    /// Primary button
    Left,
    /// Wheel button
    Middle,
    /// Secondary button
    Right,
}

bitflags! {
    /// Keyboard modifiers held while a pointer button goes down
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Modifiers: u32 {
        /// Shift key
        const SHIFT = 1 << 0;
        /// Control key
        const CTRL = 1 << 1;
        /// Alt / Option key
        const ALT = 1 << 2;
        /// Command / Super key
        const META = 1 << 3;
    }
}

/// Camera operation a pointer chord starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlMode {
    /// Orbit around the focus point
    Rotate,
    /// Pan in the view plane
    Track,
    /// Move toward / away from the focus point (zoom for orthographic cameras)
    Dolly,
}

/// One entry of the chord table: button plus exact modifier set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraChord {
    /// Button pressed
    pub button: PointerButton,
    /// Modifiers that must be held (exact match)
    pub modifiers: Modifiers,
    /// Mode entered
    pub mode: ControlMode,
}

impl CameraChord {
    /// Create a chord
    pub const fn new(button: PointerButton, modifiers: Modifiers, mode: ControlMode) -> Self {
        Self { button, modifiers, mode }
    }
}

/// Drag state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    /// No drag in progress
    #[default]
    Idle,
    /// Orbiting
    Rotate,
    /// Panning
    Track,
    /// Dollying
    Dolly,
}

impl From<ControlMode> for ControllerState {
    fn from(mode: ControlMode) -> Self {
        match mode {
            ControlMode::Rotate => Self::Rotate,
            ControlMode::Track => Self::Track,
            ControlMode::Dolly => Self::Dolly,
        }
    }
}

/// Pointer-driven camera controller
#[derive(Debug, Clone)]
pub struct CameraController {
    config: ControllerConfig,
    state: ControllerState,
    focus_point: Option<Vec3>,
    last_x: i32,
    last_y: i32,
}

impl CameraController {
    /// Create a controller with the given tunables and chord table
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            state: ControllerState::Idle,
            focus_point: None,
            last_x: 0,
            last_y: 0,
        }
    }

    /// Current drag state
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Point the camera orbits around and dollies toward
    pub fn focus_point(&self) -> Option<Vec3> {
        self.focus_point
    }

    /// Replace the focus point
    pub fn set_focus_point(&mut self, focus: Option<Vec3>) {
        self.focus_point = focus;
    }

    /// Tunables in use
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Look up the mode a button and modifier set map to
    pub fn resolve_mode(&self, button: PointerButton, modifiers: Modifiers) -> Option<ControlMode> {
        self.config
            .chords
            .iter()
            .find(|chord| chord.button == button && chord.modifiers == modifiers)
            .map(|chord| chord.mode)
    }

    /// Start a drag. Orthographic cameras never orbit, so `Rotate` stays idle.
    pub fn mouse_down(
        &mut self,
        camera: &Camera,
        x: i32,
        y: i32,
        button: PointerButton,
        modifiers: Modifiers,
    ) -> ControllerState {
        self.state = match self.resolve_mode(button, modifiers) {
            Some(ControlMode::Rotate) if camera.kind() == ProjectionKind::Orthographic => ControllerState::Idle,
            Some(mode) => mode.into(),
            None => ControllerState::Idle,
        };
        self.last_x = x;
        self.last_y = y;

        log::debug!("Camera controller {:?} at ({}, {}) via {:?}+{:?}", self.state, x, y, button, modifiers);
        self.state
    }

    /// Continue a drag. Returns whether the camera moved.
    pub fn mouse_move(&mut self, camera: &mut Camera, x: i32, y: i32) -> bool {
        let dx = f64::from(self.last_x - x);
        let dy = f64::from(self.last_y - y);
        let (from_x, from_y) = (self.last_x, self.last_y);
        self.last_x = x;
        self.last_y = y;

        match self.state {
            ControllerState::Idle => false,
            ControllerState::Rotate => self.orbit(camera, dx, dy),
            ControllerState::Dolly => self.dolly(camera, dy),
            ControllerState::Track => match self.track(camera, from_x, from_y, x, y) {
                Ok(moved) => moved,
                Err(e) => {
                    log::debug!("Track skipped: {e}");
                    false
                }
            },
        }
    }

    /// End the drag
    pub fn mouse_up(&mut self) {
        self.state = ControllerState::Idle;
    }

    /// Dolly by `count` wheel clicks; positive counts move away from the focus
    pub fn mouse_scrolled(&mut self, camera: &mut Camera, count: i32) -> bool {
        self.dolly(camera, f64::from(count) * self.config.wheel_dolly_step)
    }

    /// Yaw about the world up axis and pitch about the camera's local X,
    /// keeping the distance to the focus point.
    fn orbit(&mut self, camera: &mut Camera, dx: f64, dy: f64) -> bool {
        let Some(focus) = self.focus_point else {
            return false;
        };

        let rotation = camera.rotation();
        let offset_local = rotation.inverse_transform_vector(&(camera.position() - focus));

        // World up expressed in camera space, so yaw never introduces roll
        let up_local = rotation.inverse_transform_vector(&Vec3::y());
        let yaw = Quat::from_axis_angle(&Unit::new_normalize(up_local), dx * self.config.rotate_speed);
        let pitch = Quat::from_axis_angle(&Vec3::x_axis(), dy * self.config.rotate_speed);

        camera.rotate((yaw * pitch).quaternion());
        let offset = camera.rotation().transform_vector(&offset_local);
        camera.set_position(focus + offset);
        true
    }

    /// Pan so the point under the pointer stays under the pointer at the
    /// focus point's depth.
    fn track(&mut self, camera: &mut Camera, from_x: i32, from_y: i32, x: i32, y: i32) -> Result<bool, ProjectionError> {
        let Some(focus) = self.focus_point else {
            return Ok(false);
        };

        let depth = camera.project(&focus)?.z;
        let from = camera.unproject(&Vec3::new(f64::from(from_x), f64::from(from_y), depth))?;
        let to = camera.unproject(&Vec3::new(f64::from(x), f64::from(y), depth))?;
        let delta = from - to;

        camera.move_by(delta.x, delta.y, delta.z);
        self.focus_point = Some(focus + delta);
        Ok(true)
    }

    fn dolly(&mut self, camera: &mut Camera, amount: f64) -> bool {
        if amount.abs() < f64::EPSILON {
            return false;
        }
        let sign = amount.signum();
        let magnitude = amount.abs();

        match camera.kind() {
            ProjectionKind::Orthographic => {
                let scale = 1.0 + sign * magnitude * self.config.orthographic_dolly_rate;
                let field = (camera.fov() * scale).max(self.config.min_field_size);
                camera.set_fov(field);
                true
            }
            ProjectionKind::Perspective => {
                let Some(focus) = self.focus_point else {
                    return false;
                };
                let distance = (camera.position() - focus).norm();
                if distance <= f64::EPSILON {
                    return false;
                }
                let step = camera.local_axis(2) * (sign * magnitude * self.config.perspective_dolly_rate * distance);
                camera.move_by(step.x, step.y, step.z);
                true
            }
        }
    }

    /// Fit `aabb` into the view: re-center on it, then size the orthographic
    /// field (or back a perspective camera off) so the box fits with the
    /// configured margin. An empty box does nothing.
    pub fn frame(&mut self, camera: &mut Camera, aabb: &Aabb) -> bool {
        if aabb.is_identity() {
            log::debug!("Frame selection skipped: empty bounds");
            return false;
        }

        let center = aabb.center();
        self.focus_point = Some(center);

        // Slide the camera in its own view plane until the center is on the axis
        let mut in_view = camera.view_matrix() * Vec4::new(center.x, center.y, center.z, 1.0);
        in_view.z = 0.0;
        in_view.w = 1.0;
        let position = camera.pose_matrix() * in_view;
        camera.set_position(position.xyz());

        match camera.kind() {
            ProjectionKind::Orthographic => self.fit_orthographic(camera, aabb),
            ProjectionKind::Perspective => self.fit_perspective(camera, aabb),
        }
        true
    }

    /// Device-space extents of the box corners scale the field directly: a
    /// corner at device x = 0.5 needs half the current field.
    fn fit_orthographic(&self, camera: &mut Camera, aabb: &Aabb) {
        let view_projection = camera.projection_matrix() * camera.view_matrix();
        let (mut max_x, mut max_y) = (0.0_f64, 0.0_f64);
        for corner in aabb.corners() {
            let device = view_projection * Vec4::new(corner.x, corner.y, corner.z, 1.0);
            max_x = max_x.max(device.x.abs());
            max_y = max_y.max(device.y.abs());
        }

        let field = (camera.fov() * max_x.max(max_y) * self.config.frame_margin).max(self.config.min_field_size);
        log::debug!("Frame selection: orthographic field {:.3} -> {:.3}", camera.fov(), field);
        camera.set_fov(field);
    }

    fn fit_perspective(&self, camera: &mut Camera, aabb: &Aabb) {
        let radius = aabb.extents().norm();
        if radius <= f64::EPSILON {
            return;
        }

        let half_vertical = camera.fov().to_radians() / 2.0;
        let half_horizontal = (half_vertical.tan() * camera.aspect()).atan();
        let half_angle = half_vertical.min(half_horizontal);
        let distance = radius * self.config.frame_margin / half_angle.sin();

        let center = aabb.center();
        camera.set_position(center + camera.local_axis(2) * distance);
        log::debug!("Frame selection: perspective distance {:.3}", distance);
    }
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn perspective_camera() -> Camera {
        let mut camera = Camera::perspective(30.0, 4.0 / 3.0, 1.0, 2000.0);
        camera.set_viewport(0, 0, 800, 600);
        camera.set_position(Vec3::new(0.0, 0.0, 50.0));
        camera
    }

    fn orthographic_camera() -> Camera {
        let mut camera = Camera::orthographic(100.0, 4.0 / 3.0, -100_000.0, 100_000.0);
        camera.set_viewport(0, 0, 800, 600);
        camera
    }

    #[test]
    fn test_resolve_default_chords() {
        let controller = CameraController::default();
        assert_eq!(controller.resolve_mode(PointerButton::Left, Modifiers::ALT), Some(ControlMode::Rotate));
        assert_eq!(controller.resolve_mode(PointerButton::Middle, Modifiers::empty()), Some(ControlMode::Track));
        assert_eq!(
            controller.resolve_mode(PointerButton::Left, Modifiers::ALT | Modifiers::META),
            Some(ControlMode::Dolly)
        );
        assert_eq!(controller.resolve_mode(PointerButton::Left, Modifiers::empty()), None);
        assert_eq!(controller.resolve_mode(PointerButton::Left, Modifiers::ALT | Modifiers::SHIFT), None);
    }

    #[test]
    fn test_orthographic_rotate_stays_idle() {
        let mut controller = CameraController::default();
        let camera = orthographic_camera();
        let state = controller.mouse_down(&camera, 10, 10, PointerButton::Left, Modifiers::ALT);
        assert_eq!(state, ControllerState::Idle);
    }

    #[test]
    fn test_orbit_keeps_focus_distance() {
        let mut controller = CameraController::default();
        let mut camera = perspective_camera();
        let focus = Vec3::new(1.0, 2.0, -3.0);
        controller.set_focus_point(Some(focus));
        let before = (camera.position() - focus).norm();

        controller.mouse_down(&camera, 400, 300, PointerButton::Left, Modifiers::ALT);
        assert!(controller.mouse_move(&mut camera, 460, 250));
        assert!(controller.mouse_move(&mut camera, 300, 380));
        controller.mouse_up();

        let after = (camera.position() - focus).norm();
        assert_relative_eq!(before, after, max_relative = 1e-9);
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn test_orbit_does_not_roll() {
        let mut controller = CameraController::default();
        let mut camera = perspective_camera();
        controller.set_focus_point(Some(Vec3::zeros()));

        controller.mouse_down(&camera, 0, 0, PointerButton::Left, Modifiers::ALT);
        controller.mouse_move(&mut camera, 120, 40);
        controller.mouse_move(&mut camera, -80, 90);

        // Camera right axis stays horizontal
        assert_relative_eq!(camera.local_axis(0).y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_orbit_without_focus_is_noop() {
        let mut controller = CameraController::default();
        let mut camera = perspective_camera();
        controller.mouse_down(&camera, 0, 0, PointerButton::Left, Modifiers::ALT);
        assert!(!controller.mouse_move(&mut camera, 50, 50));
        assert_relative_eq!(camera.position(), Vec3::new(0.0, 0.0, 50.0));
    }

    #[test]
    fn test_track_keeps_focus_under_pointer() {
        let mut controller = CameraController::default();
        let mut camera = perspective_camera();
        let focus = Vec3::new(2.0, -1.0, 0.0);
        controller.set_focus_point(Some(focus));
        let grabbed = camera.project(&focus).unwrap();

        controller.mouse_down(&camera, 400, 300, PointerButton::Middle, Modifiers::empty());
        assert!(controller.mouse_move(&mut camera, 430, 280));

        // The initial focus point now sits 30px right and 20px up of where it was
        let moved = camera.project(&focus).unwrap();
        assert_relative_eq!(moved.x - grabbed.x, 30.0, epsilon = 1e-6);
        assert_relative_eq!(moved.y - grabbed.y, -20.0, epsilon = 1e-6);

        // The focus point travels with the camera
        let new_focus = controller.focus_point().unwrap();
        let screen = camera.project(&new_focus).unwrap();
        assert_relative_eq!(screen.x, grabbed.x, epsilon = 1e-6);
        assert_relative_eq!(screen.y, grabbed.y, epsilon = 1e-6);
    }

    #[test]
    fn test_perspective_dolly_moves_along_view_axis() {
        let mut controller = CameraController::default();
        let mut camera = perspective_camera();
        controller.set_focus_point(Some(Vec3::zeros()));

        controller.mouse_down(&camera, 0, 100, PointerButton::Right, Modifiers::ALT);
        assert!(controller.mouse_move(&mut camera, 0, 200));

        // dy = -100 -> move toward the focus by 100 * 0.001 * 50
        assert_relative_eq!(camera.position(), Vec3::new(0.0, 0.0, 45.0), epsilon = 1e-9);
    }

    #[test]
    fn test_perspective_dolly_at_focus_is_noop() {
        let mut controller = CameraController::default();
        let mut camera = perspective_camera();
        controller.set_focus_point(Some(camera.position()));
        assert!(!controller.mouse_scrolled(&mut camera, 3));
    }

    #[test]
    fn test_orthographic_dolly_clamps_field() {
        let mut controller = CameraController::default();
        let mut camera = orthographic_camera();

        assert!(controller.mouse_scrolled(&mut camera, 5));
        assert_relative_eq!(camera.fov(), 110.0, epsilon = 1e-9);

        controller.mouse_down(&camera, 0, 0, PointerButton::Right, Modifiers::ALT);
        controller.mouse_move(&mut camera, 0, 10_000);
        assert_relative_eq!(camera.fov(), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_frame_orthographic_fits_box() {
        let mut controller = CameraController::default();
        let mut camera = orthographic_camera();
        let aabb = Aabb::new(Vec3::new(-5.0, -5.0, -5.0), Vec3::new(5.0, 5.0, 5.0));

        assert!(controller.frame(&mut camera, &aabb));
        assert_eq!(controller.focus_point(), Some(Vec3::zeros()));

        for corner in aabb.corners() {
            let screen = camera.project(&corner).unwrap();
            assert!((0.0..=800.0).contains(&screen.x), "x = {}", screen.x);
            assert!((-1.0..=600.0).contains(&screen.y), "y = {}", screen.y);
        }
        // Height is the limiting extent: 10 units * 4/3 * 1.1
        assert_relative_eq!(camera.fov(), 10.0 * 4.0 / 3.0 * 1.1, max_relative = 1e-9);
    }

    #[test]
    fn test_frame_recenters_off_axis_box() {
        let mut controller = CameraController::default();
        let mut camera = orthographic_camera();
        let aabb = Aabb::new(Vec3::new(10.0, 20.0, -1.0), Vec3::new(12.0, 22.0, 1.0));

        controller.frame(&mut camera, &aabb);
        assert_relative_eq!(camera.position(), Vec3::new(11.0, 21.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_frame_perspective_sees_whole_box() {
        let mut controller = CameraController::default();
        let mut camera = perspective_camera();
        let aabb = Aabb::new(Vec3::new(-20.0, -3.0, -4.0), Vec3::new(-10.0, 3.0, 4.0));

        controller.frame(&mut camera, &aabb);
        for corner in aabb.corners() {
            let screen = camera.project(&corner).unwrap();
            assert!((0.0..=800.0).contains(&screen.x));
            assert!((-1.0..=600.0).contains(&screen.y));
        }
    }

    #[test]
    fn test_frame_empty_box_is_noop() {
        let mut controller = CameraController::default();
        let mut camera = orthographic_camera();
        assert!(!controller.frame(&mut camera, &Aabb::identity()));
        assert_eq!(controller.focus_point(), None);
        assert_relative_eq!(camera.fov(), 100.0);
    }
}
