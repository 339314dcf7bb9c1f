//! # Viewport Camera
//!
//! Pose, projection and viewport of the editor camera, plus the
//! world <-> window conversions picking and the controller rely on.
//!
//! ## Conventions
//! - Right-handed, Y-up world; the camera looks down its local -Z axis.
//! - Clip space is the OpenGL `[-1, 1]` cube; window depth is mapped to `[0, 1]`.
//! - Window coordinates have their origin in the top-left corner (pointer
//!   coordinates), so `project` flips Y and `unproject` flips it back.
//!
//! Both matrices are cached and rebuilt by every setter, so reads never observe
//! a matrix that disagrees with the parameters.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Mat4, Mat4Ext, Quat, Quaternion, Unit, Vec3, Vec4};

/// Homogeneous `w` below this magnitude is treated as zero.
pub const DEGENERATE_W_EPSILON: f64 = 1e-12;

/// Projection type of a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProjectionKind {
    /// Perspective projection, `fov` is the vertical angle in degrees
    Perspective,
    /// Orthographic projection, `fov` is the visible width in world units
    Orthographic,
}

impl ProjectionKind {
    /// Stable lowercase name, used as part of persisted keys
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Perspective => "perspective",
            Self::Orthographic => "orthographic",
        }
    }
}

/// Window-space rectangle the camera renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Left edge in pixels
    pub x: i32,
    /// Bottom edge in pixels
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl Viewport {
    /// Create a viewport rectangle
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Width over height, or 1.0 for a degenerate rectangle
    pub fn aspect(&self) -> f64 {
        if self.height > 0 {
            f64::from(self.width) / f64::from(self.height)
        } else {
            1.0
        }
    }

    /// Whether the rectangle covers no pixels
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0, 0, 1, 1)
    }
}

/// Failures of the world <-> window conversions
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ProjectionError {
    /// The homogeneous divisor vanished (point on the camera plane / at infinity)
    #[error("homogeneous w is zero ({w:e}), point cannot be projected")]
    DegenerateW {
        /// The offending divisor
        w: f64,
    },

    /// `projection * view` could not be inverted
    #[error("view-projection matrix is singular")]
    SingularMatrix,

    /// Unprojection against a viewport with no area
    #[error("viewport {width}x{height} has no area")]
    EmptyViewport {
        /// Viewport width
        width: i32,
        /// Viewport height
        height: i32,
    },
}

/// Editor viewport camera
///
/// `fov` doubles as the orthographic field size, the same way the property grid
/// exposes a single "fov" value for both camera types.
#[derive(Debug, Clone)]
pub struct Camera {
    kind: ProjectionKind,
    position: Vec3,
    rotation: Quat,
    fov: f64,
    aspect: f64,
    near: f64,
    far: f64,
    viewport: Viewport,
    view_matrix: Mat4,
    projection_matrix: Mat4,
}

impl Camera {
    /// Perspective camera at the origin looking down -Z
    pub fn perspective(fov_degrees: f64, aspect: f64, near: f64, far: f64) -> Self {
        let mut camera = Self::blank(ProjectionKind::Perspective);
        camera.set_perspective(fov_degrees, aspect, near, far);
        camera
    }

    /// Orthographic camera at the origin looking down -Z
    pub fn orthographic(field_size: f64, aspect: f64, near: f64, far: f64) -> Self {
        let mut camera = Self::blank(ProjectionKind::Orthographic);
        camera.set_orthographic(field_size, aspect, near, far);
        camera
    }

    fn blank(kind: ProjectionKind) -> Self {
        Self {
            kind,
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            fov: 0.0,
            aspect: 1.0,
            near: 0.0,
            far: 0.0,
            viewport: Viewport::default(),
            view_matrix: Mat4::identity(),
            projection_matrix: Mat4::identity(),
        }
    }

    /// Switch to a symmetric perspective frustum
    ///
    /// `fov_degrees` is the full vertical angle; `yMax = near * tan(fov * PI / 360)`.
    pub fn set_perspective(&mut self, fov_degrees: f64, aspect: f64, near: f64, far: f64) {
        self.kind = ProjectionKind::Perspective;
        self.fov = fov_degrees;
        self.aspect = aspect;
        self.near = near;
        self.far = far;

        let y_max = near * (fov_degrees * std::f64::consts::PI / 360.0).tan();
        let y_min = -y_max;
        let x_min = y_min * aspect;
        let x_max = y_max * aspect;

        self.projection_matrix = Mat4::frustum(x_min, x_max, y_min, y_max, near, far);
        log::trace!(
            "Camera perspective: fov={:.3} aspect={:.3} near={} far={}",
            fov_degrees, aspect, near, far
        );
    }

    /// Switch to an orthographic box `field_size` wide
    pub fn set_orthographic(&mut self, field_size: f64, aspect: f64, near: f64, far: f64) {
        self.kind = ProjectionKind::Orthographic;
        self.fov = field_size;
        self.aspect = aspect;
        self.near = near;
        self.far = far;

        let left = -field_size / 2.0;
        let right = field_size / 2.0;
        let bottom = left / aspect;
        let top = right / aspect;

        self.projection_matrix = Mat4::orthographic(left, right, bottom, top, near, far);
        log::trace!(
            "Camera orthographic: field={:.3} aspect={:.3} near={} far={}",
            field_size, aspect, near, far
        );
    }

    /// Re-apply the current projection with a new fov / field size
    pub fn set_fov(&mut self, fov: f64) {
        self.apply_projection(fov, self.aspect);
    }

    /// Re-apply the current projection with a new aspect ratio
    pub fn set_aspect(&mut self, aspect: f64) {
        if (self.aspect - aspect).abs() > 0.01 {
            log::debug!("Camera aspect ratio changed: {:.3} -> {:.3}", self.aspect, aspect);
        }
        self.apply_projection(self.fov, aspect);
    }

    fn apply_projection(&mut self, fov: f64, aspect: f64) {
        match self.kind {
            ProjectionKind::Perspective => self.set_perspective(fov, aspect, self.near, self.far),
            ProjectionKind::Orthographic => self.set_orthographic(fov, aspect, self.near, self.far),
        }
    }

    /// Set the window rectangle used by `project` / `unproject`
    pub fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.viewport = Viewport::new(x, y, width, height);
    }

    /// Current window rectangle
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Apply an incremental rotation in camera-local space (`rotation * delta`).
    ///
    /// The delta does not need to be normalized; a zero quaternion is ignored.
    pub fn rotate(&mut self, delta: &Quaternion<f64>) {
        let Some(delta) = Unit::try_new(*delta, f64::EPSILON) else {
            log::warn!("Ignoring zero-length camera rotation delta");
            return;
        };
        self.rotation = Unit::new_normalize(self.rotation.into_inner() * delta.into_inner());
        self.update_view_matrix();
    }

    /// Replace the camera orientation
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.update_view_matrix();
    }

    /// Translate the camera in world space
    pub fn move_by(&mut self, dx: f64, dy: f64, dz: f64) {
        self.position += Vec3::new(dx, dy, dz);
        self.update_view_matrix();
    }

    /// Move the camera to a world position
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.update_view_matrix();
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Closed-form inverse of the camera pose: `Rᵀ` with `-Rᵀ·p` as translation.
    fn update_view_matrix(&mut self) {
        let rotation_t = self.rotation.to_rotation_matrix().matrix().transpose();
        let translation = -(rotation_t * self.position);

        let mut view = Mat4::identity();
        utils::set_rotation_scale(&mut view, &rotation_t);
        view.m14 = translation.x;
        view.m24 = translation.y;
        view.m34 = translation.z;
        self.view_matrix = view;
    }

    /// Projection type
    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    /// Camera position in world space
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Camera orientation
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Vertical fov in degrees (perspective) or field size (orthographic)
    pub fn fov(&self) -> f64 {
        self.fov
    }

    /// Aspect ratio used by the projection
    pub fn aspect(&self) -> f64 {
        self.aspect
    }

    /// Near plane distance
    pub fn near(&self) -> f64 {
        self.near
    }

    /// Far plane distance
    pub fn far(&self) -> f64 {
        self.far
    }

    /// World-to-view transform
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    /// View-to-clip transform
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    /// Camera-to-world transform (inverse of [`Camera::view_matrix`])
    pub fn pose_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position) * self.rotation.to_homogeneous()
    }

    /// World direction of a camera-local basis axis (0 = right, 1 = up, 2 = backward)
    pub fn local_axis(&self, axis: usize) -> Vec3 {
        self.rotation.to_rotation_matrix().matrix().column(axis).into_owned()
    }

    /// World point -> window `(x, y, depth)`
    ///
    /// Depth is `0` on the near plane and `1` on the far plane.
    pub fn project(&self, world: &Vec3) -> Result<Vec3, ProjectionError> {
        let clip = self.projection_matrix * self.view_matrix * Vec4::new(world.x, world.y, world.z, 1.0);
        if clip.w.abs() < DEGENERATE_W_EPSILON {
            return Err(ProjectionError::DegenerateW { w: clip.w });
        }
        let ndc = clip.xyz() / clip.w;

        let vp = self.viewport;
        let x = f64::from(vp.x) + (1.0 + ndc.x) * f64::from(vp.width) / 2.0;
        let y = f64::from(vp.y) + (1.0 + ndc.y) * f64::from(vp.height) / 2.0;
        let y = f64::from(vp.height - vp.y) - y - 1.0;
        let z = (1.0 + ndc.z) / 2.0;

        Ok(Vec3::new(x, y, z))
    }

    /// Window `(x, y, depth)` -> world point, the inverse of [`Camera::project`]
    pub fn unproject(&self, window: &Vec3) -> Result<Vec3, ProjectionError> {
        let vp = self.viewport;
        if vp.is_empty() {
            return Err(ProjectionError::EmptyViewport { width: vp.width, height: vp.height });
        }

        let y = f64::from(vp.height - vp.y) - window.y - 1.0;
        let ndc = Vec4::new(
            (window.x - f64::from(vp.x)) * 2.0 / f64::from(vp.width) - 1.0,
            (y - f64::from(vp.y)) * 2.0 / f64::from(vp.height) - 1.0,
            2.0 * window.z - 1.0,
            1.0,
        );

        let inverse = (self.projection_matrix * self.view_matrix)
            .try_inverse()
            .ok_or(ProjectionError::SingularMatrix)?;
        let world = inverse * ndc;
        if world.w.abs() < DEGENERATE_W_EPSILON {
            return Err(ProjectionError::DegenerateW { w: world.w });
        }

        Ok(world.xyz() / world.w)
    }
}

impl Default for Camera {
    /// 30 degree perspective camera with a unit viewport
    fn default() -> Self {
        Self::perspective(30.0, 1.0, 1.0, 2000.0)
    }
}
