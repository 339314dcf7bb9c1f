//! # Scene View
//!
//! One editor viewport: a perspective and an orthographic camera, the
//! controller driving whichever is active, the current selection and the
//! display filter. Hosts forward pointer events and frame ticks here and supply
//! the backends that actually draw and hit test.

use crate::camera::{
    self, Camera, CameraController, CameraStateStore, ControllerState, Modifiers, PersistError, PointerButton,
    ProjectionError, ProjectionKind,
};
use crate::config::{ConfigError, ViewportConfig};
use crate::foundation::math::{utils, Point3, Vec3};
use crate::render::{DrawBackend, Pass, Picker, RenderFilter, RenderList, SelectBackend};
use crate::scene::{Aabb, NodeId, NodeKind, SceneError, SceneGraph};

/// Errors surfaced by [`SceneView`]
#[derive(thiserror::Error, Debug)]
pub enum ViewError {
    /// Scene graph error
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Projection error
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Camera state persistence error
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Editor viewport state
#[derive(Debug, Clone)]
pub struct SceneView {
    perspective: Camera,
    orthographic: Camera,
    active: ProjectionKind,
    controller: CameraController,
    picker: Picker,
    filter: RenderFilter,
    selection: Vec<NodeId>,
    pending_frame_selection: bool,
}

impl SceneView {
    /// Build a view from a validated configuration. The orthographic camera
    /// is active initially.
    pub fn new(config: &ViewportConfig) -> Result<Self, ViewError> {
        config.validate()?;
        let defaults = &config.camera;

        let perspective = Camera::perspective(
            defaults.perspective_fov_degrees,
            1.0,
            defaults.perspective_near,
            defaults.perspective_far,
        );
        let orthographic = Camera::orthographic(
            defaults.orthographic_field_size,
            1.0,
            defaults.orthographic_near,
            defaults.orthographic_far,
        );

        Ok(Self {
            perspective,
            orthographic,
            active: ProjectionKind::Orthographic,
            controller: CameraController::new(config.controller.clone()),
            picker: Picker::new(config.picking.min_selection_box),
            filter: RenderFilter::default(),
            selection: Vec::new(),
            pending_frame_selection: false,
        })
    }

    /// Active camera
    pub fn camera(&self) -> &Camera {
        self.camera_for(self.active)
    }

    /// Active camera, mutably
    pub fn camera_mut(&mut self) -> &mut Camera {
        match self.active {
            ProjectionKind::Perspective => &mut self.perspective,
            ProjectionKind::Orthographic => &mut self.orthographic,
        }
    }

    /// Camera of the given kind
    pub fn camera_for(&self, kind: ProjectionKind) -> &Camera {
        match kind {
            ProjectionKind::Perspective => &self.perspective,
            ProjectionKind::Orthographic => &self.orthographic,
        }
    }

    /// Kind of the active camera
    pub fn projection_kind(&self) -> ProjectionKind {
        self.active
    }

    /// Switch cameras, carrying the view across. An in-progress drag is
    /// dropped.
    ///
    /// Going orthographic snaps the rotation to the nearest world axes, puts
    /// the camera at the same distance from the focus point and keeps the
    /// visible width at the focus depth. Going perspective keeps the
    /// perspective rotation and backs off from the focus point until the
    /// orthographic width fits. Without a focus point the target camera keeps
    /// its pose.
    pub fn set_projection_kind(&mut self, kind: ProjectionKind) {
        if self.active == kind {
            return;
        }
        log::debug!("Switching viewport camera to {}", kind.as_str());
        self.controller.mouse_up();

        match (self.controller.focus_point(), kind) {
            (Some(focus), ProjectionKind::Orthographic) => {
                carry_to_orthographic(&self.perspective, &mut self.orthographic, &focus);
            }
            (Some(focus), ProjectionKind::Perspective) => {
                carry_to_perspective(&self.orthographic, &mut self.perspective, &focus);
            }
            (None, _) => log::debug!("No focus point, {} camera keeps its pose", kind.as_str()),
        }
        self.active = kind;
    }

    /// Camera controller
    pub fn controller(&self) -> &CameraController {
        &self.controller
    }

    /// Selected nodes
    pub fn selection(&self) -> &[NodeId] {
        &self.selection
    }

    /// Replace the selection
    pub fn set_selection(&mut self, selection: Vec<NodeId>) {
        self.selection = selection;
    }

    /// Draw outlines for all nodes instead of only selected ones
    pub fn set_outline_shown(&mut self, shown: bool) {
        self.filter.outline_shown = shown;
    }

    /// Whether outlines are drawn for all nodes
    pub fn outline_shown(&self) -> bool {
        self.filter.outline_shown
    }

    /// Show or hide every node of a kind
    pub fn set_kind_visible(&mut self, kind: NodeKind, visible: bool) {
        if visible {
            self.filter.hidden_kinds.remove(&kind);
        } else {
            self.filter.hidden_kinds.insert(kind);
        }
    }

    /// Current display filter
    pub fn filter(&self) -> &RenderFilter {
        &self.filter
    }

    /// Adopt a new window size. Both cameras get the viewport and aspect; the
    /// orthographic depth range is reset to `+-100000`. A frame selection
    /// requested before the first resize runs now.
    ///
    /// A size with no area (a minimized window) only records the viewport;
    /// the projections keep their last aspect until a real size arrives.
    pub fn resize(&mut self, width: i32, height: i32, scene: &mut SceneGraph) -> Result<(), ViewError> {
        for camera in [&mut self.perspective, &mut self.orthographic] {
            camera.set_viewport(0, 0, width, height);
        }
        if width <= 0 || height <= 0 {
            log::debug!("Viewport resized to {}x{}, keeping projections", width, height);
            return Ok(());
        }

        let aspect = self.perspective.viewport().aspect();
        self.perspective.set_aspect(aspect);
        self.orthographic.set_orthographic(self.orthographic.fov(), aspect, -100_000.0, 100_000.0);
        log::debug!("Viewport resized to {}x{}", width, height);

        if self.pending_frame_selection {
            self.pending_frame_selection = false;
            self.frame_selection(scene)?;
        }
        Ok(())
    }

    // ---- pointer input ----

    /// Forward a button press to the controller
    pub fn mouse_down(&mut self, x: i32, y: i32, button: PointerButton, modifiers: Modifiers) -> ControllerState {
        let camera = match self.active {
            ProjectionKind::Perspective => &self.perspective,
            ProjectionKind::Orthographic => &self.orthographic,
        };
        self.controller.mouse_down(camera, x, y, button, modifiers)
    }

    /// Forward pointer motion; returns whether the camera moved
    pub fn mouse_move(&mut self, x: i32, y: i32) -> bool {
        let camera = match self.active {
            ProjectionKind::Perspective => &mut self.perspective,
            ProjectionKind::Orthographic => &mut self.orthographic,
        };
        self.controller.mouse_move(camera, x, y)
    }

    /// Forward a button release
    pub fn mouse_up(&mut self) {
        self.controller.mouse_up();
    }

    /// Forward wheel clicks; returns whether the camera moved
    pub fn mouse_scrolled(&mut self, count: i32) -> bool {
        let camera = match self.active {
            ProjectionKind::Perspective => &mut self.perspective,
            ProjectionKind::Orthographic => &mut self.orthographic,
        };
        self.controller.mouse_scrolled(camera, count)
    }

    // ---- frame, draw and pick ----

    /// World bounds of the selection, or of the whole scene when nothing
    /// (alive) is selected
    pub fn selection_bounds(&self, scene: &mut SceneGraph) -> Result<Aabb, ViewError> {
        let live: Vec<NodeId> = self.selection.iter().copied().filter(|&id| scene.contains(id)).collect();
        if live.len() < self.selection.len() {
            log::warn!("Ignoring {} stale selected nodes", self.selection.len() - live.len());
        }
        if live.is_empty() {
            return Ok(scene.world_aabb(scene.root())?);
        }

        let mut bounds = Aabb::identity();
        for id in live {
            bounds = bounds.union(&scene.world_aabb(id)?);
        }
        Ok(bounds)
    }

    /// Fit the selection into the active camera. Deferred until the first
    /// resize while the viewport has no area.
    pub fn frame_selection(&mut self, scene: &mut SceneGraph) -> Result<bool, ViewError> {
        if self.camera().viewport().is_empty() {
            log::debug!("Viewport has no size yet, deferring frame selection");
            self.pending_frame_selection = true;
            return Ok(false);
        }

        let bounds = self.selection_bounds(scene)?;
        let camera = match self.active {
            ProjectionKind::Perspective => &mut self.perspective,
            ProjectionKind::Orthographic => &mut self.orthographic,
        };
        Ok(self.controller.frame(camera, &bounds))
    }

    /// Collect, key, sort and submit one frame. Returns the sorted list.
    pub fn render_frame(&self, scene: &SceneGraph, backend: &mut dyn DrawBackend) -> Result<RenderList, ViewError> {
        let camera = self.camera();
        let mut list = RenderList::collect(scene, scene.root(), &Pass::RENDER_PASSES, &self.filter, &self.selection)?;
        list.compute_keys(camera);
        list.sort();
        let drawn = list.submit(camera, backend);
        log::trace!("Rendered {} entries", drawn);
        Ok(list)
    }

    /// Selectable node under the pointer
    pub fn pick(
        &self,
        scene: &SceneGraph,
        x: i32,
        y: i32,
        backend: &mut dyn SelectBackend,
    ) -> Result<Option<NodeId>, ViewError> {
        let rect = self.picker.rect_at(x, y);
        Ok(self.picker.pick(scene, self.camera(), &rect, &self.filter, backend)?)
    }

    /// Every selectable node inside a drag rectangle, nearest first
    pub fn pick_box(
        &self,
        scene: &SceneGraph,
        start: (i32, i32),
        end: (i32, i32),
        backend: &mut dyn SelectBackend,
    ) -> Result<Vec<NodeId>, ViewError> {
        let rect = self.picker.rect_between(start, end);
        Ok(self.picker.pick_all(scene, self.camera(), &rect, &self.filter, backend)?)
    }

    /// Ray through a window position: `(origin, direction)`.
    ///
    /// Perspective rays start on the near plane and point away from the
    /// camera. Orthographic rays all share the view direction; their origin is
    /// moved onto the plane through the world origin facing the camera.
    pub fn view_to_world(&self, x: i32, y: i32) -> Result<(Vec3, Vec3), ViewError> {
        let camera = self.camera();
        let origin = camera.unproject(&Vec3::new(f64::from(x), f64::from(y), 0.0))?;

        match camera.kind() {
            ProjectionKind::Orthographic => {
                let axis = camera.local_axis(2);
                let origin = origin - axis * origin.dot(&axis);
                Ok((origin, -axis))
            }
            ProjectionKind::Perspective => {
                let direction = (origin - camera.position()).normalize();
                Ok((origin, direction))
            }
        }
    }

    /// Window position of a world point
    pub fn world_to_view(&self, point: &Vec3) -> Result<(f64, f64), ViewError> {
        let window = self.camera().project(point)?;
        Ok((window.x, window.y))
    }

    // ---- camera state ----

    /// Store both cameras for `document`
    pub fn save_camera_state(&self, store: &mut dyn CameraStateStore, document: &str) -> Result<(), ViewError> {
        camera::save_camera(store, document, &self.perspective)?;
        camera::save_camera(store, document, &self.orthographic)?;
        Ok(())
    }

    /// Restore both cameras for `document` (position and fov only). Returns
    /// whether anything was restored.
    pub fn restore_camera_state(&mut self, store: &dyn CameraStateStore, document: &str) -> bool {
        let perspective = camera::restore_camera(store, document, &mut self.perspective);
        let orthographic = camera::restore_camera(store, document, &mut self.orthographic);
        perspective || orthographic
    }
}

fn carry_to_orthographic(perspective: &Camera, orthographic: &mut Camera, focus: &Vec3) {
    let distance = (perspective.position() - focus).norm();
    let depth = -perspective.view_matrix().transform_point(&Point3::from(*focus)).z;

    orthographic.set_rotation(utils::snap_to_axes(&perspective.rotation()));
    orthographic.set_position(focus + orthographic.local_axis(2) * distance);
    if depth > 0.0 {
        let half_height = depth * utils::deg_to_rad(perspective.fov() / 2.0).tan();
        orthographic.set_fov(2.0 * half_height * perspective.aspect());
    } else {
        log::debug!("Focus point behind the perspective camera, keeping field size");
    }
}

fn carry_to_perspective(orthographic: &Camera, perspective: &mut Camera, focus: &Vec3) {
    let slope = utils::deg_to_rad(perspective.fov() / 2.0).tan() * perspective.aspect();
    if slope <= f64::EPSILON {
        log::warn!("Degenerate perspective frustum, keeping camera position");
        return;
    }
    let distance = orthographic.fov() / 2.0 / slope;
    perspective.set_position(focus + perspective.local_axis(2) * distance);
}
