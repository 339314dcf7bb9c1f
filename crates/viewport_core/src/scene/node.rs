//! Scene nodes: local transform, flags, bounds and tree links

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::aabb::Aabb;
use crate::foundation::math::{utils, Mat4, Quat, Vec3};
use crate::render::Pass;

slotmap::new_key_type! {
    /// Handle to a node in a [`super::SceneGraph`]
    pub struct NodeId;
}

bitflags! {
    /// Per-node behavior flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct NodeFlags: u32 {
        /// Picking resolves to this node (or its nearest such ancestor)
        const TRANSFORMABLE = 1 << 0;
        /// Scale handles are offered
        const SCALABLE = 1 << 1;
        /// Ignore the parent's rotation (its scale still applies, uniformly)
        const NO_INHERIT_ROTATION = 1 << 2;
        /// Ignore the parent's scale
        const NO_INHERIT_SCALE = 1 << 3;
        /// Keep the Z basis of this node and its descendants unit length
        const NO_SCALE_ALONG_Z = 1 << 4;
        /// Not editable in the viewport
        const LOCKED = 1 << 5;
        /// Drawn and pickable; clearing hides the whole subtree
        const VISIBLE = 1 << 6;
    }
}

/// What a node represents, which decides the passes it draws in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Grouping node without geometry of its own
    Collection,
    /// Game object instance
    Instance,
    /// Opaque mesh
    Model,
    /// Blended quad
    Sprite,
    /// Collision shape debug geometry
    Collision,
    /// Light gizmo
    Light,
    /// Camera gizmo
    Camera,
    /// Reference grid
    Grid,
    /// Move / rotate / scale handle
    Manipulator,
    /// Screen-space text
    Label,
}

impl NodeKind {
    /// Passes nodes of this kind draw in
    pub fn passes(self) -> &'static [Pass] {
        match self {
            Self::Collection | Self::Instance => &[],
            Self::Model => &[Pass::Opaque, Pass::Outline, Pass::Selection],
            Self::Sprite | Self::Collision => &[Pass::Transparent, Pass::Outline, Pass::Selection],
            Self::Light | Self::Camera => &[Pass::Icon, Pass::IconOutline, Pass::IconSelection],
            Self::Grid => &[Pass::Transparent],
            Self::Manipulator => &[Pass::Manipulator, Pass::Selection],
            Self::Label => &[Pass::Overlay],
        }
    }

    /// Whether nodes of this kind draw in `pass`
    pub fn renders_in(self, pass: Pass) -> bool {
        self.passes().contains(&pass)
    }

    /// Manipulators sort after regular geometry within a pass
    pub fn is_manipulator(self) -> bool {
        self == Self::Manipulator
    }

    /// Drawn as a fixed-size screen-space icon rather than world geometry
    pub fn is_icon(self) -> bool {
        matches!(self, Self::Light | Self::Camera)
    }

    /// Flags a freshly created node of this kind starts with
    pub fn default_flags(self) -> NodeFlags {
        match self {
            Self::Instance => NodeFlags::VISIBLE | NodeFlags::TRANSFORMABLE | NodeFlags::SCALABLE,
            Self::Light | Self::Camera => NodeFlags::VISIBLE | NodeFlags::TRANSFORMABLE,
            _ => NodeFlags::VISIBLE,
        }
    }
}

/// A node of the scene tree
///
/// Tree links and bound caches are owned by the [`super::SceneGraph`]; all
/// mutation goes through it so dirty bits stay correct.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub(crate) kind: NodeKind,
    pub(crate) name: String,
    pub(crate) translation: Vec3,
    pub(crate) rotation: Quat,
    pub(crate) euler: Vec3,
    pub(crate) scale: f64,
    pub(crate) flags: NodeFlags,
    pub(crate) aabb: Aabb,
    pub(crate) world_aabb: Aabb,
    pub(crate) world_aabb_dirty: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) child_index: Option<usize>,
    pub(crate) override_index: Option<i32>,
}

impl SceneNode {
    pub(crate) fn new(kind: NodeKind, name: String) -> Self {
        Self {
            kind,
            name,
            translation: Vec3::zeros(),
            rotation: Quat::identity(),
            euler: Vec3::zeros(),
            scale: 1.0,
            flags: kind.default_flags(),
            aabb: Aabb::identity(),
            world_aabb: Aabb::identity(),
            world_aabb_dirty: true,
            parent: None,
            children: Vec::new(),
            child_index: None,
            override_index: None,
        }
    }

    /// Node kind
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Translation relative to the parent
    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    /// Rotation relative to the parent
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Rotation as YZX Euler angles in degrees, as last set or derived
    pub fn euler(&self) -> Vec3 {
        self.euler
    }

    /// Uniform scale
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Behavior flags
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// Whether all of `flags` are set
    pub fn has_flags(&self, flags: NodeFlags) -> bool {
        self.flags.contains(flags)
    }

    /// Whether the node is drawn
    pub fn is_visible(&self) -> bool {
        self.flags.contains(NodeFlags::VISIBLE)
    }

    /// Not locked
    pub fn is_editable(&self) -> bool {
        !self.flags.contains(NodeFlags::LOCKED)
    }

    /// Whether picking may resolve to this node
    pub fn is_transformable(&self) -> bool {
        self.flags.contains(NodeFlags::TRANSFORMABLE)
    }

    /// Whether the node accepts a scale other than one from editing tools
    pub fn is_scalable(&self) -> bool {
        self.flags.contains(NodeFlags::SCALABLE)
    }

    /// Bounds in local space (identity when the node has no geometry)
    pub fn local_aabb(&self) -> Aabb {
        self.aabb
    }

    /// Parent, `None` for the root and detached nodes
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in draw order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Last position this node held in its parent's child list
    pub fn child_index(&self) -> Option<usize> {
        self.child_index
    }

    /// Explicit draw order replacing the depth term of the sort key
    pub fn override_index(&self) -> Option<i32> {
        self.override_index
    }

    /// Local transform `T * R * S`
    pub fn local_transform(&self) -> Mat4 {
        Mat4::new_translation(&self.translation)
            * self.rotation.to_homogeneous()
            * Mat4::new_scaling(self.scale)
    }

    pub(crate) fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.euler = utils::quat_to_euler(&rotation);
    }

    pub(crate) fn set_euler(&mut self, euler: Vec3) {
        self.euler = euler;
        self.rotation = utils::euler_to_quat(&euler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kind_pass_table() {
        assert!(NodeKind::Collection.passes().is_empty());
        assert!(NodeKind::Model.renders_in(Pass::Opaque));
        assert!(!NodeKind::Model.renders_in(Pass::Transparent));
        assert!(NodeKind::Sprite.renders_in(Pass::Transparent));
        assert!(NodeKind::Light.renders_in(Pass::IconSelection));
        assert!(NodeKind::Manipulator.is_manipulator());
        assert!(!NodeKind::Model.is_manipulator());
        assert!(NodeKind::Camera.is_icon());
        assert!(!NodeKind::Sprite.is_icon());
    }

    #[test]
    fn test_default_flags() {
        assert!(NodeKind::Instance.default_flags().contains(NodeFlags::TRANSFORMABLE));
        assert!(!NodeKind::Model.default_flags().contains(NodeFlags::TRANSFORMABLE));
        assert!(NodeKind::Model.default_flags().contains(NodeFlags::VISIBLE));

        let light = SceneNode::new(NodeKind::Light, "sun".to_string());
        assert!(light.is_transformable());
        assert!(!light.is_scalable());
        assert!(light.is_editable());
    }

    #[test]
    fn test_local_transform_order() {
        let mut node = SceneNode::new(NodeKind::Instance, "n".to_string());
        node.translation = Vec3::new(1.0, 0.0, 0.0);
        node.set_euler(Vec3::new(0.0, 90.0, 0.0));
        node.scale = 2.0;

        // Scale, then rotate +X onto -Z, then translate
        let p = node.local_transform().transform_point(&crate::foundation::math::Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.coords, Vec3::new(1.0, 0.0, -2.0), epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_updates_euler_mirror() {
        let mut node = SceneNode::new(NodeKind::Model, "m".to_string());
        node.set_rotation(Quat::from_axis_angle(&Vec3::x_axis(), 30f64.to_radians()));
        assert_relative_eq!(node.euler(), Vec3::new(30.0, 0.0, 0.0), epsilon = 1e-6);
    }
}
