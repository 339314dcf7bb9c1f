//! # Viewport Core
//!
//! Camera, scene graph, draw ordering and picking for a scene editor viewport.
//!
//! ## Features
//!
//! - **Camera**: perspective and orthographic projection with exact
//!   world <-> window conversion
//! - **Camera Controller**: orbit, track and dolly from pointer drags, plus
//!   frame-selection
//! - **Scene Graph**: hierarchical transforms with inheritance flags and
//!   lazily recomputed world bounds
//! - **Render Ordering**: 64-bit sort keys (pass, manipulator, depth)
//! - **Picking**: tagged selection passes resolved to selectable nodes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use viewport_core::prelude::*;
//!
//! fn main() -> Result<(), ViewError> {
//!     let mut scene = SceneGraph::new();
//!     let ship = scene.spawn(scene.root(), NodeKind::Instance, "ship")?;
//!     let hull = scene.spawn(ship, NodeKind::Model, "hull")?;
//!     scene.set_aabb(hull, Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0)))?;
//!
//!     let mut view = SceneView::new(&ViewportConfig::default())?;
//!     view.resize(800, 600, &mut scene)?;
//!     view.frame_selection(&mut scene)?;
//!
//!     let picked = view.pick(&scene, 400, 300, &mut BoundsSelectBackend::new())?;
//!     assert_eq!(picked, Some(ship));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod camera;
pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

mod view;

pub use view::{SceneView, ViewError};

/// Common imports for viewport users
pub mod prelude {
    pub use crate::{
        camera::{
            Camera, CameraController, CameraStateStore, ControlMode, ControllerState, MemoryCameraStore, Modifiers,
            PointerButton, ProjectionError, ProjectionKind, RonCameraStore,
        },
        config::{Config, ConfigError, ViewportConfig},
        foundation::math::{Mat4, Quat, Vec3},
        render::{BoundsSelectBackend, DrawBackend, Pass, RenderEntry, RenderList, SelectBackend},
        scene::{Aabb, NodeFlags, NodeId, NodeKind, SceneError, SceneGraph},
        SceneView, ViewError,
    };
}
