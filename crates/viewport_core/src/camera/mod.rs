//! Camera model, interactive controller and per-document camera state

pub mod controller;
pub mod persistence;
pub mod projection;

pub use controller::{CameraChord, CameraController, ControlMode, ControllerState, Modifiers, PointerButton};
pub use persistence::{
    restore_camera, save_camera, CameraSnapshot, CameraStateKey, CameraStateStore, MemoryCameraStore,
    PersistError, RonCameraStore,
};
pub use projection::{Camera, ProjectionError, ProjectionKind, Viewport, DEGENERATE_W_EPSILON};
