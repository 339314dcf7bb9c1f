//! Draw ordering and picking
//!
//! The viewport core does not talk to a graphics API. It produces sorted
//! [`RenderList`]s and hands them to a [`DrawBackend`]; picking goes through a
//! [`SelectBackend`] in the same way.

pub mod pass;
pub mod picking;
pub mod render_list;
pub mod sort_key;

pub use pass::Pass;
pub use picking::{BoundsSelectBackend, HitRecord, PickHit, PickRect, Picker, SelectBackend, SelectQuery};
pub use render_list::{DrawBackend, RenderEntry, RenderFilter, RenderList};
