//! Render passes
//!
//! Passes run in ordinal order; the ordinal is also the most significant part
//! of every sort key, so the order of the variants below is load-bearing.

/// Render / selection pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pass {
    /// Screen-filling backdrop, drawn with an identity model transform
    Background,
    /// Depth-tested opaque geometry
    Opaque,
    /// Blended geometry
    Transparent,
    /// Outlines around icon gizmos
    IconOutline,
    /// Outlines around selected geometry
    Outline,
    /// Transform handles
    Manipulator,
    /// Screen-space text and HUD
    Overlay,
    /// Geometry picking
    Selection,
    /// Icon gizmos
    Icon,
    /// Icon picking
    IconSelection,
}

impl Pass {
    /// Every pass in execution order
    pub const ALL: [Self; 10] = [
        Self::Background,
        Self::Opaque,
        Self::Transparent,
        Self::IconOutline,
        Self::Outline,
        Self::Manipulator,
        Self::Overlay,
        Self::Selection,
        Self::Icon,
        Self::IconSelection,
    ];

    /// Passes drawn for a visible frame
    pub const RENDER_PASSES: [Self; 8] = [
        Self::Background,
        Self::Opaque,
        Self::Transparent,
        Self::IconOutline,
        Self::Outline,
        Self::Manipulator,
        Self::Overlay,
        Self::Icon,
    ];

    /// Passes drawn while picking
    pub const SELECTION_PASSES: [Self; 2] = [Self::Selection, Self::IconSelection];

    /// Position in the pass order
    pub fn ordinal(self) -> u64 {
        self as u64
    }

    /// Picking pass
    pub fn is_selection(self) -> bool {
        matches!(self, Self::Selection | Self::IconSelection)
    }

    /// Drawn only for selected nodes unless outlines are forced on
    pub fn is_outline(self) -> bool {
        matches!(self, Self::Outline | Self::IconOutline)
    }

    /// Whether the node's world transform is applied before drawing.
    /// Background and overlay work in screen space; icons place themselves
    /// from the projected node position.
    pub fn transforms_model(self) -> bool {
        !matches!(self, Self::Background | Self::Overlay | Self::Icon | Self::IconOutline | Self::IconSelection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_follow_declaration() {
        for (i, pass) in Pass::ALL.iter().enumerate() {
            assert_eq!(pass.ordinal(), i as u64);
        }
        assert!(Pass::Background < Pass::Opaque);
        assert!(Pass::Overlay < Pass::Icon);
    }

    #[test]
    fn test_pass_groups() {
        assert!(Pass::SELECTION_PASSES.iter().all(|p| p.is_selection()));
        assert!(!Pass::RENDER_PASSES.iter().any(|p| p.is_selection()));
        assert!(Pass::IconOutline.is_outline());
        assert!(Pass::Opaque.transforms_model());
        assert!(!Pass::Background.transforms_model());
        assert!(!Pass::IconSelection.transforms_model());
    }
}
