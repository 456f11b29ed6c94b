//! Style selection for a toggle.
//!
//! A style is just a tile index into one of the two atlases. Requests are
//! clamped into range rather than rejected.

use crate::atlas::AtlasSet;

/// Which atlas a style index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleKind {
    /// The track, drawn first over the whole control.
    Body,
    /// The knob, drawn over the body and shifted by the knob offset.
    Switch,
}

impl StyleKind {
    pub fn tile_count(&self, atlases: &AtlasSet) -> usize {
        match self {
            StyleKind::Body => atlases.body.tile_count(),
            StyleKind::Switch => atlases.switch.tile_count(),
        }
    }
}

/// Clamp a requested style into `[0, tile_count - 1]`. An empty atlas yields 0.
pub fn clamp_style(requested: i32, tile_count: usize) -> usize {
    if tile_count == 0 || requested <= 0 {
        return 0;
    }
    (requested as usize).min(tile_count - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_style() {
        assert_eq!(clamp_style(-1, 6), 0);
        assert_eq!(clamp_style(i32::MIN, 6), 0);
        assert_eq!(clamp_style(0, 6), 0);
        assert_eq!(clamp_style(3, 6), 3);
        assert_eq!(clamp_style(5, 6), 5);
        assert_eq!(clamp_style(999, 6), 5);
        assert_eq!(clamp_style(999, 10), 9);
        assert_eq!(clamp_style(4, 0), 0);
    }
}
