// Atlas loading and the shared atlas store.

pub mod image_atlas;
pub mod store;

pub use image_atlas::{ImageAtlas, Tile};
pub use store::{AtlasLayout, AtlasSet, AtlasStore};
