// Shared, load-once atlas resource.
//
// The store is created by the application and handed to every host by `Arc`.
// Nothing is decoded until the first control needs the atlases; after a
// successful load the set is immutable for the life of the store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;

#[allow(unused_imports)]
use log::{debug, info, warn, error};

use crate::atlas::image_atlas::ImageAtlas;
use crate::config;
use crate::error::AtlasError;

/// Where one atlas lives and how it is gridded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasLayout {
    pub path: PathBuf,
    pub columns: u32,
    pub rows: u32,
}

impl AtlasLayout {
    pub fn new(path: impl Into<PathBuf>, columns: u32, rows: u32) -> Self {
        Self {
            path: path.into(),
            columns,
            rows,
        }
    }

    pub fn load(&self) -> Result<ImageAtlas, AtlasError> {
        ImageAtlas::load(&self.path, self.columns, self.rows)
    }
}

/// The two atlases a toggle is drawn from.
#[derive(Debug)]
pub struct AtlasSet {
    pub body: ImageAtlas,
    pub switch: ImageAtlas,
}

impl AtlasSet {
    /// Knob travel distance: the width of switch tile 0.
    pub fn travel_distance(&self) -> i32 {
        self.switch.tile(0).map_or(0, |tile| tile.width as i32)
    }
}

pub struct AtlasStore {
    body: AtlasLayout,
    switch: AtlasLayout,
    cell: OnceCell<Arc<AtlasSet>>,
}

impl AtlasStore {
    pub fn new(body: AtlasLayout, switch: AtlasLayout) -> Self {
        Self {
            body,
            switch,
            cell: OnceCell::new(),
        }
    }

    /// A store that is already populated. Used when the atlases come from memory.
    pub fn preloaded(set: AtlasSet) -> Self {
        let store = Self::new(
            AtlasLayout::new(PathBuf::new(), 0, 0),
            AtlasLayout::new(PathBuf::new(), 0, 0),
        );
        // Fresh cell, cannot already be set
        let _ = store.cell.set(Arc::new(set));
        store
    }

    /// Standard layout under `asset_dir`: a 5x2 body sheet and a 3x2 switch sheet.
    pub fn from_asset_dir(asset_dir: &Path) -> Self {
        Self::new(
            AtlasLayout::new(
                asset_dir.join(config::DEFAULT_BODY_ATLAS_FILE),
                config::DEFAULT_BODY_COLUMNS,
                config::DEFAULT_BODY_ROWS,
            ),
            AtlasLayout::new(
                asset_dir.join(config::DEFAULT_SWITCH_ATLAS_FILE),
                config::DEFAULT_SWITCH_COLUMNS,
                config::DEFAULT_SWITCH_ROWS,
            ),
        )
    }

    /// Load both atlases on first use.
    ///
    /// Concurrent callers block on the one in-flight load. A failed load leaves
    /// the store empty, so the next call tries again.
    pub fn ensure_loaded(&self) -> Result<Arc<AtlasSet>, AtlasError> {
        self.cell
            .get_or_try_init(|| {
                info!("Loading toggle atlases from {:?} and {:?}", self.body.path, self.switch.path);
                let body = self.body.load().map_err(|e| {
                    error!("Body atlas unavailable: {}", e);
                    e
                })?;
                let switch = self.switch.load().map_err(|e| {
                    error!("Switch atlas unavailable: {}", e);
                    e
                })?;
                debug!(
                    "Atlases loaded: {} body tiles, {} switch tiles",
                    body.tile_count(),
                    switch.tile_count()
                );
                Ok(Arc::new(AtlasSet { body, switch }))
            })
            .map(Arc::clone)
    }

    /// The atlases if they have been loaded, without attempting a load.
    pub fn get(&self) -> Option<Arc<AtlasSet>> {
        self.cell.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}
