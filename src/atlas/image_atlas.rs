// Sprite-sheet atlas: one decoded image split into a fixed grid of tiles.
//
// Pixels are stored premultiplied so the compositor can blend source-over
// without touching the alpha channel again.

use std::path::Path;

#[allow(unused_imports)]
use log::{debug, info, warn};

use crate::error::AtlasError;
use crate::render::Rect;

const BYTES_PER_PIXEL: usize = 4;

/// A grid cell of an atlas, in atlas pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Tile {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x as i32, self.y as i32, self.width as i32, self.height as i32)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageAtlas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    tiles: Vec<Tile>,
}

impl ImageAtlas {
    /// Decode `path` and split it into `columns` x `rows` tiles.
    pub fn load(path: &Path, columns: u32, rows: u32) -> Result<Self, AtlasError> {
        let img = image::open(path).map_err(|source| AtlasError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        debug!("Decoded atlas {:?} ({} x {})", path, width, height);

        Self::from_rgba(width, height, rgba.into_raw(), columns, rows)
    }

    /// Build an atlas from straight-alpha RGBA bytes. The buffer is premultiplied in place.
    pub fn from_rgba(
        width: u32,
        height: u32,
        mut pixels: Vec<u8>,
        columns: u32,
        rows: u32,
    ) -> Result<Self, AtlasError> {
        if columns == 0 || rows == 0 {
            return Err(AtlasError::InvalidGrid { columns, rows });
        }

        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(AtlasError::BufferSize {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }

        for pixel in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            premultiply(pixel);
        }

        let tiles = grid_tiles(width, height, columns, rows);
        if width % columns != 0 || height % rows != 0 {
            // Remainder columns/rows are not covered by any tile.
            warn!(
                "Atlas size {}x{} is not divisible by grid {}x{}, dropping remainder pixels",
                width, height, columns, rows
            );
        }

        Ok(Self {
            width,
            height,
            pixels,
            tiles,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn tile(&self, index: usize) -> Option<&Tile> {
        self.tiles.get(index)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Premultiplied RGBA at atlas coordinates. Caller guarantees bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Tight bounds of the non-transparent pixels of a tile, in atlas coordinates.
    ///
    /// A tile with no visible pixel yields the whole tile rectangle. Returns
    /// `None` for an out-of-range index.
    pub fn visible_bounds(&self, index: usize) -> Option<Rect> {
        let tile = self.tiles.get(index)?;

        let mut min_x = tile.width;
        let mut min_y = tile.height;
        let mut max_x = 0;
        let mut max_y = 0;
        let mut has_visible_pixel = false;

        for y in 0..tile.height {
            for x in 0..tile.width {
                if self.pixel(tile.x + x, tile.y + y)[3] > 0 {
                    has_visible_pixel = true;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        if !has_visible_pixel {
            return Some(tile.rect());
        }

        Some(Rect {
            left: (tile.x + min_x) as i32,
            top: (tile.y + min_y) as i32,
            right: (tile.x + max_x + 1) as i32,
            bottom: (tile.y + max_y + 1) as i32,
        })
    }
}

/// Scale RGB by alpha/255, leaving alpha as is.
#[inline]
pub fn premultiply(pixel: &mut [u8]) {
    let alpha = pixel[3] as u32;
    for channel in &mut pixel[..3] {
        *channel = (*channel as u32 * alpha / 255) as u8;
    }
}

/// Row-major grid: tile index = row * columns + col.
pub fn grid_tiles(width: u32, height: u32, columns: u32, rows: u32) -> Vec<Tile> {
    if columns == 0 || rows == 0 {
        return Vec::new();
    }

    let tile_width = width / columns;
    let tile_height = height / rows;

    let mut tiles = Vec::with_capacity((columns * rows) as usize);
    for row in 0..rows {
        for col in 0..columns {
            tiles.push(Tile {
                x: col * tile_width,
                y: row * tile_height,
                width: tile_width,
                height: tile_height,
            });
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transparent(width: u32, height: u32) -> Vec<u8> {
        vec![0u8; (width * height * 4) as usize]
    }

    fn set_pixel(buf: &mut [u8], width: u32, x: u32, y: u32, rgba: [u8; 4]) {
        let i = ((y * width + x) * 4) as usize;
        buf[i..i + 4].copy_from_slice(&rgba);
    }

    #[test]
    fn test_grid_partitions_image() {
        let tiles = grid_tiles(50, 20, 5, 2);
        assert_eq!(tiles.len(), 10);

        for (index, tile) in tiles.iter().enumerate() {
            let row = index as u32 / 5;
            let col = index as u32 % 5;
            assert_eq!(tile.x, col * 10);
            assert_eq!(tile.y, row * 10);
            assert_eq!((tile.width, tile.height), (10, 10));
        }

        // No two tiles overlap
        for (i, a) in tiles.iter().enumerate() {
            for b in tiles.iter().skip(i + 1) {
                let overlap_x = a.x < b.x + b.width && b.x < a.x + a.width;
                let overlap_y = a.y < b.y + b.height && b.y < a.y + a.height;
                assert!(!(overlap_x && overlap_y), "{:?} overlaps {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_grid_drops_remainder() {
        let tiles = grid_tiles(32, 13, 3, 2);
        assert_eq!(tiles.len(), 6);
        assert_eq!(tiles[5], Tile { x: 20, y: 6, width: 10, height: 6 });
    }

    #[test]
    fn test_premultiply_scales_rgb_keeps_alpha() {
        let samples = [
            [255, 128, 7, 0],
            [255, 128, 7, 128],
            [255, 128, 7, 255],
            [10, 200, 99, 1],
        ];
        for original in samples {
            let mut pixel = original;
            premultiply(&mut pixel);
            assert_eq!(pixel[3], original[3]);
            for c in 0..3 {
                assert!(pixel[c] <= original[c]);
            }
        }

        let mut opaque = [12, 34, 56, 255];
        premultiply(&mut opaque);
        assert_eq!(opaque, [12, 34, 56, 255]);

        let mut clear = [12, 34, 56, 0];
        premultiply(&mut clear);
        assert_eq!(clear, [0, 0, 0, 0]);
    }

    #[test]
    fn test_from_rgba_rejects_bad_input() {
        assert!(matches!(
            ImageAtlas::from_rgba(4, 4, transparent(4, 4), 0, 2),
            Err(AtlasError::InvalidGrid { columns: 0, rows: 2 })
        ));
        assert!(matches!(
            ImageAtlas::from_rgba(4, 4, vec![0; 10], 2, 2),
            Err(AtlasError::BufferSize { expected: 64, actual: 10, .. })
        ));
    }

    #[test]
    fn test_visible_bounds_crops_to_opaque_pixels() {
        let mut buf = transparent(8, 4);
        // Tile 1 covers x 4..8
        set_pixel(&mut buf, 8, 5, 1, [255, 0, 0, 255]);
        set_pixel(&mut buf, 8, 6, 2, [0, 255, 0, 10]);
        let atlas = ImageAtlas::from_rgba(8, 4, buf, 2, 1).unwrap();

        assert_eq!(
            atlas.visible_bounds(1),
            Some(Rect { left: 5, top: 1, right: 7, bottom: 3 })
        );
    }

    #[test]
    fn test_visible_bounds_transparent_tile_is_full_tile() {
        let atlas = ImageAtlas::from_rgba(8, 4, transparent(8, 4), 2, 1).unwrap();
        assert_eq!(atlas.visible_bounds(1), Some(Rect::new(4, 0, 4, 4)));
        assert_eq!(atlas.visible_bounds(2), None);
    }

    #[test]
    fn test_load_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atlas.png");

        let mut img = image::RgbaImage::new(30, 20);
        img.put_pixel(12, 3, image::Rgba([200, 100, 50, 128]));
        img.save(&path).unwrap();

        let atlas = ImageAtlas::load(&path, 3, 2).unwrap();
        assert_eq!((atlas.width(), atlas.height()), (30, 20));
        assert_eq!(atlas.tile_count(), 6);
        assert_eq!(atlas.pixel(12, 3), [100, 50, 25, 128]);
        assert_eq!(
            atlas.visible_bounds(1),
            Some(Rect { left: 12, top: 3, right: 13, bottom: 4 })
        );
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = ImageAtlas::load(&dir.path().join("nope.png"), 3, 2);
        assert!(matches!(result, Err(AtlasError::Decode { .. })));
    }
}
