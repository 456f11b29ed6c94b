// Software compositing of atlas tiles onto a premultiplied RGBA surface.

#[allow(unused_imports)]
use log::{debug, trace};

use crate::atlas::ImageAtlas;

/// Edge-based rectangle; `right` and `bottom` are exclusive. Edges saturate at the i32 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            left: x,
            top: y,
            right: x.saturating_add(width),
            bottom: y.saturating_add(height),
        }
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            left: self.left.saturating_add(dx),
            top: self.top.saturating_add(dy),
            right: self.right.saturating_add(dx),
            bottom: self.bottom.saturating_add(dy),
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }
}

/// A premultiplied RGBA8 framebuffer.
#[derive(Debug, Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Wrap existing premultiplied RGBA bytes. `None` if the length does not match.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self { width, height, pixels })
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn clear(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.index(x, y);
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Source-over blend of a premultiplied pixel.
    #[inline]
    fn blend(&mut self, x: u32, y: u32, src: [u8; 4]) {
        let i = self.index(x, y);
        let inv = 255 - src[3] as u32;
        for c in 0..4 {
            let dst = self.pixels[i + c] as u32;
            self.pixels[i + c] = (src[c] as u32 + (dst * inv + 127) / 255).min(255) as u8;
        }
    }

    /// Composite another surface with its top-left corner at (`x`, `y`).
    pub fn draw_surface(&mut self, src: &Surface, x: i32, y: i32) {
        let dest = Rect::new(x, y, src.width as i32, src.height as i32);
        let clip = dest.intersect(&self.bounds());
        if clip.is_empty() {
            return;
        }

        for dy in clip.top..clip.bottom {
            for dx in clip.left..clip.right {
                let px = src.pixel((dx - x) as u32, (dy - y) as u32);
                if px[3] == 0 {
                    continue;
                }
                self.blend(dx as u32, dy as u32, px);
            }
        }
    }

    /// Copy into a straight-alpha RGBA frame of the same size (e.g. a window framebuffer).
    pub fn copy_to_frame(&self, frame: &mut [u8]) {
        for (dst, src) in frame.chunks_exact_mut(4).zip(self.pixels.chunks_exact(4)) {
            let a = src[3] as u32;
            if a == 0 {
                dst.copy_from_slice(&[0, 0, 0, 0]);
                continue;
            }
            for c in 0..3 {
                dst[c] = ((src[c] as u32 * 255 + a / 2) / a).min(255) as u8;
            }
            dst[3] = src[3];
        }
    }
}

/// Draw one atlas tile into `destination`, cropped to the tile's visible pixels.
///
/// The crop picks which source pixels are sampled; they are stretched to fill
/// the full destination rectangle. Out-of-range indices draw nothing.
pub fn draw_tile(surface: &mut Surface, destination: Rect, atlas: &ImageAtlas, tile_index: usize) {
    let crop = match atlas.visible_bounds(tile_index) {
        Some(crop) => crop,
        None => return,
    };

    if crop.is_empty() || destination.is_empty() {
        return;
    }

    let clip = destination.intersect(&surface.bounds());
    if clip.is_empty() {
        return;
    }

    let dest_w = destination.width() as i64;
    let dest_h = destination.height() as i64;
    let src_w = crop.width() as i64;
    let src_h = crop.height() as i64;
    trace!("draw_tile {} crop {:?} -> {:?}", tile_index, crop, destination);

    // Nearest-neighbour sampling at pixel centres
    for dy in clip.top..clip.bottom {
        let rel_y = (dy - destination.top) as i64;
        let sy = crop.top as i64 + ((2 * rel_y + 1) * src_h) / (2 * dest_h);
        for dx in clip.left..clip.right {
            let rel_x = (dx - destination.left) as i64;
            let sx = crop.left as i64 + ((2 * rel_x + 1) * src_w) / (2 * dest_w);
            let px = atlas.pixel(sx as u32, sy as u32);
            if px[3] == 0 {
                continue;
            }
            surface.blend(dx as u32, dy as u32, px);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 4x2 atlas, two 2x2 tiles. Tile 0 has a single opaque red pixel at (1, 1);
    // tile 1 is fully transparent.
    fn test_atlas() -> ImageAtlas {
        let mut buf = vec![0u8; 4 * 2 * 4];
        let i = (4 + 1) * 4;
        buf[i..i + 4].copy_from_slice(&[255, 0, 0, 255]);
        ImageAtlas::from_rgba(4, 2, buf, 2, 1).unwrap()
    }

    #[test]
    fn test_rect_helpers() {
        let r = Rect::new(2, 3, 10, 5);
        assert_eq!((r.width(), r.height()), (10, 5));
        assert_eq!(r.offset(4, 0), Rect { left: 6, top: 3, right: 16, bottom: 8 });
        assert!(r.contains(2, 3));
        assert!(!r.contains(12, 3));
        assert!(Rect::new(0, 0, 0, 4).is_empty());
    }

    #[test]
    fn test_rect_saturates_at_range_edges() {
        let far = Rect::new(i32::MAX - 10, i32::MIN + 5, 120, -50);
        assert_eq!(far.right, i32::MAX);
        assert_eq!(far.width(), 10);
        assert_eq!(far.bottom, i32::MIN);
        assert!(far.is_empty());

        let shifted = Rect::new(0, 0, 4, 4).offset(i32::MAX, 0);
        assert_eq!((shifted.left, shifted.right), (i32::MAX, i32::MAX));
        assert!(shifted.is_empty());

        assert_eq!(Rect::new(-10, 0, i32::MAX, 1).width(), i32::MAX);
    }

    #[test]
    fn test_cropped_tile_fills_destination() {
        let atlas = test_atlas();
        let mut surface = Surface::new(8, 8);

        draw_tile(&mut surface, Rect::new(2, 2, 4, 4), &atlas, 0);

        for y in 0..8 {
            for x in 0..8 {
                let inside = (2..6).contains(&x) && (2..6).contains(&y);
                let expected = if inside { [255, 0, 0, 255] } else { [0, 0, 0, 0] };
                assert_eq!(surface.pixel(x, y), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_out_of_range_tile_is_noop() {
        let atlas = test_atlas();
        let mut surface = Surface::new(4, 4);
        surface.clear([1, 2, 3, 255]);

        let bounds = surface.bounds();
        draw_tile(&mut surface, bounds, &atlas, 2);
        draw_tile(&mut surface, bounds, &atlas, usize::MAX);

        assert!(surface.as_bytes().chunks_exact(4).all(|px| px == [1, 2, 3, 255]));
    }

    #[test]
    fn test_transparent_tile_leaves_destination() {
        let atlas = test_atlas();
        let mut surface = Surface::new(4, 4);
        surface.clear([9, 9, 9, 255]);

        let bounds = surface.bounds();
        draw_tile(&mut surface, bounds, &atlas, 1);

        assert_eq!(surface.pixel(0, 0), [9, 9, 9, 255]);
    }

    #[test]
    fn test_source_over_blend() {
        let mut buf = vec![0u8; 4];
        buf.copy_from_slice(&[255, 255, 255, 128]);
        let atlas = ImageAtlas::from_rgba(1, 1, buf, 1, 1).unwrap();
        let mut surface = Surface::new(1, 1);
        surface.clear([0, 0, 200, 255]);

        let bounds = surface.bounds();
        draw_tile(&mut surface, bounds, &atlas, 0);

        // src premultiplied: 128 per channel; dst scaled by 127/255
        assert_eq!(surface.pixel(0, 0), [128, 128, 128 + 100, 255]);
    }

    #[test]
    fn test_destination_is_clipped_to_surface() {
        let atlas = test_atlas();
        let mut surface = Surface::new(4, 4);

        draw_tile(&mut surface, Rect::new(2, -2, 6, 6), &atlas, 0);

        assert_eq!(surface.pixel(3, 0), [255, 0, 0, 255]);
        assert_eq!(surface.pixel(1, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_draw_surface_offsets_and_clips() {
        let mut child = Surface::new(2, 2);
        child.clear([0, 255, 0, 255]);
        let mut frame = Surface::new(3, 3);

        frame.draw_surface(&child, 2, 2);

        assert_eq!(frame.pixel(2, 2), [0, 255, 0, 255]);
        assert_eq!(frame.pixel(1, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn test_copy_to_frame_unpremultiplies() {
        let mut surface = Surface::new(1, 1);
        surface.clear([64, 0, 128, 128]);
        let mut frame = vec![0u8; 4];

        surface.copy_to_frame(&mut frame);

        assert_eq!(frame, vec![128, 0, 255, 128]);
    }
}
