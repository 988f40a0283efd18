use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::PixelRect;
use crate::error::{GraphError, GraphResult};

/// Surface shared between the compositor and an in-flight render task.
pub type SharedSurface = Arc<Mutex<PixelSurface>>;

/// How source pixels combine with destination pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeOp {
    /// Source-over alpha blending.
    #[default]
    Over,
    /// Source replaces destination.
    Source,
}

/// In-memory premultiplied ARGB32 surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl PixelSurface {
    /// Allocates a transparent surface.
    pub fn new(width: u32, height: u32) -> GraphResult<Self> {
        if width == 0 || height == 0 {
            return Err(GraphError::InvalidViewport {
                width: i64::from(width),
                height: i64::from(height),
            });
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| GraphError::InvalidData("surface size overflows".to_owned()))?;
        Ok(Self {
            width,
            height,
            pixels: vec![0; len],
        })
    }

    #[must_use]
    pub fn into_shared(self) -> SharedSurface {
        Arc::new(Mutex::new(self))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn bounds(&self) -> PixelRect {
        PixelRect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// Raw row-major pixels.
    #[must_use]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if !self.bounds().contains(x, y) {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        self.index(x, y).map(|index| self.pixels[index])
    }

    /// Pixels of column `x`, top to bottom.
    #[must_use]
    pub fn column(&self, x: i32) -> Vec<u32> {
        (0..self.height as i32)
            .filter_map(|y| self.pixel(x, y))
            .collect()
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, argb: u32, op: CompositeOp) {
        if let Some(index) = self.index(x, y) {
            self.pixels[index] = match op {
                CompositeOp::Source => argb,
                CompositeOp::Over => blend_over(argb, self.pixels[index]),
            };
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Fills `rect ∩ clip ∩ bounds`.
    pub fn fill_rect(&mut self, rect: PixelRect, clip: PixelRect, argb: u32, op: CompositeOp) {
        let area = rect.intersect(clip).intersect(self.bounds());
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                self.set_pixel(x, y, argb, op);
            }
        }
    }

    /// Resets `rect` to transparent.
    pub fn clear_rect(&mut self, rect: PixelRect) {
        self.fill_rect(rect, self.bounds(), 0, CompositeOp::Source);
    }

    /// Paints `source` with its top-left corner at `(origin_x, origin_y)`,
    /// restricted to `rect`. Destination pixels without a source pixel are
    /// left untouched.
    pub fn composite(
        &mut self,
        source: &PixelSurface,
        origin_x: i32,
        origin_y: i32,
        rect: PixelRect,
        op: CompositeOp,
    ) {
        let area = rect
            .intersect(self.bounds())
            .intersect(source.bounds().translate(origin_x, origin_y));
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                if let Some(argb) = source.pixel(x - origin_x, y - origin_y) {
                    self.set_pixel(x, y, argb, op);
                }
            }
        }
    }

    /// Integer Bresenham line, endpoints inclusive, clipped to `clip`.
    /// `dash` alternates drawn and skipped runs of pixels.
    pub fn draw_line(
        &mut self,
        from: (i32, i32),
        to: (i32, i32),
        clip: PixelRect,
        argb: u32,
        dash: Option<(u32, u32)>,
    ) {
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let step_x = if x < to.0 { 1 } else { -1 };
        let step_y = if y < to.1 { 1 } else { -1 };
        let mut error = dx + dy;
        let mut step = 0u32;

        loop {
            let visible = match dash {
                Some((on, off)) if on + off > 0 => step % (on + off) < on,
                _ => true,
            };
            if visible && clip.contains(x, y) {
                self.set_pixel(x, y, argb, CompositeOp::Over);
            }
            if x == to.0 && y == to.1 {
                break;
            }
            let doubled = 2 * error;
            if doubled >= dy {
                error += dy;
                x += step_x;
            }
            if doubled <= dx {
                error += dx;
                y += step_y;
            }
            step = step.wrapping_add(1);
        }
    }
}

fn blend_over(source: u32, destination: u32) -> u32 {
    let source_alpha = source >> 24;
    if source_alpha == 0xFF {
        return source;
    }
    if source_alpha == 0 {
        return destination;
    }
    let inverse = 255 - source_alpha;
    let channel = |shift: u32| -> u32 {
        let s = (source >> shift) & 0xFF;
        let d = (destination >> shift) & 0xFF;
        (s + (d * inverse + 127) / 255).min(255) << shift
    };
    channel(24) | channel(16) | channel(8) | channel(0)
}

#[cfg(test)]
mod tests {
    use super::{CompositeOp, PixelSurface, blend_over};
    use crate::core::PixelRect;

    const RED: u32 = 0xFFFF_0000;

    #[test]
    fn zero_sized_surface_is_rejected() {
        assert!(PixelSurface::new(0, 4).is_err());
    }

    #[test]
    fn composite_translates_source_and_respects_rect() {
        let mut source = PixelSurface::new(2, 1).expect("source");
        source.set_pixel(0, 0, RED, CompositeOp::Source);
        source.set_pixel(1, 0, 0xFF00_FF00, CompositeOp::Source);

        let mut target = PixelSurface::new(6, 1).expect("target");
        target.composite(&source, 3, 0, PixelRect::new(0, 0, 4, 1), CompositeOp::Source);

        assert_eq!(target.pixel(3, 0), Some(RED));
        assert_eq!(target.pixel(4, 0), Some(0));
    }

    #[test]
    fn horizontal_dashes_skip_runs() {
        let mut surface = PixelSurface::new(6, 1).expect("surface");
        let clip = surface.bounds();
        surface.draw_line((0, 0), (5, 0), clip, RED, Some((1, 2)));
        let drawn = (0..6)
            .map(|x| surface.pixel(x, 0) == Some(RED))
            .collect::<Vec<_>>();
        assert_eq!(drawn, vec![true, false, false, true, false, false]);
    }

    #[test]
    fn over_blending_keeps_opaque_source_and_skips_transparent() {
        assert_eq!(blend_over(RED, 0xFF00_00FF), RED);
        assert_eq!(blend_over(0, 0xFF00_00FF), 0xFF00_00FF);
    }
}
