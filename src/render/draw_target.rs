use crate::core::PixelRect;
use crate::render::{Color, CompositeOp, PixelSurface};

/// Drawable view into a [`PixelSurface`].
///
/// Callers paint in local coordinates starting at `(0, 0)`; the target
/// translates them by its origin and drops everything outside its clip.
#[derive(Debug)]
pub struct DrawTarget<'a> {
    surface: &'a mut PixelSurface,
    origin_x: i32,
    origin_y: i32,
    clip: PixelRect,
}

impl<'a> DrawTarget<'a> {
    /// View covering the whole surface.
    pub fn full(surface: &'a mut PixelSurface) -> Self {
        let clip = surface.bounds();
        Self {
            surface,
            origin_x: 0,
            origin_y: 0,
            clip,
        }
    }

    /// View of `region` (surface coordinates), translated so its top-left is
    /// local `(0, 0)`.
    pub fn region(surface: &'a mut PixelSurface, region: PixelRect) -> Self {
        let clip = region.intersect(surface.bounds());
        Self {
            surface,
            origin_x: region.x,
            origin_y: region.y,
            clip,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.clip.width.max(0) as u32
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.clip.height.max(0) as u32
    }

    /// Clip rectangle in surface coordinates.
    #[must_use]
    pub fn clip(&self) -> PixelRect {
        self.clip
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clip.is_empty()
    }

    fn to_surface(&self, rect: PixelRect) -> PixelRect {
        rect.translate(self.origin_x, self.origin_y)
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        let (x, y) = (x + self.origin_x, y + self.origin_y);
        if self.clip.contains(x, y) {
            self.surface.set_pixel(x, y, color.to_argb32(), CompositeOp::Over);
        }
    }

    pub fn fill_rect(&mut self, rect: PixelRect, color: Color) {
        let rect = self.to_surface(rect);
        self.surface
            .fill_rect(rect, self.clip, color.to_argb32(), CompositeOp::Over);
    }

    /// Fills the whole target.
    pub fn fill(&mut self, color: Color) {
        self.surface
            .fill_rect(self.clip, self.clip, color.to_argb32(), CompositeOp::Over);
    }

    pub fn clear(&mut self) {
        self.surface.clear_rect(self.clip);
    }

    pub fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), color: Color, dash: Option<(u32, u32)>) {
        self.surface.draw_line(
            (from.0 + self.origin_x, from.1 + self.origin_y),
            (to.0 + self.origin_x, to.1 + self.origin_y),
            self.clip,
            color.to_argb32(),
            dash,
        );
    }

    /// Draws a `thickness`-pixel line by stacking offset Bresenham passes.
    pub fn draw_thick_line(&mut self, from: (i32, i32), to: (i32, i32), color: Color, thickness: u32) {
        let thickness = thickness.max(1) as i32;
        let steep = (to.1 - from.1).abs() > (to.0 - from.0).abs();
        let first = -(thickness - 1) / 2;
        for shift in first..first + thickness {
            let (dx, dy) = if steep { (shift, 0) } else { (0, shift) };
            self.draw_line(
                (from.0 + dx, from.1 + dy),
                (to.0 + dx, to.1 + dy),
                color,
                None,
            );
        }
    }

    /// Composites `source` with its top-left at local `(x, y)`.
    pub fn composite(&mut self, source: &PixelSurface, x: i32, y: i32, op: CompositeOp) {
        self.surface
            .composite(source, x + self.origin_x, y + self.origin_y, self.clip, op);
    }
}
