use tracing::{trace, warn};

use crate::core::PixelRect;
use crate::error::{GraphError, GraphResult};
use crate::render::{CompositeOp, DrawTarget, PixelSurface};

/// Circular buffer of pixel columns.
///
/// New content is written at `offset`, overwriting the oldest columns.
/// Drawing unrolls the buffer so the most recently written column lands on
/// the right edge of the destination.
#[derive(Debug, Clone)]
pub struct PixelRing {
    surface: Option<PixelSurface>,
    width: u32,
    height: u32,
    offset: u32,
}

impl PixelRing {
    /// Wraps `surface` as a ring `width` x `height` pixels.
    ///
    /// A ring without a surface can be constructed, but every push into it
    /// fails with [`GraphError::MissingSurface`].
    pub fn new(surface: Option<PixelSurface>, width: u32, height: u32) -> GraphResult<Self> {
        if width == 0 || height == 0 {
            return Err(GraphError::InvalidViewport {
                width: i64::from(width),
                height: i64::from(height),
            });
        }
        if let Some(surface) = &surface {
            if surface.width() < width || surface.height() < height {
                return Err(GraphError::InvalidData(format!(
                    "ring surface {}x{} is smaller than ring {width}x{height}",
                    surface.width(),
                    surface.height()
                )));
            }
        }
        Ok(Self {
            surface,
            width,
            height,
            offset: 0,
        })
    }

    /// Allocates a transparent backing surface of exactly the ring size.
    pub fn allocate(width: u32, height: u32) -> GraphResult<Self> {
        let surface = PixelSurface::new(width, height)?;
        Self::new(Some(surface), width, height)
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Next physical column to be written.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub fn surface(&self) -> Option<&PixelSurface> {
        self.surface.as_ref()
    }

    /// Reclaims the oldest `width` columns and returns a target for painting
    /// them at local x starting at 0.
    ///
    /// A push never crosses the wrap boundary: a request that would is
    /// clipped to the room left before it, and the caller pushes again for
    /// the remainder.
    pub fn push(&mut self, width: u32) -> GraphResult<DrawTarget<'_>> {
        if width == 0 {
            return Err(GraphError::InvalidData(
                "push width must be > 0".to_owned(),
            ));
        }
        if width >= self.width {
            warn!(requested = width, ring_width = self.width, "push wider than ring");
            return Err(GraphError::PushTooWide {
                requested: width,
                width: self.width,
            });
        }
        if self.surface.is_none() {
            warn!("cannot push to pixel ring, surface missing");
            return Err(GraphError::MissingSurface);
        }

        let room = self.width - self.offset;
        let width = if width > room {
            warn!(requested = width, room, "push crosses wrap boundary, clipping");
            room
        } else {
            width
        };

        let start = self.offset;
        self.offset = (self.offset + width) % self.width;
        trace!(start, width, offset = self.offset, "pixel ring push");
        self.write_at(start, width)
    }

    /// Clears columns `[x, x + width)` and returns a target for them, clipped
    /// at the wrap boundary. The write offset does not move.
    pub fn write_at(&mut self, x: u32, width: u32) -> GraphResult<DrawTarget<'_>> {
        let ring_height = self.height as i32;
        let x = x.min(self.width);
        let width = width.min(self.width - x);
        let surface = self.surface.as_mut().ok_or(GraphError::MissingSurface)?;
        let region = PixelRect::new(x as i32, 0, width as i32, ring_height);
        surface.clear_rect(region);
        Ok(DrawTarget::region(surface, region))
    }

    /// Moves the write offset forward by `columns`, wrapping.
    pub fn advance(&mut self, columns: u32) {
        self.offset = ((u64::from(self.offset) + u64::from(columns)) % u64::from(self.width)) as u32;
    }

    /// Clears every column and rewinds the offset.
    pub fn reset(&mut self) {
        self.offset = 0;
        if let Some(surface) = self.surface.as_mut() {
            surface.clear();
        }
    }

    /// Unrolls the ring onto `destination` at its origin.
    pub fn draw(&self, destination: &mut PixelSurface) -> GraphResult<()> {
        let clip = destination.bounds();
        self.draw_onto(destination, 0, 0, clip)
    }

    /// Unrolls the ring onto `destination` with the oldest column at `(x, y)`,
    /// restricted to `clip`.
    pub fn draw_onto(&self, destination: &mut PixelSurface, x: i32, y: i32, clip: PixelRect) -> GraphResult<()> {
        let surface = self.surface.as_ref().ok_or(GraphError::MissingSurface)?;
        let width = self.width as i32;
        let height = self.height as i32;
        let offset = self.offset as i32;

        // Physical [offset, width) holds the oldest columns.
        let leading = PixelRect::new(x, y, width - offset, height).intersect(clip);
        destination.composite(surface, x - offset, y, leading, CompositeOp::Over);

        // Physical [0, offset) holds the newest columns.
        let trailing = PixelRect::new(x + width - offset, y, offset, height).intersect(clip);
        destination.composite(surface, x + width - offset, y, trailing, CompositeOp::Over);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::PixelRing;
    use crate::error::GraphError;
    use crate::render::{Color, PixelSurface};

    #[test]
    fn push_rejects_width_not_smaller_than_ring() {
        let mut ring = PixelRing::allocate(8, 2).expect("ring");
        assert_eq!(
            ring.push(8).err(),
            Some(GraphError::PushTooWide {
                requested: 8,
                width: 8
            })
        );
    }

    #[test]
    fn push_without_surface_is_refused() {
        let mut ring = PixelRing::new(None, 8, 2).expect("ring");
        assert_eq!(ring.push(2).err(), Some(GraphError::MissingSurface));
        assert_eq!(ring.offset(), 0);
    }

    #[test]
    fn push_clips_at_wrap_boundary() {
        let mut ring = PixelRing::allocate(8, 1).expect("ring");
        ring.push(6).expect("first push");
        let target = ring.push(4).expect("second push");
        assert_eq!(target.width(), 2);
        drop(target);
        assert_eq!(ring.offset(), 0);
    }

    #[test]
    fn newest_column_is_drawn_at_right_edge() {
        let mut ring = PixelRing::allocate(4, 1).expect("ring");
        for shade in [0.25, 0.5, 0.75, 1.0, 0.1] {
            let mut target = ring.push(1).expect("push");
            target.fill(Color::rgb(shade, shade, shade));
        }

        let mut destination = PixelSurface::new(4, 1).expect("destination");
        ring.draw(&mut destination).expect("draw");
        assert_eq!(destination.pixel(3, 0), Some(Color::rgb(0.1, 0.1, 0.1).to_argb32()));
        assert_eq!(destination.pixel(0, 0), Some(Color::rgb(0.5, 0.5, 0.5).to_argb32()));
    }
}
