use cairo::{Context, Format, ImageSurface};
use tracing::warn;

use crate::error::{GraphError, GraphResult};
use crate::render::{
    Color, CompositeOp, FontDescription, LabelRenderer, LabelSize, PixelSurface, TextPrimitive,
    aligned_left,
};

/// Paints in-memory surfaces onto a Cairo context, e.g. inside a GTK
/// `DrawingArea` draw callback.
#[derive(Debug, Default)]
pub struct CairoPresenter {
    frames_presented: u64,
}

impl CairoPresenter {
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        "cairo"
    }

    #[must_use]
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Paints `surface` with its top-left corner at `(x, y)`.
    pub fn present(&mut self, context: &Context, surface: &PixelSurface, x: f64, y: f64) -> GraphResult<()> {
        let image = to_image_surface(surface)?;
        context
            .set_source_surface(&image, x, y)
            .map_err(|err| map_backend_error("failed to set source surface", err))?;
        context
            .paint()
            .map_err(|err| map_backend_error("failed to paint surface", err))?;
        self.frames_presented += 1;
        Ok(())
    }
}

/// Copies premultiplied ARGB32 pixels into a Cairo image surface.
pub fn to_image_surface(surface: &PixelSurface) -> GraphResult<ImageSurface> {
    let width = surface.width();
    let stride = Format::ARgb32
        .stride_for_width(width)
        .map_err(|err| map_backend_error("invalid stride", err))?;
    let stride_bytes = usize::try_from(stride)
        .map_err(|_| GraphError::InvalidData("negative cairo stride".to_owned()))?;

    let mut data = vec![0_u8; stride_bytes * surface.height() as usize];
    for (row, pixels) in surface.pixels().chunks(width as usize).enumerate() {
        let line = &mut data[row * stride_bytes..];
        for (column, pixel) in pixels.iter().enumerate() {
            line[column * 4..column * 4 + 4].copy_from_slice(&pixel.to_ne_bytes());
        }
    }

    ImageSurface::create_for_data(
        data,
        Format::ARgb32,
        width as i32,
        surface.height() as i32,
        stride,
    )
    .map_err(|err| map_backend_error("failed to create image surface", err))
}

/// Measures and draws labels with Pango through pangocairo.
#[derive(Debug, Default)]
pub struct PangoLabelRenderer {
    texts_drawn: usize,
}

impl PangoLabelRenderer {
    #[must_use]
    pub fn texts_drawn(&self) -> usize {
        self.texts_drawn
    }

    fn layout(context: &Context, text: &str, font: &FontDescription) -> pango::Layout {
        let layout = pangocairo::functions::create_layout(context);
        let description = pango::FontDescription::from_string(&font.to_string());
        layout.set_font_description(Some(&description));
        layout.set_text(text);
        layout
    }
}

impl LabelRenderer for PangoLabelRenderer {
    fn measure(&self, text: &str, font: &FontDescription) -> LabelSize {
        let measured = ImageSurface::create(Format::ARgb32, 1, 1)
            .and_then(|surface| Context::new(&surface))
            .map(|context| Self::layout(&context, text, font).pixel_size());
        match measured {
            Ok((width, height)) => LabelSize {
                width: width.max(0) as u32,
                height: height.max(0) as u32,
            },
            Err(err) => {
                warn!(%err, "label measurement failed");
                LabelSize::default()
            }
        }
    }

    fn draw(&mut self, target: &mut PixelSurface, label: &TextPrimitive, font: &FontDescription) -> GraphResult<()> {
        label.validate()?;
        let size = self.measure(&label.text, font);
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }

        let mut image = ImageSurface::create(Format::ARgb32, size.width as i32, size.height as i32)
            .map_err(|err| map_backend_error("failed to create label surface", err))?;
        {
            let context = Context::new(&image)
                .map_err(|err| map_backend_error("failed to create label context", err))?;
            apply_color(&context, label.color);
            let layout = Self::layout(&context, &label.text, font);
            context.move_to(0.0, 0.0);
            pangocairo::functions::show_layout(&context, &layout);
        }
        image.flush();

        let stride = usize::try_from(image.stride())
            .map_err(|_| GraphError::InvalidData("negative cairo stride".to_owned()))?;
        let data = image
            .data()
            .map_err(|err| GraphError::InvalidData(format!("label surface borrow failed: {err}")))?;

        let mut glyphs = PixelSurface::new(size.width, size.height)?;
        for y in 0..size.height as usize {
            for x in 0..size.width as usize {
                let start = y * stride + x * 4;
                let mut bytes = [0_u8; 4];
                bytes.copy_from_slice(&data[start..start + 4]);
                glyphs.set_pixel(x as i32, y as i32, u32::from_ne_bytes(bytes), CompositeOp::Source);
            }
        }

        let left = aligned_left(label, size.width).round() as i32;
        let top = label.y.round() as i32;
        let clip = target.bounds();
        target.composite(&glyphs, left, top, clip, CompositeOp::Over);
        self.texts_drawn += 1;
        Ok(())
    }
}

fn apply_color(context: &Context, color: Color) {
    context.set_source_rgba(color.red, color.green, color.blue, color.alpha);
}

fn map_backend_error(prefix: &str, err: cairo::Error) -> GraphError {
    GraphError::InvalidData(format!("{prefix}: {err}"))
}
