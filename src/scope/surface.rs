use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use tiny_skia::{
    BlendMode, FillRule, IntRect, Mask, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke,
    Transform,
};
use crate::scope::error::ScopeError;
/// Integer pixel rectangle in surface coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}
impl PixelRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);
/// Drawing capabilities the scroll renderer needs from a canvas.
///
/// Clearing and block copies ignore the clip; strokes and fills respect it.
pub trait Surface2D {
    type Block;
    fn size(&self) -> (u32, u32);
    fn clear(&mut self, rect: PixelRect);
    fn read_pixels(&self, rect: PixelRect) -> Option<Self::Block>;
    fn write_pixels(&mut self, block: &Self::Block, x: i32, y: i32);
    fn set_clip(&mut self, rect: Option<PixelRect>);
    fn stroke_polyline(&mut self, points: &[(f32, f32)], color: Rgb);
    fn fill_rect(&mut self, rect: PixelRect, color: Rgb);
    fn with_clip<R>(&mut self, rect: PixelRect, draw: impl FnOnce(&mut Self) -> R) -> R
    where
        Self: Sized,
    {
        self.set_clip(Some(rect));
        let result = draw(self);
        self.set_clip(None);
        result
    }
}
/// In-memory RGBA canvas backed by a tiny-skia pixmap.
pub struct PixmapSurface {
    pixmap: Pixmap,
    clip: Option<Mask>,
}
impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, ScopeError> {
        let pixmap =
            Pixmap::new(width, height).ok_or(ScopeError::SurfaceAllocation { width, height })?;
        Ok(Self { pixmap, clip: None })
    }
    /// Premultiplied RGBA bytes, row-major.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }
    /// Straight (non-premultiplied) RGBA value at the given pixel.
    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixmap.pixel(x, y).map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
    }
    pub fn encode_png(&self) -> Result<Vec<u8>, ScopeError> {
        let raw: Vec<u8> = self
            .pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        let image =
            ImageBuffer::<Rgba<u8>, _>::from_raw(self.pixmap.width(), self.pixmap.height(), raw)
                .ok_or_else(|| ScopeError::Snapshot("failed to allocate image buffer".into()))?;
        let mut output = Vec::new();
        let dynamic = DynamicImage::ImageRgba8(image);
        dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
        Ok(output)
    }
    fn solid(color: Rgb, anti_alias: bool) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.0, color.1, color.2, 255);
        paint.anti_alias = anti_alias;
        paint
    }
}
fn to_rect(rect: PixelRect) -> Option<Rect> {
    Rect::from_xywh(
        rect.x as f32,
        rect.y as f32,
        rect.width as f32,
        rect.height as f32,
    )
}
impl Surface2D for PixmapSurface {
    type Block = Pixmap;
    fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }
    fn clear(&mut self, rect: PixelRect) {
        let Some(rect) = to_rect(rect) else {
            return;
        };
        let mut paint = Paint::default();
        paint.blend_mode = BlendMode::Clear;
        paint.anti_alias = false;
        self.pixmap
            .fill_rect(rect, &paint, Transform::identity(), None);
    }
    fn read_pixels(&self, rect: PixelRect) -> Option<Pixmap> {
        if rect.is_empty() {
            return None;
        }
        let rect = IntRect::from_xywh(rect.x, rect.y, rect.width as u32, rect.height as u32)?;
        self.pixmap.clone_rect(rect)
    }
    fn write_pixels(&mut self, block: &Pixmap, x: i32, y: i32) {
        let paint = PixmapPaint {
            blend_mode: BlendMode::Source,
            ..PixmapPaint::default()
        };
        self.pixmap
            .draw_pixmap(x, y, block.as_ref(), &paint, Transform::identity(), None);
    }
    fn set_clip(&mut self, rect: Option<PixelRect>) {
        // an empty rectangle still yields a mask, one that admits nothing
        self.clip = rect.and_then(|rect| {
            let mut mask = Mask::new(self.pixmap.width(), self.pixmap.height())?;
            if let Some(rect) = to_rect(rect) {
                let path = PathBuilder::from_rect(rect);
                mask.fill_path(&path, FillRule::Winding, false, Transform::identity());
            }
            Some(mask)
        });
    }
    fn stroke_polyline(&mut self, points: &[(f32, f32)], color: Rgb) {
        let mut builder = PathBuilder::new();
        let mut started = false;
        for &(x, y) in points {
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            if started {
                builder.line_to(x, y);
            } else {
                builder.move_to(x, y);
                started = true;
            }
        }
        let Some(path) = builder.finish() else {
            return;
        };
        let paint = Self::solid(color, true);
        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        self.pixmap.stroke_path(
            &path,
            &paint,
            &stroke,
            Transform::identity(),
            self.clip.as_ref(),
        );
    }
    fn fill_rect(&mut self, rect: PixelRect, color: Rgb) {
        let Some(rect) = to_rect(rect) else {
            return;
        };
        let paint = Self::solid(color, false);
        self.pixmap
            .fill_rect(rect, &paint, Transform::identity(), self.clip.as_ref());
    }
}
