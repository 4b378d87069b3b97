use std::fmt;
use std::sync::Arc;

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, Rgba, RgbaImage};
use resvg::tiny_skia::Pixmap;

use crate::images::MarkerError;

const DEFAULT_MARKER_SIZE: u32 = 48;
const DEFAULT_MARKER_FILL: Rgba<u8> = Rgba([0xEA, 0x43, 0x35, 0xFF]);
const DEFAULT_MARKER_RIM: Rgba<u8> = Rgba([0xA5, 0x0E, 0x0E, 0xFF]);

struct MarkerBitmap {
    image: RgbaImage,
    default_marker: bool,
}

/// Shared handle to a rendered marker image.
///
/// Clones share the same pixels; use [`BitmapDescriptor::same_bitmap`] to
/// check whether two handles point at the same render.
#[derive(Clone)]
pub struct BitmapDescriptor(Arc<MarkerBitmap>);

impl BitmapDescriptor {
    pub fn from_image(image: RgbaImage) -> Self {
        Self(Arc::new(MarkerBitmap {
            image,
            default_marker: false,
        }))
    }

    /// Converts a premultiplied pixmap into a straight-alpha RGBA image.
    pub fn from_pixmap(pixmap: &Pixmap) -> Result<Self, MarkerError> {
        let data: Vec<u8> = pixmap
            .pixels()
            .iter()
            .flat_map(|pixel| {
                let color = pixel.demultiply();
                [color.red(), color.green(), color.blue(), color.alpha()]
            })
            .collect();

        let image = RgbaImage::from_raw(pixmap.width(), pixmap.height(), data).ok_or(
            MarkerError::Surface {
                width: pixmap.width(),
                height: pixmap.height(),
            },
        )?;

        Ok(Self::from_image(image))
    }

    /// The stand-in marker used when an icon cannot be rendered: a red disc
    /// with a darker rim.
    pub fn default_marker() -> Self {
        let center = DEFAULT_MARKER_SIZE as f32 / 2.0;
        let outer = center - 2.0;
        let inner = outer - 3.0;

        let image = RgbaImage::from_fn(DEFAULT_MARKER_SIZE, DEFAULT_MARKER_SIZE, |x, y| {
            let dx = x as f32 + 0.5 - center;
            let dy = y as f32 + 0.5 - center;
            let distance = (dx * dx + dy * dy).sqrt();

            if distance <= inner {
                DEFAULT_MARKER_FILL
            } else if distance <= outer {
                DEFAULT_MARKER_RIM
            } else {
                Rgba([0, 0, 0, 0])
            }
        });

        Self(Arc::new(MarkerBitmap {
            image,
            default_marker: true,
        }))
    }

    pub fn width(&self) -> u32 {
        self.0.image.width()
    }

    pub fn height(&self) -> u32 {
        self.0.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.0.image
    }

    pub fn is_default_marker(&self) -> bool {
        self.0.default_marker
    }

    pub fn same_bitmap(&self, other: &BitmapDescriptor) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn to_png(&self) -> Result<Vec<u8>, MarkerError> {
        let mut output = Vec::new();
        PngEncoder::new(&mut output)
            .write_image(
                self.0.image.as_raw(),
                self.width(),
                self.height(),
                ColorType::Rgba8,
            )
            .map_err(|e| MarkerError::Encoding(format!("PNG encoding failed: {}", e)))?;
        Ok(output)
    }
}

impl fmt::Debug for BitmapDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitmapDescriptor")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("default_marker", &self.is_default_marker())
            .finish()
    }
}
