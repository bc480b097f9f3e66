//! Texture maps padded to square images.
//!
//! The browser engine only handles square textures, so a rectangular image is
//! padded on the top and right and the UVs are rescaled to keep addressing the
//! original image region. Input UVs take values in `[0, 1]^2`, where `(0, 0)`
//! and `(1, 1)` are the lower-left and upper-right corners of the image.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec2;
use image::{Rgba, RgbaImage};
use serde::Serialize;

use meshview_core::{MeshViewError, Result};

/// Channel value of the padding pixels.
const PAD_VALUE: u8 = 128;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a texture. Materials bound to different textures never share a cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        Self(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Sampler settings the browser engine applies to the texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureSampling {
    pub wrap_s: &'static str,
    pub mag_filter: &'static str,
    pub min_filter: &'static str,
    pub generate_mipmaps: bool,
    pub flip_y: bool,
}

impl Default for TextureSampling {
    fn default() -> Self {
        Self {
            wrap_s: "ClampToEdgeWrapping",
            mag_filter: "LinearFilter",
            min_filter: "LinearMipMapLinearFilter",
            generate_mipmaps: true,
            flip_y: true,
        }
    }
}

/// A square RGBA texture plus the UVs addressing the original image inside it.
#[derive(Debug, Clone)]
pub struct TextureMap {
    id: TextureId,
    uv: Vec<Vec2>,
    image: RgbaImage,
    original_size: (u32, u32),
    sampling: TextureSampling,
}

impl TextureMap {
    /// Pads `image` to a square and remaps `uv` into it.
    ///
    /// With `normalize_uv` the UVs are first stretched to span exactly `[0, 1]^2`.
    /// With `power_of_two` the square side is rounded up to a power of two.
    pub fn new(
        uv: &[Vec2],
        image: &RgbaImage,
        normalize_uv: bool,
        power_of_two: bool,
    ) -> Result<Self> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(MeshViewError::ImageError(
                "texture image has zero dimensions".to_string(),
            ));
        }

        let mut uv = uv.to_vec();
        if normalize_uv {
            normalize(&mut uv);
        }

        let s = padded_size(w, h, power_of_two);
        let mut padded = RgbaImage::from_pixel(s, s, Rgba([PAD_VALUE; 4]));
        // Image rows run top to bottom, so the original sits in the bottom-left corner.
        image::imageops::replace(&mut padded, image, 0, i64::from(s - h));

        let scale = Vec2::new(w as f32 / s as f32, h as f32 / s as f32);
        for p in &mut uv {
            *p *= scale;
        }

        log::debug!("texture {w}x{h} padded to {s}x{s}");

        Ok(Self {
            id: TextureId::next(),
            uv,
            image: padded,
            original_size: (w, h),
            sampling: TextureSampling::default(),
        })
    }

    /// Loads the image from a file (any format the `image` crate decodes).
    pub fn from_file(
        uv: &[Vec2],
        path: impl AsRef<Path>,
        normalize_uv: bool,
        power_of_two: bool,
    ) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|e| MeshViewError::ImageError(format!("failed to open '{}': {e}", path.display())))?
            .to_rgba8();
        Self::new(uv, &image, normalize_uv, power_of_two)
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    /// UVs remapped into the padded texture.
    pub fn uv(&self) -> &[Vec2] {
        &self.uv
    }

    /// The padded square image.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Side length of the padded square.
    pub fn size(&self) -> u32 {
        self.image.width()
    }

    /// `(width, height)` of the image before padding.
    pub fn original_size(&self) -> (u32, u32) {
        self.original_size
    }

    pub fn sampling(&self) -> TextureSampling {
        self.sampling
    }

    /// PNG encoding of the padded image.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| MeshViewError::ImageError(e.to_string()))?;
        Ok(bytes)
    }
}

/// Side of the square a `w` by `h` image is padded to.
pub fn padded_size(w: u32, h: u32, power_of_two: bool) -> u32 {
    let s = w.max(h);
    if power_of_two {
        s.next_power_of_two()
    } else {
        s
    }
}

/// Stretches UVs so they span `[0, 1]^2`. Axes with zero extent are only shifted.
fn normalize(uv: &mut [Vec2]) {
    let Some(first) = uv.first().copied() else {
        return;
    };
    let (min, max) = uv
        .iter()
        .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    let extent = max - min;
    let extent = Vec2::new(
        if extent.x > 0.0 { extent.x } else { 1.0 },
        if extent.y > 0.0 { extent.y } else { 1.0 },
    );
    for p in uv {
        *p = (*p - min) / extent;
    }
}
