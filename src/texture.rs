use crate::color::Color;
use crate::point::Point3;
use crate::utils::{noise, turbulence};

use image::{DynamicImage, GenericImageView};
use serde::Deserialize;
use std::sync::Arc;

pub trait Texture {
    fn value(&self, u: f64, v: f64, p: &Point3) -> Color;
}
pub type SyncTexture = dyn Texture + Send + Sync;

#[derive(Deserialize, Clone, Copy)]
pub struct SolidColor {
    color: Color,
}
impl SolidColor {
    pub fn new(color: Color) -> SolidColor {
        SolidColor { color }
    }
}
impl Texture for SolidColor {
    fn value(&self, _u: f64, _v: f64, _p: &Point3) -> Color {
        self.color
    }
}

// 3D checker pattern: the sign of the sum of per-axis lattice indices
// alternates between two sub-textures, so the grid lines up on all three
// axes instead of just projecting in screen space.
pub struct Checker {
    inv_scale: f64,
    odd: Arc<SyncTexture>,
    even: Arc<SyncTexture>,
}
impl Checker {
    pub fn new(inv_scale: f64, odd: Arc<SyncTexture>, even: Arc<SyncTexture>) -> Checker {
        Checker {
            inv_scale,
            odd,
            even,
        }
    }
}
impl Texture for Checker {
    fn value(&self, u: f64, v: f64, p: &Point3) -> Color {
        let sum = (self.inv_scale * p.x()).floor()
            + (self.inv_scale * p.y()).floor()
            + (self.inv_scale * p.z()).floor();
        if (sum as i64).rem_euclid(2) == 0 {
            self.even.value(u, v, p)
        } else {
            self.odd.value(u, v, p)
        }
    }
}

// Missing/out-of-range image data is visually obvious rather than silently
// black.
const MAGENTA: Color = Color(crate::base::BasicThreeTuple {
    x: 1.0,
    y: 0.0,
    z: 1.0,
});

pub enum ImageFilter {
    Nearest,
    Bilinear,
}

pub struct Image {
    img: Arc<DynamicImage>,
    filter: ImageFilter,
}
impl Image {
    pub fn new(img: Arc<DynamicImage>, filter: ImageFilter) -> Image {
        Image { img, filter }
    }

    fn texel(&self, x: u32, y: u32) -> Color {
        let (w, h) = (self.img.width(), self.img.height());
        if w == 0 || h == 0 {
            return MAGENTA;
        }
        let pixel = self.img.get_pixel(x % w, y % h);
        Color::new(
            pixel[0] as f64 / 255.0,
            pixel[1] as f64 / 255.0,
            pixel[2] as f64 / 255.0,
        )
    }
}
impl Texture for Image {
    fn value(&self, u: f64, v: f64, _p: &Point3) -> Color {
        let (w, h) = (self.img.width(), self.img.height());
        if w == 0 || h == 0 {
            return MAGENTA;
        }
        // wrap = fractional part; V is flipped so (0,0) is bottom-left.
        let u = u.fract().rem_euclid(1.0);
        let v = (1.0 - v.fract().rem_euclid(1.0)).rem_euclid(1.0);

        match self.filter {
            ImageFilter::Nearest => {
                let x = (u * w as f64) as u32 % w;
                let y = (v * h as f64) as u32 % h;
                self.texel(x, y)
            }
            ImageFilter::Bilinear => {
                let fx = u * w as f64 - 0.5;
                let fy = v * h as f64 - 0.5;
                let x0 = fx.floor();
                let y0 = fy.floor();
                let tx = fx - x0;
                let ty = fy - y0;
                let x0 = x0 as i64;
                let y0 = y0 as i64;
                let wrap = |v: i64, n: u32| v.rem_euclid(n as i64) as u32;

                let c00 = self.texel(wrap(x0, w), wrap(y0, h));
                let c10 = self.texel(wrap(x0 + 1, w), wrap(y0, h));
                let c01 = self.texel(wrap(x0, w), wrap(y0 + 1, h));
                let c11 = self.texel(wrap(x0 + 1, w), wrap(y0 + 1, h));

                let top = c00 * (1.0 - tx) + c10 * tx;
                let bottom = c01 * (1.0 - tx) + c11 * tx;
                top * (1.0 - ty) + bottom * ty
            }
        }
    }
}

#[derive(Deserialize)]
pub struct Noise {
    scale: f64,
}
impl Noise {
    pub fn new(scale: f64) -> Noise {
        Noise { scale }
    }
}
impl Texture for Noise {
    fn value(&self, _u: f64, _v: f64, p: &Point3) -> Color {
        Color::new(0.5, 0.5, 0.5) * (1.0 + noise(&(*p * self.scale)))
    }
}

#[derive(Deserialize)]
pub struct Turbulence {
    scale: f64,
    depth: u32,
    omega: f64,
}
impl Turbulence {
    pub fn new(scale: f64, depth: u32, omega: f64) -> Turbulence {
        Turbulence {
            scale,
            depth,
            omega: omega.max(0.0).min(1.0),
        }
    }
}
impl Texture for Turbulence {
    fn value(&self, _u: f64, _v: f64, p: &Point3) -> Color {
        // Marble: a plain sine wave along z, warped by fbm turbulence.
        let warp = self.scale * p.z() + 10.0 * turbulence(p, self.depth, self.omega);
        Color::white() * 0.5 * (1.0 + warp.sin())
    }
}
