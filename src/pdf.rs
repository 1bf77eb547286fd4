use crate::onb::OrthonormalBasis;
use crate::point::Point3;
use crate::shape::SyncHittable;
use crate::vector::Vector3;

use rand::RngCore;
use std::f64;
use std::sync::Arc;

pub trait Pdf {
    fn value(&self, dir: Vector3) -> f64;
    fn generate(&self, rng: &mut dyn RngCore) -> Vector3;
}

pub struct CosinePdf {
    onb: OrthonormalBasis,
}

impl CosinePdf {
    pub fn new(normal: Vector3) -> CosinePdf {
        CosinePdf {
            onb: OrthonormalBasis::new(normal),
        }
    }
}

impl Pdf for CosinePdf {
    fn value(&self, dir: Vector3) -> f64 {
        let cosine = dir.normalized().dot(self.onb.w());
        if cosine <= 0.0 {
            0.0
        } else {
            cosine / f64::consts::PI
        }
    }

    fn generate(&self, rng: &mut dyn RngCore) -> Vector3 {
        self.onb.local(crate::utils::random_cosine_direction(rng))
    }
}

// Next event estimation PDF: generates a direction from `origin` toward the
// given primitive and evaluates its solid-angle PDF as if the primitive were
// an area light. See `Hittable::pdf_value` / `Hittable::random_direction_from`
// for the per-shape solid-angle math.
pub struct HittablePdf {
    target: Arc<SyncHittable>,
    origin: Point3,
}

impl HittablePdf {
    pub fn new(target: Arc<SyncHittable>, origin: Point3) -> HittablePdf {
        HittablePdf { target, origin }
    }
}

impl Pdf for HittablePdf {
    fn value(&self, dir: Vector3) -> f64 {
        self.target.pdf_value(self.origin, dir)
    }

    fn generate(&self, rng: &mut dyn RngCore) -> Vector3 {
        self.target.random_direction_from(self.origin, rng)
    }
}

// 50/50 mixture of two sampling strategies: a fair coin decides which PDF
// generates the direction each call.
pub struct MixturePdf<'a> {
    p0: &'a dyn Pdf,
    p1: &'a dyn Pdf,
}

impl<'a> MixturePdf<'a> {
    pub fn new(p0: &'a dyn Pdf, p1: &'a dyn Pdf) -> MixturePdf<'a> {
        MixturePdf { p0, p1 }
    }
}

impl<'a> Pdf for MixturePdf<'a> {
    fn value(&self, dir: Vector3) -> f64 {
        0.5 * self.p0.value(dir) + 0.5 * self.p1.value(dir)
    }

    fn generate(&self, rng: &mut dyn RngCore) -> Vector3 {
        if rng.next_u32() & 1 == 0 {
            self.p0.generate(rng)
        } else {
            self.p1.generate(rng)
        }
    }
}

// MIS balance heuristic. Returns 0 when both densities underflow, so a
// degenerate pairing of two zero-probability strategies contributes nothing
// rather than dividing 0/0.
pub fn balance_heuristic(p_s: f64, p_other: f64) -> f64 {
    let denom = p_s + p_other;
    if denom < 1e-10 {
        0.0
    } else {
        p_s / denom
    }
}

// MIS power heuristic with beta = 2.
pub fn power_heuristic(p_s: f64, p_other: f64) -> f64 {
    let s2 = p_s * p_s;
    let o2 = p_other * p_other;
    let denom = s2 + o2;
    if denom < 1e-10 {
        0.0
    } else {
        s2 / denom
    }
}
