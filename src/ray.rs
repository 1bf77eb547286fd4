use crate::point::Point3;
use crate::vector::Vector3;

pub struct Ray {
    pub origin: Point3,
    pub dir: Vector3,
    // Not read anywhere in the core; kept only so a future, out-of-scope
    // motion-blur consumer has somewhere to put a sample time.
    pub time: Option<f64>,
}

impl Ray {
    pub fn new(origin: Point3, dir: Vector3) -> Ray {
        Ray {
            origin,
            dir,
            time: None,
        }
    }

    pub fn with_time(origin: Point3, dir: Vector3, time: f64) -> Ray {
        Ray {
            origin,
            dir,
            time: Some(time),
        }
    }

    pub fn at(&self, t: f64) -> Point3 {
        self.origin + (self.dir * t)
    }
}
