use crate::base::BasicThreeTuple;

use serde::{Deserialize, Serialize, Serializer};
use std::convert;
use std::ops;

#[derive(Debug, Deserialize)]
#[serde(try_from = "Vec<f64>")]
pub struct Vector3(pub BasicThreeTuple<f64>);

// Vector3 implements the Copy trait because it is a small, constant piece
// of data. Vector3's are, ideally, not widely mutated. The compiler
// will aid in optimizing the copy process, such that excess copies
// are not required at runtime.
impl Copy for Vector3 {}
impl Clone for Vector3 {
    fn clone(&self) -> Vector3 {
        *self
    }
}

// Mirrors the `try_from = "Vec<f64>"` deserialization shape so a round-trip
// through serde produces the same [x, y, z] array back out.
impl Serialize for Vector3 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.x(), self.y(), self.z()].serialize(serializer)
    }
}

impl Vector3 {
    pub fn new_empty() -> Vector3 {
        Vector3(BasicThreeTuple::new(0_f64, 0_f64, 0_f64))
    }

    pub fn new_identity() -> Vector3 {
        Vector3(BasicThreeTuple::new(1_f64, 1_f64, 1_f64))
    }

    pub fn new(x: f64, y: f64, z: f64) -> Vector3 {
        Vector3(BasicThreeTuple::new(x, y, z))
    }

    pub fn x(&self) -> f64 {
        self.0.x
    }
    pub fn y(&self) -> f64 {
        self.0.y
    }
    pub fn z(&self) -> f64 {
        self.0.z
    }

    pub fn min(v1: Vector3, v2: Vector3) -> Vector3 {
        Vector3(BasicThreeTuple::min(v1.0, v2.0))
    }

    pub fn max(v1: Vector3, v2: Vector3) -> Vector3 {
        Vector3(BasicThreeTuple::max(v1.0, v2.0))
    }

    pub fn dot(self, other: Vector3) -> f64 {
        (self.x() * other.x()) + (self.y() * other.y()) + (self.z() * other.z())
    }

    pub fn length_squared(self) -> f64 {
        (self.x() * self.x()) + (self.y() * self.y()) + (self.z() * self.z())
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    // Undefined when length_squared() == 0. Callers must never request a
    // unit vector from a possibly-zero direction; a degenerate scatter
    // direction is replaced by the surface normal before this is called.
    pub fn normalized(self) -> Vector3 {
        self / self.length()
    }

    pub fn cross(self, other: Vector3) -> Vector3 {
        Vector3(BasicThreeTuple::new(
            (self.y() * other.z()) - (self.z() * other.y()),
            (self.z() * other.x()) - (self.x() * other.z()),
            (self.x() * other.y()) - (self.y() * other.x()),
        ))
    }

    // True iff every component's magnitude is at or below 1e-8.
    pub fn near_zero(self) -> bool {
        const EPS: f64 = 1e-8;
        self.x().abs() <= EPS && self.y().abs() <= EPS && self.z().abs() <= EPS
    }
}

impl ops::Add for Vector3 {
    type Output = Vector3;
    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3(self.0.add(rhs.0))
    }
}

impl ops::Sub for Vector3 {
    type Output = Vector3;
    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3(self.0.sub(rhs.0))
    }
}

impl ops::Neg for Vector3 {
    type Output = Vector3;
    fn neg(self) -> Vector3 {
        Vector3(self.0.neg())
    }
}

impl ops::Mul for Vector3 {
    type Output = Vector3;
    fn mul(self, rhs: Vector3) -> Vector3 {
        Vector3(self.0.mul(rhs.0))
    }
}

impl ops::Mul<f64> for Vector3 {
    type Output = Vector3;
    fn mul(self, rhs: f64) -> Vector3 {
        Vector3(self.0.mul(rhs))
    }
}

impl ops::Mul<Vector3> for f64 {
    type Output = Vector3;
    fn mul(self, rhs: Vector3) -> Vector3 {
        Vector3(BasicThreeTuple::new(
            self * rhs.x(),
            self * rhs.y(),
            self * rhs.z(),
        ))
    }
}

impl ops::Div<f64> for Vector3 {
    type Output = Vector3;
    fn div(self, rhs: f64) -> Vector3 {
        Vector3(self.0.div(rhs))
    }
}

impl convert::TryFrom<Vec<f64>> for Vector3 {
    type Error = &'static str;

    fn try_from(vec: Vec<f64>) -> Result<Self, Self::Error> {
        if vec.len() != 3 {
            Err("Deserializing in to Vector3 requires a Vec of length 3!")
        } else {
            Ok(Vector3::new(vec[0], vec[1], vec[2]))
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Copy for Axis {}
impl Clone for Axis {
    fn clone(&self) -> Axis {
        *self
    }
}

impl ops::Index<Axis> for Vector3 {
    type Output = f64;
    fn index(&self, index: Axis) -> &f64 {
        match index {
            Axis::X => &self.0.x,
            Axis::Y => &self.0.y,
            Axis::Z => &self.0.z,
        }
    }
}
