use crate::vector::Vector3;

// Orthonormal basis built around a single "up" vector w, used to rotate
// samples drawn in a canonical local frame (e.g. cosine-weighted hemisphere
// samples with +z as "up") into world space.
pub struct OrthonormalBasis {
    axis: [Vector3; 3],
}

impl OrthonormalBasis {
    pub fn new(w: Vector3) -> OrthonormalBasis {
        let w = w.normalized();
        let a = if w.x().abs() > 0.9 {
            Vector3::new(0.0, 1.0, 0.0)
        } else {
            Vector3::new(1.0, 0.0, 0.0)
        };
        let v = w.cross(a).normalized();
        let u = w.cross(v);
        OrthonormalBasis { axis: [u, v, w] }
    }

    pub fn local(&self, v: Vector3) -> Vector3 {
        (v.x() * self.axis[0]) + (v.y() * self.axis[1]) + (v.z() * self.axis[2])
    }

    pub fn u(&self) -> Vector3 {
        self.axis[0]
    }
    pub fn v(&self) -> Vector3 {
        self.axis[1]
    }
    pub fn w(&self) -> Vector3 {
        self.axis[2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_vectors_are_mutually_orthogonal() {
        let onb = OrthonormalBasis::new(Vector3::new(0.3, 0.8, -0.2));
        assert!(onb.u().dot(onb.v()).abs() < 1e-9);
        assert!(onb.u().dot(onb.w()).abs() < 1e-9);
        assert!(onb.v().dot(onb.w()).abs() < 1e-9);
        assert!((onb.u().length() - 1.0).abs() < 1e-9);
        assert!((onb.v().length() - 1.0).abs() < 1e-9);
        assert!((onb.w().length() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn local_of_w_axis_returns_w() {
        let n = Vector3::new(0.0, 0.0, 1.0);
        let onb = OrthonormalBasis::new(n);
        let local = onb.local(Vector3::new(0.0, 0.0, 1.0));
        assert!((local - n).length() < 1e-9);
    }
}
