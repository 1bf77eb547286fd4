use crate::point::Point3;
use crate::ray::Ray;
use crate::vector::Vector3;

// Pinhole camera: lookFrom/lookAt/up define an orthonormal basis, vertical
// FOV (degrees) and aspect ratio size the image plane. `ray_for(s, t)` maps
// normalized image coordinates in [0,1]^2 to a world-space ray.
pub struct Camera {
    origin: Point3,
    lower_left_corner: Point3,
    horizontal: Vector3,
    vertical: Vector3,
}

impl Camera {
    pub fn new(
        look_from: Point3,
        look_at: Point3,
        up: Vector3,
        vertical_fov_degrees: f64,
        aspect_ratio: f64,
    ) -> Camera {
        let theta = vertical_fov_degrees.to_radians();
        let viewport_height = 2.0 * (theta / 2.0).tan();
        let viewport_width = aspect_ratio * viewport_height;

        let w = (look_from - look_at).normalized();
        let u = up.cross(w).normalized();
        let v = w.cross(u);

        let horizontal = viewport_width * u;
        let vertical = viewport_height * v;
        let lower_left_corner = look_from - horizontal / 2.0 - vertical / 2.0 - w;

        Camera {
            origin: look_from,
            lower_left_corner,
            horizontal,
            vertical,
        }
    }

    // s, t in [0,1]; (0,0) is the bottom-left of the image plane.
    pub fn ray_for(&self, s: f64, t: f64) -> Ray {
        let dir = self.lower_left_corner + (self.horizontal * s) + (self.vertical * t) - self.origin;
        Ray::new(self.origin, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looking_down_negative_z_centers_on_look_at() {
        let cam = Camera::new(
            Point3::origin(),
            Point3::new(0.0, 0.0, -1.0),
            Vector3::new(0.0, 1.0, 0.0),
            90.0,
            1.0,
        );
        let r = cam.ray_for(0.5, 0.5);
        assert!((r.dir.x()).abs() < 1e-9);
        assert!((r.dir.y()).abs() < 1e-9);
        assert!(r.dir.z() < 0.0);
    }

    #[test]
    fn wider_aspect_ratio_widens_horizontal_extent() {
        let narrow = Camera::new(
            Point3::origin(),
            Point3::new(0.0, 0.0, -1.0),
            Vector3::new(0.0, 1.0, 0.0),
            90.0,
            1.0,
        );
        let wide = Camera::new(
            Point3::origin(),
            Point3::new(0.0, 0.0, -1.0),
            Vector3::new(0.0, 1.0, 0.0),
            90.0,
            2.0,
        );
        let narrow_edge = narrow.ray_for(1.0, 0.5).dir.x();
        let wide_edge = wide.ray_for(1.0, 0.5).dir.x();
        assert!(wide_edge > narrow_edge);
    }
}
