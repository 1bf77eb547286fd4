// Cross-module sanity check that a Sphere hit through the public API reports
// a front-facing record with a unit normal, independent of any acceleration
// structure.
use std::sync::Arc;

use pathtracer_core::color::Color;
use pathtracer_core::material::Lambertian;
use pathtracer_core::point::Point3;
use pathtracer_core::ray::Ray;
use pathtracer_core::rng::Rng;
use pathtracer_core::shape::{Hittable, Sphere};
use pathtracer_core::texture::SolidColor;
use pathtracer_core::vector::Vector3;

#[test]
fn sphere_hit_reports_outward_normal_and_front_face() {
    let sphere = Sphere::new(
        Point3::origin(),
        1.0,
        Arc::new(Lambertian::new(Arc::new(SolidColor::new(Color::white())))),
    );
    let r = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
    let mut rng = Rng::new(7, 0);

    let hit = sphere
        .hit(&r, 0.001, f64::INFINITY, &mut rng)
        .expect("ray through the center must hit the sphere");

    assert!((hit.t - 4.0).abs() < 1e-9);
    assert!(hit.front_face);
    assert!((hit.normal.length() - 1.0).abs() < 1e-9);
    assert!(hit.normal.dot(Vector3::new(0.0, 0.0, 1.0)) > 0.0);
}

#[test]
fn sphere_miss_returns_none() {
    let sphere = Sphere::new(
        Point3::origin(),
        1.0,
        Arc::new(Lambertian::new(Arc::new(SolidColor::new(Color::white())))),
    );
    let r = Ray::new(Point3::new(5.0, 5.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
    let mut rng = Rng::new(7, 0);
    assert!(sphere.hit(&r, 0.001, f64::INFINITY, &mut rng).is_none());
}
