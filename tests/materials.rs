// Dielectric total internal reflection: past the critical angle, the
// scattered ray must be the mirror reflection, never a refraction, with
// probability 1 regardless of the Schlick draw.
use std::sync::Arc;

use pathtracer_core::color::Color;
use pathtracer_core::material::{Dielectric, Material, ScatterResult};
use pathtracer_core::point::Point3;
use pathtracer_core::ray::Ray;
use pathtracer_core::rng::Rng;
use pathtracer_core::shape::HitRecord;
use pathtracer_core::vector::Vector3;

fn reflect(v: Vector3, n: Vector3) -> Vector3 {
    v - n * (2.0 * v.dot(n))
}

#[test]
fn dielectric_total_internal_reflection_past_critical_angle() {
    let glass = Dielectric::new(1.5);

    // A ray exiting a glass sphere (front_face = false: travelling from
    // inside toward the normal-facing outward) at a steep grazing angle,
    // well past glass's ~41.8 degree critical angle.
    let normal = Vector3::new(0.0, 1.0, 0.0);
    let incoming = Vector3::new(0.99, -0.1411, 0.0).normalized();
    let hit = HitRecord {
        t: 1.0,
        p: Point3::new(0.0, 0.0, 0.0),
        normal,
        front_face: false,
        u: 0.0,
        v: 0.0,
        material: Arc::new(Dielectric::new(1.5)),
    };
    let ray_in = Ray::new(Point3::new(-1.0, 1.0, 0.0), incoming);

    for seed in 0..8 {
        let mut rng = Rng::new(seed, 0);
        match glass.scatter(&ray_in, &hit, &mut rng) {
            ScatterResult::Specular { scattered, .. } => {
                let expected = reflect(incoming, normal).normalized();
                let got = scattered.dir.normalized();
                assert!(
                    (got - expected).length() < 1e-9,
                    "expected pure reflection past the critical angle, got {:?}",
                    got
                );
            }
            other => panic!("dielectric must always scatter specularly, got a different branch: {}", matches_branch(&other)),
        }
    }
}

fn matches_branch(r: &ScatterResult) -> &'static str {
    match r {
        ScatterResult::Absorbed => "Absorbed",
        ScatterResult::Specular { .. } => "Specular",
        ScatterResult::Diffuse { .. } => "Diffuse",
    }
}
