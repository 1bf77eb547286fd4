// A ground plane plus a mirror-like metal sphere under a single emitter: the
// integrator should carry measurable radiance from the light, through the
// metal reflection, into the camera ray.
use std::sync::Arc;

use pathtracer_core::camera::Camera;
use pathtracer_core::color::Color;
use pathtracer_core::integrator::trace;
use pathtracer_core::material::{Emissive, Metal};
use pathtracer_core::point::Point3;
use pathtracer_core::ray::Ray;
use pathtracer_core::rng::Rng;
use pathtracer_core::scene::{Acceleration, Environment, Lighting, RenderConfig, Scene};
use pathtracer_core::shape::{Sphere, SyncHittable};
use pathtracer_core::texture::SolidColor;
use pathtracer_core::vector::Vector3;

#[test]
fn metal_ground_carries_light_radiance_through_reflection() {
    let ground: Arc<SyncHittable> = Arc::new(Sphere::new(
        Point3::new(0.0, -1000.0, 0.0),
        1000.0,
        Arc::new(Metal::new(
            Arc::new(SolidColor::new(Color::new(0.9, 0.9, 0.9))),
            0.0,
        )),
    ));
    let light: Arc<SyncHittable> = Arc::new(Sphere::new(
        Point3::new(0.0, 4.0, -4.0),
        1.0,
        Arc::new(Emissive::new(Color::white(), 4.0)),
    ));

    let camera = Camera::new(
        Point3::new(0.0, 2.0, 5.0),
        Point3::new(0.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        40.0,
        1.0,
    );
    let mut config = RenderConfig::new(8, 8, 4, 8);
    config.acceleration = Acceleration::Linear;
    let scene = Scene::build(
        camera,
        Lighting::new(Environment::Solid(Color::black())),
        config,
        vec![ground, light],
    )
    .unwrap();

    // A ray aimed so its specular reflection off the ground sphere points
    // back up toward the emitter.
    let r = Ray::new(Point3::new(0.0, 2.0, 5.0), Vector3::new(0.0, -0.18, -1.0));
    let mut rng = Rng::for_draw(1, 0, 0, 0);
    let color = trace(&r, &scene, 0, &mut rng);

    assert!(color.r().is_finite() && color.r() >= 0.0);
    assert!(
        color.r() > 0.0 || color.g() > 0.0 || color.b() > 0.0,
        "expected some light to reach the camera via the metal reflection"
    );
}
