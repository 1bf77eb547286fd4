use crate::color::Color;
use crate::material::ScatterResult;
use crate::pdf::{HittablePdf, MixturePdf, Pdf};
use crate::point::Point3;
use crate::ray::Ray;
use crate::rng::Rng;
use crate::scene::Scene;
use crate::shape::HitRecord;
use crate::vector::Vector3;

use rand::Rng as _;
use std::sync::Arc;

// Beyond this many remaining bounces, Russian roulette may terminate the
// path early rather than recurse to `max_depth`.
const ROULETTE_MARGIN: u32 = 3;
const ROULETTE_MIN: f64 = 0.05;
const ROULETTE_MAX: f64 = 0.95;

// Nudges a shadow ray's origin off the surface and its far bound off the
// light itself, so neither end re-intersects the surface or light it just
// left (same acne-avoidance margin `scene.hit` is always called with).
const SHADOW_EPS: f64 = 1e-4;

// Direct (next-event) lighting from the scene's delta lights: the sun and any
// point lights. Unlike emissive primitives, these have no surface for a
// recursively traced ray to land on, so they are never reached by
// `light_pdf`'s `HittablePdf` sampling and must be added explicitly here, one
// shadow ray per light per diffuse bounce.
fn direct_light_contribution(
    scene: &Scene,
    hit: &HitRecord,
    ray_in: &Ray,
    attenuation: &Color,
    rng: &mut Rng,
) -> Color {
    let mut total = Color::black();

    if let Some(sun) = &scene.lighting.sun {
        total = total
            + delta_light_sample(
                scene,
                hit,
                ray_in,
                attenuation,
                sun.direction,
                f64::INFINITY,
                sun.radiance(),
                rng,
            );
    }

    for point in &scene.lighting.points {
        let to_light = point.position - hit.p;
        let distance = to_light.length();
        if distance <= SHADOW_EPS {
            continue;
        }
        let direction = to_light / distance;
        total = total
            + delta_light_sample(
                scene,
                hit,
                ray_in,
                attenuation,
                direction,
                distance,
                point.radiance_at(hit.p),
                rng,
            );
    }

    total
}

// Casts one shadow ray toward a delta light and, if unoccluded, returns the
// light's contribution weighted by the surface's BRDF-times-cosine term
// (`scattering_pdf` doubles as that term for the Lambertian/PBR lobes that
// produce a `Diffuse` scatter result, same as the indirect branch below).
fn delta_light_sample(
    scene: &Scene,
    hit: &HitRecord,
    ray_in: &Ray,
    attenuation: &Color,
    direction: crate::vector::Vector3,
    max_distance: f64,
    incoming_radiance: Color,
    rng: &mut Rng,
) -> Color {
    if hit.normal.dot(direction) <= 0.0 {
        return Color::black();
    }

    let shadow_ray = Ray::new(hit.p + hit.normal * SHADOW_EPS, direction);
    let shadow_limit = if max_distance.is_finite() {
        max_distance - SHADOW_EPS
    } else {
        f64::INFINITY
    };
    if scene
        .hit(&shadow_ray, SHADOW_EPS, shadow_limit, rng)
        .is_some()
    {
        return Color::black();
    }

    let brdf_cos = hit.material.scattering_pdf(ray_in, hit, &shadow_ray);
    *attenuation * incoming_radiance * brdf_cos
}

// A direction sampler aimed at one of the scene's important emitters, used as
// the light-sampling half of the mixture PDF. Picking uniformly among
// multiple candidates (rather than weighting by power or solid angle) is the
// simplest policy consistent with an even split between the material's
// cosine lobe and the light; see DESIGN.md's Open Question (2).
fn light_pdf(scene: &Scene, origin: Point3, rng: &mut Rng) -> Option<HittablePdf> {
    let important = scene.important_primitives();
    if important.is_empty() {
        return None;
    }
    let index = rng.gen_range(0, important.len());
    let target: Arc<_> = Arc::clone(&important[index]);
    Some(HittablePdf::new(target, origin))
}

// Recursive path tracer entry point: traces one camera ray and returns its
// radiance estimate. `depth` counts bounces already taken; the caller passes
// 0 for a primary ray.
pub fn trace(r: &Ray, scene: &Scene, depth: u32, rng: &mut Rng) -> Color {
    if depth >= scene.config.max_depth {
        return Color::black();
    }

    let hit = match scene.hit(r, 0.001, f64::INFINITY, rng) {
        Some(h) => h,
        None => return scene.background(r),
    };

    let emitted = hit.material.emitted(hit.u, hit.v, &hit.p);

    let scattered = match hit.material.scatter(r, &hit, rng) {
        ScatterResult::Absorbed => return emitted,
        ScatterResult::Specular {
            attenuation,
            scattered,
        } => {
            let incoming = trace(&scattered, scene, depth + 1, rng);
            return (emitted + attenuation * incoming).clamped_finite();
        }
        ScatterResult::Diffuse { attenuation, pdf } => (attenuation, pdf),
    };
    let (attenuation, material_pdf) = scattered;

    // Point/sun lights have no geometry for a continuous-PDF sample to land
    // on, so they are gathered by explicit shadow ray rather than folded into
    // the mixture PDF below, and added regardless of how that PDF turns out.
    let direct = direct_light_contribution(scene, &hit, r, &attenuation, rng);

    let light = light_pdf(scene, hit.p, rng);
    let scattered_dir = match &light {
        Some(light_pdf) => {
            let mixture = MixturePdf::new(material_pdf.as_ref(), light_pdf);
            mixture.generate(rng)
        }
        None => material_pdf.generate(rng),
    };
    let scattered_ray = Ray::new(hit.p, scattered_dir);

    let pdf_val = match &light {
        Some(light_pdf) => {
            0.5 * material_pdf.value(scattered_dir) + 0.5 * light_pdf.value(scattered_dir)
        }
        None => material_pdf.value(scattered_dir),
    };
    if pdf_val <= 0.0 {
        return (emitted + direct).clamped_finite();
    }

    let scattering_pdf = hit.material.scattering_pdf(r, &hit, &scattered_ray);
    if scattering_pdf <= 0.0 {
        return (emitted + direct).clamped_finite();
    }

    let mut weight = scattering_pdf / pdf_val;

    // Russian roulette: once fewer than ROULETTE_MARGIN bounces remain, kill
    // the path with probability (1 - q) and compensate survivors by 1/q so
    // the estimator stays unbiased.
    let remaining = scene.config.max_depth.saturating_sub(depth);
    if remaining <= ROULETTE_MARGIN {
        let q = crate::utils::clamp(attenuation.max_channel(), ROULETTE_MIN, ROULETTE_MAX);
        if rng.gen::<f64>() > q {
            return (emitted + direct).clamped_finite();
        }
        weight /= q;
    }

    let incoming = trace(&scattered_ray, scene, depth + 1, rng);
    (emitted + direct + attenuation * incoming * weight).clamped_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::material::{Emissive, Lambertian, Metal};
    use crate::scene::{Acceleration, Environment, Lighting, RenderConfig};
    use crate::shape::{Hittable, Sphere, SyncHittable};
    use crate::texture::SolidColor;
    use crate::vector::Vector3;

    fn lambert(color: Color) -> Arc<SolidColor> {
        Arc::new(SolidColor::new(color))
    }

    fn build_scene(primitives: Vec<Arc<SyncHittable>>) -> Scene {
        let camera = Camera::new(
            Point3::new(0.0, 1.0, 5.0),
            Point3::new(0.0, 0.5, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            40.0,
            1.0,
        );
        let mut config = RenderConfig::new(20, 20, 8, 8);
        config.acceleration = Acceleration::Linear;
        Scene::build(
            camera,
            Lighting::new(Environment::Solid(Color::black())),
            config,
            primitives,
        )
        .expect("scene should build")
    }

    #[test]
    fn miss_returns_background_color() {
        let camera = Camera::new(
            Point3::origin(),
            Point3::new(0.0, 0.0, -1.0),
            Vector3::new(0.0, 1.0, 0.0),
            40.0,
            1.0,
        );
        let mut config = RenderConfig::new(10, 10, 4, 4);
        config.acceleration = Acceleration::Linear;
        let scene = Scene::build(
            camera,
            Lighting::new(Environment::Solid(Color::new(0.1, 0.2, 0.3))),
            config,
            vec![Arc::new(Sphere::new(
                Point3::new(100.0, 100.0, 100.0),
                1.0,
                Arc::new(Lambertian::new(lambert(Color::white()))),
            ))],
        )
        .unwrap();

        let r = Ray::new(Point3::origin(), Vector3::new(0.0, 1.0, 0.0));
        let mut rng = Rng::for_draw(1, 0, 0, 0);
        let color = trace(&r, &scene, 0, &mut rng);
        assert_eq!(color.r(), 0.1);
        assert_eq!(color.g(), 0.2);
        assert_eq!(color.b(), 0.3);
    }

    #[test]
    fn depth_cap_returns_black_with_no_hit_contribution() {
        let scene = build_scene(vec![Arc::new(Sphere::new(
            Point3::new(0.0, 0.0, 0.0),
            1.0,
            Arc::new(Lambertian::new(lambert(Color::white()))),
        ))]);
        let r = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
        let mut rng = Rng::for_draw(1, 0, 0, 0);
        let color = trace(&r, &scene, scene.config.max_depth, &mut rng);
        assert_eq!(color.r(), 0.0);
        assert_eq!(color.g(), 0.0);
        assert_eq!(color.b(), 0.0);
    }

    #[test]
    fn emissive_sphere_contributes_its_own_radiance_directly() {
        let scene = build_scene(vec![Arc::new(Sphere::new(
            Point3::new(0.0, 0.0, 0.0),
            1.0,
            Arc::new(Emissive::new(Color::white(), 3.0)),
        ))]);
        let r = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
        let mut rng = Rng::for_draw(1, 0, 0, 0);
        let color = trace(&r, &scene, 0, &mut rng);
        assert!((color.r() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn metal_reflection_recurses_toward_a_second_surface() {
        let floor: Arc<SyncHittable> = Arc::new(Sphere::new(
            Point3::new(0.0, -1000.5, 0.0),
            1000.0,
            Arc::new(Metal::new(lambert(Color::new(0.8, 0.8, 0.8)), 0.0)),
        ));
        let emitter: Arc<SyncHittable> = Arc::new(Sphere::new(
            Point3::new(0.0, 5.0, 0.0),
            1.0,
            Arc::new(Emissive::new(Color::white(), 2.0)),
        ));
        let scene = build_scene(vec![floor, emitter]);
        let r = Ray::new(Point3::new(0.0, 2.0, 5.0), Vector3::new(0.0, -0.3, -1.0));
        let mut rng = Rng::for_draw(1, 0, 0, 0);
        let color = trace(&r, &scene, 0, &mut rng);
        assert!(color.r() >= 0.0 && color.r().is_finite());
    }
}
