use crate::bvh::BvhNode;
use crate::camera::Camera;
use crate::color::Color;
use crate::error::{BuildError, ConfigError, GeometryError};
use crate::point::Point3;
use crate::ray::Ray;
use crate::shape::{HitRecord, Hittable, SyncHittable};
use crate::texture::SyncTexture;
use crate::vector::Vector3;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::f64;
use std::sync::Arc;

// Which acceleration structure `Scene::build` assembles the primitive list
// into. `Linear` is a correctness baseline the BVH is checked against;
// `Bvh` is what a real render uses.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub enum Acceleration {
    Linear,
    Bvh,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u32,
    pub max_depth: u32,
    pub acceleration: Acceleration,
    pub tile_size: u32,
    pub seed: u64,
}

impl RenderConfig {
    pub fn new(width: u32, height: u32, samples_per_pixel: u32, max_depth: u32) -> RenderConfig {
        RenderConfig {
            width,
            height,
            samples_per_pixel,
            max_depth,
            acceleration: Acceleration::Bvh,
            tile_size: 32,
            seed: 0,
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    // Surfaces every malformed dimension/sample/depth before a single ray is
    // cast.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::ZeroDimension {
                width: self.width,
                height: self.height,
            });
        }
        if self.samples_per_pixel == 0 {
            return Err(ConfigError::ZeroSamples);
        }
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        Ok(())
    }
}

// A directional light at effectively infinite distance. `direction` points
// from the scene toward the sun; `angular_radius` (radians) gives the cone
// sampled for soft shadows.
pub struct Sun {
    pub direction: Vector3,
    pub color: Color,
    pub intensity: f64,
    pub angular_radius: f64,
}

impl Sun {
    pub fn new(direction: Vector3, color: Color, intensity: f64, angular_radius: f64) -> Sun {
        Sun {
            direction: direction.normalized(),
            color,
            intensity,
            angular_radius: angular_radius.max(1e-4),
        }
    }

    pub fn radiance(&self) -> Color {
        self.color * self.intensity
    }
}

pub struct PointLight {
    pub position: Point3,
    pub color: Color,
    pub intensity: f64,
}

impl PointLight {
    pub fn new(position: Point3, color: Color, intensity: f64) -> PointLight {
        PointLight {
            position,
            color,
            intensity,
        }
    }

    // Inverse-square falloff from `from` to this light's position.
    pub fn radiance_at(&self, from: Point3) -> Color {
        let distance_squared = (self.position - from).length_squared().max(1e-6);
        self.color * (self.intensity / distance_squared)
    }
}

// Background a ray reports when it escapes the scene entirely.
pub enum Environment {
    Solid(Color),
    Gradient { bottom: Color, top: Color },
    // Radiance-mapped equirectangular image, a Y-axis rotation (radians) and
    // an intensity scalar applied on lookup.
    Hdri {
        texture: Arc<SyncTexture>,
        intensity: f64,
        rotation: f64,
    },
}

impl Environment {
    pub fn sample(&self, dir: Vector3) -> Color {
        match self {
            Environment::Solid(c) => *c,
            Environment::Gradient { bottom, top } => {
                let t = 0.5 * (dir.normalized().y() + 1.0);
                *bottom * (1.0 - t) + *top * t
            }
            Environment::Hdri {
                texture,
                intensity,
                rotation,
            } => {
                let d = dir.normalized();
                let rotated_x = d.x() * rotation.cos() - d.z() * rotation.sin();
                let rotated_z = d.x() * rotation.sin() + d.z() * rotation.cos();
                let u = 0.5 + rotated_z.atan2(rotated_x) / (2.0 * f64::consts::PI);
                let v = 0.5 - d.y().asin() / f64::consts::PI;
                texture.value(u, v, &Point3::origin()) * *intensity
            }
        }
    }

    // Whether this environment already bakes in its own lighting (HDRI), in
    // which case the sun disc is not separately drawn on top of it: the sun
    // disc is only added to the non-HDRI sky-gradient case.
    fn is_hdri(&self) -> bool {
        matches!(self, Environment::Hdri { .. })
    }
}

pub struct Lighting {
    pub sun: Option<Sun>,
    pub points: Vec<PointLight>,
    pub environment: Environment,
}

impl Lighting {
    pub fn new(environment: Environment) -> Lighting {
        Lighting {
            sun: None,
            points: Vec::new(),
            environment,
        }
    }

    pub fn with_sun(mut self, sun: Sun) -> Lighting {
        self.sun = Some(sun);
        self
    }

    pub fn with_point(mut self, light: PointLight) -> Lighting {
        self.points.push(light);
        self
    }
}

enum Primitives {
    Linear(Vec<Arc<SyncHittable>>),
    Bvh(BvhNode),
}

impl Primitives {
    fn hit(&self, r: &Ray, t_min: f64, t_max: f64, rng: &mut dyn RngCore) -> Option<HitRecord> {
        match self {
            Primitives::Linear(prims) => {
                let mut closest = t_max;
                let mut result = None;
                for p in prims {
                    if let Some(rec) = p.hit(r, t_min, closest, rng) {
                        closest = rec.t;
                        result = Some(rec);
                    }
                }
                result
            }
            Primitives::Bvh(bvh) => bvh.hit(r, t_min, t_max, rng),
        }
    }
}

// Everything the tile renderer and integrator need to trace a ray: the
// acceleration structure, the camera, the lights, and render-wide knobs.
// Only `Scene::build` can fail; once constructed, tracing never errors.
pub struct Scene {
    pub camera: Camera,
    pub lighting: Lighting,
    pub config: RenderConfig,
    primitives: Primitives,
    important: Vec<Arc<SyncHittable>>,
}

impl Scene {
    pub fn build(
        camera: Camera,
        lighting: Lighting,
        config: RenderConfig,
        primitives: Vec<Arc<SyncHittable>>,
    ) -> Result<Scene, BuildError> {
        config.validate()?;

        let important = primitives
            .iter()
            .filter(|p| p.material().map_or(false, |m| m.is_important()))
            .cloned()
            .collect();

        let assembled = match config.acceleration {
            Acceleration::Linear => Primitives::Linear(primitives),
            Acceleration::Bvh => {
                if primitives.is_empty() {
                    return Err(BuildError::Geometry(GeometryError(String::from(
                        "cannot build a scene with no primitives",
                    ))));
                }
                Primitives::Bvh(BvhNode::build(primitives)?)
            }
        };

        Ok(Scene {
            camera,
            lighting,
            config,
            primitives: assembled,
            important,
        })
    }

    pub fn hit(&self, r: &Ray, t_min: f64, t_max: f64, rng: &mut dyn RngCore) -> Option<HitRecord> {
        self.primitives.hit(r, t_min, t_max, rng)
    }

    // Primitives worth explicit next-event-estimation sampling; empty for a
    // scene with no emissive surfaces.
    pub fn important_primitives(&self) -> &[Arc<SyncHittable>] {
        &self.important
    }

    // A ray that escapes the scene samples the environment, plus (for a
    // non-HDRI sky) the sun disc when the ray looks directly within its
    // angular radius.
    pub fn background(&self, r: &Ray) -> Color {
        let base = self.lighting.environment.sample(r.dir);
        match &self.lighting.sun {
            Some(sun) if !self.lighting.environment.is_hdri() => {
                let cos_angle = r.dir.normalized().dot(sun.direction);
                if cos_angle > sun.angular_radius.cos() {
                    base + sun.radiance()
                } else {
                    base
                }
            }
            _ => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::material::{Emissive, Lambertian};
    use crate::shape::Sphere;
    use crate::texture::SolidColor;

    fn camera() -> Camera {
        Camera::new(
            Point3::new(0.0, 0.0, 3.0),
            Point3::origin(),
            Vector3::new(0.0, 1.0, 0.0),
            40.0,
            1.0,
        )
    }

    fn lambert() -> Arc<SyncHittable> {
        Arc::new(Sphere::new(
            Point3::origin(),
            1.0,
            Arc::new(Lambertian::new(Arc::new(SolidColor::new(Color::new(
                0.5, 0.5, 0.5,
            ))))),
        ))
    }

    #[test]
    fn build_rejects_zero_samples() {
        let mut config = RenderConfig::new(10, 10, 0, 5);
        config.acceleration = Acceleration::Linear;
        let result = Scene::build(
            camera(),
            Lighting::new(Environment::Solid(Color::black())),
            config,
            vec![lambert()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn build_collects_emissive_primitives_as_important() {
        let emitter: Arc<SyncHittable> = Arc::new(Sphere::new(
            Point3::new(2.0, 2.0, 2.0),
            0.5,
            Arc::new(Emissive::new(Color::white(), 4.0)),
        ));
        let mut config = RenderConfig::new(10, 10, 4, 5);
        config.acceleration = Acceleration::Linear;
        let scene = Scene::build(
            camera(),
            Lighting::new(Environment::Solid(Color::black())),
            config,
            vec![lambert(), emitter],
        )
        .expect("scene should build");
        assert_eq!(scene.important_primitives().len(), 1);
    }

    #[test]
    fn bvh_and_linear_acceleration_agree_on_a_direct_hit() {
        let ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));

        let mut linear_config = RenderConfig::new(10, 10, 4, 5);
        linear_config.acceleration = Acceleration::Linear;
        let linear = Scene::build(
            camera(),
            Lighting::new(Environment::Solid(Color::black())),
            linear_config,
            vec![lambert()],
        )
        .unwrap();

        let mut bvh_config = RenderConfig::new(10, 10, 4, 5);
        bvh_config.acceleration = Acceleration::Bvh;
        let bvh = Scene::build(
            camera(),
            Lighting::new(Environment::Solid(Color::black())),
            bvh_config,
            vec![lambert()],
        )
        .unwrap();

        let mut rng = crate::rng::Rng::new(0, 0);
        let a = linear.hit(&ray, 0.001, f64::INFINITY, &mut rng).unwrap();
        let b = bvh.hit(&ray, 0.001, f64::INFINITY, &mut rng).unwrap();
        assert!((a.t - b.t).abs() < 1e-9);
    }

    #[test]
    fn gradient_environment_interpolates_by_vertical_component() {
        let env = Environment::Gradient {
            bottom: Color::black(),
            top: Color::white(),
        };
        let up = env.sample(Vector3::new(0.0, 1.0, 0.0));
        let down = env.sample(Vector3::new(0.0, -1.0, 0.0));
        assert!(up.r() > down.r());
    }

    #[test]
    fn background_adds_sun_disc_looking_straight_at_it() {
        let lighting = Lighting::new(Environment::Gradient {
            bottom: Color::black(),
            top: Color::black(),
        })
        .with_sun(Sun::new(
            Vector3::new(0.0, 1.0, 0.0),
            Color::white(),
            5.0,
            0.05,
        ));
        let config = RenderConfig::new(4, 4, 1, 1);
        let scene = Scene::build(camera(), lighting, config, vec![lambert()]).unwrap();

        let toward_sun = Ray::new(Point3::origin(), Vector3::new(0.0, 1.0, 0.0));
        let away_from_sun = Ray::new(Point3::origin(), Vector3::new(0.0, -1.0, 0.0));
        assert!(scene.background(&toward_sun).r() > 0.0);
        assert_eq!(scene.background(&away_from_sun).r(), 0.0);
    }

    #[test]
    fn hdri_environment_does_not_draw_a_separate_sun_disc() {
        let tex: Arc<SyncTexture> = Arc::new(crate::texture::SolidColor::new(Color::new(
            0.2, 0.2, 0.2,
        )));
        let lighting = Lighting::new(Environment::Hdri {
            texture: tex,
            intensity: 1.0,
            rotation: 0.0,
        })
        .with_sun(Sun::new(
            Vector3::new(0.0, 1.0, 0.0),
            Color::white(),
            5.0,
            0.05,
        ));
        let config = RenderConfig::new(4, 4, 1, 1);
        let scene = Scene::build(camera(), lighting, config, vec![lambert()]).unwrap();

        let toward_sun = Ray::new(Point3::origin(), Vector3::new(0.0, 1.0, 0.0));
        let c = scene.background(&toward_sun);
        assert!((c.r() - 0.2).abs() < 1e-9);
    }
}
