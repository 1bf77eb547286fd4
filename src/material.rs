use crate::color::Color;
use crate::pdf::{CosinePdf, Pdf};
use crate::point::Point3;
use crate::ray::Ray;
use crate::shape::HitRecord;
use crate::texture::SyncTexture;
use crate::utils;
use crate::vector::Vector3;

use rand::{Rng, RngCore};
use std::f64;
use std::sync::Arc;

fn reflect(v: Vector3, n: Vector3) -> Vector3 {
    v - 2.0 * v.dot(n) * n
}

fn refract(v: Vector3, n: Vector3, etai_over_etat: f64) -> Vector3 {
    let cos_theta = (-v).dot(n).min(1.0);
    let r_out_perp = etai_over_etat * (v + cos_theta * n);
    let r_out_parallel = -((1.0 - r_out_perp.length_squared()).max(0.0).sqrt()) * n;
    r_out_perp + r_out_parallel
}

fn schlick(cosine: f64, refractive_index: f64) -> f64 {
    let r0 = (1.0 - refractive_index) / (1.0 + refractive_index);
    let r0 = r0 * r0;
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

fn fresnel_schlick_color(cosine: f64, f0: Color) -> Color {
    let one_minus = (1.0 - cosine).max(0.0).powi(5);
    f0 + (Color::white() - f0) * one_minus
}

fn schlick_fresnel(cosine: f64, f0: f64) -> f64 {
    f0 + (1.0 - f0) * (1.0 - cosine).max(0.0).powi(5)
}

// Outcome of `Material::scatter`: absorbed (path dies), specular (a single
// deterministic outgoing ray; its PDF is a delta function and must be
// bypassed, not mixed, by the integrator), or diffuse (a non-deterministic
// ray drawn from `pdf`, whose density the integrator combines with a
// light-sampling PDF for MIS).
pub enum ScatterResult {
    Absorbed,
    Specular {
        attenuation: Color,
        scattered: Ray,
    },
    Diffuse {
        attenuation: Color,
        pdf: Box<dyn Pdf>,
    },
}

pub trait Material {
    fn scatter(&self, ray_in: &Ray, hit: &HitRecord, rng: &mut dyn RngCore) -> ScatterResult;

    // Only meaningful for the Diffuse variant: the material's own density
    // for having produced `scattered`, used by the integrator alongside the
    // mixture PDF's density to weight the contribution.
    fn scattering_pdf(&self, _ray_in: &Ray, _hit: &HitRecord, _scattered: &Ray) -> f64 {
        0.0
    }

    fn emitted(&self, _u: f64, _v: f64, _p: &Point3) -> Color {
        Color::black()
    }

    // Scene construction flags surfaces worth explicit next-event-estimation
    // sampling this way; emissive surfaces are the only variant that
    // currently qualifies.
    fn is_important(&self) -> bool {
        false
    }
}
pub type SyncMaterial = dyn Material + Send + Sync;

pub struct Lambertian {
    albedo: Arc<SyncTexture>,
}

impl Lambertian {
    pub fn new(albedo: Arc<SyncTexture>) -> Lambertian {
        Lambertian { albedo }
    }
}

impl Material for Lambertian {
    fn scatter(&self, _ray_in: &Ray, hit: &HitRecord, _rng: &mut dyn RngCore) -> ScatterResult {
        ScatterResult::Diffuse {
            attenuation: self.albedo.value(hit.u, hit.v, &hit.p),
            pdf: Box::new(CosinePdf::new(hit.normal)),
        }
    }

    fn scattering_pdf(&self, _ray_in: &Ray, hit: &HitRecord, scattered: &Ray) -> f64 {
        let cosine = hit.normal.dot(scattered.dir.normalized());
        if cosine < 0.0 {
            0.0
        } else {
            cosine / f64::consts::PI
        }
    }
}

pub struct Metal {
    albedo: Arc<SyncTexture>,
    fuzz: f64,
}

impl Metal {
    pub fn new(albedo: Arc<SyncTexture>, fuzz: f64) -> Metal {
        Metal {
            albedo,
            fuzz: utils::clamp(fuzz, 0.0, 1.0),
        }
    }
}

impl Material for Metal {
    fn scatter(&self, ray_in: &Ray, hit: &HitRecord, rng: &mut dyn RngCore) -> ScatterResult {
        let reflected = reflect(ray_in.dir.normalized(), hit.normal);
        let scattered_dir = reflected + self.fuzz * utils::random_in_unit_sphere(rng);
        if scattered_dir.dot(hit.normal) <= 0.0 {
            return ScatterResult::Absorbed;
        }
        ScatterResult::Specular {
            attenuation: self.albedo.value(hit.u, hit.v, &hit.p),
            scattered: Ray::new(hit.p, scattered_dir),
        }
    }
}

pub struct Dielectric {
    refractive_index: f64,
    tint: Color,
}

impl Dielectric {
    pub fn new(refractive_index: f64) -> Dielectric {
        Dielectric {
            refractive_index,
            tint: Color::white(),
        }
    }

    pub fn tinted(refractive_index: f64, tint: Color) -> Dielectric {
        Dielectric {
            refractive_index,
            tint,
        }
    }
}

impl Material for Dielectric {
    fn scatter(&self, ray_in: &Ray, hit: &HitRecord, rng: &mut dyn RngCore) -> ScatterResult {
        let refraction_ratio = if hit.front_face {
            1.0 / self.refractive_index
        } else {
            self.refractive_index
        };

        let unit_direction = ray_in.dir.normalized();
        let cos_theta = (-unit_direction).dot(hit.normal).min(1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

        let cannot_refract = refraction_ratio * sin_theta > 1.0;
        let direction = if cannot_refract || schlick(cos_theta, refraction_ratio) > rng.gen() {
            reflect(unit_direction, hit.normal)
        } else {
            refract(unit_direction, hit.normal, refraction_ratio)
        };

        ScatterResult::Specular {
            attenuation: self.tint,
            scattered: Ray::new(hit.p, direction),
        }
    }
}

pub struct Emissive {
    emission: Color,
    intensity: f64,
}

impl Emissive {
    pub fn new(emission: Color, intensity: f64) -> Emissive {
        Emissive {
            emission,
            intensity,
        }
    }
}

impl Material for Emissive {
    fn scatter(&self, _ray_in: &Ray, _hit: &HitRecord, _rng: &mut dyn RngCore) -> ScatterResult {
        ScatterResult::Absorbed
    }

    fn emitted(&self, _u: f64, _v: f64, _p: &Point3) -> Color {
        self.emission * self.intensity
    }

    fn is_important(&self) -> bool {
        true
    }
}

pub struct Isotropic {
    albedo: Arc<SyncTexture>,
}

impl Isotropic {
    pub fn new(albedo: Arc<SyncTexture>) -> Isotropic {
        Isotropic { albedo }
    }
}

impl Material for Isotropic {
    fn scatter(&self, _ray_in: &Ray, hit: &HitRecord, rng: &mut dyn RngCore) -> ScatterResult {
        ScatterResult::Specular {
            attenuation: self.albedo.value(hit.u, hit.v, &hit.p),
            scattered: Ray::new(hit.p, utils::random_unit_vector(rng)),
        }
    }
}

// Subsurface scattering approximation: each scatter call either bounces off
// the surface (probability given by a Fresnel term) or simulates a photon
// that entered the material and re-emerged, tinted toward `scatter_color` in
// proportion to how grazing the view angle is. Reported as a Specular scatter
// since the re-emergence direction has no closed-form PDF.
pub struct Sss {
    surface_albedo: Arc<SyncTexture>,
    scatter_color: Color,
    scatter_distance: f64,
    roughness: f64,
}

impl Sss {
    pub fn new(
        surface_albedo: Arc<SyncTexture>,
        scatter_color: Color,
        scatter_distance: f64,
        roughness: f64,
    ) -> Sss {
        Sss {
            surface_albedo,
            scatter_color,
            scatter_distance,
            roughness: utils::clamp(roughness, 0.04, 1.0),
        }
    }
}

impl Material for Sss {
    fn scatter(&self, ray_in: &Ray, hit: &HitRecord, rng: &mut dyn RngCore) -> ScatterResult {
        let base_color = self.surface_albedo.value(hit.u, hit.v, &hit.p);
        let unit_direction = ray_in.dir.normalized();
        let cos_theta = (-unit_direction).dot(hit.normal).min(1.0);
        let fresnel = schlick_fresnel(cos_theta, 0.04);

        let (attenuation, mut scatter_direction) =
            if rng.gen::<f64>() < fresnel * (1.0 - self.roughness * 0.5) {
                let reflected = reflect(unit_direction, hit.normal);
                let dir = reflected + self.roughness * utils::random_in_unit_sphere(rng);
                (Color::white(), dir)
            } else {
                // More of the subsurface tint shows through at grazing angles.
                let sss_factor = 0.4 * (1.0 - cos_theta);
                let mixed_color =
                    base_color * (1.0 - sss_factor) + self.scatter_color * sss_factor;
                let random_dir = utils::random_unit_vector(rng);
                let forward_bias = -unit_direction * 0.2;
                let dir = hit.normal + random_dir + forward_bias;
                (mixed_color, dir)
            };
        if scatter_direction.near_zero() {
            scatter_direction = hit.normal;
        }

        let scattered = Ray::new(hit.p, scatter_direction.normalized());
        // A photon that scattered back out below the surface still emerges
        // some of the time, same as the original's 10% escape probability.
        if scattered.dir.dot(hit.normal) > 0.0 || rng.gen::<f64>() < 0.1 {
            ScatterResult::Specular {
                attenuation,
                scattered,
            }
        } else {
            ScatterResult::Absorbed
        }
    }
}

// Cook-Torrance-flavored material implemented as a stochastic branch rather
// than an analytic split: each scatter call either samples a perturbed
// specular lobe or a cosine-weighted diffuse lobe, chosen with probability
// equal to the Fresnel term.
pub struct Pbr {
    albedo: Arc<SyncTexture>,
    metallic: f64,
    roughness: f64,
}

impl Pbr {
    pub fn new(albedo: Arc<SyncTexture>, metallic: f64, roughness: f64) -> Pbr {
        Pbr {
            albedo,
            metallic: utils::clamp(metallic, 0.0, 1.0),
            roughness: utils::clamp(roughness, 0.04, 1.0),
        }
    }
}

impl Material for Pbr {
    fn scatter(&self, ray_in: &Ray, hit: &HitRecord, rng: &mut dyn RngCore) -> ScatterResult {
        let albedo = self.albedo.value(hit.u, hit.v, &hit.p);
        let dielectric_f0 = Color::new(0.04, 0.04, 0.04);
        let f0 = dielectric_f0 * (1.0 - self.metallic) + albedo * self.metallic;

        let cos_theta = (-ray_in.dir.normalized()).dot(hit.normal).max(0.0);
        let fresnel = fresnel_schlick_color(cos_theta, f0);
        let branch_probability = utils::clamp(fresnel.max_channel(), 0.05, 0.95);

        if rng.gen::<f64>() < branch_probability {
            let reflected = reflect(ray_in.dir.normalized(), hit.normal);
            let scattered_dir = reflected + self.roughness * utils::random_in_unit_sphere(rng);
            if scattered_dir.dot(hit.normal) <= 0.0 {
                return ScatterResult::Absorbed;
            }
            let specular_tint = Color::white() * (1.0 - self.metallic) + albedo * self.metallic;
            ScatterResult::Specular {
                attenuation: specular_tint,
                scattered: Ray::new(hit.p, scattered_dir),
            }
        } else {
            ScatterResult::Diffuse {
                attenuation: albedo,
                pdf: Box::new(CosinePdf::new(hit.normal)),
            }
        }
    }

    fn scattering_pdf(&self, _ray_in: &Ray, hit: &HitRecord, scattered: &Ray) -> f64 {
        let cosine = hit.normal.dot(scattered.dir.normalized());
        if cosine < 0.0 {
            0.0
        } else {
            cosine / f64::consts::PI
        }
    }
}

// Trowbridge-Reitz (GGX) microfacet BRDF. The half-vector is importance
// sampled in the local frame around the shading normal, reflected to get the
// outgoing direction, and the full BRDF weight (including the 1/pdf of that
// sample) is folded directly into the returned attenuation, so the result is
// reported as a Specular scatter even though the lobe has real width.
pub struct Ggx {
    albedo: Arc<SyncTexture>,
    roughness: f64,
}

impl Ggx {
    pub fn new(albedo: Arc<SyncTexture>, roughness: f64) -> Ggx {
        Ggx {
            albedo,
            roughness: utils::clamp(roughness, 0.04, 1.0),
        }
    }
}

const FIREFLY_CLAMP: f64 = 10.0;

impl Material for Ggx {
    fn scatter(&self, ray_in: &Ray, hit: &HitRecord, rng: &mut dyn RngCore) -> ScatterResult {
        let albedo = self.albedo.value(hit.u, hit.v, &hit.p);
        let n = hit.normal;
        let v = -ray_in.dir.normalized();
        let alpha = self.roughness * self.roughness;

        let onb = crate::onb::OrthonormalBasis::new(n);
        let r1: f64 = rng.gen();
        let r2: f64 = rng.gen();
        let cos_theta_h = ((1.0 - r2) / (r2 * (alpha * alpha - 1.0) + 1.0))
            .max(0.0)
            .sqrt();
        let sin_theta_h = (1.0 - cos_theta_h * cos_theta_h).max(0.0).sqrt();
        let phi_h = 2.0 * f64::consts::PI * r1;
        let h_local = Vector3::new(
            sin_theta_h * phi_h.cos(),
            sin_theta_h * phi_h.sin(),
            cos_theta_h,
        );
        let h = onb.local(h_local);
        let l = reflect(-v, h);

        let n_dot_l = n.dot(l);
        if n_dot_l <= 0.0 {
            return ScatterResult::Absorbed;
        }
        let n_dot_v = n.dot(v).max(1e-4);
        let n_dot_h = n.dot(h).max(0.0);
        let v_dot_h = v.dot(h).max(0.0);

        let d = ggx_distribution(n_dot_h, alpha);
        let g = geometry_smith_schlick_ggx(n_dot_v, n_dot_l, self.roughness);
        let f0 = Color::new(0.04, 0.04, 0.04);
        let f = fresnel_schlick_color(v_dot_h, f0);

        let specular = f * (d * g / (4.0 * n_dot_v * n_dot_l).max(1e-4));
        let k_d = Color::white() - f;
        let diffuse = k_d * albedo * (1.0 / f64::consts::PI);

        let pdf_h = d * n_dot_h / (4.0 * v_dot_h).max(1e-4);
        let weight = if pdf_h > 1e-6 { 1.0 / pdf_h } else { 0.0 };

        let attenuation = (specular + diffuse) * (n_dot_l * weight);
        let clamp_channel = |c: f64| c.min(FIREFLY_CLAMP).max(0.0);
        let attenuation = Color::new(
            clamp_channel(attenuation.r()),
            clamp_channel(attenuation.g()),
            clamp_channel(attenuation.b()),
        );

        ScatterResult::Specular {
            attenuation,
            scattered: Ray::new(hit.p, l),
        }
    }
}

fn ggx_distribution(n_dot_h: f64, alpha: f64) -> f64 {
    let a2 = alpha * alpha;
    let denom = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (f64::consts::PI * denom * denom).max(1e-8)
}

fn geometry_schlick_ggx(n_dot_x: f64, roughness: f64) -> f64 {
    let k = (roughness + 1.0) * (roughness + 1.0) / 8.0;
    n_dot_x / (n_dot_x * (1.0 - k) + k)
}

fn geometry_smith_schlick_ggx(n_dot_v: f64, n_dot_l: f64, roughness: f64) -> f64 {
    geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect_about_surface_normal() {
        let v = Vector3::new(1.0, -1.0, 0.0);
        let n = Vector3::new(0.0, 1.0, 0.0);
        let r = reflect(v, n);
        assert!((r.x() - 1.0).abs() < 1e-9);
        assert!((r.y() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn schlick_is_full_reflectance_at_grazing_angle() {
        let r = schlick(0.0, 1.5);
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn schlick_matches_base_reflectance_at_normal_incidence() {
        let r0 = ((1.0 - 1.5) / (1.0 + 1.5)) * ((1.0 - 1.5) / (1.0 + 1.5));
        let r = schlick(1.0, 1.5);
        assert!((r - r0).abs() < 1e-9);
    }

    #[test]
    fn schlick_fresnel_matches_direct_formula() {
        assert!((schlick_fresnel(0.0, 0.04) - 1.0).abs() < 1e-9);
        assert!((schlick_fresnel(1.0, 0.04) - 0.04).abs() < 1e-9);
    }

    #[test]
    fn sss_never_produces_a_diffuse_pdf_scatter() {
        let sss = Sss::new(
            Arc::new(crate::texture::SolidColor::new(Color::new(0.8, 0.6, 0.5))),
            Color::new(0.9, 0.3, 0.3),
            0.5,
            0.3,
        );
        let hit = HitRecord {
            t: 1.0,
            p: Point3::origin(),
            normal: Vector3::new(0.0, 1.0, 0.0),
            front_face: true,
            u: 0.0,
            v: 0.0,
            material: Arc::new(Dielectric::new(1.5)),
        };
        let ray_in = Ray::new(Point3::new(0.0, 1.0, 0.0), Vector3::new(0.0, -1.0, 0.0));
        for seed in 0..32 {
            let mut rng = crate::rng::Rng::new(seed, 0);
            match sss.scatter(&ray_in, &hit, &mut rng) {
                ScatterResult::Diffuse { .. } => panic!("Sss has no closed-form PDF branch"),
                ScatterResult::Specular { attenuation, .. } => {
                    assert!(attenuation.r() >= 0.0 && attenuation.r().is_finite());
                }
                ScatterResult::Absorbed => {}
            }
        }
    }
}
