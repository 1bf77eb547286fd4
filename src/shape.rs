use crate::aabb::Aabb;
use crate::material::SyncMaterial;
use crate::onb::OrthonormalBasis;
use crate::point::Point3;
use crate::ray::Ray;
use crate::utils;
use crate::vector::Vector3;

use rand::RngCore;
use std::f64;
use std::sync::Arc;

pub struct HitRecord {
    pub t: f64,
    pub p: Point3,
    pub normal: Vector3,
    pub front_face: bool,
    pub u: f64,
    pub v: f64,
    pub material: Arc<SyncMaterial>,
}

impl HitRecord {
    // Stores the normal on the side the ray arrived from: outward_normal when
    // the ray hit the front face, its negation otherwise.
    pub fn face_normal(ray_dir: Vector3, outward_normal: Vector3) -> (bool, Vector3) {
        let front_face = ray_dir.dot(outward_normal) < 0.0;
        let normal = if front_face {
            outward_normal
        } else {
            -outward_normal
        };
        (front_face, normal)
    }
}

pub trait Hittable {
    // `rng` is only consumed by primitives whose hit test is itself
    // stochastic (`ConstantMedium`'s free-path sampling); deterministic
    // shapes ignore it. Threading it through the whole traversal, rather than
    // reaching for a thread-local generator inside `ConstantMedium`, keeps
    // every draw reproducible from the (seed, tile, sample, bounce) tuple the
    // caller seeded it with.
    fn hit(&self, r: &Ray, t_min: f64, t_max: f64, rng: &mut dyn RngCore) -> Option<HitRecord>;
    fn bounding_box(&self) -> Option<Aabb>;

    // Next-event-estimation support: the solid-angle PDF of a ray from
    // `origin` in `direction` having been the one that connects to this
    // primitive, as though it were an area light. Non-light-eligible shapes
    // (most primitives) leave this at its default of zero.
    fn pdf_value(&self, _origin: Point3, _direction: Vector3) -> f64 {
        0.0
    }

    fn random_direction_from(&self, _origin: Point3, _rng: &mut dyn RngCore) -> Vector3 {
        Vector3::new(1.0, 0.0, 0.0)
    }

    // Scene construction uses this to discover emissive/important surfaces
    // worth explicit next-event-estimation sampling; most primitives have no
    // single associated material (e.g. a BVH node) and leave this at the
    // default.
    fn material(&self) -> Option<&SyncMaterial> {
        None
    }
}
pub type SyncHittable = dyn Hittable + Send + Sync;

pub struct Sphere {
    center: Point3,
    radius: f64,
    material: Arc<SyncMaterial>,
}

impl Sphere {
    pub fn new(center: Point3, radius: f64, material: Arc<SyncMaterial>) -> Sphere {
        Sphere {
            center,
            radius,
            material,
        }
    }

    fn uv(outward_normal: Vector3) -> (f64, f64) {
        let theta = (-outward_normal.y()).acos();
        let phi = (-outward_normal.z()).atan2(outward_normal.x()) + f64::consts::PI;
        (phi / (2.0 * f64::consts::PI), theta / f64::consts::PI)
    }
}

impl Hittable for Sphere {
    fn hit(&self, r: &Ray, t_min: f64, t_max: f64, _rng: &mut dyn RngCore) -> Option<HitRecord> {
        let oc = r.origin - self.center;
        let a = r.dir.length_squared();
        let half_b = oc.dot(r.dir);
        let c = oc.length_squared() - self.radius * self.radius;
        let discriminant = half_b * half_b - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrtd = discriminant.sqrt();

        let mut root = (-half_b - sqrtd) / a;
        if root <= t_min || root >= t_max {
            root = (-half_b + sqrtd) / a;
            if root <= t_min || root >= t_max {
                return None;
            }
        }

        let p = r.at(root);
        let outward_normal = (p - self.center) / self.radius;
        let (front_face, normal) = HitRecord::face_normal(r.dir, outward_normal);
        let (u, v) = Sphere::uv(outward_normal);

        Some(HitRecord {
            t: root,
            p,
            normal,
            front_face,
            u,
            v,
            material: Arc::clone(&self.material),
        })
    }

    fn bounding_box(&self) -> Option<Aabb> {
        let r = Vector3::new(self.radius, self.radius, self.radius);
        Some(Aabb::new(self.center - r, self.center + r))
    }

    // Cone sampling toward a sphere light (Shirley et al.): the direction
    // distribution is uniform over the solid angle subtended by the sphere
    // as seen from `origin`.
    fn pdf_value(&self, origin: Point3, direction: Vector3) -> f64 {
        let mut scratch_rng = crate::rng::Rng::new(0, 0);
        if self
            .hit(&Ray::new(origin, direction), 0.001, f64::INFINITY, &mut scratch_rng)
            .is_none()
        {
            return 0.0;
        }
        let distance_squared = (self.center - origin).length_squared();
        let cos_theta_max = (1.0 - self.radius * self.radius / distance_squared)
            .max(0.0)
            .sqrt();
        let solid_angle = 2.0 * f64::consts::PI * (1.0 - cos_theta_max);
        if solid_angle <= 0.0 {
            0.0
        } else {
            1.0 / solid_angle
        }
    }

    fn random_direction_from(&self, origin: Point3, rng: &mut dyn RngCore) -> Vector3 {
        let direction = self.center - origin;
        let distance_squared = direction.length_squared();
        let onb = OrthonormalBasis::new(direction);
        onb.local(utils::random_to_sphere(rng, self.radius, distance_squared))
    }

    fn material(&self) -> Option<&SyncMaterial> {
        Some(self.material.as_ref())
    }
}

// Owns the shared vertex/UV storage for a set of triangles; individual
// `Triangle`s index into it. Scene construction decomposes a mesh into
// triangle primitives fed to the BVH directly; `Mesh::hit` below remains a
// correct, if linear, fallback.
pub struct TriangleMesh {
    pub vertices: Vec<Point3>,
    pub tex_coords: Vec<(f64, f64)>,
    pub material: Arc<SyncMaterial>,
}

impl TriangleMesh {
    pub fn new(
        vertices: Vec<Point3>,
        tex_coords: Vec<(f64, f64)>,
        material: Arc<SyncMaterial>,
    ) -> TriangleMesh {
        TriangleMesh {
            vertices,
            tex_coords,
            material,
        }
    }
}

const TRIANGLE_PARALLEL_EPS: f64 = 1e-8;
const TRIANGLE_BOX_PAD: f64 = 1e-4;

pub struct Triangle {
    mesh: Arc<TriangleMesh>,
    v0: usize,
    v1: usize,
    v2: usize,
    t0: Option<usize>,
    t1: Option<usize>,
    t2: Option<usize>,
}

impl Triangle {
    pub fn new(
        mesh: Arc<TriangleMesh>,
        v0: usize,
        v1: usize,
        v2: usize,
        t0: Option<usize>,
        t1: Option<usize>,
        t2: Option<usize>,
    ) -> Result<Triangle, String> {
        let max_v = mesh.vertices.len();
        if v0 >= max_v || v1 >= max_v || v2 >= max_v {
            return Err(format!(
                "triangle mesh has {} vertices but a triangle referenced indices {}, {}, {}",
                max_v, v0, v1, v2
            ));
        }
        for t in [t0, t1, t2].iter().flatten() {
            if *t >= mesh.tex_coords.len() {
                return Err(format!(
                    "triangle mesh has {} texture coordinates but a triangle referenced index {}",
                    mesh.tex_coords.len(),
                    t
                ));
            }
        }
        Ok(Triangle {
            mesh,
            v0,
            v1,
            v2,
            t0,
            t1,
            t2,
        })
    }

    fn vertices(&self) -> (Point3, Point3, Point3) {
        (
            self.mesh.vertices[self.v0],
            self.mesh.vertices[self.v1],
            self.mesh.vertices[self.v2],
        )
    }
}

impl Hittable for Triangle {
    // Moller-Trumbore ray-triangle intersection.
    fn hit(&self, r: &Ray, t_min: f64, t_max: f64, _rng: &mut dyn RngCore) -> Option<HitRecord> {
        let (vertex0, vertex1, vertex2) = self.vertices();
        let edge1 = vertex1 - vertex0;
        let edge2 = vertex2 - vertex0;
        let p_vec = r.dir.cross(edge2);
        let determinant = edge1.dot(p_vec);

        if determinant.abs() < TRIANGLE_PARALLEL_EPS {
            return None;
        }
        let inv_det = 1.0 / determinant;

        let t_vec = r.origin - vertex0;
        let u = t_vec.dot(p_vec) * inv_det;
        if u < 0.0 || u > 1.0 {
            return None;
        }

        let q_vec = t_vec.cross(edge1);
        let v = r.dir.dot(q_vec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t_hit = edge2.dot(q_vec) * inv_det;
        if t_hit <= t_min || t_hit >= t_max {
            return None;
        }

        let mut outward_normal = edge1.cross(edge2).normalized();
        let (front_face, normal) = HitRecord::face_normal(r.dir, outward_normal);
        outward_normal = normal;

        // Moller-Trumbore's u/v are the barycentric weights of vertex1/vertex2
        // respectively, so w = 1 - u - v is vertex0's weight.
        let w = 1.0 - u - v;
        let (interp_u, interp_v) = match (self.t0, self.t1, self.t2) {
            (Some(t0), Some(t1), Some(t2)) => {
                let (u0, v0) = self.mesh.tex_coords[t0];
                let (u1, v1) = self.mesh.tex_coords[t1];
                let (u2, v2) = self.mesh.tex_coords[t2];
                (u0 * w + u1 * u + u2 * v, v0 * w + v1 * u + v2 * v)
            }
            _ => (u, v),
        };

        Some(HitRecord {
            t: t_hit,
            p: r.at(t_hit),
            normal: outward_normal,
            front_face,
            u: interp_u,
            v: interp_v,
            material: Arc::clone(&self.mesh.material),
        })
    }

    fn bounding_box(&self) -> Option<Aabb> {
        let (v0, v1, v2) = self.vertices();
        let pad = Vector3::new(TRIANGLE_BOX_PAD, TRIANGLE_BOX_PAD, TRIANGLE_BOX_PAD);
        let min = Point3::min(v0, Point3::min(v1, v2)) - pad;
        let max = Point3::max(v0, Point3::max(v1, v2)) + pad;
        Some(Aabb::new(min, max))
    }

    fn material(&self) -> Option<&SyncMaterial> {
        Some(self.mesh.material.as_ref())
    }
}

pub struct Mesh {
    mesh: Arc<TriangleMesh>,
    indices: Vec<(usize, usize, usize)>,
}

impl Mesh {
    pub fn new(mesh: Arc<TriangleMesh>, indices: Vec<(usize, usize, usize)>) -> Mesh {
        Mesh { mesh, indices }
    }

    // Decomposes this mesh into individual triangle primitives suitable for
    // direct inclusion in the global BVH.
    pub fn into_triangles(&self) -> Result<Vec<Arc<Triangle>>, String> {
        self.indices
            .iter()
            .map(|&(v0, v1, v2)| Triangle::new(Arc::clone(&self.mesh), v0, v1, v2, None, None, None).map(Arc::new))
            .collect()
    }
}

impl Hittable for Mesh {
    fn hit(&self, r: &Ray, t_min: f64, t_max: f64, rng: &mut dyn RngCore) -> Option<HitRecord> {
        let mut closest = t_max;
        let mut result = None;
        for &(v0, v1, v2) in &self.indices {
            if let Ok(tri) = Triangle::new(Arc::clone(&self.mesh), v0, v1, v2, None, None, None) {
                if let Some(rec) = tri.hit(r, t_min, closest, rng) {
                    closest = rec.t;
                    result = Some(rec);
                }
            }
        }
        result
    }

    fn bounding_box(&self) -> Option<Aabb> {
        let mut result: Option<Aabb> = None;
        for &(v0, v1, v2) in &self.indices {
            let tri = Triangle::new(Arc::clone(&self.mesh), v0, v1, v2, None, None, None).ok()?;
            let b = tri.bounding_box()?;
            result = Some(match result {
                Some(acc) => Aabb::surrounding(&acc, &b),
                None => b,
            });
        }
        result
    }

    fn material(&self) -> Option<&SyncMaterial> {
        Some(self.mesh.material.as_ref())
    }
}

pub struct Quad {
    q: Point3,
    u: Vector3,
    v: Vector3,
    normal: Vector3,
    d: f64,
    w: Vector3,
    material: Arc<SyncMaterial>,
}

const QUAD_PARALLEL_EPS: f64 = 1e-8;

impl Quad {
    pub fn new(q: Point3, u: Vector3, v: Vector3, material: Arc<SyncMaterial>) -> Quad {
        let n = u.cross(v);
        let normal = n.normalized();
        let d = normal.dot(q - Point3::origin());
        let w = n / n.dot(n);
        Quad {
            q,
            u,
            v,
            normal,
            d,
            w,
            material,
        }
    }

    pub fn area(&self) -> f64 {
        self.u.cross(self.v).length()
    }
}

impl Hittable for Quad {
    fn hit(&self, r: &Ray, t_min: f64, t_max: f64, _rng: &mut dyn RngCore) -> Option<HitRecord> {
        let denom = self.normal.dot(r.dir);
        if denom.abs() < QUAD_PARALLEL_EPS {
            return None;
        }
        let t = (self.d - self.normal.dot(r.origin - Point3::origin())) / denom;
        if t <= t_min || t >= t_max {
            return None;
        }

        let p = r.at(t);
        let p_rel = p - self.q;
        let alpha = self.w.dot(p_rel.cross(self.v));
        let beta = self.w.dot(self.u.cross(p_rel));
        if !(0.0..=1.0).contains(&alpha) || !(0.0..=1.0).contains(&beta) {
            return None;
        }

        let (front_face, normal) = HitRecord::face_normal(r.dir, self.normal);
        Some(HitRecord {
            t,
            p,
            normal,
            front_face,
            u: alpha,
            v: beta,
            material: Arc::clone(&self.material),
        })
    }

    fn bounding_box(&self) -> Option<Aabb> {
        let p0 = self.q;
        let p1 = self.q + self.u;
        let p2 = self.q + self.v;
        let p3 = self.q + self.u + self.v;
        let pad = Vector3::new(1e-4, 1e-4, 1e-4);
        let min = Point3::min(Point3::min(p0, p1), Point3::min(p2, p3)) - pad;
        let max = Point3::max(Point3::max(p0, p1), Point3::max(p2, p3)) + pad;
        Some(Aabb::new(min, max))
    }

    fn pdf_value(&self, origin: Point3, direction: Vector3) -> f64 {
        let mut scratch_rng = crate::rng::Rng::new(0, 0);
        match self.hit(&Ray::new(origin, direction), 0.001, f64::INFINITY, &mut scratch_rng) {
            Some(rec) => {
                let area = self.area();
                let distance_squared = rec.t * rec.t * direction.length_squared();
                let cosine = (direction.dot(rec.normal) / direction.length()).abs();
                if cosine < 1e-8 {
                    0.0
                } else {
                    distance_squared / (cosine * area)
                }
            }
            None => 0.0,
        }
    }

    fn random_direction_from(&self, origin: Point3, rng: &mut dyn RngCore) -> Vector3 {
        use rand::Rng;
        let alpha: f64 = rng.gen();
        let beta: f64 = rng.gen();
        let point_on_quad = self.q + (alpha * self.u) + (beta * self.v);
        point_on_quad - origin
    }

    fn material(&self) -> Option<&SyncMaterial> {
        Some(self.material.as_ref())
    }
}

pub struct Translate {
    inner: Arc<SyncHittable>,
    offset: Vector3,
}

impl Translate {
    pub fn new(inner: Arc<SyncHittable>, offset: Vector3) -> Translate {
        Translate { inner, offset }
    }
}

impl Hittable for Translate {
    fn hit(&self, r: &Ray, t_min: f64, t_max: f64, rng: &mut dyn RngCore) -> Option<HitRecord> {
        let moved = Ray::new(r.origin - self.offset, r.dir);
        let mut rec = self.inner.hit(&moved, t_min, t_max, rng)?;
        rec.p = rec.p + self.offset;
        Some(rec)
    }

    fn bounding_box(&self) -> Option<Aabb> {
        self.inner
            .bounding_box()
            .map(|b| Aabb::new(b.min + self.offset, b.max + self.offset))
    }

    fn pdf_value(&self, origin: Point3, direction: Vector3) -> f64 {
        self.inner.pdf_value(origin - self.offset, direction)
    }

    fn random_direction_from(&self, origin: Point3, rng: &mut dyn RngCore) -> Vector3 {
        self.inner.random_direction_from(origin - self.offset, rng)
    }

    fn material(&self) -> Option<&SyncMaterial> {
        self.inner.material()
    }
}

pub struct RotateY {
    inner: Arc<SyncHittable>,
    sin_theta: f64,
    cos_theta: f64,
    bbox: Option<Aabb>,
}

impl RotateY {
    pub fn new(inner: Arc<SyncHittable>, angle_degrees: f64) -> RotateY {
        let radians = angle_degrees.to_radians();
        let sin_theta = radians.sin();
        let cos_theta = radians.cos();

        let bbox = inner.bounding_box().map(|b| {
            let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
            let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
            for i in 0..2 {
                for j in 0..2 {
                    for k in 0..2 {
                        let x = i as f64 * b.max.x() + (1 - i) as f64 * b.min.x();
                        let y = j as f64 * b.max.y() + (1 - j) as f64 * b.min.y();
                        let z = k as f64 * b.max.z() + (1 - k) as f64 * b.min.z();

                        let new_x = cos_theta * x + sin_theta * z;
                        let new_z = -sin_theta * x + cos_theta * z;

                        let tester = Point3::new(new_x, y, new_z);
                        min = Point3::min(min, tester);
                        max = Point3::max(max, tester);
                    }
                }
            }
            Aabb::new(min, max)
        });

        RotateY {
            inner,
            sin_theta,
            cos_theta,
            bbox,
        }
    }

    fn to_local(&self, p: Vector3) -> Vector3 {
        Vector3::new(
            self.cos_theta * p.x() - self.sin_theta * p.z(),
            p.y(),
            self.sin_theta * p.x() + self.cos_theta * p.z(),
        )
    }

    fn to_world(&self, p: Vector3) -> Vector3 {
        Vector3::new(
            self.cos_theta * p.x() + self.sin_theta * p.z(),
            p.y(),
            -self.sin_theta * p.x() + self.cos_theta * p.z(),
        )
    }
}

impl Hittable for RotateY {
    fn hit(&self, r: &Ray, t_min: f64, t_max: f64, rng: &mut dyn RngCore) -> Option<HitRecord> {
        let origin = Point3::origin() + self.to_local(r.origin - Point3::origin());
        let direction = self.to_local(r.dir);
        let rotated = Ray::new(origin, direction);

        let mut rec = self.inner.hit(&rotated, t_min, t_max, rng)?;
        rec.p = Point3::origin() + self.to_world(rec.p - Point3::origin());
        let outward_normal = self.to_world(rec.normal);
        let (front_face, normal) = HitRecord::face_normal(r.dir, outward_normal);
        rec.front_face = front_face;
        rec.normal = normal;
        Some(rec)
    }

    fn bounding_box(&self) -> Option<Aabb> {
        self.bbox
    }

    fn material(&self) -> Option<&SyncMaterial> {
        self.inner.material()
    }
}

pub struct ConstantMedium {
    boundary: Arc<SyncHittable>,
    neg_inv_density: f64,
    phase_material: Arc<SyncMaterial>,
}

impl ConstantMedium {
    pub fn new(boundary: Arc<SyncHittable>, density: f64, phase_material: Arc<SyncMaterial>) -> ConstantMedium {
        ConstantMedium {
            boundary,
            neg_inv_density: -1.0 / density,
            phase_material,
        }
    }
}

impl Hittable for ConstantMedium {
    fn hit(&self, r: &Ray, t_min: f64, t_max: f64, rng: &mut dyn RngCore) -> Option<HitRecord> {
        let mut rec1 = self.boundary.hit(r, f64::NEG_INFINITY, f64::INFINITY, rng)?;
        let mut rec2 = self
            .boundary
            .hit(r, rec1.t + 1e-4, f64::INFINITY, rng)?;

        if rec1.t < t_min {
            rec1.t = t_min;
        }
        if rec2.t > t_max {
            rec2.t = t_max;
        }
        if rec1.t >= rec2.t {
            return None;
        }
        if rec1.t < 0.0 {
            rec1.t = 0.0;
        }

        let ray_length = r.dir.length();
        let distance_inside_boundary = (rec2.t - rec1.t) * ray_length;
        // Sample the scatter distance along an exponential distribution with
        // rate `density`; if it falls outside the boundary, there is no hit.
        let xi: f64 = {
            use rand::Rng;
            rng.gen_range(1e-12, 1.0)
        };
        let hit_distance = self.neg_inv_density * xi.ln();

        if hit_distance > distance_inside_boundary {
            return None;
        }

        let t = rec1.t + hit_distance / ray_length;
        Some(HitRecord {
            t,
            p: r.at(t),
            normal: Vector3::new(1.0, 0.0, 0.0),
            front_face: true,
            u: 0.0,
            v: 0.0,
            material: Arc::clone(&self.phase_material),
        })
    }

    fn bounding_box(&self) -> Option<Aabb> {
        self.boundary.bounding_box()
    }

    fn material(&self) -> Option<&SyncMaterial> {
        Some(self.phase_material.as_ref())
    }
}
