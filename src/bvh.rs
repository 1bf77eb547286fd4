use crate::aabb::Aabb;
use crate::error::GeometryError;
use crate::ray::Ray;
use crate::shape::{HitRecord, Hittable, SyncHittable};
use crate::vector::Axis;

use rand::RngCore;
use std::cmp::Ordering;
use std::sync::Arc;

// Either a further split (another BvhNode) or a primitive directly. Kept as
// its own enum, rather than boxing everything behind `Arc<dyn Hittable>`,
// so BVH statistics (`BvhNode::count_leaves`) can recurse without needing
// runtime downcasting.
enum BvhChild {
    Leaf(Arc<SyncHittable>),
    Node(Box<BvhNode>),
}

impl BvhChild {
    fn bounding_box(&self) -> Aabb {
        match self {
            // Validated finite at `BvhNode::build` time.
            BvhChild::Leaf(p) => p.bounding_box().unwrap(),
            BvhChild::Node(n) => n.bbox,
        }
    }

    fn hit(&self, r: &Ray, t_min: f64, t_max: f64, rng: &mut dyn RngCore) -> Option<HitRecord> {
        match self {
            BvhChild::Leaf(p) => p.hit(r, t_min, t_max, rng),
            BvhChild::Node(n) => n.hit(r, t_min, t_max, rng),
        }
    }

    fn count_leaves_into(&self, count: &mut usize) {
        match self {
            BvhChild::Leaf(_) => *count += 1,
            BvhChild::Node(n) => *count += n.count_leaves(),
        }
    }

    // True only for the degenerate size-1 split, where left and right are
    // both the same `Arc`; used to avoid double-counting that single
    // primitive in BVH statistics.
    fn same_leaf_as(&self, other: &BvhChild) -> bool {
        match (self, other) {
            (BvhChild::Leaf(a), BvhChild::Leaf(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// Binary tree over primitives: every node owns a left and a right child,
// each itself a primitive, with a cached AABB equal to the union of both
// children's boxes.
pub struct BvhNode {
    left: BvhChild,
    right: BvhChild,
    bbox: Aabb,
}

impl BvhNode {
    pub fn build(mut prims: Vec<Arc<SyncHittable>>) -> Result<BvhNode, GeometryError> {
        if prims.is_empty() {
            return Err(GeometryError(String::from(
                "cannot build a BVH from an empty primitive list",
            )));
        }
        for p in &prims {
            match p.bounding_box() {
                Some(b) if is_finite(&b) => {}
                _ => {
                    return Err(GeometryError(String::from(
                        "a primitive reported no finite bounding box at BVH build time",
                    )))
                }
            }
        }
        Ok(Self::build_range(&mut prims))
    }

    fn build_range(prims: &mut [Arc<SyncHittable>]) -> BvhNode {
        let combined = prims
            .iter()
            .fold(Aabb::empty(), |acc, p| Aabb::surrounding(&acc, &p.bounding_box().unwrap()));
        let axis = combined.longest_axis();

        match prims.len() {
            1 => {
                let a = Arc::clone(&prims[0]);
                let b = Arc::clone(&prims[0]);
                BvhNode {
                    left: BvhChild::Leaf(a),
                    right: BvhChild::Leaf(b),
                    bbox: combined,
                }
            }
            2 => {
                let a = Arc::clone(&prims[0]);
                let b = Arc::clone(&prims[1]);
                let a_min = a.bounding_box().unwrap().min[axis];
                let b_min = b.bounding_box().unwrap().min[axis];
                let (left, right) = if a_min <= b_min { (a, b) } else { (b, a) };
                BvhNode {
                    left: BvhChild::Leaf(left),
                    right: BvhChild::Leaf(right),
                    bbox: combined,
                }
            }
            n => {
                // Stable sort: ties preserve the slice's original order
                // (coplanar triangles are common).
                prims.sort_by(|x, y| {
                    let xmin = x.bounding_box().unwrap().min[axis];
                    let ymin = y.bounding_box().unwrap().min[axis];
                    xmin.partial_cmp(&ymin).unwrap_or(Ordering::Equal)
                });
                let mid = n / 2;
                let (left_slice, right_slice) = prims.split_at_mut(mid);
                let left = BvhChild::Node(Box::new(Self::build_range(left_slice)));
                let right = BvhChild::Node(Box::new(Self::build_range(right_slice)));
                BvhNode {
                    left,
                    right,
                    bbox: combined,
                }
            }
        }
    }

    // Distinct primitive leaves in this subtree. Dedups the size-1 leaf
    // convention (left and right pointing at the same `Arc`) by pointer
    // equality rather than counting tree slots.
    pub fn count_leaves(&self) -> usize {
        let mut count = 0;
        self.left.count_leaves_into(&mut count);
        if !self.left.same_leaf_as(&self.right) {
            self.right.count_leaves_into(&mut count);
        }
        count
    }
}

impl Hittable for BvhNode {
    fn hit(&self, r: &Ray, t_min: f64, t_max: f64, rng: &mut dyn RngCore) -> Option<HitRecord> {
        if !self.bbox.hit(r, t_min, t_max) {
            return None;
        }
        let hit_left = self.left.hit(r, t_min, t_max, rng);
        let left_t_max = hit_left.as_ref().map(|h| h.t).unwrap_or(t_max);
        let hit_right = self.right.hit(r, t_min, left_t_max, rng);
        hit_right.or(hit_left)
    }

    fn bounding_box(&self) -> Option<Aabb> {
        Some(self.bbox)
    }
}

fn is_finite(b: &Aabb) -> bool {
    for axis in [Axis::X, Axis::Y, Axis::Z] {
        if !b.min[axis].is_finite() || !b.max[axis].is_finite() {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::material::{Lambertian, SyncMaterial};
    use crate::point::Point3;
    use crate::shape::Sphere;
    use crate::texture::SolidColor;
    use crate::vector::Vector3;
    use rand::Rng as _;

    fn lambert() -> Arc<SyncMaterial> {
        Arc::new(Lambertian::new(Arc::new(SolidColor::new(Color::new(
            0.5, 0.5, 0.5,
        )))))
    }

    fn random_spheres(seed: u64, n: usize) -> Vec<Arc<SyncHittable>> {
        let mut rng = crate::rng::Rng::for_draw(seed, 0, 0, 0);
        let mut prims: Vec<Arc<SyncHittable>> = Vec::with_capacity(n);
        for _ in 0..n {
            let center = Point3::new(
                rng.gen_range(-10.0, 10.0),
                rng.gen_range(-10.0, 10.0),
                rng.gen_range(-10.0, 10.0),
            );
            prims.push(Arc::new(Sphere::new(center, 0.3, lambert())));
        }
        prims
    }

    fn linear_closest_hit(
        prims: &[Arc<SyncHittable>],
        r: &Ray,
        t_min: f64,
        t_max: f64,
        rng: &mut dyn RngCore,
    ) -> Option<HitRecord> {
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

    #[test]
    fn bvh_matches_linear_scan_on_random_spheres() {
        let prims = random_spheres(42, 50);
        let bvh = BvhNode::build(prims.clone()).expect("build should succeed");

        let mut rng = crate::rng::Rng::for_draw(99, 0, 0, 0);
        for _ in 0..200 {
            let origin = Point3::new(
                rng.gen_range(-15.0, 15.0),
                rng.gen_range(-15.0, 15.0),
                rng.gen_range(-15.0, 15.0),
            );
            let dir = Vector3::new(
                rng.gen_range(-1.0, 1.0),
                rng.gen_range(-1.0, 1.0),
                rng.gen_range(-1.0, 1.0),
            );
            let r = Ray::new(origin, dir);

            let linear = linear_closest_hit(&prims, &r, 0.001, f64::INFINITY, &mut rng);
            let tree = bvh.hit(&r, 0.001, f64::INFINITY, &mut rng);

            match (linear, tree) {
                (None, None) => {}
                (Some(a), Some(b)) => assert!((a.t - b.t).abs() < 1e-9),
                other => panic!("linear/BVH disagreed on hit presence: {:?}", {
                    match other {
                        (Some(_), None) => "linear hit, bvh missed",
                        (None, Some(_)) => "bvh hit, linear missed",
                        _ => unreachable!(),
                    }
                }),
            }
        }
    }

    #[test]
    fn build_rejects_primitive_with_no_bounding_box() {
        struct Unbounded;
        impl Hittable for Unbounded {
            fn hit(&self, _r: &Ray, _t_min: f64, _t_max: f64, _rng: &mut dyn RngCore) -> Option<HitRecord> {
                None
            }
            fn bounding_box(&self) -> Option<Aabb> {
                None
            }
        }
        let prims: Vec<Arc<SyncHittable>> = vec![Arc::new(Unbounded)];
        assert!(BvhNode::build(prims).is_err());
    }

    #[test]
    fn single_primitive_leaf_dedups_to_one_in_statistics() {
        let prims = random_spheres(7, 1);
        let bvh = BvhNode::build(prims).unwrap();
        assert_eq!(bvh.count_leaves(), 1);
    }

    #[test]
    fn fifty_sphere_count_survives_build() {
        let prims = random_spheres(3, 50);
        let bvh = BvhNode::build(prims).unwrap();
        assert_eq!(bvh.count_leaves(), 50);
    }
}
