use std::ops::{BitOr, BitOrAssign};

use super::{FloatType, Ray, WorldPoint, WorldVector};

/// Axis aligned bounding box with inclusive corners.
#[derive(Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: WorldPoint,
    pub max: WorldPoint,
}

impl Aabb {
    pub fn new(min: WorldPoint, max: WorldPoint) -> Aabb {
        Aabb { min, max }
    }

    /// Union of all boxes in the iterator, `None` for an empty one.
    pub fn from_boxes(boxes: impl IntoIterator<Item = Aabb>) -> Option<Aabb> {
        boxes.into_iter().reduce(|a, b| &a | &b)
    }

    pub fn size(&self) -> WorldVector {
        self.max - self.min
    }

    pub fn center(&self) -> WorldPoint {
        nalgebra::center(&self.min, &self.max)
    }

    /// Surface area, the quantity minimized by the SAH split sweep.
    pub fn area(&self) -> FloatType {
        let size = self.size();
        2.0 * (size.x * size.y + size.y * size.z + size.z * size.x)
    }

    pub fn contains(&self, point: &WorldPoint) -> bool {
        (0..3).all(|i| self.min[i] <= point[i] && point[i] <= self.max[i])
    }

    /// Distance along the ray to the point where it enters the box,
    /// `None` if the ray misses the box entirely.
    ///
    /// A ray starting inside the box returns 0.
    pub fn entry_distance(&self, ray: &Ray) -> Option<FloatType> {
        // Componentwise distances along the ray to the min and max corner planes.
        // The multiplication is NAN if the ray starts inside a slab bounding plane
        // and is parallel to it; blend to +-infinity so that slab becomes unconstrained.
        let to_min = (self.min - ray.origin)
            .component_mul(&ray.inv_direction)
            .map(|x| if x.is_nan() { FloatType::NEG_INFINITY } else { x });
        let to_max = (self.max - ray.origin)
            .component_mul(&ray.inv_direction)
            .map(|x| if x.is_nan() { FloatType::INFINITY } else { x });

        let near = to_min.inf(&to_max);
        let far = to_min.sup(&to_max);

        let entry = near.max();
        let exit = far.min();

        if entry <= exit && exit >= 0.0 {
            Some(entry.max(0.0))
        } else {
            None
        }
    }

    /// Compatibility variant of [`Aabb::entry_distance`]: a ray starting
    /// inside the box reports a distance of 1 instead of 0. The value is a
    /// placeholder, not a physical entry distance; traversal pruning against
    /// it can behave differently from the exact variant.
    pub fn legacy_entry_distance(&self, ray: &Ray) -> Option<FloatType> {
        if self.contains(&ray.origin) {
            return Some(1.0);
        }
        self.entry_distance(ray)
    }
}

impl BitOr for &Aabb {
    type Output = Aabb;

    fn bitor(self, rhs: &Aabb) -> Aabb {
        Aabb {
            min: self.min.coords.inf(&rhs.min.coords).into(),
            max: self.max.coords.sup(&rhs.max.coords).into(),
        }
    }
}

impl BitOrAssign<&Aabb> for Aabb {
    fn bitor_assign(&mut self, rhs: &Aabb) {
        *self = &*self | rhs;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::test::{simple_float, simple_point};

    use assert2::assert;
    use proptest::prelude::*;
    use test_case::test_case;
    use test_strategy::proptest;

    fn boxes() -> BoxedStrategy<Aabb> {
        (simple_point(), simple_point())
            .prop_map(|(a, b)| Aabb {
                min: a.coords.inf(&b.coords).into(),
                max: a.coords.sup(&b.coords).into(),
            })
            .boxed()
    }

    #[proptest]
    fn union_is_commutative(#[strategy(boxes())] a: Aabb, #[strategy(boxes())] b: Aabb) {
        assert!(&a | &b == &b | &a);
    }

    #[proptest]
    fn union_is_associative(
        #[strategy(boxes())] a: Aabb,
        #[strategy(boxes())] b: Aabb,
        #[strategy(boxes())] c: Aabb,
    ) {
        assert!(&(&a | &b) | &c == &a | &(&b | &c));
    }

    #[proptest]
    fn union_is_idempotent(#[strategy(boxes())] a: Aabb) {
        assert!(&a | &a == a);
    }

    #[proptest]
    fn union_contains_both_inputs(#[strategy(boxes())] a: Aabb, #[strategy(boxes())] b: Aabb) {
        let u = &a | &b;
        for b in [&a, &b] {
            assert!(u.contains(&b.min));
            assert!(u.contains(&b.max));
        }
    }

    #[proptest]
    fn contains_own_corners_and_center(#[strategy(boxes())] a: Aabb) {
        assert!(a.contains(&a.min));
        assert!(a.contains(&a.max));
        assert!(a.contains(&a.center()));
    }

    #[proptest]
    fn interpolated_points_are_inside(
        #[strategy(boxes())] a: Aabb,
        #[strategy(0.0f32..=1.0)] tx: f32,
        #[strategy(0.0f32..=1.0)] ty: f32,
        #[strategy(0.0f32..=1.0)] tz: f32,
    ) {
        let p = WorldPoint::new(
            a.min.x + tx * (a.max.x - a.min.x),
            a.min.y + ty * (a.max.y - a.min.y),
            a.min.z + tz * (a.max.z - a.min.z),
        );
        assert!(a.contains(&p));
    }

    fn unit_box() -> Aabb {
        Aabb::new([5.0, 5.0, 5.0].into(), [10.0, 10.0, 10.0].into())
    }

    #[test_case( 7.0,  7.0,  0.0,   0.0, 0.0, 1.0,   5.0 ; "from_below")]
    #[test_case( 7.0,  7.0, 20.0,   0.0, 0.0, -1.0, 10.0 ; "from_above")]
    #[test_case( 0.0,  7.0,  7.0,   1.0, 0.0, 0.0,   5.0 ; "along_x")]
    fn entry_distance_hit(px: f32, py: f32, pz: f32, dx: f32, dy: f32, dz: f32, expected: f32) {
        let ray = Ray::new(
            WorldPoint::new(px, py, pz),
            WorldVector::new(dx, dy, dz),
        );
        let t = unit_box().entry_distance(&ray).expect("must hit");
        assert!((t - expected).abs() < 1e-4);
    }

    #[test_case( 0.0,  7.0,  7.0,   0.0, 1.0, 0.0 ; "parallel_outside_slab")]
    #[test_case(12.0,  7.0,  7.0,   1.0, 0.0, 0.0 ; "pointing_away")]
    #[test_case( 0.0,  0.0,  0.0,  -1.0, -1.0, -1.0 ; "behind_origin")]
    fn entry_distance_miss(px: f32, py: f32, pz: f32, dx: f32, dy: f32, dz: f32) {
        let ray = Ray::new(
            WorldPoint::new(px, py, pz),
            WorldVector::new(dx, dy, dz),
        );
        assert!(unit_box().entry_distance(&ray) == None);
    }

    #[test]
    fn origin_inside_is_zero_distance() {
        let ray = Ray::new(
            WorldPoint::new(7.0, 7.0, 7.0),
            WorldVector::new(0.0, 0.0, 1.0),
        );
        assert!(unit_box().entry_distance(&ray) == Some(0.0));
    }

    /// The compatibility mode reports the historical unit placeholder for a
    /// ray starting inside the box instead of the true entry distance.
    #[test]
    fn legacy_origin_inside_is_unit_placeholder() {
        let ray = Ray::new(
            WorldPoint::new(7.0, 7.0, 7.0),
            WorldVector::new(0.0, 0.0, 1.0),
        );
        assert!(unit_box().legacy_entry_distance(&ray) == Some(1.0));
    }

    #[test]
    fn legacy_outside_matches_exact() {
        let ray = Ray::new(
            WorldPoint::new(7.0, 7.0, 0.0),
            WorldVector::new(0.0, 0.0, 1.0),
        );
        let b = unit_box();
        assert!(b.legacy_entry_distance(&ray) == b.entry_distance(&ray));
    }

    #[proptest]
    fn entry_point_lies_on_surface(
        #[strategy(boxes())] b: Aabb,
        #[strategy(simple_point())] origin: WorldPoint,
        #[strategy(simple_float())] dx: f32,
        #[strategy(simple_float())] dy: f32,
        #[strategy(simple_float())] dz: f32,
    ) {
        let d = WorldVector::new(dx, dy, dz);
        prop_assume!(d.norm() > 1e-6);
        prop_assume!(!b.contains(&origin));
        prop_assume!(b.size().min() > 1e-3);

        let ray = Ray::new(origin, d);
        if let Some(t) = b.entry_distance(&ray) {
            let p = ray.point_at(t);
            let tolerance = 1e-3 * (1.0 + t.abs());
            for i in 0..3 {
                assert!(p[i] >= b.min[i] - tolerance);
                assert!(p[i] <= b.max[i] + tolerance);
            }
        }
    }
}
