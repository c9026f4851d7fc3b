mod aabb;

pub use aabb::Aabb;

use std::sync::Arc;

use crate::material::Medium;

pub type FloatType = f32;

pub const EPSILON: FloatType = 1e-5;

pub type WorldPoint = nalgebra::Point3<FloatType>;
pub type WorldVector = nalgebra::Vector3<FloatType>;
pub type TexturePoint = nalgebra::Point2<FloatType>;

/// Linear RGB radiance or reflectance, componentwise math through nalgebra.
pub type Color = nalgebra::Vector3<FloatType>;

pub type ScreenPoint = nalgebra::Point2<u32>;
pub type ScreenSize = nalgebra::Vector2<u32>;

#[derive(Clone, Debug)]
pub struct Ray {
    pub origin: WorldPoint,
    /// Normalized direction of the ray
    pub direction: WorldVector,

    /// Componentwise inverse of the ray direction
    /// Zeros in direction get turned into positive infinity regardless of the sign of the zero
    pub inv_direction: WorldVector,

    /// Recursion depth of the path this ray belongs to, 1 for camera rays.
    pub depth: u32,

    /// Stack of participating media the ray currently travels through.
    /// Owned by the ray, copied into each continuation ray and mutated only
    /// when the path crosses a medium boundary. Entries can be `None`: a
    /// surface material without a medium still pushes a placeholder that
    /// masks whatever is below it on the stack.
    pub media: Vec<Option<Arc<Medium>>>,
}

impl Ray {
    pub fn new(origin: WorldPoint, direction: WorldVector) -> Ray {
        let direction = direction.normalize();
        let inv_direction = direction.map(|x| if x == 0.0 { FloatType::INFINITY } else { 1.0 / x });

        Ray {
            origin,
            direction,
            inv_direction,
            depth: 1,
            media: Vec::new(),
        }
    }

    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction * distance
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use proptest::prelude::*;

    pub fn simple_float() -> BoxedStrategy<FloatType> {
        any::<i32>().prop_map(|n| n as FloatType * 1e-3).boxed()
    }

    pub fn simple_point() -> BoxedStrategy<WorldPoint> {
        (simple_float(), simple_float(), simple_float())
            .prop_map(|(x, y, z)| WorldPoint::new(x, y, z))
            .boxed()
    }

    pub fn nonzero_vector() -> BoxedStrategy<WorldVector> {
        (simple_float(), simple_float(), simple_float())
            .prop_filter_map("vector is zero", |(x, y, z)| {
                let vector = WorldVector::new(x, y, z);
                if vector.norm() < 1e-6 { None } else { Some(vector) }
            })
            .boxed()
    }
}
