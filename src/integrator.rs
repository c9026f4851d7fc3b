use bon::bon;
use rand::{Rng, RngCore};

use crate::geometry::{Color, FloatType, Ray, WorldPoint, WorldVector};
use crate::scene::bvh::TraversalHistory;
use crate::scene::{Intersection, Scene};

/// Recursive path tracer with Russian roulette termination. Radiance is
/// estimated by following a single BSDF sample per bounce.
#[derive(Clone, Copy, Debug)]
pub struct PathTracer {
    roulette_probability: FloatType,
    /// Continuation rays start this far along their direction to avoid
    /// immediately re-hitting the surface they left.
    origin_offset: FloatType,
}

#[bon]
impl PathTracer {
    #[builder]
    pub fn new(
        #[builder(default = 0.95)] roulette_probability: FloatType,
        #[builder(default = 1e-5)] origin_offset: FloatType,
    ) -> Self {
        assert!(roulette_probability > 0.0 && roulette_probability <= 1.0);
        PathTracer {
            roulette_probability,
            origin_offset,
        }
    }
}

impl PathTracer {
    /// Radiance arriving along `ray`. The camera ray has depth 1 and is
    /// never terminated by the roulette; deeper rays survive with the
    /// configured probability and are compensated by dividing through it.
    pub fn radiance(
        &self,
        scene: &Scene,
        ray: &Ray,
        history: &mut TraversalHistory,
        rng: &mut dyn RngCore,
    ) -> Color {
        if ray.depth > 1 && rng.random::<FloatType>() > self.roulette_probability {
            return Color::zeros();
        }

        let mut radiance = match scene.intersect(ray, history, rng) {
            Some(intersection) => {
                let sample = intersection.material.sample_ray(ray, &intersection, rng);
                let next = self.continuation_ray(ray, &intersection, &sample.direction, &sample.origin);

                let incoming = self.radiance(scene, &next, history, rng);
                incoming.component_mul(&sample.weight).sup(&Color::zeros())
                    + intersection.material.emission()
            }
            None => Color::zeros(),
        };

        if ray.depth > 1 {
            radiance /= self.roulette_probability;
        }
        radiance
    }

    /// Builds the next ray of the path. A transmission through a surface
    /// updates the medium stack: entering pushes the material's medium
    /// entry (possibly vacuum), leaving pops the innermost one.
    pub fn continuation_ray(
        &self,
        prev: &Ray,
        intersection: &Intersection,
        direction: &WorldVector,
        origin: &WorldPoint,
    ) -> Ray {
        let mut next = Ray::new(origin + direction * self.origin_offset, *direction);
        next.depth = prev.depth + 1;
        next.media = prev.media.clone();

        let normal = intersection.shading_normal();
        let transmitted = intersection.primitive.is_some()
            && prev.direction.dot(&normal) * next.direction.dot(&normal) > 0.0;
        if transmitted {
            if next.direction.dot(&normal) < 0.0 {
                next.media.push(intersection.material.medium().cloned());
            } else {
                // Leaving a surface that was never entered leaves the
                // stack alone
                next.media.pop();
            }
        }

        next
    }
}
