mod ggx;
mod texture;

pub use ggx::{GgxReflection, GgxRefraction, GgxTextured};
pub use texture::{DiffuseTextured, Texture};

use std::f32::consts::PI;
use std::fmt::Debug;
use std::sync::Arc;

use rand::{Rng, RngCore};
use rand_distr::{Distribution, Exp, UnitSphere};

use crate::geometry::{Color, FloatType, Ray, WorldPoint, WorldVector};
use crate::scene::Intersection;

/// A single scattering sample drawn from a material.
///
/// `weight` is the full throughput factor of the bounce: BSDF value times the
/// cosine term, already divided by the sampling PDF. The integrator only
/// multiplies it in.
#[derive(Clone, Debug)]
pub struct ScatterSample {
    pub direction: WorldVector,
    pub origin: WorldPoint,
    pub normal: WorldVector,
    pub weight: Color,
}

/// Surface or volume scattering strategy.
///
/// Any material may additionally carry a participating medium; whether one is
/// present is a capability, not a separate type.
pub trait Material: Debug + Send + Sync {
    fn sample_ray(&self, ray: &Ray, intersection: &Intersection, rng: &mut dyn RngCore)
    -> ScatterSample;

    fn emission(&self) -> Color {
        Color::zeros()
    }

    fn medium(&self) -> Option<&Arc<Medium>> {
        None
    }
}

/// Orthonormal basis with `e1` aligned to the given vector.
pub(crate) fn basis_around(v: &WorldVector) -> [WorldVector; 3] {
    let e1 = v.normalize();
    let helper = if v.x.abs() < 0.5 {
        WorldVector::x()
    } else if v.y.abs() < 0.5 {
        WorldVector::y()
    } else {
        WorldVector::z()
    };
    let e2 = v.cross(&helper).normalize();
    let e3 = e1.cross(&e2).normalize();
    [e1, e2, e3]
}

/// Cosine weighted direction on the hemisphere around `normal`.
pub(crate) fn sample_cosine_hemisphere(
    normal: &WorldVector,
    rng: &mut dyn RngCore,
) -> WorldVector {
    let r1: FloatType = rng.random();
    let r2: FloatType = rng.random();
    let [e1, e2, e3] = basis_around(normal);
    e1 * r2.sqrt()
        + e2 * ((2.0 * PI * r1).cos() * (1.0 - r2).sqrt())
        + e3 * ((2.0 * PI * r1).sin() * (1.0 - r2).sqrt())
}

/// Homogeneous participating medium with an isotropic phase function.
///
/// Implements [`Material`] so that an in-medium scattering event can reuse the
/// ordinary scattering-sample contract.
#[derive(Debug)]
pub struct Medium {
    /// Single scattering albedo of the phase function.
    pub albedo: Color,
    pub absorption: FloatType,
    pub scattering: FloatType,
}

impl Medium {
    pub fn new(albedo: Color, absorption: FloatType, scattering: FloatType) -> Medium {
        Medium {
            albedo,
            absorption,
            scattering,
        }
    }

    pub fn extinction(&self) -> FloatType {
        self.absorption + self.scattering
    }

    pub fn transmittance(&self, t: FloatType) -> FloatType {
        (-t * self.extinction()).exp()
    }

    /// Density of the free flight distance sampler at `t`.
    pub fn pdf_t(&self, t: FloatType) -> FloatType {
        self.extinction() * (-self.extinction() * t).exp()
    }

    /// Samples a free flight distance, exponentially distributed with the
    /// extinction coefficient as rate. A medium with zero extinction never
    /// scatters.
    pub fn sample_distance(&self, rng: &mut dyn RngCore) -> FloatType {
        match Exp::new(self.extinction()) {
            Ok(distribution) => distribution.sample(rng),
            Err(_) => FloatType::INFINITY,
        }
    }
}

impl Material for Medium {
    fn sample_ray(
        &self,
        _ray: &Ray,
        intersection: &Intersection,
        rng: &mut dyn RngCore,
    ) -> ScatterSample {
        let direction: [FloatType; 3] = UnitSphere.sample(rng);
        let direction = WorldVector::from(direction);

        let phase = self.albedo * (1.0 / (4.0 * PI));
        let pdf_direction = 1.0 / (4.0 * PI);

        let t = intersection.t;
        let weight = phase * (self.transmittance(t) * self.scattering
            / (pdf_direction * self.pdf_t(t)));

        ScatterSample {
            direction,
            origin: intersection.point,
            normal: intersection.shading_normal(),
            weight,
        }
    }
}

/// Lambertian surface, optionally emissive.
#[derive(Debug)]
pub struct Diffuse {
    pub albedo: Color,
    pub emission: Color,
    pub medium: Option<Arc<Medium>>,
}

impl Diffuse {
    pub fn new(albedo: Color) -> Diffuse {
        Diffuse {
            albedo,
            emission: Color::zeros(),
            medium: None,
        }
    }

    pub fn emissive(albedo: Color, emission: Color) -> Diffuse {
        Diffuse {
            albedo,
            emission,
            medium: None,
        }
    }
}

impl Material for Diffuse {
    fn sample_ray(
        &self,
        _ray: &Ray,
        intersection: &Intersection,
        rng: &mut dyn RngCore,
    ) -> ScatterSample {
        let normal = intersection.shading_normal();
        let direction = sample_cosine_hemisphere(&normal, rng);

        // Cosine weighted sampling: pdf = cos / pi cancels against the
        // BSDF cosine product, leaving the plain albedo.
        let weight = if direction.dot(&normal) > 0.0 {
            self.albedo
        } else {
            Color::zeros()
        };

        ScatterSample {
            direction,
            origin: intersection.point,
            normal,
            weight,
        }
    }

    fn emission(&self) -> Color {
        self.emission
    }

    fn medium(&self) -> Option<&Arc<Medium>> {
        self.medium.as_ref()
    }
}

/// Invisible boundary surface: rays pass straight through with unit weight.
/// Useful for bounding a participating medium without refraction.
#[derive(Debug, Default)]
pub struct NullSurface {
    pub medium: Option<Arc<Medium>>,
}

impl NullSurface {
    pub fn new(medium: Arc<Medium>) -> NullSurface {
        NullSurface {
            medium: Some(medium),
        }
    }
}

impl Material for NullSurface {
    fn sample_ray(
        &self,
        ray: &Ray,
        intersection: &Intersection,
        _rng: &mut dyn RngCore,
    ) -> ScatterSample {
        ScatterSample {
            direction: ray.direction,
            origin: intersection.point,
            normal: intersection.shading_normal(),
            weight: Color::repeat(1.0),
        }
    }

    fn medium(&self) -> Option<&Arc<Medium>> {
        self.medium.as_ref()
    }
}
