//! Microfacet materials with the GGX normal distribution, sampled in the
//! Walter et al. style: draw a microfacet normal, then reflect or refract
//! through it.

use std::f32::consts::PI;
use std::sync::Arc;

use rand::{Rng, RngCore};

use crate::geometry::{Color, FloatType, Ray, WorldVector};
use crate::scene::Intersection;

use super::{Material, Medium, ScatterSample, Texture, basis_around};

/// Samples a microfacet normal from the GGX distribution around `normal`.
fn sample_microfacet_normal(
    normal: &WorldVector,
    alpha: FloatType,
    rng: &mut dyn RngCore,
) -> WorldVector {
    let r1: FloatType = rng.random();
    let r2: FloatType = rng.random();

    let theta = (alpha * r1.sqrt() / (1.0 - r1).sqrt()).atan();
    let phi = 2.0 * PI * r2;

    let [e1, e2, e3] = basis_around(normal);
    e1 * theta.cos() + e2 * (theta.sin() * phi.cos()) + e3 * (theta.sin() * phi.sin())
}

/// Smith shadowing term for one direction.
fn smith_g1(v: &WorldVector, m: &WorldVector, n: &WorldVector, alpha: FloatType) -> FloatType {
    let cos_v = n.dot(v);
    let tan_sq = 1.0 / (cos_v * cos_v) - 1.0;
    (v.dot(m) / cos_v).max(0.0) * 2.0 / (1.0 + (1.0 + alpha * alpha * tan_sq).sqrt())
}

fn smith_g(
    i: &WorldVector,
    o: &WorldVector,
    m: &WorldVector,
    n: &WorldVector,
    alpha: FloatType,
) -> FloatType {
    smith_g1(i, m, n, alpha) * smith_g1(o, m, n, alpha)
}

/// Unpolarized Fresnel reflectance for incident direction `i` against
/// microfacet normal `m`.
fn fresnel(i: &WorldVector, m: &WorldVector, eta_t: FloatType, eta_i: FloatType) -> FloatType {
    let c = i.dot(m).abs();
    let g_sq = (eta_t / eta_i).powi(2) - 1.0 + c * c;
    if g_sq <= 0.0 {
        // Total internal reflection
        return 1.0;
    }
    let g = g_sq.sqrt();
    0.5 * ((g - c) / (g + c)).powi(2)
        * (1.0 + ((c * (g + c) - 1.0) / (c * (g - c) + 1.0)).powi(2))
}

/// Sampling weight shared by the reflective and refractive variants; the
/// Fresnel and distribution terms cancel against the sampling density.
fn sample_weight(
    i: &WorldVector,
    o: &WorldVector,
    m: &WorldVector,
    n: &WorldVector,
    alpha: FloatType,
) -> FloatType {
    (i.dot(m) * smith_g(i, o, m, n, alpha) / (i.dot(n) * m.dot(n))).abs()
}

#[derive(Debug)]
pub struct GgxReflection {
    pub albedo: Color,
    pub alpha: FloatType,
    pub medium: Option<Arc<Medium>>,
}

impl GgxReflection {
    pub fn new(albedo: Color, alpha: FloatType) -> GgxReflection {
        GgxReflection {
            albedo,
            alpha,
            medium: None,
        }
    }
}

impl Material for GgxReflection {
    fn sample_ray(
        &self,
        _ray: &Ray,
        intersection: &Intersection,
        rng: &mut dyn RngCore,
    ) -> ScatterSample {
        let n = intersection.shading_normal();
        let i = intersection.incoming;
        let m = sample_microfacet_normal(&n, self.alpha, rng);

        let direction = (m * (2.0 * i.dot(&m).abs()) - i).normalize();
        let weight = self.albedo * sample_weight(&i, &direction, &m, &n, self.alpha);

        ScatterSample {
            direction,
            origin: intersection.point,
            normal: n,
            weight,
        }
    }

    fn medium(&self) -> Option<&Arc<Medium>> {
        self.medium.as_ref()
    }
}

/// `GgxReflection` with the albedo looked up from a texture at the hit
/// point's uv coordinates.
#[derive(Debug)]
pub struct GgxTextured {
    pub texture: Arc<Texture>,
    pub alpha: FloatType,
}

impl GgxTextured {
    pub fn new(texture: Arc<Texture>, alpha: FloatType) -> GgxTextured {
        GgxTextured { texture, alpha }
    }
}

impl Material for GgxTextured {
    fn sample_ray(
        &self,
        _ray: &Ray,
        intersection: &Intersection,
        rng: &mut dyn RngCore,
    ) -> ScatterSample {
        let n = intersection.shading_normal();
        let i = intersection.incoming;
        let m = sample_microfacet_normal(&n, self.alpha, rng);

        let direction = (m * (2.0 * i.dot(&m).abs()) - i).normalize();
        let albedo = self.texture.texel(&intersection.tex);
        let weight = albedo * sample_weight(&i, &direction, &m, &n, self.alpha);

        ScatterSample {
            direction,
            origin: intersection.point,
            normal: n,
            weight,
        }
    }
}

#[derive(Debug)]
pub struct GgxRefraction {
    pub refractive_index: FloatType,
    pub alpha: FloatType,
    pub medium: Option<Arc<Medium>>,
}

impl GgxRefraction {
    pub fn new(refractive_index: FloatType, alpha: FloatType) -> GgxRefraction {
        GgxRefraction {
            refractive_index,
            alpha,
            medium: None,
        }
    }

    pub fn with_medium(
        refractive_index: FloatType,
        alpha: FloatType,
        medium: Arc<Medium>,
    ) -> GgxRefraction {
        GgxRefraction {
            refractive_index,
            alpha,
            medium: Some(medium),
        }
    }
}

impl Material for GgxRefraction {
    fn sample_ray(
        &self,
        _ray: &Ray,
        intersection: &Intersection,
        rng: &mut dyn RngCore,
    ) -> ScatterSample {
        let n = intersection.shading_normal();
        let i = intersection.incoming;
        let m = sample_microfacet_normal(&n, self.alpha, rng);

        // Which side of the surface the ray arrives from decides the index pair.
        let (eta_i, eta_t) = if i.dot(&n) < 0.0 {
            (1.0, self.refractive_index)
        } else {
            (self.refractive_index, 1.0)
        };

        let direction = if rng.random::<FloatType>() <= fresnel(&i, &m, eta_t, eta_i) {
            (m * (2.0 * i.dot(&m).abs()) - i).normalize()
        } else {
            let c = i.dot(&m);
            let eta = eta_i / eta_t;
            let sign = if i.dot(&n) > 0.0 { 1.0 } else { -1.0 };
            (m * (eta * c - sign * (1.0 + eta * (c * c - 1.0)).sqrt()) - i * eta).normalize()
        };

        let weight = Color::repeat(sample_weight(&i, &direction, &m, &n, self.alpha));

        ScatterSample {
            direction,
            origin: intersection.point,
            normal: n,
            weight,
        }
    }

    fn medium(&self) -> Option<&Arc<Medium>> {
        self.medium.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::super::Diffuse;
    use super::*;
    use assert2::assert;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn fresnel_is_a_probability() {
        let n = WorldVector::z();
        for angle in [0.1f32, 0.5, 1.0, 1.4] {
            let i = WorldVector::new(angle.sin(), 0.0, angle.cos());
            let f = fresnel(&i, &n, 1.5, 1.0);
            assert!((0.0..=1.0).contains(&f));
        }
    }

    #[test]
    fn fresnel_total_internal_reflection() {
        // Grazing exit from the dense side beyond the critical angle
        let n = WorldVector::z();
        let i = WorldVector::new(0.9, 0.0, (1.0f32 - 0.81).sqrt());
        assert!(fresnel(&i, &n, 1.0, 1.5) == 1.0);
    }

    #[test]
    fn microfacet_normals_cluster_around_macro_normal() {
        let mut rng = SmallRng::seed_from_u64(11);
        let n = WorldVector::z();
        let mut in_lobe = 0;
        for _ in 0..200 {
            let m = sample_microfacet_normal(&n, 0.05, &mut rng);
            assert!((m.norm() - 1.0).abs() < 1e-4);
            if m.dot(&n) > 0.9 {
                in_lobe += 1;
            }
        }
        // The distribution is heavy tailed, so narrow roughness only
        // concentrates the bulk of the samples, not every one of them
        assert!(in_lobe >= 190);
    }

    #[test]
    fn mirror_like_reflection_for_small_alpha() {
        let mut rng = SmallRng::seed_from_u64(5);
        let material = GgxReflection::new(Color::repeat(1.0), 1e-4);

        let normal = WorldVector::z();
        let incoming_dir = WorldVector::new(1.0, 0.0, -1.0).normalize();
        let ray = Ray::new(nalgebra::Point3::new(-1.0, 0.0, 1.0), incoming_dir);

        let intersection = Intersection {
            point: nalgebra::Point3::origin(),
            normal: Some(nalgebra::Unit::new_normalize(normal)),
            incoming: -incoming_dir,
            tex: nalgebra::Point2::origin(),
            t: 2.0f32.sqrt(),
            material: Arc::new(Diffuse::new(Color::repeat(0.5))),
            primitive: None,
        };

        let sample = material.sample_ray(&ray, &intersection, &mut rng);
        let expected = WorldVector::new(1.0, 0.0, 1.0).normalize();
        assert!((sample.direction - expected).norm() < 1e-2);
    }

    #[test]
    fn textured_ggx_takes_its_albedo_from_the_texture() {
        let mut rng = SmallRng::seed_from_u64(3);

        // Left half red, right half green
        let image = image::Rgb32FImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgb([1.0, 0.0, 0.0])
            } else {
                image::Rgb([0.0, 1.0, 0.0])
            }
        });
        let material = GgxTextured::new(Arc::new(Texture::from_image(image)), 1e-4);

        let normal = WorldVector::z();
        let incoming_dir = -WorldVector::z();
        let ray = Ray::new(nalgebra::Point3::new(0.0, 0.0, 1.0), incoming_dir);

        let mut intersection = Intersection {
            point: nalgebra::Point3::origin(),
            normal: Some(nalgebra::Unit::new_normalize(normal)),
            incoming: -incoming_dir,
            tex: nalgebra::Point2::new(0.25, 0.5),
            t: 1.0,
            material: Arc::new(Diffuse::new(Color::repeat(0.5))),
            primitive: None,
        };

        // At normal incidence on a near smooth surface the geometric
        // terms are close to one, leaving the texel color as the weight.
        let red = material.sample_ray(&ray, &intersection, &mut rng);
        assert!((red.weight - Color::new(1.0, 0.0, 0.0)).norm() < 1e-2);

        intersection.tex = nalgebra::Point2::new(0.75, 0.5);
        let green = material.sample_ray(&ray, &intersection, &mut rng);
        assert!((green.weight - Color::new(0.0, 1.0, 0.0)).norm() < 1e-2);
    }
}
