use std::sync::Arc;

use nalgebra::Unit;

use crate::geometry::{Aabb, FloatType, Ray, TexturePoint, WorldPoint, WorldVector};
use crate::material::Material;

use super::Intersection;

/// Mesh vertex with shading attributes.
#[derive(Clone, Debug)]
pub struct Vertex {
    pub position: WorldPoint,
    pub normal: WorldVector,
    pub tex: TexturePoint,
}

#[derive(Clone, Debug)]
pub struct Sphere {
    pub center: WorldPoint,
    pub radius: FloatType,
}

#[derive(Clone, Debug)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    /// Geometric normal from the winding order, `None` for a degenerate
    /// triangle.
    pub fn flat_normal(&self) -> Option<Unit<WorldVector>> {
        let [a, b, c] = &self.vertices;
        let n = (b.position - a.position).cross(&(c.position - b.position));
        Unit::try_new(n, 1e-12)
    }

    /// Overwrites all vertex normals with the flat geometric normal.
    /// Used for meshes that come without normal data.
    pub fn set_flat_normals(&mut self) {
        if let Some(n) = self.flat_normal() {
            for v in &mut self.vertices {
                v.normal = n.into_inner();
            }
        }
    }
}

#[derive(Clone, Debug)]
pub enum Shape {
    Sphere(Sphere),
    Triangle(Triangle),
}

/// A single renderable surface; many primitives may share one material.
#[derive(Clone, Debug)]
pub struct Primitive {
    pub shape: Shape,
    pub material: Arc<dyn Material>,
}

impl Primitive {
    pub fn sphere(
        center: WorldPoint,
        radius: FloatType,
        material: Arc<dyn Material>,
    ) -> Arc<Primitive> {
        Arc::new(Primitive {
            shape: Shape::Sphere(Sphere { center, radius }),
            material,
        })
    }

    pub fn triangle(triangle: Triangle, material: Arc<dyn Material>) -> Arc<Primitive> {
        Arc::new(Primitive {
            shape: Shape::Triangle(triangle),
            material,
        })
    }

    pub fn bounding_box(&self) -> Aabb {
        match &self.shape {
            Shape::Sphere(sphere) => {
                let r = WorldVector::repeat(sphere.radius);
                Aabb::new(sphere.center - r, sphere.center + r)
            }
            Shape::Triangle(triangle) => {
                let [a, b, c] = &triangle.vertices;
                Aabb::new(
                    a.position
                        .coords
                        .inf(&b.position.coords)
                        .inf(&c.position.coords)
                        .into(),
                    a.position
                        .coords
                        .sup(&b.position.coords)
                        .sup(&c.position.coords)
                        .into(),
                )
            }
        }
    }

    /// Nearest intersection of `ray` with this primitive. The hit carries a
    /// back reference to the primitive for medium crossing bookkeeping.
    pub fn intersect(this: &Arc<Primitive>, ray: &Ray) -> Option<Intersection> {
        match &this.shape {
            Shape::Sphere(sphere) => intersect_sphere(this, sphere, ray),
            Shape::Triangle(triangle) => intersect_triangle(this, triangle, ray),
        }
    }
}

fn intersect_sphere(this: &Arc<Primitive>, sphere: &Sphere, ray: &Ray) -> Option<Intersection> {
    let oc = ray.origin - sphere.center;
    let b = oc.dot(&ray.direction);
    let c = oc.dot(&oc) - sphere.radius * sphere.radius;
    let discriminant = b * b - c;

    if discriminant < 0.0 {
        return None;
    }

    let sqrt_disc = discriminant.sqrt();
    let t1 = -b - sqrt_disc;
    let t2 = -b + sqrt_disc;
    let t = if t1 > 0.0 {
        t1
    } else if t2 > 0.0 {
        t2
    } else {
        return None;
    };

    let point = ray.point_at(t);
    let normal = Unit::new_normalize(point - sphere.center);

    Some(Intersection {
        point,
        tex: TexturePoint::new((normal.x + 1.0) / 2.0, (normal.y + 1.0) / 2.0),
        normal: Some(normal),
        incoming: -ray.direction,
        t,
        material: Arc::clone(&this.material),
        primitive: Some(Arc::clone(this)),
    })
}

/// Möller-Trumbore triangle intersection with barycentric interpolation of
/// the shading attributes.
fn intersect_triangle(this: &Arc<Primitive>, triangle: &Triangle, ray: &Ray) -> Option<Intersection> {
    let [a, b, c] = &triangle.vertices;

    let e1 = b.position - a.position;
    let e2 = c.position - a.position;

    let ray_cross_e2 = ray.direction.cross(&e2);
    let det = e1.dot(&ray_cross_e2);

    // Degenerate triangle or ray parallel to its plane
    if det.abs() < 1e-7 {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = ray.origin - a.position;
    let u = inv_det * s.dot(&ray_cross_e2);

    let s_cross_e1 = s.cross(&e1);
    let v = inv_det * ray.direction.dot(&s_cross_e1);

    if u < 0.0 || v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = inv_det * e2.dot(&s_cross_e1);
    if t < 0.0 {
        return None;
    }

    let w = 1.0 - u - v;
    let normal = a.normal * w + b.normal * u + c.normal * v;
    let normal = Unit::try_new(normal, 1e-12).or_else(|| triangle.flat_normal())?;
    let tex = (a.tex.coords * w + b.tex.coords * u + c.tex.coords * v).into();

    Some(Intersection {
        point: ray.point_at(t),
        normal: Some(normal),
        incoming: -ray.direction,
        tex,
        t,
        material: Arc::clone(&this.material),
        primitive: Some(Arc::clone(this)),
    })
}
