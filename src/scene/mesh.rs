use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use nalgebra::UnitQuaternion;
use thiserror::Error;

use crate::geometry::{Aabb, FloatType, TexturePoint, WorldPoint, WorldVector};
use crate::material::Material;

use super::bvh::{Bvh, EmptySceneError};
use super::primitives::{Primitive, Triangle, Vertex};
use super::SceneObject;

#[derive(Debug, Error)]
pub enum MeshLoadError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseError(#[from] wavefront_obj::ParseError),
}

/// Placement of a mesh in the world, applied per vertex at load time.
/// Rotation goes first, then scale, then translation.
#[derive(Clone, Debug)]
pub struct Transform {
    pub translation: WorldVector,
    pub scale: WorldVector,
    pub rotation: UnitQuaternion<FloatType>,
}

impl Default for Transform {
    fn default() -> Transform {
        Transform {
            translation: WorldVector::zeros(),
            scale: WorldVector::repeat(1.0),
            rotation: UnitQuaternion::identity(),
        }
    }
}

impl Transform {
    pub fn apply_point(&self, p: &WorldPoint) -> WorldPoint {
        WorldPoint {
            coords: (self.rotation * p.coords).component_mul(&self.scale) + self.translation,
        }
    }

    /// Normals only rotate. Nonuniform scale would need the inverse
    /// transpose, which we approximate by renormalizing after rotation.
    pub fn apply_normal(&self, n: &WorldVector) -> WorldVector {
        self.rotation * n
    }
}

/// Triangle soup loaded from a Wavefront OBJ file, with a lazily built
/// acceleration structure. Shared between scene placements through `Arc`.
#[derive(Debug)]
pub struct MeshInstance {
    triangles: Vec<Arc<Primitive>>,
    aabb: Aabb,
    structure: OnceLock<Result<Bvh, EmptySceneError>>,
}

impl MeshInstance {
    /// Loads all objects from an OBJ file. `assign_material` maps each
    /// object name to its material; the same name always gets the same
    /// assignment.
    pub fn with_obj(
        path: impl AsRef<Path>,
        transform: &Transform,
        mut assign_material: impl FnMut(&str) -> Arc<dyn Material>,
    ) -> Result<MeshInstance, MeshLoadError> {
        let content = fs::read_to_string(path)?;
        let parsed = wavefront_obj::obj::parse(content)?;

        let mut materials: IndexMap<String, Arc<dyn Material>> = IndexMap::new();
        let mut triangles = Vec::new();

        for object in parsed.objects {
            let material = materials
                .entry(object.name.clone())
                .or_insert_with(|| assign_material(&object.name))
                .clone();

            for geometry in &object.geometry {
                for shape in &geometry.shapes {
                    let wavefront_obj::obj::Primitive::Triangle(a, b, c) = shape.primitive else {
                        log::warn!("ignoring non-triangle primitive in {:?}", object.name);
                        continue;
                    };

                    let make_vertex = |(vi, ti, ni): (usize, Option<usize>, Option<usize>)| {
                        let v = &object.vertices[vi];
                        Vertex {
                            position: transform.apply_point(&WorldPoint::new(
                                v.x as FloatType,
                                v.y as FloatType,
                                v.z as FloatType,
                            )),
                            tex: ti.map_or_else(TexturePoint::origin, |i| {
                                let t = &object.tex_vertices[i];
                                TexturePoint::new(t.u as FloatType, t.v as FloatType)
                            }),
                            normal: ni.map_or_else(WorldVector::zeros, |i| {
                                let n = &object.normals[i];
                                transform.apply_normal(
                                    &WorldVector::new(
                                        n.x as FloatType,
                                        n.y as FloatType,
                                        n.z as FloatType,
                                    )
                                    .normalize(),
                                )
                            }),
                        }
                    };

                    let mut triangle = Triangle {
                        vertices: [make_vertex(a), make_vertex(b), make_vertex(c)],
                    };
                    // OBJ files may omit normals entirely
                    if triangle.vertices.iter().any(|v| v.normal == WorldVector::zeros()) {
                        triangle.set_flat_normals();
                    }

                    triangles.push(Primitive::triangle(triangle, Arc::clone(&material)));
                }
            }
        }

        Ok(MeshInstance::from_triangles(triangles))
    }

    pub fn from_triangles(triangles: Vec<Arc<Primitive>>) -> MeshInstance {
        let aabb =
            Aabb::from_boxes(triangles.iter().map(|t| t.bounding_box())).unwrap_or_else(|| {
                Aabb::new(WorldPoint::origin(), WorldPoint::origin())
            });
        MeshInstance {
            triangles,
            aabb,
            structure: OnceLock::new(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn bounding_box(&self) -> Aabb {
        self.aabb.clone()
    }

    /// Acceleration structure over the triangles, built on first use.
    pub fn structure(&self) -> Result<&Bvh, EmptySceneError> {
        self.structure
            .get_or_init(|| {
                let objects: Vec<SceneObject> = self
                    .triangles
                    .iter()
                    .map(|t| SceneObject::Primitive(Arc::clone(t)))
                    .collect();
                Bvh::build(&objects)
            })
            .as_ref()
            .map_err(Clone::clone)
    }
}
