pub mod bvh;
pub mod mesh;
pub mod primitives;

use std::sync::Arc;
use std::time::Instant;

use nalgebra::Unit;
use rand::RngCore;

use crate::geometry::{Aabb, FloatType, Ray, TexturePoint, WorldPoint, WorldVector};
use crate::material::Material;

use bvh::{Bvh, EmptySceneError, TraversalHistory, TraversalOptions};
use mesh::MeshInstance;
use primitives::Primitive;

/// A top level entry of the scene. Meshes stay whole so their prebuilt
/// hierarchy can be reused.
#[derive(Clone, Debug)]
pub enum SceneObject {
    Primitive(Arc<Primitive>),
    MeshInstance(Arc<MeshInstance>),
}

impl SceneObject {
    pub fn bounding_box(&self) -> Aabb {
        match self {
            SceneObject::Primitive(primitive) => primitive.bounding_box(),
            SceneObject::MeshInstance(mesh) => mesh.bounding_box(),
        }
    }
}

impl From<Arc<Primitive>> for SceneObject {
    fn from(primitive: Arc<Primitive>) -> SceneObject {
        SceneObject::Primitive(primitive)
    }
}

impl From<Arc<MeshInstance>> for SceneObject {
    fn from(mesh: Arc<MeshInstance>) -> SceneObject {
        SceneObject::MeshInstance(mesh)
    }
}

/// A surface hit or a scattering event inside a participating medium.
/// Medium events have no normal and no primitive.
#[derive(Clone, Debug)]
pub struct Intersection {
    pub point: WorldPoint,
    pub normal: Option<Unit<WorldVector>>,
    /// Direction back towards the ray origin.
    pub incoming: WorldVector,
    pub tex: TexturePoint,
    pub t: FloatType,
    pub material: Arc<dyn Material>,
    pub primitive: Option<Arc<Primitive>>,
}

impl Intersection {
    /// Surface normal, or the zero vector for medium events.
    pub fn shading_normal(&self) -> WorldVector {
        self.normal
            .map_or_else(WorldVector::zeros, |n| n.into_inner())
    }
}

/// Scene contents plus the acceleration structure over them. The structure
/// must be rebuilt after objects change.
#[derive(Debug, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
    lights: Vec<Arc<Primitive>>,
    structure: Option<Bvh>,
    traversal_options: TraversalOptions,
}

impl Scene {
    pub fn new() -> Scene {
        Scene::default()
    }

    pub fn add_object(&mut self, object: impl Into<SceneObject>) {
        self.objects.push(object.into());
    }

    /// Adds an emissive primitive both as scene geometry and to the light
    /// list used for statistics and debugging output.
    pub fn add_light(&mut self, primitive: Arc<Primitive>) {
        self.lights.push(Arc::clone(&primitive));
        self.objects.push(SceneObject::Primitive(primitive));
    }

    pub fn lights(&self) -> &[Arc<Primitive>] {
        &self.lights
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn set_traversal_options(&mut self, options: TraversalOptions) {
        self.traversal_options = options;
    }

    /// (Re)builds the acceleration structure over the current objects.
    pub fn build_structure(&mut self) -> Result<(), EmptySceneError> {
        let start = Instant::now();
        self.structure = Some(Bvh::build(&self.objects)?);
        log::info!(
            "scene structure over {} objects built in {:.2?}",
            self.objects.len(),
            start.elapsed()
        );
        Ok(())
    }

    pub fn structure(&self) -> Option<&Bvh> {
        self.structure.as_ref()
    }

    /// Nearest event along the ray. When the ray currently travels inside
    /// a medium, a free flight scattering distance is sampled and competes
    /// with the surface hits; surfaces closer than the sampled distance
    /// win, otherwise the ray scatters in the medium.
    ///
    /// `history` is updated in place to seed the next query.
    pub fn intersect(
        &self,
        ray: &Ray,
        history: &mut TraversalHistory,
        rng: &mut dyn RngCore,
    ) -> Option<Intersection> {
        let mut nearest: Option<Intersection> = None;

        if let Some(Some(medium)) = ray.media.last() {
            let t = medium.sample_distance(rng);
            if t.is_finite() {
                nearest = Some(Intersection {
                    point: ray.point_at(t),
                    normal: None,
                    incoming: -ray.direction,
                    tex: TexturePoint::origin(),
                    t,
                    material: Arc::clone(medium) as Arc<dyn Material>,
                    primitive: None,
                });
            }
        }

        if let Some(structure) = &self.structure {
            let mut cursor = structure.traverse(ray, history, self.traversal_options);
            while let Some(primitive) = cursor.next() {
                if let Some(hit) = Primitive::intersect(&primitive, ray) {
                    if nearest.as_ref().is_none_or(|n| hit.t < n.t) {
                        cursor.select(&hit);
                        nearest = Some(hit);
                    }
                }
            }
            *history = cursor.history();
        }

        nearest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Color;
    use crate::material::{Diffuse, Medium};

    use assert2::assert;
    use rand::SeedableRng as _;
    use rand::rngs::SmallRng;

    fn diffuse() -> Arc<dyn Material> {
        Arc::new(Diffuse::new(Color::repeat(0.5)))
    }

    fn scene_with_spheres(spheres: &[(f32, f32, f32, f32)]) -> Scene {
        let mut scene = Scene::new();
        for &(x, y, z, r) in spheres {
            scene.add_object(Primitive::sphere(WorldPoint::new(x, y, z), r, diffuse()));
        }
        scene.build_structure().unwrap();
        scene
    }

    #[test]
    fn empty_scene_fails_to_build() {
        let mut scene = Scene::new();
        assert!(scene.build_structure().is_err());
    }

    #[test]
    fn finds_the_nearest_surface() {
        let scene = scene_with_spheres(&[
            (0.0, 0.0, 10.0, 1.0),
            (0.0, 0.0, 4.0, 1.0),
            (0.0, 0.0, 7.0, 1.0),
        ]);
        let ray = Ray::new(WorldPoint::origin(), WorldVector::new(0.0, 0.0, 1.0));
        let mut rng = SmallRng::seed_from_u64(1);
        let mut history = TraversalHistory::default();

        let hit = scene.intersect(&ray, &mut history, &mut rng).unwrap();
        assert!((hit.t - 3.0).abs() < 1e-4);
        assert!(hit.primitive.is_some());
        assert!(history.last_selected.is_some());
    }

    #[test]
    fn miss_returns_none() {
        let scene = scene_with_spheres(&[(0.0, 0.0, 10.0, 1.0)]);
        let ray = Ray::new(WorldPoint::origin(), WorldVector::new(0.0, 1.0, 0.0));
        let mut rng = SmallRng::seed_from_u64(1);
        let mut history = TraversalHistory::default();

        assert!(scene.intersect(&ray, &mut history, &mut rng).is_none());
    }

    #[test]
    fn dense_medium_scatters_before_a_distant_surface() {
        let scene = scene_with_spheres(&[(0.0, 0.0, 1000.0, 1.0)]);
        let medium = Arc::new(Medium::new(Color::repeat(0.9), 0.0, 50.0));

        let mut ray = Ray::new(WorldPoint::origin(), WorldVector::new(0.0, 0.0, 1.0));
        ray.media.push(Some(Arc::clone(&medium)));

        let mut rng = SmallRng::seed_from_u64(2);
        let mut history = TraversalHistory::default();

        let hit = scene.intersect(&ray, &mut history, &mut rng).unwrap();
        // Mean free path is 1/50; reaching t = 999 without scattering is
        // beyond astronomically unlikely.
        assert!(hit.t < 999.0);
        assert!(hit.primitive.is_none());
        assert!(hit.normal.is_none());
    }

    #[test]
    fn thin_medium_lets_a_close_surface_win() {
        let scene = scene_with_spheres(&[(0.0, 0.0, 2.0, 1.0)]);
        let medium = Arc::new(Medium::new(Color::repeat(0.9), 0.0, 1e-6));

        let mut ray = Ray::new(WorldPoint::origin(), WorldVector::new(0.0, 0.0, 1.0));
        ray.media.push(Some(Arc::clone(&medium)));

        let mut rng = SmallRng::seed_from_u64(3);
        let mut history = TraversalHistory::default();

        let hit = scene.intersect(&ray, &mut history, &mut rng).unwrap();
        assert!((hit.t - 1.0).abs() < 1e-4);
        assert!(hit.primitive.is_some());
    }

    #[test]
    fn vacuum_entry_on_the_media_stack_is_ignored() {
        let scene = scene_with_spheres(&[(0.0, 0.0, 2.0, 1.0)]);

        let mut ray = Ray::new(WorldPoint::origin(), WorldVector::new(0.0, 0.0, 1.0));
        ray.media.push(None);

        let mut rng = SmallRng::seed_from_u64(4);
        let mut history = TraversalHistory::default();

        let hit = scene.intersect(&ray, &mut history, &mut rng).unwrap();
        assert!(hit.primitive.is_some());
    }

    #[test]
    fn medium_only_scattering_without_any_surface_hit() {
        let scene = scene_with_spheres(&[(100.0, 0.0, 0.0, 1.0)]);
        let medium = Arc::new(Medium::new(Color::repeat(0.9), 0.0, 10.0));

        let mut ray = Ray::new(WorldPoint::origin(), WorldVector::new(0.0, 0.0, 1.0));
        ray.media.push(Some(medium));

        let mut rng = SmallRng::seed_from_u64(5);
        let mut history = TraversalHistory::default();

        let hit = scene.intersect(&ray, &mut history, &mut rng).unwrap();
        assert!(hit.primitive.is_none());
    }
}
