use std::sync::Arc;

use indicatif::ProgressBar;

use wisp::{
    Camera, PathTracer, RenderSettings, Scene,
    geometry::{Color, ScreenSize, TexturePoint, WorldPoint, WorldVector},
    material::{
        Diffuse, DiffuseTextured, GgxReflection, GgxRefraction, Material, Medium, NullSurface,
        Texture,
    },
    render,
    scene::{
        mesh::{MeshInstance, Transform},
        primitives::{Primitive, Triangle, Vertex},
    },
};

fn quad(
    corners: [WorldPoint; 4],
    normal: WorldVector,
    material: &Arc<dyn Material>,
) -> [Arc<Primitive>; 2] {
    let uvs = [
        TexturePoint::new(0.0, 0.0),
        TexturePoint::new(1.0, 0.0),
        TexturePoint::new(1.0, 1.0),
        TexturePoint::new(0.0, 1.0),
    ];
    let vertex = |corner: usize| Vertex {
        position: corners[corner],
        normal,
        tex: uvs[corner],
    };
    let triangle = |a: usize, b: usize, c: usize| {
        Primitive::triangle(
            Triangle {
                vertices: [vertex(a), vertex(b), vertex(c)],
            },
            Arc::clone(material),
        )
    };
    [triangle(0, 1, 2), triangle(0, 2, 3)]
}

fn checkerboard(tiles: u32) -> Texture {
    let image = image::Rgb32FImage::from_fn(tiles, tiles, |x, y| {
        if (x + y) % 2 == 0 {
            image::Rgb([0.8, 0.8, 0.8])
        } else {
            image::Rgb([0.25, 0.25, 0.25])
        }
    });
    Texture::from_image(image)
}

fn build_scene(mesh_path: Option<&str>) -> anyhow::Result<Scene> {
    let mut scene = Scene::new();

    let floor: Arc<dyn Material> =
        Arc::new(DiffuseTextured::new(Arc::new(checkerboard(16))));
    for primitive in quad(
        [
            WorldPoint::new(-10.0, 0.0, -10.0),
            WorldPoint::new(10.0, 0.0, -10.0),
            WorldPoint::new(10.0, 0.0, 10.0),
            WorldPoint::new(-10.0, 0.0, 10.0),
        ],
        WorldVector::y(),
        &floor,
    ) {
        scene.add_object(primitive);
    }

    let light: Arc<dyn Material> =
        Arc::new(Diffuse::emissive(Color::zeros(), Color::repeat(8.0)));
    for primitive in quad(
        [
            WorldPoint::new(-1.5, 5.0, -1.5),
            WorldPoint::new(-1.5, 5.0, 1.5),
            WorldPoint::new(1.5, 5.0, 1.5),
            WorldPoint::new(1.5, 5.0, -1.5),
        ],
        -WorldVector::y(),
        &light,
    ) {
        scene.add_light(primitive);
    }

    scene.add_object(Primitive::sphere(
        WorldPoint::new(-1.5, 1.0, 0.0),
        1.0,
        Arc::new(Diffuse::new(Color::new(0.8, 0.3, 0.3))),
    ));
    scene.add_object(Primitive::sphere(
        WorldPoint::new(1.5, 1.0, 0.0),
        1.0,
        Arc::new(GgxReflection::new(Color::repeat(0.9), 0.05)),
    ));

    // Glass sphere filled with a slightly scattering absorbing medium
    let glass_fill = Arc::new(Medium::new(Color::repeat(0.95), 0.2, 0.5));
    scene.add_object(Primitive::sphere(
        WorldPoint::new(0.0, 1.0, 2.0),
        0.8,
        Arc::new(GgxRefraction::with_medium(1.5, 0.05, glass_fill)),
    ));

    // Fog volume bounded by an invisible surface
    let fog = Arc::new(Medium::new(Color::repeat(0.9), 0.02, 0.15));
    scene.add_object(Primitive::sphere(
        WorldPoint::new(0.0, 2.0, -3.0),
        2.5,
        Arc::new(NullSurface::new(fog)),
    ));

    if let Some(path) = mesh_path {
        let transform = Transform {
            translation: WorldVector::new(0.0, 1.0, -1.0),
            ..Default::default()
        };
        let mesh = MeshInstance::with_obj(path, &transform, |name| {
            log::info!("mesh object {name:?} gets the default material");
            Arc::new(Diffuse::new(Color::repeat(0.6)))
        })?;
        log::info!("loaded {path:?} with {} triangles", mesh.triangle_count());
        scene.add_object(Arc::new(mesh));
    }

    scene.build_structure()?;
    Ok(scene)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mesh_path = std::env::args().nth(1);
    let scene = build_scene(mesh_path.as_deref())?;

    if let Some(structure) = scene.structure() {
        log::info!("scene structure: {}", structure.statistics());
    }
    log::info!(
        "{} objects, {} lights",
        scene.object_count(),
        scene.lights().len()
    );

    let camera = Camera::builder()
        .center(WorldPoint::new(0.0, 2.0, 10.0))
        .forward(WorldVector::new(0.0, -0.1, -1.0))
        .up(WorldVector::new(0.0, 1.0, 0.0))
        .resolution(ScreenSize::new(1024, 768))
        .film_width(36e-3)
        .focal_length(50e-3)
        .f_number(4.8)
        .focus_distance(10.0)
        .build();

    let tracer = PathTracer::builder().build();
    let settings = RenderSettings {
        tile_size: 64.try_into().unwrap(),
        sample_count: 100.try_into().unwrap(),
        seed: None,
    };

    let bar = ProgressBar::no_length();
    let mut render_progress = render(scene, camera, tracer, settings, |_| {}, {
        let bar = bar.clone();
        move |_| bar.inc(1)
    })?;
    bar.set_length(render_progress.progress().1 as u64);

    render_progress.wait();
    bar.finish();

    let image = render_progress.image().lock().expect("Poisoned lock!");
    image.save("render.png")?;
    log::info!("wrote render.png");

    Ok(())
}
