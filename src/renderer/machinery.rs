use std::{
    ops::Deref as _,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
};

use image::{GenericImage, GenericImageView, RgbImage};

use crate::{
    camera::Camera,
    integrator::PathTracer,
    renderer::{RenderSettings, worker::Worker},
    scene::Scene,
    screen_block::ScreenBlock,
};

/// Renders the scene into tiles on one worker thread per CPU. Returns
/// immediately; the returned handle tracks and joins the workers.
///
/// The scene structure must already be built.
pub fn render<
    F1: Fn(ScreenBlock) + Send + Sync + 'static,
    F2: Fn(ScreenBlock) + Send + Sync + 'static,
>(
    scene: Scene,
    camera: Camera,
    tracer: PathTracer,
    settings: RenderSettings,
    started_tile_callback: F1,
    finished_tile_callback: F2,
) -> anyhow::Result<RenderProgress> {
    anyhow::ensure!(
        scene.structure().is_some(),
        "Scene structure must be built before rendering"
    );

    let resolution = camera.resolution();
    let image = RgbImage::new(resolution.x, resolution.y);
    let state = Arc::new(RenderState {
        scene,
        camera,
        tracer,
        settings,

        image: Mutex::new(image),

        tile_ordering: ScreenBlock::from_size(resolution).tiles(settings.tile_size),
        next_tile_index: AtomicUsize::new(0),
    });
    let started_tile_callback = Arc::new(started_tile_callback);
    let finished_tile_callback = Arc::new(finished_tile_callback);

    // Without a core list from the OS we still run one worker per CPU,
    // just unpinned.
    let cores: Vec<Option<core_affinity::CoreId>> = match core_affinity::get_core_ids() {
        Some(ids) => ids.into_iter().map(Some).collect(),
        None => vec![None; num_cpus::get()],
    };

    let threads = cores
        .into_iter()
        .enumerate()
        .map(|(worker_id, core)| {
            let state = Arc::clone(&state);
            let started_tile_callback = Arc::clone(&started_tile_callback);
            let finished_tile_callback = Arc::clone(&finished_tile_callback);

            thread::Builder::new()
                .name(format!("worker{worker_id}"))
                .spawn(move || {
                    if let Some(core) = core {
                        core_affinity::set_for_current(core);
                    }

                    let mut worker = Worker::new();
                    let mut buffer =
                        RgbImage::new(settings.tile_size.into(), settings.tile_size.into());

                    while let Some((tile_index, tile)) = state.get_next_tile() {
                        (started_tile_callback)(*tile);

                        worker.render_tile(&state, tile_index, tile, &mut buffer);
                        state
                            .image
                            .lock()
                            .expect("Poisoned lock!")
                            .copy_from(
                                buffer.view(0, 0, tile.width(), tile.height()).deref(),
                                tile.min.x,
                                tile.min.y,
                            )
                            .unwrap_or_else(|_| {
                                unreachable!("The buffer should always fit into the output")
                            });

                        (finished_tile_callback)(*tile);
                    }
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RenderProgress {
        render_state: state,
        threads,
    })
}

pub struct RenderProgress {
    render_state: Arc<RenderState>,
    threads: Vec<JoinHandle<()>>,
}

impl RenderProgress {
    /// Number of processed and total tiles.
    pub fn progress(&self) -> (usize, usize) {
        let total = self.render_state.tile_ordering.len();
        let processed = self
            .render_state
            .next_tile_index
            .load(Ordering::Acquire)
            .min(total);
        (processed, total)
    }

    pub fn progress_percent(&self) -> f32 {
        let (processed, total) = self.progress();
        100.0 * (processed as f32) / (total as f32)
    }

    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(|handle| handle.is_finished())
    }

    /// Signals the workers to abort. Running workers still finish their
    /// current tile, but no new ones are started.
    pub fn abort(&self) {
        self.render_state
            .next_tile_index
            .store(self.render_state.tile_ordering.len(), Ordering::Release);
    }

    /// Joins all worker threads.
    pub fn wait(&mut self) {
        self.threads
            .drain(..)
            .for_each(|handle| handle.join().unwrap());
    }

    pub fn image(&self) -> &Mutex<RgbImage> {
        &self.render_state.image
    }
}

pub(super) struct RenderState {
    pub scene: Scene,
    pub camera: Camera,
    pub tracer: PathTracer,
    pub settings: RenderSettings,

    image: Mutex<RgbImage>,

    tile_ordering: Vec<ScreenBlock>,
    next_tile_index: AtomicUsize,
}

impl RenderState {
    fn get_next_tile(&self) -> Option<(usize, &ScreenBlock)> {
        let id = self.next_tile_index.fetch_add(1, Ordering::AcqRel);
        self.tile_ordering.get(id).map(|tile| (id, tile))
    }
}
