use std::panic::{AssertUnwindSafe, catch_unwind};

use image::RgbImage;
use rand::{SeedableRng, rngs::SmallRng};

use crate::{
    geometry::{Color, FloatType, ScreenPoint},
    renderer::machinery::RenderState,
    scene::bvh::TraversalHistory,
    screen_block::ScreenBlock,
};

pub struct Worker {
    dropped_samples: u64,
}

impl Worker {
    pub fn new() -> Self {
        Worker { dropped_samples: 0 }
    }

    pub fn render_tile(
        &mut self,
        state: &RenderState,
        tile_index: usize,
        tile: &ScreenBlock,
        buffer: &mut RgbImage,
    ) {
        let mut rng = match state.settings.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(tile_index as u64)),
            None => SmallRng::from_os_rng(),
        };

        let sample_count = state.settings.sample_count.get();
        for point in tile.internal_points() {
            let mut pixel_sum = Color::zeros();
            for _i in 0..sample_count {
                pixel_sum += self.render_sample(state, &point, &mut rng);
            }
            // Dropped samples still count towards the average; a handful
            // of slightly darkened pixels beats a crashed render
            let pixel = pixel_sum / sample_count as FloatType;

            let buffer_position = point - tile.min;
            buffer.put_pixel(buffer_position.x, buffer_position.y, tone_map(&pixel));
        }
    }

    fn render_sample(
        &mut self,
        state: &RenderState,
        point: &ScreenPoint,
        rng: &mut SmallRng,
    ) -> Color {
        let result = catch_unwind(AssertUnwindSafe(|| {
            let ray = state.camera.sample_ray(point, rng);
            let mut history = TraversalHistory::default();
            state.tracer.radiance(&state.scene, &ray, &mut history, rng)
        }));

        result.unwrap_or_else(|_| {
            self.dropped_samples += 1;
            log::warn!(
                "a sample at {:?} panicked and was dropped ({} so far on this worker)",
                point,
                self.dropped_samples
            );
            Color::zeros()
        })
    }
}

/// Gamma 2 tone mapping into 8 bit channels.
pub fn tone_map(color: &Color) -> image::Rgb<u8> {
    image::Rgb([
        channel_to_u8(color.x),
        channel_to_u8(color.y),
        channel_to_u8(color.z),
    ])
}

fn channel_to_u8(x: FloatType) -> u8 {
    (x.clamp(0.0, 1.0).sqrt() * 255.0).round() as u8
}
