mod machinery;
mod worker;

pub use machinery::{RenderProgress, render};

#[derive(Copy, Clone, Debug)]
pub struct RenderSettings {
    pub tile_size: std::num::NonZeroU32,
    pub sample_count: std::num::NonZeroU32,
    /// Base seed for reproducible renders. `None` seeds every tile from
    /// the OS.
    pub seed: Option<u64>,
}
