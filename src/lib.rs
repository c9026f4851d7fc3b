mod camera;
pub mod geometry;
mod integrator;
pub mod material;
mod renderer;
pub mod scene;
mod screen_block;
pub mod util;

pub use crate::renderer::{RenderProgress, RenderSettings, render};
pub use camera::Camera;
pub use integrator::PathTracer;
pub use scene::Scene;
pub use screen_block::ScreenBlock;
