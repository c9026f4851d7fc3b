use std::num::NonZeroU32;

use itertools::iproduct;

use crate::geometry::{ScreenPoint, ScreenSize};

/// Half open rectangle of pixels, `min` inclusive and `max` exclusive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScreenBlock {
    pub min: ScreenPoint,
    pub max: ScreenPoint,
}

impl ScreenBlock {
    pub fn from_size(size: ScreenSize) -> ScreenBlock {
        ScreenBlock {
            min: ScreenPoint::origin(),
            max: ScreenPoint::origin() + size,
        }
    }

    pub fn width(&self) -> u32 {
        self.max.x.saturating_sub(self.min.x)
    }

    pub fn height(&self) -> u32 {
        self.max.y.saturating_sub(self.min.y)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// Pixels of the block in row major order.
    pub fn internal_points(&self) -> impl Iterator<Item = ScreenPoint> + use<> {
        iproduct!(self.min.y..self.max.y, self.min.x..self.max.x)
            .map(|(y, x)| ScreenPoint::new(x, y))
    }

    /// Splits the block into tiles of at most `tile_size` by `tile_size`
    /// pixels, clipped at the right and bottom edges, in row major order.
    pub fn tiles(&self, tile_size: NonZeroU32) -> Vec<ScreenBlock> {
        let tile_size = tile_size.get();
        iproduct!(
            (self.min.y..self.max.y).step_by(tile_size as usize),
            (self.min.x..self.max.x).step_by(tile_size as usize)
        )
        .map(|(y, x)| ScreenBlock {
            min: ScreenPoint::new(x, y),
            max: ScreenPoint::new(
                (x + tile_size).min(self.max.x),
                (y + tile_size).min(self.max.y),
            ),
        })
        .collect()
    }
}
