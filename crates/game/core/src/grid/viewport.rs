use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::layout::{Extent, Pixel};

/// Default scroll step per tick, in pixels.
pub const SCROLL_SPEED: f64 = 10.0;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScrollDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Lowest offset reachable on one axis: `0` when the map fits.
fn lower_bound(map: f64, viewport: f64) -> f64 {
    (-(map - viewport)).min(0.0)
}

/// One scroll step from `offset`, clamped to `[min(0, -(map - viewport)), 0]`.
pub fn scroll(
    direction: ScrollDirection,
    offset: Pixel,
    map: Extent,
    viewport: Extent,
    speed: f64,
) -> Pixel {
    let mut next = offset;
    match direction {
        ScrollDirection::Left => next.x = (offset.x + speed).min(0.0),
        ScrollDirection::Right => {
            next.x = (offset.x - speed).max(lower_bound(map.width, viewport.width))
        }
        ScrollDirection::Up => next.y = (offset.y + speed).min(0.0),
        ScrollDirection::Down => {
            next.y = (offset.y - speed).max(lower_bound(map.height, viewport.height))
        }
    }
    next
}

/// Scrollable window onto a map.
///
/// The background layer uses the same translation as the grid, so both
/// move together.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    offset: Pixel,
    map: Extent,
    viewport: Extent,
    speed: f64,
}

impl Viewport {
    pub fn new(map: Extent, viewport: Extent) -> Self {
        Self {
            offset: Pixel::ORIGIN,
            map,
            viewport,
            speed: SCROLL_SPEED,
        }
    }

    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed.abs();
        self
    }

    pub fn offset(&self) -> Pixel {
        self.offset
    }

    pub fn background_transform(&self) -> Pixel {
        self.offset
    }

    pub fn map_extent(&self) -> Extent {
        self.map
    }

    pub fn viewport_extent(&self) -> Extent {
        self.viewport
    }

    pub fn scroll(&mut self, direction: ScrollDirection) -> Pixel {
        self.offset = scroll(direction, self.offset, self.map, self.viewport, self.speed);
        self.offset
    }

    /// Whether another step in `direction` would move the offset.
    pub fn can_scroll(&self, direction: ScrollDirection) -> bool {
        scroll(direction, self.offset, self.map, self.viewport, self.speed) != self.offset
    }

    /// Updates the viewport size and pulls the offset back into range.
    pub fn resize(&mut self, viewport: Extent) {
        self.viewport = viewport;
        self.clamp();
    }

    pub fn set_map(&mut self, map: Extent) {
        self.map = map;
        self.clamp();
    }

    fn clamp(&mut self) {
        self.offset.x = self
            .offset
            .x
            .clamp(lower_bound(self.map.width, self.viewport.width), 0.0);
        self.offset.y = self
            .offset
            .y
            .clamp(lower_bound(self.map.height, self.viewport.height), 0.0);
    }
}
