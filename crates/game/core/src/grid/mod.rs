//! Pixel layout of the hex grid and the scrollable viewport over it.

mod layout;
mod viewport;

pub use layout::{
    CELL_WIDTH, Extent, GridLayout, MAP_PADDING, MapDimensions, Pixel, ROW_HEIGHT_RATIO,
    ROW_OFFSET,
};
pub use viewport::{SCROLL_SPEED, ScrollDirection, Viewport, scroll};
