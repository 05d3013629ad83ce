//! Hex-grid coordinate math for the staggered (offset-row) battlefield grid.
//!
//! Cells are addressed by `(x, y)` offset coordinates where odd rows are
//! shifted half a cell to the right. The redundant cube component
//! `z = -x - y` is carried alongside so distance is a single max over the
//! three axes.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Immutable hex coordinate with the cube invariant `z == -x - y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "GridPoint", into = "GridPoint")]
pub struct HexCoordinate {
    x: i32,
    y: i32,
    z: i32,
}

impl HexCoordinate {
    pub const ORIGIN: Self = Self { x: 0, y: 0, z: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y, z: -x - y }
    }

    pub const fn x(self) -> i32 {
        self.x
    }

    pub const fn y(self) -> i32 {
        self.y
    }

    pub const fn z(self) -> i32 {
        self.z
    }

    #[inline]
    const fn is_even_row(self) -> bool {
        self.y.rem_euclid(2) == 0
    }

    /// Returns the coordinate one step away in `direction`.
    ///
    /// Diagonal steps depend on row parity: even rows reach `x` and `x + 1`
    /// on the neighbouring rows, odd rows reach `x - 1` and `x`.
    pub fn step(self, direction: HexDirection) -> Self {
        let even = self.is_even_row();
        let (dx, dy) = match direction {
            HexDirection::Right => (1, 0),
            HexDirection::Left => (-1, 0),
            HexDirection::TopLeft => (if even { 0 } else { -1 }, 1),
            HexDirection::TopRight => (if even { 1 } else { 0 }, 1),
            HexDirection::BottomLeft => (if even { 0 } else { -1 }, -1),
            HexDirection::BottomRight => (if even { 1 } else { 0 }, -1),
        };
        Self::new(self.x + dx, self.y + dy)
    }

    /// Neighbouring cells that lie inside a `width` x `height` grid.
    ///
    /// Order is right, left, top-left, top-right, bottom-left, bottom-right.
    pub fn neighbors(self, width: u32, height: u32) -> Vec<Self> {
        const ORDER: [HexDirection; 6] = [
            HexDirection::Right,
            HexDirection::Left,
            HexDirection::TopLeft,
            HexDirection::TopRight,
            HexDirection::BottomLeft,
            HexDirection::BottomRight,
        ];

        ORDER
            .iter()
            .map(|&direction| self.step(direction))
            .filter(|coord| coord.within(width, height))
            .collect()
    }

    /// Cube distance: the largest absolute difference across the three axes.
    pub fn distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        let dz = self.z.abs_diff(other.z);
        dx.max(dy).max(dz)
    }

    pub fn within(self, width: u32, height: u32) -> bool {
        self.x >= 0 && self.y >= 0 && (self.x as u32) < width && (self.y as u32) < height
    }

    /// Storage key form used by deployment placements (`"x,y"`).
    pub fn cell_key(self) -> String {
        format!("{},{}", self.x, self.y)
    }

    /// Parses the `"x,y"` cell key form.
    pub fn from_cell_key(key: &str) -> Option<Self> {
        let (x, y) = key.split_once(',')?;
        Some(Self::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
    }
}

impl Default for HexCoordinate {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl fmt::Display for HexCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl From<(i32, i32)> for HexCoordinate {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Plain `{x, y}` pair as it appears in authored and persisted JSON.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<GridPoint> for HexCoordinate {
    fn from(point: GridPoint) -> Self {
        Self::new(point.x, point.y)
    }
}

impl From<HexCoordinate> for GridPoint {
    fn from(coord: HexCoordinate) -> Self {
        Self::new(coord.x, coord.y)
    }
}

/// The six directions reachable from a hex cell.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum HexDirection {
    TopLeft,
    TopRight,
    Right,
    BottomRight,
    BottomLeft,
    Left,
}

impl HexDirection {
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::TopLeft => Self::BottomRight,
            Self::TopRight => Self::BottomLeft,
            Self::Right => Self::Left,
            Self::BottomRight => Self::TopLeft,
            Self::BottomLeft => Self::TopRight,
            Self::Left => Self::Right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_invariant_holds() {
        for (x, y) in [(0, 0), (3, -2), (-4, 7), (10, 10)] {
            let coord = HexCoordinate::new(x, y);
            assert_eq!(coord.x() + coord.y() + coord.z(), 0);
        }
    }

    #[test]
    fn diagonal_steps_depend_on_row_parity() {
        let even = HexCoordinate::new(2, 2);
        assert_eq!(even.step(HexDirection::TopLeft), HexCoordinate::new(2, 3));
        assert_eq!(even.step(HexDirection::TopRight), HexCoordinate::new(3, 3));
        assert_eq!(even.step(HexDirection::BottomLeft), HexCoordinate::new(2, 1));
        assert_eq!(even.step(HexDirection::BottomRight), HexCoordinate::new(3, 1));

        let odd = HexCoordinate::new(2, 3);
        assert_eq!(odd.step(HexDirection::TopLeft), HexCoordinate::new(1, 4));
        assert_eq!(odd.step(HexDirection::TopRight), HexCoordinate::new(2, 4));
        assert_eq!(odd.step(HexDirection::BottomLeft), HexCoordinate::new(1, 2));
        assert_eq!(odd.step(HexDirection::BottomRight), HexCoordinate::new(2, 2));
    }

    #[test]
    fn neighbors_are_clipped_to_grid() {
        let corner = HexCoordinate::new(0, 0);
        let neighbors = corner.neighbors(5, 5);
        assert_eq!(
            neighbors,
            vec![HexCoordinate::new(1, 0), HexCoordinate::new(0, 1), HexCoordinate::new(1, 1)]
        );

        let inner = HexCoordinate::new(2, 2);
        assert_eq!(inner.neighbors(5, 5).len(), 6);
    }

    #[test]
    fn distance_uses_cube_axes() {
        let a = HexCoordinate::new(0, 0);
        assert_eq!(a.distance(a), 0);
        assert_eq!(a.distance(HexCoordinate::new(3, 0)), 3);
        assert_eq!(a.distance(HexCoordinate::new(2, -5)), 5);
        assert_eq!(
            HexCoordinate::new(1, 2).distance(HexCoordinate::new(4, 0)),
            HexCoordinate::new(4, 0).distance(HexCoordinate::new(1, 2))
        );
    }

    #[test]
    fn cell_key_round_trips() {
        let coord = HexCoordinate::new(4, 7);
        assert_eq!(coord.cell_key(), "4,7");
        assert_eq!(HexCoordinate::from_cell_key("4,7"), Some(coord));
        assert_eq!(HexCoordinate::from_cell_key("4;7"), None);
    }

    #[test]
    fn direction_parses_kebab_case() {
        assert_eq!("top-left".parse::<HexDirection>().ok(), Some(HexDirection::TopLeft));
        assert_eq!(HexDirection::BottomRight.to_string(), "bottom-right");
        assert_eq!(HexDirection::all().count(), 6);
    }
}
