//! Planar coordinates and coarse compass headings

use serde::{Deserialize, Serialize};

/// A point on the simulation plane
///
/// The plane uses screen orientation: `y` grows downward, so "north" means
/// a smaller `y`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, derive_more::Display)]
#[display("({x}, {y})")]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Coord) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f64, f64)> for Coord {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Coarse direction of travel from one point toward another
///
/// Used both for a host's own movement (previous location toward current
/// location) and for a host's bearing toward a destination region's
/// centroid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Heading {
    #[default]
    StandStill,
    NorthEast,
    SouthWest,
    SouthEast,
    NorthWest,
}

impl Heading {
    /// The four moving headings
    pub const COMPASS: [Heading; 4] = [
        Heading::NorthEast,
        Heading::SouthWest,
        Heading::SouthEast,
        Heading::NorthWest,
    ];

    /// Classify the bearing from `from` toward `to`
    ///
    /// Equal points are `StandStill`. A target on the same row counts as
    /// north, a target in the same column counts as east.
    pub fn toward(from: Coord, to: Coord) -> Heading {
        if from == to {
            return Heading::StandStill;
        }
        let north = from.y >= to.y;
        let east = from.x <= to.x;
        match (north, east) {
            (true, true) => Heading::NorthEast,
            (true, false) => Heading::NorthWest,
            (false, true) => Heading::SouthEast,
            (false, false) => Heading::SouthWest,
        }
    }

    /// Legacy numeric code (0 stand-still, 1 NE, 2 SW, 3 SE, 4 NW)
    pub fn code(&self) -> u8 {
        match self {
            Heading::StandStill => 0,
            Heading::NorthEast => 1,
            Heading::SouthWest => 2,
            Heading::SouthEast => 3,
            Heading::NorthWest => 4,
        }
    }

    pub fn is_moving(&self) -> bool {
        *self != Heading::StandStill
    }
}
