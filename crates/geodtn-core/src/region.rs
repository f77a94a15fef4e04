//! Polygonal regions and their edge equations
//!
//! A [`Region`] is the destination of a geocast message and also the shape
//! of a statistics cell. Membership is decided by a ray test over edge line
//! equations that are computed once at construction.
//!
//! ## Membership rule
//!
//! For a point `(x, y)`, every edge whose x-range brackets `x` contributes
//! its line value at `x`. Values strictly above `y` are counted in `above`,
//! values strictly below in `below`. Both counts odd means inside. If the
//! parities disagree the point sits on a vertex or edge, and the test is
//! repeated at `x + `[`BOUNDARY_OFFSET`]; that sample decides. Both counts
//! even means outside.
//!
//! Vertical edges produce no equation and never contribute to a count. This
//! is an accepted approximation of the ray test.

use crate::error::{ConfigError, ConfigResult};
use crate::geometry::Coord;

/// Horizontal offset of the tie-break sample for on-boundary points
pub const BOUNDARY_OFFSET: f64 = 0.02;

/// Line equation of one non-vertical polygon edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeEquation {
    slope: f64,
    intercept: f64,
    /// Endpoint abscissas in vertex order, not sorted
    x_range: (f64, f64),
}

impl EdgeEquation {
    /// Build the equation through two points, or `None` for a vertical edge
    pub fn through(a: Coord, b: Coord) -> Option<Self> {
        if a.x == b.x {
            return None;
        }
        let slope = (b.y - a.y) / (b.x - a.x);
        Some(Self {
            slope,
            intercept: a.y - slope * a.x,
            x_range: (a.x, b.x),
        })
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Raw x-range; callers needing bounds should use [`spans`](Self::spans)
    pub fn x_range(&self) -> (f64, f64) {
        self.x_range
    }

    /// Line value at `x`
    pub fn value_at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Whether `x` lies within the edge's x-range, endpoints included
    pub fn spans(&self, x: f64) -> bool {
        let (a, b) = self.x_range;
        x >= a.min(b) && x <= a.max(b)
    }

    /// Abscissa where the two lines meet, `None` when parallel
    pub fn intersection_x(&self, other: &EdgeEquation) -> Option<f64> {
        let dm = self.slope - other.slope;
        if dm == 0.0 {
            return None;
        }
        Some((other.intercept - self.intercept) / dm)
    }

    /// Whether the two edge segments cross
    pub fn crosses(&self, other: &EdgeEquation) -> bool {
        self.intersection_x(other)
            .is_some_and(|x| self.spans(x) && other.spans(x))
    }
}

/// A closed polygon on the simulation plane
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    vertices: Vec<Coord>,
    edges: Vec<EdgeEquation>,
    centroid: Coord,
    radius: f64,
}

impl Region {
    /// Build a region from its vertices in boundary order
    ///
    /// An explicit repeat of the first vertex at the end is accepted and
    /// ignored. Fewer than 3 distinct vertices is a configuration error.
    pub fn new(vertices: impl IntoIterator<Item = Coord>) -> ConfigResult<Self> {
        let mut vertices: Vec<Coord> = vertices.into_iter().collect();
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        let distinct = vertices
            .iter()
            .enumerate()
            .filter(|(i, v)| !vertices[..*i].contains(v))
            .count();
        if distinct < 3 {
            return Err(ConfigError::DegenerateRegion { vertices: distinct });
        }

        let n = vertices.len();
        let edges = (0..n)
            .filter_map(|i| EdgeEquation::through(vertices[i], vertices[(i + 1) % n]))
            .collect();

        let (sx, sy) = vertices
            .iter()
            .fold((0.0, 0.0), |(sx, sy), v| (sx + v.x, sy + v.y));
        let centroid = Coord::new(sx / n as f64, sy / n as f64);
        let radius = vertices
            .iter()
            .map(|v| v.distance(&centroid))
            .fold(0.0, f64::max);

        Ok(Self {
            vertices,
            edges,
            centroid,
            radius,
        })
    }

    /// Convenience constructor from `(x, y)` pairs
    pub fn from_points(points: &[(f64, f64)]) -> ConfigResult<Self> {
        Self::new(points.iter().copied().map(Coord::from))
    }

    pub fn vertices(&self) -> &[Coord] {
        &self.vertices
    }

    pub fn edges(&self) -> &[EdgeEquation] {
        &self.edges
    }

    /// Arithmetic mean of the vertices
    pub fn centroid(&self) -> Coord {
        self.centroid
    }

    /// Largest vertex distance from the centroid
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Vertex closest to `point`; on ties the later vertex wins
    pub fn nearest_vertex(&self, point: Coord) -> Coord {
        let mut best = self.vertices[0];
        let mut best_dist = f64::INFINITY;
        for v in &self.vertices {
            let d = v.distance(&point);
            if d <= best_dist {
                best_dist = d;
                best = *v;
            }
        }
        best
    }

    /// Point-membership test
    pub fn contains(&self, point: Coord) -> bool {
        if point.distance(&self.centroid) > self.radius {
            return false;
        }

        let (above, below) = self.crossings(point.x, point.y);
        match (above % 2 == 1, below % 2 == 1) {
            (true, true) => true,
            (false, false) => false,
            _ => {
                let (above, below) = self.crossings(point.x + BOUNDARY_OFFSET, point.y);
                above % 2 == 1 && below % 2 == 1
            }
        }
    }

    /// Whether any edge of this region crosses any edge of `other`
    pub fn boundary_crosses(&self, other: &Region) -> bool {
        self.edges
            .iter()
            .any(|e| other.edges.iter().any(|o| e.crosses(o)))
    }

    fn crossings(&self, x: f64, y: f64) -> (usize, usize) {
        let mut above = 0;
        let mut below = 0;
        for edge in self.edges.iter().filter(|e| e.spans(x)) {
            let v = edge.value_at(x);
            if v > y {
                above += 1;
            }
            if v < y {
                below += 1;
            }
        }
        (above, below)
    }
}
