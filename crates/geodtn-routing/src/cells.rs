//! Statistics cells and per-host visit history
//!
//! Scored strategies split the map into a fixed set of small regions
//! ("cells") and remember, per host, when it entered each cell and whether
//! it met anyone while there. From the gaps between entries they estimate
//! how often the host comes back.

use std::sync::Arc;

use geodtn_core::{ConfigResult, Coord, Region, SimTime};

/// The externally supplied cell partition of the map
#[derive(Debug, Clone, Default)]
pub struct CellGrid {
    cells: Vec<Region>,
}

impl CellGrid {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(cells: Vec<Region>) -> Self {
        Self { cells }
    }

    /// A `cols` × `rows` grid of rectangles starting at `origin`
    pub fn regular(
        origin: Coord,
        cell_width: f64,
        cell_height: f64,
        cols: usize,
        rows: usize,
    ) -> ConfigResult<Self> {
        let mut cells = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let x = origin.x + col as f64 * cell_width;
                let y = origin.y + row as f64 * cell_height;
                cells.push(Region::new([
                    Coord::new(x, y),
                    Coord::new(x + cell_width, y),
                    Coord::new(x + cell_width, y + cell_height),
                    Coord::new(x, y + cell_height),
                ])?);
            }
        }
        Ok(Self { cells })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, index: usize) -> Option<&Region> {
        self.cells.get(index)
    }

    pub fn cells(&self) -> &[Region] {
        &self.cells
    }

    /// First cell containing `location`
    pub fn cell_at(&self, location: Coord) -> Option<usize> {
        self.cells.iter().position(|c| c.contains(location))
    }

    /// Cells whose boundary crosses the boundary of `region`
    pub fn cells_crossing(&self, region: &Region) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.boundary_crosses(region))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Mean and population variance of a sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapStats {
    pub mean: f64,
    pub variance: f64,
}

impl GapStats {
    fn of(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Some(Self { mean, variance })
    }
}

/// One host's history of cell entries and contacts
#[derive(Debug, Clone)]
pub struct VisitHistory {
    grid: Arc<CellGrid>,
    /// Entry times per cell, in seconds
    visits: Vec<Vec<f64>>,
    /// Per cell, one flag per completed stay: met anyone while there
    contacts: Vec<Vec<bool>>,
    current: Option<usize>,
    met_in_current: bool,
}

impl VisitHistory {
    pub fn new(grid: Arc<CellGrid>) -> Self {
        let n = grid.len();
        Self {
            grid,
            visits: vec![Vec::new(); n],
            contacts: vec![Vec::new(); n],
            current: None,
            met_in_current: false,
        }
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    pub fn current_cell(&self) -> Option<usize> {
        self.current
    }

    /// Note where the host is at `now` and whether it has any link up
    pub fn observe(&mut self, location: Coord, now: SimTime, connected: bool) {
        let cell = self.grid.cell_at(location);
        if cell != self.current {
            if let Some(prev) = self.current {
                self.contacts[prev].push(self.met_in_current);
            }
            self.met_in_current = false;
            if let Some(entered) = cell {
                self.visits[entered].push(now.as_secs());
            }
            self.current = cell;
        }
        if self.current.is_some() && connected {
            self.met_in_current = true;
        }
    }

    /// Record an entry into `cell` directly
    pub fn record_visit(&mut self, cell: usize, at: SimTime) {
        if let Some(v) = self.visits.get_mut(cell) {
            v.push(at.as_secs());
        }
    }

    /// Record a completed stay in `cell` directly
    pub fn record_stay(&mut self, cell: usize, met_anyone: bool) {
        if let Some(c) = self.contacts.get_mut(cell) {
            c.push(met_anyone);
        }
    }

    pub fn visits(&self, cell: usize) -> &[f64] {
        self.visits.get(cell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn last_visit(&self, cell: usize) -> Option<f64> {
        self.visits(cell).last().copied()
    }

    /// Statistics of the gaps between consecutive entries; needs two entries
    pub fn gap_stats(&self, cell: usize) -> Option<GapStats> {
        let gaps: Vec<f64> = self.visits(cell).windows(2).map(|w| w[1] - w[0]).collect();
        GapStats::of(&gaps)
    }

    /// Expected visits per second: inverse of the mean gap, zero without history
    pub fn visit_rate(&self, cell: usize) -> f64 {
        match self.gap_stats(cell) {
            Some(stats) if stats.mean > 0.0 => 1.0 / stats.mean,
            _ => 0.0,
        }
    }

    /// Statistics of the contact flags of completed stays
    pub fn contact_stats(&self, cell: usize) -> Option<GapStats> {
        let flags: Vec<f64> = self
            .contacts
            .get(cell)
            .map(|c| c.iter().map(|&met| if met { 1.0 } else { 0.0 }).collect())
            .unwrap_or_default();
        GapStats::of(&flags)
    }
}
