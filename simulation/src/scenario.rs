//! Scenario files
//!
//! A scenario is a JSON document describing the hosts, their routers, the
//! destination regions, a scripted feed of movements and link changes, and
//! the messages to create. Everything the core treats as an external
//! collaborator lives here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use geodtn_core::{ConfigError, Coord, HostId, MapOffset, Region, RouterConfig, parse_regions};
use geodtn_routing::{CellGrid, StrategyConfig};

/// Problems found while turning a scenario into a world
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Tick length must be positive, got {0}")]
    NonPositiveTick(f64),

    #[error("Scenario has no hosts")]
    NoHosts,

    #[error("Host {0} is not defined")]
    UnknownHost(u32),

    #[error("Region `{0}` is not defined")]
    UnknownRegion(String),

    #[error("Region `{name}` is invalid: {source}")]
    InvalidRegion {
        name: String,
        #[source]
        source: ConfigError,
    },

    #[error("WKT input must contain exactly one shape, found {0}")]
    AmbiguousWkt(usize),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A complete simulation scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Simulated seconds to run
    pub duration: f64,

    /// Seconds per tick
    #[serde(default = "default_tick")]
    pub tick: f64,

    /// Router settings for hosts that do not override them
    #[serde(default)]
    pub router: RouterConfig,

    /// Strategy for hosts that do not override it
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Cells for the visit-rate strategies
    #[serde(default)]
    pub cells: Option<CellSpec>,

    /// Named destination regions
    #[serde(default)]
    pub regions: BTreeMap<String, RegionSpec>,

    pub hosts: Vec<HostSpec>,

    /// Hosts closer than this are linked automatically every tick
    #[serde(default)]
    pub link_range: Option<f64>,

    /// Bytes per second for links opened without an explicit speed
    #[serde(default = "default_link_speed")]
    pub link_speed: f64,

    /// Scripted movements and link changes
    #[serde(default)]
    pub events: Vec<ScriptEvent>,

    #[serde(default)]
    pub messages: Vec<MessageSpec>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_name() -> String {
    "scenario".to_string()
}

fn default_tick() -> f64 {
    1.0
}

fn default_link_speed() -> f64 {
    250_000.0
}

/// One host and its optional per-host overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSpec {
    pub location: [f64; 2],
    #[serde(default)]
    pub router: Option<RouterConfig>,
    #[serde(default)]
    pub strategy: Option<StrategyConfig>,
}

/// How the cell grid is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellSpec {
    /// Rectangular grid anchored at `origin`
    Regular {
        origin: [f64; 2],
        cell_width: f64,
        cell_height: f64,
        cols: usize,
        rows: usize,
    },
    /// One cell per shape of a WKT file
    Wkt {
        path: PathBuf,
        #[serde(default)]
        offset: MapOffset,
    },
}

/// A destination region, given inline or as a WKT file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionSpec {
    Points(Vec<[f64; 2]>),
    Wkt {
        wkt: PathBuf,
        #[serde(default)]
        offset: MapOffset,
    },
}

/// Something the mobility feed does at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptEvent {
    /// Move a host
    Move { at: f64, host: u32, to: [f64; 2] },
    /// Bring a link up; `from` initiates
    Up {
        at: f64,
        from: u32,
        to: u32,
        #[serde(default)]
        speed: Option<f64>,
    },
    /// Take the link between two hosts down
    Down { at: f64, from: u32, to: u32 },
}

impl ScriptEvent {
    pub fn at(&self) -> f64 {
        match self {
            ScriptEvent::Move { at, .. }
            | ScriptEvent::Up { at, .. }
            | ScriptEvent::Down { at, .. } => *at,
        }
    }

    fn hosts(&self) -> Vec<u32> {
        match self {
            ScriptEvent::Move { host, .. } => vec![*host],
            ScriptEvent::Up { from, to, .. } | ScriptEvent::Down { from, to, .. } => {
                vec![*from, *to]
            }
        }
    }
}

/// Where a scripted message goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Host(u32),
    Region(String),
}

/// A message created by the script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSpec {
    pub id: String,
    pub at: f64,
    pub from: u32,
    pub to: Target,
    pub size: u64,
    /// Minutes; a router with a configured TTL overrides it
    #[serde(default)]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub app_id: Option<String>,
}

impl ScenarioConfig {
    /// Load a scenario from a JSON file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        let mut config: ScenarioConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        config.validate()?;
        Ok(config)
    }

    /// Check references and settings without building anything
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !(self.tick > 0.0) {
            return Err(ScenarioError::NonPositiveTick(self.tick));
        }
        if self.hosts.is_empty() {
            return Err(ScenarioError::NoHosts);
        }

        self.router.validate()?;
        self.strategy.validate()?;
        for host in &self.hosts {
            if let Some(router) = &host.router {
                router.validate()?;
            }
            if let Some(strategy) = &host.strategy {
                strategy.validate()?;
            }
        }

        let count = self.hosts.len() as u32;
        let check_host = |id: u32| {
            if id < count {
                Ok(())
            } else {
                Err(ScenarioError::UnknownHost(id))
            }
        };
        for event in &self.events {
            for host in event.hosts() {
                check_host(host)?;
            }
        }
        for message in &self.messages {
            check_host(message.from)?;
            match &message.to {
                Target::Host(to) => check_host(*to)?,
                Target::Region(name) if !self.regions.contains_key(name) => {
                    return Err(ScenarioError::UnknownRegion(name.clone()));
                }
                Target::Region(_) => {}
            }
        }
        Ok(())
    }

    /// Router settings for `host`
    pub fn router_for(&self, host: usize) -> &RouterConfig {
        self.hosts
            .get(host)
            .and_then(|h| h.router.as_ref())
            .unwrap_or(&self.router)
    }

    /// Strategy for `host`
    pub fn strategy_for(&self, host: usize) -> &StrategyConfig {
        self.hosts
            .get(host)
            .and_then(|h| h.strategy.as_ref())
            .unwrap_or(&self.strategy)
    }

    /// Build every named region
    pub fn build_regions(&self) -> Result<BTreeMap<String, Arc<Region>>, ScenarioError> {
        let mut regions = BTreeMap::new();
        for (name, spec) in &self.regions {
            let region = match spec {
                RegionSpec::Points(points) => Region::new(points.iter().map(|&p| coord(p)))
                    .map_err(|source| ScenarioError::InvalidRegion {
                        name: name.clone(),
                        source,
                    })?,
                RegionSpec::Wkt { wkt, offset } => {
                    let mut shapes = self.read_wkt(wkt, *offset)?;
                    if shapes.len() != 1 {
                        return Err(ScenarioError::AmbiguousWkt(shapes.len()));
                    }
                    shapes.remove(0)
                }
            };
            regions.insert(name.clone(), Arc::new(region));
        }
        Ok(regions)
    }

    /// Build the cell grid, empty when none is configured
    pub fn build_cells(&self) -> Result<CellGrid, ScenarioError> {
        match &self.cells {
            None => Ok(CellGrid::empty()),
            Some(CellSpec::Regular {
                origin,
                cell_width,
                cell_height,
                cols,
                rows,
            }) => Ok(CellGrid::regular(
                coord(*origin),
                *cell_width,
                *cell_height,
                *cols,
                *rows,
            )?),
            Some(CellSpec::Wkt { path, offset }) => {
                Ok(CellGrid::new(self.read_wkt(path, *offset)?))
            }
        }
    }

    fn read_wkt(&self, path: &Path, offset: MapOffset) -> Result<Vec<Region>, ScenarioError> {
        let path = match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        };
        let text = std::fs::read_to_string(&path)
            .map_err(|source| ScenarioError::Read { path, source })?;
        Ok(parse_regions(&text, offset)?)
    }

    /// Initial location of `host`
    pub fn location_of(&self, host: HostId) -> Option<Coord> {
        self.hosts.get(host.index()).map(|h| coord(h.location))
    }
}

pub(crate) fn coord(point: [f64; 2]) -> Coord {
    Coord::new(point[0], point[1])
}

/// Parameters for a generated random-walk scenario
#[derive(Debug, Clone, PartialEq)]
pub struct RandomScenario {
    pub hosts: usize,
    /// Side of the square world
    pub area: f64,
    pub duration: f64,
    /// Distance a host may move per tick
    pub step: f64,
    pub link_range: f64,
    pub messages: usize,
    pub message_size: u64,
    pub seed: u64,
}

impl Default for RandomScenario {
    fn default() -> Self {
        Self {
            hosts: 20,
            area: 1000.0,
            duration: 3600.0,
            step: 10.0,
            link_range: 50.0,
            messages: 10,
            message_size: 50_000,
            seed: 42,
        }
    }
}

impl RandomScenario {
    /// Generate the scenario; the same seed always yields the same script
    pub fn generate(&self, strategy: StrategyConfig) -> ScenarioConfig {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let hosts = self.hosts.max(1);

        let mut positions: Vec<[f64; 2]> = (0..hosts)
            .map(|_| {
                [
                    rng.random_range(0.0..self.area),
                    rng.random_range(0.0..self.area),
                ]
            })
            .collect();
        let host_specs = positions
            .iter()
            .map(|&location| HostSpec {
                location,
                router: None,
                strategy: None,
            })
            .collect();

        let mut events = Vec::new();
        let ticks = self.duration.max(0.0) as u64;
        for t in 1..=ticks {
            for (host, position) in positions.iter_mut().enumerate() {
                let dx = rng.random_range(-self.step..=self.step);
                let dy = rng.random_range(-self.step..=self.step);
                position[0] = (position[0] + dx).clamp(0.0, self.area);
                position[1] = (position[1] + dy).clamp(0.0, self.area);
                events.push(ScriptEvent::Move {
                    at: t as f64,
                    host: host as u32,
                    to: *position,
                });
            }
        }

        let quarter = self.area / 4.0;
        let mut regions = BTreeMap::new();
        regions.insert(
            "target".to_string(),
            RegionSpec::Points(vec![
                [quarter, quarter],
                [2.0 * quarter, quarter],
                [2.0 * quarter, 2.0 * quarter],
                [quarter, 2.0 * quarter],
            ]),
        );

        let messages = (0..self.messages)
            .map(|i| MessageSpec {
                id: format!("M{i}"),
                at: rng.random_range(0.0..self.duration.max(1.0) / 2.0).floor(),
                from: rng.random_range(0..hosts) as u32,
                to: Target::Region("target".to_string()),
                size: self.message_size,
                ttl: None,
                app_id: None,
            })
            .collect();

        ScenarioConfig {
            name: format!("random-{}", self.seed),
            duration: self.duration,
            tick: 1.0,
            router: RouterConfig::default().with_ttl(60),
            strategy,
            cells: Some(CellSpec::Regular {
                origin: [0.0, 0.0],
                cell_width: self.area / 10.0,
                cell_height: self.area / 10.0,
                cols: 10,
                rows: 10,
            }),
            regions,
            hosts: host_specs,
            link_range: Some(self.link_range),
            link_speed: default_link_speed(),
            events,
            messages,
            base_dir: None,
        }
    }
}
