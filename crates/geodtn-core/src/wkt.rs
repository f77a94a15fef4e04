//! WKT region input
//!
//! Region and cell files list one `LINESTRING (x y, x y, ...)` per shape.
//! `POLYGON ((...))` outer rings are accepted too; other geometry types are
//! skipped. Map coordinates are flipped into screen orientation with a
//! [`MapOffset`]: `(x + off_x, -y + off_y)`.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::geometry::Coord;
use crate::region::Region;

/// Calibration from map coordinates to simulation coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MapOffset {
    pub x: f64,
    pub y: f64,
}

impl MapOffset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn apply(&self, map: Coord) -> Coord {
        Coord::new(map.x + self.x, -map.y + self.y)
    }
}

/// Parse every line string and polygon in `text` into a region
pub fn parse_regions(text: &str, offset: MapOffset) -> ConfigResult<Vec<Region>> {
    let mut regions = Vec::new();
    let mut rest = text;

    while let Some((keyword, after)) = next_keyword(rest) {
        let (body, remaining) = nested_contents(after)?;
        rest = remaining;

        let ring = match keyword.as_str() {
            "LINESTRING" => body,
            "POLYGON" => outer_ring(body)?,
            _ => continue,
        };
        let points = parse_points(ring)?;
        regions.push(Region::new(points.into_iter().map(|p| offset.apply(p)))?);
    }

    Ok(regions)
}

fn next_keyword(text: &str) -> Option<(String, &str)> {
    let start = text.find(|c: char| c.is_ascii_alphabetic())?;
    let text = &text[start..];
    let end = text
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    Some((text[..end].to_ascii_uppercase(), &text[end..]))
}

/// Contents of the next balanced parenthesis group, and what follows it
fn nested_contents(text: &str) -> ConfigResult<(&str, &str)> {
    let open = text
        .find('(')
        .ok_or_else(|| ConfigError::InvalidWkt("missing '('".to_string()))?;
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let close = open + i;
                    return Ok((&text[open + 1..close], &text[close + 1..]));
                }
            }
            _ => {}
        }
    }
    Err(ConfigError::InvalidWkt("unbalanced parentheses".to_string()))
}

fn outer_ring(body: &str) -> ConfigResult<&str> {
    nested_contents(body).map(|(ring, _)| ring)
}

fn parse_points(body: &str) -> ConfigResult<Vec<Coord>> {
    body.split(',')
        .map(|pair| {
            let mut nums = pair.split_whitespace().map(str::parse::<f64>);
            match (nums.next(), nums.next()) {
                (Some(Ok(x)), Some(Ok(y))) => Ok(Coord::new(x, y)),
                _ => Err(ConfigError::InvalidWkt(format!(
                    "bad coordinate pair `{}`",
                    pair.trim()
                ))),
            }
        })
        .collect()
}
