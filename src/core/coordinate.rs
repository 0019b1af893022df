// A point in the bounded three-axis space that miners choose to work in.
// The coordinate never drives the nonce search itself; it feeds the score
// used when retargeting difficulty.

use crate::error::{LedgerError, Result};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const MIN_COORDINATE: u16 = 0;
pub const MAX_COORDINATE: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    a: u16,
    b: u16,
    c: u16,
}

// Unvalidated wire form, checked on the way in.
#[derive(Deserialize)]
struct RawCoordinate {
    a: i64,
    b: i64,
    c: i64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = LedgerError;

    fn try_from(raw: RawCoordinate) -> Result<Self> {
        Coordinate::new(raw.a, raw.b, raw.c)
    }
}

impl Coordinate {
    pub const ORIGIN: Coordinate = Coordinate { a: 0, b: 0, c: 0 };

    /// Build a coordinate, rejecting any axis outside `[0, 500]`
    pub fn new(a: i64, b: i64, c: i64) -> Result<Coordinate> {
        Ok(Coordinate {
            a: Self::check_axis("a", a)?,
            b: Self::check_axis("b", b)?,
            c: Self::check_axis("c", c)?,
        })
    }

    fn check_axis(name: &str, value: i64) -> Result<u16> {
        if value < i64::from(MIN_COORDINATE) || value > i64::from(MAX_COORDINATE) {
            return Err(LedgerError::Validation(format!(
                "Coordinate {name} must be between {MIN_COORDINATE} and {MAX_COORDINATE}, \
                 got {value}"
            )));
        }
        Ok(value as u16)
    }

    fn clamp_axis(value: i64) -> u16 {
        value.clamp(i64::from(MIN_COORDINATE), i64::from(MAX_COORDINATE)) as u16
    }

    /// Uniformly random coordinate
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Coordinate {
        let coordinate = Coordinate {
            a: rng.gen_range(MIN_COORDINATE..=MAX_COORDINATE),
            b: rng.gen_range(MIN_COORDINATE..=MAX_COORDINATE),
            c: rng.gen_range(MIN_COORDINATE..=MAX_COORDINATE),
        };
        debug!("Generated random coordinate {coordinate}");
        coordinate
    }

    pub fn a(&self) -> u16 {
        self.a
    }

    pub fn b(&self) -> u16 {
        self.b
    }

    pub fn c(&self) -> u16 {
        self.c
    }

    /// Euclidean distance to another coordinate
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let da = f64::from(self.a) - f64::from(other.a);
        let db = f64::from(self.b) - f64::from(other.b);
        let dc = f64::from(self.c) - f64::from(other.c);
        (da * da + db * db + dc * dc).sqrt()
    }

    /// New coordinate moved by the given deltas, each axis clamped to the valid range
    pub fn adjust(&self, delta_a: i64, delta_b: i64, delta_c: i64) -> Coordinate {
        Coordinate {
            a: Self::clamp_axis(i64::from(self.a) + delta_a),
            b: Self::clamp_axis(i64::from(self.b) + delta_b),
            c: Self::clamp_axis(i64::from(self.c) + delta_c),
        }
    }

    /// Move every axis by the same step
    pub fn shift(&self, step: i64) -> Coordinate {
        self.adjust(step, step, step)
    }

    /// Distinct in-range points reachable by moving each axis by -d, 0 or +d.
    ///
    /// Near the boundary several moves clamp onto the same point; those are
    /// reported once, and the coordinate itself is never included.
    pub fn neighbors(&self, distance: u16) -> Result<Vec<Coordinate>> {
        if distance == 0 {
            return Err(LedgerError::Validation(
                "Neighbor distance must be a positive integer".to_string(),
            ));
        }

        let d = i64::from(distance);
        let steps = [-d, 0, d];
        let mut seen = BTreeSet::new();
        for da in steps {
            for db in steps {
                for dc in steps {
                    let neighbor = self.adjust(da, db, dc);
                    if neighbor != *self {
                        seen.insert(neighbor);
                    }
                }
            }
        }
        Ok(seen.into_iter().collect())
    }
}

impl Default for Coordinate {
    fn default() -> Self {
        Coordinate::ORIGIN
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.a, self.b, self.c)
    }
}

/// Parses `"a,b,c"` (whitespace around the numbers is ignored)
impl FromStr for Coordinate {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(LedgerError::Validation(format!(
                "Coordinate must look like 'a,b,c', got '{s}'"
            )));
        }

        let mut values = [0i64; 3];
        for (slot, part) in values.iter_mut().zip(parts) {
            *slot = part.parse::<i64>().map_err(|e| {
                LedgerError::Validation(format!("Invalid coordinate component '{part}': {e}"))
            })?;
        }
        Coordinate::new(values[0], values[1], values[2])
    }
}
