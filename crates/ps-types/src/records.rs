//! Text records written by scan jobs and read back by the aggregator.
//!
//! A job log contains three kinds of lines:
//!
//! ```text
//! * POI mu=[5,0,10]
//! nll=12.5, mu=1, theta=0.02
//! ucmles -- nll=11.9, mu=2.4, theta=0
//! ```
//!
//! Anything else in a log (progress output, warnings) is ignored by [`LogLine::parse`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Dimension, NamedValue, RecordError};

const POI_PREFIX: &str = "* POI ";
const UNCONDITIONAL_PREFIX: &str = "ucmles -- ";
const NLL_KEY: &str = "nll";

/// Conditional records come from grid points, unconditional from the global fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Conditional,
    Unconditional,
}

/// One fit result line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub kind: RecordKind,
    pub nll: f64,
    pub parameters: Vec<NamedValue>,
}

impl ScanRecord {
    pub fn conditional(nll: f64, parameters: Vec<NamedValue>) -> Self {
        Self {
            kind: RecordKind::Conditional,
            nll,
            parameters,
        }
    }

    pub fn unconditional(nll: f64, parameters: Vec<NamedValue>) -> Self {
        Self {
            kind: RecordKind::Unconditional,
            nll,
            parameters,
        }
    }

    /// Value of the named parameter, if the record carries it.
    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value)
    }
}

impl fmt::Display for ScanRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == RecordKind::Unconditional {
            f.write_str(UNCONDITIONAL_PREFIX)?;
        }
        write!(f, "{}={}", NLL_KEY, self.nll)?;
        for p in &self.parameters {
            write!(f, ", {p}")?;
        }
        Ok(())
    }
}

impl FromStr for ScanRecord {
    type Err = RecordError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end();
        let (kind, body) = match line.strip_prefix(UNCONDITIONAL_PREFIX) {
            Some(rest) => (RecordKind::Unconditional, rest),
            None => (RecordKind::Conditional, line),
        };

        let mut fields = body.split(", ").map(parse_field);
        let nll = match fields.next() {
            Some(Ok(first)) if first.name == NLL_KEY => first.value,
            Some(Err(e)) => return Err(e),
            _ => {
                return Err(RecordError::MissingNll {
                    line: line.to_string(),
                })
            }
        };
        let parameters = fields.collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            kind,
            nll,
            parameters,
        })
    }
}

fn parse_field(field: &str) -> Result<NamedValue, RecordError> {
    let (name, value) = field
        .split_once('=')
        .ok_or_else(|| RecordError::MissingSeparator {
            field: field.to_string(),
        })?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|_| RecordError::InvalidNumber {
            name: name.to_string(),
            value: value.to_string(),
        })?;
    Ok(NamedValue::new(name.trim(), value))
}

/// Header line announcing one scanned dimension: `* POI mu=[5,0,10]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiHeader {
    pub name: String,
    pub bins: u32,
    pub lower: f64,
    pub upper: f64,
}

impl PoiHeader {
    pub fn to_dimension(&self) -> Dimension {
        Dimension {
            name: self.name.clone(),
            lower: self.lower,
            upper: self.upper,
            bins: self.bins,
        }
    }
}

impl From<&Dimension> for PoiHeader {
    fn from(dim: &Dimension) -> Self {
        Self {
            name: dim.name.clone(),
            bins: dim.bins,
            lower: dim.lower,
            upper: dim.upper,
        }
    }
}

impl fmt::Display for PoiHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}=[{},{},{}]",
            POI_PREFIX, self.name, self.bins, self.lower, self.upper
        )
    }
}

impl FromStr for PoiHeader {
    type Err = RecordError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end();
        let malformed = || RecordError::MalformedHeader {
            line: line.to_string(),
        };

        let rest = line.strip_prefix(POI_PREFIX).ok_or_else(malformed)?;
        let (name, config) = rest.split_once('=').ok_or_else(malformed)?;
        let config = config
            .strip_prefix('[')
            .and_then(|c| c.strip_suffix(']'))
            .ok_or_else(malformed)?;

        let parts: Vec<&str> = config.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(malformed());
        }
        // Older logs print the bin count as a float ("5.0").
        let bins = parts[0].parse::<f64>().map_err(|_| malformed())?;
        if bins < 1.0 || bins.fract() != 0.0 || bins > u32::MAX as f64 {
            return Err(malformed());
        }
        let lower = parts[1].parse::<f64>().map_err(|_| malformed())?;
        let upper = parts[2].parse::<f64>().map_err(|_| malformed())?;

        Ok(Self {
            name: name.to_string(),
            bins: bins as u32,
            lower,
            upper,
        })
    }
}

/// A classified log line.
#[derive(Debug, Clone, PartialEq)]
pub enum LogLine {
    Poi(PoiHeader),
    Record(ScanRecord),
}

impl LogLine {
    /// Classify a line. Returns `Ok(None)` for lines that are not records.
    pub fn parse(line: &str) -> Result<Option<Self>, RecordError> {
        if line.starts_with(POI_PREFIX) {
            return line.parse().map(|h| Some(Self::Poi(h)));
        }
        if line.starts_with("nll=") || line.starts_with(UNCONDITIONAL_PREFIX) {
            return line.parse().map(|r| Some(Self::Record(r)));
        }
        Ok(None)
    }
}
