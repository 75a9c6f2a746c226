//! Device lines: `<device>,<H>:<M>:<S>,<lat>,<lon>,<heading>,<speed>,<alt>`.

use anyhow::{bail, Context};

use tripmatch_model::{Coordinate, Fix, TimeOfDay};

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryLine {
    pub device: String,
    pub fix: Fix,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub altitude: Option<f64>,
}

impl TelemetryLine {
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
        if fields.len() < 4 {
            bail!("expected at least 4 fields, found {}", fields.len());
        }
        if fields.len() > 7 {
            bail!("expected at most 7 fields, found {}", fields.len());
        }

        let device = fields[0];
        if device.is_empty() {
            bail!("missing device identifier");
        }
        let time = parse_clock(fields[1])?;
        let position = Coordinate::parse(fields[2], fields[3])
            .with_context(|| format!("invalid position {},{}", fields[2], fields[3]))?;

        Ok(Self {
            device: device.to_string(),
            fix: Fix::new(position, time),
            heading: optional_number(fields.get(4).copied(), "heading")?,
            speed: optional_number(fields.get(5).copied(), "speed")?,
            altitude: optional_number(fields.get(6).copied(), "altitude")?,
        })
    }
}

fn parse_clock(value: &str) -> anyhow::Result<TimeOfDay> {
    let mut parts = value.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        bail!("invalid time {value:?}, expected H:M:S");
    };
    let number = |part: &str| {
        part.parse::<u32>()
            .with_context(|| format!("invalid time {value:?}"))
    };
    TimeOfDay::from_hms(number(h)?, number(m)?, number(s)?)
        .with_context(|| format!("time {value:?} is outside the day"))
}

// Browsers send `null` when heading, speed or altitude is unavailable.
fn optional_number(value: Option<&str>, name: &str) -> anyhow::Result<Option<f64>> {
    match value {
        None | Some("") | Some("null") | Some("NaN") => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .with_context(|| format!("invalid {name} {raw:?}")),
    }
}
