use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const SECONDS_PER_DAY: u32 = 24 * 3600;

#[derive(Debug, thiserror::Error)]
pub enum ModelParseError {
    #[error("invalid time format: {0}")]
    InvalidTimeFormat(String),
    #[error("invalid time value: {0}")]
    InvalidTimeValue(String),
    #[error("invalid coordinate value: {0}")]
    InvalidCoordinate(String),
}

/// A position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Parses a latitude/longitude pair, rejecting non-finite values.
    pub fn parse(latitude: &str, longitude: &str) -> Result<Self, ModelParseError> {
        let lat = parse_degrees(latitude)?;
        let lon = parse_degrees(longitude)?;
        Ok(Self::new(lat, lon))
    }
}

fn parse_degrees(value: &str) -> Result<f64, ModelParseError> {
    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| ModelParseError::InvalidCoordinate(value.to_string()))?;
    if !parsed.is_finite() {
        return Err(ModelParseError::InvalidCoordinate(value.to_string()));
    }
    Ok(parsed)
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.7}, {:.7})", self.latitude, self.longitude)
    }
}

/// One observed sample from a moving vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub position: Coordinate,
    pub time: TimeOfDay,
}

impl Fix {
    pub fn new(position: Coordinate, time: TimeOfDay) -> Self {
        Self { position, time }
    }
}

/// Time of day without a date, stored as seconds since midnight.
///
/// Only times inside a single day are representable; `24:00:00` and later
/// are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeOfDay {
    seconds: u32,
}

impl TimeOfDay {
    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Option<Self> {
        if hours > 23 || minutes > 59 || seconds > 59 {
            return None;
        }
        Some(Self {
            seconds: hours * 3600 + minutes * 60 + seconds,
        })
    }

    pub fn from_seconds(seconds: u32) -> Option<Self> {
        (seconds < SECONDS_PER_DAY).then_some(Self { seconds })
    }

    /// Parses `H:MM:SS` or `HH:MM:SS`.
    pub fn parse(value: &str) -> Result<Self, ModelParseError> {
        let trimmed = value.trim();
        let mut parts = trimmed.split(':');
        let (Some(hours), Some(minutes), Some(seconds), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ModelParseError::InvalidTimeFormat(value.to_string()));
        };

        if !is_digits(hours, 1..=2) || !is_digits(minutes, 2..=2) || !is_digits(seconds, 2..=2) {
            return Err(ModelParseError::InvalidTimeFormat(value.to_string()));
        }

        let hours: u32 = hours
            .parse()
            .map_err(|_| ModelParseError::InvalidTimeFormat(value.to_string()))?;
        let minutes: u32 = minutes
            .parse()
            .map_err(|_| ModelParseError::InvalidTimeFormat(value.to_string()))?;
        let seconds: u32 = seconds
            .parse()
            .map_err(|_| ModelParseError::InvalidTimeFormat(value.to_string()))?;

        Self::from_hms(hours, minutes, seconds)
            .ok_or_else(|| ModelParseError::InvalidTimeValue(value.to_string()))
    }

    pub fn seconds_since_midnight(&self) -> u32 {
        self.seconds
    }

    pub fn hours(&self) -> u32 {
        self.seconds / 3600
    }

    pub fn minutes(&self) -> u32 {
        (self.seconds % 3600) / 60
    }

    pub fn seconds(&self) -> u32 {
        self.seconds % 60
    }

    /// Absolute difference in seconds, treating both times as falling on the
    /// same day.
    pub fn linear_delta(&self, other: TimeOfDay) -> u32 {
        self.seconds.abs_diff(other.seconds)
    }

    /// Shortest distance in seconds around the 24 hour clock, so 23:58 and
    /// 00:02 are four minutes apart.
    pub fn circular_delta(&self, other: TimeOfDay) -> u32 {
        let linear = self.linear_delta(other);
        linear.min(SECONDS_PER_DAY - linear)
    }
}

fn is_digits(value: &str, len: std::ops::RangeInclusive<usize>) -> bool {
    len.contains(&value.len()) && value.chars().all(|ch| ch.is_ascii_digit())
}

impl From<NaiveTime> for TimeOfDay {
    fn from(time: NaiveTime) -> Self {
        Self {
            seconds: time.num_seconds_from_midnight() % SECONDS_PER_DAY,
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours(),
            self.minutes(),
            self.seconds()
        )
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimeOfDayVisitor;

        impl<'de> Visitor<'de> for TimeOfDayVisitor {
            type Value = TimeOfDay;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a time of day in HH:MM:SS format")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<TimeOfDay, E> {
                TimeOfDay::parse(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(TimeOfDayVisitor)
    }
}

/// Coarse route-family key derived from a shape id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteCode(String);

impl RouteCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for RouteCode {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RouteCode {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// One vertex of a route's physical path.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShapePoint {
    pub shape_id: String,
    pub position: Coordinate,
    pub sequence: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Trip {
    pub trip_id: String,
    pub shape_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    pub position: Coordinate,
}

/// Scheduled visit of a trip at a stop. Times keep the text found in the
/// timetable; see [`StopTime::departure`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StopTime {
    pub trip_id: String,
    pub arrival_time: String,
    pub departure_time: String,
    pub stop_id: String,
}

impl StopTime {
    pub fn departure(&self) -> Result<TimeOfDay, ModelParseError> {
        TimeOfDay::parse(&self.departure_time)
    }

    pub fn arrival(&self) -> Result<TimeOfDay, ModelParseError> {
        TimeOfDay::parse(&self.arrival_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_time_of_day() {
        let time = TimeOfDay::parse("08:00:05").unwrap();
        assert_eq!(time.seconds_since_midnight(), 8 * 3600 + 5);
        assert_eq!(time.to_string(), "08:00:05");
    }

    #[test]
    fn parses_single_digit_hour() {
        let time = TimeOfDay::parse("7:05:00").unwrap();
        assert_eq!(time.to_string(), "07:05:00");
    }

    #[test]
    fn parses_time_with_whitespace() {
        let time = TimeOfDay::parse(" 23:59:59 ").unwrap();
        assert_eq!(time.seconds_since_midnight(), SECONDS_PER_DAY - 1);
    }

    #[test]
    fn rejects_invalid_time() {
        assert!(TimeOfDay::parse("24:00:00").is_err());
        assert!(TimeOfDay::parse("25:10:05").is_err());
        assert!(TimeOfDay::parse("08:60:00").is_err());
        assert!(TimeOfDay::parse("08:0:00").is_err());
        assert!(TimeOfDay::parse("08:00").is_err());
        assert!(TimeOfDay::parse("08:00:00:00").is_err());
        assert!(TimeOfDay::parse("bad").is_err());
        assert!(TimeOfDay::parse("").is_err());
    }

    #[test]
    fn linear_delta_ignores_wrap() {
        let late = TimeOfDay::parse("23:58:00").unwrap();
        let early = TimeOfDay::parse("00:02:00").unwrap();
        assert_eq!(late.linear_delta(early), 23 * 3600 + 56 * 60);
        assert_eq!(early.linear_delta(late), late.linear_delta(early));
    }

    #[test]
    fn circular_delta_wraps_midnight() {
        let late = TimeOfDay::parse("23:58:00").unwrap();
        let early = TimeOfDay::parse("00:02:00").unwrap();
        assert_eq!(late.circular_delta(early), 4 * 60);

        let morning = TimeOfDay::parse("08:00:00").unwrap();
        let evening = TimeOfDay::parse("20:00:00").unwrap();
        assert_eq!(morning.circular_delta(evening), 12 * 3600);
    }

    #[test]
    fn converts_from_naive_time() {
        let naive = NaiveTime::from_hms_opt(13, 4, 5).unwrap();
        assert_eq!(TimeOfDay::from(naive).to_string(), "13:04:05");
    }

    #[test]
    fn time_of_day_serde_uses_text_form() {
        let time = TimeOfDay::from_hms(6, 30, 0).unwrap();
        let json = serde_json::to_string(&time).unwrap();
        assert_eq!(json, "\"06:30:00\"");
        let back: TimeOfDay = serde_json::from_str(&json).unwrap();
        assert_eq!(back, time);
        assert!(serde_json::from_str::<TimeOfDay>("\"99:00:00\"").is_err());
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        assert!(Coordinate::parse("34.86", "137.16").is_ok());
        assert!(Coordinate::parse("NaN", "137.16").is_err());
        assert!(Coordinate::parse("34.86", "inf").is_err());
        assert!(Coordinate::parse("lat", "137.16").is_err());
    }

    #[test]
    fn stop_time_departure_parses_lazily() {
        let stop_time = StopTime {
            trip_id: "T1".into(),
            arrival_time: "08:00:00".into(),
            departure_time: "not a time".into(),
            stop_id: "S1".into(),
        };
        assert!(stop_time.arrival().is_ok());
        assert!(stop_time.departure().is_err());
    }
}
