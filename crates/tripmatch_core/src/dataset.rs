use std::fmt;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info, warn};

use tripmatch_model::{Coordinate, ShapePoint, Stop, StopTime, Trip};

use crate::config::{DatasetLayout, TableSource};
use crate::MatchError;

/// A row type that can be decoded from a positional record.
pub trait TableRecord: Sized {
    const TABLE: &'static str;

    /// `None` when the record is malformed and must be skipped.
    fn from_record(record: &StringRecord) -> Option<Self>;
}

impl TableRecord for ShapePoint {
    const TABLE: &'static str = "shapes";

    fn from_record(record: &StringRecord) -> Option<Self> {
        let shape_id = record.get(0)?;
        let position = Coordinate::parse(record.get(1)?, record.get(2)?).ok()?;
        let sequence = record.get(3)?.trim().parse().ok()?;
        Some(ShapePoint {
            shape_id: shape_id.to_string(),
            position,
            sequence,
        })
    }
}

impl TableRecord for Trip {
    const TABLE: &'static str = "trips";

    fn from_record(record: &StringRecord) -> Option<Self> {
        Some(Trip {
            trip_id: record.get(2)?.to_string(),
            shape_id: record.get(5)?.to_string(),
        })
    }
}

impl TableRecord for Stop {
    const TABLE: &'static str = "stops";

    fn from_record(record: &StringRecord) -> Option<Self> {
        let stop_id = record.get(0)?;
        let position = Coordinate::parse(record.get(4)?, record.get(5)?).ok()?;
        Some(Stop {
            stop_id: stop_id.to_string(),
            position,
        })
    }
}

impl TableRecord for StopTime {
    const TABLE: &'static str = "stop_times";

    fn from_record(record: &StringRecord) -> Option<Self> {
        Some(StopTime {
            trip_id: record.get(0)?.to_string(),
            arrival_time: record.get(1)?.to_string(),
            departure_time: record.get(2)?.to_string(),
            stop_id: record.get(3)?.to_string(),
        })
    }
}

/// Row counts for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub table: &'static str,
    pub file: String,
    pub loaded: usize,
    pub skipped: usize,
    /// Whether decoding replaced malformed byte sequences.
    pub replaced_characters: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadReport {
    pub tables: Vec<TableReport>,
}

impl LoadReport {
    pub fn skipped(&self) -> usize {
        self.tables.iter().map(|table| table.skipped).sum()
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, table) in self.tables.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", table.table, table.loaded)?;
            if table.skipped > 0 {
                write!(f, " ({} skipped)", table.skipped)?;
            }
        }
        Ok(())
    }
}

/// Rows decoded from one table.
#[derive(Debug, Clone)]
pub struct TableRows<T> {
    pub rows: Vec<T>,
    pub report: TableReport,
}

/// Decodes one table held in memory.
pub fn decode_table<T: TableRecord>(
    bytes: &[u8],
    source: &TableSource,
) -> Result<TableRows<T>, MatchError> {
    let encoding = source.resolve_encoding()?;
    // BOM sniffing in `decode` also strips a leading UTF-8 byte-order mark.
    let (text, _, replaced_characters) = encoding.decode(bytes);
    if replaced_characters {
        debug!(
            file = %source.file,
            encoding = encoding.name(),
            "table contained undecodable bytes"
        );
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::None)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    let mut skipped = 0;
    let mut header_pending = source.skip_header;
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                debug!(file = %source.file, error = %err, "skipping unreadable record");
                if header_pending {
                    header_pending = false;
                } else {
                    skipped += 1;
                }
                continue;
            }
        };
        if header_pending {
            header_pending = false;
            continue;
        }
        match T::from_record(&record) {
            Some(row) => rows.push(row),
            None => {
                debug!(
                    file = %source.file,
                    line = ?record.position().map(|pos| pos.line()),
                    "skipping malformed record"
                );
                skipped += 1;
            }
        }
    }

    let report = TableReport {
        table: T::TABLE,
        file: source.file.clone(),
        loaded: rows.len(),
        skipped,
        replaced_characters,
    };
    if skipped > 0 {
        warn!(
            table = T::TABLE,
            file = %source.file,
            skipped,
            "ignored malformed records"
        );
    }
    Ok(TableRows { rows, report })
}

/// Reads and decodes one table from `dir`.
pub fn read_table<T: TableRecord>(
    dir: &Path,
    source: &TableSource,
) -> Result<TableRows<T>, MatchError> {
    let path = dir.join(&source.file);
    let bytes = std::fs::read(&path).map_err(|source| MatchError::DatasetUnavailable {
        file: path.display().to_string(),
        source,
    })?;
    decode_table(&bytes, source)
}

/// The four reference collections, read-only once built.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub shapes: Vec<ShapePoint>,
    pub trips: Vec<Trip>,
    pub stops: Vec<Stop>,
    pub stop_times: Vec<StopTime>,
}

impl ReferenceData {
    pub fn from_parts(
        shapes: Vec<ShapePoint>,
        trips: Vec<Trip>,
        stops: Vec<Stop>,
        stop_times: Vec<StopTime>,
    ) -> Self {
        Self {
            shapes,
            trips,
            stops,
            stop_times,
        }
    }

    pub fn load(dir: &Path, layout: &DatasetLayout) -> Result<Self, MatchError> {
        Self::load_with_report(dir, layout).map(|(data, _)| data)
    }

    pub fn load_with_report(
        dir: &Path,
        layout: &DatasetLayout,
    ) -> Result<(Self, LoadReport), MatchError> {
        layout.validate()?;

        let shapes = read_table::<ShapePoint>(dir, &layout.shapes)?;
        let trips = read_table::<Trip>(dir, &layout.trips)?;
        let stops = read_table::<Stop>(dir, &layout.stops)?;
        let stop_times = read_table::<StopTime>(dir, &layout.stop_times)?;

        let report = LoadReport {
            tables: vec![
                shapes.report,
                trips.report,
                stops.report,
                stop_times.report,
            ],
        };
        info!(dir = %dir.display(), "loaded reference data: {}", report);

        let data = Self::from_parts(shapes.rows, trips.rows, stops.rows, stop_times.rows);
        Ok((data, report))
    }
}
