//! Recorded sensor traces.
//!
//! A trace is a CSV file with the header `at_secs,kind,a,b`, one sensor
//! reading or user control per row:
//!
//! ```text
//! at_secs,kind,a,b
//! 0.0,fix,60.1699,24.9384
//! 1.5,steps,3,
//! 5.0,fix,60.1702,24.9391
//! 6.0,pause,,
//! 9.0,resume,,
//! 12.0,end,,
//! ```
//!
//! Loading a trace is where malformed sensor input is filtered out; the
//! session itself assumes well-formed values. Timestamps must lie within
//! [`MAX_TRACE_SECS`] of the walk start.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TraceError;
use crate::runtime::{
    ChannelEventSource, Control, FixedTicker, Runner, SensorHub, SensorStreams, WalkEvent,
};
use crate::session::{SessionEnded, WalkSession};

/// Longest walk a trace may describe: one week
pub const MAX_TRACE_SECS: f64 = 7.0 * 24.0 * 3600.0;

fn valid_at_secs(t: f64) -> bool {
    t.is_finite() && (0.0..=MAX_TRACE_SECS).contains(&t)
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    at_secs: String,
    kind: String,
    #[serde(default)]
    a: Option<String>,
    #[serde(default)]
    b: Option<String>,
}

/// One timestamped event of a trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceRecord {
    pub at_secs: f64,
    pub event: WalkEvent,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    records: Vec<TraceRecord>,
}

fn required<'a>(
    record: usize,
    field: &'static str,
    value: &'a Option<String>,
) -> Result<&'a str, TraceError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(TraceError::MissingField { record, field })
}

fn parse_coord(record: usize, field: &'static str, raw: &str, limit: f64) -> Result<f64, TraceError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() <= limit => Ok(v),
        _ => Err(TraceError::InvalidValue {
            record,
            field,
            value: raw.to_string(),
        }),
    }
}

impl RawRecord {
    fn into_record(self, record: usize) -> Result<TraceRecord, TraceError> {
        let at_secs = match self.at_secs.parse::<f64>() {
            Ok(t) if valid_at_secs(t) => t,
            _ => {
                return Err(TraceError::InvalidValue {
                    record,
                    field: "at_secs",
                    value: self.at_secs,
                })
            }
        };

        let event = match self.kind.to_ascii_lowercase().as_str() {
            "steps" => {
                let raw = required(record, "a", &self.a)?;
                let steps = raw.parse::<u64>().map_err(|_| TraceError::InvalidValue {
                    record,
                    field: "steps",
                    value: raw.to_string(),
                })?;
                WalkEvent::Steps(steps)
            }
            "fix" => {
                let lat = parse_coord(record, "latitude", required(record, "a", &self.a)?, 90.0)?;
                let lon = parse_coord(record, "longitude", required(record, "b", &self.b)?, 180.0)?;
                WalkEvent::Fix((lat, lon).into())
            }
            "pause" => WalkEvent::Control(Control::Pause),
            "resume" => WalkEvent::Control(Control::Resume),
            "end" => WalkEvent::Control(Control::End),
            _ => {
                return Err(TraceError::UnknownKind {
                    record,
                    kind: self.kind,
                })
            }
        };

        Ok(TraceRecord { at_secs, event })
    }
}

impl Trace {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TraceError> {
        let file = File::open(path.as_ref())?;
        let trace = Self::from_reader(file)?;
        debug!(path = %path.as_ref().display(), records = trace.len(), "trace loaded");
        Ok(trace)
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, TraceError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(rdr);

        let records = reader
            .deserialize::<RawRecord>()
            .enumerate()
            .map(|(i, raw)| raw?.into_record(i + 1))
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_records(records)
    }

    /// Rejects timestamps that are out of range or go backwards
    pub fn from_records(records: Vec<TraceRecord>) -> Result<Self, TraceError> {
        if let Some(i) = records.iter().position(|r| !valid_at_secs(r.at_secs)) {
            return Err(TraceError::InvalidValue {
                record: i + 1,
                field: "at_secs",
                value: records[i].at_secs.to_string(),
            });
        }

        let out_of_order = records
            .iter()
            .tuple_windows()
            .position(|(prev, cur)| cur.at_secs < prev.at_secs);

        if let Some(i) = out_of_order {
            return Err(TraceError::OutOfOrder {
                record: i + 2,
                at_secs: records[i + 1].at_secs,
            });
        }

        Ok(Self { records })
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.records.last().map_or(0.0, |r| r.at_secs)
    }

    pub fn has_end(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.event == WalkEvent::Control(Control::End))
    }

    /// Rewrites step readings relative to the first one in the trace
    pub fn with_relative_steps(mut self) -> Self {
        let mut baseline = StepBaseline::default();
        for rec in &mut self.records {
            if let WalkEvent::Steps(steps) = rec.event {
                rec.event = WalkEvent::Steps(baseline.relative(steps));
            }
        }
        self
    }

    /// Splits the trace into the pedometer stream and the location stream,
    /// one trace second lasting `second` of wall time. Pause and resume
    /// travel with the location stream; the end is kept apart so it can be
    /// delivered after both streams have caught up with it. Records after
    /// the first `end` are dropped. A trace without an `end` record is ended
    /// after its last record, and no earlier than half a second past the
    /// last whole second it covers.
    pub fn timelines(&self, second: Duration) -> SensorStreams {
        let scale = |at: f64| {
            Duration::try_from_secs_f64(second.as_secs_f64() * at).unwrap_or(Duration::MAX)
        };

        let mut streams = SensorStreams::default();
        for rec in &self.records {
            let at = scale(rec.at_secs);
            match rec.event {
                WalkEvent::Control(Control::End) => {
                    streams.end_at = Some(at);
                    return streams;
                }
                WalkEvent::Steps(_) => streams.steps.push((at, rec.event)),
                _ => streams.positions.push((at, rec.event)),
            }
        }

        let last = self.duration_secs();
        streams.end_at = Some(scale(last.max(last.floor() + 0.5)));
        streams
    }
}

/// Turns an absolute pedometer counter into a per-session count
#[derive(Debug, Clone, Copy, Default)]
pub struct StepBaseline {
    first: Option<u64>,
}

impl StepBaseline {
    pub fn relative(&mut self, reading: u64) -> u64 {
        let first = *self.first.get_or_insert(reading);
        reading.saturating_sub(first)
    }
}

/// Result of replaying a trace through a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReplayReport {
    pub ended: SessionEnded,
    pub ticks: u64,
    pub events: usize,
    pub implicit_end: bool,
}

/// Replays `trace` offline. Tick `k` fires at `k` seconds, before any record
/// stamped at or after that second.
pub fn replay(trace: &Trace, session: &mut WalkSession) -> ReplayReport {
    replay_with(trace, session, |_, _| {})
}

pub fn replay_with<F>(trace: &Trace, session: &mut WalkSession, mut observe: F) -> ReplayReport
where
    F: FnMut(&WalkEvent, &WalkSession),
{
    let mut ticks = 0u64;
    let mut events = 0usize;

    for rec in trace.records() {
        while (ticks + 1) as f64 <= rec.at_secs {
            session.on_tick();
            ticks += 1;
            observe(&WalkEvent::Tick, session);
        }

        events += 1;
        let ended = session.apply(rec.event);
        observe(&rec.event, session);
        if let Some(ended) = ended {
            return ReplayReport {
                ended,
                ticks,
                events,
                implicit_end: false,
            };
        }
    }

    debug!("trace has no end record, ending session");
    ReplayReport {
        ended: session.end(),
        ticks,
        events,
        implicit_end: true,
    }
}

/// Replays `trace` through live tick and sensor threads, one trace second
/// lasting `second` of wall time. The threads are released before this
/// returns.
pub fn replay_realtime(trace: &Trace, session: &mut WalkSession, second: Duration) -> SessionEnded {
    replay_realtime_with(trace, session, second, |_, _| {})
}

pub fn replay_realtime_with<F>(
    trace: &Trace,
    session: &mut WalkSession,
    second: Duration,
    observe: F,
) -> SessionEnded
where
    F: FnMut(&WalkEvent, &WalkSession),
{
    let (tx, source) = ChannelEventSource::channel();
    let _hub = SensorHub::acquire(tx, FixedTicker::new(second), trace.timelines(second));
    let runner = Runner::new(source, FixedTicker::new(second));

    runner
        .drive_with(session, observe)
        .unwrap_or_else(|| session.end())
}
