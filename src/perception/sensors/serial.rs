//! Raw readings from the lidar serial link
//!
//! The rotating lidar reports one `angle,distance` line per reading, angle in
//! degrees and distance in the configured unit. Readings are collected into a
//! [`RawScan`] until a sweep is complete and then binned into a [`Scan`] with
//! the beam layout the filter expects.

use super::Scan;
use crate::common::angles;
use tracing::warn;

/// One reading from the serial link
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Degrees, counter-clockwise from the rover's heading
    pub angle: f64,
    pub distance: f64,
}

/// Parse an `angle,distance` line
///
/// Returns `None` for anything else: wrong field count, non-numeric or
/// non-finite fields.
pub fn parse_line(line: &str) -> Option<Reading> {
    let mut fields = line.trim().split(',');
    let angle = fields.next()?.trim().parse::<f64>().ok()?;
    let distance = fields.next()?.trim().parse::<f64>().ok()?;
    if fields.next().is_some() || !angle.is_finite() || !distance.is_finite() {
        return None;
    }
    Some(Reading { angle, distance })
}

/// Readings accumulated over one lidar sweep
#[derive(Debug, Clone)]
pub struct RawScan {
    readings: Vec<Reading>,
    sweep_size: usize,
    min_range: f64,
    max_range: f64,
}

impl RawScan {
    /// Create an empty sweep that completes after `sweep_size` distinct angles
    pub fn new(sweep_size: usize, min_range: f64, max_range: f64) -> Self {
        RawScan {
            readings: Vec::with_capacity(sweep_size),
            sweep_size,
            min_range,
            max_range,
        }
    }

    /// Feed one line from the serial link
    ///
    /// Malformed lines are logged and dropped. Returns whether the line was used.
    pub fn push_line(&mut self, line: &str) -> bool {
        match parse_line(line) {
            Some(reading) => {
                self.push(reading);
                true
            }
            None => {
                warn!(line, "discarding malformed lidar line");
                false
            }
        }
    }

    /// Add a reading, clamped into range
    ///
    /// A repeat of the previous angle replaces its distance if shorter.
    /// Readings past a complete sweep are ignored.
    pub fn push(&mut self, reading: Reading) {
        let distance = reading.distance.clamp(self.min_range, self.max_range);

        if let Some(last) = self.readings.last_mut() {
            if last.angle == reading.angle {
                last.distance = last.distance.min(distance);
                return;
            }
        }
        if self.is_complete() {
            return;
        }
        self.readings.push(Reading {
            angle: reading.angle,
            distance,
        });
    }

    pub fn is_complete(&self) -> bool {
        self.readings.len() >= self.sweep_size
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Start a new sweep
    pub fn clear(&mut self) {
        self.readings.clear();
    }

    /// Bin readings onto `beam_count` evenly spaced beams
    ///
    /// Each reading goes to the nearest beam and a beam hit more than once
    /// keeps the shortest distance. A beam with no reading holds max range but
    /// is marked empty, so it does not count against any particle.
    pub fn to_scan(&self, beam_count: usize) -> Scan {
        let mut ranges = vec![self.max_range; beam_count];
        let mut seen = vec![false; beam_count];
        let step = 360.0 / beam_count as f64;

        for reading in &self.readings {
            let beam = (angles::wrap_degrees(reading.angle) / step).round() as usize % beam_count;
            if seen[beam] {
                ranges[beam] = ranges[beam].min(reading.distance);
            } else {
                ranges[beam] = reading.distance;
                seen[beam] = true;
            }
        }

        let ranges = ranges
            .into_iter()
            .map(|r| r.clamp(self.min_range, self.max_range))
            .collect();
        Scan::with_mask(ranges, seen)
    }

    /// Angle in radians of the longest reading, the most open direction
    ///
    /// Ties go to the earliest reading.
    pub fn widest_opening(&self) -> Option<f64> {
        let mut widest: Option<&Reading> = None;
        for reading in &self.readings {
            if widest.map_or(true, |w| reading.distance > w.distance) {
                widest = Some(reading);
            }
        }
        widest.map(|r| r.angle.to_radians())
    }
}
