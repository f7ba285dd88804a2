//! Precomputed lidar lookup table
//!
//! For every free cell and every whole-degree heading the table holds the range
//! a single forward beam would read from that cell. Particles then read their
//! expected scans with one array access per beam instead of a ray-cast.
//!
//! # File format
//!
//! Little-endian throughout:
//!
//! ```text
//! magic       8 bytes   "MCLLUT\0\x01"
//! width       u32
//! height      u32
//! headings    u32       always 360
//! max_range   f32       sentinel stored for non-free cells
//! ranges      f32 × width × height × headings, index ((x * height) + y) * headings + h
//! ```
//!
//! Tables are written to a temporary file in the destination directory and
//! renamed into place, so a reader never sees a partially written table.

use super::raycast::{cast_ray, RayCastParams};
use super::{Scan, SensorModel};
use crate::common::angles::{self, HEADINGS};
use crate::common::Pose;
use crate::error::{LocalizationError, Result};
use crate::map::{OccupancyGrid, ValidPositions};
use rayon::prelude::*;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{debug, info};

const MAGIC: &[u8; 8] = b"MCLLUT\0\x01";
const HEADER_LEN: usize = 8 + 4 * 4;

/// Dense `width × height × 360` table of expected ranges
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    width: usize,
    height: usize,
    max_range: f32,
    ranges: Vec<f32>,
}

impl LookupTable {
    /// `(width, height, headings)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.width, self.height, HEADINGS)
    }

    pub fn max_range(&self) -> f64 {
        self.max_range as f64
    }

    /// Stored range, `None` outside the table
    pub fn get(&self, x: usize, y: usize, heading: usize) -> Option<f32> {
        if x >= self.width || y >= self.height || heading >= HEADINGS {
            return None;
        }
        Some(self.ranges[self.index(x, y, heading)])
    }

    /// Stored range, the max-range sentinel outside the table
    pub fn range(&self, x: usize, y: usize, heading: usize) -> f64 {
        self.get(x, y, heading).unwrap_or(self.max_range) as f64
    }

    /// Publish the table at `path` atomically
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            writer.write_all(MAGIC)?;
            writer.write_all(&(self.width as u32).to_le_bytes())?;
            writer.write_all(&(self.height as u32).to_le_bytes())?;
            writer.write_all(&(HEADINGS as u32).to_le_bytes())?;
            writer.write_all(&self.max_range.to_le_bytes())?;

            for column in self.ranges.chunks(self.height * HEADINGS) {
                let words: Vec<u32> = column.iter().map(|r| r.to_bits().to_le()).collect();
                writer.write_all(bytemuck::cast_slice(&words))?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| LocalizationError::Io(e.error))?;

        info!(path = %path.display(), width = self.width, height = self.height, "lookup table published");
        Ok(())
    }

    /// Load a table and check it was built for a `width × height` grid
    pub fn load(path: impl AsRef<Path>, width: usize, height: usize) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LocalizationError::LookupTableMissing {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let table = Self::from_bytes(&bytes)?;
        let expected = (width, height, HEADINGS);
        if table.shape() != expected {
            return Err(LocalizationError::LookupTableShapeMismatch {
                expected,
                found: table.shape(),
            });
        }

        info!(path = %path.display(), width, height, "lookup table loaded");
        Ok(table)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(LocalizationError::LookupTableCorrupt(format!(
                "file is {} bytes, shorter than the header",
                bytes.len()
            )));
        }
        if &bytes[..8] != MAGIC {
            return Err(LocalizationError::LookupTableCorrupt(
                "not a lookup table file".to_string(),
            ));
        }

        let word = |offset: usize| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[offset..offset + 4]);
            buf
        };
        let width = u32::from_le_bytes(word(8)) as usize;
        let height = u32::from_le_bytes(word(12)) as usize;
        let headings = u32::from_le_bytes(word(16)) as usize;
        let max_range = f32::from_le_bytes(word(20));

        if headings != HEADINGS {
            return Err(LocalizationError::LookupTableShapeMismatch {
                expected: (width, height, HEADINGS),
                found: (width, height, headings),
            });
        }

        let payload = &bytes[HEADER_LEN..];
        let expected_len = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(headings))
            .and_then(|n| n.checked_mul(4));
        if expected_len != Some(payload.len()) {
            return Err(LocalizationError::LookupTableCorrupt(format!(
                "payload is {} bytes, header describes {}x{}x{}",
                payload.len(),
                width,
                height,
                headings
            )));
        }

        let ranges: Vec<f32> = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        if let Some(bad) = ranges.iter().position(|r| !r.is_finite() || *r < 0.0) {
            return Err(LocalizationError::LookupTableCorrupt(format!(
                "entry {} holds {}",
                bad, ranges[bad]
            )));
        }

        Ok(LookupTable {
            width,
            height,
            max_range,
            ranges,
        })
    }

    fn index(&self, x: usize, y: usize, heading: usize) -> usize {
        (x * self.height + y) * HEADINGS + heading
    }
}

/// Offline builder: one single-beam ray-cast per free cell and heading
#[derive(Debug, Clone)]
pub struct LookupTableBuilder {
    grid: Arc<OccupancyGrid>,
    params: RayCastParams,
}

impl LookupTableBuilder {
    /// Create a new builder
    pub fn new(grid: Arc<OccupancyGrid>, params: RayCastParams) -> Self {
        LookupTableBuilder { grid, params }
    }

    /// Build the whole table
    pub fn build(&self, valid: &ValidPositions) -> Result<LookupTable> {
        self.build_cancellable(valid, &AtomicBool::new(false))
    }

    /// Build the table, checking `cancel` before every cell
    ///
    /// Columns are computed in parallel; each writes only its own slice of the
    /// output. Returns [`LocalizationError::Interrupted`] once `cancel` is seen.
    pub fn build_cancellable(
        &self,
        valid: &ValidPositions,
        cancel: &AtomicBool,
    ) -> Result<LookupTable> {
        let (width, height) = self.grid.dimensions();
        let max_range = self.params.max_range as f32;
        let mut ranges = vec![max_range; width * height * HEADINGS];
        let headings: Vec<f64> = (0..HEADINGS).map(|h| (h as f64).to_radians()).collect();

        let started = Instant::now();
        let columns_done = AtomicUsize::new(0);
        info!(width, height, cells = valid.len(), "building lookup table");

        ranges
            .par_chunks_mut(height * HEADINGS)
            .enumerate()
            .try_for_each(|(x, column)| {
                for (y, cell) in column.chunks_mut(HEADINGS).enumerate() {
                    if cancel.load(Ordering::Relaxed) {
                        return Err(LocalizationError::Interrupted);
                    }
                    if !valid.contains(x, y) {
                        continue;
                    }
                    for (slot, &heading) in cell.iter_mut().zip(&headings) {
                        *slot = cast_ray(&self.grid, &self.params, x as f64, y as f64, heading)
                            as f32;
                    }
                }

                let done = columns_done.fetch_add(1, Ordering::Relaxed) + 1;
                if done % 50 == 0 {
                    debug!(done, total = width, "lookup table columns");
                }
                Ok(())
            })?;

        info!(elapsed = ?started.elapsed(), "lookup table built");
        Ok(LookupTable {
            width,
            height,
            max_range,
            ranges,
        })
    }
}

/// Sensor model reading expected scans from a lookup table
#[derive(Debug, Clone)]
pub struct LookupSensor {
    table: Arc<LookupTable>,
    beam_count: usize,
}

impl LookupSensor {
    /// Create a new lookup sensor
    pub fn new(table: Arc<LookupTable>, beam_count: usize) -> Self {
        LookupSensor { table, beam_count }
    }

    pub fn table(&self) -> &LookupTable {
        &self.table
    }

    /// Nearest table cell to a continuous position
    fn nearest_cell(&self, pose: &Pose) -> (usize, usize) {
        let clamp = |v: f64, len: usize| v.round().clamp(0.0, (len - 1) as f64) as usize;
        (clamp(pose.x, self.table.width), clamp(pose.y, self.table.height))
    }
}

impl SensorModel for LookupSensor {
    fn name(&self) -> &str {
        "lookup"
    }

    fn beam_count(&self) -> usize {
        self.beam_count
    }

    fn scan(&self, pose: &Pose) -> Scan {
        let (x, y) = self.nearest_cell(pose);
        let heading = pose.theta.to_degrees();
        let ranges = (0..self.beam_count)
            .map(|i| {
                let h = angles::heading_index(heading + angles::beam_offset_degrees(i, self.beam_count));
                self.table.range(x, y, h)
            })
            .collect();
        Scan::new(ranges)
    }
}
