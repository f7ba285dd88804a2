//! Occupancy grid
//!
//! A static field of cell classifications. Coordinates are `(x, y)` with `x`
//! the column and the origin at the top-left cell. Continuous positions (poses,
//! ray samples) map to cells by truncation, so cell `(x, y)` covers
//! `[x, x + 1) × [y, y + 1)`.

use crate::error::{LocalizationError, Result};
use std::fmt;
use std::ops::Range;

/// Classification of a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellCode {
    /// Drivable space
    Free,
    /// A physical obstacle. Blocks motion and ray-casts.
    Obstacle,
    /// Non-drivable filler that is not a physical obstacle. Blocks motion only
    /// unless the ray-caster is configured to stop on it.
    Boundary,
}

impl CellCode {
    /// Character used by the text map format
    pub fn as_char(self) -> char {
        match self {
            CellCode::Free => '.',
            CellCode::Obstacle => '#',
            CellCode::Boundary => '*',
        }
    }

    /// Parse a text map character
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '.' | '0' => Some(CellCode::Free),
            '#' | '-' | '1' => Some(CellCode::Obstacle),
            '*' | '2' => Some(CellCode::Boundary),
            _ => None,
        }
    }
}

/// A rectangular occupancy grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    cells: Vec<CellCode>,
}

impl OccupancyGrid {
    /// Create a grid filled with a single classification
    pub fn new(width: usize, height: usize, fill: CellCode) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(LocalizationError::InvalidMap(format!(
                "grid dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        Ok(OccupancyGrid {
            width,
            height,
            cells: vec![fill; width * height],
        })
    }

    /// Create a grid from rows of cells; every row must have the same length
    pub fn from_rows(rows: Vec<Vec<CellCode>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if width == 0 {
            return Err(LocalizationError::InvalidMap("grid has no cells".to_string()));
        }

        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(LocalizationError::InvalidMap(format!(
                    "row {} has {} cells, expected {}",
                    y,
                    row.len(),
                    width
                )));
            }
            cells.extend(row);
        }

        Ok(OccupancyGrid {
            width,
            height,
            cells,
        })
    }

    /// Parse the text map format: one line per row, `.` free, `#` obstacle,
    /// `*` boundary. Blank lines are ignored.
    pub fn from_ascii(text: &str) -> Result<Self> {
        let rows = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(y, line)| {
                line.chars()
                    .filter(|c| !c.is_whitespace())
                    .enumerate()
                    .map(|(x, c)| {
                        CellCode::from_char(c).ok_or_else(|| {
                            LocalizationError::InvalidMap(format!(
                                "unknown cell '{}' at ({}, {})",
                                c, x, y
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_rows(rows)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Check whether a cell coordinate lies inside the grid
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as u64) < self.width as u64 && (y as u64) < self.height as u64
    }

    /// Classification of a cell
    pub fn classify(&self, x: i64, y: i64) -> Result<CellCode> {
        if !self.in_bounds(x, y) {
            return Err(LocalizationError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(self.cells[self.index(x as usize, y as usize)])
    }

    /// In bounds and free
    pub fn is_free(&self, x: i64, y: i64) -> bool {
        matches!(self.classify(x, y), Ok(CellCode::Free))
    }

    /// Classification of the cell containing a continuous position, `None` when
    /// the position is outside the grid
    pub fn cell_at(&self, x: f64, y: f64) -> Option<CellCode> {
        if !(x >= 0.0 && y >= 0.0) {
            return None;
        }
        self.classify(x as i64, y as i64).ok()
    }

    /// Whether a continuous position lies in a free cell
    pub fn is_free_at(&self, x: f64, y: f64) -> bool {
        self.cell_at(x, y) == Some(CellCode::Free)
    }

    /// Overwrite a single cell
    pub fn set(&mut self, x: i64, y: i64, code: CellCode) -> Result<()> {
        self.classify(x, y)?;
        let index = self.index(x as usize, y as usize);
        self.cells[index] = code;
        Ok(())
    }

    /// Overwrite a rectangle of cells, `xs` by `ys`, clipped to the grid
    pub fn fill_rect(&mut self, xs: Range<usize>, ys: Range<usize>, code: CellCode) {
        let x_end = xs.end.min(self.width);
        let y_end = ys.end.min(self.height);
        for y in ys.start..y_end {
            for x in xs.start..x_end {
                let index = self.index(x, y);
                self.cells[index] = code;
            }
        }
    }

    /// Scale the grid up so every cell becomes a `factor × factor` block of
    /// identical cells
    pub fn expand(&self, factor: usize) -> Result<Self> {
        if factor == 0 {
            return Err(LocalizationError::InvalidMap(
                "expansion factor must be positive".to_string(),
            ));
        }

        let width = self.width * factor;
        let height = self.height * factor;
        let mut cells = Vec::with_capacity(width * height);
        for y in 0..height {
            let row = &self.cells[(y / factor) * self.width..(y / factor + 1) * self.width];
            for x in 0..width {
                cells.push(row[x / factor]);
            }
        }

        Ok(OccupancyGrid {
            width,
            height,
            cells,
        })
    }

    /// Inverse of [`expand`](Self::expand): recover the coarse grid by sampling
    /// the top-left cell of every `factor × factor` block
    pub fn contract(&self, factor: usize) -> Result<Self> {
        if factor == 0 || self.width % factor != 0 || self.height % factor != 0 {
            return Err(LocalizationError::InvalidMap(format!(
                "cannot contract a {}x{} grid by {}",
                self.width, self.height, factor
            )));
        }

        let width = self.width / factor;
        let height = self.height / factor;
        let cells = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| self.cells[self.index(x * factor, y * factor)])
            .collect();

        Ok(OccupancyGrid {
            width,
            height,
            cells,
        })
    }

    /// All cells in row-major order as `(x, y, code)`
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, CellCode)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &code)| (i % self.width, i / self.width, code))
    }

    /// Number of cells with the given classification
    pub fn count(&self, code: CellCode) -> usize {
        self.cells.iter().filter(|&&c| c == code).count()
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }
}

impl fmt::Display for OccupancyGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.width) {
            let line: String = row.iter().map(|c| c.as_char()).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
