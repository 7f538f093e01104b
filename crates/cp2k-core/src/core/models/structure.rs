use nalgebra::{Matrix3, Point3};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructureError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Structure has {symbols} chemical symbols but {positions} positions")]
    LengthMismatch { symbols: usize, positions: usize },
    #[error("Chemical symbol of atom {index} is empty or contains whitespace")]
    InvalidSymbol { index: usize },
}

/// An atomic structure as seen by the calculator.
///
/// Positions are Cartesian coordinates in Angstroms. The rows of `cell` are the three
/// lattice vectors `A`, `B` and `C`, also in Angstroms.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    symbols: Vec<String>,
    positions: Vec<Point3<f64>>,
    cell: Matrix3<f64>,
    pbc: [bool; 3],
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StructureFile {
    symbols: Vec<String>,
    positions: Vec<[f64; 3]>,
    #[serde(default)]
    cell: Option<[[f64; 3]; 3]>,
    #[serde(default)]
    pbc: Option<[bool; 3]>,
}

impl Structure {
    /// Creates a structure after checking that every atom has a symbol and a position.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::LengthMismatch`] if the number of symbols and positions
    /// differ, or [`StructureError::InvalidSymbol`] for an unusable chemical symbol.
    pub fn new(
        symbols: Vec<String>,
        positions: Vec<Point3<f64>>,
        cell: Matrix3<f64>,
        pbc: [bool; 3],
    ) -> Result<Self, StructureError> {
        if symbols.len() != positions.len() {
            return Err(StructureError::LengthMismatch {
                symbols: symbols.len(),
                positions: positions.len(),
            });
        }
        if let Some(index) = symbols
            .iter()
            .position(|s| s.is_empty() || s.contains(char::is_whitespace))
        {
            return Err(StructureError::InvalidSymbol { index });
        }
        Ok(Self {
            symbols,
            positions,
            cell,
            pbc,
        })
    }

    /// Loads a structure from a TOML file with `symbols`, `positions`, and optional `cell`
    /// and `pbc` entries.
    pub fn load(path: &Path) -> Result<Self, StructureError> {
        let origin = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| StructureError::Io {
            path: origin.clone(),
            source: e,
        })?;
        Self::parse_toml(&content, &origin)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, StructureError> {
        Self::parse_toml(content, "<string>")
    }

    fn parse_toml(content: &str, origin: &str) -> Result<Self, StructureError> {
        let file: StructureFile = toml::from_str(content).map_err(|e| StructureError::Toml {
            path: origin.to_string(),
            source: e,
        })?;
        let positions = file
            .positions
            .iter()
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .collect();
        let cell = file.cell.map_or_else(Matrix3::zeros, |rows| {
            Matrix3::from_fn(|i, j| rows[i][j])
        });
        Self::new(file.symbols, positions, cell, file.pbc.unwrap_or([false; 3]))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn cell(&self) -> &Matrix3<f64> {
        &self.cell
    }

    pub fn pbc(&self) -> [bool; 3] {
        self.pbc
    }

    /// Replaces all positions, keeping species and cell.
    pub fn set_positions(&mut self, positions: Vec<Point3<f64>>) -> Result<(), StructureError> {
        if positions.len() != self.symbols.len() {
            return Err(StructureError::LengthMismatch {
                symbols: self.symbols.len(),
                positions: positions.len(),
            });
        }
        self.positions = positions;
        Ok(())
    }

    pub fn set_cell(&mut self, cell: Matrix3<f64>) {
        self.cell = cell;
    }

    /// Whether the structure is periodic along at least one lattice vector.
    pub fn is_periodic(&self) -> bool {
        self.pbc.iter().any(|&p| p)
    }

    /// The periodicity in CP2K notation, e.g. `XYZ`, `XZ` or `NONE`.
    pub fn periodicity_label(&self) -> String {
        let label: String = ['X', 'Y', 'Z']
            .iter()
            .zip(self.pbc.iter())
            .filter(|(_, periodic)| **periodic)
            .map(|(axis, _)| *axis)
            .collect();
        if label.is_empty() {
            "NONE".to_string()
        } else {
            label
        }
    }

    /// The nine cell components in row-major order (A, then B, then C).
    pub fn cell_row_major(&self) -> [f64; 9] {
        let mut flat = [0.0; 9];
        for i in 0..3 {
            for j in 0..3 {
                flat[3 * i + j] = self.cell[(i, j)];
            }
        }
        flat
    }

    /// Whether `other` has the same species in the same order and the same periodicity.
    pub fn same_composition(&self, other: &Structure) -> bool {
        self.symbols == other.symbols && self.pbc == other.pbc
    }
}
