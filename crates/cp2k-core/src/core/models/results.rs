use nalgebra::{Matrix3, Vector3};
use serde::Serialize;

/// A quantity the calculator can be asked for. Every evaluation yields all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Energy,
    Forces,
    Stress,
}

impl Property {
    pub const ALL: [Property; 3] = [Property::Energy, Property::Forces, Property::Stress];
}

/// Results of a single energy and force evaluation.
///
/// Energies are in eV, forces in eV/Angstrom and the stress in eV/Angstrom^3 using the
/// "positive is tensile" sign convention, stored in Voigt order (xx, yy, zz, yz, xz, xy).
#[derive(Debug, Clone, PartialEq)]
pub struct Results {
    pub energy: f64,
    pub forces: Vec<Vector3<f64>>,
    pub stress: [f64; 6],
}

impl Results {
    pub fn max_force(&self) -> f64 {
        self.forces.iter().map(|f| f.norm()).fold(0.0, f64::max)
    }
}

/// Converts a symmetric 3x3 stress tensor to Voigt order (xx, yy, zz, yz, xz, xy).
pub fn to_voigt(tensor: &Matrix3<f64>) -> [f64; 6] {
    [
        tensor[(0, 0)],
        tensor[(1, 1)],
        tensor[(2, 2)],
        tensor[(1, 2)],
        tensor[(0, 2)],
        tensor[(0, 1)],
    ]
}

/// Row-major flat view of the results, used for reports.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsRecord {
    pub energy: f64,
    pub forces: Vec<[f64; 3]>,
    pub stress: [f64; 6],
}

impl From<&Results> for ResultsRecord {
    fn from(results: &Results) -> Self {
        Self {
            energy: results.energy,
            forces: results.forces.iter().map(|f| [f.x, f.y, f.z]).collect(),
            stress: results.stress,
        }
    }
}
