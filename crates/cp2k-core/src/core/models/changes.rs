use super::structure::Structure;
use std::fmt;

/// One aspect of a structure that the engine needs to be told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangedAspect {
    /// Species, atom count or periodicity. Requires a new force environment.
    Composition,
    /// Lattice vectors.
    Cell,
    /// Atomic positions.
    Positions,
}

/// The set of aspects that changed between two structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemChanges {
    composition: bool,
    cell: bool,
    positions: bool,
}

impl SystemChanges {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            composition: true,
            cell: true,
            positions: true,
        }
    }

    /// Compares `current` against the previously evaluated structure.
    ///
    /// With no previous structure every aspect counts as changed.
    pub fn between(previous: Option<&Structure>, current: &Structure) -> Self {
        let Some(previous) = previous else {
            return Self::all();
        };
        if !previous.same_composition(current) {
            return Self::all();
        }
        Self {
            composition: false,
            cell: previous.cell() != current.cell(),
            positions: previous.positions() != current.positions(),
        }
    }

    pub fn with(mut self, aspect: ChangedAspect) -> Self {
        match aspect {
            ChangedAspect::Composition => self.composition = true,
            ChangedAspect::Cell => self.cell = true,
            ChangedAspect::Positions => self.positions = true,
        }
        self
    }

    pub fn contains(&self, aspect: ChangedAspect) -> bool {
        match aspect {
            ChangedAspect::Composition => self.composition,
            ChangedAspect::Cell => self.cell,
            ChangedAspect::Positions => self.positions,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.composition || self.cell || self.positions)
    }
}

impl FromIterator<ChangedAspect> for SystemChanges {
    fn from_iter<I: IntoIterator<Item = ChangedAspect>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), Self::with)
    }
}

impl fmt::Display for SystemChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (self.composition, "composition"),
            (self.cell, "cell"),
            (self.positions, "positions"),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, name)| *name)
        .collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// How a calculator obtained the results for a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationKind {
    /// Nothing changed and the previous results were reused.
    Cached,
    /// Cell or positions were uploaded to the existing force environment.
    Updated,
    /// A force environment was loaded from a freshly generated input first.
    Loaded,
}

impl fmt::Display for EvaluationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationKind::Cached => write!(f, "cached"),
            EvaluationKind::Updated => write!(f, "updated"),
            EvaluationKind::Loaded => write!(f, "loaded"),
        }
    }
}
