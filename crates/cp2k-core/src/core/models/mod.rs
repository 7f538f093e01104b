//! # Core Models Module
//!
//! Plain data types exchanged between the calculator front-end and the shell session.
//!
//! ## Key Components
//!
//! - [`structure`] - Atomic structure: species, Cartesian positions, cell and periodicity
//! - [`changes`] - The aspects of a structure that changed since the last evaluation
//! - [`results`] - Energy, forces and stress returned by an evaluation

pub mod changes;
pub mod results;
pub mod structure;
