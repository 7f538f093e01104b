//! # Core Module
//!
//! This module provides the stateless building blocks used by the shell driver.
//!
//! ## Architecture
//!
//! - **Atomic Structures** ([`models`]) - Species, positions, cell and periodicity of a system,
//!   the set of aspects that changed between two structures, and evaluation results
//! - **Input Files** ([`input`]) - The hierarchical section tree of a CP2K input file, its
//!   parser and its deterministic serialization
//!
//! Nothing in this module talks to the engine; everything here can be built and inspected
//! without a running CP2K process.

pub mod input;
pub mod models;
