//! # Workflows Module
//!
//! High-level entry points built on top of the shell session.
//!
//! - **Calculator** ([`calculator`]) - A persistent energy, force and stress calculator that
//!   uploads only what changed between consecutive structures
//! - **Trajectory Evaluation** ([`trajectory`]) - Evaluates a sequence of structures with a
//!   single shell, reporting progress as it goes

pub mod calculator;
pub mod trajectory;
