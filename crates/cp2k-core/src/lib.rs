//! # CP2K Shell Driver Library
//!
//! A library for driving the CP2K shell (`cp2k_shell`) as a persistent subprocess and for
//! generating CP2K input files on demand.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture to keep protocol handling, data
//! models and user-facing entry points apart.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`, `Results`) and the
//!   hierarchical input tree (`InputSection`) together with its parser.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer that owns the shell process, speaks
//!   the line protocol and tracks the lifecycle of the force environment living inside the
//!   engine. It also turns a template and a structure into a complete input file.
//!
//! - **[`workflows`]: The Public API.** The calculator front-end that decides which protocol
//!   steps a new structure requires and caches the results of the last evaluation, and a
//!   trajectory workflow that evaluates many structures with one shell.

pub mod core;
pub mod engine;
pub mod workflows;
