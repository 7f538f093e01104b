//! # Engine Module
//!
//! The stateful half of the library: everything that talks to a running CP2K shell.
//!
//! ## Architecture
//!
//! - **Transport** ([`transport`], [`process`]) - The half-duplex line channel to the shell
//!   and its implementation on top of a child process
//! - **Protocol** ([`protocol`]) - Command rendering, reply markers, numeric formatting and
//!   the startup handshake
//! - **Session** ([`session`]) - The force environment state machine and the evaluation
//!   sequence (cell, positions, energy, forces, stress)
//! - **Input Generation** ([`input`]) - Merges calculator settings and a structure into a
//!   complete input file
//! - **Configuration** ([`config`]) - Calculator settings and shell command resolution
//! - **Progress** ([`progress`]) - Optional callbacks for long-running workflows
//! - **Error Handling** ([`error`]) - The error type shared by all of the above
//!
//! A session owns exactly one shell and exactly one transport; concurrent evaluations need
//! separate sessions.

pub mod config;
pub mod error;
pub mod input;
pub mod process;
pub mod progress;
pub mod protocol;
pub mod session;
pub mod transport;
