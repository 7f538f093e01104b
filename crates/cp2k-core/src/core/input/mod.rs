//! Provides the in-memory model of CP2K input files.
//!
//! A CP2K input is a tree of `&NAME ... &END NAME` sections, each holding ordered keyword
//! lines and an optional section parameter. This module contains the tree itself
//! ([`section`]), the text parser that builds it ([`parser`]) and the error type shared by
//! both ([`error`]).

pub mod error;
pub mod parser;
pub mod section;

pub use error::InputError;
pub use parser::parse_input;
pub use section::InputSection;
