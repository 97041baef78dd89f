//! # Tessel Exec
//!
//! A reference interpreter for lowered tessel programs.
//!
//! Buffers are plain vectors of constants shared between every memref viewing them, so the effect
//! of a lowered load or store can be checked element by element against the tile the structured
//! pointer described.

mod error;
mod interpreter;
mod memory;

pub use error::*;
pub use interpreter::*;
pub use memory::*;
