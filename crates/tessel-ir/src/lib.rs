//! # Tessel IR
//!
//! The intermediate representation consumed and produced by the tessel lowering stages.
//!
//! Programs are a [`Scope`] of [`Instruction`]s in SSA form. Before lowering, tiles are addressed
//! through [structured pointers](PointerDescriptor) and moved with `Load`/`Store`. After lowering,
//! only [memrefs](MemRefType), dense [tensors](TensorType) and index arithmetic remain.

mod operation;
mod scope;
mod structured;
mod transformer;
mod types;
mod variable;

pub use operation::*;
pub use scope::*;
pub use structured::*;
pub use transformer::*;
pub use types::*;
pub use variable::*;
