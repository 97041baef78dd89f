//! # Tessel Lower
//!
//! Lowers structured tensor pointers to strided memref views.
//!
//! A structured pointer describes a tile of a linear buffer through sizes, strides, offsets and a
//! dimension order. This crate turns every pointer into concrete views of the buffer, splitting
//! pointers that wrap around into two views, and turns loads and stores through those pointers
//! into copies between the views and freshly allocated tiles.
//!
//! The entry point is [`StructuredToMemref`]:
//!
//! ```ignore
//! let (lowered, stats) = StructuredToMemref::with_config(LoweringConfig::default()).lower(scope)?;
//! ```

mod arith;
mod config;
mod error;
mod load;
mod materialize;
mod memref;
mod pass;
mod store;
mod view;
mod wraparound;

pub use config::*;
pub use error::*;
pub use load::*;
pub use materialize::{ViewMaterializer, normalize_strides};
pub use pass::*;
pub use store::*;
pub use view::*;
pub use wraparound::*;
