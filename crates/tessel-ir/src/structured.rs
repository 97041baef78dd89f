use core::fmt::Display;

use derive_new::new;

use crate::{PointerType, Variable};

/// How a pointer addresses memory, as classified by the pointer analysis.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    /// A plain strided view into the buffer.
    Structured,
    /// A structured pointer whose pointee is a whole tensor. Same layout math.
    Block,
    /// Addressing wraps around along the columns (minor axis).
    SplitSideBySide,
    /// Addressing wraps around along the rows (major axis).
    SplitStacked,
}

impl PointerKind {
    pub fn is_split(&self) -> bool {
        matches!(self, PointerKind::SplitSideBySide | PointerKind::SplitStacked)
    }
}

/// A logical multi-dimensional view into a linear buffer.
///
/// `shape` holds the logical extents of the whole tensor. Non-wrapping pointers may leave it empty.
/// For split pointers exactly one of `shape[0]`/`shape[1]` is the sentinel `0` and the other is
/// the wraparound modulus.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(new, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PointerDescriptor {
    pub base: Variable,
    pub ty: PointerType,
    pub shape: Vec<Variable>,
    pub strides: Vec<Variable>,
    /// Extents of the tile, always known at compile time.
    pub sizes: Vec<i64>,
    /// Offset terms, summed into a single linear offset.
    pub offsets: Vec<Variable>,
    /// Dimension traversal order, most-major dimension first.
    pub order: Vec<u32>,
    pub kind: PointerKind,
}

impl PointerDescriptor {
    pub fn rank(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_split(&self) -> bool {
        self.kind.is_split()
    }

    /// Whether `order` is strictly decreasing, the only layout currently supported.
    pub fn has_decreasing_order(&self) -> bool {
        self.order.windows(2).all(|pair| pair[0] > pair[1])
    }
}

/// Read a tile through a pointer, optionally restricted to `mask_dims` with the rest set to
/// `other`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(new, Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadOperator {
    pub ptr: Variable,
    pub mask_dims: Vec<Variable>,
    pub other: Option<Variable>,
}

impl LoadOperator {
    pub fn has_mask(&self) -> bool {
        !self.mask_dims.is_empty()
    }
}

/// Write a tile through a pointer, optionally restricted to `mask_dims`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(new, Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreOperator {
    pub ptr: Variable,
    pub value: Variable,
    pub mask_dims: Vec<Variable>,
}

impl StoreOperator {
    pub fn has_mask(&self) -> bool {
        !self.mask_dims.is_empty()
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Structured {
    MakeTensorPtr(PointerDescriptor),
    Load(LoadOperator),
    Store(StoreOperator),
}

fn join<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|it| it.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Display for PointerKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PointerKind::Structured => f.write_str("structured"),
            PointerKind::Block => f.write_str("block"),
            PointerKind::SplitSideBySide => f.write_str("wrap_side_by_side"),
            PointerKind::SplitStacked => f.write_str("wrap_stacked"),
        }
    }
}

impl Display for Structured {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Structured::MakeTensorPtr(desc) => write!(
                f,
                "make_tensor_ptr {} to sizes: [{}], strides: [{}], offsets: [{}], shape: [{}], order: [{}] {{{}}}",
                desc.base,
                join(&desc.sizes),
                join(&desc.strides),
                join(&desc.offsets),
                join(&desc.shape),
                join(&desc.order),
                desc.kind
            ),
            Structured::Load(op) => {
                write!(f, "load {}", op.ptr)?;
                if op.has_mask() {
                    write!(f, ", mask_dims: [{}]", join(&op.mask_dims))?;
                }
                if let Some(other) = &op.other {
                    write!(f, ", other: {other}")?;
                }
                Ok(())
            }
            Structured::Store(op) => {
                write!(f, "store {}, {}", op.value, op.ptr)?;
                if op.has_mask() {
                    write!(f, ", mask_dims: [{}]", join(&op.mask_dims))?;
                }
                Ok(())
            }
        }
    }
}
