use tessel_ir::{PointerKind, Variable};
use thiserror::Error;

/// Errors returned when a structured pointer, load or store can't be lowered.
///
/// [`UnsupportedLayout`](LoweringError::UnsupportedLayout) is a limitation of the stage and is
/// reported to the user. Every other variant is a broken contract: the upstream pointer analysis
/// produced a descriptor that it should never have produced.
#[derive(Error, Clone, PartialEq)]
pub enum LoweringError {
    /// The dimension order of a pointer isn't strictly decreasing.
    #[error(
        "non-decreasing dimension order on tensor pointers is not yet supported\n  pointer: {ptr}\n  order: {order:?}"
    )]
    UnsupportedLayout {
        /// The pointer being lowered.
        ptr: Variable,
        /// The offending order.
        order: Vec<u32>,
    },

    /// The shape slots of a split pointer don't match its kind.
    #[error(
        "[Contract violation] {kind} pointer {ptr} expects the sentinel 0 in shape[{sentinel}] and the modulus in shape[{modulus}], got [{shape}]"
    )]
    SplitShapeMismatch {
        /// The pointer being lowered.
        ptr: Variable,
        /// The split kind carried by the pointer.
        kind: PointerKind,
        /// The slot expected to hold the sentinel.
        sentinel: usize,
        /// The slot expected to hold the modulus.
        modulus: usize,
        /// The shape of the pointer, printed.
        shape: String,
    },

    /// Only two dimensional pointers can wrap around.
    #[error("[Contract violation] wraparound pointer {ptr} must have rank 2, got rank {rank}")]
    SplitRank {
        /// The pointer being lowered.
        ptr: Variable,
        /// The rank of the pointer.
        rank: usize,
    },

    /// A stacked pointer needs a non-zero row stride to count wrapped rows.
    #[error("[Contract violation] stacked wraparound pointer {ptr} has a zero row stride")]
    ZeroRowStride {
        /// The pointer being lowered.
        ptr: Variable,
    },

    /// The pointer kind and the pointer type disagree on block-ness.
    #[error("[Contract violation] pointer {ptr} of kind {kind} has type {ty}")]
    KindTypeMismatch {
        /// The pointer being lowered.
        ptr: Variable,
        /// The kind carried by the descriptor.
        kind: PointerKind,
        /// The type carried by the descriptor, printed.
        ty: String,
    },

    /// The number of entries of a per-dimension list doesn't match the rank of the pointer.
    #[error("[Contract violation] {what} of {ptr} has {actual} entries, expected {expected}")]
    RankMismatch {
        /// The pointer or tile involved.
        ptr: Variable,
        /// Which list is malformed.
        what: &'static str,
        /// The expected number of entries.
        expected: usize,
        /// The actual number of entries.
        actual: usize,
    },

    /// Extents known at compile time disagree with the tile they describe.
    #[error("[Contract violation] {what} of {ptr} has extents {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        /// The pointer involved.
        ptr: Variable,
        /// Which extents disagree.
        what: &'static str,
        /// The extents of the tile.
        expected: Vec<i64>,
        /// The offending extents, dynamic ones as [`TensorType::DYNAMIC`](tessel_ir::TensorType::DYNAMIC).
        actual: Vec<i64>,
    },

    /// A fill value only makes sense for a masked load.
    #[error("[Contract violation] other value used in non-masked load of {ptr}")]
    FillWithoutMask {
        /// The pointer being loaded from.
        ptr: Variable,
    },

    /// Stores into wraparound views aren't supported.
    #[error("[Contract violation] store into wraparound pointer {ptr} ({kind}) is not supported")]
    SplitStore {
        /// The pointer being stored to.
        ptr: Variable,
        /// The split kind of the pointer.
        kind: PointerKind,
    },

    /// A load or store uses a pointer that wasn't materialized before it.
    #[error("[Contract violation] {ptr} is used before its pointer was materialized")]
    UnresolvedPointer {
        /// The pointer that couldn't be found.
        ptr: Variable,
    },

    /// A value has the wrong type for its position.
    #[error("[Contract violation] {value} is used as {expected}")]
    UnexpectedType {
        /// The malformed value.
        value: Variable,
        /// What it was expected to be.
        expected: &'static str,
    },
}

impl LoweringError {
    /// Whether the error comes from a malformed input rather than an unsupported layout.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, LoweringError::UnsupportedLayout { .. })
    }
}

impl core::fmt::Debug for LoweringError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}
