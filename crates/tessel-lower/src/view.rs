use tessel_ir::{LoadOperator, MemRefType, PointerKind, StoreOperator, TensorType, Variable};

use crate::LoweringError;

/// A concrete, non-wrapping strided view into a buffer.
///
/// `value` is the memref produced by the reinterpret cast; the other fields are the operands it
/// was built from, kept around so consumers can reason about extents without re-deriving them.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryView {
    pub value: Variable,
    pub base: Variable,
    pub offset: Variable,
    pub shape: Vec<Variable>,
    pub strides: Vec<Variable>,
}

impl MemoryView {
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// The memref type of the view.
    pub fn ty(&self) -> Option<&MemRefType> {
        self.value.ty.as_memref()
    }
}

/// The axis along which a wraparound pointer was split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SplitKind {
    /// Wraparound along the columns: the second view continues to the right of the first.
    SideBySide,
    /// Wraparound along the rows: the second view continues below the first.
    Stacked,
}

impl SplitKind {
    /// The split a pointer of `kind` needs, `None` for pointers that don't wrap around.
    pub fn of(kind: PointerKind) -> Option<Self> {
        match kind {
            PointerKind::SplitSideBySide => Some(SplitKind::SideBySide),
            PointerKind::SplitStacked => Some(SplitKind::Stacked),
            PointerKind::Structured | PointerKind::Block => None,
        }
    }

    pub fn pointer_kind(&self) -> PointerKind {
        match self {
            SplitKind::SideBySide => PointerKind::SplitSideBySide,
            SplitKind::Stacked => PointerKind::SplitStacked,
        }
    }

    /// The axis whose extent is shared between the two views.
    pub fn axis(&self) -> usize {
        match self {
            SplitKind::SideBySide => 1,
            SplitKind::Stacked => 0,
        }
    }
}

/// The two views a wraparound pointer is split into. Their extents along [`SplitKind::axis`] sum
/// to the tile size along that axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitViewPair {
    pub first: MemoryView,
    pub second: MemoryView,
    pub kind: SplitKind,
}

/// The result of lowering a structured pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum Materialized {
    View(MemoryView),
    Split(SplitViewPair),
}

impl Materialized {
    pub fn rank(&self) -> usize {
        match self {
            Materialized::View(view) => view.rank(),
            Materialized::Split(pair) => pair.first.rank(),
        }
    }

    /// Check the extents known at compile time against the `tile` moved through the pointer.
    /// Extents along the split axis of a split are only known to sum up to the tile at run time.
    pub fn check_extents(
        &self,
        ptr: &Variable,
        what: &'static str,
        tile: &[i64],
    ) -> Result<(), LoweringError> {
        let (shape, split_axis) = match self {
            Materialized::View(view) => (&view.shape, None),
            Materialized::Split(pair) => (&pair.first.shape, Some(pair.kind.axis())),
        };

        let mismatch = shape
            .iter()
            .zip(tile)
            .enumerate()
            .filter(|(axis, _)| Some(*axis) != split_axis)
            .any(|(_, (dim, extent))| dim.as_index().is_some_and(|dim| dim != *extent));
        if mismatch {
            return Err(LoweringError::ShapeMismatch {
                ptr: ptr.clone(),
                what,
                expected: tile.to_vec(),
                actual: shape
                    .iter()
                    .map(|dim| dim.as_index().unwrap_or(TensorType::DYNAMIC))
                    .collect(),
            });
        }
        Ok(())
    }
}

/// A run time bound on the extents of a tile, used for boundary tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedRegion {
    pub dims: Vec<Variable>,
}

impl MaskedRegion {
    fn new(ptr: &Variable, dims: &[Variable], rank: usize) -> Result<Option<Self>, LoweringError> {
        if dims.is_empty() {
            return Ok(None);
        }
        if dims.len() != rank {
            return Err(LoweringError::RankMismatch {
                ptr: ptr.clone(),
                what: "mask_dims",
                expected: rank,
                actual: dims.len(),
            });
        }
        Ok(Some(Self {
            dims: dims.to_vec(),
        }))
    }

    /// The masked region of a load of a `rank`-dimensional tile, if it has one.
    pub fn of_load(op: &LoadOperator, rank: usize) -> Result<Option<Self>, LoweringError> {
        Self::new(&op.ptr, &op.mask_dims, rank)
    }

    /// The masked region of a store of a `rank`-dimensional tile, if it has one.
    pub fn of_store(op: &StoreOperator, rank: usize) -> Result<Option<Self>, LoweringError> {
        Self::new(&op.ptr, &op.mask_dims, rank)
    }
}
