use tessel_ir::{
    ElemType, MemRefType, PointerDescriptor, PointerKind, Scope, StridedLayout, Type, Variable,
};

use crate::{LoweringError, MemoryView, arith, memref::reinterpret_cast};

/// Lowers a pointer that doesn't wrap around to a single strided view of its buffer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ViewMaterializer;

impl ViewMaterializer {
    /// Emit the view addressed by `desc` into `scope`.
    ///
    /// The view has the tile shape of the pointer type. Its offset and strides are static in the
    /// resulting memref type whenever they're known at compile time.
    pub fn materialize(
        &self,
        scope: &mut Scope,
        ptr: &Variable,
        desc: &PointerDescriptor,
    ) -> Result<MemoryView, LoweringError> {
        let elem = check_descriptor(ptr, desc)?;
        let tile_shape = desc.ty.tile_shape();

        let strides = normalize_strides(&desc.sizes, &desc.strides);
        let offset = arith::sum(scope, &desc.offsets);
        let shape = tile_shape.iter().copied().map(Variable::index).collect();

        let ty = MemRefType::strided(
            tile_shape.iter().copied().map(Some).collect(),
            elem,
            StridedLayout {
                offset: offset.as_index(),
                strides: strides.iter().map(Variable::as_index).collect(),
            },
        );

        Ok(reinterpret_cast(scope, &desc.base, offset, shape, strides, ty))
    }
}

/// Replace the stride of every size-1 dimension whose stride is a constant zero with the
/// contiguous stride of that dimension, the product of the sizes of all more minor dimensions.
///
/// The dimension only ever contributes its first element, so addressing is unchanged.
pub fn normalize_strides(sizes: &[i64], strides: &[Variable]) -> Vec<Variable> {
    let mut normalized = strides.to_vec();
    let mut accumulate = 1;

    for (size, stride) in sizes.iter().zip(normalized.iter_mut()).rev() {
        if *size == 1 && stride.is_constant(0) {
            *stride = Variable::index(accumulate);
        }
        accumulate *= size;
    }

    normalized
}

/// Validate the parts of a descriptor every lowering relies on, and return the element type it
/// points to.
pub(crate) fn check_descriptor(
    ptr: &Variable,
    desc: &PointerDescriptor,
) -> Result<ElemType, LoweringError> {
    let is_block = desc.kind == PointerKind::Block;
    if is_block != desc.ty.is_block() {
        return Err(LoweringError::KindTypeMismatch {
            ptr: ptr.clone(),
            kind: desc.kind,
            ty: desc.ty.to_string(),
        });
    }

    if !matches!(desc.base.ty, Type::Buffer(_)) {
        return Err(LoweringError::UnexpectedType {
            value: desc.base.clone(),
            expected: "the base buffer of a pointer",
        });
    }

    let rank = desc.rank();
    let lists = [
        ("tile shape", desc.ty.tile_shape().len()),
        ("strides", desc.strides.len()),
        ("offsets", desc.offsets.len()),
    ];
    // The logical shape is optional for pointers that don't wrap around.
    let shape = (!desc.shape.is_empty()).then_some(("shape", desc.shape.len()));

    for (what, actual) in lists.into_iter().chain(shape) {
        if actual != rank {
            return Err(LoweringError::RankMismatch {
                ptr: ptr.clone(),
                what,
                expected: rank,
                actual,
            });
        }
    }

    if desc.sizes != desc.ty.tile_shape() {
        return Err(LoweringError::ShapeMismatch {
            ptr: ptr.clone(),
            what: "sizes",
            expected: desc.ty.tile_shape().to_vec(),
            actual: desc.sizes.clone(),
        });
    }

    Ok(desc.ty.element_type())
}
