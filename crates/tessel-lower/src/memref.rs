//! Builders for the memref and tensor instructions shared by the lowering components.

use tessel_ir::{
    Memory, MemRefType, ReinterpretCastOperator, Scope, StridedLayout, SubViewOperator,
    TensorType, Type, Variable,
};

use crate::{LoweringError, MemoryView};

fn zeros(rank: usize) -> Vec<Variable> {
    vec![Variable::index(0); rank]
}

fn ones(rank: usize) -> Vec<Variable> {
    vec![Variable::index(1); rank]
}

/// View `base` through `offset`, `shape` and `strides`.
pub(crate) fn reinterpret_cast(
    scope: &mut Scope,
    base: &Variable,
    offset: Variable,
    shape: Vec<Variable>,
    strides: Vec<Variable>,
    ty: MemRefType,
) -> MemoryView {
    let cast = ReinterpretCastOperator::new(
        base.clone(),
        offset.clone(),
        shape.clone(),
        strides.clone(),
    );
    let value = scope.register_local(Memory::ReinterpretCast(cast), ty);

    MemoryView {
        value,
        base: base.clone(),
        offset,
        shape,
        strides,
    }
}

/// The type of a unit-stride window at `offsets` of size `sizes` into a memref of type `source`.
fn subview_type(source: &MemRefType, offsets: &[Variable], sizes: &[Variable]) -> MemRefType {
    let strides = source.strides();
    let offset = source.offset().and_then(|base| {
        offsets
            .iter()
            .zip(&strides)
            .try_fold(base, |acc, (offset, stride)| {
                // A zero offset doesn't need the stride.
                match offset.as_index()? {
                    0 => Some(acc),
                    offset => acc.checked_add(offset.checked_mul((*stride)?)?),
                }
            })
    });
    MemRefType::strided(
        sizes.iter().map(Variable::as_index).collect(),
        source.elem,
        StridedLayout { offset, strides },
    )
}

/// A unit-stride window at `offsets` of size `sizes` into the memref `source`.
pub(crate) fn subview(
    scope: &mut Scope,
    source: &Variable,
    offsets: Vec<Variable>,
    sizes: Vec<Variable>,
) -> Result<Variable, LoweringError> {
    let Some(source_ty) = source.ty.as_memref() else {
        return Err(LoweringError::UnexpectedType {
            value: source.clone(),
            expected: "a memref",
        });
    };
    let ty = subview_type(source_ty, &offsets, &sizes);
    let strides = ones(sizes.len());
    let op = SubViewOperator::new(source.clone(), offsets, sizes, strides);

    Ok(scope.register_local(Memory::SubView(op), ty))
}

/// The leading `sizes` corner of the memref `source`.
pub(crate) fn corner(
    scope: &mut Scope,
    source: &Variable,
    sizes: Vec<Variable>,
) -> Result<Variable, LoweringError> {
    subview(scope, source, zeros(sizes.len()), sizes)
}

/// The leading `sizes` corner of the tensor `source`.
pub(crate) fn extract_slice(
    scope: &mut Scope,
    source: &Variable,
    sizes: Vec<Variable>,
) -> Result<Variable, LoweringError> {
    let Some(source_ty) = source.ty.as_tensor() else {
        return Err(LoweringError::UnexpectedType {
            value: source.clone(),
            expected: "a tensor",
        });
    };
    let shape = sizes
        .iter()
        .map(|size| size.as_index().unwrap_or(TensorType::DYNAMIC))
        .collect();
    let ty = Type::Tensor(TensorType::new(shape, source_ty.elem));
    let rank = sizes.len();
    let op = SubViewOperator::new(source.clone(), zeros(rank), sizes, ones(rank));

    Ok(scope.register_local(Memory::ExtractSlice(op), ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tessel_ir::{ElemType, FloatKind};

    #[test]
    fn subview_of_an_allocation_keeps_static_strides() {
        let mut scope = Scope::root();
        let alloc = scope.register_local(
            Memory::Alloc(MemRefType::contiguous(&[4, 6], ElemType::Float(FloatKind::F32))),
            MemRefType::contiguous(&[4, 6], ElemType::Float(FloatKind::F32)),
        );
        let cols = Variable::global(0, Type::Index);
        let window = subview(
            &mut scope,
            &alloc,
            vec![Variable::index(1), Variable::index(2)],
            vec![Variable::index(3), cols],
        )
        .unwrap();

        assert_eq!(
            window.ty.to_string(),
            "memref<3x?xf32, strided<[6, 1], offset: 8>>"
        );
    }

    #[test]
    fn dynamic_offsets_make_the_offset_dynamic() {
        let mut scope = Scope::root();
        let elem = ElemType::Float(FloatKind::F32);
        let alloc = scope.register_local(
            Memory::Alloc(MemRefType::contiguous(&[4, 6], elem)),
            MemRefType::contiguous(&[4, 6], elem),
        );
        let row = Variable::global(0, Type::Index);
        let window = subview(
            &mut scope,
            &alloc,
            vec![row, Variable::index(0)],
            vec![Variable::index(1), Variable::index(6)],
        )
        .unwrap();

        assert_eq!(
            window.ty.to_string(),
            "memref<1x6xf32, strided<[6, 1], offset: ?>>"
        );
    }

    #[test]
    fn slices_only_apply_to_tensors() {
        let mut scope = Scope::root();
        let not_a_tensor = Variable::global(0, Type::Index);
        let err = extract_slice(&mut scope, &not_a_tensor, vec![Variable::index(1)]).unwrap_err();

        assert!(matches!(err, LoweringError::UnexpectedType { .. }));
        assert!(scope.instructions.is_empty());
    }
}
