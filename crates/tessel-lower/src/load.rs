use tessel_ir::{
    Branch, CopyOperator, FillOperator, If, Instruction, LoadOperator, Memory, MemRefType,
    Operation, Scope, TensorType, ToTensorOperator, Type, Variable,
};

use crate::{
    LoweringError, MaskedRegion, Materialized, MemoryView, SplitKind, SplitViewPair, arith,
    memref::{corner, subview},
};

/// Lowers a load to a fresh buffer filled from the pointer's view(s), wrapped as a tensor.
#[derive(Debug, Default, Clone, Copy)]
pub struct Loader;

/// A memref together with its extents.
struct Block {
    value: Variable,
    shape: Vec<Variable>,
}

impl From<&MemoryView> for Block {
    fn from(view: &MemoryView) -> Self {
        Self {
            value: view.value.clone(),
            shape: view.shape.clone(),
        }
    }
}

impl Loader {
    /// Emit the load `op` from `source` into `scope`, defining `out`.
    pub fn load(
        &self,
        scope: &mut Scope,
        op: &LoadOperator,
        source: &Materialized,
        out: &Variable,
    ) -> Result<(), LoweringError> {
        let Some(tile) = out.ty.as_tensor().filter(|tile| tile.is_static()) else {
            return Err(LoweringError::UnexpectedType {
                value: out.clone(),
                expected: "a static tile",
            });
        };

        let rank = source.rank();
        if tile.rank() != rank {
            return Err(LoweringError::RankMismatch {
                ptr: op.ptr.clone(),
                what: "loaded tile",
                expected: rank,
                actual: tile.rank(),
            });
        }
        source.check_extents(&op.ptr, "loaded tile", &tile.shape)?;

        let mask = MaskedRegion::of_load(op, rank)?;
        if mask.is_none() && op.other.is_some() {
            return Err(LoweringError::FillWithoutMask {
                ptr: op.ptr.clone(),
            });
        }

        let alloc_ty = MemRefType::contiguous(&tile.shape, tile.elem);
        let alloc = scope.register_local(Memory::Alloc(alloc_ty.clone()), alloc_ty);

        if let (Some(mask), Some(other)) = (&mask, &op.other) {
            if other.ty != Type::Scalar(tile.elem) {
                return Err(LoweringError::UnexpectedType {
                    value: other.clone(),
                    expected: "a fill value of the tile element type",
                });
            }
            fill_boundary(scope, tile, mask, other, &alloc);
        }

        match (source, &mask) {
            (Materialized::View(view), None) => copy(scope, &view.value, &alloc),
            (Materialized::View(view), Some(mask)) => {
                let src = corner(scope, &view.value, mask.dims.clone())?;
                let dst = corner(scope, &alloc, mask.dims.clone())?;
                copy(scope, &src, &dst);
            }
            (Materialized::Split(pair), None) => {
                let (first, second) = ((&pair.first).into(), (&pair.second).into());
                copy_split(scope, pair.kind, first, second, &alloc)?;
            }
            (Materialized::Split(pair), Some(mask)) => {
                let (first, second) = clip_split(scope, pair, mask)?;
                copy_split(scope, pair.kind, first, second, &alloc)?;
            }
        }

        scope.register(Instruction::new(
            Memory::ToTensor(ToTensorOperator::new(alloc, true, true)),
            out.clone(),
        ));

        Ok(())
    }
}

/// Fill `alloc` with `other` when the mask leaves part of the tile uncovered.
fn fill_boundary(
    scope: &mut Scope,
    tile: &TensorType,
    mask: &MaskedRegion,
    other: &Variable,
    alloc: &Variable,
) {
    let mut reduced = Variable::bool(false);
    for (dim, extent) in mask.dims.iter().zip(&tile.shape) {
        let smaller = arith::lower(scope, dim, &Variable::index(*extent));
        reduced = arith::or(scope, &reduced, &smaller);
    }

    let fill = Operation::Memory(Memory::Fill(FillOperator::new(
        other.clone(),
        alloc.clone(),
    )));
    match reduced.as_bool() {
        Some(false) => {}
        Some(true) => scope.register(fill),
        None => {
            let mut body = scope.child();
            body.register(fill);
            scope.register(Operation::Branch(Branch::If(Box::new(If::new(
                reduced, body,
            )))));
        }
    }
}

/// Restrict both halves of a split to the masked region. The split axis is shared between the
/// halves, the other axis is taken from the mask as is.
fn clip_split(
    scope: &mut Scope,
    pair: &SplitViewPair,
    mask: &MaskedRegion,
) -> Result<(Block, Block), LoweringError> {
    let axis = pair.kind.axis();
    let first_extent = arith::min(scope, &pair.first.shape[axis], &mask.dims[axis]);
    let second_extent = arith::sub(scope, &mask.dims[axis], &first_extent);

    let mut first_shape = mask.dims.clone();
    first_shape[axis] = first_extent;
    let mut second_shape = mask.dims.clone();
    second_shape[axis] = second_extent;

    let first = corner(scope, &pair.first.value, first_shape.clone())?;
    let second = corner(scope, &pair.second.value, second_shape.clone())?;

    Ok((
        Block {
            value: first,
            shape: first_shape,
        },
        Block {
            value: second,
            shape: second_shape,
        },
    ))
}

/// Copy the two halves of a split next to each other into `alloc`: the second half starts where
/// the first one ends along the split axis.
fn copy_split(
    scope: &mut Scope,
    kind: SplitKind,
    first: Block,
    second: Block,
    alloc: &Variable,
) -> Result<(), LoweringError> {
    let axis = kind.axis();
    let mut second_offsets = vec![Variable::index(0); second.shape.len()];
    second_offsets[axis] = first.shape[axis].clone();

    let first_dst = corner(scope, alloc, first.shape)?;
    let second_dst = subview(scope, alloc, second_offsets, second.shape)?;

    copy(scope, &first.value, &first_dst);
    copy(scope, &second.value, &second_dst);

    Ok(())
}

fn copy(scope: &mut Scope, source: &Variable, target: &Variable) {
    scope.register(Operation::Memory(Memory::Copy(CopyOperator::new(
        source.clone(),
        target.clone(),
    ))));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tessel_ir::{ElemType, FloatKind};

    const F32: ElemType = ElemType::Float(FloatKind::F32);

    fn dynamic(id: u32) -> Variable {
        Variable::global(id, Type::Index)
    }

    fn view(scope: &Scope, shape: Vec<Variable>) -> MemoryView {
        let rank = shape.len();
        MemoryView {
            value: scope.create_local(MemRefType::fully_dynamic(rank, F32)),
            base: Variable::global(0, Type::Buffer(F32)),
            offset: Variable::index(0),
            strides: vec![Variable::index(1); rank],
            shape,
        }
    }

    fn tile_out(scope: &Scope, shape: Vec<i64>) -> Variable {
        scope.create_local(TensorType::new(shape, F32))
    }

    fn count(scope: &Scope, pred: impl Fn(&Operation) -> bool) -> usize {
        scope
            .instructions
            .iter()
            .filter(|inst| pred(&inst.operation))
            .count()
    }

    fn is_copy(op: &Operation) -> bool {
        matches!(op, Operation::Memory(Memory::Copy(_)))
    }

    #[test]
    fn unmasked_load_copies_the_whole_view() {
        let mut scope = Scope::root();
        let source = Materialized::View(view(&scope, vec![Variable::index(4); 2]));
        let out = tile_out(&scope, vec![4, 4]);
        let ptr = dynamic(9);
        let op = LoadOperator::new(ptr, vec![], None);

        Loader.load(&mut scope, &op, &source, &out).unwrap();

        assert_eq!(scope.instructions.len(), 3);
        assert_eq!(count(&scope, is_copy), 1);
        let last = scope.instructions.last().unwrap();
        assert_eq!(last.out.as_ref(), Some(&out));
        assert_eq!(
            last.operation.to_string(),
            format!("to_tensor {} restrict writable", scope.instructions[0].out())
        );
    }

    #[test]
    fn fill_without_mask_is_rejected() {
        let mut scope = Scope::root();
        let source = Materialized::View(view(&scope, vec![Variable::index(4); 2]));
        let out = tile_out(&scope, vec![4, 4]);
        let op = LoadOperator::new(dynamic(9), vec![], Some(Variable::scalar(0.0, F32)));

        let err = Loader.load(&mut scope, &op, &source, &out).unwrap_err();

        assert_eq!(err, LoweringError::FillWithoutMask { ptr: dynamic(9) });
    }

    #[test]
    fn static_full_mask_skips_the_fill() {
        let mut scope = Scope::root();
        let source = Materialized::View(view(&scope, vec![Variable::index(8); 2]));
        let out = tile_out(&scope, vec![8, 8]);
        let mask = vec![Variable::index(8), Variable::index(8)];
        let op = LoadOperator::new(dynamic(9), mask, Some(Variable::scalar(1.0, F32)));

        Loader.load(&mut scope, &op, &source, &out).unwrap();

        let fills = count(&scope, |op| {
            matches!(op, Operation::Memory(Memory::Fill(_)) | Operation::Branch(_))
        });
        assert_eq!(fills, 0);
    }

    #[test]
    fn static_partial_mask_fills_unconditionally() {
        let mut scope = Scope::root();
        let source = Materialized::View(view(&scope, vec![Variable::index(8); 2]));
        let out = tile_out(&scope, vec![8, 8]);
        let mask = vec![Variable::index(5), Variable::index(8)];
        let op = LoadOperator::new(dynamic(9), mask, Some(Variable::scalar(1.0, F32)));

        Loader.load(&mut scope, &op, &source, &out).unwrap();

        let fills = count(&scope, |op| matches!(op, Operation::Memory(Memory::Fill(_))));
        assert_eq!(fills, 1);
        assert_eq!(count(&scope, |op| matches!(op, Operation::Branch(_))), 0);
    }

    #[test]
    fn dynamic_mask_guards_the_fill() {
        let mut scope = Scope::root();
        let source = Materialized::View(view(&scope, vec![Variable::index(8); 2]));
        let out = tile_out(&scope, vec![8, 8]);
        let mask = vec![dynamic(1), Variable::index(8)];
        let op = LoadOperator::new(dynamic(9), mask, Some(Variable::scalar(1.0, F32)));

        Loader.load(&mut scope, &op, &source, &out).unwrap();

        let branch = scope
            .instructions
            .iter()
            .find_map(|inst| match &inst.operation {
                Operation::Branch(Branch::If(branch)) => Some(branch),
                _ => None,
            })
            .unwrap();
        assert_eq!(branch.scope.instructions.len(), 1);
        assert_eq!(branch.scope.depth, 1);
    }

    #[test]
    fn split_copies_place_the_second_half_after_the_first() {
        let mut scope = Scope::root();
        let d1 = dynamic(1);
        let d2 = dynamic(2);
        let pair = SplitViewPair {
            first: view(&scope, vec![Variable::index(2), d1.clone()]),
            second: view(&scope, vec![Variable::index(2), d2]),
            kind: SplitKind::SideBySide,
        };
        let out = tile_out(&scope, vec![2, 4]);
        let op = LoadOperator::new(dynamic(9), vec![], None);

        Loader
            .load(&mut scope, &op, &Materialized::Split(pair), &out)
            .unwrap();

        let second_dst = scope
            .instructions
            .iter()
            .filter_map(|inst| match &inst.operation {
                Operation::Memory(Memory::SubView(op)) => Some(op),
                _ => None,
            })
            .nth(1)
            .unwrap();
        assert_eq!(second_dst.offsets, vec![Variable::index(0), d1]);
        assert_eq!(count(&scope, is_copy), 2);
    }

    #[test]
    fn masked_split_clips_along_the_split_axis() {
        let mut scope = Scope::root();
        let pair = SplitViewPair {
            first: view(&scope, vec![Variable::index(3), Variable::index(2)]),
            second: view(&scope, vec![Variable::index(1), Variable::index(2)]),
            kind: SplitKind::Stacked,
        };
        let out = tile_out(&scope, vec![4, 2]);
        let mask = vec![Variable::index(2), Variable::index(2)];
        let op = LoadOperator::new(dynamic(9), mask, None);

        Loader
            .load(&mut scope, &op, &Materialized::Split(pair), &out)
            .unwrap();

        let sizes = scope
            .instructions
            .iter()
            .filter_map(|inst| match &inst.operation {
                Operation::Memory(Memory::SubView(op)) => {
                    Some(op.sizes.iter().map(|it| it.as_index().unwrap()).collect())
                }
                _ => None,
            })
            .collect::<Vec<Vec<i64>>>();
        // Clipped halves, then their destinations.
        assert_eq!(sizes, vec![vec![2, 2], vec![0, 2], vec![2, 2], vec![0, 2]]);
    }

    #[test]
    fn static_view_extents_must_match_the_tile() {
        let mut scope = Scope::root();
        let source = Materialized::View(view(&scope, vec![Variable::index(4); 2]));
        let out = tile_out(&scope, vec![4, 8]);
        let op = LoadOperator::new(dynamic(9), vec![], None);

        let err = Loader.load(&mut scope, &op, &source, &out).unwrap_err();

        assert_eq!(
            err,
            LoweringError::ShapeMismatch {
                ptr: dynamic(9),
                what: "loaded tile",
                expected: vec![4, 8],
                actual: vec![4, 4],
            }
        );
        assert!(scope.instructions.is_empty());
    }

    #[test]
    fn split_extents_are_only_checked_across_the_split() {
        let mut scope = Scope::root();
        let pair = |scope: &Scope, rows: i64| SplitViewPair {
            first: view(scope, vec![Variable::index(3), Variable::index(rows)]),
            second: view(scope, vec![Variable::index(1), Variable::index(rows)]),
            kind: SplitKind::Stacked,
        };
        let out = tile_out(&scope, vec![4, 2]);
        let op = LoadOperator::new(dynamic(9), vec![], None);

        let source = Materialized::Split(pair(&scope, 2));
        Loader.load(&mut scope, &op, &source, &out).unwrap();

        let source = Materialized::Split(pair(&scope, 3));
        let err = Loader.load(&mut scope, &op, &source, &out).unwrap_err();
        assert!(matches!(err, LoweringError::ShapeMismatch { .. }));
    }

    #[test]
    fn mask_rank_must_match_the_tile() {
        let mut scope = Scope::root();
        let source = Materialized::View(view(&scope, vec![Variable::index(8); 2]));
        let out = tile_out(&scope, vec![8, 8]);
        let op = LoadOperator::new(dynamic(9), vec![dynamic(1)], None);

        let err = Loader.load(&mut scope, &op, &source, &out).unwrap_err();

        assert!(matches!(
            err,
            LoweringError::RankMismatch {
                what: "mask_dims",
                ..
            }
        ));
    }
}
