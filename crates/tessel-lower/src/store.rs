use tessel_ir::{Memory, MaterializeOperator, Operation, Scope, StoreOperator};

use crate::{
    LoweringError, MaskedRegion, Materialized,
    memref::{corner, extract_slice},
};

/// Lowers a store to a write of the tile into the pointer's view.
///
/// Stores through pointers that wrap around are rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct Storer;

impl Storer {
    pub fn store(
        &self,
        scope: &mut Scope,
        op: &StoreOperator,
        dest: &Materialized,
    ) -> Result<(), LoweringError> {
        let view = match dest {
            Materialized::View(view) => view,
            Materialized::Split(pair) => {
                return Err(LoweringError::SplitStore {
                    ptr: op.ptr.clone(),
                    kind: pair.kind.pointer_kind(),
                });
            }
        };

        let Some(tile) = op.value.ty.as_tensor() else {
            return Err(LoweringError::UnexpectedType {
                value: op.value.clone(),
                expected: "a tile",
            });
        };
        if tile.rank() != view.rank() {
            return Err(LoweringError::RankMismatch {
                ptr: op.ptr.clone(),
                what: "stored tile",
                expected: view.rank(),
                actual: tile.rank(),
            });
        }
        dest.check_extents(&op.ptr, "stored tile", &tile.shape)?;

        let (source, target) = match MaskedRegion::of_store(op, view.rank())? {
            Some(mask) => (
                extract_slice(scope, &op.value, mask.dims.clone())?,
                corner(scope, &view.value, mask.dims)?,
            ),
            None => (op.value.clone(), view.value.clone()),
        };

        scope.register(Operation::Memory(Memory::MaterializeInDestination(
            MaterializeOperator::new(source, target, true),
        )));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryView, SplitKind, SplitViewPair};
    use pretty_assertions::assert_eq;
    use tessel_ir::{
        ElemType, Instruction, IntKind, MemRefType, PointerKind, TensorType, Type, Variable,
    };

    const I8: ElemType = ElemType::Int(IntKind::I8);

    fn view(scope: &Scope) -> MemoryView {
        MemoryView {
            value: scope.create_local(MemRefType::fully_dynamic(2, I8)),
            base: Variable::global(0, Type::Buffer(I8)),
            offset: Variable::index(0),
            shape: vec![Variable::index(4); 2],
            strides: vec![Variable::index(4), Variable::index(1)],
        }
    }

    fn tile() -> Variable {
        Variable::global(1, TensorType::new(vec![4, 4], I8))
    }

    #[test]
    fn unmasked_store_writes_the_whole_tile() {
        let mut scope = Scope::root();
        let view = view(&scope);
        let op = StoreOperator::new(Variable::global(2, Type::Index), tile(), vec![]);

        Storer
            .store(&mut scope, &op, &Materialized::View(view.clone()))
            .unwrap();

        assert_eq!(
            scope.instructions,
            vec![Instruction::no_out(Memory::MaterializeInDestination(
                MaterializeOperator::new(tile(), view.value, true),
            ))]
        );
    }

    #[test]
    fn masked_store_writes_matching_corners() {
        let mut scope = Scope::root();
        let view = view(&scope);
        let rows = Variable::global(3, Type::Index);
        let mask = vec![rows, Variable::index(4)];
        let op = StoreOperator::new(Variable::global(2, Type::Index), tile(), mask);

        Storer
            .store(&mut scope, &op, &Materialized::View(view))
            .unwrap();

        let printed = scope
            .instructions
            .iter()
            .map(|inst| inst.to_string())
            .collect::<Vec<_>>();
        assert_eq!(printed.len(), 3);
        assert!(printed[0].contains("extract_slice %arg1[0, 0] [%arg3, 4] [1, 1]"));
        assert!(printed[0].ends_with(": tensor<?x4xi8>"));
        assert!(printed[1].contains("subview"));
        assert!(printed[2].ends_with("writable"));
    }

    #[test]
    fn stored_tile_must_fit_the_view() {
        let mut scope = Scope::root();
        let view = view(&scope);
        let value = Variable::global(1, TensorType::new(vec![4, 2], I8));
        let op = StoreOperator::new(Variable::global(2, Type::Index), value, vec![]);

        let err = Storer
            .store(&mut scope, &op, &Materialized::View(view))
            .unwrap_err();

        assert!(matches!(
            err,
            LoweringError::ShapeMismatch {
                what: "stored tile",
                ..
            }
        ));
    }

    #[test]
    fn split_destinations_are_rejected() {
        let mut scope = Scope::root();
        let pair = SplitViewPair {
            first: view(&scope),
            second: view(&scope),
            kind: SplitKind::Stacked,
        };
        let ptr = Variable::global(2, Type::Index);
        let op = StoreOperator::new(ptr.clone(), tile(), vec![]);

        let err = Storer
            .store(&mut scope, &op, &Materialized::Split(pair))
            .unwrap_err();

        assert_eq!(
            err,
            LoweringError::SplitStore {
                ptr,
                kind: PointerKind::SplitStacked,
            }
        );
        assert!(scope.instructions.is_empty());
    }
}
