use tessel_ir::{AssertOperator, MemRefType, Operation, PointerDescriptor, Scope, Variable};

use crate::{
    LoweringError, SplitKind, SplitViewPair, arith, materialize::check_descriptor,
    memref::reinterpret_cast,
};

/// Lowers a pointer whose addressing wraps around in one axis to the two views on either side of
/// the wrap.
///
/// The target offset must not have wrapped already: it has to lie within the first period of the
/// modulus. Violations silently produce wrong views unless `check_offsets` is set, in which case
/// they abort at run time.
#[derive(Debug, Default, Clone, Copy)]
pub struct WraparoundSplitter {
    check_offsets: bool,
}

impl WraparoundSplitter {
    pub fn new(check_offsets: bool) -> Self {
        Self { check_offsets }
    }

    /// Emit the two views addressed by `desc`, split along `kind`.
    pub fn split(
        &self,
        scope: &mut Scope,
        ptr: &Variable,
        desc: &PointerDescriptor,
        kind: SplitKind,
    ) -> Result<SplitViewPair, LoweringError> {
        let elem = check_descriptor(ptr, desc)?;
        if desc.rank() != 2 {
            return Err(LoweringError::SplitRank {
                ptr: ptr.clone(),
                rank: desc.rank(),
            });
        }

        let (sentinel, modulus) = match kind {
            SplitKind::SideBySide => (0, 1),
            SplitKind::Stacked => (1, 0),
        };
        let valid_slots = desc.shape.len() == 2
            && desc.shape[sentinel].is_constant(0)
            && !desc.shape[modulus].is_constant(0);
        if !valid_slots {
            let shape = desc
                .shape
                .iter()
                .map(|dim| dim.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(LoweringError::SplitShapeMismatch {
                ptr: ptr.clone(),
                kind: desc.kind,
                sentinel,
                modulus,
                shape,
            });
        }

        let ty = MemRefType::fully_dynamic(2, elem);
        let target = arith::sum(scope, &desc.offsets);
        let rows = Variable::index(desc.sizes[0]);
        let cols = Variable::index(desc.sizes[1]);
        let modulus = &desc.shape[modulus];

        let (first, second) = match kind {
            SplitKind::SideBySide => {
                if self.check_offsets {
                    let non_negative = arith::lower(scope, &Variable::index(-1), &target);
                    assert_offset(scope, non_negative, "wraparound offset is negative");
                }

                let x = arith::rem(scope, &target, modulus);
                let row_start = arith::sub(scope, &target, &x);
                let next = arith::add(scope, &x, &cols);
                let clamped = arith::min(scope, &next, modulus);
                let d1 = arith::sub(scope, &clamped, &x);
                let d2 = arith::sub(scope, &cols, &d1);

                let strides = desc.strides.clone();
                let first = reinterpret_cast(
                    scope,
                    &desc.base,
                    target,
                    vec![rows.clone(), d1],
                    strides.clone(),
                    ty.clone(),
                );
                let second =
                    reinterpret_cast(scope, &desc.base, row_start, vec![rows, d2], strides, ty);
                (first, second)
            }
            SplitKind::Stacked => {
                let stride_row = &desc.strides[0];
                if stride_row.is_constant(0) {
                    return Err(LoweringError::ZeroRowStride { ptr: ptr.clone() });
                }

                if self.check_offsets {
                    let in_range = arith::lower(scope, &target, modulus);
                    assert_offset(
                        scope,
                        in_range,
                        "wraparound offset already wrapped past the row modulus",
                    );
                }

                let wrapped = arith::rem(scope, &target, stride_row);
                let clamped = arith::add(scope, modulus, &wrapped);
                let span = arith::sub(scope, &clamped, &target);
                // A tile that ends before the wrap is read whole by the first view.
                let until_wrap = arith::div(scope, &span, stride_row);
                let d1 = arith::min(scope, &until_wrap, &rows);
                let d2 = arith::sub(scope, &rows, &d1);

                let strides = desc.strides.clone();
                let first = reinterpret_cast(
                    scope,
                    &desc.base,
                    target,
                    vec![d1, cols.clone()],
                    strides.clone(),
                    ty.clone(),
                );
                let second =
                    reinterpret_cast(scope, &desc.base, wrapped, vec![d2, cols], strides, ty);
                (first, second)
            }
        };

        Ok(SplitViewPair {
            first,
            second,
            kind,
        })
    }
}

fn assert_offset(scope: &mut Scope, cond: Variable, message: &str) {
    if cond.as_bool() == Some(true) {
        return;
    }
    scope.register(Operation::Assert(AssertOperator::new(
        cond,
        message.to_string(),
    )));
}
