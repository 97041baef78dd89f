//! Index arithmetic that folds whenever its operands are known at compile time.

use tessel_ir::{Arithmetic, BinaryOperator, Scope, Type, Variable};

macro_rules! const_eval_index {
    ($op:ident, $method:ident) => {{
        match ($op.lhs.as_index(), $op.rhs.as_index()) {
            (Some(lhs), Some(rhs)) => lhs.$method(rhs).map(Variable::index),
            _ => None,
        }
    }};
}

/// Evaluate `op` at compile time, or simplify it to one of its operands.
///
/// Division and remainder by a constant zero, and anything that would overflow, are left to run
/// time.
pub fn try_fold(op: &Arithmetic) -> Option<Variable> {
    match op {
        Arithmetic::Add(op) => const_eval_index!(op, checked_add)
            .or_else(|| op.rhs.is_constant(0).then(|| op.lhs.clone()))
            .or_else(|| op.lhs.is_constant(0).then(|| op.rhs.clone())),
        Arithmetic::Sub(op) => const_eval_index!(op, checked_sub)
            .or_else(|| op.rhs.is_constant(0).then(|| op.lhs.clone())),
        Arithmetic::Mul(op) => const_eval_index!(op, checked_mul)
            .or_else(|| op.rhs.is_constant(1).then(|| op.lhs.clone()))
            .or_else(|| op.lhs.is_constant(1).then(|| op.rhs.clone())),
        Arithmetic::Div(op) => const_eval_index!(op, checked_div)
            .or_else(|| op.rhs.is_constant(1).then(|| op.lhs.clone())),
        Arithmetic::Rem(op) => const_eval_index!(op, checked_rem)
            .or_else(|| op.rhs.is_constant(1).then(|| Variable::index(0))),
        Arithmetic::Min(op) => match (op.lhs.as_index(), op.rhs.as_index()) {
            (Some(lhs), Some(rhs)) => Some(Variable::index(lhs.min(rhs))),
            _ => (op.lhs == op.rhs).then(|| op.lhs.clone()),
        },
        Arithmetic::Lower(op) => match (op.lhs.as_index(), op.rhs.as_index()) {
            (Some(lhs), Some(rhs)) => Some(Variable::bool(lhs < rhs)),
            _ => None,
        },
        Arithmetic::Or(op) => match (op.lhs.as_bool(), op.rhs.as_bool()) {
            (Some(true), _) | (_, Some(true)) => Some(Variable::bool(true)),
            (Some(false), _) => Some(op.rhs.clone()),
            (_, Some(false)) => Some(op.lhs.clone()),
            _ => None,
        },
    }
}

fn emit(scope: &mut Scope, op: Arithmetic, ty: Type) -> Variable {
    match try_fold(&op) {
        Some(folded) => folded,
        None => scope.register_local(op, ty),
    }
}

fn binop(lhs: &Variable, rhs: &Variable) -> BinaryOperator {
    BinaryOperator::new(lhs.clone(), rhs.clone())
}

/// `lhs + rhs`.
pub fn add(scope: &mut Scope, lhs: &Variable, rhs: &Variable) -> Variable {
    emit(scope, Arithmetic::Add(binop(lhs, rhs)), Type::Index)
}

/// `lhs - rhs`.
pub fn sub(scope: &mut Scope, lhs: &Variable, rhs: &Variable) -> Variable {
    emit(scope, Arithmetic::Sub(binop(lhs, rhs)), Type::Index)
}

/// Signed `lhs / rhs`, truncating toward zero.
pub fn div(scope: &mut Scope, lhs: &Variable, rhs: &Variable) -> Variable {
    emit(scope, Arithmetic::Div(binop(lhs, rhs)), Type::Index)
}

/// Signed `lhs % rhs`, with the sign of `lhs`.
pub fn rem(scope: &mut Scope, lhs: &Variable, rhs: &Variable) -> Variable {
    emit(scope, Arithmetic::Rem(binop(lhs, rhs)), Type::Index)
}

/// Signed minimum.
pub fn min(scope: &mut Scope, lhs: &Variable, rhs: &Variable) -> Variable {
    emit(scope, Arithmetic::Min(binop(lhs, rhs)), Type::Index)
}

/// Signed `lhs < rhs`.
pub fn lower(scope: &mut Scope, lhs: &Variable, rhs: &Variable) -> Variable {
    emit(scope, Arithmetic::Lower(binop(lhs, rhs)), Type::bool())
}

/// Boolean `lhs || rhs`.
pub fn or(scope: &mut Scope, lhs: &Variable, rhs: &Variable) -> Variable {
    emit(scope, Arithmetic::Or(binop(lhs, rhs)), Type::bool())
}

/// Sum all `terms`, starting from a constant zero.
pub fn sum(scope: &mut Scope, terms: &[Variable]) -> Variable {
    terms
        .iter()
        .fold(Variable::index(0), |acc, term| add(scope, &acc, term))
}
