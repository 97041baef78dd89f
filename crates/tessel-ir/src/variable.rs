use core::{fmt::Display, hash::Hash};

use derive_more::From;
use float_ord::FloatOrd;

use crate::{ElemType, Type};

pub type Id = u32;

/// A typed value of the IR. Constants are variables too, which makes every operand a mixed
/// static/dynamic value: a constant is known at compile time, anything else only at run time.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct Variable {
    pub kind: VariableKind,
    pub ty: Type,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// An argument of the function being lowered, bound by the caller.
    Global(Id),
    /// A value defined by exactly one instruction.
    Local { id: Id },
    Constant(ConstantValue),
}

impl Variable {
    pub fn new(kind: VariableKind, ty: impl Into<Type>) -> Self {
        Self {
            kind,
            ty: ty.into(),
        }
    }

    pub fn global(id: Id, ty: impl Into<Type>) -> Self {
        Self::new(VariableKind::Global(id), ty)
    }

    pub fn constant(value: ConstantValue, ty: impl Into<Type>) -> Self {
        Self::new(VariableKind::Constant(value), ty)
    }

    /// A constant of type `index`.
    pub fn index(value: i64) -> Self {
        Self::constant(ConstantValue::Int(value), Type::Index)
    }

    /// A constant boolean.
    pub fn bool(value: bool) -> Self {
        Self::constant(ConstantValue::Bool(value), Type::bool())
    }

    /// A constant of the given element type, converting the value if needed.
    pub fn scalar(value: impl Into<ConstantValue>, elem: ElemType) -> Self {
        Self::constant(value.into().cast_to(elem), Type::Scalar(elem))
    }

    pub fn as_const(&self) -> Option<ConstantValue> {
        match self.kind {
            VariableKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// The value of a constant integer, `None` for anything only known at run time.
    pub fn as_index(&self) -> Option<i64> {
        match self.kind {
            VariableKind::Constant(ConstantValue::Int(value)) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            VariableKind::Constant(ConstantValue::Bool(value)) => Some(value),
            _ => None,
        }
    }

    /// The id of a local, `None` for globals and constants.
    pub fn local_id(&self) -> Option<Id> {
        match self.kind {
            VariableKind::Local { id } => Some(id),
            _ => None,
        }
    }

    /// Determines if the value is a constant with the specified value
    pub fn is_constant(&self, value: i64) -> bool {
        self.as_index() == Some(value)
    }

    pub fn is_const(&self) -> bool {
        matches!(self.kind, VariableKind::Constant(_))
    }
}

/// Scalars are stored with the highest precision available.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, From)]
#[allow(missing_docs, clippy::derive_ord_xor_partial_ord)]
pub enum ConstantValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Ord for ConstantValue {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        // `f64` isn't `Ord`, everything else only compares discriminants or ordered payloads.
        match (self, other) {
            (ConstantValue::Float(this), ConstantValue::Float(other)) => {
                FloatOrd(*this).cmp(&FloatOrd(*other))
            }
            _ => self
                .partial_cmp(other)
                .unwrap_or(core::cmp::Ordering::Equal),
        }
    }
}

impl Eq for ConstantValue {}

impl Hash for ConstantValue {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            ConstantValue::Int(value) => value.hash(state),
            ConstantValue::Float(value) => FloatOrd(*value).hash(state),
            ConstantValue::Bool(value) => value.hash(state),
        }
    }
}

impl ConstantValue {
    /// The zero value of an element type.
    pub fn zero(elem: ElemType) -> Self {
        match elem {
            ElemType::Float(_) => ConstantValue::Float(0.0),
            ElemType::Int(_) => ConstantValue::Int(0),
            ElemType::Bool => ConstantValue::Bool(false),
        }
    }

    /// Convert the value to the representation used by `elem`.
    pub fn cast_to(&self, elem: ElemType) -> ConstantValue {
        match (*self, elem) {
            (ConstantValue::Int(val), ElemType::Float(_)) => ConstantValue::Float(val as f64),
            (ConstantValue::Int(val), ElemType::Bool) => ConstantValue::Bool(val != 0),
            (ConstantValue::Float(val), ElemType::Int(_)) => ConstantValue::Int(val as i64),
            (ConstantValue::Float(val), ElemType::Bool) => ConstantValue::Bool(val != 0.0),
            (ConstantValue::Bool(val), ElemType::Int(_)) => ConstantValue::Int(val as i64),
            (ConstantValue::Bool(val), ElemType::Float(_)) => {
                ConstantValue::Float(val as u32 as f64)
            }
            (value, _) => value,
        }
    }

    /// Returns the value as an `i64`. Floats are truncated.
    pub fn as_i64(&self) -> i64 {
        match self {
            ConstantValue::Int(val) => *val,
            ConstantValue::Float(val) => *val as i64,
            ConstantValue::Bool(val) => *val as i64,
        }
    }

    /// Returns the value as an `f64`.
    pub fn as_f64(&self) -> f64 {
        match self {
            ConstantValue::Int(val) => *val as f64,
            ConstantValue::Float(val) => *val,
            ConstantValue::Bool(val) => *val as u32 as f64,
        }
    }
}

impl Display for ConstantValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConstantValue::Int(val) => write!(f, "{val}"),
            ConstantValue::Float(val) => write!(f, "{val:?}"),
            ConstantValue::Bool(val) => write!(f, "{val}"),
        }
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind {
            VariableKind::Global(id) => write!(f, "%arg{id}"),
            VariableKind::Local { id } => write!(f, "%{id}"),
            VariableKind::Constant(value) => write!(f, "{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FloatKind;

    #[test]
    fn index_constants_are_static() {
        assert_eq!(Variable::index(7).as_index(), Some(7));
        assert!(Variable::index(0).is_constant(0));
        let dynamic = Variable::global(0, Type::Index);
        assert_eq!(dynamic.as_index(), None);
    }

    #[test]
    fn scalars_are_cast_to_their_element() {
        let value = Variable::scalar(3i64, ElemType::Float(FloatKind::F32));
        assert_eq!(value.as_const(), Some(ConstantValue::Float(3.0)));
        assert_eq!(value.to_string(), "3.0");
    }
}
