use core::fmt::Display;

use derive_more::From;
use derive_new::new;

use crate::{MemRefType, Scope, Structured, Variable};

/// All operations that can be used in the IR.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, From)]
#[allow(missing_docs)]
pub enum Operation {
    Arithmetic(Arithmetic),
    Memory(Memory),
    Branch(Branch),
    Assert(AssertOperator),
    /// Operations on structured pointers. They only exist before lowering.
    Structured(Structured),
}

/// An instruction that contains a right hand side [`Operation`] and an optional out variable.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub out: Option<Variable>,
    pub operation: Operation,
}

impl Instruction {
    pub fn new(operation: impl Into<Operation>, out: Variable) -> Self {
        Instruction {
            out: Some(out),
            operation: operation.into(),
        }
    }

    /// An instruction that only has side effects.
    pub fn no_out(operation: impl Into<Operation>) -> Self {
        Instruction {
            out: None,
            operation: operation.into(),
        }
    }

    #[track_caller]
    pub fn out(&self) -> Variable {
        self.out.clone().expect("instruction has no output")
    }
}

/// Index and boolean arithmetic. Integer division and remainder are signed and round toward zero.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Arithmetic {
    Add(BinaryOperator),
    Sub(BinaryOperator),
    Mul(BinaryOperator),
    Div(BinaryOperator),
    Rem(BinaryOperator),
    Min(BinaryOperator),
    /// Signed `lhs < rhs`
    Lower(BinaryOperator),
    Or(BinaryOperator),
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(new, Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct BinaryOperator {
    pub lhs: Variable,
    pub rhs: Variable,
}

/// Operations on buffers, memrefs and tensors.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Memory {
    /// Allocate a fresh dense buffer of the out variable's type.
    Alloc(MemRefType),
    ReinterpretCast(ReinterpretCastOperator),
    SubView(SubViewOperator),
    Copy(CopyOperator),
    Fill(FillOperator),
    ToTensor(ToTensorOperator),
    ExtractSlice(SubViewOperator),
    MaterializeInDestination(MaterializeOperator),
}

/// View the linear `source` buffer through an explicit offset, sizes and strides.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(new, Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct ReinterpretCastOperator {
    pub source: Variable,
    pub offset: Variable,
    pub sizes: Vec<Variable>,
    pub strides: Vec<Variable>,
}

/// A rectangular window of `source`, in the coordinates of `source`. Also used for tensor slices.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(new, Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct SubViewOperator {
    pub source: Variable,
    pub offsets: Vec<Variable>,
    pub sizes: Vec<Variable>,
    pub strides: Vec<Variable>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(new, Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct CopyOperator {
    pub source: Variable,
    pub target: Variable,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(new, Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct FillOperator {
    pub value: Variable,
    pub target: Variable,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(new, Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct ToTensorOperator {
    pub source: Variable,
    pub restrict: bool,
    pub writable: bool,
}

/// Write a whole tensor into a memref of the same shape.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(new, Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct MaterializeOperator {
    pub source: Variable,
    pub dest: Variable,
    pub writable: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Branch {
    /// An if statement.
    If(Box<If>),
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(new, Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct If {
    pub cond: Variable,
    pub scope: Scope,
}

/// Abort execution with `message` when `cond` is false.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(new, Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct AssertOperator {
    pub cond: Variable,
    pub message: String,
}

fn join(vars: &[Variable]) -> String {
    vars.iter()
        .map(|it| it.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Display for Instruction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.out {
            Some(out) => write!(f, "{out} = {} : {}", self.operation, out.ty),
            None => write!(f, "{}", self.operation),
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Operation::Arithmetic(op) => write!(f, "{op}"),
            Operation::Memory(op) => write!(f, "{op}"),
            Operation::Branch(Branch::If(op)) => {
                writeln!(f, "if {} {{", op.cond)?;
                for inst in op.scope.instructions.iter() {
                    writeln!(f, "    {inst}")?;
                }
                f.write_str("}")
            }
            Operation::Assert(op) => write!(f, "assert({}, {:?})", op.cond, op.message),
            Operation::Structured(op) => write!(f, "{op}"),
        }
    }
}

impl Display for Arithmetic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Arithmetic::Add(op) => write!(f, "{} + {}", op.lhs, op.rhs),
            Arithmetic::Sub(op) => write!(f, "{} - {}", op.lhs, op.rhs),
            Arithmetic::Mul(op) => write!(f, "{} * {}", op.lhs, op.rhs),
            Arithmetic::Div(op) => write!(f, "{} / {}", op.lhs, op.rhs),
            Arithmetic::Rem(op) => write!(f, "{} % {}", op.lhs, op.rhs),
            Arithmetic::Min(op) => write!(f, "min({}, {})", op.lhs, op.rhs),
            Arithmetic::Lower(op) => write!(f, "{} < {}", op.lhs, op.rhs),
            Arithmetic::Or(op) => write!(f, "{} || {}", op.lhs, op.rhs),
        }
    }
}

impl Display for Memory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Memory::Alloc(ty) => write!(f, "alloc() : {ty}"),
            Memory::ReinterpretCast(op) => write!(
                f,
                "reinterpret_cast {} to offset: [{}], sizes: [{}], strides: [{}]",
                op.source,
                op.offset,
                join(&op.sizes),
                join(&op.strides)
            ),
            Memory::SubView(op) => write!(
                f,
                "subview {}[{}] [{}] [{}]",
                op.source,
                join(&op.offsets),
                join(&op.sizes),
                join(&op.strides)
            ),
            Memory::ExtractSlice(op) => write!(
                f,
                "extract_slice {}[{}] [{}] [{}]",
                op.source,
                join(&op.offsets),
                join(&op.sizes),
                join(&op.strides)
            ),
            Memory::Copy(op) => write!(f, "copy {} -> {}", op.source, op.target),
            Memory::Fill(op) => write!(f, "fill {} -> {}", op.value, op.target),
            Memory::ToTensor(op) => {
                write!(f, "to_tensor {}", op.source)?;
                if op.restrict {
                    f.write_str(" restrict")?;
                }
                if op.writable {
                    f.write_str(" writable")?;
                }
                Ok(())
            }
            Memory::MaterializeInDestination(op) => {
                write!(f, "materialize_in_destination {} in {}", op.source, op.dest)?;
                if op.writable {
                    f.write_str(" writable")?;
                }
                Ok(())
            }
        }
    }
}
