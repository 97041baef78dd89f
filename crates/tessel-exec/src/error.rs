use tessel_ir::Id;
use thiserror::Error;

/// Errors raised while running a program.
#[derive(Error, Clone, PartialEq)]
pub enum ExecError {
    /// An access landed outside of its view or its buffer.
    #[error("Out of bounds access at {position} in a container of {len} elements")]
    OutOfBounds {
        /// The offending position.
        position: i64,
        /// The number of elements of the container.
        len: usize,
    },

    /// Two containers that must have the same shape don't.
    #[error("Shape mismatch between {lhs:?} and {rhs:?}")]
    ShapeMismatch {
        /// The shape of the first container.
        lhs: Vec<i64>,
        /// The shape of the second container.
        rhs: Vec<i64>,
    },

    /// A negative extent was computed for a view.
    #[error("Invalid shape {shape:?}")]
    InvalidShape {
        /// The offending shape.
        shape: Vec<i64>,
    },

    /// A function argument wasn't bound before running.
    #[error("Argument %arg{0} is not bound")]
    UnboundGlobal(Id),

    /// A local was read before the instruction defining it ran.
    #[error("Local %{0} is used before being defined")]
    UndefinedLocal(Id),

    /// A value has the wrong kind for its position.
    #[error("{value} is used as {expected}")]
    TypeError {
        /// The offending value, printed.
        value: String,
        /// What it was expected to be.
        expected: &'static str,
    },

    #[error("Division by zero")]
    DivisionByZero,

    /// A division whose quotient doesn't fit an index, `i64::MIN / -1`.
    #[error("Index overflow dividing {lhs} by {rhs}")]
    Overflow {
        /// The dividend.
        lhs: i64,
        /// The divisor.
        rhs: i64,
    },

    /// The program still contains structured pointer operations.
    #[error("Structured operation must be lowered before running: {0}")]
    Unlowered(String),

    /// An assertion of the program didn't hold.
    #[error("Assertion failed: {0}")]
    AssertionFailed(String),
}

impl core::fmt::Debug for ExecError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}
