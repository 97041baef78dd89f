use hashbrown::HashMap;
use tessel_ir::{
    Arithmetic, Branch, ConstantValue, Id, Instruction, Memory, Operation, Scope, Type, Variable,
    VariableKind,
};

use crate::{Buffer, Dims, ExecError, MemRef, Tensor, for_each_index};

/// A run time value.
#[derive(Debug, Clone)]
pub enum Value {
    Index(i64),
    Scalar(ConstantValue),
    Buffer(Buffer),
    MemRef(MemRef),
    Tensor(Tensor),
}

impl Value {
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Tensor(tensor) => Some(tensor),
            _ => None,
        }
    }
}

/// Runs lowered programs on concrete buffers.
///
/// Arguments of the program are bound with [`Interpreter::bind`] before [running](Interpreter::run)
/// it. Locals are kept afterwards and can be read back with [`Interpreter::value`].
#[derive(Debug, Default)]
pub struct Interpreter {
    globals: HashMap<Id, Value>,
    locals: HashMap<Id, Value>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the argument `%arg{id}` to `value`.
    pub fn bind(&mut self, id: Id, value: Value) -> &mut Self {
        self.globals.insert(id, value);
        self
    }

    pub fn run(&mut self, scope: &Scope) -> Result<(), ExecError> {
        for inst in scope.instructions.iter() {
            self.execute(inst)?;
        }
        Ok(())
    }

    /// The current value of `var`.
    pub fn value(&self, var: &Variable) -> Result<Value, ExecError> {
        match var.kind {
            VariableKind::Constant(value) => Ok(match var.ty {
                Type::Index => Value::Index(value.as_i64()),
                _ => Value::Scalar(value),
            }),
            VariableKind::Global(id) => self
                .globals
                .get(&id)
                .cloned()
                .ok_or(ExecError::UnboundGlobal(id)),
            VariableKind::Local { id } => self
                .locals
                .get(&id)
                .cloned()
                .ok_or(ExecError::UndefinedLocal(id)),
        }
    }

    fn type_error(var: &Variable, expected: &'static str) -> ExecError {
        ExecError::TypeError {
            value: var.to_string(),
            expected,
        }
    }

    fn index(&self, var: &Variable) -> Result<i64, ExecError> {
        match self.value(var)? {
            Value::Index(value) => Ok(value),
            _ => Err(Self::type_error(var, "an index")),
        }
    }

    fn indices(&self, vars: &[Variable]) -> Result<Dims, ExecError> {
        vars.iter().map(|var| self.index(var)).collect()
    }

    fn bool(&self, var: &Variable) -> Result<bool, ExecError> {
        match self.value(var)? {
            Value::Scalar(ConstantValue::Bool(value)) => Ok(value),
            _ => Err(Self::type_error(var, "a boolean")),
        }
    }

    fn scalar(&self, var: &Variable) -> Result<ConstantValue, ExecError> {
        match self.value(var)? {
            Value::Scalar(value) => Ok(value),
            _ => Err(Self::type_error(var, "a scalar")),
        }
    }

    fn memref(&self, var: &Variable) -> Result<MemRef, ExecError> {
        match self.value(var)? {
            Value::MemRef(memref) => Ok(memref),
            _ => Err(Self::type_error(var, "a memref")),
        }
    }

    fn tensor(&self, var: &Variable) -> Result<Tensor, ExecError> {
        match self.value(var)? {
            Value::Tensor(tensor) => Ok(tensor),
            _ => Err(Self::type_error(var, "a tensor")),
        }
    }

    fn define(&mut self, inst: &Instruction, value: Value) -> Result<(), ExecError> {
        let Some(out) = &inst.out else {
            return Ok(());
        };
        match out.kind {
            VariableKind::Local { id } => {
                self.locals.insert(id, value);
                Ok(())
            }
            _ => Err(Self::type_error(out, "a local")),
        }
    }

    fn execute(&mut self, inst: &Instruction) -> Result<(), ExecError> {
        log::trace!("{inst}");

        match &inst.operation {
            Operation::Arithmetic(op) => {
                let value = self.arithmetic(op)?;
                self.define(inst, value)
            }
            Operation::Memory(op) => match self.memory(op)? {
                Some(value) => self.define(inst, value),
                None => Ok(()),
            },
            Operation::Branch(Branch::If(branch)) => {
                if self.bool(&branch.cond)? {
                    self.run(&branch.scope)?;
                }
                Ok(())
            }
            Operation::Assert(op) => match self.bool(&op.cond)? {
                true => Ok(()),
                false => Err(ExecError::AssertionFailed(op.message.clone())),
            },
            Operation::Structured(op) => Err(ExecError::Unlowered(op.to_string())),
        }
    }

    fn arithmetic(&self, op: &Arithmetic) -> Result<Value, ExecError> {
        let index_op = |op: &tessel_ir::BinaryOperator,
                        f: fn(i64, i64) -> Option<i64>|
         -> Result<Value, ExecError> {
            let (lhs, rhs) = (self.index(&op.lhs)?, self.index(&op.rhs)?);
            match f(lhs, rhs) {
                Some(value) => Ok(Value::Index(value)),
                None if rhs == 0 => Err(ExecError::DivisionByZero),
                None => Err(ExecError::Overflow { lhs, rhs }),
            }
        };

        match op {
            Arithmetic::Add(op) => index_op(op, |lhs, rhs| Some(lhs.wrapping_add(rhs))),
            Arithmetic::Sub(op) => index_op(op, |lhs, rhs| Some(lhs.wrapping_sub(rhs))),
            Arithmetic::Mul(op) => index_op(op, |lhs, rhs| Some(lhs.wrapping_mul(rhs))),
            Arithmetic::Div(op) => index_op(op, i64::checked_div),
            Arithmetic::Rem(op) => index_op(op, i64::checked_rem),
            Arithmetic::Min(op) => index_op(op, |lhs, rhs| Some(lhs.min(rhs))),
            Arithmetic::Lower(op) => {
                let lower = self.index(&op.lhs)? < self.index(&op.rhs)?;
                Ok(Value::Scalar(ConstantValue::Bool(lower)))
            }
            Arithmetic::Or(op) => {
                let or = self.bool(&op.lhs)? || self.bool(&op.rhs)?;
                Ok(Value::Scalar(ConstantValue::Bool(or)))
            }
        }
    }

    /// Run a memory operation, returning the value it defines if any.
    fn memory(&self, op: &Memory) -> Result<Option<Value>, ExecError> {
        let value = match op {
            Memory::Alloc(ty) => {
                // Dynamic extents can't be allocated, they surface as a negative extent.
                let shape: Dims = ty.shape.iter().map(|dim| dim.unwrap_or(-1)).collect();
                Value::MemRef(MemRef::alloc(&shape, ty.elem)?)
            }
            Memory::ReinterpretCast(op) => {
                let buffer = match self.value(&op.source)? {
                    Value::Buffer(buffer) => buffer,
                    _ => return Err(Self::type_error(&op.source, "a buffer")),
                };
                let sizes = self.indices(&op.sizes)?;
                let strides = self.indices(&op.strides)?;
                if sizes.iter().any(|dim| *dim < 0) {
                    return Err(ExecError::InvalidShape {
                        shape: sizes.to_vec(),
                    });
                }
                Value::MemRef(MemRef::new(buffer, self.index(&op.offset)?, sizes, strides))
            }
            Memory::SubView(op) => {
                let source = self.memref(&op.source)?;
                let view = source.subview(
                    &self.indices(&op.offsets)?,
                    &self.indices(&op.sizes)?,
                    &self.indices(&op.strides)?,
                )?;
                Value::MemRef(view)
            }
            Memory::Copy(op) => {
                let source = self.memref(&op.source)?;
                let target = self.memref(&op.target)?;
                check_shape(&source.shape, &target.shape)?;
                // Read everything first, source and target may share a buffer.
                let values = source.to_vec()?;
                write_all(&target, values)?;
                return Ok(None);
            }
            Memory::Fill(op) => {
                let value = self.scalar(&op.value)?;
                let target = self.memref(&op.target)?;
                for_each_index(&target.shape, |index| target.write(index, value))?;
                return Ok(None);
            }
            Memory::ToTensor(op) => {
                let source = self.memref(&op.source)?;
                Value::Tensor(Tensor::new(source.shape.to_vec(), source.to_vec()?))
            }
            Memory::ExtractSlice(op) => {
                let source = self.tensor(&op.source)?;
                if op.strides.iter().any(|stride| !stride.is_constant(1)) {
                    return Err(Self::type_error(&op.source, "a unit-stride slice"));
                }
                let slice = source.slice(&self.indices(&op.offsets)?, &self.indices(&op.sizes)?)?;
                Value::Tensor(slice)
            }
            Memory::MaterializeInDestination(op) => {
                let source = self.tensor(&op.source)?;
                let dest = self.memref(&op.dest)?;
                check_shape(&source.shape, &dest.shape)?;
                write_all(&dest, source.data)?;
                return Ok(None);
            }
        };

        Ok(Some(value))
    }
}

fn check_shape(lhs: &[i64], rhs: &[i64]) -> Result<(), ExecError> {
    if lhs != rhs {
        return Err(ExecError::ShapeMismatch {
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
        });
    }
    Ok(())
}

/// Write row-major `values` into every element of `target`.
fn write_all(target: &MemRef, values: Vec<ConstantValue>) -> Result<(), ExecError> {
    let mut values = values.into_iter();
    for_each_index(&target.shape, |index| {
        let value = values.next().ok_or(ExecError::ShapeMismatch {
            lhs: target.shape.to_vec(),
            rhs: index.to_vec(),
        })?;
        target.write(index, value)
    })
}

impl From<Tensor> for Value {
    fn from(value: Tensor) -> Self {
        Value::Tensor(value)
    }
}

impl From<MemRef> for Value {
    fn from(value: MemRef) -> Self {
        Value::MemRef(value)
    }
}
