#![allow(dead_code)]

use tessel_exec::{Buffer, Interpreter, Tensor, Value, buffer};
use tessel_ir::{
    ConstantValue, ElemType, IntKind, LoadOperator, PointerDescriptor, PointerKind, PointerType,
    Scope, StoreOperator, Structured, TensorType, Type, Variable,
};
use tessel_lower::{LoweringConfig, StructuredToMemref, WraparoundConfig};

pub const I32: ElemType = ElemType::Int(IntKind::I32);

/// Argument slots of every test program.
pub const BUFFER: u32 = 0;
pub const OFFSET: u32 = 1;
pub const TILE: u32 = 4;

/// The value written where a masked load doesn't read.
pub const FILL: i64 = -1;

pub fn ints(values: impl IntoIterator<Item = i64>) -> Vec<ConstantValue> {
    values.into_iter().map(ConstantValue::Int).collect()
}

pub fn dynamic(id: u32) -> Variable {
    Variable::global(id, Type::Index)
}

pub fn offset() -> Variable {
    dynamic(OFFSET)
}

pub fn fill() -> Variable {
    Variable::scalar(FILL, I32)
}

pub fn indices(values: &[i64]) -> Vec<Variable> {
    values.iter().copied().map(Variable::index).collect()
}

pub fn descriptor(
    kind: PointerKind,
    sizes: &[i64],
    shape: &[i64],
    strides: &[i64],
    offset: Variable,
) -> PointerDescriptor {
    let tile = TensorType::new(sizes.to_vec(), I32);
    let ty = match kind {
        PointerKind::Block => PointerType::Block(tile),
        _ => PointerType::Structured(tile),
    };
    let mut offsets = vec![Variable::index(0); sizes.len()];
    offsets[0] = offset;

    PointerDescriptor::new(
        Variable::global(BUFFER, Type::Buffer(I32)),
        ty,
        indices(shape),
        indices(strides),
        sizes.to_vec(),
        offsets,
        (0..sizes.len() as u32).rev().collect(),
        kind,
    )
}

pub fn make_ptr(scope: &mut Scope, desc: PointerDescriptor) -> Variable {
    let ty = Type::Pointer(desc.ty.clone());
    scope.register_local(Structured::MakeTensorPtr(desc), ty)
}

pub fn load(
    scope: &mut Scope,
    ptr: &Variable,
    sizes: &[i64],
    mask: Vec<Variable>,
    other: Option<Variable>,
) -> Variable {
    scope.register_local(
        Structured::Load(LoadOperator::new(ptr.clone(), mask, other)),
        TensorType::new(sizes.to_vec(), I32),
    )
}

pub fn store(scope: &mut Scope, ptr: &Variable, value: Variable, mask: Vec<Variable>) {
    scope.register(tessel_ir::Operation::Structured(Structured::Store(
        StoreOperator::new(ptr.clone(), value, mask),
    )));
}

pub fn checked() -> LoweringConfig {
    LoweringConfig {
        wraparound: WraparoundConfig {
            check_offsets: true,
        },
        ..Default::default()
    }
}

/// Lower `scope` with `config` and run it with `memory` as the buffer argument.
pub fn run(
    scope: Scope,
    config: LoweringConfig,
    memory: &Buffer,
    args: &[(u32, Value)],
) -> Result<Interpreter, tessel_exec::ExecError> {
    let (lowered, _) = StructuredToMemref::with_config(config)
        .lower(scope)
        .expect("Lowering should succeed");

    let mut interpreter = Interpreter::new();
    interpreter.bind(BUFFER, Value::Buffer(memory.clone()));
    for (id, value) in args {
        interpreter.bind(*id, value.clone());
    }
    interpreter.run(&lowered)?;
    Ok(interpreter)
}

pub fn memory(len: i64) -> Buffer {
    buffer(ints(0..len))
}

pub fn tensor(interpreter: &Interpreter, var: &Variable) -> Tensor {
    match interpreter.value(var).expect("Tile should be defined") {
        Value::Tensor(tensor) => tensor,
        other => panic!("Expected a tensor, got {other:?}"),
    }
}

pub fn rows(rows: &[&[i64]]) -> Tensor {
    let shape = vec![rows.len() as i64, rows.first().map_or(0, |row| row.len() as i64)];
    Tensor::new(shape, ints(rows.iter().flat_map(|row| row.iter().copied())))
}
