use core::{
    fmt::Display,
    sync::atomic::{AtomicU32, Ordering},
};
use std::rc::Rc;

use crate::{Id, Instruction, Operation, Type, Variable, VariableKind};

/// Hands out fresh local ids. Child scopes share the counter of their parent so ids stay unique
/// across a whole function.
#[derive(Clone, Debug, Default)]
pub struct Allocator {
    next_id: Rc<AtomicU32>,
}

impl Allocator {
    /// An allocator whose first id is `start`. Used to keep ids of new locals clear of the ones
    /// already present in a scope.
    pub fn starting_at(start: Id) -> Self {
        Self {
            next_id: Rc::new(AtomicU32::new(start)),
        }
    }

    /// Create a new local of type `ty`.
    pub fn create_local(&self, ty: impl Into<Type>) -> Variable {
        let id = self.new_local_index();
        Variable::new(VariableKind::Local { id }, ty)
    }

    pub fn new_local_index(&self) -> Id {
        self.next_id.fetch_add(1, Ordering::AcqRel)
    }

    /// The next id that will be handed out.
    pub fn peek(&self) -> Id {
        self.next_id.load(Ordering::Acquire)
    }
}

/// The scope is the main [instruction](Instruction) container. It records instructions in
/// program order and allocates the locals they define.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Scope {
    pub depth: u8,
    pub instructions: Vec<Instruction>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub allocator: Allocator,
}

impl PartialEq for Allocator {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for Allocator {}

impl core::hash::Hash for Scope {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.depth.hash(state);
        self.instructions.hash(state);
    }
}

impl Scope {
    /// Create the scope at the root of a function.
    pub fn root() -> Self {
        Self {
            depth: 0,
            instructions: Vec::new(),
            allocator: Allocator::default(),
        }
    }

    /// Create a nested scope sharing this scope's allocator.
    pub fn child(&self) -> Self {
        Self {
            depth: self.depth + 1,
            instructions: Vec::new(),
            allocator: self.allocator.clone(),
        }
    }

    /// Create a new immutable local.
    pub fn create_local(&self, ty: impl Into<Type>) -> Variable {
        self.allocator.create_local(ty)
    }

    /// Add an instruction at the end of the scope.
    pub fn register<T: Into<Instruction>>(&mut self, instruction: T) {
        self.instructions.push(instruction.into())
    }

    /// Add an instruction computing a new local of type `ty` and return that local.
    pub fn register_local(
        &mut self,
        operation: impl Into<Operation>,
        ty: impl Into<Type>,
    ) -> Variable {
        let out = self.create_local(ty);
        self.register(Instruction::new(operation, out.clone()));
        out
    }

    /// The largest local id used anywhere in this scope or its children, if any.
    pub fn max_local_id(&self) -> Option<Id> {
        self.instructions
            .iter()
            .flat_map(|inst| {
                let nested = match &inst.operation {
                    Operation::Branch(crate::Branch::If(op)) => op.scope.max_local_id(),
                    _ => None,
                };
                inst.out
                    .as_ref()
                    .and_then(|out| out.local_id())
                    .into_iter()
                    .chain(nested)
            })
            .max()
    }
}

impl From<Operation> for Instruction {
    fn from(value: Operation) -> Self {
        Instruction::no_out(value)
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let indent = "    ".repeat(self.depth as usize + 1);
        writeln!(f, "{{")?;
        for instruction in self.instructions.iter() {
            let instruction_str = instruction.to_string();
            for line in instruction_str.lines() {
                writeln!(f, "{indent}{line}")?;
            }
        }
        write!(f, "{}}}", "    ".repeat(self.depth as usize))
    }
}
