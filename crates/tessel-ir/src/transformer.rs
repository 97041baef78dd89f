use crate::{Instruction, Scope};

/// The action that should be performed on an instruction, returned by [`IrTransformer::maybe_transform`]
pub enum TransformAction {
    /// The transformer doesn't apply to this instruction
    Ignore,
    /// Replace this instruction with one or more other instructions
    Replace(Vec<Instruction>),
    /// Remove this instruction with no substitute
    Remove,
}

/// A transformer that can rewrite instructions while a scope is being rebuilt.
///
/// `scope` is the scope the replacement will be emitted into. It is only used to allocate new
/// locals; the returned instructions are added by the caller.
pub trait IrTransformer: core::fmt::Debug {
    /// The error returned when an instruction matches but can't be rewritten.
    type Error;

    /// Inspect an instruction and potentially transform it.
    fn maybe_transform(
        &mut self,
        scope: &mut Scope,
        inst: &Instruction,
    ) -> Result<TransformAction, Self::Error>;
}
