use std::{collections::VecDeque, sync::Arc};

use core::fmt::Display;
use hashbrown::HashMap;
use tessel_ir::{
    Allocator, Branch, If, Instruction, IrTransformer, Operation, PointerDescriptor, Scope,
    Structured, TransformAction, Variable,
};

use crate::{
    CompilationLogLevel, Loader, LoweringConfig, LoweringError, Materialized, SplitKind, Storer,
    ViewMaterializer, WraparoundSplitter,
};

/// Counts of what a lowering rewrote.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoweringStats {
    /// Pointers lowered to a single view.
    pub views: usize,
    /// Pointers split in two views.
    pub splits: usize,
    pub loads: usize,
    pub stores: usize,
}

impl Display for LoweringStats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} views, {} splits, {} loads, {} stores",
            self.views, self.splits, self.loads, self.stores
        )
    }
}

/// Lowers every structured pointer of a scope to memref views, and their loads and stores to
/// copies between those views and dense tiles.
///
/// Instructions are visited in program order, so a pointer must be defined before the loads and
/// stores that use it. Each instruction is rewritten on its own and only committed once its
/// replacement is complete; the first failure aborts the lowering.
#[derive(Debug)]
pub struct StructuredToMemref {
    config: Arc<LoweringConfig>,
    materializer: ViewMaterializer,
    splitter: WraparoundSplitter,
    loader: Loader,
    storer: Storer,
    pointers: HashMap<Variable, Materialized>,
    stats: LoweringStats,
}

impl Default for StructuredToMemref {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuredToMemref {
    /// A lowering using the global [configuration](LoweringConfig::get).
    pub fn new() -> Self {
        Self::from_config(LoweringConfig::get())
    }

    /// A lowering using `config` instead of the global configuration.
    pub fn with_config(config: LoweringConfig) -> Self {
        Self::from_config(Arc::new(config))
    }

    fn from_config(config: Arc<LoweringConfig>) -> Self {
        Self {
            splitter: WraparoundSplitter::new(config.wraparound.check_offsets),
            config,
            materializer: ViewMaterializer,
            loader: Loader,
            storer: Storer,
            pointers: HashMap::new(),
            stats: LoweringStats::default(),
        }
    }

    /// Lower `scope`, returning the lowered scope and what was rewritten.
    ///
    /// Locals of the lowered scope keep their ids, new locals are numbered after them.
    pub fn lower(mut self, scope: Scope) -> Result<(Scope, LoweringStats), LoweringError> {
        let start = scope
            .max_local_id()
            .map_or(0, |id| id + 1)
            .max(scope.allocator.peek());
        let mut lowered = Scope {
            depth: scope.depth,
            instructions: Vec::with_capacity(scope.instructions.len()),
            allocator: Allocator::starting_at(start),
        };

        self.lower_into(&mut lowered, scope.instructions)?;

        match self.config.logger.level {
            CompilationLogLevel::Disabled => {}
            CompilationLogLevel::Basic => {
                log::info!("Lowered structured pointers: {}", self.stats);
            }
            CompilationLogLevel::Full => {
                log::info!("Lowered structured pointers: {}", self.stats);
                log::info!("{lowered}");
            }
        }

        Ok((lowered, self.stats))
    }

    fn lower_into(
        &mut self,
        scope: &mut Scope,
        instructions: Vec<Instruction>,
    ) -> Result<(), LoweringError> {
        let mut worklist = VecDeque::from(instructions);

        while let Some(inst) = worklist.pop_front() {
            match self.maybe_transform(scope, &inst)? {
                TransformAction::Ignore => {
                    let inst = self.descend(scope, inst)?;
                    scope.register(inst);
                }
                TransformAction::Replace(replacement) => {
                    for inst in replacement.iter() {
                        log::trace!("  {inst}");
                    }
                    scope.instructions.extend(replacement);
                }
                TransformAction::Remove => {}
            }
        }

        Ok(())
    }

    /// Lower the bodies nested in `inst`.
    fn descend(&mut self, scope: &Scope, inst: Instruction) -> Result<Instruction, LoweringError> {
        match inst.operation {
            Operation::Branch(Branch::If(branch)) => {
                let If { cond, scope: body } = *branch;
                let mut lowered = scope.child();
                self.lower_into(&mut lowered, body.instructions)?;

                Ok(Instruction {
                    out: inst.out,
                    operation: Operation::Branch(Branch::If(Box::new(If::new(cond, lowered)))),
                })
            }
            operation => Ok(Instruction {
                out: inst.out,
                operation,
            }),
        }
    }

    fn lower_pointer(
        &mut self,
        scope: &mut Scope,
        ptr: &Variable,
        desc: &PointerDescriptor,
    ) -> Result<Materialized, LoweringError> {
        if !desc.has_decreasing_order() {
            return Err(LoweringError::UnsupportedLayout {
                ptr: ptr.clone(),
                order: desc.order.clone(),
            });
        }

        match SplitKind::of(desc.kind) {
            Some(kind) => {
                let pair = self.splitter.split(scope, ptr, desc, kind)?;
                self.stats.splits += 1;
                Ok(Materialized::Split(pair))
            }
            None => {
                let view = self.materializer.materialize(scope, ptr, desc)?;
                self.stats.views += 1;
                Ok(Materialized::View(view))
            }
        }
    }

    fn resolve(&self, ptr: &Variable) -> Result<&Materialized, LoweringError> {
        self.pointers
            .get(ptr)
            .ok_or_else(|| LoweringError::UnresolvedPointer { ptr: ptr.clone() })
    }
}

impl IrTransformer for StructuredToMemref {
    type Error = LoweringError;

    fn maybe_transform(
        &mut self,
        scope: &mut Scope,
        inst: &Instruction,
    ) -> Result<TransformAction, LoweringError> {
        let Operation::Structured(op) = &inst.operation else {
            return Ok(TransformAction::Ignore);
        };
        log::debug!("Lowering {inst}");

        // The replacement is built on the side so a failure leaves `scope` untouched.
        let mut staging = Scope {
            depth: scope.depth,
            instructions: Vec::new(),
            allocator: scope.allocator.clone(),
        };

        match op {
            Structured::MakeTensorPtr(desc) => {
                // A pointer nobody names can't be used.
                let Some(ptr) = &inst.out else {
                    return Ok(TransformAction::Remove);
                };
                let materialized = self.lower_pointer(&mut staging, ptr, desc)?;
                self.pointers.insert(ptr.clone(), materialized);
            }
            Structured::Load(op) => {
                // Loads have no side effect, an unnamed one can be dropped.
                let Some(out) = &inst.out else {
                    return Ok(TransformAction::Remove);
                };
                let source = self.resolve(&op.ptr)?;
                self.loader.load(&mut staging, op, source, out)?;
                self.stats.loads += 1;
            }
            Structured::Store(op) => {
                let dest = self.resolve(&op.ptr)?;
                self.storer.store(&mut staging, op, dest)?;
                self.stats.stores += 1;
            }
        }

        Ok(TransformAction::Replace(staging.instructions))
    }
}

/// Lower `scope` with the global configuration.
pub fn lower(scope: Scope) -> Result<Scope, LoweringError> {
    StructuredToMemref::new()
        .lower(scope)
        .map(|(lowered, _)| lowered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LoggerConfig, WraparoundConfig};
    use pretty_assertions::assert_eq;
    use tessel_ir::{
        ElemType, FloatKind, LoadOperator, Memory, PointerKind, PointerType, StoreOperator,
        TensorType, Type,
    };

    const F16: ElemType = ElemType::Float(FloatKind::F16);

    fn config(level: CompilationLogLevel) -> LoweringConfig {
        LoweringConfig {
            wraparound: WraparoundConfig::default(),
            logger: LoggerConfig { level },
        }
    }

    fn make_ptr(scope: &mut Scope, order: Vec<u32>) -> Variable {
        let tile = TensorType::new(vec![4, 4], F16);
        let desc = PointerDescriptor::new(
            Variable::global(0, Type::Buffer(F16)),
            PointerType::Structured(tile),
            vec![],
            vec![Variable::index(4), Variable::index(1)],
            vec![4, 4],
            vec![Variable::global(1, Type::Index), Variable::index(0)],
            order,
            PointerKind::Structured,
        );
        scope.register_local(
            Structured::MakeTensorPtr(desc.clone()),
            Type::Pointer(desc.ty),
        )
    }

    fn load(scope: &mut Scope, ptr: &Variable) -> Variable {
        scope.register_local(
            Structured::Load(LoadOperator::new(ptr.clone(), vec![], None)),
            TensorType::new(vec![4, 4], F16),
        )
    }

    fn has_structured(scope: &Scope) -> bool {
        scope.instructions.iter().any(|inst| match &inst.operation {
            Operation::Structured(_) => true,
            Operation::Branch(Branch::If(branch)) => has_structured(&branch.scope),
            _ => false,
        })
    }

    #[test_log::test]
    fn load_then_store_is_fully_lowered() {
        let mut scope = Scope::root();
        let ptr = make_ptr(&mut scope, vec![1, 0]);
        let tile = load(&mut scope, &ptr);
        scope.register(Operation::Structured(Structured::Store(StoreOperator::new(
            ptr,
            tile.clone(),
            vec![],
        ))));

        let (lowered, stats) = StructuredToMemref::with_config(config(CompilationLogLevel::Full))
            .lower(scope)
            .unwrap();

        assert!(!has_structured(&lowered));
        assert_eq!(
            stats,
            LoweringStats {
                views: 1,
                splits: 0,
                loads: 1,
                stores: 1,
            }
        );
        // The loaded tile keeps its name for the store.
        assert!(
            lowered
                .instructions
                .iter()
                .any(|inst| inst.out.as_ref() == Some(&tile))
        );
    }

    #[test]
    fn increasing_order_is_an_unsupported_layout() {
        let mut scope = Scope::root();
        let ptr = make_ptr(&mut scope, vec![0, 1]);
        load(&mut scope, &ptr);

        let err = StructuredToMemref::with_config(LoweringConfig::default())
            .lower(scope)
            .unwrap_err();

        assert_eq!(
            err,
            LoweringError::UnsupportedLayout {
                ptr,
                order: vec![0, 1],
            }
        );
        assert!(!err.is_contract_violation());
    }

    #[test]
    fn use_before_definition_is_unresolved() {
        let mut scope = Scope::root();
        let ptr = Variable::global(5, Type::Index);
        load(&mut scope, &ptr);

        let err = StructuredToMemref::with_config(LoweringConfig::default())
            .lower(scope)
            .unwrap_err();

        assert_eq!(err, LoweringError::UnresolvedPointer { ptr });
    }

    #[test_log::test]
    fn loads_nested_in_branches_are_lowered() {
        let mut scope = Scope::root();
        let ptr = make_ptr(&mut scope, vec![1, 0]);
        let mut body = scope.child();
        load(&mut body, &ptr);
        scope.register(Operation::Branch(Branch::If(Box::new(If::new(
            Variable::global(2, Type::bool()),
            body,
        )))));

        let (lowered, stats) = StructuredToMemref::with_config(config(CompilationLogLevel::Basic))
            .lower(scope)
            .unwrap();

        assert!(!has_structured(&lowered));
        assert_eq!(stats.loads, 1);
        let Operation::Branch(Branch::If(branch)) = &lowered.instructions.last().unwrap().operation
        else {
            panic!("branch expected");
        };
        assert_eq!(branch.scope.depth, 1);
        assert!(matches!(
            branch.scope.instructions[0].operation,
            Operation::Memory(Memory::Alloc(_))
        ));
    }

    #[test]
    fn new_locals_are_numbered_after_existing_ones() {
        let mut scope = Scope::root();
        let ptr = make_ptr(&mut scope, vec![1, 0]);
        let tile = load(&mut scope, &ptr);

        let (lowered, _) = StructuredToMemref::with_config(LoweringConfig::default())
            .lower(scope)
            .unwrap();

        let ids = lowered
            .instructions
            .iter()
            .filter_map(|inst| inst.out.as_ref()?.local_id())
            .collect::<Vec<_>>();
        let tile_id = tile.local_id().unwrap();
        assert!(ids.iter().filter(|id| **id != tile_id).all(|id| *id > tile_id));
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }
}
