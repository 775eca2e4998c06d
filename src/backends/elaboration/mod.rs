//! ============================================================
//!                    Deferred Elaboration
//! ============================================================
//! Runs after move analysis has accepted a unit. Every place-capable deref,
//! every drop and every construction in the HIR becomes concrete LIR:
//!  - `*x` on a capability owner becomes an accessor call and a raw pointer projection
//!  - Drops are split per move path and guarded by drop flags where the
//!    ownership facts only say "maybe initialized"
//!  - Construction writes straight into `new_uninit` storage when it can
//!
//! The elaborator steps its own copy of the ownership state through each
//! block with the same effects move analysis used, and checks it against
//! the recorded fact before every program point. A mismatch is a compiler
//! bug, never a user error.
//!
//! Each function is lowered twice. The first pass only finds which move
//! paths need a drop flag; the second emits code with the flag set fixed,
//! so flags are kept in sync from the very first statement.

pub mod abort_boundary;

mod construction;
mod deferred;
mod drops;
mod place_lowering;

use crate::backends::elaboration::abort_boundary::PanicPolicy;
use crate::backends::lir::lir_nodes::{
    DropFlagId, ElaboratedModule, ElaborationStats, LirBlock, LirDropFlag, LirFunction, LirLocal,
    LirStatement, LirTemp, LirTerminator, TempId,
};
use crate::compiler_frontend::analysis::capabilities::CapabilityRegistry;
use crate::compiler_frontend::analysis::move_checker::MoveAnalysis;
use crate::compiler_frontend::analysis::move_checker::move_paths::{MovePathIndex, MovePathTable};
use crate::compiler_frontend::analysis::move_checker::state::OwnershipState;
use crate::compiler_frontend::compiler_errors::CompilerError;
use crate::compiler_frontend::compiler_warnings::{CompilerWarning, WarningKind};
use crate::compiler_frontend::hir::hir_datatypes::{TypeContext, local_types};
use crate::compiler_frontend::hir::hir_display::HirDisplayContext;
use crate::compiler_frontend::hir::hir_nodes::{
    BlockId, HirBlock, HirFunction, HirModule, LocalId, TextLocation, TypeId,
};
use crate::{create_error, elaboration_log, timer_log};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::time::Instant;

pub fn elaborate(
    module: &HirModule,
    types: &TypeContext,
    registry: &CapabilityRegistry,
    analysis: &MoveAnalysis,
    policy: &dyn PanicPolicy,
) -> Result<ElaboratedModule, CompilerError> {
    let time = Instant::now();

    let context = ElaborationContext {
        module,
        types,
        registry,
        analysis,
        policy,
    };

    let mut elaborated = ElaboratedModule {
        types: module.types.clone(),
        capabilities: registry.iter().cloned().collect(),
        ..ElaboratedModule::default()
    };

    // Prologue blocks get ids no HIR block uses.
    let mut next_block_id = module
        .blocks
        .iter()
        .map(|block| block.id.0 + 1)
        .max()
        .unwrap_or(0);

    for function in &module.functions {
        let output = context.elaborate_function(function, &mut next_block_id)?;

        add_stats(&mut elaborated.stats, &output.stats);
        elaborated.warnings.extend(output.warnings);
        elaborated.functions.push(output.function);
    }

    elaboration_log!(
        Green "[Elab] ",
        elaborated.stats.functions_elaborated,
        " function(s), ",
        elaborated.stats.accessor_calls,
        " accessor call(s), ",
        elaborated.stats.drop_flags,
        " drop flag(s)"
    );
    timer_log!(time, "Elaboration completed in: ");

    Ok(elaborated)
}

fn add_stats(total: &mut ElaborationStats, function: &ElaborationStats) {
    total.functions_elaborated += function.functions_elaborated;
    total.deferred_operations += function.deferred_operations;
    total.accessor_calls += function.accessor_calls;
    total.content_drops += function.content_drops;
    total.husk_drops += function.husk_drops;
    total.drop_flags += function.drop_flags;
    total.in_place_constructions += function.in_place_constructions;
    total.temp_constructions += function.temp_constructions;
}

/// Read-only inputs shared by every function of the unit.
struct ElaborationContext<'a> {
    module: &'a HirModule,
    types: &'a TypeContext<'a>,
    registry: &'a CapabilityRegistry,
    analysis: &'a MoveAnalysis,
    policy: &'a dyn PanicPolicy,
}

struct FunctionOutput {
    function: LirFunction,
    stats: ElaborationStats,
    warnings: Vec<CompilerWarning>,
}

impl<'a> ElaborationContext<'a> {
    fn elaborate_function(
        &self,
        function: &'a HirFunction,
        next_block_id: &mut u32,
    ) -> Result<FunctionOutput, CompilerError> {
        let Some(paths) = self.analysis.paths(function.id) else {
            return Err(create_error!(
                Compiler,
                format!(
                    "Elaboration found no move paths for function '{}'. Move analysis must run first",
                    function.name
                ),
                function.location.to_error_location(&self.module.source_path),
                { CompilationStage => "Elaboration" }
            ));
        };

        let blocks = self.reachable_blocks(function)?;

        // Pass 1: find the paths that need drop flags.
        let mut discovery = FunctionElaborator::new(self, function, paths, ElaborationPass::Discover);
        discovery.lower_blocks(&blocks)?;
        let drop_flags = discovery.drop_flags;

        // Pass 2: emit with a fixed flag set.
        let mut emitter = FunctionElaborator::new(self, function, paths, ElaborationPass::Emit);
        emitter.drop_flags = drop_flags;
        let mut lir_blocks = emitter.lower_blocks(&blocks)?;

        let mut flags = emitter
            .drop_flags
            .iter()
            .map(|(path, flag)| (*flag, *path))
            .collect::<Vec<_>>();
        flags.sort();

        let display = HirDisplayContext::for_function(function, self.types);
        let mut warnings = Vec::with_capacity(flags.len());
        let mut drop_flags = Vec::with_capacity(flags.len());

        for (flag, path) in &flags {
            let place_name = display.place(&paths.path(*path).place);

            elaboration_log!(Yellow "[Elab] drop flag ", Bold place_name, " in '", function.name, "'");
            warnings.push(CompilerWarning::new(
                &place_name,
                function.location.to_error_location(&self.module.source_path),
                WarningKind::ConditionalDrop,
            ));

            drop_flags.push(LirDropFlag {
                id: *flag,
                place: place_name,
            });
        }

        // Flags start out matching the entry state: set for everything a parameter owns.
        let mut entry = function.entry;
        if !flags.is_empty() {
            let initial_state = emitter.initial_state()?;
            let prologue = BlockId(*next_block_id);
            *next_block_id += 1;

            let statements = flags
                .iter()
                .map(|(flag, path)| LirStatement::SetDropFlag {
                    flag: *flag,
                    value: initial_state.is_maybe_init(*path),
                })
                .collect();

            lir_blocks.insert(
                0,
                LirBlock {
                    id: prologue,
                    statements,
                    terminator: LirTerminator::Goto {
                        target: function.entry,
                    },
                },
            );
            entry = prologue;
        }

        let mut stats = emitter.stats;
        stats.functions_elaborated = 1;
        stats.drop_flags = flags.len();

        let locals = function
            .locals
            .iter()
            .map(|local| LirLocal {
                id: local.id,
                name: local.name.to_owned(),
                ty: local.ty,
            })
            .collect();

        Ok(FunctionOutput {
            function: LirFunction {
                id: function.id,
                name: function.name.to_owned(),
                entry,
                params: function.params.to_owned(),
                locals,
                temps: emitter.temps,
                drop_flags,
                return_type: function.return_type,
                blocks: lir_blocks,
            },
            stats,
            warnings,
        })
    }

    /// Blocks reachable from the entry, in breadth-first order.
    fn reachable_blocks(&self, function: &HirFunction) -> Result<Vec<&'a HirBlock>, CompilerError> {
        let block_by_id = self
            .module
            .blocks
            .iter()
            .map(|block| (block.id, block))
            .collect::<FxHashMap<_, _>>();

        let mut visited = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([function.entry]);

        while let Some(block_id) = queue.pop_front() {
            if !visited.insert(block_id) {
                continue;
            }

            let Some(block) = block_by_id.get(&block_id) else {
                return Err(create_error!(
                    Compiler,
                    format!(
                        "Elaboration could not resolve block '{}' of function '{}'",
                        block_id, function.name
                    ),
                    function.location.to_error_location(&self.module.source_path),
                    { CompilationStage => "Elaboration" }
                ));
            };

            order.push(*block);
            queue.extend(block.terminator.successors());
        }

        Ok(order)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElaborationPass {
    /// Flags are allocated the first time a drop needs one. Output is thrown away.
    Discover,

    /// Every flag is known up front and kept in sync at each effect.
    Emit,
}

/// Lowers one function. Split across the `place_lowering`, `deferred`,
/// `drops` and `construction` files.
pub(crate) struct FunctionElaborator<'a> {
    module: &'a HirModule,
    types: &'a TypeContext<'a>,
    registry: &'a CapabilityRegistry,
    analysis: &'a MoveAnalysis,
    policy: &'a dyn PanicPolicy,
    function: &'a HirFunction,
    paths: &'a MovePathTable,
    local_types: FxHashMap<LocalId, TypeId>,
    pass: ElaborationPass,

    /// Ownership state at the program point being lowered.
    state: OwnershipState,

    /// Output of the block being lowered.
    statements: Vec<LirStatement>,

    temps: Vec<LirTemp>,

    /// Temps holding a pointer returned by a storage accessor.
    accessor_temps: FxHashSet<TempId>,

    drop_flags: FxHashMap<MovePathIndex, DropFlagId>,

    // Memo for "is a capability owner, or a struct containing one".
    opens_capability: FxHashMap<TypeId, bool>,

    location: TextLocation,
    stats: ElaborationStats,
}

impl<'a> FunctionElaborator<'a> {
    fn new(
        context: &ElaborationContext<'a>,
        function: &'a HirFunction,
        paths: &'a MovePathTable,
        pass: ElaborationPass,
    ) -> Self {
        Self {
            module: context.module,
            types: context.types,
            registry: context.registry,
            analysis: context.analysis,
            policy: context.policy,
            function,
            paths,
            local_types: local_types(function),
            pass,
            state: OwnershipState::new_uninitialized(paths.len()),
            statements: Vec::new(),
            temps: Vec::new(),
            accessor_temps: FxHashSet::default(),
            drop_flags: FxHashMap::default(),
            opens_capability: FxHashMap::default(),
            location: function.location.clone(),
            stats: ElaborationStats::default(),
        }
    }

    fn lower_blocks(&mut self, blocks: &[&'a HirBlock]) -> Result<Vec<LirBlock>, CompilerError> {
        let mut lowered = Vec::with_capacity(blocks.len());

        for block in blocks {
            lowered.push(self.lower_block(block)?);
        }

        Ok(lowered)
    }

    fn lower_block(&mut self, block: &'a HirBlock) -> Result<LirBlock, CompilerError> {
        let analysis = self.analysis;

        let Some(entry_state) = analysis.block_entry_states.get(&block.id) else {
            return Err(self.internal_error(format!(
                "Block '{}' of '{}' is reachable but move analysis recorded no entry state for it",
                block.id, self.function.name
            )));
        };

        self.state = entry_state.clone();
        self.statements = Vec::new();

        for statement in &block.statements {
            self.location = statement.location.clone();

            let fact = analysis.statement_fact(statement.id);
            self.expect_fact(fact.map(|fact| &fact.state), &format!("statement {}", statement.id))?;

            self.lower_statement(statement)?;
        }

        let fact = analysis.terminator_fact(block.id);
        self.expect_fact(
            fact.map(|fact| &fact.state),
            &format!("terminator of {}", block.id),
        )?;

        let terminator = self.lower_terminator(&block.terminator)?;

        Ok(LirBlock {
            id: block.id,
            statements: std::mem::take(&mut self.statements),
            terminator,
        })
    }

    /// The elaborator's view of a program point must be exactly what move analysis saw.
    fn expect_fact(
        &self,
        fact: Option<&OwnershipState>,
        program_point: &str,
    ) -> Result<(), CompilerError> {
        match fact {
            Some(state) if state == &self.state => Ok(()),

            Some(_) => Err(self.internal_error(format!(
                "Ownership fact for {} in '{}' disagrees with the state seen during elaboration",
                program_point, self.function.name
            ))),

            None => Err(self.internal_error(format!(
                "Move analysis recorded no ownership fact for {} in '{}'",
                program_point, self.function.name
            ))),
        }
    }

    fn initial_state(&self) -> Result<OwnershipState, CompilerError> {
        let mut state = OwnershipState::new_uninitialized(self.paths.len());

        for param in &self.function.params {
            let Some(root) = self.paths.root(*param) else {
                return Err(self.internal_error(format!(
                    "Parameter {} of '{}' has no move path",
                    param, self.function.name
                )));
            };
            state.initialize(self.paths.subtree(root));
        }

        Ok(state)
    }

    fn internal_error(&self, msg: String) -> CompilerError {
        create_error!(
            Compiler,
            msg,
            self.location.to_error_location(&self.module.source_path),
            { CompilationStage => "Elaboration" }
        )
    }
}

#[cfg(test)]
pub(crate) mod tests;
