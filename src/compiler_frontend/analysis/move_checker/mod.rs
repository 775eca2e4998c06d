//! Place-aware move analysis.
//!
//! A forward dataflow over move paths. Each function is solved to a fixpoint
//! first, then every reachable block is replayed once on its converged entry
//! state to run the checks and record the Ownership Facts the elaborator
//! consumes. All errors of a unit are collected before anything is reported.

pub mod effects;
pub mod move_paths;
pub mod state;

mod diagnostics;
mod transfer;
mod types;

pub use types::{MoveAnalysis, MoveCheckReport, MoveCheckStats, OwnershipFact};

use crate::compiler_frontend::analysis::capabilities::CapabilityRegistry;
use crate::compiler_frontend::analysis::move_checker::diagnostics::MoveDiagnostics;
use crate::compiler_frontend::analysis::move_checker::move_paths::MovePathTable;
use crate::compiler_frontend::analysis::move_checker::state::OwnershipState;
use crate::compiler_frontend::analysis::move_checker::transfer::{
    BlockTransferStats, MoveTransferContext, TransferMode, transfer_block,
};
use crate::compiler_frontend::compiler_errors::CompilerError;
use crate::compiler_frontend::hir::hir_datatypes::{TypeContext, local_types};
use crate::compiler_frontend::hir::hir_nodes::{BlockId, HirBlock, HirFunction, HirModule};
use crate::create_error;
use crate::move_log;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

pub fn check_moves(
    module: &HirModule,
    types: &TypeContext,
    registry: &CapabilityRegistry,
) -> Result<MoveCheckReport, Vec<CompilerError>> {
    MoveChecker::new(module, types, registry).run()
}

struct MoveChecker<'a> {
    module: &'a HirModule,
    types: &'a TypeContext<'a>,
    registry: &'a CapabilityRegistry,
    block_index_by_id: FxHashMap<BlockId, usize>,
}

impl<'a> MoveChecker<'a> {
    fn new(
        module: &'a HirModule,
        types: &'a TypeContext<'a>,
        registry: &'a CapabilityRegistry,
    ) -> Self {
        let block_index_by_id = module
            .blocks
            .iter()
            .enumerate()
            .map(|(index, block)| (block.id, index))
            .collect::<FxHashMap<_, _>>();

        Self {
            module,
            types,
            registry,
            block_index_by_id,
        }
    }

    fn run(self) -> Result<MoveCheckReport, Vec<CompilerError>> {
        let mut report = MoveCheckReport::default();
        let mut errors = Vec::new();

        for function in &self.module.functions {
            match self.analyze_function(function, &mut report) {
                Ok(function_errors) => errors.extend(function_errors),
                Err(error) => errors.push(error),
            }
            report.stats.functions_analyzed += 1;
        }

        move_log!(format!(
            "[Move] Completed move analysis: functions={} blocks={} paths={} (content={}) states={} facts={{stmt:{} term:{}}}",
            report.stats.functions_analyzed,
            report.stats.blocks_analyzed,
            report.stats.move_paths,
            report.stats.content_paths,
            report.analysis.total_state_snapshots(),
            report.analysis.statement_facts.len(),
            report.analysis.terminator_facts.len()
        ));

        if errors.is_empty() {
            Ok(report)
        } else {
            Err(dedup_errors(errors))
        }
    }

    /// Returns the user-facing errors of the function. `Err` is an internal failure.
    fn analyze_function(
        &self,
        function: &HirFunction,
        report: &mut MoveCheckReport,
    ) -> Result<Vec<CompilerError>, CompilerError> {
        let reachable_blocks = self.collect_reachable_blocks(function)?;
        let reachable_block_set = reachable_blocks.iter().copied().collect::<FxHashSet<_>>();

        let mut blocks = Vec::with_capacity(reachable_blocks.len());
        for block_id in &reachable_blocks {
            blocks.push(self.block_by_id_or_error(*block_id, function)?);
        }

        let paths = match MovePathTable::build(function, &blocks, self.types, self.registry) {
            Ok(paths) => paths,
            Err(place) => {
                return Err(create_error!(
                    Compiler,
                    format!(
                        "Move analysis could not build a path for {:?} in function '{}'",
                        place, function.name
                    ),
                    function.location.to_error_location(&self.module.source_path),
                    { CompilationStage => "Move Analysis" }
                ));
            }
        };

        let local_types = local_types(function);
        let diagnostics = MoveDiagnostics::new(self.module, self.types, function, &paths);
        let context = MoveTransferContext {
            types: self.types,
            paths: &paths,
            local_types: &local_types,
            diagnostics: &diagnostics,
            function: function.id,
        };

        let mut initial_state = OwnershipState::new_uninitialized(paths.len());
        for param in &function.params {
            let Some(root) = paths.root(*param) else {
                return Err(diagnostics.internal(
                    format!(
                        "Move analysis could not map parameter {} of '{}' to a move path",
                        param, function.name
                    ),
                    diagnostics.function_error_location(),
                ));
            };

            initial_state.initialize(paths.subtree(root));
        }

        move_log!(format!(
            "[Move] Analyzing function '{}' (entry={} blocks={} paths={})",
            function.name,
            function.entry,
            reachable_blocks.len(),
            paths.len()
        ));

        // Phase 1: effects only, until nothing changes.
        let mut in_states: FxHashMap<BlockId, OwnershipState> = FxHashMap::default();
        let mut out_states: FxHashMap<BlockId, OwnershipState> = FxHashMap::default();
        in_states.insert(function.entry, initial_state);

        let mut worklist = VecDeque::new();
        worklist.push_back(function.entry);

        while let Some(block_id) = worklist.pop_front() {
            report.stats.worklist_iterations += 1;

            let Some(input_state) = in_states.get(&block_id).cloned() else {
                continue;
            };

            let block = self.block_by_id_or_error(block_id, function)?;
            let mut output_state = input_state;
            transfer_block(&context, block, &mut output_state, TransferMode::Fixpoint);

            let changed_out = match out_states.get(&block_id) {
                Some(existing) => existing != &output_state,
                None => true,
            };

            if !changed_out {
                continue;
            }

            out_states.insert(block_id, output_state.clone());

            for successor in block.terminator.successors() {
                if !reachable_block_set.contains(&successor) {
                    continue;
                }

                let next_state = match in_states.get(&successor) {
                    Some(existing) => existing.join(&output_state),
                    None => output_state.clone(),
                };

                let changed_in = match in_states.get(&successor) {
                    Some(existing) => existing != &next_state,
                    None => true,
                };

                if changed_in {
                    in_states.insert(successor, next_state);
                    worklist.push_back(successor);
                }
            }
        }

        // Phase 2: one replay per block on the converged state, for checks and facts.
        let mut errors = Vec::new();

        for block in &blocks {
            let Some(entry_state) = in_states.get(&block.id) else {
                continue;
            };

            let mut state = entry_state.clone();
            let block_stats = transfer_block(&context, block, &mut state, TransferMode::Report);
            self.merge_block_stats(report, block_stats, &mut errors);
            report.stats.blocks_analyzed += 1;
        }

        for block_id in &reachable_blocks {
            if let Some(state) = in_states.remove(block_id) {
                report.analysis.block_entry_states.insert(*block_id, state);
            }

            if let Some(state) = out_states.remove(block_id) {
                report.analysis.block_exit_states.insert(*block_id, state);
            }
        }

        report.stats.move_paths += paths.len();
        report.stats.content_paths += paths.content_path_count();
        report.analysis.function_paths.insert(function.id, paths);

        Ok(errors)
    }

    fn merge_block_stats(
        &self,
        report: &mut MoveCheckReport,
        block_stats: BlockTransferStats,
        errors: &mut Vec<CompilerError>,
    ) {
        report.stats.statements_analyzed += block_stats.statements_analyzed;
        report.stats.terminators_analyzed += block_stats.terminators_analyzed;

        for (statement_id, fact) in block_stats.statement_facts {
            report.analysis.statement_facts.insert(statement_id, fact);
        }

        if let Some((block_id, fact)) = block_stats.terminator_fact {
            report.analysis.terminator_facts.insert(block_id, fact);
        }

        errors.extend(block_stats.errors);
    }

    fn collect_reachable_blocks(
        &self,
        function: &HirFunction,
    ) -> Result<Vec<BlockId>, CompilerError> {
        let mut visited = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();

        queue.push_back(function.entry);

        while let Some(block_id) = queue.pop_front() {
            if !visited.insert(block_id) {
                continue;
            }

            order.push(block_id);

            let block = self.block_by_id_or_error(block_id, function)?;
            for next in block.terminator.successors() {
                queue.push_back(next);
            }
        }

        Ok(order)
    }

    fn block_by_id_or_error(
        &self,
        block_id: BlockId,
        function: &HirFunction,
    ) -> Result<&'a HirBlock, CompilerError> {
        let Some(index) = self.block_index_by_id.get(&block_id).copied() else {
            return Err(create_error!(
                Compiler,
                format!(
                    "Move analysis could not resolve block '{}' while analyzing function '{}'",
                    block_id, function.name
                ),
                function.location.to_error_location(&self.module.source_path),
                { CompilationStage => "Move Analysis" }
            ));
        };

        Ok(&self.module.blocks[index])
    }
}

/// The same error can be found once per operand of a statement.
fn dedup_errors(errors: Vec<CompilerError>) -> Vec<CompilerError> {
    let mut seen = FxHashSet::default();

    errors
        .into_iter()
        .filter(|error| {
            seen.insert((
                error.msg.to_owned(),
                error.location.start_pos.line_number,
                error.location.start_pos.char_column,
            ))
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests;
