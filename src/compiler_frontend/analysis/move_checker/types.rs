use crate::compiler_frontend::analysis::move_checker::move_paths::{MovePathIndex, MovePathTable};
use crate::compiler_frontend::analysis::move_checker::state::{InitStatus, OwnershipState};
use crate::compiler_frontend::hir::hir_nodes::{BlockId, FunctionId, HirNodeId};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct MoveCheckReport {
    pub analysis: MoveAnalysis,
    pub stats: MoveCheckStats,
}

/// Everything the elaborator needs from move analysis. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct MoveAnalysis {
    pub function_paths: FxHashMap<FunctionId, MovePathTable>,
    pub block_entry_states: FxHashMap<BlockId, OwnershipState>,
    pub block_exit_states: FxHashMap<BlockId, OwnershipState>,

    /// State before each statement.
    pub statement_facts: FxHashMap<HirNodeId, OwnershipFact>,

    /// State before each block's terminator.
    pub terminator_facts: FxHashMap<BlockId, OwnershipFact>,
}

impl MoveAnalysis {
    pub fn total_state_snapshots(&self) -> usize {
        self.block_entry_states.len() + self.block_exit_states.len()
    }

    pub fn paths(&self, function: FunctionId) -> Option<&MovePathTable> {
        self.function_paths.get(&function)
    }

    pub fn statement_fact(&self, id: HirNodeId) -> Option<&OwnershipFact> {
        self.statement_facts.get(&id)
    }

    pub fn terminator_fact(&self, block: BlockId) -> Option<&OwnershipFact> {
        self.terminator_facts.get(&block)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MoveCheckStats {
    pub functions_analyzed: usize,
    pub blocks_analyzed: usize,
    pub statements_analyzed: usize,
    pub terminators_analyzed: usize,
    pub worklist_iterations: usize,
    pub move_paths: usize,
    pub content_paths: usize,
}

/// Which sub-paths of a function's values hold a value at one program point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipFact {
    pub function: FunctionId,
    pub state: OwnershipState,
}

impl OwnershipFact {
    pub fn status(&self, path: MovePathIndex) -> InitStatus {
        self.state.status(path)
    }

    pub fn is_definitely_init(&self, path: MovePathIndex) -> bool {
        self.state.is_definitely_init(path)
    }
}
