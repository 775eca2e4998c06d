//! HIR Display
//!
//! Turns HIR places and statements back into readable text.
//! Diagnostics use this for place names (`(*cell).value`), and the CLI uses it
//! to dump whole modules for debugging.

use crate::compiler_frontend::hir::hir_datatypes::{TypeContext, local_types};
use crate::compiler_frontend::hir::hir_nodes::{
    BlockId, CallTarget, ConstValue, HirBlock, HirFunction, HirModule, HirOperand, HirPlace, HirRvalue,
    HirStatement, HirStatementKind, HirTerminator, LocalId, TypeId,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::Write as _;

pub struct HirDisplayContext<'a> {
    types: &'a TypeContext<'a>,
    local_names: FxHashMap<LocalId, &'a str>,
    local_types: FxHashMap<LocalId, TypeId>,
}

impl<'a> HirDisplayContext<'a> {
    pub fn for_function(function: &'a HirFunction, types: &'a TypeContext<'a>) -> Self {
        let local_names = function
            .locals
            .iter()
            .map(|local| (local.id, local.name.as_str()))
            .collect::<FxHashMap<_, _>>();

        Self {
            types,
            local_names,
            local_types: local_types(function),
        }
    }

    pub fn local_name(&self, local: LocalId) -> String {
        match self.local_names.get(&local) {
            Some(name) if !name.is_empty() => (*name).to_owned(),
            _ => format!("{}", local),
        }
    }

    pub fn place(&self, place: &HirPlace) -> String {
        match place {
            HirPlace::Local(local) => self.local_name(*local),

            HirPlace::Field { base, field } => {
                let base_text = match base.as_ref() {
                    HirPlace::Deref(_) => format!("({})", self.place(base)),
                    _ => self.place(base),
                };

                let field_name = match self.types.place_type(&self.local_types, base) {
                    Some(base_type) => self.types.field_name(base_type, *field),
                    None => format!("{}", field),
                };

                format!("{}.{}", base_text, field_name)
            }

            HirPlace::Deref(base) => format!("*{}", self.place(base)),
        }
    }

    pub fn operand(&self, operand: &HirOperand) -> String {
        match operand {
            HirOperand::Copy(place) => format!("copy {}", self.place(place)),
            HirOperand::Move(place) => format!("move {}", self.place(place)),
            HirOperand::Const(value) => display_const(value),
            HirOperand::Borrow { place, mutable } => {
                if *mutable {
                    format!("&mut {}", self.place(place))
                } else {
                    format!("&{}", self.place(place))
                }
            }
        }
    }

    pub fn rvalue(&self, rvalue: &HirRvalue) -> String {
        match rvalue {
            HirRvalue::Use(operand) => self.operand(operand),
            HirRvalue::Aggregate { ty, fields } => {
                let rendered = fields
                    .iter()
                    .map(|(field, operand)| {
                        format!(
                            "{}: {}",
                            self.types.field_name(*ty, *field),
                            self.operand(operand)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ");

                format!("{} {{ {} }}", self.types.name(*ty), rendered)
            }
        }
    }

    pub fn statement(&self, statement: &HirStatement) -> String {
        match &statement.kind {
            HirStatementKind::Assign { target, value } => {
                format!("{} = {}", self.place(target), self.rvalue(value))
            }

            HirStatementKind::Construct {
                target,
                ty,
                args,
                value,
            } => {
                let args_text = match args {
                    Some(args) => format!("{}, ", self.operand(args)),
                    None => String::new(),
                };

                format!(
                    "{} = {}::new({}{})",
                    self.place(target),
                    self.types.name(*ty),
                    args_text,
                    self.rvalue(value)
                )
            }

            HirStatementKind::Call {
                target,
                args,
                result,
            } => {
                let callee = match target {
                    CallTarget::Function(id) => format!("{}", id),
                    CallTarget::UserDeref { mutable: true } => String::from("DerefMut::deref_mut"),
                    CallTarget::UserDeref { mutable: false } => String::from("Deref::deref"),
                };

                let args_text = args
                    .iter()
                    .map(|arg| self.operand(arg))
                    .collect::<Vec<_>>()
                    .join(", ");

                match result {
                    Some(result) => format!("{} = {}({})", self.place(result), callee, args_text),
                    None => format!("{}({})", callee, args_text),
                }
            }

            HirStatementKind::Observe(operand) => format!("observe({})", self.operand(operand)),

            HirStatementKind::Drop(local) => format!("drop({})", self.local_name(*local)),
        }
    }

    pub fn terminator(&self, terminator: &HirTerminator) -> String {
        match terminator {
            HirTerminator::Jump { target } => format!("goto {}", target),
            HirTerminator::If {
                condition,
                then_block,
                else_block,
            } => format!(
                "if {} then {} else {}",
                self.operand(condition),
                then_block,
                else_block
            ),
            HirTerminator::Return { value: Some(value) } => {
                format!("return {}", self.operand(value))
            }
            HirTerminator::Return { value: None } => String::from("return"),
            HirTerminator::Panic { message } => match message {
                Some(message) => format!("panic({:?})", message),
                None => String::from("panic"),
            },
        }
    }
}

pub fn display_const(value: &ConstValue) -> String {
    match value {
        ConstValue::Int(value) => format!("{}", value),
        ConstValue::Bool(value) => format!("{}", value),
        ConstValue::Resource(payload) => format!("resource({})", payload),
    }
}

/// Renders a whole module in a compact, MIR-like text form.
pub fn display_module(module: &HirModule) -> String {
    let types = TypeContext::new(&module.types);
    let blocks = module
        .blocks
        .iter()
        .map(|block| (block.id, block))
        .collect::<FxHashMap<_, _>>();

    let mut output = String::new();

    for function in &module.functions {
        let context = HirDisplayContext::for_function(function, &types);

        let params = function
            .params
            .iter()
            .map(|param| context.local_name(*param))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(output, "fn {}({}) {{", function.name, params);

        for local in &function.locals {
            let _ = writeln!(
                output,
                "    let {}: {}; // {}",
                context.local_name(local.id),
                types.name(local.ty),
                local.id
            );
        }

        let mut block_ids = collect_function_blocks(function, &blocks);
        block_ids.sort_by_key(|block| block.id);

        for block in block_ids {
            let _ = writeln!(output, "  {}:", block.id);
            for statement in &block.statements {
                let _ = writeln!(output, "    {};", context.statement(statement));
            }
            let _ = writeln!(output, "    {};", context.terminator(&block.terminator));
        }

        output.push_str("}\n");
    }

    output
}

fn collect_function_blocks<'a>(
    function: &HirFunction,
    blocks: &FxHashMap<BlockId, &'a HirBlock>,
) -> Vec<&'a HirBlock> {
    let mut seen = FxHashSet::default();
    let mut stack = vec![function.entry];
    let mut found = Vec::new();

    while let Some(block_id) = stack.pop() {
        if !seen.insert(block_id) {
            continue;
        }

        let Some(block) = blocks.get(&block_id) else {
            continue;
        };

        found.push(*block);
        stack.extend(block.terminator.successors());
    }

    found
}
