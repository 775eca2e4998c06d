//! Text dumps of elaborated modules, for the CLI and for debugging.

use crate::backends::elaboration::abort_boundary::UnwindAction;
use crate::backends::lir::lir_nodes::{
    DerefOrigin, ElaboratedModule, LirBase, LirFunction, LirOperand, LirPlace, LirProjection,
    LirRvalue, LirStatement, LirTempType, LirTerminator,
};
use crate::compiler_frontend::hir::hir_datatypes::TypeContext;
use crate::compiler_frontend::hir::hir_display::display_const;
use crate::compiler_frontend::hir::hir_nodes::LocalId;
use rustc_hash::FxHashMap;
use std::fmt::Write as _;

pub struct LirDisplayContext<'a> {
    types: &'a TypeContext<'a>,
    local_names: FxHashMap<LocalId, &'a str>,
}

impl<'a> LirDisplayContext<'a> {
    pub fn for_function(function: &'a LirFunction, types: &'a TypeContext<'a>) -> Self {
        let local_names = function
            .locals
            .iter()
            .map(|local| (local.id, local.name.as_str()))
            .collect::<FxHashMap<_, _>>();

        Self { types, local_names }
    }

    pub fn place(&self, place: &LirPlace) -> String {
        let mut text = match place.base {
            LirBase::Local(local) => match self.local_names.get(&local) {
                Some(name) if !name.is_empty() => (*name).to_owned(),
                _ => format!("{}", local),
            },
            LirBase::Temp(temp) => format!("{}", temp),
        };

        for projection in &place.projections {
            text = match projection {
                LirProjection::Field(field) => format!("{}.{}", text, field),
                LirProjection::Pointee => format!("(*{})", text),
            };
        }

        text
    }

    pub fn operand(&self, operand: &LirOperand) -> String {
        match operand {
            LirOperand::Copy(place) => format!("copy {}", self.place(place)),
            LirOperand::Move(place) => format!("move {}", self.place(place)),
            LirOperand::Const(value) => display_const(value),
            LirOperand::Ref {
                place,
                mutable: true,
            } => format!("&mut {}", self.place(place)),
            LirOperand::Ref {
                place,
                mutable: false,
            } => format!("&{}", self.place(place)),
        }
    }

    pub fn rvalue(&self, rvalue: &LirRvalue) -> String {
        match rvalue {
            LirRvalue::Use(operand) => self.operand(operand),
            LirRvalue::Aggregate { ty, fields } => {
                let rendered = fields
                    .iter()
                    .map(|(field, operand)| format!("{}: {}", field, self.operand(operand)))
                    .collect::<Vec<_>>()
                    .join(", ");

                format!("{} {{ {} }}", self.types.name(*ty), rendered)
            }
        }
    }

    pub fn statement(&self, statement: &LirStatement, indent: usize, output: &mut String) {
        let pad = " ".repeat(indent);

        let line = match statement {
            LirStatement::Assign { dest, value } => {
                format!("{} = {}", self.place(dest), self.rvalue(value))
            }

            LirStatement::CallAccessor {
                dest,
                owner,
                accessor,
                unwind,
            } => format!(
                "{} = {}(&mut {}){}",
                dest,
                accessor,
                self.place(owner),
                unwind_suffix(*unwind)
            ),

            LirStatement::NewUninit {
                dest,
                ty,
                args,
                unwind,
            } => format!(
                "{} = {}::new_uninit({}){}",
                self.place(dest),
                self.types.name(*ty),
                args.as_ref()
                    .map(|args| self.operand(args))
                    .unwrap_or_default(),
                unwind_suffix(*unwind)
            ),

            LirStatement::AllocStorage {
                dest,
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
                    self.place(dest),
                    self.types.name(*ty),
                    args_text,
                    self.operand(value)
                )
            }

            LirStatement::DropInPlace { place, unwind } => {
                format!("drop_in_place({}){}", self.place(place), unwind_suffix(*unwind))
            }

            LirStatement::DropHusk { place, unwind } => {
                format!("drop_husk({}){}", self.place(place), unwind_suffix(*unwind))
            }

            LirStatement::SetDropFlag { flag, value } => format!("{} = {}", flag, value),

            LirStatement::IfDropFlag { flag, body } => {
                let _ = writeln!(output, "{}if {} {{", pad, flag);
                for inner in body {
                    self.statement(inner, indent + 4, output);
                }
                let _ = writeln!(output, "{}}}", pad);
                return;
            }

            LirStatement::Call {
                function,
                args,
                result,
            } => {
                let args_text = args
                    .iter()
                    .map(|arg| self.operand(arg))
                    .collect::<Vec<_>>()
                    .join(", ");

                match result {
                    Some(result) => format!("{} = {}({})", self.place(result), function, args_text),
                    None => format!("{}({})", function, args_text),
                }
            }

            LirStatement::Deref {
                dest,
                owner,
                mutable,
                origin,
            } => {
                let callee = if *mutable {
                    "DerefMut::deref_mut(&mut "
                } else {
                    "Deref::deref(&"
                };

                let origin = match origin {
                    DerefOrigin::Explicit => "",
                    DerefOrigin::Overloaded => " // overloaded",
                };

                format!("{} = {}{}){}", self.place(dest), callee, self.place(owner), origin)
            }

            LirStatement::Observe(operand) => format!("observe({})", self.operand(operand)),
        };

        let _ = writeln!(output, "{}{};", pad, line);
    }

    pub fn terminator(&self, terminator: &LirTerminator) -> String {
        match terminator {
            LirTerminator::Goto { target } => format!("goto {}", target),
            LirTerminator::If {
                condition,
                then_block,
                else_block,
            } => format!(
                "if {} then {} else {}",
                self.operand(condition),
                then_block,
                else_block
            ),
            LirTerminator::Return { value: Some(value) } => {
                format!("return {}", self.operand(value))
            }
            LirTerminator::Return { value: None } => String::from("return"),
            LirTerminator::Panic {
                message: Some(message),
            } => format!("panic({:?})", message),
            LirTerminator::Panic { message: None } => String::from("panic"),
        }
    }
}

fn unwind_suffix(unwind: UnwindAction) -> &'static str {
    match unwind {
        UnwindAction::Abort => " [abort on panic]",
        UnwindAction::Propagate => "",
    }
}

pub fn display_elaborated_module(module: &ElaboratedModule) -> String {
    let types = TypeContext::new(&module.types);
    let mut output = String::new();

    for function in &module.functions {
        let context = LirDisplayContext::for_function(function, &types);

        let params = function
            .params
            .iter()
            .map(|param| context.place(&LirPlace::local(*param)))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(output, "fn {}({}) {{", function.name, params);

        for local in &function.locals {
            let _ = writeln!(output, "    let {}: {};", context.place(&LirPlace::local(local.id)), types.name(local.ty));
        }

        for temp in &function.temps {
            let ty = match temp.ty {
                LirTempType::Value(ty) => types.name(ty),
                LirTempType::RawMut(ty) => format!("*mut {}", types.name(ty)),
                LirTempType::Ref {
                    target,
                    mutable: true,
                } => format!("&mut {}", types.name(target)),
                LirTempType::Ref {
                    target,
                    mutable: false,
                } => format!("&{}", types.name(target)),
            };
            let _ = writeln!(output, "    let {}: {};", temp.id, ty);
        }

        for flag in &function.drop_flags {
            let _ = writeln!(output, "    let {}: bool; // {}", flag.id, flag.place);
        }

        for block in &function.blocks {
            let _ = writeln!(output, "  {}:", block.id);
            for statement in &block.statements {
                context.statement(statement, 4, &mut output);
            }
            let _ = writeln!(output, "    {};", context.terminator(&block.terminator));
        }

        output.push_str("}\n");
    }

    output
}
