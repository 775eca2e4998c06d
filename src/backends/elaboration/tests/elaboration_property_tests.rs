#![cfg(test)]

use crate::backends::elaboration::tests::test_support::{elaborate_module, run_with};
use crate::compiler_frontend::analysis::move_checker::tests::test_support::{
    build_module, cell_capabilities,
};
use crate::compiler_frontend::hir::hir_builder::{
    aggregate, copy, deref, field, local, mv, resource,
};
use crate::compiler_frontend::hir::hir_nodes::FieldId;
use crate::runtime::interpreter::InterpreterHooks;
use crate::runtime::values::{Outcome, Value};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum ContentOp {
    ReadWhole,
    MoveWhole,
    MoveLeft,
    MoveRight,
    WriteWhole,
    WriteLeft,
    WriteRight,
}

fn arb_content_op() -> impl Strategy<Value = ContentOp> {
    prop_oneof![
        Just(ContentOp::ReadWhole),
        Just(ContentOp::MoveWhole),
        Just(ContentOp::MoveLeft),
        Just(ContentOp::MoveRight),
        Just(ContentOp::WriteWhole),
        Just(ContentOp::WriteLeft),
        Just(ContentOp::WriteRight),
    ]
}

/// The payload in each field of the `PairCell` content, if any.
#[derive(Debug, Clone)]
struct Expected {
    left: Option<i64>,
    right: Option<i64>,
    dropped: Vec<i64>,
}

impl Expected {
    fn whole(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }

    /// Applies an op move analysis accepts. Returns false for ops it would reject.
    fn step(&mut self, op: ContentOp, payload: i64) -> bool {
        match op {
            ContentOp::ReadWhole => self.whole(),
            ContentOp::MoveWhole => {
                if !self.whole() {
                    return false;
                }
                self.left = None;
                self.right = None;
                true
            }
            ContentOp::MoveLeft => {
                if !self.whole() {
                    return false;
                }
                self.left = None;
                true
            }
            ContentOp::MoveRight => {
                if !self.whole() {
                    return false;
                }
                self.right = None;
                true
            }
            ContentOp::WriteWhole => {
                self.dropped.extend(self.left.take());
                self.dropped.extend(self.right.take());
                self.left = Some(payload);
                self.right = Some(payload + 1);
                true
            }
            // Field writes need the content itself to be there.
            ContentOp::WriteLeft => {
                if self.left.is_none() && self.right.is_none() {
                    return false;
                }
                self.dropped.extend(self.left.take());
                self.left = Some(payload);
                true
            }
            ContentOp::WriteRight => {
                if self.left.is_none() && self.right.is_none() {
                    return false;
                }
                self.dropped.extend(self.right.take());
                self.right = Some(payload);
                true
            }
        }
    }
}

/// Keeps only the ops move analysis accepts, so every generated program elaborates.
fn accepted(ops: &[ContentOp]) -> (Vec<(ContentOp, i64)>, Expected) {
    let mut expected = Expected {
        left: Some(100),
        right: Some(101),
        dropped: Vec::new(),
    };

    let mut kept = Vec::new();
    for (index, op) in ops.iter().enumerate() {
        let payload = 1000 + index as i64 * 2;
        let mut trial = expected.clone();
        if trial.step(*op, payload) {
            expected = trial;
            kept.push((*op, payload));
        }
    }

    // Scope end.
    expected.dropped.extend(expected.left.take());
    expected.dropped.extend(expected.right.take());

    (kept, expected)
}

proptest! {
    #[test]
    fn every_payload_is_dropped_exactly_once_in_order(
        ops in prop::collection::vec(arb_content_op(), 0..20)
    ) {
        let (kept, expected) = accepted(&ops);

        let (module, types) = build_module(|builder, t| {
            let mut f = builder.function("main");
            let pc = f.param("pc", t.pair_cell);
            let content = deref(local(pc));

            for (line, (op, payload)) in kept.iter().enumerate() {
                f.at_line(line as i32 + 1);

                match op {
                    ContentOp::ReadWhole => {
                        f.observe(copy(content.clone()));
                    }
                    ContentOp::MoveWhole => {
                        f.observe(mv(content.clone()));
                    }
                    ContentOp::MoveLeft => {
                        f.observe(mv(field(content.clone(), 0)));
                    }
                    ContentOp::MoveRight => {
                        f.observe(mv(field(content.clone(), 1)));
                    }
                    ContentOp::WriteWhole => {
                        f.assign(
                            content.clone(),
                            aggregate(t.pair, vec![resource(*payload), resource(*payload + 1)]),
                        );
                    }
                    ContentOp::WriteLeft => {
                        f.assign_operand(field(content.clone(), 0), resource(*payload));
                    }
                    ContentOp::WriteRight => {
                        f.assign_operand(field(content.clone(), 1), resource(*payload));
                    }
                }
            }

            f.finish();
        });

        let elaborated = elaborate_module(&module, &cell_capabilities(&types));
        let pair = types.pair;
        let pair_cell = types.pair_cell;

        let result = run_with(
            &elaborated,
            "main",
            |interpreter| {
                let content = Value::Struct {
                    ty: pair,
                    fields: vec![
                        (FieldId(0), Value::Resource(100)),
                        (FieldId(1), Value::Resource(101)),
                    ],
                };
                vec![interpreter.alloc_owner(pair_cell, content)]
            },
            InterpreterHooks::default(),
        );

        prop_assert_eq!(&result.outcome, &Outcome::Returned(None));
        prop_assert_eq!(result.dropped_resources(), expected.dropped);
        prop_assert_eq!(result.husk_drops(), 1);
    }
}
