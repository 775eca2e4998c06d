// Reference interpreter for elaborated modules.
//
// Runs LIR directly over a small abstract machine: frames of locals and
// temps, plus heap slots that owners point at. It exists to check that
// elaborated code keeps its promises. Every value needing drop is dropped
// exactly once, nothing is read after a move, and owner storage is only
// reached through live owners.
//
// Anything elaborated code does that real code would turn into undefined
// behaviour or a leak is reported as a runtime error instead of executed.

use crate::backends::elaboration::abort_boundary::{SynthesizedSite, UnwindAction};
use crate::backends::lir::lir_nodes::{
    DerefOrigin, DropFlagId, ElaboratedModule, LirBase, LirFunction, LirOperand, LirPlace,
    LirProjection, LirRvalue, LirStatement, LirTerminator, TempId,
};
use crate::compiler_frontend::compiler_errors::CompilerError;
use crate::compiler_frontend::hir::hir_datatypes::TypeContext;
use crate::compiler_frontend::hir::hir_nodes::{FunctionId, LocalId, TypeId};
use crate::runtime::values::{
    Location, Outcome, Root, RunResult, RuntimeEvent, SlotId, Value,
};
use crate::{return_runtime_error, runtime_log, timer_log};
use rustc_hash::{FxHashMap, FxHashSet};
use std::time::Instant;

pub const DEFAULT_MAX_STEPS: usize = 100_000;

/// Fault injection and limits for a run.
#[derive(Debug, Clone)]
pub struct InterpreterHooks {
    /// Every storage accessor and deref call panics.
    pub panicking_derefs: bool,

    /// Dropping a resource with one of these payloads panics.
    pub panicking_resource_drops: Vec<i64>,

    /// Every `new_uninit` call panics before any storage is handed out.
    pub panicking_new_uninit: bool,

    /// Each accessor call moves the content to a fresh slot and releases the old one.
    /// Pointers held across a call then dangle.
    pub relocate_on_access: bool,

    pub max_steps: usize,
}

impl Default for InterpreterHooks {
    fn default() -> Self {
        InterpreterHooks {
            panicking_derefs: false,
            panicking_resource_drops: Vec::new(),
            panicking_new_uninit: false,
            relocate_on_access: false,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug)]
struct Slot {
    ty: TypeId,
    content: Value,
    live: bool,
}

struct Frame<'m> {
    function: &'m LirFunction,
    locals: FxHashMap<LocalId, Value>,
    temps: FxHashMap<TempId, Value>,
    flags: FxHashMap<DropFlagId, bool>,
}

impl<'m> Frame<'m> {
    fn new(function: &'m LirFunction) -> Self {
        Frame {
            function,
            locals: FxHashMap::default(),
            temps: FxHashMap::default(),
            flags: FxHashMap::default(),
        }
    }
}

/// Why execution stopped before a return.
enum Stop {
    Panic(Option<String>),
    Abort(SynthesizedSite),
    Error(CompilerError),
}

impl From<CompilerError> for Stop {
    fn from(error: CompilerError) -> Self {
        Stop::Error(error)
    }
}

pub struct Interpreter<'m> {
    module: &'m ElaboratedModule,
    types: TypeContext<'m>,
    hooks: InterpreterHooks,

    frames: Vec<Frame<'m>>,
    slots: Vec<Slot>,
    events: Vec<RuntimeEvent>,
    steps: usize,
}

impl<'m> Interpreter<'m> {
    pub fn new(module: &'m ElaboratedModule, hooks: InterpreterHooks) -> Self {
        Interpreter {
            module,
            types: TypeContext::new(&module.types),
            hooks,
            frames: Vec::new(),
            slots: Vec::new(),
            events: Vec::new(),
            steps: 0,
        }
    }

    /// Runs `entry` to completion.
    ///
    /// Panics and aborts in the program are outcomes, not errors. Errors are
    /// reserved for elaborated code breaking the rules of the machine.
    pub fn run(&mut self, entry: &str, args: Vec<Value>) -> Result<RunResult, CompilerError> {
        let time = Instant::now();
        let module = self.module;

        let Some(function) = module.function_by_name(entry) else {
            return_runtime_error!(format!("No function named '{}' to run", entry), {
                VariableName => entry,
            });
        };

        self.frames.clear();
        self.events.clear();
        self.steps = 0;

        let outcome = match self.call_function(function.id, args) {
            Ok(value) => {
                self.expect_storage_released(value.as_ref())?;
                Outcome::Returned(value)
            }
            Err(Stop::Panic(message)) => Outcome::Panicked { message },
            Err(Stop::Abort(site)) => Outcome::Aborted { site },
            Err(Stop::Error(error)) => return Err(error),
        };

        runtime_log!(Green "[Run] ", Bold entry, format!(" finished after {} steps", self.steps));
        timer_log!(time, "Interpreter finished in: ");

        Ok(RunResult {
            outcome,
            events: std::mem::take(&mut self.events),
            steps: self.steps,
        })
    }

    /// Storage created outside any function, for passing owners in as arguments.
    pub fn alloc_owner(&mut self, ty: TypeId, content: Value) -> Value {
        let slot = self.alloc_slot(ty, content);
        Value::Owner { slot, ty }
    }

    // ------------------------------
    //  Calls
    // ------------------------------
    fn call_function(&mut self, id: FunctionId, args: Vec<Value>) -> Result<Option<Value>, Stop> {
        let module = self.module;
        let Some(function) = module.function(id) else {
            return_runtime_error!(format!("Call to unknown function {}", id));
        };

        if args.len() != function.params.len() {
            return_runtime_error!(format!(
                "'{}' takes {} arguments but was called with {}",
                function.name,
                function.params.len(),
                args.len()
            ));
        }

        runtime_log!(Cyan "[Run] call ", Bold function.name.as_str());

        let mut frame = Frame::new(function);
        for (param, arg) in function.params.iter().zip(args) {
            frame.locals.insert(*param, arg);
        }
        self.frames.push(frame);

        let mut current = function.entry;
        loop {
            let Some(block) = function.block(current) else {
                return_runtime_error!(format!(
                    "'{}' jumps to {} which doesn't exist",
                    function.name, current
                ));
            };

            for statement in &block.statements {
                self.execute(statement)?;
            }

            self.step()?;
            match &block.terminator {
                LirTerminator::Goto { target } => current = *target,

                LirTerminator::If {
                    condition,
                    then_block,
                    else_block,
                } => match self.operand(condition)? {
                    Value::Bool(true) => current = *then_block,
                    Value::Bool(false) => current = *else_block,
                    other => {
                        return_runtime_error!(format!(
                            "Branch condition in '{}' is {}, not a bool",
                            function.name, other
                        ));
                    }
                },

                LirTerminator::Return { value } => {
                    let value = match value {
                        Some(operand) => Some(self.operand(operand)?),
                        None => None,
                    };

                    self.pop_frame()?;
                    return Ok(value);
                }

                // No cleanup. Everything still alive is abandoned with the program.
                LirTerminator::Panic { message } => return Err(Stop::Panic(message.to_owned())),
            }
        }
    }

    /// Locals and temps must not take anything that needs drop with them.
    fn pop_frame(&mut self) -> Result<(), CompilerError> {
        let Some(frame) = self.frames.pop() else {
            return_runtime_error!("Return with no frame on the stack");
        };

        let name = &frame.function.name;

        let mut locals: Vec<_> = frame.locals.iter().collect();
        locals.sort_by_key(|(local, _)| **local);
        for (local, value) in locals {
            if value.holds_resources() {
                return_runtime_error!(
                    format!("'{}' returned while {} still holds {}", name, local, value),
                    { VariableName => local }
                );
            }
        }

        let mut temps: Vec<_> = frame.temps.iter().collect();
        temps.sort_by_key(|(temp, _)| **temp);
        for (temp, value) in temps {
            if value.holds_resources() {
                return_runtime_error!(
                    format!("'{}' returned while {} still holds {}", name, temp, value),
                    { VariableName => temp }
                );
            }
        }

        Ok(())
    }

    fn step(&mut self) -> Result<(), CompilerError> {
        self.steps += 1;
        if self.steps > self.hooks.max_steps {
            return_runtime_error!(format!(
                "Program ran for more than {} steps",
                self.hooks.max_steps
            ));
        }

        Ok(())
    }

    // ------------------------------
    //  Statements
    // ------------------------------
    fn execute(&mut self, statement: &'m LirStatement) -> Result<(), Stop> {
        self.step()?;

        match statement {
            LirStatement::Assign { dest, value } => {
                let value = self.rvalue(value)?;
                let location = self.resolve(dest)?;
                self.store(&location, value)?;
            }

            LirStatement::CallAccessor {
                dest,
                owner,
                accessor,
                unwind,
            } => {
                let location = self.resolve(owner)?;
                let (slot, ty) = self.owner_at(&location)?;

                self.events.push(RuntimeEvent::AccessorCalled { ty, slot });
                if self.hooks.panicking_derefs {
                    return Err(self.panic_at(
                        *unwind,
                        SynthesizedSite::StorageAccessor,
                        format!("{} panicked", accessor),
                    ));
                }

                let slot = if self.hooks.relocate_on_access {
                    self.relocate(&location, slot, ty)?
                } else {
                    slot
                };

                let pointer = Value::Pointer(Location::new(Root::Slot(slot)));
                self.current_frame()?.temps.insert(*dest, pointer);
            }

            LirStatement::NewUninit {
                dest,
                ty,
                args,
                unwind,
            } => {
                if let Some(args) = args {
                    self.operand(args)?;
                }

                if self.hooks.panicking_new_uninit {
                    return Err(self.panic_at(
                        *unwind,
                        SynthesizedSite::NewUninit,
                        format!("new_uninit for '{}' panicked", self.types.name(*ty)),
                    ));
                }

                let slot = self.alloc_slot(*ty, Value::Uninit);
                let location = self.resolve(dest)?;
                self.store(&location, Value::Owner { slot, ty: *ty })?;
            }

            LirStatement::AllocStorage {
                dest,
                ty,
                args,
                value,
            } => {
                if let Some(args) = args {
                    self.operand(args)?;
                }

                let content = self.operand(value)?;
                let slot = self.alloc_slot(*ty, content);
                self.events.push(RuntimeEvent::StorageCopy { slot });

                let location = self.resolve(dest)?;
                self.store(&location, Value::Owner { slot, ty: *ty })?;
            }

            LirStatement::DropInPlace { place, unwind } => {
                let location = self.resolve(place)?;
                let value = self.take(&location)?;

                if !value.is_whole() {
                    return_runtime_error!(format!(
                        "Full drop of {} which is only partly initialized: {}",
                        location, value
                    ));
                }

                self.drop_value(value, *unwind)?;
            }

            LirStatement::DropHusk { place, .. } => {
                let location = self.resolve(place)?;
                let (slot, ty) = self.owner_at(&location)?;

                let content = &self.slots[slot.0 as usize].content;
                if content.holds_resources() {
                    return_runtime_error!(format!(
                        "Husk drop of {} releases {} while it still holds {}",
                        location, slot, content
                    ));
                }

                self.take(&location)?;
                self.release_slot(slot, ty);
            }

            LirStatement::SetDropFlag { flag, value } => {
                self.current_frame()?.flags.insert(*flag, *value);
            }

            LirStatement::IfDropFlag { flag, body } => {
                let Some(set) = self.current_frame()?.flags.get(flag).copied() else {
                    return_runtime_error!(format!("{} read before it was ever set", flag));
                };

                if set {
                    for statement in body {
                        self.execute(statement)?;
                    }
                }
            }

            LirStatement::Call {
                function,
                args,
                result,
            } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.operand(arg)?);
                }

                let returned = self.call_function(*function, values)?;

                if let Some(result) = result {
                    let Some(returned) = returned else {
                        return_runtime_error!(format!(
                            "Result of {} is used but it returned nothing",
                            function
                        ));
                    };

                    let location = self.resolve(result)?;
                    self.store(&location, returned)?;
                }
            }

            LirStatement::Deref {
                dest,
                owner,
                mutable,
                origin,
            } => {
                let location = self.resolve(owner)?;
                let (slot, _) = self.owner_at(&location)?;

                if *origin == DerefOrigin::Explicit {
                    self.events
                        .push(RuntimeEvent::UserDerefCalled { mutable: *mutable });
                }

                // Deref impls are user code. Their panics always unwind.
                if self.hooks.panicking_derefs {
                    return Err(Stop::Panic(Some(String::from("deref panicked"))));
                }

                let dest = self.resolve(dest)?;
                self.store(&dest, Value::Pointer(Location::new(Root::Slot(slot))))?;
            }

            LirStatement::Observe(operand) => {
                let value = self.operand(operand)?;
                runtime_log!(Blue "[Run] observed ", format!("{}", value));
                self.events.push(RuntimeEvent::Observed(value));
            }
        }

        Ok(())
    }

    fn panic_at(&self, unwind: UnwindAction, site: SynthesizedSite, message: String) -> Stop {
        match unwind {
            UnwindAction::Abort => Stop::Abort(site),
            UnwindAction::Propagate => Stop::Panic(Some(message)),
        }
    }

    // ------------------------------
    //  Drop glue
    // ------------------------------
    fn drop_value(&mut self, value: Value, unwind: UnwindAction) -> Result<(), Stop> {
        match value {
            Value::Uninit | Value::Moved => {
                return_runtime_error!(format!("Drop glue reached a value that is {}", value));
            }

            Value::Int(_) | Value::Bool(_) | Value::Pointer(_) => Ok(()),

            Value::Resource(payload) => {
                if self.hooks.panicking_resource_drops.contains(&payload) {
                    return Err(self.panic_at(
                        unwind,
                        SynthesizedSite::ContentDrop,
                        format!("drop of resource({}) panicked", payload),
                    ));
                }

                runtime_log!(Yellow "[Run] dropped ", format!("resource({})", payload));
                self.events.push(RuntimeEvent::ResourceDropped(payload));
                Ok(())
            }

            Value::Struct { fields, .. } => {
                for (_, field) in fields {
                    self.drop_value(field, unwind)?;
                }
                Ok(())
            }

            Value::Owner { slot, ty } => {
                self.expect_live(slot)?;
                let content = std::mem::replace(
                    &mut self.slots[slot.0 as usize].content,
                    Value::Moved,
                );

                self.drop_value(content, unwind)?;
                self.release_slot(slot, ty);
                Ok(())
            }
        }
    }

    // ------------------------------
    //  Storage
    // ------------------------------
    fn alloc_slot(&mut self, ty: TypeId, content: Value) -> SlotId {
        let slot = SlotId(self.slots.len() as u32);
        self.slots.push(Slot {
            ty,
            content,
            live: true,
        });
        slot
    }

    fn release_slot(&mut self, slot: SlotId, ty: TypeId) {
        if let Some(storage) = self.slots.get_mut(slot.0 as usize) {
            storage.live = false;
            storage.content = Value::Moved;
        }

        self.events.push(RuntimeEvent::HuskDropped { ty, slot });
    }

    fn relocate(&mut self, owner: &Location, slot: SlotId, ty: TypeId) -> Result<SlotId, CompilerError> {
        let content = std::mem::replace(&mut self.slots[slot.0 as usize].content, Value::Moved);
        self.slots[slot.0 as usize].live = false;

        let moved_to = self.alloc_slot(ty, content);
        runtime_log!(Dark Yellow "[Run] relocated ", format!("{}", slot), " to ", format!("{}", moved_to));

        *self.location_mut(owner)? = Value::Owner { slot: moved_to, ty };
        Ok(moved_to)
    }

    fn expect_live(&self, slot: SlotId) -> Result<(), CompilerError> {
        match self.slots.get(slot.0 as usize) {
            Some(storage) if storage.live => Ok(()),
            Some(_) => return_runtime_error!(format!("Access to {} after it was released", slot)),
            None => return_runtime_error!(format!("Access to {} which was never allocated", slot)),
        }
    }

    fn owner_at(&mut self, location: &Location) -> Result<(SlotId, TypeId), CompilerError> {
        let (slot, ty) = match self.location_mut(location)? {
            Value::Owner { slot, ty } => (*slot, *ty),
            other => {
                return_runtime_error!(format!(
                    "Expected an owner at {}, found {}",
                    location, other
                ));
            }
        };

        self.expect_live(slot)?;
        Ok((slot, ty))
    }

    /// Live storage the returned value doesn't own was leaked.
    fn expect_storage_released(&self, returned: Option<&Value>) -> Result<(), CompilerError> {
        let mut owned = FxHashSet::default();
        if let Some(value) = returned {
            self.collect_owned_slots(value, &mut owned);
        }

        for (index, storage) in self.slots.iter().enumerate() {
            let slot = SlotId(index as u32);
            if storage.live && !owned.contains(&slot) {
                return_runtime_error!(format!(
                    "{} of type '{}' was never released. It still holds {}",
                    slot,
                    self.types.name(storage.ty),
                    storage.content
                ));
            }
        }

        Ok(())
    }

    fn collect_owned_slots(&self, value: &Value, owned: &mut FxHashSet<SlotId>) {
        match value {
            Value::Owner { slot, .. } => {
                if owned.insert(*slot) {
                    if let Some(storage) = self.slots.get(slot.0 as usize) {
                        self.collect_owned_slots(&storage.content, owned);
                    }
                }
            }
            Value::Struct { fields, .. } => {
                for (_, field) in fields {
                    self.collect_owned_slots(field, owned);
                }
            }
            _ => {}
        }
    }

    // ------------------------------
    //  Places and operands
    // ------------------------------
    fn current_frame(&mut self) -> Result<&mut Frame<'m>, CompilerError> {
        match self.frames.last_mut() {
            Some(frame) => Ok(frame),
            None => return_runtime_error!("No active frame"),
        }
    }

    fn resolve(&mut self, place: &LirPlace) -> Result<Location, CompilerError> {
        let frame = self.frames.len().saturating_sub(1);

        let mut location = Location::new(match place.base {
            LirBase::Local(local) => Root::Local { frame, local },
            LirBase::Temp(temp) => Root::Temp { frame, temp },
        });

        for projection in &place.projections {
            match projection {
                LirProjection::Field(field) => location.fields.push(*field),

                LirProjection::Pointee => {
                    let target = match self.location_mut(&location)? {
                        Value::Pointer(target) => target.clone(),
                        other => {
                            return_runtime_error!(format!(
                                "{} is dereferenced but holds {}",
                                location, other
                            ));
                        }
                    };
                    location = target;
                }
            }
        }

        Ok(location)
    }

    fn location_mut(&mut self, location: &Location) -> Result<&mut Value, CompilerError> {
        let mut value = match location.root {
            Root::Local { frame, local } => match self.frames.get_mut(frame) {
                Some(frame) => frame.locals.entry(local).or_insert(Value::Uninit),
                None => return_runtime_error!(format!("{} points into a finished call", location)),
            },

            Root::Temp { frame, temp } => match self.frames.get_mut(frame) {
                Some(frame) => frame.temps.entry(temp).or_insert(Value::Uninit),
                None => return_runtime_error!(format!("{} points into a finished call", location)),
            },

            Root::Slot(slot) => {
                self.expect_live(slot)?;
                &mut self.slots[slot.0 as usize].content
            }
        };

        for field in &location.fields {
            value = match value.field_mut(*field) {
                Some(field_value) => field_value,
                None => return_runtime_error!(format!("{} has no such field", location)),
            };
        }

        Ok(value)
    }

    fn take(&mut self, location: &Location) -> Result<Value, CompilerError> {
        Ok(std::mem::replace(self.location_mut(location)?, Value::Moved))
    }

    /// A write never silently forgets something that still needs drop.
    fn store(&mut self, location: &Location, value: Value) -> Result<(), CompilerError> {
        if let Some(slot) = location.slot() {
            self.events.push(RuntimeEvent::StorageWrite { slot });
        }

        let current = self.location_mut(location)?;
        if current.holds_resources() {
            return_runtime_error!(format!(
                "Write to {} overwrites {} without dropping it",
                location, current
            ));
        }

        *current = value;
        Ok(())
    }

    fn operand(&mut self, operand: &LirOperand) -> Result<Value, CompilerError> {
        match operand {
            LirOperand::Const(value) => Ok(Value::from_const(*value)),

            LirOperand::Copy(place) => {
                let location = self.resolve(place)?;
                let value = self.location_mut(&location)?;
                if !value.is_whole() {
                    return_runtime_error!(format!("Read of {} which holds {}", location, value));
                }
                Ok(value.clone())
            }

            LirOperand::Move(place) => {
                let location = self.resolve(place)?;
                let value = self.take(&location)?;
                if !value.is_whole() {
                    return_runtime_error!(format!("Move out of {} which holds {}", location, value));
                }
                Ok(value)
            }

            LirOperand::Ref { place, .. } => Ok(Value::Pointer(self.resolve(place)?)),
        }
    }

    fn rvalue(&mut self, rvalue: &LirRvalue) -> Result<Value, CompilerError> {
        match rvalue {
            LirRvalue::Use(operand) => self.operand(operand),

            LirRvalue::Aggregate { ty, fields } => {
                let mut values = Vec::with_capacity(fields.len());
                for (field, operand) in fields {
                    values.push((*field, self.operand(operand)?));
                }

                Ok(Value::Struct {
                    ty: *ty,
                    fields: values,
                })
            }
        }
    }
}
