//! Bytecode execution loop.
//!
//! One [`Frame`] per code invocation holds the operand stack, locals and the
//! stack of active `with` iterations. Opcode families live in
//! `opcodes_math`, `opcodes_variable` and `opcodes_flow`; this module owns the
//! loop, the dispatch and function calls.

use crate::builtins;
use crate::error::{VmError, VmResult};
use crate::instruction::{opcode, DecodedCode, Instruction};
use crate::runtime::Runtime;
use crate::value::{GmlArray, Value};
use crate::vm::MAX_CALL_DEPTH;
use log::{debug, error, trace, warn};
use std::collections::HashMap;

/// Result of executing a single instruction
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// Continue with the next instruction
    Continue,
    /// Jump to a byte offset within the entry
    Branch(usize),
    /// Jump to a byte offset, stepping over a `popenv` found there
    SkipEnv(usize),
    /// Leave the code entry
    Returned,
}

/// One active `with` iteration.
#[derive(Debug, Clone)]
pub struct EnvIteration {
    pub instances: Vec<i32>,
    pub index: usize,
    pub prev_self: i32,
    pub prev_other: i32,
}

/// Execution state of one code invocation.
#[derive(Debug)]
pub struct Frame {
    pub code_id: i32,
    pub pc: usize,
    pub stack: Vec<Value>,
    /// Keyed by variable id
    pub locals: HashMap<i32, Value>,
    pub envs: Vec<EnvIteration>,
    pub self_id: i32,
    pub other_id: i32,
    /// Instance the entry was invoked on; `ret` stores its value here.
    pub entry_self: i32,
}

impl Frame {
    pub fn new(code_id: i32, self_id: i32, other_id: i32) -> Self {
        Frame {
            code_id,
            pc: 0,
            stack: Vec::new(),
            locals: HashMap::new(),
            envs: Vec::new(),
            self_id,
            other_id,
            entry_self: self_id,
        }
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Underflow yields 0 rather than faulting.
    pub fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or(Value::ZERO)
    }
}

impl Runtime {
    /// Run a code entry on `self_id`. Faults are logged and end this entry only.
    pub fn execute(&mut self, code_id: i32, self_id: i32, other_id: Option<i32>) {
        let code = match self.vm.code(code_id) {
            Some(c) if !c.is_empty() => c,
            Some(_) => return,
            None => {
                debug!("{}", VmError::InvalidCodeEntry(code_id));
                return;
            }
        };

        let mut frame = Frame::new(code_id, self_id, other_id.unwrap_or(self_id));
        if let Err(e) = self.run_frame(&code, &mut frame) {
            let op = code
                .instructions
                .get(frame.pc)
                .map(|i| i.name())
                .unwrap_or("?");
            error!(
                "VM error in {} at pc={} ({}): {}",
                self.game.code_name(code_id),
                frame.pc,
                op,
                e
            );
        }
    }

    fn run_frame(&mut self, code: &DecodedCode, frame: &mut Frame) -> VmResult<()> {
        let entry_name = self.game.code_name(frame.code_id).to_string();
        let tracing = self.config.trace.traces_instructions(&entry_name);
        let fuse = self.config.max_instructions;
        let mut count: u64 = 0;

        while frame.pc < code.len() {
            if count >= fuse {
                warn!(
                    "{} exceeded {} instructions, abandoning this call",
                    entry_name, fuse
                );
                return Ok(());
            }
            count += 1;

            let inst = &code.instructions[frame.pc];
            if tracing {
                debug!("[{}] {} stack={}", entry_name, inst, frame.stack.len());
            } else {
                trace!("[{}] {}", entry_name, inst);
            }

            match self.execute_instruction(frame, inst)? {
                ExecutionResult::Continue => frame.pc += 1,
                ExecutionResult::Branch(target) => frame.pc = branch_index(code, &entry_name, target),
                ExecutionResult::SkipEnv(target) => {
                    let i = branch_index(code, &entry_name, target);
                    frame.pc = match code.instructions.get(i) {
                        Some(next) if next.opcode == opcode::POPENV => i + 1,
                        _ => i,
                    };
                }
                ExecutionResult::Returned => return Ok(()),
            }
        }
        Ok(())
    }

    /// Route one instruction to its opcode family.
    pub fn execute_instruction(&mut self, frame: &mut Frame, inst: &Instruction) -> VmResult<ExecutionResult> {
        if Runtime::is_math_opcode(inst.opcode) {
            self.execute_math_op(frame, inst)
        } else if Runtime::is_variable_opcode(inst.opcode) {
            self.execute_variable_op(frame, inst)
        } else if Runtime::is_flow_opcode(inst.opcode) {
            self.execute_flow_op(frame, inst)
        } else {
            debug!("skipping unknown opcode {:#04x} at {:#x}", inst.opcode, inst.offset);
            Ok(ExecutionResult::Continue)
        }
    }

    /// Call a builtin or script by name with `self_id`/`other_id` as context.
    pub fn call_function(&mut self, name: &str, args: &[Value], self_id: i32, other_id: i32) -> VmResult<Value> {
        self.trace_call(name, args, self_id);

        let prev_self = self.current_self.replace(self_id);
        let prev_other = self.current_other.replace(other_id);
        let result = if let Some(builtin) = builtins::lookup(name) {
            builtin(self, args)
        } else if let Some(code_id) = self.vm.script_code(name) {
            self.call_script(code_id, args, self_id, other_id)
        } else {
            self.vm.warn_unknown(name, args.len());
            Ok(Value::ZERO)
        };
        self.current_self = prev_self;
        self.current_other = prev_other;
        result
    }

    /// Run a script with its arguments bound on the calling instance.
    ///
    /// The caller's own `argument*` variables are put back afterwards so a
    /// script that calls another script still sees its own arguments.
    pub fn call_script(&mut self, code_id: i32, args: &[Value], self_id: i32, other_id: i32) -> VmResult<Value> {
        if self.vm.call_depth >= MAX_CALL_DEPTH {
            return Err(VmError::CallDepthExceeded(MAX_CALL_DEPTH));
        }
        let inst = self
            .instances
            .get_mut(&self_id)
            .ok_or(VmError::NoSuchInstance(self_id))?;

        let mut bound: Vec<(String, Value)> = args
            .iter()
            .enumerate()
            .map(|(i, a)| (format!("argument{}", i), a.clone()))
            .collect();
        bound.push(("argument_count".to_string(), Value::from(args.len() as i32)));
        bound.push(("argument".to_string(), Value::from(GmlArray::from_values(args))));

        let saved: Vec<(String, Option<Value>)> = bound
            .into_iter()
            .map(|(name, value)| {
                let old = inst.variables.insert(name.clone(), value);
                (name, old)
            })
            .collect();
        inst.return_value = None;

        self.vm.call_depth += 1;
        self.execute(code_id, self_id, Some(other_id));
        self.vm.call_depth -= 1;

        let Some(inst) = self.instances.get_mut(&self_id) else {
            return Ok(Value::ZERO);
        };
        let result = inst.return_value.take().unwrap_or(Value::ZERO);
        for (name, old) in saved {
            match old {
                Some(v) => inst.variables.insert(name, v),
                None => inst.variables.remove(&name),
            };
        }
        Ok(result)
    }

    fn trace_call(&self, name: &str, args: &[Value], self_id: i32) {
        let trace = &self.config.trace;
        if trace.calls.is_empty() {
            return;
        }
        let object = self
            .instances
            .get(&self_id)
            .map(|i| self.game.object_name(i.object_index))
            .unwrap_or("<none>");
        if trace.traces_calls(object, name) {
            let rendered: Vec<String> = args
                .iter()
                .map(|a| a.to_str().chars().take(30).collect())
                .collect();
            debug!("CALL ({}): {}({})", object, name, rendered.join(", "));
        }
    }
}

/// Instruction index for a branch landing on `target`, or the end of the entry
/// when no instruction starts there.
fn branch_index(code: &DecodedCode, entry_name: &str, target: usize) -> usize {
    code.index_of(target).unwrap_or_else(|| {
        debug!(
            "{}: branch target {:#x} is not an instruction start, leaving entry",
            entry_name, target
        );
        code.len()
    })
}
