/// Control flow: branches, `with` iteration, calls and returns.
use crate::error::VmResult;
use crate::instruction::{opcode, Instruction};
use crate::interpreter::{EnvIteration, ExecutionResult, Frame};
use crate::runtime::Runtime;
use crate::value::Value;
use log::debug;
use std::rc::Rc;

impl Runtime {
    pub fn is_flow_opcode(op: u8) -> bool {
        matches!(
            op,
            opcode::B
                | opcode::BT
                | opcode::BF
                | opcode::PUSHENV
                | opcode::POPENV
                | opcode::CALL
                | opcode::RET
                | opcode::EXIT
                | opcode::BREAK
        )
    }

    pub fn execute_flow_op(&mut self, frame: &mut Frame, inst: &Instruction) -> VmResult<ExecutionResult> {
        // A target before the entry start jumps past its end.
        let target = inst.branch_target().unwrap_or(usize::MAX);

        match inst.opcode {
            opcode::B => Ok(ExecutionResult::Branch(target)),
            opcode::BT => {
                if frame.pop().to_bool() {
                    Ok(ExecutionResult::Branch(target))
                } else {
                    Ok(ExecutionResult::Continue)
                }
            }
            opcode::BF => {
                if !frame.pop().to_bool() {
                    Ok(ExecutionResult::Branch(target))
                } else {
                    Ok(ExecutionResult::Continue)
                }
            }
            opcode::PUSHENV => {
                let selector = frame.pop().to_int();
                let instances = self.find_instances(selector, frame.self_id, frame.other_id);
                let Some(&first) = instances.first() else {
                    return Ok(ExecutionResult::SkipEnv(target));
                };
                frame.envs.push(EnvIteration {
                    instances,
                    index: 0,
                    prev_self: frame.self_id,
                    prev_other: frame.other_id,
                });
                frame.other_id = frame.self_id;
                frame.self_id = first;
                Ok(ExecutionResult::Continue)
            }
            opcode::POPENV => {
                let Some(env) = frame.envs.last_mut() else {
                    return Ok(ExecutionResult::Continue);
                };
                env.index += 1;
                while let Some(&id) = env.instances.get(env.index) {
                    match self.instances.get(&id) {
                        Some(i) if !i.destroyed => break,
                        _ => env.index += 1,
                    }
                }
                if let Some(&next) = env.instances.get(env.index) {
                    frame.self_id = next;
                    return Ok(ExecutionResult::Branch(target));
                }
                if let Some(done) = frame.envs.pop() {
                    frame.self_id = done.prev_self;
                    frame.other_id = done.prev_other;
                }
                Ok(ExecutionResult::Continue)
            }
            opcode::CALL => {
                let argc = inst.arg_count();
                // Arguments were pushed last-first, so popping yields them in order.
                let args: Vec<Value> = (0..argc).map(|_| frame.pop()).collect();
                let game = Rc::clone(&self.game);
                let function = usize::try_from(inst.function_index)
                    .ok()
                    .and_then(|i| game.functions.get(i));
                let result = match function {
                    Some(f) => self.call_function(&f.name, &args, frame.self_id, frame.other_id)?,
                    None => {
                        debug!("call at {:#x} has no resolved function", inst.offset);
                        Value::ZERO
                    }
                };
                frame.push(result);
                Ok(ExecutionResult::Continue)
            }
            opcode::RET => {
                if let Some(value) = frame.stack.pop() {
                    if let Some(entry) = self.instances.get_mut(&frame.entry_self) {
                        entry.return_value = Some(value);
                    }
                }
                Ok(ExecutionResult::Returned)
            }
            opcode::EXIT => Ok(ExecutionResult::Returned),
            _ => Ok(ExecutionResult::Continue),
        }
    }
}
