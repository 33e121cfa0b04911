//! Stack and variable opcodes.
//!
//! Variable access picks a storage class from the effective instance type:
//! the popped array target for array accesses, the instruction's own
//! instance field when set, or the variable table's default otherwise.
//!
//! | effective type | read                         | write                         |
//! |----------------|------------------------------|-------------------------------|
//! | local          | per-call locals by var id    | same                          |
//! | global         | global variables             | same                          |
//! | stack top      | first match of a popped id   | first match of a popped id    |
//! | object id ≥ 0  | first live match             | every live match              |
//! | self / other   | ambient instance             | ambient instance, else global |

use crate::error::VmResult;
use crate::game_data::{GameData, Variable};
use crate::instruction::{instance_type, opcode, Instruction, Literal};
use crate::interpreter::{ExecutionResult, Frame};
use crate::runtime::Runtime;
use crate::value::Value;
use std::rc::Rc;

fn variable(game: &GameData, index: i32) -> Option<&Variable> {
    usize::try_from(index).ok().and_then(|i| game.variables.get(i))
}

impl Runtime {
    pub fn is_variable_opcode(op: u8) -> bool {
        matches!(
            op,
            opcode::PUSH
                | opcode::PUSHI
                | opcode::PUSHLOC
                | opcode::PUSHGLB
                | opcode::PUSHBLTN
                | opcode::POP
                | opcode::POPZ
                | opcode::DUP
        )
    }

    pub fn execute_variable_op(&mut self, frame: &mut Frame, inst: &Instruction) -> VmResult<ExecutionResult> {
        match inst.opcode {
            opcode::PUSH => {
                let value = match inst.literal {
                    Literal::Double(v) => Value::Real(v),
                    Literal::Float(v) => Value::Real(v as f64),
                    Literal::Int32(v) => Value::from(v),
                    Literal::Int64(v) => Value::Real(v as f64),
                    Literal::Bool(v) => Value::from(v),
                    Literal::Int16(v) => Value::from(v as i32),
                    Literal::Str(index) => usize::try_from(index)
                        .ok()
                        .and_then(|i| self.game.strings.get(i))
                        .map(|s| Value::Str(s.clone()))
                        .unwrap_or_else(Value::empty_string),
                    Literal::Raw(_) => Value::ZERO,
                    Literal::None => self.read_variable(frame, inst, None),
                };
                frame.push(value);
            }
            opcode::PUSHI => frame.push(Value::from(inst.extra as i32)),
            opcode::PUSHLOC => {
                let value = self.read_variable(frame, inst, Some(instance_type::LOCAL));
                frame.push(value);
            }
            opcode::PUSHGLB => {
                let value = self.read_variable(frame, inst, Some(instance_type::GLOBAL));
                frame.push(value);
            }
            opcode::PUSHBLTN => {
                let value = self.read_variable(frame, inst, None);
                frame.push(value);
            }
            opcode::POP => self.write_variable(frame, inst),
            opcode::POPZ => {
                frame.pop();
            }
            opcode::DUP => {
                let len = frame.stack.len();
                let n = ((inst.extra as usize & 0xFF) + 1).min(len);
                frame.stack.extend_from_within(len - n..);
            }
            _ => {}
        }
        Ok(ExecutionResult::Continue)
    }

    /// First live instance matching a selector popped for dot access.
    fn dot_target(&self, frame: &Frame, selector: i32) -> Option<i32> {
        self.find_instances(selector, frame.self_id, frame.other_id)
            .first()
            .copied()
    }

    fn read_variable(&mut self, frame: &mut Frame, inst: &Instruction, forced: Option<i32>) -> Value {
        let game = Rc::clone(&self.game);
        let Some(var) = variable(&game, inst.variable_index) else {
            return Value::ZERO;
        };
        let name = var.name.as_str();
        let is_array = inst.is_array_access();
        let (index, array_target) = if is_array {
            let index = frame.pop().to_int();
            (index, frame.pop().to_int())
        } else {
            (-1, 0)
        };

        if inst.opcode == opcode::PUSH && inst.is_stacktop_access() {
            let selector = frame.pop().to_int();
            return match self.dot_target(frame, selector) {
                Some(id) => self.get_instance_var(id, name),
                None => Value::ZERO,
            };
        }

        let effective = forced.unwrap_or(if is_array {
            array_target
        } else if inst.extra != 0 {
            inst.instance_type()
        } else {
            var.instance_type
        });

        match effective {
            instance_type::LOCAL => {
                let local = frame.locals.get(&var.var_id);
                if is_array {
                    local.map(|v| v.array_get(index))
                } else {
                    local.cloned()
                }
                .unwrap_or(Value::ZERO)
            }
            instance_type::GLOBAL => {
                if is_array {
                    self.global_array_get(name, index)
                } else {
                    self.globals.get(name).cloned().unwrap_or(Value::ZERO)
                }
            }
            instance_type::STACKTOP => {
                let selector = frame.pop().to_int();
                match self.dot_target(frame, selector) {
                    Some(id) if is_array => self.instance_array_get(id, name, index),
                    Some(id) => self.get_instance_var(id, name),
                    None => Value::ZERO,
                }
            }
            _ if is_array => {
                if let Some(v) = self.get_view_array(name, index) {
                    return v;
                }
                match self.resolve_instance(effective, frame.self_id, frame.other_id) {
                    Some(id) => self.instance_array_get(id, name, index),
                    None => self.global_array_get(name, index),
                }
            }
            _ => match self.resolve_instance(effective, frame.self_id, frame.other_id) {
                Some(id) => self.get_instance_var(id, name),
                None => self.get_global_builtin(name),
            },
        }
    }

    fn write_variable(&mut self, frame: &mut Frame, inst: &Instruction) {
        let game = Rc::clone(&self.game);
        let Some(var) = variable(&game, inst.variable_index) else {
            frame.pop();
            return;
        };
        let name = var.name.as_str();
        let is_array = inst.is_array_access();
        let (index, array_target) = if is_array {
            let index = frame.pop().to_int();
            (index, frame.pop().to_int())
        } else {
            (-1, 0)
        };

        if inst.is_stacktop_access() {
            let selector = frame.pop().to_int();
            let value = frame.pop();
            if let Some(id) = self.dot_target(frame, selector) {
                self.set_instance_var(id, name, &value);
            }
            return;
        }

        let value = frame.pop();
        let raw = inst.instance_type();
        let effective = if is_array {
            array_target
        } else if raw != 0 {
            raw
        } else {
            var.instance_type
        };

        match effective {
            instance_type::LOCAL => {
                if is_array {
                    let slot = frame.locals.entry(var.var_id).or_insert(Value::ZERO);
                    Value::array_set(slot, index, value);
                } else {
                    frame.locals.insert(var.var_id, value);
                }
            }
            instance_type::GLOBAL => {
                if is_array {
                    self.global_array_set(name, index, value);
                } else {
                    self.globals.insert(name.to_string(), value);
                }
            }
            // The value popped above was the target; the stored value sits below it.
            _ if raw == instance_type::STACKTOP => {
                let stored = frame.pop();
                if let Some(id) = self.dot_target(frame, value.to_int()) {
                    self.store(id, name, is_array.then_some(index), stored);
                }
            }
            _ => {
                if is_array && self.set_view_array(name, index, &value) {
                    return;
                }
                if effective >= 0 {
                    for id in self.find_instances(effective, frame.self_id, frame.other_id) {
                        self.store(id, name, is_array.then_some(index), value.clone());
                    }
                    return;
                }
                let target = self
                    .resolve_instance(effective, frame.self_id, frame.other_id)
                    .unwrap_or(frame.self_id);
                if self.instances.contains_key(&target) {
                    self.store(target, name, is_array.then_some(index), value);
                } else if !is_array {
                    self.set_global_builtin(name, value);
                } else {
                    self.global_array_set(name, index, value);
                }
            }
        }
    }

    fn store(&mut self, id: i32, name: &str, index: Option<i32>, value: Value) {
        match index {
            Some(i) => {
                if let Some(inst) = self.instances.get_mut(&id) {
                    inst.set_array_element(name, i, value);
                }
            }
            None => self.set_instance_var(id, name, &value),
        }
    }

    fn instance_array_get(&self, id: i32, name: &str, index: i32) -> Value {
        self.instances
            .get(&id)
            .map(|i| i.get_array_element(name, index))
            .unwrap_or(Value::ZERO)
    }
}
