/// Arithmetic, bitwise and comparison opcodes.
///
/// Binary operations pop the right operand first. Numeric work is done on
/// doubles; bitwise and shift operations truncate both sides to 64-bit
/// integers. Division and remainder by zero produce 0.
use crate::error::VmResult;
use crate::instruction::{comparison, opcode, Instruction};
use crate::interpreter::{ExecutionResult, Frame};
use crate::runtime::Runtime;
use crate::value::Value;
use std::cmp::Ordering;

impl Runtime {
    pub fn is_math_opcode(op: u8) -> bool {
        matches!(
            op,
            opcode::CONV
                | opcode::MUL
                | opcode::DIV
                | opcode::REM
                | opcode::MOD
                | opcode::ADD
                | opcode::SUB
                | opcode::AND
                | opcode::OR
                | opcode::XOR
                | opcode::NEG
                | opcode::NOT
                | opcode::SHL
                | opcode::SHR
                | opcode::CMP
        )
    }

    /// Handle arithmetic and comparison opcodes
    pub fn execute_math_op(&mut self, frame: &mut Frame, inst: &Instruction) -> VmResult<ExecutionResult> {
        match inst.opcode {
            opcode::ADD => {
                let b = frame.pop();
                let a = frame.pop();
                let result = if a.is_string() || b.is_string() {
                    Value::Str(a.to_str() + &b.to_str())
                } else {
                    Value::Real(a.to_real() + b.to_real())
                };
                frame.push(result);
            }
            opcode::SUB => binary_real(frame, |a, b| a - b),
            opcode::MUL => binary_real(frame, |a, b| a * b),
            opcode::DIV => binary_real(frame, |a, b| if b != 0.0 { a / b } else { 0.0 }),
            opcode::REM | opcode::MOD => binary_real(frame, |a, b| if b != 0.0 { a % b } else { 0.0 }),
            opcode::AND => binary_long(frame, |a, b| a & b),
            opcode::OR => binary_long(frame, |a, b| a | b),
            opcode::XOR => binary_long(frame, |a, b| a ^ b),
            // Shift counts wrap at 64.
            opcode::SHL => binary_long(frame, |a, b| a.wrapping_shl(b as u32)),
            opcode::SHR => binary_long(frame, |a, b| a.wrapping_shr(b as u32)),
            opcode::NEG => {
                let a = frame.pop();
                frame.push(Value::Real(-a.to_real()));
            }
            opcode::NOT => {
                let a = frame.pop();
                frame.push(Value::from(a.to_long() == 0));
            }
            opcode::CMP => {
                let b = frame.pop();
                let a = frame.pop();
                let ordering = match (&a, &b) {
                    (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
                    _ => a.to_real().partial_cmp(&b.to_real()),
                };
                frame.push(Value::from(compare(ordering, inst.comparison())));
            }
            // Values carry their own type.
            opcode::CONV => {}
            _ => {}
        }
        Ok(ExecutionResult::Continue)
    }
}

fn binary_real(frame: &mut Frame, op: impl Fn(f64, f64) -> f64) {
    let b = frame.pop();
    let a = frame.pop();
    frame.push(Value::Real(op(a.to_real(), b.to_real())));
}

fn binary_long(frame: &mut Frame, op: impl Fn(i64, i64) -> i64) {
    let b = frame.pop();
    let a = frame.pop();
    frame.push(Value::Real(op(a.to_long(), b.to_long()) as f64));
}

/// An unordered comparison (NaN involved) is only true for "not equal".
fn compare(ordering: Option<Ordering>, kind: u8) -> bool {
    let Some(ord) = ordering else {
        return kind == comparison::NEQ;
    };
    match kind {
        comparison::LT => ord == Ordering::Less,
        comparison::LTE => ord != Ordering::Greater,
        comparison::EQ => ord == Ordering::Equal,
        comparison::NEQ => ord != Ordering::Equal,
        comparison::GTE => ord != Ordering::Less,
        comparison::GT => ord == Ordering::Greater,
        _ => false,
    }
}
