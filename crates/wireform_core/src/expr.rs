//! Deferred values: literals, context paths, unary/binary expressions and callables.
//!
//! Expressions are pure and side-effect free; they read the layer stack and globals through
//! [`State`] but never touch the stream.

use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::layer::LayerId;
use crate::state::State;
use crate::value::Value;

/// A function usable wherever a callable is accepted: lengths, conditions, switch selectors,
/// offsets, computed values. Takes the active state and layer, returns a value.
pub type EvalFn = Rc<dyn Fn(&State, LayerId) -> Result<Value>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    FloorDiv,
    Div,
    Mod,
    Pow,
    MatMul,
    And,
    Or,
    Xor,
    BitAnd,
    BitOr,
    Shl,
    Shr,
}

#[derive(Clone)]
pub enum Expr {
    Literal(Value),
    /// A dotted `ContextPath`, e.g. `["header", "kind"]` for `header.kind`.
    Path(Vec<String>),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Callable(EvalFn),
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "Literal({v:?})"),
            Expr::Path(segs) => write!(f, "Path({})", segs.join(".")),
            Expr::Unary(op, e) => write!(f, "Unary({op:?}, {e:?})"),
            Expr::Binary(op, l, r) => write!(f, "Binary({op:?}, {l:?}, {r:?})"),
            Expr::Callable(_) => write!(f, "Callable(..)"),
        }
    }
}

impl Expr {
    pub fn path(dotted: &str) -> Self {
        Expr::Path(dotted.split('.').map(str::to_owned).collect())
    }

    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&State, LayerId) -> Result<Value> + 'static,
    {
        Expr::Callable(Rc::new(f))
    }

    pub fn evaluate(&self, state: &State, layer: LayerId) -> Result<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Path(segments) => state.resolve_path(layer, segments),
            Expr::Unary(op, e) => eval_unary(*op, e.evaluate(state, layer)?, state, layer),
            Expr::Binary(op, l, r) => {
                eval_binary(*op, l.evaluate(state, layer)?, r.evaluate(state, layer)?, state, layer)
            }
            Expr::Callable(f) => f(state, layer),
        }
    }
}

fn eval_unary(op: UnOp, operand: Value, state: &State, layer: LayerId) -> Result<Value> {
    match op {
        UnOp::Not => Ok(Value::Bool(!operand.truthy())),
        UnOp::Neg | UnOp::Pos => match operand {
            Value::Int(n) => Ok(Value::Int(if op == UnOp::Neg { -n } else { n })),
            Value::Float(f) => Ok(Value::Float(if op == UnOp::Neg { -f } else { f })),
            other => Err(type_mismatch(state, layer, "int or float", &other)),
        },
    }
}

fn eval_binary(op: BinOp, lhs: Value, rhs: Value, state: &State, layer: LayerId) -> Result<Value> {
    use BinOp::*;

    match op {
        Eq => return Ok(Value::Bool(lhs == rhs)),
        Ne => return Ok(Value::Bool(lhs != rhs)),
        And => return Ok(Value::Bool(lhs.truthy() && rhs.truthy())),
        Or => return Ok(Value::Bool(lhs.truthy() || rhs.truthy())),
        _ => {}
    }

    // Everything else works on numeric operands, promoting to float if either side is one.
    let as_float = matches!(lhs, Value::Float(_)) || matches!(rhs, Value::Float(_));

    if as_float {
        let l = lhs
            .as_float()
            .ok_or_else(|| type_mismatch(state, layer, "number", &lhs))?;
        let r = rhs
            .as_float()
            .ok_or_else(|| type_mismatch(state, layer, "number", &rhs))?;
        let result = match op {
            Lt => return Ok(Value::Bool(l < r)),
            Le => return Ok(Value::Bool(l <= r)),
            Gt => return Ok(Value::Bool(l > r)),
            Ge => return Ok(Value::Bool(l >= r)),
            Add => l + r,
            Sub => l - r,
            Mul => l * r,
            Div => l / r,
            FloorDiv => (l / r).floor(),
            Mod => l.rem_euclid(r),
            Pow => l.powf(r),
            MatMul => {
                return Err(Error::NotImplemented {
                    path: state.path_of(layer).to_owned(),
                    capability: "@ on floats",
                })
            }
            Xor | BitAnd | BitOr | Shl | Shr => {
                return Err(type_mismatch(state, layer, "int", &Value::Float(l)))
            }
            Eq | Ne | And | Or => unreachable!("handled above"),
        };
        return Ok(Value::Float(result));
    }

    let l = lhs
        .as_int()
        .ok_or_else(|| type_mismatch(state, layer, "int", &lhs))?;
    let r = rhs
        .as_int()
        .ok_or_else(|| type_mismatch(state, layer, "int", &rhs))?;

    let result = match op {
        Lt => return Ok(Value::Bool(l < r)),
        Le => return Ok(Value::Bool(l <= r)),
        Gt => return Ok(Value::Bool(l > r)),
        Ge => return Ok(Value::Bool(l >= r)),
        Add => l + r,
        Sub => l - r,
        Mul => l * r,
        FloorDiv => l.div_euclid(r),
        Div => l / r,
        Mod => l.rem_euclid(r),
        Pow => l.pow(r as u32),
        MatMul => {
            return Err(Error::NotImplemented {
                path: state.path_of(layer).to_owned(),
                capability: "@ on ints",
            })
        }
        Xor => l ^ r,
        BitAnd => l & r,
        BitOr => l | r,
        Shl => l << r,
        Shr => l >> r,
        Eq | Ne | And | Or => unreachable!("handled above"),
    };
    Ok(Value::Int(result))
}

fn type_mismatch(state: &State, layer: LayerId, expected: &'static str, value: &Value) -> Error {
    Error::TypeMismatch {
        path: state.path_of(layer).to_owned(),
        expected,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::stream::memory_stream;

    #[test]
    fn literal_evaluates_to_itself() {
        let state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();
        assert_eq!(
            Expr::Literal(Value::Int(5)).evaluate(&state, layer).unwrap(),
            Value::Int(5)
        );
    }

    #[test]
    fn binary_add_promotes_to_float() {
        let state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();
        let expr = Expr::Binary(
            BinOp::Add,
            Box::new(Expr::Literal(Value::Int(1))),
            Box::new(Expr::Literal(Value::Float(0.5))),
        );
        assert_eq!(expr.evaluate(&state, layer).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn path_resolves_against_globals() {
        let mut globals = Context::new();
        globals.set("count", 42i64);
        let state = State::new(Box::new(memory_stream()), globals);
        let layer = state.root();
        let expr = Expr::path("count");
        assert_eq!(expr.evaluate(&state, layer).unwrap(), Value::Int(42));
    }
}
