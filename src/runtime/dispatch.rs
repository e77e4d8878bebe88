use crate::errors::{RuntimeError, RuntimeResult};
use crate::memory::value::Value;
use crate::runtime::instance::instance_of;
use crate::runtime::lookup::{Binding, Located};
use crate::runtime::types::Capability;
use crate::runtime::Runtime;
use log::trace;

/// The three faces of the indexing protocol.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SubscrOp {
    Load,
    Store(Value),
    Delete,
}

impl SubscrOp {
    pub fn method_name(&self) -> &'static str {
        match self {
            SubscrOp::Load => "__getitem__",
            SubscrOp::Store(_) => "__setitem__",
            SubscrOp::Delete => "__delitem__",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Len,
    Hash,
    Int,
}

impl UnaryOp {
    pub fn method_name(&self) -> &'static str {
        match self {
            UnaryOp::Len => "__len__",
            UnaryOp::Hash => "__hash__",
            UnaryOp::Int => "__int__",
        }
    }
}

impl Runtime {
    /// Indexes into an instance. Class definitions of the dunder win over a
    /// native subscript slot found later in the hierarchy; store and delete
    /// evaluate to unit.
    pub fn subscr(&mut self, obj: Value, index: Value, op: SubscrOp) -> RuntimeResult<Value> {
        let ty = instance_of(&self.heap, obj)?.ty;
        match self.class_lookup(ty, op.method_name(), Binding::Member(obj), Some(Capability::Subscript)) {
            Located::Found(bound) => {
                trace!("subscr: {} via {}", op.method_name(), self.types.get(ty).name);
                let result = match op {
                    SubscrOp::Load => self.call_bound(&bound, &[index])?,
                    SubscrOp::Store(value) => {
                        self.call_bound(&bound, &[index, value])?;
                        Value::Unit
                    }
                    SubscrOp::Delete => {
                        self.call_bound(&bound, &[index])?;
                        Value::Unit
                    }
                };
                Ok(result)
            }
            Located::NativeSlot(step) => {
                let Some(hook) = self.types.get(step).hooks.subscript() else {
                    return Err(RuntimeError::UnsupportedOperation(op.method_name()));
                };
                trace!("subscr: native slot on {}", self.types.get(step).name);
                hook(self, obj, index, op)
            }
            Located::NotFound => Err(RuntimeError::UnsupportedOperation(op.method_name())),
        }
    }

    /// Applies a unary operator to an instance.
    ///
    /// `__hash__` and `__int__` must produce integers. A type with no
    /// `__hash__` hashes by identity, unless it defines `__eq__`, which makes
    /// it unhashable.
    pub fn unary_op(&mut self, op: UnaryOp, obj: Value) -> RuntimeResult<Value> {
        let ty = instance_of(&self.heap, obj)?.ty;
        match self.class_lookup(ty, op.method_name(), Binding::Member(obj), Some(Capability::Unary)) {
            Located::Found(bound) => {
                let result = self.call_bound(&bound, &[])?;
                match op {
                    UnaryOp::Hash | UnaryOp::Int if !result.is_int() => {
                        Err(RuntimeError::TypeMismatch(format!(
                            "{} returned non-int '{}'",
                            op.method_name(),
                            result
                        )))
                    }
                    _ => Ok(result),
                }
            }
            Located::NativeSlot(step) => {
                let Some(hook) = self.types.get(step).hooks.unary() else {
                    return Err(RuntimeError::UnsupportedOperation(op.method_name()));
                };
                hook(self, op, obj)
            }
            Located::NotFound => {
                if op == UnaryOp::Hash && !self.types.defines(ty, "__eq__") {
                    let Value::Obj(idx) = obj else {
                        return Err(RuntimeError::UnsupportedOperation(op.method_name()));
                    };
                    return Ok(Value::Int(idx.idx as i64));
                }
                Err(RuntimeError::UnsupportedOperation(op.method_name()))
            }
        }
    }
}
