pub mod accessor;
pub mod attrs;
pub mod dispatch;
pub mod instance;
pub mod lookup;
pub mod types;

use crate::errors::{RuntimeError, RuntimeResult};
use crate::libraries::handoff::DeviceHandoff;
use crate::memory::object_map::{ObjectKind, ObjectMap};
use crate::memory::value::Value;
use crate::runtime::instance::Instance;
use crate::runtime::lookup::{Binding, Bound, ClassLookup, Located};
use crate::runtime::types::{Capability, TypeIndex, TypeRegistry};
use log::trace;

/// Signature of every native function. `args[0]` is the receiver for bound
/// calls.
pub type NativeFn = fn(&mut Runtime, &[Value]) -> RuntimeResult<Value>;

pub const DEFAULT_HEAP_SLOTS: usize = 1024;

/// A function paired with the receiver it was resolved against. Materialized
/// into a heap object only when it escapes to the caller; internal dispatch
/// calls it directly without allocating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundMethod {
    pub func: Value,
    pub receiver: Value,
}

/// The single-threaded execution context: the type registry, the object
/// heap, and the external device boundary.
pub struct Runtime {
    pub types: TypeRegistry,
    pub heap: ObjectMap,
    pub device: Box<dyn DeviceHandoff>,
}

impl Runtime {
    pub fn new(device: Box<dyn DeviceHandoff>) -> Self {
        Self::with_heap_size(device, DEFAULT_HEAP_SLOTS)
    }

    pub fn with_heap_size(device: Box<dyn DeviceHandoff>, slots: usize) -> Self {
        Self {
            types: TypeRegistry::new(),
            heap: ObjectMap::new(slots),
            device,
        }
    }

    /// Creates an instance of `ty`: allocates a blank instance, then invokes
    /// the class initializer (if the hierarchy defines one) with the
    /// constructor arguments. An initializer must return unit.
    pub fn construct(&mut self, ty: TypeIndex, args: &[Value]) -> RuntimeResult<Value> {
        trace!(
            "construct: {} with {} args",
            self.types.get(ty).name,
            args.len()
        );
        let idx = self.heap.put(ObjectKind::Instance(Instance::new(ty)))?;
        let this = Value::Obj(idx);
        if let Located::Found(init) = self.class_lookup(ty, "__init__", Binding::Member(this), None)
        {
            let ret = match self.call_bound(&init, args) {
                Ok(ret) => ret,
                Err(err) => {
                    self.heap.free(idx)?;
                    return Err(err);
                }
            };
            if !ret.is_unit() {
                self.heap.free(idx)?;
                return Err(RuntimeError::TypeMismatch(format!(
                    "__init__() should return None, not '{}'",
                    ret
                )));
            }
        }
        Ok(this)
    }

    /// Drops one reference from a handle previously handed to the caller,
    /// freeing the object once nothing holds it anymore. Non-heap values are
    /// a no-op.
    pub fn release(&mut self, value: Value) -> RuntimeResult<()> {
        if let Value::Obj(idx) = value {
            self.heap.rc_dec(idx)?;
        }
        Ok(())
    }

    pub fn call(&mut self, callee: Value, args: &[Value]) -> RuntimeResult<Value> {
        match callee {
            Value::Fn(f) => f(self, args),
            Value::Obj(idx) => {
                let bound = match self.heap.get(idx)? {
                    ObjectKind::Method(m) => Bound {
                        value: m.func,
                        receiver: Some(m.receiver),
                    },
                    kind => {
                        return Err(RuntimeError::TypeMismatch(format!(
                            "{} is not callable",
                            kind
                        )))
                    }
                };
                self.call_bound(&bound, args)
            }
            other => Err(RuntimeError::TypeMismatch(format!(
                "{} is not callable",
                other
            ))),
        }
    }

    pub fn call_bound(&mut self, bound: &Bound, args: &[Value]) -> RuntimeResult<Value> {
        let Value::Fn(f) = bound.value else {
            return Err(RuntimeError::TypeMismatch(format!(
                "{} is not callable",
                bound.value
            )));
        };
        match bound.receiver {
            Some(receiver) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(receiver);
                full.extend_from_slice(args);
                f(self, &full)
            }
            None => f(self, args),
        }
    }

    pub(crate) fn class_lookup(
        &self,
        ty: TypeIndex,
        name: &str,
        binding: Binding,
        slot: Option<Capability>,
    ) -> Located {
        ClassLookup {
            registry: &self.types,
            heap: &self.heap,
            binding,
            slot,
        }
        .resolve(ty, name)
    }

    /// Resolves a method on any value without raising: instance members are
    /// consulted first (and returned unbound), then the class hierarchy.
    /// Non-instances have no methods.
    pub(crate) fn find_method(&self, obj: Value, name: &str) -> RuntimeResult<Option<Bound>> {
        let Value::Obj(idx) = obj else {
            return Ok(None);
        };
        let ObjectKind::Instance(inst) = self.heap.get(idx)? else {
            return Ok(None);
        };
        if let Some(&value) = inst.members.get(name) {
            return Ok(Some(Bound {
                value,
                receiver: None,
            }));
        }
        match self.class_lookup(inst.ty, name, Binding::Member(obj), None) {
            Located::Found(bound) => Ok(Some(bound)),
            _ => Ok(None),
        }
    }

    /// Turns a lookup result into a first-class value owned by the caller:
    /// a fresh bound-method object when a receiver is attached (holding its
    /// own reference to the receiver), otherwise the value itself with one
    /// reference added for heap handles.
    pub(crate) fn materialize(&mut self, bound: Bound) -> RuntimeResult<Value> {
        match bound.receiver {
            Some(receiver) => {
                let idx = self.heap.put(ObjectKind::Method(BoundMethod {
                    func: bound.value,
                    receiver,
                }))?;
                if let Value::Obj(r) = receiver {
                    self.heap.rc_inc(r);
                }
                Ok(Value::Obj(idx))
            }
            None => {
                if let Value::Obj(idx) = bound.value {
                    self.heap.rc_inc(idx);
                }
                Ok(bound.value)
            }
        }
    }

    /// Formats a value for display, consulting the type's print hook for
    /// instances.
    pub fn repr(&self, value: Value) -> String {
        match value {
            Value::Unit => "()".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Fn(_) => "<native fn>".to_string(),
            Value::Type(ty) => format!("<type {}>", self.types.get(ty).name),
            Value::Obj(idx) => match self.heap.get(idx) {
                Ok(ObjectKind::Str(s)) => s.clone(),
                Ok(ObjectKind::Tuple(items)) => {
                    let inner = items
                        .iter()
                        .map(|item| self.repr(*item))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("({})", inner)
                }
                Ok(ObjectKind::Property(_)) => "<property>".to_string(),
                Ok(ObjectKind::Method(m)) => {
                    format!("<bound method of {}>", self.repr(m.receiver))
                }
                Ok(ObjectKind::Instance(inst)) => {
                    let desc = self.types.get(inst.ty);
                    match desc.hooks.print() {
                        Some(hook) => hook(&self.heap, value),
                        None => format!("<{} object at {}>", desc.name, idx),
                    }
                }
                Ok(ObjectKind::Free { .. }) | Err(_) => format!("<freed {}>", idx),
            },
        }
    }
}
