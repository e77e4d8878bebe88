use crate::memory::object_map::ObjectMap;
use crate::memory::value::Value;
use crate::runtime::instance::try_instance;
use crate::runtime::types::{Capability, TypeFlags, TypeIndex, TypeRegistry};
use log::trace;

/// What a class-hierarchy search is resolving on behalf of.
#[derive(Clone, Copy, Debug)]
pub enum Binding {
    /// Instance member access. Functions found in the hierarchy are bound to
    /// the receiving instance.
    Member(Value),
    /// Class-level access. Functions are bound to the original requesting
    /// type, not to the ancestor they were found on.
    Class(TypeIndex),
}

/// A located value together with the receiver it should be invoked with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bound {
    pub value: Value,
    pub receiver: Option<Value>,
}

/// Outcome of a hierarchy search. Absence is an expected result, never an
/// error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Located {
    Found(Bound),
    /// A native capability slot was found on the given type before any class
    /// definition; the caller should delegate to the native implementation.
    NativeSlot(TypeIndex),
    NotFound,
}

/// A single attribute search over a type's flattened resolution order.
pub struct ClassLookup<'a> {
    pub registry: &'a TypeRegistry,
    pub heap: &'a ObjectMap,
    pub binding: Binding,
    /// When resolving an operator, the capability whose native slot acts as
    /// a fallback sentinel.
    pub slot: Option<Capability>,
}

impl ClassLookup<'_> {
    /// Walks `ty`'s resolution order linearly. At each step the locals table
    /// is consulted first, then the operator slot sentinel, then the native
    /// attribute fallback. The root sentinel is not part of any resolution
    /// order and is therefore never searched.
    pub fn resolve(&self, ty: TypeIndex, name: &str) -> Located {
        for &step in &self.registry.get(ty).mro {
            let desc = self.registry.get(step);
            trace!("lookup: probing '{}' in {}", name, desc.name);
            if let Some(&value) = desc.locals.get(name) {
                trace!("lookup: found '{}' in {}", name, desc.name);
                return Located::Found(self.bind(value));
            }
            if desc.flags.contains(TypeFlags::NATIVE) {
                if let Some(cap) = self.slot {
                    if desc.hooks.has(cap) {
                        trace!("lookup: native slot for '{}' on {}", name, desc.name);
                        return Located::NativeSlot(step);
                    }
                }
                if let (Binding::Member(receiver), Some(fallback)) =
                    (self.binding, desc.hooks.attr())
                {
                    if let Some(inst) = try_instance(self.heap, receiver) {
                        if let Some(value) = fallback(inst, name) {
                            trace!("lookup: native fallback served '{}' on {}", name, desc.name);
                            return Located::Found(Bound {
                                value,
                                receiver: None,
                            });
                        }
                    }
                }
            }
        }
        Located::NotFound
    }

    fn bind(&self, value: Value) -> Bound {
        if !value.is_fn() {
            return Bound {
                value,
                receiver: None,
            };
        }
        let receiver = match self.binding {
            Binding::Member(instance) => instance,
            Binding::Class(requesting) => Value::Type(requesting),
        };
        Bound {
            value,
            receiver: Some(receiver),
        }
    }
}
