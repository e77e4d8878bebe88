use crate::errors::{RuntimeError, RuntimeResult};
use crate::memory::object_map::ObjectKind;
use crate::memory::value::Value;
use crate::runtime::accessor::Property;
use crate::runtime::instance::{instance_of, instance_of_mut};
use crate::runtime::lookup::{Binding, Located};
use crate::runtime::types::{TypeFlags, TypeIndex};
use crate::runtime::Runtime;
use log::trace;

/// Attribute names the `__getattr__` catch-all never intercepts; looking
/// them up through the hook would recurse.
const CATCH_ALL_EXEMPT: [&str; 3] = ["__getattr__", "__setattr__", "__delattr__"];

impl Runtime {
    /// Reads an attribute from an instance.
    ///
    /// Per-object members always win and are served raw, bypassing any
    /// property or descriptor stored there. Values found in the class
    /// hierarchy go through the accessor protocol when the type carries
    /// special accessors, and `__getattr__` is the last resort.
    pub fn load_attr(&mut self, obj: Value, name: &str) -> RuntimeResult<Value> {
        let inst = instance_of(&self.heap, obj)?;
        let ty = inst.ty;
        if let Some(&member) = inst.members.get(name) {
            trace!("load_attr: '{}' served from instance storage", name);
            if let Value::Obj(idx) = member {
                self.heap.rc_inc(idx);
            }
            return Ok(member);
        }
        let flags = self.types.get(ty).flags;

        if let Located::Found(bound) = self.class_lookup(ty, name, Binding::Member(obj), None) {
            if !flags.contains(TypeFlags::HAS_SPECIAL_ACCESSORS) {
                return self.materialize(bound);
            }
            if let Some(prop) = self.as_property(bound.value) {
                trace!("load_attr: '{}' resolved through a property", name);
                return self.property_load(prop, obj);
            }
            if let Some(value) = self.descriptor_get(bound.value, obj, ty)? {
                trace!("load_attr: '{}' resolved through __get__", name);
                return Ok(value);
            }
            return self.materialize(bound);
        }

        if !CATCH_ALL_EXEMPT.contains(&name) {
            if let Located::Found(hook) =
                self.class_lookup(ty, "__getattr__", Binding::Member(obj), None)
            {
                trace!("load_attr: '{}' delegated to __getattr__", name);
                let name_val = self.intern(name)?;
                let result = self.call_bound(&hook, &[name_val]);
                self.release(name_val)?;
                return result;
            }
        }
        Err(RuntimeError::AttributeError { name: name.into() })
    }

    pub fn store_attr(&mut self, obj: Value, name: &str, value: Value) -> RuntimeResult<()> {
        if self.try_store(obj, name, Some(value))? {
            Ok(())
        } else {
            Err(RuntimeError::AttributeError { name: name.into() })
        }
    }

    pub fn delete_attr(&mut self, obj: Value, name: &str) -> RuntimeResult<()> {
        if self.try_store(obj, name, None)? {
            Ok(())
        } else {
            Err(RuntimeError::AttributeError { name: name.into() })
        }
    }

    /// Writes (`Some`) or deletes (`None`) an attribute. Returns whether the
    /// store was accepted.
    ///
    /// Types without special accessors go straight to instance storage. On
    /// types that have them, the class hierarchy is consulted first: a
    /// property either handles the store or rejects it, a descriptor missing
    /// the hook falls through, and `__setattr__`/`__delattr__` catch-alls
    /// intercept everything that remains.
    fn try_store(&mut self, obj: Value, name: &str, value: Option<Value>) -> RuntimeResult<bool> {
        let inst = instance_of(&self.heap, obj)?;
        let ty = inst.ty;
        let flags = self.types.get(ty).flags;

        if flags.contains(TypeFlags::HAS_SPECIAL_ACCESSORS) {
            if let Located::Found(bound) = self.class_lookup(ty, name, Binding::Member(obj), None)
            {
                if let Some(prop) = self.as_property(bound.value) {
                    trace!("store_attr: '{}' routed through a property", name);
                    return self.property_store(prop, obj, value);
                }
                if self.descriptor_store(bound.value, obj, value)? {
                    trace!("store_attr: '{}' routed through a descriptor", name);
                    return Ok(true);
                }
            }
            let hook_name = if value.is_some() {
                "__setattr__"
            } else {
                "__delattr__"
            };
            if let Located::Found(hook) =
                self.class_lookup(ty, hook_name, Binding::Member(obj), None)
            {
                trace!("store_attr: '{}' delegated to {}", name, hook_name);
                let name_val = self.intern(name)?;
                let args = match value {
                    Some(v) => vec![name_val, v],
                    None => vec![name_val],
                };
                let result = self.call_bound(&hook, &args);
                self.release(name_val)?;
                result?;
                return Ok(true);
            }
        }

        // Plain storage takes over the caller's reference; the reference a
        // replaced or removed member held is dropped.
        let inst = instance_of_mut(&mut self.heap, obj)?;
        let previous = match value {
            Some(v) => inst.members.insert(name.to_string(), v),
            None => inst.members.remove(name),
        };
        let stored = value.is_some() || previous.is_some();
        if previous != value {
            if let Some(Value::Obj(old)) = previous {
                self.heap.rc_dec(old)?;
            }
        }
        Ok(stored)
    }

    /// Reads an attribute directly off a type. Functions come back bound to
    /// the requesting type, not to the ancestor that defined them.
    pub fn load_type_attr(&mut self, ty: TypeIndex, name: &str) -> RuntimeResult<Value> {
        match self.class_lookup(ty, name, Binding::Class(ty), None) {
            Located::Found(bound) => self.materialize(bound),
            _ => Err(RuntimeError::AttributeError { name: name.into() }),
        }
    }

    fn as_property(&self, value: Value) -> Option<Property> {
        let Value::Obj(idx) = value else {
            return None;
        };
        match self.heap.get(idx) {
            Ok(ObjectKind::Property(prop)) => Some(*prop),
            _ => None,
        }
    }

    fn intern(&mut self, name: &str) -> RuntimeResult<Value> {
        let idx = self.heap.put(ObjectKind::Str(name.to_string()))?;
        Ok(Value::Obj(idx))
    }
}
