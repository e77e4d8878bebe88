use crate::errors::{RuntimeError, RuntimeResult};
use crate::memory::value::Value;
use crate::runtime::types::TypeIndex;
use crate::runtime::Runtime;

/// A managed attribute: up to three functions mediating read, write and
/// delete. Any of the three may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Property {
    pub get: Option<Value>,
    pub set: Option<Value>,
    pub del: Option<Value>,
}

impl Property {
    pub fn readonly(get: Value) -> Self {
        Self {
            get: Some(get),
            ..Self::default()
        }
    }
}

impl Runtime {
    /// Reads through a property. A property with no getter refuses the read
    /// outright rather than falling back to instance storage.
    pub(crate) fn property_load(&mut self, prop: Property, this: Value) -> RuntimeResult<Value> {
        let Some(getter) = prop.get else {
            return Err(RuntimeError::UnreadableAttribute);
        };
        self.call(getter, &[this])
    }

    /// Writes or deletes through a property. Returns `Ok(false)` when the
    /// property lacks the requested operation; the caller reports that as an
    /// attribute error, it never falls through to plain storage.
    pub(crate) fn property_store(
        &mut self,
        prop: Property,
        this: Value,
        value: Option<Value>,
    ) -> RuntimeResult<bool> {
        match value {
            Some(v) => match prop.set {
                Some(setter) => {
                    self.call(setter, &[this, v])?;
                    Ok(true)
                }
                None => Ok(false),
            },
            None => match prop.del {
                Some(deleter) => {
                    self.call(deleter, &[this])?;
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    /// Invokes a descriptor's `__get__` hook with the instance and the owner
    /// type.
    pub(crate) fn descriptor_get(
        &mut self,
        descriptor: Value,
        this: Value,
        owner: TypeIndex,
    ) -> RuntimeResult<Option<Value>> {
        let Some(hook) = self.find_method(descriptor, "__get__")? else {
            return Ok(None);
        };
        let args = [descriptor, this, Value::Type(owner)];
        self.call_bound_with_self(hook, &args).map(Some)
    }

    /// Invokes a descriptor's `__set__` or `__delete__` hook. Returns
    /// `Ok(false)` when the descriptor lacks the hook, in which case the
    /// store continues down the normal path.
    pub(crate) fn descriptor_store(
        &mut self,
        descriptor: Value,
        this: Value,
        value: Option<Value>,
    ) -> RuntimeResult<bool> {
        match value {
            Some(v) => {
                let Some(hook) = self.find_method(descriptor, "__set__")? else {
                    return Ok(false);
                };
                self.call_bound_with_self(hook, &[descriptor, this, v])?;
                Ok(true)
            }
            None => {
                let Some(hook) = self.find_method(descriptor, "__delete__")? else {
                    return Ok(false);
                };
                self.call_bound_with_self(hook, &[descriptor, this])?;
                Ok(true)
            }
        }
    }

    /// Calls a hook resolved by [`Runtime::find_method`]. Hooks found in the
    /// class hierarchy arrive already bound to the descriptor, so the
    /// explicit receiver in `args` is dropped to avoid passing it twice.
    fn call_bound_with_self(
        &mut self,
        hook: crate::runtime::lookup::Bound,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        if hook.receiver.is_some() {
            self.call_bound(&hook, &args[1..])
        } else {
            self.call_bound(&hook, args)
        }
    }
}
