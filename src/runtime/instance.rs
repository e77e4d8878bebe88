use crate::errors::{RuntimeError, RuntimeResult};
use crate::libraries::neopixel::PixelStrip;
use crate::memory::object_map::{ObjectKind, ObjectMap};
use crate::memory::value::Value;
use crate::runtime::types::TypeIndex;
use std::collections::HashMap;

/// A live object: a reference to its type, an open bag of per-object
/// attributes, and an optional statically-typed native backing store.
///
/// Keeping the native store as a dedicated field rather than an entry in
/// `members` keeps the buffer access path typed and bounds-checked.
#[derive(Debug, Clone)]
pub struct Instance {
    pub ty: TypeIndex,
    pub members: HashMap<String, Value>,
    pub payload: Option<PixelStrip>,
}

impl Instance {
    pub fn new(ty: TypeIndex) -> Self {
        Self {
            ty,
            members: HashMap::new(),
            payload: None,
        }
    }
}

pub fn instance_of(heap: &ObjectMap, value: Value) -> RuntimeResult<&Instance> {
    let Value::Obj(idx) = value else {
        return Err(RuntimeError::TypeMismatch(format!(
            "expected an instance, got {}",
            value
        )));
    };
    match heap.get(idx)? {
        ObjectKind::Instance(inst) => Ok(inst),
        kind => Err(RuntimeError::TypeMismatch(format!(
            "expected an instance, got {}",
            kind
        ))),
    }
}

pub fn instance_of_mut(heap: &mut ObjectMap, value: Value) -> RuntimeResult<&mut Instance> {
    let Value::Obj(idx) = value else {
        return Err(RuntimeError::TypeMismatch(format!(
            "expected an instance, got {}",
            value
        )));
    };
    match heap.get_mut(idx)? {
        ObjectKind::Instance(inst) => Ok(inst),
        kind => Err(RuntimeError::TypeMismatch(format!(
            "expected an instance, got {}",
            kind
        ))),
    }
}

pub fn try_instance(heap: &ObjectMap, value: Value) -> Option<&Instance> {
    let Value::Obj(idx) = value else {
        return None;
    };
    match heap.get(idx) {
        Ok(ObjectKind::Instance(inst)) => Some(inst),
        _ => None,
    }
}
