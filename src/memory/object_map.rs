use crate::errors::{RuntimeError, RuntimeResult};
use crate::memory::value::Value;
use crate::runtime::accessor::Property;
use crate::runtime::instance::Instance;
use crate::runtime::BoundMethod;
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// Slot arena for heap objects.
///
/// Free slots form an intrusive linked list threaded through
/// [`ObjectKind::Free`]. Slots are reused in LIFO order; the map never grows
/// past the size given at construction.
///
/// Live slots are reference counted. `put` hands back the single owning
/// reference; storing a value into a container transfers that reference,
/// handing a value out to another holder goes through [`ObjectMap::rc_inc`],
/// and [`ObjectMap::rc_dec`] frees the slot when the last reference is gone.
pub struct ObjectMap {
    mem: Vec<Object>,
    pub free: ObjectIndex,
    pub used_space: usize,
}

#[repr(transparent)]
#[derive(Clone, Copy, Default, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct ObjectIndex {
    pub idx: usize,
}

impl From<ObjectIndex> for usize {
    fn from(value: ObjectIndex) -> Self {
        value.idx
    }
}

impl ObjectIndex {
    pub const fn new(i: usize) -> ObjectIndex {
        ObjectIndex { idx: i }
    }
}

impl Display for ObjectIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[@{}]", self.idx)
    }
}

impl ObjectMap {
    pub fn new(space: usize) -> Self {
        Self {
            free: ObjectIndex::new(0),
            mem: (0..space)
                .map(|x| Object {
                    kind: ObjectKind::Free {
                        next: ObjectIndex::new((x + 1) % space),
                    },
                    rc: 0,
                })
                .collect(),
            used_space: 0,
        }
    }

    pub fn clear(&mut self) {
        for (idx, obj) in self.mem.iter_mut().enumerate() {
            obj.kind = ObjectKind::Free { next: self.free };
            obj.rc = 0;
            self.free = ObjectIndex::new(idx);
        }
        self.used_space = 0;
    }

    pub fn put(&mut self, kind: ObjectKind) -> RuntimeResult<ObjectIndex> {
        let idx = self.free;
        let slot = self
            .mem
            .get_mut(idx.idx)
            .ok_or(RuntimeError::OutOfMemory)?;
        match std::mem::replace(slot, Object { kind, rc: 1 }) {
            Object {
                kind: ObjectKind::Free { next },
                ..
            } => {
                self.free = next;
                self.used_space += 1;
                Ok(idx)
            }
            previous => {
                // The free list wrapped around onto a live slot.
                self.mem[idx.idx] = previous;
                Err(RuntimeError::OutOfMemory)
            }
        }
    }

    /// Unconditionally frees a slot, then drops one reference from every
    /// heap value the freed object was holding.
    pub fn free(&mut self, index: ObjectIndex) -> RuntimeResult<()> {
        let slot = self
            .mem
            .get_mut(index.idx)
            .ok_or(RuntimeError::NullReference)?;
        if matches!(slot.kind, ObjectKind::Free { .. }) {
            return Err(RuntimeError::NullReference);
        }
        let kind = std::mem::replace(&mut slot.kind, ObjectKind::Free { next: self.free });
        slot.rc = 0;
        self.free = index;
        self.used_space -= 1;

        let mut held = Vec::new();
        match &kind {
            ObjectKind::Tuple(items) => {
                for item in items {
                    if let Value::Obj(i) = item {
                        held.push(*i);
                    }
                }
            }
            ObjectKind::Method(m) => {
                if let Value::Obj(i) = m.receiver {
                    held.push(i);
                }
            }
            ObjectKind::Instance(inst) => {
                for member in inst.members.values() {
                    if let Value::Obj(i) = member {
                        held.push(*i);
                    }
                }
            }
            ObjectKind::Property(p) => {
                for accessor in [p.get, p.set, p.del].into_iter().flatten() {
                    if let Value::Obj(i) = accessor {
                        held.push(i);
                    }
                }
            }
            _ => {}
        }
        for child in held {
            self.rc_dec(child)?;
        }
        Ok(())
    }

    #[inline(always)]
    pub fn rc_inc(&mut self, index: ObjectIndex) {
        self.mem[index.idx].rc += 1;
    }

    pub fn rc_dec(&mut self, index: ObjectIndex) -> RuntimeResult<()> {
        let obj = self
            .mem
            .get_mut(index.idx)
            .ok_or(RuntimeError::NullReference)?;
        if matches!(obj.kind, ObjectKind::Free { .. }) {
            return Err(RuntimeError::NullReference);
        }
        obj.rc -= 1;
        if obj.rc == 0 {
            self.free(index)?;
        }
        Ok(())
    }

    #[inline(always)]
    pub fn get(&self, index: ObjectIndex) -> RuntimeResult<&ObjectKind> {
        match self.mem.get(index.idx) {
            Some(Object {
                kind: ObjectKind::Free { .. },
                ..
            })
            | None => Err(RuntimeError::NullReference),
            Some(obj) => Ok(&obj.kind),
        }
    }

    #[inline(always)]
    pub fn get_mut(&mut self, index: ObjectIndex) -> RuntimeResult<&mut ObjectKind> {
        match self.mem.get_mut(index.idx) {
            Some(Object {
                kind: ObjectKind::Free { .. },
                ..
            })
            | None => Err(RuntimeError::NullReference),
            Some(obj) => Ok(&mut obj.kind),
        }
    }
}

impl Display for ObjectMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, obj) in self.mem.iter().enumerate() {
            if let Object {
                kind: ObjectKind::Free { .. },
                ..
            } = obj
            {
                continue;
            }
            writeln!(f, "\t{}: {}", i, obj)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Object {
    pub kind: ObjectKind,
    /// Reference count.
    pub rc: usize,
}

impl Display for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} (rc: {})", self.kind, self.rc)
    }
}

#[derive(Debug, Clone)]
pub enum ObjectKind {
    Str(String),
    Tuple(Vec<Value>),
    Property(Property),
    Method(BoundMethod),
    Instance(Instance),
    Free { next: ObjectIndex },
}

impl Default for ObjectKind {
    fn default() -> Self {
        ObjectKind::Free {
            next: ObjectIndex::default(),
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Str(s) => write!(f, "\"{}\"", s),
            ObjectKind::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            ObjectKind::Property(_) => write!(f, "<property>"),
            ObjectKind::Method(_) => write!(f, "<bound method>"),
            ObjectKind::Instance(inst) => write!(f, "<instance of type #{}>", inst.ty.idx),
            ObjectKind::Free { next } => write!(f, "Free: next -> {}", next),
        }
    }
}

impl ObjectKind {
    pub fn new(data: impl Into<ObjectKind>) -> Self {
        data.into()
    }

    pub fn str(&self) -> &String {
        match self {
            ObjectKind::Str(s) => s,
            _ => unreachable!("Expected a string, got a {:?}", self),
        }
    }

    pub fn tuple(&self) -> &Vec<Value> {
        match self {
            ObjectKind::Tuple(t) => t,
            _ => unreachable!("Expected a tuple, got a {:?}", self),
        }
    }

    pub fn instance(&self) -> &Instance {
        match self {
            ObjectKind::Instance(i) => i,
            _ => unreachable!("Expected an instance, got a {:?}", self),
        }
    }

    pub fn instance_mut(&mut self) -> &mut Instance {
        match self {
            ObjectKind::Instance(i) => i,
            _ => unreachable!("Expected an instance, got a {:?}", self),
        }
    }
}

impl From<String> for ObjectKind {
    fn from(value: String) -> Self {
        ObjectKind::Str(value)
    }
}

impl From<Vec<Value>> for ObjectKind {
    fn from(value: Vec<Value>) -> Self {
        ObjectKind::Tuple(value)
    }
}

impl From<Property> for ObjectKind {
    fn from(value: Property) -> Self {
        ObjectKind::Property(value)
    }
}

impl From<Instance> for ObjectKind {
    fn from(value: Instance) -> Self {
        ObjectKind::Instance(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_free_reuses_slots() {
        let mut map = ObjectMap::new(4);
        let a = map.put(ObjectKind::Str("a".into())).unwrap();
        let b = map.put(ObjectKind::Str("b".into())).unwrap();
        assert_eq!(map.used_space, 2);
        assert_eq!(map.get(a).unwrap().str(), "a");

        map.free(a).unwrap();
        assert!(map.get(a).is_err());
        let c = map.put(ObjectKind::Str("c".into())).unwrap();
        assert_eq!(c, a);
        assert_eq!(map.get(b).unwrap().str(), "b");
    }

    #[test]
    fn exhausted_map_reports_out_of_memory() {
        let mut map = ObjectMap::new(2);
        map.put(ObjectKind::Str("a".into())).unwrap();
        map.put(ObjectKind::Str("b".into())).unwrap();
        assert_eq!(
            map.put(ObjectKind::Str("c".into())),
            Err(RuntimeError::OutOfMemory)
        );
    }

    #[test]
    fn double_free_is_an_error() {
        let mut map = ObjectMap::new(2);
        let a = map.put(ObjectKind::Str("a".into())).unwrap();
        map.free(a).unwrap();
        assert_eq!(map.free(a), Err(RuntimeError::NullReference));
    }

    #[test]
    fn shared_slots_survive_until_the_last_reference_drops() {
        let mut map = ObjectMap::new(2);
        let a = map.put(ObjectKind::Str("a".into())).unwrap();
        map.rc_inc(a);
        map.rc_dec(a).unwrap();
        assert_eq!(map.get(a).unwrap().str(), "a");
        map.rc_dec(a).unwrap();
        assert!(map.get(a).is_err());
        assert_eq!(map.used_space, 0);
    }

    #[test]
    fn freeing_a_container_releases_what_it_holds() {
        let mut map = ObjectMap::new(4);
        let s = map.put(ObjectKind::Str("inner".into())).unwrap();
        let t = map.put(ObjectKind::Tuple(vec![Value::Obj(s)])).unwrap();
        map.free(t).unwrap();
        assert!(map.get(s).is_err());
        assert_eq!(map.used_space, 0);
    }

    #[test]
    fn clear_resets_everything() {
        let mut map = ObjectMap::new(2);
        map.put(ObjectKind::Str("a".into())).unwrap();
        map.put(ObjectKind::Str("b".into())).unwrap();
        map.clear();
        assert_eq!(map.used_space, 0);
        map.put(ObjectKind::Str("c".into())).unwrap();
    }
}
