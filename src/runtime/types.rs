use crate::errors::{RuntimeError, RuntimeResult};
use crate::memory::object_map::{ObjectKind, ObjectMap};
use crate::memory::value::Value;
use crate::runtime::dispatch::{SubscrOp, UnaryOp};
use crate::runtime::instance::Instance;
use crate::runtime::Runtime;
use bitflags::bitflags;
use std::collections::HashMap;

/// Index of a type descriptor in the [`TypeRegistry`].
#[repr(transparent)]
#[derive(Clone, Copy, Default, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct TypeIndex {
    pub idx: usize,
}

impl TypeIndex {
    pub const fn new(i: usize) -> TypeIndex {
        TypeIndex { idx: i }
    }
}

/// The root sentinel every ancestor chain terminates in. It contributes no
/// attributes and is never searched.
pub const OBJECT_TYPE: TypeIndex = TypeIndex::new(0);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeFlags: u8 {
        /// The type (or an ancestor) defines properties, descriptors or
        /// setattr/delattr catch-alls, so stores must consult the class
        /// before touching instance storage.
        const HAS_SPECIAL_ACCESSORS = 1 << 0;
        /// The type carries native capability hooks.
        const NATIVE = 1 << 1;
    }
}

pub type SubscrFn = fn(&mut Runtime, Value, Value, SubscrOp) -> RuntimeResult<Value>;
pub type UnaryFn = fn(&mut Runtime, UnaryOp, Value) -> RuntimeResult<Value>;
pub type AttrFn = fn(&Instance, &str) -> Option<Value>;
pub type PrintFn = fn(&ObjectMap, Value) -> String;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Capability {
    Subscript,
    Unary,
    Attr,
    Print,
}

/// A native hook, tagged with the capability it provides.
#[derive(Clone, Copy)]
pub enum NativeHook {
    Subscript(SubscrFn),
    Unary(UnaryFn),
    Attr(AttrFn),
    Print(PrintFn),
}

impl NativeHook {
    pub fn capability(&self) -> Capability {
        match self {
            NativeHook::Subscript(_) => Capability::Subscript,
            NativeHook::Unary(_) => Capability::Unary,
            NativeHook::Attr(_) => Capability::Attr,
            NativeHook::Print(_) => Capability::Print,
        }
    }
}

/// Per-type registry of native capabilities. A type either carries a hook
/// for a capability or declares it absent by omission.
#[derive(Default)]
pub struct CapabilityTable {
    hooks: Vec<NativeHook>,
}

impl CapabilityTable {
    pub fn new(hooks: Vec<NativeHook>) -> Self {
        Self { hooks }
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn has(&self, cap: Capability) -> bool {
        self.hooks.iter().any(|h| h.capability() == cap)
    }

    pub fn subscript(&self) -> Option<SubscrFn> {
        self.hooks.iter().find_map(|h| match h {
            NativeHook::Subscript(f) => Some(*f),
            _ => None,
        })
    }

    pub fn unary(&self) -> Option<UnaryFn> {
        self.hooks.iter().find_map(|h| match h {
            NativeHook::Unary(f) => Some(*f),
            _ => None,
        })
    }

    pub fn attr(&self) -> Option<AttrFn> {
        self.hooks.iter().find_map(|h| match h {
            NativeHook::Attr(f) => Some(*f),
            _ => None,
        })
    }

    pub fn print(&self) -> Option<PrintFn> {
        self.hooks.iter().find_map(|h| match h {
            NativeHook::Print(f) => Some(*f),
            _ => None,
        })
    }
}

/// A registered class.
pub struct TypeDescriptor {
    pub name: &'static str,
    pub parents: Vec<TypeIndex>,
    /// Flattened method resolution order: the type itself first, then its
    /// ancestors depth-first left-to-right, first occurrence winning. The
    /// root sentinel is excluded.
    pub mro: Vec<TypeIndex>,
    pub locals: HashMap<&'static str, Value>,
    pub flags: TypeFlags,
    pub hooks: CapabilityTable,
}

/// Builder handed to [`TypeRegistry::register`].
pub struct TypeSpec {
    name: &'static str,
    parents: Vec<TypeIndex>,
    locals: Vec<(&'static str, Value)>,
    hooks: CapabilityTable,
}

impl TypeSpec {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            parents: Vec::new(),
            locals: Vec::new(),
            hooks: CapabilityTable::default(),
        }
    }

    pub fn parent(mut self, ty: TypeIndex) -> Self {
        self.parents.push(ty);
        self
    }

    /// Adds a class attribute. For heap values this takes over the caller's
    /// reference; the registry keeps the object alive for the life of the
    /// type.
    pub fn local(mut self, name: &'static str, value: Value) -> Self {
        self.locals.push((name, value));
        self
    }

    pub fn hooks(mut self, hooks: CapabilityTable) -> Self {
        self.hooks = hooks;
        self
    }
}

pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let root = TypeDescriptor {
            name: "object",
            parents: Vec::new(),
            mro: Vec::new(),
            locals: HashMap::new(),
            flags: TypeFlags::empty(),
            hooks: CapabilityTable::default(),
        };
        Self { types: vec![root] }
    }

    #[inline(always)]
    pub fn get(&self, index: TypeIndex) -> &TypeDescriptor {
        &self.types[index.idx]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registers a type and resolves its flattened method resolution order.
    ///
    /// Parents must already be registered, which rules out cycles by
    /// construction. The heap is consulted to classify locals that are
    /// accessor objects (properties or descriptor-bearing instances) when
    /// deriving [`TypeFlags::HAS_SPECIAL_ACCESSORS`].
    pub fn register(&mut self, heap: &ObjectMap, spec: TypeSpec) -> RuntimeResult<TypeIndex> {
        let TypeSpec {
            name,
            parents,
            locals,
            hooks,
        } = spec;
        let own = TypeIndex::new(self.types.len());
        for &parent in &parents {
            if parent.idx >= self.types.len() {
                return Err(RuntimeError::Validation(format!(
                    "unknown parent type #{} for '{}'",
                    parent.idx, name
                )));
            }
        }

        let mut mro = vec![own];
        for &parent in &parents {
            if parent == OBJECT_TYPE {
                continue;
            }
            for &step in &self.get(parent).mro {
                if !mro.contains(&step) {
                    mro.push(step);
                }
            }
        }

        let mut flags = TypeFlags::empty();
        if !hooks.is_empty() {
            flags |= TypeFlags::NATIVE;
        }
        let special = locals.iter().any(|(local_name, value)| {
            matches!(*local_name, "__setattr__" | "__delattr__")
                || self.is_accessor_value(heap, *value)
        }) || parents
            .iter()
            .any(|p| self.get(*p).flags.contains(TypeFlags::HAS_SPECIAL_ACCESSORS));
        if special {
            flags |= TypeFlags::HAS_SPECIAL_ACCESSORS;
        }

        self.types.push(TypeDescriptor {
            name,
            parents,
            mro,
            locals: locals.into_iter().collect(),
            flags,
            hooks,
        });
        Ok(own)
    }

    /// True when some type in `ty`'s resolution order defines `name` locally.
    pub fn defines(&self, ty: TypeIndex, name: &str) -> bool {
        self.get(ty)
            .mro
            .iter()
            .any(|&step| self.get(step).locals.contains_key(name))
    }

    fn is_accessor_value(&self, heap: &ObjectMap, value: Value) -> bool {
        let Value::Obj(idx) = value else {
            return false;
        };
        match heap.get(idx) {
            Ok(ObjectKind::Property(_)) => true,
            Ok(ObjectKind::Instance(inst)) => ["__get__", "__set__", "__delete__"]
                .iter()
                .any(|hook| self.defines(inst.ty, hook)),
            _ => false,
        }
    }
}
