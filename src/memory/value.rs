use crate::memory::object_map::ObjectIndex;
use crate::runtime::types::TypeIndex;
use crate::runtime::NativeFn;
use std::fmt;
use std::fmt::{Display, Formatter};

/// A runtime value.
///
/// Values are small and `Copy`; everything with interior state (strings,
/// tuples, properties, instances, bound methods) lives in the
/// [`ObjectMap`](crate::memory::object_map::ObjectMap) and is referenced
/// through an [`ObjectIndex`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Fn(NativeFn),
    Type(TypeIndex),
    Obj(ObjectIndex),
}

macro_rules! enum_variant_function {
    ($getter: ident, $is: ident, $variant: ident, $ty: ty) => {
        #[inline(always)]
        #[must_use]
        pub fn $getter(self) -> $ty {
            match self {
                Value::$variant(v) => v,
                _ => unreachable!("Expected a {}, got {:?}", stringify!($variant), self),
            }
        }

        #[inline(always)]
        #[must_use]
        pub fn $is(self) -> bool {
            matches!(self, Value::$variant(_))
        }
    };
}

impl Value {
    enum_variant_function!(as_bool, is_bool, Bool, bool);
    enum_variant_function!(as_int, is_int, Int, i64);
    enum_variant_function!(as_fn, is_fn, Fn, NativeFn);
    enum_variant_function!(as_type, is_type, Type, TypeIndex);
    enum_variant_function!(as_obj, is_obj, Obj, ObjectIndex);

    #[inline(always)]
    #[must_use]
    pub fn is_unit(self) -> bool {
        matches!(self, Value::Unit)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Fn(_) => write!(f, "<native fn>"),
            Value::Type(ty) => write!(f, "<type #{}>", ty.idx),
            Value::Obj(idx) => write!(f, "{}", idx),
        }
    }
}
