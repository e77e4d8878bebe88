use pixelrt::libraries::handoff::NullHandoff;
use pixelrt::memory::object_map::ObjectKind;
use pixelrt::runtime::accessor::Property;
use pixelrt::runtime::dispatch::{SubscrOp, UnaryOp};
use pixelrt::runtime::instance::{instance_of, instance_of_mut};
use pixelrt::runtime::types::{CapabilityTable, NativeHook, TypeSpec};
use pixelrt::{Runtime, RuntimeError, RuntimeResult, Value};

fn runtime() -> Runtime {
    Runtime::new(Box::new(NullHandoff))
}

fn one(_rt: &mut Runtime, _args: &[Value]) -> RuntimeResult<Value> {
    Ok(Value::Int(1))
}

fn two(_rt: &mut Runtime, _args: &[Value]) -> RuntimeResult<Value> {
    Ok(Value::Int(2))
}

fn receiver(_rt: &mut Runtime, args: &[Value]) -> RuntimeResult<Value> {
    Ok(args[0])
}

#[test]
fn lookup_walks_ancestors_and_honors_overrides() {
    let mut rt = runtime();
    let base = rt
        .types
        .register(
            &rt.heap,
            TypeSpec::new("Base")
                .local("speak", Value::Fn(one))
                .local("base_only", Value::Fn(one)),
        )
        .unwrap();
    let child = rt
        .types
        .register(
            &rt.heap,
            TypeSpec::new("Child").parent(base).local("speak", Value::Fn(two)),
        )
        .unwrap();
    let grandchild = rt
        .types
        .register(&rt.heap, TypeSpec::new("Grandchild").parent(child))
        .unwrap();

    let obj = rt.construct(grandchild, &[]).unwrap();
    let speak = rt.load_attr(obj, "speak").unwrap();
    assert_eq!(rt.call(speak, &[]).unwrap(), Value::Int(2));
    let inherited = rt.load_attr(obj, "base_only").unwrap();
    assert_eq!(rt.call(inherited, &[]).unwrap(), Value::Int(1));
    assert!(matches!(
        rt.load_attr(obj, "missing"),
        Err(RuntimeError::AttributeError { .. })
    ));
}

#[test]
fn left_parent_wins_under_multiple_inheritance() {
    let mut rt = runtime();
    let left = rt
        .types
        .register(&rt.heap, TypeSpec::new("Left").local("who", Value::Fn(one)))
        .unwrap();
    let right = rt
        .types
        .register(&rt.heap, TypeSpec::new("Right").local("who", Value::Fn(two)))
        .unwrap();
    let both = rt
        .types
        .register(&rt.heap, TypeSpec::new("Both").parent(left).parent(right))
        .unwrap();

    let obj = rt.construct(both, &[]).unwrap();
    let who = rt.load_attr(obj, "who").unwrap();
    assert_eq!(rt.call(who, &[]).unwrap(), Value::Int(1));
}

#[test]
fn class_access_binds_to_the_requesting_type() {
    let mut rt = runtime();
    let base = rt
        .types
        .register(&rt.heap, TypeSpec::new("Base").local("make", Value::Fn(receiver)))
        .unwrap();
    let sub = rt
        .types
        .register(&rt.heap, TypeSpec::new("Sub").parent(base))
        .unwrap();

    // `make` lives on Base, but resolving it through Sub binds Sub.
    let make = rt.load_type_attr(sub, "make").unwrap();
    assert_eq!(rt.call(make, &[]).unwrap(), Value::Type(sub));
}

#[test]
fn init_runs_and_must_return_unit() {
    fn init_stores(rt: &mut Runtime, args: &[Value]) -> RuntimeResult<Value> {
        let inst = instance_of_mut(&mut rt.heap, args[0])?;
        inst.members.insert("seed".to_string(), args[1]);
        Ok(Value::Unit)
    }
    fn init_leaks(_rt: &mut Runtime, _args: &[Value]) -> RuntimeResult<Value> {
        Ok(Value::Int(1))
    }

    let mut rt = runtime();
    let good = rt
        .types
        .register(&rt.heap, TypeSpec::new("Good").local("__init__", Value::Fn(init_stores)))
        .unwrap();
    let bad = rt
        .types
        .register(&rt.heap, TypeSpec::new("Bad").local("__init__", Value::Fn(init_leaks)))
        .unwrap();

    let obj = rt.construct(good, &[Value::Int(41)]).unwrap();
    assert_eq!(rt.load_attr(obj, "seed").unwrap(), Value::Int(41));
    assert!(matches!(
        rt.construct(bad, &[]),
        Err(RuntimeError::TypeMismatch(_))
    ));
}

#[test]
fn properties_mediate_reads_and_reject_unwritable_stores() {
    fn get_seven(_rt: &mut Runtime, _args: &[Value]) -> RuntimeResult<Value> {
        Ok(Value::Int(7))
    }

    let mut rt = runtime();
    let prop = rt
        .heap
        .put(ObjectKind::Property(Property::readonly(Value::Fn(get_seven))))
        .unwrap();
    let ty = rt
        .types
        .register(&rt.heap, TypeSpec::new("Gauged").local("x", Value::Obj(prop)))
        .unwrap();
    let obj = rt.construct(ty, &[]).unwrap();

    assert_eq!(rt.load_attr(obj, "x").unwrap(), Value::Int(7));
    assert!(matches!(
        rt.store_attr(obj, "x", Value::Int(5)),
        Err(RuntimeError::AttributeError { .. })
    ));
    assert!(matches!(
        rt.delete_attr(obj, "x"),
        Err(RuntimeError::AttributeError { .. })
    ));
}

#[test]
fn getterless_property_is_unreadable() {
    let mut rt = runtime();
    let prop = rt.heap.put(ObjectKind::Property(Property::default())).unwrap();
    let ty = rt
        .types
        .register(&rt.heap, TypeSpec::new("Sealed").local("x", Value::Obj(prop)))
        .unwrap();
    let obj = rt.construct(ty, &[]).unwrap();

    assert_eq!(
        rt.load_attr(obj, "x"),
        Err(RuntimeError::UnreadableAttribute)
    );
}

#[test]
fn instance_storage_shadows_class_accessors_on_reads() {
    fn get_seven(_rt: &mut Runtime, _args: &[Value]) -> RuntimeResult<Value> {
        Ok(Value::Int(7))
    }

    let mut rt = runtime();
    let prop = rt
        .heap
        .put(ObjectKind::Property(Property::readonly(Value::Fn(get_seven))))
        .unwrap();
    let ty = rt
        .types
        .register(&rt.heap, TypeSpec::new("Gauged").local("x", Value::Obj(prop)))
        .unwrap();
    let obj = rt.construct(ty, &[]).unwrap();
    assert_eq!(rt.load_attr(obj, "x").unwrap(), Value::Int(7));

    // Writes go through the class and get refused, yet a value planted
    // directly in instance storage wins every later read.
    instance_of_mut(&mut rt.heap, obj)
        .unwrap()
        .members
        .insert("x".to_string(), Value::Int(5));
    assert_eq!(rt.load_attr(obj, "x").unwrap(), Value::Int(5));
}

#[test]
fn descriptors_route_reads_and_writes() {
    fn desc_get(_rt: &mut Runtime, _args: &[Value]) -> RuntimeResult<Value> {
        Ok(Value::Int(99))
    }
    fn desc_set(rt: &mut Runtime, args: &[Value]) -> RuntimeResult<Value> {
        // args: descriptor, owner instance, value
        let inst = instance_of_mut(&mut rt.heap, args[1])?;
        inst.members.insert("captured".to_string(), args[2]);
        Ok(Value::Unit)
    }

    let mut rt = runtime();
    let desc_ty = rt
        .types
        .register(
            &rt.heap,
            TypeSpec::new("Descriptor")
                .local("__get__", Value::Fn(desc_get))
                .local("__set__", Value::Fn(desc_set)),
        )
        .unwrap();
    let descriptor = rt.construct(desc_ty, &[]).unwrap();
    let Value::Obj(_) = descriptor else {
        panic!("expected an instance");
    };
    let owner = rt
        .types
        .register(&rt.heap, TypeSpec::new("Owner").local("d", descriptor))
        .unwrap();
    let obj = rt.construct(owner, &[]).unwrap();

    assert_eq!(rt.load_attr(obj, "d").unwrap(), Value::Int(99));
    rt.store_attr(obj, "d", Value::Int(5)).unwrap();
    assert_eq!(rt.load_attr(obj, "captured").unwrap(), Value::Int(5));
}

#[test]
fn descriptor_without_set_falls_through_to_instance_storage() {
    fn desc_get(_rt: &mut Runtime, _args: &[Value]) -> RuntimeResult<Value> {
        Ok(Value::Int(99))
    }

    let mut rt = runtime();
    let desc_ty = rt
        .types
        .register(&rt.heap, TypeSpec::new("ReadOnlyDesc").local("__get__", Value::Fn(desc_get)))
        .unwrap();
    let descriptor = rt.construct(desc_ty, &[]).unwrap();
    let owner = rt
        .types
        .register(&rt.heap, TypeSpec::new("Owner").local("d", descriptor))
        .unwrap();
    let obj = rt.construct(owner, &[]).unwrap();

    assert_eq!(rt.load_attr(obj, "d").unwrap(), Value::Int(99));
    rt.store_attr(obj, "d", Value::Int(5)).unwrap();
    // The plain member now shadows the descriptor.
    assert_eq!(rt.load_attr(obj, "d").unwrap(), Value::Int(5));
}

#[test]
fn getattr_catches_misses_but_not_the_accessor_hooks() {
    fn fallback(_rt: &mut Runtime, _args: &[Value]) -> RuntimeResult<Value> {
        Ok(Value::Int(42))
    }

    let mut rt = runtime();
    let ty = rt
        .types
        .register(
            &rt.heap,
            TypeSpec::new("Elastic").local("__getattr__", Value::Fn(fallback)),
        )
        .unwrap();
    let obj = rt.construct(ty, &[]).unwrap();

    assert_eq!(rt.load_attr(obj, "anything").unwrap(), Value::Int(42));
    // The catch-all never answers for the accessor hooks themselves.
    assert!(matches!(
        rt.load_attr(obj, "__setattr__"),
        Err(RuntimeError::AttributeError { .. })
    ));
}

#[test]
fn setattr_and_delattr_catch_alls_intercept_stores() {
    fn guard_set(rt: &mut Runtime, args: &[Value]) -> RuntimeResult<Value> {
        // args: instance, name, value
        let inst = instance_of_mut(&mut rt.heap, args[0])?;
        inst.members.insert("last_write".to_string(), args[2]);
        Ok(Value::Unit)
    }
    fn guard_del(rt: &mut Runtime, args: &[Value]) -> RuntimeResult<Value> {
        let inst = instance_of_mut(&mut rt.heap, args[0])?;
        inst.members.insert("deleted".to_string(), Value::Bool(true));
        Ok(Value::Unit)
    }

    let mut rt = runtime();
    let ty = rt
        .types
        .register(
            &rt.heap,
            TypeSpec::new("Guarded")
                .local("__setattr__", Value::Fn(guard_set))
                .local("__delattr__", Value::Fn(guard_del)),
        )
        .unwrap();
    let obj = rt.construct(ty, &[]).unwrap();

    rt.store_attr(obj, "x", Value::Int(5)).unwrap();
    let inst = instance_of(&rt.heap, obj).unwrap();
    assert_eq!(inst.members.get("last_write"), Some(&Value::Int(5)));
    assert!(!inst.members.contains_key("x"));

    rt.delete_attr(obj, "x").unwrap();
    let inst = instance_of(&rt.heap, obj).unwrap();
    assert_eq!(inst.members.get("deleted"), Some(&Value::Bool(true)));
}

#[test]
fn attribute_dispatch_reclaims_its_temporaries() {
    fn fallback(_rt: &mut Runtime, _args: &[Value]) -> RuntimeResult<Value> {
        Ok(Value::Int(42))
    }
    fn swallow(_rt: &mut Runtime, _args: &[Value]) -> RuntimeResult<Value> {
        Ok(Value::Unit)
    }

    let mut rt = runtime();
    let ty = rt
        .types
        .register(
            &rt.heap,
            TypeSpec::new("Chatty")
                .local("__getattr__", Value::Fn(fallback))
                .local("__setattr__", Value::Fn(swallow)),
        )
        .unwrap();
    let obj = rt.construct(ty, &[]).unwrap();

    // Every iteration interns an attribute name for each catch-all; far more
    // of them than the heap has slots.
    for _ in 0..4096 {
        assert_eq!(rt.load_attr(obj, "anything").unwrap(), Value::Int(42));
        rt.store_attr(obj, "x", Value::Int(1)).unwrap();
    }
}

#[test]
fn failed_construction_reclaims_the_instance_slot() {
    fn init_leaks(_rt: &mut Runtime, _args: &[Value]) -> RuntimeResult<Value> {
        Ok(Value::Int(1))
    }

    let mut rt = runtime();
    let bad = rt
        .types
        .register(&rt.heap, TypeSpec::new("Bad").local("__init__", Value::Fn(init_leaks)))
        .unwrap();
    let before = rt.heap.used_space;
    for _ in 0..4096 {
        assert!(rt.construct(bad, &[]).is_err());
    }
    assert_eq!(rt.heap.used_space, before);
}

#[test]
fn plain_stores_land_in_instance_storage() {
    let mut rt = runtime();
    let ty = rt.types.register(&rt.heap, TypeSpec::new("Bag")).unwrap();
    let obj = rt.construct(ty, &[]).unwrap();

    rt.store_attr(obj, "x", Value::Int(5)).unwrap();
    assert_eq!(rt.load_attr(obj, "x").unwrap(), Value::Int(5));
    rt.delete_attr(obj, "x").unwrap();
    assert!(matches!(
        rt.load_attr(obj, "x"),
        Err(RuntimeError::AttributeError { .. })
    ));
    assert!(matches!(
        rt.delete_attr(obj, "x"),
        Err(RuntimeError::AttributeError { .. })
    ));
}

#[test]
fn hash_and_int_must_return_integers() {
    fn bad_hash(_rt: &mut Runtime, _args: &[Value]) -> RuntimeResult<Value> {
        Ok(Value::Bool(true))
    }
    fn good_int(_rt: &mut Runtime, _args: &[Value]) -> RuntimeResult<Value> {
        Ok(Value::Int(17))
    }

    let mut rt = runtime();
    let ty = rt
        .types
        .register(
            &rt.heap,
            TypeSpec::new("Numeric")
                .local("__hash__", Value::Fn(bad_hash))
                .local("__int__", Value::Fn(good_int)),
        )
        .unwrap();
    let obj = rt.construct(ty, &[]).unwrap();

    assert!(matches!(
        rt.unary_op(UnaryOp::Hash, obj),
        Err(RuntimeError::TypeMismatch(_))
    ));
    assert_eq!(rt.unary_op(UnaryOp::Int, obj).unwrap(), Value::Int(17));
}

#[test]
fn hash_defaults_to_identity_unless_eq_is_defined() {
    let mut rt = runtime();
    let plain = rt.types.register(&rt.heap, TypeSpec::new("Plain")).unwrap();
    let comparable = rt
        .types
        .register(&rt.heap, TypeSpec::new("Comparable").local("__eq__", Value::Fn(one)))
        .unwrap();

    let obj = rt.construct(plain, &[]).unwrap();
    let Value::Obj(idx) = obj else {
        panic!("expected an instance");
    };
    assert_eq!(
        rt.unary_op(UnaryOp::Hash, obj).unwrap(),
        Value::Int(idx.idx as i64)
    );

    let cmp = rt.construct(comparable, &[]).unwrap();
    assert!(matches!(
        rt.unary_op(UnaryOp::Hash, cmp),
        Err(RuntimeError::UnsupportedOperation(_))
    ));
}

#[test]
fn missing_protocols_are_unsupported() {
    let mut rt = runtime();
    let ty = rt.types.register(&rt.heap, TypeSpec::new("Inert")).unwrap();
    let obj = rt.construct(ty, &[]).unwrap();

    assert!(matches!(
        rt.subscr(obj, Value::Int(0), SubscrOp::Load),
        Err(RuntimeError::UnsupportedOperation("__getitem__"))
    ));
    assert!(matches!(
        rt.unary_op(UnaryOp::Len, obj),
        Err(RuntimeError::UnsupportedOperation("__len__"))
    ));
    assert!(matches!(
        rt.unary_op(UnaryOp::Int, obj),
        Err(RuntimeError::UnsupportedOperation("__int__"))
    ));
}

#[test]
fn native_subscript_slot_serves_types_without_a_dunder() {
    fn items_slot(
        rt: &mut Runtime,
        obj: Value,
        index: Value,
        op: SubscrOp,
    ) -> RuntimeResult<Value> {
        match op {
            SubscrOp::Load => {
                let inst = instance_of(&rt.heap, obj)?;
                let Some(&Value::Obj(items)) = inst.members.get("items") else {
                    return Err(RuntimeError::AttributeError { name: "items".into() });
                };
                let i = index.as_int() as usize;
                let tuple = rt.heap.get(items)?.tuple();
                tuple
                    .get(i)
                    .copied()
                    .ok_or(RuntimeError::IndexOutOfBounds {
                        index: i as i64,
                        len: tuple.len(),
                    })
            }
            _ => Err(RuntimeError::UnsupportedOperation("__setitem__")),
        }
    }

    let mut rt = runtime();
    let ty = rt
        .types
        .register(
            &rt.heap,
            TypeSpec::new("NativeSeq").hooks(CapabilityTable::new(vec![NativeHook::Subscript(
                items_slot,
            )])),
        )
        .unwrap();
    let obj = rt.construct(ty, &[]).unwrap();
    let items = rt
        .heap
        .put(ObjectKind::Tuple(vec![Value::Int(4), Value::Int(5)]))
        .unwrap();
    rt.store_attr(obj, "items", Value::Obj(items)).unwrap();

    assert_eq!(
        rt.subscr(obj, Value::Int(1), SubscrOp::Load).unwrap(),
        Value::Int(5)
    );
    assert!(matches!(
        rt.subscr(obj, Value::Int(0), SubscrOp::Store(Value::Int(9))),
        Err(RuntimeError::UnsupportedOperation(_))
    ));
}

#[test]
fn class_dunder_wins_over_a_native_slot() {
    fn seven(_rt: &mut Runtime, _args: &[Value]) -> RuntimeResult<Value> {
        Ok(Value::Int(7))
    }
    fn eight_slot(
        _rt: &mut Runtime,
        _obj: Value,
        _index: Value,
        _op: SubscrOp,
    ) -> RuntimeResult<Value> {
        Ok(Value::Int(8))
    }

    let mut rt = runtime();
    let ty = rt
        .types
        .register(
            &rt.heap,
            TypeSpec::new("Shadowed")
                .local("__getitem__", Value::Fn(seven))
                .hooks(CapabilityTable::new(vec![NativeHook::Subscript(eight_slot)])),
        )
        .unwrap();
    let obj = rt.construct(ty, &[]).unwrap();

    assert_eq!(
        rt.subscr(obj, Value::Int(0), SubscrOp::Load).unwrap(),
        Value::Int(7)
    );
}
