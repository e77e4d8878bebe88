use crate::errors::{RuntimeError, RuntimeResult};
use crate::memory::object_map::{ObjectKind, ObjectMap};
use crate::memory::value::Value;
use crate::runtime::dispatch::{SubscrOp, UnaryOp};
use crate::runtime::instance::{instance_of, instance_of_mut, Instance};
use crate::runtime::types::{CapabilityTable, NativeHook, TypeIndex, TypeSpec};
use crate::runtime::Runtime;
use log::trace;

/// Byte offsets of the logical color channels inside one element. The wire
/// format is GRB(W), so red and green swap places.
pub const COLOR_INDEX_RED: usize = 1;
pub const COLOR_INDEX_GREEN: usize = 0;
pub const COLOR_INDEX_BLUE: usize = 2;
pub const COLOR_INDEX_WHITE: usize = 3;

const CHANNEL_ORDER: [usize; 4] = [
    COLOR_INDEX_RED,
    COLOR_INDEX_GREEN,
    COLOR_INDEX_BLUE,
    COLOR_INDEX_WHITE,
];

/// Native backing store of a NeoPixel instance: the strip geometry and the
/// raw byte buffer in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelStrip {
    pub pin: u8,
    pub element_count: usize,
    pub bytes_per_element: usize,
    pub buf: Vec<u8>,
    pub device_id: u32,
}

/// Registers the `NeoPixel` class and returns its type index.
pub fn register(rt: &mut Runtime) -> RuntimeResult<TypeIndex> {
    let order = rt.heap.put(ObjectKind::Tuple(vec![
        Value::Int(COLOR_INDEX_RED as i64),
        Value::Int(COLOR_INDEX_GREEN as i64),
        Value::Int(COLOR_INDEX_BLUE as i64),
        Value::Int(COLOR_INDEX_WHITE as i64),
    ]))?;
    let spec = TypeSpec::new("NeoPixel")
        .local("__init__", Value::Fn(init))
        .local("__len__", Value::Fn(len))
        .local("__getitem__", Value::Fn(get_item))
        .local("__setitem__", Value::Fn(set_item))
        .local("fill", Value::Fn(fill))
        .local("write", Value::Fn(write))
        .local("show", Value::Fn(write))
        .local("clear", Value::Fn(clear))
        .local("ORDER", Value::Obj(order))
        .hooks(CapabilityTable::new(vec![
            NativeHook::Attr(strip_attr),
            NativeHook::Unary(strip_unary),
            NativeHook::Print(strip_print),
        ]));
    rt.types.register(&rt.heap, spec)
}

/// `NeoPixel(pin, n, bpp=3)`. Allocates the zeroed buffer and registers the
/// strip with the device before the instance becomes usable.
fn init(rt: &mut Runtime, args: &[Value]) -> RuntimeResult<Value> {
    if !(3..=4).contains(&args.len()) {
        return Err(RuntimeError::TypeMismatch(format!(
            "__init__ takes 2 or 3 arguments, got {}",
            args.len().saturating_sub(1)
        )));
    }
    let this = args[0];
    let pin = expect_int(args[1])?;
    if !(0..=255).contains(&pin) {
        return Err(RuntimeError::Validation("invalid pin".into()));
    }
    let element_count = expect_int(args[2])?;
    if element_count <= 0 {
        return Err(RuntimeError::Validation("invalid number of pixels".into()));
    }
    let bytes_per_element = match args.get(3) {
        Some(&v) => expect_int(v)?,
        None => 3,
    };
    if bytes_per_element != 3 && bytes_per_element != 4 {
        return Err(RuntimeError::Validation("invalid bpp".into()));
    }

    let Value::Obj(idx) = this else {
        return Err(RuntimeError::TypeMismatch(format!(
            "expected an instance, got {}",
            this
        )));
    };
    let strip = PixelStrip {
        pin: pin as u8,
        element_count: element_count as usize,
        bytes_per_element: bytes_per_element as usize,
        buf: vec![0; element_count as usize * bytes_per_element as usize],
        device_id: idx.idx as u32,
    };
    trace!(
        "neopixel: registering strip {} (pin {}, {}x{})",
        strip.device_id,
        strip.pin,
        strip.element_count,
        strip.bytes_per_element
    );
    rt.device.register(
        strip.device_id,
        strip.pin,
        strip.element_count,
        strip.bytes_per_element,
        &strip.buf,
    )?;
    instance_of_mut(&mut rt.heap, this)?.payload = Some(strip);
    Ok(Value::Unit)
}

fn len(rt: &mut Runtime, args: &[Value]) -> RuntimeResult<Value> {
    expect_arity(args, 1)?;
    let strip = strip_of(&rt.heap, args[0])?;
    Ok(Value::Int(strip.element_count as i64))
}

/// `strip[i]` reads one element back out of the wire buffer as a channel
/// tuple in logical (r, g, b[, w]) order.
fn get_item(rt: &mut Runtime, args: &[Value]) -> RuntimeResult<Value> {
    expect_arity(args, 2)?;
    let index = expect_int(args[1])?;
    let strip = strip_of(&rt.heap, args[0])?;
    let i = checked_index(index, strip.element_count)?;
    let base = i * strip.bytes_per_element;
    let channels: Vec<Value> = (0..strip.bytes_per_element)
        .map(|k| Value::Int(strip.buf[base + CHANNEL_ORDER[k]] as i64))
        .collect();
    let idx = rt.heap.put(ObjectKind::Tuple(channels))?;
    Ok(Value::Obj(idx))
}

/// `strip[i] = (r, g, b[, w])`. Channels above 255 wrap modulo 255; negative
/// channels are rejected.
fn set_item(rt: &mut Runtime, args: &[Value]) -> RuntimeResult<Value> {
    expect_arity(args, 3)?;
    let index = expect_int(args[1])?;
    let channels = match args[2] {
        Value::Obj(idx) => match rt.heap.get(idx)? {
            ObjectKind::Tuple(items) => items.clone(),
            kind => {
                return Err(RuntimeError::TypeMismatch(format!(
                    "expected a channel tuple, got {}",
                    kind
                )))
            }
        },
        other => {
            return Err(RuntimeError::TypeMismatch(format!(
                "expected a channel tuple, got {}",
                other
            )))
        }
    };

    let strip = strip_of(&rt.heap, args[0])?;
    let i = checked_index(index, strip.element_count)?;
    if channels.len() > strip.bytes_per_element {
        return Err(RuntimeError::Validation(
            "invalid number of color channels".into(),
        ));
    }
    let mut bytes = Vec::with_capacity(channels.len());
    for &channel in &channels {
        let mut color = expect_int(channel)?;
        if color > 255 {
            color %= 255;
        }
        if color < 0 {
            return Err(RuntimeError::Validation("invalid color".into()));
        }
        bytes.push(color as u8);
    }

    let strip = strip_of_mut(&mut rt.heap, args[0])?;
    let base = i * strip.bytes_per_element;
    for (k, byte) in bytes.into_iter().enumerate() {
        strip.buf[base + CHANNEL_ORDER[k]] = byte;
    }
    Ok(Value::Unit)
}

/// Paints every element with the same color. Goes through the subscript
/// protocol so a subclass `__setitem__` override is honored.
fn fill(rt: &mut Runtime, args: &[Value]) -> RuntimeResult<Value> {
    expect_arity(args, 2)?;
    let this = args[0];
    let color = args[1];
    let n = strip_of(&rt.heap, this)?.element_count;
    for i in 0..n {
        rt.subscr(this, Value::Int(i as i64), SubscrOp::Store(color))?;
    }
    Ok(Value::Unit)
}

fn write(rt: &mut Runtime, args: &[Value]) -> RuntimeResult<Value> {
    expect_arity(args, 1)?;
    let strip = strip_of(&rt.heap, args[0])?;
    trace!("neopixel: transmit strip {}", strip.device_id);
    rt.device.transmit(
        strip.device_id,
        strip.element_count * strip.bytes_per_element,
        &strip.buf,
    )?;
    Ok(Value::Unit)
}

fn clear(rt: &mut Runtime, args: &[Value]) -> RuntimeResult<Value> {
    expect_arity(args, 1)?;
    let strip = strip_of_mut(&mut rt.heap, args[0])?;
    strip.buf.fill(0);
    write(rt, args)
}

/// Serves the read-only geometry attributes without a class entry per field.
fn strip_attr(inst: &Instance, name: &str) -> Option<Value> {
    let strip = inst.payload.as_ref()?;
    match name {
        "pin" => Some(Value::Int(strip.pin as i64)),
        "n" => Some(Value::Int(strip.element_count as i64)),
        "bpp" => Some(Value::Int(strip.bytes_per_element as i64)),
        _ => None,
    }
}

fn strip_unary(rt: &mut Runtime, op: UnaryOp, obj: Value) -> RuntimeResult<Value> {
    match op {
        UnaryOp::Len => {
            let strip = strip_of(&rt.heap, obj)?;
            Ok(Value::Int(strip.element_count as i64))
        }
        UnaryOp::Hash => match obj {
            Value::Obj(idx) => Ok(Value::Int(idx.idx as i64)),
            other => Err(RuntimeError::TypeMismatch(format!(
                "expected an instance, got {}",
                other
            ))),
        },
        UnaryOp::Int => Err(RuntimeError::UnsupportedOperation("__int__")),
    }
}

fn strip_print(_heap: &ObjectMap, value: Value) -> String {
    match value {
        Value::Obj(idx) => format!("<NeoPixel object at {}>", idx),
        other => format!("<NeoPixel object {}>", other),
    }
}

fn checked_index(index: i64, len: usize) -> RuntimeResult<usize> {
    if index < 0 || index as usize >= len {
        return Err(RuntimeError::IndexOutOfBounds { index, len });
    }
    Ok(index as usize)
}

/// Fixed-arity guard for the native methods; `expected` counts the receiver.
fn expect_arity(args: &[Value], expected: usize) -> RuntimeResult<()> {
    if args.len() != expected {
        return Err(RuntimeError::TypeMismatch(format!(
            "function takes {} arguments, got {}",
            expected.saturating_sub(1),
            args.len().saturating_sub(1)
        )));
    }
    Ok(())
}

fn expect_int(value: Value) -> RuntimeResult<i64> {
    match value {
        Value::Int(i) => Ok(i),
        other => Err(RuntimeError::TypeMismatch(format!(
            "expected an int, got {}",
            other
        ))),
    }
}

fn strip_of(heap: &ObjectMap, value: Value) -> RuntimeResult<&PixelStrip> {
    instance_of(heap, value)?
        .payload
        .as_ref()
        .ok_or_else(|| RuntimeError::TypeMismatch("object has no pixel buffer".into()))
}

fn strip_of_mut(heap: &mut ObjectMap, value: Value) -> RuntimeResult<&mut PixelStrip> {
    instance_of_mut(heap, value)?
        .payload
        .as_mut()
        .ok_or_else(|| RuntimeError::TypeMismatch("object has no pixel buffer".into()))
}
