//! Output formatting for materialized structures

use extmem::{DynamicArray, Field, FieldKind, Structure, Value};
use serde_json::{json, Value as Json};
use std::fmt::Write;

/// Field tree of a structure, nested structures indented below their field
pub fn tree(structure: &Structure) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} @ {:#x} ({} bytes)",
        structure.name(),
        structure.address(),
        structure.size()
    );
    write_fields(&mut out, structure, 1);
    out
}

fn write_fields(out: &mut String, structure: &Structure, depth: usize) {
    let indent = "  ".repeat(depth);
    let width = structure
        .fields()
        .iter()
        .map(|f| f.name().len())
        .max()
        .unwrap_or(0);

    for field in structure.fields() {
        let _ = writeln!(
            out,
            "{}{:<width$}  +{:#06x}  {:<7}  {}",
            indent,
            field.name(),
            field.offset(),
            kind_label(field),
            display_value(field),
            width = width
        );

        if let Some(nested) = field.kind().nested() {
            if nested.address() != 0 {
                write_fields(out, nested, depth + 1);
            }
        }
    }
}

fn kind_label(field: &Field) -> String {
    match field.kind() {
        FieldKind::Scalar(ty) => ty.to_string(),
        FieldKind::Text(encoding) => format!("{:?}", encoding).to_lowercase(),
        FieldKind::Inline(s) | FieldKind::Pointed(s) => s.name().to_string(),
        kind => kind.name().to_string(),
    }
}

fn display_value(field: &Field) -> String {
    match field.value() {
        Value::Unset => "<unresolved>".to_string(),
        Value::Scalar(s) => s.to_string(),
        Value::Pointer(p) => format!("{:#x}", p),
        Value::Text(t) => format!("{:?}", t),
        Value::Inline(_) => format!("@ {:#x}", field.address()),
    }
}

/// JSON form of a structure
pub fn json(structure: &Structure) -> Json {
    let fields: Vec<Json> = structure.fields().iter().map(field_json).collect();
    json!({
        "name": structure.name(),
        "address": format!("{:#x}", structure.address()),
        "size": structure.size(),
        "fields": fields,
    })
}

fn field_json(field: &Field) -> Json {
    let mut out = json!({
        "name": field.name(),
        "offset": field.offset(),
        "kind": field.kind().name(),
        "address": format!("{:#x}", field.address()),
        "value": value_json(field.value()),
    });

    if let Some(nested) = field.kind().nested() {
        out["nested"] = json(nested);
    }
    out
}

fn value_json(value: &Value) -> Json {
    match value {
        Value::Unset => Json::Null,
        Value::Scalar(s) => serde_json::to_value(s).unwrap_or(Json::Null),
        Value::Pointer(p) => Json::String(format!("{:#x}", p)),
        Value::Text(t) => Json::String(t.clone()),
        Value::Inline(bytes) => Json::String(hex::encode(bytes)),
    }
}

/// Header summary followed by the first `limit` element trees
pub fn array_tree(array: &DynamicArray<Structure>, limit: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "DynamicArray @ {:#x}: data={:#x} count={} capacity={} stride={}{}",
        array.address(),
        array.data(),
        array.count(),
        array.capacity(),
        array.stride(),
        if array.is_stale() { " (stale)" } else { "" }
    );

    for (i, item) in array.iter().take(limit).enumerate() {
        let _ = writeln!(out, "[{}] {} @ {:#x}", i, item.name(), item.address());
        write_fields(&mut out, item, 1);
    }
    if array.len() > limit {
        let _ = writeln!(out, "... and {} more", array.len() - limit);
    }
    out
}

pub fn array_json(array: &DynamicArray<Structure>, limit: usize) -> Json {
    let items: Vec<Json> = array.iter().take(limit).map(json).collect();
    json!({
        "address": format!("{:#x}", array.address()),
        "data": format!("{:#x}", array.data()),
        "count": array.count(),
        "capacity": array.capacity(),
        "stale": array.is_stale(),
        "items": items,
    })
}
