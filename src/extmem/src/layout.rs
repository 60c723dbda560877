//! Structure declarations
//!
//! A [`Layout`] is the explicit registration of a foreign structure: an
//! ordered list of named fields. Building it against a [`Remote`] sizes every
//! field for the target's pointer width, checks the dependency graph, orders
//! fields so each one resolves after the pointer it depends on, and computes
//! how many bytes to fetch for the structure and behind every pointer.

use crate::field::{Field, FieldId, FieldKind, FieldSpec, KindSpec, LayoutTag};
use crate::source::{PointerWidth, Remote};
use crate::structure::Structure;
use crate::value::Value;
use crate::{ConfigError, Result};

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Declared field list of a foreign structure
#[derive(Debug, Clone)]
pub struct Layout {
    name: String,
    tag: LayoutTag,
    fields: Vec<(String, FieldSpec)>,
}

impl Layout {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: LayoutTag::next(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a field; declaration order is kept as the tie breaker for
    /// fields sharing an offset
    pub fn field(&mut self, name: impl Into<String>, spec: FieldSpec) -> FieldId {
        self.fields.push((name.into(), spec));
        FieldId::new(self.tag, self.fields.len() - 1)
    }

    /// Make `field` depend on `pointer` after both have been declared
    pub fn set_dependency(&mut self, field: FieldId, pointer: FieldId) -> Result<()> {
        self.check_owned(pointer)?;
        let index = self.check_owned(field)?;
        let (_, spec) = self
            .fields
            .get_mut(index)
            .ok_or(ConfigError::UnknownField(index))?;
        spec.dependency = Some(pointer);
        Ok(())
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        let tag = self.tag;
        self.fields
            .iter()
            .position(|(n, _)| n == name)
            .map(|i| FieldId::new(tag, i))
    }

    pub fn specs(&self) -> impl Iterator<Item = (FieldId, &str, &FieldSpec)> {
        let tag = self.tag;
        self.fields
            .iter()
            .enumerate()
            .map(move |(i, (name, spec))| (FieldId::new(tag, i), name.as_str(), spec))
    }

    fn check_owned(&self, id: FieldId) -> Result<usize> {
        if id.layout() != self.tag {
            return Err(ConfigError::ForeignField {
                layout: self.name.clone(),
                index: id.index(),
            }
            .into());
        }
        Ok(id.index())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a structure bound to `remote`, with its address unset
    pub fn build(&self, remote: &Remote) -> Result<Structure> {
        let width = remote.pointer_width();
        let mut fields = Vec::with_capacity(self.fields.len());

        for (name, spec) in &self.fields {
            fields.push(build_field(name, spec, width, remote)?);
        }

        for (_, spec) in &self.fields {
            if let Some(dep) = spec.dependency {
                self.check_owned(dep)?;
            }
        }
        check_dependencies(&fields)?;
        let order = resolution_order(&fields, self.tag)?;

        for i in 0..fields.len() {
            if fields[i].kind.is_pointer() {
                fields[i].pointed_size = span(&fields, Some(i));
                fields[i].pointed = vec![0; fields[i].pointed_size];
            }
        }
        let size = span(&fields, None);

        Ok(Structure::from_parts(
            self.name.clone(),
            self.tag,
            remote.clone(),
            fields,
            order,
            size,
        ))
    }
}

fn build_field(name: &str, spec: &FieldSpec, width: PointerWidth, remote: &Remote) -> Result<Field> {
    let width = spec.pointer_width.unwrap_or(width);

    let (kind, size) = match &spec.kind {
        KindSpec::Scalar(ty) => (FieldKind::Scalar(*ty), ty.size()),
        KindSpec::Pointer => (FieldKind::Pointer, width.bytes()),
        KindSpec::Text(encoding) => (FieldKind::Text(*encoding), width.bytes()),
        KindSpec::Inline(layout) => {
            let nested = layout.build(remote)?;
            let size = nested.size();
            (FieldKind::Inline(Box::new(nested)), size)
        }
        KindSpec::Pointed(layout) => (
            FieldKind::Pointed(Box::new(layout.build(remote)?)),
            width.bytes(),
        ),
    };

    Ok(Field {
        name: name.to_string(),
        offset: spec.offset,
        size: size + spec.padding,
        width,
        dependency: spec.dependency,
        kind,
        pointed_size: 0,
        value: Value::Unset,
        address: 0,
        pointed: Vec::new(),
        pointed_ready: false,
    })
}

/// Every dependency must name another declared field of pointer kind
fn check_dependencies(fields: &[Field]) -> Result<()> {
    for (i, field) in fields.iter().enumerate() {
        let Some(dep) = field.dependency else {
            continue;
        };

        let target = fields
            .get(dep.index())
            .ok_or_else(|| ConfigError::UnknownDependency {
                field: field.name.clone(),
                dependency: dep.index(),
            })?;

        if dep.index() == i {
            return Err(ConfigError::DependencyCycle(vec![field.name.clone()]).into());
        }

        if !target.kind.is_pointer() {
            return Err(ConfigError::NonPointerDependency {
                field: field.name.clone(),
                dependency: target.name.clone(),
            }
            .into());
        }
    }

    Ok(())
}

/// Topological order over dependencies, lowest offset first among ready fields
fn resolution_order(fields: &[Field], tag: LayoutTag) -> Result<Vec<FieldId>> {
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); fields.len()];
    let mut ready = BinaryHeap::new();

    for (i, field) in fields.iter().enumerate() {
        match field.dependency {
            Some(dep) => dependents[dep.index()].push(i),
            None => ready.push(Reverse((field.offset, i))),
        }
    }

    let mut order = Vec::with_capacity(fields.len());
    while let Some(Reverse((_, i))) = ready.pop() {
        order.push(FieldId::new(tag, i));
        for &d in &dependents[i] {
            ready.push(Reverse((fields[d].offset, d)));
        }
    }

    if order.len() < fields.len() {
        let stuck = fields
            .iter()
            .enumerate()
            .filter(|(i, _)| !order.iter().any(|id| id.index() == *i))
            .map(|(_, f)| f.name.clone())
            .collect();
        return Err(ConfigError::DependencyCycle(stuck).into());
    }

    Ok(order)
}

/// Bytes needed to cover every field depending on the field at index
/// `dependency`, or every root field for `None`
fn span(fields: &[Field], dependency: Option<usize>) -> usize {
    fields
        .iter()
        .filter(|f| f.dependency.map(FieldId::index) == dependency)
        .map(|f| f.offset + f.size)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockSource;
    use crate::value::TextEncoding;
    use crate::{Error, FieldKind};
    use proptest::prelude::*;
    use proptest::sample::Index;

    fn remote(width: PointerWidth) -> Remote {
        Remote::new(MockSource::new(), width)
    }

    #[test]
    fn test_size_covers_root_fields() {
        let mut layout = Layout::new("Header");
        layout.field("data", FieldSpec::pointer(0x0));
        layout.field("count", FieldSpec::primitive::<i32>(0x8));
        layout.field("max", FieldSpec::primitive::<i32>(0xC));

        let s = layout.build(&remote(PointerWidth::Bits64)).unwrap();
        assert_eq!(s.size(), 16);

        let s = layout.build(&remote(PointerWidth::Bits32)).unwrap();
        assert_eq!(s.size(), 16);
        assert_eq!(s.fields()[0].size(), 4);
    }

    #[test]
    fn test_size_ignores_dependent_fields() {
        let mut layout = Layout::new("Actor");
        let owner = layout.field("owner", FieldSpec::pointer(0x0));
        layout.field("hp", FieldSpec::primitive::<f32>(0x100).depends_on(owner));
        layout.field("id", FieldSpec::primitive::<u32>(0x8));

        let s = layout.build(&remote(PointerWidth::Bits64)).unwrap();
        assert_eq!(s.size(), 0xC);
        assert_eq!(s.field(owner).unwrap().pointed_size(), 0x104);
    }

    #[test]
    fn test_pointer_without_dependents_has_no_pointed_size() {
        let mut layout = Layout::new("Array");
        let data = layout.field("data", FieldSpec::pointer(0));
        let s = layout.build(&remote(PointerWidth::Bits64)).unwrap();
        assert_eq!(s.field(data).unwrap().pointed_size(), 0);
    }

    #[test]
    fn test_field_sizes_from_kind() {
        let mut inner = Layout::new("Vector2");
        inner.field("x", FieldSpec::primitive::<f32>(0));
        inner.field("y", FieldSpec::primitive::<f32>(4));

        let mut layout = Layout::new("Sizes");
        let a = layout.field("a", FieldSpec::primitive::<u16>(0));
        let b = layout.field("b", FieldSpec::text(0x8, TextEncoding::Utf16));
        let c = layout.field("c", FieldSpec::inline(0x10, inner.clone()));
        let d = layout.field("d", FieldSpec::pointed(0x18, inner));
        let e = layout.field(
            "e",
            FieldSpec::pointer(0x20)
                .pointer_width(PointerWidth::Bits32)
                .padding(4),
        );

        let s = layout.build(&remote(PointerWidth::Bits64)).unwrap();
        assert_eq!(s.field(a).unwrap().size(), 2);
        assert_eq!(s.field(b).unwrap().size(), 8);
        assert_eq!(s.field(c).unwrap().size(), 8);
        assert_eq!(s.field(d).unwrap().size(), 8);
        assert_eq!(s.field(e).unwrap().size(), 8);
        assert_eq!(s.size(), 0x28);
        assert!(matches!(s.field(c).unwrap().kind(), FieldKind::Inline(_)));
    }

    #[test]
    fn test_order_respects_dependencies() {
        let mut layout = Layout::new("Chain");
        // Declared out of dependency order on purpose
        let leaf = layout.field("leaf", FieldSpec::primitive::<u32>(0x0));
        let inner = layout.field("inner", FieldSpec::pointer(0x4));
        let outer = layout.field("outer", FieldSpec::pointer(0x10));
        let root_b = layout.field("root_b", FieldSpec::primitive::<u8>(0x20));
        let root_a = layout.field("root_a", FieldSpec::primitive::<u8>(0x18));
        layout.set_dependency(leaf, inner).unwrap();
        layout.set_dependency(inner, outer).unwrap();

        let s = layout.build(&remote(PointerWidth::Bits64)).unwrap();
        let order = s.order();
        let pos = |id: FieldId| order.iter().position(|&o| o == id).unwrap();

        assert_eq!(order.len(), 5);
        for &id in order {
            if let Some(dep) = s.field(id).unwrap().dependency() {
                assert!(pos(dep) < pos(id));
            }
        }
        // Ready fields go lowest offset first
        assert!(pos(outer) < pos(root_a));
        assert!(pos(root_a) < pos(root_b));
    }

    #[test]
    fn test_order_ties_broken_by_declaration() {
        let mut layout = Layout::new("Union");
        let first = layout.field("as_int", FieldSpec::primitive::<u32>(0));
        let second = layout.field("as_float", FieldSpec::primitive::<f32>(0));

        let s = layout.build(&remote(PointerWidth::Bits64)).unwrap();
        assert_eq!(s.order(), &[first, second]);
    }

    #[test]
    fn test_non_pointer_dependency_rejected() {
        let mut layout = Layout::new("Bad");
        let count = layout.field("count", FieldSpec::primitive::<i32>(0));
        layout.field("value", FieldSpec::primitive::<i32>(4).depends_on(count));

        let err = layout.build(&remote(PointerWidth::Bits64)).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigError::NonPointerDependency { .. })
        ));
    }

    #[test]
    fn test_pointed_structure_is_not_a_pointer_dependency() {
        let mut layout = Layout::new("Bad");
        let nested = layout.field("nested", FieldSpec::pointed(0, Layout::new("Empty")));
        layout.field("value", FieldSpec::primitive::<i32>(4).depends_on(nested));

        assert!(layout.build(&remote(PointerWidth::Bits64)).is_err());
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let mut layout = Layout::new("Bad");
        let value = layout.field("value", FieldSpec::primitive::<i32>(0));
        let mut grown = layout.clone();
        let late = grown.field("late", FieldSpec::pointer(8));
        layout.set_dependency(value, late).unwrap();

        let err = layout.build(&remote(PointerWidth::Bits64)).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigError::UnknownDependency { dependency: 1, .. })
        ));
    }

    #[test]
    fn test_foreign_dependency_rejected() {
        let mut other = Layout::new("Other");
        let foreign = other.field("ptr", FieldSpec::pointer(0));

        // Same index as a real pointer of this layout, issued by another one
        let mut layout = Layout::new("Bad");
        let own = layout.field("ptr", FieldSpec::pointer(0));
        let value = layout.field("value", FieldSpec::primitive::<i32>(8).depends_on(foreign));
        assert_eq!(own.index(), foreign.index());

        let err = layout.build(&remote(PointerWidth::Bits64)).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigError::ForeignField { index: 0, .. })
        ));

        assert!(matches!(
            layout.set_dependency(value, foreign),
            Err(Error::Configuration(ConfigError::ForeignField { .. }))
        ));
        assert!(layout.set_dependency(foreign, own).is_err());
        layout.set_dependency(value, own).unwrap();
        assert!(layout.build(&remote(PointerWidth::Bits64)).is_ok());
    }

    #[test]
    fn test_dependency_cycle_rejected() {
        let mut layout = Layout::new("Cycle");
        let a = layout.field("a", FieldSpec::pointer(0));
        let b = layout.field("b", FieldSpec::pointer(8).depends_on(a));
        layout.set_dependency(a, b).unwrap();

        let err = layout.build(&remote(PointerWidth::Bits64)).unwrap_err();
        match err {
            Error::Configuration(ConfigError::DependencyCycle(names)) => {
                assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_rejected() {
        let mut layout = Layout::new("Cycle");
        let a = layout.field("a", FieldSpec::pointer(0));
        layout.set_dependency(a, a).unwrap();
        assert!(layout.build(&remote(PointerWidth::Bits64)).is_err());
    }

    /// Field declarations as (offset, is pointer, dependency pick) plus the
    /// order they are declared in. Picks only land on earlier pointers, so
    /// every generated graph is acyclic.
    fn arb_fields() -> impl Strategy<Value = (Vec<(usize, bool, Option<Index>)>, Vec<usize>)> {
        prop::collection::vec(
            (0usize..0x40, any::<bool>(), prop::option::of(any::<Index>())),
            1..24,
        )
        .prop_flat_map(|fields| {
            let n = fields.len();
            (Just(fields), Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_order_resolves_dependencies_first((fields, declaration) in arb_fields()) {
            let n = fields.len();
            let mut layout = Layout::new("Random");
            let mut ids: Vec<Option<FieldId>> = vec![None; n];

            for &k in &declaration {
                let (offset, pointer) = (fields[k].0, fields[k].1);
                let spec = if pointer {
                    FieldSpec::pointer(offset)
                } else {
                    FieldSpec::primitive::<u32>(offset)
                };
                ids[k] = Some(layout.field(format!("f{}", k), spec));
            }

            for k in 0..n {
                let Some(pick) = &fields[k].2 else {
                    continue;
                };
                let pointers: Vec<usize> = (0..k).filter(|&j| fields[j].1).collect();
                if pointers.is_empty() {
                    continue;
                }
                let j = pointers[pick.index(pointers.len())];
                layout.set_dependency(ids[k].unwrap(), ids[j].unwrap()).unwrap();
            }

            let s = layout.build(&remote(PointerWidth::Bits64)).unwrap();
            let order = s.order();
            prop_assert_eq!(order.len(), n);

            let mut resolved = vec![false; n];
            for &id in order {
                prop_assert!(!resolved[id.index()]);
                if let Some(dep) = s.field(id).unwrap().dependency() {
                    prop_assert!(resolved[dep.index()]);
                }
                resolved[id.index()] = true;
            }
        }
    }

    #[test]
    fn test_field_lookup_by_name() {
        let mut layout = Layout::new("Named");
        let id = layout.field("hp", FieldSpec::primitive::<f32>(0));
        assert_eq!(layout.field_id("hp"), Some(id));
        assert_eq!(layout.field_id("mp"), None);
        assert_eq!(layout.len(), 1);
        assert!(layout
            .set_dependency(FieldId::new(layout.tag, 9), id)
            .is_err());
    }
}
