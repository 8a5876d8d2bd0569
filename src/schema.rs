use super::error::SchemaError;
use super::paths::resolve_name;
use super::types::{FastMap, FastHashSet};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use smol_str::SmolStr;
use std::fmt;
use tracing::{debug, warn};
use xxhash_rust::xxh64::xxh64;

// ─── FieldSpec ──────────────────────────────────────────────────────────────

/// One storage slot declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDecl {
    /// Exposed name and slot name are the same.
    Bare(SmolStr),
    /// `exposed` is what records carry, `slot` is the internal storage label.
    Renamed { exposed: SmolStr, slot: SmolStr },
    /// A field whose value is itself stored positionally by `spec`.
    Nested { exposed: SmolStr, spec: FieldSpec },
}

impl FieldDecl {
    pub fn exposed(&self) -> &SmolStr {
        match self {
            FieldDecl::Bare(name) => name,
            FieldDecl::Renamed { exposed, .. } | FieldDecl::Nested { exposed, .. } => exposed,
        }
    }

    pub fn slot(&self) -> &SmolStr {
        match self {
            FieldDecl::Bare(name) => name,
            FieldDecl::Renamed { slot, .. } => slot,
            FieldDecl::Nested { exposed, .. } => exposed,
        }
    }

    pub fn nested(&self) -> Option<&FieldSpec> {
        match self {
            FieldDecl::Nested { spec, .. } => Some(spec),
            _ => None,
        }
    }
}

/// Ordered field declarations. Declaration order is the storage order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldSpec {
    decls: Vec<FieldDecl>,
}

impl FieldSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field stored under its own name.
    ///
    /// Names made of digits collide with the positional keys of the same
    /// level (`"0"`, `"1"`, ...) and fail layout resolution with
    /// [`SchemaError::AmbiguousAlias`] when they shadow a position.
    pub fn field(mut self, name: &str) -> Self {
        self.decls.push(FieldDecl::Bare(SmolStr::new(name)));
        self
    }

    pub fn rename(mut self, exposed: &str, slot: &str) -> Self {
        self.decls.push(rename_decl(SmolStr::new(exposed), SmolStr::new(slot)));
        self
    }

    pub fn nested(mut self, exposed: &str, spec: FieldSpec) -> Self {
        self.decls.push(FieldDecl::Nested {
            exposed: SmolStr::new(exposed),
            spec,
        });
        self
    }

    pub fn decls(&self) -> &[FieldDecl] {
        &self.decls
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Content hash, stable across processes. Equal specs hash equally.
    pub fn fingerprint(&self) -> u64 {
        let mut buf = Vec::with_capacity(self.decls.len() * 16);
        self.write_canonical(&mut buf);
        xxh64(&buf, 0)
    }

    fn write_canonical(&self, buf: &mut Vec<u8>) {
        buf.push(b'[');
        for decl in &self.decls {
            match decl {
                FieldDecl::Bare(name) => {
                    buf.push(b'b');
                    write_name(buf, name);
                }
                FieldDecl::Renamed { exposed, slot } => {
                    buf.push(b'r');
                    write_name(buf, exposed);
                    write_name(buf, slot);
                }
                FieldDecl::Nested { exposed, spec } => {
                    buf.push(b'n');
                    write_name(buf, exposed);
                    spec.write_canonical(buf);
                }
            }
        }
        buf.push(b']');
    }
}

fn write_name(buf: &mut Vec<u8>, name: &str) {
    buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
    buf.extend_from_slice(name.as_bytes());
}

fn rename_decl(exposed: SmolStr, slot: SmolStr) -> FieldDecl {
    if exposed == slot {
        FieldDecl::Bare(exposed)
    } else {
        FieldDecl::Renamed { exposed, slot }
    }
}

impl FromIterator<FieldDecl> for FieldSpec {
    fn from_iter<I: IntoIterator<Item = FieldDecl>>(iter: I) -> Self {
        Self {
            decls: iter.into_iter().collect(),
        }
    }
}

// ─── KeyTable ───────────────────────────────────────────────────────────────

/// Target of a key-table lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEntry {
    Name(SmolStr),
    Nested(KeyTable),
}

/// Reverse lookup from storage keys (positional indices and slot names) to
/// exposed names, one table per nesting level.
///
/// Position `i` maps to its slot name; a renamed slot maps to its exposed
/// name; a nested field's exposed name maps to the child table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyTable {
    entries: FastMap<SmolStr, KeyEntry>,
    slots: usize,
}

impl KeyTable {
    pub fn get(&self, key: &str) -> Option<&KeyEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of positions declared at this level.
    pub fn slot_count(&self) -> usize {
        self.slots
    }

    pub(crate) fn insert(&mut self, key: SmolStr, entry: KeyEntry) {
        self.entries.insert(key, entry);
    }
}

// ─── Layout ─────────────────────────────────────────────────────────────────

/// Resolved form of a [`FieldSpec`]: ordered slot names plus the key table.
/// Built once per record type and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    spec: FieldSpec,
    slots: Vec<SmolStr>,
    keys: KeyTable,
}

impl Layout {
    /// Flatten `spec` into slots and a key table, then check that every
    /// declared position resolves back to its own exposed name within
    /// `max_hops` lookups.
    pub fn resolve(spec: FieldSpec, max_hops: usize) -> Result<Self, SchemaError> {
        let keys = build_table(&spec)?;
        if let Err(e) = validate(&spec, &keys, max_hops) {
            warn!(error = %e, "field spec rejected");
            return Err(e);
        }
        let slots = spec.decls.iter().map(|d| d.slot().clone()).collect::<Vec<_>>();
        debug!(slots = slots.len(), keys = keys.len(), "layout resolved");
        Ok(Self { spec, slots, keys })
    }

    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    pub fn slots(&self) -> &[SmolStr] {
        &self.slots
    }

    pub fn keys(&self) -> &KeyTable {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn build_table(spec: &FieldSpec) -> Result<KeyTable, SchemaError> {
    let mut table = KeyTable {
        slots: spec.decls.len(),
        ..KeyTable::default()
    };
    let mut slots = FastHashSet::default();
    let mut exposed = FastHashSet::default();

    for (index, decl) in spec.decls.iter().enumerate() {
        if decl.exposed().is_empty() || decl.slot().is_empty() {
            return Err(SchemaError::EmptyName);
        }
        if !slots.insert(decl.slot().clone()) {
            return Err(SchemaError::DuplicateSlot(decl.slot().clone()));
        }
        if !exposed.insert(decl.exposed().clone()) {
            return Err(SchemaError::DuplicateField(decl.exposed().clone()));
        }

        let position = SmolStr::from(index.to_string());
        match decl {
            FieldDecl::Bare(name) => {
                table.insert(position, KeyEntry::Name(name.clone()));
            }
            FieldDecl::Renamed { exposed, slot } => {
                table.insert(position, KeyEntry::Name(slot.clone()));
                table.insert(slot.clone(), KeyEntry::Name(exposed.clone()));
            }
            FieldDecl::Nested { exposed, spec } => {
                table.insert(position, KeyEntry::Name(exposed.clone()));
                table.insert(exposed.clone(), KeyEntry::Nested(build_table(spec)?));
            }
        }
    }
    Ok(table)
}

fn validate(spec: &FieldSpec, table: &KeyTable, max_hops: usize) -> Result<(), SchemaError> {
    for (index, decl) in spec.decls.iter().enumerate() {
        let resolved = resolve_name(table, SmolStr::from(index.to_string()), max_hops)?;
        let shape_ok = decl.nested().is_some() == resolved.nested.is_some();
        if resolved.name != *decl.exposed() || !shape_ok {
            return Err(SchemaError::AmbiguousAlias {
                index,
                expected: decl.exposed().clone(),
                resolved: resolved.name,
            });
        }
        if let (Some(child_spec), Some(child_table)) = (decl.nested(), resolved.nested) {
            validate(child_spec, child_table, max_hops)?;
        }
    }
    Ok(())
}

// ─── Deserialize ────────────────────────────────────────────────────────────
//
// Accepted shapes, in declaration order:
//   ["id", "email", {"mail": "m"}, {"profile": {"name": "n"}}]
//   {"id": "id", "profile": ["bio", {"name": "n"}]}
// A map value is either a slot name or a nested spec.

impl<'de> Deserialize<'de> for FieldSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldSpecVisitor)
    }
}

struct FieldSpecVisitor;

impl<'de> Visitor<'de> for FieldSpecVisitor {
    type Value = FieldSpec;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a sequence or map of field declarations")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FieldSpec, A::Error> {
        let mut decls = Vec::new();
        while let Some(DeclGroup(group)) = seq.next_element()? {
            decls.extend(group);
        }
        Ok(FieldSpec { decls })
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FieldSpec, A::Error> {
        let mut decls = Vec::new();
        while let Some((exposed, target)) = map.next_entry::<SmolStr, SlotTarget>()? {
            decls.push(target.into_decl(exposed));
        }
        Ok(FieldSpec { decls })
    }
}

/// A sequence element: a bare name or a map of one or more renames.
struct DeclGroup(Vec<FieldDecl>);

impl<'de> Deserialize<'de> for DeclGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GroupVisitor;

        impl<'de> Visitor<'de> for GroupVisitor {
            type Value = DeclGroup;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a field name or a map of renames")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<DeclGroup, E> {
                Ok(DeclGroup(vec![FieldDecl::Bare(SmolStr::new(v))]))
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<DeclGroup, A::Error> {
                FieldSpecVisitor.visit_map(map).map(|spec| DeclGroup(spec.decls))
            }
        }

        deserializer.deserialize_any(GroupVisitor)
    }
}

enum SlotTarget {
    Slot(SmolStr),
    Nested(FieldSpec),
}

impl SlotTarget {
    fn into_decl(self, exposed: SmolStr) -> FieldDecl {
        match self {
            SlotTarget::Slot(slot) => rename_decl(exposed, slot),
            SlotTarget::Nested(spec) => FieldDecl::Nested { exposed, spec },
        }
    }
}

impl<'de> Deserialize<'de> for SlotTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TargetVisitor;

        impl<'de> Visitor<'de> for TargetVisitor {
            type Value = SlotTarget;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a slot name or a nested field spec")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<SlotTarget, E> {
                Ok(SlotTarget::Slot(SmolStr::new(v)))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<SlotTarget, A::Error> {
                FieldSpecVisitor.visit_seq(seq).map(SlotTarget::Nested)
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<SlotTarget, A::Error> {
                FieldSpecVisitor.visit_map(map).map(SlotTarget::Nested)
            }
        }

        deserializer.deserialize_any(TargetVisitor)
    }
}
