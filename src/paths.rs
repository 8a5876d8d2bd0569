use super::compact_value::{CompactValue, ValueMap};
use super::error::{CompactError, Result, SchemaError};
use super::schema::{FieldSpec, KeyEntry, KeyTable};
use super::types::{MAX_ALIAS_HOPS, PositionalArray};
use arrayvec::ArrayVec;
use smol_str::SmolStr;

// ─── Alias Resolution ───────────────────────────────────────────────────────

/// Outcome of following a key through a [`KeyTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    /// Exposed name: the last key that had no further alias.
    pub name: SmolStr,
    /// Child table when the chain ended on a nested structure.
    pub nested: Option<&'a KeyTable>,
}

/// Follow `key` through `table` until it reaches a key with no entry, a
/// key that maps to itself, or a nested table.
///
/// At most `max_hops` lookups move the candidate (capped at
/// [`MAX_ALIAS_HOPS`]). Revisiting a key is a cycle.
pub fn resolve_name(
    table: &KeyTable,
    key: SmolStr,
    max_hops: usize,
) -> Result<Resolved<'_>, SchemaError> {
    let limit = max_hops.min(MAX_ALIAS_HOPS);
    let mut visited: ArrayVec<SmolStr, MAX_ALIAS_HOPS> = ArrayVec::new();
    let mut candidate = key;

    loop {
        match table.get(&candidate) {
            None => {
                return Ok(Resolved {
                    name: candidate,
                    nested: None,
                });
            }
            Some(KeyEntry::Nested(child)) => {
                return Ok(Resolved {
                    name: candidate,
                    nested: Some(child),
                });
            }
            Some(KeyEntry::Name(next)) if *next == candidate => {
                return Ok(Resolved {
                    name: candidate,
                    nested: None,
                });
            }
            Some(KeyEntry::Name(next)) => {
                let start = visited.first().unwrap_or(&candidate).clone();
                if *next == start || visited.contains(next) {
                    return Err(SchemaError::AliasCycle { key: start });
                }
                if visited.len() >= limit {
                    return Err(SchemaError::AliasChainTooLong { key: start, hops: limit });
                }
                visited.push(candidate);
                candidate = next.clone();
            }
        }
    }
}

// ─── Flatten ────────────────────────────────────────────────────────────────

/// Project a named record onto the slot order of `spec`. Missing fields
/// become `Null`; nested declarations are flattened recursively.
pub fn flatten(record: &ValueMap, spec: &FieldSpec) -> Result<PositionalArray> {
    spec.decls()
        .iter()
        .map(|decl| match (decl.nested(), record.get(decl.exposed().as_str())) {
            (Some(child), Some(CompactValue::Object(map))) => {
                Ok(CompactValue::Array(flatten(map, child)?))
            }
            (Some(_), None | Some(CompactValue::Null)) => Ok(CompactValue::Null),
            (Some(_), Some(_)) => Err(CompactError::ShapeMismatch {
                field: decl.exposed().clone(),
            }),
            (None, value) => Ok(value.cloned().unwrap_or_default()),
        })
        .collect()
}

// ─── Expand ─────────────────────────────────────────────────────────────────

/// A resolved `(name, value)` pair. `name` is `None` when the key table
/// has nothing for the position, i.e. the value is a plain list element.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub name: Option<SmolStr>,
    pub value: CompactValue,
}

/// Rebuild a named record from positional `values` using `table`. A list
/// shorter than the level's declared slots is padded with `Null`.
pub fn expand(mut values: PositionalArray, table: &KeyTable, max_hops: usize) -> Result<CompactValue> {
    if values.len() < table.slot_count() {
        values.resize(table.slot_count(), CompactValue::Null);
    }
    let mut entries = Vec::with_capacity(values.len());

    for (index, value) in values.into_iter().enumerate() {
        let position = SmolStr::from(index.to_string());
        let declared = table.contains(&position);
        let Resolved { name, nested } = resolve_name(table, position, max_hops)?;

        let value = match (nested, value) {
            (Some(child), CompactValue::Array(items)) => expand(items, child, max_hops)?,
            (Some(_), CompactValue::Null) => CompactValue::Null,
            (Some(_), _) => return Err(CompactError::ShapeMismatch { field: name }),
            (None, value) => value,
        };

        entries.push(Entry {
            name: declared.then_some(name),
            value,
        });
    }

    Ok(from_entries(entries))
}

/// Merge resolved pairs into a record.
///
/// Named entries become object fields. If no entry is named the result is
/// a list; unnamed entries mixed with named ones keep their position as key.
pub fn from_entries(entries: Vec<Entry>) -> CompactValue {
    if !entries.is_empty() && entries.iter().all(|e| e.name.is_none()) {
        return CompactValue::Array(entries.into_iter().map(|e| e.value).collect());
    }

    let map = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let key = entry
                .name
                .unwrap_or_else(|| SmolStr::from(index.to_string()));
            (key, entry.value)
        })
        .collect::<ValueMap>();
    CompactValue::Object(map)
}
