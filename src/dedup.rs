use super::compact_value::{CompactNumber, CompactValue, ValueMap};
use super::error::{CompactError, Result};
use super::types::FastMap;
use smol_str::SmolStr;

// ─── Packed Tree ────────────────────────────────────────────────────────────

/// A value tree after deduplication. `Ref(i)` stands for the `i`-th entry of
/// the seen table built by the same traversal.
#[derive(Debug, Clone, PartialEq)]
pub enum Packed {
    Null,
    Bool(bool),
    Number(CompactNumber),
    Str(SmolStr),
    Ref(usize),
    List(Vec<Packed>),
    Map(Vec<(SmolStr, Packed)>),
}

// ─── SeenTable ──────────────────────────────────────────────────────────────

/// Identity of a scalar: kind tag plus its exact textual form. `"123"` and
/// `123` and `123.0` are three different keys.
type ScalarKey = (u8, SmolStr);

const KIND_STR: u8 = 0;
const KIND_I64: u8 = 1;
const KIND_U64: u8 = 2;
const KIND_F64: u8 = 3;

/// First-seen eligible scalars of one encode or decode traversal, shared
/// across every nesting level.
#[derive(Debug, Default)]
pub struct SeenTable {
    values: Vec<CompactValue>,
    index: FastMap<ScalarKey, usize>,
    threshold: usize,
}

impl SeenTable {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CompactValue> {
        self.values.get(index)
    }

    /// Return the index of an identical earlier value, or record this one.
    /// `None` means the caller emits the literal.
    fn intern(&mut self, key: ScalarKey, value: &CompactValue) -> Option<usize> {
        if key.1.len() <= self.threshold {
            return None;
        }
        if let Some(&pos) = self.index.get(&key) {
            return Some(pos);
        }
        self.index.insert(key, self.values.len());
        self.values.push(value.clone());
        None
    }

    /// Mirror of `intern` for the decode walk: eligible literals are appended.
    fn remember(&mut self, key: ScalarKey, value: &CompactValue) {
        if key.1.len() > self.threshold {
            self.values.push(value.clone());
        }
    }
}

/// Kind and size-bearing text of a scalar; `None` for null, booleans and
/// containers, which never enter the seen table.
fn scalar_key(value: &CompactValue) -> Result<Option<ScalarKey>> {
    Ok(match value {
        CompactValue::Str(s) => Some((KIND_STR, s.clone())),
        CompactValue::Number(n) => {
            let kind = match n.normalized() {
                CompactNumber::I64(_) => KIND_I64,
                CompactNumber::U64(_) => KIND_U64,
                CompactNumber::F64(_) => KIND_F64,
            };
            let text = n.render().ok_or(CompactError::NonFiniteNumber)?;
            Some((kind, SmolStr::from(text)))
        }
        _ => None,
    })
}

// ─── zip ────────────────────────────────────────────────────────────────────

/// Depth-first, left-to-right: replace each repeated eligible scalar with a
/// back-reference to its first occurrence.
///
/// `values` is the root list at depth 1. Any bracketed container nested
/// deeper than `max_depth` fails with [`CompactError::NestingTooDeep`], the
/// same bound the parser applies.
pub fn zip(values: &[CompactValue], seen: &mut SeenTable, max_depth: usize) -> Result<Vec<Packed>> {
    zip_level(values, seen, 1, max_depth)
}

fn zip_level(
    values: &[CompactValue],
    seen: &mut SeenTable,
    depth: usize,
    max_depth: usize,
) -> Result<Vec<Packed>> {
    if depth > max_depth {
        return Err(CompactError::NestingTooDeep { max_depth });
    }
    values
        .iter()
        .map(|v| zip_value(v, seen, depth, max_depth))
        .collect()
}

fn zip_value(
    value: &CompactValue,
    seen: &mut SeenTable,
    depth: usize,
    max_depth: usize,
) -> Result<Packed> {
    match value {
        CompactValue::Null => Ok(Packed::Null),
        CompactValue::Bool(b) => Ok(Packed::Bool(*b)),
        // Printed as the bare `O` marker, which opens no level.
        CompactValue::Array(items) if items.is_empty() => Ok(Packed::List(Vec::new())),
        CompactValue::Array(items) => {
            Ok(Packed::List(zip_level(items, seen, depth + 1, max_depth)?))
        }
        CompactValue::Object(map) => {
            if depth + 1 > max_depth {
                return Err(CompactError::NestingTooDeep { max_depth });
            }
            let mut entries = Vec::with_capacity(map.len());
            for (key, item) in map {
                entries.push((key.clone(), zip_value(item, seen, depth + 1, max_depth)?));
            }
            Ok(Packed::Map(entries))
        }
        CompactValue::Number(n) => {
            let key = scalar_key(value)?.ok_or(CompactError::NonFiniteNumber)?;
            Ok(match seen.intern(key, value) {
                Some(pos) => Packed::Ref(pos),
                None => Packed::Number(n.normalized()),
            })
        }
        CompactValue::Str(s) => {
            let key = (KIND_STR, s.clone());
            Ok(match seen.intern(key, value) {
                Some(pos) => Packed::Ref(pos),
                None => Packed::Str(s.clone()),
            })
        }
    }
}

// ─── unzip ──────────────────────────────────────────────────────────────────

/// Inverse of [`zip`]. Back-references resolve against the shared seen
/// table only; an index it does not hold is an error, never a guess.
pub fn unzip(packed: Vec<Packed>, seen: &mut SeenTable) -> Result<Vec<CompactValue>> {
    packed.into_iter().map(|p| unzip_value(p, seen)).collect()
}

fn unzip_value(packed: Packed, seen: &mut SeenTable) -> Result<CompactValue> {
    let value = match packed {
        Packed::Null => return Ok(CompactValue::Null),
        Packed::Bool(b) => return Ok(CompactValue::Bool(b)),
        Packed::Ref(index) => {
            return seen.get(index).cloned().ok_or(CompactError::UnresolvedReference {
                index,
                seen: seen.len(),
            });
        }
        Packed::List(items) => return Ok(CompactValue::Array(unzip(items, seen)?)),
        Packed::Map(entries) => {
            let mut map = ValueMap::new();
            for (key, item) in entries {
                map.insert(key, unzip_value(item, seen)?);
            }
            return Ok(CompactValue::Object(map));
        }
        Packed::Number(n) => CompactValue::Number(n),
        Packed::Str(s) => CompactValue::Str(s),
    };
    if let Some(key) = scalar_key(&value)? {
        seen.remember(key, &value);
    }
    Ok(value)
}
