use super::compact_value::CompactValue;
use rustc_hash::FxHasher;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::hash::BuildHasherDefault;

pub type FastMap<K, V> = HashMap<K, V, BuildHasherDefault<FxHasher>>;
pub type FastHashSet<T> = HashSet<T, BuildHasherDefault<FxHasher>>;

/// Values aligned 1:1 with a layout's slot order. Missing fields are
/// `CompactValue::Null`, never omitted.
pub type PositionalArray = Vec<CompactValue>;

// ─── Literal Markers ────────────────────────────────────────────────────────

pub const MARK_NULL: char = 'N';
pub const MARK_TRUE: char = 'T';
pub const MARK_FALSE: char = 'X';
pub const MARK_EMPTY: char = 'O';
/// Prefix of a back-reference token (`^3`) and, inside strings, of the
/// escaped delimiter (`^'`).
pub const MARK_REF: char = '^';
pub const STR_DELIM: char = '\'';

// ─── Limits ─────────────────────────────────────────────────────────────────

/// Values whose size is at or below this never enter the seen table.
pub const DEDUP_THRESHOLD: usize = 2;
/// Hard cap for alias chains; sizes the stack-allocated visited set.
pub const MAX_ALIAS_HOPS: usize = 16;
pub const DEFAULT_ALIAS_HOPS: usize = 8;
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Tunables for [`CompactCodec`](crate::codec::CompactCodec).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// A value is deduplicated only when its size is strictly greater.
    ///
    /// Blobs must be decoded with the threshold they were encoded with.
    pub dedup_threshold: usize,
    /// Bound on key-table lookups while resolving one name. Clamped to
    /// [`MAX_ALIAS_HOPS`].
    pub max_alias_hops: usize,
    /// Nesting limit for blobs, root list included. Enforced on both encode
    /// and decode.
    pub max_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: DEDUP_THRESHOLD,
            max_alias_hops: DEFAULT_ALIAS_HOPS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CodecConfig {
    pub fn alias_hops(&self) -> usize {
        self.max_alias_hops.clamp(1, MAX_ALIAS_HOPS)
    }
}
