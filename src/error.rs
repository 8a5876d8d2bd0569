// ─── Error ──────────────────────────────────────────────────────────────────
use smol_str::SmolStr;
use thiserror::Error;

pub type Result<T, E = CompactError> = std::result::Result<T, E>;

/// Configuration defects in a [`FieldSpec`](crate::schema::FieldSpec).
///
/// These surface when a layout is built and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("slot `{0}` is declared more than once")]
    DuplicateSlot(SmolStr),
    #[error("field `{0}` is exposed more than once")]
    DuplicateField(SmolStr),
    #[error("field declarations must have a non-empty name")]
    EmptyName,
    #[error("alias chain starting at `{key}` loops back on itself")]
    AliasCycle { key: SmolStr },
    #[error("alias chain starting at `{key}` exceeds {hops} hops")]
    AliasChainTooLong { key: SmolStr, hops: usize },
    /// The key table maps a declared position to some other field's name.
    #[error("position {index} resolves to `{resolved}`, expected `{expected}`")]
    AmbiguousAlias {
        index: usize,
        expected: SmolStr,
        resolved: SmolStr,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompactError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("malformed compact blob at byte {offset}: {reason}")]
    DecodeFormat { offset: usize, reason: String },
    #[error("back-reference ^{index} is out of range (seen table holds {seen} values)")]
    UnresolvedReference { index: usize, seen: usize },
    #[error("can only encode object records")]
    NotAnObject,
    #[error("field `{field}` is declared as a nested structure but holds a different shape")]
    ShapeMismatch { field: SmolStr },
    #[error("non-finite numbers cannot be encoded")]
    NonFiniteNumber,
    /// The record would print a blob the parser refuses to read back.
    #[error("record nests deeper than {max_depth} levels")]
    NestingTooDeep { max_depth: usize },
}

impl CompactError {
    pub(crate) fn format(offset: usize, reason: impl Into<String>) -> Self {
        CompactError::DecodeFormat {
            offset,
            reason: reason.into(),
        }
    }
}
