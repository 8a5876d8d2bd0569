//! Positional, deduplicated, text-compacted storage for named records.
//!
//! A record is projected onto the slot order of its [`FieldSpec`], repeated
//! scalars are replaced by back-references, and the result is printed in a
//! short quote-swapped notation. The host persists only `pk`, `sk` and the
//! blob (see [`StoredItem`]).

pub mod codec;
pub mod compact_value;
pub mod dedup;
pub mod error;
pub mod paths;
pub mod schema;
pub mod token;
pub mod types;

pub use codec::{CompactCodec, CompactModel, StoredItem, decode, encode, layout_for, layout_for_spec};
pub use compact_value::{CompactNumber, CompactValue, ValueMap};
pub use error::{CompactError, Result, SchemaError};
pub use schema::{FieldDecl, FieldSpec, KeyEntry, KeyTable, Layout};
pub use types::{CodecConfig, PositionalArray};

#[cfg(test)]
mod tests;
