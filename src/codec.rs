use super::compact_value::CompactValue;
use super::dedup::{SeenTable, unzip, zip};
use super::error::{CompactError, Result};
use super::paths::{expand, flatten};
use super::schema::{FieldSpec, Layout};
use super::token::{deserialize, serialize};
use super::types::{CodecConfig, FastMap, PositionalArray};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::any::TypeId;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::{debug, trace};

// ─── Stored Item ────────────────────────────────────────────────────────────

/// The only three attributes written to the key-value store per record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem {
    pub pk: SmolStr,
    pub sk: SmolStr,
    /// Compact blob produced by [`CompactCodec::encode`].
    pub v: String,
}

// ─── Layout Cache ───────────────────────────────────────────────────────────

/// A record type with a fixed field declaration.
pub trait CompactModel: 'static {
    fn field_spec() -> FieldSpec;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LayoutKey {
    Model(TypeId, usize),
    Spec(u64, usize),
}

type LayoutMap = FastMap<LayoutKey, Arc<Layout>>;

static LAYOUTS: OnceLock<RwLock<LayoutMap>> = OnceLock::new();

fn layouts() -> &'static RwLock<LayoutMap> {
    LAYOUTS.get_or_init(|| RwLock::new(LayoutMap::default()))
}

/// Look up or build a layout. Two threads racing on the same key may both
/// build it; the first insert wins and both get an identical layout.
fn cached_layout(
    key: LayoutKey,
    spec: impl FnOnce() -> FieldSpec,
    matches: impl Fn(&Layout) -> bool,
    max_hops: usize,
) -> Result<Arc<Layout>> {
    {
        let map = layouts().read().unwrap_or_else(PoisonError::into_inner);
        if let Some(layout) = map.get(&key).filter(|l| matches(l)) {
            trace!(?key, "layout cache hit");
            return Ok(Arc::clone(layout));
        }
    }

    let layout = Arc::new(Layout::resolve(spec(), max_hops)?);
    if !matches(&layout) {
        // Fingerprint collision with a different spec; don't evict the owner.
        return Ok(layout);
    }
    debug!(?key, slots = layout.len(), "layout cached");
    let mut map = layouts().write().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(map.entry(key).or_insert(layout)))
}

/// Shared layout for a model type, built on first use.
pub fn layout_for<T: CompactModel>(config: &CodecConfig) -> Result<Arc<Layout>> {
    let hops = config.alias_hops();
    cached_layout(
        LayoutKey::Model(TypeId::of::<T>(), hops),
        T::field_spec,
        |_| true,
        hops,
    )
}

/// Shared layout for a spec, keyed by its content fingerprint.
pub fn layout_for_spec(spec: &FieldSpec, config: &CodecConfig) -> Result<Arc<Layout>> {
    let hops = config.alias_hops();
    cached_layout(
        LayoutKey::Spec(spec.fingerprint(), hops),
        || spec.clone(),
        |layout| layout.spec() == spec,
        hops,
    )
}

// ─── CompactCodec ───────────────────────────────────────────────────────────

/// Encoder/decoder bound to one record layout.
///
/// Cheap to clone; the layout is shared. Every call is independent, so one
/// codec can serve many threads.
#[derive(Debug, Clone)]
pub struct CompactCodec {
    layout: Arc<Layout>,
    config: CodecConfig,
}

impl CompactCodec {
    pub fn new(spec: &FieldSpec) -> Result<Self> {
        Self::with_config(spec, CodecConfig::default())
    }

    pub fn with_config(spec: &FieldSpec, config: CodecConfig) -> Result<Self> {
        let layout = layout_for_spec(spec, &config)?;
        Ok(Self { layout, config })
    }

    pub fn for_model<T: CompactModel>(config: CodecConfig) -> Result<Self> {
        let layout = layout_for::<T>(&config)?;
        Ok(Self { layout, config })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Named record → blob. Fields the layout does not declare are dropped;
    /// declared fields the record lacks are stored as null.
    pub fn encode(&self, record: &CompactValue) -> Result<String> {
        let CompactValue::Object(map) = record else {
            return Err(CompactError::NotAnObject);
        };
        let values = flatten(map, self.layout.spec())?;
        self.encode_positional(&values)
    }

    /// Positional array (already in slot order) → blob.
    pub fn encode_positional(&self, values: &[CompactValue]) -> Result<String> {
        let mut seen = SeenTable::new(self.config.dedup_threshold);
        let packed = zip(values, &mut seen, self.config.max_depth)?;
        let blob = serialize(&packed)?;
        trace!(slots = values.len(), seen = seen.len(), bytes = blob.len(), "encoded");
        Ok(blob)
    }

    /// Blob → positional array, padded with null up to the slot count.
    pub fn decode_positional(&self, blob: &str) -> Result<PositionalArray> {
        let packed = deserialize(blob, self.config.max_depth)?;
        let mut seen = SeenTable::new(self.config.dedup_threshold);
        let mut values = unzip(packed, &mut seen)?;
        if values.len() < self.layout.len() {
            values.resize(self.layout.len(), CompactValue::Null);
        }
        trace!(slots = values.len(), seen = seen.len(), bytes = blob.len(), "decoded");
        Ok(values)
    }

    /// Blob → named record with every declared field present.
    pub fn decode(&self, blob: &str) -> Result<CompactValue> {
        let values = self.decode_positional(blob)?;
        expand(values, self.layout.keys(), self.config.alias_hops())
    }

    pub fn to_item(&self, pk: &str, sk: &str, record: &CompactValue) -> Result<StoredItem> {
        Ok(StoredItem {
            pk: SmolStr::new(pk),
            sk: SmolStr::new(sk),
            v: self.encode(record)?,
        })
    }

    pub fn from_item(&self, item: &StoredItem) -> Result<CompactValue> {
        self.decode(&item.v)
    }
}

// ════════════════════════════════════════════════════════════════════════
// One-shot pipelines
// ════════════════════════════════════════════════════════════════════════

/// Encode `record` with the (cached) layout of `spec`.
pub fn encode(record: &CompactValue, spec: &FieldSpec) -> Result<String> {
    CompactCodec::new(spec)?.encode(record)
}

/// Decode `blob` with the (cached) layout of `spec`.
pub fn decode(blob: &str, spec: &FieldSpec) -> Result<CompactValue> {
    CompactCodec::new(spec)?.decode(blob)
}
