// ═══════════════════════════════════════════════════════════════════════
// End-to-end encode/decode behaviour
// ═══════════════════════════════════════════════════════════════════════
use crate::compact_obj;
use crate::types::DEFAULT_MAX_DEPTH;
use crate::{
    CodecConfig, CompactCodec, CompactError, CompactNumber, CompactValue, FieldSpec, ValueMap,
    decode, encode,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smol_str::SmolStr;

fn fields(names: &[&str]) -> FieldSpec {
    names.iter().fold(FieldSpec::new(), |spec, name| spec.field(name))
}

fn roundtrip(record: &CompactValue, spec: &FieldSpec) -> CompactValue {
    let blob = encode(record, spec).unwrap();
    decode(&blob, spec).unwrap()
}

// ─── Random trees ───────────────────────────────────────────────────────────

const STRINGS: &[&str] = &[
    "",
    "a",
    "ab",
    "abc",
    "it's",
    "say \"hi\"",
    "both ' and \"",
    "^0",
    "x^",
    "^'",
    "N",
    "null,",
    ",[]]",
    "back\\slash",
    "line\nfeed",
    "héllo/wörld",
];

fn random_scalar(rng: &mut StdRng) -> CompactValue {
    match rng.gen_range(0..7) {
        0 => CompactValue::Null,
        1 => CompactValue::Bool(rng.gen_bool(0.5)),
        2 => CompactValue::from(rng.gen_range(-200i64..200)),
        3 => CompactValue::from(rng.gen_range(-4000i64..4000) as f64 / 8.0),
        4 => CompactValue::from(rng.gen_range(i64::MAX - 3..=i64::MAX)),
        _ => CompactValue::from(STRINGS[rng.gen_range(0..STRINGS.len())]),
    }
}

fn random_tree(rng: &mut StdRng, depth: usize) -> CompactValue {
    if depth == 0 || rng.gen_bool(0.5) {
        return random_scalar(rng);
    }
    let len = rng.gen_range(0..4);
    if rng.gen_bool(0.5) {
        CompactValue::Array((0..len).map(|_| random_tree(rng, depth - 1)).collect())
    } else {
        let map = (0..len)
            .map(|i| {
                let key = SmolStr::from(format!("{}{i}", STRINGS[rng.gen_range(0..STRINGS.len())]));
                (key, random_tree(rng, depth - 1))
            })
            .collect::<ValueMap>();
        CompactValue::Object(map)
    }
}

#[test]
fn test_random_trees_roundtrip() {
    let spec = fields(&["f0", "f1", "f2", "f3", "f4"]);
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..500 {
        let map = (0..5)
            .map(|i| (SmolStr::from(format!("f{i}")), random_tree(&mut rng, 5)))
            .collect::<ValueMap>();
        let record = CompactValue::Object(map);
        assert_eq!(roundtrip(&record, &spec), record);
    }
}

#[test]
fn test_random_nested_layout_roundtrip() {
    let spec = FieldSpec::new()
        .field("id")
        .rename("payload", "p")
        .nested("meta", FieldSpec::new().rename("tags", "t").field("extra"));
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let mut meta = ValueMap::new();
        meta.insert("tags".into(), random_tree(&mut rng, 3));
        meta.insert("extra".into(), random_tree(&mut rng, 3));
        let mut map = ValueMap::new();
        map.insert("id".into(), random_scalar(&mut rng));
        map.insert("payload".into(), random_tree(&mut rng, 4));
        map.insert("meta".into(), CompactValue::Object(meta));
        let record = CompactValue::Object(map);
        assert_eq!(roundtrip(&record, &spec), record);
    }
}

// ─── Deduplication ──────────────────────────────────────────────────────────

#[test]
fn test_repeated_value_stored_once() {
    let spec = fields(&["a", "b", "c"]);
    let record = compact_obj!({
        "a" => "repeated",
        "b" => (CompactValue::Array(vec!["x".into(), "repeated".into()])),
        "c" => { "k" => "repeated" }
    });
    let blob = encode(&record, &spec).unwrap();
    assert_eq!(blob.matches("'repeated'").count(), 1);
    assert_eq!(blob, "['repeated',['x',^0],{'k':^0}]");
    assert_eq!(decode(&blob, &spec).unwrap(), record);
}

#[test]
fn test_threshold_boundary() {
    let spec = fields(&["a", "b", "c"]);
    let two = compact_obj!({ "a" => "ab", "b" => "ab", "c" => "ab" });
    assert_eq!(encode(&two, &spec).unwrap(), "['ab','ab','ab']");

    let three = compact_obj!({ "a" => "abc", "b" => "abc", "c" => "abc" });
    let blob = encode(&three, &spec).unwrap();
    assert_eq!(blob, "['abc',^0,^0]");
    assert_eq!(decode(&blob, &spec).unwrap(), three);
}

#[test]
fn test_numbers_deduplicated_by_digits() {
    let spec = fields(&["a", "b", "c", "d"]);
    let record = compact_obj!({ "a" => 12i64, "b" => 12i64, "c" => 1234i64, "d" => 1234i64 });
    let blob = encode(&record, &spec).unwrap();
    assert_eq!(blob, "[12,12,1234,^0]");
    assert_eq!(decode(&blob, &spec).unwrap(), record);
}

#[test]
fn test_small_u64_roundtrips_equal() {
    let spec = fields(&["a", "b"]);
    let record = compact_obj!({
        "a" => (CompactValue::Number(CompactNumber::U64(5))),
        "b" => (u64::MAX)
    });
    let blob = encode(&record, &spec).unwrap();
    assert_eq!(blob, "[5,18446744073709551615]");
    assert_eq!(decode(&blob, &spec).unwrap(), record);
}

#[test]
fn test_position_and_seen_index_collision() {
    let spec = fields(&["a", "b", "c", "d"]);
    let record = compact_obj!({ "a" => true, "b" => "xyz", "c" => "abc", "d" => "abc" });
    let blob = encode(&record, &spec).unwrap();
    assert_eq!(blob, "[T,'xyz','abc',^1]");
    assert_eq!(decode(&blob, &spec).unwrap(), record);
}

#[test]
fn test_custom_threshold_config() {
    let config: CodecConfig = serde_json::from_str(r#"{"dedup_threshold": 4}"#).unwrap();
    assert_eq!(config.max_depth, CodecConfig::default().max_depth);
    let codec = CompactCodec::with_config(&fields(&["a", "b"]), config).unwrap();
    let record = compact_obj!({ "a" => "abcd", "b" => "abcd" });
    let blob = codec.encode(&record).unwrap();
    assert_eq!(blob, "['abcd','abcd']");
    assert_eq!(codec.decode(&blob).unwrap(), record);
}

// ─── Aliases ────────────────────────────────────────────────────────────────

#[test]
fn test_alias_resolution_keeps_nested_shape() {
    let spec: FieldSpec = serde_json::from_str(r#"{"profile": {"name": "n", "age": "a"}}"#).unwrap();
    let record = compact_obj!({ "profile" => { "name" => "Ann", "age" => 30i64 } });
    let blob = encode(&record, &spec).unwrap();
    assert_eq!(blob, "[['Ann',30]]");

    let decoded = decode(&blob, &spec).unwrap();
    assert_eq!(decoded, record);
    assert!(decoded.get("n").is_none());
    assert!(decoded.get("profile").and_then(|p| p.get("a")).is_none());
}

#[test]
fn test_deeply_nested_aliases() {
    let spec = FieldSpec::new().nested(
        "account",
        FieldSpec::new()
            .rename("owner", "o")
            .nested("limits", FieldSpec::new().rename("daily", "d").field("monthly")),
    );
    let record = compact_obj!({
        "account" => {
            "owner" => "Ann",
            "limits" => { "daily" => 100i64, "monthly" => 3000i64 }
        }
    });
    let blob = encode(&record, &spec).unwrap();
    assert_eq!(blob, "[['Ann',[100,3000]]]");
    assert_eq!(decode(&blob, &spec).unwrap(), record);
}

// ─── Literals and absent fields ─────────────────────────────────────────────

#[test]
fn test_null_field_uses_marker() {
    let spec = fields(&["value"]);
    let record = compact_obj!({ "value" => (CompactValue::Null) });
    let blob = encode(&record, &spec).unwrap();
    assert_eq!(blob, "[N]");
    assert!(!blob.contains("null"));
    assert_eq!(decode(&blob, &spec).unwrap(), record);
}

#[test]
fn test_absent_field_decodes_as_null() {
    let spec = fields(&["a", "b"]);
    let record = compact_obj!({ "a" => "x" });
    let blob = encode(&record, &spec).unwrap();
    assert_eq!(blob, "['x',N]");
    assert_eq!(
        decode(&blob, &spec).unwrap(),
        compact_obj!({ "a" => "x", "b" => (CompactValue::Null) })
    );
}

#[test]
fn test_empty_containers() {
    let spec = fields(&["list", "map"]);
    let record = compact_obj!({
        "list" => (CompactValue::Array(Vec::new())),
        "map" => (CompactValue::Object(ValueMap::new()))
    });
    let blob = encode(&record, &spec).unwrap();
    assert_eq!(blob, "[O,{}]");
    assert_eq!(decode(&blob, &spec).unwrap(), record);
}

// ─── Quoting ────────────────────────────────────────────────────────────────

#[test]
fn test_quote_swap_with_dedup() {
    let spec = fields(&["a", "b"]);
    let text = "it's a \"test\"";
    let record = compact_obj!({ "a" => text, "b" => text });
    let blob = encode(&record, &spec).unwrap();
    assert_eq!(blob, r#"['it"s a ^'test^'',^0]"#);
    assert_eq!(decode(&blob, &spec).unwrap(), record);
}

#[test]
fn test_reference_lookalike_strings() {
    let spec = fields(&["a", "b"]);
    let record = compact_obj!({ "a" => "^12", "b" => "^12" });
    let blob = encode(&record, &spec).unwrap();
    assert_eq!(blob, "['^^12',^0]");
    assert_eq!(decode(&blob, &spec).unwrap(), record);
}

// ─── Failures ───────────────────────────────────────────────────────────────

#[test]
fn test_corrupt_reference_fails() {
    let spec = fields(&["a", "b"]);
    assert_eq!(
        decode("['abc',^5]", &spec),
        Err(CompactError::UnresolvedReference { index: 5, seen: 1 })
    );
}

#[test]
fn test_malformed_blob_fails() {
    let spec = fields(&["a"]);
    for blob in ["[", "['a'", "[N,,N]", "[T]]"] {
        assert!(matches!(
            decode(blob, &spec),
            Err(CompactError::DecodeFormat { .. })
        ));
    }
}

#[test]
fn test_non_finite_number_rejected() {
    let spec = fields(&["a"]);
    let record = compact_obj!({ "a" => (f64::INFINITY) });
    assert_eq!(encode(&record, &spec), Err(CompactError::NonFiniteNumber));
}

fn nest(levels: usize) -> CompactValue {
    (0..levels).fold(CompactValue::from("leaf"), |inner, _| {
        CompactValue::Array(vec![inner])
    })
}

#[test]
fn test_nesting_limit_applies_to_encode() {
    // The root list is the first level, so a field may add 63 more.
    let spec = fields(&["a"]);
    let deepest = compact_obj!({ "a" => (nest(DEFAULT_MAX_DEPTH - 1)) });
    assert_eq!(roundtrip(&deepest, &spec), deepest);

    let too_deep = compact_obj!({ "a" => (nest(DEFAULT_MAX_DEPTH)) });
    assert_eq!(
        encode(&too_deep, &spec),
        Err(CompactError::NestingTooDeep { max_depth: DEFAULT_MAX_DEPTH })
    );
}

#[test]
fn test_nesting_limit_follows_config() {
    let config = CodecConfig { max_depth: 3, ..CodecConfig::default() };
    let codec = CompactCodec::with_config(&fields(&["a"]), config).unwrap();
    let ok = compact_obj!({ "a" => { "b" => "leaf" } });
    assert_eq!(codec.decode(&codec.encode(&ok).unwrap()).unwrap(), ok);
    let deep = compact_obj!({ "a" => { "b" => { "c" => "leaf" } } });
    assert_eq!(codec.encode(&deep), Err(CompactError::NestingTooDeep { max_depth: 3 }));
}

#[test]
fn test_json_record_roundtrip() {
    let spec: FieldSpec =
        serde_json::from_str(r#"["id", {"email": "e"}, {"profile": ["bio", {"avatar": "av"}]}]"#)
            .unwrap();
    let json = serde_json::json!({
        "id": "user:abc123",
        "email": "alice@example.com",
        "profile": { "bio": "Developer", "avatar": "https://example.com/a.png" }
    });
    let record = CompactValue::from(json.clone());
    let decoded = roundtrip(&record, &spec);
    assert_eq!(serde_json::Value::from(decoded), json);
}
