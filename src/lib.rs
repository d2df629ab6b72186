use serde::Serialize;
use serde_json::Value;
use tracing::trace;

pub mod canonical;
mod capture;
pub mod constants;
pub mod digest;
pub mod error;
pub mod utils;

pub use canonical::{canonicalize, canonicalize_with};
pub use digest::Digest;
pub use error::{DigestParseError, HashError, UnsupportedValue};

/// What canonicalization does with map members whose value is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullMembers {
    /// Drop them, so `{"a":1,"b":null}` and `{"a":1}` hash the same.
    #[default]
    Drop,
    /// Keep them as explicit nulls.
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The configuration describing how a value is canonicalized
/// before it is digested.
pub struct HashConfig {
    /// Maximum number of nested arrays/objects. For `Serialize` input every
    /// recursive step counts, options and newtypes included.
    pub max_depth: usize,
    pub nulls: NullMembers,
}

/// The default configuration drops null members and allows
/// [`constants::DEFAULT_MAX_DEPTH`] levels of nesting.
impl Default for HashConfig {
    fn default() -> Self {
        Self {
            max_depth: constants::DEFAULT_MAX_DEPTH,
            nulls: NullMembers::Drop,
        }
    }
}

/// The digest provider, injected so it can be substituted or reported
/// missing. Defaults to SHA-256.
#[derive(Clone, Copy)]
pub struct DigestFunction {
    digest: fn(&[u8]) -> Result<Digest, HashError>,
}

impl DigestFunction {
    pub const fn new(digest: fn(&[u8]) -> Result<Digest, HashError>) -> Self {
        Self { digest }
    }

    /// A provider that fails every call, for runtimes without a hash
    /// implementation.
    pub const fn unavailable() -> Self {
        fn missing(_: &[u8]) -> Result<Digest, HashError> {
            Err(HashError::HashProviderUnavailable(
                "no digest function configured".to_owned(),
            ))
        }
        Self { digest: missing }
    }

    #[inline(always)]
    pub fn compute(&self, x: &[u8]) -> Result<Digest, HashError> {
        (self.digest)(x)
    }
}

impl Default for DigestFunction {
    fn default() -> Self {
        Self {
            digest: utils::sha256_digest,
        }
    }
}

impl std::fmt::Debug for DigestFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestFunction").finish_non_exhaustive()
    }
}

/// Computes content digests: canonicalize, encode, digest.
///
/// Holds no state between calls and can be shared across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher {
    config: HashConfig,
    digest_fn: DigestFunction,
}

impl ContentHasher {
    pub fn new(config: HashConfig) -> Self {
        Self {
            config,
            digest_fn: DigestFunction::default(),
        }
    }

    pub fn with_digest_function(mut self, digest_fn: DigestFunction) -> Self {
        self.digest_fn = digest_fn;
        self
    }

    pub fn config(&self) -> &HashConfig {
        &self.config
    }

    /// The exact bytes that get digested for `value`.
    pub fn canonical_bytes(&self, value: &Value) -> Result<Vec<u8>, HashError> {
        let canonical = canonicalize_with(value, &self.config)?;
        utils::canonical_rep(&canonical)
    }

    pub fn digest(&self, value: &Value) -> Result<Digest, HashError> {
        let bytes = self.canonical_bytes(value)?;
        let d = self.digest_fn.compute(&bytes)?;
        trace!(bytes = bytes.len(), digest = %d, "computed content digest");
        Ok(d)
    }

    /// Digest any `Serialize` value. Timestamps, UUIDs and other types
    /// hash by their serde representation.
    pub fn digest_serializable<T>(&self, value: &T) -> Result<Digest, HashError>
    where
        T: Serialize + ?Sized,
    {
        let captured = capture::to_value(value, self.config.max_depth)
            .inspect_err(|e| tracing::debug!(error = %e, "rejected value"))?;
        self.digest(&captured)
    }

    /// Digest a JSON document given as text.
    ///
    /// Nesting is bounded by the smaller of `max_depth` and
    /// [`constants::JSON_PARSE_DEPTH_LIMIT`]; either way an over-deep
    /// document is [`UnsupportedValue::DepthExceeded`], not `Malformed`.
    pub fn digest_json_str(&self, text: &str) -> Result<Digest, HashError> {
        let value: Value = serde_json::from_str(text).map_err(|e| self.parse_error(e))?;
        self.digest(&value)
    }

    fn parse_error(&self, e: serde_json::Error) -> UnsupportedValue {
        let msg = e.to_string();
        if e.classify() == serde_json::error::Category::Syntax
            && msg.starts_with("recursion limit exceeded")
        {
            UnsupportedValue::DepthExceeded {
                limit: self.config.max_depth.min(constants::JSON_PARSE_DEPTH_LIMIT),
            }
        } else {
            UnsupportedValue::Malformed(msg)
        }
    }

    /// Recompute the digest of `value` and compare it with `expected`.
    ///
    /// `Ok(false)` means the content does not match; `Err` means the
    /// record could not be hashed at all and so cannot be verified.
    pub fn verify(&self, value: &Value, expected: &Digest) -> Result<bool, HashError> {
        let actual = self.digest(value)?;
        if actual != *expected {
            tracing::debug!(%expected, %actual, "digest mismatch");
        }
        Ok(actual == *expected)
    }
}

/// Hash a JSON-compatible value to 64 lowercase hex characters.
pub fn hash_of(value: &Value) -> Result<String, HashError> {
    ContentHasher::default().digest(value).map(|d| d.to_hex())
}

/// [`hash_of`] for any `Serialize` value.
pub fn hash_serializable<T>(value: &T) -> Result<String, HashError>
where
    T: Serialize + ?Sized,
{
    ContentHasher::default()
        .digest_serializable(value)
        .map(|d| d.to_hex())
}

/// [`hash_of`] for a JSON document given as text.
pub fn hash_json_str(text: &str) -> Result<String, HashError> {
    ContentHasher::default()
        .digest_json_str(text)
        .map(|d| d.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use serde_json::json;
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn load(p: &str) -> anyhow::Result<Value> {
        let file = File::open(Path::new(p)).with_context(|| format!("can't open {p}"))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn is_lower_hex(s: &str) -> bool {
        s.len() == constants::HEX_DIGEST_LEN
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    #[test]
    fn key_order_does_not_matter() {
        init_tracing();
        let h1 = hash_of(&json!({"name": "Fulcrum", "version": 1, "status": "active"})).unwrap();
        let h2 = hash_of(&json!({"version": 1, "status": "active", "name": "Fulcrum"})).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(
            h1,
            "0516f0da545e858d16a4b5ade6c15daa3aa8056bff3f9f9d5037af8d5bf8ba7f"
        );
    }

    #[test]
    fn null_and_absent_members_are_equivalent() {
        let expected = "015abd7f5cc57a2dd94b7590f04ad8084273905ee33ec5cebeae62276a97f862";
        assert_eq!(hash_of(&json!({"a": 1, "b": null})).unwrap(), expected);
        assert_eq!(hash_of(&json!({"a": 1})).unwrap(), expected);

        #[derive(Serialize)]
        struct WithOptional {
            a: u8,
            #[serde(skip_serializing_if = "Option::is_none")]
            b: Option<u8>,
        }
        assert_eq!(
            hash_serializable(&WithOptional { a: 1, b: None }).unwrap(),
            expected
        );
    }

    #[test]
    fn array_order_matters() {
        let fwd = hash_of(&json!([1, 2, 3])).unwrap();
        let rev = hash_of(&json!([3, 2, 1])).unwrap();
        assert_ne!(fwd, rev);
        assert_eq!(
            fwd,
            "a615eeaee21de5179de080de8c3052c8da901138406ba71c38c032845f7d54f4"
        );
        assert_eq!(
            rev,
            "30c8681f9b840aceee56b737f3b126ae67ec4eb71d2881db831f86014fba016d"
        );
    }

    #[test]
    fn nested_reordering_is_equivalent() {
        let a = hash_of(&json!({"outer": {"b": 2, "a": 1}, "x": [{}]})).unwrap();
        let b = hash_of(&json!({"x": [{}], "outer": {"a": 1, "b": 2}})).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a,
            "bf7752bd173981950603f78bfaa518dde955de36479d6690606b55160ea0216b"
        );
    }

    #[test]
    fn top_level_null_hashes_as_null_text() {
        assert_eq!(
            hash_of(&Value::Null).unwrap(),
            "74234e98afe7498fb5daf1f36ac2d78acc339464f950703b8c019892f982b90b"
        );
    }

    #[test]
    fn output_is_lowercase_hex() {
        for v in [json!(null), json!("x"), json!([]), json!({"k": [1.5, true]})] {
            assert!(is_lower_hex(&hash_of(&v).unwrap()));
        }
    }

    #[test]
    fn keep_nulls_changes_the_digest() {
        let v = json!({"a": 1, "b": null});
        let keep = ContentHasher::new(HashConfig {
            nulls: NullMembers::Keep,
            ..HashConfig::default()
        });
        assert_eq!(keep.canonical_bytes(&v).unwrap(), br#"{"a":1,"b":null}"#);
        assert_ne!(keep.digest(&v).unwrap().to_hex(), hash_of(&v).unwrap());
    }

    #[test]
    fn integral_floats_hash_like_integers() {
        assert_eq!(
            hash_of(&json!({"v": 1.0})).unwrap(),
            hash_of(&json!({"v": 1})).unwrap()
        );
    }

    #[test]
    fn fixtures_from_disk_agree() -> anyhow::Result<()> {
        let a = load("test_data/audit_record.json")?;
        let b = load("test_data/audit_record_reordered.json")?;
        assert_eq!(hash_of(&a)?, hash_of(&b)?);
        Ok(())
    }

    #[test]
    fn text_and_value_agree() {
        let text = r#"{ "status" : "active", "name": "Fulcrum", "version": 1, "gone": null }"#;
        assert_eq!(
            hash_json_str(text).unwrap(),
            hash_of(&json!({"name": "Fulcrum", "version": 1, "status": "active"})).unwrap()
        );
    }

    #[test]
    fn malformed_text_is_unsupported() {
        let err = hash_json_str("{\"a\":").unwrap_err();
        assert!(matches!(
            err,
            HashError::UnsupportedValue(UnsupportedValue::Malformed(_))
        ));
    }

    fn nested_arrays(levels: usize) -> String {
        format!("{}1{}", "[".repeat(levels), "]".repeat(levels))
    }

    #[test]
    fn over_deep_text_is_depth_exceeded() {
        assert_eq!(
            hash_json_str(&nested_arrays(200)),
            Err(HashError::UnsupportedValue(UnsupportedValue::DepthExceeded {
                limit: 128
            }))
        );
        assert!(hash_json_str(&nested_arrays(100)).is_ok());
    }

    #[test]
    fn text_depth_is_capped_by_the_parser() {
        let generous = ContentHasher::new(HashConfig {
            max_depth: 500,
            ..HashConfig::default()
        });
        assert_eq!(
            generous.digest_json_str(&nested_arrays(200)),
            Err(HashError::UnsupportedValue(UnsupportedValue::DepthExceeded {
                limit: constants::JSON_PARSE_DEPTH_LIMIT
            }))
        );

        let strict = ContentHasher::new(HashConfig {
            max_depth: 50,
            ..HashConfig::default()
        });
        assert_eq!(
            strict.digest_json_str(&nested_arrays(100)),
            Err(HashError::UnsupportedValue(UnsupportedValue::DepthExceeded {
                limit: 50
            }))
        );
    }

    #[test]
    fn typed_records_hash_like_their_json() {
        #[derive(Serialize)]
        struct Interaction {
            agent_id: uuid::Uuid,
            emitted_at_utc: chrono::DateTime<chrono::Utc>,
            action_type: u16,
            causality_id: Option<uuid::Uuid>,
        }
        let rec = Interaction {
            agent_id: uuid::Uuid::nil(),
            emitted_at_utc: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            action_type: 100,
            causality_id: None,
        };
        assert_eq!(
            hash_serializable(&rec).unwrap(),
            hash_of(&json!({
                "action_type": 100,
                "agent_id": "00000000-0000-0000-0000-000000000000",
                "emitted_at_utc": "2023-11-14T22:13:20Z",
            }))
            .unwrap()
        );
    }

    #[test]
    fn non_finite_serializable_is_rejected() {
        let err = hash_serializable(&[f64::NAN]).unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn substitute_digest_function_is_used() {
        fn zeros(_: &[u8]) -> Result<Digest, HashError> {
            Ok(Digest::from_bytes([0; constants::DIGEST_BYTES]))
        }
        let h = ContentHasher::default().with_digest_function(DigestFunction::new(zeros));
        assert_eq!(h.digest(&json!({"a": 1})).unwrap().to_hex(), "0".repeat(64));
    }

    #[test]
    fn unavailable_provider_is_reported() {
        let h = ContentHasher::default().with_digest_function(DigestFunction::unavailable());
        assert!(matches!(
            h.digest(&json!(1)),
            Err(HashError::HashProviderUnavailable(_))
        ));
        assert!(h.verify(&json!(1), &Digest::from_bytes([0; 32])).is_err());
    }

    #[test]
    fn verify_separates_mismatch_from_failure() {
        let h = ContentHasher::default();
        let v = json!({"id": 7, "status": "ok"});
        let d = h.digest(&v).unwrap();
        assert!(h.verify(&json!({"status": "ok", "id": 7}), &d).unwrap());
        assert!(!h.verify(&json!({"status": "tampered", "id": 7}), &d).unwrap());

        let shallow = ContentHasher::new(HashConfig {
            max_depth: 1,
            ..HashConfig::default()
        });
        assert!(shallow.verify(&json!({"a": [1]}), &d).is_err());
    }

    #[test]
    fn hasher_is_shareable_across_threads() {
        let h = ContentHasher::default();
        let v = json!({"k": [1, 2, {"z": 0, "y": 1}]});
        let expected = h.digest(&v).unwrap();
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4).map(|_| s.spawn(|| h.digest(&v).unwrap())).collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }
}
