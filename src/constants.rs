/// Number of bytes in a SHA-256 digest.
pub const DIGEST_BYTES: usize = 32;

/// Length of a digest rendered as lowercase hex.
pub const HEX_DIGEST_LEN: usize = DIGEST_BYTES * 2;

/// Default nesting ceiling for canonicalization. Matches the recursion
/// limit `serde_json` enforces when parsing text.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Nesting ceiling `serde_json` applies when parsing text. JSON text input
/// is bounded by this even when `HashConfig::max_depth` is larger.
pub const JSON_PARSE_DEPTH_LIMIT: usize = 128;
