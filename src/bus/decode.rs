//! Decode ladder for payload text arriving from the native bridge.
//!
//! The host re-escapes strings when it relays them through a script call, so
//! the text a surface receives is not always the JSON another surface sent.
//! Strategies are tried in order; the first one that yields a value wins.
//! When every strategy fails the raw text is kept as an opaque payload so the
//! event is still delivered.

use serde_json::Value;

/// How deep a JSON string holding more JSON is unwrapped.
const MAX_NESTED_DEPTH: usize = 2;

/// Result of running the ladder over one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Json(Value),
    /// A quoted string that was not valid JSON; the unquoted content.
    Bare(String),
    /// Nothing worked; the text as received.
    Raw(String),
}

/// One rung of the ladder.
pub trait DecodeStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn decode(&self, raw: &str) -> Option<Decoded>;
}

/// Stage 1: the text is already JSON.
pub struct DirectJson;

impl DecodeStrategy for DirectJson {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&self, raw: &str) -> Option<Decoded> {
        parse_json(raw, 0).map(Decoded::Json)
    }
}

/// Stage 2: undo script-string escaping, then parse.
pub struct UnescapedJson;

impl DecodeStrategy for UnescapedJson {
    fn name(&self) -> &'static str {
        "unescaped-json"
    }

    fn decode(&self, raw: &str) -> Option<Decoded> {
        let cleaned = unescape(raw);
        if cleaned == raw {
            return None;
        }
        parse_json(&cleaned, 0).map(Decoded::Json)
    }
}

/// Stage 3: a single pair of surrounding quotes around a bare string.
pub struct QuotedString;

impl DecodeStrategy for QuotedString {
    fn name(&self) -> &'static str {
        "quoted-string"
    }

    fn decode(&self, raw: &str) -> Option<Decoded> {
        if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            return Some(Decoded::Bare(raw[1..raw.len() - 1].to_string()));
        }
        None
    }
}

pub struct DecodeLadder {
    strategies: Vec<Box<dyn DecodeStrategy>>,
}

impl DecodeLadder {
    pub fn new(strategies: Vec<Box<dyn DecodeStrategy>>) -> Self {
        Self { strategies }
    }

    /// The ladder matching the escaping the native host applies.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(DirectJson),
            Box::new(UnescapedJson),
            Box::new(QuotedString),
        ])
    }

    pub fn push(&mut self, strategy: Box<dyn DecodeStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn decode(&self, raw: &str) -> Decoded {
        if raw.trim().is_empty() {
            return Decoded::Json(Value::Object(serde_json::Map::new()));
        }

        for strategy in &self.strategies {
            if let Some(decoded) = strategy.decode(raw) {
                tracing::trace!(strategy = strategy.name(), "decoded native payload");
                return decoded;
            }
            tracing::debug!(strategy = strategy.name(), "decode strategy did not apply");
        }

        tracing::warn!(len = raw.len(), "native payload undecodable, delivering raw text");
        Decoded::Raw(raw.to_string())
    }
}

impl Default for DecodeLadder {
    fn default() -> Self {
        Self::standard()
    }
}

/// Reverse the escaping applied when a string is embedded in a script call.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(escaped @ ('"' | '\'' | '\\')) => out.push(escaped),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Parse JSON, unwrapping strings that themselves hold an encoded object or array.
fn parse_json(text: &str, depth: usize) -> Option<Value> {
    let value: Value = serde_json::from_str(text).ok()?;
    if depth >= MAX_NESTED_DEPTH {
        return Some(value);
    }
    if let Value::String(inner) = &value {
        let trimmed = inner.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Some(nested) =
                parse_json(inner, depth + 1).or_else(|| parse_json(&unescape(inner), depth + 1))
            {
                return Some(nested);
            }
        }
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn plain_json_decodes_directly() {
        let ladder = DecodeLadder::standard();
        assert_eq!(
            ladder.decode(r#"{"theme":"dark"}"#),
            Decoded::Json(json!({ "theme": "dark" }))
        );
    }

    #[test]
    fn escaped_quotes_are_recovered() {
        let ladder = DecodeLadder::standard();
        assert_eq!(
            ladder.decode(r#"{\"theme\":\"dark\"}"#),
            Decoded::Json(json!({ "theme": "dark" }))
        );
    }

    #[test]
    fn quoted_and_double_escaped_payload_is_recovered() {
        let ladder = DecodeLadder::standard();
        assert_eq!(
            ladder.decode(r#""{\\\"theme\\\":\\\"dark\\\"}""#),
            Decoded::Json(json!({ "theme": "dark" }))
        );
    }

    #[test]
    fn host_escaped_newline_escapes_survive() {
        let relayed = crate::host::escape_for_script(r#"{"content":"one\ntwo","q":"it's \"x\""}"#);
        assert_eq!(
            DecodeLadder::standard().decode(&relayed),
            Decoded::Json(json!({ "content": "one\ntwo", "q": "it's \"x\"" }))
        );
    }

    #[test]
    fn quoted_non_json_becomes_bare_string() {
        let ladder = DecodeLadder::standard();
        assert_eq!(
            ladder.decode(r#""say "hi" twice""#),
            Decoded::Bare(r#"say "hi" twice"#.to_string())
        );
    }

    #[test]
    fn garbage_is_kept_raw() {
        let ladder = DecodeLadder::standard();
        assert_eq!(
            ladder.decode("not json {{{"),
            Decoded::Raw("not json {{{".to_string())
        );
    }

    #[test]
    fn blank_payload_is_empty_object() {
        let ladder = DecodeLadder::standard();
        assert_eq!(ladder.decode("   "), Decoded::Json(json!({})));
    }

    #[test]
    fn custom_strategy_runs_after_standard_ones() {
        struct Prefixed;
        impl DecodeStrategy for Prefixed {
            fn name(&self) -> &'static str {
                "prefixed"
            }
            fn decode(&self, raw: &str) -> Option<Decoded> {
                raw.strip_prefix("json:")
                    .and_then(|rest| serde_json::from_str(rest).ok())
                    .map(Decoded::Json)
            }
        }

        let mut ladder = DecodeLadder::standard();
        ladder.push(Box::new(Prefixed));
        assert_eq!(ladder.decode("json:[1,2]"), Decoded::Json(json!([1, 2])));
    }
}
