//! Blend specification parsing.
//!
//! The blend specification travels as a JSON document appended to the
//! request URL after the first `&`:
//!
//! ```json
//! { "10": {"lut": "00FF00", "min": 0, "max": 4095},
//!   "11": {"lut": "#FF0000", "min": 10, "max": 3000} }
//! ```
//!
//! Keys are decimal channel indices selecting the per-channel source file;
//! `lut` is a six-hex-digit tint (optional leading `#`); `min`/`max` are
//! the normalization bounds in the source image's value range. Document
//! order is preserved: it fixes the channel order all the way through
//! accumulation, which is observable under saturation.

use serde_json::Value;

use crate::error::BlendSpecError;

use super::tint::Tint;

/// Settings for one channel participating in a blend.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendSetting {
    /// Channel index; selects the per-channel file via the naming scheme
    pub channel_index: u32,

    /// Solid RGB tint applied to the channel's grayscale values
    pub tint: Tint,

    /// Lower normalization bound in the source value range
    pub min: u32,

    /// Upper normalization bound, strictly greater than `min`
    pub max: u32,
}

/// Parse the JSON blend specification into an ordered settings list.
///
/// Iteration order of the JSON document is preserved. An empty document
/// parses successfully; rejecting it is the dispatcher's decision.
pub fn parse_blend_settings(json: &str) -> Result<Vec<BlendSetting>, BlendSpecError> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| BlendSpecError::Invalid(format!("malformed JSON: {e}")))?;

    let Value::Object(entries) = root else {
        return Err(BlendSpecError::Invalid(
            "blend specification must be a JSON object".into(),
        ));
    };

    let mut settings = Vec::with_capacity(entries.len());
    for (key, value) in &entries {
        let channel_index: u32 = key
            .parse()
            .map_err(|_| BlendSpecError::Invalid(format!("channel key \"{key}\" is not a non-negative integer")))?;

        let Value::Object(entry) = value else {
            return Err(BlendSpecError::Invalid(format!(
                "channel {channel_index} entry is not an object"
            )));
        };

        let lut = entry
            .get("lut")
            .and_then(Value::as_str)
            .ok_or_else(|| BlendSpecError::Invalid(format!("channel {channel_index} is missing \"lut\"")))?;
        let tint = Tint::from_hex(lut)?;

        let min = required_bound(entry, "min", channel_index)?;
        let max = required_bound(entry, "max", channel_index)?;

        if max <= min {
            return Err(BlendSpecError::Invalid(format!(
                "channel {channel_index}: max ({max}) must be greater than min ({min})"
            )));
        }

        settings.push(BlendSetting {
            channel_index,
            tint,
            min,
            max,
        });
    }

    Ok(settings)
}

/// Extract a required non-negative integer field.
fn required_bound(
    entry: &serde_json::Map<String, Value>,
    field: &str,
    channel_index: u32,
) -> Result<u32, BlendSpecError> {
    let value = entry.get(field).ok_or_else(|| {
        BlendSpecError::Invalid(format!("channel {channel_index} is missing \"{field}\""))
    })?;

    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            BlendSpecError::Invalid(format!(
                "channel {channel_index}: \"{field}\" must be a non-negative integer"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_document_order() {
        let json = r#"{"10":{"lut":"00FF00","min":0,"max":4095},"2":{"lut":"FF0000","min":10,"max":3000}}"#;
        let settings = parse_blend_settings(json).unwrap();

        assert_eq!(settings.len(), 2);
        assert_eq!(settings[0].channel_index, 10);
        assert_eq!(settings[0].tint, Tint { r: 0, g: 255, b: 0 });
        assert_eq!(settings[0].min, 0);
        assert_eq!(settings[0].max, 4095);
        assert_eq!(settings[1].channel_index, 2);
        assert_eq!(settings[1].tint, Tint { r: 255, g: 0, b: 0 });
    }

    #[test]
    fn test_parse_accepts_hash_prefix() {
        let json = r##"{"0":{"lut":"#0000FF","min":0,"max":255}}"##;
        let settings = parse_blend_settings(json).unwrap();
        assert_eq!(settings[0].tint, Tint { r: 0, g: 0, b: 255 });
    }

    #[test]
    fn test_parse_empty_object() {
        assert_eq!(parse_blend_settings("{}").unwrap(), Vec::new());
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = parse_blend_settings("{not json").unwrap_err();
        assert_eq!(err.code(), "2 1");
    }

    #[test]
    fn test_rejects_non_object_root() {
        assert!(parse_blend_settings("[1,2,3]").is_err());
        assert!(parse_blend_settings("42").is_err());
    }

    #[test]
    fn test_rejects_bad_tint() {
        let json = r#"{"0":{"lut":"XYZ","min":0,"max":10}}"#;
        let err = parse_blend_settings(json).unwrap_err();
        assert_eq!(err.code(), "2 1");
    }

    #[test]
    fn test_rejects_missing_fields() {
        assert!(parse_blend_settings(r#"{"0":{"min":0,"max":10}}"#).is_err());
        assert!(parse_blend_settings(r#"{"0":{"lut":"FFFFFF","max":10}}"#).is_err());
        assert!(parse_blend_settings(r#"{"0":{"lut":"FFFFFF","min":0}}"#).is_err());
    }

    #[test]
    fn test_rejects_max_not_above_min() {
        assert!(parse_blend_settings(r#"{"0":{"lut":"FFFFFF","min":10,"max":10}}"#).is_err());
        assert!(parse_blend_settings(r#"{"0":{"lut":"FFFFFF","min":20,"max":10}}"#).is_err());
    }

    #[test]
    fn test_min_zero_is_accepted() {
        let settings = parse_blend_settings(r#"{"0":{"lut":"FFFFFF","min":0,"max":1}}"#).unwrap();
        assert_eq!(settings[0].min, 0);
    }

    #[test]
    fn test_rejects_negative_bounds() {
        assert!(parse_blend_settings(r#"{"0":{"lut":"FFFFFF","min":-1,"max":10}}"#).is_err());
        assert!(parse_blend_settings(r#"{"0":{"lut":"FFFFFF","min":0,"max":-5}}"#).is_err());
    }

    #[test]
    fn test_rejects_non_integer_key() {
        assert!(parse_blend_settings(r#"{"ch1":{"lut":"FFFFFF","min":0,"max":10}}"#).is_err());
        assert!(parse_blend_settings(r#"{"-1":{"lut":"FFFFFF","min":0,"max":10}}"#).is_err());
    }
}
