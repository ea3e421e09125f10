//! Type-driven encoding between JSON values and the stored text column.
//!
//! Writes are validated so that every persisted value decodes under its
//! declared type. `null` maps to SQL `NULL` for every type.

use serde_json::{Number, Value};

use crate::error::{ConfigError, ConfigResult};
use crate::model::ConfigType;

/// Serialize `value` for storage under `value_type`.
///
/// Strings offered for a `json` entry are stored as-is and must already be
/// JSON text; any other input is JSON-encoded.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when `value` cannot be represented
/// under `value_type`.
pub fn serialize_value(
    key: &str,
    value: &Value,
    value_type: ConfigType,
) -> ConfigResult<Option<String>> {
    if value.is_null() {
        return Ok(None);
    }
    let invalid = |reason| ConfigError::InvalidValue {
        key: key.to_string(),
        value_type,
        reason,
    };

    let text = match (value_type, value) {
        (ConfigType::Number, Value::Number(number)) => number.to_string(),
        (ConfigType::Number, Value::String(text)) => {
            let trimmed = text.trim();
            parse_number(trimmed).ok_or_else(|| invalid("expected a number"))?;
            trimmed.to_string()
        }
        (ConfigType::Number, _) => return Err(invalid("expected a number")),
        (ConfigType::Boolean, Value::Bool(flag)) => flag.to_string(),
        (ConfigType::Boolean, Value::String(text)) => {
            parse_bool(text).ok_or_else(|| invalid("expected true or false"))?;
            text.trim().to_string()
        }
        (ConfigType::Boolean, _) => return Err(invalid("expected true or false")),
        (ConfigType::Json, Value::String(text)) => {
            serde_json::from_str::<Value>(text).map_err(|_| invalid("expected JSON text"))?;
            text.clone()
        }
        (ConfigType::Json, other) => other.to_string(),
        (ConfigType::String, Value::String(text)) => text.clone(),
        (ConfigType::String, other) => other.to_string(),
    };
    Ok(Some(text))
}

/// Decode stored text according to `value_type`.
///
/// # Errors
///
/// Returns [`ConfigError::Decode`] when `raw` is not a valid rendering of
/// `value_type`.
pub fn decode_value(key: &str, raw: Option<&str>, value_type: ConfigType) -> ConfigResult<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Null);
    };
    let malformed = |source| ConfigError::Decode {
        key: key.to_string(),
        value_type,
        source,
    };

    match value_type {
        ConfigType::String => Ok(Value::String(raw.to_string())),
        ConfigType::Number => parse_number(raw)
            .map(Value::Number)
            .ok_or_else(|| malformed(None)),
        ConfigType::Boolean => parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| malformed(None)),
        ConfigType::Json => serde_json::from_str(raw).map_err(|err| malformed(Some(err))),
    }
}

/// Parse numeric text, preferring an integer representation.
fn parse_number(text: &str) -> Option<Number> {
    let text = text.trim();
    if let Ok(int) = text.parse::<i64>() {
        return Some(Number::from(int));
    }
    if let Ok(uint) = text.parse::<u64>() {
        return Some(Number::from(uint));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip(value: &Value, value_type: ConfigType) -> ConfigResult<Value> {
        let stored = serialize_value("k", value, value_type)?;
        decode_value("k", stored.as_deref(), value_type)
    }

    #[test]
    fn typed_values_round_trip() -> ConfigResult<()> {
        let cases = [
            (json!(10), ConfigType::Number),
            (json!(-3), ConfigType::Number),
            (json!(2.5), ConfigType::Number),
            (json!(u64::MAX), ConfigType::Number),
            (json!(true), ConfigType::Boolean),
            (json!(false), ConfigType::Boolean),
            (json!({"name": "A"}), ConfigType::Json),
            (json!(["rust", "sql"]), ConfigType::Json),
            (json!(42), ConfigType::Json),
            (json!("plain text"), ConfigType::String),
            (Value::Null, ConfigType::Json),
        ];
        for (value, value_type) in cases {
            assert_eq!(round_trip(&value, value_type)?, value, "{value_type}");
        }
        Ok(())
    }

    #[test]
    fn null_is_stored_as_sql_null() -> ConfigResult<()> {
        for value_type in ConfigType::ALL {
            assert_eq!(serialize_value("k", &Value::Null, value_type)?, None);
            assert_eq!(decode_value("k", None, value_type)?, Value::Null);
        }
        Ok(())
    }

    #[test]
    fn json_strings_are_not_double_encoded() -> ConfigResult<()> {
        let text = r#"{"name":"A"}"#;
        let stored = serialize_value("about_profile", &json!(text), ConfigType::Json)?;
        assert_eq!(stored.as_deref(), Some(text));
        assert_eq!(
            serialize_value("about_profile", &json!({"name": "A"}), ConfigType::Json)?.as_deref(),
            Some(text)
        );
        Ok(())
    }

    #[test]
    fn json_strings_must_be_json_text() {
        let err = serialize_value("about_profile", &json!("not json"), ConfigType::Json)
            .expect_err("bare words are not JSON");
        assert!(matches!(
            err,
            ConfigError::InvalidValue { value_type: ConfigType::Json, .. }
        ));
    }

    #[test]
    fn numeric_and_boolean_strings_are_accepted() -> ConfigResult<()> {
        assert_eq!(
            serialize_value("posts_per_page", &json!(" 10 "), ConfigType::Number)?.as_deref(),
            Some("10")
        );
        assert_eq!(
            serialize_value("allow_comments", &json!("false"), ConfigType::Boolean)?.as_deref(),
            Some("false")
        );
        Ok(())
    }

    #[test]
    fn mismatched_scalars_are_rejected() {
        let rejected = [
            (json!("abc"), ConfigType::Number),
            (json!("NaN"), ConfigType::Number),
            (json!(true), ConfigType::Number),
            (json!({"n": 1}), ConfigType::Number),
            (json!("yes"), ConfigType::Boolean),
            (json!(1), ConfigType::Boolean),
        ];
        for (value, value_type) in rejected {
            assert!(
                matches!(
                    serialize_value("k", &value, value_type),
                    Err(ConfigError::InvalidValue { .. })
                ),
                "{value} as {value_type}"
            );
        }
    }

    #[test]
    fn string_type_stringifies_other_values() -> ConfigResult<()> {
        assert_eq!(
            serialize_value("k", &json!(3), ConfigType::String)?.as_deref(),
            Some("3")
        );
        assert_eq!(
            serialize_value("k", &json!({"a": [1]}), ConfigType::String)?.as_deref(),
            Some(r#"{"a":[1]}"#)
        );
        Ok(())
    }

    #[test]
    fn malformed_stored_text_fails_to_decode() {
        assert!(matches!(
            decode_value("about_profile", Some("{broken"), ConfigType::Json),
            Err(ConfigError::Decode { source: Some(_), .. })
        ));
        assert!(matches!(
            decode_value("posts_per_page", Some("ten"), ConfigType::Number),
            Err(ConfigError::Decode { source: None, .. })
        ));
        assert!(matches!(
            decode_value("allow_comments", Some("1"), ConfigType::Boolean),
            Err(ConfigError::Decode { .. })
        ));
    }

    #[test]
    fn numbers_decode_as_integers_when_integral() -> ConfigResult<()> {
        assert_eq!(decode_value("k", Some("10"), ConfigType::Number)?, json!(10));
        assert!(decode_value("k", Some("10"), ConfigType::Number)?.is_i64());
        assert_eq!(decode_value("k", Some("0.5"), ConfigType::Number)?, json!(0.5));
        Ok(())
    }
}
