use anyhow::{Context, Result, anyhow};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Extracts the payload of a JSONP response such as `jsonpgz({...});`.
pub fn unwrap_jsonp<'a>(body: &'a str, callback: &str) -> Result<&'a str> {
    let start = body
        .find(callback)
        .and_then(|i| body[i + callback.len()..].strip_prefix('(').map(|_| i + callback.len() + 1))
        .ok_or_else(|| anyhow!("Response is not wrapped in {callback}(...)"))?;
    let end = body
        .rfind(')')
        .filter(|end| *end >= start)
        .ok_or_else(|| anyhow!("Unterminated {callback}(...) envelope"))?;

    let payload = body[start..end].trim();
    if payload.is_empty() {
        return Err(anyhow!("Empty {callback}(...) payload"));
    }
    Ok(payload)
}

/// Parses a numeric string field, treating absent or blank values as `None`.
pub fn parse_decimal_field(field: &str, value: Option<&str>) -> Result<Option<Decimal>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Decimal::from_str(raw)
            .map(Some)
            .with_context(|| format!("Invalid number in field {field}: '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_unwrap_jsonp() {
        assert_eq!(unwrap_jsonp("jsonpgz({\"a\":1});", "jsonpgz").unwrap(), "{\"a\":1}");
        // Parentheses inside the payload are kept
        assert_eq!(
            unwrap_jsonp("jsonpgz({\"name\":\"Fund (QDII)\"});", "jsonpgz").unwrap(),
            "{\"name\":\"Fund (QDII)\"}"
        );
    }

    #[test]
    fn test_unwrap_jsonp_rejects_bad_envelopes() {
        assert!(unwrap_jsonp("jsonpgz();", "jsonpgz").is_err());
        assert!(unwrap_jsonp("{\"a\":1}", "jsonpgz").is_err());
        assert!(unwrap_jsonp("jsonpgz({\"a\":1}", "jsonpgz").is_err());
        assert!(unwrap_jsonp("callback({\"a\":1})", "jsonpgz").is_err());
    }

    #[test]
    fn test_parse_decimal_field() {
        assert_eq!(parse_decimal_field("gsz", Some("1.2345")).unwrap(), Some(dec!(1.2345)));
        assert_eq!(parse_decimal_field("gszzl", Some("-0.52")).unwrap(), Some(dec!(-0.52)));
        assert_eq!(parse_decimal_field("gsz", Some(" ")).unwrap(), None);
        assert_eq!(parse_decimal_field("gsz", None).unwrap(), None);
        assert!(parse_decimal_field("gsz", Some("n/a")).is_err());
    }
}
