//! Timestamp resolution for time-enabled layers.
//!
//! Catalogue timestamps are opaque strings (`YYYYMMDD` or `YYYY`). A request
//! is either a full timestamp or a year; matching is done textually, with a
//! numeric comparison on the year part as second chance.

use chrono::NaiveDate;

use crate::{LayerDescriptor, LayerError};

/// Pick the timestamp of `layer` matching `requested`.
///
/// * Layers that are not time enabled resolve to their first timestamp when
///   their kind always carries one (WMTS, terrain, 3D tileset), to `None`
///   otherwise; `requested` is ignored.
/// * Without a request the default comes from `timeBehaviour`: a 4, 6 or 8
///   digit token contributes its year, anything other than `all` selects
///   the first timestamp.
/// * The first timestamp in catalogue order that equals the request, or
///   whose leading four characters have the same numeric value, wins.
///
/// `None` means the layer has no tile series for that time.
pub fn resolve_timestamp<'a>(layer: &'a LayerDescriptor, requested: Option<&str>) -> Option<&'a str> {
    if !layer.time_enabled {
        if layer.kind.has_fixed_timestamp() {
            return layer.timestamps.first().map(String::as_str);
        }
        return None;
    }

    let timestamps = &layer.timestamps;
    let requested: Option<&str> = match requested {
        Some(r) => Some(r),
        None => default_request(layer),
    };
    let requested = requested?;
    let requested_num = leading_int(requested);

    timestamps
        .iter()
        .find(|ts| {
            if ts.as_str() == requested {
                return true;
            }
            let year: String = ts.chars().take(4).collect();
            match (requested_num, leading_int(&year)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        })
        .map(String::as_str)
}

fn default_request(layer: &LayerDescriptor) -> Option<&str> {
    let behaviour = layer.time_behaviour.as_deref();
    if let Some(b) = behaviour {
        if matches!(b.len(), 4 | 6 | 8) && b.bytes().all(|c| c.is_ascii_digit()) {
            return Some(&b[..4]);
        }
    }
    if behaviour != Some("all") {
        return layer.timestamps.first().map(String::as_str);
    }
    None
}

/// Integer value of the leading digits of `s` (after optional whitespace and
/// sign). `None` when no digit leads the string.
pub fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits: &str = &rest[..rest.bytes().take_while(u8::is_ascii_digit).count()];
    if digits.is_empty() {
        return None;
    }
    let value: i64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Validate a catalogue timestamp token (`YYYY`, `YYYYMM` or `YYYYMMDD`).
pub fn validate_timestamp(token: &str) -> Result<(), LayerError> {
    let invalid = || LayerError::InvalidTimestamp(token.to_string());
    if !token.bytes().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let padded = match token.len() {
        4 => format!("{}0101", token),
        6 => format!("{}01", token),
        8 => token.to_string(),
        _ => return Err(invalid()),
    };
    NaiveDate::parse_from_str(&padded, "%Y%m%d")
        .map(|_| ())
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("2010"), Some(2010));
        assert_eq!(leading_int("20100101"), Some(20100101));
        assert_eq!(leading_int(" 99abc"), Some(99));
        assert_eq!(leading_int("-12"), Some(-12));
        assert_eq!(leading_int("abc"), None);
        assert_eq!(leading_int(""), None);
        assert_eq!(leading_int("last"), None);
    }

    #[test]
    fn test_validate_timestamp() {
        assert!(validate_timestamp("20160115").is_ok());
        assert!(validate_timestamp("2016").is_ok());
        assert!(validate_timestamp("201602").is_ok());
        assert!(validate_timestamp("20161315").is_err());
        assert!(validate_timestamp("2016-01-15").is_err());
        assert!(validate_timestamp("99999").is_err());
    }
}
