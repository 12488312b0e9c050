//! Tolerant decoding for stored parameter records.
//!
//! Records written by older clients carry labels and number shapes the
//! typed fields do not accept. A field that does not decode reads as absent,
//! so the baseline value applies and the rest of the record still loads.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum OrSkip<T> {
    Value(T),
    Skip(IgnoredAny),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuantity {
    Number(f64),
    Text(String),
    Skip(IgnoredAny),
}

/// Batch size from any number: fractions are floored, anything below 1 becomes 1.
pub(crate) fn clamp_quantity(v: f64) -> u32 {
    let v = v.floor();
    if !(v >= 1.0) {
        1
    } else if v > u32::MAX as f64 {
        u32::MAX
    } else {
        v as u32
    }
}

pub(crate) fn or_none<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OrSkip::<T>::deserialize(d)? {
        OrSkip::Value(v) => Some(v),
        OrSkip::Skip(_ignored) => None,
    })
}

/// Quantity stored as an integer, a float or numeric text.
pub(crate) fn quantity<'de, D>(d: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawQuantity::deserialize(d)? {
        RawQuantity::Number(v) => Some(clamp_quantity(v)),
        RawQuantity::Text(s) => s.trim().parse::<f64>().ok().map(clamp_quantity),
        RawQuantity::Skip(_ignored) => None,
    })
}
