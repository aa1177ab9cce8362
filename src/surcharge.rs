//! Per-network surcharge tables from configuration payloads.
//!
//! Payment method options list card networks in one of two shapes:
//!
//! ```json
//! [{"type": "VISA", "surcharge": {"amount": 100}}, {"type": "JCB", "surcharge": 50}]
//! {"VISA": {"surcharge": {"amount": 100}}, "JCB": {"surcharge": 50}}
//! ```
//!
//! Only strictly positive integer amounts make it into the table. Anything
//! else is skipped without error.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use checkout_fields::surcharge::extract_network_surcharges;
//!
//! let networks = json!([
//!     {"type": "VISA", "surcharge": {"amount": 100}},
//!     {"type": "MC", "surcharge": 0}
//! ]);
//! let table = extract_network_surcharges(&networks).unwrap();
//! assert_eq!(table.len(), 1);
//! assert_eq!(table["VISA"], 100);
//!
//! assert_eq!(extract_network_surcharges(&json!([])), None);
//! ```

use serde_json::Value;
use std::collections::BTreeMap;

/// Network identifier to surcharge amount, in minor units.
pub type SurchargeTable = BTreeMap<String, i64>;

/// Builds the surcharge table from a list or map of network records.
///
/// Returns `None` when no network carries a positive surcharge, so callers
/// can tell "no surcharge data" apart from an empty table.
pub fn extract_network_surcharges(networks: &Value) -> Option<SurchargeTable> {
    let table: SurchargeTable = match networks {
        Value::Array(records) => records
            .iter()
            .filter_map(|record| {
                let network = record.get("type")?.as_str()?;
                Some((network.to_string(), positive_amount(record.get("surcharge")?)?))
            })
            .collect(),
        Value::Object(records) => records
            .iter()
            .filter_map(|(network, record)| {
                Some((network.clone(), positive_amount(record.get("surcharge")?)?))
            })
            .collect(),
        _ => return None,
    };
    (!table.is_empty()).then_some(table)
}

/// A bare integer or `{"amount": integer}`, kept only when above zero.
fn positive_amount(surcharge: &Value) -> Option<i64> {
    let amount = match surcharge {
        Value::Object(fields) => fields.get("amount")?,
        other => other,
    };
    // as_i64 is None for floats, so 1.5 never rounds into the table
    amount.as_i64().filter(|&amount| amount > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_with_object_and_zero() {
        let networks = json!([
            {"type": "VISA", "surcharge": {"amount": 100}},
            {"type": "MC", "surcharge": 0}
        ]);
        let table = extract_network_surcharges(&networks).unwrap();
        assert_eq!(table, SurchargeTable::from([("VISA".to_string(), 100)]));
    }

    #[test]
    fn test_list_with_bare_integers() {
        let networks = json!([
            {"type": "VISA", "surcharge": 100},
            {"type": "AMEX", "surcharge": 250}
        ]);
        let table = extract_network_surcharges(&networks).unwrap();
        assert_eq!(table["VISA"], 100);
        assert_eq!(table["AMEX"], 250);
    }

    #[test]
    fn test_map_keyed_by_network() {
        let networks = json!({
            "VISA": {"surcharge": {"amount": 120}},
            "MASTERCARD": {"surcharge": 80},
            "JCB": {"surcharge": -5}
        });
        let table = extract_network_surcharges(&networks).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table["MASTERCARD"], 80);
        assert!(!table.contains_key("JCB"));
    }

    #[test]
    fn test_skips_malformed_records() {
        let networks = json!([
            {"surcharge": 100},
            {"type": "VISA"},
            {"type": "AMEX", "surcharge": 1.5},
            {"type": "JCB", "surcharge": {"amount": "100"}},
            {"type": 7, "surcharge": 100},
            "DISCOVER",
            {"type": "DINERS_CLUB", "surcharge": {"value": 10}},
            {"type": "ELO", "surcharge": 30}
        ]);
        let table = extract_network_surcharges(&networks).unwrap();
        assert_eq!(table, SurchargeTable::from([("ELO".to_string(), 30)]));
    }

    #[test]
    fn test_no_positive_amount_is_none() {
        assert_eq!(extract_network_surcharges(&json!([])), None);
        assert_eq!(extract_network_surcharges(&json!({})), None);
        assert_eq!(
            extract_network_surcharges(&json!([{"type": "VISA", "surcharge": 0}])),
            None
        );
        assert_eq!(extract_network_surcharges(&json!("VISA")), None);
        assert_eq!(extract_network_surcharges(&Value::Null), None);
    }

    #[test]
    fn test_float_amount_inside_object_is_skipped() {
        let networks = json!([{"type": "VISA", "surcharge": {"amount": 99.0}}]);
        assert_eq!(extract_network_surcharges(&networks), None);
    }
}
