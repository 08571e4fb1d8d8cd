//! Deal normalization: turns one raw HubSpot deal or Salesforce opportunity
//! into a [`NormalizedDeal`], or drops it.
//!
//! Records without a positive amount or without a close date are filtered
//! out silently. Malformed numeric fields fall back to defaults instead of
//! failing the batch.

use crate::domain::model::{
    CloseDateFormat, FieldMap, NormalizedDeal, Provider, RawRecord, TermYears,
};
use serde_json::Value;

pub const DEFAULT_TERM_MONTHS: i64 = 12;

pub fn normalize(provider: Provider, record: &RawRecord) -> Option<NormalizedDeal> {
    let fields = provider.fields();

    let amount = parse_amount(present(record, fields.amount));
    let term_months = resolve_term_months(record, fields);
    let close_date = resolve_close_date(record, fields);

    let close_date = match close_date {
        Some(date) if amount > 0.0 => date,
        _ => {
            tracing::debug!(
                "Dropping {} record {} (amount: {}, close date missing: {})",
                provider,
                record.id,
                amount,
                close_date.is_none()
            );
            return None;
        }
    };

    Some(NormalizedDeal {
        external_id: record.id.clone(),
        name: resolve_name(record, fields),
        amount,
        close_date,
        term_years: TermYears::from_months(term_months),
        paid: false,
    })
}

/// Normalizes every record in input order; dropped records leave no gap.
pub fn normalize_batch(provider: Provider, records: &[RawRecord]) -> Vec<NormalizedDeal> {
    records
        .iter()
        .filter_map(|record| normalize(provider, record))
        .collect()
}

/// A field counts as present unless it is missing, null or an empty string.
fn present<'a>(record: &'a RawRecord, field: &str) -> Option<&'a Value> {
    match record.fields.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(value) => Some(value),
    }
}

fn resolve_name(record: &RawRecord, fields: &FieldMap) -> String {
    match present(record, fields.name) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => fields.default_name.to_string(),
    }
}

fn parse_amount(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => leading_float(s),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Parses the numeric prefix of `s`, so `"5000.00 USD"` yields 5000.
fn leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = match bytes.first() {
        Some(b'+') | Some(b'-') => 1,
        _ => 0,
    };
    let int_end = digits_from(end);
    let mut has_digits = int_end > end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        has_digits |= frac_end > end + 1;
        end = frac_end;
    }
    if !has_digits {
        return None;
    }

    // 指數部分必須有數字才算
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+') | Some(b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Numeric `0` and `false` do not count as a term, so the next candidate is tried.
fn term_candidate<'a>(record: &'a RawRecord, field: &str) -> Option<&'a Value> {
    match present(record, field)? {
        Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        value => Some(value),
    }
}

fn resolve_term_months(record: &RawRecord, fields: &FieldMap) -> i64 {
    let candidate = fields
        .term_months
        .iter()
        .find_map(|field| term_candidate(record, field));

    let parsed = match candidate {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => leading_integer(s),
        _ => None,
    };

    match parsed {
        Some(months) if months != 0 => months,
        _ => DEFAULT_TERM_MONTHS,
    }
}

/// Parses the integer prefix of `s`, so `"24 months"` yields 24.
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

fn resolve_close_date(record: &RawRecord, fields: &FieldMap) -> Option<String> {
    let raw = match present(record, fields.close_date) {
        Some(Value::String(s)) => s.as_str(),
        _ => return None,
    };

    let date = match fields.close_date_format {
        CloseDateFormat::IsoTimestamp => raw.split('T').next().unwrap_or_default(),
        CloseDateFormat::DateOnly => raw,
    };

    if date.is_empty() {
        None
    } else {
        Some(date.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, fields: Value) -> RawRecord {
        match fields {
            Value::Object(map) => RawRecord::new(id, map),
            _ => panic!("test record fields must be an object"),
        }
    }

    #[test]
    fn test_hubspot_example_deal() {
        let raw = record(
            "101",
            json!({
                "dealname": "Acme",
                "amount": "5000",
                "closedate": "2024-03-15T00:00:00Z",
                "contract_length": "24"
            }),
        );

        let deal = normalize(Provider::HubSpot, &raw).unwrap();
        assert_eq!(
            deal,
            NormalizedDeal {
                external_id: "101".to_string(),
                name: "Acme".to_string(),
                amount: 5000.0,
                close_date: "2024-03-15".to_string(),
                term_years: TermYears::Two,
                paid: false,
            }
        );
    }

    #[test]
    fn test_salesforce_example_opportunity() {
        let raw = record(
            "006A",
            json!({
                "Name": "Globex Deal",
                "Amount": 1200.5,
                "CloseDate": "2024-01-02",
                "Term_Months__c": 6
            }),
        );

        let deal = normalize(Provider::Salesforce, &raw).unwrap();
        assert_eq!(deal.external_id, "006A");
        assert_eq!(deal.amount, 1200.5);
        assert_eq!(deal.close_date, "2024-01-02");
        assert_eq!(deal.term_years, TermYears::One);
    }

    #[test]
    fn test_zero_amount_is_dropped() {
        let raw = record(
            "1",
            json!({"dealname": "Bad", "amount": "0", "closedate": "2024-01-01T00:00:00Z"}),
        );
        assert!(normalize(Provider::HubSpot, &raw).is_none());
    }

    #[test]
    fn test_negative_and_garbage_amounts_are_dropped() {
        for amount in [json!("-10"), json!(-3.5), json!("lots"), json!(null), json!("NaN")] {
            let raw = record(
                "1",
                json!({"amount": amount.clone(), "closedate": "2024-01-01T00:00:00Z"}),
            );
            assert!(normalize(Provider::HubSpot, &raw).is_none(), "amount {:?}", amount);
        }
    }

    #[test]
    fn test_missing_close_date_is_dropped() {
        let hubspot = record("1", json!({"dealname": "No date", "amount": "100"}));
        assert!(normalize(Provider::HubSpot, &hubspot).is_none());

        let salesforce = record("2", json!({"Name": "No date", "Amount": 100, "CloseDate": null}));
        assert!(normalize(Provider::Salesforce, &salesforce).is_none());

        let empty = record("3", json!({"amount": "100", "closedate": ""}));
        assert!(normalize(Provider::HubSpot, &empty).is_none());
    }

    #[test]
    fn test_default_name_and_term() {
        let raw = record("7", json!({"amount": "300", "closedate": "2024-05-01T00:00:00Z"}));
        let deal = normalize(Provider::HubSpot, &raw).unwrap();
        assert_eq!(deal.name, "Unnamed Deal");
        assert_eq!(deal.term_years, TermYears::One);

        let raw = record("8", json!({"Amount": "300", "CloseDate": "2024-05-01"}));
        let deal = normalize(Provider::Salesforce, &raw).unwrap();
        assert_eq!(deal.name, "Unnamed Opportunity");
    }

    #[test]
    fn test_term_threshold_is_inclusive_at_24() {
        for (months, expected) in [("23", TermYears::One), ("24", TermYears::Two), ("36", TermYears::Two)] {
            let raw = record(
                "1",
                json!({"amount": "1", "closedate": "2024-01-01", "term_months": months}),
            );
            assert_eq!(normalize(Provider::HubSpot, &raw).unwrap().term_years, expected);
        }
    }

    #[test]
    fn test_garbage_term_falls_back_to_twelve_months() {
        let raw = record(
            "1",
            json!({"amount": "1", "closedate": "2024-01-01", "term_months": "two years"}),
        );
        assert_eq!(resolve_term_months(&raw, Provider::HubSpot.fields()), 12);
        assert_eq!(normalize(Provider::HubSpot, &raw).unwrap().term_years, TermYears::One);
    }

    #[test]
    fn test_term_candidates_follow_priority_order() {
        let raw = record(
            "1",
            json!({
                "Amount": 10,
                "CloseDate": "2024-01-01",
                "Term_Months__c": 36,
                "Contract_Length__c": "12",
                "Contract_Term__c": null
            }),
        );
        // Contract_Term__c is null, so Contract_Length__c wins over Term_Months__c
        assert_eq!(resolve_term_months(&raw, Provider::Salesforce.fields()), 12);

        let raw = record(
            "1",
            json!({"amount": "10", "closedate": "2024-01-01", "contract_term": "6", "term_months": "24"}),
        );
        assert_eq!(resolve_term_months(&raw, Provider::HubSpot.fields()), 24);
    }

    #[test]
    fn test_term_string_parses_leading_integer() {
        assert_eq!(leading_integer("24 months"), Some(24));
        assert_eq!(leading_integer(" 36.5"), Some(36));
        assert_eq!(leading_integer("-4"), Some(-4));
        assert_eq!(leading_integer("months"), None);
    }

    #[test]
    fn test_numeric_zero_term_defers_to_next_candidate() {
        let raw = record(
            "1",
            json!({
                "Amount": 10,
                "CloseDate": "2024-01-01",
                "Contract_Term__c": 0,
                "Contract_Length__c": 24
            }),
        );
        assert_eq!(normalize(Provider::Salesforce, &raw).unwrap().term_years, TermYears::Two);

        let raw = record(
            "2",
            json!({"amount": "10", "closedate": "2024-01-01", "term_months": false, "contract_length": "36"}),
        );
        assert_eq!(resolve_term_months(&raw, Provider::HubSpot.fields()), 36);
    }

    #[test]
    fn test_string_zero_term_is_taken_then_defaults() {
        let raw = record(
            "1",
            json!({"Amount": 10, "CloseDate": "2024-01-01", "Contract_Term__c": "0", "Contract_Length__c": 24}),
        );
        assert_eq!(resolve_term_months(&raw, Provider::Salesforce.fields()), 12);
    }

    #[test]
    fn test_amount_with_trailing_text_keeps_numeric_prefix() {
        let raw = record(
            "1",
            json!({"amount": "5000.00 USD", "closedate": "2024-01-01T00:00:00Z"}),
        );
        assert_eq!(normalize(Provider::HubSpot, &raw).unwrap().amount, 5000.0);
    }

    #[test]
    fn test_amount_string_parses_leading_float() {
        assert_eq!(leading_float(" 1200.5"), Some(1200.5));
        assert_eq!(leading_float(".5"), Some(0.5));
        assert_eq!(leading_float("7."), Some(7.0));
        assert_eq!(leading_float("-3e2 units"), Some(-300.0));
        assert_eq!(leading_float("12e"), Some(12.0));
        assert_eq!(leading_float("$100"), None);
        assert_eq!(leading_float("-"), None);
        assert_eq!(leading_float("."), None);
    }

    #[test]
    fn test_fractional_numeric_term_truncates() {
        let raw = record(
            "1",
            json!({"Amount": 10, "CloseDate": "2024-01-01", "Contract_Term__c": 24.9}),
        );
        assert_eq!(resolve_term_months(&raw, Provider::Salesforce.fields()), 24);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = record(
            "42",
            json!({"dealname": "Repeat", "amount": "99.5", "closedate": "2024-02-29T12:00:00.000Z"}),
        );
        assert_eq!(normalize(Provider::HubSpot, &raw), normalize(Provider::HubSpot, &raw));
    }

    #[test]
    fn test_batch_preserves_order_and_drops_invalid() {
        let records = vec![
            record("a", json!({"amount": "30", "closedate": "2024-03-01T00:00:00Z"})),
            record("b", json!({"amount": "0", "closedate": "2024-02-01T00:00:00Z"})),
            record("c", json!({"amount": "10", "closedate": "2024-01-01T00:00:00Z"})),
        ];

        let deals = normalize_batch(Provider::HubSpot, &records);
        let ids: Vec<&str> = deals.iter().map(|d| d.external_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_serialized_shape() {
        let raw = record(
            "9",
            json!({"Name": "Shape", "Amount": "250", "CloseDate": "2024-06-30", "Contract_Term__c": "24"}),
        );
        let deal = normalize(Provider::Salesforce, &raw).unwrap();
        assert_eq!(
            serde_json::to_value(&deal).unwrap(),
            json!({
                "external_id": "9",
                "name": "Shape",
                "amount": 250.0,
                "close_date": "2024-06-30",
                "term_years": 2,
                "paid": false
            })
        );
    }
}
