//! Typed template bindings built from a proposal's text facts.

use std::collections::BTreeMap;

use crate::facts::value::{parse_date, parse_number, FactValue};
use crate::models::fields::{is_date_key, is_marketing_cost_key};
use crate::models::proposal::FactMap;
use crate::templates::calculated::compute_calculated_fields;

pub type Bindings = BTreeMap<String, FactValue>;

/// Types cost keys as numbers and date keys as dates. Values that don't parse
/// stay text rather than failing the render.
pub fn bind_facts(facts: &FactMap) -> Bindings {
    facts
        .iter()
        .map(|(key, raw)| (key.clone(), typed_value(key, raw)))
        .collect()
}

/// Final render bindings: typed facts with freshly computed calculated fields
/// overriding anything stored under the same names.
pub fn render_bindings(facts: &FactMap) -> Bindings {
    let mut bindings = bind_facts(facts);
    bindings.extend(compute_calculated_fields(facts));
    bindings
}

fn typed_value(key: &str, raw: &str) -> FactValue {
    if is_date_key(key) {
        if let Ok(date) = parse_date(raw) {
            return FactValue::Date(date);
        }
    } else if is_marketing_cost_key(key) {
        if let Ok(n) = parse_number(raw) {
            return FactValue::Number(n);
        }
    }
    FactValue::Text(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_bind_facts_types_known_keys() {
        let facts: FactMap = [
            ("closing_date", "2024-08-16"),
            ("contract_date", "sometime soon"),
            ("marketing_sign_cost", "$250"),
            ("client_company", "Acme Corp"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let b = bind_facts(&facts);
        assert_eq!(
            b["closing_date"],
            FactValue::Date(NaiveDate::from_ymd_opt(2024, 8, 16).unwrap())
        );
        assert_eq!(b["contract_date"], FactValue::Text("sometime soon".into()));
        assert_eq!(b["marketing_sign_cost"], FactValue::Number(250.0));
        assert_eq!(b["client_company"], FactValue::Text("Acme Corp".into()));
    }

    #[test]
    fn test_calculated_fields_override_stored_values() {
        let facts: FactMap = [
            ("retainer_amount", "99"),
            ("marketing_mail_cost", "500"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let b = render_bindings(&facts);
        assert_eq!(b["retainer_amount"], FactValue::Number(9500.0));
        assert_eq!(b["marketing_total_budget"], FactValue::Number(500.0));
    }
}
