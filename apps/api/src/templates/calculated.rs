use std::collections::BTreeMap;

use crate::facts::value::{parse_number, FactValue};
use crate::models::fields::{
    BASE_RETAINER, MARKETING_COST_DEFAULTS, MARKETING_TOTAL_KEY, RETAINER_KEY,
};
use crate::models::proposal::FactMap;

/// Derives the marketing total and retainer from the five cost facts.
///
/// Absent, unparseable and negative costs count as zero. The retainer is not
/// clamped and goes negative once marketing spend exceeds the base retainer.
pub fn compute_calculated_fields(facts: &FactMap) -> BTreeMap<String, FactValue> {
    let marketing_total: f64 = MARKETING_COST_DEFAULTS
        .iter()
        .map(|(key, _)| {
            facts
                .get(*key)
                .and_then(|raw| parse_number(raw).ok())
                .filter(|n| *n >= 0.0)
                .unwrap_or(0.0)
        })
        .sum();

    BTreeMap::from([
        (
            MARKETING_TOTAL_KEY.to_string(),
            FactValue::Number(marketing_total),
        ),
        (
            RETAINER_KEY.to_string(),
            FactValue::Number(BASE_RETAINER - marketing_total),
        ),
    ])
}

/// Default amounts for the five marketing cost keys, as fact text.
pub fn default_marketing_costs() -> FactMap {
    MARKETING_COST_DEFAULTS
        .iter()
        .map(|(key, amount)| (key.to_string(), amount.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(pairs: &[(&str, &str)]) -> FactMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_total_and_retainer() {
        let calc = compute_calculated_fields(&facts(&[
            ("marketing_facebook_cost", "1000"),
            ("marketing_google_cost", "1000"),
            ("marketing_mail_cost", "500"),
            ("marketing_drone_cost", "500"),
            ("marketing_sign_cost", "250"),
        ]));
        assert_eq!(calc[MARKETING_TOTAL_KEY], FactValue::Number(3250.0));
        assert_eq!(calc[RETAINER_KEY], FactValue::Number(6750.0));
    }

    #[test]
    fn test_missing_and_bad_costs_count_as_zero() {
        let calc = compute_calculated_fields(&facts(&[
            ("marketing_facebook_cost", "$1,500"),
            ("marketing_google_cost", "lots"),
            ("marketing_mail_cost", "-300"),
        ]));
        assert_eq!(calc[MARKETING_TOTAL_KEY], FactValue::Number(1500.0));
        assert_eq!(calc[RETAINER_KEY], FactValue::Number(8500.0));
    }

    #[test]
    fn test_retainer_goes_negative() {
        let calc = compute_calculated_fields(&facts(&[("marketing_drone_cost", "12000")]));
        assert_eq!(calc[RETAINER_KEY], FactValue::Number(-2000.0));
    }

    #[test]
    fn test_default_costs_sum_to_example_total() {
        let calc = compute_calculated_fields(&default_marketing_costs());
        assert_eq!(calc[MARKETING_TOTAL_KEY], FactValue::Number(3250.0));
    }
}
