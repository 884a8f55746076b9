//! The proposal field vocabulary shared by extraction, binding and reconciliation.

/// Flat keys the extraction model is allowed to return.
pub const RECOGNIZED_KEYS: &[&str] = &[
    "proposal_date",
    "client_first_name",
    "client_last_name",
    "client_company",
    "client_street_address",
    "client_city",
    "client_state",
    "client_postal_code",
    "client_salutation_name",
    "property_description",
    "auction_end_date",
    "deposit_percentage",
    "escrow_agent_name",
    "closing_date",
    "contract_date",
    "advertising_start_date",
    "marketing_facebook_cost",
    "marketing_google_cost",
    "marketing_mail_cost",
    "marketing_drone_cost",
    "marketing_sign_cost",
    "buyers_premium_percentage",
];

/// The five marketing cost keys and their default amounts.
pub const MARKETING_COST_DEFAULTS: &[(&str, f64)] = &[
    ("marketing_facebook_cost", 1000.0),
    ("marketing_google_cost", 1000.0),
    ("marketing_mail_cost", 500.0),
    ("marketing_drone_cost", 500.0),
    ("marketing_sign_cost", 250.0),
];

pub const DATE_KEYS: &[&str] = &[
    "proposal_date",
    "contract_date",
    "advertising_start_date",
    "auction_end_date",
    "closing_date",
];

pub const MARKETING_TOTAL_KEY: &str = "marketing_total_budget";
pub const RETAINER_KEY: &str = "retainer_amount";

/// Always computed at render time; never solicited from any fact source.
pub const CALCULATED_KEYS: &[&str] = &[MARKETING_TOTAL_KEY, RETAINER_KEY];

/// Retainer before marketing spend is deducted.
pub const BASE_RETAINER: f64 = 10_000.0;

pub fn is_recognized(key: &str) -> bool {
    RECOGNIZED_KEYS.contains(&key)
}

pub fn is_calculated(key: &str) -> bool {
    CALCULATED_KEYS.contains(&key)
}

pub fn is_date_key(key: &str) -> bool {
    DATE_KEYS.contains(&key)
}

pub fn is_marketing_cost_key(key: &str) -> bool {
    MARKETING_COST_DEFAULTS.iter().any(|(k, _)| *k == key)
}
