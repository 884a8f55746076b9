//! Default scheduling rules for the proposal's dependent dates.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Produces the default date cascade starting from `today`:
///
/// - `proposal_date`: today
/// - `contract_date`: Friday of the following week
/// - `advertising_start_date`: second Monday on/after the contract date
/// - `auction_end_date`: first Wednesday on/after advertising start + 21 days
/// - `closing_date`: auction end + 30 days, moved off weekends
pub fn compute_default_dates(today: NaiveDate) -> BTreeMap<String, NaiveDate> {
    let mut contract = next_on_or_after(today + Duration::days(1), Weekday::Fri);
    if contract.iso_week() == today.iso_week() {
        contract += Duration::days(7);
    }
    let advertising_start = next_on_or_after(contract, Weekday::Mon) + Duration::days(7);
    let auction_end = next_on_or_after(advertising_start + Duration::days(21), Weekday::Wed);
    let closing = roll_to_weekday(auction_end + Duration::days(30));

    BTreeMap::from([
        ("proposal_date".to_string(), today),
        ("contract_date".to_string(), contract),
        ("advertising_start_date".to_string(), advertising_start),
        ("auction_end_date".to_string(), auction_end),
        ("closing_date".to_string(), closing),
    ])
}

fn next_on_or_after(date: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (7 + weekday.num_days_from_monday() as i64
        - date.weekday().num_days_from_monday() as i64)
        % 7;
    date + Duration::days(ahead)
}

fn roll_to_weekday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date + Duration::days(2),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}
