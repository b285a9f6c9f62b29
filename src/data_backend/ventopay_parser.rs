use regex_lite::Regex;
use scraper::{Html, Selector};
use static_init::dynamic;

use crate::data_backend::{full_text, parse_german_currency, parse_ventopay_timestamp};
use crate::data_types::ventopay_data_types::{AspNetState, Transaction};
use crate::errors::{ClientError, Result};

/// Bookings of the Gourmet canteen show up here too, they are billed there.
const GOURMET_MARKER: &str = "gourmet";

pub fn extract_aspnet_state(html: &str) -> Result<AspNetState> {
    let document = Html::parse_document(html);
    let by_id = |id: &str| -> Option<String> {
        let selector = Selector::parse(&format!("#{}", id)).ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|input| input.value().attr("value"))
            .map(str::to_string)
    };
    let required = |id: &str| {
        by_id(id)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ClientError::parse(format!("Could not find {} on page", id)))
    };

    Ok(AspNetState {
        last_focus: by_id("__LASTFOCUS").unwrap_or_default(),
        event_target: by_id("__EVENTTARGET").unwrap_or_default(),
        event_argument: by_id("__EVENTARGUMENT").unwrap_or_default(),
        view_state: required("__VIEWSTATE")?,
        view_state_generator: required("__VIEWSTATEGENERATOR")?,
        event_validation: required("__EVENTVALIDATION")?,
    })
}

/// Only logged in pages link to the logout page.
pub fn is_logged_in(html: &str) -> bool {
    html.to_lowercase().contains(r#"href="ausloggen.aspx""#)
}

/// Splits a title like `€ 1,80 (Café + Co. Automaten)` into amount and restaurant.
///
/// Titles without the parenthesised restaurant keep the whole text as restaurant.
pub fn parse_transact_title(title: &str) -> (f64, String) {
    #[dynamic]
    static RE: Regex = Regex::new(r"€\s*([\d,]+)\s*\((.+)\)").unwrap();

    let title = title.trim();
    match RE.captures(title) {
        Some(caps) => (
            parse_german_currency(caps.get(1).map_or("", |m| m.as_str())),
            caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
        ),
        None => (parse_german_currency(title), title.to_string()),
    }
}

/// Transactions on a `Transaktionen.aspx` page, minus Gourmet bookings.
pub fn parse_transactions(html: &str) -> Vec<Transaction> {
    #[dynamic]
    static TRANSACT: Selector = Selector::parse("div.transact[id]").unwrap();
    #[dynamic]
    static TITLE: Selector = Selector::parse(".transact_title").unwrap();
    #[dynamic]
    static TIMESTAMP: Selector = Selector::parse(".transact_timestamp").unwrap();

    let document = Html::parse_document(html);
    let mut transactions = Vec::new();

    for entry in document.select(&TRANSACT) {
        let Some(id) = entry.value().id().filter(|id| !id.is_empty()) else {
            continue;
        };
        let Some(title) = entry.select(&TITLE).next().map(full_text) else {
            log::warn!("transaction {} has no title, skipping", id);
            continue;
        };
        let timestamp = entry.select(&TIMESTAMP).next().map(full_text).unwrap_or_default();
        let date = match parse_ventopay_timestamp(&timestamp) {
            Ok(date) => date,
            Err(e) => {
                log::warn!("skipping transaction {}: {}", id, e);
                continue;
            }
        };

        let (amount, restaurant) = parse_transact_title(&title);
        if restaurant.to_lowercase().contains(GOURMET_MARKER) {
            continue;
        }

        transactions.push(Transaction {
            id: id.to_string(),
            date,
            amount,
            location: restaurant.clone(),
            restaurant,
        });
    }

    transactions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const LOGIN_PAGE: &str = include_str!("../../tests/fixtures/ventopay/login-page.html");
    const LOGIN_SUCCESS: &str = include_str!("../../tests/fixtures/ventopay/login-success.html");
    const LOGIN_FAILED: &str = include_str!("../../tests/fixtures/ventopay/login-failed.html");
    const TRANSACTIONS: &str = include_str!("../../tests/fixtures/ventopay/transactions.html");

    #[test]
    fn aspnet_state() {
        let state = extract_aspnet_state(LOGIN_PAGE).unwrap();
        assert_eq!(state.view_state, "VIEWSTATE-LOGIN-AAA111");
        assert_eq!(state.view_state_generator, "C2EE9ABB");
        assert_eq!(state.event_validation, "EVENTVALIDATION-LOGIN-BBB222");
        assert_eq!(state.last_focus, "");

        let names: Vec<_> = state.form_fields().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            [
                "__LASTFOCUS",
                "__EVENTTARGET",
                "__EVENTARGUMENT",
                "__VIEWSTATE",
                "__VIEWSTATEGENERATOR",
                "__EVENTVALIDATION"
            ]
        );

        // the optional fields are simply absent there
        let retry = extract_aspnet_state(LOGIN_FAILED).unwrap();
        assert_eq!(retry.view_state, "VIEWSTATE-LOGIN-RETRY");
        assert_eq!(retry.event_target, "");
    }

    #[test]
    fn aspnet_state_requires_viewstate() {
        let err = extract_aspnet_state(LOGIN_SUCCESS).unwrap_err();
        assert!(matches!(err, ClientError::Parse(_)));
        assert!(err.to_string().contains("__VIEWSTATE"));
    }

    #[test]
    fn logged_in_marker() {
        assert!(is_logged_in(LOGIN_SUCCESS));
        assert!(is_logged_in(TRANSACTIONS));
        assert!(is_logged_in(r#"<a HREF="ausloggen.aspx">x</a>"#));
        assert!(!is_logged_in(LOGIN_PAGE));
        assert!(!is_logged_in(LOGIN_FAILED));
    }

    #[test]
    fn transact_title() {
        assert_eq!(
            parse_transact_title("€ 1,80 (Café + Co. Automaten)"),
            (1.8, "Café + Co. Automaten".to_string())
        );
        assert_eq!(
            parse_transact_title("  €12,50(Kantine)  "),
            (12.5, "Kantine".to_string())
        );
        assert_eq!(parse_transact_title("Storno"), (0.0, "Storno".to_string()));
    }

    #[test]
    fn transactions_skip_gourmet() {
        let transactions = parse_transactions(TRANSACTIONS);
        assert_eq!(transactions.len(), 3);
        assert!(transactions
            .iter()
            .all(|t| !t.restaurant.to_lowercase().contains("gourmet")));

        let first = &transactions[0];
        assert_eq!(first.id, "VFgtMDAwMQ==");
        assert_eq!(first.amount, 1.8);
        assert_eq!(first.restaurant, "Café + Co. Automaten");
        assert_eq!(first.location, first.restaurant);
        assert_eq!(
            first.date,
            NaiveDate::from_ymd_opt(2026, 2, 9).unwrap().and_hms_opt(11, 49, 0).unwrap()
        );

        let last = transactions.last().unwrap();
        assert_eq!(last.amount, 0.9);
        assert_eq!(last.date.date(), NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
    }

    #[test]
    fn empty_page_has_no_transactions() {
        assert!(parse_transactions(LOGIN_SUCCESS).is_empty());
    }
}
