use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::data_types::gourmet_data_types::{
    Bill, BillingApiBill, BillingApiItem, BillingItem, GourmetMonthlyBilling,
};
use crate::errors::{ClientError, Result};

/// The billing api sends `2026-02-09T12:05:31`, sometimes with fractions or an offset.
fn parse_bill_date(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    if let Ok(date) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(date);
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Ok(date.naive_local());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|e| ClientError::parse(format!("invalid bill date '{}': {}", text, e)))
}

fn map_item(item: BillingApiItem) -> BillingItem {
    BillingItem {
        id: item.id,
        article_id: item.article_id,
        count: item.count,
        description: item.description,
        total: item.total,
        subsidy: item.subsidy,
        discount_value: item.discount_value,
        is_custom_menu: item.is_custom_menu,
    }
}

pub fn map_bill(bill: BillingApiBill) -> Result<Bill> {
    Ok(Bill {
        bill_nr: bill.bill_nr,
        bill_date: parse_bill_date(&bill.bill_date)?,
        location: bill.location,
        items: bill.billing_item_info.into_iter().map(map_item).collect(),
        billing: bill.billing,
    })
}

pub fn map_bills(bills: Vec<BillingApiBill>) -> Result<Vec<Bill>> {
    bills.into_iter().map(map_bill).collect()
}

/// Totals over all bills of one month; gross, subsidy and discount come from
/// the items, the billed total from the bills themselves.
pub fn summarize_month(year: i32, month: u32, bills: Vec<Bill>) -> GourmetMonthlyBilling {
    let items = bills.iter().flat_map(|bill| bill.items.iter());
    let (total_gross, total_subsidy, total_discount) =
        items.fold((0.0, 0.0, 0.0), |(gross, subsidy, discount), item| {
            (
                gross + item.total,
                subsidy + item.subsidy,
                discount + item.discount_value,
            )
        });

    GourmetMonthlyBilling {
        month_key: format!("{:04}-{:02}", year, month),
        total_billing: bills.iter().map(|bill| bill.billing).sum(),
        bills,
        total_gross,
        total_subsidy,
        total_discount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BILLING: &str = include_str!("../../tests/fixtures/gourmet/billing-current.json");

    fn fixture_bills() -> Vec<Bill> {
        let raw: Vec<BillingApiBill> = serde_json::from_str(BILLING).unwrap();
        map_bills(raw).unwrap()
    }

    #[test]
    fn maps_api_shape() {
        let bills = fixture_bills();
        assert_eq!(bills.len(), 2);

        let first = &bills[0];
        assert_eq!(first.bill_nr, 10001);
        assert_eq!(first.location, "Betriebsrestaurant Wien");
        assert_eq!(
            first.bill_date,
            NaiveDate::from_ymd_opt(2026, 2, 9).unwrap().and_hms_opt(12, 5, 31).unwrap()
        );
        assert_eq!(first.items.len(), 2);
        assert_eq!(
            first.items[0],
            BillingItem {
                id: "ITEM-001".into(),
                article_id: "ART-001".into(),
                count: 1,
                description: "Menü I - Wiener Schnitzel".into(),
                total: 5.5,
                subsidy: 2.5,
                discount_value: 0.0,
                is_custom_menu: false,
            }
        );
        assert_eq!(first.billing, 4.5);
    }

    #[test]
    fn bill_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2026, 2, 9).unwrap();
        for text in [
            "2026-02-09T00:00:00",
            "2026-02-09T00:00:00.000",
            "2026-02-09T00:00:00+01:00",
            "2026-02-09",
        ] {
            assert_eq!(parse_bill_date(text).unwrap().date(), expected, "{}", text);
        }
        assert!(matches!(parse_bill_date("09.02.2026"), Err(ClientError::Parse(_))));
    }

    #[test]
    fn month_summary() {
        let bills = fixture_bills();
        let billed: f64 = bills.iter().map(|b| b.billing).sum();
        let summary = summarize_month(2026, 2, bills);

        assert_eq!(summary.month_key, "2026-02");
        assert_eq!(summary.bills.len(), 2);
        assert!((summary.total_billing - billed).abs() < 1e-9);
        assert!((summary.total_billing - 7.5).abs() < 1e-9);
        assert!(summary.total_gross >= summary.total_billing);

        let empty = summarize_month(2025, 12, Vec::new());
        assert_eq!(empty.month_key, "2025-12");
        assert_eq!(empty.total_gross, 0.0);
    }
}
