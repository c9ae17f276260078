//! Aggregate rows for the pending-balance dashboard and the analytics board.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Pending balance of one supplier.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupplierBalance {
    pub supplier_id: i64,
    pub supplier_name: String,
    pub invoices: i64,
    pub total: Decimal,
}

/// A named bucket of purchases (supplier or point of sale).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NamedTotal {
    pub id: i64,
    pub name: String,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MonthlyPurchases {
    pub month: NaiveDate,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InvoiceRanking {
    pub invoice_id: i64,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub supplier_name: String,
    pub pos_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct KpiTotals {
    pub total_purchases: Decimal,
    pub invoice_count: i64,
    pub total_paid: Decimal,
    pub avg_days_to_pay: Option<f64>,
}

/// Filters of the analytics board. Dates are inclusive.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsFilter {
    pub pos_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

impl AnalyticsFilter {
    /// Build the filter from raw query values; anything unparsable falls
    /// back to the defaults (January 1st of the current year up to today).
    pub fn from_raw(
        pos: Option<&str>,
        supplier: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
        today: NaiveDate,
    ) -> Self {
        let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        Self {
            pos_id: parse_id(pos),
            supplier_id: parse_id(supplier),
            date_from: parse_date(from).unwrap_or(year_start),
            date_to: parse_date(to).unwrap_or(today),
        }
    }
}

/// Parse an id that must consist of ASCII digits only.
pub fn parse_id(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw?.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analytics_filter_defaults_to_year_to_date() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let filter = AnalyticsFilter::from_raw(None, Some("abc"), Some("2025-13-40"), None, today);

        assert_eq!(filter.pos_id, None);
        assert_eq!(filter.supplier_id, None);
        assert_eq!(filter.date_from, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(filter.date_to, today);
    }

    #[test]
    fn analytics_filter_keeps_valid_values() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let filter = AnalyticsFilter::from_raw(
            Some("3"),
            Some("12"),
            Some("2025-02-01"),
            Some("2025-02-28"),
            today,
        );

        assert_eq!(filter.pos_id, Some(3));
        assert_eq!(filter.supplier_id, Some(12));
        assert_eq!(filter.date_from, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert_eq!(filter.date_to, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
    }

    #[test]
    fn parse_id_rejects_signs_and_text() {
        assert_eq!(parse_id(Some("-4")), None);
        assert_eq!(parse_id(Some(" 42 ")), Some(42));
        assert_eq!(parse_id(Some("")), None);
    }
}
