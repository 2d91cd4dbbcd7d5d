use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// An invoice as the UI sees it: every field is a display string.
///
/// The serde names are the column headings of the legacy JSON dump and of the
/// extraction schema, so the same type reads both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(skip)]
    pub id: Option<Uuid>,
    #[serde(rename = "CLIENT", default, deserialize_with = "lenient_string")]
    pub client: String,
    #[serde(rename = "INVOICE NO.", default, deserialize_with = "lenient_string")]
    pub invoice_no: String,
    #[serde(rename = "INVOICE DATE", default, deserialize_with = "lenient_string")]
    pub invoice_date: String,
    #[serde(rename = "CLIENT TRN", default, deserialize_with = "lenient_string")]
    pub client_trn: String,
    #[serde(rename = "DESCRIPTION", default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(rename = "INVOICE SUB-TOTAL", default, deserialize_with = "lenient_string")]
    pub subtotal: String,
    #[serde(rename = "REBATE", default, deserialize_with = "lenient_string")]
    pub rebate: String,
    #[serde(
        rename = "INVOICE SUB-TOTAL AFTER REBATE",
        default,
        deserialize_with = "lenient_string"
    )]
    pub subtotal_after_rebate: String,
    #[serde(rename = "VAT % AMOUNT", default, deserialize_with = "lenient_string")]
    pub vat_amount: String,
    #[serde(rename = "TOTAL INVOICE AMOUNT", default, deserialize_with = "lenient_string")]
    pub total_amount: String,
    #[serde(rename = "Sales Person", default, deserialize_with = "lenient_string")]
    pub sales_person: String,
    #[serde(rename = "_year", default, deserialize_with = "lenient_string")]
    pub year: String,
}

impl Invoice {
    /// Empty record for the add form, dated today.
    pub fn blank(today: NaiveDate) -> Self {
        Self {
            invoice_date: today.format("%Y-%m-%d").to_string(),
            rebate: "0".to_string(),
            year: today.year().to_string(),
            ..Self::default()
        }
    }

    pub fn total(&self) -> f64 {
        parse_amount(&self.total_amount)
    }

    /// `YYYY-MM-DD` portion of the invoice date.
    pub fn date(&self) -> &str {
        date_part(&self.invoice_date)
    }
}

/// Next free number in the `YY-NNNN` series for `today`'s year.
pub fn next_invoice_no(today: NaiveDate, existing: &[Invoice]) -> String {
    let prefix = format!("{:02}-", today.year() % 100);
    let last = existing
        .iter()
        .filter_map(|invoice| invoice.invoice_no.trim().strip_prefix(&prefix)?.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{:04}", prefix, last.saturating_add(1))
}

/// Numeric value of a display amount. Blank or unparseable input counts as zero.
pub fn parse_amount(value: &str) -> f64 {
    let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(amount) if amount.is_finite() => amount,
        _ => 0.0,
    }
}

/// Two-decimal rendering. Anything that rounds to zero prints as `0.00`, never `-0.00`.
pub fn format_amount(amount: f64) -> String {
    let cents = (amount * 100.0).round();
    if cents == 0.0 {
        return "0.00".to_string();
    }
    format!("{:.2}", amount)
}

/// Strip any time component from a date string ("2024-03-01 00:00:00", "2024-03-01T..").
pub fn date_part(value: &str) -> &str {
    value.trim().split([' ', 'T']).next().unwrap_or("")
}

// Dumps and model output mix strings, numbers and nulls for the same field.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_amount_treats_garbage_as_zero() {
        assert_eq!(parse_amount("1250.50"), 1250.5);
        assert_eq!(parse_amount(" 1,250.50 "), 1250.5);
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("n/a"), 0.0);
        assert_eq!(parse_amount("NaN"), 0.0);
    }

    #[test]
    fn format_amount_never_prints_negative_zero() {
        assert_eq!(format_amount(-0.0), "0.00");
        assert_eq!(format_amount(-0.001), "0.00");
        assert_eq!(format_amount(-12.5), "-12.50");
        assert_eq!(format_amount(1250.5), "1250.50");
    }

    #[test]
    fn date_part_drops_time_component() {
        assert_eq!(date_part("2024-03-01 00:00:00"), "2024-03-01");
        assert_eq!(date_part("2024-03-01T10:00:00Z"), "2024-03-01");
        assert_eq!(date_part("2024-03-01"), "2024-03-01");
        assert_eq!(date_part(""), "");
    }

    #[test]
    fn deserializes_dump_record_with_mixed_types() {
        let json = r#"{
            "CLIENT": "Acme Trading",
            "INVOICE NO.": "24-0001",
            "INVOICE DATE": "2024-01-15 00:00:00",
            "CLIENT TRN": null,
            "DESCRIPTION": "Signage",
            "INVOICE SUB-TOTAL": 1000,
            "REBATE": "0",
            "INVOICE SUB-TOTAL AFTER REBATE": "1000",
            "VAT % AMOUNT": 50.0,
            "TOTAL INVOICE AMOUNT": "1050",
            "Sales Person": "Mira",
            "_year": "2024"
        }"#;

        let invoice: Invoice = serde_json::from_str(json).unwrap();
        assert_eq!(invoice.client, "Acme Trading");
        assert_eq!(invoice.client_trn, "");
        assert_eq!(invoice.subtotal, "1000");
        assert_eq!(invoice.vat_amount, "50.0");
        assert_eq!(invoice.date(), "2024-01-15");
        assert_eq!(invoice.id, None);
    }

    #[test]
    fn next_invoice_no_continues_current_year_series() {
        let today = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        let numbered = |no: &str| Invoice {
            invoice_no: no.to_string(),
            ..Invoice::default()
        };

        assert_eq!(next_invoice_no(today, &[]), "24-0001");
        let existing = [numbered("24-0007"), numbered("24-0012"), numbered("23-0099"), numbered("INV-5")];
        assert_eq!(next_invoice_no(today, &existing), "24-0013");

        let huge = [numbered("24-4294967295")];
        assert_eq!(next_invoice_no(today, &huge), "24-4294967296");
        let at_limit = [numbered(&format!("24-{}", u64::MAX))];
        assert_eq!(next_invoice_no(today, &at_limit), format!("24-{}", u64::MAX));
    }

    #[test]
    fn blank_invoice_is_dated_today() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 9).unwrap();
        let invoice = Invoice::blank(today);
        assert_eq!(invoice.invoice_date, "2025-06-09");
        assert_eq!(invoice.year, "2025");
        assert_eq!(invoice.rebate, "0");
    }
}
