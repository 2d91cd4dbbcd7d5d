//! Filtering and aggregation over the loaded invoice list.
//!
//! Everything here is pure and cheap enough to recompute after every
//! keystroke, which is what the list screen does.

use std::collections::BTreeSet;

use crate::models::{Invoice, date_part, format_amount};

/// Distinct values offered by the year / sales person / client selectors.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FilterOptions {
    pub years: Vec<String>,
    pub sales_persons: Vec<String>,
    pub clients: Vec<String>,
}

impl FilterOptions {
    pub fn from_invoices(invoices: &[Invoice]) -> Self {
        Self {
            years: distinct(invoices.iter().map(|i| i.year.as_str())),
            sales_persons: distinct(invoices.iter().map(|i| i.sales_person.as_str())),
            clients: distinct(invoices.iter().map(|i| i.client.as_str())),
        }
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Active filter state. `None` means "all".
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InvoiceFilter {
    pub search: String,
    pub year: Option<String>,
    pub sales_person: Option<String>,
    pub client: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`.
    pub date_from: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    pub date_to: Option<String>,
}

impl InvoiceFilter {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.matches_search(invoice)
            && equals(&self.year, &invoice.year)
            && equals(&self.sales_person, &invoice.sales_person)
            && equals(&self.client, &invoice.client)
            && self.matches_date_range(invoice)
    }

    pub fn apply<'a>(&self, invoices: &'a [Invoice]) -> Vec<&'a Invoice> {
        invoices.iter().filter(|i| self.matches(i)).collect()
    }

    fn matches_search(&self, invoice: &Invoice) -> bool {
        let needle = self.search.to_lowercase();
        if needle.is_empty() {
            return true;
        }

        [&invoice.client, &invoice.invoice_no, &invoice.description]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    // ISO dates order correctly as plain strings.
    fn matches_date_range(&self, invoice: &Invoice) -> bool {
        let date = invoice.date();
        let after_start = bound(&self.date_from).is_none_or(|from| date >= from);
        let before_end = bound(&self.date_to).is_none_or(|to| date <= to);
        after_start && before_end
    }
}

fn equals(selected: &Option<String>, value: &str) -> bool {
    match selected {
        Some(selected) => selected == value.trim(),
        None => true,
    }
}

fn bound(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(date_part)
        .filter(|v| !v.is_empty())
}

/// Count, sum and mean of the total amount over a filtered view.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Totals {
    pub count: usize,
    pub total: f64,
}

impl Totals {
    pub fn from_invoices(invoices: &[&Invoice]) -> Self {
        Self {
            count: invoices.len(),
            total: invoices.iter().fold(0.0, |sum, invoice| sum + invoice.total()),
        }
    }

    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / self.count as f64)
    }

    pub fn total_display(&self) -> String {
        format_amount(self.total)
    }

    pub fn average_display(&self) -> String {
        format_amount(self.average().unwrap_or(0.0))
    }
}
