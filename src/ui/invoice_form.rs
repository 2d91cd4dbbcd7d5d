use std::path::PathBuf;

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use crossterm::event::{self, Event, KeyCode};
use tui::{
    Frame,
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, Paragraph},
};
use uuid::Uuid;

use crate::migrate::parse_source_date;
use crate::models::Invoice;
use crate::ui::components::date_input::DateInputState;
use crate::ui::components::popup::render_error;

// Represents a field in the invoice form
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum FormField {
    Client,
    InvoiceNo,
    InvoiceDate,
    ClientTrn,
    Description,
    Subtotal,
    Rebate,
    SubtotalAfterRebate,
    VatAmount,
    TotalAmount,
    SalesPerson,
    Year,
}

impl FormField {
    const ALL: [FormField; 12] = [
        FormField::Client,
        FormField::InvoiceNo,
        FormField::InvoiceDate,
        FormField::ClientTrn,
        FormField::Description,
        FormField::Subtotal,
        FormField::Rebate,
        FormField::SubtotalAfterRebate,
        FormField::VatAmount,
        FormField::TotalAmount,
        FormField::SalesPerson,
        FormField::Year,
    ];

    fn label(self) -> &'static str {
        match self {
            FormField::Client => "Client Name",
            FormField::InvoiceNo => "Invoice No.",
            FormField::InvoiceDate => "Invoice Date",
            FormField::ClientTrn => "Client TRN",
            FormField::Description => "Description",
            FormField::Subtotal => "Invoice Sub-Total",
            FormField::Rebate => "Rebate",
            FormField::SubtotalAfterRebate => "Sub-Total After Rebate",
            FormField::VatAmount => "VAT Amount",
            FormField::TotalAmount => "Total Amount",
            FormField::SalesPerson => "Sales Person",
            FormField::Year => "Year",
        }
    }

    fn is_numeric(self) -> bool {
        matches!(
            self,
            FormField::Subtotal
                | FormField::Rebate
                | FormField::SubtotalAfterRebate
                | FormField::VatAmount
                | FormField::TotalAmount
                | FormField::Year
        )
    }

    fn accepts(self, c: char) -> bool {
        !self.is_numeric() || c.is_ascii_digit() || matches!(c, '.' | '-' | ',')
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }
}

// Add/edit form state
pub struct InvoiceFormState {
    id: Option<Uuid>,
    draft: Invoice,
    date_state: DateInputState,
    current_field: FormField,
    editing: bool,
    active_input: String,
    path_prompt: Option<String>,
    saving: bool,
    show_error: Option<String>,
}

pub enum InvoiceFormAction {
    Cancel,
    Save(Invoice),
    Scan(PathBuf),
}

impl InvoiceFormState {
    /// Blank form for a new invoice, pre-numbered with `invoice_no`.
    pub fn add(today: NaiveDate, invoice_no: String) -> Self {
        let draft = Invoice {
            invoice_no,
            ..Invoice::blank(today)
        };
        Self::from_draft(None, draft, today)
    }

    /// Form pre-filled with an existing record.
    pub fn edit(invoice: Invoice, today: NaiveDate) -> Self {
        let date = parse_source_date(&invoice.invoice_date).unwrap_or(today);
        Self::from_draft(invoice.id, invoice, date)
    }

    fn from_draft(id: Option<Uuid>, draft: Invoice, date: NaiveDate) -> Self {
        Self {
            id,
            draft,
            date_state: DateInputState::new(date),
            current_field: FormField::Client,
            editing: false,
            active_input: String::new(),
            path_prompt: None,
            saving: false,
            show_error: None,
        }
    }

    pub fn is_edit(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    fn value(&self, field: FormField) -> &str {
        match field {
            FormField::Client => &self.draft.client,
            FormField::InvoiceNo => &self.draft.invoice_no,
            FormField::InvoiceDate => "",
            FormField::ClientTrn => &self.draft.client_trn,
            FormField::Description => &self.draft.description,
            FormField::Subtotal => &self.draft.subtotal,
            FormField::Rebate => &self.draft.rebate,
            FormField::SubtotalAfterRebate => &self.draft.subtotal_after_rebate,
            FormField::VatAmount => &self.draft.vat_amount,
            FormField::TotalAmount => &self.draft.total_amount,
            FormField::SalesPerson => &self.draft.sales_person,
            FormField::Year => &self.draft.year,
        }
    }

    fn value_mut(&mut self, field: FormField) -> Option<&mut String> {
        Some(match field {
            FormField::Client => &mut self.draft.client,
            FormField::InvoiceNo => &mut self.draft.invoice_no,
            FormField::InvoiceDate => return None,
            FormField::ClientTrn => &mut self.draft.client_trn,
            FormField::Description => &mut self.draft.description,
            FormField::Subtotal => &mut self.draft.subtotal,
            FormField::Rebate => &mut self.draft.rebate,
            FormField::SubtotalAfterRebate => &mut self.draft.subtotal_after_rebate,
            FormField::VatAmount => &mut self.draft.vat_amount,
            FormField::TotalAmount => &mut self.draft.total_amount,
            FormField::SalesPerson => &mut self.draft.sales_person,
            FormField::Year => &mut self.draft.year,
        })
    }

    pub fn next_field(&mut self) {
        let i = (self.current_field.index() + 1) % FormField::ALL.len();
        self.current_field = FormField::ALL[i];
    }

    pub fn previous_field(&mut self) {
        let len = FormField::ALL.len();
        let i = (self.current_field.index() + len - 1) % len;
        self.current_field = FormField::ALL[i];
    }

    pub fn start_editing(&mut self) {
        self.editing = true;
        if self.current_field == FormField::InvoiceDate {
            self.date_state.editing = false;
            self.date_state.toggle_editing();
        } else {
            self.active_input = self.value(self.current_field).to_string();
        }
    }

    /// Leave edit mode, keeping the typed value when `commit` is set.
    pub fn stop_editing(&mut self, commit: bool) {
        if commit {
            let input = std::mem::take(&mut self.active_input);
            if let Some(slot) = self.value_mut(self.current_field) {
                *slot = input;
            }
        }
        self.active_input.clear();
        self.date_state.editing = false;
        self.editing = false;
    }

    pub fn edit_current_field(&mut self, key: KeyCode) {
        if self.current_field == FormField::InvoiceDate {
            self.date_state.handle_input(key);
            return;
        }

        match key {
            KeyCode::Char(c) if self.current_field.accepts(c) => self.active_input.push(c),
            KeyCode::Backspace => {
                self.active_input.pop();
            }
            _ => {}
        }
    }

    pub fn open_path_prompt(&mut self) {
        self.path_prompt = Some(String::new());
    }

    /// Copy extracted fields into the form. Nothing is saved until the user does so.
    pub fn apply_extracted(&mut self, extracted: Invoice) {
        let Invoice {
            client,
            invoice_no,
            invoice_date,
            client_trn,
            description,
            subtotal,
            rebate,
            subtotal_after_rebate,
            vat_amount,
            total_amount,
            sales_person,
            year,
            ..
        } = extracted;

        let fields = [
            (FormField::Client, client),
            (FormField::InvoiceNo, invoice_no),
            (FormField::ClientTrn, client_trn),
            (FormField::Description, description),
            (FormField::Subtotal, subtotal),
            (FormField::Rebate, rebate),
            (FormField::SubtotalAfterRebate, subtotal_after_rebate),
            (FormField::VatAmount, vat_amount),
            (FormField::TotalAmount, total_amount),
            (FormField::SalesPerson, sales_person),
            (FormField::Year, year),
        ];
        for (field, value) in fields {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if let Some(slot) = self.value_mut(field) {
                *slot = value.to_string();
            }
        }

        match parse_source_date(&invoice_date) {
            Some(date) => self.date_state.set_date(date),
            None if invoice_date.trim().is_empty() => {}
            None => {
                self.show_error = Some(format!(
                    "Could not read the invoice date \"{}\". Please check it before saving.",
                    invoice_date
                ));
            }
        }
    }

    /// The record as it would be saved.
    pub fn to_invoice(&self) -> Invoice {
        let trimmed = |value: &str| value.trim().to_string();
        let date = self.date_state.date;
        let year = match self.draft.year.trim() {
            "" => date.year().to_string(),
            year => year.to_string(),
        };

        Invoice {
            id: self.id,
            client: trimmed(&self.draft.client),
            invoice_no: trimmed(&self.draft.invoice_no),
            invoice_date: date.format("%Y-%m-%d").to_string(),
            client_trn: trimmed(&self.draft.client_trn),
            description: trimmed(&self.draft.description),
            subtotal: trimmed(&self.draft.subtotal),
            rebate: trimmed(&self.draft.rebate),
            subtotal_after_rebate: trimmed(&self.draft.subtotal_after_rebate),
            vat_amount: trimmed(&self.draft.vat_amount),
            total_amount: trimmed(&self.draft.total_amount),
            sales_person: trimmed(&self.draft.sales_person),
            year,
        }
    }

    fn missing_required(&self) -> Vec<&'static str> {
        [FormField::Client, FormField::InvoiceNo, FormField::Description]
            .into_iter()
            .filter(|field| self.value(*field).trim().is_empty())
            .map(FormField::label)
            .collect()
    }

    /// Validate and mark the form as saving. Returns `None` while a save is
    /// already in flight or when required fields are empty.
    pub fn begin_save(&mut self) -> Option<Invoice> {
        if self.saving {
            return None;
        }

        let missing = self.missing_required();
        if !missing.is_empty() {
            self.show_error = Some(format!("Please fill in: {}", missing.join(", ")));
            return None;
        }

        self.saving = true;
        Some(self.to_invoice())
    }

    /// The save failed; keep the form open with the error shown.
    pub fn save_failed(&mut self, error: impl Into<String>) {
        self.saving = false;
        self.show_error = Some(error.into());
    }

    pub fn show_error(&mut self, error: impl Into<String>) {
        self.show_error = Some(error.into());
    }
}

pub fn render_invoice_form<B: Backend>(frame: &mut Frame<B>, state: &InvoiceFormState) {
    let size = frame.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(14),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(size);

    // Title
    let title_text = if state.is_edit() { "Edit Invoice" } else { "Add New Invoice" };
    let title = Paragraph::new(title_text)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(title, chunks[0]);

    // Fields
    let lines: Vec<Spans> = FormField::ALL
        .iter()
        .map(|&field| {
            let selected = field == state.current_field;
            let label_style = if selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };

            let value = match (field, selected && state.editing) {
                (FormField::InvoiceDate, _) => state.date_state.get_display_string(),
                (_, true) => format!("{}|", state.active_input),
                (_, false) => state.value(field).to_string(),
            };

            Spans::from(vec![
                Span::styled(format!("{:>24}: ", field.label()), label_style),
                Span::raw(value),
            ])
        })
        .collect();

    let form = Paragraph::new(lines).block(Block::default().title("Invoice").borders(Borders::ALL));
    frame.render_widget(form, chunks[1]);

    // Document path prompt
    let prompt = match &state.path_prompt {
        Some(path) => Paragraph::new(format!("Document path: {}|", path))
            .style(Style::default().fg(Color::Yellow)),
        None if state.saving => Paragraph::new("Saving...").style(Style::default().fg(Color::Cyan)),
        None => Paragraph::new("<I> Fill from a scanned invoice (image or PDF, max 20 MB)")
            .style(Style::default().fg(Color::Gray)),
    };
    frame.render_widget(prompt.block(Block::default().borders(Borders::ALL)), chunks[2]);

    // Help text
    let help_text = match (&state.path_prompt, state.editing, state.current_field) {
        (Some(_), _, _) => "Enter - Scan document | Esc - Cancel",
        (None, false, _) => "Enter - Edit field | Up/Down - Navigate fields | S - Save invoice | Esc - Cancel",
        (None, true, FormField::InvoiceDate) => "Digits - Type date part | Left/Right - Switch date part | Enter/Esc - Done",
        (None, true, _) => "Enter - Save field | Esc - Cancel editing",
    };
    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(help, chunks[3]);

    if let Some(error) = &state.show_error {
        render_error(frame, error);
    }
}

pub fn handle_input(state: &mut InvoiceFormState) -> Result<Option<InvoiceFormAction>> {
    let Event::Key(key) = event::read()? else {
        return Ok(None);
    };
    Ok(handle_key(state, key.code))
}

fn handle_key(state: &mut InvoiceFormState, key: KeyCode) -> Option<InvoiceFormAction> {
    // Any key dismisses the error popup
    if state.show_error.take().is_some() {
        return None;
    }

    if let Some(path) = state.path_prompt.as_mut() {
        match key {
            KeyCode::Esc => state.path_prompt = None,
            KeyCode::Enter => {
                let path = path.trim().to_string();
                state.path_prompt = None;
                if !path.is_empty() {
                    return Some(InvoiceFormAction::Scan(PathBuf::from(path)));
                }
            }
            KeyCode::Backspace => {
                path.pop();
            }
            KeyCode::Char(c) => path.push(c),
            _ => {}
        }
        return None;
    }

    if state.editing {
        match key {
            KeyCode::Enter => state.stop_editing(true),
            KeyCode::Esc => state.stop_editing(false),
            code => state.edit_current_field(code),
        }
        return None;
    }

    match key {
        KeyCode::Esc => return Some(InvoiceFormAction::Cancel),
        KeyCode::Enter => state.start_editing(),
        KeyCode::Up | KeyCode::BackTab => state.previous_field(),
        KeyCode::Down | KeyCode::Tab => state.next_field(),
        KeyCode::Char('i') => state.open_path_prompt(),
        KeyCode::Char('s') => return state.begin_save().map(InvoiceFormAction::Save),
        _ => {}
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 2).unwrap()
    }

    fn type_text(state: &mut InvoiceFormState, text: &str) {
        for c in text.chars() {
            handle_key(state, KeyCode::Char(c));
        }
    }

    fn fill_field(state: &mut InvoiceFormState, field: FormField, text: &str) {
        while state.current_field != field {
            handle_key(state, KeyCode::Down);
        }
        handle_key(state, KeyCode::Enter);
        for _ in 0..state.active_input.len() {
            handle_key(state, KeyCode::Backspace);
        }
        type_text(state, text);
        handle_key(state, KeyCode::Enter);
    }

    #[test]
    fn add_form_starts_numbered_and_dated_today() {
        let state = InvoiceFormState::add(today(), "24-0004".to_string());
        let invoice = state.to_invoice();
        assert_eq!(invoice.id, None);
        assert_eq!(invoice.invoice_no, "24-0004");
        assert_eq!(invoice.invoice_date, "2024-10-02");
        assert_eq!(invoice.year, "2024");
        assert_eq!(invoice.rebate, "0");
    }

    #[test]
    fn numeric_fields_drop_letters() {
        let mut state = InvoiceFormState::add(today(), "24-0001".to_string());
        fill_field(&mut state, FormField::Subtotal, "1,2a50.5x");
        assert_eq!(state.to_invoice().subtotal, "1,250.5");
    }

    #[test]
    fn escape_discards_field_edit() {
        let mut state = InvoiceFormState::add(today(), "24-0001".to_string());
        handle_key(&mut state, KeyCode::Enter);
        type_text(&mut state, "Acme");
        handle_key(&mut state, KeyCode::Esc);
        assert_eq!(state.to_invoice().client, "");
        assert!(!state.editing);
    }

    #[test]
    fn save_requires_client_number_and_description() {
        let mut state = InvoiceFormState::add(today(), String::new());
        assert!(handle_key(&mut state, KeyCode::Char('s')).is_none());
        assert_eq!(
            state.show_error.as_deref(),
            Some("Please fill in: Client Name, Invoice No., Description")
        );
    }

    #[test]
    fn second_save_is_ignored_while_first_is_in_flight() {
        let mut state = InvoiceFormState::add(today(), "24-0001".to_string());
        fill_field(&mut state, FormField::Client, "Acme Trading");
        fill_field(&mut state, FormField::Description, "Shop signage");

        let first = handle_key(&mut state, KeyCode::Char('s'));
        assert!(matches!(first, Some(InvoiceFormAction::Save(ref invoice)) if invoice.client == "Acme Trading"));
        assert!(state.is_saving());
        assert!(handle_key(&mut state, KeyCode::Char('s')).is_none());

        state.save_failed("Invoice number 24-0001 already exists");
        assert!(!state.is_saving());
        assert!(state.show_error.is_some());
    }

    #[test]
    fn edit_keeps_identity_and_parses_stored_date() {
        let id = Uuid::new_v4();
        let invoice = Invoice {
            id: Some(id),
            client: "Blue Dune".to_string(),
            invoice_no: "23-0117".to_string(),
            invoice_date: "2023-11-30 00:00:00".to_string(),
            description: "Banners".to_string(),
            year: "2023".to_string(),
            ..Invoice::default()
        };
        let state = InvoiceFormState::edit(invoice, today());
        let saved = state.to_invoice();
        assert_eq!(saved.id, Some(id));
        assert_eq!(saved.invoice_no, "23-0117");
        assert_eq!(saved.invoice_date, "2023-11-30");
    }

    #[test]
    fn extracted_fields_fill_form_without_blanking_existing_values() {
        let mut state = InvoiceFormState::add(today(), "24-0009".to_string());
        state.apply_extracted(Invoice {
            client: "Cedar Works".to_string(),
            invoice_date: "2024-09-15".to_string(),
            total_amount: "1050.00".to_string(),
            ..Invoice::default()
        });

        let invoice = state.to_invoice();
        assert_eq!(invoice.client, "Cedar Works");
        assert_eq!(invoice.invoice_no, "24-0009");
        assert_eq!(invoice.invoice_date, "2024-09-15");
        assert_eq!(invoice.total_amount, "1050.00");
        assert!(state.show_error.is_none());
    }

    #[test]
    fn unreadable_extracted_date_is_reported() {
        let mut state = InvoiceFormState::add(today(), "24-0009".to_string());
        state.apply_extracted(Invoice {
            invoice_date: "sometime in May".to_string(),
            ..Invoice::default()
        });
        assert_eq!(state.to_invoice().invoice_date, "2024-10-02");
        assert!(state.show_error.is_some());
    }

    #[test]
    fn path_prompt_emits_scan_action() {
        let mut state = InvoiceFormState::add(today(), "24-0001".to_string());
        handle_key(&mut state, KeyCode::Char('i'));
        type_text(&mut state, "scans/march.pdf");
        let action = handle_key(&mut state, KeyCode::Enter);
        assert!(matches!(action, Some(InvoiceFormAction::Scan(path)) if path == PathBuf::from("scans/march.pdf")));
        assert!(state.path_prompt.is_none());
    }
}
