use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    Frame,
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
};

use crate::export::ExportFormat;
use crate::filter::{FilterOptions, InvoiceFilter, Totals};
use crate::models::{Invoice, format_amount, parse_amount};
use crate::ui::components::popup::render_error;

/// Text filter currently receiving keystrokes
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum FilterInput {
    Search,
    DateFrom,
    DateTo,
}

// Represents the state of the invoice table screen
pub struct InvoicesState {
    invoices: Vec<Invoice>,
    filter: InvoiceFilter,
    options: FilterOptions,
    // Indices into `invoices` that pass the filter, in display order
    visible: Vec<usize>,
    table_state: TableState,
    input: Option<FilterInput>,
    status: Option<String>,
    show_error: Option<String>,
}

pub enum InvoiceAction {
    Quit,
    NewInvoice,
    EditInvoice(Invoice),
    ScanInvoice,
    Export(ExportFormat),
    Reload,
}

impl InvoicesState {
    pub fn new(invoices: Vec<Invoice>) -> Self {
        let mut state = Self {
            invoices,
            filter: InvoiceFilter::default(),
            options: FilterOptions::default(),
            visible: Vec::new(),
            table_state: TableState::default(),
            input: None,
            status: None,
            show_error: None,
        };
        state.refresh();
        state
    }

    /// Swap in a freshly fetched record set, keeping the current filters.
    pub fn replace_invoices(&mut self, invoices: Vec<Invoice>) {
        self.invoices = invoices;
        self.refresh();
    }

    // Re-derive options and the filtered view after any state change
    fn refresh(&mut self) {
        self.options = FilterOptions::from_invoices(&self.invoices);

        // A selection may point at a value that no longer exists after a reload.
        retain_option(&mut self.filter.year, &self.options.years);
        retain_option(&mut self.filter.sales_person, &self.options.sales_persons);
        retain_option(&mut self.filter.client, &self.options.clients);

        self.visible = self
            .invoices
            .iter()
            .enumerate()
            .filter(|(_, invoice)| self.filter.matches(invoice))
            .map(|(i, _)| i)
            .collect();

        let selected = match self.table_state.selected() {
            _ if self.visible.is_empty() => None,
            Some(i) if i < self.visible.len() => Some(i),
            _ => Some(0),
        };
        self.table_state.select(selected);
    }

    pub fn filter(&self) -> &InvoiceFilter {
        &self.filter
    }

    pub fn all_invoices(&self) -> &[Invoice] {
        &self.invoices
    }

    pub fn visible_invoices(&self) -> Vec<&Invoice> {
        self.visible.iter().map(|&i| &self.invoices[i]).collect()
    }

    pub fn totals(&self) -> Totals {
        Totals::from_invoices(&self.visible_invoices())
    }

    pub fn selected_invoice(&self) -> Option<&Invoice> {
        self.table_state
            .selected()
            .and_then(|i| self.visible.get(i))
            .map(|&i| &self.invoices[i])
    }

    pub fn next(&mut self) {
        if self.visible.is_empty() {
            return;
        }

        let i = match self.table_state.selected() {
            Some(i) if i + 1 < self.visible.len() => i + 1,
            _ => 0,
        };
        self.table_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        if self.visible.is_empty() {
            return;
        }

        let i = match self.table_state.selected() {
            Some(0) | None => self.visible.len() - 1,
            Some(i) => i - 1,
        };
        self.table_state.select(Some(i));
    }

    pub fn cycle_year(&mut self) {
        self.filter.year = cycle(&self.filter.year, &self.options.years);
        self.refresh();
    }

    pub fn cycle_sales_person(&mut self) {
        self.filter.sales_person = cycle(&self.filter.sales_person, &self.options.sales_persons);
        self.refresh();
    }

    pub fn cycle_client(&mut self) {
        self.filter.client = cycle(&self.filter.client, &self.options.clients);
        self.refresh();
    }

    pub fn clear_filters(&mut self) {
        self.filter = InvoiceFilter::default();
        self.refresh();
    }

    pub fn start_input(&mut self, input: FilterInput) {
        self.input = Some(input);
    }

    pub fn stop_input(&mut self) {
        self.input = None;
    }

    pub fn is_typing(&self) -> bool {
        self.input.is_some()
    }

    fn input_buffer(&mut self, input: FilterInput) -> &mut String {
        let slot = match input {
            FilterInput::Search => return &mut self.filter.search,
            FilterInput::DateFrom => &mut self.filter.date_from,
            FilterInput::DateTo => &mut self.filter.date_to,
        };
        slot.get_or_insert_with(String::new)
    }

    /// Feed one key to the active text filter; the view updates immediately.
    pub fn type_key(&mut self, key: KeyCode) {
        let Some(input) = self.input else {
            return;
        };

        match key {
            KeyCode::Char(c) if input == FilterInput::Search || c.is_ascii_digit() || c == '-' => {
                self.input_buffer(input).push(c);
            }
            KeyCode::Backspace => {
                self.input_buffer(input).pop();
            }
            _ => return,
        }

        // An emptied date bound means "no bound".
        for bound in [&mut self.filter.date_from, &mut self.filter.date_to] {
            if bound.as_deref() == Some("") {
                *bound = None;
            }
        }
        self.refresh();
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn show_error(&mut self, error: impl Into<String>) {
        self.show_error = Some(error.into());
    }
}

fn cycle(current: &Option<String>, options: &[String]) -> Option<String> {
    match current {
        None => options.first().cloned(),
        Some(value) => options
            .iter()
            .position(|option| option == value)
            .and_then(|i| options.get(i + 1))
            .cloned(),
    }
}

fn retain_option(selected: &mut Option<String>, options: &[String]) {
    if selected.as_ref().is_some_and(|value| !options.contains(value)) {
        *selected = None;
    }
}

fn label(value: &Option<String>, all: &str) -> String {
    value.clone().unwrap_or_else(|| all.to_string())
}

pub fn render_invoices<B: Backend>(frame: &mut Frame<B>, state: &mut InvoicesState) {
    let size = frame.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(size);

    // Stats
    let totals = state.totals();
    let stats = Paragraph::new(Spans::from(vec![
        Span::styled("Total Invoices: ", Style::default().fg(Color::Gray)),
        Span::styled(totals.count.to_string(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("    "),
        Span::styled("Total Amount: ", Style::default().fg(Color::Gray)),
        Span::styled(format!("AED {}", totals.total_display()), Style::default().fg(Color::Cyan)),
        Span::raw("    "),
        Span::styled("Average Invoice: ", Style::default().fg(Color::Gray)),
        Span::styled(format!("AED {}", totals.average_display()), Style::default().fg(Color::Magenta)),
    ]))
    .block(Block::default().title("Invoice Management").borders(Borders::ALL));
    frame.render_widget(stats, chunks[0]);

    // Filters
    let filter = &state.filter;
    let typing = |input: FilterInput| {
        if state.input == Some(input) {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    };
    let cursor = |input: FilterInput| if state.input == Some(input) { "|" } else { "" };

    let filters = Paragraph::new(vec![
        Spans::from(vec![
            Span::raw("Search: "),
            Span::styled(format!("{}{}", filter.search, cursor(FilterInput::Search)), typing(FilterInput::Search)),
            Span::raw("   From: "),
            Span::styled(
                format!("{}{}", label(&filter.date_from, "-"), cursor(FilterInput::DateFrom)),
                typing(FilterInput::DateFrom),
            ),
            Span::raw("   To: "),
            Span::styled(
                format!("{}{}", label(&filter.date_to, "-"), cursor(FilterInput::DateTo)),
                typing(FilterInput::DateTo),
            ),
        ]),
        Spans::from(format!(
            "Year: {}   Sales Person: {}   Client: {}",
            label(&filter.year, "All Years"),
            label(&filter.sales_person, "All Sales Persons"),
            label(&filter.client, "All Clients"),
        )),
    ])
    .block(Block::default().title("Filters").borders(Borders::ALL));
    frame.render_widget(filters, chunks[1]);

    // Table
    let header_cells = ["Invoice No.", "Date", "Client", "Description", "Sub-Total", "VAT", "Total", "Sales Person"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow)));
    let header = Row::new(header_cells).height(1).bottom_margin(1);

    let rows = state.visible.iter().map(|&i| {
        let invoice = &state.invoices[i];
        Row::new(vec![
            Cell::from(invoice.invoice_no.clone()),
            Cell::from(invoice.date().to_string()),
            Cell::from(invoice.client.clone()),
            Cell::from(invoice.description.clone()),
            Cell::from(format_amount(parse_amount(&invoice.subtotal))),
            Cell::from(format_amount(parse_amount(&invoice.vat_amount))),
            Cell::from(format_amount(parse_amount(&invoice.total_amount))),
            Cell::from(invoice.sales_person.clone()),
        ])
        .height(1)
    });

    let table = Table::new(rows)
        .header(header)
        .block(Block::default().title("Invoices").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .widths(&[
            Constraint::Percentage(10),
            Constraint::Percentage(10),
            Constraint::Percentage(17),
            Constraint::Percentage(25),
            Constraint::Percentage(9),
            Constraint::Percentage(8),
            Constraint::Percentage(9),
            Constraint::Percentage(12),
        ]);

    frame.render_stateful_widget(table, chunks[2], &mut state.table_state);

    // Help / status line
    let help = match (&state.input, &state.status) {
        (Some(_), _) => "Type to filter | Enter/Esc - Done".to_string(),
        (None, Some(status)) => status.clone(),
        (None, None) => "<N> New | <E> Edit | <I> Scan | </> Search | <F>/<T> Dates | <Y>/<S>/<C> Year/Sales/Client | <0> Clear | <X> Excel | <P> PDF | <R> Reload | <Q> Quit".to_string(),
    };
    let buttons = Paragraph::new(help)
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::White));
    frame.render_widget(buttons, chunks[3]);

    if let Some(error) = &state.show_error {
        render_error(frame, error);
    }
}

pub fn handle_input(state: &mut InvoicesState) -> Result<Option<InvoiceAction>> {
    let Event::Key(key) = event::read()? else {
        return Ok(None);
    };

    // Any key dismisses the error popup or the last status message
    if state.show_error.take().is_some() {
        return Ok(None);
    }
    state.status = None;

    if state.is_typing() {
        match key.code {
            KeyCode::Enter | KeyCode::Esc => state.stop_input(),
            code => state.type_key(code),
        }
        return Ok(None);
    }

    let action = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(InvoiceAction::Quit),
        KeyCode::Char('n') => Some(InvoiceAction::NewInvoice),
        KeyCode::Char('e') | KeyCode::Enter => state.selected_invoice().cloned().map(InvoiceAction::EditInvoice),
        KeyCode::Char('i') => Some(InvoiceAction::ScanInvoice),
        KeyCode::Char('x') => Some(InvoiceAction::Export(ExportFormat::Xlsx)),
        KeyCode::Char('p') => Some(InvoiceAction::Export(ExportFormat::Pdf)),
        KeyCode::Char('r') => Some(InvoiceAction::Reload),
        KeyCode::Char('/') => {
            state.start_input(FilterInput::Search);
            None
        }
        KeyCode::Char('f') => {
            state.start_input(FilterInput::DateFrom);
            None
        }
        KeyCode::Char('t') => {
            state.start_input(FilterInput::DateTo);
            None
        }
        KeyCode::Char('y') => {
            state.cycle_year();
            None
        }
        KeyCode::Char('s') => {
            state.cycle_sales_person();
            None
        }
        KeyCode::Char('c') => {
            state.cycle_client();
            None
        }
        KeyCode::Char('0') => {
            state.clear_filters();
            None
        }
        KeyCode::Down => {
            state.next();
            None
        }
        KeyCode::Up => {
            state.previous();
            None
        }
        _ => None,
    };

    Ok(action)
}
