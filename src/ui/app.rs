use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use tracing::{error, info};
use tui::{Terminal, backend::Backend};

use crate::db::InvoiceStore;
use crate::export::{self, ExportFormat};
use crate::models::next_invoice_no;
use crate::scan::ScanClient;
use crate::ui::components::popup::render_notice;
use crate::ui::invoice_form::{
    InvoiceFormAction, InvoiceFormState, handle_input as handle_form_input, render_invoice_form,
};
use crate::ui::invoices::{
    InvoiceAction, InvoicesState, handle_input as handle_invoices_input, render_invoices,
};

// Represents the current screen in the app
enum AppScreen {
    Invoices,
    InvoiceForm,
}

// Main application state
pub struct AppState {
    store: Arc<dyn InvoiceStore>,
    scanner: ScanClient,
    export_dir: PathBuf,
    screen: AppScreen,
    invoices_state: InvoicesState,
    form_state: Option<InvoiceFormState>,
}

impl AppState {
    /// Load every invoice and open the list screen.
    pub async fn load(store: Arc<dyn InvoiceStore>, scanner: ScanClient, export_dir: PathBuf) -> Result<Self> {
        let invoices = store.fetch_all().await?;
        info!(count = invoices.len(), "invoices loaded");

        Ok(Self {
            store,
            scanner,
            export_dir,
            screen: AppScreen::Invoices,
            invoices_state: InvoicesState::new(invoices),
            form_state: None,
        })
    }

    async fn reload(&mut self) {
        match self.store.fetch_all().await {
            Ok(invoices) => self.invoices_state.replace_invoices(invoices),
            Err(err) => {
                error!(error = %err, "failed to load invoices");
                self.invoices_state.show_error(format!("Failed to load invoices: {}", err));
            }
        }
    }

    fn open_form(&mut self, form: InvoiceFormState) {
        self.form_state = Some(form);
        self.screen = AppScreen::InvoiceForm;
    }

    fn close_form(&mut self) {
        self.form_state = None;
        self.screen = AppScreen::Invoices;
    }

    fn new_form(&self) -> InvoiceFormState {
        let today = Local::now().date_naive();
        let suggested = next_invoice_no(today, self.invoices_state.all_invoices());
        InvoiceFormState::add(today, suggested)
    }
}

pub async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app_state: &mut AppState) -> Result<()> {
    loop {
        // Render current screen
        terminal.draw(|f| match app_state.screen {
            AppScreen::Invoices => render_invoices(f, &mut app_state.invoices_state),
            AppScreen::InvoiceForm => {
                if let Some(state) = &app_state.form_state {
                    render_invoice_form(f, state);
                }
            }
        })?;

        // Handle input based on current screen
        let should_quit = match app_state.screen {
            AppScreen::Invoices => handle_invoices_screen(terminal, app_state).await?,
            AppScreen::InvoiceForm => handle_form_screen(terminal, app_state).await?,
        };

        if should_quit {
            return Ok(());
        }
    }
}

async fn handle_invoices_screen<B: Backend>(terminal: &mut Terminal<B>, app_state: &mut AppState) -> Result<bool> {
    match handle_invoices_input(&mut app_state.invoices_state)? {
        Some(InvoiceAction::Quit) => return Ok(true),
        Some(InvoiceAction::NewInvoice) => {
            let form = app_state.new_form();
            app_state.open_form(form);
        }
        Some(InvoiceAction::EditInvoice(invoice)) => {
            let form = InvoiceFormState::edit(invoice, Local::now().date_naive());
            app_state.open_form(form);
        }
        Some(InvoiceAction::ScanInvoice) => {
            let mut form = app_state.new_form();
            form.open_path_prompt();
            app_state.open_form(form);
        }
        Some(InvoiceAction::Export(format)) => {
            terminal.draw(|f| {
                render_invoices(f, &mut app_state.invoices_state);
                render_notice(f, "Writing export...");
            })?;
            export_visible(app_state, format);
        }
        Some(InvoiceAction::Reload) => {
            app_state.reload().await;
            app_state.invoices_state.set_status("Invoices reloaded");
        }
        None => {}
    }

    Ok(false)
}

fn export_visible(app_state: &mut AppState, format: ExportFormat) {
    let today = Local::now().date_naive();
    let visible = app_state.invoices_state.visible_invoices();
    let result = export::export(format, &visible, &app_state.export_dir, today);

    match result {
        Ok(path) => {
            let message = format!("{} invoices exported to {}", visible.len(), path.display());
            app_state.invoices_state.set_status(message);
        }
        Err(err) => {
            error!(error = %err, "export failed");
            app_state.invoices_state.show_error(format!("Export failed: {}", err));
        }
    }
}

async fn handle_form_screen<B: Backend>(terminal: &mut Terminal<B>, app_state: &mut AppState) -> Result<bool> {
    let Some(state) = app_state.form_state.as_mut() else {
        app_state.close_form();
        return Ok(false);
    };

    match handle_form_input(state)? {
        Some(InvoiceFormAction::Cancel) => app_state.close_form(),
        Some(InvoiceFormAction::Save(invoice)) => {
            let result = match invoice.id {
                Some(id) => app_state.store.update(id, &invoice).await,
                None => app_state.store.insert(&invoice).await.map(|_| ()),
            };

            match result {
                Ok(()) => {
                    let verb = if invoice.id.is_some() { "updated" } else { "added" };
                    info!(invoice_no = %invoice.invoice_no, "invoice {}", verb);
                    app_state.close_form();
                    app_state.reload().await;
                    app_state.invoices_state.set_status(format!("Invoice {} successfully", verb));
                }
                Err(err) => {
                    // Leave the list untouched and keep the form open
                    error!(error = %err, invoice_no = %invoice.invoice_no, "failed to save invoice");
                    state.save_failed(format!("Failed to save invoice: {}", err));
                }
            }
        }
        Some(InvoiceFormAction::Scan(path)) => {
            terminal.draw(|f| {
                render_invoice_form(f, state);
                render_notice(f, "Extracting invoice data...");
            })?;
            scan_into_form(&app_state.scanner, &path, state).await;
        }
        None => {}
    }

    Ok(false)
}

async fn scan_into_form(scanner: &ScanClient, path: &Path, state: &mut InvoiceFormState) {
    match scanner.extract_file(path).await {
        Ok(extracted) => state.apply_extracted(extracted),
        Err(err) => {
            error!(error = %err, path = %path.display(), "scan failed");
            state.show_error(err.to_string());
        }
    }
}
