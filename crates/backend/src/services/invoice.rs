//! Tax invoices: settings, line math, HTML rendering and PDF conversion.
//!
//! The invoice is rendered to HTML with Askama and printed to PDF by a
//! headless Chrome/Chromium process (`CHROME_BIN`). Page size and margins
//! come from the template's `@page` rule.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use askama::Template;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::PgPool;
use thiserror::Error;
use tokio::process::Command;
use tracing::instrument;

use nefol_core::region::HOME_STATE_CODE;
use nefol_core::{amount_in_words, state_code};

use super::sequences::{get_or_generate_invoice_number, to_ist};
use crate::db::{RepositoryError, SettingsRepository, ShipmentRepository};
use crate::filters;
use crate::models::order::{Address, Order, is_combo_order};
use crate::models::shipment::Shipment;

/// Brand printed on every invoice line.
const BRAND: &str = "NEFOL";

/// Time allowed for one PDF conversion.
const PDF_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur while producing an invoice.
#[derive(Debug, Error)]
pub enum InvoiceError {
    /// Loading settings, numbers or shipments failed.
    #[error("database error: {0}")]
    Database(#[from] RepositoryError),

    /// Template rendering failed.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    /// Writing or reading the temporary files failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The headless browser could not be started.
    #[error("PDF renderer unavailable: {0}")]
    RendererUnavailable(String),

    /// The headless browser ran but produced no PDF.
    #[error("PDF rendering failed: {0}")]
    RenderFailed(String),

    /// The headless browser did not finish in time.
    #[error("PDF rendering timed out")]
    Timeout,
}

// =============================================================================
// Settings
// =============================================================================

/// `store_settings` keys holding invoice settings.
pub mod keys {
    pub const COMPANY_DETAILS: &str = "invoice_company_details";
    pub const TAX: &str = "invoice_tax";
    pub const TERMS: &str = "invoice_terms";
    pub const SIGNATURE: &str = "invoice_signature";
    pub const CURRENCY: &str = "invoice_currency";
    pub const LOGO_URL: &str = "invoice_logo_url";
    pub const SIGNATORY_PHOTO_URL: &str = "invoice_signatory_photo_url";

    pub const ALL: &[&str] = &[
        COMPANY_DETAILS,
        TAX,
        TERMS,
        SIGNATURE,
        CURRENCY,
        LOGO_URL,
        SIGNATORY_PHOTO_URL,
    ];
}

/// Seller details printed in the invoice header and footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyDetails {
    pub company_name: String,
    pub company_address: String,
    pub company_phone: String,
    pub company_email: String,
    pub gst_number: String,
    pub pan_number: String,
    pub bank_name: String,
    pub account_number: String,
    pub ifsc_code: String,
}

impl Default for CompanyDetails {
    fn default() -> Self {
        Self {
            company_name: "Nefol".to_string(),
            company_address: String::new(),
            company_phone: "7355384939".to_string(),
            company_email: "info@nefol.com".to_string(),
            gst_number: String::new(),
            pan_number: String::new(),
            bank_name: String::new(),
            account_number: String::new(),
            ifsc_code: String::new(),
        }
    }
}

/// Default tax rate and label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxSettings {
    pub rate: Decimal,
    #[serde(rename = "type")]
    pub tax_type: String,
}

impl Default for TaxSettings {
    fn default() -> Self {
        Self {
            rate: Decimal::from(18),
            tax_type: "IGST".to_string(),
        }
    }
}

/// Everything configurable about the printed invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSettings {
    pub company_details: CompanyDetails,
    pub tax: TaxSettings,
    pub terms: String,
    pub signature: String,
    pub currency: String,
    pub logo_url: Option<String>,
    pub signatory_photo_url: Option<String>,
}

impl Default for InvoiceSettings {
    fn default() -> Self {
        Self {
            company_details: CompanyDetails::default(),
            tax: TaxSettings::default(),
            terms: "Thank you for doing business with us.".to_string(),
            signature: "Authorized Signatory".to_string(),
            currency: "₹".to_string(),
            logo_url: None,
            signatory_photo_url: None,
        }
    }
}

/// Partial update of the invoice settings. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSettingsUpdate {
    pub company_details: Option<Map<String, Value>>,
    pub tax: Option<TaxSettings>,
    pub terms: Option<String>,
    pub signature: Option<String>,
    pub currency: Option<String>,
    pub logo_url: Option<String>,
    pub signatory_photo_url: Option<String>,
}

impl InvoiceSettings {
    /// Build settings from stored `(key, value)` pairs.
    ///
    /// Missing or malformed keys fall back to defaults. Stored company details
    /// are merged over the defaults field by field. Relative image URLs are
    /// made absolute against `base_url`.
    #[must_use]
    pub fn from_stored(values: &[(String, Value)], base_url: &str) -> Self {
        let mut settings = Self::default();
        let get = |key: &str| {
            values
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| unwrap_json_string(v))
        };

        if let Some(Value::Object(stored)) = get(keys::COMPANY_DETAILS) {
            let mut merged = match serde_json::to_value(&settings.company_details) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            };
            merged.extend(stored.into_iter().filter(|(_, v)| !v.is_null()));
            if let Ok(details) = serde_json::from_value(Value::Object(merged)) {
                settings.company_details = details;
            }
        }
        if let Some(tax) = get(keys::TAX).and_then(|v| serde_json::from_value(v).ok()) {
            settings.tax = tax;
        }
        if let Some(terms) = get(keys::TERMS).and_then(non_empty_text) {
            settings.terms = terms;
        }
        if let Some(signature) = get(keys::SIGNATURE).and_then(non_empty_text) {
            settings.signature = signature;
        }
        if let Some(currency) = get(keys::CURRENCY).and_then(non_empty_text) {
            settings.currency = currency;
        }
        settings.logo_url = get(keys::LOGO_URL)
            .and_then(non_empty_text)
            .map(|url| absolutize(&url, base_url));
        settings.signatory_photo_url = get(keys::SIGNATORY_PHOTO_URL)
            .and_then(non_empty_text)
            .map(|url| absolutize(&url, base_url));

        settings
    }

    /// Load settings from `store_settings`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load(pool: &PgPool, base_url: &str) -> Result<Self, RepositoryError> {
        let values = SettingsRepository::new(pool).get_many(keys::ALL).await?;
        Ok(Self::from_stored(&values, base_url))
    }

    /// Persist the fields present in `update`.
    ///
    /// Company details are merged into what is stored rather than replaced.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a write fails.
    pub async fn save(pool: &PgPool, update: &InvoiceSettingsUpdate) -> Result<(), RepositoryError> {
        let repo = SettingsRepository::new(pool);

        if let Some(details) = &update.company_details {
            let mut stored = match repo.get(keys::COMPANY_DETAILS).await?.map(|v| unwrap_json_string(&v)) {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            stored.extend(details.clone());
            repo.set(keys::COMPANY_DETAILS, &Value::Object(stored)).await?;
        }
        if let Some(tax) = &update.tax {
            repo.set_typed(keys::TAX, tax).await?;
        }
        for (key, value) in [
            (keys::TERMS, &update.terms),
            (keys::SIGNATURE, &update.signature),
            (keys::CURRENCY, &update.currency),
            (keys::LOGO_URL, &update.logo_url),
            (keys::SIGNATORY_PHOTO_URL, &update.signatory_photo_url),
        ] {
            if let Some(value) = value {
                repo.set(key, &Value::String(value.clone())).await?;
            }
        }
        Ok(())
    }
}

/// Values saved by older clients are sometimes JSON encoded twice.
fn unwrap_json_string(value: &Value) -> Value {
    match value {
        Value::String(s) if s.trim_start().starts_with('{') => {
            serde_json::from_str(s).unwrap_or_else(|_| value.clone())
        }
        other => other.clone(),
    }
}

fn non_empty_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn absolutize(url: &str, base_url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:") {
        return url.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if url.starts_with('/') {
        format!("{base}{url}")
    } else {
        format!("{base}/{url}")
    }
}

// =============================================================================
// Invoice view model
// =============================================================================

/// One printed invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceLine {
    pub number: usize,
    pub description: String,
    pub sku: String,
    pub hsn: String,
    pub brand: &'static str,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub taxable: Decimal,
    pub tax_rate: Decimal,
    pub igst: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Everything the invoice template prints.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceView {
    pub invoice_number: String,
    pub order_number: String,
    pub invoice_date: String,
    pub order_date: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub shipping_address: String,
    pub billing_address: String,
    pub place_of_supply: String,
    pub place_of_supply_code: Option<&'static str>,
    pub intra_state: bool,
    pub is_combo: bool,
    pub payment_method: String,
    pub lines: Vec<InvoiceLine>,
    pub taxable_total: Decimal,
    pub tax_total: Decimal,
    pub igst_total: Decimal,
    pub cgst_total: Decimal,
    pub sgst_total: Decimal,
    pub discount_total: Decimal,
    pub shipping: Decimal,
    pub grand_total: Decimal,
    pub amount_in_words: String,
    pub awb_code: Option<String>,
    pub tracking_url: Option<String>,
    pub settings: InvoiceSettings,
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute the printed lines of an order.
///
/// Each line is `unit price × quantity − discount`, taxed at the item's
/// `taxRate` or else the default rate. Intra-state supplies split the tax
/// equally into CGST and SGST; inter-state supplies charge IGST.
#[must_use]
pub fn invoice_lines(order: &Order, default_rate: Decimal, intra_state: bool) -> Vec<InvoiceLine> {
    let hundred = Decimal::ONE_HUNDRED;
    order
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let quantity = item.quantity();
            let unit_price = item.unit_price();
            let discount = item.discount();
            let taxable = round2((unit_price * Decimal::from(quantity) - discount).max(Decimal::ZERO));
            let tax_rate = item.tax_rate().unwrap_or(default_rate);
            let tax = round2(taxable * tax_rate / hundred);
            let (igst, cgst, sgst) = if intra_state {
                let half = round2(tax / Decimal::TWO);
                (Decimal::ZERO, half, tax - half)
            } else {
                (tax, Decimal::ZERO, Decimal::ZERO)
            };

            InvoiceLine {
                number: index + 1,
                description: item.display_name(index + 1),
                sku: item.sku(index + 1),
                hsn: item.hsn().unwrap_or_default(),
                brand: BRAND,
                quantity,
                unit_price,
                discount,
                taxable,
                tax_rate,
                igst,
                cgst,
                sgst,
                tax,
                total: taxable + tax,
            }
        })
        .collect()
}

/// Build the invoice view for an order.
#[must_use]
pub fn build_view(
    order: &Order,
    invoice_number: &str,
    settings: InvoiceSettings,
    shipment: Option<&Shipment>,
    issued_at: DateTime<Utc>,
) -> InvoiceView {
    let state = order.shipping_address.state().unwrap_or_default();
    let place_of_supply_code = state_code(&state);
    let intra_state = place_of_supply_code == Some(HOME_STATE_CODE);

    let lines = invoice_lines(order, settings.tax.rate, intra_state);
    let sum = |f: fn(&InvoiceLine) -> Decimal| lines.iter().map(f).sum::<Decimal>();
    let taxable_total = sum(|l| l.taxable);
    let tax_total = sum(|l| l.tax);
    let igst_total = sum(|l| l.igst);
    let cgst_total = sum(|l| l.cgst);
    let sgst_total = sum(|l| l.sgst);
    let discount_total = sum(|l| l.discount) + order.discount_amount;

    let billing = order
        .billing_address
        .as_ref()
        .unwrap_or(&order.shipping_address);

    InvoiceView {
        invoice_number: invoice_number.to_string(),
        order_number: order.order_number.clone(),
        invoice_date: to_ist(issued_at).format("%d/%m/%Y").to_string(),
        order_date: to_ist(order.created_at).format("%d/%m/%Y").to_string(),
        customer_name: order.customer_name.clone(),
        customer_email: order.customer_email.clone(),
        customer_phone: order.customer_phone(),
        shipping_address: order.shipping_address.one_line(),
        billing_address: Address::one_line(billing),
        place_of_supply: state,
        place_of_supply_code,
        intra_state,
        is_combo: is_combo_order(&order.items),
        payment_method: if order.is_cod() {
            "Cash on Delivery".to_string()
        } else {
            order
                .payment_method
                .clone()
                .unwrap_or_else(|| "Prepaid".to_string())
        },
        lines,
        taxable_total,
        tax_total,
        igst_total,
        cgst_total,
        sgst_total,
        discount_total,
        shipping: order.shipping,
        grand_total: order.total,
        amount_in_words: amount_in_words(order.total),
        awb_code: shipment.and_then(|s| s.awb_code.clone()),
        tracking_url: shipment.and_then(Shipment::public_tracking_url),
        settings,
    }
}

/// Load everything needed to print an order's invoice.
///
/// Issues an invoice number when the order has none.
///
/// # Errors
///
/// Returns `InvoiceError::Database` if settings, numbering or shipments fail.
#[instrument(skip(pool, order), fields(order_id = %order.id))]
pub async fn prepare_invoice(pool: &PgPool, order: &Order, base_url: &str) -> Result<InvoiceView, InvoiceError> {
    let settings = InvoiceSettings::load(pool, base_url).await?;
    let invoice_number = get_or_generate_invoice_number(pool, order).await?;

    // A missing shipment table row only hides tracking details
    let shipment = match ShipmentRepository::new(pool).for_order(order.id).await {
        Ok(shipment) => shipment,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load shipment for invoice");
            None
        }
    };

    Ok(build_view(order, &invoice_number, settings, shipment.as_ref(), Utc::now()))
}

// =============================================================================
// Rendering
// =============================================================================

/// HTML template for the tax invoice.
#[derive(Template)]
#[template(path = "invoice.html")]
struct InvoiceTemplate<'a> {
    view: &'a InvoiceView,
}

/// Render the invoice as a standalone HTML document.
///
/// # Errors
///
/// Returns `InvoiceError::Template` if rendering fails.
pub fn render_html(view: &InvoiceView) -> Result<String, InvoiceError> {
    Ok(InvoiceTemplate { view }.render()?)
}

/// Converts HTML documents to PDF with a headless Chrome/Chromium.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    chrome_bin: String,
    timeout: Duration,
}

impl PdfRenderer {
    /// Create a renderer that launches `chrome_bin`.
    #[must_use]
    pub fn new(chrome_bin: impl Into<String>) -> Self {
        Self {
            chrome_bin: chrome_bin.into(),
            timeout: PDF_TIMEOUT,
        }
    }

    /// Browser arguments for printing `input` to `output`.
    fn args(input: &std::path::Path, output: &std::path::Path) -> Vec<String> {
        vec![
            "--headless".to_string(),
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--no-pdf-header-footer".to_string(),
            format!("--print-to-pdf={}", output.display()),
            format!("file://{}", input.display()),
        ]
    }

    /// Render `html` to PDF bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceError::RendererUnavailable` if the browser cannot be
    /// started, `InvoiceError::Timeout` if it runs too long, and
    /// `InvoiceError::RenderFailed` if it exits without producing a PDF.
    #[instrument(skip(self, html), fields(chrome_bin = %self.chrome_bin))]
    pub async fn render(&self, html: &str) -> Result<Vec<u8>, InvoiceError> {
        let stem = format!("nefol-invoice-{}", uuid::Uuid::new_v4());
        let dir = std::env::temp_dir();
        let input: PathBuf = dir.join(format!("{stem}.html"));
        let output: PathBuf = dir.join(format!("{stem}.pdf"));

        tokio::fs::write(&input, html).await?;
        let result = self.print(&input, &output).await;

        let _ = tokio::fs::remove_file(&input).await;
        let _ = tokio::fs::remove_file(&output).await;
        result
    }

    async fn print(&self, input: &std::path::Path, output: &std::path::Path) -> Result<Vec<u8>, InvoiceError> {
        let child = Command::new(&self.chrome_bin)
            .args(Self::args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| InvoiceError::RendererUnavailable(format!("{}: {e}", self.chrome_bin)))?;

        let finished = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| InvoiceError::Timeout)??;

        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            return Err(InvoiceError::RenderFailed(format!(
                "{} exited with {}: {}",
                self.chrome_bin,
                finished.status,
                stderr.lines().last().unwrap_or_default()
            )));
        }

        let pdf = tokio::fs::read(output).await.map_err(|e| {
            InvoiceError::RenderFailed(format!("no PDF written: {e}"))
        })?;
        if !pdf.starts_with(b"%PDF") {
            return Err(InvoiceError::RenderFailed("output is not a PDF".to_string()));
        }

        tracing::debug!(bytes = pdf.len(), "Rendered invoice PDF");
        Ok(pdf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use nefol_core::{OrderId, OrderStatus, PaymentStatus};

    use super::*;
    use crate::models::order::OrderItem;

    fn order(state: &str, items: Vec<Value>) -> Order {
        Order {
            id: OrderId::new(1),
            order_number: "N-093011251001".to_string(),
            invoice_number: Some("30112500000001".to_string()),
            customer_name: "Riya Sharma".to_string(),
            customer_email: "riya@example.com".to_string(),
            shipping_address: Address::from_value(json!({
                "address": "12 MG Road",
                "city": "Lucknow",
                "state": state,
                "zip": "226001",
                "phone": "9876543210"
            }))
            .unwrap(),
            billing_address: None,
            items: items.into_iter().map(|v| OrderItem::from_value(v).unwrap()).collect(),
            subtotal: Decimal::from(1000),
            shipping: Decimal::from(50),
            tax: Decimal::ZERO,
            total: Decimal::from(1230),
            discount_code: None,
            discount_amount: Decimal::ZERO,
            coins_used: 0,
            payment_method: Some("razorpay".to_string()),
            payment_type: None,
            payment_status: PaymentStatus::Paid,
            cod: false,
            status: OrderStatus::Pending,
            tags: vec![],
            affiliate_id: None,
            tracking_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_inter_state_lines_use_igst() {
        let order = order(
            "Maharashtra",
            vec![json!({"name": "Face Wash", "price": 500, "qty": 2, "discount": 100})],
        );
        let lines = invoice_lines(&order, Decimal::from(18), false);
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line.taxable, Decimal::from(900));
        assert_eq!(line.tax, Decimal::from(162));
        assert_eq!(line.igst, Decimal::from(162));
        assert_eq!(line.cgst, Decimal::ZERO);
        assert_eq!(line.total, Decimal::from(1062));
        assert_eq!(line.brand, "NEFOL");
    }

    #[test]
    fn test_intra_state_lines_split_cgst_sgst() {
        let order = order("Uttar Pradesh", vec![json!({"name": "Serum", "price": "333.33", "quantity": 1})]);
        let lines = invoice_lines(&order, Decimal::from(18), true);
        let line = &lines[0];
        assert_eq!(line.tax, dec("60.00"));
        assert_eq!(line.cgst + line.sgst, line.tax);
        assert_eq!(line.igst, Decimal::ZERO);
    }

    #[test]
    fn test_item_tax_rate_overrides_default() {
        let order = order("Delhi", vec![json!({"name": "Kit", "price": 100, "taxRate": 5})]);
        let lines = invoice_lines(&order, Decimal::from(18), false);
        assert_eq!(lines[0].tax_rate, Decimal::from(5));
        assert_eq!(lines[0].tax, Decimal::from(5));
    }

    #[test]
    fn test_build_view_detects_home_state() {
        let order = order("uttar pradesh", vec![json!({"name": "Combo Pack", "price": 1000})]);
        let view = build_view(&order, "30112500000001", InvoiceSettings::default(), None, Utc::now());
        assert!(view.intra_state);
        assert_eq!(view.place_of_supply_code, Some("09"));
        assert!(view.is_combo);
        assert_eq!(view.grand_total, Decimal::from(1230));
        assert_eq!(view.amount_in_words, "One Thousand Two Hundred Thirty only");
        assert_eq!(view.payment_method, "razorpay");
    }

    #[test]
    fn test_settings_defaults_when_nothing_stored() {
        let settings = InvoiceSettings::from_stored(&[], "https://thenefol.com");
        assert_eq!(settings, InvoiceSettings::default());
        assert_eq!(settings.company_details.company_name, "Nefol");
        assert_eq!(settings.tax.rate, Decimal::from(18));
    }

    #[test]
    fn test_settings_merge_company_details_and_absolutize_urls() {
        let stored = vec![
            (
                keys::COMPANY_DETAILS.to_string(),
                json!({"companyName": "NEFOL Pvt Ltd", "gstNumber": "09ABCDE1234F1Z5"}),
            ),
            (keys::TAX.to_string(), json!({"rate": 12, "type": "GST"})),
            (keys::LOGO_URL.to_string(), json!("/uploads/logo.png")),
            (keys::SIGNATORY_PHOTO_URL.to_string(), json!("https://cdn.example/sign.png")),
            (keys::TERMS.to_string(), json!("")),
        ];
        let settings = InvoiceSettings::from_stored(&stored, "https://thenefol.com/");
        assert_eq!(settings.company_details.company_name, "NEFOL Pvt Ltd");
        assert_eq!(settings.company_details.company_phone, "7355384939");
        assert_eq!(settings.company_details.gst_number, "09ABCDE1234F1Z5");
        assert_eq!(settings.tax.rate, Decimal::from(12));
        assert_eq!(settings.logo_url.as_deref(), Some("https://thenefol.com/uploads/logo.png"));
        assert_eq!(settings.signatory_photo_url.as_deref(), Some("https://cdn.example/sign.png"));
        assert_eq!(settings.terms, "Thank you for doing business with us.");
    }

    #[test]
    fn test_settings_accept_double_encoded_company_details() {
        let stored = vec![(
            keys::COMPANY_DETAILS.to_string(),
            json!("{\"companyEmail\":\"billing@nefol.com\"}"),
        )];
        let settings = InvoiceSettings::from_stored(&stored, "https://thenefol.com");
        assert_eq!(settings.company_details.company_email, "billing@nefol.com");
    }

    #[test]
    fn test_render_html_contains_invoice_details() {
        let order = order("Karnataka", vec![json!({"name": "Face Wash", "price": 500, "qty": 2})]);
        let view = build_view(&order, "30112500000001", InvoiceSettings::default(), None, Utc::now());
        let html = render_html(&view).unwrap();
        assert!(html.contains("30112500000001"));
        assert!(html.contains("N-093011251001"));
        assert!(html.contains("Face Wash"));
        assert!(html.contains("IGST"));
        assert!(html.contains("@page"));
    }

    #[test]
    fn test_pdf_args_print_to_output() {
        let args = PdfRenderer::args(
            std::path::Path::new("/tmp/a.html"),
            std::path::Path::new("/tmp/a.pdf"),
        );
        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--print-to-pdf=/tmp/a.pdf".to_string()));
        assert_eq!(args.last().unwrap(), "file:///tmp/a.html");
    }

    #[tokio::test]
    async fn test_missing_browser_is_unavailable() {
        let renderer = PdfRenderer::new("/nonexistent/chromium-for-tests");
        let err = renderer.render("<html></html>").await.unwrap_err();
        assert!(matches!(err, InvoiceError::RendererUnavailable(_)));
    }
}
