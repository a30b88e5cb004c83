//! Email service for order, invoice and alert emails.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and plain-text
//! templates. Port 465 uses implicit TLS; any other port uses STARTTLS.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::instrument;

use crate::config::EmailConfig;
use crate::filters;
use crate::models::order::Order;

/// Port on which SMTP servers expect implicit TLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// One line item as shown in an email.
#[derive(Debug, Clone)]
struct EmailLine {
    name: String,
    quantity: i64,
    total: rust_decimal::Decimal,
}

fn email_lines(order: &Order) -> Vec<EmailLine> {
    order
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| EmailLine {
            name: item.display_name(index + 1),
            quantity: item.quantity(),
            total: item.line_total(),
        })
        .collect()
}

// =============================================================================
// Templates
// =============================================================================

/// HTML template for order confirmation (customer or admin copy).
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order: &'a Order,
    lines: &'a [EmailLine],
    admin_copy: bool,
    address: &'a str,
}

/// Plain text template for order confirmation.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order: &'a Order,
    lines: &'a [EmailLine],
    admin_copy: bool,
    address: &'a str,
}

/// HTML template for a status change.
#[derive(Template)]
#[template(path = "email/status_update.html")]
struct StatusUpdateHtml<'a> {
    order: &'a Order,
    status: &'a str,
}

/// Plain text template for a status change.
#[derive(Template)]
#[template(path = "email/status_update.txt")]
struct StatusUpdateText<'a> {
    order: &'a Order,
    status: &'a str,
}

/// HTML template for a shipped order.
#[derive(Template)]
#[template(path = "email/order_shipped.html")]
struct OrderShippedHtml<'a> {
    order: &'a Order,
    tracking_url: Option<&'a str>,
}

/// Plain text template for a shipped order.
#[derive(Template)]
#[template(path = "email/order_shipped.txt")]
struct OrderShippedText<'a> {
    order: &'a Order,
    tracking_url: Option<&'a str>,
}

/// HTML template for a delivered order.
#[derive(Template)]
#[template(path = "email/order_delivered.html")]
struct OrderDeliveredHtml<'a> {
    order: &'a Order,
}

/// Plain text template for a delivered order.
#[derive(Template)]
#[template(path = "email/order_delivered.txt")]
struct OrderDeliveredText<'a> {
    order: &'a Order,
}

/// HTML template for the invoice email.
#[derive(Template)]
#[template(path = "email/invoice.html")]
struct InvoiceEmailHtml<'a> {
    order: &'a Order,
    invoice_number: &'a str,
    attachment_kind: &'a str,
}

/// Plain text template for the invoice email.
#[derive(Template)]
#[template(path = "email/invoice.txt")]
struct InvoiceEmailText<'a> {
    order: &'a Order,
    invoice_number: &'a str,
    attachment_kind: &'a str,
}

// =============================================================================
// Service
// =============================================================================

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// The invoice document attached to an invoice email.
#[derive(Debug, Clone)]
pub enum InvoiceDocument {
    Pdf(Vec<u8>),
    /// Sent when the PDF renderer is unavailable.
    Html(String),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    admin_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let builder = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        };
        let mailer = builder
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            admin_address: config.admin_address.clone(),
        })
    }

    /// Address that receives admin copies.
    #[must_use]
    pub fn admin_address(&self) -> &str {
        &self.admin_address
    }

    /// Send the order confirmation to the customer, or its copy to the admin.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn send_order_confirmation(&self, order: &Order, admin_copy: bool) -> Result<(), EmailError> {
        let lines = email_lines(order);
        let address = order.shipping_address.one_line();
        let html = OrderConfirmationHtml { order, lines: &lines, admin_copy, address: &address }.render()?;
        let text = OrderConfirmationText { order, lines: &lines, admin_copy, address: &address }.render()?;

        let (to, subject) = if admin_copy {
            (
                self.admin_address.as_str(),
                format!("New Order {} - {}", order.order_number, order.customer_name),
            )
        } else {
            (
                order.customer_email.as_str(),
                format!("Your NEFOL order {} is confirmed", order.order_number),
            )
        };

        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Send a generic status change email to the customer.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn send_status_update(&self, order: &Order) -> Result<(), EmailError> {
        let status = order.status.as_str().replace('_', " ");
        let html = StatusUpdateHtml { order, status: &status }.render()?;
        let text = StatusUpdateText { order, status: &status }.render()?;
        let subject = format!("Update on your NEFOL order {}", order.order_number);

        self.send_multipart_email(&order.customer_email, &subject, &text, &html)
            .await
    }

    /// Tell the customer their order is on its way.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn send_order_shipped(&self, order: &Order, tracking_url: Option<&str>) -> Result<(), EmailError> {
        let html = OrderShippedHtml { order, tracking_url }.render()?;
        let text = OrderShippedText { order, tracking_url }.render()?;
        let subject = format!("Your NEFOL order {} has shipped", order.order_number);

        self.send_multipart_email(&order.customer_email, &subject, &text, &html)
            .await
    }

    /// Tell the customer their order was delivered.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn send_order_delivered(&self, order: &Order) -> Result<(), EmailError> {
        let html = OrderDeliveredHtml { order }.render()?;
        let text = OrderDeliveredText { order }.render()?;
        let subject = format!("Your NEFOL order {} was delivered", order.order_number);

        self.send_multipart_email(&order.customer_email, &subject, &text, &html)
            .await
    }

    /// Send the invoice to the customer with the document attached.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    #[instrument(skip(self, order, document), fields(order_number = %order.order_number))]
    pub async fn send_invoice(
        &self,
        order: &Order,
        invoice_number: &str,
        document: InvoiceDocument,
    ) -> Result<(), EmailError> {
        let attachment_kind = match &document {
            InvoiceDocument::Pdf(_) => "PDF",
            InvoiceDocument::Html(_) => "HTML",
        };
        let html = InvoiceEmailHtml { order, invoice_number, attachment_kind }.render()?;
        let text = InvoiceEmailText { order, invoice_number, attachment_kind }.render()?;

        let attachment = match document {
            InvoiceDocument::Pdf(bytes) => Attachment::new(format!("Invoice-{invoice_number}.pdf"))
                .body(bytes, content_type("application/pdf")),
            InvoiceDocument::Html(body) => Attachment::new(format!("Invoice-{invoice_number}.html"))
                .body(body.into_bytes(), ContentType::TEXT_HTML),
        };

        let body = MultiPart::mixed()
            .multipart(alternative(&text, &html))
            .singlepart(attachment);
        let subject = format!("Invoice {invoice_number} for your NEFOL order {}", order.order_number);

        self.send(&order.customer_email, &subject, body).await
    }

    /// Send a plain-text email (alerts and test messages).
    ///
    /// # Errors
    ///
    /// Returns error if the email fails to send.
    #[instrument(skip(self, text))]
    pub async fn send_plain(&self, to: &str, subject: &str, text: &str) -> Result<(), EmailError> {
        let email = self
            .message(to, subject)?
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(text.to_string()),
            )?;
        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        self.send(to, subject, alternative(text_body, html_body)).await
    }

    async fn send(&self, to: &str, subject: &str, body: MultiPart) -> Result<(), EmailError> {
        let email = self.message(to, subject)?.multipart(body)?;
        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }

    fn message(&self, to: &str, subject: &str) -> Result<lettre::message::MessageBuilder, EmailError> {
        Ok(Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .trim()
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject))
    }
}

fn alternative(text_body: &str, html_body: &str) -> MultiPart {
    MultiPart::alternative()
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(text_body.to_string()),
        )
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(html_body.to_string()),
        )
}

fn content_type(mime: &str) -> ContentType {
    ContentType::parse(mime).unwrap_or(ContentType::TEXT_PLAIN)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;

    use nefol_core::{OrderId, OrderStatus, PaymentStatus};

    use super::*;
    use crate::models::order::{Address, OrderItem};

    fn order() -> Order {
        Order {
            id: OrderId::new(5),
            order_number: "N-093011251005".to_string(),
            invoice_number: None,
            customer_name: "Meera <Iyer>".to_string(),
            customer_email: "meera@example.com".to_string(),
            shipping_address: Address::from_value(json!({
                "address": "4 Park Street", "city": "Kolkata", "zip": "700016", "state": "West Bengal"
            }))
            .unwrap(),
            billing_address: None,
            items: vec![
                OrderItem::from_value(json!({"name": "Vitamin C Serum", "price": 599, "qty": 2})).unwrap(),
            ],
            subtotal: Decimal::from(1198),
            shipping: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::from(1198),
            discount_code: None,
            discount_amount: Decimal::ZERO,
            coins_used: 0,
            payment_method: Some("COD".to_string()),
            payment_type: None,
            payment_status: PaymentStatus::Unpaid,
            cod: true,
            status: OrderStatus::Shipped,
            tags: vec![],
            affiliate_id: None,
            tracking_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_confirmation_templates_render() {
        let order = order();
        let lines = email_lines(&order);
        let address = order.shipping_address.one_line();
        let html = OrderConfirmationHtml { order: &order, lines: &lines, admin_copy: false, address: &address }
            .render()
            .unwrap();
        assert!(html.contains("N-093011251005"));
        assert!(html.contains("Vitamin C Serum"));
        // HTML output is escaped
        assert!(html.contains("Meera &#60;Iyer&#62;") || html.contains("Meera &lt;Iyer&gt;"));
        assert!(html.contains("₹1,198.00"));

        let text = OrderConfirmationText { order: &order, lines: &lines, admin_copy: true, address: &address }
            .render()
            .unwrap();
        assert!(text.contains("New order"));
        assert!(text.contains("meera@example.com"));
    }

    #[test]
    fn test_shipped_template_includes_tracking() {
        let order = order();
        let text = OrderShippedText { order: &order, tracking_url: Some("https://shiprocket.co/tracking/AWB9") }
            .render()
            .unwrap();
        assert!(text.contains("https://shiprocket.co/tracking/AWB9"));

        let text = OrderShippedText { order: &order, tracking_url: None }.render().unwrap();
        assert!(!text.contains("Track your package"));
    }

    #[test]
    fn test_invoice_template_mentions_attachment() {
        let order = order();
        let text = InvoiceEmailText { order: &order, invoice_number: "30112500000005", attachment_kind: "PDF" }
            .render()
            .unwrap();
        assert!(text.contains("30112500000005"));
        assert!(text.contains("PDF"));
    }

    // lettre builds its pool inside the Tokio runtime
    #[tokio::test]
    async fn test_new_picks_tls_mode_by_port() {
        let mut config = EmailConfig {
            smtp_host: "smtp.hostinger.com".to_string(),
            smtp_port: 465,
            smtp_username: "orders@thenefol.com".to_string(),
            smtp_password: secrecy::SecretString::from("pw"),
            from_address: "orders@thenefol.com".to_string(),
            admin_address: "support@thenefol.com".to_string(),
        };
        assert!(EmailService::new(&config).is_ok());
        config.smtp_port = 587;
        let service = EmailService::new(&config).unwrap();
        assert_eq!(service.admin_address(), "support@thenefol.com");
    }
}
