//! Payment receipts emailed to suppliers, each with a confirmation link.

use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Invoice, Payment, PaymentBatch};
use crate::services::email::{Attachment, Mailer, OutgoingEmail};
use crate::services::storage::{content_type_for, display_name, Storage};
use crate::services::tokens::{ConfirmationSubject, ConfirmationTokens};

#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("supplier has no email")]
    NoSupplierEmail,
    #[error("payment has no voucher")]
    NoVoucher,
    #[error("could not attach the voucher: {0}")]
    Attachment(String),
    #[error("could not sign the confirmation link: {0}")]
    Signing(String),
    #[error("email not sent: {0}")]
    Delivery(String),
}

/// Format an amount with dot thousands separators and no decimals.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let digits = rounded.abs().trunc().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{}", out)
    } else {
        out
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Subject, plain body and HTML body of a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn compose_payment_receipt(
    payment: &Payment,
    invoice: &Invoice,
    confirm_url: &str,
) -> ReceiptContent {
    let subject = format!(
        "Recibo de pago – Factura {} ({})",
        invoice.invoice_number, invoice.pos_name
    );
    let amount = format_amount(payment.amount);
    let remaining = format_amount(invoice.remaining());
    let date = payment.payment_date.format("%Y-%m-%d");

    let text = format!(
        "Hola {supplier},\n\n\
         Registramos un pago a su favor.\n\n\
         Factura: {number}\n\
         Punto de venta: {pos}\n\
         Valor pagado: $ {amount}\n\
         Fecha de pago: {date}\n\
         Pagado por: {paid_by}\n\
         Saldo restante: $ {remaining}\n\n\
         Adjuntamos el comprobante. Por favor confirme la recepción aquí:\n{url}\n",
        supplier = invoice.supplier_name,
        number = invoice.invoice_number,
        pos = invoice.pos_name,
        paid_by = payment.paid_by,
        url = confirm_url,
    );

    let html = format!(
        r#"<html>
<body style="font-family: Arial, sans-serif;">
<p>Hola {supplier},</p>
<p>Registramos un pago a su favor.</p>
<table>
<tr><td>Factura</td><td><strong>{number}</strong></td></tr>
<tr><td>Punto de venta</td><td>{pos}</td></tr>
<tr><td>Valor pagado</td><td>$ {amount}</td></tr>
<tr><td>Fecha de pago</td><td>{date}</td></tr>
<tr><td>Pagado por</td><td>{paid_by}</td></tr>
<tr><td>Saldo restante</td><td>$ {remaining}</td></tr>
</table>
<p>Adjuntamos el comprobante.</p>
<p><a href="{url}">Confirmar recepción del pago</a></p>
</body>
</html>"#,
        supplier = escape_html(&invoice.supplier_name),
        number = escape_html(&invoice.invoice_number),
        pos = escape_html(&invoice.pos_name),
        paid_by = escape_html(&payment.paid_by),
        url = escape_html(confirm_url),
    );

    ReceiptContent {
        subject,
        text,
        html,
    }
}

pub fn compose_batch_receipt(
    batch: &PaymentBatch,
    payments: &[Payment],
    confirm_url: &str,
) -> ReceiptContent {
    let subject = format!(
        "Recibo de pago – Lote #{} – {}",
        batch.batch_id, batch.supplier_name
    );
    let total: Decimal = payments.iter().map(|p| p.amount).sum();
    let date = batch.payment_date.format("%Y-%m-%d");

    let lines: Vec<String> = payments
        .iter()
        .map(|p| {
            format!(
                "- Factura {} ({}): $ {}",
                p.invoice_number,
                p.pos_name,
                format_amount(p.amount)
            )
        })
        .collect();
    let rows: Vec<String> = payments
        .iter()
        .map(|p| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>$ {}</td></tr>",
                escape_html(&p.invoice_number),
                escape_html(&p.pos_name),
                format_amount(p.amount)
            )
        })
        .collect();

    let text = format!(
        "Hola {supplier},\n\n\
         Registramos el pago del lote #{id} con fecha {date}, pagado por {paid_by}.\n\n\
         Facturas incluidas:\n{lines}\n\n\
         Total: $ {total}\n\n\
         Adjuntamos el comprobante. Por favor confirme la recepción aquí:\n{url}\n",
        supplier = batch.supplier_name,
        id = batch.batch_id,
        paid_by = batch.paid_by,
        lines = lines.join("\n"),
        total = format_amount(total),
        url = confirm_url,
    );

    let html = format!(
        r#"<html>
<body style="font-family: Arial, sans-serif;">
<p>Hola {supplier},</p>
<p>Registramos el pago del lote #{id} con fecha {date}, pagado por {paid_by}.</p>
<table>
<tr><th>Factura</th><th>Punto de venta</th><th>Valor</th></tr>
{rows}
<tr><td colspan="2"><strong>Total</strong></td><td><strong>$ {total}</strong></td></tr>
</table>
<p>Adjuntamos el comprobante.</p>
<p><a href="{url}">Confirmar recepción del pago</a></p>
</body>
</html>"#,
        supplier = escape_html(&batch.supplier_name),
        id = batch.batch_id,
        paid_by = escape_html(&batch.paid_by),
        rows = rows.join("\n"),
        total = format_amount(total),
        url = escape_html(confirm_url),
    );

    ReceiptContent {
        subject,
        text,
        html,
    }
}

/// Builds receipts, attaches the stored voucher and hands them to the mailer.
#[derive(Clone)]
pub struct ReceiptService {
    mailer: Arc<dyn Mailer>,
    storage: Arc<dyn Storage>,
    tokens: ConfirmationTokens,
    base_url: String,
}

impl ReceiptService {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        storage: Arc<dyn Storage>,
        tokens: ConfirmationTokens,
        base_url: &str,
    ) -> Self {
        Self {
            mailer,
            storage,
            tokens,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn payment_confirm_url(&self, payment_id: i64) -> Result<String, ReceiptError> {
        let token = self
            .tokens
            .sign(ConfirmationSubject::Payment(payment_id))
            .map_err(|e| ReceiptError::Signing(e.to_string()))?;
        Ok(format!("{}/payments/confirm/{}", self.base_url, token))
    }

    pub fn batch_confirm_url(&self, batch_id: i64) -> Result<String, ReceiptError> {
        let token = self
            .tokens
            .sign(ConfirmationSubject::Batch(batch_id))
            .map_err(|e| ReceiptError::Signing(e.to_string()))?;
        Ok(format!("{}/payments/batch/confirm/{}", self.base_url, token))
    }

    #[tracing::instrument(skip(self, payment, invoice), fields(payment_id = payment.payment_id))]
    pub async fn send_payment_receipt(
        &self,
        payment: &Payment,
        invoice: &Invoice,
    ) -> Result<(), ReceiptError> {
        let to = recipient(&invoice.supplier_email)?;
        let voucher_key = payment
            .voucher_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ReceiptError::NoVoucher)?;

        let url = self.payment_confirm_url(payment.payment_id)?;
        let content = compose_payment_receipt(payment, invoice, &url);
        self.deliver(to, content, voucher_key).await
    }

    #[tracing::instrument(skip(self, batch, payments), fields(batch_id = batch.batch_id))]
    pub async fn send_batch_receipt(
        &self,
        batch: &PaymentBatch,
        payments: &[Payment],
    ) -> Result<(), ReceiptError> {
        let to = recipient(&batch.supplier_email)?;
        if batch.voucher_key.trim().is_empty() {
            return Err(ReceiptError::NoVoucher);
        }

        let url = self.batch_confirm_url(batch.batch_id)?;
        let content = compose_batch_receipt(batch, payments, &url);
        self.deliver(to, content, &batch.voucher_key).await
    }

    async fn deliver(
        &self,
        to: &str,
        content: ReceiptContent,
        voucher_key: &str,
    ) -> Result<(), ReceiptError> {
        let data = self
            .storage
            .download(voucher_key)
            .await
            .map_err(|e| ReceiptError::Attachment(e.to_string()))?;

        let email = OutgoingEmail {
            to: to.to_string(),
            subject: content.subject,
            text: content.text,
            html: content.html,
            attachment: Some(Attachment {
                file_name: display_name(voucher_key).to_string(),
                content_type: content_type_for(voucher_key).to_string(),
                data,
            }),
        };

        self.mailer
            .send(&email)
            .await
            .map_err(|e| ReceiptError::Delivery(e.to_string()))
    }
}

fn recipient(email: &str) -> Result<&str, ReceiptError> {
    let email = email.trim();
    if email.is_empty() {
        Err(ReceiptError::NoSupplierEmail)
    } else {
        Ok(email)
    }
}
