use axum::extract::Multipart;
use service_core::error::AppError;
use std::collections::HashMap;

/// A file received in a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Text fields and the optional `voucher` file of a payment form.
#[derive(Debug, Default)]
pub struct PaymentForm {
    fields: HashMap<String, String>,
    pub voucher: Option<UploadedFile>,
}

impl PaymentForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = PaymentForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
        })? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "voucher" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| {
                        AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e))
                    })?
                    .to_vec();
                // Browsers send an empty part when no file was picked.
                if !file_name.is_empty() || !data.is_empty() {
                    form.voucher = Some(UploadedFile { file_name, data });
                }
                continue;
            }

            let value = field.text().await.map_err(|e| {
                AppError::BadRequest(anyhow::anyhow!("Failed to read field {}: {}", name, e))
            })?;
            form.fields.insert(name, value);
        }

        Ok(form)
    }

    /// Trimmed value of a text field; blank values count as missing.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> Result<&str, AppError> {
        self.text(name)
            .ok_or_else(|| AppError::bad_request(format!("The field '{}' is required", name)))
    }

    pub fn date(&self, name: &str) -> Result<Option<chrono::NaiveDate>, AppError> {
        self.text(name)
            .map(|raw| {
                chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    AppError::bad_request(format!("The field '{}' must be a YYYY-MM-DD date", name))
                })
            })
            .transpose()
    }
}
