use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// `Json` body whose rejection renders as an API error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Path` parameters whose rejection renders as an API error.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Trimmed, non-empty string or `None`.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A file part of a multipart form.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: axum::body::Bytes,
}

/// Text fields of a multipart form plus the file sent as `file_field`.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: std::collections::HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl MultipartForm {
    /// Read every part. Parts without a name are skipped; an empty file
    /// part counts as no file.
    pub async fn read(
        mut multipart: axum::extract::Multipart,
        file_field: &str,
    ) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == file_field {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                if !data.is_empty() {
                    form.file = Some(UploadedFile {
                        file_name,
                        content_type,
                        data,
                    });
                }
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// A text field, trimmed, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<String> {
        non_empty(self.fields.get(name).cloned())
    }
}
