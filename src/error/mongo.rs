use serde::{Deserialize, Serialize};

/// Structured error information extracted from MongoDB errors.
///
/// Carried by [`StoreWriteError`](super::StoreWriteError) and serialized to
/// JSON for logs and the CLI report.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) details: Option<ErrorDetails>,
}

/// Additional error details extracted from a write error's details document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) key: Option<bson::Document>,
}

impl ErrorInfo {
    /// Build error info from a plain message, for failures that do not come
    /// from the driver.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// One-line human readable summary.
    pub fn summary(&self) -> String {
        let message = self.message.as_deref().unwrap_or("unknown error");
        match (&self.name, self.code) {
            (Some(name), Some(code)) => format!("{message} ({name}, code {code})"),
            (None, Some(code)) => format!("{message} (code {code})"),
            _ => message.to_string(),
        }
    }
}

/// Extract structured information from a MongoDB error using the driver API.
///
/// Uses the driver's typed error structures directly instead of parsing the
/// rendered message.
pub fn extract_error_info(error: &mongodb::error::Error) -> ErrorInfo {
    use mongodb::error::{ErrorKind, WriteFailure};

    let mut info = ErrorInfo::default();

    match error.kind.as_ref() {
        ErrorKind::Write(write_failure) => {
            info.error_type = Some("mongo.write_error".to_string());

            match write_failure {
                WriteFailure::WriteError(write_error) => {
                    info.code = Some(write_error.code);
                    info.message = Some(write_error.message.clone());
                    info.name = get_error_name(write_error.code);
                    info.details = extract_details(&write_error.details);
                }
                WriteFailure::WriteConcernError(wc_error) => {
                    info.code = Some(wc_error.code);
                    info.message = Some(wc_error.message.clone());
                    info.name = get_error_name(wc_error.code);
                }
                _ => {}
            }
        }
        ErrorKind::Command(command_error) => {
            info.error_type = Some("mongo.command_error".to_string());
            info.code = Some(command_error.code);
            info.message = Some(command_error.message.clone());
            info.name = get_error_name(command_error.code);
        }
        ErrorKind::InsertMany(insert_error) => {
            info.error_type = Some("mongo.insert_many_error".to_string());

            if let Some(first_error) = insert_error
                .write_errors
                .as_ref()
                .and_then(|errors| errors.first())
            {
                info.code = Some(first_error.code);
                info.message = Some(first_error.message.clone());
                info.name = get_error_name(first_error.code);
                info.details = extract_details(&first_error.details);
            } else if let Some(wc_error) = &insert_error.write_concern_error {
                info.code = Some(wc_error.code);
                info.message = Some(wc_error.message.clone());
                info.name = get_error_name(wc_error.code);
            }
        }
        ErrorKind::Authentication { message, .. } => {
            info.error_type = Some("mongo.authentication_error".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::ServerSelection { message, .. } => {
            info.error_type = Some("mongo.server_selection_error".to_string());
            info.message = Some(message.clone());
        }
        _ => {
            info.message = Some(error.to_string());
        }
    }

    if matches!(info.code, Some(11000 | 11001)) {
        info.message = Some("Duplicate key error".to_string());
    }

    info
}

/// Get a human-readable error name from a MongoDB error code.
fn get_error_name(code: i32) -> Option<String> {
    let name = match code {
        11000 | 11001 => "DuplicateKey",
        13 => "Unauthorized",
        18 => "AuthenticationFailed",
        50 => "MaxTimeMSExpired",
        121 => "DocumentValidationFailure",
        10334 => "BSONObjectTooLarge",
        _ => return None,
    };

    Some(name.to_string())
}

/// Pull index and key information out of a write error's details document.
fn extract_details(error_details: &Option<bson::Document>) -> Option<ErrorDetails> {
    let doc = error_details.as_ref()?;

    let index = match doc.get("index").or_else(|| doc.get("indexName")) {
        Some(bson::Bson::String(idx)) => Some(idx.clone()),
        _ => None,
    };
    let key = match doc.get("keyValue").or_else(|| doc.get("keyPattern")) {
        Some(bson::Bson::Document(key_doc)) => Some(key_doc.clone()),
        _ => None,
    };

    if index.is_none() && key.is_none() {
        return None;
    }
    Some(ErrorDetails { index, key })
}
