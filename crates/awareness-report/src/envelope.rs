//! JSON response envelopes for the CLI.
//!
//! Success: `{"success": true, "data": …}`. Failure:
//! `{"success": false, "error": {"code", "message", "details"?}}`.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{ReportError, Result};
use crate::types::ReportView;

pub const GENERATION_FAILED: &str = "GENERATION_FAILED";

pub fn success<T: Serialize>(data: T) -> Value {
    json!({ "success": true, "data": data })
}

pub fn failure(code: &str, message: &str, details: Option<Value>) -> Value {
    let mut error = json!({ "code": code, "message": message });
    if let Some(details) = details {
        error["details"] = details;
    }
    json!({ "success": false, "error": error })
}

pub fn from_error(err: &ReportError) -> Value {
    failure(err.code(), &err.public_message(), err.details())
}

pub fn envelope<T: Serialize>(outcome: &Result<T>) -> Value {
    match outcome {
        Ok(data) => success(data),
        Err(e) => from_error(e),
    }
}

/// Like [`envelope`], except a failed report is reported as an error carrying
/// its user-safe message.
pub fn report_envelope(outcome: &Result<ReportView>) -> Value {
    match outcome {
        Ok(ReportView::Failed {
            session_id,
            message,
        }) => failure(
            GENERATION_FAILED,
            message,
            Some(json!({ "sessionId": session_id, "status": "failed" })),
        ),
        other => envelope(other),
    }
}
