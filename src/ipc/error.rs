use crate::engine::Rejected;
use crate::model::Lifecycle;
use serde_json::{json, Value};

pub fn ok(id: &str, result: Value) -> Value {
    json!({ "id": id, "ok": true, "result": result })
}

pub fn err(id: &str, code: &str, message: impl Into<String>, details: Option<Value>) -> Value {
    let mut error = json!({ "code": code, "message": message.into() });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({ "id": id, "ok": false, "error": error })
}

/// A rejected intent is not a transport error: the request was understood and
/// deliberately left the state alone.
pub fn no_op(id: &str, rejected: &Rejected, lifecycle: &Lifecycle) -> Value {
    ok(
        id,
        json!({
            "applied": false,
            "reason": rejected.code(),
            "message": rejected.to_string(),
            "lifecycle": lifecycle,
        }),
    )
}

/// Request-level failure raised inside a handler before the engine is reached.
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}
