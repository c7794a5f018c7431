//! Output handling
//!
//! - human mode: plain text on stdout (`response: ...`, `error: ...`)
//! - agent mode: JSON Lines on stdout, each with schema version (v: 1)
//! - logs never go to stdout, see `main::setup_tracing`

use serde::Serialize;
use serde_json::{json, Value};

use crate::catalog::{Catalog, Location};
use crate::error::CliError;

const SCHEMA_VERSION: u8 = 1;

/// Event wrapper with schema version
#[derive(Serialize)]
struct Event<'a, T: Serialize> {
    v: u8,
    #[serde(rename = "type")]
    event_type: &'a str,
    payload: T,
}

fn event_line<T: Serialize>(event_type: &str, payload: T) -> String {
    let event = Event {
        v: SCHEMA_VERSION,
        event_type,
        payload,
    };
    match serde_json::to_value(&event) {
        Ok(value) => value.to_string(),
        Err(e) => json!({
            "v": SCHEMA_VERSION,
            "type": "error",
            "payload": {"code": "RENDER", "message": e.to_string()}
        })
        .to_string(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Output handler
#[derive(Debug, Clone, Copy)]
pub struct Output {
    agent_mode: bool,
}

impl Output {
    pub fn new(agent_mode: bool) -> Self {
        Self { agent_mode }
    }

    pub fn render_result(&self, op: &str, data: &Value) -> String {
        if self.agent_mode {
            event_line("result", json!({"op": op, "response": data}))
        } else {
            format!("response: {}", pretty(data))
        }
    }

    pub fn render_error(&self, err: &ErrorReport) -> String {
        if self.agent_mode {
            event_line("error", err)
        } else {
            format!("error: {}", err.message)
        }
    }

    pub fn render_help(&self, text: &str) -> String {
        if self.agent_mode {
            event_line("help", json!({"text": text}))
        } else {
            text.trim_end().to_string()
        }
    }

    /// Final API response
    pub fn result(&self, op: &str, data: &Value) {
        println!("{}", self.render_result(op, data));
    }

    /// Error output; returns the process exit code
    pub fn error(&self, err: ErrorReport) -> i32 {
        println!("{}", self.render_error(&err));
        err.exit_code()
    }

    /// Usage / help text
    pub fn help(&self, text: &str) {
        println!("{}", self.render_help(text));
    }
}

/// Error as reported to the user
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorReport {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.into(),
            op: None,
            message: message.into(),
            details: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: &str) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add details
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Every failure, whatever its origin, exits with 1.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl From<&CliError> for ErrorReport {
    fn from(err: &CliError) -> Self {
        let report = ErrorReport::new(err.code(), &err.to_string());
        match err {
            CliError::Api { status, .. } => report.with_details(json!({"status": status})),
            _ => report,
        }
    }
}

/// Machine-readable description of every command (`--manifest`)
pub fn manifest(catalog: &Catalog) -> Value {
    let actions: Vec<Value> = catalog
        .operations
        .iter()
        .map(|op| {
            let options: Vec<Value> = op
                .flags()
                .map(|(location, p)| {
                    let mut option = json!({
                        "name": p.flag,
                        "type": p.kind.as_str(),
                        "in": location.as_str(),
                        "required": p.required || location == Location::Path,
                    });
                    if let Some(default) = &p.default {
                        option["default"] = json!(default);
                    }
                    if let Some(enum_name) = &p.enum_name {
                        option["enum"] = json!(enum_name);
                        option["values"] = json!(p.values);
                    }
                    option
                })
                .collect();
            json!({
                "id": op.name,
                "summary": op.summary,
                "method": op.method.as_str(),
                "path": op.path,
                "options": options,
            })
        })
        .collect();

    json!({
        "schema_version": "1.0",
        "tool": {
            "name": "v3cli",
            "version": env!("CARGO_PKG_VERSION"),
            "description": env!("CARGO_PKG_DESCRIPTION"),
        },
        "capabilities": {
            "agent": true,
            "interactive": false,
            "streaming": false,
            "resume": false
        },
        "actions": actions,
        "env_vars": [
            "EXOSCALE_API_KEY",
            "EXOSCALE_API_SECRET",
            "EXOSCALE_ZONE",
            "EXOSCALE_API_ENDPOINT",
            "V3CLI_AGENT",
            "V3CLI_DEBUG",
            "V3CLI_CATALOG"
        ]
    })
}

pub fn print_manifest(catalog: &Catalog) {
    println!("{}", pretty(&manifest(catalog)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_mode_prefixes() {
        let out = Output::new(false);
        assert_eq!(
            out.render_result("get-zone", &json!({"name": "ch-gva-2"})),
            "response: {\n  \"name\": \"ch-gva-2\"\n}"
        );
        assert_eq!(
            out.render_error(&ErrorReport::new("API_ERROR", "not found")),
            "error: not found"
        );
    }

    #[test]
    fn agent_mode_emits_versioned_events() {
        let out = Output::new(true);
        let line = out.render_error(&ErrorReport::new("API_ERROR", "boom").with_op("get-instance"));
        let event: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(event["v"], 1);
        assert_eq!(event["type"], "error");
        assert_eq!(event["payload"]["op"], "get-instance");
        assert!(event["payload"].get("details").is_none());

        let line = out.render_result("list-zones", &json!([]));
        let event: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(event["type"], "result");
        assert_eq!(event["payload"]["op"], "list-zones");
    }

    #[test]
    fn api_errors_carry_status() {
        let err = CliError::Api {
            status: 404,
            message: "missing".into(),
        };
        let report = ErrorReport::from(&err);
        assert_eq!(report.code, "API_ERROR");
        assert_eq!(report.details, Some(json!({"status": 404})));
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn manifest_lists_every_operation() {
        let catalog = Catalog::embedded().unwrap();
        let manifest = manifest(&catalog);
        let actions = manifest["actions"].as_array().unwrap();
        assert_eq!(actions.len(), catalog.operations.len());

        let scale = actions.iter().find(|a| a["id"] == "scale-instance").unwrap();
        let id = &scale["options"][0];
        assert_eq!(id["name"], "id");
        assert_eq!(id["in"], "path");
        assert_eq!(id["required"], true);
    }
}
