//! JSONL layer for the log file.
//!
//! Each event becomes one object with `timestamp`, `level`, `service`, `pid`,
//! `target`, `message`, the event's own `fields` (credentials redacted) and
//! the enclosing `span` name.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Field names whose values never reach the log file.
const DENYLIST_KEYS: [&str; 9] = [
    "token",
    "access_token",
    "refresh_token",
    "authorization",
    "apikey",
    "cookie",
    "password",
    "secret",
    "anon_key",
];

const REDACTED: &str = "[redacted]";

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    DENYLIST_KEYS
        .iter()
        .any(|denied| key == *denied || key.ends_with(&format!("_{denied}")))
}

/// Replace the value of every credential-like key in a JSON tree.
pub fn redact_value(key: &str, value: serde_json::Value) -> serde_json::Value {
    if is_sensitive_key(key) {
        return serde_json::Value::String(REDACTED.to_string());
    }
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = redact_value(&k, v);
                    (k, v)
                })
                .collect(),
        ),
        other => other,
    }
}

/// One line of the JSONL file.
#[derive(Debug, Serialize)]
pub struct LogEntry<'a> {
    pub timestamp: String,
    pub level: &'a str,
    pub service: &'a str,
    pub pid: u32,
    pub target: &'a str,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<&'static str, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<&'a str>,
}

/// Collects the message and redacted fields of one event.
#[derive(Default)]
struct FieldVisitor {
    fields: BTreeMap<&'static str, serde_json::Value>,
    message: Option<String>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: serde_json::Value) {
        let value = redact_value(field.name(), value);
        self.fields.insert(field.name(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.insert(field, rendered.into());
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, value.into());
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON number form
        let value = serde_json::Number::from_f64(value)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| value.to_string().into());
        self.insert(field, value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string().into());
    }
}

/// Layer writing one redacted JSON object per event.
pub struct JsonLayer<W> {
    service_name: String,
    pid: u32,
    make_writer: W,
}

impl<W> JsonLayer<W> {
    pub fn new(service_name: String, make_writer: W) -> Self {
        Self {
            service_name,
            pid: std::process::id(),
            make_writer,
        }
    }
}

impl<S, W> Layer<S> for JsonLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let span = ctx.event_span(event);
        let metadata = event.metadata();
        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            level: metadata.level().as_str(),
            service: &self.service_name,
            pid: self.pid,
            target: metadata.target(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
            span: span.as_ref().map(|s| s.name()),
        };

        if let Ok(json) = serde_json::to_string(&entry) {
            let mut writer = self.make_writer.make_writer();
            let _ = writeln!(writer, "{}", json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_serialization() {
        let entry = LogEntry {
            timestamp: "2024-01-15T10:30:00.000000Z".to_string(),
            level: tracing::Level::WARN.as_str(),
            service: "oxinews-cli",
            pid: 12345,
            target: "oxinews_session::lock",
            message: "Lock timeout triggered - forcing release".to_string(),
            fields: BTreeMap::new(),
            span: None,
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"level\":\"WARN\""));
        assert!(json.contains("\"service\":\"oxinews-cli\""));
        assert!(json.contains("\"pid\":12345"));
        assert!(!json.contains("\"fields\""));
        assert!(!json.contains("\"span\""));
    }

    #[test]
    fn test_redacts_sensitive_keys() {
        let redacted = redact_value("password", serde_json::json!("hunter2"));
        assert_eq!(redacted, serde_json::json!("[redacted]"));

        let redacted = redact_value("supabase_access_token", serde_json::json!("eyJ..."));
        assert_eq!(redacted, serde_json::json!("[redacted]"));
    }

    #[test]
    fn test_redacts_nested_objects() {
        let value = serde_json::json!({
            "email": "reader@oxinews.com",
            "session": { "refresh_token": "abc", "expires_at": 1700000000 }
        });

        let redacted = redact_value("payload", value);
        assert_eq!(redacted["email"], "reader@oxinews.com");
        assert_eq!(redacted["session"]["refresh_token"], "[redacted]");
        assert_eq!(redacted["session"]["expires_at"], 1700000000);
    }

    #[test]
    fn test_leaves_ordinary_keys_alone() {
        let value = serde_json::json!("user-123");
        assert_eq!(redact_value("user_id", value.clone()), value);
        assert_eq!(redact_value("tokenizer", value.clone()), value);
    }

    #[derive(Clone, Default)]
    struct Buffer(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_layer_writes_redacted_line() {
        use tracing_subscriber::layer::SubscriberExt;

        let buffer = Buffer::default();
        let subscriber = tracing_subscriber::registry()
            .with(JsonLayer::new("oxinews-test".to_string(), buffer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("sign_in");
            let _entered = span.enter();
            tracing::info!(
                email = "reader@oxinews.com",
                password = "hunter2",
                attempt = 2u64,
                "Password sign-in accepted"
            );
        });

        let output = String::from_utf8(buffer.0.lock().clone()).unwrap();
        let line: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(line["level"], "INFO");
        assert_eq!(line["service"], "oxinews-test");
        assert_eq!(line["message"], "Password sign-in accepted");
        assert_eq!(line["span"], "sign_in");
        assert_eq!(line["fields"]["email"], "reader@oxinews.com");
        assert_eq!(line["fields"]["password"], "[redacted]");
        assert_eq!(line["fields"]["attempt"], 2);
        assert!(!output.contains("hunter2"));
    }
}
