use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// One registered workload: its name plus the parameters it ran with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// Snapshot of the instrumentation manifest as it stood when captured.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstrumentationSummary {
    pub detected: bool,
    pub available: bool,
    pub manifest: Option<String>,
    pub package: Option<String>,
    pub version: Option<String>,
    pub capabilities: Map<String, Value>,
    pub pro_suites: Vec<String>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

/// Structured record of one orchestration run.
///
/// Owned by the orchestrating thread; concurrent workloads report through the
/// event bus or return values rather than mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    engine: String,
    started: String,
    finished: Option<String>,
    tests: Vec<TestDescriptor>,
    notes: Vec<String>,
    instrumentation: Option<InstrumentationSummary>,
}

impl Report {
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            started: timestamp(),
            finished: None,
            tests: Vec::new(),
            notes: Vec::new(),
            instrumentation: None,
        }
    }

    /// Register a test descriptor. `params` should be a JSON object; any other
    /// value is stored under a `value` key.
    pub fn add_test(&mut self, name: impl Into<String>, params: Value) {
        let params = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        self.tests.push(TestDescriptor {
            name: name.into(),
            params,
        });
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Store the instrumentation snapshot; later manifest changes are not reflected
    pub fn capture_instrumentation(&mut self, summary: InstrumentationSummary) {
        self.instrumentation = Some(summary);
    }

    /// Stamp the completion time; a repeated call overwrites the stamp
    pub fn finish(&mut self) {
        self.finished = Some(timestamp());
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn started(&self) -> &str {
        &self.started
    }

    pub fn finished(&self) -> Option<&str> {
        self.finished.as_deref()
    }

    pub fn tests(&self) -> &[TestDescriptor] {
        &self.tests
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn instrumentation(&self) -> Option<&InstrumentationSummary> {
        self.instrumentation.as_ref()
    }

    /// Pretty JSON with fields in a fixed order
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unfinished_report_serializes_null_finish() {
        let report = Report::new("/usr/bin/engine");
        let doc: Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(doc["engine"], "/usr/bin/engine");
        assert!(doc["finished"].is_null());
        assert_eq!(doc["tests"], json!([]));
    }

    #[test]
    fn test_descriptor_params_are_flattened() {
        let mut report = Report::new("e");
        report.add_test("burst", json!({"count": 200, "movetime": 0.02}));
        report.add_test("uci_handshake", Value::Null);
        let doc: Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(doc["tests"][0], json!({"name": "burst", "count": 200, "movetime": 0.02}));
        assert_eq!(doc["tests"][1], json!({"name": "uci_handshake"}));
    }

    #[test]
    fn test_finish_overwrites_stamp() {
        let mut report = Report::new("e");
        report.finish();
        assert!(report.finished().is_some());
        report.finish();
        assert!(report.finished().is_some());
    }
}
