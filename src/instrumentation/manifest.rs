use crate::engine::CommandSink;
use crate::error::{HarnessError, Outcome};
use crate::report::{EventBus, InstrumentationSummary};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub const DEFAULT_TRACE_PREVIEW_BYTES: usize = 4096;
pub const TOKEN_OPTION: &str = "CESTT Instrumentation Token";

/// Truthiness of a manifest value: empty strings, zero, null and empty
/// containers are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Render a scalar manifest value the way it is sent on the wire
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Declared capability flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilitySet {
    flags: Map<String, Value>,
}

impl CapabilitySet {
    pub fn new(flags: Map<String, Value>) -> Self {
        Self { flags }
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).is_some_and(truthy)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.flags.get(name)
    }

    pub fn assembly_debug(&self) -> bool {
        self.flag("assembly_debug")
    }

    pub fn professional(&self) -> bool {
        self.flag("professional")
    }

    pub fn pro_tests(&self) -> bool {
        self.flag("pro_tests")
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.flags
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// One entry of the assembly symbol map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblySymbol {
    pub symbol: String,
    pub address: Option<String>,
    pub size: Option<u64>,
}

impl AssemblySymbol {
    fn from_value(value: &Value) -> Option<Self> {
        let entry = value.as_object()?;
        let symbol = entry
            .get("symbol")
            .or_else(|| entry.get("name"))
            .map(render)
            .unwrap_or_else(|| "?".to_string());
        let address = entry
            .get("address")
            .or_else(|| entry.get("offset"))
            .filter(|v| !v.is_null())
            .map(render);
        let size = entry
            .get("size")
            .or_else(|| entry.get("bytes"))
            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.trim().parse().ok()));
        Some(Self {
            symbol,
            address,
            size,
        })
    }
}

impl std::fmt::Display for AssemblySymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @ {}",
            self.symbol,
            self.address.as_deref().unwrap_or("?")
        )?;
        if let Some(size) = self.size {
            write!(f, " ({size} bytes)")?;
        }
        Ok(())
    }
}

/// Capability descriptor discovered next to an engine binary.
///
/// Everything except the warning list is fixed at construction, so a single
/// manifest can be shared between sessions running on different threads.
#[derive(Debug)]
pub struct InstrumentationManifest {
    source: Option<PathBuf>,
    detected: bool,
    capabilities: CapabilitySet,
    handshake_options: Vec<(String, Value)>,
    handshake_commands: Vec<String>,
    token: Option<String>,
    probes: BTreeMap<String, String>,
    assembly_map: Vec<AssemblySymbol>,
    pro_suites: Map<String, Value>,
    trace_pipe: Option<PathBuf>,
    trace_preview_bytes: usize,
    package: Option<String>,
    version: Option<String>,
    available: bool,
    warnings: Mutex<Vec<String>>,
    error: Option<String>,
}

impl Default for InstrumentationManifest {
    fn default() -> Self {
        Self::from_document(None, Map::new())
    }
}

impl InstrumentationManifest {
    /// Build the model from a parsed manifest document. Fields with the wrong
    /// shape are treated as absent.
    pub fn from_document(source: Option<PathBuf>, doc: Map<String, Value>) -> Self {
        let capabilities = CapabilitySet::new(
            doc.get("capabilities")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        );

        let handshake = doc.get("handshake").and_then(Value::as_object);
        let mut handshake_options: Vec<(String, Value)> = handshake
            .and_then(|h| h.get("options"))
            .and_then(Value::as_object)
            .map(|opts| opts.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        let handshake_commands: Vec<String> = handshake
            .and_then(|h| h.get("commands"))
            .and_then(Value::as_array)
            .map(|cmds| cmds.iter().map(render).collect())
            .unwrap_or_default();

        let token = handshake
            .and_then(|h| h.get("token"))
            .filter(|v| truthy(v))
            .or_else(|| doc.get("token").filter(|v| truthy(v)))
            .map(render);
        if let Some(token) = &token {
            let already_set = handshake_options
                .iter()
                .any(|(name, _)| name == "token" || name == TOKEN_OPTION);
            if !already_set {
                handshake_options.push((TOKEN_OPTION.to_string(), Value::String(token.clone())));
            }
        }

        let probes = doc
            .get("probes")
            .and_then(Value::as_object)
            .map(|probes| {
                probes
                    .iter()
                    .map(|(name, cmd)| (name.clone(), render(cmd)))
                    .collect()
            })
            .unwrap_or_default();

        let assembly_map = doc
            .get("assembly_map")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(AssemblySymbol::from_value).collect())
            .unwrap_or_default();

        let pro_suites = match doc.get("pro_tests") {
            Some(Value::Object(suites)) => suites.clone(),
            Some(Value::Array(names)) => names
                .iter()
                .map(|name| (render(name), Value::Object(Map::new())))
                .collect(),
            _ => Map::new(),
        };

        let trace_pipe = doc
            .get("trace_pipe")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let trace_preview_bytes = doc
            .get("trace_preview_bytes")
            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.trim().parse().ok()))
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_TRACE_PREVIEW_BYTES);

        let package = doc.get("package").filter(|v| !v.is_null()).map(render);
        let version = doc.get("version").filter(|v| !v.is_null()).map(render);

        let available = capabilities.assembly_debug()
            || capabilities.professional()
            || capabilities.pro_tests()
            || !pro_suites.is_empty();

        Self {
            source,
            detected: !doc.is_empty(),
            capabilities,
            handshake_options,
            handshake_commands,
            token,
            probes,
            assembly_map,
            pro_suites,
            trace_pipe,
            trace_preview_bytes,
            package,
            version,
            available,
            warnings: Mutex::new(Vec::new()),
            error: None,
        }
    }

    /// Nothing was found; `error` carries the last parse failure, if any
    pub fn not_found(error: Option<String>) -> Self {
        Self {
            error,
            ..Self::default()
        }
    }

    pub fn describe(&self) -> String {
        if !self.detected {
            return "no instrumentation".to_string();
        }
        let mut label = self
            .package
            .clone()
            .unwrap_or_else(|| "unnamed package".to_string());
        if let Some(version) = &self.version {
            label.push_str(&format!(" v{version}"));
        }
        if let Some(token) = &self.token {
            label.push_str(&format!(" (token={token})"));
        }
        label
    }

    /// Point-in-time snapshot for the report
    pub fn summary(&self) -> InstrumentationSummary {
        InstrumentationSummary {
            detected: self.detected,
            available: self.available,
            manifest: self.source.as_ref().map(|p| p.display().to_string()),
            package: self.package.clone(),
            version: self.version.clone(),
            capabilities: self.capabilities.as_map().clone(),
            pro_suites: self.suite_names(),
            warnings: self.warnings(),
            error: self.error.clone(),
        }
    }

    pub fn is_detected(&self) -> bool {
        self.detected
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn supports_assembly_debug(&self) -> bool {
        self.capabilities.assembly_debug()
    }

    pub fn supports_professional_suite(&self) -> bool {
        self.capabilities.professional() || !self.pro_suites.is_empty()
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn get_suite(&self, name: &str) -> Option<&Value> {
        self.pro_suites.get(name)
    }

    pub fn suite_names(&self) -> Vec<String> {
        self.pro_suites.keys().cloned().collect()
    }

    /// Handshake options rendered as UCI option values, in manifest order
    pub fn handshake_options(&self) -> Vec<(String, String)> {
        self.handshake_options
            .iter()
            .map(|(name, value)| (name.clone(), render(value)))
            .collect()
    }

    pub fn handshake_commands(&self) -> &[String] {
        &self.handshake_commands
    }

    pub fn probe(&self, name: &str) -> Option<&str> {
        self.probes.get(name).map(String::as_str)
    }

    pub fn probes(&self) -> &BTreeMap<String, String> {
        &self.probes
    }

    pub fn assembly_map(&self) -> &[AssemblySymbol] {
        &self.assembly_map
    }

    pub fn trace_pipe(&self) -> Option<&Path> {
        self.trace_pipe.as_deref()
    }

    pub fn trace_preview_bytes(&self) -> usize {
        self.trace_preview_bytes
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn push_warning(&self, warning: impl Into<String>) {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(warning.into());
    }

    /// Replay the handshake command sequence. Every command is attempted; a
    /// failed command becomes a warning and the rest still run. The value is
    /// the number of commands delivered.
    pub fn activate(&self, sink: &mut dyn CommandSink, bus: Option<&EventBus>) -> Outcome<usize> {
        let mut delivered = 0;
        let mut warnings = Vec::new();

        for command in &self.handshake_commands {
            match sink.send_command(command) {
                Ok(()) => {
                    delivered += 1;
                    if let Some(bus) = bus {
                        bus.log(format!("[instrumentation] → {command}"));
                    }
                }
                Err(err) => {
                    let message = HarnessError::HandshakeCommand {
                        command: command.clone(),
                        reason: err.to_string(),
                    }
                    .to_string();
                    if let Some(bus) = bus {
                        bus.log(format!("[instrumentation] {message}"));
                    }
                    self.push_warning(message.clone());
                    warnings.push(message);
                }
            }
        }

        Outcome::from_parts(delivered, warnings)
    }

    /// Tail of the trace source, decoded lossily. Problems are recorded as
    /// warnings and yield an empty preview.
    pub fn capture_trace_preview(&self) -> Outcome<String> {
        let Some(path) = self.trace_pipe.as_deref() else {
            return Outcome::Success(String::new());
        };

        let failure = |warning: String| {
            self.push_warning(warning.clone());
            Outcome::Recovered {
                value: String::new(),
                warnings: vec![warning],
            }
        };

        if !path.is_file() {
            return failure(format!("trace pipe '{}' not found", path.display()));
        }
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(err) => return failure(format!("trace read failed: {err}")),
        };
        if data.is_empty() {
            return failure(format!("trace pipe '{}' is empty", path.display()));
        }

        let start = data.len().saturating_sub(self.trace_preview_bytes);
        Outcome::Success(String::from_utf8_lossy(&data[start..]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use serde_json::json;

    fn manifest(doc: Value) -> InstrumentationManifest {
        match doc {
            Value::Object(map) => InstrumentationManifest::from_document(None, map),
            _ => panic!("test manifest must be an object"),
        }
    }

    struct RecordingSink {
        sent: Vec<String>,
        fail_on: &'static str,
    }

    impl CommandSink for RecordingSink {
        fn send_command(&mut self, line: &str) -> Result<()> {
            if line == self.fail_on {
                return Err(HarnessError::ProtocolViolation("pipe closed".to_string()));
            }
            self.sent.push(line.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(InstrumentationManifest::default().describe(), "no instrumentation");
        let m = manifest(json!({"package": "hooks", "version": 2, "token": "abc"}));
        assert_eq!(m.describe(), "hooks v2 (token=abc)");
        let m = manifest(json!({"capabilities": {}}));
        assert_eq!(m.describe(), "unnamed package");
    }

    #[test]
    fn test_token_becomes_handshake_option() {
        let m = manifest(json!({
            "handshake": {"options": {"Debug Log": true}, "token": "T-1"}
        }));
        assert_eq!(
            m.handshake_options(),
            vec![
                ("Debug Log".to_string(), "true".to_string()),
                (TOKEN_OPTION.to_string(), "T-1".to_string()),
            ]
        );
    }

    #[test]
    fn test_pro_tests_list_becomes_suites() {
        let m = manifest(json!({"pro_tests": ["tactical", "stability"]}));
        assert_eq!(m.suite_names(), vec!["tactical", "stability"]);
        assert_eq!(m.get_suite("tactical"), Some(&json!({})));
        assert!(m.supports_professional_suite());
        assert!(!m.supports_assembly_debug());
    }

    #[test]
    fn test_assembly_map_alternate_keys() {
        let m = manifest(json!({
            "assembly_map": [
                {"symbol": "search", "address": "0x4010", "size": 128},
                {"name": "eval", "offset": 4096, "bytes": "64"},
                "not an entry"
            ]
        }));
        let map = m.assembly_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map[0].to_string(), "search @ 0x4010 (128 bytes)");
        assert_eq!(map[1].symbol, "eval");
        assert_eq!(map[1].address.as_deref(), Some("4096"));
        assert_eq!(map[1].size, Some(64));
    }

    #[test]
    fn test_activate_continues_after_failure() {
        let m = manifest(json!({
            "handshake": {"commands": ["debug on", "asm hook", "trace start"]}
        }));
        let mut sink = RecordingSink {
            sent: Vec::new(),
            fail_on: "asm hook",
        };
        let bus = EventBus::with_sink(|_| {});
        let outcome = m.activate(&mut sink, Some(&bus));

        assert_eq!(sink.sent, vec!["debug on", "trace start"]);
        assert_eq!(outcome.value(), Some(&2));
        assert_eq!(outcome.warnings().len(), 1);
        assert!(outcome.warnings()[0].starts_with("handshake command 'asm hook' failed"));
        assert_eq!(m.warnings().len(), 1);
        assert_eq!(bus.len(), 3);
    }

    #[test]
    fn test_trace_preview_without_source() {
        let m = manifest(json!({"package": "hooks"}));
        let outcome = m.capture_trace_preview();
        assert!(outcome.is_success());
        assert_eq!(outcome.value().map(String::as_str), Some(""));
        assert!(m.warnings().is_empty());
    }

    #[test]
    fn test_summary_snapshot() {
        let m = manifest(json!({
            "package": "hooks",
            "capabilities": {"assembly_debug": true},
            "pro_tests": {"tactical": {"positions": []}}
        }));
        m.push_warning("first");
        let summary = m.summary();
        assert!(summary.detected);
        assert!(summary.available);
        assert_eq!(summary.pro_suites, vec!["tactical"]);
        assert_eq!(summary.warnings, vec!["first"]);
        assert_eq!(summary.manifest, None);
    }
}
