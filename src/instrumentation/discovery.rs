use super::manifest::InstrumentationManifest;
use super::parse::load_manifest;
use serde_json::{json, Value};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Generic manifest names looked up in the engine's directory
pub const GENERIC_MANIFEST_NAMES: [&str; 2] = ["cestt_manifest.json", "cestt-instrumentation.json"];

/// Explicit inputs to discovery besides the engine path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// A manifest file to use instead of searching next to the engine
    pub manifest_override: Option<PathBuf>,
    /// Synthesize an all-capabilities manifest when nothing is found
    pub force_advanced: bool,
}

fn with_appended(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Manifest locations to try, in order.
///
/// An override that points at an existing file is the only candidate.
/// Duplicates are kept so the order always mirrors the naming schemes.
pub fn candidate_paths(engine: Option<&Path>, options: &DiscoveryOptions) -> Vec<PathBuf> {
    if let Some(path) = options.manifest_override.as_deref() {
        if path.is_file() {
            return vec![path.to_path_buf()];
        }
        debug!("manifest override {} is not a file; ignoring", path.display());
    }

    let Some(engine) = engine else {
        return Vec::new();
    };
    let Some(name) = engine.file_name() else {
        return Vec::new();
    };
    let dir = engine.parent().unwrap_or_else(|| Path::new(""));
    let stem = engine.file_stem().unwrap_or(name);

    let mut named = name.to_owned();
    named.push(".cestt.json");
    let mut stemmed = stem.to_owned();
    stemmed.push(".cestt.json");

    let mut candidates = vec![
        with_appended(engine, ".cestt.json"),
        with_appended(engine, ".cestt"),
        dir.join(named),
        dir.join(stemmed),
    ];
    candidates.extend(GENERIC_MANIFEST_NAMES.iter().map(|name| dir.join(name)));
    candidates
}

/// Find and load the manifest for `engine`.
///
/// Never fails: a candidate that does not parse is remembered as the last
/// error and the search moves on.
pub fn discover(engine: Option<&Path>, options: &DiscoveryOptions) -> InstrumentationManifest {
    let mut last_error: Option<String> = None;

    for candidate in candidate_paths(engine, options) {
        if !candidate.exists() {
            continue;
        }
        match load_manifest(&candidate) {
            Ok(doc) => {
                info!("instrumentation manifest loaded from {}", candidate.display());
                return InstrumentationManifest::from_document(Some(candidate), doc);
            }
            Err(err) => {
                debug!("{}", err);
                last_error = Some(err.to_string());
            }
        }
    }

    if options.force_advanced {
        let doc = json!({
            "package": "environment override",
            "version": "env",
            "capabilities": {
                "assembly_debug": true,
                "professional": true,
                "pro_tests": true,
            },
        });
        let manifest = match doc {
            Value::Object(map) => InstrumentationManifest::from_document(None, map),
            _ => InstrumentationManifest::default(),
        };
        manifest.push_warning("advanced mode forced without a manifest file");
        return manifest;
    }

    InstrumentationManifest::not_found(last_error)
}
