use super::commands::Cli;
use crate::config::{discovery_from_env, Settings, DEFAULT_TESTS};
use crate::instrumentation::{discover, DiscoveryOptions, InstrumentationManifest};
use crate::report::{EventBus, Report};
use crate::workloads::{
    AssemblyDebug, Burst, ConcurrentHarness, Endurance, FuzzInjector, MultiPv, ProfessionalSuite,
    ThreadsScaling, UciHandshake, Workload, WorkloadContext,
};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info};

/// Selectable tests, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TestKind {
    Uci,
    Burst,
    Endurance,
    Threads,
    MultiPv,
    Instances,
    Fuzz,
    Asm,
    Pro,
}

impl TestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::Uci => "uci",
            TestKind::Burst => "burst",
            TestKind::Endurance => "endurance",
            TestKind::Threads => "threads",
            TestKind::MultiPv => "multipv",
            TestKind::Instances => "instances",
            TestKind::Fuzz => "fuzz",
            TestKind::Asm => "asm",
            TestKind::Pro => "pro",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uci" => Ok(TestKind::Uci),
            "burst" => Ok(TestKind::Burst),
            "endurance" => Ok(TestKind::Endurance),
            "threads" => Ok(TestKind::Threads),
            "multipv" => Ok(TestKind::MultiPv),
            "instances" => Ok(TestKind::Instances),
            "fuzz" => Ok(TestKind::Fuzz),
            "asm" => Ok(TestKind::Asm),
            "pro" => Ok(TestKind::Pro),
            other => Err(format!("unknown test '{other}'")),
        }
    }
}

/// Parsed `--tests` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSelection {
    pub tests: BTreeSet<TestKind>,
    pub unknown: Vec<String>,
    /// The default selection was asked for, so instrumented tests may be added
    pub is_default: bool,
}

impl TestSelection {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let is_default = raw.eq_ignore_ascii_case("auto") || raw == DEFAULT_TESTS;
        let list = if raw.eq_ignore_ascii_case("auto") {
            DEFAULT_TESTS
        } else {
            raw
        };

        let mut tests = BTreeSet::new();
        let mut unknown = Vec::new();
        for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            match name.parse::<TestKind>() {
                Ok(kind) => {
                    tests.insert(kind);
                }
                Err(_) => unknown.push(name.to_string()),
            }
        }

        Self {
            tests,
            unknown,
            is_default,
        }
    }

    /// Add the instrumented tests a manifest unlocks, when the default selection is in use
    pub fn unlock(&mut self, manifest: &InstrumentationManifest, bus: &EventBus) {
        if !self.is_default {
            return;
        }
        if manifest.supports_assembly_debug() {
            bus.log("[instrumentation] enabling assembly diagnostics");
            self.tests.insert(TestKind::Asm);
        }
        if manifest.supports_professional_suite() {
            bus.log("[instrumentation] enabling professional suite");
            self.tests.insert(TestKind::Pro);
        }
    }
}

/// One orchestrated run against a single engine
#[derive(Debug, Clone)]
pub struct App {
    pub engine: PathBuf,
    pub settings: Settings,
    pub discovery: DiscoveryOptions,
}

impl App {
    pub fn new(engine: impl Into<PathBuf>, settings: Settings, discovery: DiscoveryOptions) -> Self {
        Self {
            engine: engine.into(),
            settings,
            discovery,
        }
    }

    /// Layer file settings and CLI flags, and read discovery overrides from the environment
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut settings =
            Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
        cli.apply(&mut settings);
        settings.validate().context("Invalid settings")?;
        Ok(Self::new(cli.engine.clone(), settings, discovery_from_env()))
    }

    fn workload(&self, kind: TestKind) -> Box<dyn Workload> {
        let s = &self.settings;
        match kind {
            TestKind::Uci => Box::new(UciHandshake {
                movetime: s.movetime,
            }),
            TestKind::Burst => Box::new(Burst {
                count: s.burst,
                movetime: s.movetime,
            }),
            TestKind::Endurance => Box::new(Endurance {
                duration: Duration::from_secs(s.duration),
                movetime: s.movetime,
            }),
            TestKind::Threads => Box::new(ThreadsScaling {
                movetime: s.movetime,
                max_threads: s.threads_max,
            }),
            TestKind::MultiPv => Box::new(MultiPv {
                movetime: s.movetime,
                multipv: 4,
            }),
            TestKind::Instances => Box::new(ConcurrentHarness::new(
                s.instances,
                s.per_instance,
                s.movetime,
            )),
            TestKind::Fuzz => Box::new(FuzzInjector::new(Duration::from_secs(s.fuzz_seconds))),
            TestKind::Asm => Box::new(AssemblyDebug::default()),
            TestKind::Pro => Box::new(ProfessionalSuite {
                movetime: s.movetime,
            }),
        }
    }

    /// Discover instrumentation, run the selected tests and return the finished report.
    /// A failing test is logged and noted; the remaining tests still run.
    pub fn run(&self, bus: &EventBus) -> Report {
        let manifest = discover(Some(&self.engine), &self.discovery);
        if manifest.is_detected() {
            bus.log(format!("[instrumentation] detected {}", manifest.describe()));
        } else if let Some(error) = manifest.error() {
            bus.log(format!("[instrumentation] manifest error: {error}"));
        } else {
            bus.log("[instrumentation] no instrumentation manifest found");
        }

        let mut report = Report::new(self.engine.display().to_string());
        let mut selection = TestSelection::parse(&self.settings.tests);
        for name in &selection.unknown {
            bus.log(format!("[cestt] ignoring unknown test '{name}'"));
        }
        selection.unlock(&manifest, bus);
        info!(
            "running {} test(s) against {}",
            selection.tests.len(),
            self.engine.display()
        );

        for kind in &selection.tests {
            let workload = self.workload(*kind);
            let mut ctx = WorkloadContext::new(bus, &mut report, &self.engine, &self.settings.engine)
                .with_instrumentation(Some(&manifest));
            if let Err(err) = workload.run(&mut ctx) {
                error!("{} failed: {}", workload.name(), err);
                bus.log(format!("[{}] failed: {}", workload.name(), err));
                report.add_note(format!("{} error: {}", workload.name(), err));
            }
        }

        report.capture_instrumentation(manifest.summary());
        report.finish();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selection_parse() {
        let selection = TestSelection::parse(" fuzz, uci ,pgn,,Burst");
        assert_eq!(
            selection.tests.iter().copied().collect::<Vec<_>>(),
            vec![TestKind::Uci, TestKind::Burst, TestKind::Fuzz]
        );
        assert_eq!(selection.unknown, vec!["pgn"]);
        assert!(!selection.is_default);
    }

    #[test]
    fn test_auto_unlocks_instrumented_tests() {
        let bus = EventBus::with_sink(|_| {});
        let manifest = match json!({"capabilities": {"assembly_debug": true}, "pro_tests": ["tactical"]}) {
            serde_json::Value::Object(map) => InstrumentationManifest::from_document(None, map),
            _ => unreachable!(),
        };

        let mut auto = TestSelection::parse("AUTO");
        assert!(auto.is_default);
        auto.unlock(&manifest, &bus);
        assert!(auto.tests.contains(&TestKind::Asm));
        assert!(auto.tests.contains(&TestKind::Pro));
        assert_eq!(auto.tests.len(), 6);

        let mut explicit = TestSelection::parse("uci");
        explicit.unlock(&manifest, &bus);
        assert_eq!(explicit.tests.len(), 1);
        assert_eq!(bus.len(), 2);
    }

    #[test]
    fn test_missing_engine_still_produces_report() {
        let bus = EventBus::with_sink(|_| {});
        let settings = Settings {
            tests: "uci,fuzz".to_string(),
            ..Settings::default()
        };
        let app = App::new("/nonexistent/engine", settings, DiscoveryOptions::default());
        let report = app.run(&bus);

        assert_eq!(report.tests().len(), 2);
        assert_eq!(report.tests()[0].name, "uci_handshake");
        assert_eq!(report.tests()[1].name, "uci_fuzz");
        assert!(report.notes()[0].starts_with("uci_handshake error: failed to launch engine"));
        assert!(report.notes()[1].starts_with("uci_fuzz: failed to launch engine"));
        assert!(report.finished().is_some());
        assert!(!report.instrumentation().map_or(true, |i| i.detected));
    }
}
