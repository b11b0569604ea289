//! Test workloads run against an engine.
//!
//! Every workload registers exactly one test descriptor on the report and
//! writes its progress to the event bus.

pub mod asm_debug;
pub mod fuzz;
pub mod instances;
pub mod pro_suite;
pub mod probes;

pub use asm_debug::AssemblyDebug;
pub use fuzz::{FuzzInjector, FuzzOutcome};
pub use instances::{ConcurrentHarness, HarnessSummary, WorkerMessage};
pub use pro_suite::ProfessionalSuite;
pub use probes::{Burst, Endurance, MultiPv, ThreadsScaling, UciHandshake};

use crate::engine::EngineConfig;
use crate::error::Result;
use crate::instrumentation::InstrumentationManifest;
use crate::report::{EventBus, Report};
use std::path::Path;

/// Everything a workload gets from the orchestrating caller
pub struct WorkloadContext<'a> {
    pub bus: &'a EventBus,
    pub report: &'a mut Report,
    pub engine: &'a Path,
    /// Base session configuration; workloads adjust copies of it
    pub config: &'a EngineConfig,
    pub instrumentation: Option<&'a InstrumentationManifest>,
}

impl<'a> WorkloadContext<'a> {
    pub fn new(
        bus: &'a EventBus,
        report: &'a mut Report,
        engine: &'a Path,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            bus,
            report,
            engine,
            config,
            instrumentation: None,
        }
    }

    pub fn with_instrumentation(mut self, manifest: Option<&'a InstrumentationManifest>) -> Self {
        self.instrumentation = manifest;
        self
    }
}

pub trait Workload {
    /// Name of the test descriptor this workload registers
    fn name(&self) -> &'static str;

    /// Run to completion. Errors are fail-fast failures of this workload only.
    fn run(&self, ctx: &mut WorkloadContext<'_>) -> Result<()>;
}

/// Message of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
