pub mod chess;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod instrumentation;
pub mod report;
pub mod workloads;

// Public surface used by the binary and integration tests
pub use engine::{EngineConfig, EngineSession, SearchLimit};
pub use error::{HarnessError, Outcome, Result};
pub use instrumentation::{discover, DiscoveryOptions, InstrumentationManifest};
pub use report::{EventBus, Report};
pub use workloads::{ConcurrentHarness, FuzzInjector, Workload, WorkloadContext};
