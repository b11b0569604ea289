//! Optional capability manifests shipped next to instrumented engine builds.
//!
//! A manifest declares extra capabilities (assembly debug hooks, professional
//! suites, trace capture), the handshake that enables them and the probes the
//! engine understands.

pub mod discovery;
pub mod manifest;
pub mod parse;

pub use discovery::{candidate_paths, discover, DiscoveryOptions};
pub use manifest::{AssemblySymbol, CapabilitySet, InstrumentationManifest};
pub use parse::{load_manifest, parse_manifest};
