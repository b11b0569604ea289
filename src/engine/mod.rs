//! Engine process management: spawning, the UCI conversation and resource sampling.

pub mod resources;
pub mod score;
pub mod session;
pub mod uci;

pub use resources::{ResourceMonitor, ResourceSnapshot};
pub use score::{clamp_cp, Score, CP_LIMIT, MATE_SCORE};
pub use session::{CommandSink, EngineConfig, EngineSession, QUIT_GRACE};
pub use uci::{AnalysisInfo, EngineIdentity, OptionKind, PvLine, SearchLimit, SetOption, UciOption, MAX_MOVETIME};
