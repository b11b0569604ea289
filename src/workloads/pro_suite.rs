use super::{Workload, WorkloadContext};
use crate::chess::{random_legal_fen, Board};
use crate::engine::{EngineSession, SearchLimit};
use crate::error::Result;
use crate::instrumentation::InstrumentationManifest;
use serde_json::{json, Value};

const DEFAULT_TACTICAL: [(&str, &str, f64); 3] = [
    (
        "King's Gambit Pressure",
        "rnbqkbnr/pppp1ppp/8/4p3/2B1P3/8/PPPP1PPP/RNBQK1NR b KQkq - 1 2",
        0.6,
    ),
    (
        "Closed centre grind",
        "rnbq1rk1/ppp2ppp/3bpn2/3p4/3P4/2N1PN2/PP3PPP/R1BQKB1R w KQ - 0 8",
        0.6,
    ),
    (
        "Technical rook ending",
        "8/5pk1/5np1/1p6/pP3P2/P1P2K1P/6P1/8 w - - 0 1",
        0.6,
    ),
];

/// Numbers or numeric strings; `inf` and `NaN` are treated as absent
fn as_f64(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str()?.trim().parse().ok())
        .filter(|n: &f64| n.is_finite())
}

fn as_u32(value: &Value) -> Option<u32> {
    as_f64(value).filter(|n| *n >= 0.0).map(|n| n as u32)
}

/// One position of the tactical suite
#[derive(Debug, Clone, PartialEq)]
pub struct TacticalPosition {
    pub label: Option<String>,
    pub fen: String,
    pub movetime: Option<f64>,
    /// Sent alongside the time budget, which takes precedence
    pub depth: Option<u32>,
    /// Expected best moves as written in the manifest, SAN or UCI
    pub expected: Vec<String>,
    pub cp_range: Option<(f64, f64)>,
}

impl TacticalPosition {
    /// Accepts a bare FEN string or a mapping with at least a `fen` key
    pub fn from_value(value: &Value) -> Option<Self> {
        let entry = match value {
            Value::String(fen) if !fen.trim().is_empty() => {
                return Some(Self::bare(fen.trim().to_string()));
            }
            Value::Object(entry) => entry,
            _ => return None,
        };

        let fen = entry.get("fen")?.as_str()?.trim();
        if fen.is_empty() {
            return None;
        }

        let label = entry
            .get("label")
            .or_else(|| entry.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut expected = Vec::new();
        for key in ["best", "expected_move", "expected_moves"] {
            match entry.get(key) {
                Some(Value::Array(items)) => expected.extend(items.iter().filter_map(move_text)),
                Some(item) => expected.extend(move_text(item)),
                None => {}
            }
        }

        let cp_range = entry
            .get("cp_range")
            .or_else(|| entry.get("expected_cp_range"))
            .and_then(Value::as_array)
            .filter(|range| range.len() == 2)
            .and_then(|range| Some((as_f64(&range[0])?, as_f64(&range[1])?)));

        Some(Self {
            label,
            fen: fen.to_string(),
            movetime: entry.get("movetime").and_then(as_f64),
            depth: entry.get("depth").and_then(as_u32),
            expected,
            cp_range,
        })
    }

    fn bare(fen: String) -> Self {
        Self {
            label: None,
            fen,
            movetime: None,
            depth: None,
            expected: Vec::new(),
            cp_range: None,
        }
    }

    /// Expected moves in UCI form. SAN is resolved against the position;
    /// anything that looks like a coordinate move is kept as is.
    pub fn expected_uci(&self, board: &Board) -> Vec<String> {
        self.expected
            .iter()
            .filter_map(|text| match board.parse_san(text) {
                Ok(mv) => Some(mv.to_string()),
                Err(_) if (4..=5).contains(&text.len())
                    && text.starts_with(|c: char| c.is_ascii_alphabetic()) =>
                {
                    Some(text.clone())
                }
                Err(_) => None,
            })
            .collect()
    }
}

fn move_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Session settings for the tactical suite, overridable by the manifest
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteSettings {
    pub threads: u32,
    pub hash_mb: u32,
    pub multipv: u32,
    pub movetime: Option<f64>,
}

impl Default for SuiteSettings {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 256,
            multipv: 3,
            movetime: None,
        }
    }
}

/// Parameters of the evaluation stability check
#[derive(Debug, Clone, PartialEq)]
pub struct StabilitySettings {
    pub samples: usize,
    pub movetime: f64,
    pub max_cp_delta: f64,
    pub max_plies: usize,
}

impl Default for StabilitySettings {
    fn default() -> Self {
        Self {
            samples: 6,
            movetime: 0.35,
            max_cp_delta: 45.0,
            max_plies: 18,
        }
    }
}

impl StabilitySettings {
    pub fn from_suite(definition: Option<&Value>) -> Self {
        let mut settings = Self::default();
        let Some(Value::Object(map)) = definition else {
            return settings;
        };
        if let Some(samples) = map.get("samples").and_then(as_u32) {
            settings.samples = samples as usize;
        }
        if let Some(movetime) = map.get("movetime").and_then(as_f64) {
            settings.movetime = movetime;
        }
        if let Some(delta) = map.get("max_cp_delta").and_then(as_f64) {
            settings.max_cp_delta = delta;
        }
        if let Some(plies) = map.get("max_plies").and_then(as_u32) {
            settings.max_plies = plies as usize;
        }
        settings.samples = settings.samples.max(1);
        settings
    }
}

/// Positions and session settings of the `tactical` suite. Falls back to the
/// built-in positions when the definition yields none.
pub fn load_tactical(definition: Option<&Value>) -> (Vec<TacticalPosition>, SuiteSettings) {
    let mut settings = SuiteSettings::default();
    let entries: Vec<TacticalPosition> = match definition {
        Some(Value::Object(map)) => {
            if let Some(threads) = map.get("threads").and_then(as_u32) {
                settings.threads = threads;
            }
            if let Some(hash) = map.get("hash").and_then(as_u32) {
                settings.hash_mb = hash;
            }
            if let Some(multipv) = map.get("multipv").and_then(as_u32) {
                settings.multipv = multipv;
            }
            settings.movetime = map.get("movetime").and_then(as_f64);
            map.get("positions")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(TacticalPosition::from_value).collect())
                .unwrap_or_default()
        }
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(TacticalPosition::from_value)
            .collect(),
        _ => Vec::new(),
    };

    if entries.is_empty() {
        return (default_tactical(), settings);
    }
    (entries, settings)
}

fn default_tactical() -> Vec<TacticalPosition> {
    DEFAULT_TACTICAL
        .iter()
        .map(|(label, fen, movetime)| TacticalPosition {
            label: Some(label.to_string()),
            movetime: Some(*movetime),
            ..TacticalPosition::bare(fen.to_string())
        })
        .collect()
}

/// Tactical and stability checks unlocked by a professional manifest
#[derive(Debug, Clone)]
pub struct ProfessionalSuite {
    pub movetime: f64,
}

impl ProfessionalSuite {
    fn tactical(
        &self,
        ctx: &mut WorkloadContext<'_>,
        session: &mut EngineSession,
        positions: &[TacticalPosition],
        base_movetime: f64,
    ) -> Result<()> {
        let mut passed = 0;
        for (index, position) in positions.iter().enumerate() {
            let board = Board::from_fen(&position.fen)?;
            let label = position
                .label
                .clone()
                .unwrap_or_else(|| format!("pos#{}", index + 1));
            let movetime = position.movetime.unwrap_or(base_movetime);
            let limit = match SearchLimit::movetime_secs(movetime) {
                SearchLimit::MoveTime(budget) => SearchLimit::new(Some(budget), position.depth),
                limit => limit,
            };

            let (cp, info) = session.analyze(&position.fen, limit)?;
            let best = info.pv.first().cloned();
            let nps = info
                .nodes
                .filter(|_| movetime > 0.0)
                .map(|nodes| (nodes as f64 / movetime.max(1e-6)) as u64);
            ctx.bus.log(format!(
                "[PRO] tactical {}: cp={} nodes={} nps={} pv={:?}",
                label,
                cp,
                info.nodes.map_or("None".to_string(), |n| n.to_string()),
                nps.map_or("None".to_string(), |n| n.to_string()),
                info.pv.iter().take(3).collect::<Vec<_>>()
            ));

            let mut success = true;
            let expected = position.expected_uci(&board);
            if !expected.is_empty() {
                match best.as_ref().filter(|mv| expected.contains(mv)) {
                    Some(mv) => ctx
                        .bus
                        .log(format!("[PRO] ✓ {label} expected move matched ({mv})")),
                    None => {
                        ctx.bus.log(format!(
                            "[PRO] ✗ {} expected {:?} got {}",
                            label,
                            expected,
                            best.as_deref().unwrap_or("None")
                        ));
                        success = false;
                    }
                }
            }
            if let Some((low, high)) = position.cp_range {
                let eval = f64::from(cp);
                if eval < low || eval > high {
                    ctx.bus
                        .log(format!("[PRO] ✗ {label} eval {cp} outside range [{low}, {high}]"));
                    success = false;
                }
            }

            if success {
                passed += 1;
            } else {
                ctx.report.add_note(format!("tactical miss: {label}"));
            }
        }

        ctx.bus.log(format!(
            "[PRO] tactical summary: {}/{} matched expectations",
            passed,
            positions.len()
        ));
        Ok(())
    }

    fn stability(
        &self,
        ctx: &mut WorkloadContext<'_>,
        session: &mut EngineSession,
        settings: &StabilitySettings,
    ) -> Result<()> {
        let mut rng = rand::thread_rng();
        let limit = SearchLimit::movetime_secs(settings.movetime);
        let mut failures = 0;

        for sample in 0..settings.samples {
            let fen = random_legal_fen(&mut rng, settings.max_plies.max(4));
            let (first, _) = session.analyze(&fen, limit)?;
            let (second, _) = session.analyze(&fen, limit)?;
            let delta = (first - second).abs();
            ctx.bus.log(format!(
                "[PRO] stability {}/{}: Δcp={} cp1={} cp2={}",
                sample + 1,
                settings.samples,
                delta,
                first,
                second
            ));
            if f64::from(delta) > settings.max_cp_delta {
                failures += 1;
            }
        }

        if failures > 0 {
            ctx.report.add_note(format!(
                "stability drift: {}/{} over threshold",
                failures, settings.samples
            ));
        }
        ctx.bus.log(format!(
            "[PRO] stability summary: {}/{} within Δcp≤{}",
            settings.samples - failures,
            settings.samples,
            settings.max_cp_delta
        ));
        Ok(())
    }

    fn exercise(
        &self,
        ctx: &mut WorkloadContext<'_>,
        manifest: &InstrumentationManifest,
        positions: &[TacticalPosition],
        suite: &SuiteSettings,
        stability: &StabilitySettings,
    ) -> Result<()> {
        let config = ctx
            .config
            .clone()
            .with_threads(suite.threads.max(1))
            .with_hash_mb(suite.hash_mb.max(32))
            .with_multipv(suite.multipv.max(1));
        let mut session = EngineSession::open(ctx.engine, config, Some(manifest))?;
        let _ = manifest.activate(&mut session, Some(ctx.bus));

        let base_movetime = suite.movetime.unwrap_or(self.movetime);
        self.tactical(ctx, &mut session, positions, base_movetime)?;
        self.stability(ctx, &mut session, stability)?;
        session.close();
        Ok(())
    }
}

impl Workload for ProfessionalSuite {
    fn name(&self) -> &'static str {
        "professional_suite"
    }

    fn run(&self, ctx: &mut WorkloadContext<'_>) -> Result<()> {
        let manifest = ctx.instrumentation;
        let (positions, suite) = load_tactical(manifest.and_then(|m| m.get_suite("tactical")));
        let stability = StabilitySettings::from_suite(manifest.and_then(|m| m.get_suite("stability")));

        ctx.report.add_test(
            self.name(),
            json!({
                "movetime": self.movetime,
                "manifest": manifest
                    .and_then(InstrumentationManifest::source)
                    .map(|p| p.display().to_string()),
                "tactical_positions": positions.len(),
                "stability_samples": stability.samples,
            }),
        );

        let Some(manifest) = manifest.filter(|m| m.supports_professional_suite()) else {
            ctx.bus
                .log("[PRO] instrumentation package missing, professional suite locked");
            if let Some(error) = manifest.and_then(InstrumentationManifest::error) {
                ctx.report
                    .add_note(format!("professional suite manifest error: {error}"));
            }
            return Ok(());
        };

        if let Err(err) = self.exercise(ctx, manifest, &positions, &suite, &stability) {
            ctx.bus
                .log(format!("[PRO] professional suite failed: {err}"));
            ctx.report
                .add_note(format!("professional suite error: {err}"));
            return Ok(());
        }

        for warning in manifest.warnings() {
            ctx.bus.log(format!("[PRO] warning: {warning}"));
        }
        Ok(())
    }
}
