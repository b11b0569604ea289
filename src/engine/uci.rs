use super::score::Score;
use crate::chess::STARTING_FEN;
use crate::error::{HarnessError, Result};
use serde::Serialize;
use std::fmt;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::io::{BufRead, BufReader, Write};
use std::process::{ChildStdin, ChildStdout};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Longest search time ever sent to an engine
pub const MAX_MOVETIME: Duration = Duration::from_secs(3600);

/// How long a search may run, as conveyed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    MoveTime(Duration),
    Depth(u32),
}

impl SearchLimit {
    pub const DEFAULT_DEPTH: u32 = 10;

    /// A time budget wins over a depth budget; with neither, search to depth 10
    pub fn new(movetime: Option<Duration>, depth: Option<u32>) -> Self {
        match (movetime, depth) {
            (Some(movetime), _) => SearchLimit::MoveTime(movetime),
            (None, depth) => SearchLimit::Depth(depth.unwrap_or(Self::DEFAULT_DEPTH)),
        }
    }

    /// Seconds to a time budget, clamped to `0..=MAX_MOVETIME`; NaN counts as zero
    pub fn movetime_secs(secs: f64) -> Self {
        let movetime = if secs.is_nan() || secs <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(secs)
                .unwrap_or(MAX_MOVETIME)
                .min(MAX_MOVETIME)
        };
        SearchLimit::MoveTime(movetime)
    }

    fn go_command(&self) -> String {
        match self {
            SearchLimit::MoveTime(movetime) => {
                format!("go movetime {}", movetime.as_millis().max(1))
            }
            SearchLimit::Depth(depth) => format!("go depth {depth}"),
        }
    }
}

impl Default for SearchLimit {
    fn default() -> Self {
        SearchLimit::Depth(Self::DEFAULT_DEPTH)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionKind {
    Check,
    Spin { min: Option<i64>, max: Option<i64> },
    Combo { vars: Vec<String> },
    Button,
    String,
}

/// An option declared by the engine during the `uci` handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UciOption {
    pub name: String,
    pub kind: OptionKind,
    pub default: Option<String>,
}

impl UciOption {
    /// Parse `option name <name> type <kind> [default ..] [min ..] [max ..] [var ..]*`
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        if tokens.next()? != "option" {
            return None;
        }

        let mut fields: Vec<(&str, Vec<&str>)> = Vec::new();
        for token in tokens {
            match token {
                "name" | "type" | "default" | "min" | "max" | "var" => {
                    fields.push((token, Vec::new()))
                }
                _ => {
                    if let Some((_, words)) = fields.last_mut() {
                        words.push(token);
                    }
                }
            }
        }

        let joined = |key: &str| {
            fields
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, words)| words.join(" "))
        };
        let number = |key: &str| joined(key).and_then(|v| v.parse::<i64>().ok());

        let name = joined("name").filter(|n| !n.is_empty())?;
        let kind = match joined("type")?.as_str() {
            "check" => OptionKind::Check,
            "spin" => OptionKind::Spin {
                min: number("min"),
                max: number("max"),
            },
            "combo" => OptionKind::Combo {
                vars: fields
                    .iter()
                    .filter(|(k, _)| *k == "var")
                    .map(|(_, words)| words.join(" "))
                    .collect(),
            },
            "button" => OptionKind::Button,
            _ => OptionKind::String,
        };

        Some(Self {
            name,
            kind,
            default: joined("default"),
        })
    }

    /// Check `value` against the declared type, returning the command to send
    pub fn validate(&self, value: &str) -> std::result::Result<SetOption, String> {
        let value = value.trim();
        let value = match &self.kind {
            OptionKind::Button => None,
            OptionKind::Check => match value.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => Some("true".to_string()),
                "false" | "0" | "off" => Some("false".to_string()),
                _ => return Err(format!("expected a boolean, got '{value}'")),
            },
            OptionKind::Spin { min, max } => {
                let number = value
                    .parse::<i64>()
                    .map_err(|_| format!("expected an integer, got '{value}'"))?;
                if min.map(|min| number < min).unwrap_or(false)
                    || max.map(|max| number > max).unwrap_or(false)
                {
                    return Err(format!(
                        "{number} outside range [{}, {}]",
                        min.map(|v| v.to_string()).unwrap_or_else(|| "-inf".into()),
                        max.map(|v| v.to_string()).unwrap_or_else(|| "inf".into())
                    ));
                }
                Some(number.to_string())
            }
            OptionKind::Combo { vars } => {
                let chosen = vars
                    .iter()
                    .find(|var| var.eq_ignore_ascii_case(value))
                    .ok_or_else(|| format!("'{value}' is not one of {vars:?}"))?;
                Some(chosen.clone())
            }
            OptionKind::String => Some(value.to_string()),
        };

        Ok(SetOption {
            name: self.name.clone(),
            value,
        })
    }
}

/// A validated `setoption` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOption {
    pub name: String,
    pub value: Option<String>,
}

impl fmt::Display for SetOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "setoption name {} value {}", self.name, value),
            None => write!(f, "setoption name {}", self.name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineIdentity {
    pub name: Option<String>,
    pub author: Option<String>,
}

/// One ranked principal variation from a (multi-PV) search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PvLine {
    pub rank: u32,
    pub depth: Option<u32>,
    pub score: Option<Score>,
    pub pv: Vec<String>,
}

/// Everything gathered from the `info` lines of one search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub time_ms: Option<u64>,
    /// Principal line's score, relative to the side to move
    pub score: Option<Score>,
    pub pv: Vec<String>,
    pub best_move: Option<String>,
    pub lines: Vec<PvLine>,
}

impl AnalysisInfo {
    pub fn multipv(&self) -> usize {
        self.lines.len()
    }

    /// Fold one `info ...` line into the accumulated result
    pub fn absorb(&mut self, line: &str) {
        let mut tokens = line.split_whitespace().skip(1).peekable();
        let mut rank = 1u32;
        let mut depth = None;
        let mut score = None;
        let mut pv = Vec::new();

        while let Some(token) = tokens.next() {
            match token {
                "depth" => depth = tokens.next().and_then(|v| v.parse().ok()),
                "seldepth" => self.seldepth = tokens.next().and_then(|v| v.parse().ok()),
                "multipv" => rank = tokens.next().and_then(|v| v.parse().ok()).unwrap_or(1),
                "nodes" => self.nodes = tokens.next().and_then(|v| v.parse().ok()),
                "nps" => self.nps = tokens.next().and_then(|v| v.parse().ok()),
                "time" => self.time_ms = tokens.next().and_then(|v| v.parse().ok()),
                "score" => {
                    let kind = tokens.next();
                    let value = tokens.next().and_then(|v| v.parse::<i32>().ok());
                    score = match (kind, value) {
                        (Some("cp"), Some(cp)) => Some(Score::Cp(cp)),
                        (Some("mate"), Some(moves)) => Some(Score::Mate(moves)),
                        _ => None,
                    };
                    while matches!(tokens.peek(), Some(&"lowerbound") | Some(&"upperbound")) {
                        tokens.next();
                    }
                }
                "pv" => {
                    pv.extend(tokens.by_ref().map(str::to_string));
                }
                "wdl" => {
                    tokens.nth(2);
                }
                "string" => break,
                _ => {}
            }
        }

        if score.is_none() && pv.is_empty() {
            if depth.is_some() {
                self.depth = depth;
            }
            return;
        }

        let rank = rank.max(1);
        let index = match self.lines.iter().position(|l| l.rank == rank) {
            Some(index) => index,
            None => {
                self.lines.push(PvLine {
                    rank,
                    ..PvLine::default()
                });
                self.lines.sort_by_key(|l| l.rank);
                self.lines.iter().position(|l| l.rank == rank).unwrap_or(0)
            }
        };
        let entry = &mut self.lines[index];
        if depth.is_some() {
            entry.depth = depth;
        }
        if score.is_some() {
            entry.score = score;
        }
        if !pv.is_empty() {
            entry.pv = pv;
        }

        if rank == 1 {
            self.depth = entry.depth.or(self.depth);
            self.score = entry.score;
            self.pv = entry.pv.clone();
        }
    }
}

/// How long `uciok` and `readyok` may take before the engine is given up on
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Line-oriented UCI conversation over a child's stdin/stdout.
///
/// Output is read on a helper thread so that handshake replies can be
/// awaited with a deadline; searches wait as long as the engine needs.
pub struct UciProtocol {
    stdin: ChildStdin,
    lines: Receiver<String>,
    reply_timeout: Duration,
    identity: EngineIdentity,
    options: Vec<UciOption>,
}

impl UciProtocol {
    pub fn new(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        let (tx, lines) = crossbeam_channel::unbounded();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self {
            stdin,
            lines,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            identity: EngineIdentity::default(),
            options: Vec::new(),
        }
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        trace!(">> {}", line);
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()
    }

    /// Next output line; `deadline` of `None` waits indefinitely
    fn read_line(&mut self, deadline: Option<Instant>) -> Result<String> {
        let received = match deadline {
            Some(deadline) => self.lines.recv_deadline(deadline),
            None => self.lines.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(line) => {
                trace!("<< {}", line);
                Ok(line)
            }
            Err(RecvTimeoutError::Timeout) => Err(HarnessError::ProtocolViolation(format!(
                "engine did not reply within {:.1}s",
                self.reply_timeout.as_secs_f64()
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(HarnessError::ProtocolViolation(
                "engine closed its output stream".to_string(),
            )),
        }
    }

    /// `uci` ... `uciok`, recording identity and declared options
    pub fn handshake(&mut self) -> Result<()> {
        self.send_line("uci")?;
        let deadline = Instant::now() + self.reply_timeout;
        loop {
            let line = self.read_line(Some(deadline))?;
            let line = line.trim();
            if line == "uciok" {
                break;
            } else if let Some(name) = line.strip_prefix("id name ") {
                self.identity.name = Some(name.trim().to_string());
            } else if let Some(author) = line.strip_prefix("id author ") {
                self.identity.author = Some(author.trim().to_string());
            } else if line.starts_with("option ") {
                match UciOption::parse(line) {
                    Some(option) => self.options.push(option),
                    None => debug!("ignoring malformed option declaration: {}", line),
                }
            }
        }
        debug!(
            "handshake complete: name={:?} options={}",
            self.identity.name,
            self.options.len()
        );
        Ok(())
    }

    /// `isready` ... `readyok`
    pub fn sync(&mut self) -> Result<()> {
        self.send_line("isready")?;
        let deadline = Instant::now() + self.reply_timeout;
        loop {
            if self.read_line(Some(deadline))?.trim() == "readyok" {
                return Ok(());
            }
        }
    }

    pub fn identity(&self) -> &EngineIdentity {
        &self.identity
    }

    pub fn options(&self) -> &[UciOption] {
        &self.options
    }

    /// Validate against the declared options (names match case-insensitively)
    pub fn validate_option(&self, name: &str, value: &str) -> std::result::Result<SetOption, String> {
        self.options
            .iter()
            .find(|option| option.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| "engine does not declare this option".to_string())?
            .validate(value)
    }

    pub fn send_option(&mut self, command: &SetOption) -> std::io::Result<()> {
        self.send_line(&command.to_string())
    }

    /// Set up `fen`, search under `limit` and collect output until `bestmove`
    pub fn search(&mut self, fen: &str, limit: SearchLimit) -> Result<AnalysisInfo> {
        if fen.trim() == STARTING_FEN {
            self.send_line("position startpos")?;
        } else {
            self.send_line(&format!("position fen {}", fen.trim()))?;
        }
        self.send_line(&limit.go_command())?;

        let mut info = AnalysisInfo::default();
        loop {
            let line = self.read_line(None)?;
            let trimmed = line.trim_start();
            if trimmed.starts_with("info ") {
                info.absorb(trimmed);
            } else if let Some(rest) = trimmed.strip_prefix("bestmove") {
                info.best_move = rest
                    .split_whitespace()
                    .next()
                    .filter(|mv| *mv != "(none)")
                    .map(str::to_string);
                return Ok(info);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_limit_precedence() {
        assert_eq!(SearchLimit::new(None, None), SearchLimit::Depth(10));
        assert_eq!(SearchLimit::new(None, Some(4)), SearchLimit::Depth(4));
        assert_eq!(
            SearchLimit::new(Some(Duration::from_millis(250)), Some(4)),
            SearchLimit::MoveTime(Duration::from_millis(250))
        );
        assert_eq!(SearchLimit::movetime_secs(0.1).go_command(), "go movetime 100");
        assert_eq!(SearchLimit::Depth(7).go_command(), "go depth 7");
    }

    #[test]
    fn test_movetime_secs_clamps_out_of_range_values() {
        assert_eq!(SearchLimit::movetime_secs(1e30), SearchLimit::MoveTime(MAX_MOVETIME));
        assert_eq!(
            SearchLimit::movetime_secs(f64::INFINITY),
            SearchLimit::MoveTime(MAX_MOVETIME)
        );
        assert_eq!(SearchLimit::movetime_secs(f64::NAN), SearchLimit::MoveTime(Duration::ZERO));
        assert_eq!(SearchLimit::movetime_secs(-2.0), SearchLimit::MoveTime(Duration::ZERO));
    }

    #[test]
    fn test_parse_spin_and_combo_options() {
        let hash = UciOption::parse("option name Hash type spin default 16 min 1 max 1024").unwrap();
        assert_eq!(hash.name, "Hash");
        assert_eq!(
            hash.kind,
            OptionKind::Spin {
                min: Some(1),
                max: Some(1024)
            }
        );
        assert!(hash.validate("2048").is_err());
        assert_eq!(hash.validate("64").unwrap().to_string(), "setoption name Hash value 64");

        let style = UciOption::parse(
            "option name Play Style type combo default Normal var Solid var Normal var Risky",
        )
        .unwrap();
        assert_eq!(style.name, "Play Style");
        assert_eq!(style.validate("risky").unwrap().value.as_deref(), Some("Risky"));
        assert!(style.validate("Wild").is_err());

        let clear = UciOption::parse("option name Clear Hash type button").unwrap();
        assert_eq!(clear.validate("").unwrap().to_string(), "setoption name Clear Hash");
    }

    #[test]
    fn test_absorb_tracks_principal_line() {
        let mut info = AnalysisInfo::default();
        info.absorb("info depth 5 seldepth 7 multipv 1 score cp 31 nodes 1200 nps 60000 time 20 pv e2e4 e7e5");
        info.absorb("info depth 5 multipv 2 score mate -3 pv d2d4");
        info.absorb("info depth 6 multipv 1 score cp 28 lowerbound nodes 2400 pv d2d4 d7d5");
        info.absorb("info string NNUE evaluation enabled");

        assert_eq!(info.depth, Some(6));
        assert_eq!(info.seldepth, Some(7));
        assert_eq!(info.nodes, Some(2400));
        assert_eq!(info.score, Some(Score::Cp(28)));
        assert_eq!(info.pv, vec!["d2d4".to_string(), "d7d5".to_string()]);
        assert_eq!(info.multipv(), 2);
        assert_eq!(info.lines[1].score, Some(Score::Mate(-3)));
    }
}
