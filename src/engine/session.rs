use super::resources::{ResourceMonitor, ResourceSnapshot};
use super::score::clamp_cp;
use super::uci::{AnalysisInfo, EngineIdentity, SearchLimit, UciProtocol, DEFAULT_REPLY_TIMEOUT};
use crate::chess::Board;
use crate::error::{HarnessError, Outcome, Result};
use crate::instrumentation::InstrumentationManifest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long `close` waits for the engine to honour `quit` before killing it
pub const QUIT_GRACE: Duration = Duration::from_millis(500);

/// Anything that accepts raw protocol lines.
pub trait CommandSink {
    fn send_command(&mut self, line: &str) -> Result<()>;
}

/// Per-session engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub threads: u32,
    pub hash_mb: u32,
    pub multipv: u32,
    /// Extra UCI options; these override the three built-in values above
    pub options: BTreeMap<String, String>,
    /// Extra command-line arguments for the engine program
    pub args: Vec<String>,
    /// Limit on waiting for `uciok` and `readyok`, in milliseconds
    pub reply_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 128,
            multipv: 1,
            options: BTreeMap::new(),
            args: Vec::new(),
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT.as_millis() as u64,
        }
    }
}

impl EngineConfig {
    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_hash_mb(mut self, hash_mb: u32) -> Self {
        self.hash_mb = hash_mb;
        self
    }

    pub fn with_multipv(mut self, multipv: u32) -> Self {
        self.multipv = multipv;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Built-in defaults, overridden by caller options, overridden by manifest handshake options.
    /// Names compare case-insensitively; the first spelling seen keeps its position.
    pub fn merged_options(
        &self,
        instrumentation: Option<&InstrumentationManifest>,
    ) -> Vec<(String, String)> {
        let mut merged: Vec<(String, String)> = vec![
            ("Threads".to_string(), self.threads.to_string()),
            ("Hash".to_string(), self.hash_mb.to_string()),
            ("MultiPV".to_string(), self.multipv.to_string()),
        ];

        let mut upsert = |name: &str, value: String| {
            match merged
                .iter_mut()
                .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            {
                Some(slot) => slot.1 = value,
                None => merged.push((name.to_string(), value)),
            }
        };

        for (name, value) in &self.options {
            upsert(name, value.clone());
        }
        if let Some(manifest) = instrumentation {
            for (name, value) in manifest.handshake_options() {
                upsert(&name, value);
            }
        }

        merged
    }
}

/// One live engine process.
///
/// Calls must be serialized by the owner; a session is never shared between
/// threads. The process is terminated and reaped on `close` or drop.
pub struct EngineSession {
    path: PathBuf,
    config: EngineConfig,
    child: Child,
    protocol: Option<UciProtocol>,
    monitor: Option<ResourceMonitor>,
    rejected_options: Vec<String>,
    closed: bool,
}

impl EngineSession {
    /// Spawn the engine, run the UCI handshake, apply the merged options and
    /// replay the manifest handshake if one is given.
    pub fn open(
        path: impl AsRef<Path>,
        config: EngineConfig,
        instrumentation: Option<&InstrumentationManifest>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut child = Command::new(&path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| HarnessError::Launch {
                path: path.clone(),
                source,
            })?;
        let pid = child.id();
        debug!("spawned engine {} (pid {})", path.display(), pid);

        let protocol = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => Some(
                UciProtocol::new(stdin, stdout).with_reply_timeout(config.reply_timeout()),
            ),
            (stdin, _) => {
                child.stdin = stdin;
                None
            }
        };

        // From here on Drop reaps the child on every early return.
        let mut session = Self {
            path,
            config,
            child,
            protocol,
            monitor: None,
            rejected_options: Vec::new(),
            closed: false,
        };

        if let Some(protocol) = session.protocol.as_mut() {
            protocol.handshake()?;
        }

        let options = session.config.merged_options(instrumentation);
        match session.configure(&options) {
            Outcome::Fatal(err) => return Err(err),
            outcome => {
                for warning in outcome.warnings() {
                    warn!("{}: {}", session.path.display(), warning);
                }
            }
        }

        if let Some(manifest) = instrumentation {
            let outcome = manifest.activate(&mut session, None);
            if !outcome.is_success() {
                debug!(
                    "instrumentation handshake finished with {} warning(s)",
                    outcome.warnings().len()
                );
            }
        }

        session.monitor = ResourceMonitor::attach(pid);
        info!(
            "engine session open: {} ({})",
            session.path.display(),
            session
                .identity()
                .and_then(|id| id.name.clone())
                .unwrap_or_else(|| "unnamed".to_string())
        );
        Ok(session)
    }

    /// Apply options one by one. Rejected options are reported as warnings and
    /// skipped; only a dead pipe is fatal.
    pub fn configure(&mut self, options: &[(String, String)]) -> Outcome<Vec<String>> {
        let Some(protocol) = self.protocol.as_mut() else {
            return Outcome::Recovered {
                value: Vec::new(),
                warnings: vec!["no protocol channel; options not applied".to_string()],
            };
        };

        let mut applied = Vec::new();
        let mut warnings = Vec::new();
        for (name, value) in options {
            match protocol.validate_option(name, value) {
                Ok(command) => {
                    if let Err(err) = protocol.send_option(&command) {
                        return Outcome::Fatal(err.into());
                    }
                    applied.push(command.name);
                }
                Err(reason) => warnings.push(format!("option '{name}' = '{value}' rejected: {reason}")),
            }
        }

        if let Err(err) = protocol.sync() {
            return Outcome::Fatal(err);
        }

        self.rejected_options.extend(warnings.iter().cloned());
        Outcome::from_parts(applied, warnings)
    }

    /// Analyse `fen` and return the white-relative, clamped centipawn score
    /// together with the raw search output. A missing score counts as 0.
    pub fn analyze(&mut self, fen: &str, limit: SearchLimit) -> Result<(i32, AnalysisInfo)> {
        let board = Board::from_fen(fen)?;
        let protocol = self.protocol.as_mut().ok_or_else(|| {
            HarnessError::ProtocolViolation("engine protocol channel unavailable".to_string())
        })?;
        let info = protocol.search(fen, limit)?;
        let cp = info
            .score
            .map(|score| score.white_centipawns(board.side_to_move()))
            .unwrap_or(0);
        Ok((clamp_cp(cp), info))
    }

    /// Write one line to the engine. Never fails loudly; `false` means the line
    /// could not be delivered.
    pub fn send_raw_command(&mut self, line: &str) -> bool {
        match self.write_command(line) {
            Ok(()) => true,
            Err(err) => {
                debug!("raw command '{}' not delivered: {}", line, err);
                false
            }
        }
    }

    fn write_command(&mut self, line: &str) -> Result<()> {
        if let Some(protocol) = self.protocol.as_mut() {
            return protocol.send_line(line).map_err(HarnessError::from);
        }
        match self.child.stdin.as_mut() {
            Some(stdin) => {
                stdin.write_all(line.as_bytes())?;
                stdin.write_all(b"\n")?;
                stdin.flush()?;
                Ok(())
            }
            None => Err(HarnessError::ProtocolViolation(
                "no command channel to the engine".to_string(),
            )),
        }
    }

    /// Best-effort CPU/RSS sample; `None` when introspection is unavailable
    pub fn resource_snapshot(&mut self) -> Option<ResourceSnapshot> {
        self.monitor.as_mut()?.snapshot()
    }

    pub fn identity(&self) -> Option<&EngineIdentity> {
        self.protocol.as_ref().map(UciProtocol::identity)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Options the engine refused during configuration
    pub fn rejected_options(&self) -> &[String] {
        &self.rejected_options
    }

    /// Quit gracefully if possible, then make sure the process is gone
    pub fn close(mut self) -> Option<ExitStatus> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<ExitStatus> {
        if self.closed {
            return None;
        }
        self.closed = true;

        let _ = self.write_command("quit");
        // Dropping the pipes gives the engine EOF as well.
        self.protocol = None;
        self.child.stdin = None;

        let deadline = Instant::now() + QUIT_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Some(status),
                Ok(None) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(10)),
                _ => break,
            }
        }

        if let Err(err) = self.child.kill() {
            debug!("kill of engine pid {} failed: {}", self.child.id(), err);
        }
        self.child.wait().ok()
    }
}

impl CommandSink for EngineSession {
    fn send_command(&mut self, line: &str) -> Result<()> {
        self.write_command(line)
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSession")
            .field("path", &self.path)
            .field("pid", &self.child.id())
            .field("closed", &self.closed)
            .finish()
    }
}
