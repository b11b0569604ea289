//! Shared helpers for the integration tests.
//!
//! Engines are simulated with small POSIX shell scripts run through
//! `/bin/sh`, so no real chess engine is needed.
#![allow(dead_code)]

use cestt::engine::EngineConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SHELL: &str = "/bin/sh";

/// Answers `uci`, `isready` and `go` like a tiny engine and records every
/// line it receives. `$1` is the transcript file, `$2` the score clause.
const SCRIPTED_ENGINE: &str = r#"
log="$1"
score="${2:-cp 25}"
while read -r line; do
  printf '%s\n' "$line" >> "$log"
  case "$line" in
    uci)
      echo "id name FakeFish 1.0"
      echo "id author cestt tests"
      echo "option name Threads type spin default 1 min 1 max 64"
      echo "option name Hash type spin default 16 min 1 max 4096"
      echo "option name MultiPV type spin default 1 min 1 max 8"
      echo "option name Debug Log type check default false"
      echo "uciok"
      ;;
    isready)
      echo "readyok"
      ;;
    go*)
      echo "info depth 1 seldepth 2 multipv 1 score $score nodes 100 nps 10000 time 10 pv e2e4 e7e5"
      echo "info depth 1 seldepth 2 multipv 2 score cp 10 nodes 120 nps 12000 time 10 pv d2d4"
      echo "bestmove e2e4"
      ;;
    quit)
      exit 0
      ;;
  esac
done
"#;

/// Swallows everything and refuses to exit until killed.
const STUBBORN_ENGINE: &str = r#"
trap '' TERM INT HUP
while :; do
  read -r line || sleep 1
done
"#;

/// Never reads its input and ignores polite signals.
const DEAF_ENGINE: &str = r#"
trap '' TERM INT HUP
exec sleep 30
"#;

/// Reads its input but never completes the handshake.
const MUTE_ENGINE: &str = r#"
while read -r line; do
  :
done
"#;

pub struct FakeEngine {
    dir: TempDir,
    script: PathBuf,
    transcript: PathBuf,
    score: String,
}

impl FakeEngine {
    /// Scripted engine reporting `score cp 25` for its principal line
    pub fn new() -> Self {
        Self::with_score("cp 25")
    }

    /// Scripted engine with a custom score clause, e.g. `mate -3`
    pub fn with_score(score: &str) -> Self {
        Self::from_script(SCRIPTED_ENGINE, score)
    }

    pub fn stubborn() -> Self {
        Self::from_script(STUBBORN_ENGINE, "")
    }

    pub fn deaf() -> Self {
        Self::from_script(DEAF_ENGINE, "")
    }

    pub fn mute() -> Self {
        Self::from_script(MUTE_ENGINE, "")
    }

    fn from_script(body: &str, score: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let script = dir.path().join("engine.sh");
        let transcript = dir.path().join("received.log");
        fs::write(&script, body).expect("write engine script");
        fs::write(&transcript, "").expect("create transcript");
        Self {
            dir,
            script,
            transcript,
            score: score.to_string(),
        }
    }

    /// Program to launch; the script itself is passed as an argument
    pub fn program(&self) -> &Path {
        Path::new(SHELL)
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            self.script.display().to_string(),
            self.transcript.display().to_string(),
            self.score.clone(),
        ]
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            args: self.args(),
            ..EngineConfig::default()
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Every line the engine has received so far
    pub fn received(&self) -> Vec<String> {
        fs::read_to_string(&self.transcript)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Write `contents` to `dir/name` and return the path
pub fn write_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write test file");
    path
}
