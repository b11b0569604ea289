use super::{Workload, WorkloadContext};
use crate::error::{HarnessError, Result};
use crate::instrumentation::InstrumentationManifest;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use rand::Rng;
use serde_json::json;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Fixed part of the payload pool: valid commands first, then malformed ones
pub const FIXED_PAYLOADS: [&str; 7] = [
    "isready",
    "ucinewgame",
    "position startpos",
    "go movetime 1",
    "go depth -5",
    "position fen X Y Z",
    "setoption name Threads value -3",
];

/// Lines queued for the writer thread before new payloads are dropped
const PENDING_LINES: usize = 64;

const GARBAGE_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 :-_/\\\t";

/// Random printable junk of 3 to 40 characters
pub fn random_garbage<R: Rng + ?Sized>(rng: &mut R) -> String {
    let len = rng.gen_range(3..=40);
    (0..len)
        .map(|_| GARBAGE_ALPHABET[rng.gen_range(0..GARBAGE_ALPHABET.len())] as char)
        .collect()
}

/// Pick one payload uniformly; the random string is one slot of the pool
pub fn pick_payload<R: Rng + ?Sized>(rng: &mut R) -> String {
    let slot = rng.gen_range(0..=FIXED_PAYLOADS.len());
    match FIXED_PAYLOADS.get(slot) {
        Some(payload) => payload.to_string(),
        None => random_garbage(rng),
    }
}

#[derive(Debug, Clone)]
pub struct FuzzOutcome {
    pub payloads_sent: usize,
    /// Payloads discarded because the engine stopped reading its input
    pub payloads_dropped: usize,
    pub bytes_read: usize,
    /// The engine exited on its own before the deadline
    pub exited_early: bool,
    /// `None` when the process could not be observed terminating
    pub exit_status: Option<ExitStatus>,
    pub elapsed: Duration,
}

impl FuzzOutcome {
    pub fn exit_label(&self) -> String {
        match self.exit_status {
            Some(status) => match status.code() {
                Some(code) => code.to_string(),
                None => "signal".to_string(),
            },
            None => "unknown".to_string(),
        }
    }
}

/// Writes a mix of valid, malformed and random lines to a raw engine process
/// until a deadline passes or the process dies.
#[derive(Debug, Clone)]
pub struct FuzzInjector {
    pub duration: Duration,
    pub step_delay: Duration,
    pub quit_grace: Duration,
}

impl FuzzInjector {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            step_delay: Duration::from_millis(20),
            quit_grace: Duration::from_millis(100),
        }
    }

    /// Only a failed spawn is an error; everything after that is absorbed.
    pub fn inject(
        &self,
        engine: &Path,
        args: &[String],
        instrumentation: Option<&InstrumentationManifest>,
    ) -> Result<FuzzOutcome> {
        let mut child = Command::new(engine)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| HarnessError::Launch {
                path: engine.to_path_buf(),
                source,
            })?;
        let started = Instant::now();
        let deadline = started + self.duration;

        let output = child.stdout.take().map(drain_stdout);
        let mut feed = child.stdin.take().map(feed_stdin);
        let mut rng = rand::thread_rng();

        if let Some(tx) = feed.as_ref() {
            let _ = tx.try_send("uci".to_string());
            if let Some(manifest) = instrumentation {
                for (name, value) in manifest.handshake_options() {
                    let _ = tx.try_send(format!("setoption name {name} value {value}"));
                }
                for command in manifest.handshake_commands() {
                    let _ = tx.try_send(command.to_string());
                }
            }
        }

        let mut payloads_sent = 0;
        let mut payloads_dropped = 0;
        let mut bytes_read = 0;
        let mut exited_early = false;

        while Instant::now() < deadline {
            if let Ok(Some(_)) = child.try_wait() {
                exited_early = true;
                break;
            }
            let Some(tx) = feed.as_ref() else {
                break;
            };
            match tx.try_send(pick_payload(&mut rng)) {
                Ok(()) => {
                    payloads_sent += 1;
                    std::thread::sleep(self.step_delay);
                }
                Err(TrySendError::Full(_)) => {
                    payloads_dropped += 1;
                    std::thread::sleep(self.step_delay.max(Duration::from_millis(1)));
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("fuzz input closed after {} payloads", payloads_sent);
                    break;
                }
            }
            if let Some(rx) = output.as_ref() {
                bytes_read += rx.try_iter().sum::<usize>();
            }
        }

        // A writer stuck on a full pipe fails once the process is killed.
        if let Some(tx) = feed.take() {
            let _ = tx.try_send("quit".to_string());
        }
        std::thread::sleep(self.quit_grace);
        if let Err(err) = child.kill() {
            debug!("fuzz kill: {}", err);
        }

        let mut exit_status = None;
        let reap_deadline = Instant::now() + self.quit_grace;
        while Instant::now() < reap_deadline {
            match child.try_wait() {
                Ok(Some(status)) => {
                    exit_status = Some(status);
                    break;
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(5)),
                Err(_) => break,
            }
        }
        if exit_status.is_none() {
            // Reap in the background so a stubborn process never blocks the caller.
            std::thread::spawn(move || child.wait());
        }

        Ok(FuzzOutcome {
            payloads_sent,
            payloads_dropped,
            bytes_read,
            exited_early,
            exit_status,
            elapsed: started.elapsed(),
        })
    }
}

fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes())?;
    stdin.write_all(b"\n")?;
    stdin.flush()
}

/// Write queued lines on a detached thread; the injector itself never blocks on the pipe
fn feed_stdin(mut stdin: ChildStdin) -> Sender<String> {
    let (tx, rx) = crossbeam_channel::bounded::<String>(PENDING_LINES);
    std::thread::spawn(move || {
        for line in rx {
            if let Err(err) = write_line(&mut stdin, &line) {
                debug!("fuzz write failed: {}", err);
                break;
            }
        }
    });
    tx
}

/// Read engine output on a detached thread so the injector never blocks on it
fn drain_stdout(mut stdout: ChildStdout) -> Receiver<usize> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match stdout.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(n).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

impl Workload for FuzzInjector {
    fn name(&self) -> &'static str {
        "uci_fuzz"
    }

    fn run(&self, ctx: &mut WorkloadContext<'_>) -> Result<()> {
        ctx.report.add_test(
            self.name(),
            json!({ "seconds": self.duration.as_secs_f64() }),
        );

        match self.inject(ctx.engine, &ctx.config.args, ctx.instrumentation) {
            Ok(outcome) => {
                info!(
                    "fuzz sent {} payloads ({} dropped), read {} bytes",
                    outcome.payloads_sent, outcome.payloads_dropped, outcome.bytes_read
                );
                if outcome.exited_early {
                    ctx.bus.log(format!(
                        "[FUZZ] engine exited after {} payloads",
                        outcome.payloads_sent
                    ));
                }
                ctx.bus
                    .log(format!("[FUZZ] done, exit_code={}", outcome.exit_label()));
            }
            Err(err) => {
                ctx.bus.log(format!("[FUZZ] start fail: {err}"));
                ctx.report.add_note(format!("uci_fuzz: {err}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_garbage_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let junk = random_garbage(&mut rng);
            assert!((3..=40).contains(&junk.len()));
            assert!(junk.bytes().all(|b| GARBAGE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_pool_covers_every_slot() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut fixed_seen = [false; FIXED_PAYLOADS.len()];
        let mut garbage_seen = false;
        for _ in 0..2_000 {
            let payload = pick_payload(&mut rng);
            match FIXED_PAYLOADS.iter().position(|p| *p == payload) {
                Some(index) => fixed_seen[index] = true,
                None => garbage_seen = true,
            }
        }
        assert!(fixed_seen.iter().all(|seen| *seen));
        assert!(garbage_seen);
    }

    #[test]
    fn test_missing_binary_is_launch_error() {
        let injector = FuzzInjector::new(Duration::from_millis(100));
        let err = injector
            .inject(Path::new("/nonexistent/engine-binary"), &[], None)
            .unwrap_err();
        assert!(matches!(err, HarnessError::Launch { .. }));
    }
}
