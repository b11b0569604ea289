use super::{panic_message, Workload, WorkloadContext};
use crate::chess::random_legal_fen;
use crate::engine::{EngineConfig, EngineSession, SearchLimit};
use crate::error::{HarnessError, Result};
use crate::report::EventBus;
use crossbeam_channel::{RecvTimeoutError, Sender};
use serde_json::json;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// What a worker reports to the consumer loop.
///
/// Each worker sends any number of `Progress` messages followed by exactly one
/// terminal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    Progress {
        worker: usize,
        iteration: usize,
        total: usize,
        cp: i32,
    },
    Done {
        worker: usize,
    },
    Failed {
        worker: usize,
        reason: String,
    },
}

impl WorkerMessage {
    pub fn worker(&self) -> usize {
        match self {
            WorkerMessage::Progress { worker, .. }
            | WorkerMessage::Done { worker }
            | WorkerMessage::Failed { worker, .. } => *worker,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerMessage::Progress { .. })
    }
}

impl fmt::Display for WorkerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerMessage::Progress {
                worker,
                iteration,
                total,
                cp,
            } => write!(f, "[Inst#{worker}] {iteration}/{total} cp={cp}"),
            WorkerMessage::Done { worker } => write!(f, "[Inst#{worker}] done"),
            WorkerMessage::Failed { worker, reason } => {
                write!(f, "[Inst#{worker}] ERROR: {reason}")
            }
        }
    }
}

/// Result of one harness run
#[derive(Debug, Default)]
pub struct HarnessSummary {
    /// Workers that finished all iterations, in completion order
    pub completed: Vec<usize>,
    /// One `HarnessError::Worker` per failed worker, in completion order
    pub failures: Vec<HarnessError>,
    /// Every terminal message received, in arrival order
    pub terminals: Vec<WorkerMessage>,
    pub elapsed: Duration,
}

/// N independent sessions analysing random positions in parallel.
///
/// Workers share nothing but the fan-in channel. The calling thread runs the
/// consumer loop and is the only writer to the event bus.
#[derive(Debug, Clone)]
pub struct ConcurrentHarness {
    pub instances: usize,
    pub per_instance: usize,
    pub movetime: f64,
    /// Bounded wait of the consumer loop
    pub poll_interval: Duration,
}

impl ConcurrentHarness {
    pub const PROGRESS_EVERY: usize = 10;
    pub const MAX_PLIES: usize = 8;

    pub fn new(instances: usize, per_instance: usize, movetime: f64) -> Self {
        Self {
            instances,
            per_instance,
            movetime,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn execute(&self, engine: &Path, config: &EngineConfig, bus: &EventBus) -> HarnessSummary {
        let started = Instant::now();
        let mut summary = HarnessSummary::default();
        let (tx, rx) = crossbeam_channel::unbounded::<WorkerMessage>();

        std::thread::scope(|scope| {
            for worker in 0..self.instances {
                let tx = tx.clone();
                scope.spawn(move || {
                    let result =
                        catch_unwind(AssertUnwindSafe(|| self.worker_loop(worker, engine, config, &tx)));
                    let terminal = match result {
                        Ok(Ok(())) => WorkerMessage::Done { worker },
                        Ok(Err(err)) => WorkerMessage::Failed {
                            worker,
                            reason: err.to_string(),
                        },
                        Err(payload) => WorkerMessage::Failed {
                            worker,
                            reason: format!("panic: {}", panic_message(payload.as_ref())),
                        },
                    };
                    if tx.send(terminal).is_err() {
                        debug!("consumer gone before worker {} finished", worker);
                    }
                });
            }
            drop(tx);

            let mut alive = self.instances;
            while alive > 0 {
                match rx.recv_timeout(self.poll_interval) {
                    Ok(message) => {
                        bus.log(message.to_string());
                        if !message.is_terminal() {
                            continue;
                        }
                        alive -= 1;
                        match &message {
                            WorkerMessage::Done { worker } => summary.completed.push(*worker),
                            WorkerMessage::Failed { worker, reason } => {
                                summary.failures.push(HarnessError::Worker {
                                    worker: *worker,
                                    reason: reason.clone(),
                                })
                            }
                            WorkerMessage::Progress { .. } => {}
                        }
                        summary.terminals.push(message);
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => {
                        warn!("{} worker(s) exited without a terminal message", alive);
                        break;
                    }
                }
            }
        });

        summary.elapsed = started.elapsed();
        summary
    }

    fn worker_loop(
        &self,
        worker: usize,
        engine: &Path,
        config: &EngineConfig,
        tx: &Sender<WorkerMessage>,
    ) -> Result<()> {
        let mut rng = rand::thread_rng();
        let mut session = EngineSession::open(engine, config.clone(), None)?;
        let limit = SearchLimit::movetime_secs(self.movetime);

        for iteration in 0..self.per_instance {
            let fen = random_legal_fen(&mut rng, Self::MAX_PLIES);
            let (cp, _) = session.analyze(&fen, limit)?;
            if iteration % Self::PROGRESS_EVERY == 0 {
                // A closed channel only means nobody is listening any more.
                let _ = tx.send(WorkerMessage::Progress {
                    worker,
                    iteration,
                    total: self.per_instance,
                    cp,
                });
            }
        }

        session.close();
        Ok(())
    }
}

impl Workload for ConcurrentHarness {
    fn name(&self) -> &'static str {
        "multi_instance"
    }

    fn run(&self, ctx: &mut WorkloadContext<'_>) -> Result<()> {
        ctx.report.add_test(
            self.name(),
            json!({
                "instances": self.instances,
                "per_instance": self.per_instance,
                "movetime": self.movetime,
            }),
        );

        let summary = self.execute(ctx.engine, ctx.config, ctx.bus);
        for failure in &summary.failures {
            ctx.report.add_note(format!("multi_instance: {failure}"));
        }
        ctx.bus.log(format!(
            "[MultiInstance] {} instances finished in {:.1}s",
            self.instances,
            summary.elapsed.as_secs_f64()
        ));
        Ok(())
    }
}
