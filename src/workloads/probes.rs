use super::{Workload, WorkloadContext};
use crate::chess::{random_legal_fen, STARTING_FEN};
use crate::engine::{EngineSession, SearchLimit};
use crate::error::Result;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::debug;

/// One start-position analysis through a fully configured session
#[derive(Debug, Clone)]
pub struct UciHandshake {
    pub movetime: f64,
}

impl Workload for UciHandshake {
    fn name(&self) -> &'static str {
        "uci_handshake"
    }

    fn run(&self, ctx: &mut WorkloadContext<'_>) -> Result<()> {
        ctx.report
            .add_test(self.name(), json!({ "movetime": self.movetime }));

        let mut session = EngineSession::open(ctx.engine, ctx.config.clone(), ctx.instrumentation)?;
        let (cp, _) = session.analyze(STARTING_FEN, SearchLimit::movetime_secs(self.movetime))?;
        ctx.bus.log(format!(
            "[UCI] startpos movetime={}ms → cp={}",
            (self.movetime * 1000.0) as u64,
            cp
        ));
        session.close();
        Ok(())
    }
}

/// Many short analyses of random positions in one session
#[derive(Debug, Clone)]
pub struct Burst {
    pub count: usize,
    pub movetime: f64,
}

impl Workload for Burst {
    fn name(&self) -> &'static str {
        "burst"
    }

    fn run(&self, ctx: &mut WorkloadContext<'_>) -> Result<()> {
        ctx.report.add_test(
            self.name(),
            json!({ "count": self.count, "movetime": self.movetime }),
        );

        let mut rng = rand::thread_rng();
        let mut session = EngineSession::open(ctx.engine, ctx.config.clone(), None)?;
        let every = (self.count / 10).max(1);
        let mut nodes_total: u64 = 0;

        for i in 0..self.count {
            let fen = random_legal_fen(&mut rng, 10);
            let (cp, info) = session.analyze(&fen, SearchLimit::movetime_secs(self.movetime))?;
            let nodes = info.nodes.unwrap_or(0);
            nodes_total += nodes;
            if i % every == 0 {
                ctx.bus.log(format!(
                    "[Burst {}/{}] cp={} nodes={}",
                    i + 1,
                    self.count,
                    cp,
                    nodes
                ));
            }
        }

        let average = nodes_total as f64 / self.count.max(1) as f64;
        ctx.bus.log(format!(
            "[Burst] Done {} pos | total_nodes={} | avg={:.0}",
            self.count, nodes_total, average
        ));
        session.close();
        Ok(())
    }
}

/// Analyse random positions until a wall-clock deadline, tracking peak resource use
#[derive(Debug, Clone)]
pub struct Endurance {
    pub duration: Duration,
    pub movetime: f64,
}

impl Workload for Endurance {
    fn name(&self) -> &'static str {
        "endurance"
    }

    fn run(&self, ctx: &mut WorkloadContext<'_>) -> Result<()> {
        ctx.report.add_test(
            self.name(),
            json!({ "duration_s": self.duration.as_secs_f64(), "movetime": self.movetime }),
        );

        let mut rng = rand::thread_rng();
        let started = Instant::now();
        let mut iterations: u64 = 0;
        let mut cpu_peak: f32 = 0.0;
        let mut rss_peak: u64 = 0;

        let mut session = EngineSession::open(ctx.engine, ctx.config.clone(), None)?;
        while started.elapsed() < self.duration {
            let fen = random_legal_fen(&mut rng, 14);
            let (cp, _) = session.analyze(&fen, SearchLimit::movetime_secs(self.movetime))?;
            iterations += 1;

            if let Some(snapshot) = session.resource_snapshot() {
                cpu_peak = cpu_peak.max(snapshot.cpu_percent);
                rss_peak = rss_peak.max(snapshot.rss_bytes);
            }
            if iterations % 10 == 0 {
                ctx.bus.log(format!("[Endurance] it={} cp={}", iterations, cp));
            }
        }
        session.close();

        ctx.bus.log(format!(
            "[Endurance] OK {} iters | cpu_peak={:.1}% | rss_peak={:.1}MB",
            iterations,
            cpu_peak,
            rss_peak as f64 / 1e6
        ));
        Ok(())
    }
}

/// Nodes per second at increasing thread counts, relative to one thread
#[derive(Debug, Clone)]
pub struct ThreadsScaling {
    pub movetime: f64,
    pub max_threads: u32,
}

impl ThreadsScaling {
    pub const THREAD_COUNTS: [u32; 4] = [1, 2, 4, 8];
}

impl Workload for ThreadsScaling {
    fn name(&self) -> &'static str {
        "threads_scaling"
    }

    fn run(&self, ctx: &mut WorkloadContext<'_>) -> Result<()> {
        ctx.report.add_test(
            self.name(),
            json!({ "movetime": self.movetime, "max_threads": self.max_threads }),
        );

        let mut results: Vec<(u32, f64)> = Vec::new();
        for threads in Self::THREAD_COUNTS {
            if threads > self.max_threads {
                break;
            }
            let started = Instant::now();
            let config = ctx.config.clone().with_threads(threads);
            let mut session = EngineSession::open(ctx.engine, config, ctx.instrumentation)?;
            let (cp, info) = session.analyze(STARTING_FEN, SearchLimit::movetime_secs(self.movetime))?;
            let nodes = info.nodes.unwrap_or(0);
            let elapsed = started.elapsed().as_secs_f64();
            let nps = nodes as f64 / elapsed.max(1e-6);
            session.close();

            ctx.bus.log(format!(
                "[Threads] T={} cp={} nodes={} time={:.3}s nps={}",
                threads, cp, nodes, elapsed, nps as u64
            ));
            results.push((threads, nps));
        }

        if let Some(&(_, base)) = results.first() {
            let base = if base > 0.0 { base } else { 1.0 };
            for (threads, nps) in &results {
                ctx.bus
                    .log(format!("[Threads] scale(T={})={:.2}x", threads, nps / base));
            }
        } else {
            debug!("threads scaling skipped: max_threads={}", self.max_threads);
        }
        Ok(())
    }
}

/// Start-position analysis with several ranked lines requested
#[derive(Debug, Clone)]
pub struct MultiPv {
    pub movetime: f64,
    pub multipv: u32,
}

impl Workload for MultiPv {
    fn name(&self) -> &'static str {
        "multipv"
    }

    fn run(&self, ctx: &mut WorkloadContext<'_>) -> Result<()> {
        ctx.report.add_test(
            self.name(),
            json!({ "movetime": self.movetime, "multipv": self.multipv }),
        );

        let config = ctx.config.clone().with_multipv(self.multipv);
        let mut session = EngineSession::open(ctx.engine, config, None)?;
        let (cp, info) = session.analyze(STARTING_FEN, SearchLimit::movetime_secs(self.movetime))?;
        session.close();

        ctx.bus.log(format!(
            "[MultiPV] cp={} lines={} best={}",
            cp,
            info.multipv(),
            info.best_move.as_deref().unwrap_or("(none)")
        ));
        Ok(())
    }
}
