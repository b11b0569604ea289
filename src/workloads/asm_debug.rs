use super::{Workload, WorkloadContext};
use crate::engine::{CommandSink, EngineSession};
use crate::error::Result;
use crate::instrumentation::InstrumentationManifest;
use crate::report::EventBus;
use serde_json::json;
use std::time::Duration;

const SYMBOL_PREVIEW: usize = 5;
const TRACE_PREVIEW_LINES: usize = 6;
const MAX_CAPTURE_WAIT: Duration = Duration::from_millis(500);

/// Diagnostics for engines built with assembly debug hooks
#[derive(Debug, Clone)]
pub struct AssemblyDebug {
    pub capture: Duration,
}

impl Default for AssemblyDebug {
    fn default() -> Self {
        Self {
            capture: Duration::from_millis(1500),
        }
    }
}

impl AssemblyDebug {
    fn log_symbols(manifest: &InstrumentationManifest, bus: &EventBus) {
        let symbols = manifest.assembly_map();
        for entry in symbols.iter().take(SYMBOL_PREVIEW) {
            let size = entry
                .size
                .map(|size| size.to_string())
                .unwrap_or_else(|| "?".to_string());
            bus.log(format!(
                "[ASM] breakpoint {} @ {} size={}",
                entry.symbol,
                entry.address.as_deref().unwrap_or("?"),
                size
            ));
        }
        if symbols.len() > SYMBOL_PREVIEW {
            bus.log(format!(
                "[ASM] … {} more entries",
                symbols.len() - SYMBOL_PREVIEW
            ));
        }
    }

    fn exercise(&self, ctx: &WorkloadContext<'_>, manifest: &InstrumentationManifest) -> Result<()> {
        let mut session = EngineSession::open(ctx.engine, ctx.config.clone(), Some(manifest))?;
        // Replayed with logging this time so the activity shows up in the transcript.
        let _ = manifest.activate(&mut session, Some(ctx.bus));

        if let Some(probe) = manifest.probe("asm_state") {
            ctx.bus.log(format!("[ASM] requesting probe: {probe}"));
            if let Err(err) = session.send_command(probe) {
                ctx.bus.log(format!("[ASM] probe command failed: {err}"));
            }
        }
        std::thread::sleep(self.capture.min(MAX_CAPTURE_WAIT));
        session.close();
        Ok(())
    }
}

impl Workload for AssemblyDebug {
    fn name(&self) -> &'static str {
        "assembly_debug"
    }

    fn run(&self, ctx: &mut WorkloadContext<'_>) -> Result<()> {
        let manifest_path = ctx
            .instrumentation
            .and_then(InstrumentationManifest::source)
            .map(|p| p.display().to_string());
        ctx.report.add_test(
            self.name(),
            json!({
                "capture_seconds": self.capture.as_secs_f64(),
                "manifest": manifest_path,
            }),
        );

        let Some(manifest) = ctx.instrumentation.filter(|m| m.supports_assembly_debug()) else {
            ctx.bus
                .log("[ASM] instrumentation package not detected, skipping assembly diagnostics");
            if let Some(error) = ctx.instrumentation.and_then(InstrumentationManifest::error) {
                ctx.report
                    .add_note(format!("asm_debug manifest error: {error}"));
            }
            return Ok(());
        };

        ctx.bus
            .log(format!("[ASM] instrumentation → {}", manifest.describe()));
        Self::log_symbols(manifest, ctx.bus);

        if let Err(err) = self.exercise(ctx, manifest) {
            ctx.bus.log(format!("[ASM] engine session failed: {err}"));
            ctx.report.add_note(format!("asm_debug error: {err}"));
            return Ok(());
        }

        let trace = manifest.capture_trace_preview();
        match trace.value().map(String::as_str) {
            Some(text) if !text.is_empty() => {
                let lines: Vec<&str> = text
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .take(TRACE_PREVIEW_LINES)
                    .collect();
                if lines.is_empty() {
                    ctx.bus.log("[ASM] trace file contained no printable lines");
                } else {
                    ctx.bus.log("[ASM] trace preview:");
                    for line in lines {
                        ctx.bus.log(format!("[ASM] | {line}"));
                    }
                }
            }
            _ => ctx.bus.log("[ASM] no trace data available"),
        }

        for warning in manifest.warnings() {
            ctx.bus.log(format!("[ASM] warning: {warning}"));
        }
        Ok(())
    }
}
