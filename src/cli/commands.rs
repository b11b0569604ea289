use crate::config::Settings;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cestt")]
#[command(about = "Stress-test UCI chess engines and report how they hold up")]
pub struct Cli {
    /// Path to the engine executable
    #[arg(long)]
    pub engine: PathBuf,

    /// Extra argument passed to the engine (repeatable)
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// Seconds per analysis [default: 0.1]
    #[arg(long)]
    pub movetime: Option<f64>,

    /// Endurance run length in seconds [default: 60]
    #[arg(long)]
    pub duration: Option<u64>,

    /// Positions in the burst test [default: 200]
    #[arg(long)]
    pub burst: Option<usize>,

    /// Highest thread count tried by the scaling test [default: 8]
    #[arg(long)]
    pub threads_max: Option<u32>,

    /// Parallel engine instances [default: 4]
    #[arg(long)]
    pub instances: Option<usize>,

    /// Analyses per parallel instance [default: 50]
    #[arg(long)]
    pub per_instance: Option<usize>,

    /// Length of the protocol fuzz run in seconds [default: 10]
    #[arg(long)]
    pub fuzz_seconds: Option<u64>,

    /// Comma list: uci,burst,endurance,threads,multipv,instances,fuzz,asm,pro
    ///
    /// Use 'auto' for the default selection [default: uci,burst,threads,multipv]
    #[arg(long)]
    pub tests: Option<String>,

    /// Settings file (TOML); defaults to the per-user config file if present
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Flags given on the command line win over file settings
    pub fn apply(&self, settings: &mut Settings) {
        if !self.engine_args.is_empty() {
            settings.engine.args = self.engine_args.clone();
        }
        if let Some(movetime) = self.movetime {
            settings.movetime = movetime;
        }
        if let Some(duration) = self.duration {
            settings.duration = duration;
        }
        if let Some(burst) = self.burst {
            settings.burst = burst;
        }
        if let Some(threads_max) = self.threads_max {
            settings.threads_max = threads_max;
        }
        if let Some(instances) = self.instances {
            settings.instances = instances;
        }
        if let Some(per_instance) = self.per_instance {
            settings.per_instance = per_instance;
        }
        if let Some(fuzz_seconds) = self.fuzz_seconds {
            settings.fuzz_seconds = fuzz_seconds;
        }
        if let Some(tests) = &self.tests {
            settings.tests = tests.clone();
        }
    }
}
