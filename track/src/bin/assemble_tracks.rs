use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use track::{
    assemble, AssemblyInput, ContinuationMode, RankingConfig, SearchBudget, SearchConfig,
};

/// Command line arguments for trajectory assembly
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Assemble candidate moving-object paths from per-frame detections"
)]
struct Args {
    /// JSON file with `timestamps` (days) and per-frame `frames` of detections
    #[arg(short, long)]
    input: PathBuf,

    /// Write the ranked report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Proximity gate between consecutive detections (pixels)
    #[arg(long, default_value_t = track::config::DEFAULT_MAX_DISTANCE)]
    max_distance: f64,

    /// Minimum path length in frames
    #[arg(long, default_value_t = track::config::DEFAULT_MIN_PATH_LENGTH)]
    min_length: usize,

    /// Number of longest paths to keep
    #[arg(long, default_value_t = track::config::DEFAULT_MAX_RANKED_PATHS)]
    max_paths: usize,

    /// Stop after expanding this many search nodes
    #[arg(long)]
    max_nodes: Option<usize>,

    /// Stop after recording this many candidate paths
    #[arg(long)]
    max_candidates: Option<usize>,

    /// Explore at most this many continuations per node
    #[arg(long)]
    max_branching: Option<usize>,

    /// Wall-clock limit for the search in seconds
    #[arg(long)]
    max_seconds: Option<f64>,

    /// Continue every origin from frame 1 instead of from its own frame
    #[arg(long)]
    from_sequence_start: bool,

    /// Search frames in parallel
    #[arg(long)]
    parallel: bool,
}

impl Args {
    fn search_config(&self) -> anyhow::Result<SearchConfig> {
        let max_duration = self
            .max_seconds
            .map(Duration::try_from_secs_f64)
            .transpose()
            .context("invalid --max-seconds")?;

        Ok(SearchConfig {
            max_distance: self.max_distance,
            min_path_length: self.min_length,
            continuation: if self.from_sequence_start {
                ContinuationMode::FromSequenceStart
            } else {
                ContinuationMode::RelativeToOrigin
            },
            parallel: self.parallel,
            budget: SearchBudget {
                max_nodes: self.max_nodes,
                max_paths: self.max_candidates,
                max_branching: self.max_branching,
                max_duration,
            },
        })
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let file = File::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let input: AssemblyInput = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", args.input.display()))?;

    log::info!(
        "Loaded {} frames with {} detections from {}",
        input.frames.len(),
        input.frames.total_detections(),
        args.input.display()
    );

    let search = args.search_config()?;
    let ranking = RankingConfig {
        max_paths: args.max_paths,
    };
    let assembly = assemble(&input, &search, &ranking)?;

    if let Some(exceeded) = &assembly.exceeded {
        log::warn!("Partial result: {exceeded}");
    }
    for ranked in assembly.report.paths.iter().take(10) {
        match ranked.velocity.defined() {
            Some(v) => log::info!(
                "#{} len={} frames {}..={} v={:.2}px/day",
                ranked.rank,
                ranked.length,
                ranked.path.start_frame(),
                ranked.path.end_frame(),
                v.speed
            ),
            None => log::info!(
                "#{} len={} frames {}..={} v=undefined",
                ranked.rank,
                ranked.length,
                ranked.path.start_frame(),
                ranked.path.end_frame()
            ),
        }
    }

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, &assembly)?;
    writeln!(writer)?;
    writer.flush()?;

    Ok(())
}
