use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use melodex_core::ScoringMode;
use search::{parse_num_of_answers, run, OutputFormat, SearchConfig, MAX_JOBS};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// R^2 * pitch^2 + ioi^2
    Weighted,
    /// pitch + ioi
    Additive,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Plain,
    Json,
}

/// Rank corpus melodies against queries read from stdin, one record per line.
#[derive(Parser)]
#[command(name = "search")]
struct Args {
    /// Corpus file of p:/pi: records
    corpus: PathBuf,
    /// Start each output line with the query's title
    #[arg(long, default_value_t = false)]
    query_id: bool,
    /// Number of answers per query; 0 or unparsable means 10
    #[arg(long, env = "FNM_NUM_OF_ANSWERS")]
    num_of_answers: Option<String>,
    #[arg(long, value_enum, default_value_t = Mode::Weighted)]
    mode: Mode,
    #[arg(long, value_enum, default_value_t = Format::Plain)]
    format: Format,
    /// Worker threads per corpus scan, at most 256
    #[arg(long, default_value_t = 1)]
    jobs: usize,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).init();
    let args = Args::parse();

    if args.jobs > MAX_JOBS {
        tracing::warn!(requested = args.jobs, max = MAX_JOBS, "clamping worker count");
    }
    let cfg = SearchConfig {
        num_of_answers: parse_num_of_answers(args.num_of_answers.as_deref()),
        mode: match args.mode {
            Mode::Weighted => ScoringMode::Weighted,
            Mode::Additive => ScoringMode::Additive,
        },
        include_query_id: args.query_id,
        format: match args.format {
            Format::Plain => OutputFormat::Plain,
            Format::Json => OutputFormat::Json,
        },
        jobs: args.jobs.clamp(1, MAX_JOBS),
    };

    let f = File::open(&args.corpus).with_context(|| format!("opening {}", args.corpus.display()))?;
    let mut corpus = BufReader::new(f);
    tracing::info!(corpus = %args.corpus.display(), k = cfg.num_of_answers, jobs = cfg.jobs, "search ready");

    let stdout = io::stdout();
    let summary = run(&mut corpus, io::stdin().lock(), &mut stdout.lock(), &cfg)?;
    tracing::info!(queries = summary.queries, failed = summary.failed, "search finished");
    if summary.failed > 0 {
        bail!("{} of {} queries failed", summary.failed, summary.queries);
    }
    Ok(())
}
