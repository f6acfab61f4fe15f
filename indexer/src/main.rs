use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indexer::{build_index, lookup};
use melodex_core::persist::IndexPaths;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect melody n-gram indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from a corpus of p:/pi: records. Existing index files are overwritten.
    Build {
        /// Index base name; files are written as <INDEX>.fipp, .filp, .fdl and .meta.json
        index: PathBuf,
        /// Corpus file
        corpus: PathBuf,
    },
    /// List the documents containing a 5-symbol pitch gram
    Lookup {
        /// Index base name
        index: PathBuf,
        /// Pitch gram, e.g. "abcde"
        gram: String,
        /// Print the result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { index, corpus } => {
            tracing::info!(corpus = %corpus.display(), "indexing");
            let f = File::open(&corpus).with_context(|| format!("opening {}", corpus.display()))?;
            let summary = build_index(BufReader::new(f), &IndexPaths::new(&index))?;
            tracing::info!(index = %index.display(), num_docs = summary.num_docs, "index build complete");
            Ok(())
        }
        Commands::Lookup { index, gram, json } => {
            let result = lookup(&IndexPaths::new(&index), &gram)?;
            if json {
                println!("{}", serde_json::to_string(&result)?);
            } else {
                for hit in &result.documents {
                    println!("{}\t{}", hit.doc_id, hit.title);
                }
            }
            Ok(())
        }
    }
}
