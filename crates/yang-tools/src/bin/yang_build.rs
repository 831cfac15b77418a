//!
//! Build YANG statement trees into an effective model.
//!
//! Usage: `yang-build <sources...> [--library DIR]... [--config FILE] [--strict] [--json]`

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

use yang_reactor::{DiagnosticFormatter, StatementStreamSource, UnknownStatementPolicy};
use yang_tools::{collect_sources, load_config, summarize};

#[derive(Parser, Debug)]
#[command(name = "yang-build")]
#[command(about = "Build JSON statement trees of YANG modules into an effective model")]
struct Args {
    /// Source files or directories of `*.json` statement trees to build
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Directories or files with modules the sources may import or include
    #[arg(long = "library", short = 'L')]
    libraries: Vec<PathBuf>,

    /// Reactor configuration (JSON)
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Reject statements without a statement support
    #[arg(long)]
    strict: bool,

    /// Print the whole effective model as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    yang_tools::init_logging();

    let args = Args::parse();

    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            process::exit(2);
        }
    };
    if args.strict {
        config.unknown_statements = UnknownStatementPolicy::Strict;
    }

    let collected = (collect_sources(&args.sources), collect_sources(&args.libraries));
    let (sources, libraries) = match collected {
        (Ok(sources), Ok(libraries)) => (sources, libraries),
        (Err(err), _) | (_, Err(err)) => {
            error!("{err}");
            process::exit(2);
        }
    };
    info!(sources = sources.len(), libraries = libraries.len(), "building");

    let reactor = yang_stmt::default_reactor_with(config);
    let requested: Vec<&dyn StatementStreamSource> =
        sources.iter().map(|s| s as &dyn StatementStreamSource).collect();
    let library: Vec<&dyn StatementStreamSource> =
        libraries.iter().map(|s| s as &dyn StatementStreamSource).collect();

    let model = match reactor.build(&requested, &library) {
        Ok(model) => model,
        Err(err) => {
            eprint!("{}", DiagnosticFormatter::new().format_all(err.errors()));
            error!("{err}");
            process::exit(1);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&model) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                error!("Failed to encode the model: {err}");
                process::exit(1);
            }
        }
    } else {
        for summary in summarize(&model) {
            println!("{summary}");
        }
    }
}
