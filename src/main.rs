use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use plate_markdown::{Config, Error, Result, plate};
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "plate-md")]
#[command(about = "Convert between Markdown and rich-text editor trees")]
struct Cli {
    /// Serializer config (TOML); bundled defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Markdown -> editor JSON
    ToTree {
        /// Input Markdown file, `-` for stdin
        input: Option<PathBuf>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Editor JSON -> Markdown
    ToMarkdown {
        /// Input JSON file, `-` for stdin
        input: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Resolve relative dates against this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Markdown -> tree -> Markdown
    Normalize {
        input: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => {
            fs::read_to_string(path).map_err(|source| Error::Read {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => {
            let mut content = String::new();
            io::stdin()
                .lock()
                .read_to_string(&mut content)
                .map_err(|source| Error::Read {
                    path: PathBuf::from("<stdin>"),
                    source,
                })?;
            Ok(content)
        }
    }
}

fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => fs::write(path, content).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        }),
        None => io::stdout()
            .lock()
            .write_all(content.as_bytes())
            .map_err(|source| Error::Write {
                path: PathBuf::from("<stdout>"),
                source,
            }),
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match cli.config.as_deref() {
        Some(path) => Config::load(path),
        None => Config::compiled_default(),
    };
    debug!(?config, "loaded config");

    match cli.command {
        Command::ToTree {
            input,
            output,
            pretty,
        } => {
            let markdown = read_input(input.as_deref())?;
            let blocks = plate_markdown::parse(&markdown);
            let mut json = plate::to_json_string(&blocks, pretty);
            json.push('\n');
            write_output(output.as_deref(), &json)
        }
        Command::ToMarkdown {
            input,
            output,
            date,
        } => {
            let json = read_input(input.as_deref())?;
            let blocks = plate::from_json_str(&json)?;
            let markdown = match date {
                Some(today) => plate_markdown::to_markdown_as_of(&blocks, &config, today),
                None => plate_markdown::to_markdown_with_config(&blocks, &config),
            };
            write_output(output.as_deref(), &markdown)
        }
        Command::Normalize { input, output } => {
            let markdown = read_input(input.as_deref())?;
            let blocks = plate_markdown::parse(&markdown);
            let normalized = plate_markdown::to_markdown_with_config(&blocks, &config);
            write_output(output.as_deref(), &normalized)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
