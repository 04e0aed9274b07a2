//! CLI for cite-footnotes - Convert numbered citations in Markdown documents into footnotes.

use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cite_footnotes::{
    Alphabet, BufferDocument, CitationGroup, CitationKey, CiteError, HttpMetadataExtractor,
    ReferenceMode, ReferencePolicy, Role, Session, Settings, TracingNotifier,
};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Convert numbered citations in Markdown documents into footnotes
#[derive(Parser)]
#[command(name = "cite-footnotes")]
#[command(version)]
#[command(after_help = "\
Examples:
  cite-footnotes convert article.md -o article.md
  cite-footnotes convert article.md --synthesize --fallback last-occurrence
  cite-footnotes convert-one article.md 3
  cat article.md | cite-footnotes list - --json
  cite-footnotes punctuate article.md")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every numeric citation to a footnote
    #[command(after_help = "\
Citation syntax: [1] in text, `[1] Source` or `[1]: Source` as a definition line.
Output syntax:   [^3fa9c1] in text, `[^3fa9c1]: Source` as a definition line.")]
    Convert {
        /// Input Markdown file (use '-' for stdin)
        input: PathBuf,

        #[command(flatten)]
        common: CommonArgs,

        /// Move reference text into a generated section at the end
        #[arg(long)]
        synthesize: bool,

        /// Where reference text comes from when a number has no definition line
        #[arg(long, value_enum)]
        fallback: Option<FallbackArg>,
    },

    /// Convert all occurrences of one citation
    ConvertOne {
        /// Input Markdown file (use '-' for stdin)
        input: PathBuf,

        /// Citation key: a number such as `2`, or `^token` for an existing footnote
        key: String,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// List the citations in a document
    List {
        /// Input Markdown file (use '-' for stdin)
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// Settings file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Move punctuation in front of citation markers and space adjacent markers
    Punctuate {
        /// Input Markdown file (use '-' for stdin)
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a footnote for a URL from its metadata
    Cite {
        /// The URL to cite
        url: String,

        /// Settings file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Identifier alphabet
    #[arg(long, value_enum)]
    alphabet: Option<AlphabetArg>,

    /// Identifier length
    #[arg(long)]
    length: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FallbackArg {
    DefinitionLines,
    LastOccurrence,
}

#[derive(Clone, Copy, ValueEnum)]
enum AlphabetArg {
    Hex,
    Base36,
}

// ---------------------------------------------------------------------------
// AppError: semantic exit codes
// ---------------------------------------------------------------------------

enum AppError {
    /// Exit 10: input file not found / unreadable
    InputFile(String),
    /// Exit 11: settings file not found / invalid
    Config(String),
    /// Exit 12: no unique identifier could be issued
    Identifier(String),
    /// Exit 13: invalid URL or metadata service failure
    Metadata(String),
    /// Exit 14: citation key not found or malformed
    Key(String),
    /// Exit 15: cannot write output file
    OutputFile(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::InputFile(_) => 10,
            AppError::Config(_) => 11,
            AppError::Identifier(_) => 12,
            AppError::Metadata(_) => 13,
            AppError::Key(_) => 14,
            AppError::OutputFile(_) => 15,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InputFile(msg) => {
                write!(f, "{}\n  hint: verify the file path is correct", msg)
            }
            AppError::Config(msg) => {
                write!(
                    f,
                    "{}\n  hint: the settings file must be TOML with [identifier], [references] and [metadata] sections",
                    msg
                )
            }
            AppError::Identifier(msg) => {
                write!(
                    f,
                    "{}\n  hint: use a longer identifier length or the base36 alphabet",
                    msg
                )
            }
            AppError::Metadata(msg) => {
                write!(
                    f,
                    "{}\n  hint: check the URL and the [metadata] endpoint and api_key settings",
                    msg
                )
            }
            AppError::Key(msg) => {
                write!(
                    f,
                    "{}\n  hint: use a citation number such as 2, or ^token for a footnote",
                    msg
                )
            }
            AppError::OutputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the output directory exists and is writable",
                    msg
                )
            }
        }
    }
}

impl From<CiteError> for AppError {
    fn from(e: CiteError) -> Self {
        match e {
            CiteError::Config(_) | CiteError::InvalidIdentifierConfig(_) => {
                AppError::Config(e.to_string())
            }
            CiteError::ExhaustedIdentifierSpace { .. } => AppError::Identifier(e.to_string()),
            CiteError::InvalidUrl { .. } | CiteError::MetadataFetchFailed(_) => {
                AppError::Metadata(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cite_footnotes=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            common,
            synthesize,
            fallback,
        } => {
            let mut settings = load_settings(&common)?;
            if synthesize {
                settings.references.mode = ReferenceMode::Synthesize;
            }
            if let Some(fallback) = fallback {
                settings.references.fallback = match fallback {
                    FallbackArg::DefinitionLines => ReferencePolicy::DefinitionLines,
                    FallbackArg::LastOccurrence => ReferencePolicy::LastOccurrence,
                };
            }
            convert_command(&input, settings, common.output.as_deref(), None)?;
        }
        Commands::ConvertOne { input, key, common } => {
            let key = CitationKey::parse(&key)
                .ok_or_else(|| AppError::Key(format!("'{}' is not a citation key", key)))?;
            let settings = load_settings(&common)?;
            convert_command(&input, settings, common.output.as_deref(), Some(&key))?;
        }
        Commands::List {
            input,
            json,
            config,
        } => {
            let settings = read_settings(config.as_deref())?;
            list_command(&input, settings, json)?;
        }
        Commands::Punctuate { input, output } => {
            punctuate_command(&input, output.as_deref())?;
        }
        Commands::Cite { url, config } => {
            let settings = read_settings(config.as_deref())?;
            cite_command(&url, settings)?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Convert all citations, or the citations of one key.
fn convert_command(
    input: &Path,
    settings: Settings,
    output: Option<&Path>,
    key: Option<&CitationKey>,
) -> Result<(), AppError> {
    let mut doc = BufferDocument::new(read_input(input)?);
    let mut session = Session::new(settings);

    let outcome = match key {
        Some(key) => session.convert_one(&mut doc, key, &TracingNotifier)?,
        None => session.convert_all(&mut doc, &TracingNotifier)?,
    };
    if key.is_some() && !outcome.changed() {
        return Err(AppError::Key(format!(
            "citation [{}] does not occur in the document",
            key.map(ToString::to_string).unwrap_or_default()
        )));
    }

    write_output(output, &doc.into_text())
}

/// Print every citation group with its occurrences.
fn list_command(input: &Path, settings: Settings, json: bool) -> Result<(), AppError> {
    let doc = BufferDocument::new(read_input(input)?);
    let groups = Session::new(settings).browse(&doc);

    let rendered = if json {
        let mut out = serde_json::to_string_pretty(&groups)
            .map_err(|e| AppError::OutputFile(format!("failed to encode JSON: {}", e)))?;
        out.push('\n');
        out
    } else {
        groups.iter().map(describe_group).collect()
    };

    write_output(None, &rendered)
}

fn describe_group(group: &CitationGroup) -> String {
    let lines: Vec<String> = group
        .occurrences
        .iter()
        .map(|o| match o.role {
            Role::Citation => o.line_number.to_string(),
            Role::ReferenceDefinition => format!("{} (definition)", o.line_number),
        })
        .collect();
    let mut out = format!(
        "[{}] {} occurrence(s), lines {}\n",
        group.key,
        group.occurrences.len(),
        lines.join(", ")
    );
    if let Some(text) = &group.reference_text {
        out.push_str(&format!("    {}\n", text));
    }
    out
}

/// Normalize marker punctuation and spacing.
fn punctuate_command(input: &Path, output: Option<&Path>) -> Result<(), AppError> {
    let mut doc = BufferDocument::new(read_input(input)?);
    Session::new(Settings::default()).normalize_punctuation(&mut doc, &TracingNotifier);
    write_output(output, &doc.into_text())
}

/// Print a footnote marker and reference line for a URL.
fn cite_command(url: &str, settings: Settings) -> Result<(), AppError> {
    let extractor = HttpMetadataExtractor::new(&settings.metadata);
    let mut doc = BufferDocument::new(url.trim());
    doc.select_all();

    Session::new(settings).cite_url(&mut doc, &extractor, &TracingNotifier)?;
    write_output(None, &doc.into_text())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_settings(config: Option<&Path>) -> Result<Settings, AppError> {
    let settings = match config {
        Some(path) => Settings::load(path)
            .map_err(|e| AppError::Config(format!("'{}': {}", path.display(), e)))?,
        None => Settings::default(),
    };
    settings.validate()?;
    Ok(settings)
}

/// Settings file plus command-line overrides.
fn load_settings(common: &CommonArgs) -> Result<Settings, AppError> {
    let mut settings = read_settings(common.config.as_deref())?;
    if let Some(alphabet) = common.alphabet {
        settings.identifier.alphabet = match alphabet {
            AlphabetArg::Hex => Alphabet::Hex,
            AlphabetArg::Base36 => Alphabet::Base36,
        };
    }
    if let Some(length) = common.length {
        settings.identifier.length = length;
    }
    settings.validate()?;
    Ok(settings)
}

/// Read the input document (support '-' for stdin).
fn read_input(input: &Path) -> Result<String, AppError> {
    if input == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| AppError::InputFile(format!("failed to read from stdin: {}", e)))?;
        Ok(buf)
    } else {
        fs::read_to_string(input)
            .map_err(|e| AppError::InputFile(format!("'{}': {}", input.display(), e)))
    }
}

/// Write to file or stdout.
fn write_output(output: Option<&Path>, content: &str) -> Result<(), AppError> {
    if let Some(output_path) = output {
        fs::write(output_path, content).map_err(|e| {
            AppError::OutputFile(format!("'{}': {}", output_path.display(), e))
        })?;
        tracing::info!(path = %output_path.display(), "wrote output");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        write!(handle, "{}", content)
            .map_err(|e| AppError::OutputFile(format!("stdout: {}", e)))?;
    }
    Ok(())
}
