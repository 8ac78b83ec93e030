use cache2_config::{Config, Format};
use cache2_entry::{CacheEntry, Metadata, RESPONSE_HEAD};
use cache2_profile::{CacheRoot, ProfilePattern, entry_files};
use clap::Parser;
use std::fmt::Write as _;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

/// Dump the metadata of browser cache2 entry files
#[derive(Parser, Debug)]
#[command(name = "cache2")]
#[command(version, about, long_about = None)]
struct Args {
    /// Entry files to decode; the profile's entries folder is scanned when none are given
    paths: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, env = "CACHE2_CONFIG")]
    config: Option<PathBuf>,

    /// Profile folder pattern, matched as `*.<PROFILE>`
    #[arg(short, long)]
    profile: Option<String>,

    /// Directory holding the profile folders
    #[arg(long)]
    cache_root: Option<PathBuf>,

    /// Output format: text (or txt), json
    #[arg(short, long, value_parser = parse_format)]
    format: Option<Format>,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_format(value: &str) -> Result<Format, String> {
    value.parse::<Format>().map_err(|err| err.to_string())
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(profile) = &self.profile {
            config.profile = profile.clone();
        }
        if let Some(cache_root) = &self.cache_root {
            config.cache_root = Some(cache_root.clone());
        }
        if let Some(format) = self.format {
            config.format = format;
        }
    }
}

fn init_subscriber(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_subscriber(args.verbose);

    let (config, pattern) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(err) => {
            tracing::error!(error = ?err, "Failed to load configuration");
            return ExitCode::from(2);
        },
    };

    let files = if args.paths.is_empty() {
        match discover(config.cache_root.as_deref(), &pattern) {
            Ok(files) => files,
            Err(err) => {
                tracing::error!(error = ?err, "Failed to discover cache entries");
                return ExitCode::from(2);
            },
        }
    } else {
        args.paths.clone()
    };

    let mut out = BufWriter::new(io::stdout().lock());
    match dump(&files, config.format, &mut out).and_then(|failed| out.flush().map(|()| failed)) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            tracing::warn!(failed, total = files.len(), "Some entries could not be decoded");
            ExitCode::FAILURE
        },
        Err(err) => {
            tracing::error!(error = %err, "Failed to write output");
            ExitCode::from(2)
        },
    }
}

/// Loaded configuration with command-line overrides applied, plus its
/// compiled profile pattern.
fn load_config(args: &Args) -> cache2_config::error::Result<(Config, ProfilePattern)> {
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    let pattern = config.profile_pattern()?;
    tracing::info!(
        profile = %config.profile,
        format = %config.format,
        cache_root = ?config.cache_root,
        "Configuration loaded"
    );
    Ok((config, pattern))
}

fn discover(cache_root: Option<&Path>, pattern: &ProfilePattern) -> cache2_profile::error::Result<Vec<PathBuf>> {
    let root = match cache_root {
        Some(dir) => CacheRoot::new(dir)?,
        None => CacheRoot::discover()?,
    };
    let dir = root.entries_dir(pattern)?;
    let files = entry_files(&dir)?;
    tracing::info!(root = %root.path().display(), dir = %dir.display(), files = files.len(), "Scanning entries");
    Ok(files)
}

/// Writes every decodable entry to `out` and returns how many failed.
///
/// A file that fails to decode is logged and skipped; only write errors
/// abort the batch.
fn dump(files: &[PathBuf], format: Format, out: &mut impl Write) -> io::Result<usize> {
    let mut failed = 0;
    for path in files {
        let entry = match cache2_entry::decode(path) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = ?err, "Skipping undecodable entry");
                failed += 1;
                continue;
            },
        };
        match format {
            Format::Json => writeln!(out, "{}", render_json(&entry)?)?,
            Format::Text => writeln!(out, "{}", render_text(entry.path(), entry.metadata()))?,
        }
    }
    Ok(failed)
}

fn render_json(entry: &CacheEntry) -> io::Result<String> {
    Ok(serde_json::to_string(entry)?)
}

fn timestamp(at: &OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

fn render_text(path: &Path, metadata: &Metadata) -> String {
    let mut text = String::new();
    let mut line = |name: &str, value: &dyn std::fmt::Display| {
        let _ = writeln!(text, "{name}: {value}");
    };
    line("path", &path.display());
    line("key", &metadata.key);
    if !metadata.key_tags.is_empty() {
        line("key_tags", &metadata.key_tags.join(" "));
    }
    line("version", &metadata.version);
    line("content_size", &metadata.content_size);
    line("fetch_count", &metadata.fetch_count);
    line("frecency", &metadata.frecency);
    line("last_fetched_at", &timestamp(&metadata.last_fetched_at));
    line("last_modified_at", &timestamp(&metadata.last_modified_at));
    line("expire_at", &timestamp(&metadata.expire_at));
    if let Some(flags) = metadata.flags {
        line("flags", &format_args!("{flags:#010x}"));
    }
    if let Some(content_type) = &metadata.content_type {
        line("content_type", content_type);
    }
    if let Some(content_encoding) = &metadata.content_encoding {
        line("content_encoding", content_encoding);
    }
    for (name, value) in &metadata.attributes {
        // The response head is multi-line; its useful parts are shown above.
        if name == RESPONSE_HEAD {
            continue;
        }
        line(&format!("attr.{name}"), value);
    }
    text
}
