//! Patternlog CLI
//!
//! Command-line interface for the pattern journal:
//! - Classify entry details
//! - Log entries and cascades
//! - Show discoveries and patterns
//! - Check status

use anyhow::{bail, Context};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use patternlog::config::{generate_default_config, Config, LoggingConfig};
use patternlog::{
    explain, Classification, Discovery, ExtractedPattern, JournalObservation, PatternCategory,
    PatternEngine, PatternId, SqliteStore, TimeRange,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "patternlog")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pattern correlation for a behavior and mood journal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show which pattern types a set of details maps to
    Classify {
        /// Detail strings, exactly as shown in the entry form
        details: Vec<String>,
    },

    /// Record a journal entry
    Log {
        /// Detail strings picked for the entry
        #[arg(short, long = "detail", required = true)]
        details: Vec<String>,
        /// Trigger tags
        #[arg(short = 'T', long = "trigger")]
        triggers: Vec<String>,
        /// Coping strategy tags
        #[arg(short = 'C', long = "coping")]
        coping: Vec<String>,
        /// Intensity (1-5)
        #[arg(short, long)]
        intensity: Option<i64>,
        /// Timestamp (default: now). Supports: "now", "yesterday", ISO 8601, Unix millis
        #[arg(short, long)]
        time: Option<String>,
        /// Journal entry id (default: random)
        #[arg(short, long)]
        entry: Option<String>,
        /// Free-text note
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Record a cascade between two patterns
    Cascade {
        from: PatternId,
        to: PatternId,
        #[arg(long, default_value = "0.5")]
        confidence: f64,
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Show discoveries
    Discoveries {
        /// Time range (e.g., 7d, 30d, 4w, 3m). Default: config window or all history
        #[arg(short, long)]
        last: Option<String>,
    },

    /// Show one pattern and its cascades
    Show { id: PatternId },

    /// List the pattern taxonomy
    Types,

    /// Show store status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_tracing(&config.logging)?;

    match cli.command {
        Commands::Classify { details } => {
            let breakdown = explain(&details);
            match cli.format {
                OutputFormat::Json => print_json(&breakdown)?,
                OutputFormat::Table => {
                    if details.is_empty() {
                        println!("No details given.");
                    }
                    for detail in &details {
                        println!("{:<32} {}", detail, describe_match(detail, &breakdown));
                    }
                }
            }
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &content)?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }

        Commands::Types => {
            for category in PatternCategory::all() {
                println!("{} {}", category.icon(), category.display_name());
                for pattern_type in category.pattern_types() {
                    println!("  {:<28} {}", pattern_type.as_str(), pattern_type.display_name());
                }
            }
        }

        command => run_with_engine(command, &config, cli.format).await?,
    }

    Ok(())
}

async fn run_with_engine(
    command: Commands,
    config: &Config,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let data_dir = config.storage.data_path();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory {:?}", data_dir))?;

    let db_path = config.storage.database_path();
    tracing::debug!("Database: {:?}", db_path);
    let store = SqliteStore::open(&db_path)?;
    let engine = PatternEngine::open(store, config.engine_config()).await?;

    match command {
        Commands::Log {
            details,
            triggers,
            coping,
            intensity,
            time,
            entry,
            note,
        } => {
            let timestamp = parse_timestamp(time.as_deref())?;
            let entry_id = entry.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            let mut observation = JournalObservation::new(entry_id, timestamp).details(details);
            observation.triggers = triggers;
            observation.coping_strategies = coping;
            observation.intensity = intensity;
            observation.note = note;

            let outcome = engine.record_entry(observation).await?;
            match format {
                OutputFormat::Json => print_json(&outcome.patterns)?,
                OutputFormat::Table => {
                    if outcome.is_empty() {
                        println!("Entry recorded; no patterns matched its details.");
                    } else {
                        print_patterns(&outcome.patterns);
                    }
                    for failed in &outcome.failed_links {
                        eprintln!("Cascade {} -> {} not saved: {}", failed.from, failed.to, failed.error);
                    }
                    for error in &outcome.link_errors {
                        eprintln!("Automatic linking skipped: {}", error);
                    }
                }
            }
        }

        Commands::Cascade {
            from,
            to,
            confidence,
            description,
        } => {
            let edge = engine
                .propose_cascade(from, to, confidence, description)
                .await?;
            match format {
                OutputFormat::Json => print_json(&edge)?,
                OutputFormat::Table => println!(
                    "Cascade {}: {} -> {} (confidence {:.2})",
                    edge.id, edge.from_pattern, edge.to_pattern, edge.confidence
                ),
            }
        }

        Commands::Discoveries { last } => {
            let discoveries = match last {
                Some(last) => {
                    let days = parse_duration(&last)?.num_days();
                    engine.discoveries(Some(TimeRange::last_days(days))).await?
                }
                None => engine.recent_discoveries().await?,
            };

            match format {
                OutputFormat::Json => print_json(&discoveries)?,
                OutputFormat::Table => print_discoveries(&discoveries),
            }
        }

        Commands::Show { id } => {
            let Some(pattern) = engine.get_pattern(id).await? else {
                bail!("Pattern not found: {}", id);
            };
            let links = engine.links(id).await;

            match format {
                OutputFormat::Json => {
                    #[derive(Serialize)]
                    struct Shown<'a> {
                        pattern: &'a ExtractedPattern,
                        cascades: &'a patternlog::CascadeLinks,
                    }
                    print_json(&Shown {
                        pattern: &pattern,
                        cascades: &links,
                    })?
                }
                OutputFormat::Table => {
                    print_patterns(std::slice::from_ref(&pattern));
                    if !pattern.triggers.is_empty() {
                        println!("  Triggers: {}", pattern.triggers.join(", "));
                    }
                    if !pattern.coping_strategies.is_empty() {
                        println!("  Coping:   {}", pattern.coping_strategies.join(", "));
                    }
                    if let Some(details) = &pattern.details {
                        println!("  Details:  {}", details);
                    }
                    for edge in &links.incoming {
                        println!("  <- {} ({:.2})", edge.from_pattern, edge.confidence);
                    }
                    for edge in &links.outgoing {
                        println!("  -> {} ({:.2})", edge.to_pattern, edge.confidence);
                    }
                }
            }
        }

        Commands::Status => {
            let stats = engine.stats().await?;
            match format {
                OutputFormat::Json => print_json(&stats)?,
                OutputFormat::Table => {
                    println!("Patternlog v{}", env!("CARGO_PKG_VERSION"));
                    println!();
                    println!("Database: {:?}", db_path);
                    println!("  Patterns: {}", stats.patterns);
                    println!("  Cascades: {}", stats.cascades);
                    if stats.skipped_rows > 0 {
                        println!("  Unreadable rows skipped: {}", stats.skipped_rows);
                    }
                }
            }
        }

        Commands::Classify { .. } | Commands::Types | Commands::Config { .. } => {}
    }

    Ok(())
}

fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("patternlog={}", config.level)));

    let writer = match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .init();
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_patterns(patterns: &[ExtractedPattern]) {
    println!(
        "{:<36}  {:<26} {:<22} {:>9}  {}",
        "ID", "Type", "Category", "Intensity", "Time"
    );
    println!("{}", "-".repeat(115));
    for pattern in patterns {
        let intensity = match pattern.intensity() {
            0 => "-".to_string(),
            n => n.to_string(),
        };
        println!(
            "{:<36}  {:<26} {:<22} {:>9}  {}",
            pattern.id(),
            pattern.pattern_type().display_name(),
            pattern.category().display_name(),
            intensity,
            format_timestamp(pattern.timestamp())
        );
    }
}

fn print_discoveries(discoveries: &[Discovery]) {
    if discoveries.is_empty() {
        println!("No discoveries yet. Patterns need to repeat at least twice.");
        return;
    }

    for discovery in discoveries {
        println!(
            "[{}] {} x{} ({} - {})",
            discovery.confidence_tier,
            discovery.pattern_type.display_name(),
            discovery.occurrences,
            format_timestamp(discovery.first_seen),
            format_timestamp(discovery.last_seen)
        );
        println!("  {}", discovery.insight_text);
        if let Some(avg) = discovery.average_intensity {
            println!("  Average intensity: {:.1}", avg);
        }
        println!();
    }
}

fn format_timestamp(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_timestamp(value: Option<&str>) -> anyhow::Result<i64> {
    match value {
        None | Some("now") => Ok(Utc::now().timestamp_millis()),
        Some("yesterday") => Ok((Utc::now() - Duration::days(1)).timestamp_millis()),
        Some(s) => {
            if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
                Ok(dt.timestamp_millis())
            } else if let Ok(ts) = s.parse::<i64>() {
                Ok(ts)
            } else {
                bail!("Invalid timestamp format: {}", s)
            }
        }
    }
}

/// Pattern names a detail maps to, or `(no match)` when no rule covers it
fn describe_match(detail: &str, breakdown: &[Classification]) -> String {
    match breakdown.iter().find(|row| row.detail == detail) {
        Some(row) if !row.patterns.is_empty() => row
            .patterns
            .iter()
            .map(|p| p.display_name())
            .collect::<Vec<_>>()
            .join(", "),
        _ => "(no match)".to_string(),
    }
}

fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim().to_lowercase();

    let (count, unit_days) = if let Some(days) = s.strip_suffix('d') {
        (days, 1)
    } else if let Some(weeks) = s.strip_suffix('w') {
        (weeks, 7)
    } else if let Some(months) = s.strip_suffix('m') {
        (months, 30)
    } else if let Some(years) = s.strip_suffix('y') {
        (years, 365)
    } else {
        bail!("Invalid duration format: {}. Use: 7d, 4w, 3m, 1y", s)
    };

    let count: i64 = count.parse()?;
    if count < 0 {
        bail!("Duration must not be negative: {}", s);
    }
    count
        .checked_mul(unit_days)
        .and_then(Duration::try_days)
        .ok_or_else(|| anyhow::anyhow!("Duration out of range: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30d").unwrap(), Duration::days(30));
        assert_eq!(parse_duration("2W").unwrap(), Duration::days(14));
        assert_eq!(parse_duration("3m").unwrap(), Duration::days(90));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-3d").is_err());
        assert!(parse_duration("200000000000d").is_err());
        assert!(parse_duration("9223372036854775807y").is_err());
    }

    #[test]
    fn test_describe_match() {
        let breakdown = explain(["Noise level", "Humming"]);
        assert_eq!(
            describe_match("Noise level", &breakdown),
            "Noise Sensitivity, Sensory Overload"
        );
        assert_eq!(describe_match("Humming", &breakdown), "(no match)");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp(Some("2024-01-15T10:00:00Z")).unwrap(),
            1_705_312_800_000
        );
        assert_eq!(parse_timestamp(Some("1705312800000")).unwrap(), 1_705_312_800_000);
        assert!(parse_timestamp(Some("last tuesday")).is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "patternlog",
            "log",
            "-d",
            "Noise level",
            "--trigger",
            "cafe",
            "--format",
            "json",
        ])
        .unwrap();
        assert!(cli.format == OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Log { ref details, .. } if details == &["Noise level"]));
    }
}
