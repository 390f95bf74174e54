use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

mod aggregate;
mod cache;
mod config;
mod db;
mod entity;
mod error;
mod ingest;
mod models;
mod report;
mod server;
mod store;
mod workload;

use cache::SnapshotCache;
use config::DatabaseConfig;
use entity::{EntityKind, FormValues};
use store::{MemoryStore, RecordStore};

#[derive(Parser)]
#[command(name = "workforce-dashboard")]
#[command(about = "Employee, project and time-tracking dashboard backed by Postgres", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    database: DatabaseConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data into an empty store
    Seed,
    /// Import activities from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show the form fields of a record kind
    Fields { kind: EntityKind },
    /// List records of a kind
    List { kind: EntityKind },
    /// Create a record from FIELD=VALUE pairs
    Create {
        kind: EntityKind,
        #[arg(value_parser = parse_assignment, required = true)]
        values: Vec<(String, String)>,
    },
    /// Change fields of a record; omitted fields keep their value
    Update {
        kind: EntityKind,
        id: i64,
        #[arg(value_parser = parse_assignment, required = true)]
        values: Vec<(String, String)>,
    },
    /// Delete a record; employees and projects take their activities with them
    Delete { kind: EntityKind, id: i64 },
    /// Render the dashboard charts
    Report {
        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Serve the JSON API
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
        /// Keep records in process memory instead of Postgres
        #[arg(long)]
        in_memory: bool,
        /// Seed the store before serving if it is empty
        #[arg(long)]
        seed: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Markdown,
    Json,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got `{raw}`"))?;
    if field.trim().is_empty() {
        return Err(format!("missing field name in `{raw}`"));
    }
    Ok((field.trim().to_string(), value.to_string()))
}

async fn open_cache(database: &DatabaseConfig) -> anyhow::Result<SnapshotCache> {
    let pool = database.connect().await?;
    Ok(SnapshotCache::new(Arc::new(db::PgStore::new(pool))))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    config::init_logging(cli.verbose);
    debug!("verbosity level {}", cli.verbose);

    match cli.command {
        Commands::InitDb => {
            let pool = cli.database.connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let cache = open_cache(&cli.database).await?;
            if ingest::seed(&cache).await? {
                println!("Seed data inserted.");
            } else {
                println!("Store already holds records; nothing seeded.");
            }
        }
        Commands::Import { csv } => {
            let cache = open_cache(&cli.database).await?;
            let summary = ingest::import_csv(&cache, &csv).await?;
            println!(
                "Inserted {} activities from {} ({} skipped).",
                summary.inserted,
                csv.display(),
                summary.skipped
            );
        }
        Commands::Fields { kind } => {
            println!("Fields for {kind}:");
            for field in kind.fields() {
                println!(
                    "- {} ({}, {}): {}",
                    field.name,
                    field.label,
                    field.field_type,
                    field.rule.describe()
                );
            }
        }
        Commands::List { kind } => {
            let cache = open_cache(&cli.database).await?;
            let records = cache.snapshot().await?.entities(kind);
            if records.is_empty() {
                println!("No {kind} records found.");
            }
            for record in records.iter() {
                println!("{record}");
            }
        }
        Commands::Create { kind, values } => {
            let cache = open_cache(&cli.database).await?;
            let form: FormValues = values.into_iter().collect();
            let input = kind
                .parse_form(&form)
                .with_context(|| format!("invalid {kind}"))?;
            let created = cache.create(&input).await?;
            println!("Created {created}");
        }
        Commands::Update { kind, id, values } => {
            let cache = open_cache(&cli.database).await?;
            let current = cache
                .snapshot()
                .await?
                .find(kind, id)
                .with_context(|| format!("{kind} {id} not found"))?;
            let mut form = current.to_form();
            form.extend(values);
            let input = kind
                .parse_form(&form)
                .with_context(|| format!("invalid {kind}"))?;
            let updated = cache.update(id, &input).await?;
            println!("Updated {updated}");
        }
        Commands::Delete { kind, id } => {
            let cache = open_cache(&cli.database).await?;
            let cascaded = cache.delete(kind, id).await?;
            if cascaded > 0 {
                println!("Deleted {kind} {id} and {cascaded} dependent activities.");
            } else {
                println!("Deleted {kind} {id}.");
            }
        }
        Commands::Report { format, out } => {
            let cache = open_cache(&cli.database).await?;
            let snapshot = cache.snapshot().await?;
            let rendered = match format {
                ReportFormat::Markdown => report::build_report(&snapshot),
                ReportFormat::Json => {
                    serde_json::to_string_pretty(&report::build_charts(&snapshot))?
                }
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Commands::Serve {
            bind,
            in_memory,
            seed,
        } => {
            let store: Arc<dyn RecordStore> = if in_memory {
                Arc::new(MemoryStore::new())
            } else {
                Arc::new(db::PgStore::new(cli.database.connect().await?))
            };
            let cache = Arc::new(SnapshotCache::new(store));
            if seed {
                ingest::seed(&cache).await?;
            }
            server::serve(server::AppState::new(cache), bind).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_split_on_first_equals() {
        assert_eq!(
            parse_assignment("description=a=b").unwrap(),
            ("description".to_string(), "a=b".to_string())
        );
        assert!(parse_assignment("minutes").is_err());
        assert!(parse_assignment("=5").is_err());
    }

    #[test]
    fn cli_accepts_plural_kind_names() {
        let cli = Cli::try_parse_from(["workforce-dashboard", "delete", "projects", "4"]).unwrap();
        match cli.command {
            Commands::Delete { kind, id } => {
                assert_eq!(kind, EntityKind::Project);
                assert_eq!(id, 4);
            }
            _ => panic!("expected delete command"),
        }
    }
}
