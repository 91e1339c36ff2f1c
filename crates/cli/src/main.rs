//! Thin command surface over the storage and catalog crates.
//!
//! Every command loads the configuration, builds a folder handle and calls
//! the public contracts; no storage or selection logic lives here.

use clap::{Args, Parser, Subcommand};
use std::io::{BufReader, Write};
use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use walvault_catalog::{
    BackupSelector, BeforeTimeBackupSelector, LatestBackupSelector, NamedBackupSelector, PatternBackupSelector,
};
use walvault_storage::BoxSyncRead;

#[derive(Parser)]
#[command(name = "walvault", version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Environment variables
    /// (`WALVAULT_*`) override values from the file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List objects and sub-folders under a storage prefix.
    Ls {
        /// Prefix relative to the storage root.
        prefix: Option<String>,
    },
    /// Write an object's content to stdout.
    Cat {
        /// Object path relative to the storage root.
        path: String,
    },
    /// Upload a local file.
    Put {
        /// Local file to upload.
        local: PathBuf,
        /// Destination path relative to the storage root.
        remote: String,
    },
    /// Delete objects. Absent objects are ignored.
    Rm {
        /// Object paths relative to the storage root.
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// List completed backups, oldest first.
    BackupList,
    /// Resolve a single backup and print its name.
    BackupResolve {
        #[command(flatten)]
        selector: SelectorArgs,
    },
}

#[derive(Args)]
#[group(multiple = false)]
struct SelectorArgs {
    /// Resolve the most recent backup (default).
    #[arg(long)]
    latest: bool,

    /// Resolve a backup by its exact name.
    #[arg(long)]
    name: Option<String>,

    /// Resolve the most recent backup whose name matches a regex.
    #[arg(long = "match", value_name = "REGEX")]
    matching: Option<String>,

    /// Resolve the most recent backup created strictly before an
    /// RFC 3339 timestamp.
    #[arg(long, value_name = "TIME")]
    before: Option<String>,
}

impl SelectorArgs {
    fn build(self) -> miette::Result<Box<dyn BackupSelector>> {
        if let Some(name) = self.name {
            return Ok(Box::new(NamedBackupSelector::new(name)));
        }
        if let Some(pattern) = self.matching {
            return Ok(Box::new(PatternBackupSelector::new(&pattern).map_err(report)?));
        }
        if let Some(bound) = self.before {
            let bound = OffsetDateTime::parse(&bound, &Rfc3339)
                .map_err(|err| miette::miette!("invalid --before timestamp '{bound}': {err}"))?;
            return Ok(Box::new(BeforeTimeBackupSelector::new(bound)));
        }
        Ok(Box::new(LatestBackupSelector))
    }
}

/// Renders an `exn` error tree as a miette report.
fn report(err: impl std::fmt::Debug) -> miette::Report {
    miette::miette!("{err:?}")
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = walvault_config::load(cli.config.as_deref()).map_err(report)?;
    let folder = walvault_config::configure_folder(&config).map_err(report)?;

    match cli.command {
        Command::Ls { prefix } => {
            let target = match prefix {
                Some(prefix) => folder.subfolder(&prefix),
                None => folder,
            };
            let listing = target.list().await.map_err(report)?;
            for subfolder in &listing.subfolders {
                println!("{}", subfolder.path());
            }
            for object in &listing.objects {
                let modified = object
                    .last_modified
                    .format(&Rfc3339)
                    .map_err(|err| miette::miette!("{err}"))?;
                println!("{}\t{}\t{}", object.name, object.size, modified);
            }
        }
        Command::Cat { path } => {
            let mut reader = folder.read_object(&path).await.map_err(report)?;
            tokio::task::spawn_blocking(move || {
                let mut stdout = std::io::stdout().lock();
                std::io::copy(&mut reader, &mut stdout)?;
                stdout.flush()
            })
            .await
            .map_err(report)?
            .map_err(report)?;
        }
        Command::Put { local, remote } => {
            let file = std::fs::File::open(&local)
                .map_err(|err| miette::miette!("cannot open {}: {err}", local.display()))?;
            let content = Box::new(BufReader::new(file)) as BoxSyncRead;
            folder.put_object(&remote, content).await.map_err(report)?;
            tracing::info!(local = %local.display(), remote, "uploaded");
        }
        Command::Rm { paths } => {
            let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
            folder.delete_objects(&paths).await.map_err(report)?;
        }
        Command::BackupList => {
            for backup in walvault_catalog::list_backup_times(&*folder).await.map_err(report)? {
                let time = match backup.time {
                    Some(time) => time.format(&Rfc3339).map_err(|err| miette::miette!("{err}"))?,
                    None => "-".to_string(),
                };
                let wal = backup.wal_file_name.as_deref().unwrap_or("-");
                println!("{}\t{}\t{}", backup.backup_name, time, wal);
            }
        }
        Command::BackupResolve { selector } => {
            let selector = selector.build()?;
            let backup = selector.select(&*folder).await.map_err(report)?;
            println!("{}", backup.backup_name);
        }
    }
    Ok(())
}
