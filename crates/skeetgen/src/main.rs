use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use skeetgen::{
    Config, DirectorySource, FileInput, VerifyPolicy, export_archive, generate_archive,
    list_entries,
};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG: &str = "skeetgen.kdl";

#[derive(Parser, Debug)]
#[command(author, version, about = "Archive AT Protocol repositories as tar bundles")]
struct Args {
    /// Path to KDL config file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a browsable archive from an exported bundle
    Generate {
        /// Exported bundle containing did.json and repo.car
        input: PathBuf,

        /// Where to write the generated archive
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// Copy blobs from the bundle
        #[arg(long)]
        with_media: bool,

        /// Check every CAR block against its CID
        #[arg(long)]
        verify_blocks: bool,

        /// Posts per timeline page
        #[arg(long)]
        posts_per_page: Option<usize>,
    },

    /// Pack an export directory (did.json, repo.car, blobs/) into a bundle
    Pack {
        /// Directory holding the export
        dir: PathBuf,

        /// Where to write the bundle
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// Include blobs
        #[arg(long)]
        with_media: bool,
    },

    /// List the entries of an archive
    List {
        /// Archive to list
        archive: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(args.config.as_deref()).await?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            #[cfg(feature = "tracing")]
            tracing::warn!("interrupted, aborting");
            cancel.cancel();
        });
    }

    match args.command {
        Command::Generate {
            input,
            output,
            with_media,
            verify_blocks,
            posts_per_page,
        } => {
            let mut options = config.generate;
            options.with_media |= with_media;
            if verify_blocks {
                options.verify = VerifyPolicy::Verify;
            }
            if let Some(n) = posts_per_page {
                options.posts_per_page = n.max(1);
            }

            let input = FileInput::new(input);
            let staged = Staged::new(&output)?;
            let (sink, summary) =
                generate_archive(&input, staged.writer()?, &options, &cancel).await?;
            staged.commit(sink, &output).await?;

            println!(
                "Wrote {} posts, {} timeline pages and {} media files to {}",
                summary.posts,
                summary.timeline_pages,
                summary.blobs,
                output.display()
            );
        }
        Command::Pack {
            dir,
            output,
            with_media,
        } => {
            let mut options = config.export;
            options.with_media |= with_media;

            let source = DirectorySource::new(dir);
            let staged = Staged::new(&output)?;
            let (sink, summary) =
                export_archive(&source, staged.writer()?, &options, &cancel).await?;
            staged.commit(sink, &output).await?;

            println!(
                "Packed {} byte repository and {} blobs into {}",
                summary.repo_bytes,
                summary.blobs,
                output.display()
            );
        }
        Command::List { archive } => {
            let headers = list_entries(&FileInput::new(archive), &cancel).await?;
            for header in headers {
                println!(
                    "{:>16} {:>12} {}",
                    header.entry_type.as_str(),
                    header.size,
                    header.name
                );
            }
        }
    }

    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path).await?),
        None if Path::new(DEFAULT_CONFIG).is_file() => Ok(Config::load(DEFAULT_CONFIG).await?),
        None => Ok(Config::default()),
    }
}

/// Output staged in a temporary file next to its destination
///
/// Dropping it without `commit` removes the temporary file, so an aborted
/// archive never shows up at the destination path.
struct Staged {
    temp: tempfile::NamedTempFile,
}

impl Staged {
    fn new(output: &Path) -> Result<Self> {
        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let temp = tempfile::NamedTempFile::new_in(dir).into_diagnostic()?;
        Ok(Self { temp })
    }

    fn writer(&self) -> Result<BufWriter<tokio::fs::File>> {
        let file = self.temp.reopen().into_diagnostic()?;
        Ok(BufWriter::new(tokio::fs::File::from_std(file)))
    }

    async fn commit(self, mut sink: BufWriter<tokio::fs::File>, output: &Path) -> Result<()> {
        sink.flush().await.into_diagnostic()?;
        sink.into_inner().sync_all().await.into_diagnostic()?;
        self.temp.persist(output).into_diagnostic()?;
        Ok(())
    }
}
