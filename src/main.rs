//! nereid command line interface

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use nereid::ops::{build, BuildOptions};
use nereid::registry::{
    fetch_index, publish_store, sync, HttpRegistry, PublishOptions, SourceSpec, SyncEvent,
    SyncOptions, SyncSource, DEFAULT_REGISTRY,
};
use nereid::DEFAULT_INDEX_NAME;

#[derive(Parser)]
#[command(name = "nereid")]
#[command(about = "content-addressable directory store over a package registry")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// build a store from a directory
    Build {
        /// source directory to snapshot
        path: PathBuf,

        /// maximum chunk size in bytes
        #[arg(short, long)]
        chunk: Option<u64>,

        /// bucket name, defaults to the source basename
        #[arg(short, long)]
        bucket: Option<String>,

        /// index document file name
        #[arg(short, long, default_value = DEFAULT_INDEX_NAME)]
        index: String,
    },

    /// publish the local store to a registry
    #[command(alias = "pub")]
    Publish {
        /// package scope to publish under
        scope: String,

        /// registry auth token
        #[arg(short, long, env = "NEREID_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// registry base url
        #[arg(short, long, default_value = DEFAULT_REGISTRY)]
        registry: String,

        /// index document file name
        #[arg(short, long, default_value = DEFAULT_INDEX_NAME)]
        index: String,
    },

    /// fetch only the index document, no chunk downloads
    FetchIndex {
        /// source to query, `<scope>` or `<scope>@<registry-url>`
        source: String,

        /// destination root
        #[arg(short, long, default_value = "nereid")]
        output: PathBuf,

        /// index document file name
        #[arg(short, long, default_value = DEFAULT_INDEX_NAME)]
        index: String,
    },

    /// download a bucket from one or more sources
    #[command(alias = "d")]
    Download {
        /// bucket to reconstruct
        bucket: String,

        /// sources to try in order, `<scope>` or `<scope>@<registry-url>`
        sources: Vec<String>,

        /// destination root
        #[arg(short, long, default_value = "nereid")]
        output: PathBuf,

        /// index document file name
        #[arg(short, long, default_value = DEFAULT_INDEX_NAME)]
        index: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> nereid::Result<()> {
    match cli.command {
        Commands::Build {
            path,
            chunk,
            bucket,
            index,
        } => {
            let mut options = BuildOptions {
                index,
                bucket,
                ..BuildOptions::default()
            };
            if let Some(chunk) = chunk {
                options.chunk_size = chunk;
            }
            build(&path, Path::new("nereid"), &options)?;
        }

        Commands::Publish {
            scope,
            token,
            registry,
            index,
        } => {
            let registry = HttpRegistry::new(registry)?;
            let options = PublishOptions {
                scope,
                index,
                token: token.unwrap_or_default(),
            };
            let report = publish_store(&registry, Path::new("nereid"), &options, |hash| {
                println!("{} published", hash);
            })?;
            println!("{}@{} published", report.index_name, report.index_version);
        }

        Commands::FetchIndex {
            source,
            output,
            index,
        } => {
            let spec = SourceSpec::parse(&source)?;
            let registry = HttpRegistry::new(spec.registry)?;
            let sources = [SyncSource::new(&registry, spec.scope)];
            let options = SyncOptions { output, index };
            fetch_index(&sources, &options)?;
            println!("fetched {}", options.output.join(&options.index).display());
        }

        Commands::Download {
            bucket,
            sources,
            output,
            index,
        } => {
            let specs = sources
                .iter()
                .map(|source| SourceSpec::parse(source))
                .collect::<nereid::Result<Vec<_>>>()?;
            let registries = specs
                .iter()
                .map(|spec| HttpRegistry::new(spec.registry.clone()))
                .collect::<nereid::Result<Vec<_>>>()?;
            let sources: Vec<SyncSource> = specs
                .iter()
                .zip(&registries)
                .map(|(spec, registry)| SyncSource::new(registry, spec.scope.clone()))
                .collect();
            let options = SyncOptions { output, index };

            let mut failed = None;
            sync(&bucket, &sources, &options, |event| match event {
                SyncEvent::Composable { hash } => println!("{} downloaded", hash),
                SyncEvent::Done { output } => println!("downloaded in {}", output.display()),
                SyncEvent::Failed { error } => failed = Some(error),
            });
            if let Some(error) = failed {
                return Err(error);
            }
        }
    }

    Ok(())
}
