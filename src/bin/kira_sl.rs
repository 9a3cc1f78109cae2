use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_species_library::app::{App, BuildOptions, BuildResult, load_store};
use kira_species_library::builder::ArchiveBuilder;
use kira_species_library::config::{ConfigLoader, ResolvedConfig};
use kira_species_library::domain::Record;
use kira_species_library::error::KiraError;
use kira_species_library::images::{
    ChainedImageResolver, HttpImageDownloader, ImageDownloader, ImageProvider, ImageResolver,
    ProviderKind,
};
use kira_species_library::inaturalist::InaturalistHttpClient;
use kira_species_library::output::{JsonOutput, OutputMode, TextOutput};
use kira_species_library::records::RecordStore;
use kira_species_library::tui::Tui;
use kira_species_library::wikipedia::{ArticleFetcher, OfflineArticle, WikipediaHttpClient};

#[derive(Parser)]
#[command(name = "kira-sl")]
#[command(about = "Builds a browsable offline species library from a species CSV")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Build the offline library archive")]
    Build(BuildArgs),
    #[command(about = "List species in the dataset")]
    List(ListArgs),
    #[command(about = "List the kingdoms present in the dataset")]
    Kingdoms(DatasetArgs),
    #[command(about = "Render one species page with online links")]
    Show(ShowArgs),
}

#[derive(Args, Clone)]
struct DatasetArgs {
    #[arg(long)]
    dataset: Option<Utf8PathBuf>,
}

#[derive(Args, Clone)]
struct BuildArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    #[arg(long)]
    output: Option<Utf8PathBuf>,

    #[arg(long)]
    limit: Option<usize>,

    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    kingdom: Option<String>,
}

#[derive(Args)]
struct ListArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    kingdom: Option<String>,
}

#[derive(Args)]
struct ShowArgs {
    name: String,

    #[command(flatten)]
    dataset: DatasetArgs,

    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

struct NopResolver;

impl ImageResolver for NopResolver {
    fn resolve_image(&self, _record: &Record) -> Option<String> {
        None
    }
}

struct NopDownloader;

impl ImageDownloader for NopDownloader {
    fn download(&self, url: &str) -> Result<Vec<u8>, KiraError> {
        Err(KiraError::ImageHttp(format!("offline: {url}")))
    }
}

struct NopArticles;

impl ArticleFetcher for NopArticles {
    fn fetch_offline_article(&self, _canonical_name: &str) -> Option<OfflineArticle> {
        None
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::RecordNotFound(_)
        | KiraError::DatasetRead(_)
        | KiraError::EmptyDataset
        | KiraError::ConfigRead(_) => 2,
        KiraError::WikipediaHttp(_)
        | KiraError::WikipediaStatus { .. }
        | KiraError::InaturalistHttp(_)
        | KiraError::InaturalistStatus { .. }
        | KiraError::ImageHttp(_)
        | KiraError::ImageStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Build(args) => run_build(args, &config, output_mode),
        Commands::List(args) => {
            let app = offline_app(load_dataset(&args.dataset, &config)?);
            let result = app.list(args.search.as_deref(), args.kingdom.as_deref());
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_list(&result),
                OutputMode::Interactive => TextOutput::print_list(&result),
            }
            .into_diagnostic()
        }
        Commands::Kingdoms(args) => {
            let app = offline_app(load_dataset(&args, &config)?);
            let result = app.kingdoms();
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_kingdoms(&result),
                OutputMode::Interactive => TextOutput::print_kingdoms(&result),
            }
            .into_diagnostic()
        }
        Commands::Show(args) => {
            let app = offline_app(load_dataset(&args.dataset, &config)?);
            let result = app.show(&args.name, args.output.as_deref())?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_show(&result),
                OutputMode::Interactive => TextOutput::print_show(&result),
            }
            .into_diagnostic()
        }
    }
}

fn run_build(
    args: BuildArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let store = load_dataset(&args.dataset, config)?;
    let options = BuildOptions {
        output: args.output.unwrap_or_else(|| config.output.clone()),
        search: args.search,
        kingdom: args.kingdom,
        limit: args.limit,
    };

    let wikipedia = WikipediaHttpClient::new(config.http_timeout, config.thumbnail_size)?;
    let resolver = ChainedImageResolver::new(image_providers(config)?);
    let downloader = HttpImageDownloader::new(config.http_timeout)?;
    let builder = ArchiveBuilder::new(resolver, downloader, wikipedia)
        .with_library_name(&config.library_name);

    match output_mode {
        OutputMode::NonInteractive => {
            let app = App::new(store, builder);
            let result = app.build(&options, &JsonOutput)?;
            JsonOutput::print_build(&result).into_diagnostic()
        }
        OutputMode::Interactive => {
            let mut tui = Tui::new();
            let app = App::new(store, builder.with_cancel_flag(tui.cancel_flag()));
            let result: BuildResult = tui.run(move |sink| app.build(&options, sink))?;
            TextOutput::print_build(&result).into_diagnostic()
        }
    }
}

fn image_providers(config: &ResolvedConfig) -> Result<Vec<Box<dyn ImageProvider>>, KiraError> {
    config
        .image_providers
        .iter()
        .map(|kind| -> Result<Box<dyn ImageProvider>, KiraError> {
            match kind {
                ProviderKind::Wikipedia => Ok(Box::new(WikipediaHttpClient::new(
                    config.http_timeout,
                    config.thumbnail_size,
                )?)),
                ProviderKind::Inaturalist => {
                    Ok(Box::new(InaturalistHttpClient::new(config.http_timeout)?))
                }
            }
        })
        .collect()
}

fn load_dataset(args: &DatasetArgs, config: &ResolvedConfig) -> Result<RecordStore, KiraError> {
    let path = args.dataset.clone().unwrap_or_else(|| config.dataset.clone());
    load_store(&path)
}

fn offline_app(store: RecordStore) -> App<NopResolver, NopDownloader, NopArticles> {
    App::new(store, ArchiveBuilder::new(NopResolver, NopDownloader, NopArticles))
}
