use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use git_tagver::analyzer::{self, VersionResolution};
use git_tagver::config;
use git_tagver::domain::{SemVer, VersionOrdering, VersionPart};
use git_tagver::filter::{CommandTagFilter, TagFilter};
use git_tagver::git::{GitRepoInspector, InspectorSettings, RepoInspector};
use git_tagver::process::{CommandRunner, SystemCommandRunner};
use git_tagver::ui::{self, Show};
use git_tagver::TagverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Verbatim,
}

impl Verbosity {
    fn level(self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::Verbatim => "trace",
        }
    }
}

#[derive(clap::Parser)]
#[command(
    name = "git-tagver",
    version,
    about = "Calculate a semantic version from the nearest git tag and the commit height"
)]
struct Args {
    #[arg(default_value = ".", help = "Directory inside the repository")]
    source_directory: PathBuf,

    #[arg(help = "Commit to calculate the version for (default: HEAD)")]
    revision: Option<String>,

    #[arg(short, long, help = "Prefix every version tag starts with [default: v]")]
    tag_prefix: Option<String>,

    #[arg(short, long, help = "Prerelease label used after a release [default: alpha]")]
    default_prerelease_phase: Option<String>,

    #[arg(short, long, value_parser = parse_semver, help = "Lowest version to produce [default: 0.1.0]")]
    min_version: Option<SemVer>,

    #[arg(short, long, help = "Height number of the first commit after a tag [default: 1]")]
    prerelease_base_height: Option<u32>,

    #[arg(long, value_parser = parse_semver, help = "Use this version without looking at the repository")]
    version_override: Option<SemVer>,

    #[arg(short, long, help = "Build metadata to attach")]
    build_metadata: Option<String>,

    #[arg(short, long, value_enum, default_value_t = Show::All, help = "What to print")]
    show: Show,

    #[arg(long, help = "Deepen shallow clones and consider remote tags")]
    auto_fetch: bool,

    #[arg(long, help = "Create tags locally instead of fetching them")]
    enable_lightweight_tags: bool,

    #[arg(long, help = "Read missing history from a filtered mirror under the git directory")]
    enable_shadow_repo: bool,

    #[arg(short, long, value_parser = parse_version_part, help = "Part to increment after a release: none, patch, minor, major")]
    auto_increment: Option<VersionPart>,

    #[arg(short, long, help = "Command that must succeed for a tag to be used; {} is the tag name")]
    filter_tags: Option<String>,

    #[arg(short, long, help = "Remote to fetch from [default: origin]")]
    remote: Option<String>,

    #[arg(long, value_parser = parse_version_ordering, help = "Tag ordering: strict or postrelease")]
    version_ordering: Option<VersionOrdering>,

    #[arg(long, value_enum, default_value_t = Verbosity::Normal, help = "Log detail on stderr")]
    verbosity: Verbosity,

    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<PathBuf>,
}

fn parse_semver(s: &str) -> std::result::Result<SemVer, String> {
    SemVer::parse(s).map_err(|e| e.to_string())
}

fn parse_version_part(s: &str) -> std::result::Result<VersionPart, String> {
    s.parse().map_err(|e: TagverError| e.to_string())
}

fn parse_version_ordering(s: &str) -> std::result::Result<VersionOrdering, String> {
    s.parse().map_err(|e: TagverError| e.to_string())
}

fn init_logging(verbosity: Verbosity) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("git_tagver={}", verbosity.level()).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbosity);

    if let Err(e) = run(args).await {
        ui::display_error(&format!("{:#}", e));
        if let Some(hint) = hint_for(&e) {
            ui::display_hint(hint);
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = config::load_config(args.config.as_deref(), &args.source_directory)
        .context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);
    let options = config.to_options();

    let resolution = match analyzer::overridden(&options, None) {
        Some(resolution) => resolution,
        None => {
            let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
            let settings = InspectorSettings {
                can_deepen: config.repository.auto_fetch,
                enable_shadow_repo: config.repository.enable_shadow_repo,
                enable_lightweight_tags: config.repository.enable_lightweight_tags,
            };
            let repo = GitRepoInspector::from_path(
                &args.source_directory,
                options.remote.clone(),
                runner.clone(),
                settings,
            )
            .await?;

            let filter = match &config.repository.filter_tags {
                Some(command) => Some(CommandTagFilter::new(runner, command, repo.root())?),
                None => None,
            };

            let result = resolve(&repo, args.revision.as_deref(), &options, filter.as_ref()).await;
            repo.close().await;
            result?
        }
    };

    println!("{}", ui::render(&resolution, args.show)?);
    Ok(())
}

async fn resolve(
    repo: &GitRepoInspector,
    revision: Option<&str>,
    options: &git_tagver::VersionCalculationOptions,
    filter: Option<&CommandTagFilter>,
) -> Result<VersionResolution> {
    let revision = revision.unwrap_or("HEAD");
    let commit = repo.parse_revision(revision).await?;
    let filter = filter.map(|f| f as &dyn TagFilter);
    Ok(analyzer::resolve_version(repo, commit.as_ref(), options, filter).await?)
}

/// Command-line flags take precedence over the configuration file
fn apply_overrides(config: &mut config::Config, args: &Args) {
    if let Some(prefix) = &args.tag_prefix {
        config.tag_prefix = prefix.clone();
    }
    if let Some(phase) = &args.default_prerelease_phase {
        config.default_prerelease_phase = phase.clone();
    }
    if let Some(version) = &args.min_version {
        config.minimum_version = version.clone();
    }
    if let Some(height) = args.prerelease_base_height {
        config.prerelease_base_height = height;
    }
    if let Some(version) = &args.version_override {
        config.version_override = Some(version.clone());
    }
    if let Some(metadata) = &args.build_metadata {
        config.build_metadata = Some(metadata.clone());
    }
    if let Some(part) = args.auto_increment {
        config.auto_increment = part;
    }
    if let Some(remote) = &args.remote {
        config.remote = remote.clone();
    }
    if let Some(ordering) = args.version_ordering {
        config.version_ordering = ordering;
    }
    if let Some(command) = &args.filter_tags {
        config.repository.filter_tags = Some(command.clone());
    }
    config.repository.auto_fetch |= args.auto_fetch;
    config.repository.enable_shadow_repo |= args.enable_shadow_repo;
    config.repository.enable_lightweight_tags |= args.enable_lightweight_tags;
}

fn hint_for(error: &anyhow::Error) -> Option<&'static str> {
    match error.downcast_ref::<TagverError>()? {
        TagverError::RepoTooShallow(_) => {
            Some("use --auto-fetch to deepen the clone, or --enable-shadow-repo to read history from a mirror")
        }
        TagverError::AutoDeepenFailed(_) => {
            Some("fetch more history manually, for example with `git fetch --unshallow`")
        }
        TagverError::NotARepository(_) => {
            Some("run inside a git repository or pass its path as SOURCE_DIRECTORY")
        }
        TagverError::VersionCalculation(_) => {
            Some("lower --min-version or tag a commit with a higher version")
        }
        _ => None,
    }
}
