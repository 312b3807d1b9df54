//! sitectl - Main entry point
//!
//! Backup, restore and sync orchestration for multisite Drupal hosting.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use sitectl::api::cloud::credentials::CloudCredentials;
use sitectl::api::factory::FactoryOptions;
use sitectl::api::{CloudClient, FactoryClient, Operation, SiteBackupApi};
use sitectl::backup::LocalBackupStore;
use sitectl::commands::drush::Drush;
use sitectl::commands::local_data::LocalData;
use sitectl::commands::prompt::Prompt;
use sitectl::commands::site_data::{default_components, AutoLabel, ListFilter, SiteData};
use sitectl::commands::{aliases, auth, behat, code, db_scrub, git};
use sitectl::components::{parse_components, Component};
use sitectl::poller::TaskPoller;
use sitectl::sites::{SiteMapping, SiteRegistry, SiteSelection};
use sitectl::{utils, Config};
use std::path::{Path, PathBuf};
use tracing::error;

/// Environment the Site Factory stage endpoint lives on.
const FACTORY_PRODUCTION_ENV: &str = "01live";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Answer yes to every confirmation prompt
    #[arg(short = 'y', long = "yes", global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Acquia Cloud API commands
    Ac {
        #[command(flatten)]
        credentials: CloudArgs,

        #[command(subcommand)]
        command: AcCommand,
    },
    /// Acquia Cloud Site Factory API commands
    Acsf {
        #[command(flatten)]
        credentials: FactoryArgs,

        #[command(subcommand)]
        command: AcsfCommand,
    },
    /// Local backups and local site data
    Local {
        #[command(subcommand)]
        command: LocalCommand,
    },
    /// Git hooks
    Git {
        #[command(subcommand)]
        command: GitCommand,
    },
    /// Multisite alias generation
    Aliases {
        #[command(subcommand)]
        command: AliasesCommand,
    },
    /// Sanitize a copied database; run from the Cloud db-copy hook
    DbScrub {
        site: String,
        target_env: String,
        db_name: String,
        source_env: String,
    },
    /// Test suites
    Tests {
        #[command(subcommand)]
        command: TestsCommand,
    },
}

#[derive(Args, Debug)]
struct CloudArgs {
    /// Cloud API key (overrides AC_API_KEY and the credentials file)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Cloud API secret
    #[arg(long, global = true)]
    api_secret: Option<String>,
}

#[derive(Args, Debug)]
struct FactoryArgs {
    #[arg(long, global = true)]
    acsf_api_username: Option<String>,

    #[arg(long, global = true)]
    acsf_api_password: Option<String>,

    #[arg(long, global = true)]
    acsf_api_base_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum AcCommand {
    /// Database backups, restores and syncs
    #[command(subcommand)]
    SiteData(SiteDataCommand),
    /// Git refs and deployments
    #[command(subcommand)]
    Code(CodeCommand),
    /// Cloud API credentials
    #[command(subcommand)]
    Auth(AuthCommand),
}

#[derive(Subcommand, Debug)]
enum AcsfCommand {
    /// Site backups, restores and staging
    #[command(subcommand)]
    SiteData(SiteDataCommand),
}

#[derive(Args, Debug)]
struct SiteArgs {
    /// Environment to act on, e.g. 01live
    #[arg(long)]
    target_env: String,

    #[arg(long)]
    normalized_sitename: Option<String>,

    /// Comma separated site IDs
    #[arg(long)]
    site_ids: Option<String>,

    /// Comma separated components, e.g. "database,public files"
    #[arg(long)]
    components: Option<String>,
}

#[derive(Subcommand, Debug)]
enum SiteDataCommand {
    Backup {
        #[command(flatten)]
        sites: SiteArgs,

        #[arg(long)]
        label: Option<String>,

        #[arg(long, value_enum)]
        autolabel: Option<AutoLabel>,
    },
    Download {
        #[command(flatten)]
        sites: SiteArgs,

        #[arg(long)]
        backup_id: Option<u64>,
    },
    List {
        #[command(flatten)]
        sites: SiteArgs,

        #[arg(long)]
        backup_id: Option<u64>,

        #[arg(long)]
        latest: bool,

        #[arg(long)]
        label: Option<String>,
    },
    Restore {
        #[command(flatten)]
        sites: SiteArgs,

        #[arg(long)]
        backup_id: Option<u64>,

        #[arg(long)]
        label: Option<String>,
    },
    /// Copy production data into the target environment
    Sync {
        #[command(flatten)]
        sites: SiteArgs,
    },
}

#[derive(Subcommand, Debug)]
enum CodeCommand {
    List,
    Find {
        #[arg(long)]
        gitref: String,
    },
    Checkout {
        #[arg(long)]
        gitref: String,

        #[arg(long)]
        target_env: String,
    },
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Save credentials to the credentials file
    Set,
    /// Show the resolved credentials
    Get,
    /// Verify credentials against the API
    Check,
}

#[derive(Subcommand, Debug)]
enum LocalCommand {
    #[command(subcommand)]
    Data(LocalDataCommand),
}

#[derive(Args, Debug)]
struct LocalArgs {
    /// Environment the local backups (or synced data) come from
    #[arg(long)]
    source_env: String,

    #[arg(long)]
    normalized_sitename: Option<String>,

    #[arg(long)]
    site_ids: Option<String>,

    #[arg(long)]
    components: Option<String>,
}

#[derive(Subcommand, Debug)]
enum LocalDataCommand {
    /// Copy files and database from the remote alias into the local site
    Sync {
        #[command(flatten)]
        sites: LocalArgs,
    },
    /// Restore a downloaded backup into the local site
    Restore {
        #[command(flatten)]
        sites: LocalArgs,

        #[arg(long)]
        backup_id: Option<u64>,
    },
    List {
        #[command(flatten)]
        sites: LocalArgs,

        #[arg(long)]
        backup_id: Option<u64>,

        #[arg(long)]
        latest: bool,
    },
    /// Delete old local backups
    Cleanup {
        #[command(flatten)]
        sites: LocalArgs,

        #[arg(long)]
        backup_id: Option<u64>,

        /// Age in days
        #[arg(long, default_value_t = 7)]
        older_than: u64,
    },
}

#[derive(Subcommand, Debug)]
enum GitCommand {
    /// Lint commit subjects on BRANCH that are not on COMPARE
    CommitMsgs { branch: String, compare: String },
}

#[derive(Subcommand, Debug)]
enum AliasesCommand {
    Generate {
        #[arg(long, default_value = aliases::DEFAULT_ENV)]
        env: String,
    },
}

#[derive(Subcommand, Debug)]
enum TestsCommand {
    Behat {
        #[arg(long)]
        target_env: String,

        #[arg(long)]
        normalized_sitename: Option<String>,

        #[arg(long)]
        site_ids: Option<String>,
    },
}

impl SiteDataCommand {
    fn sites(&self) -> &SiteArgs {
        match self {
            SiteDataCommand::Backup { sites, .. }
            | SiteDataCommand::Download { sites, .. }
            | SiteDataCommand::List { sites, .. }
            | SiteDataCommand::Restore { sites, .. }
            | SiteDataCommand::Sync { sites } => sites,
        }
    }

    fn operation(&self) -> Operation {
        match self {
            SiteDataCommand::Backup { .. } => Operation::Backup,
            SiteDataCommand::Download { .. } => Operation::Download,
            SiteDataCommand::List { .. } => Operation::List,
            SiteDataCommand::Restore { .. } => Operation::Restore,
            SiteDataCommand::Sync { .. } => Operation::Sync,
        }
    }
}

impl LocalDataCommand {
    fn sites(&self) -> &LocalArgs {
        match self {
            LocalDataCommand::Sync { sites }
            | LocalDataCommand::Restore { sites, .. }
            | LocalDataCommand::List { sites, .. }
            | LocalDataCommand::Cleanup { sites, .. } => sites,
        }
    }
}

/// `--components` as given, or the per-operation default.
fn requested_components(input: Option<&str>, defaults: impl FnOnce() -> Vec<Component>) -> sitectl::Result<Vec<Component>> {
    match input.filter(|c| !c.trim().is_empty()) {
        Some(input) => parse_components(input),
        None => Ok(defaults()),
    }
}

fn select_sites(
    config: &Config,
    env: &str,
    name: Option<&str>,
    site_ids: Option<&str>,
) -> sitectl::Result<Vec<SiteMapping>> {
    let registry = SiteRegistry::from_config(config)?;
    let selection = SiteSelection::from_options(name, site_ids)?;
    registry.sync_maps(env, &selection)
}

fn cloud_client(config: &Config, credentials: &CloudArgs) -> sitectl::Result<CloudClient> {
    let credentials = CloudCredentials::resolve(
        credentials.api_key.as_deref(),
        credentials.api_secret.as_deref(),
        &config.cloud_credentials_file()?,
    )?;
    CloudClient::new(&config.cloud.base_url, config.cloud.app_id.clone(), &credentials)
}

async fn run_site_data<A: SiteBackupApi>(
    api: &A,
    command: SiteDataCommand,
    config: &Config,
    prompt: Prompt,
) -> sitectl::Result<i32> {
    let args = command.sites();
    let sites = select_sites(
        config,
        &args.target_env,
        args.normalized_sitename.as_deref(),
        args.site_ids.as_deref(),
    )?;
    let requested = requested_components(args.components.as_deref(), || {
        default_components(api.source(), command.operation())
    })?;
    let target_env = args.target_env.clone();

    let store = LocalBackupStore::new(&config.backup.dir, target_env.as_str());
    let site_data = SiteData::new(api, TaskPoller::from_config(&config.backup), store, prompt);

    match command {
        SiteDataCommand::Backup { label, autolabel, .. } => {
            let label = site_data.resolve_label(label.as_deref(), autolabel).await?;
            site_data.backup(&sites, &requested, label.as_deref()).await
        }
        SiteDataCommand::Download { backup_id, .. } => site_data.download(&sites, &requested, backup_id).await,
        SiteDataCommand::List {
            backup_id,
            latest,
            label,
            ..
        } => {
            let filter = ListFilter {
                components: requested,
                backup_id,
                latest,
                label,
            };
            site_data.list(&sites, &filter).await
        }
        SiteDataCommand::Restore { backup_id, label, .. } => {
            site_data
                .restore(&sites, &requested, backup_id, label.as_deref())
                .await
        }
        SiteDataCommand::Sync { .. } => site_data.sync(&sites, &target_env, &requested).await,
    }
}

fn run_local_data(command: LocalDataCommand, config: &Config, prompt: Prompt) -> sitectl::Result<i32> {
    let args = command.sites();
    let sites = select_sites(
        config,
        &args.source_env,
        args.normalized_sitename.as_deref(),
        args.site_ids.as_deref(),
    )?;
    let imports = matches!(command, LocalDataCommand::Sync { .. } | LocalDataCommand::Restore { .. });
    let requested = requested_components(args.components.as_deref(), || {
        if imports {
            vec![Component::Database, Component::PublicFiles, Component::PrivateFiles]
        } else {
            Vec::new()
        }
    })?;

    let store = LocalBackupStore::new(&config.backup.dir, args.source_env.as_str());
    let local_data = LocalData::new(store, Drush::new(&config.drush, &config.sync), prompt);

    match command {
        LocalDataCommand::Sync { .. } => local_data.sync(&sites, &requested),
        LocalDataCommand::Restore { backup_id, .. } => local_data.restore(&sites, &requested, backup_id),
        LocalDataCommand::List { backup_id, latest, .. } => local_data.list(&sites, &requested, backup_id, latest),
        LocalDataCommand::Cleanup {
            backup_id,
            older_than,
            ..
        } => local_data.cleanup(
            &sites,
            &requested,
            backup_id,
            older_than,
            chrono::Utc::now().timestamp(),
        ),
    }
}

async fn run(command: Command, config: &Config, prompt: Prompt) -> sitectl::Result<i32> {
    match command {
        Command::Ac { credentials, command } => match command {
            AcCommand::SiteData(command) => {
                let client = cloud_client(config, &credentials)?;
                run_site_data(&client, command, config, prompt).await
            }
            AcCommand::Code(command) => {
                let client = cloud_client(config, &credentials)?;
                match command {
                    CodeCommand::List => code::list(&client).await,
                    CodeCommand::Find { gitref } => code::find(&client, &gitref).await,
                    CodeCommand::Checkout { gitref, target_env } => {
                        let poller = TaskPoller::from_config(&config.backup);
                        code::checkout(&client, &poller, &prompt, &target_env, &gitref).await
                    }
                }
            }
            AcCommand::Auth(command) => {
                let file = config.cloud_credentials_file()?;
                match command {
                    AuthCommand::Set => auth::set_interactive(
                        &file,
                        credentials.api_key.as_deref(),
                        credentials.api_secret.as_deref(),
                    ),
                    AuthCommand::Get => auth::get(&file),
                    AuthCommand::Check => {
                        auth::check(
                            config,
                            credentials.api_key.as_deref(),
                            credentials.api_secret.as_deref(),
                        )
                        .await
                    }
                }
            }
        },
        Command::Acsf { credentials, command } => match command {
            AcsfCommand::SiteData(command) => {
                let options = FactoryOptions {
                    username: credentials.acsf_api_username,
                    password: credentials.acsf_api_password,
                    base_url: credentials.acsf_api_base_url,
                };
                // Staging is requested from the production factory.
                let api_env = match command {
                    SiteDataCommand::Sync { .. } => FACTORY_PRODUCTION_ENV.to_string(),
                    _ => command.sites().target_env.clone(),
                };
                let client = FactoryClient::from_options(&options, &config.site_factory, &api_env)?;
                run_site_data(&client, command, config, prompt).await
            }
        },
        Command::Local {
            command: LocalCommand::Data(command),
        } => run_local_data(command, config, prompt),
        Command::Git {
            command: GitCommand::CommitMsgs { branch, compare },
        } => git::commit_msgs(&config.git, &branch, &compare),
        Command::Aliases {
            command: AliasesCommand::Generate { env },
        } => {
            let credentials = CloudArgs {
                api_key: None,
                api_secret: None,
            };
            let client = cloud_client(config, &credentials)?;
            aliases::generate(&client, &env).await
        }
        Command::DbScrub {
            site,
            target_env,
            db_name,
            source_env,
        } => db_scrub::db_scrub(
            &config.drush,
            Path::new(db_scrub::HOSTING_FILES_ROOT),
            &site,
            &target_env,
            &db_name,
            &source_env,
        ),
        Command::Tests {
            command:
                TestsCommand::Behat {
                    target_env,
                    normalized_sitename,
                    site_ids,
                },
        } => {
            behat::check_target_env(&target_env)?;
            let sites = select_sites(config, &target_env, normalized_sitename.as_deref(), site_ids.as_deref())?;
            behat::run(&config.behat, &sites)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may live in .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;

    // Initialize logging
    let log_level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::debug!("Starting sitectl v{}", env!("CARGO_PKG_VERSION"));

    let prompt = Prompt::new(cli.yes);
    let code = match run(cli.command, &config, prompt).await {
        Ok(code) => code,
        Err(e) => {
            error!(kind = e.kind().as_str(), "{}", e);
            1
        }
    };

    std::process::exit(code);
}
