//! sealdrive: client-side encrypted cloud drive CLI
//!
//! Commands:
//!   upload <file> [--dir D]   - encrypt and store a local file
//!   download <id> [-o out]    - fetch and decrypt a stored file
//!   ls [dir]                  - list a remote directory, reconciling the cache
//!   name <id>                 - decrypt a stored file's name
//!   info <id>                 - show cached metadata for a file
//!   rm <id>                   - delete a stored file
//!   health                    - check the storage backend is reachable
//!   config show               - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{reload, EnvFilter, Registry};

use sealdrive_core::config::{SealConfig, StorageBackend};
use sealdrive_core::{EntryKind, FileId, OwnerId, SealError};
use sealdrive_crypto::KdfParams;
use sealdrive_storage::{
    build_from_config, check_health, OpendalTransport, RemotePathScheme, S3Credentials,
};
use sealdrive_sync::{JsonMetadataCache, SessionValidator, StaticTokenValidator, TransferEngine};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sealdrive",
    version,
    about = "Client-side encrypted cloud drive",
    long_about = "sealdrive: encrypt file contents and names before they reach the cloud drive"
)]
struct Cli {
    /// Path to sealdrive.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "SEALDRIVE_CONFIG",
        default_value = "~/.config/sealdrive/sealdrive.toml"
    )]
    config: PathBuf,

    /// Access token (must match an [[auth.tokens]] entry)
    #[arg(long, env = "SEALDRIVE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Encryption secret (prompted for when not given)
    #[arg(long, env = "SEALDRIVE_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Log level filter (overrides config)
    #[arg(long, env = "SEALDRIVE_LOG")]
    log: Option<String>,

    /// Log output format
    #[arg(long, value_enum, env = "SEALDRIVE_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a local file and upload it
    Upload {
        /// Local file to upload
        file: PathBuf,
        /// Remote directory to upload into, relative to your private root
        #[arg(long, short = 'd', default_value = "/")]
        dir: String,
    },

    /// Download and decrypt a file by ID
    Download {
        id: u64,
        /// Output path (default: the file's display name in the current directory)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// List a remote directory (relative to your private root)
    Ls {
        #[arg(default_value = "/")]
        dir: String,
    },

    /// Decrypt and print a file's name
    Name { id: u64 },

    /// Show cached metadata for a file
    Info { id: u64 },

    /// Delete a file from the remote and the cache
    Rm { id: u64 },

    /// Check that the storage backend is reachable
    Health,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

type Engine = TransferEngine<OpendalTransport, JsonMetadataCache>;

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging first so config loading can report what it does
    let log_handle = init_logging(cli.log.as_deref().unwrap_or("info"), &cli.log_format);

    let config_path = expand_tilde(&cli.config);
    let config = SealConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    // [log].level applies unless --log / SEALDRIVE_LOG or RUST_LOG already chose
    if cli.log.is_none() && std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
        if let Err(e) = log_handle.reload(EnvFilter::new(&config.log.level)) {
            tracing::warn!("applying [log].level = {:?}: {e}", config.log.level);
        }
    }

    match &cli.command {
        Commands::Upload { file, dir } => cmd_upload(&cli, &config, file, dir).await,
        Commands::Download { id, output } => {
            cmd_download(&cli, &config, FileId(*id), output.as_deref()).await
        }
        Commands::Ls { dir } => cmd_ls(&cli, &config, dir).await,
        Commands::Name { id } => cmd_name(&cli, &config, FileId(*id)),
        Commands::Info { id } => cmd_info(&cli, &config, FileId(*id)),
        Commands::Rm { id } => cmd_rm(&cli, &config, FileId(*id)).await,
        Commands::Health => cmd_health(&config).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

type LogHandle = reload::Handle<EnvFilter, Registry>;

fn init_logging(level: &str, format: &LogFormat) -> LogHandle {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let (filter, handle) = reload::Layer::new(filter);

    // stdout carries command output; diagnostics go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    handle
}

// ── Engine wiring ─────────────────────────────────────────────────────────────

/// Build the transfer engine from config.
///
/// S3 credentials come from AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY.
fn build_engine(config: &SealConfig) -> Result<Engine> {
    let transport = build_transport(config)?;
    let cache_path = expand_tilde(&config.cache.path);
    let cache = JsonMetadataCache::open(&cache_path)
        .with_context(|| format!("opening metadata cache: {}", cache_path.display()))?;

    Ok(TransferEngine::new(transport, cache).with_kdf_params(KdfParams {
        iterations: config.crypto.pbkdf2_iterations,
    }))
}

fn build_transport(config: &SealConfig) -> Result<OpendalTransport> {
    let mut storage = config.storage.clone();
    storage.root = expand_tilde(&storage.root);

    let creds = match storage.backend {
        StorageBackend::S3 => Some(S3Credentials::from_env().context(
            "S3 credentials not set\n\
             Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY environment variables.",
        )?),
        _ => None,
    };
    if storage.backend == StorageBackend::Memory {
        tracing::warn!("memory backend selected: nothing uploaded will outlive this process");
    }

    let op = build_from_config(&storage, creds.as_ref()).context("building storage operator")?;
    Ok(OpendalTransport::new(
        op,
        RemotePathScheme::new(storage.remote_prefix.clone()),
    ))
}

/// Resolve the caller's token to an owner.
fn authenticate(cli: &Cli, config: &SealConfig) -> Result<OwnerId> {
    let token = cli
        .token
        .as_deref()
        .context("no access token: pass --token or set SEALDRIVE_TOKEN")?;
    StaticTokenValidator::from_config(&config.auth)
        .validate(token)
        .context("authentication failed")
}

/// The encryption secret from --secret / SEALDRIVE_SECRET, or an interactive prompt.
fn read_secret(cli: &Cli) -> Result<SecretString> {
    if let Some(s) = &cli.secret {
        return Ok(SecretString::from(s.clone()));
    }
    let entered = rpassword::prompt_password("sealdrive secret: ").context("reading secret")?;
    if entered.is_empty() {
        anyhow::bail!("empty secret");
    }
    Ok(SecretString::from(entered))
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

/// Refuse files larger than `limit`; content is held in memory whole.
fn check_upload_size(file: &Path, limit: u64) -> Result<u64> {
    let meta = std::fs::metadata(file).with_context(|| format!("stat: {}", file.display()))?;
    if !meta.is_file() {
        anyhow::bail!("{} is not a regular file", file.display());
    }
    if meta.len() > limit {
        anyhow::bail!(
            "{} is {} but limits.max_upload_bytes is {}",
            file.display(),
            fmt_bytes(meta.len()),
            fmt_bytes(limit)
        );
    }
    Ok(meta.len())
}

/// Turn a wrong-secret error into a hint instead of a stack of contexts.
fn explain(err: SealError) -> anyhow::Error {
    if err.is_wrong_secret() {
        anyhow::anyhow!("{err}\nCheck the secret and try again.")
    } else {
        err.into()
    }
}

// ── Progress helpers ──────────────────────────────────────────────────────────

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ── `sealdrive upload` ────────────────────────────────────────────────────────

async fn cmd_upload(cli: &Cli, config: &SealConfig, file: &Path, dir: &str) -> Result<()> {
    let owner = authenticate(cli, config)?;
    let size = check_upload_size(file, config.limits.max_upload_bytes)?;
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", file.display()))?;
    let secret = read_secret(cli)?;
    let engine = build_engine(config)?;

    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;

    let pb = make_spinner("upload");
    pb.set_message(format!("{name} ({})", fmt_bytes(size)));
    let result = engine.upload(owner, &data, &secret, dir, name).await;
    pb.finish_and_clear();

    let record = result.map_err(explain)?;
    println!(
        "uploaded {} as id {} ({} sealed)",
        record.display_name,
        record.id,
        fmt_bytes(record.size)
    );
    println!("  remote: {}", record.remote_path);
    Ok(())
}

// ── `sealdrive download` ──────────────────────────────────────────────────────

async fn cmd_download(
    cli: &Cli,
    config: &SealConfig,
    id: FileId,
    output: Option<&Path>,
) -> Result<()> {
    let owner = authenticate(cli, config)?;
    let secret = read_secret(cli)?;
    let engine = build_engine(config)?;

    let pb = make_spinner("download");
    pb.set_message(format!("id {id}"));
    let result = engine.download(owner, id, &secret).await;
    pb.finish_and_clear();

    let file = result.map_err(explain)?;
    let dest = match output {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(
            Path::new(&file.display_name)
                .file_name()
                .context("display name is not a usable file name; pass -o")?,
        ),
    };

    tokio::fs::write(&dest, &file.data)
        .await
        .with_context(|| format!("writing {}", dest.display()))?;
    println!("downloaded {} -> {} ({})", id, dest.display(), fmt_bytes(file.data.len() as u64));
    Ok(())
}

// ── `sealdrive ls` ────────────────────────────────────────────────────────────

async fn cmd_ls(cli: &Cli, config: &SealConfig, dir: &str) -> Result<()> {
    let owner = authenticate(cli, config)?;
    let engine = build_engine(config)?;

    let listing = engine.list(owner, dir).await?;

    println!("{:>6}  {:<4}  {:>9}  {:<3}  NAME", "ID", "KIND", "SIZE", "ENC");
    for entry in &listing.entries {
        let id = entry
            .id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".into());
        let size = match entry.entry_kind() {
            EntryKind::Directory => "-".to_string(),
            EntryKind::File => fmt_bytes(entry.size()),
        };
        println!(
            "{:>6}  {:<4}  {:>9}  {:<3}  {}",
            id,
            entry.entry_kind(),
            size,
            if entry.encrypted() { "yes" } else { "no" },
            entry.display_name()
        );
    }

    for warning in &listing.warnings {
        eprintln!(
            "warning: metadata not saved for {}: {}",
            warning.remote_path, warning.reason
        );
    }
    Ok(())
}

// ── `sealdrive name` / `info` ─────────────────────────────────────────────────

fn cmd_name(cli: &Cli, config: &SealConfig, id: FileId) -> Result<()> {
    let owner = authenticate(cli, config)?;
    let secret = read_secret(cli)?;
    let engine = build_engine(config)?;

    let name = engine.decrypt_display_name(owner, id, &secret)?;
    println!("{name}");
    Ok(())
}

fn cmd_info(cli: &Cli, config: &SealConfig, id: FileId) -> Result<()> {
    let owner = authenticate(cli, config)?;
    let engine = build_engine(config)?;

    let record = engine.file_info(owner, id)?;
    println!("id:           {}", record.id);
    println!("name:         {}", record.display_name);
    println!("stored name:  {}", record.stored_name);
    println!("remote path:  {}", record.remote_path);
    println!("kind:         {}", record.entry_kind);
    println!("content:      {}", record.content_kind);
    println!("size:         {} ({} bytes)", fmt_bytes(record.size), record.size);
    println!("encrypted:    {}", record.encrypted);
    println!("created:      {}", record.created_at);
    println!("updated:      {}", record.updated_at);
    Ok(())
}

// ── `sealdrive rm` ────────────────────────────────────────────────────────────

async fn cmd_rm(cli: &Cli, config: &SealConfig, id: FileId) -> Result<()> {
    let owner = authenticate(cli, config)?;
    let engine = build_engine(config)?;

    engine.delete(owner, id).await?;
    println!("deleted {id}");
    Ok(())
}

// ── `sealdrive health` ────────────────────────────────────────────────────────

async fn cmd_health(config: &SealConfig) -> Result<()> {
    let transport = build_transport(config)?;
    let pb = make_spinner("health");
    pb.set_message(format!("{:?} backend", config.storage.backend).to_lowercase());
    let result = check_health(transport.operator()).await;
    pb.finish_and_clear();

    result?;
    println!("storage: ok");
    Ok(())
}

// ── `sealdrive config show` ───────────────────────────────────────────────────

fn cmd_config_show(config: &SealConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();

    // Tokens are credentials; show only who they belong to
    let mut shown = config.clone();
    for entry in &mut shown.auth.tokens {
        entry.token = "[REDACTED]".into();
    }
    let rendered = toml::to_string_pretty(&shown).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
