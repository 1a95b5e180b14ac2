//! slk: seedlock command line
//!
//! Phrase commands:
//!   generate                - mint a fresh mnemonic
//!   validate [<phrase>]     - check a phrase (prompts without echo when omitted)
//!   suggest <text>          - complete the last unfinished word
//!
//! Vault commands:
//!   add <name>              - seal a phrase into the vault
//!   show <id> [--reveal]    - record details, optionally the phrase itself
//!   list [--archived]       - vault listing
//!   star <id>               - toggle a record's star
//!   archive <id>            - toggle a record's archived state
//!   remove <id> [--force]   - drop a record and its key
//!
//! Custody and backup:
//!   keys list|migrate       - inspect or re-home keyring keys
//!   backup create|restore|inspect|auto

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::io::Write;
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

use slk_backup::BackupContainer;
use slk_core::{short_id, SeedRecord, SlkConfig, Vault};
use slk_crypto::mnemonic;
use slk_keystore::{KeyCustodian, PlatformKeyring};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "slk",
    version,
    about = "seedlock: protected storage for BIP-39 seed phrases",
    long_about = "slk: seal seed phrases under per-record keys held in the platform keyring, \
                  with password-protected backup files for moving between machines"
)]
struct Cli {
    /// Path to the config file (default: $XDG_CONFIG_HOME/seedlock/config.toml)
    #[arg(long, short = 'c', env = "SLK_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter (overrides the config [log] section)
    #[arg(long, env = "SLK_LOG")]
    log: Option<String>,

    /// Log format
    #[arg(long, env = "SLK_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a fresh mnemonic phrase
    Generate {
        /// Number of words (12, 15, 18, 21, or 24)
        #[arg(long, short = 'w', default_value_t = 12)]
        words: usize,
    },

    /// Validate a phrase without storing it
    Validate {
        /// The phrase; omit to be prompted without echo
        phrase: Option<String>,
    },

    /// Complete the last unfinished word of a partial phrase
    Suggest {
        /// Partial phrase or word prefix
        text: String,
    },

    /// Seal a phrase into the vault (prompts for the phrase without echo)
    Add {
        /// Display name for the record
        name: String,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Free-text note
        #[arg(long)]
        note: Option<String>,
    },

    /// Show one record's details
    Show {
        /// Record id, unique id prefix, or exact name
        id: String,
        /// Decrypt and print the phrase
        #[arg(long)]
        reveal: bool,
    },

    /// List vault records
    List {
        /// Include archived records
        #[arg(long)]
        archived: bool,
    },

    /// Toggle a record's star
    Star {
        /// Record id, unique id prefix, or exact name
        id: String,
    },

    /// Toggle a record's archived state
    Archive {
        /// Record id, unique id prefix, or exact name
        id: String,
    },

    /// Remove a record and its keyring key
    Remove {
        /// Record id, unique id prefix, or exact name
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Backup file management
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Keyring key management
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
}

#[derive(Subcommand, Debug)]
enum BackupAction {
    /// Write a password-protected backup file
    Create {
        /// Output file (default: backup dir + conventional name)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Keep the password in the keyring for `backup auto`
        #[arg(long)]
        store_password: bool,
    },

    /// Restore records from a backup file
    Restore {
        /// Backup file to read
        file: PathBuf,
    },

    /// Print a backup file's header and entry list (no password needed)
    Inspect {
        /// Backup file to read
        file: PathBuf,
    },

    /// Run a backup now if one is due under the automatic schedule
    Auto,
}

#[derive(Subcommand, Debug)]
enum KeysAction {
    /// List key ids stored in the keyring
    List,

    /// Move every stored key to the given sync policy
    Migrate {
        /// Target policy: true for the synchronized keyring, false for device-local
        #[arg(action = clap::ArgAction::Set)]
        sync: bool,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_config(&config_path)?;

    let level = cli.log.as_deref().unwrap_or(config.log.level.as_str());
    let format = match &cli.log_format {
        Some(f) => f.clone(),
        None if config.log.format == "json" => LogFormat::Json,
        None => LogFormat::Text,
    };
    init_logging(level, &format);
    tracing::debug!(config = %config_path.display(), "configuration resolved");

    match cli.command {
        Commands::Generate { words } => cmd_generate(words),
        Commands::Validate { phrase } => cmd_validate(phrase),
        Commands::Suggest { text } => cmd_suggest(&text),
        Commands::Add { name, tags, note } => cmd_add(&config, name, tags, note),
        Commands::Show { id, reveal } => cmd_show(&config, &id, reveal),
        Commands::List { archived } => cmd_list(&config, archived),
        Commands::Star { id } => cmd_star(&config, &id),
        Commands::Archive { id } => cmd_archive(&config, &id),
        Commands::Remove { id, force } => cmd_remove(&config, &id, force),
        Commands::Backup { action } => match action {
            BackupAction::Create {
                out,
                store_password,
            } => cmd_backup_create(&config, out, store_password),
            BackupAction::Restore { file } => cmd_backup_restore(&config, &file),
            BackupAction::Inspect { file } => cmd_backup_inspect(&file),
            BackupAction::Auto => cmd_backup_auto(&config),
        },
        Commands::Keys { action } => match action {
            KeysAction::List => cmd_keys_list(&config),
            KeysAction::Migrate { sync } => cmd_keys_migrate(&config, sync),
        },
    }
}

// ── Config and logging ────────────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<SlkConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(SlkConfig::default())
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr; stdout is for command output
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
}

// ── Paths ─────────────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(".config")
        })
        .join("seedlock")
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(".local").join("share")
        })
        .join("seedlock")
}

fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn vault_path(config: &SlkConfig) -> PathBuf {
    config
        .vault
        .path
        .clone()
        .unwrap_or_else(|| data_dir().join("vault.json"))
}

fn backup_dir(config: &SlkConfig) -> PathBuf {
    config
        .backup
        .dir
        .clone()
        .unwrap_or_else(|| data_dir().join("backups"))
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn open_custodian(config: &SlkConfig) -> KeyCustodian<PlatformKeyring> {
    KeyCustodian::new(PlatformKeyring::new(config.keystore.service.clone()))
}

fn prompt_password(confirm: bool) -> Result<SecretString> {
    let first = rpassword::prompt_password("Backup password: ").context("reading password")?;
    if confirm {
        let mut second =
            rpassword::prompt_password("Confirm password: ").context("reading password")?;
        let matching = first == second;
        second.zeroize();
        if !matching {
            anyhow::bail!("passwords do not match");
        }
    }
    Ok(SecretString::from(first))
}

fn prompt_phrase() -> Result<String> {
    let mut raw = rpassword::prompt_password("Seed phrase: ").context("reading phrase")?;
    let cleaned = mnemonic::clean_phrase(&raw);
    raw.zeroize();
    Ok(cleaned)
}

fn device_name(config: &SlkConfig) -> String {
    config
        .backup
        .device_name
        .clone()
        .unwrap_or_else(slk_backup::default_device_name)
}

// ── `slk generate` / `slk validate` / `slk suggest` ───────────────────────────

fn cmd_generate(words: usize) -> Result<()> {
    let phrase = mnemonic::generate(words)?;
    println!("{phrase}");
    Ok(())
}

fn cmd_validate(phrase: Option<String>) -> Result<()> {
    let mut phrase = match phrase {
        Some(p) => p,
        None => rpassword::prompt_password("Seed phrase: ").context("reading phrase")?,
    };
    let word_count = phrase.split_whitespace().count();
    let result = mnemonic::validate(&phrase);
    phrase.zeroize();

    match result {
        Ok(()) => {
            println!("valid ({word_count} words)");
            Ok(())
        }
        Err(e) => anyhow::bail!("invalid phrase: {e}"),
    }
}

fn cmd_suggest(text: &str) -> Result<()> {
    let Some(prefix) = mnemonic::last_incomplete_word(text) else {
        println!("nothing to complete");
        return Ok(());
    };
    let suggestions = mnemonic::suggest(prefix);
    if suggestions.is_empty() {
        println!("no matches for '{prefix}'");
        return Ok(());
    }
    for word in suggestions {
        println!("{word}");
    }
    Ok(())
}

// ── Vault record commands ─────────────────────────────────────────────────────

fn cmd_add(
    config: &SlkConfig,
    name: String,
    tags: Vec<String>,
    note: Option<String>,
) -> Result<()> {
    let mut phrase = prompt_phrase()?;
    if let Err(e) = mnemonic::validate(&phrase) {
        phrase.zeroize();
        return Err(e.into());
    }
    let word_count = phrase.split_whitespace().count();

    let key = slk_crypto::generate_key();
    let sealed = slk_crypto::encrypt_phrase(&key, phrase.trim_end())?;
    phrase.zeroize();

    let mut record = SeedRecord::new(name, sealed, word_count);
    record.tags = tags;
    record.note = note;

    // Key custody first; the vault entry is useless without it
    let custodian = open_custodian(config);
    custodian.save(&record.id, &key, config.keystore.sync_enabled)?;

    let mut vault = Vault::open(&vault_path(config))?;
    let id = record.id.clone();
    vault.insert(record);
    vault.flush()?;

    println!("added {id}");
    Ok(())
}

fn cmd_show(config: &SlkConfig, id: &str, reveal: bool) -> Result<()> {
    let mut vault = Vault::open(&vault_path(config))?;
    let record = vault
        .find(id)
        .with_context(|| format!("no record matching '{id}'"))?
        .clone();

    println!("id:        {}", record.id);
    println!("name:      {}", record.name);
    if !record.tags.is_empty() {
        println!("tags:      {}", record.tags.join(", "));
    }
    println!("words:     {}", record.word_count);
    println!("created:   {}", record.created_at);
    println!("updated:   {}", record.updated_at);
    if let Some(at) = record.last_accessed_at {
        println!("accessed:  {at}");
    }
    if record.starred {
        println!("starred:   yes");
    }
    if record.archived {
        println!("archived:  yes");
    }
    if let Some(note) = &record.note {
        println!("note:      {note}");
    }

    if reveal {
        let custodian = open_custodian(config);
        let key = custodian.retrieve(&record.id)?;
        let mut phrase = slk_crypto::decrypt_phrase(&key, &record.encrypted_phrase)?;
        println!();
        println!("{phrase}");
        phrase.zeroize();

        let mut touched = record;
        touched.touch_accessed();
        vault.insert(touched);
        vault.flush()?;
    }
    Ok(())
}

fn cmd_list(config: &SlkConfig, archived: bool) -> Result<()> {
    let vault = Vault::open(&vault_path(config))?;

    let mut shown = 0usize;
    for record in vault.records() {
        if record.archived && !archived {
            continue;
        }
        let star = if record.starred { "*" } else { " " };
        println!(
            "{star} {}  {:>2}w  {}",
            short_id(&record.id),
            record.word_count,
            record.name
        );
        shown += 1;
    }
    if shown == 0 {
        println!("no records");
    }
    Ok(())
}

fn cmd_star(config: &SlkConfig, id: &str) -> Result<()> {
    let mut vault = Vault::open(&vault_path(config))?;
    let mut record = vault
        .find(id)
        .with_context(|| format!("no record matching '{id}'"))?
        .clone();

    let starred = record.toggle_starred();
    let record_id = record.id.clone();
    vault.insert(record);
    vault.flush()?;

    let verb = if starred { "starred" } else { "unstarred" };
    println!("{verb} {record_id}");
    Ok(())
}

fn cmd_archive(config: &SlkConfig, id: &str) -> Result<()> {
    let mut vault = Vault::open(&vault_path(config))?;
    let mut record = vault
        .find(id)
        .with_context(|| format!("no record matching '{id}'"))?
        .clone();

    let archived = record.toggle_archived();
    let record_id = record.id.clone();
    vault.insert(record);
    vault.flush()?;

    let verb = if archived { "archived" } else { "unarchived" };
    println!("{verb} {record_id}");
    Ok(())
}

fn cmd_remove(config: &SlkConfig, id: &str, force: bool) -> Result<()> {
    let mut vault = Vault::open(&vault_path(config))?;
    let record = vault
        .find(id)
        .with_context(|| format!("no record matching '{id}'"))?
        .clone();

    if !force {
        let short = short_id(&record.id);
        print!("remove '{}' ({short})? [y/N] ", record.name);
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y") {
            println!("aborted");
            return Ok(());
        }
    }

    let custodian = open_custodian(config);
    custodian.delete(&record.id)?;
    vault.remove(&record.id);
    vault.flush()?;

    println!("removed {}", record.id);
    Ok(())
}

// ── `slk backup ...` ──────────────────────────────────────────────────────────

fn cmd_backup_create(config: &SlkConfig, out: Option<PathBuf>, store_password: bool) -> Result<()> {
    let mut vault = Vault::open(&vault_path(config))?;
    let records: Vec<SeedRecord> = vault.records().cloned().collect();
    let custodian = open_custodian(config);

    let password = prompt_password(true)?;
    let outcome = slk_backup::build_backup(&records, &password, &custodian, &device_name(config))?;
    for skipped in &outcome.skipped {
        eprintln!("skipped {} ({}): {}", skipped.name, skipped.id, skipped.reason);
    }

    let path = match out {
        Some(p) => p,
        None => {
            let dir = backup_dir(config);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating backup dir: {}", dir.display()))?;
            dir.join(slk_backup::backup_file_name(outcome.container.created_at))
        }
    };
    std::fs::write(&path, outcome.container.to_json()?)
        .with_context(|| format!("writing backup: {}", path.display()))?;

    if store_password {
        custodian.save_backup_password(&password, config.keystore.sync_enabled)?;
    }

    vault.set_last_backup_at(outcome.container.created_at);
    vault.flush()?;

    println!(
        "wrote {} ({} records, {} skipped)",
        path.display(),
        outcome.container.entries.len(),
        outcome.skipped.len()
    );
    Ok(())
}

fn cmd_backup_restore(config: &SlkConfig, file: &Path) -> Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("reading backup: {}", file.display()))?;
    let container = BackupContainer::from_json(&data)?;

    let mut vault = Vault::open(&vault_path(config))?;
    let custodian = open_custodian(config);
    let password = prompt_password(false)?;

    let outcome = slk_backup::restore_backup(
        &container,
        &password,
        &vault.ids(),
        &custodian,
        config.keystore.sync_enabled,
    );

    let restored = outcome.restored.len();
    for record in outcome.restored {
        vault.insert(record);
    }
    vault.flush()?;

    for failure in &outcome.failed {
        eprintln!("failed {} ({}): {}", failure.name, failure.id, failure.reason);
    }
    println!(
        "restored {restored} records from '{}' ({} already present, {} failed)",
        container.device_name,
        outcome.skipped_existing.len(),
        outcome.failed.len()
    );
    Ok(())
}

fn cmd_backup_inspect(file: &Path) -> Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("reading backup: {}", file.display()))?;
    let container = BackupContainer::from_json(&data)?;

    println!("version:  {}", container.version);
    println!("device:   {}", container.device_name);
    println!("created:  {}", container.created_at);
    println!("entries:  {}", container.entries.len());
    for entry in &container.entries {
        println!(
            "  {}  {:>2}w  {}",
            short_id(&entry.id),
            entry.word_count,
            entry.name
        );
    }
    Ok(())
}

fn cmd_backup_auto(config: &SlkConfig) -> Result<()> {
    let mut vault = Vault::open(&vault_path(config))?;
    let due = slk_backup::should_auto_backup(
        config.backup.auto_enabled,
        vault.last_backup_at(),
        slk_core::now_epoch(),
        config.auto_interval_secs(),
    );
    if !due {
        println!("no backup due");
        return Ok(());
    }

    let custodian = open_custodian(config);
    let password = custodian.load_backup_password()?.context(
        "automatic backup needs a stored password; run `slk backup create --store-password` once",
    )?;

    let records: Vec<SeedRecord> = vault.records().cloned().collect();
    let outcome = slk_backup::build_backup(&records, &password, &custodian, &device_name(config))?;

    let dir = backup_dir(config);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating backup dir: {}", dir.display()))?;
    let path = dir.join(slk_backup::backup_file_name(outcome.container.created_at));
    std::fs::write(&path, outcome.container.to_json()?)
        .with_context(|| format!("writing backup: {}", path.display()))?;

    vault.set_last_backup_at(outcome.container.created_at);
    vault.flush()?;

    println!("wrote {}", path.display());
    Ok(())
}

// ── `slk keys ...` ────────────────────────────────────────────────────────────

fn cmd_keys_list(config: &SlkConfig) -> Result<()> {
    let custodian = open_custodian(config);
    let vault = Vault::open(&vault_path(config))?;
    let known = vault.ids();

    let ids = custodian.list_ids()?;
    if ids.is_empty() {
        println!("no keys stored");
        return Ok(());
    }
    for id in ids {
        if id == slk_keystore::BACKUP_PASSWORD_ID {
            println!("{id}  (backup password)");
        } else if known.contains(&id) {
            println!("{id}");
        } else {
            println!("{id}  (no vault record)");
        }
    }
    Ok(())
}

fn cmd_keys_migrate(config: &SlkConfig, sync: bool) -> Result<()> {
    let custodian = open_custodian(config);
    let report = custodian.migrate(sync)?;
    println!(
        "migrated {} keys ({} already in place)",
        report.migrated, report.skipped
    );
    Ok(())
}
