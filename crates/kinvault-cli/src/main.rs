//! kinvault: end-to-end encrypted family vault CLI
//!
//! Accounts:
//!   register / login / passwd      - identity keypair sealed under the password
//!
//! Families:
//!   family create|add-member|list|members
//!
//! Records (sealed under the family key before they reach the store):
//!   milestone add|list
//!   note add|list|update|delete
//!   todo add|list|update|delete
//!
//! Every record command logs in and unlocks the identity locally; plaintext
//! only ever appears on stdout.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::path::{Path, PathBuf};

use kinvault_core::config::KinvaultConfig;
use kinvault_core::{FamilyId, NoteCategory, RecordId, Role, TodoCategory};
use kinvault_crypto::PublicIdentity;
use kinvault_store::LocalStore;
use kinvault_vault::{
    CryptoSettings, MilestoneDraft, NoteDraft, NoteUpdate, Session, TodoDraft, TodoUpdate, Vault,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "kinvault",
    version,
    about = "End-to-end encrypted family vault",
    long_about = "kinvault: share milestones, notes and to-dos with your family; \
                  the store only ever sees ciphertext"
)]
struct Cli {
    /// Path to kinvault.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "KINVAULT_CONFIG",
        default_value = "~/.config/kinvault/kinvault.toml",
        global = true
    )]
    config: PathBuf,

    /// Vault file (overrides [store] path)
    #[arg(long, env = "KINVAULT_STORE", global = true)]
    store: Option<PathBuf>,

    /// Log level or filter directive (overrides [log] level)
    #[arg(long, env = "KINVAULT_LOG", global = true)]
    log: Option<String>,

    /// Log format (overrides [log] format)
    #[arg(long, env = "KINVAULT_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    /// Phone number of the acting user
    #[arg(long, short = 'u', env = "KINVAULT_PHONE", global = true)]
    phone: Option<String>,

    /// Password of the acting user (prompted for when absent)
    #[arg(long, env = "KINVAULT_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

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
    /// Create an account: generates an identity keypair sealed under the password
    Register {
        /// Display name
        #[arg(long)]
        username: String,
    },

    /// Check the password and unlock the identity
    Login,

    /// Change password; the identity keypair and family access are kept
    Passwd {
        /// New password (prompted for when absent)
        #[arg(long, env = "KINVAULT_NEW_PASSWORD", hide_env_values = true)]
        new_password: Option<String>,
    },

    /// Families and membership
    Family {
        #[command(subcommand)]
        action: FamilyAction,
    },

    /// Dated family milestones
    Milestone {
        #[command(subcommand)]
        action: MilestoneAction,
    },

    /// Notes (addresses, prescriptions)
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },

    /// Shared to-do list
    Todo {
        #[command(subcommand)]
        action: TodoAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum FamilyAction {
    /// Create a family and become its owner
    Create {
        name: String,
        /// Your role: husband or wife (男主人 / 女主人)
        #[arg(long, default_value = "husband")]
        role: Role,
    },
    /// Grant the family key to another registered user (owner only)
    AddMember {
        #[arg(long)]
        family: u64,
        /// Phone number of the user to add
        member: String,
        #[arg(long, default_value = "son")]
        role: Role,
    },
    /// Families you belong to
    List,
    /// Members of a family, with public key fingerprints
    Members {
        #[arg(long)]
        family: u64,
    },
}

#[derive(Subcommand, Debug)]
enum MilestoneAction {
    Add {
        #[arg(long)]
        family: u64,
        /// Event date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        content: String,
    },
    List {
        #[arg(long)]
        family: u64,
        #[arg(long)]
        year: Option<i32>,
    },
}

#[derive(Subcommand, Debug)]
enum NoteAction {
    Add {
        #[arg(long)]
        family: u64,
        #[arg(long)]
        title: String,
        content: String,
        /// address or prescription
        #[arg(long, default_value = "address")]
        category: NoteCategory,
    },
    List {
        #[arg(long)]
        family: u64,
        #[arg(long)]
        category: Option<NoteCategory>,
    },
    Update {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        category: Option<NoteCategory>,
    },
    Delete {
        id: u64,
    },
}

#[derive(Subcommand, Debug)]
enum TodoAction {
    Add {
        #[arg(long)]
        family: u64,
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// life, study, exercise or wish
        #[arg(long, default_value = "life")]
        category: TodoCategory,
    },
    List {
        #[arg(long)]
        family: u64,
        #[arg(long)]
        category: Option<TodoCategory>,
        /// Only completed (true) or open (false) items
        #[arg(long)]
        completed: Option<bool>,
    },
    Update {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<TodoCategory>,
        #[arg(long)]
        completed: Option<bool>,
    },
    Delete {
        id: u64,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_home(&cli.config);
    let (config, found) = load_config(&config_path).await?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);
    if !found {
        tracing::warn!(path = %config_path.display(), "no config file, using defaults");
    }

    // Key generation and password KDFs are CPU-bound; keep them off the runtime
    tokio::task::spawn_blocking(move || run(cli, config, config_path, found))
        .await
        .context("command task panicked")?
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

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

// ── Config loading ────────────────────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<(KinvaultConfig, bool)> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing config: {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((KinvaultConfig::default(), false))
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

fn cmd_config_show(config: &KinvaultConfig, config_path: &Path, found: bool) -> Result<()> {
    if found {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Command dispatch ──────────────────────────────────────────────────────────

struct Actor {
    phone: Option<String>,
    password: Option<String>,
}

impl Actor {
    fn phone(&self) -> Result<&str> {
        self.phone
            .as_deref()
            .context("no user given: pass --phone or set KINVAULT_PHONE")
    }

    fn password(&self) -> Result<SecretString> {
        match &self.password {
            Some(p) => Ok(SecretString::from(p.clone())),
            None => prompt("Password: "),
        }
    }

    fn login(&self, vault: &Vault<LocalStore>) -> Result<Session> {
        match vault.login(self.phone()?, &self.password()?) {
            Ok(session) => Ok(session),
            // Password verified but the sealed key would not open
            Err(e) if e.is_decryption_failure() => {
                Err(anyhow::Error::new(e).context("stored identity key could not be unlocked"))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn prompt(label: &str) -> Result<SecretString> {
    let entered = rpassword::prompt_password(label).context("reading password")?;
    Ok(SecretString::from(entered))
}

fn open_vault(config: &KinvaultConfig, store: Option<&Path>) -> Result<Vault<LocalStore>> {
    let settings = CryptoSettings::try_from(&config.crypto)?;
    let path = expand_home(store.unwrap_or(&config.store.path));
    Ok(Vault::new(LocalStore::open(&path)?, settings))
}

fn run(cli: Cli, config: KinvaultConfig, config_path: PathBuf, found: bool) -> Result<()> {
    let open = || open_vault(&config, cli.store.as_deref());
    let actor = Actor {
        phone: cli.phone.clone(),
        password: cli.password.clone(),
    };
    let mut rng = rand::rngs::OsRng;

    match cli.command {
        Commands::Register { username } => {
            let vault = open()?;
            let phone = actor.phone()?;
            let password = match &actor.password {
                Some(p) => SecretString::from(p.clone()),
                None => prompt_new()?,
            };
            let user = vault.register(phone, &username, &password, &mut rng)?;
            let fingerprint =
                PublicIdentity::from_pem(&user.credentials.public_key)?.fingerprint()?;
            println!("registered {} (user {})", user.phone, user.id);
            println!("identity fingerprint: {fingerprint}");
        }
        Commands::Login => {
            let session = actor.login(&open()?)?;
            println!(
                "logged in as {} (user {}), identity fingerprint {}",
                session.user().username,
                session.user_id(),
                session.identity().public().fingerprint()?
            );
        }
        Commands::Passwd { new_password } => {
            let vault = open()?;
            let old_password = actor.password()?;
            let new_password = match new_password {
                Some(p) => SecretString::from(p),
                None => prompt_new()?,
            };
            vault.change_password(actor.phone()?, &old_password, &new_password, &mut rng)?;
            println!("password changed");
        }
        Commands::Family { action } => cmd_family(&open()?, &actor, action, &mut rng)?,
        Commands::Milestone { action } => cmd_milestone(&open()?, &actor, action, &mut rng)?,
        Commands::Note { action } => cmd_note(&open()?, &actor, action, &mut rng)?,
        Commands::Todo { action } => cmd_todo(&open()?, &actor, action, &mut rng)?,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path, found)?,
    }
    Ok(())
}

fn prompt_new() -> Result<SecretString> {
    use secrecy::ExposeSecret;

    let first = prompt("New password: ")?;
    let second = prompt("Repeat new password: ")?;
    if first.expose_secret() != second.expose_secret() {
        anyhow::bail!("passwords do not match");
    }
    Ok(first)
}

// ── `kinvault family` ─────────────────────────────────────────────────────────

fn cmd_family(
    vault: &Vault<LocalStore>,
    actor: &Actor,
    action: FamilyAction,
    rng: &mut rand::rngs::OsRng,
) -> Result<()> {
    let session = actor.login(vault)?;
    match action {
        FamilyAction::Create { name, role } => {
            let family = vault.create_family(&session, &name, role, rng)?;
            println!("created family {} \"{}\"", family.id, family.name);
        }
        FamilyAction::AddMember {
            family,
            member,
            role,
        } => {
            vault.add_member(&session, FamilyId(family), &member, role, rng)?;
            println!("added {member} to family {family} as {role}");
        }
        FamilyAction::List => {
            for f in vault.my_families(&session)? {
                let owner = if f.is_owner { " (owner)" } else { "" };
                println!("{}\t{}\t{}{owner}", f.family.id, f.family.name, f.role);
            }
        }
        FamilyAction::Members { family } => {
            for m in vault.family_members(&session, FamilyId(family))? {
                let owner = if m.is_owner { " (owner)" } else { "" };
                println!(
                    "{}\t{}\t{}\t{}\t{}{owner}",
                    m.user_id, m.phone, m.username, m.role, m.fingerprint
                );
            }
        }
    }
    Ok(())
}

// ── `kinvault milestone` ──────────────────────────────────────────────────────

fn cmd_milestone(
    vault: &Vault<LocalStore>,
    actor: &Actor,
    action: MilestoneAction,
    rng: &mut rand::rngs::OsRng,
) -> Result<()> {
    let session = actor.login(vault)?;
    match action {
        MilestoneAction::Add {
            family,
            date,
            content,
        } => {
            let m = vault.add_milestone(
                &session,
                FamilyId(family),
                MilestoneDraft {
                    event_date: date,
                    content,
                },
                rng,
            )?;
            println!("added milestone {}", m.id);
        }
        MilestoneAction::List { family, year } => {
            for m in vault.milestones(&session, FamilyId(family), year)? {
                println!("{}\t{}\t{}", m.id, m.event_date, m.content);
            }
        }
    }
    Ok(())
}

// ── `kinvault note` ───────────────────────────────────────────────────────────

fn cmd_note(
    vault: &Vault<LocalStore>,
    actor: &Actor,
    action: NoteAction,
    rng: &mut rand::rngs::OsRng,
) -> Result<()> {
    let session = actor.login(vault)?;
    match action {
        NoteAction::Add {
            family,
            title,
            content,
            category,
        } => {
            let n = vault.add_note(
                &session,
                FamilyId(family),
                NoteDraft {
                    title,
                    content,
                    category,
                },
                rng,
            )?;
            println!("added note {}", n.id);
        }
        NoteAction::List { family, category } => {
            for n in vault.notes(&session, FamilyId(family), category)? {
                println!("{}\t[{}]\t{}\n\t{}", n.id, n.category, n.title, n.content);
            }
        }
        NoteAction::Update {
            id,
            title,
            content,
            category,
        } => {
            let n = vault.update_note(
                &session,
                RecordId(id),
                NoteUpdate {
                    title,
                    content,
                    category,
                },
                rng,
            )?;
            println!("updated note {} at {}", n.id, n.updated_at);
        }
        NoteAction::Delete { id } => {
            vault.delete_note(&session, RecordId(id))?;
            println!("deleted note {id}");
        }
    }
    Ok(())
}

// ── `kinvault todo` ───────────────────────────────────────────────────────────

fn cmd_todo(
    vault: &Vault<LocalStore>,
    actor: &Actor,
    action: TodoAction,
    rng: &mut rand::rngs::OsRng,
) -> Result<()> {
    let session = actor.login(vault)?;
    match action {
        TodoAction::Add {
            family,
            title,
            description,
            category,
        } => {
            let t = vault.add_todo(
                &session,
                FamilyId(family),
                TodoDraft {
                    title,
                    description,
                    category,
                },
                rng,
            )?;
            println!("added to-do {}", t.id);
        }
        TodoAction::List {
            family,
            category,
            completed,
        } => {
            for t in vault.todos(&session, FamilyId(family), category, completed)? {
                let mark = if t.is_completed { "x" } else { " " };
                println!("[{mark}] {}\t[{}]\t{}", t.id, t.category, t.title);
                if let Some(description) = t.description {
                    println!("\t{description}");
                }
            }
        }
        TodoAction::Update {
            id,
            title,
            description,
            category,
            completed,
        } => {
            let t = vault.update_todo(
                &session,
                RecordId(id),
                TodoUpdate {
                    title,
                    description,
                    category,
                    is_completed: completed,
                },
                rng,
            )?;
            println!("updated to-do {} at {}", t.id, t.updated_at);
        }
        TodoAction::Delete { id } => {
            vault.delete_todo(&session, RecordId(id))?;
            println!("deleted to-do {id}");
        }
    }
    Ok(())
}
