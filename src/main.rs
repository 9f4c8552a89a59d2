use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use atrest::crypto::kdf::{
    DEFAULT_ARGON2_MEM_COST_KIB, DEFAULT_ARGON2_PARALLELISM, DEFAULT_ARGON2_TIME_COST,
    DEFAULT_PBKDF2_ITERATIONS,
};
use atrest::{Context, FileStore, KdfParams, KeyValueStore, Keyring, ReEncryptor};
use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;
use tracing_subscriber::EnvFilter;

mod auth;
mod secrets;

use secrets::SecretStore;

/// Encrypted secret collection.
const SECRETS_KEY: &str = "atrest_cli_secrets";
/// KDF parameters chosen at `init`, as JSON.
const KDF_KEY: &str = "atrest_cli_kdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KdfKind {
    Pbkdf2,
    Argon2id,
}

#[derive(Debug, clap::Args)]
struct KdfArgs {
    /// Key derivation function
    #[arg(long, value_enum, default_value_t = KdfKind::Pbkdf2)]
    kdf: KdfKind,

    /// PBKDF2 iterations (default: 1000000)
    #[arg(long = "pbkdf2-iterations")]
    iterations: Option<u32>,

    /// Argon2 memory cost in KiB (default: 65536)
    #[arg(long = "argon-mem")]
    mem_cost_kib: Option<u32>,

    /// Argon2 time cost / iterations (default: 3)
    #[arg(long = "argon-time")]
    time_cost: Option<u32>,

    /// Argon2 parallelism (default: 1)
    #[arg(long = "argon-parallelism")]
    parallelism: Option<u32>,
}

impl KdfArgs {
    fn to_kdf_params(&self) -> Result<KdfParams> {
        let params = match self.kdf {
            KdfKind::Pbkdf2 => {
                KdfParams::pbkdf2(self.iterations.unwrap_or(DEFAULT_PBKDF2_ITERATIONS))?
            }
            KdfKind::Argon2id => KdfParams::argon2id(
                self.mem_cost_kib.unwrap_or(DEFAULT_ARGON2_MEM_COST_KIB),
                self.time_cost.unwrap_or(DEFAULT_ARGON2_TIME_COST),
                self.parallelism.unwrap_or(DEFAULT_ARGON2_PARALLELISM),
            )?,
        };
        Ok(params)
    }
}

#[derive(Debug, Parser)]
#[command(name = "atrest")]
#[command(
    version,
    about = "Secrets encrypted at rest under a key derived from your user name and password."
)]
struct Cli {
    /// Path to the atrest store file
    #[arg(long, global = true, value_name = "PATH", env = "ATREST_STORE")]
    store: Option<PathBuf>,

    /// User name the key is derived from (default: login name)
    #[arg(long, global = true, value_name = "NAME", env = "ATREST_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Initializes the store and sets the password
    Init {
        #[command(flatten)]
        kdf: KdfArgs,
    },

    /// Stores a secret by name
    #[command(arg_required_else_help = true)]
    Set { name: String, value: String },

    /// Retrieves a secret by name
    #[command(arg_required_else_help = true)]
    Get { name: String },

    /// Updates an existing secret by name
    #[command(arg_required_else_help = true)]
    Update { name: String, new_value: String },

    /// Removes a secret by name
    #[command(arg_required_else_help = true)]
    Remove { name: String },

    /// Lists stored secrets
    List {
        /// Print names and update times
        #[arg(short, long, default_value_t = false)]
        all: bool,
    },

    /// Changes the password and re-encrypts every secret
    Passwd {
        /// Switch to a different user name as well
        #[arg(long, value_name = "NAME")]
        new_user: Option<String>,
    },

    /// Deletes all secrets and the stored credentials
    Reset {
        /// Confirms that all secrets will be lost
        #[arg(long)]
        yes: bool,
    },

    /// Shows whether the store is initialized
    Status,
}

fn default_store_path() -> Result<PathBuf> {
    let project_dirs =
        ProjectDirs::from("", "", "atrest").context("could not determine platform directories")?;

    Ok(project_dirs.data_dir().join("atrest.json"))
}

fn resolve_store(path: Option<PathBuf>) -> Result<FileStore> {
    let path = match path {
        Some(p) => p,
        None => default_store_path()?,
    };
    Ok(FileStore::new(path))
}

fn load_kdf(store: &FileStore) -> Result<Option<KdfParams>> {
    store
        .get(KDF_KEY)?
        .map(|raw| serde_json::from_str(&raw).context("stored KDF configuration is malformed"))
        .transpose()
}

/// Opens the keyring with the stored KDF and checks the password.
fn unlock(store: FileStore, user: &str) -> Result<(Keyring<FileStore>, Context)> {
    let Some(kdf) = load_kdf(&store)? else {
        bail!("atrest store is not initialized; run `atrest init`");
    };
    let keyring = Keyring::with_kdf(store, kdf);
    if !keyring.is_initialized()? {
        bail!("atrest store is not initialized; run `atrest init`");
    }

    let password = auth::read_password()?;
    let context = keyring
        .open(user, &password)?
        .context("invalid user name or password")?;
    Ok((keyring, context))
}

fn load_secrets(keyring: &Keyring<FileStore>, context: &Context) -> Result<SecretStore> {
    match keyring.store().get(SECRETS_KEY)? {
        Some(envelope) => atrest::decrypt_object(context, &envelope)
            .context("failed to decrypt secrets; possibly corrupted data"),
        None => Ok(SecretStore::new()),
    }
}

fn save_secrets(
    keyring: &Keyring<FileStore>,
    context: &Context,
    secrets: &SecretStore,
) -> Result<()> {
    let envelope = atrest::encrypt_object(context, secrets)?;
    keyring.store().set(SECRETS_KEY, &envelope)?;
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("atrest=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let store = resolve_store(args.store)?;

    match args.command {
        Commands::Init { kdf } => {
            let kdf = kdf.to_kdf_params()?;
            let keyring = Keyring::with_kdf(store, kdf);
            if keyring.is_initialized()? {
                bail!("atrest store already exists");
            }

            let user = auth::resolve_user_name(args.user)?;
            let password = auth::read_password()?;

            keyring
                .store()
                .set(KDF_KEY, &serde_json::to_string(&kdf)?)?;
            let mut context = keyring
                .open(&user, &password)?
                .context("store was initialized concurrently")?;
            save_secrets(&keyring, &context, &SecretStore::new())?;
            atrest::close(&mut context);

            println!("store initialized");
        }
        Commands::Set { name, value } => {
            let user = auth::resolve_user_name(args.user)?;
            let (keyring, context) = unlock(store, &user)?;
            let mut secrets = load_secrets(&keyring, &context)?;
            secrets.set(&name, &value)?;
            save_secrets(&keyring, &context, &secrets)?;
            println!("stored secret '{name}'");
        }
        Commands::Get { name } => {
            let user = auth::resolve_user_name(args.user)?;
            let (keyring, context) = unlock(store, &user)?;
            let secrets = load_secrets(&keyring, &context)?;
            match secrets.get(&name) {
                Some(value) => println!("{value}"),
                None => println!("secret not found"),
            }
        }
        Commands::Update { name, new_value } => {
            let user = auth::resolve_user_name(args.user)?;
            let (keyring, context) = unlock(store, &user)?;
            let mut secrets = load_secrets(&keyring, &context)?;
            secrets.update(&name, &new_value)?;
            save_secrets(&keyring, &context, &secrets)?;
            println!("secret '{name}' updated");
        }
        Commands::Remove { name } => {
            let user = auth::resolve_user_name(args.user)?;
            let (keyring, context) = unlock(store, &user)?;
            let mut secrets = load_secrets(&keyring, &context)?;
            secrets.remove(&name)?;
            save_secrets(&keyring, &context, &secrets)?;
            println!("secret '{name}' removed");
        }
        Commands::List { all } => {
            let user = auth::resolve_user_name(args.user)?;
            let (keyring, context) = unlock(store, &user)?;
            let secrets = load_secrets(&keyring, &context)?;

            if secrets.is_empty() {
                println!("No secrets stored.");
                return Ok(());
            }

            if all {
                let name_width = secrets
                    .entries()
                    .map(|e| e.name().len())
                    .chain(std::iter::once("Name".len()))
                    .max()
                    .unwrap_or_default();

                println!("{:<name_width$}  Updated", "Name");
                println!("{:-<name_width$}  -------", "");
                for e in secrets.entries() {
                    println!("{:<name_width$}  {}", e.name(), e.updated());
                }
            } else {
                for name in secrets.names() {
                    println!("{name}");
                }
            }
        }
        Commands::Passwd { new_user } => {
            let user = auth::resolve_user_name(args.user)?;
            let (keyring, mut old) = unlock(store, &user)?;
            let new_user = new_user.unwrap_or(user);
            let new_password = auth::read_new_password_with_confirmation()?;

            let new = keyring.change_credentials_and_re_encrypt(
                &mut old,
                &new_user,
                &new_password,
                |old, new| -> Result<bool> {
                    let Some(envelope) = keyring.store().get(SECRETS_KEY)? else {
                        return Ok(true);
                    };
                    let moved = ReEncryptor::new(old, new)?.re_encrypt(&envelope)?;
                    if let Err(e) = keyring.store().set(SECRETS_KEY, &moved) {
                        keyring
                            .store()
                            .set(SECRETS_KEY, &envelope)
                            .context("failed to restore secrets after a failed write")?;
                        return Err(e.into());
                    }
                    Ok(true)
                },
            );
            let mut new = new.context("password not changed")?;
            atrest::close(&mut new);

            println!("password changed");
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("refusing to delete all secrets without --yes");
            }
            let keyring = Keyring::new(store);
            keyring.store().remove(SECRETS_KEY)?;
            keyring.store().remove(KDF_KEY)?;
            keyring.dangerously_de_initialize()?;
            println!("store reset");
        }
        Commands::Status => {
            let initialized = match load_kdf(&store)? {
                Some(kdf) => Keyring::with_kdf(store, kdf).is_initialized()?,
                None => false,
            };
            if initialized {
                println!("initialized");
            } else {
                println!("not initialized");
            }
        }
    }

    Ok(())
}
