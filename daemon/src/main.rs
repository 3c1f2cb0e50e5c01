//! `custody`: keyring management from the command line.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use custody_cache::{BlobCache, LmdbBlobStore};
use custody_crypto::password_strength;
use custody_utils::LogFormat;
use custody_wallet_core::{
    HttpAgentConnector, Keyring, OfflineLedger, SessionState, Wallet, WalletContext,
};
use zeroize::Zeroizing;

use crate::config::CustodyConfig;

#[derive(Parser)]
#[command(name = "custody", about = "Custodial wallet keyring tool")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "CUSTODY_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for the keyring store.
    #[arg(long, env = "CUSTODY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log filter: "trace", "debug", "info", "warn", "error" or directives.
    #[arg(long, env = "CUSTODY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "CUSTODY_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Create a keyring from a fresh recovery phrase.
    Generate {
        #[arg(long, env = "CUSTODY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create a keyring from an existing recovery phrase.
    Import {
        #[arg(long, env = "CUSTODY_PHRASE", hide_env_values = true)]
        phrase: String,
        #[arg(long, env = "CUSTODY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// List the keyring's wallets.
    Show,
    /// Unlock the current wallet and report its session state.
    Unlock {
        #[arg(long, env = "CUSTODY_PASSWORD", hide_env_values = true)]
        password: String,
        /// Connect an agent to the configured host instead of staying offline.
        #[arg(long)]
        online: bool,
    },
    /// Check a password against the strength policy.
    CheckPassword {
        #[arg(long, env = "CUSTODY_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<CustodyConfig> {
        let mut config = match &self.config {
            Some(path) => CustodyConfig::from_toml_file(path)?,
            None => CustodyConfig::default(),
        };
        if let Some(data_dir) = &self.data_dir {
            config.data_dir.clone_from(data_dir);
        }
        if let Some(level) = &self.log_level {
            config.log_level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    custody_utils::init_logging(config.log_format, &config.log_level)?;

    match cli.command {
        Command::Generate { password } => generate(&config, Zeroizing::new(password)).await,
        Command::Import { phrase, password } => {
            import(&config, Zeroizing::new(phrase), Zeroizing::new(password)).await
        }
        Command::Show => show(&config).await,
        Command::Unlock { password, online } => {
            unlock(&config, Zeroizing::new(password), online).await
        }
        Command::CheckPassword { password } => check_password(&Zeroizing::new(password)),
    }
}

fn context(config: &CustodyConfig, online: bool) -> anyhow::Result<Arc<WalletContext>> {
    let path = config.store_path();
    let store = LmdbBlobStore::open(&path, config.wallet.cache.map_size)
        .with_context(|| format!("opening store at {}", path.display()))?;
    let blobs = BlobCache::new(Arc::new(store));

    let ctx = if online {
        let connector = HttpAgentConnector::new(config.wallet.agent_timeout())?;
        WalletContext::new(
            config.wallet.clone(),
            Arc::new(connector),
            Arc::new(OfflineLedger),
            blobs,
        )
    } else {
        WalletContext::offline(config.wallet.clone(), blobs)
    };
    Ok(Arc::new(ctx))
}

async fn ensure_no_keyring(ctx: &Arc<WalletContext>) -> anyhow::Result<()> {
    if Keyring::load(ctx.clone()).await?.is_some() {
        bail!("a keyring already exists in this data directory");
    }
    Ok(())
}

async fn load_keyring(ctx: Arc<WalletContext>) -> anyhow::Result<Keyring> {
    Keyring::load(ctx)
        .await?
        .context("no keyring found; run `custody generate` or `custody import` first")
}

async fn generate(config: &CustodyConfig, password: Zeroizing<String>) -> anyhow::Result<()> {
    let ctx = context(config, false)?;
    ensure_no_keyring(&ctx).await?;

    let (keyring, phrase) = Keyring::create(ctx, &password).await?;
    keyring.save().await?;

    println!("Recovery phrase (write it down, it is shown only once):");
    println!();
    println!("    {}", phrase.as_str());
    println!();
    print_wallet(keyring.current());
    Ok(())
}

async fn import(
    config: &CustodyConfig,
    phrase: Zeroizing<String>,
    password: Zeroizing<String>,
) -> anyhow::Result<()> {
    let ctx = context(config, false)?;
    ensure_no_keyring(&ctx).await?;

    let keyring = Keyring::import(ctx, phrase.trim(), &password).await?;
    keyring.save().await?;
    print_wallet(keyring.current());
    Ok(())
}

async fn show(config: &CustodyConfig) -> anyhow::Result<()> {
    let keyring = load_keyring(context(config, false)?).await?;
    for wallet in keyring.wallets() {
        let marker = if wallet.derivation_index() == keyring.current_index() {
            "*"
        } else {
            " "
        };
        print!("{marker} ");
        print_wallet(wallet);
    }
    Ok(())
}

async fn unlock(
    config: &CustodyConfig,
    password: Zeroizing<String>,
    online: bool,
) -> anyhow::Result<()> {
    let mut keyring = load_keyring(context(config, online)?).await?;
    let state = keyring.unlock(&password).await?;

    print_wallet(keyring.current());
    match &state {
        SessionState::Ready => println!("  session: ready"),
        SessionState::Degraded { reason } => println!("  session: degraded ({reason})"),
        other => println!("  session: {other}"),
    }
    keyring.lock();
    Ok(())
}

fn check_password(password: &str) -> anyhow::Result<()> {
    let unmet = password_strength(password);
    if unmet.is_empty() {
        println!("password is strong");
        return Ok(());
    }
    for rule in &unmet {
        println!("  - {}", rule.describe());
    }
    bail!("password does not meet {} rule(s)", unmet.len())
}

fn print_wallet(wallet: &Wallet) {
    println!(
        "[{}] {} ({})",
        wallet.derivation_index(),
        wallet.name(),
        wallet.network().as_str()
    );
    println!("  principal:  {}", wallet.principal());
    println!("  account id: {}", wallet.account_id());
    for token in wallet.tokens() {
        println!("  token:      {} {}", token.symbol(), token.canister_id());
    }
}
