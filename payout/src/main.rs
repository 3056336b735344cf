//! payout - score a closed issue and sign its rewards

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;

use payout::{NftSettlement, PayoutInput, PayoutPipeline, PayoutSettings, Settlement};
use permit::{
    encrypt_signing_key, parse_private_key, EncryptedKeyMaterial, Erc721Permit, KdfParams,
    KeyVault, RpcEndpoints,
};
use relevance_agent::backend::openai::OPENAI_BASE_URL;
use relevance_agent::{Cl100kCounter, OpenAiBackend};

#[derive(Parser, Debug)]
#[command(name = "payout")]
#[command(about = "Contributor rewards for closed issues")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score an issue and sign authorizations
    Run {
        /// Issue, comments, collaborators and wallets as JSON
        #[arg(short, long)]
        input: PathBuf,

        /// Settings YAML
        #[arg(short, long)]
        config: PathBuf,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// API key for the LLM endpoint
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        openai_api_key: Option<String>,

        /// OpenAI-compatible endpoint
        #[arg(long, env = "LLM_BASE_URL", default_value = OPENAI_BASE_URL)]
        llm_base_url: String,

        /// Passphrase for the payment signing key
        #[arg(long, env = "PAYOUT_KEY_PASSPHRASE", hide_env_values = true)]
        key_passphrase: Option<String>,

        /// Passphrase for the NFT minter key
        #[arg(long, env = "NFT_KEY_PASSPHRASE", hide_env_values = true)]
        nft_key_passphrase: Option<String>,
    },

    /// Encrypt a private key for the settings file
    EncryptKey {
        /// Hex private key
        #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
        private_key: String,

        /// Passphrase that will unlock it
        #[arg(long, env = "KEY_PASSPHRASE", hide_env_values = true)]
        passphrase: String,

        /// Argon2 memory cost (KiB)
        #[arg(long, default_value = "65536")]
        memory_kib: u32,

        /// Argon2 iterations
        #[arg(long, default_value = "3")]
        iterations: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("payout={},info", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Run {
            input,
            config,
            output,
            openai_api_key,
            llm_base_url,
            key_passphrase,
            nft_key_passphrase,
        } => {
            let key_passphrase = key_passphrase.map(Zeroizing::new);
            let nft_key_passphrase = nft_key_passphrase.map(Zeroizing::new);
            run(
                &input,
                &config,
                output.as_deref(),
                openai_api_key,
                &llm_base_url,
                key_passphrase.as_deref().map(String::as_str),
                nft_key_passphrase.as_deref().map(String::as_str),
            )
            .await
        }
        Command::EncryptKey {
            private_key,
            passphrase,
            memory_kib,
            iterations,
        } => {
            let private_key = Zeroizing::new(private_key);
            let passphrase = Zeroizing::new(passphrase);
            let key = parse_private_key(&private_key)?;
            let kdf = KdfParams {
                memory_kib,
                iterations,
                ..KdfParams::default()
            };
            let material = encrypt_signing_key(&key, passphrase.as_bytes(), kdf)?;
            print!("{}", serde_yaml::to_string(&material)?);
            Ok(())
        }
    }
}

fn unlock(
    name: &str,
    material: Option<&EncryptedKeyMaterial>,
    passphrase: Option<&str>,
) -> Option<KeyVault> {
    match (material, passphrase) {
        (Some(material), Some(passphrase)) => {
            Some(KeyVault::new(material.clone(), passphrase.as_bytes().to_vec()))
        }
        (Some(_), None) => {
            error!(key = name, "Key material configured but no passphrase supplied");
            None
        }
        (None, _) => None,
    }
}

async fn run(
    input: &std::path::Path,
    config: &std::path::Path,
    output: Option<&std::path::Path>,
    openai_api_key: Option<String>,
    llm_base_url: &str,
    key_passphrase: Option<&str>,
    nft_key_passphrase: Option<&str>,
) -> anyhow::Result<()> {
    let settings_yaml = tokio::fs::read_to_string(config)
        .await
        .with_context(|| format!("reading {}", config.display()))?;
    let settings = PayoutSettings::from_yaml(&settings_yaml)?;
    settings.validate()?;

    let input_json = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let input: PayoutInput = serde_json::from_str(&input_json).context("parsing input")?;

    let default_model = settings
        .relevance
        .tiers
        .first()
        .map(|tier| tier.model.clone())
        .unwrap_or_default();
    let backend = OpenAiBackend::with_timeout(
        llm_base_url,
        default_model,
        openai_api_key,
        settings.relevance.request_timeout(),
    )?;
    let counter = Cl100kCounter::new()?;

    let payment_key = unlock(
        "payments.signing_key",
        settings.payments.signing_key.as_ref(),
        key_passphrase,
    );
    let providers = Arc::new(RpcEndpoints::new(
        settings.payments.rpc_urls.clone(),
        settings.rpc_timeout(),
    ));
    let mut settlement = Settlement::new(&settings, payment_key, providers)?;

    if settings.nft.enabled {
        match unlock("nft.minter_key", settings.nft.minter_key.as_ref(), nft_key_passphrase) {
            Some(key) => {
                let permit = Erc721Permit::new(settings.nft.network_id, settings.nft.contract_address()?);
                let providers = Arc::new(RpcEndpoints::new(
                    settings.nft.rpc_urls.clone(),
                    settings.rpc_timeout(),
                ));
                settlement = settlement.with_nft(NftSettlement::new(permit, key, providers));
            }
            None => error!("NFT rewards enabled but no minter key is usable"),
        }
    }

    let pipeline = PayoutPipeline::new(settings, Arc::new(backend), Arc::new(counter), settlement)?;
    let report = pipeline.run(&input).await?;

    info!(
        run_id = %report.run_id,
        authorizations = report.authorizations.len(),
        skipped = report.skipped.len(),
        "Report ready"
    );

    let json = serde_json::to_string_pretty(&report)?;
    match output {
        Some(path) => tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
