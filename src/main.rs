// src/main.rs
use std::time::Duration;

use clap::Parser;
use dotenv::dotenv;
use ethers::types::U256;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use smart_account_provider::types::{parse_bytes, parse_quantity};
use smart_account_provider::{
    GasConfig, NonceMode, SmartAccountProvider, SmartAccountProviderConfig, TargetCall,
};

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Send an ERC-4337 UserOperation through a bundler",
    long_about = None
)]
struct Args {
    #[clap(long, env = "OWNER_PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    #[clap(long, env = "RPC_URL")]
    rpc_url: String,

    /// Defaults to the RPC URL.
    #[clap(long, env = "BUNDLER_URL")]
    bundler_url: Option<String>,

    #[clap(long, env = "ENTRY_POINT_ADDRESS")]
    entry_point: String,

    #[clap(long, env = "FACTORY_ADDRESS")]
    factory: String,

    #[clap(short, long, env = "CHAIN_ID")]
    chain_id: u64,

    #[clap(long, default_value = "0")]
    salt: u64,

    /// Call target of the smart account.
    #[clap(short, long)]
    target: String,

    #[clap(short, long, default_value = "0x")]
    data: String,

    /// Wei, decimal or 0x-hex.
    #[clap(short, long, default_value = "0")]
    value: String,

    /// Read the nonce from the entry point instead of the owner's pending count.
    #[clap(long)]
    entry_point_nonce: bool,

    #[clap(long)]
    call_gas_limit: Option<String>,

    #[clap(long)]
    verification_gas_limit: Option<String>,

    #[clap(long)]
    pre_verification_gas: Option<String>,

    #[clap(long)]
    max_fee_per_gas: Option<String>,

    #[clap(long)]
    max_priority_fee_per_gas: Option<String>,

    /// Hex `paymasterAndData`; leave as `0x` when unsponsored.
    #[clap(long, default_value = "0x")]
    paymaster_and_data: String,

    #[clap(long, default_value = "30")]
    timeout_secs: u64,

    /// Only print the counterfactual smart account address.
    #[clap(long)]
    address_only: bool,

    #[clap(long)]
    verbose: bool,
}

fn gas_option(field: &str, value: &Option<String>) -> anyhow::Result<Option<U256>> {
    Ok(value
        .as_deref()
        .map(|v| parse_quantity(field, v))
        .transpose()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = SmartAccountProviderConfig::new(
        args.private_key.clone(),
        args.rpc_url.clone(),
        args.entry_point.clone(),
        args.factory.clone(),
        args.chain_id,
    );
    config.bundler_endpoint = args.bundler_url.clone();
    let salt = U256::from(args.salt);
    config.salt = salt;
    config.request_timeout = Duration::from_secs(args.timeout_secs);
    config.gas = GasConfig {
        call_gas_limit: gas_option("callGasLimit", &args.call_gas_limit)?,
        verification_gas_limit: gas_option("verificationGasLimit", &args.verification_gas_limit)?,
        pre_verification_gas: gas_option("preVerificationGas", &args.pre_verification_gas)?,
        max_fee_per_gas: gas_option("maxFeePerGas", &args.max_fee_per_gas)?,
        max_priority_fee_per_gas: gas_option(
            "maxPriorityFeePerGas",
            &args.max_priority_fee_per_gas,
        )?,
    };
    config.paymaster_and_data = parse_bytes("paymasterAndData", &args.paymaster_and_data)?;
    if args.entry_point_nonce {
        config.nonce_mode = NonceMode::EntryPoint;
    }

    let provider = SmartAccountProvider::connect(config)?;

    if args.address_only {
        let account = provider.smart_account_address(salt).await?;
        println!("{:?}", account);
        return Ok(());
    }

    let target = TargetCall::parse(&args.target, &args.data, &args.value)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            ctrl_c.cancel();
        }
    });

    let outcome = provider.send_user_operation(&target, &cancel).await?;
    info!(
        "Submitted user operation {} (HTTP {})",
        outcome.operation.hash(),
        outcome.response.status
    );
    println!("{}", outcome.response.body);

    Ok(())
}
