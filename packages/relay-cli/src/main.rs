use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relay_core::{
    chain_adapter::{DestinationClient, SubstrateRpcClient},
    relayer::NdjsonEvents,
    AccountLocks, Config, Coordinator, Ingestor, MessageTransformer, RelayQueue, RetryPolicy,
    Shutdown, SourceEvent, Submitter,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 验证并解析配置文件
    ValidateConfig {
        /// 配置文件路径
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },
    /// 转换单个源链事件并输出签名后的消息
    Transform {
        /// 配置文件路径
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
        /// JSON 格式的事件
        #[arg(short, long, value_name = "JSON")]
        event: String,
    },
    /// 启动中继器服务
    Start {
        /// 配置文件路径
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
        /// 每行一个 JSON 事件，默认读取标准输入
        #[arg(short, long, value_name = "FILE")]
        events: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ValidateConfig { config } => {
            info!("Validating config file: {:?}", config);
            let config = Config::load(config)?;
            let attestation = config.attestation_signer()?;
            let account = config.account_key()?;
            println!("配置文件验证成功!");
            println!("- 目标链: {}", config.destination.rpc_url);
            println!(
                "- 调用: {}.{}",
                config.destination.call_module, config.destination.call_name
            );
            println!("- 证明公钥: 0x{}", hex::encode(attestation.public_key()));
            println!("- 提交账户: 0x{}", hex::encode(account.public_key()));
            println!("- 中继器配置:");
            println!("  - 队列容量: {}", config.relayer.queue_capacity);
            println!("  - 最大重试次数: {}", config.relayer.max_retries);
            println!("  - 重试延迟: {}毫秒", config.relayer.retry_delay_ms);
            Ok(())
        }
        Commands::Transform { config, event } => {
            let config = Config::load(config)?;
            let event: SourceEvent =
                serde_json::from_str(&event).context("Failed to parse event JSON")?;
            let transformer = MessageTransformer::new(Arc::new(config.attestation_signer()?));
            let message = transformer.transform(&event)?;
            println!("app_id:  0x{}", message.app_id_hex());
            println!("payload: 0x{}", hex::encode(&message.payload));
            Ok(())
        }
        Commands::Start { config, events } => {
            info!("Starting relayer with config {:?}", config);
            let config = Config::load(config)?;

            let reader: Box<dyn AsyncRead + Unpin + Send> = match events {
                Some(path) => Box::new(
                    tokio::fs::File::open(&path)
                        .await
                        .with_context(|| format!("Failed to open events file {:?}", path))?,
                ),
                None => Box::new(tokio::io::stdin()),
            };

            run(config, NdjsonEvents::new(reader)).await
        }
    }
}

async fn run(config: Config, mut source: NdjsonEvents<Box<dyn AsyncRead + Unpin + Send>>) -> Result<()> {
    let transformer = MessageTransformer::new(Arc::new(config.attestation_signer()?));
    let client: Arc<dyn DestinationClient> =
        Arc::new(SubstrateRpcClient::new(&config.destination.rpc_url));
    let submitter = Submitter::new(
        client,
        config.account_key()?,
        AccountLocks::new(),
        &config.destination.call_module,
        &config.destination.call_name,
    );
    info!(
        account = %hex::encode(submitter.account()),
        attestation = %hex::encode(transformer.signer().public_key()),
        "Submitting as destination account"
    );

    let (producer, mut queue) = RelayQueue::bounded(config.relayer.queue_capacity);
    let shutdown = Shutdown::new();

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C, shutting down");
                shutdown.trigger();
            }
        });
    }

    let ingestion = {
        let shutdown = shutdown.clone();
        let ingestor = Ingestor::new(transformer, producer);
        tokio::spawn(async move {
            let result = ingestor.run(&mut source, shutdown.clone()).await;
            if result.is_err() {
                shutdown.trigger();
            }
            result
        })
    };

    let coordinator = Coordinator::new(Arc::new(submitter), RetryPolicy::from(&config.relayer));
    let stats = coordinator.start(&mut queue, shutdown.clone()).await;
    let ingested = ingestion.await.context("Ingestion task panicked")?;
    let interrupted = shutdown.is_triggered();

    match (ingested, stats) {
        (Ok(enqueued), Ok(stats)) => {
            info!(
                enqueued,
                submitted = stats.submitted,
                failed = stats.failed,
                interrupted,
                "Relayer stopped"
            );
            Ok(())
        }
        (Err(e), _) | (_, Err(e)) => {
            error!("Relayer exited abnormally: {}", e);
            Err(e.into())
        }
    }
}
