//! Multisig Coordinator CLI Application
//!
//! Runs the proposal coordination server and small helper commands.

use clap::{Parser, Subcommand};
use multisig_coordinator::api::{create_router, ApiState};
use multisig_coordinator::backend::{MemoryBackend, DEFAULT_FEE_RATE};
use multisig_coordinator::config::{CoordinatorConfig, DEFAULT_PORT};
use multisig_coordinator::crypto::KeyPair;
use multisig_coordinator::events::{EventBus, DEFAULT_QUEUE_CAPACITY};
use multisig_coordinator::multisig::{MultisigManager, Token};
use multisig_coordinator::storage::{StorageConfig, WalletStore};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "coordinator")]
#[command(version = "0.1.0")]
#[command(about = "Proposal coordination for m-of-n shared wallets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Admin token (64 hex chars); generated when omitted
        #[arg(long, env = "COORDINATOR_ADMIN_TOKEN")]
        admin_token: Option<String>,

        /// Directory for wallet persistence; memory only when omitted
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Per-session event queue length
        #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
        queue_capacity: usize,

        /// Backend fee rate per 1000 bytes
        #[arg(long, default_value_t = DEFAULT_FEE_RATE)]
        fee_rate: u64,
    },

    /// Generate a random token
    Token,

    /// Generate a cosigner key pair
    Keygen,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            admin_token,
            data_dir,
            queue_capacity,
            fee_rate,
        } => {
            let admin_token = match admin_token {
                Some(hex) => Some(Token::from_hex(&hex).ok_or("admin token must be 64 hex chars")?),
                None => None,
            };
            let config = CoordinatorConfig {
                host,
                port,
                admin_token,
                data_dir,
                event_queue_capacity: queue_capacity,
                fee_rate,
            };
            run_server(config)
        }
        Commands::Token => {
            println!("{}", Token::generate().to_hex());
            Ok(())
        }
        Commands::Keygen => {
            let keypair = KeyPair::generate();
            println!("🔑 Public key:  {}", keypair.public_key_hex());
            println!("🔒 Private key: {}", keypair.private_key_hex());
            Ok(())
        }
    }
}

fn run_server(config: CoordinatorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let admin_token = match config.admin_token {
            Some(token) => token,
            None => {
                let token = Token::generate();
                println!("🔐 Generated admin token: {}", token.to_hex());
                token
            }
        };

        let store = match &config.data_dir {
            Some(dir) => {
                println!("📂 Wallet data directory: {}", dir.display());
                Some(WalletStore::new(StorageConfig::new(dir.clone()))?)
            }
            None => {
                println!("⚠️  No data directory, wallets are kept in memory only");
                None
            }
        };

        let backend = Arc::new(MemoryBackend::with_fee_rate(config.fee_rate));
        let events = Arc::new(EventBus::new(config.event_queue_capacity));
        let manager = MultisigManager::open(backend, store, admin_token, events)?;
        let app = create_router(ApiState::new(Arc::new(manager)));

        let addr = config.bind_address();
        println!("🚀 Coordinator starting on http://{}", addr);
        println!();
        println!("📖 Available endpoints:");
        println!("   GET    /health                           - Health check");
        println!("   GET    /ws                               - Event sessions");
        println!("   GET    /api/multisig                     - List wallets");
        println!("   PUT    /api/multisig/{{id}}                - Create wallet");
        println!("   GET    /api/multisig/{{id}}                - Wallet info");
        println!("   DELETE /api/multisig/{{id}}                - Remove wallet");
        println!("   POST   /api/multisig/{{id}}/join           - Join wallet");
        println!("   PUT    /api/multisig/{{id}}/token          - Rotate token");
        println!("   POST   /api/rescan                       - Rescan");
        println!("   POST   /api/multisig/{{id}}/proposal       - Create proposal");
        println!("   GET    /api/multisig/{{id}}/proposal       - List proposals");
        println!("   POST   /api/multisig/{{id}}/proposal/{{pid}}/approve - Approve");
        println!("   POST   /api/multisig/{{id}}/proposal/{{pid}}/reject  - Reject");
        println!("   POST   /api/multisig/{{id}}/proposal/{{pid}}/send    - Broadcast");
        println!();

        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            println!("\n📴 Shutting down coordinator...");
            std::process::exit(0);
        });

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
