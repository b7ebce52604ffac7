//! A small end-to-end example wiring `armi-core` through `armi-codec` and `armi-transport`:
//! a single `Counter` interface served over TCP or an in-process pipe.

mod counter;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use armi::client::ClientContext;
use armi::config::Config;
use armi::server::ServerContext;
use armi::wire::Codec;
use armi_codec::{ArchiveCodec, TaggedCodec};
use armi_transport::config::TransportConfig;
use armi_transport::{inproc, tcp};

use counter::{Counter, CounterProxy, CounterStub};

const DEFAULT_MAX_FRAME_BYTES: usize = 1 << 20;

#[derive(Debug, Parser)]
#[command(name = "counter-demo")]
#[command(about = "Exercises the armi dispatch engine with a one-interface counter service")]
struct Cli {
    /// Which wire codec to run the demo's counter service over.
    #[arg(long, value_enum, default_value = "tagged")]
    codec: CodecChoice,

    /// Skip the length-prefix framer, wiring the in-process demo over plain channels instead
    /// of an in-memory duplex stream. Ignored by `serve`/`call`, which always run over TCP.
    #[arg(long)]
    no_framing: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CodecChoice {
    Tagged,
    Archive,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the counter service in-process, without a socket.
    Demo,
    /// Serves the counter over TCP until killed.
    Serve {
        #[arg(long, default_value = "127.0.0.1:7700")]
        addr: String,
        /// Load bind address and frame size bound from a TOML file instead of `--addr`.
        #[arg(long)]
        config: Option<String>,
    },
    /// Connects to a counter service over TCP and issues one call.
    Call {
        #[arg(long, default_value = "127.0.0.1:7700")]
        addr: String,
        #[arg(long)]
        config: Option<String>,
        #[arg(long, value_enum, default_value = "increment")]
        method: CallMethod,
        /// Amount passed to `increment-by`; ignored by every other method.
        #[arg(long, default_value_t = 1)]
        amount: i64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CallMethod {
    Increment,
    Decrement,
    GetValue,
    Reset,
    IncrementBy,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let no_framing = cli.no_framing;

    let exit_code = match cli.codec {
        CodecChoice::Tagged => run(Arc::new(TaggedCodec), cli.command, no_framing).await,
        CodecChoice::Archive => run(Arc::new(ArchiveCodec), cli.command, no_framing).await,
    };

    std::process::exit(exit_code);
}

async fn run<C: Codec + Default>(codec: Arc<C>, command: Command, no_framing: bool) -> i32 {
    match command {
        Command::Demo => match run_demo(codec, no_framing).await {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("{err}");
                1
            }
        },
        Command::Serve { addr, config } => {
            let transport_config = load_transport_config(config, addr);
            match run_serve(codec, transport_config).await {
                Ok(()) => 0,
                Err(err) => {
                    eprintln!("{err}");
                    1
                }
            }
        }
        Command::Call {
            addr,
            config,
            method,
            amount,
        } => {
            let transport_config = load_transport_config(config, addr);
            match run_call(codec, transport_config, method, amount).await {
                Ok(value) => {
                    println!("{value}");
                    0
                }
                Err(err) => {
                    eprintln!("{err}");
                    1
                }
            }
        }
    }
}

fn load_transport_config(config_path: Option<String>, addr: String) -> TransportConfig {
    match config_path {
        Some(path) => TransportConfig::from_file(path).expect("failed to load transport config"),
        None => TransportConfig {
            bind_addr: addr,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        },
    }
}

fn server_context<C: Codec + Default>(codec: Arc<C>) -> Arc<ServerContext<C, Counter>> {
    Arc::new(
        ServerContext::builder(codec)
            .interface(Arc::new(CounterStub))
            .build(|_channel_id| Some(Arc::new(Counter::default()))),
    )
}

async fn run_demo<C: Codec + Default>(codec: Arc<C>, no_framing: bool) -> Result<(), armi::Error> {
    let server = server_context(codec.clone());
    let config = Config::builder()
        .framing(!no_framing)
        .default_timeout(Duration::from_secs(5))
        .build();
    let client = ClientContext::builder(codec).config(config).build();

    let (channel_id, _server_channel_id) = if no_framing {
        inproc::connect(client.clone(), server)
    } else {
        armi_transport::duplex::connect(client.clone(), server, DEFAULT_MAX_FRAME_BYTES)
    };

    // Timeout is left unset on every call below so each one falls back to the context's
    // `default_timeout`, demonstrating the config wiring rather than a per-call override.
    let proxy = CounterProxy::new(client, channel_id, None);
    println!("increment -> {}", proxy.increment().await?);
    println!("increment -> {}", proxy.increment().await?);
    println!("increment_by(5) -> {}", proxy.increment_by(5).await?);
    println!("decrement -> {}", proxy.decrement().await?);
    println!("get_value -> {}", proxy.get_value().await?);
    proxy.reset().await?;
    println!("get_value after reset -> {}", proxy.get_value().await?);
    Ok(())
}

async fn run_serve<C: Codec + Default>(codec: Arc<C>, config: TransportConfig) -> Result<(), armi::Error> {
    let server = server_context(codec);
    tracing::info!(addr = %config.bind_addr, "serving counter interface");
    tcp::serve_with_config(&config, server).await
}

async fn run_call<C: Codec + Default>(
    codec: Arc<C>,
    config: TransportConfig,
    method: CallMethod,
    amount: i64,
) -> Result<i64, armi::Error> {
    let client = ClientContext::builder(codec).build();
    let channel_id = tcp::connect_with_config(&config, client.clone()).await?;
    let proxy = CounterProxy::new(client, channel_id, Some(Duration::from_secs(5)));

    match method {
        CallMethod::Increment => proxy.increment().await,
        CallMethod::Decrement => proxy.decrement().await,
        CallMethod::GetValue => proxy.get_value().await,
        CallMethod::Reset => proxy.reset().await.map(|()| 0),
        CallMethod::IncrementBy => proxy.increment_by(amount).await,
    }
}
