//! Callbridge CLI
//!
//! Entry point for the `callbridge` command-line tool. Batches are read from
//! stdin and written to stdout, one JSON document per line; logs go to
//! stderr.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, OnceLock, Weak};

use callbridge::{
    decode_outbound, Element, ElementSink, HandlerError, InboundBatch, Params, Proxy,
    ProxyConfig, SessionHandler, Value,
};
use callbridge_protocol::{decode_params, encode_params, InboundCall, TaggedValue};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "callbridge")]
#[command(about = "Batched RPC bridge between two peers", version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one proxy session: each stdin line is an inbound batch, each
    /// stdout line the outbound batch that answers it
    Exchange {
        /// Path to a TOML config file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Init params as a JSON array of tagged values, e.g. '[{"t":0,"v":"dark"}]'
        #[arg(long)]
        init: Option<String>,

        /// Call every unhandled method back on the peer with the same params
        #[arg(long)]
        echo: bool,
    },

    /// Decode outbound batch lines from stdin
    Decode,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    let result = match cli.command {
        Commands::Exchange { config, init, echo } => run_exchange(config, init, echo),
        Commands::Decode => run_decode(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Session handler backing the CLI.
struct CliHandler {
    init: Vec<Option<Value>>,
    /// Set when `--echo` is given, once the proxy exists.
    echo: Option<OnceLock<Weak<Proxy>>>,
}

impl SessionHandler for CliHandler {
    fn fetch_init_params(&self) -> Vec<Option<Value>> {
        self.init.clone()
    }

    fn notify_exchange_needed(&self) {
        debug!("exchange requested");
    }

    fn default_call_handler(&self, method: &str, params: &Params) -> Result<(), HandlerError> {
        let proxy = self
            .echo
            .as_ref()
            .and_then(OnceLock::get)
            .and_then(Weak::upgrade);
        match proxy {
            Some(proxy) => {
                proxy.call(method, params.as_slice().to_vec());
            }
            None => info!(method, params = params.len(), "unhandled call"),
        }
        Ok(())
    }
}

fn parse_init(init: Option<String>) -> Result<Vec<Option<Value>>, String> {
    let Some(init) = init else {
        return Ok(Vec::new());
    };
    let tagged: Vec<Option<TaggedValue>> =
        serde_json::from_str(&init).map_err(|e| format!("invalid --init: {}", e))?;
    decode_params(&tagged).map_err(|e| format!("invalid --init: {}", e))
}

/// Build the CLI session's proxy.
fn session_proxy(config: ProxyConfig, init: Vec<Option<Value>>, echo: bool) -> Arc<Proxy> {
    let handler = Arc::new(CliHandler {
        init,
        echo: echo.then(OnceLock::new),
    });
    let proxy = Arc::new(Proxy::with_config(handler.clone(), config));
    if let Some(slot) = &handler.echo {
        // The slot is fresh, so this cannot already be set.
        let _ = slot.set(Arc::downgrade(&proxy));
    }
    proxy
}

/// Answer one inbound line with one outbound batch line.
///
/// A line that cannot be parsed or decoded is logged and answered anyway,
/// so calls dispatched before the bad one still go out. Only a failed write
/// ends the session.
fn exchange_line(proxy: &Proxy, line: &str) -> Result<String, String> {
    match InboundBatch::from_json_str(line) {
        Ok(batch) => match proxy.receive_inbound(&batch) {
            Ok(inbound) => debug!(?inbound, "inbound"),
            Err(error) => warn!(%error, "inbound batch cut short"),
        },
        Err(error) => warn!(%error, "ignoring malformed inbound batch"),
    }

    let mut sink = ElementSink::new();
    proxy.produce_outbound(&mut sink).map_err(|e| e.to_string())?;
    sink.finish_json().map_err(|e| e.to_string())
}

/// Run a session over JSON lines.
fn exchange_lines<R: BufRead, W: Write>(proxy: &Proxy, input: R, mut output: W) -> Result<(), String> {
    for line in input.lines() {
        let line = line.map_err(|e| format!("reading stdin: {}", e))?;
        if line.trim().is_empty() {
            continue;
        }

        let out = exchange_line(proxy, &line)?;
        writeln!(output, "{}", out).map_err(|e| format!("writing stdout: {}", e))?;
        output.flush().map_err(|e| format!("writing stdout: {}", e))?;
    }
    Ok(())
}

fn run_exchange(config: Option<PathBuf>, init: Option<String>, echo: bool) -> Result<(), String> {
    let config = ProxyConfig::load(config.as_deref(), None).map_err(|e| e.to_string())?;
    let proxy = session_proxy(config, parse_init(init)?, echo);
    exchange_lines(&proxy, io::stdin().lock(), io::stdout().lock())
}

fn run_decode() -> Result<(), String> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| format!("reading stdin: {}", e))?;
        if line.trim().is_empty() {
            continue;
        }

        let root: Element = serde_json::from_str(&line).map_err(|e| e.to_string())?;
        let batch = decode_outbound(&root).map_err(|e| e.to_string())?;
        let calls: Vec<InboundCall> = batch.calls.iter().map(InboundCall::from_record).collect();
        let summary = json!({
            "init_already_sent": batch.init_already_sent,
            "init": batch.init.as_deref().map(encode_params),
            "calls": calls,
        });
        println!("{}", summary);
    }
    Ok(())
}
