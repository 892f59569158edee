use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use statechain_core::{constants::POW_PREFIX, Block, Chain, ProofOfWork};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "statechain")]
#[command(about = "Build and check tamper-evident chains of state snapshots")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build {abc:123}, {aaa:321}, {xyz:999} and print the result
    Demo,
    /// Build a chain from JSON snapshots and print its blocks
    Build {
        /// Snapshot as a JSON object; the first one becomes the genesis block
        #[arg(long = "state", required = true)]
        states: Vec<String>,
        /// Leading hex characters required of every block hash
        #[arg(long, default_value = POW_PREFIX)]
        prefix: String,
        /// Print the blocks as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Look up a key across the snapshots of a chain
    Query {
        /// Snapshot as a JSON object; the first one becomes the genesis block
        #[arg(long = "state", required = true)]
        states: Vec<String>,
        /// Key to look up in the snapshots
        #[arg(long)]
        key: String,
        /// Print every recorded value instead of the latest
        #[arg(long)]
        history: bool,
        /// Leading hex characters required of every block hash
        #[arg(long, default_value = POW_PREFIX)]
        prefix: String,
    },
}

#[derive(Serialize)]
struct BlockView {
    index: u64,
    timestamp: u64,
    nonce: u64,
    hash: Option<String>,
    previous_hash: Option<String>,
    state: Value,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index,
            timestamp: block.timestamp,
            nonce: block.nonce,
            hash: block.hash_hex(),
            previous_hash: block.previous_hash.map(hex::encode),
            state: Value::Object(block.state.clone()),
        }
    }
}

fn build_chain(states: &[String], prefix: &str) -> Result<Chain> {
    let pow = ProofOfWork::new(prefix)?;
    let mut snapshots = states.iter().enumerate().map(|(i, raw)| {
        serde_json::from_str::<Value>(raw)
            .with_context(|| format!("snapshot {i} is not valid JSON"))
            .and_then(|value| {
                statechain_core::state_from_value(value)
                    .with_context(|| format!("snapshot {i} rejected"))
            })
    });

    let genesis = match snapshots.next() {
        Some(state) => state?,
        None => bail!("at least one --state is required"),
    };
    let mut chain = Chain::with_pow(genesis, pow);
    for state in snapshots {
        chain.push(state?);
    }
    info!(blocks = chain.len(), "chain built");
    Ok(chain)
}

fn print_chain(chain: &Chain, json: bool) -> Result<()> {
    if json {
        let views: Vec<BlockView> = chain.iter().map(BlockView::from).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else {
        for block in chain {
            println!(
                "#{} nonce={} hash={} previous={} state={}",
                block.index,
                block.nonce,
                block.hash_hex().unwrap_or_else(|| "-".into()),
                block
                    .previous_hash
                    .map(hex::encode)
                    .unwrap_or_else(|| "none".into()),
                Value::Object(block.state.clone()),
            );
        }
    }
    match chain.find_violation() {
        None => println!("valid: true"),
        Some(violation) => println!("valid: false ({violation})"),
    }
    Ok(())
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Demo => {
            let states = [r#"{"abc":123}"#, r#"{"aaa":321}"#, r#"{"xyz":999}"#].map(String::from);
            let chain = build_chain(&states, POW_PREFIX)?;
            print_chain(&chain, false)?;
            if let Some(value) = chain.current_state_of("abc") {
                println!("abc: {value}");
            }
        }
        Command::Build {
            states,
            prefix,
            json,
        } => {
            let chain = build_chain(&states, &prefix)?;
            print_chain(&chain, json)?;
        }
        Command::Query {
            states,
            key,
            history,
            prefix,
        } => {
            let chain = build_chain(&states, &prefix)?;
            if history {
                let values = chain.states_of(&key);
                if values.is_empty() {
                    bail!("key {key:?} was never recorded");
                }
                println!("{}", serde_json::to_string(&values)?);
            } else {
                match chain.current_state_of(&key) {
                    Some(value) => println!("{value}"),
                    None => bail!("key {key:?} was never recorded"),
                }
            }
        }
    }
    Ok(())
}
