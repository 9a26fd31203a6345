use clap::{Parser, Subcommand, ValueEnum};
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cipher;
mod search;

use cipher::des::DES_KEY_BITS;
use cipher::{DesCipher, KeyEncoding, seal};
use search::config::{DEFAULT_MARKER, DEFAULT_POLL_INTERVAL};
use search::partition::DEFAULT_KEY_BITS;
use search::{
    KeySpace, ParallelConfig, ParallelResult, PartitionStrategy, SearchConfig, TerminationStrategy,
    run_parallel_search,
};

// --- Command Line Arguments ---

#[derive(Parser)]
#[command(name = "keysweep")]
#[command(about = "keysweep - parallel exhaustive key search")]
#[command(version)]
#[command(subcommand_required = true)]
#[command(arg_required_else_help = true)]
struct Args {
    /// Log filter used when RUST_LOG is not set (e.g. info, keysweep=debug)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// CLI partition strategy selection
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliStrategy {
    /// One contiguous block of keys per worker
    Contiguous,
    /// Worker i tests i, i + n, i + 2n, ...
    Strided,
}

impl From<CliStrategy> for PartitionStrategy {
    fn from(cli: CliStrategy) -> Self {
        match cli {
            CliStrategy::Contiguous => PartitionStrategy::Contiguous,
            CliStrategy::Strided => PartitionStrategy::Strided,
        }
    }
}

/// CLI termination strategy selection
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliTermination {
    /// The finder sends the key directly to every peer
    Push,
    /// Periodic group-wide rounds OR together everyone's status
    Consensus,
}

impl From<CliTermination> for TerminationStrategy {
    fn from(cli: CliTermination) -> Self {
        match cli {
            CliTermination::Push => TerminationStrategy::Push,
            CliTermination::Consensus => TerminationStrategy::Consensus,
        }
    }
}

/// CLI DES key encoding selection
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliKeyEncoding {
    /// 7 key bits per byte; every integer is a distinct DES key
    Spread,
    /// Little-endian bytes with parity overwritten; neighbouring keys alias
    Packed,
}

impl From<CliKeyEncoding> for KeyEncoding {
    fn from(cli: CliKeyEncoding) -> Self {
        match cli {
            CliKeyEncoding::Spread => KeyEncoding::Spread,
            CliKeyEncoding::Packed => KeyEncoding::Packed,
        }
    }
}

/// Options describing the key space
#[derive(clap::Args, Clone, Debug)]
struct KeyArgs {
    /// Width of the key space in bits (keys 0 .. 2^bits - 1)
    #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
    key_bits: u32,
    /// How integer keys map onto DES keys
    #[arg(long, value_enum, default_value = "spread")]
    key_encoding: CliKeyEncoding,
}

/// Options controlling the parallel search
#[derive(clap::Args, Clone, Debug)]
struct SearchArgs {
    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(long, short = 'j')]
    workers: Option<usize>,
    /// How the key space is split among workers
    #[arg(long, value_enum, default_value = "contiguous")]
    strategy: CliStrategy,
    /// How workers learn that the search is over
    #[arg(long, value_enum, default_value = "push")]
    termination: CliTermination,
    /// Trials between termination checks
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL)]
    poll_interval: u64,
    /// Give up after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Text the correct plaintext is known to contain
    #[arg(long, default_value = DEFAULT_MARKER)]
    marker: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a plaintext file and write the ciphertext
    Encrypt {
        /// Plaintext file
        input: PathBuf,
        /// Where to write the ciphertext
        output: PathBuf,
        /// Key to encrypt with (random within the key space if omitted)
        #[arg(long)]
        key: Option<u64>,
        #[command(flatten)]
        key_args: KeyArgs,
    },
    /// Encrypt a plaintext file, then recover the key by search
    Demo {
        /// Plaintext file
        input: PathBuf,
        /// Key to encrypt with (random within the key space if omitted)
        #[arg(long)]
        key: Option<u64>,
        #[command(flatten)]
        key_args: KeyArgs,
        #[command(flatten)]
        search_args: SearchArgs,
    },
    /// Search for the key of an existing ciphertext file
    Attack {
        /// Ciphertext file, as written by `encrypt`
        ciphertext: PathBuf,
        #[command(flatten)]
        key_args: KeyArgs,
        #[command(flatten)]
        search_args: SearchArgs,
    },
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

// --- Key Handling ---

fn key_space(key_args: &KeyArgs) -> CliResult<KeySpace> {
    Ok(KeySpace::from_bits(key_args.key_bits, DES_KEY_BITS)?)
}

/// Use the requested key, or draw one uniformly from the key space.
fn choose_key(key: Option<u64>, space: KeySpace) -> CliResult<u64> {
    match key {
        Some(key) if space.contains(key) => Ok(key),
        Some(key) => Err(format!(
            "key {} is outside the key space of {} keys",
            key,
            space.size()
        )
        .into()),
        None => Ok(rand::rng().random_range(0..space.size())),
    }
}

fn encrypt_file(input: &Path, key: u64, cipher: &DesCipher) -> CliResult<Vec<u8>> {
    let plaintext = fs::read(input)?;
    let start = Instant::now();
    let ciphertext = seal(cipher, key, &plaintext)?;
    println!("Encryption time: {:.2?}", start.elapsed());
    Ok(ciphertext)
}

// --- Commands ---

fn run_encrypt(input: &Path, output: &Path, key: Option<u64>, key_args: &KeyArgs) -> CliResult<()> {
    let space = key_space(key_args)?;
    let key = choose_key(key, space)?;
    let cipher = DesCipher::new(key_args.key_encoding.into());

    let ciphertext = encrypt_file(input, key, &cipher)?;
    fs::write(output, &ciphertext)?;

    println!("Encrypted with key: {}", key);
    println!("Wrote {} bytes to {}", ciphertext.len(), output.display());
    Ok(())
}

fn run_demo(
    input: &Path,
    key: Option<u64>,
    key_args: &KeyArgs,
    search_args: &SearchArgs,
) -> CliResult<bool> {
    let space = key_space(key_args)?;
    let key = choose_key(key, space)?;
    let cipher = DesCipher::new(key_args.key_encoding.into());

    println!("Planted key: {}", key);
    let ciphertext = encrypt_file(input, key, &cipher)?;
    println!("Encrypted message: {}", hex::encode(&ciphertext));

    let result = run_attack(cipher, &ciphertext, space, search_args)?;
    if let Some(found) = result.outcome.key()
        && found != key
    {
        println!(
            "Note: recovered key {} differs from planted key {} but decrypts identically",
            found, key
        );
    }
    Ok(result.outcome.is_found())
}

fn run_attack_file(path: &Path, key_args: &KeyArgs, search_args: &SearchArgs) -> CliResult<bool> {
    let space = key_space(key_args)?;
    let cipher = DesCipher::new(key_args.key_encoding.into());
    let ciphertext = fs::read(path)?;

    let result = run_attack(cipher, &ciphertext, space, search_args)?;
    Ok(result.outcome.is_found())
}

/// Run the parallel search and print its report.
fn run_attack(
    cipher: DesCipher,
    ciphertext: &[u8],
    space: KeySpace,
    search_args: &SearchArgs,
) -> CliResult<ParallelResult> {
    let num_workers = search_args.workers.unwrap_or_else(num_cpus::get);

    let search_config = SearchConfig::default()
        .with_key_space(space)
        .with_marker(search_args.marker.as_str())
        .with_strategy(search_args.strategy.into())
        .with_termination(search_args.termination.into())
        .with_poll_interval(search_args.poll_interval);

    let parallel_config = ParallelConfig::default()
        .with_workers(num_workers)
        .with_timeout_option(search_args.timeout.map(Duration::from_secs));

    println!("\nRunning parallel key search...");
    println!("  Workers: {}", num_workers);
    println!("  Key space: {} keys", space.size());
    println!("  Key encoding: {}", cipher.encoding());
    println!("  Partitioning: {}", search_config.strategy);
    println!("  Termination: {}", search_config.termination);
    if let Some(timeout) = parallel_config.timeout {
        println!("  Timeout: {:?}", timeout);
    }

    let result =
        run_parallel_search(Arc::new(cipher), ciphertext, &search_config, &parallel_config)?;
    info!(outcome = ?result.result, "search complete");

    println!();
    print!("{}", result.outcome);
    for claim in &result.rejected_claims {
        println!("Discarded losing claim: {}", claim);
    }
    print_worker_reports(&result);

    Ok(result)
}

/// Print per-worker and total statistics
fn print_worker_reports(result: &ParallelResult) {
    println!("\nWorkers:");
    for report in &result.workers {
        println!(
            "  Worker {}: {} after {} keys in {:.2?} ({:.0} keys/sec)",
            report.worker_id,
            report.state,
            report.statistics.keys_tested,
            report.statistics.elapsed_time,
            report.statistics.throughput()
        );
    }

    println!("\nSearch Statistics:");
    for line in result.total_statistics.format_summary().lines() {
        println!("  {}", line);
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

// --- Main Function ---
fn main() -> CliResult<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let found = match &args.command {
        Commands::Encrypt {
            input,
            output,
            key,
            key_args,
        } => {
            run_encrypt(input, output, *key, key_args)?;
            true
        }
        Commands::Demo {
            input,
            key,
            key_args,
            search_args,
        } => run_demo(input, *key, key_args, search_args)?,
        Commands::Attack {
            ciphertext,
            key_args,
            search_args,
        } => run_attack_file(ciphertext, key_args, search_args)?,
    };

    if !found {
        std::process::exit(1);
    }
    Ok(())
}
