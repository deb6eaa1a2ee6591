use clap::Parser;
use std::path::PathBuf;

/// Recursively scan directories and publish one confirmed message per file to RabbitMQ.
///
/// Flags override `filequeue.toml` (or `--config`), which overrides built-in defaults.
/// The password can also come from FILEQUEUE_BROKER_PASSWORD or a `.env` file.
#[derive(Clone, Debug, Parser)]
#[command(name = "filequeue")]
#[command(about = "Recursively scan directories and publish file info to RabbitMQ")]
pub struct Cli {
    /// Directory paths to scan (can specify multiple: --input-dirs dir1 dir2 dir3).
    #[arg(long, num_args = 1.., value_name = "DIR")]
    pub input_dirs: Vec<PathBuf>,

    /// RabbitMQ host. Default: localhost.
    #[arg(long)]
    pub rabbitmq_host: Option<String>,

    /// RabbitMQ port. Default: 5672.
    #[arg(long, value_parser = clap::value_parser!(u16))]
    pub rabbitmq_port: Option<u16>,

    /// RabbitMQ username. Default: guest.
    #[arg(long)]
    pub rabbitmq_user: Option<String>,

    /// RabbitMQ password. Default: guest.
    #[arg(long)]
    pub rabbitmq_password: Option<String>,

    /// Queue name. Default: file_scan_queue.
    #[arg(long)]
    pub queue_name: Option<String>,

    /// Calculate SHA256 hash for files < 100MB.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub calculate_hash: Option<bool>,

    /// Filter by file extensions (e.g. .txt .pdf jpg).
    #[arg(long, num_args = 1..)]
    pub extensions: Option<Vec<String>>,

    /// Connection attempts before giving up (initial connect and each reconnect). Default: 3.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_retries: Option<u32>,

    /// Config file. Default: `filequeue.toml` in the current directory, if present.
    #[arg(long, short = 'C')]
    pub config: Option<PathBuf>,

    /// Show a progress counter.
    #[arg(long, short = 'p', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub progress: Option<bool>,

    /// Verbose output (debug logging, one line per published file).
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
