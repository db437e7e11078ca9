use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber;

#[derive(Debug, Clone)]
pub enum Command {
    Download {
        config_path: String,
        job_path: String,
        install_path: Option<String>,
        item_parallelism: Option<usize>,
        chunk_parallelism: Option<usize>,
        max_retries: Option<u32>,
    },
    Verify {
        config_path: String,
        job_path: String,
        install_path: Option<String>,
        checking_parallelism: usize,
    },
}

pub struct Args {
    pub command: Command,
    pub log_level: Level,
}

#[derive(Debug, Parser)]
#[command(
    name = "depotfetch",
    version,
    about = "Download, verify and repair game depot content from signed, content-addressed storage"
)]
struct Cli {
    #[arg(
        short = 'v',
        long = "verbose",
        help = "Sets the level of verbosity",
        action = ArgAction::Count,
        global = true
    )]
    verbose: u8,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Download every item of a job file, skipping items that are already correct
    Download {
        #[arg(
            short = 'c',
            long = "config",
            value_name = "FILE",
            help = "Sets a custom config file",
            default_value = "depotfetch.yaml"
        )]
        config: String,

        #[arg(
            short = 'j',
            long = "job",
            value_name = "FILE",
            help = "Sets the job file listing the items to download",
            default_value = "job.json"
        )]
        job: String,

        #[arg(
            short = 'o',
            long = "install-path",
            value_name = "DIR",
            help = "Overrides the install path from the config file"
        )]
        install_path: Option<String>,

        #[arg(
            long = "item-parallelism",
            value_name = "N",
            help = "Maximum number of items downloaded at the same time"
        )]
        item_parallelism: Option<usize>,

        #[arg(
            long = "chunk-parallelism",
            value_name = "N",
            help = "Maximum number of chunks of one item fetched at the same time"
        )]
        chunk_parallelism: Option<usize>,

        #[arg(
            long = "max-retries",
            value_name = "N",
            help = "Retries per item for failed HTTP requests"
        )]
        max_retries: Option<u32>,
    },

    /// Check installed files against a job file without downloading anything
    Verify {
        #[arg(
            short = 'c',
            long = "config",
            value_name = "FILE",
            help = "Sets a custom config file",
            default_value = "depotfetch.yaml"
        )]
        config: String,

        #[arg(
            short = 'j',
            long = "job",
            value_name = "FILE",
            help = "Sets the job file listing the items to verify",
            default_value = "job.json"
        )]
        job: String,

        #[arg(
            short = 'o',
            long = "install-path",
            value_name = "DIR",
            help = "Overrides the install path from the config file"
        )]
        install_path: Option<String>,

        #[arg(
            long = "checking-parallelism",
            value_name = "N",
            help = "Maximum number of concurrent file digest checks",
            default_value_t = 16
        )]
        checking_parallelism: usize,
    },
}

pub fn parse_args() -> Args {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    let command = match cli.command {
        CliCommand::Download {
            config,
            job,
            install_path,
            item_parallelism,
            chunk_parallelism,
            max_retries,
        } => Command::Download {
            config_path: config,
            job_path: job,
            install_path,
            item_parallelism,
            chunk_parallelism,
            max_retries,
        },
        CliCommand::Verify {
            config,
            job,
            install_path,
            checking_parallelism,
        } => Command::Verify {
            config_path: config,
            job_path: job,
            install_path,
            checking_parallelism,
        },
    };

    Args { command, log_level }
}
