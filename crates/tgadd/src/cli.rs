use std::{num::NonZeroUsize, path::PathBuf};

use clap::{ArgGroup, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "tgadd",
    version,
    about = "Batch-add contacts to a Telegram group or channel"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List groups and channels (duplicate listings collapsed).
    Groups,
    /// List contacts that would be added to a group.
    Candidates {
        #[arg(
            long,
            allow_hyphen_values = true,
            help = "Group id, #index from `tgadd groups`, @handle or title"
        )]
        group: String,
        #[arg(long, default_value = "", help = "Name or phone prefix, e.g. +2547 or SW")]
        prefix: String,
    },
    /// Add candidates to a group, chunk by chunk.
    Add(AddArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["prefix", "phones_file"])))]
pub struct AddArgs {
    #[arg(
        long,
        allow_hyphen_values = true,
        help = "Group id, #index from `tgadd groups`, @handle or title"
    )]
    pub group: String,
    #[arg(long, help = "Select contacts by name or phone prefix")]
    pub prefix: Option<String>,
    #[arg(long, help = "Read candidates from a file, one number per line")]
    pub phones_file: Option<PathBuf>,
    #[arg(long, default_value_t = 0, help = "Index of the first candidate to process")]
    pub offset: usize,
    #[arg(long, help = "How many candidates to process (default: all remaining)")]
    pub count: Option<usize>,
    #[arg(long, help = "Candidates per chunk [env: TELEGRAM_CHUNK_SIZE]")]
    pub chunk_size: Option<NonZeroUsize>,
    #[arg(long, help = "Seconds between chunks [env: TELEGRAM_CHUNK_DELAY]")]
    pub chunk_delay: Option<u64>,
    #[arg(long, help = "Seconds after each request [env: TELEGRAM_REQUEST_DELAY]")]
    pub request_delay: Option<u64>,
    #[arg(long, help = "Flood-wait retries per candidate [env: TELEGRAM_MAX_RETRIES]")]
    pub max_retries: Option<u32>,
    #[arg(long, help = "Actually send requests (otherwise only print the plan)")]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_requires_a_source() {
        assert!(Cli::try_parse_from(["tgadd", "add", "--group", "#1"]).is_err());
        assert!(Cli::try_parse_from([
            "tgadd", "add", "--group", "#1", "--prefix", "SW", "--phones-file", "x.txt"
        ])
        .is_err());
    }

    #[test]
    fn add_parses_overrides() {
        let cli = Cli::try_parse_from([
            "tgadd",
            "--json",
            "add",
            "--group",
            "-100123",
            "--prefix",
            "+2547",
            "--offset",
            "5",
            "--count",
            "20",
            "--chunk-size",
            "4",
            "--yes",
        ])
        .unwrap();
        assert!(cli.json);
        let Commands::Add(args) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(args.group, "-100123");
        assert_eq!(args.prefix.as_deref(), Some("+2547"));
        assert_eq!(args.offset, 5);
        assert_eq!(args.count, Some(20));
        assert_eq!(args.chunk_size.map(NonZeroUsize::get), Some(4));
        assert!(args.yes);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(Cli::try_parse_from([
            "tgadd", "add", "--group", "#1", "--prefix", "a", "--chunk-size", "0"
        ])
        .is_err());
    }
}
