use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use flakeid::{Epoch, NodeId, SnowflakeId};

/// Command-line arguments for the `flakeid` binary.
///
/// All values are parsed from CLI arguments or environment variables. A
/// `.env` file in the working directory is loaded first.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "flakeid",
    version,
    about = "Generate and decode Snowflake-style 64-bit IDs"
)]
pub struct CliArgs {
    /// Epoch as milliseconds since 1970-01-01 UTC.
    ///
    /// Every ID stores the milliseconds elapsed since this point. Defaults to
    /// midnight UTC of the current day. Decoding must use the epoch the IDs
    /// were generated with.
    ///
    /// Environment variable: `FLAKEID_EPOCH_MILLIS`
    #[arg(long, global = true, env = "FLAKEID_EPOCH_MILLIS")]
    pub epoch_millis: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate new IDs.
    Generate(GenerateArgs),
    /// Split existing IDs into timestamp, group, worker and sequence.
    Decode(DecodeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Group ID (0-31). Larger values are masked to their low five bits.
    ///
    /// When omitted, the identity is derived from the host's first
    /// non-loopback IPv4 address.
    ///
    /// Environment variable: `FLAKEID_GROUP_ID`
    #[arg(long, env = "FLAKEID_GROUP_ID")]
    pub group_id: Option<u8>,

    /// Worker ID (0-31). Defaults to the group ID when only that is given.
    ///
    /// Environment variable: `FLAKEID_WORKER_ID`
    #[arg(long, env = "FLAKEID_WORKER_ID")]
    pub worker_id: Option<u8>,

    /// Number of IDs to generate.
    ///
    /// Environment variable: `FLAKEID_COUNT`
    #[arg(short = 'n', long, env = "FLAKEID_COUNT", default_value_t = 1)]
    pub count: usize,

    /// Number of threads sharing the generator.
    ///
    /// Environment variable: `FLAKEID_THREADS`
    #[arg(short, long, env = "FLAKEID_THREADS", default_value_t = 1)]
    pub threads: usize,

    /// Print each ID's fields next to it.
    #[arg(short, long, default_value_t = false)]
    pub explain: bool,

    /// Print the generator's description to stderr when done.
    #[arg(short, long, default_value_t = false)]
    pub describe: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
    /// IDs to decode.
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<i64>,
}

/// Validated settings for the `generate` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateConfig {
    pub epoch: Epoch,
    /// `None` means resolve from the network interfaces.
    pub node: Option<NodeId>,
    pub count: usize,
    pub threads: usize,
    pub explain: bool,
    pub describe: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Config {
    Generate(GenerateConfig),
    Decode { epoch: Epoch, ids: Vec<SnowflakeId> },
}

/// Latest epoch whose IDs can still be decoded to a `u64` Unix timestamp.
const MAX_EPOCH_MILLIS: u64 = u64::MAX - SnowflakeId::TIMESTAMP_MASK;

impl TryFrom<CliArgs> for Config {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let epoch = match args.epoch_millis {
            Some(millis) if millis > MAX_EPOCH_MILLIS => {
                bail!("FLAKEID_EPOCH_MILLIS must be at most {MAX_EPOCH_MILLIS}")
            }
            Some(millis) => Epoch::from_unix_millis(millis),
            None => Epoch::today_utc(),
        };

        match args.command {
            Command::Generate(args) => {
                if args.count == 0 {
                    bail!("FLAKEID_COUNT must be greater than 0");
                }
                if args.threads == 0 {
                    bail!("FLAKEID_THREADS must be greater than 0");
                }

                let node = match (args.group_id, args.worker_id) {
                    (None, None) => None,
                    (Some(group), None) => Some(NodeId::uniform(group)),
                    (Some(group), Some(worker)) => Some(NodeId::new(group, worker)),
                    (None, Some(_)) => bail!("FLAKEID_WORKER_ID requires FLAKEID_GROUP_ID"),
                };

                Ok(Self::Generate(GenerateConfig {
                    epoch,
                    node,
                    count: args.count,
                    threads: args.threads,
                    explain: args.explain,
                    describe: args.describe,
                }))
            }
            Command::Decode(args) => {
                let ids = args
                    .ids
                    .into_iter()
                    .map(|raw| {
                        u64::try_from(raw)
                            .map(SnowflakeId::from_raw)
                            .map_err(|_| anyhow::anyhow!("ID {raw} is negative"))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Ok(Self::Decode { epoch, ids })
            }
        }
    }
}
