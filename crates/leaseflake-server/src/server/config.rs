use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use leaseflake::{Config, Layout};

/// Runtime configuration for the `leaseflake-server` binary.
///
/// Every value can be given as a CLI flag or an environment variable (a
/// `.env` file is loaded first). Defaults give the classic 41/10/12 layout
/// with a 2020-01-01 epoch and a 30 second lease.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "leaseflake-server",
    version,
    about = "An HTTP service handing out Snowflake-like IDs under a leased worker id"
)]
pub struct CliArgs {
    /// Address to listen on, e.g. "0.0.0.0:8080".
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Custom epoch, in milliseconds since the Unix epoch. Every process
    /// sharing an ID space must use the same value.
    ///
    /// Environment variable: `EPOCH_MS`
    #[arg(long, env = "EPOCH_MS", default_value_t = 1_577_836_800_000)]
    pub epoch_ms: u64,

    /// Width of the timestamp field.
    ///
    /// Environment variable: `TIMESTAMP_BITS`
    #[arg(long, env = "TIMESTAMP_BITS", default_value_t = 41)]
    pub timestamp_bits: u8,

    /// Width of the worker id field. The lease store hands out ids in
    /// `0..2^WORKER_BITS`.
    ///
    /// Environment variable: `WORKER_BITS`
    #[arg(long, env = "WORKER_BITS", default_value_t = 10)]
    pub worker_bits: u8,

    /// Width of the per-millisecond sequence field.
    ///
    /// Environment variable: `SEQUENCE_BITS`
    #[arg(long, env = "SEQUENCE_BITS", default_value_t = 12)]
    pub sequence_bits: u8,

    /// How long a worker id lease lives without renewal.
    ///
    /// Environment variable: `LEASE_TTL_MS`
    #[arg(long, env = "LEASE_TTL_MS", default_value_t = 30_000)]
    pub lease_ttl_ms: u64,

    /// How often the lease is renewed. Defaults to a third of the TTL.
    ///
    /// Environment variable: `RENEW_INTERVAL_MS`
    #[arg(long, env = "RENEW_INTERVAL_MS")]
    pub renew_interval_ms: Option<u64>,

    /// Largest backwards clock step absorbed without failing requests.
    ///
    /// Environment variable: `CLOCK_TOLERANCE_MS`
    #[arg(long, env = "CLOCK_TOLERANCE_MS", default_value_t = 5)]
    pub clock_tolerance_ms: u64,

    /// Attempts made to reach the lease store at startup.
    ///
    /// Environment variable: `STARTUP_ATTEMPTS`
    #[arg(long, env = "STARTUP_ATTEMPTS", default_value_t = 5)]
    pub startup_attempts: u32,

    /// Maximum number of IDs a single `/ids` request may ask for.
    ///
    /// Environment variable: `MAX_BATCH`
    #[arg(long, env = "MAX_BATCH", default_value_t = 4096)]
    pub max_batch: usize,

    /// Acknowledges that this process is the only one issuing IDs in its ID
    /// space. Worker ids are leased from an in-memory store that other
    /// processes cannot see, so two instances would both run as worker 0.
    ///
    /// Environment variable: `SINGLE_INSTANCE`
    #[arg(long, env = "SINGLE_INSTANCE", default_value_t = false)]
    pub single_instance: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub max_batch: usize,
    pub id: Config,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if !args.single_instance {
            bail!(
                "worker ids are leased from an in-process store that cannot coordinate \
                 separate processes; run a single instance and pass --single-instance \
                 (SINGLE_INSTANCE=true) to confirm"
            );
        }
        if args.max_batch == 0 {
            bail!("MAX_BATCH must be greater than 0");
        }

        let layout = Layout::new(args.timestamp_bits, args.worker_bits, args.sequence_bits)
            .context("invalid TIMESTAMP_BITS/WORKER_BITS/SEQUENCE_BITS")?;

        let mut id = Config::default()
            .with_epoch(Duration::from_millis(args.epoch_ms))
            .with_layout(layout)
            .with_lease_ttl(Duration::from_millis(args.lease_ttl_ms))
            .with_clock_tolerance(Duration::from_millis(args.clock_tolerance_ms))
            .with_startup_attempts(args.startup_attempts);
        if let Some(renew_ms) = args.renew_interval_ms {
            id = id.with_renew_interval(Duration::from_millis(renew_ms));
        }
        id.validate().context("invalid lease or clock settings")?;

        Ok(Self {
            server_addr: args.server_addr,
            max_batch: args.max_batch,
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let argv = core::iter::once("leaseflake-server").chain(args.iter().copied());
        let argv = argv.chain(core::iter::once("--single-instance"));
        let args = CliArgs::try_parse_from(argv)?;
        ServerConfig::try_from(args)
    }

    #[test]
    fn defaults_are_valid() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.max_batch, 4096);
        assert_eq!(config.id.layout(), Layout::TWITTER);
        assert_eq!(config.id.lease_ttl(), Duration::from_secs(30));
        assert_eq!(config.id.renew_interval(), Duration::from_secs(10));
    }

    #[test]
    fn custom_layout_and_renewal() {
        let config = parse(&[
            "--timestamp-bits",
            "45",
            "--worker-bits",
            "6",
            "--sequence-bits",
            "12",
            "--lease-ttl-ms",
            "9000",
            "--renew-interval-ms",
            "1000",
        ])
        .unwrap();
        assert_eq!(config.id.layout().worker_capacity(), 64);
        assert_eq!(config.id.renew_interval(), Duration::from_secs(1));
    }

    #[test]
    fn rejects_bad_layout() {
        let err = parse(&["--worker-bits", "11"]).unwrap_err();
        assert!(err.to_string().contains("SEQUENCE_BITS"));
    }

    #[test]
    fn rejects_renewal_slower_than_ttl() {
        assert!(parse(&["--lease-ttl-ms", "1000", "--renew-interval-ms", "1000"]).is_err());
    }

    #[test]
    fn rejects_empty_batches() {
        assert!(parse(&["--max-batch", "0"]).is_err());
    }

    #[test]
    fn refuses_to_start_without_single_instance_ack() {
        let args = CliArgs::try_parse_from(["leaseflake-server"]).unwrap();
        assert!(!args.single_instance);
        let err = ServerConfig::try_from(args).unwrap_err();
        assert!(err.to_string().contains("--single-instance"));
    }
}
