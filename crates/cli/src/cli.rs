use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::path::{Path, PathBuf};

/// delve-agent: snapshot a live Go process without stopping it for long
///
/// delve-agent attaches to a headless Delve server, and on request halts the
/// target just long enough to walk every goroutine's stack and capture
/// selected variables. It also keeps flight-recorder breakpoints in sync
/// with a desired set of events.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to configuration file.
    ///
    /// If not provided, the default locations are checked. They are
    /// `/etc/delve-agent/config.toml` and `/etc/delve-agent/config.d/*.toml`,
    /// where the latter being a glob pattern. If they don't exist, the default
    /// configuration is used.
    #[arg(short, long, value_parser = validate_file)]
    pub config: Option<PathBuf>,

    /// Address of the Delve server, overriding `backend.address`.
    #[arg(short, long, value_parser = validate_addr)]
    pub addr: Option<String>,

    /// Address to serve the agent API on, overriding `server.listen`.
    #[arg(short, long, value_parser = validate_addr)]
    pub listen: Option<String>,

    /// Take one snapshot, print the stacks as JSON to stdout and exit.
    #[arg(long)]
    pub oneshot: bool,

    /// With `--oneshot`, also write the profile in pprof format here.
    #[arg(long, requires = "oneshot")]
    pub pprof_out: Option<PathBuf>,

    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,
}

/// Check if the file exists.
#[inline(always)]
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = Path::new(file);
    if path.exists() {
        Ok(path.to_owned())
    } else {
        Err(format!("File not found: {:?}", path))
    }
}

/// Validate a `host:port` address.
#[inline(always)]
fn validate_addr(addr: &str) -> Result<String, String> {
    config::validate_address(addr)
        .map(|()| addr.to_owned())
        .map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn addr_candidates() -> impl Strategy<Value = String> {
        prop_oneof![
            2 => (0u32..70000).prop_map(|port| format!("127.0.0.1:{port}")),
            1 => "[a-z.]{0,12}:[0-9]{0,6}",
            1 => ".*",
        ]
    }

    proptest! {
        #[test]
        fn test_validate_addr(addr in addr_candidates()) {
            match validate_addr(&addr) {
                Ok(valid) => {
                    let (host, port) = valid.rsplit_once(':').unwrap();
                    prop_assert!(!host.is_empty());
                    prop_assert!(port.parse::<u16>().is_ok());
                }
                Err(err) => prop_assert!(err.contains(&addr)),
            }
        }
    }

    #[test]
    fn pprof_out_requires_oneshot() {
        assert!(Cli::try_parse_from(["delve-agent", "--pprof-out", "/tmp/p.pb"]).is_err());
        let cli = Cli::try_parse_from(["delve-agent", "--oneshot", "--pprof-out", "/tmp/p.pb"])
            .unwrap();
        assert_eq!(cli.pprof_out, Some(PathBuf::from("/tmp/p.pb")));
    }

    #[test]
    fn address_flags_are_validated() {
        assert!(Cli::try_parse_from(["delve-agent", "--addr", "nope"]).is_err());
        let cli = Cli::try_parse_from(["delve-agent", "-a", "10.0.0.1:4000"]).unwrap();
        assert_eq!(cli.addr.as_deref(), Some("10.0.0.1:4000"));
    }
}
