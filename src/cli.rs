use std::{env, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result, anyhow, bail};

use crate::config::Config;

const DEFAULT_CONFIG_FILE: &str = "gateway.jsonc";
const USAGE: &str = "usage: portfolio-bridge [<config-path>] [--listen <addr>] [--mock]";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub listen: Option<SocketAddr>,
    pub mock: bool,
}

impl CliArgs {
    /// Falls back to `./gateway.jsonc` only when that file exists.
    pub fn from_env() -> Result<Self> {
        let mut args = parse_args(env::args().skip(1))?;
        if args.config_path.is_none() {
            let candidate = env::current_dir()?.join(DEFAULT_CONFIG_FILE);
            if candidate.is_file() {
                args.config_path = Some(candidate);
            }
        }
        Ok(args)
    }

    /// Flags win over both the config file and the environment.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(listen) = self.listen {
            config.server.listen_addr = listen;
        }
        if self.mock {
            config.solver.mock.enabled = true;
        }
    }
}

pub fn parse_args<I, S>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter().map(Into::into);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mock" => parsed.mock = true,
            "--listen" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--listen expects an address. {USAGE}"))?;
                let addr = value
                    .parse::<SocketAddr>()
                    .with_context(|| format!("invalid --listen address '{}'", value))?;
                parsed.listen = Some(addr);
            }
            flag if flag.starts_with("--") => bail!("unknown flag {flag}. {USAGE}"),
            path => {
                if parsed.config_path.is_some() {
                    bail!("expected at most one config path. {USAGE}");
                }
                parsed.config_path = Some(PathBuf::from(path));
            }
        }
    }

    Ok(parsed)
}
