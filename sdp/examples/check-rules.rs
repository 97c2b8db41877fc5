use std::{io, net::IpAddr, path::PathBuf};

use clap::Parser;
use sdp::{Action, Config, Converter, Decision, Engine, LogDestination};

/// Evaluates one bind or connect against a rules file without touching any socket.
#[derive(Debug, Parser)]
pub struct Opt {
    /// Rules file, same format as `SDP_CONF`.
    #[clap(short, long)]
    rules: PathBuf,
    /// `bind` or `connect`.
    action: Action,
    address: IpAddr,
    port: u16,
}

struct DryRun;

impl Converter for DryRun {
    type Socket = ();

    fn protocol(&self) -> &str {
        "SDP"
    }

    fn convert(&self, _: &mut ()) -> io::Result<()> {
        Ok(())
    }
}

fn main() -> Result<(), anyhow::Error> {
    let opt = Opt::parse();
    tracing_subscriber::fmt::init();

    let config = Config::new()
        .with_rules(opt.rules)
        .with_log(LogDestination::Stdout);
    let engine = Engine::load(&config, DryRun)?;

    if let Some(rule) = engine.matching_rule(opt.action, &opt.address, opt.port) {
        tracing::info!(%rule, "matched");
    }
    let decision = engine.evaluate(&mut (), opt.action, opt.address, opt.port)?;
    if decision == Decision::NotMatched && !engine.is_enabled() {
        tracing::info!("no rules loaded");
    }

    Ok(())
}
