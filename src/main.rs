use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use osdgw_bridge::cl_cdm;
use osdgw_bridge::config::Cli;
use osdgw_bridge::gdbserver::GdbServer;
use osdgw_bridge::hostmod::HostModClient;
use osdgw_bridge::packet::Packet;
use osdgw_bridge::{diaddr, logging};

fn main() -> Result<()> {
	let cli = Cli::parse();
	logging::init(cli.verbose);

	let cdm_event_cb: Arc<dyn Fn(Packet) + Send + Sync> = Arc::new(|packet: Packet| {
		if let Err(e) = cl_cdm::handle_event(&packet, &|event| {
			log::debug!("CDM event: stall={}", event.stall);
		}) {
			log::warn!("failed to decode CDM event packet: {e}");
		}
	});

	let hostmod = HostModClient::new(&cli.hostctrl, Some(cdm_event_cb)).context("create host module client")?;
	hostmod.connect().with_context(|| format!("connect to host controller at {}", cli.hostctrl))?;

	let cdm_di_addr = diaddr::build(cli.subnet, cli.cdm_local);
	let mam_di_addr = diaddr::build(cli.subnet, cli.mam_local);

	let server = GdbServer::new(hostmod, cdm_di_addr, mam_di_addr);

	let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), cli.port);
	server.run(addr).context("gdbserver")?;
	Ok(())
}
