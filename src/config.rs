//! Command-line configuration.

use clap::Parser;

/// GDB Remote Serial Protocol bridge to a Debug Interconnect subnet.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
	/// Host Controller endpoint (`tcp://host:port` or `inproc://name`).
	#[arg(long, default_value = "tcp://127.0.0.1:9537")]
	pub hostctrl: String,

	/// TCP port the GDB client connects to.
	#[arg(long, default_value_t = 5555)]
	pub port: u16,

	/// DI subnet to bridge; its SCM is assumed to sit at local address 0.
	#[arg(long, default_value_t = 0)]
	pub subnet: u16,

	/// Local DI address of the CDM to debug, within `subnet`.
	#[arg(long, default_value_t = 1)]
	pub cdm_local: u16,

	/// Local DI address of the MAM backing `mADDR,LEN`/`MADDR,LEN:DATA`.
	#[arg(long, default_value_t = 2)]
	pub mam_local: u16,

	/// Increase log verbosity; repeatable (`-v`, `-vv`, `-vvv`). Ignored if
	/// `RUST_LOG` is set.
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,
}
