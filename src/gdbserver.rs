//! GDB Server: TCP listener and RSP command dispatcher.
//!
//! Grounded in `examples/original_source/src/libosd/gdbserver.c`
//! (`osd_gdbserver_connect`/`read_data`/`write_data`) and
//! `gdbserver.h`/`gdbserver-private.h` for the command surface; the
//! ack/retry loop follows `send_rsp_packet`'s retransmit-on-`-` behavior.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use crate::cl_cdm;
use crate::cl_mam;
use crate::error::{Error, Result};
use crate::hostmod::{HostModClient, HostmodFlags};
use crate::hex;
use crate::module::CdmDescriptor;
use crate::rsp::{self, FramerEvent, RspFramer};

/// Bounded retransmit count for a NAK'd reply (spec.md §9's open question:
/// distinguish "bad checksum, retry" from "transport broken, close").
const MAX_RETRIES: usize = 5;
/// RSP register-number offset of the general-purpose register file.
const GPR_BASE: u16 = 0x400;
const GPR_COUNT: u16 = 32;
/// Fixed capability string advertised by `qSupported` (packet-size only).
const QSUPPORTED_REPLY: &str = "PacketSize=1000";

/// Per-connection mutable state: DI addresses of the modules this session
/// talks to, plus the cached CDM descriptor (owned solely by this loop, per
/// spec.md §5).
struct Session {
	cdm_di_addr: u16,
	mam_di_addr: u16,
	cdm_desc: CdmDescriptor,
}

/// Bridges a single GDB TCP client to a Debug Interconnect subnet through
/// `hostmod`.
pub struct GdbServer {
	hostmod: HostModClient,
	cdm_di_addr: u16,
	mam_di_addr: u16,
}

impl GdbServer {
	pub fn new(hostmod: HostModClient, cdm_di_addr: u16, mam_di_addr: u16) -> Self {
		GdbServer { hostmod, cdm_di_addr, mam_di_addr }
	}

	/// Listens on `addr` and serves clients one at a time, forever. A fatal
	/// session error is logged and the listener resumes accepting, matching
	/// spec.md §7's "GDB socket is closed and the listener resumes."
	pub fn run(&self, addr: SocketAddr) -> Result<()> {
		let listener = TcpListener::bind(addr)?;
		log::info!("gdbserver listening on {addr}");

		loop {
			let (stream, peer) = listener.accept()?;
			log::info!("client connected from {peer}");
			match self.serve_one(stream) {
				Ok(()) => log::info!("client {peer} disconnected"),
				Err(e) => log::warn!("session with {peer} ended: {e}"),
			}
		}
	}

	fn serve_one(&self, mut stream: TcpStream) -> Result<()> {
		let cdm_desc = cl_cdm::get_desc(&self.hostmod, self.cdm_di_addr)?;
		let mut session = Session {
			cdm_di_addr: self.cdm_di_addr,
			mam_di_addr: self.mam_di_addr,
			cdm_desc,
		};

		let mut framer = RspFramer::new();
		let mut buf = [0u8; 4096];

		loop {
			let n = stream.read(&mut buf)?;
			if n == 0 {
				return Ok(());
			}

			for event in framer.feed_all(&buf[..n]) {
				match event {
					FramerEvent::Decoded(payload) => {
						stream.write_all(b"+")?;
						let reply = self.dispatch(&payload, &mut session);
						self.send_with_retry(&mut stream, &reply)?;
					}
					FramerEvent::ChecksumMismatch => {
						stream.write_all(b"-")?;
					}
				}
			}
		}
	}

	/// Encodes and writes `reply`, retrying on NAK up to [`MAX_RETRIES`]
	/// times; a premature close or unexpected ack byte aborts the session.
	fn send_with_retry(&self, stream: &mut TcpStream, reply: &[u8]) -> Result<()> {
		let frame = rsp::encode(reply);
		for attempt in 0..=MAX_RETRIES {
			stream.write_all(&frame)?;

			let mut ack = [0u8; 1];
			let n = stream.read(&mut ack)?;
			if n == 0 {
				return Err(Error::Protocol("client closed connection before acking reply".into()));
			}
			match ack[0] {
				b'+' => return Ok(()),
				b'-' if attempt < MAX_RETRIES => continue,
				b'-' => return Err(Error::Protocol("reply NAK'd too many times".into())),
				other => return Err(Error::Protocol(format!("unexpected ack byte {other:#04x}"))),
			}
		}
		Ok(())
	}

	fn dispatch(&self, payload: &[u8], session: &mut Session) -> Vec<u8> {
		match dispatch_inner(&self.hostmod, payload, session) {
			Ok(reply) => reply,
			Err(Error::TimedOut) => b"E01".to_vec(),
			Err(e) => {
				log::warn!("command failed: {e}");
				b"E02".to_vec()
			}
		}
	}
}

fn dispatch_inner(hostmod: &HostModClient, payload: &[u8], session: &mut Session) -> Result<Vec<u8>> {
	if payload.is_empty() {
		return Ok(Vec::new());
	}

	match payload[0] {
		b'?' => Ok(b"S05".to_vec()),
		b'g' => cmd_read_all_registers(hostmod, session),
		b'G' => cmd_write_all_registers(hostmod, &payload[1..], session),
		b'p' => cmd_read_register(hostmod, &payload[1..], session),
		b'P' => cmd_write_register(hostmod, &payload[1..], session),
		b'm' => cmd_read_memory(hostmod, &payload[1..], session),
		b'M' => cmd_write_memory(hostmod, &payload[1..], session),
		b'c' => {
			cl_cdm::resume(hostmod, session.cdm_di_addr)?;
			let event = hostmod.event_receive()?;
			cl_cdm::handle_event(&event, &|event| log::debug!("core stalled after continue: {event:?}"))?;
			Ok(b"S05".to_vec())
		}
		b's' => {
			cl_cdm::step(hostmod, session.cdm_di_addr)?;
			let event = hostmod.event_receive()?;
			cl_cdm::handle_event(&event, &|event| log::debug!("core stalled after step: {event:?}"))?;
			Ok(b"S05".to_vec())
		}
		b'q' if payload.starts_with(b"qSupported") => Ok(QSUPPORTED_REPLY.as_bytes().to_vec()),
		_ => Ok(Vec::new()),
	}
}

fn reg_byte_width(session: &Session) -> usize {
	session.cdm_desc.core_data_width as usize / 8
}

fn cmd_read_all_registers(hostmod: &HostModClient, session: &mut Session) -> Result<Vec<u8>> {
	let width = reg_byte_width(session);
	let mut out = String::with_capacity(width * 2 * GPR_COUNT as usize);
	for i in 0..GPR_COUNT {
		let mut buf = vec![0u8; width];
		cl_cdm::cpureg_read(hostmod, &mut session.cdm_desc, &mut buf, GPR_BASE + i, HostmodFlags::empty())?;
		out.push_str(&hex::mem2hex(&buf));
	}
	Ok(out.into_bytes())
}

fn cmd_write_all_registers(hostmod: &HostModClient, args: &[u8], session: &mut Session) -> Result<Vec<u8>> {
	let width = reg_byte_width(session);
	let hex_str = std::str::from_utf8(args).map_err(|_| Error::Protocol("non-UTF8 G payload".into()))?;
	let per_reg = width * 2;
	if hex_str.len() != per_reg * GPR_COUNT as usize {
		return Err(Error::Protocol("G payload has wrong length for register width".into()));
	}

	for i in 0..GPR_COUNT {
		let slice = &hex_str[i as usize * per_reg..(i as usize + 1) * per_reg];
		let val = hex::hex2mem(slice)?;
		cl_cdm::cpureg_write(hostmod, &mut session.cdm_desc, &val, GPR_BASE + i, HostmodFlags::empty())?;
	}
	Ok(b"OK".to_vec())
}

fn cmd_read_register(hostmod: &HostModClient, args: &[u8], session: &mut Session) -> Result<Vec<u8>> {
	let arg_str = std::str::from_utf8(args).map_err(|_| Error::Protocol("non-UTF8 p payload".into()))?;
	let reg_addr = parse_hex_u16(arg_str)?;

	let width = reg_byte_width(session);
	let mut buf = vec![0u8; width];
	cl_cdm::cpureg_read(hostmod, &mut session.cdm_desc, &mut buf, reg_addr, HostmodFlags::empty())?;
	Ok(hex::mem2hex(&buf).into_bytes())
}

fn cmd_write_register(hostmod: &HostModClient, args: &[u8], session: &mut Session) -> Result<Vec<u8>> {
	let arg_str = std::str::from_utf8(args).map_err(|_| Error::Protocol("non-UTF8 P payload".into()))?;
	let (addr_hex, val_hex) = arg_str.split_once('=').ok_or_else(|| Error::Protocol("malformed P command".into()))?;
	let reg_addr = parse_hex_u16(addr_hex)?;
	let val = hex::hex2mem(val_hex)?;

	cl_cdm::cpureg_write(hostmod, &mut session.cdm_desc, &val, reg_addr, HostmodFlags::empty())?;
	Ok(b"OK".to_vec())
}

fn cmd_read_memory(hostmod: &HostModClient, args: &[u8], session: &Session) -> Result<Vec<u8>> {
	let arg_str = std::str::from_utf8(args).map_err(|_| Error::Protocol("non-UTF8 m payload".into()))?;
	let (addr_hex, len_hex) = arg_str.split_once(',').ok_or_else(|| Error::Protocol("malformed m command".into()))?;
	let addr = parse_hex_u32(addr_hex)?;
	let len = parse_hex_u32(len_hex)? as usize;

	let mut out = vec![0u8; len];
	cl_mam::read(hostmod, session.mam_di_addr, addr, len, &mut out, HostmodFlags::empty())?;
	Ok(hex::mem2hex(&out).into_bytes())
}

fn cmd_write_memory(hostmod: &HostModClient, args: &[u8], session: &Session) -> Result<Vec<u8>> {
	let arg_str = std::str::from_utf8(args).map_err(|_| Error::Protocol("non-UTF8 M payload".into()))?;
	let (header, data_hex) = arg_str.split_once(':').ok_or_else(|| Error::Protocol("malformed M command".into()))?;
	let (addr_hex, len_hex) = header.split_once(',').ok_or_else(|| Error::Protocol("malformed M command".into()))?;
	let addr = parse_hex_u32(addr_hex)?;
	let len = parse_hex_u32(len_hex)? as usize;
	let data = hex::hex2mem(data_hex)?;
	if data.len() != len {
		return Err(Error::Protocol("M payload length does not match declared len".into()));
	}

	cl_mam::write(hostmod, session.mam_di_addr, addr, &data, HostmodFlags::empty())?;
	Ok(b"OK".to_vec())
}

fn parse_hex_u16(s: &str) -> Result<u16> {
	u16::from_str_radix(s, 16).map_err(|_| Error::Protocol(format!("invalid hex register number {s:?}")))
}

fn parse_hex_u32(s: &str) -> Result<u32> {
	u32::from_str_radix(s, 16).map_err(|_| Error::Protocol(format!("invalid hex value {s:?}")))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_hex_addr_len() {
		assert_eq!(parse_hex_u32("23").unwrap(), 0x23);
		assert_eq!(parse_hex_u16("f007").unwrap(), 0xf007);
	}

	#[test]
	fn rejects_non_hex() {
		assert!(parse_hex_u32("zz").is_err());
	}
}
