//! Host Module client: the sole point of contact with the Host Controller.
//!
//! A [`HostModClient`] owns a ZeroMQ `DEALER` socket connected to the
//! controller's endpoint. One dedicated worker thread owns the socket's
//! receive side and demultiplexes inbound frames: `RES` packets are handed
//! to whichever call is waiting on the pending-request slot, `EVENT`
//! packets go into a bounded queue (and, if registered, an event
//! callback).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::diaddr::CONTROLLER_ADDR;
use crate::error::{Error, Result};
use crate::module::ModuleDescriptor;
use crate::packet::{Packet, PacketType};
use crate::reg;

bitflags::bitflags! {
	/// Flags accepted by [`HostModClient::reg_read`]/[`HostModClient::reg_write`].
	#[derive(Clone, Copy, PartialEq, Eq)]
	pub struct HostmodFlags: u32 {
		/// Block indefinitely instead of giving up after the receive timeout.
		const BLOCKING = 1;
	}
}

/// Supported register widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegSize {
	Bits16,
	Bits32,
	Bits64,
	Bits128,
}

impl RegSize {
	pub fn bits(self) -> u32 {
		match self {
			RegSize::Bits16 => 16,
			RegSize::Bits32 => 32,
			RegSize::Bits64 => 64,
			RegSize::Bits128 => 128,
		}
	}

	pub fn bytes(self) -> usize {
		self.bits() as usize / 8
	}

	pub fn words(self) -> usize {
		self.bytes() / 2
	}

	pub fn from_bits(bits: u32) -> Result<Self> {
		match bits {
			16 => Ok(RegSize::Bits16),
			32 => Ok(RegSize::Bits32),
			64 => Ok(RegSize::Bits64),
			128 => Ok(RegSize::Bits128),
			other => Err(Error::Protocol(format!("unsupported register size {other} bit"))),
		}
	}
}

/// `TYPE_SUB` values used for `TYPE = REG` packets.
mod type_sub {
	pub const READ_REG_16: u16 = 0;
	pub const READ_REG_32: u16 = 1;
	pub const READ_REG_64: u16 = 2;
	pub const READ_REG_128: u16 = 3;
	pub const WRITE_REG_16: u16 = 4;
	pub const WRITE_REG_32: u16 = 5;
	pub const WRITE_REG_64: u16 = 6;
	pub const WRITE_REG_128: u16 = 7;
	/// Reserved sub-type for the address-assignment handshake with the
	/// Host Controller.
	pub const MGMT_ADDR_ASSIGN: u16 = 0xf;
}

fn read_sub_type(size: RegSize) -> u16 {
	match size {
		RegSize::Bits16 => type_sub::READ_REG_16,
		RegSize::Bits32 => type_sub::READ_REG_32,
		RegSize::Bits64 => type_sub::READ_REG_64,
		RegSize::Bits128 => type_sub::READ_REG_128,
	}
}

fn write_sub_type(size: RegSize) -> u16 {
	match size {
		RegSize::Bits16 => type_sub::WRITE_REG_16,
		RegSize::Bits32 => type_sub::WRITE_REG_32,
		RegSize::Bits64 => type_sub::WRITE_REG_64,
		RegSize::Bits128 => type_sub::WRITE_REG_128,
	}
}

/// Packs a big-endian sequence of 16-bit words into a native-byte-order
/// value of `size`, writing exactly `size.bytes()` bytes into `out`.
fn words_to_native_bytes(words: &[u16], size: RegSize, out: &mut [u8]) -> Result<()> {
	if words.len() != size.words() || out.len() != size.bytes() {
		return Err(Error::Protocol("register payload size mismatch".into()));
	}
	let value: u128 = words.iter().fold(0u128, |acc, &w| (acc << 16) | u128::from(w));
	let full = value.to_ne_bytes();
	// `to_ne_bytes` always yields 16 bytes for u128; native order means the
	// value's low-order bytes are contiguous at one end depending on host
	// endianness, so slice from whichever end holds the significant bytes.
	if cfg!(target_endian = "little") {
		out.copy_from_slice(&full[..size.bytes()]);
	} else {
		out.copy_from_slice(&full[16 - size.bytes()..]);
	}
	Ok(())
}

/// Inverse of [`words_to_native_bytes`]: unpacks a native-byte-order value
/// into big-endian-significance 16-bit words (most significant word first).
fn native_bytes_to_words(bytes: &[u8], size: RegSize) -> Result<Vec<u16>> {
	if bytes.len() != size.bytes() {
		return Err(Error::Protocol("register value size mismatch".into()));
	}
	let mut full = [0u8; 16];
	if cfg!(target_endian = "little") {
		full[..size.bytes()].copy_from_slice(bytes);
	} else {
		full[16 - size.bytes()..].copy_from_slice(bytes);
	}
	let value = u128::from_ne_bytes(full);
	Ok((0..size.words())
		.rev()
		.map(|i| ((value >> (i * 16)) & 0xffff) as u16)
		.collect())
}

const DEFAULT_RCVTIMEO_MS: i32 = 1000;
const WORKER_POLL_MS: i32 = 200;
const CONNECT_TIMEO_MS: i32 = 2000;

struct PendingSlot {
	/// `true` while a caller is awaiting a response.
	armed: bool,
	response: Option<Packet>,
}

struct Shared {
	socket: Mutex<zmq::Socket>,
	pending: Mutex<PendingSlot>,
	pending_cv: Condvar,
	events_tx: mpsc::SyncSender<Packet>,
	running: AtomicBool,
	connected: AtomicBool,
}

/// A registered client of the Host Controller.
pub struct HostModClient {
	shared: Arc<Shared>,
	own_diaddr: Mutex<Option<u16>>,
	events_rx: Mutex<mpsc::Receiver<Packet>>,
	event_cb: Option<Arc<dyn Fn(Packet) + Send + Sync>>,
	worker: Mutex<Option<JoinHandle<()>>>,
	endpoint: String,
	zmq_ctx: zmq::Context,
}

impl HostModClient {
	/// Creates a disconnected client. `event_cb`, if given, is invoked from
	/// the worker thread for every inbound EVENT packet, in arrival order.
	pub fn new(endpoint: &str, event_cb: Option<Arc<dyn Fn(Packet) + Send + Sync>>) -> Result<Self> {
		let zmq_ctx = zmq::Context::new();
		let socket = zmq_ctx.socket(zmq::DEALER)?;
		let (events_tx, events_rx) = mpsc::sync_channel(64);

		Ok(HostModClient {
			shared: Arc::new(Shared {
				socket: Mutex::new(socket),
				pending: Mutex::new(PendingSlot { armed: false, response: None }),
				pending_cv: Condvar::new(),
				events_tx,
				running: AtomicBool::new(false),
				connected: AtomicBool::new(false),
			}),
			own_diaddr: Mutex::new(None),
			events_rx: Mutex::new(events_rx),
			event_cb,
			worker: Mutex::new(None),
			endpoint: endpoint.to_string(),
			zmq_ctx,
		})
	}

	/// Opens the DEALER socket, performs the address-assignment handshake
	/// and starts the event-dispatch worker.
	pub fn connect(&self) -> Result<()> {
		{
			let socket = self.shared.socket.lock().unwrap();
			socket
				.connect(&self.endpoint)
				.map_err(|e| Error::ConnectionFailed(format!("connect to {}: {e}", self.endpoint)))?;
			socket.set_rcvtimeo(CONNECT_TIMEO_MS)?;

			let mut req = Packet::new(0);
			req.set_header(CONTROLLER_ADDR, 0, PacketType::Reg, type_sub::MGMT_ADDR_ASSIGN)?;
			socket.send(req.to_wire(), 0)?;

			let bytes = socket
				.recv_bytes(0)
				.map_err(|_| Error::ConnectionFailed("host controller did not respond to address assignment".into()))?;
			let reply = Packet::from_wire(&bytes)?;
			if reply.get_type() != PacketType::Res || reply.payload().is_empty() {
				return Err(Error::ConnectionFailed("malformed address assignment reply".into()));
			}
			*self.own_diaddr.lock().unwrap() = Some(reply.payload()[0]);

			socket.set_rcvtimeo(WORKER_POLL_MS)?;
		}

		self.shared.running.store(true, Ordering::SeqCst);
		self.shared.connected.store(true, Ordering::SeqCst);

		let shared = Arc::clone(&self.shared);
		let event_cb = self.event_cb.clone();
		let handle = std::thread::Builder::new()
			.name("hostmod-worker".into())
			.spawn(move || worker_loop(shared, event_cb))
			.map_err(|e| Error::Failure(format!("spawn hostmod worker: {e}")))?;
		*self.worker.lock().unwrap() = Some(handle);

		log::info!(
			"connected to host controller at {}, assigned DI address {:#06x}",
			self.endpoint,
			self.own_diaddr.lock().unwrap().unwrap()
		);
		Ok(())
	}

	/// Stops the worker and closes the socket.
	pub fn disconnect(&self) {
		self.shared.running.store(false, Ordering::SeqCst);
		self.shared.connected.store(false, Ordering::SeqCst);
		self.shared.pending_cv.notify_all();
		if let Some(handle) = self.worker.lock().unwrap().take() {
			let _ = handle.join();
		}
	}

	pub fn is_connected(&self) -> bool {
		self.shared.connected.load(Ordering::SeqCst)
	}

	pub fn get_diaddr(&self) -> Result<u16> {
		self.own_diaddr.lock().unwrap().ok_or(Error::NotConnected)
	}

	/// Reads a register of width `size` on the module at `diaddr`.
	pub fn reg_read(&self, out: &mut [u8], diaddr: u16, reg_addr: u16, size: RegSize, flags: HostmodFlags) -> Result<()> {
		if !self.is_connected() {
			return Err(Error::NotConnected);
		}
		let mut req = Packet::new(1);
		req.set_header(diaddr, self.get_diaddr()?, PacketType::Reg, read_sub_type(size))?;
		req.payload_mut()[0] = reg_addr;

		let res = self.transact(req, flags)?;
		words_to_native_bytes(res.payload(), size, out)
	}

	/// Writes `val` (in native byte order) to a register of width `size`
	/// on the module at `diaddr`.
	pub fn reg_write(&self, val: &[u8], diaddr: u16, reg_addr: u16, size: RegSize, flags: HostmodFlags) -> Result<()> {
		if !self.is_connected() {
			return Err(Error::NotConnected);
		}
		let words = native_bytes_to_words(val, size)?;
		let mut req = Packet::new(1 + words.len());
		req.set_header(diaddr, self.get_diaddr()?, PacketType::Reg, write_sub_type(size))?;
		req.payload_mut()[0] = reg_addr;
		req.payload_mut()[1..].copy_from_slice(&words);

		self.transact(req, flags)?;
		Ok(())
	}

	/// Issues the REG request and waits for the matching RES packet,
	/// honoring `flags`'s `BLOCKING` bit.
	fn transact(&self, req: Packet, flags: HostmodFlags) -> Result<Packet> {
		{
			let mut pending = self.shared.pending.lock().unwrap();
			pending.armed = true;
			pending.response = None;
		}

		{
			let socket = self.shared.socket.lock().unwrap();
			socket.send(req.to_wire(), 0)?;
		}

		let mut pending = self.shared.pending.lock().unwrap();
		if flags.contains(HostmodFlags::BLOCKING) {
			while pending.response.is_none() && self.shared.connected.load(Ordering::SeqCst) {
				pending = self.shared.pending_cv.wait(pending).unwrap();
			}
		} else {
			let deadline = Instant::now() + Duration::from_millis(DEFAULT_RCVTIMEO_MS as u64);
			while pending.response.is_none() && self.shared.connected.load(Ordering::SeqCst) {
				let now = Instant::now();
				if now >= deadline {
					break;
				}
				let (guard, timeout) = self.shared.pending_cv.wait_timeout(pending, deadline - now).unwrap();
				pending = guard;
				if timeout.timed_out() && pending.response.is_none() {
					break;
				}
			}
		}

		pending.armed = false;
		if !self.shared.connected.load(Ordering::SeqCst) && pending.response.is_none() {
			return Err(Error::NotConnected);
		}
		pending.response.take().ok_or(Error::TimedOut)
	}

	/// Issues three REG reads for VENDOR_ID, TYPE_ID and VERSION.
	pub fn describe_module(&self, di_addr: u16) -> Result<ModuleDescriptor> {
		let mut vendor = [0u8; 2];
		let mut type_id = [0u8; 2];
		let mut version = [0u8; 2];
		self.reg_read(&mut vendor, di_addr, reg::module::VENDOR_ID, RegSize::Bits16, HostmodFlags::empty())?;
		self.reg_read(&mut type_id, di_addr, reg::module::TYPE_ID, RegSize::Bits16, HostmodFlags::empty())?;
		self.reg_read(&mut version, di_addr, reg::module::VERSION, RegSize::Bits16, HostmodFlags::empty())?;

		Ok(ModuleDescriptor {
			vendor_id: u16::from_ne_bytes(vendor),
			type_id: u16::from_ne_bytes(type_id),
			version: u16::from_ne_bytes(version),
			di_addr,
		})
	}

	/// Fire-and-forget send of an outbound event packet.
	pub fn event_send(&self, packet: &Packet) -> Result<()> {
		if !self.is_connected() {
			return Err(Error::NotConnected);
		}
		let socket = self.shared.socket.lock().unwrap();
		socket.send(packet.to_wire(), 0)?;
		Ok(())
	}

	/// Blocking pop from the internal event queue.
	pub fn event_receive(&self) -> Result<Packet> {
		self.events_rx
			.lock()
			.unwrap()
			.recv()
			.map_err(|_| Error::NotConnected)
	}
}

impl Drop for HostModClient {
	fn drop(&mut self) {
		self.disconnect();
	}
}

fn worker_loop(shared: Arc<Shared>, event_cb: Option<Arc<dyn Fn(Packet) + Send + Sync>>) {
	while shared.running.load(Ordering::SeqCst) {
		let bytes = {
			let socket = shared.socket.lock().unwrap();
			socket.recv_bytes(0)
		};
		let bytes = match bytes {
			Ok(b) => b,
			Err(zmq::Error::EAGAIN) => continue,
			Err(_) => {
				shared.connected.store(false, Ordering::SeqCst);
				shared.pending_cv.notify_all();
				break;
			}
		};

		let packet = match Packet::from_wire(&bytes) {
			Ok(p) => p,
			Err(_) => {
				log::warn!("dropping malformed DI frame of {} bytes", bytes.len());
				continue;
			}
		};

		match packet.get_type() {
			PacketType::Res => {
				let mut pending = shared.pending.lock().unwrap();
				if pending.armed {
					pending.response = Some(packet);
					shared.pending_cv.notify_all();
				} else {
					log::warn!("discarding unsolicited RES packet (no outstanding request)");
				}
			}
			PacketType::Event => {
				if let Some(cb) = &event_cb {
					cb(packet.clone());
				}
				// Bounded channel: blocks the worker (applying back-pressure)
				// until the queue has room, preserving arrival order instead
				// of silently dropping events when the consumer falls behind.
				if shared.events_tx.send(packet).is_err() {
					log::warn!("event queue receiver gone, dropping EVENT packet");
				}
			}
			other => {
				log::warn!("dropping unexpected {other:?} packet on hostmod channel");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn word_byte_roundtrip_32() {
		let words = [0xabcdu16, 0xdeadu16];
		let mut bytes = [0u8; 4];
		words_to_native_bytes(&words, RegSize::Bits32, &mut bytes).unwrap();
		let back = native_bytes_to_words(&bytes, RegSize::Bits32).unwrap();
		assert_eq!(back, words);
	}

	#[test]
	fn reg_size_from_bits() {
		assert_eq!(RegSize::from_bits(32).unwrap().words(), 2);
		assert!(RegSize::from_bits(24).is_err());
	}
}
