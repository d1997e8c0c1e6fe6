//! End-to-end scenarios from spec.md §8: a mocked Host Controller speaking
//! raw DI packets over a ZeroMQ ROUTER socket, a real `HostModClient`/
//! `GdbServer` pair, and a plain `TcpStream` standing in for the GDB client.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use osdgw_bridge::gdbserver::GdbServer;
use osdgw_bridge::hostmod::HostModClient;
use osdgw_bridge::packet::{Packet, PacketType};

// Wire sub-types for TYPE=REG packets, mirrored from `hostmod.rs`'s private
// `type_sub` module (duplicated here because the mock plays the controller's
// side of the wire, not the client's).
const READ_REG_16: u16 = 0;
const READ_REG_32: u16 = 1;
const WRITE_REG_16: u16 = 4;
const MGMT_ADDR_ASSIGN: u16 = 0xf;

const REG_VENDOR_ID: u16 = 0x0;
const REG_TYPE_ID: u16 = 0x1;
const REG_VERSION: u16 = 0x2;
const REG_CORE_CTRL: u16 = 0x200;
const REG_CORE_REG_UPPER: u16 = 0x201;
const REG_CORE_DATA_WIDTH: u16 = 0x202;
const MODULE_TYPE_CDM: u16 = 3;

const ASSIGNED_DIADDR: u16 = 0x0801;
const CDM_DIADDR: u16 = 0x0001;
const MAM_DIADDR: u16 = 0x0002;

/// Runs a minimal Host Controller stand-in until the socket is closed:
/// answers the address-assignment handshake, `describe_module`, the three
/// CDM control registers, and any register read as a fixed GPR value.
fn run_mock_controller(ctx: zmq::Context, endpoint: &str) {
	let router = ctx.socket(zmq::ROUTER).expect("create ROUTER socket");
	router.bind(endpoint).expect("bind mock controller");
	router.set_rcvtimeo(5000).unwrap();

	loop {
		let mut frames = match router.recv_multipart(0) {
			Ok(f) => f,
			Err(_) => return,
		};
		if frames.len() != 2 {
			continue;
		}
		let payload_bytes = frames.pop().unwrap();
		let identity = frames.pop().unwrap();

		let req = match Packet::from_wire(&payload_bytes) {
			Ok(p) => p,
			Err(_) => continue,
		};

		let reply = build_reply(&req);
		router.send_multipart([identity, reply.to_wire()], 0).unwrap();
	}
}

fn build_reply(req: &Packet) -> Packet {
	if req.get_type_sub() == MGMT_ADDR_ASSIGN {
		let mut res = Packet::new(1);
		res.set_header(req.get_src(), req.get_dest(), PacketType::Res, req.get_type_sub()).unwrap();
		res.payload_mut()[0] = ASSIGNED_DIADDR;
		return res;
	}

	let reg_addr = req.payload()[0];
	let is_write = matches!(req.get_type_sub(), 4..=7);
	let words: Vec<u16> = if is_write {
		Vec::new()
	} else {
		match reg_addr {
			REG_VENDOR_ID => vec![0xcafe],
			REG_TYPE_ID => vec![MODULE_TYPE_CDM],
			REG_VERSION => vec![1],
			REG_CORE_CTRL => vec![0],
			REG_CORE_REG_UPPER => vec![0],
			REG_CORE_DATA_WIDTH => vec![32],
			// Any other address is a CPU register read through the CDM's
			// physical window; spec.md §8 scenario 10 fixes the value.
			_ => vec![0x1111, 0x1111],
		}
	};

	let mut res = Packet::new(words.len());
	res.set_header(req.get_src(), req.get_dest(), PacketType::Res, req.get_type_sub()).unwrap();
	res.payload_mut().copy_from_slice(&words);
	res
}

fn read_ack(stream: &mut TcpStream) {
	let mut b = [0u8; 1];
	stream.read_exact(&mut b).expect("read ack byte");
	assert_eq!(b[0], b'+');
}

#[test]
fn read_all_registers_end_to_end() {
	let ctx = zmq::Context::new();
	let controller_endpoint = "tcp://127.0.0.1:19537";
	{
		let ctx = ctx.clone();
		let endpoint = controller_endpoint.to_string();
		thread::spawn(move || run_mock_controller(ctx, &endpoint));
	}
	thread::sleep(Duration::from_millis(100));

	let hostmod = HostModClient::new(controller_endpoint, None).expect("create hostmod client");
	hostmod.connect().expect("connect to mock controller");

	let server = GdbServer::new(hostmod, CDM_DIADDR, MAM_DIADDR);
	let gdb_addr = "127.0.0.1:19538";
	thread::spawn(move || {
		let _ = server.run(gdb_addr.parse().unwrap());
	});
	thread::sleep(Duration::from_millis(100));

	let mut client = TcpStream::connect(gdb_addr).expect("connect to gdbserver");
	client.write_all(b"$g#67").unwrap();

	read_ack(&mut client); // '+' for the command itself

	let mut buf = Vec::new();
	let mut byte = [0u8; 1];
	loop {
		client.read_exact(&mut byte).unwrap();
		buf.push(byte[0]);
		if byte[0] == b'#' {
			client.read_exact(&mut byte).unwrap();
			buf.push(byte[0]);
			client.read_exact(&mut byte).unwrap();
			buf.push(byte[0]);
			break;
		}
	}

	let expected_payload = "11111111".repeat(32);
	let expected_frame = format!("${expected_payload}#00");
	assert_eq!(String::from_utf8(buf).unwrap(), expected_frame);

	client.write_all(b"+").unwrap();
}
