//! CL-CDM: client layer for the Core Debug Module.
//!
//! Owns the CPU register access scheme: a 16-bit RSP-level register
//! address is split into an upper-window select bit and a 15-bit index,
//! mapped onto the CDM's own address space at `0x8000 | (reg_addr & 0x7fff)`.
//! Grounded in `examples/original_source/tests/unit/check_cl_cdm.c`.

use crate::error::{Error, Result};
use crate::hostmod::{HostModClient, HostmodFlags, RegSize};
use crate::module::{CdmDescriptor, ModuleType};
use crate::packet::Packet;
use crate::reg;

const CDM_REG_BASE: u16 = 0x8000;
const REG_ADDR_LOCAL_MASK: u16 = 0x7fff;

/// A decoded CDM stall event (spec.md §4.3's `handle_event`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdmEvent {
	pub stall: bool,
}

/// Reads a module's description, verifies it is a CDM, and caches its
/// three control registers.
pub fn get_desc(hostmod: &HostModClient, di_addr: u16) -> Result<CdmDescriptor> {
	let desc = hostmod.describe_module(di_addr)?;
	if desc.module_type() != ModuleType::Cdm {
		return Err(Error::WrongModule {
			expected: "CDM",
			actual: desc.module_type().to_string(),
		});
	}

	let core_ctrl = read_u16(hostmod, di_addr, reg::cdm::CORE_CTRL)?;
	let core_reg_upper = read_u16(hostmod, di_addr, reg::cdm::CORE_REG_UPPER)?;
	let core_data_width = read_u16(hostmod, di_addr, reg::cdm::CORE_DATA_WIDTH)?;

	Ok(CdmDescriptor {
		di_addr,
		core_ctrl,
		core_reg_upper,
		core_data_width,
	})
}

fn read_u16(hostmod: &HostModClient, di_addr: u16, reg_addr: u16) -> Result<u16> {
	let mut buf = [0u8; 2];
	hostmod.reg_read(&mut buf, di_addr, reg_addr, RegSize::Bits16, HostmodFlags::empty())?;
	Ok(u16::from_ne_bytes(buf))
}

/// Ensures the cached upper-window register matches `reg_addr`'s upper
/// bit, writing the window register first if it does not.
fn sync_upper_window(hostmod: &HostModClient, desc: &mut CdmDescriptor, reg_addr: u16, flags: HostmodFlags) -> Result<()> {
	let wanted_upper = reg_addr >> 15;
	if wanted_upper != desc.core_reg_upper {
		hostmod.reg_write(
			&wanted_upper.to_ne_bytes(),
			desc.di_addr,
			reg::cdm::CORE_REG_UPPER,
			RegSize::Bits16,
			flags,
		)?;
		desc.core_reg_upper = wanted_upper;
	}
	Ok(())
}

fn cdm_physical_addr(reg_addr: u16) -> u16 {
	CDM_REG_BASE | (reg_addr & REG_ADDR_LOCAL_MASK)
}

/// Reads a CPU register, switching the upper window first if needed.
pub fn cpureg_read(hostmod: &HostModClient, desc: &mut CdmDescriptor, out: &mut [u8], reg_addr: u16, flags: HostmodFlags) -> Result<()> {
	sync_upper_window(hostmod, desc, reg_addr, flags)?;
	let size = RegSize::from_bits(u32::from(desc.core_data_width))?;
	hostmod.reg_read(out, desc.di_addr, cdm_physical_addr(reg_addr), size, flags)
}

/// Writes a CPU register, switching the upper window first if needed.
pub fn cpureg_write(hostmod: &HostModClient, desc: &mut CdmDescriptor, val: &[u8], reg_addr: u16, flags: HostmodFlags) -> Result<()> {
	sync_upper_window(hostmod, desc, reg_addr, flags)?;
	let size = RegSize::from_bits(u32::from(desc.core_data_width))?;
	hostmod.reg_write(val, desc.di_addr, cdm_physical_addr(reg_addr), size, flags)
}

/// Decodes an inbound EVENT packet's payload into a [`CdmEvent`]; bit 0 of
/// the first payload word is the stall flag.
pub fn decode_event(payload: &[u16]) -> Result<CdmEvent> {
	let word = payload.first().ok_or_else(|| Error::Protocol("empty CDM event payload".into()))?;
	Ok(CdmEvent { stall: word & 0x1 != 0 })
}

/// Decodes an inbound EVENT packet and invokes `on_event` with the result.
/// Meant to be called from the registered hostmod event callback.
pub fn handle_event(packet: &Packet, on_event: &dyn Fn(CdmEvent)) -> Result<()> {
	let event = decode_event(packet.payload())?;
	on_event(event);
	Ok(())
}

/// Clears the stall bit of `CORE_CTRL`, releasing the core to run freely.
pub fn resume(hostmod: &HostModClient, di_addr: u16) -> Result<()> {
	core_ctrl_setbit(hostmod, di_addr, reg::cdm::CORE_CTRL_STALL_BIT, false)
}

/// Sets the single-step bit of `CORE_CTRL`; the core runs one instruction
/// and re-stalls.
pub fn step(hostmod: &HostModClient, di_addr: u16) -> Result<()> {
	core_ctrl_setbit(hostmod, di_addr, reg::cdm::CORE_CTRL_STEP_BIT, true)
}

fn core_ctrl_setbit(hostmod: &HostModClient, di_addr: u16, bitnum: u32, bitval: bool) -> Result<()> {
	let mut val = read_u16(hostmod, di_addr, reg::cdm::CORE_CTRL)?;
	val = (val & !(1 << bitnum)) | ((bitval as u16) << bitnum);
	hostmod.reg_write(&val.to_ne_bytes(), di_addr, reg::cdm::CORE_CTRL, RegSize::Bits16, HostmodFlags::empty())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn physical_addr_mapping() {
		assert_eq!(cdm_physical_addr(0x0007), 0x8007);
		assert_eq!(cdm_physical_addr(0xf007), 0x8000 | 0x7007);
	}

	#[test]
	fn decode_stall_event() {
		assert_eq!(decode_event(&[1]).unwrap(), CdmEvent { stall: true });
		assert_eq!(decode_event(&[0]).unwrap(), CdmEvent { stall: false });
		assert!(decode_event(&[]).is_err());
	}

	#[test]
	fn handle_event_invokes_callback_with_decoded_stall() {
		use std::cell::Cell;

		let mut packet = Packet::new(1);
		packet.set_header(0, 0, crate::packet::PacketType::Event, 0).unwrap();
		packet.payload_mut()[0] = 1;

		let seen = Cell::new(None);
		handle_event(&packet, &|event| seen.set(Some(event))).unwrap();
		assert_eq!(seen.get(), Some(CdmEvent { stall: true }));
	}

	#[test]
	fn handle_event_propagates_decode_error() {
		let empty = Packet::new(0);
		assert!(handle_event(&empty, &|_| {}).is_err());
	}
}
