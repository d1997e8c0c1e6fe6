//! CL-SCM: client layer for the System Control Module.
//!
//! Grounded verbatim in `examples/original_source/src/libosd/cl_scm.c`.

use crate::diaddr;
use crate::error::Result;
use crate::hostmod::{HostModClient, HostmodFlags, RegSize};
use crate::module::SubnetDescriptor;
use crate::reg;

/// Reads VENDOR_ID, DEVICE_ID and MAX_PKT_LEN from the SCM of `subnet_addr`.
pub fn get_subnetinfo(hostmod: &HostModClient, subnet_addr: u16) -> Result<SubnetDescriptor> {
	let scm_diaddr = diaddr::scm_addr(subnet_addr);

	let vendor_id = read_u16(hostmod, scm_diaddr, reg::scm::SYSTEM_VENDOR_ID)?;
	let device_id = read_u16(hostmod, scm_diaddr, reg::scm::SYSTEM_DEVICE_ID)?;
	let max_pkt_len = read_u16(hostmod, scm_diaddr, reg::scm::MAX_PKT_LEN)?;

	log::debug!("subnet {subnet_addr}: VENDOR_ID={vendor_id}, DEVICE_ID={device_id}, MAX_PKT_LEN={max_pkt_len}");

	Ok(SubnetDescriptor { vendor_id, device_id, max_pkt_len })
}

/// Releases the subnet's CPUs from reset.
pub fn cpus_start(hostmod: &HostModClient, subnet_addr: u16) -> Result<()> {
	scm_reg_setbit(hostmod, subnet_addr, reg::scm::SYSRST_CPU_RESET_BIT, false)
}

/// Holds the subnet's CPUs in reset.
pub fn cpus_stop(hostmod: &HostModClient, subnet_addr: u16) -> Result<()> {
	scm_reg_setbit(hostmod, subnet_addr, reg::scm::SYSRST_CPU_RESET_BIT, true)
}

fn scm_reg_setbit(hostmod: &HostModClient, subnet_addr: u16, bitnum: u32, bitval: bool) -> Result<()> {
	let scm_diaddr = diaddr::scm_addr(subnet_addr);
	let mut val = read_u16(hostmod, scm_diaddr, reg::scm::SYSRST)?;
	val = (val & !(1 << bitnum)) | ((bitval as u16) << bitnum);
	hostmod.reg_write(&val.to_ne_bytes(), scm_diaddr, reg::scm::SYSRST, RegSize::Bits16, HostmodFlags::empty())
}

fn read_u16(hostmod: &HostModClient, di_addr: u16, reg_addr: u16) -> Result<u16> {
	let mut buf = [0u8; 2];
	hostmod.reg_read(&mut buf, di_addr, reg_addr, RegSize::Bits16, HostmodFlags::empty())?;
	Ok(u16::from_ne_bytes(buf))
}
