pub mod cl_cdm;
pub mod cl_mam;
pub mod cl_scm;
pub mod config;
pub mod diaddr;
pub mod error;
pub mod gdbserver;
pub mod hex;
pub mod hostmod;
pub mod logging;
pub mod module;
pub mod packet;
pub mod reg;
pub mod rsp;

pub use error::{Error, Result};
