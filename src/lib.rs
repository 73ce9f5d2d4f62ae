#![forbid(unsafe_code)]

//! Umbrella crate for the mini display-driver coordination core.
//!
//! Re-exports the public surface of the member crates so an embedder can
//! depend on `minivdd` alone:
//! - [`minivdd_core`] — register snapshot, function dispatch, mode/bank
//!   state machine, and the [`MiniVdd`] device facade.
//! - [`minivdd_svga`] — the virtual adapter register surface and the
//!   emulated SVGA device model.
//! - [`minivdd_platform`] — host-monitor services (global port trapping).

pub use minivdd_core::{
    AltRegs, CallDescriptor, ClientRegs, DeviceContext, DispatchTable, DisplayMode, DisplayState,
    EFlags, MiniVdd, ModeClass, Outcome, UnknownFunction, VddConfig, VddFunction, VddHandler,
};
pub use minivdd_platform::{GlobalPortTraps, TrapController};
pub use minivdd_svga::{
    AdapterReg, AdapterRegisters, SvgaDevice, DEFAULT_BANK_SIZE, DEFAULT_VRAM_SIZE,
    VBE_DISPI_DATA_PORT, VBE_DISPI_INDEX_PORT,
};
