#![forbid(unsafe_code)]

//! Mini display-driver coordination core.
//!
//! This crate is the guest/host coordination layer for a virtual display
//! device: the host monitor forwards display-driver calls here by numeric
//! function code, and this core decides whether to service each one locally
//! or defer to the monitor's generic VESA/BIOS emulation. It provides:
//! - The [`ClientRegs`] guest register snapshot the call protocol operates
//!   on (one mutable view per dispatched call).
//! - The function-number [`DispatchTable`] with the standard handler set.
//! - The mode/bank state machine ([`DisplayState`]) coordinating hi-res
//!   mode entry/exit, bank selection, and save/restore bookkeeping.
//! - Global trap handoff for the two bank-select I/O ports around hi-res
//!   transitions (via [`minivdd_platform::GlobalPortTraps`]).
//!
//! Dispatch is strictly serialized by the host monitor: each call runs to
//! completion before the next is delivered, so the per-device context needs
//! no locking. An implementation embedding this core on a multi-threaded
//! host must preserve that serialization.

pub mod dispatch;
pub mod handlers;
pub mod regs;
pub mod state;

pub use dispatch::{
    CallDescriptor, DispatchTable, Outcome, UnknownFunction, VddFunction, VddHandler,
};
pub use regs::{AltRegs, ClientRegs, EFlags};
pub use state::{DisplayMode, DisplayState, ModeClass};

use minivdd_platform::GlobalPortTraps;
use minivdd_svga::{AdapterReg, AdapterRegisters, VBE_DISPI_DATA_PORT, VBE_DISPI_INDEX_PORT};
use tracing::debug;

/// Static configuration for one virtual display device.
///
/// The defaults match the Bochs-style adapter this core is normally paired
/// with: the bank-select hardware is reached through the VBE index/data
/// port pair, and those are the two ports whose trap ownership moves
/// between host and guest around hi-res transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VddConfig {
    /// Bank-select index port (`0x01CE` for the Bochs VBE pair).
    pub bank_index_port: u16,
    /// Bank-select data port (`0x01CF` for the Bochs VBE pair).
    pub bank_data_port: u16,
}

impl Default for VddConfig {
    fn default() -> Self {
        Self {
            bank_index_port: VBE_DISPI_INDEX_PORT,
            bank_data_port: VBE_DISPI_DATA_PORT,
        }
    }
}

impl VddConfig {
    /// The port pair, always toggled together.
    pub fn bank_ports(self) -> [u16; 2] {
        [self.bank_index_port, self.bank_data_port]
    }
}

/// Everything a handler may touch besides the register snapshot: the
/// adapter's register surface, the host monitor's trap service, and the
/// tracked display state.
///
/// One context exists per attached virtual display device, for the whole
/// attachment lifetime. Carrying it explicitly (rather than as process
/// globals) keeps handlers testable and allows multiple device instances.
pub struct DeviceContext {
    pub adapter: Box<dyn AdapterRegisters>,
    pub traps: Box<dyn GlobalPortTraps>,
    pub display: DisplayState,
    pub config: VddConfig,
}

impl DeviceContext {
    /// Builds the attach-time context, capturing the adapter's identity and
    /// capacity into [`DisplayState`].
    pub fn attach(
        adapter: Box<dyn AdapterRegisters>,
        traps: Box<dyn GlobalPortTraps>,
        config: VddConfig,
    ) -> Self {
        let display = DisplayState::from_adapter(adapter.as_ref());
        Self {
            adapter,
            traps,
            display,
            config,
        }
    }

    /// Hands the bank-select port pair to the guest (disables host
    /// trapping on both). Idempotent; must be paired with
    /// [`DeviceContext::reclaim_bank_ports`] by the caller.
    pub fn release_bank_ports(&mut self) {
        for port in self.config.bank_ports() {
            self.traps.disable_global_trapping(port);
        }
        debug!(
            index = format_args!("{:#06x}", self.config.bank_index_port),
            data = format_args!("{:#06x}", self.config.bank_data_port),
            "bank-select ports handed to the guest"
        );
    }

    /// Returns the bank-select port pair to host trapping. Idempotent.
    pub fn reclaim_bank_ports(&mut self) {
        for port in self.config.bank_ports() {
            self.traps.enable_global_trapping(port);
        }
        debug!(
            index = format_args!("{:#06x}", self.config.bank_index_port),
            data = format_args!("{:#06x}", self.config.bank_data_port),
            "bank-select ports reclaimed by the host"
        );
    }

    /// Reads a bank-select register from hardware, or `None` when the
    /// adapter cannot answer authoritatively (not initialized yet).
    pub fn hardware_bank(&self, reg: AdapterReg) -> Option<u32> {
        if !self.adapter.is_initialized() {
            return None;
        }
        Some(self.adapter.read_register(reg))
    }
}

/// One attached virtual display device: the dispatch table plus its
/// per-device context.
///
/// This is the surface the host monitor's trampoline talks to:
/// [`MiniVdd::dispatch`] takes the wire function number and the guest
/// register snapshot, and returns the carry flag to report back.
pub struct MiniVdd {
    table: DispatchTable,
    ctx: DeviceContext,
}

impl MiniVdd {
    /// Attaches a device with the standard function set and default
    /// configuration.
    pub fn new(adapter: Box<dyn AdapterRegisters>, traps: Box<dyn GlobalPortTraps>) -> Self {
        Self::with_config(adapter, traps, VddConfig::default())
    }

    pub fn with_config(
        adapter: Box<dyn AdapterRegisters>,
        traps: Box<dyn GlobalPortTraps>,
        config: VddConfig,
    ) -> Self {
        Self::with_table(DispatchTable::standard(), adapter, traps, config)
    }

    /// Attaches with a caller-composed table (extension point for
    /// additional function numbers).
    pub fn with_table(
        table: DispatchTable,
        adapter: Box<dyn AdapterRegisters>,
        traps: Box<dyn GlobalPortTraps>,
        config: VddConfig,
    ) -> Self {
        Self {
            table,
            ctx: DeviceContext::attach(adapter, traps, config),
        }
    }

    /// Dispatches one call. The returned boolean is the carry flag for the
    /// monitor's trampoline; unknown function numbers report `false` with
    /// the snapshot untouched.
    pub fn dispatch(&mut self, function: u8, regs: &mut ClientRegs) -> bool {
        self.table
            .dispatch(function, &mut self.ctx, regs)
            .is_handled()
    }

    /// Abnormal-termination reset: the VM went away without a matching
    /// save/restore, so the display state returns to standard VGA without
    /// preserving contents, and the bank-select ports go back to host
    /// trapping even if a pre hook was left unpaired.
    pub fn reset(&mut self) {
        self.ctx.reclaim_bank_ports();
        self.ctx.display.reset();
        debug!("display state reset after VM termination");
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut DeviceContext {
        &mut self.ctx
    }

    pub fn display(&self) -> &DisplayState {
        &self.ctx.display
    }
}
