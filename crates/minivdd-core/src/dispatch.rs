//! Function-number dispatch for the mini-VDD call protocol.
//!
//! The host monitor invokes the driver with a numeric function code and a
//! [`ClientRegs`] snapshot. Function numbers are wire contract: they are
//! fixed by the display-driver protocol and must never be renumbered, only
//! extended. The table is built once at startup and stays immutable while
//! calls are being dispatched.

use thiserror::Error;
use tracing::trace;

use crate::regs::ClientRegs;
use crate::DeviceContext;

/// Function numbers occupy a single byte on the wire.
pub const DISPATCH_TABLE_LEN: usize = 256;

/// Mini-VDD call protocol function numbers.
///
/// Numbering follows the display-driver dispatch order the original
/// protocol defines; gaps are functions this driver does not implement
/// (the monitor falls back to its own handling for those).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VddFunction {
    RegisterDisplayDriver = 0,
    PreHiresToVga = 4,
    PostHiresToVga = 5,
    EnableTraps = 13,
    DisplayDriverDisabling = 26,
    GetCurrentBankWrite = 32,
    GetCurrentBankRead = 33,
    SetBank = 34,
    GetTotalVramSize = 36,
    GetBankSize = 37,
    SetHiresMode = 38,
    PreHiresSaveRestore = 39,
    PostHiresSaveRestore = 40,
    VesaSupport = 41,
    GetChipId = 42,
    CheckScreenSwitchOk = 43,
    VesaCallPostProcessing = 47,
}

impl VddFunction {
    /// The wire function number.
    pub fn number(self) -> u8 {
        self as u8
    }
}

/// A function number this driver does not define a handler for.
///
/// Not an error on the dispatch path (unknown numbers simply defer to the
/// monitor); this exists for tooling that wants the typed enum.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unknown mini-VDD function number {0:#04x}")]
pub struct UnknownFunction(pub u8);

impl TryFrom<u8> for VddFunction {
    type Error = UnknownFunction;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Ok(match number {
            0 => VddFunction::RegisterDisplayDriver,
            4 => VddFunction::PreHiresToVga,
            5 => VddFunction::PostHiresToVga,
            13 => VddFunction::EnableTraps,
            26 => VddFunction::DisplayDriverDisabling,
            32 => VddFunction::GetCurrentBankWrite,
            33 => VddFunction::GetCurrentBankRead,
            34 => VddFunction::SetBank,
            36 => VddFunction::GetTotalVramSize,
            37 => VddFunction::GetBankSize,
            38 => VddFunction::SetHiresMode,
            39 => VddFunction::PreHiresSaveRestore,
            40 => VddFunction::PostHiresSaveRestore,
            41 => VddFunction::VesaSupport,
            42 => VddFunction::GetChipId,
            43 => VddFunction::CheckScreenSwitchOk,
            47 => VddFunction::VesaCallPostProcessing,
            other => return Err(UnknownFunction(other)),
        })
    }
}

/// Per-call result, reported to the host monitor as the carry flag.
///
/// For most functions carry set means "this driver handled the call; do not
/// fall back to the generic VESA/BIOS path". `Unhandled` is not an error:
/// it is the expected answer whenever the driver lacks information or
/// chooses to defer. `CHECK_SCREEN_SWITCH_OK` reuses the same carry bit
/// with its own meaning (carry set = do not switch away); see the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    Unhandled,
}

impl Outcome {
    pub fn is_handled(self) -> bool {
        self == Outcome::Handled
    }
}

/// Handler for one function: reads/writes the snapshot, may consult or
/// mutate the per-device context.
pub type VddHandler = fn(&mut DeviceContext, &mut ClientRegs) -> Outcome;

/// One dispatch-table entry. The name is debug-only; the function number is
/// the identity.
#[derive(Debug, Clone, Copy)]
pub struct CallDescriptor {
    pub function: VddFunction,
    pub name: &'static str,
    pub handler: VddHandler,
}

/// Function-number-indexed handler table.
pub struct DispatchTable {
    entries: [Option<CallDescriptor>; DISPATCH_TABLE_LEN],
}

impl DispatchTable {
    /// An empty table. Useful as a base when composing a custom function
    /// set; most callers want [`DispatchTable::standard`].
    pub fn empty() -> Self {
        Self {
            entries: [None; DISPATCH_TABLE_LEN],
        }
    }

    /// The standard table: every function this driver implements.
    pub fn standard() -> Self {
        use crate::handlers;

        let mut table = Self::empty();
        for desc in handlers::STANDARD_CALLS {
            table.register(*desc);
        }
        table
    }

    /// Adds a descriptor. Function numbers are wire identity, so a
    /// duplicate registration is a build-time bug.
    pub fn register(&mut self, desc: CallDescriptor) {
        let idx = usize::from(desc.function.number());
        assert!(
            self.entries[idx].is_none(),
            "duplicate mini-VDD function {:#04x} ({})",
            desc.function.number(),
            desc.name
        );
        self.entries[idx] = Some(desc);
    }

    pub fn descriptor(&self, function: u8) -> Option<&CallDescriptor> {
        self.entries[usize::from(function)].as_ref()
    }

    /// Looks up and invokes the handler for `function`.
    ///
    /// A number with no descriptor is a no-op reporting [`Outcome::Unhandled`]
    /// with the snapshot untouched; the monitor then uses its own fallback
    /// (typically a real-mode BIOS call).
    pub fn dispatch(
        &self,
        function: u8,
        ctx: &mut DeviceContext,
        regs: &mut ClientRegs,
    ) -> Outcome {
        let Some(desc) = self.descriptor(function) else {
            trace!(function, "no handler; deferring to the host monitor");
            return Outcome::Unhandled;
        };
        let outcome = (desc.handler)(ctx, regs);
        trace!(function = desc.name, ?outcome, "dispatched");
        outcome
    }
}
