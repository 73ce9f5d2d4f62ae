//! Handlers for the standard mini-VDD function set.
//!
//! Register contracts follow the display-driver protocol: inputs and
//! outputs are named client registers, everything else must be preserved.
//! The carry-flag meaning of each handler's [`Outcome`] is documented per
//! function; see [`crate::dispatch::Outcome`] for the general convention.

use minivdd_svga::AdapterReg;
use tracing::{debug, trace};

use crate::dispatch::{CallDescriptor, Outcome, VddFunction};
use crate::regs::ClientRegs;
use crate::state::{compose_chip_id, DisplayMode, ModeClass, VBE_FUNCTION_SET_MODE};
use crate::DeviceContext;

/// Descriptors for every function this driver implements, in wire order.
pub(crate) const STANDARD_CALLS: &[CallDescriptor] = &[
    CallDescriptor {
        function: VddFunction::RegisterDisplayDriver,
        name: "REGISTER_DISPLAY_DRIVER",
        handler: register_display_driver,
    },
    CallDescriptor {
        function: VddFunction::PreHiresToVga,
        name: "PRE_HIRES_TO_VGA",
        handler: pre_hires_transition,
    },
    CallDescriptor {
        function: VddFunction::PostHiresToVga,
        name: "POST_HIRES_TO_VGA",
        handler: post_hires_to_vga,
    },
    CallDescriptor {
        function: VddFunction::EnableTraps,
        name: "ENABLE_TRAPS",
        handler: enable_traps,
    },
    CallDescriptor {
        function: VddFunction::DisplayDriverDisabling,
        name: "DISPLAY_DRIVER_DISABLING",
        handler: display_driver_disabling,
    },
    CallDescriptor {
        function: VddFunction::GetCurrentBankWrite,
        name: "GET_CURRENT_BANK_WRITE",
        handler: get_current_bank_write,
    },
    CallDescriptor {
        function: VddFunction::GetCurrentBankRead,
        name: "GET_CURRENT_BANK_READ",
        handler: get_current_bank_read,
    },
    CallDescriptor {
        function: VddFunction::SetBank,
        name: "SET_BANK",
        handler: set_bank,
    },
    CallDescriptor {
        function: VddFunction::GetTotalVramSize,
        name: "GET_TOTAL_VRAM_SIZE",
        handler: get_total_vram_size,
    },
    CallDescriptor {
        function: VddFunction::GetBankSize,
        name: "GET_BANK_SIZE",
        handler: get_bank_size,
    },
    CallDescriptor {
        function: VddFunction::SetHiresMode,
        name: "SET_HIRES_MODE",
        handler: set_hires_mode,
    },
    CallDescriptor {
        function: VddFunction::PreHiresSaveRestore,
        name: "PRE_HIRES_SAVE_RESTORE",
        handler: pre_hires_transition,
    },
    CallDescriptor {
        function: VddFunction::PostHiresSaveRestore,
        name: "POST_HIRES_SAVE_RESTORE",
        handler: post_hires_save_restore,
    },
    CallDescriptor {
        function: VddFunction::VesaSupport,
        name: "VESA_SUPPORT",
        handler: vesa_support,
    },
    CallDescriptor {
        function: VddFunction::GetChipId,
        name: "GET_CHIP_ID",
        handler: get_chip_id,
    },
    CallDescriptor {
        function: VddFunction::CheckScreenSwitchOk,
        name: "CHECK_SCREEN_SWITCH_OK",
        handler: check_screen_switch_ok,
    },
    CallDescriptor {
        function: VddFunction::VesaCallPostProcessing,
        name: "VESA_CALL_POST_PROCESSING",
        handler: vesa_call_post_processing,
    },
];

/// Function 0. Display-driver registration is negotiated between the
/// display driver and the monitor directly; this driver passes it through.
pub fn register_display_driver(_ctx: &mut DeviceContext, _regs: &mut ClientRegs) -> Outcome {
    Outcome::Unhandled
}

/// Functions 4 and 39. Runs immediately before the monitor performs a mode
/// change in either direction: the about-to-run hi-res session needs
/// unmediated access to the bank-select hardware, so trapping on both ports
/// is released here and reclaimed by the matching post hook.
pub fn pre_hires_transition(ctx: &mut DeviceContext, _regs: &mut ClientRegs) -> Outcome {
    ctx.release_bank_ports();
    Outcome::Handled
}

/// Function 5. Runs after the monitor has switched back to a VGA mode:
/// reclaims the bank-select ports and leaves the hi-res mode class.
pub fn post_hires_to_vga(ctx: &mut DeviceContext, _regs: &mut ClientRegs) -> Outcome {
    ctx.reclaim_bank_ports();
    ctx.display.enter_standard_vga();
    Outcome::Handled
}

/// Function 40. Runs after the monitor has restored a hi-res screen:
/// reclaims the bank-select ports. The resulting mode class was already
/// adopted by the bracketed mode set (function 38, or the host VESA path
/// observed through function 47).
pub fn post_hires_save_restore(ctx: &mut DeviceContext, _regs: &mut ClientRegs) -> Outcome {
    ctx.reclaim_bank_ports();
    Outcome::Handled
}

/// Function 13. Explicit re-enable of trapping on both bank-select ports.
pub fn enable_traps(ctx: &mut DeviceContext, _regs: &mut ClientRegs) -> Outcome {
    ctx.reclaim_bank_ports();
    Outcome::Handled
}

/// Function 26. The display driver is shutting down and owns the hardware
/// until it is gone; trapping on both bank-select ports is released.
pub fn display_driver_disabling(ctx: &mut DeviceContext, _regs: &mut ClientRegs) -> Outcome {
    ctx.release_bank_ports();
    Outcome::Handled
}

/// Function 32. `EDX` ← current write bank as set in hardware.
///
/// Carry set means the value is authoritative; carry clear tells the
/// monitor to issue VESA function 4F05h itself. Invoked when the user
/// switches focus away from a hi-res application, so a wrong answer here
/// breaks the later restore.
pub fn get_current_bank_write(ctx: &mut DeviceContext, regs: &mut ClientRegs) -> Outcome {
    let Some(bank) = ctx.hardware_bank(AdapterReg::WriteBank) else {
        return Outcome::Unhandled;
    };
    regs.edx = bank;
    Outcome::Handled
}

/// Function 33. `EDX` ← current read bank; otherwise as function 32.
pub fn get_current_bank_read(ctx: &mut DeviceContext, regs: &mut ClientRegs) -> Outcome {
    let Some(bank) = ctx.hardware_bank(AdapterReg::ReadBank) else {
        return Outcome::Unhandled;
    };
    regs.edx = bank;
    Outcome::Handled
}

/// Function 34. Programs the read bank (`EAX`) and write bank (`EDX`) into
/// hardware. Dispatch serialization makes the two register writes atomic
/// with respect to the calling context.
pub fn set_bank(ctx: &mut DeviceContext, regs: &mut ClientRegs) -> Outcome {
    if !ctx.adapter.is_initialized() {
        return Outcome::Unhandled;
    }
    let (read, write) = (regs.eax, regs.edx);
    ctx.adapter.write_register(AdapterReg::ReadBank, read);
    ctx.adapter.write_register(AdapterReg::WriteBank, write);
    ctx.display.read_bank = read;
    ctx.display.write_bank = write;
    trace!(read, write, "programmed bank selects");
    Outcome::Handled
}

/// Function 36. `ECX` ← total VRAM size in bytes.
///
/// Hi-res applications address the card's entire memory regardless of the
/// visible screen size, so the monitor saves all of it. Answering here
/// spares the monitor a slow VESA function 4F00h round trip; if the
/// adapter has not finished initialization the call defers instead of
/// reporting a stale zero as authoritative.
pub fn get_total_vram_size(ctx: &mut DeviceContext, regs: &mut ClientRegs) -> Outcome {
    if !ctx.adapter.is_initialized() {
        regs.ecx = 0;
        return Outcome::Unhandled;
    }
    regs.ecx = ctx.adapter.read_register(AdapterReg::VramSize);
    Outcome::Handled
}

/// Function 37. `EDX` ← per-bank byte size, `EAX` ← physical aperture base
/// (zero for the standard window at `A000:0`, an explicit address for a
/// VESA-2-style linear aperture). `ECX` carries the running VESA mode
/// number on entry; this adapter's bank geometry does not depend on it.
pub fn get_bank_size(ctx: &mut DeviceContext, regs: &mut ClientRegs) -> Outcome {
    if !ctx.adapter.is_initialized() {
        return Outcome::Unhandled;
    }
    regs.edx = ctx.adapter.read_register(AdapterReg::BankSize);
    regs.eax = ctx.adapter.read_register(AdapterReg::ApertureBase);
    Outcome::Handled
}

/// Function 38. `EAX` ← hi-res mode number to set.
///
/// Standard VESA (and VGA) mode numbers defer to the monitor's generic
/// mode-set path. A proprietary mode is programmed directly; the adapter
/// contract guarantees the mode set does not clear VRAM, because the
/// monitor may be mid-restore.
pub fn set_hires_mode(ctx: &mut DeviceContext, regs: &mut ClientRegs) -> Outcome {
    let mode = regs.eax as u16;
    if ModeClass::of(mode) != ModeClass::Proprietary {
        return Outcome::Unhandled;
    }
    if !ctx.adapter.is_initialized() {
        return Outcome::Unhandled;
    }
    ctx.adapter.write_register(AdapterReg::Mode, u32::from(mode));
    ctx.display.mode = DisplayMode::HiresProprietary;
    debug!(mode = format_args!("{mode:#05x}"), "programmed proprietary hi-res mode");
    Outcome::Handled
}

/// Function 41. The full-VESA interception point: a driver may service the
/// guest's entire VESA call at ring 0 and report handled. This baseline
/// always defers to the monitor's VESA BIOS path.
pub fn vesa_support(_ctx: &mut DeviceContext, regs: &mut ClientRegs) -> Outcome {
    trace!(
        vesa_function = format_args!("{:#06x}", regs.ax()),
        "deferring VESA call to the BIOS path"
    );
    Outcome::Unhandled
}

/// Function 42. `EAX` ← chip identifier (vendor id in the upper half), or
/// zero when the adapter failed to initialize. The monitor compares this
/// against the value stored at first detection and reports a
/// configuration-change error on mismatch.
pub fn get_chip_id(ctx: &mut DeviceContext, regs: &mut ClientRegs) -> Outcome {
    if !ctx.adapter.is_initialized() {
        regs.eax = 0;
        return Outcome::Unhandled;
    }
    regs.eax = compose_chip_id(
        ctx.adapter.read_register(AdapterReg::VendorId),
        ctx.adapter.read_register(AdapterReg::DeviceId),
    );
    Outcome::Handled
}

/// Function 43. `EAX` = -1 when the guest is running in a known VESA mode,
/// with the mode number in `ECX`.
///
/// Carry polarity on this function is not "handled": carry set means the
/// hi-res application must not be switched away from (the monitor beeps at
/// the user instead of corrupting an unrestorable screen); carry clear
/// means switching is safe because the mode is restorable by the generic
/// save/restore machinery.
pub fn check_screen_switch_ok(ctx: &mut DeviceContext, regs: &mut ClientRegs) -> Outcome {
    let blocked = if regs.eax == u32::MAX {
        ModeClass::of(regs.ecx as u16) == ModeClass::Proprietary
    } else {
        ctx.display.mode == DisplayMode::HiresProprietary
    };
    if blocked {
        debug!("screen switch blocked: current mode is not restorable");
        Outcome::Handled
    } else {
        Outcome::Unhandled
    }
}

/// Function 47. Invoked after every VESA BIOS call the guest makes; `EDX`'s
/// low word is the VESA function code, and on a completed mode set (4F02h)
/// the high word is the new mode number. Purely reactive: re-synchronizes
/// the tracked mode class, never initiates a transition of its own.
pub fn vesa_call_post_processing(ctx: &mut DeviceContext, regs: &mut ClientRegs) -> Outcome {
    let function = regs.edx as u16;
    if function == VBE_FUNCTION_SET_MODE {
        let mode = (regs.edx >> 16) as u16;
        ctx.display.adopt_mode(mode);
    }
    Outcome::Handled
}
