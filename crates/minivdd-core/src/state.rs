//! Display mode and banking state tracked across dispatched calls.

use minivdd_svga::{AdapterReg, AdapterRegisters};
use tracing::debug;

/// VESA function code for a mode-set call (`AX = 4F02h`).
pub const VBE_FUNCTION_SET_MODE: u16 = 0x4F02;

/// VBE mode-number flag: request a linear framebuffer (bit 14).
pub const VBE_MODE_LINEAR_FB: u16 = 1 << 14;
/// VBE mode-number flag: do not clear display memory on mode set (bit 15).
pub const VBE_MODE_DONT_CLEAR: u16 = 1 << 15;

/// How the host's generic save/restore machinery relates to a mode number.
///
/// Standard VGA and standard VESA modes can be saved and restored by the
/// host without any card-specific knowledge; anything else needs this
/// driver's help (or cannot be restored at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeClass {
    StandardVga,
    StandardVesa,
    Proprietary,
}

impl ModeClass {
    /// Classifies a raw mode number, ignoring the VBE flag bits a guest may
    /// have OR'ed into it.
    pub fn of(mode: u16) -> Self {
        let mode = mode & !(VBE_MODE_LINEAR_FB | VBE_MODE_DONT_CLEAR);
        match mode {
            // BIOS text and graphics modes, 00h..=13h.
            0x00..=0x13 => ModeClass::StandardVga,
            // VESA-defined mode numbers, 100h..=11Bh.
            0x100..=0x11B => ModeClass::StandardVesa,
            _ => ModeClass::Proprietary,
        }
    }
}

/// Current mode class of the virtual display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    StandardVga,
    HiresVesa,
    HiresProprietary,
}

/// Per-device display state, initialized once at device-attach time and
/// mutated only by dispatched calls.
///
/// Bank indices are meaningful only in the hi-res classes; entering
/// `StandardVga` zeroes them. `vram_size` and `chip_id` are device
/// properties captured at attach and survive [`DisplayState::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayState {
    pub mode: DisplayMode,
    pub read_bank: u32,
    pub write_bank: u32,
    pub vram_size: u32,
    pub chip_id: u32,
}

impl DisplayState {
    /// Captures the attach-time view of the adapter. An uninitialized
    /// adapter yields an all-zero state in `StandardVga`.
    pub fn from_adapter(adapter: &dyn AdapterRegisters) -> Self {
        if !adapter.is_initialized() {
            return Self::default();
        }
        let mut state = Self {
            mode: DisplayMode::StandardVga,
            read_bank: adapter.read_register(AdapterReg::ReadBank),
            write_bank: adapter.read_register(AdapterReg::WriteBank),
            vram_size: adapter.read_register(AdapterReg::VramSize),
            chip_id: compose_chip_id(
                adapter.read_register(AdapterReg::VendorId),
                adapter.read_register(AdapterReg::DeviceId),
            ),
        };
        state.adopt_mode(adapter.read_register(AdapterReg::Mode) as u16);
        state
    }

    /// Re-synchronizes the mode class after a mode change the host (or the
    /// guest's VESA BIOS call) performed.
    pub fn adopt_mode(&mut self, mode: u16) {
        let next = match ModeClass::of(mode) {
            ModeClass::StandardVga => DisplayMode::StandardVga,
            ModeClass::StandardVesa => DisplayMode::HiresVesa,
            ModeClass::Proprietary => DisplayMode::HiresProprietary,
        };
        if next != self.mode {
            debug!(mode = format_args!("{mode:#05x}"), ?next, "display mode class changed");
        }
        if next == DisplayMode::StandardVga {
            self.enter_standard_vga();
        } else {
            self.mode = next;
        }
    }

    /// Leaves any hi-res class. Bank selects carry no meaning in standard
    /// VGA, so they are cleared rather than left stale.
    pub fn enter_standard_vga(&mut self) {
        self.mode = DisplayMode::StandardVga;
        self.read_bank = 0;
        self.write_bank = 0;
    }

    /// Reset after abnormal VM termination: no save/restore ran, so display
    /// contents are abandoned and only the device identity survives.
    pub fn reset(&mut self) {
        self.enter_standard_vga();
    }
}

/// Chip identifier as reported to the host's Plug & Play check: vendor
/// identifier in the upper half, device identifier in the lower.
pub fn compose_chip_id(vendor_id: u32, device_id: u32) -> u32 {
    (vendor_id << 16) | (device_id & 0xFFFF)
}
