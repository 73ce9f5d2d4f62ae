#![forbid(unsafe_code)]

//! Virtual graphics adapter register surface.
//!
//! The mini-VDD core never touches the display hardware directly; everything
//! it learns about the adapter (identity, VRAM capacity, current banking
//! state) and everything it programs into it (banks, proprietary modes) goes
//! through the 32-bit register file modeled here. The emulated
//! [`SvgaDevice`] follows the Bochs "DISPI" flavour of this interface: a
//! bank-switched framebuffer behind the legacy `A000:0` window, with the
//! bank-select registers reached through the `0x01CE`/`0x01CF` index/data
//! port pair.

use std::cell::RefCell;
use std::rc::Rc;

/// Bochs VBE ("VBE_DISPI") index register port.
pub const VBE_DISPI_INDEX_PORT: u16 = 0x01CE;
/// Bochs VBE ("VBE_DISPI") data register port.
pub const VBE_DISPI_DATA_PORT: u16 = 0x01CF;

/// Adapter identification value reported through [`AdapterReg::Id`].
pub const SVGA_ADAPTER_ID: u32 = 0xB0C5;

/// Default VRAM allocation (16MiB), enough for common VESA modes.
pub const DEFAULT_VRAM_SIZE: u32 = 16 * 1024 * 1024;

/// Bank granularity of the legacy banked window (64KiB at `A000:0`).
pub const DEFAULT_BANK_SIZE: u32 = 64 * 1024;

/// Typed identifiers for the adapter's 32-bit register file.
///
/// Register width on the wire is always 32 bits; registers narrower in
/// hardware (bank indices, mode numbers) are zero-extended on read and
/// truncated on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterReg {
    /// Adapter identification magic ([`SVGA_ADAPTER_ID`] for this model).
    Id,
    /// PCI vendor identifier.
    VendorId,
    /// PCI device identifier.
    DeviceId,
    /// Total addressable video memory in bytes.
    VramSize,
    /// Size in bytes of one bank of the banked window.
    BankSize,
    /// Currently selected read bank.
    ReadBank,
    /// Currently selected write bank.
    WriteBank,
    /// Current display mode number.
    Mode,
    /// Physical base of the memory aperture, or zero for the standard
    /// fixed window at `A000:0`.
    ApertureBase,
}

/// Register-level view of the virtual graphics adapter.
///
/// All queries are gated on [`AdapterRegisters::is_initialized`]: until the
/// adapter has completed initialization, register contents are unreliable
/// and callers are expected to defer rather than consume stale values.
pub trait AdapterRegisters {
    fn is_initialized(&self) -> bool;

    fn read_register(&self, reg: AdapterReg) -> u32;

    fn write_register(&mut self, reg: AdapterReg, value: u32);
}

/// Emulated SVGA adapter.
///
/// Identity and geometry registers are fixed at construction; only the bank
/// selects and the mode number are guest-programmable. Mode programming
/// deliberately leaves VRAM contents alone — the host may be mid-restore
/// when a mode is set, and a screen clear at that point would corrupt the
/// image being restored.
#[derive(Debug, Clone)]
pub struct SvgaDevice {
    vendor_id: u16,
    device_id: u16,
    vram: Vec<u8>,
    bank_size: u32,
    aperture_base: u32,
    read_bank: u16,
    write_bank: u16,
    mode: u16,
    initialized: bool,
}

impl SvgaDevice {
    /// Creates an initialized adapter with the default 16MiB VRAM and the
    /// legacy `A000:0` banked aperture.
    pub fn new(vendor_id: u16, device_id: u16) -> Self {
        Self::with_vram_size(vendor_id, device_id, DEFAULT_VRAM_SIZE)
    }

    pub fn with_vram_size(vendor_id: u16, device_id: u16, vram_size: u32) -> Self {
        Self {
            vendor_id,
            device_id,
            vram: vec![0; vram_size as usize],
            bank_size: DEFAULT_BANK_SIZE,
            aperture_base: 0,
            read_bank: 0,
            write_bank: 0,
            // VGA text mode 80x25.
            mode: 0x03,
            initialized: true,
        }
    }

    /// An adapter whose initialization failed. Every register reads as zero
    /// and [`AdapterRegisters::is_initialized`] stays false, so consumers
    /// exercise their deferral paths.
    pub fn uninitialized() -> Self {
        Self {
            vendor_id: 0,
            device_id: 0,
            vram: Vec::new(),
            bank_size: 0,
            aperture_base: 0,
            read_bank: 0,
            write_bank: 0,
            mode: 0,
            initialized: false,
        }
    }

    /// Exposes a VESA-2-style linear aperture at `base` instead of the
    /// standard `A000:0` window.
    pub fn with_linear_aperture(mut self, base: u32) -> Self {
        self.aperture_base = base;
        self
    }

    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    pub fn vram_mut(&mut self) -> &mut [u8] {
        &mut self.vram
    }

    /// Byte offset into VRAM where the given bank's window begins.
    pub fn bank_offset(&self, bank: u16) -> usize {
        bank as usize * self.bank_size as usize
    }
}

impl AdapterRegisters for SvgaDevice {
    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn read_register(&self, reg: AdapterReg) -> u32 {
        if !self.initialized {
            return 0;
        }
        match reg {
            AdapterReg::Id => SVGA_ADAPTER_ID,
            AdapterReg::VendorId => u32::from(self.vendor_id),
            AdapterReg::DeviceId => u32::from(self.device_id),
            AdapterReg::VramSize => self.vram.len() as u32,
            AdapterReg::BankSize => self.bank_size,
            AdapterReg::ReadBank => u32::from(self.read_bank),
            AdapterReg::WriteBank => u32::from(self.write_bank),
            AdapterReg::Mode => u32::from(self.mode),
            AdapterReg::ApertureBase => self.aperture_base,
        }
    }

    fn write_register(&mut self, reg: AdapterReg, value: u32) {
        if !self.initialized {
            return;
        }
        match reg {
            AdapterReg::ReadBank => self.read_bank = value as u16,
            AdapterReg::WriteBank => self.write_bank = value as u16,
            // Mode programming must not disturb VRAM contents.
            AdapterReg::Mode => self.mode = value as u16,
            // Identity and geometry are hardwired.
            _ => {}
        }
    }
}

/// Shared-handle form mirroring the platform crate's trap controller: a test
/// harness keeps a cloneable view while the mini-VDD owns the adapter as a
/// `Box<dyn AdapterRegisters>`.
impl AdapterRegisters for Rc<RefCell<SvgaDevice>> {
    fn is_initialized(&self) -> bool {
        self.borrow().is_initialized()
    }

    fn read_register(&self, reg: AdapterReg) -> u32 {
        self.borrow().read_register(reg)
    }

    fn write_register(&mut self, reg: AdapterReg, value: u32) {
        self.borrow_mut().write_register(reg, value);
    }
}
