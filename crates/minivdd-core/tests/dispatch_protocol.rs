//! End-to-end tests of the call protocol: dispatch by wire function number
//! against an emulated adapter and a real trap controller.

use std::cell::RefCell;
use std::rc::Rc;

use minivdd_core::{ClientRegs, DisplayMode, MiniVdd, VddFunction};
use minivdd_platform::TrapController;
use minivdd_svga::{
    AdapterReg, AdapterRegisters, SvgaDevice, DEFAULT_BANK_SIZE, VBE_DISPI_DATA_PORT,
    VBE_DISPI_INDEX_PORT,
};

type Shared<T> = Rc<RefCell<T>>;

/// Attaches a device and keeps shared handles so tests can observe the
/// adapter and the trap controller from outside.
fn attach(dev: SvgaDevice) -> (MiniVdd, Shared<SvgaDevice>, Shared<TrapController>) {
    let adapter = Rc::new(RefCell::new(dev));
    let traps = Rc::new(RefCell::new(TrapController::new()));
    let vdd = MiniVdd::new(Box::new(adapter.clone()), Box::new(traps.clone()));
    (vdd, adapter, traps)
}

fn bank_ports_trapped(traps: &Shared<TrapController>) -> (bool, bool) {
    let traps = traps.borrow();
    (
        traps.is_trapped(VBE_DISPI_INDEX_PORT),
        traps.is_trapped(VBE_DISPI_DATA_PORT),
    )
}

#[test]
fn unknown_function_numbers_defer_and_leave_the_snapshot_untouched() {
    let (mut vdd, _, _) = attach(SvgaDevice::new(0x15AD, 0x0405));

    // Neighbors of implemented functions and a few arbitrary holes.
    for function in [1u8, 3, 6, 14, 27, 35, 44, 48, 0x80, 0xFF] {
        let mut regs = ClientRegs::new();
        regs.eax = 0xDEAD_BEEF;
        regs.ecx = 0x0101;
        regs.edx = 0x1234_5678;
        let before = regs.clone();

        assert!(!vdd.dispatch(function, &mut regs), "function {function}");
        assert_eq!(regs, before, "function {function}");
    }
}

#[test]
fn register_display_driver_is_a_pass_through() {
    let (mut vdd, _, _) = attach(SvgaDevice::new(0x15AD, 0x0405));
    let mut regs = ClientRegs::new();
    let before = regs.clone();
    assert!(!vdd.dispatch(VddFunction::RegisterDisplayDriver.number(), &mut regs));
    assert_eq!(regs, before);
}

#[test]
fn set_bank_round_trips_through_the_bank_queries() {
    let (mut vdd, _, _) = attach(SvgaDevice::new(0x15AD, 0x0405));

    let mut regs = ClientRegs::new();
    regs.eax = 2; // read bank
    regs.edx = 5; // write bank
    assert!(vdd.dispatch(VddFunction::SetBank.number(), &mut regs));

    let mut regs = ClientRegs::new();
    assert!(vdd.dispatch(VddFunction::GetCurrentBankWrite.number(), &mut regs));
    assert_eq!(regs.edx, 5);

    let mut regs = ClientRegs::new();
    assert!(vdd.dispatch(VddFunction::GetCurrentBankRead.number(), &mut regs));
    assert_eq!(regs.edx, 2);

    assert_eq!(vdd.display().read_bank, 2);
    assert_eq!(vdd.display().write_bank, 5);
}

#[test]
fn bank_calls_defer_while_the_adapter_is_uninitialized() {
    let (mut vdd, _, _) = attach(SvgaDevice::uninitialized());

    let mut regs = ClientRegs::new();
    assert!(!vdd.dispatch(VddFunction::GetCurrentBankWrite.number(), &mut regs));
    assert!(!vdd.dispatch(VddFunction::GetCurrentBankRead.number(), &mut regs));

    regs.eax = 1;
    regs.edx = 1;
    assert!(!vdd.dispatch(VddFunction::SetBank.number(), &mut regs));
}

#[test]
fn hires_to_vga_bracket_round_trips_trap_ownership() {
    let (mut vdd, _, traps) = attach(SvgaDevice::new(0x15AD, 0x0405));
    let before = bank_ports_trapped(&traps);
    assert_eq!(before, (true, true));

    let mut regs = ClientRegs::new();
    assert!(vdd.dispatch(VddFunction::PreHiresToVga.number(), &mut regs));
    assert_eq!(bank_ports_trapped(&traps), (false, false));

    assert!(vdd.dispatch(VddFunction::PostHiresToVga.number(), &mut regs));
    assert_eq!(bank_ports_trapped(&traps), before);
    assert_eq!(vdd.display().mode, DisplayMode::StandardVga);
}

#[test]
fn save_restore_bracket_round_trips_trap_ownership() {
    let (mut vdd, _, traps) = attach(SvgaDevice::new(0x15AD, 0x0405));
    let before = bank_ports_trapped(&traps);

    let mut regs = ClientRegs::new();
    assert!(vdd.dispatch(VddFunction::PreHiresSaveRestore.number(), &mut regs));
    assert_eq!(bank_ports_trapped(&traps), (false, false));

    assert!(vdd.dispatch(VddFunction::PostHiresSaveRestore.number(), &mut regs));
    assert_eq!(bank_ports_trapped(&traps), before);
}

#[test]
fn explicit_trap_calls_toggle_both_ports_and_are_idempotent() {
    let (mut vdd, _, traps) = attach(SvgaDevice::new(0x15AD, 0x0405));
    let mut regs = ClientRegs::new();

    assert!(vdd.dispatch(VddFunction::DisplayDriverDisabling.number(), &mut regs));
    assert_eq!(bank_ports_trapped(&traps), (false, false));
    assert!(vdd.dispatch(VddFunction::DisplayDriverDisabling.number(), &mut regs));
    assert_eq!(bank_ports_trapped(&traps), (false, false));

    assert!(vdd.dispatch(VddFunction::EnableTraps.number(), &mut regs));
    assert_eq!(bank_ports_trapped(&traps), (true, true));
    assert!(vdd.dispatch(VddFunction::EnableTraps.number(), &mut regs));
    assert_eq!(bank_ports_trapped(&traps), (true, true));
}

#[test]
fn reset_restores_trapping_even_mid_bracket() {
    let (mut vdd, _, traps) = attach(SvgaDevice::new(0x15AD, 0x0405));
    let mut regs = ClientRegs::new();

    // A pre hook with no matching post hook: the VM died abnormally.
    assert!(vdd.dispatch(VddFunction::PreHiresSaveRestore.number(), &mut regs));
    regs.eax = 0x1AD;
    assert!(vdd.dispatch(VddFunction::SetHiresMode.number(), &mut regs));
    assert_eq!(bank_ports_trapped(&traps), (false, false));

    vdd.reset();
    assert_eq!(bank_ports_trapped(&traps), (true, true));
    assert_eq!(vdd.display().mode, DisplayMode::StandardVga);
    assert_eq!(vdd.display().read_bank, 0);
    assert_eq!(vdd.display().write_bank, 0);
}

#[test]
fn screen_switch_is_safe_for_standard_modes_only() {
    let (mut vdd, _, _) = attach(SvgaDevice::new(0x15AD, 0x0405));

    // Guest reports a known VESA mode in ECX; EAX = -1.
    for mode in [0x03u32, 0x13, 0x101, 0x11B] {
        let mut regs = ClientRegs::new();
        regs.eax = u32::MAX;
        regs.ecx = mode;
        assert!(
            !vdd.dispatch(VddFunction::CheckScreenSwitchOk.number(), &mut regs),
            "mode {mode:#x} should be safe to switch away from"
        );
    }

    let mut regs = ClientRegs::new();
    regs.eax = u32::MAX;
    regs.ecx = 0x1AD;
    assert!(
        vdd.dispatch(VddFunction::CheckScreenSwitchOk.number(), &mut regs),
        "proprietary modes cannot be restored by the generic path"
    );
}

#[test]
fn screen_switch_falls_back_to_tracked_state_when_no_mode_is_reported() {
    let (mut vdd, _, _) = attach(SvgaDevice::new(0x15AD, 0x0405));

    let mut regs = ClientRegs::new();
    assert!(!vdd.dispatch(VddFunction::CheckScreenSwitchOk.number(), &mut regs));

    // Enter a proprietary mode, then ask again without a mode number.
    let mut regs = ClientRegs::new();
    regs.eax = 0x1AD;
    assert!(vdd.dispatch(VddFunction::SetHiresMode.number(), &mut regs));

    let mut regs = ClientRegs::new();
    assert!(vdd.dispatch(VddFunction::CheckScreenSwitchOk.number(), &mut regs));
}

#[test]
fn total_vram_size_defers_until_the_adapter_is_initialized() {
    let (mut vdd, _, _) = attach(SvgaDevice::uninitialized());
    let mut regs = ClientRegs::new();
    regs.ecx = 0xFFFF_FFFF;
    assert!(!vdd.dispatch(VddFunction::GetTotalVramSize.number(), &mut regs));
    assert_eq!(regs.ecx, 0);

    let (mut vdd, _, _) = attach(SvgaDevice::with_vram_size(0x15AD, 0x0405, 16_777_216));
    let mut regs = ClientRegs::new();
    assert!(vdd.dispatch(VddFunction::GetTotalVramSize.number(), &mut regs));
    assert_eq!(regs.ecx, 16_777_216);
}

#[test]
fn bank_size_reports_geometry_and_aperture() {
    let (mut vdd, _, _) = attach(SvgaDevice::new(0x15AD, 0x0405));
    let mut regs = ClientRegs::new();
    regs.ecx = 0x101; // current VESA mode number (input only)
    assert!(vdd.dispatch(VddFunction::GetBankSize.number(), &mut regs));
    assert_eq!(regs.edx, DEFAULT_BANK_SIZE);
    // Zero aperture = the standard window at A000:0.
    assert_eq!(regs.eax, 0);

    let (mut vdd, _, _) =
        attach(SvgaDevice::new(0x15AD, 0x0405).with_linear_aperture(0xE000_0000));
    let mut regs = ClientRegs::new();
    assert!(vdd.dispatch(VddFunction::GetBankSize.number(), &mut regs));
    assert_eq!(regs.eax, 0xE000_0000);

    let (mut vdd, _, _) = attach(SvgaDevice::uninitialized());
    let mut regs = ClientRegs::new();
    assert!(!vdd.dispatch(VddFunction::GetBankSize.number(), &mut regs));
}

#[test]
fn set_hires_mode_defers_standard_modes_regardless_of_prior_state() {
    let (mut vdd, _, _) = attach(SvgaDevice::new(0x15AD, 0x0405));

    let mut regs = ClientRegs::new();
    regs.eax = 0x101;
    assert!(!vdd.dispatch(VddFunction::SetHiresMode.number(), &mut regs));

    // Still deferred after entering a proprietary mode.
    let mut regs = ClientRegs::new();
    regs.eax = 0x1AD;
    assert!(vdd.dispatch(VddFunction::SetHiresMode.number(), &mut regs));
    let mut regs = ClientRegs::new();
    regs.eax = 0x101;
    assert!(!vdd.dispatch(VddFunction::SetHiresMode.number(), &mut regs));
}

#[test]
fn proprietary_mode_set_programs_hardware_without_touching_vram() {
    let (mut vdd, adapter, _) = attach(SvgaDevice::with_vram_size(
        0x15AD,
        0x0405,
        4 * DEFAULT_BANK_SIZE,
    ));
    for (i, byte) in adapter.borrow_mut().vram_mut().iter_mut().enumerate() {
        *byte = (i % 253) as u8;
    }
    let before = adapter.borrow().vram().to_vec();

    let mut regs = ClientRegs::new();
    regs.eax = 0x1AD;
    assert!(vdd.dispatch(VddFunction::SetHiresMode.number(), &mut regs));

    assert_eq!(adapter.borrow().read_register(AdapterReg::Mode), 0x1AD);
    assert_eq!(adapter.borrow().vram(), &before[..]);
    assert_eq!(vdd.display().mode, DisplayMode::HiresProprietary);
}

#[test]
fn chip_id_composes_vendor_and_device_identifiers() {
    let (mut vdd, _, _) = attach(SvgaDevice::new(0x15AD, 0x0405));
    let mut regs = ClientRegs::new();
    assert!(vdd.dispatch(VddFunction::GetChipId.number(), &mut regs));
    assert_eq!(regs.eax, 0x15AD_0405);

    let (mut vdd, _, _) = attach(SvgaDevice::uninitialized());
    let mut regs = ClientRegs::new();
    regs.eax = 0xFFFF_FFFF;
    assert!(!vdd.dispatch(VddFunction::GetChipId.number(), &mut regs));
    assert_eq!(regs.eax, 0);
}

#[test]
fn vesa_support_defers_in_the_baseline() {
    let (mut vdd, _, _) = attach(SvgaDevice::new(0x15AD, 0x0405));
    let mut regs = ClientRegs::new();
    regs.set_ax(0x4F00);
    let before = regs.clone();
    assert!(!vdd.dispatch(VddFunction::VesaSupport.number(), &mut regs));
    assert_eq!(regs, before);
}

#[test]
fn vesa_post_processing_adopts_the_mode_from_a_completed_mode_set() {
    let (mut vdd, _, _) = attach(SvgaDevice::new(0x15AD, 0x0405));

    // 4F02 with a standard VESA mode in the high word.
    let mut regs = ClientRegs::new();
    regs.edx = (0x101 << 16) | 0x4F02;
    assert!(vdd.dispatch(VddFunction::VesaCallPostProcessing.number(), &mut regs));
    assert_eq!(vdd.display().mode, DisplayMode::HiresVesa);

    // Back to a VGA mode; bank selects lose meaning.
    vdd.context_mut().display.read_bank = 3;
    let mut regs = ClientRegs::new();
    regs.edx = (0x03 << 16) | 0x4F02;
    assert!(vdd.dispatch(VddFunction::VesaCallPostProcessing.number(), &mut regs));
    assert_eq!(vdd.display().mode, DisplayMode::StandardVga);
    assert_eq!(vdd.display().read_bank, 0);

    // Any other VESA function leaves the mode class alone.
    let mut regs = ClientRegs::new();
    regs.edx = (0x7777 << 16) | 0x4F01;
    assert!(vdd.dispatch(VddFunction::VesaCallPostProcessing.number(), &mut regs));
    assert_eq!(vdd.display().mode, DisplayMode::StandardVga);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn any_unknown_function_is_a_no_op(
            function in any::<u8>(),
            eax in any::<u32>(),
            ebx in any::<u32>(),
            ecx in any::<u32>(),
            edx in any::<u32>(),
        ) {
            prop_assume!(VddFunction::try_from(function).is_err());

            let (mut vdd, _, _) = attach(SvgaDevice::new(0x15AD, 0x0405));
            let mut regs = ClientRegs::new();
            regs.eax = eax;
            regs.ebx = ebx;
            regs.ecx = ecx;
            regs.edx = edx;
            let before = regs.clone();

            prop_assert!(!vdd.dispatch(function, &mut regs));
            prop_assert_eq!(regs, before);
        }

        #[test]
        fn set_bank_always_reads_back(read in any::<u16>(), write in any::<u16>()) {
            let (mut vdd, _, _) = attach(SvgaDevice::new(0x15AD, 0x0405));

            let mut regs = ClientRegs::new();
            regs.eax = u32::from(read);
            regs.edx = u32::from(write);
            prop_assert!(vdd.dispatch(VddFunction::SetBank.number(), &mut regs));

            let mut regs = ClientRegs::new();
            prop_assert!(vdd.dispatch(VddFunction::GetCurrentBankRead.number(), &mut regs));
            prop_assert_eq!(regs.edx, u32::from(read));

            let mut regs = ClientRegs::new();
            prop_assert!(vdd.dispatch(VddFunction::GetCurrentBankWrite.number(), &mut regs));
            prop_assert_eq!(regs.edx, u32::from(write));
        }
    }
}
