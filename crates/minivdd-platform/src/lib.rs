#![forbid(unsafe_code)]

//! Host-monitor I/O services consumed by the mini-VDD core.
//!
//! The only service modeled here is **global port trapping**: the host monitor
//! normally intercepts guest accesses to emulated hardware ports and routes
//! them through its pass-through emulation. While a hi-res session owns the
//! display hardware, the mini-VDD hands those ports over to the guest by
//! disabling the trap, and takes them back afterwards by re-enabling it.
//!
//! Both operations are idempotent per port. The core toggles the two
//! bank-select ports strictly as a pair; that pairing is a caller obligation
//! (there is no reference count), so a missing re-enable after a disable
//! leaves the port permanently untrapped.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Global I/O port trap control, as provided by the host monitor.
///
/// "Global" means the trap state applies to every virtual machine, matching
/// the VMM service pair this models. Implementations must make both calls
/// idempotent: enabling an already-trapped port or disabling an already
/// untrapped one is a no-op.
pub trait GlobalPortTraps {
    /// Route guest accesses to `port` through the host's emulation again.
    fn enable_global_trapping(&mut self, port: u16);

    /// Hand `port` to the guest for unmediated hardware access.
    fn disable_global_trapping(&mut self, port: u16);
}

/// Tracks per-port trap ownership, with every port host-trapped by default.
///
/// The default matches power-on state: no hi-res session has started, so the
/// host's pass-through emulation owns all ports. Only ports that have been
/// explicitly untrapped are stored.
#[derive(Debug, Default, Clone)]
pub struct TrapController {
    untrapped: BTreeSet<u16>,
}

impl TrapController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the host currently intercepts accesses to `port`.
    pub fn is_trapped(&self, port: u16) -> bool {
        !self.untrapped.contains(&port)
    }
}

impl GlobalPortTraps for TrapController {
    fn enable_global_trapping(&mut self, port: u16) {
        self.untrapped.remove(&port);
    }

    fn disable_global_trapping(&mut self, port: u16) {
        self.untrapped.insert(port);
    }
}

/// Shared-handle form so a test harness (or platform wiring) can keep a
/// cloneable view of the controller while the mini-VDD owns it as a
/// `Box<dyn GlobalPortTraps>`.
impl GlobalPortTraps for Rc<RefCell<TrapController>> {
    fn enable_global_trapping(&mut self, port: u16) {
        self.borrow_mut().enable_global_trapping(port);
    }

    fn disable_global_trapping(&mut self, port: u16) {
        self.borrow_mut().disable_global_trapping(port);
    }
}
