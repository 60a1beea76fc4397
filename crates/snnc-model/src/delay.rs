//! Delay ring arithmetic.
//!
//! A delayed population keeps `slots` snapshots of its spike lists (and of
//! any queued variables). The current-slot pointer advances once per step
//! before the step's spikes are written.

/// Circular history of one population
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelayRing {
    slots: u32,
}

impl DelayRing {
    /// Ring with `slots` snapshots; zero is clamped to one
    pub fn new(slots: u32) -> Self {
        Self { slots: slots.max(1) }
    }

    /// Number of snapshots
    pub fn slots(&self) -> u32 {
        self.slots
    }

    /// True when the ring has more than one slot and emitted code needs a slot index
    pub fn is_delayed(&self) -> bool {
        self.slots > 1
    }

    /// Pointer value after one step
    pub fn advance(&self, pointer: u32) -> u32 {
        (pointer + 1) % self.slots
    }

    /// Slot a consumer with effective delay `delay` reads: `(p + S - d + 1) mod S`
    pub fn read_slot(&self, pointer: u32, delay: u32) -> u32 {
        let s = u64::from(self.slots);
        let d = u64::from(delay) % s;
        ((u64::from(pointer) + s - d + 1) % s) as u32
    }

    /// Slot holding the previous step's snapshot, `(p + S - 1) mod S`
    pub fn previous_slot(&self, pointer: u32) -> u32 {
        self.read_slot(pointer, 2)
    }

    /// Constant added to the pointer before the modulo when reading with `delay`
    pub fn read_offset(&self, delay: u32) -> u32 {
        let d = delay % self.slots;
        (self.slots - d + 1) % self.slots
    }
}

impl Default for DelayRing {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Effective ring delay of a synapse declaring `steps` propagation delay steps.
///
/// The pointer advances before spikes are written, so a consumer reading with
/// effective delay `steps + 1` sees spikes registered exactly `steps` steps
/// earlier; `0` reads the current step.
pub fn effective_delay(steps: u32) -> u32 {
    steps + 1
}
