use crate::SlotClock;
pub use ::metrics::*;
use types::Slot;

lazy_static! {
    pub static ref PRESENT_SLOT: Result<IntGauge> =
        try_create_int_gauge("slotclock_present_slot", "The present wall-clock slot");
    pub static ref PRESENT_EPOCH: Result<IntGauge> =
        try_create_int_gauge("slotclock_present_epoch", "The present wall-clock epoch");
    pub static ref SLOTS_PER_EPOCH: Result<IntGauge> =
        try_create_int_gauge("slotclock_slots_per_epoch", "Slots per epoch (constant)");
    pub static ref SLOT_DURATION: Result<IntGauge> = try_create_int_gauge(
        "slotclock_slot_time_seconds",
        "The duration in seconds between each slot"
    );
}

/// Update the global metrics `DEFAULT_REGISTRY` with info from the slot clock.
pub fn scrape_for_metrics<U: SlotClock>(clock: &U, slots_per_epoch: u64) {
    let present_slot = clock.now().unwrap_or_else(|| Slot::new(0));

    set_gauge(&PRESENT_SLOT, present_slot.as_u64() as i64);
    set_gauge(
        &PRESENT_EPOCH,
        present_slot.epoch(slots_per_epoch).as_u64() as i64,
    );
    set_gauge(&SLOTS_PER_EPOCH, slots_per_epoch as i64);
    set_gauge(&SLOT_DURATION, clock.slot_duration().as_secs() as i64);
}

