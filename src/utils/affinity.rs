use tracing::{info, warn};

/// Pin the current thread to one logical CPU.
///
/// The strategy thread should sit alone on an isolated core so the
/// scheduler never migrates it mid-burst. Returns whether the pin took
/// effect; failure is logged and non-fatal.
pub fn pin_to_core(core: usize) -> bool {
    let Some(core_ids) = core_affinity::get_core_ids() else {
        warn!("cpu topology unavailable, thread not pinned");
        return false;
    };
    let Some(core_id) = core_ids.get(core).copied() else {
        warn!(core, available = core_ids.len(), "core index out of range");
        return false;
    };
    if core_affinity::set_for_current(core_id) {
        info!(core, "thread pinned");
        true
    } else {
        warn!(core, "failed to pin thread");
        false
    }
}
