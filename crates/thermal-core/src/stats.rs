//! Read-only interface onto the externally-owned "statistics collaborator": the
//! cumulative background-energy counters and per-epoch command counts that
//! [`crate::background::BackgroundPower`] and the logic-layer power model read every epoch.
//!
//! The original reaches directly into a `Statistics` object's public fields
//! (`stats_.sref_energy[ch][rk].cumulative_value`, etc.); this crate narrows that surface to a
//! trait so callers can supply any bookkeeping implementation (a live command-trace replay, a
//! fixture, a mock) without this crate depending on its internals.

/// Per-`(channel, rank)` cumulative background energy, in the same units the original
/// `Statistics` counters use (picojoules, summed since simulation start).
pub trait BackgroundStatsSource {
    /// Self-refresh energy accumulated so far for `(channel, rank)`.
    fn sref_energy(&self, channel: u32, rank: u32) -> f64;
    /// Precharge standby energy accumulated so far for `(channel, rank)`.
    fn pre_stb_energy(&self, channel: u32, rank: u32) -> f64;
    /// Active standby energy accumulated so far for `(channel, rank)`.
    fn act_stb_energy(&self, channel: u32, rank: u32) -> f64;
    /// Precharge power-down energy accumulated so far for `(channel, rank)`.
    fn pre_pd_energy(&self, channel: u32, rank: u32) -> f64;

    /// Read commands issued in the current epoch (reset by the caller each epoch), summed
    /// across all channels/ranks.
    fn epoch_read_commands(&self) -> u64;
    /// Write commands issued in the current epoch, summed across all channels/ranks.
    fn epoch_write_commands(&self) -> u64;
}

#[cfg(test)]
pub(crate) struct FixedStats {
    pub sref: f64,
    pub pre_stb: f64,
    pub act_stb: f64,
    pub pre_pd: f64,
    pub reads: u64,
    pub writes: u64,
}

#[cfg(test)]
impl BackgroundStatsSource for FixedStats {
    fn sref_energy(&self, _channel: u32, _rank: u32) -> f64 {
        self.sref
    }
    fn pre_stb_energy(&self, _channel: u32, _rank: u32) -> f64 {
        self.pre_stb
    }
    fn act_stb_energy(&self, _channel: u32, _rank: u32) -> f64 {
        self.act_stb
    }
    fn pre_pd_energy(&self, _channel: u32, _rank: u32) -> f64 {
        self.pre_pd
    }
    fn epoch_read_commands(&self) -> u64 {
        self.reads
    }
    fn epoch_write_commands(&self) -> u64 {
        self.writes
    }
}
