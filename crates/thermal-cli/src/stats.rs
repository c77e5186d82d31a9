//! `ReplayStats`: the CLI-side reference implementation of `BackgroundStatsSource`.
//!
//! Grounded on `ThermalReplay::ProcessCMD`/`IsRankActive` in the replay harness: per-rank bank
//! activity is tracked command-by-command, and elapsed cycles are folded into an "active" or
//! "idle" bucket depending on whether any bank in that rank is open. This crate turns those
//! cycle buckets into energies via configurable power constants rather than a detailed
//! per-state power model — a clearly-labeled reference implementation, not a claim that it
//! matches any real part's background power.

use thermal_core::{Command, CommandType, Config};

use crate::config_file::PowerConstants;

/// Tracks bank-active state and accumulated active/idle/self-refresh cycles per
/// `(channel, rank)`, and the current epoch's read/write command counts.
pub struct ReplayStats {
    ranks: u32,
    banks_per_group: u32,
    t_ck_ns: f64,
    power_epoch_period: u64,
    constants: PowerConstants,

    /// `[channel * ranks + rank][bankgroup * banks_per_group + bank]`.
    bank_active: Vec<Vec<bool>>,
    self_refresh: Vec<bool>,
    active_cycles: Vec<u64>,
    idle_cycles: Vec<u64>,
    sref_cycles: Vec<u64>,

    last_clk: u64,
    sample_id: u64,
    epoch_reads: u64,
    epoch_writes: u64,
}

impl ReplayStats {
    #[must_use]
    pub fn new(config: &Config, constants: PowerConstants) -> Self {
        let num_rank = (config.channels * config.ranks) as usize;
        let banks = config.banks() as usize;
        Self {
            ranks: config.ranks,
            banks_per_group: config.banks_per_group,
            t_ck_ns: config.t_ck_ns,
            power_epoch_period: config.power_epoch_period,
            constants,
            bank_active: vec![vec![false; banks]; num_rank],
            self_refresh: vec![false; num_rank],
            active_cycles: vec![0; num_rank],
            idle_cycles: vec![0; num_rank],
            sref_cycles: vec![0; num_rank],
            last_clk: 0,
            sample_id: 0,
            epoch_reads: 0,
            epoch_writes: 0,
        }
    }

    fn rank_idx(&self, channel: u32, rank: u32) -> usize {
        (channel * self.ranks + rank) as usize
    }

    fn is_rank_active(&self, rank_idx: usize) -> bool {
        self.bank_active[rank_idx].iter().any(|&b| b)
    }

    /// Clear every bank's active flag, matching `ThermalReplay::Run`'s per-repeat reset
    /// between passes over the same trace.
    pub fn reset_bank_active(&mut self) {
        for rank in &mut self.bank_active {
            rank.iter_mut().for_each(|b| *b = false);
        }
    }

    /// Fold `clk - last_clk` into the active/idle/self-refresh bucket for every rank, update
    /// command counters and bank-active state for `cmd`, and — if `clk` has crossed the next
    /// `power_epoch_period` boundary, mirroring `ThermalCalculator::UpdatePower`'s own
    /// detection — reset the epoch read/write counters.
    pub fn process_cmd(&mut self, cmd: &Command, clk: u64) {
        let past_clks = clk.saturating_sub(self.last_clk);
        for rank_idx in 0..self.active_cycles.len() {
            if self.self_refresh[rank_idx] {
                self.sref_cycles[rank_idx] += past_clks;
            } else if self.is_rank_active(rank_idx) {
                self.active_cycles[rank_idx] += past_clks;
            } else {
                self.idle_cycles[rank_idx] += past_clks;
            }
        }

        match cmd.cmd_type {
            CommandType::Read | CommandType::ReadPrecharge => self.epoch_reads += 1,
            CommandType::Write | CommandType::WritePrecharge => self.epoch_writes += 1,
            _ => {}
        }

        let rank_idx = self.rank_idx(cmd.addr.channel, cmd.addr.rank);
        let abs_bank = (cmd.addr.bankgroup * self.banks_per_group + cmd.addr.bank) as usize;
        let abs_bank = abs_bank.min(self.bank_active[rank_idx].len().saturating_sub(1));

        match cmd.cmd_type {
            CommandType::Activate => self.bank_active[rank_idx][abs_bank] = true,
            CommandType::ReadPrecharge | CommandType::WritePrecharge | CommandType::Precharge => {
                self.bank_active[rank_idx][abs_bank] = false;
            }
            CommandType::SelfRefreshEnter => self.self_refresh[rank_idx] = true,
            CommandType::SelfRefreshExit => self.self_refresh[rank_idx] = false,
            _ => {}
        }

        self.last_clk = clk;

        if clk > (self.sample_id + 1) * self.power_epoch_period {
            self.epoch_reads = 0;
            self.epoch_writes = 0;
            self.sample_id += 1;
        }
    }

    fn energy_pj(&self, cycles: u64, power_mw: f64) -> f64 {
        cycles as f64 * self.t_ck_ns * power_mw
    }
}

impl thermal_core::BackgroundStatsSource for ReplayStats {
    fn sref_energy(&self, channel: u32, rank: u32) -> f64 {
        let idx = self.rank_idx(channel, rank);
        self.energy_pj(self.sref_cycles[idx], self.constants.sref_power_mw)
    }

    fn pre_stb_energy(&self, channel: u32, rank: u32) -> f64 {
        let idx = self.rank_idx(channel, rank);
        self.energy_pj(self.idle_cycles[idx], self.constants.pre_stb_power_mw)
    }

    fn act_stb_energy(&self, channel: u32, rank: u32) -> f64 {
        let idx = self.rank_idx(channel, rank);
        self.energy_pj(self.active_cycles[idx], self.constants.act_stb_power_mw)
    }

    fn pre_pd_energy(&self, _channel: u32, _rank: u32) -> f64 {
        // Not observable from the trace command set (no explicit power-down command);
        // left at zero rather than guessed, matching the reference-implementation disclaimer.
        0.0
    }

    fn epoch_read_commands(&self) -> u64 {
        self.epoch_reads
    }

    fn epoch_write_commands(&self) -> u64 {
        self.epoch_writes
    }
}
