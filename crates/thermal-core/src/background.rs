//! Background (non-command) power: self-refresh/standby/power-down energy top-ups applied at
//! each epoch boundary and at finalization, plus the logic/device-layer bandwidth-driven power
//! model.
//!
//! Grounded on `ThermalCalculator::UpdatePowerMaps`, `UpdateLogicPower`, and the
//! background-energy blocks inline in `UpdatePower`/`PrintFinalPT` in the original source.

use crate::config::Config;
use crate::geometry::FloorplanGeometry;
use crate::powermap::PowerMaps;
use crate::stats::BackgroundStatsSource;
use log::trace;

/// Tracks the previous cumulative background-energy readings (so only the delta since the
/// last call is applied) and the current logic-layer power estimate.
#[derive(Debug, Clone)]
pub struct BackgroundPower {
    sref_prev: Vec<f64>,
    pre_stb_prev: Vec<f64>,
    act_stb_prev: Vec<f64>,
    pre_pd_prev: Vec<f64>,
    avg_logic_power: f64,
}

impl BackgroundPower {
    #[must_use]
    pub fn new(num_case: usize) -> Self {
        Self {
            sref_prev: vec![0.0; num_case],
            pre_stb_prev: vec![0.0; num_case],
            act_stb_prev: vec![0.0; num_case],
            pre_pd_prev: vec![0.0; num_case],
            avg_logic_power: 0.0,
        }
    }

    /// Refresh the logic-layer power estimate from this epoch's read/write command counts.
    /// Linear in bandwidth utilization, with a constant background floor.
    pub fn update_logic_power(&mut self, stats: &dyn BackgroundStatsSource, config: &Config) {
        let total_rw = (stats.epoch_read_commands() + stats.epoch_write_commands())
            * config.burst_cycle
            / u64::from(config.channels);
        // Note: `epoch_period` here is the command-scheduler's epoch, not necessarily the
        // same length as `power_epoch_period` — preserved from the original as-is.
        let utilization = total_rw as f64 / config.epoch_period as f64;
        self.avg_logic_power = config.max_logic_power * utilization + config.logic_const_bg_power;
        trace!(
            "logic power utilization={utilization:.4} avg_logic_power={:.4}",
            self.avg_logic_power
        );
    }

    /// Apply `add_energy` uniformly across every non-logic cell of every case, and the current
    /// logic-layer estimate (spread evenly over `dimX*dimY`) across the logic-layer cells.
    /// `trans` selects the per-epoch working buffer vs. the lifetime accumulator.
    fn update_power_maps(
        &self,
        geometry: &FloorplanGeometry,
        power: &mut PowerMaps,
        add_energy: f64,
        trans: bool,
        clk: u64,
        config: &Config,
    ) {
        let period = if trans {
            config.power_epoch_period as f64
        } else {
            clk as f64
        };
        let dim_xy = (geometry.dim_x * geometry.dim_y) as usize;
        let boundary = dim_xy * (geometry.num_p as usize - 1);
        let total = dim_xy * geometry.num_p as usize;
        let logic_topup = self.avg_logic_power / geometry.dim_x as f64 / geometry.dim_y as f64 * period;

        for case in 0..power.num_case() {
            let buf = if trans {
                power.cur_mut(case)
            } else {
                power.accu_mut(case)
            };
            for cell in buf.iter_mut().take(boundary) {
                *cell += add_energy;
            }
            for cell in buf.iter_mut().take(total).skip(boundary) {
                *cell += logic_topup;
            }
        }
    }

    /// Epoch-boundary background top-up (trans = true). 3D-stacked topologies pool background
    /// energy across all channels into the single shared case; DDR applies it per
    /// (channel, rank) case with its own previous-reading baseline.
    pub fn apply_epoch_topup(
        &mut self,
        geometry: &FloorplanGeometry,
        config: &Config,
        power: &mut PowerMaps,
        stats: &dyn BackgroundStatsSource,
    ) {
        let device_scale = if config.is_hmc() || config.is_hbm() {
            1.0
        } else {
            f64::from(config.devices_per_rank)
        };

        if config.is_hmc() || config.is_hbm() {
            // Logic-layer power is only modeled for 3D-stacked topologies — DDR's planar
            // case has no separate logic layer (`numP == 1`), matching the original where
            // `UpdateLogicPower` is only reached via this branch's `UpdatePowerMaps` call.
            self.update_logic_power(stats, config);
            let extra = self.pooled_delta(stats, 0, config) / (geometry.dim_x * geometry.dim_y
                * (geometry.num_p - 1)) as f64;
            self.update_power_maps(
                geometry,
                power,
                extra / 1000.0 / device_scale,
                true,
                config.power_epoch_period,
                config,
            );
        } else {
            for jch in 0..config.channels {
                for jrk in 0..config.ranks {
                    let case_id = (jch * config.ranks + jrk) as usize;
                    let extra = self.per_case_delta(stats, jch, jrk, case_id)
                        / (geometry.dim_x * geometry.dim_y * geometry.num_p) as f64;
                    let delta = extra / 1000.0 / device_scale;
                    for cell in power.cur_mut(case_id).iter_mut() {
                        *cell += delta;
                    }
                }
            }
        }
    }

    /// Final (steady-state) background top-up, applied once at simulation end directly onto
    /// the lifetime accumulator rather than the per-epoch buffer.
    pub fn apply_final_topup(
        &mut self,
        geometry: &FloorplanGeometry,
        config: &Config,
        power: &mut PowerMaps,
        stats: &dyn BackgroundStatsSource,
        clk: u64,
    ) {
        let device_scale = if config.is_hmc() || config.is_hbm() {
            1.0
        } else {
            f64::from(config.devices_per_rank)
        };

        if config.is_hmc() || config.is_hbm() {
            self.update_logic_power(stats, config);
            let mut pooled = 0.0;
            for ch in 0..config.channels {
                for rk in 0..config.ranks {
                    pooled += stats.sref_energy(ch, rk)
                        + stats.pre_stb_energy(ch, rk)
                        + stats.act_stb_energy(ch, rk)
                        + stats.pre_pd_energy(ch, rk);
                }
            }
            let extra = pooled / (geometry.dim_x * geometry.dim_y * (geometry.num_p - 1)) as f64;
            self.update_power_maps(geometry, power, extra / 1000.0 / device_scale, false, clk, config);
        } else {
            for jch in 0..config.channels {
                for jrk in 0..config.ranks {
                    let case_id = (jch * config.ranks + jrk) as usize;
                    let extra = (stats.sref_energy(jch, jrk)
                        + stats.pre_stb_energy(jch, jrk)
                        + stats.act_stb_energy(jch, jrk)
                        + stats.pre_pd_energy(jch, jrk))
                        / (geometry.dim_x * geometry.dim_y * geometry.num_p) as f64;
                    let delta = extra / 1000.0 / device_scale;
                    for cell in power.accu_mut(case_id).iter_mut() {
                        *cell += delta;
                    }
                }
            }
        }
    }

    fn pooled_delta(&mut self, stats: &dyn BackgroundStatsSource, case_id: usize, config: &Config) -> f64 {
        let mut sref_sum = 0.0;
        let mut pre_stb_sum = 0.0;
        let mut act_stb_sum = 0.0;
        let mut pre_pd_sum = 0.0;
        for ch in 0..config.channels {
            for rk in 0..config.ranks {
                sref_sum += stats.sref_energy(ch, rk);
                pre_stb_sum += stats.pre_stb_energy(ch, rk);
                act_stb_sum += stats.act_stb_energy(ch, rk);
                pre_pd_sum += stats.pre_pd_energy(ch, rk);
            }
        }
        let delta = sref_sum + pre_stb_sum + act_stb_sum + pre_pd_sum
            - self.sref_prev[case_id]
            - self.pre_stb_prev[case_id]
            - self.act_stb_prev[case_id]
            - self.pre_pd_prev[case_id];
        self.sref_prev[case_id] = sref_sum;
        self.pre_stb_prev[case_id] = pre_stb_sum;
        self.act_stb_prev[case_id] = act_stb_sum;
        self.pre_pd_prev[case_id] = pre_pd_sum;
        delta
    }

    fn per_case_delta(
        &mut self,
        stats: &dyn BackgroundStatsSource,
        channel: u32,
        rank: u32,
        case_id: usize,
    ) -> f64 {
        let sref = stats.sref_energy(channel, rank);
        let pre_stb = stats.pre_stb_energy(channel, rank);
        let act_stb = stats.act_stb_energy(channel, rank);
        let pre_pd = stats.pre_pd_energy(channel, rank);
        let delta = sref + pre_stb + act_stb + pre_pd
            - self.sref_prev[case_id]
            - self.pre_stb_prev[case_id]
            - self.act_stb_prev[case_id]
            - self.pre_pd_prev[case_id];
        self.sref_prev[case_id] = sref;
        self.pre_stb_prev[case_id] = pre_stb;
        self.act_stb_prev[case_id] = act_stb;
        self.pre_pd_prev[case_id] = pre_pd;
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryType;
    use crate::stats::FixedStats;

    /// A stats double whose energies vary by channel, unlike [`FixedStats`]'s constant reply —
    /// needed to catch a pooling bug that sums only `(0, 0)` instead of every `(ch, rk)`.
    struct PerChannelStats;

    impl BackgroundStatsSource for PerChannelStats {
        fn sref_energy(&self, channel: u32, _rank: u32) -> f64 {
            f64::from(channel + 1)
        }
        fn pre_stb_energy(&self, _channel: u32, _rank: u32) -> f64 {
            0.0
        }
        fn act_stb_energy(&self, _channel: u32, _rank: u32) -> f64 {
            0.0
        }
        fn pre_pd_energy(&self, _channel: u32, _rank: u32) -> f64 {
            0.0
        }
        fn epoch_read_commands(&self) -> u64 {
            0
        }
        fn epoch_write_commands(&self) -> u64 {
            0
        }
    }

    #[test]
    fn logic_power_scales_with_utilization() {
        let cfg = crate::config::minimal_ddr_config();
        let mut bg = BackgroundPower::new(1);
        let stats = FixedStats {
            sref: 0.0,
            pre_stb: 0.0,
            act_stb: 0.0,
            pre_pd: 0.0,
            reads: 0,
            writes: 0,
        };
        bg.update_logic_power(&stats, &cfg);
        assert_eq!(bg.avg_logic_power, cfg.logic_const_bg_power);
    }

    #[test]
    fn ddr_epoch_topup_only_touches_cur_pmap() {
        let cfg = crate::config::minimal_ddr_config();
        let geo = FloorplanGeometry::new(&cfg);
        let mut power = PowerMaps::new(&geo);
        let mut bg = BackgroundPower::new(geo.num_case as usize);
        let stats = FixedStats {
            sref: 100.0,
            pre_stb: 0.0,
            act_stb: 0.0,
            pre_pd: 0.0,
            reads: 0,
            writes: 0,
        };
        bg.apply_epoch_topup(&geo, &cfg, &mut power, &stats);
        assert!(power.cur(0).iter().any(|&v| v != 0.0));
        assert!(power.accu(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn ddr_final_topup_only_touches_accu_pmap() {
        let cfg = crate::config::minimal_ddr_config();
        let geo = FloorplanGeometry::new(&cfg);
        let mut power = PowerMaps::new(&geo);
        let mut bg = BackgroundPower::new(geo.num_case as usize);
        let stats = FixedStats {
            sref: 100.0,
            pre_stb: 0.0,
            act_stb: 0.0,
            pre_pd: 0.0,
            reads: 0,
            writes: 0,
        };
        bg.apply_final_topup(&geo, &cfg, &mut power, &stats, 1000);
        assert!(power.accu(0).iter().any(|&v| v != 0.0));
        assert!(power.cur(0).iter().all(|&v| v == 0.0));
    }

    /// `apply_final_topup`'s HMC/HBM branch must pool background energy across every
    /// `(channel, rank)`, not just `(0, 0)` — regression test for the bug where it summed a
    /// single cell.
    #[test]
    fn hmc_final_topup_pools_background_energy_across_every_channel() {
        let mut cfg = crate::config::minimal_ddr_config();
        cfg.memory_type = MemoryType::Hmc;
        cfg.channels = 4;
        cfg.ranks = 1;
        cfg.num_dies = 1;
        let geo = FloorplanGeometry::new(&cfg);
        let mut power = PowerMaps::new(&geo);
        let mut bg = BackgroundPower::new(geo.num_case as usize);

        bg.apply_final_topup(&geo, &cfg, &mut power, &PerChannelStats, 1000);

        let boundary = (geo.dim_x * geo.dim_y * (geo.num_p - 1)) as usize;
        let expected_pooled: f64 = (0..cfg.channels).map(|ch| f64::from(ch + 1)).sum();
        let non_logic_total: f64 = power.accu(0).iter().take(boundary).sum();
        assert!(
            (non_logic_total - expected_pooled / 1000.0).abs() < 1e-9,
            "non_logic_total={non_logic_total} expected={}",
            expected_pooled / 1000.0
        );
    }
}
