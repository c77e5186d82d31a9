//! `ThermalCalculator`: the public facade wiring address remapping, floorplan geometry,
//! per-command energy deposit, background power, and the solver boundary together.
//!
//! Mirrors the original `ThermalCalculator` class top-to-bottom (constructor, `UpdatePower`,
//! `PrintTransPT`, `PrintFinalPT`, `CalcTransT`/`CalcFinalT`) as a single-threaded, synchronous
//! facade type, the same role `pool.rs::EntropyPool` plays with its concurrency stripped out.

use log::{debug, info};

use crate::background::BackgroundPower;
use crate::config::{Command, CommandType, Config, NUM_DUMMY, T0};
use crate::error::{Result, ThermalError};
use crate::geometry::FloorplanGeometry;
use crate::gridmap::{location_mapping_and_add_energy, location_mapping_and_add_energy_rf};
use crate::output::OutputWriter;
use crate::powermap::PowerMaps;
use crate::remap::AddressRemapper;
use crate::solver::{calculate_time_step, layer_plane_offset, HaloGrid, ThermalSolver};
use crate::stats::BackgroundStatsSource;

/// Starting guess for the transient solver's sub-step count, refined upward at construction
/// by [`calculate_time_step`]. Preserved from the original's hardcoded `time_iter0 = 10`.
const TIME_ITER0: u32 = 10;

/// Accounts command and background energy into the power grid and drives the temperature
/// solver. One instance per simulation run; not reusable after [`ThermalCalculator::finalize`].
pub struct ThermalCalculator<S: ThermalSolver> {
    config: Config,
    geometry: FloorplanGeometry,
    remapper: AddressRemapper,
    power: PowerMaps,
    background: BackgroundPower,
    solver: S,
    output: Option<OutputWriter>,
    midx: Vec<(usize, usize, f64)>,
    cap: Vec<f64>,
    time_iter: u32,
    /// Per-case temperature field from the most recent transient solve, fed back in as the
    /// previous field for the next epoch.
    t_trans: Vec<Vec<f64>>,
    /// `[channel * ranks + rank][bank]`, wrapping at `rows / num_row_refresh` refreshes.
    refresh_count: Vec<Vec<u32>>,
    sample_id: u64,
    finalized: bool,
}

impl<S: ThermalSolver> ThermalCalculator<S> {
    /// Build a calculator for `config`, seeding the temperature field at ambient and opening
    /// all output sinks.
    ///
    /// # Errors
    ///
    /// Returns [`ThermalError::Config`] if `loc_mapping` is malformed, or
    /// [`ThermalError::Io`] if an output path can't be created.
    pub fn new(config: Config, stats: &dyn BackgroundStatsSource, solver: S) -> Result<Self> {
        let geometry = FloorplanGeometry::new(&config);
        let remapper = AddressRemapper::parse(&config.loc_mapping, config.bl)?;
        let power = PowerMaps::new(&geometry);
        let background = BackgroundPower::new(geometry.num_case as usize);
        let output = OutputWriter::new(&config, &geometry)?;
        let tamb_kelvin = config.tamb_kelvin();

        let midx = solver.calculate_midx_array(&geometry, &config);
        let cap = solver.calculate_cap_array(&geometry, &config);
        let layer_dim = ((geometry.dim_x + NUM_DUMMY) * (geometry.dim_y + NUM_DUMMY)) as usize;
        let power_epoch_time_s = config.power_epoch_period as f64 * config.t_ck_ns * 1e-9;
        let time_iter = calculate_time_step(&midx, &cap, layer_dim, power_epoch_time_s, TIME_ITER0);
        debug!("time_iter resolved to {time_iter}");

        let t_trans = (0..geometry.num_case)
            .map(|_| solver.initialize_temperature(&geometry, &config, tamb_kelvin))
            .collect();

        let refresh_count =
            vec![vec![0u32; config.banks() as usize]; (config.channels * config.ranks) as usize];

        let _ = stats; // reserved: constructor doesn't read background counters yet.

        Ok(Self {
            config,
            geometry,
            remapper,
            power,
            background,
            solver,
            output: Some(output),
            midx,
            cap,
            time_iter,
            t_trans,
            refresh_count,
            sample_id: 0,
            finalized: false,
        })
    }

    /// Deposit one command's event energy, and — if `clk` has crossed the next
    /// `power_epoch_period` boundary — fold in this epoch's background energy, solve the
    /// transient temperature field, and emit the epoch's CSV rows.
    ///
    /// # Errors
    ///
    /// Returns [`ThermalError::Invariant`] if called after [`Self::finalize`], or
    /// [`ThermalError::Io`] if a CSV write fails.
    pub fn update_power(
        &mut self,
        cmd: &Command,
        clk: u64,
        stats: &dyn BackgroundStatsSource,
    ) -> Result<()> {
        if self.finalized {
            return Err(ThermalError::invariant(
                "update_power called after finalize",
                "ThermalCalculator::update_power",
            ));
        }

        let channel = cmd.addr.channel;
        let rank = cmd.addr.rank;
        let (case_id, device_scale) = if self.config.is_hmc() || self.config.is_hbm() {
            (0usize, 1.0)
        } else {
            (
                (channel * self.config.ranks + rank) as usize,
                f64::from(self.config.devices_per_rank),
            )
        };

        match cmd.cmd_type {
            CommandType::Refresh => {
                let rank_idx = (channel * self.config.ranks + rank) as usize;
                for ib in 0..self.config.banks() {
                    let row_s = self.advance_refresh_count(rank_idx, ib as usize);
                    let energy = self.config.ref_energy_inc
                        / f64::from(self.config.num_row_refresh)
                        / f64::from(self.config.banks())
                        / f64::from(self.config.num_y_grids);
                    for ir in row_s..row_s + self.config.num_row_refresh {
                        location_mapping_and_add_energy_rf(
                            &self.geometry,
                            &self.config,
                            &self.remapper,
                            &mut self.power,
                            cmd,
                            ib,
                            ir,
                            case_id,
                            energy / 1000.0 / device_scale,
                        );
                    }
                }
            }
            CommandType::RefreshBank => {
                let ib = cmd.addr.bank;
                let rank_idx = (channel * self.config.ranks + rank) as usize;
                let row_s = self.advance_refresh_count(rank_idx, ib as usize);
                let energy = self.config.refb_energy_inc
                    / f64::from(self.config.num_row_refresh)
                    / f64::from(self.config.num_y_grids);
                for ir in row_s..row_s + self.config.num_row_refresh {
                    location_mapping_and_add_energy_rf(
                        &self.geometry,
                        &self.config,
                        &self.remapper,
                        &mut self.power,
                        cmd,
                        ib,
                        ir,
                        case_id,
                        energy / 1000.0 / device_scale,
                    );
                }
            }
            other => {
                let mut energy = match other {
                    CommandType::Activate => self.config.act_energy_inc,
                    CommandType::Read | CommandType::ReadPrecharge => self.config.read_energy_inc,
                    CommandType::Write | CommandType::WritePrecharge => self.config.write_energy_inc,
                    CommandType::Precharge
                    | CommandType::SelfRefreshEnter
                    | CommandType::SelfRefreshExit => 0.0,
                    CommandType::Refresh | CommandType::RefreshBank => unreachable!(),
                };
                if energy > 0.0 {
                    energy /= f64::from(self.config.bl);
                    location_mapping_and_add_energy(
                        &self.geometry,
                        &self.config,
                        &self.remapper,
                        &mut self.power,
                        cmd,
                        case_id,
                        energy / 1000.0 / device_scale,
                    );
                }
            }
        }

        if clk > (self.sample_id + 1) * self.config.power_epoch_period {
            self.background
                .apply_epoch_topup(&self.geometry, &self.config, &mut self.power, stats);
            self.print_trans_pt(clk)?;
            self.power.clear_cur();
            self.sample_id += 1;
        }

        Ok(())
    }

    /// Fold in the final background top-up, solve steady-state temperature for every case, and
    /// write the final CSV. Consumes the output sinks; further [`Self::update_power`] calls
    /// fail with [`ThermalError::Invariant`].
    ///
    /// # Errors
    ///
    /// Returns [`ThermalError::Invariant`] if already finalized, or [`ThermalError::Io`] on a
    /// CSV write failure.
    pub fn finalize(&mut self, clk: u64, stats: &dyn BackgroundStatsSource) -> Result<()> {
        let Some(mut output) = self.output.take() else {
            return Err(ThermalError::invariant(
                "finalize called after finalize",
                "ThermalCalculator::finalize",
            ));
        };

        self.background
            .apply_final_topup(&self.geometry, &self.config, &mut self.power, stats, clk);

        let dim_x_h = self.geometry.dim_x + NUM_DUMMY;
        let dim_y_h = self.geometry.dim_y + NUM_DUMMY;
        let half = NUM_DUMMY / 2;

        for case_id in 0..self.geometry.num_case as usize {
            let halo = HaloGrid::from_power_map(&self.geometry, self.power.accu(case_id), clk as f64);
            let total_power = halo.total_power(&self.geometry);
            info!("total final power for case {case_id} is {:.3} mW", total_power * 1000.0);

            let t_final = self.solver.steady_solve(
                &self.geometry,
                &self.config,
                &halo,
                &self.midx,
                self.config.tamb_kelvin(),
            );
            // Unlike the epoch preview, the final max/temperature are reported in Kelvin and
            // scanned over the whole halo-padded buffer, matching `GetMaxTofCase`'s lack of
            // interior slicing or T0 subtraction.
            let max_t = t_final.iter().cloned().fold(0.0_f64, f64::max);
            info!("MaxT of case {case_id} is {max_t} [K]");

            for l in 0..self.geometry.num_p {
                let layer_offset = (layer_plane_offset(l) + 1) * dim_x_h * dim_y_h;
                for j in half..self.geometry.dim_y + half {
                    for i in half..self.geometry.dim_x + half {
                        let pw = halo.cells()[(l * dim_x_h * dim_y_h + j * dim_x_h + i) as usize];
                        let tm = t_final[(layer_offset + j * dim_x_h + i) as usize];
                        output.write_final_temperature(case_id, i - half, j - half, l, pw, tm)?;
                    }
                }
            }
        }

        output.finish()?;
        self.finalized = true;
        Ok(())
    }

    fn advance_refresh_count(&mut self, rank_idx: usize, bank_idx: usize) -> u32 {
        let row_s = self.refresh_count[rank_idx][bank_idx] * self.config.num_row_refresh;
        self.refresh_count[rank_idx][bank_idx] += 1;
        // `==`, not `>=`: see DESIGN.md.
        if self.refresh_count[rank_idx][bank_idx] * self.config.num_row_refresh == self.config.rows {
            self.refresh_count[rank_idx][bank_idx] = 0;
        }
        row_s
    }

    fn print_trans_pt(&mut self, clk: u64) -> Result<()> {
        let ms = clk as f64 * self.config.t_ck_ns * 1e-6;
        let dim_x_h = self.geometry.dim_x + NUM_DUMMY;
        let dim_y_h = self.geometry.dim_y + NUM_DUMMY;
        let half = NUM_DUMMY / 2;
        let time = self.config.power_epoch_period as f64 * self.config.t_ck_ns * 1e-9;

        for case_id in 0..self.geometry.num_case as usize {
            let halo = HaloGrid::from_power_map(
                &self.geometry,
                self.power.cur(case_id),
                self.config.power_epoch_period as f64,
            );
            let total_power = halo.total_power(&self.geometry);
            debug!("total trans power for case {case_id} is {:.3} mW", total_power * 1000.0);

            let t = self.solver.transient_solve(
                &self.geometry,
                &self.config,
                &halo,
                &self.midx,
                &self.cap,
                time,
                self.time_iter,
                &self.t_trans[case_id],
                self.config.tamb_kelvin(),
            );
            self.t_trans[case_id] = t;

            let mut max_t_case = 0.0_f64;
            let output = self
                .output
                .as_mut()
                .expect("output sinks live until finalize");
            for l in 0..self.geometry.num_p {
                let layer_offset = (layer_plane_offset(l) + 1) * dim_x_h * dim_y_h;
                let mut max_t_layer = 0.0_f64;
                for j in half..self.geometry.dim_y + half {
                    for i in half..self.geometry.dim_x + half {
                        let t = self.t_trans[case_id][(layer_offset + j * dim_x_h + i) as usize] - T0;
                        if t > max_t_layer {
                            max_t_layer = t;
                        }
                    }
                }
                output.write_epoch_max_temp(l, max_t_layer, ms)?;
                info!("MaxT of case {case_id} in layer {l} is {max_t_layer} [C]");
                max_t_case = max_t_case.max(max_t_layer);
            }
            info!("MaxT of case {case_id} is {max_t_case} [C] at {ms} ms");

            if self.config.output_level >= 2 {
                for l in 0..self.geometry.num_p {
                    let layer_offset = (layer_plane_offset(l) + 1) * dim_x_h * dim_y_h;
                    for j in half..self.geometry.dim_y + half {
                        for i in half..self.geometry.dim_x + half {
                            let pw = halo.cells()[(l * dim_x_h * dim_y_h + j * dim_x_h + i) as usize];
                            let tm = self.t_trans[case_id][(layer_offset + j * dim_x_h + i) as usize] - T0;
                            output.write_epoch_temperature(
                                case_id,
                                i - half,
                                j - half,
                                l,
                                pw,
                                tm,
                                self.sample_id,
                            )?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
