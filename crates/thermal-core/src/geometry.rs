//! Floorplan geometry: derives the power-grid dimensions from topology and maps
//! logical vault/bank/channel indices onto grid coordinates.
//!
//! Grounded on `ThermalCalculator`'s constructor and its `MapTo*` family in the original
//! source, with the `determineXY` aspect-ratio search kept byte-for-byte in spirit.

use crate::config::{Address, Command, Config};
use crate::remap::AddressRemapper;
use log::info;

/// Grid dimensions and per-case layout derived once from [`Config`] at construction time.
#[derive(Debug, Clone, Copy)]
pub struct FloorplanGeometry {
    pub dim_x: u32,
    pub dim_y: u32,
    pub num_p: u32,
    pub bank_x: u32,
    pub bank_y: u32,
    pub vault_x: u32,
    pub vault_y: u32,
    /// Number of independent power/temperature maps tracked (1 for 3D-stacked parts, where
    /// all channels share one case; `ranks * channels` for planar DDR).
    pub num_case: u32,
}

impl FloorplanGeometry {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let (dim_x, dim_y, num_p, bank_x, bank_y, vault_x, vault_y, num_case) = if config.is_hmc()
        {
            let num_p = config.num_dies + 1;
            let bank_x = 1;
            let bank_y = 2;
            let xd = f64::from(bank_x) * config.bank_asr;
            let yd = f64::from(bank_y);
            let vault_x = determine_xy(xd, yd, config.channels);
            let vault_y = config.channels / vault_x;
            let dim_x = vault_x * bank_x * config.num_x_grids;
            let dim_y = vault_y * bank_y * config.num_y_grids;
            (dim_x, dim_y, num_p, bank_x, bank_y, vault_x, vault_y, 1)
        } else if config.is_hbm() {
            let num_p = config.num_dies + 1;
            let (bank_x, bank_y, vault_x, vault_y) = (8, 2, 1, 2);
            let dim_x = vault_x * bank_x * config.num_x_grids;
            let dim_y = vault_y * bank_y * config.num_y_grids;
            (dim_x, dim_y, num_p, bank_x, bank_y, vault_x, vault_y, 1)
        } else {
            let num_p = 1;
            let bank_x = determine_xy(config.bank_asr, 1.0, config.banks());
            let bank_y = config.banks() / bank_x;
            let dim_x = bank_x * config.num_x_grids;
            let dim_y = bank_y * config.num_y_grids;
            let num_case = config.ranks * config.channels;
            (dim_x, dim_y, num_p, bank_x, bank_y, 1, 1, num_case)
        };

        info!("bank aspect ratio = {}", config.bank_asr);
        info!(
            "numXgrids = {}; numYgrids = {}",
            config.num_x_grids, config.num_y_grids
        );
        info!("vault_x = {vault_x}; vault_y = {vault_y}");
        info!("bank_x = {bank_x}; bank_y = {bank_y}");
        info!("dimX = {dim_x}; dimY = {dim_y}; numP = {num_p}");
        info!("number of devices is {}", config.devices_per_rank);

        Self {
            dim_x,
            dim_y,
            num_p,
            bank_x,
            bank_y,
            vault_x,
            vault_y,
            num_case,
        }
    }

    /// Vault (x, y) position of a channel, for 3D-stacked topologies only (DDR always maps to
    /// the origin, since planar ranks don't have vaults).
    #[must_use]
    pub fn map_to_vault(&self, config: &Config, channel_id: u32) -> (i32, i32) {
        let mut vault_id_x = 0;
        let mut vault_id_y = 0;
        if config.is_hmc() {
            let vault_factor = if config.bank_order == 0 {
                self.vault_x
            } else {
                self.vault_y
            };
            vault_id_x = (channel_id / vault_factor) as i32;
            vault_id_y = (channel_id % vault_factor) as i32;
            if config.bank_order == 0 {
                std::mem::swap(&mut vault_id_x, &mut vault_id_y);
            }
        } else if config.is_hbm() {
            vault_id_y = (channel_id % 2) as i32;
            vault_id_x = 0;
        }
        (vault_id_x, vault_id_y)
    }

    /// Bank (x, y) position within its vault/rank. `bank_id` is local to `bankgroup_id`.
    #[must_use]
    pub fn map_to_bank(&self, config: &Config, bankgroup_id: u32, bank_id: u32) -> (i32, i32) {
        let abs_bank_id = bankgroup_id * config.banks_per_group + bank_id;
        let bank_factor = if config.bank_order != 0 {
            self.bank_y
        } else {
            self.bank_x
        };

        let (mut bank_id_x, mut bank_id_y);
        if config.is_hmc() {
            let num_bank_per_layer = config.banks() / config.num_dies;
            let bank_same_layer = abs_bank_id % num_bank_per_layer;
            bank_id_x = (bank_same_layer / bank_factor) as i32;
            bank_id_y = (bank_same_layer % bank_factor) as i32;
            if config.bank_order == 0 {
                std::mem::swap(&mut bank_id_x, &mut bank_id_y);
            }
        } else if config.is_hbm() {
            bank_id_x = (bankgroup_id * 2 + bank_id / 2) as i32;
            bank_id_y = (bank_id % 2) as i32;
        } else if config.bankgroups > 1 {
            // Banks within a group form a square; groups themselves line up along whichever
            // axis isn't already the tighter one.
            bank_id_x = (bank_id / 2) as i32;
            bank_id_y = (bank_id % 2) as i32;
            if config.bank_order == 0 {
                std::mem::swap(&mut bank_id_x, &mut bank_id_y);
            }
            if self.bank_x <= self.bank_y {
                bank_id_y += (bankgroup_id * 2) as i32;
            } else {
                bank_id_x += (bankgroup_id * 2) as i32;
            }
        } else {
            bank_id_x = (abs_bank_id / bank_factor) as i32;
            bank_id_y = (abs_bank_id % bank_factor) as i32;
            if config.bank_order == 0 {
                std::mem::swap(&mut bank_id_x, &mut bank_id_y);
            }
        }
        (bank_id_x, bank_id_y)
    }

    /// Logic/device layer index for a (channel, bank) pair.
    #[must_use]
    pub fn map_to_z(&self, config: &Config, channel_id: u32, bank_id: u32) -> i32 {
        if config.is_hmc() {
            let num_bank_per_layer = config.banks() / config.num_dies;
            if config.bank_layer_order == 0 {
                (bank_id / num_bank_per_layer) as i32
            } else {
                self.num_p as i32 - (bank_id / num_bank_per_layer) as i32 - 2
            }
        } else if config.is_hbm() {
            (channel_id / 2) as i32
        } else {
            0
        }
    }

    /// Per-burst-beat (x, y) grid coordinates touched by a command, one pair per
    /// `BL * device_width` unit. `remapper` is applied to each successive burst column.
    #[must_use]
    pub fn map_to_xy(
        &self,
        config: &Config,
        remapper: &AddressRemapper,
        cmd: &Command,
        vault_id_x: i32,
        vault_id_y: i32,
        bank_id_x: i32,
        bank_id_y: i32,
    ) -> (Vec<i32>, Vec<i32>) {
        let mut x = Vec::with_capacity((config.bl * config.device_width) as usize);
        let mut y = Vec::with_capacity((config.bl * config.device_width) as usize);

        let row_id = cmd.addr.row;
        let col_tile_id = row_id / config.tile_row_num;
        let grid_id_x = row_id / config.mat_x / config.row_tile;

        let mut temp_addr: Address = cmd.addr;
        let bank_x_offset = self.bank_x * config.num_x_grids;
        let bank_y_offset = self.bank_y * config.num_y_grids;
        for _ in 0..config.bl {
            let phy_loc = remapper.remap(&temp_addr);
            let mut col_id = phy_loc.column * config.device_width;
            for _ in 0..config.device_width {
                let grid_id_y =
                    col_id / config.mat_y + col_tile_id * (config.num_y_grids / config.row_tile);
                let temp_x = vault_id_x * bank_x_offset as i32
                    + bank_id_x * config.num_x_grids as i32
                    + grid_id_x as i32;
                x.push(temp_x);
                let temp_y = vault_id_y * bank_y_offset as i32
                    + bank_id_y * config.num_y_grids as i32
                    + grid_id_y as i32;
                y.push(temp_y);
                col_id += 1;
            }
            // Column wraps unconditionally across burst beats, with no masking against the
            // column field width; see DESIGN.md.
            temp_addr.column += 1;
        }
        (x, y)
    }
}

/// Finds the `(x, y)` factor pair of `total_grids` closest to the aspect ratio `xd:yd`, biased
/// towards a wider `x` when several factor pairs tie (the last such pair wins, matching the
/// forward factor search in the original).
#[must_use]
pub fn determine_xy(xd: f64, yd: f64, total_grids: u32) -> u32 {
    let mut x_re = 1;
    let mut asr_re = 1000.0_f64;
    for y in 1..=total_grids {
        let x = total_grids / y;
        if x * y == total_grids {
            let (fx, fy) = (f64::from(x), f64::from(y));
            let asr = if fx * xd >= fy * yd {
                fx * xd / fy / yd
            } else {
                fy * yd / fx / xd
            };
            if asr < asr_re {
                x_re = total_grids / y;
                asr_re = asr;
            }
        }
    }
    x_re
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ddr_config() -> Config {
        crate::config::minimal_ddr_config()
    }

    #[test]
    fn ddr_case_count_is_ranks_times_channels() {
        let mut cfg = ddr_config();
        cfg.channels = 2;
        cfg.ranks = 2;
        let geo = FloorplanGeometry::new(&cfg);
        assert_eq!(geo.num_case, 4);
        assert_eq!(geo.num_p, 1);
    }

    #[test]
    fn hmc_case_count_is_always_one() {
        let mut cfg = ddr_config();
        cfg.memory_type = crate::config::MemoryType::Hmc;
        cfg.channels = 4;
        cfg.num_dies = 3;
        let geo = FloorplanGeometry::new(&cfg);
        assert_eq!(geo.num_case, 1);
        assert_eq!(geo.num_p, 4);
    }

    #[test]
    fn determine_xy_prefers_square_factorization() {
        // 16 grids, aspect ratio 1:1 -> 4x4.
        assert_eq!(determine_xy(1.0, 1.0, 16), 4);
    }

    #[test]
    fn determine_xy_respects_skewed_aspect_ratio() {
        // Very wide-asked aspect ratio over 8 grids should prefer x=8,y=1 over x=4,y=2.
        assert_eq!(determine_xy(100.0, 1.0, 8), 8);
    }

    #[test]
    fn map_to_bank_single_group_splits_xy() {
        let cfg = ddr_config();
        let geo = FloorplanGeometry::new(&cfg);
        let (bx, by) = geo.map_to_bank(&cfg, 0, 0);
        assert!(bx >= 0 && by >= 0);
    }
}
