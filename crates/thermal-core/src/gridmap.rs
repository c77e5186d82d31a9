//! Deposits a command's event energy into the power grid.
//!
//! Grounded on `ThermalCalculator::LocationMappingANDaddEnergy` and
//! `LocationMappingANDaddEnergy_RF` in the original source. Kept as free functions rather than
//! a struct: there's no state here beyond the geometry/remapper/config already owned by the
//! caller.

use crate::config::{Command, Config};
use crate::geometry::FloorplanGeometry;
use crate::powermap::PowerMaps;
use crate::remap::AddressRemapper;

/// Spread `add_energy` (already divided by `device_width`) across the `BL * device_width` grid
/// cells a read/write/activate/precharge command touches.
pub fn location_mapping_and_add_energy(
    geometry: &FloorplanGeometry,
    config: &Config,
    remapper: &AddressRemapper,
    power: &mut PowerMaps,
    cmd: &Command,
    case_id: usize,
    add_energy: f64,
) {
    let (vault_id_x, vault_id_y) = geometry.map_to_vault(config, cmd.addr.channel);
    let (bank_id_x, bank_id_y) = geometry.map_to_bank(config, cmd.addr.bankgroup, cmd.addr.bank);
    let (x, y) = geometry.map_to_xy(
        config, remapper, cmd, vault_id_x, vault_id_y, bank_id_x, bank_id_y,
    );
    let z = geometry.map_to_z(config, cmd.addr.channel, cmd.addr.bank);

    let energy = add_energy / f64::from(config.device_width);
    for i in 0..x.len() {
        power.add_energy(case_id, x[i], y[i], z, energy);
    }
}

/// Refresh energy is spread across an entire row stripe (`numYgrids` cells at a fixed
/// `(x, z)`), not just the beats a normal command would touch — refreshing a row heats the
/// whole row, not one burst's worth of columns.
#[allow(clippy::too_many_arguments)]
pub fn location_mapping_and_add_energy_rf(
    geometry: &FloorplanGeometry,
    config: &Config,
    remapper: &AddressRemapper,
    power: &mut PowerMaps,
    cmd: &Command,
    bank0: u32,
    row0: u32,
    case_id: usize,
    add_energy: f64,
) {
    let bankgroup_id = bank0 / config.banks_per_group;
    let bank_id = bank0 % config.banks_per_group;

    let mut new_addr = cmd.addr;
    new_addr.row = row0;
    new_addr.bankgroup = bankgroup_id;
    new_addr.bank = bank_id;

    let (vault_id_x, vault_id_y) = geometry.map_to_vault(config, cmd.addr.channel);
    let (bank_id_x, bank_id_y) = geometry.map_to_bank(config, bankgroup_id, bank_id);
    let z = geometry.map_to_z(config, cmd.addr.channel, bank_id);

    let phy_addr = remapper.remap(&new_addr);
    let row_id = phy_addr.row;
    let col_id = 0u32; // refresh touches every column, starting from grid column 0
    let col_tile_id = row_id / config.tile_row_num;
    let grid_id_x = row_id / config.mat_x / config.row_tile;
    let grid_id_y =
        col_id / config.mat_y + col_tile_id * (config.num_y_grids / config.row_tile);
    let x = vault_id_x * (geometry.bank_x * config.num_x_grids) as i32
        + bank_id_x * config.num_x_grids as i32
        + grid_id_x as i32;
    let mut y = vault_id_y * (geometry.bank_y * config.num_y_grids) as i32
        + bank_id_y * config.num_y_grids as i32
        + grid_id_y as i32;

    for _ in 0..config.num_y_grids {
        power.add_energy(case_id, x, y, z, add_energy);
        y += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Address, CommandType};

    #[test]
    fn normal_command_touches_bl_times_device_width_cells() {
        let cfg = crate::config::minimal_ddr_config();
        let geo = FloorplanGeometry::new(&cfg);
        let remapper = AddressRemapper::parse(&cfg.loc_mapping, cfg.bl).unwrap();
        let mut power = PowerMaps::new(&geo);
        let cmd = Command::new(CommandType::Read, Address::new(0, 0, 0, 0, 0, 0), 0);

        location_mapping_and_add_energy(&geo, &cfg, &remapper, &mut power, &cmd, 0, 8.0);

        // `add_energy` is divided by device_width once, then deposited at one cell per
        // device per beat: total accumulated is `bl * add_energy` regardless of device_width.
        let total: f64 = power.accu(0).iter().sum();
        assert!((total - f64::from(cfg.bl) * 8.0).abs() < 1e-9);
    }

    #[test]
    fn refresh_spreads_energy_across_a_full_row_stripe() {
        let cfg = crate::config::minimal_ddr_config();
        let geo = FloorplanGeometry::new(&cfg);
        let remapper = AddressRemapper::parse(&cfg.loc_mapping, cfg.bl).unwrap();
        let mut power = PowerMaps::new(&geo);
        let cmd = Command::new(CommandType::Refresh, Address::new(0, 0, 0, 0, 0, 0), 0);

        location_mapping_and_add_energy_rf(&geo, &cfg, &remapper, &mut power, &cmd, 0, 0, 0, 2.0);

        let total: f64 = power.accu(0).iter().sum();
        assert!((total - 2.0 * f64::from(cfg.num_y_grids)).abs() < 1e-9);
    }
}
