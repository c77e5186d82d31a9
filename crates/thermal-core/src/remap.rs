//! Compiles the `loc_mapping` grammar into a pure bit-reshuffling function.
//!
//! An owned value rather than the original's process-wide `GetPhyAddress` function pointer,
//! so it can be parsed once and passed around instead of installed globally.

use crate::config::Address;
use crate::error::{Result, ThermalError};

/// A compiled `loc_mapping`: for each of the six address fields, the ordered list of
/// destination bit positions its bits are routed to (MSB of the field first).
#[derive(Debug, Clone)]
pub struct AddressRemapper {
    mapped_pos: Option<[Vec<i32>; 6]>,
    column_offset: u32,
}

impl AddressRemapper {
    /// Compile `loc_mapping`. An empty string produces the identity mapping.
    pub fn parse(loc_mapping: &str, bl: u32) -> Result<Self> {
        let column_offset = log2_exact(bl)
            .ok_or_else(|| ThermalError::config(format!("BL={bl} is not a power of two")))?;

        if loc_mapping.trim().is_empty() {
            return Ok(Self {
                mapped_pos: None,
                column_offset,
            });
        }

        let fields: Vec<&str> = loc_mapping.split(',').collect();
        if fields.len() != 6 {
            return Err(ThermalError::config(format!(
                "loc_mapping should have 6 fields, got {}",
                fields.len()
            )));
        }

        let mut mapped_pos: [Vec<i32>; 6] = Default::default();
        for (i, field) in fields.iter().enumerate() {
            for token in field.split('-') {
                if token.is_empty() {
                    continue;
                }
                if let Some(colon) = token.find(':') {
                    let start: i32 = token[..colon].parse().map_err(|_| {
                        ThermalError::config(format!("bad loc_mapping token '{token}'"))
                    })?;
                    let end: i32 = token[colon + 1..].parse().map_err(|_| {
                        ThermalError::config(format!("bad loc_mapping token '{token}'"))
                    })?;
                    if start > end {
                        let mut k = start;
                        while k >= end {
                            mapped_pos[i].push(k);
                            k -= 1;
                        }
                    } else {
                        for k in start..=end {
                            mapped_pos[i].push(k);
                        }
                    }
                } else {
                    let pos: i32 = token.parse().map_err(|_| {
                        ThermalError::config(format!("bad loc_mapping token '{token}'"))
                    })?;
                    mapped_pos[i].push(pos);
                }
            }
        }

        Ok(Self {
            mapped_pos: Some(mapped_pos),
            column_offset,
        })
    }

    /// Remap a logical address through the compiled bit placement. Identity if the
    /// original `loc_mapping` was empty.
    #[must_use]
    pub fn remap(&self, addr: &Address) -> Address {
        let Some(mapped_pos) = &self.mapped_pos else {
            return *addr;
        };

        let origin = addr.fields();
        let mut new_hex: u64 = 0;
        for (i, positions) in mapped_pos.iter().enumerate() {
            let field_width = positions.len();
            for (j, &dest_pos) in positions.iter().enumerate() {
                // bit (field_width - j - 1) of the source field, MSB first.
                // `dest_pos` is read as an unsigned bit index; collisions between
                // fields are intentionally unresolved (see DESIGN.md).
                let src_bit_pos = field_width - j - 1;
                let this_bit = (u64::from(origin[i]) >> src_bit_pos) & 1;
                new_hex |= this_bit << (dest_pos.max(0) as u32);
            }
        }

        let mut new_fields = [0u32; 6];
        let mut pos = self.column_offset;
        for i in (0..6).rev() {
            let width = mapped_pos[i].len() as u32;
            new_fields[i] = extract_bits(new_hex, width, pos);
            pos += width;
        }
        Address::from_fields(new_fields)
    }
}

/// Extract `width` bits of `value` starting at bit offset `offset`.
fn extract_bits(value: u64, width: u32, offset: u32) -> u32 {
    if width == 0 {
        return 0;
    }
    let mask = (1u64 << width) - 1;
    ((value >> offset) & mask) as u32
}

/// `log2(n)` if `n` is an exact power of two, else `None`.
fn log2_exact(n: u32) -> Option<u32> {
    if n == 0 || !n.is_power_of_two() {
        None
    } else {
        Some(n.trailing_zeros())
    }
}
