//! Trace-file line parsing: `clk cmd_name channel rank bankgroup bank row column`.
//!
//! Grounded on `ThermalReplay::ParseLine` in the replay harness: eight whitespace-separated
//! tokens, `clk` first, the command name second, the six address fields last.

use thermal_core::{Address, Command, CommandType, ThermalError};

/// Parse one trace line into its issue clock and the command it names.
///
/// # Errors
///
/// Returns [`ThermalError::Trace`] if the line doesn't split into exactly eight tokens, the
/// command name isn't recognized, or an address field isn't a valid integer.
pub fn parse_line(line: &str) -> Result<(u64, Command), ThermalError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 8 {
        return Err(ThermalError::trace(format!(
            "expected 8 tokens, got {}: {line:?}",
            tokens.len()
        )));
    }

    let clk: u64 = tokens[0]
        .parse()
        .map_err(|_| ThermalError::trace(format!("bad clock value {:?}", tokens[0])))?;

    let cmd_type = CommandType::from_trace_token(tokens[1])
        .ok_or_else(|| ThermalError::trace(format!("unknown command {:?}", tokens[1])))?;

    let mut fields = [0u32; 6];
    for (i, tok) in tokens[2..8].iter().enumerate() {
        fields[i] = tok
            .parse()
            .map_err(|_| ThermalError::trace(format!("bad address field {tok:?} in {line:?}")))?;
    }

    let addr = Address::from_fields(fields);
    Ok((clk, Command::new(cmd_type, addr, clk)))
}

/// Parse every non-blank line of a trace file's contents, in order.
///
/// # Errors
///
/// Returns the first [`ThermalError::Trace`] hit, with the offending line number folded into
/// the message.
pub fn parse_trace(contents: &str) -> Result<Vec<(u64, Command)>, ThermalError> {
    let mut out = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed = parse_line(line)
            .map_err(|e| ThermalError::trace(format!("line {}: {e}", lineno + 1)))?;
        out.push(parsed);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermal_core::CommandType;

    #[test]
    fn parses_a_well_formed_line() {
        let (clk, cmd) = parse_line("100 activate 0 1 2 3 4 5").unwrap();
        assert_eq!(clk, 100);
        assert!(matches!(cmd.cmd_type, CommandType::Activate));
        assert_eq!(cmd.addr.channel, 0);
        assert_eq!(cmd.addr.column, 5);
    }

    #[test]
    fn rejects_wrong_token_count() {
        assert!(parse_line("100 activate 0 1 2 3 4").is_err());
    }

    #[test]
    fn rejects_unknown_command_name() {
        assert!(parse_line("100 bogus 0 1 2 3 4 5").is_err());
    }

    #[test]
    fn parse_trace_skips_blank_lines() {
        let commands = parse_trace("100 activate 0 0 0 0 0 0\n\n200 read 0 0 0 0 0 1\n").unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].0, 200);
    }
}
