//! Serial balance that answers a carriage return with a line like `0.1234kg\r`.
use std::io::{Read, Write};
use std::time::Duration;

use reactor_traits::{BoxError, Scale};

use crate::error::{HwError, Result};

const MAX_LINE: usize = 64;

/// Parse one balance response into grams.
///
/// Accepts `<digits>.<digits>kg` with optional surrounding whitespace and an
/// optional leading minus sign (tare drift).
pub fn parse_weight_line(line: &str) -> Result<f64> {
    let s = line.trim();
    let Some(num) = s.strip_suffix("kg") else {
        return Err(HwError::Parse(line.to_string()));
    };
    let digits = num.trim().strip_prefix('-').unwrap_or(num.trim());
    let valid = match digits.split_once('.') {
        Some((int, frac)) => {
            !int.is_empty()
                && !frac.is_empty()
                && int.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    };
    if !valid {
        return Err(HwError::Parse(line.to_string()));
    }
    let kg: f64 = num
        .trim()
        .parse()
        .map_err(|_| HwError::Parse(line.to_string()))?;
    Ok(kg * 1000.0)
}

/// Scale on any byte port (a serial device, or a cursor in tests).
///
/// The port is expected to enforce its own read timeout; a zero-byte read is
/// treated as a timeout.
pub struct SerialScale<P> {
    port: P,
}

impl<P: Read + Write> SerialScale<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::with_capacity(16);
        let mut byte = [0u8; 1];
        loop {
            let n = self.port.read(&mut byte)?;
            if n == 0 {
                return Err(HwError::Timeout);
            }
            if byte[0] == b'\r' {
                break;
            }
            buf.push(byte[0]);
            if buf.len() > MAX_LINE {
                return Err(HwError::Parse(String::from_utf8_lossy(&buf).into_owned()));
            }
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn read_weight(&mut self) -> Result<f64> {
        self.port.write_all(b"\r")?;
        self.port.flush()?;
        let line = self.read_line()?;
        parse_weight_line(&line)
    }
}

impl<P: Read + Write> Scale for SerialScale<P> {
    fn read_grams(&mut self, _timeout: Duration) -> std::result::Result<f64, BoxError> {
        self.read_weight().map_err(|e| Box::new(e) as BoxError)
    }
}
