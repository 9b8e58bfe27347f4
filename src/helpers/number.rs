use thiserror::Error;

/// Filler written over the tail vacated by [`strip_grouping`].
pub const FILLER: u8 = b'0';

const POW10: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumberError {
    #[error("empty numeric field")]
    Empty,

    #[error("numeric field has no digits")]
    NoDigits,

    #[error("numeric field has more than one decimal point")]
    MultipleDecimalPoints,

    #[error("unexpected byte {byte:#04x} at position {position}")]
    InvalidByte { byte: u8, position: usize },
}

/// Grouping/decimal convention of the monetary columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub grouping: u8,
    pub decimal: u8,
}

impl NumberFormat {
    /// `1.234,56`
    pub fn brazilian() -> Self {
        NumberFormat {
            grouping: b'.',
            decimal: b',',
        }
    }

    /// Copies `field` into `scratch`, strips the grouping character in place and
    /// parses what is left. `scratch` is reused across calls so the hot path does
    /// not allocate once it has grown to the widest field.
    pub fn parse(&self, field: &[u8], scratch: &mut Vec<u8>) -> Result<f32, NumberError> {
        scratch.clear();
        scratch.extend_from_slice(field);
        let len = strip_grouping(scratch, self.grouping);
        parse_decimal(&scratch[..len], self.decimal)
    }
}

impl Default for NumberFormat {
    /// `1,234.56`
    fn default() -> Self {
        NumberFormat {
            grouping: b',',
            decimal: b'.',
        }
    }
}

/// Removes every `grouping` byte from `buf` by compacting the remaining bytes to
/// the left. The vacated tail is overwritten with [`FILLER`] so the buffer keeps
/// its length; the returned value is the logical length and nothing past it is
/// part of the number.
pub fn strip_grouping(buf: &mut [u8], grouping: u8) -> usize {
    let mut write = 0;
    for read in 0..buf.len() {
        let b = buf[read];
        if b != grouping {
            buf[write] = b;
            write += 1;
        }
    }
    buf[write..].fill(FILLER);
    write
}

/// Parses `[sign] digits [decimal digits]` into an `f32`.
///
/// Digits are accumulated as one integer mantissa while the number of fractional
/// digits is counted; the scale is applied once at the end. Exponents,
/// whitespace and grouping characters are rejected.
pub fn parse_decimal(bytes: &[u8], decimal: u8) -> Result<f32, NumberError> {
    if bytes.is_empty() {
        return Err(NumberError::Empty);
    }

    let (negative, start) = match bytes[0] {
        b'-' => (true, 1),
        b'+' => (false, 1),
        _ => (false, 0),
    };

    let mut mantissa = 0f64;
    let mut digits = 0usize;
    let mut fraction_digits = 0usize;
    let mut seen_decimal = false;

    for (position, &b) in bytes.iter().enumerate().skip(start) {
        match b {
            b'0'..=b'9' => {
                mantissa = mantissa * 10.0 + f64::from(b - b'0');
                digits += 1;
                if seen_decimal {
                    fraction_digits += 1;
                }
            }
            _ if b == decimal => {
                if seen_decimal {
                    return Err(NumberError::MultipleDecimalPoints);
                }
                seen_decimal = true;
            }
            _ => return Err(NumberError::InvalidByte { byte: b, position }),
        }
    }

    if digits == 0 {
        return Err(NumberError::NoDigits);
    }

    let scaled = match POW10.get(fraction_digits) {
        Some(scale) => mantissa / scale,
        None => mantissa / 10f64.powi(fraction_digits as i32),
    };

    let value = scaled as f32;
    Ok(if negative { -value } else { value })
}
