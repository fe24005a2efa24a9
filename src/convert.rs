use crate::config::ParserConfig;
use crate::field_types::{FieldDescriptor, FieldType};

/// Marker returned when a field cannot be converted to the requested type.
/// The row reader decorates it with row/column/type context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Unparsable;

type ConvResult<T> = Result<T, Unparsable>;

/// A typed value produced by a user converter, or decoded back out of an
/// [`Array`](crate::Array) cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Complex(f64, f64),
    Str(String),
    Bytes(Vec<u8>),
}

/// Parse a signed integer with exact bounds.
///
/// The overflow predicate compares against `min / 10` and `-(min % 10)`
/// (resp. `max / 10`, `max % 10`) before each digit, which is exact at the
/// boundaries without needing arithmetic wider than 64 bits. Leading and
/// trailing whitespace is skipped; everything else must be consumed.
pub(crate) fn str_to_int64(field: &[char], min: i64, max: i64) -> ConvResult<i64> {
    let len = field.len();
    let mut p = 0;

    while p < len && field[p].is_whitespace() {
        p += 1;
    }

    let mut negative = false;
    if p < len && field[p] == '-' {
        negative = true;
        p += 1;
    } else if p < len && field[p] == '+' {
        p += 1;
    }

    if p >= len || !field[p].is_ascii_digit() {
        return Err(Unparsable);
    }

    let mut number: i64 = 0;
    if negative {
        // If number is greater than pre_min, at least one more digit can be
        // processed without overflowing.
        let pre_min = min / 10;
        let dig_pre_min = -(min % 10);

        while p < len && field[p].is_ascii_digit() {
            let d = field[p] as i64 - '0' as i64;
            if number > pre_min || (number == pre_min && d <= dig_pre_min) {
                number = number * 10 - d;
                p += 1;
            } else {
                return Err(Unparsable);
            }
        }
    } else {
        let pre_max = max / 10;
        let dig_pre_max = max % 10;

        while p < len && field[p].is_ascii_digit() {
            let d = field[p] as i64 - '0' as i64;
            if number < pre_max || (number == pre_max && d <= dig_pre_max) {
                number = number * 10 + d;
                p += 1;
            } else {
                return Err(Unparsable);
            }
        }
    }

    while p < len && field[p].is_whitespace() {
        p += 1;
    }

    if p != len {
        return Err(Unparsable);
    }

    Ok(number)
}

/// Unsigned variant of [`str_to_int64`]; a `-` sign is an error.
pub(crate) fn str_to_uint64(field: &[char], max: u64) -> ConvResult<u64> {
    let len = field.len();
    let mut p = 0;

    while p < len && field[p].is_whitespace() {
        p += 1;
    }

    if p < len && field[p] == '-' {
        return Err(Unparsable);
    }
    if p < len && field[p] == '+' {
        p += 1;
    }

    if p >= len || !field[p].is_ascii_digit() {
        return Err(Unparsable);
    }

    let pre_max = max / 10;
    let dig_pre_max = max % 10;

    let mut number: u64 = 0;
    while p < len && field[p].is_ascii_digit() {
        let d = field[p] as u64 - '0' as u64;
        if number < pre_max || (number == pre_max && d <= dig_pre_max) {
            number = number * 10 + d;
            p += 1;
        } else {
            return Err(Unparsable);
        }
    }

    while p < len && field[p].is_whitespace() {
        p += 1;
    }

    if p != len {
        return Err(Unparsable);
    }

    Ok(number)
}

/// Length of the longest prefix of `ascii` forming valid float syntax,
/// including `inf`/`infinity`/`nan` (case-insensitive). An incomplete
/// exponent is left out of the extent.
fn float_extent(ascii: &[u8]) -> usize {
    let len = ascii.len();
    let mut i = 0;

    if i < len && (ascii[i] == b'+' || ascii[i] == b'-') {
        i += 1;
    }

    for name in [&b"infinity"[..], &b"inf"[..], &b"nan"[..]] {
        if ascii.len() - i >= name.len()
            && ascii[i..i + name.len()].eq_ignore_ascii_case(name)
        {
            return i + name.len();
        }
    }

    let mut saw_digits = false;
    while i < len && ascii[i].is_ascii_digit() {
        i += 1;
        saw_digits = true;
    }
    if i < len && ascii[i] == b'.' {
        i += 1;
        while i < len && ascii[i].is_ascii_digit() {
            i += 1;
            saw_digits = true;
        }
    }
    if !saw_digits {
        return 0;
    }

    if i < len && (ascii[i] == b'e' || ascii[i] == b'E') {
        let mut j = i + 1;
        if j < len && (ascii[j] == b'+' || ascii[j] == b'-') {
            j += 1;
        }
        if j < len && ascii[j].is_ascii_digit() {
            while j < len && ascii[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }

    i
}

/// Parse a double from the front of `field`.
///
/// The codepoints are narrowed to ASCII in a stack buffer (with a heap
/// fallback for long fields; anything >= 128 cannot be part of a number)
/// and handed to the standard float parser. Returns the value and the
/// number of codepoints consumed, including trailing whitespace if
/// `skip_trailing_whitespace` is set (the complex parser turns that off).
pub(crate) fn parse_double(
    field: &[char],
    skip_trailing_whitespace: bool,
) -> ConvResult<(f64, usize)> {
    let mut start = 0;
    while start < field.len() && field[start].is_whitespace() {
        start += 1;
    }
    if start == field.len() {
        // Empty or only whitespace: not a floating point number.
        return Err(Unparsable);
    }

    let rest = &field[start..];
    let mut stack_buf = [0u8; 128];
    let mut heap_buf;
    let ascii: &mut [u8] = if rest.len() > stack_buf.len() {
        heap_buf = vec![0u8; rest.len()];
        &mut heap_buf
    } else {
        &mut stack_buf
    };

    let mut n = 0;
    for &c in rest {
        if (c as u32) >= 128 {
            break;
        }
        ascii[n] = c as u8;
        n += 1;
    }

    let extent = float_extent(&ascii[..n]);
    if extent == 0 {
        return Err(Unparsable);
    }

    let text = std::str::from_utf8(&ascii[..extent]).map_err(|_| Unparsable)?;
    let value: f64 = text.parse().map_err(|_| Unparsable)?;

    let mut consumed = start + extent;
    if skip_trailing_whitespace {
        while consumed < field.len() && field[consumed].is_whitespace() {
            consumed += 1;
        }
    }

    Ok((value, consumed))
}

/// Parse a double that must consume the whole field.
fn parse_full_double(field: &[char]) -> ConvResult<f64> {
    let (value, consumed) = parse_double(field, true)?;
    if consumed != field.len() {
        return Err(Unparsable);
    }
    Ok(value)
}

/// Parse a complex number: `a`, `bj`, `a+bj`, `a-bj`, each optionally
/// wrapped in parentheses. The imaginary unit codepoint is configurable.
pub(crate) fn parse_complex(
    field: &[char],
    imaginary_unit: char,
    allow_parens: bool,
) -> ConvResult<(f64, f64)> {
    let len = field.len();
    let mut p = 0;

    // Whitespace before a possibly leading '('.
    while p < len && field[p].is_whitespace() {
        p += 1;
    }

    let mut open_paren = false;
    if allow_parens && p < len && field[p] == '(' {
        open_paren = true;
        p += 1;
    }

    let (mut real, consumed) = parse_double(&field[p..], false)?;
    p += consumed;

    let imag;
    if p == len {
        // No imaginary part in the string (e.g. "3.5").
        if open_paren {
            return Err(Unparsable);
        }
        return Ok((real, 0.0));
    } else if field[p] == imaginary_unit {
        // Pure imaginary (e.g. "1.5j").
        imag = real;
        real = 0.0;
        p += 1;
        if open_paren && p < len && field[p] == ')' {
            p += 1;
            open_paren = false;
        }
    } else if open_paren && field[p] == ')' {
        imag = 0.0;
        p += 1;
        open_paren = false;
    } else {
        if field[p] == '+' {
            p += 1;
        }
        let (value, consumed) = parse_double(&field[p..], false)?;
        imag = value;
        p += consumed;
        if p >= len || field[p] != imaginary_unit {
            return Err(Unparsable);
        }
        p += 1;
        if open_paren && p < len && field[p] == ')' {
            p += 1;
            open_paren = false;
        }
    }

    while p < len && field[p].is_whitespace() {
        p += 1;
    }

    if p != len || open_paren {
        return Err(Unparsable);
    }
    Ok((real, imag))
}

/// Write the low `out.len()` bytes of `x` in the requested byte order.
/// Valid whenever `x` fits the destination width in two's complement.
#[inline]
fn write_int_bytes(out: &mut [u8], x: i64, little: bool) {
    let bytes = x.to_le_bytes();
    out.copy_from_slice(&bytes[..out.len()]);
    if !little {
        out.reverse();
    }
}

#[inline]
fn write_uint_bytes(out: &mut [u8], x: u64, little: bool) {
    let bytes = x.to_le_bytes();
    out.copy_from_slice(&bytes[..out.len()]);
    if !little {
        out.reverse();
    }
}

#[inline]
fn write_f64(out: &mut [u8], x: f64, little: bool) {
    out.copy_from_slice(&if little { x.to_le_bytes() } else { x.to_be_bytes() });
}

#[inline]
fn write_f32(out: &mut [u8], x: f32, little: bool) {
    out.copy_from_slice(&if little { x.to_le_bytes() } else { x.to_be_bytes() });
}

fn to_signed(
    field: &[char],
    out: &mut [u8],
    min: i64,
    max: i64,
    little: bool,
    config: &ParserConfig,
) -> ConvResult<()> {
    let x = match str_to_int64(field, min, max) {
        Ok(parsed) => parsed,
        Err(Unparsable) if config.allow_float_for_int => {
            // Truncate toward zero, saturating at the column's bounds.
            (parse_full_double(field)? as i64).clamp(min, max)
        }
        Err(err) => return Err(err),
    };
    write_int_bytes(out, x, little);
    Ok(())
}

fn to_unsigned(
    field: &[char],
    out: &mut [u8],
    max: u64,
    little: bool,
    config: &ParserConfig,
) -> ConvResult<()> {
    let x = match str_to_uint64(field, max) {
        Ok(parsed) => parsed,
        Err(Unparsable) if config.allow_float_for_int => {
            (parse_full_double(field)? as u64).min(max)
        }
        Err(err) => return Err(err),
    };
    write_uint_bytes(out, x, little);
    Ok(())
}

fn to_bytes_string(field: &[char], out: &mut [u8]) -> ConvResult<()> {
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = match field.get(i) {
            Some(&c) if (c as u32) > 255 => return Err(Unparsable),
            Some(&c) => c as u8,
            None => 0,
        };
    }
    Ok(())
}

fn to_ucs4_string(field: &[char], out: &mut [u8], little: bool) -> ConvResult<()> {
    for (i, slot) in out.chunks_exact_mut(4).enumerate() {
        let c = field.get(i).map_or(0u32, |&c| c as u32);
        slot.copy_from_slice(&if little { c.to_le_bytes() } else { c.to_be_bytes() });
    }
    Ok(())
}

/// Convert one field into `out`, which must be exactly one item of the
/// descriptor's type. Errors carry no context; the row reader adds it.
pub(crate) fn convert_field(
    desc: &FieldDescriptor,
    field: &[char],
    out: &mut [u8],
    config: &ParserConfig,
) -> ConvResult<()> {
    let little = desc.order.is_little();

    match desc.dtype {
        FieldType::Bool => {
            let x = str_to_int64(field, i64::MIN, i64::MAX)?;
            out[0] = (x != 0) as u8;
            Ok(())
        }
        FieldType::Int8 => to_signed(field, out, i8::MIN as i64, i8::MAX as i64, little, config),
        FieldType::Int16 => to_signed(field, out, i16::MIN as i64, i16::MAX as i64, little, config),
        FieldType::Int32 => to_signed(field, out, i32::MIN as i64, i32::MAX as i64, little, config),
        FieldType::Int64 => to_signed(field, out, i64::MIN, i64::MAX, little, config),
        FieldType::UInt8 => to_unsigned(field, out, u8::MAX as u64, little, config),
        FieldType::UInt16 => to_unsigned(field, out, u16::MAX as u64, little, config),
        FieldType::UInt32 => to_unsigned(field, out, u32::MAX as u64, little, config),
        FieldType::UInt64 => to_unsigned(field, out, u64::MAX, little, config),
        FieldType::Float32 => {
            let x = parse_full_double(field)?;
            write_f32(out, x as f32, little);
            Ok(())
        }
        FieldType::Float64 => {
            let x = parse_full_double(field)?;
            write_f64(out, x, little);
            Ok(())
        }
        FieldType::Complex64 => {
            let (real, imag) = parse_complex(field, config.imaginary_unit, true)?;
            write_f32(&mut out[..4], real as f32, little);
            write_f32(&mut out[4..], imag as f32, little);
            Ok(())
        }
        FieldType::Complex128 => {
            let (real, imag) = parse_complex(field, config.imaginary_unit, true)?;
            write_f64(&mut out[..8], real, little);
            write_f64(&mut out[8..], imag, little);
            Ok(())
        }
        FieldType::Bytes(_) => to_bytes_string(field, out),
        FieldType::Ucs4(_) => to_ucs4_string(field, out, little),
    }
}

/// Pack a converter-produced [`Value`] into one item of the descriptor's
/// type. Integer values are bounds-checked; floats truncate toward zero.
pub(crate) fn pack_value(desc: &FieldDescriptor, value: &Value, out: &mut [u8]) -> ConvResult<()> {
    let little = desc.order.is_little();

    fn as_i64(value: &Value, min: i64, max: i64) -> ConvResult<i64> {
        match *value {
            Value::Bool(b) => Ok(b as i64),
            Value::Int(x) if x >= min && x <= max => Ok(x),
            Value::UInt(x) if x <= max as u64 => Ok(x as i64),
            Value::Float(x) => Ok((x as i64).clamp(min, max)),
            _ => Err(Unparsable),
        }
    }

    fn as_f64(value: &Value) -> ConvResult<f64> {
        match *value {
            Value::Bool(b) => Ok(b as u8 as f64),
            Value::Int(x) => Ok(x as f64),
            Value::UInt(x) => Ok(x as f64),
            Value::Float(x) => Ok(x),
            _ => Err(Unparsable),
        }
    }

    match desc.dtype {
        FieldType::Bool => {
            out[0] = match *value {
                Value::Bool(b) => b as u8,
                Value::Int(x) => (x != 0) as u8,
                Value::UInt(x) => (x != 0) as u8,
                Value::Float(x) => (x != 0.0) as u8,
                _ => return Err(Unparsable),
            };
            Ok(())
        }
        FieldType::Int8 => {
            write_int_bytes(out, as_i64(value, i8::MIN as i64, i8::MAX as i64)?, little);
            Ok(())
        }
        FieldType::Int16 => {
            write_int_bytes(out, as_i64(value, i16::MIN as i64, i16::MAX as i64)?, little);
            Ok(())
        }
        FieldType::Int32 => {
            write_int_bytes(out, as_i64(value, i32::MIN as i64, i32::MAX as i64)?, little);
            Ok(())
        }
        FieldType::Int64 => {
            write_int_bytes(out, as_i64(value, i64::MIN, i64::MAX)?, little);
            Ok(())
        }
        FieldType::UInt8 | FieldType::UInt16 | FieldType::UInt32 | FieldType::UInt64 => {
            let max = match desc.dtype {
                FieldType::UInt8 => u8::MAX as u64,
                FieldType::UInt16 => u16::MAX as u64,
                FieldType::UInt32 => u32::MAX as u64,
                _ => u64::MAX,
            };
            let x = match *value {
                Value::Bool(b) => b as u64,
                Value::Int(v) if v >= 0 && v as u64 <= max => v as u64,
                Value::UInt(v) if v <= max => v,
                Value::Float(v) => (v as u64).min(max),
                _ => return Err(Unparsable),
            };
            write_uint_bytes(out, x, little);
            Ok(())
        }
        FieldType::Float32 => {
            write_f32(out, as_f64(value)? as f32, little);
            Ok(())
        }
        FieldType::Float64 => {
            write_f64(out, as_f64(value)?, little);
            Ok(())
        }
        FieldType::Complex64 => {
            let (real, imag) = match *value {
                Value::Complex(re, im) => (re, im),
                ref v => (as_f64(v)?, 0.0),
            };
            write_f32(&mut out[..4], real as f32, little);
            write_f32(&mut out[4..], imag as f32, little);
            Ok(())
        }
        FieldType::Complex128 => {
            let (real, imag) = match *value {
                Value::Complex(re, im) => (re, im),
                ref v => (as_f64(v)?, 0.0),
            };
            write_f64(&mut out[..8], real, little);
            write_f64(&mut out[8..], imag, little);
            Ok(())
        }
        FieldType::Bytes(_) => match value {
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                to_bytes_string(&chars, out)
            }
            Value::Bytes(b) => {
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = b.get(i).copied().unwrap_or(0);
                }
                Ok(())
            }
            _ => Err(Unparsable),
        },
        FieldType::Ucs4(_) => match value {
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                to_ucs4_string(&chars, out, little)
            }
            _ => Err(Unparsable),
        },
    }
}
