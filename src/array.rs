use crate::convert::Value;
use crate::field_types::{FieldDescriptor, FieldType, Schema};

#[inline]
fn read_uint(bytes: &[u8], little: bool) -> u64 {
    let mut out = 0u64;
    if little {
        for (i, &b) in bytes.iter().enumerate() {
            out |= (b as u64) << (8 * i);
        }
    } else {
        for &b in bytes {
            out = (out << 8) | b as u64;
        }
    }
    out
}

#[inline]
fn read_int(bytes: &[u8], little: bool) -> i64 {
    let shift = 64 - 8 * bytes.len() as u32;
    ((read_uint(bytes, little) << shift) as i64) >> shift
}

#[inline]
fn read_f64(bytes: &[u8], little: bool) -> f64 {
    f64::from_bits(read_uint(bytes, little))
}

#[inline]
fn read_f32(bytes: &[u8], little: bool) -> f32 {
    f32::from_bits(read_uint(bytes, little) as u32)
}

fn decode_cell(desc: &FieldDescriptor, cell: &[u8]) -> Value {
    let little = desc.order.is_little();

    match desc.dtype {
        FieldType::Bool => Value::Bool(cell[0] != 0),
        FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64 => {
            Value::Int(read_int(cell, little))
        }
        FieldType::UInt8 | FieldType::UInt16 | FieldType::UInt32 | FieldType::UInt64 => {
            Value::UInt(read_uint(cell, little))
        }
        FieldType::Float32 => Value::Float(read_f32(cell, little) as f64),
        FieldType::Float64 => Value::Float(read_f64(cell, little)),
        FieldType::Complex64 => Value::Complex(
            read_f32(&cell[..4], little) as f64,
            read_f32(&cell[4..], little) as f64,
        ),
        FieldType::Complex128 => Value::Complex(
            read_f64(&cell[..8], little),
            read_f64(&cell[8..], little),
        ),
        FieldType::Bytes(_) => {
            let end = cell.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            Value::Bytes(cell[..end].to_vec())
        }
        FieldType::Ucs4(_) => {
            let mut s = String::new();
            for quad in cell.chunks_exact(4) {
                let c = read_uint(quad, little) as u32;
                if let Some(c) = char::from_u32(c) {
                    s.push(c);
                }
            }
            while s.ends_with('\0') {
                s.pop();
            }
            Value::Str(s)
        }
    }
}

/// The dense result of a read: `rows x columns` cells in one contiguous
/// byte buffer, homogeneous (2-D) or structured (1-D tuples).
#[derive(Debug, Clone)]
pub struct Array {
    schema: Schema,
    rows: usize,
    cols: usize,
    row_size: usize,
    data: Vec<u8>,
}

impl Array {
    pub(crate) fn new(
        schema: Schema,
        rows: usize,
        cols: usize,
        row_size: usize,
        data: Vec<u8>,
    ) -> Self {
        Self {
            schema,
            rows,
            cols,
            row_size,
            data,
        }
    }

    #[inline(always)]
    pub fn row_count(&self) -> usize {
        self.rows
    }

    #[inline(always)]
    pub fn column_count(&self) -> usize {
        self.cols
    }

    /// `(rows, columns)`; a structured result is one column of tuples wide
    /// per schema field.
    #[inline(always)]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[inline(always)]
    pub fn is_structured(&self) -> bool {
        !self.schema.is_homogeneous()
    }

    /// The schema actually used, with any discovered string width applied.
    #[inline(always)]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Size in bytes of one row.
    #[inline(always)]
    pub fn row_size(&self) -> usize {
        self.row_size
    }

    /// The raw output buffer, exactly `row_count() * row_size()` bytes.
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Decode one cell. Trailing NUL padding of string cells is trimmed.
    pub fn get(&self, row: usize, col: usize) -> Option<Value> {
        if row >= self.rows || col >= self.cols {
            return None;
        }

        let (desc, offset) = if self.schema.is_homogeneous() {
            let desc = self.schema.field(0);
            (desc, col * desc.item_size())
        } else {
            let desc = self.schema.field(col);
            (desc, desc.offset)
        };

        let start = row * self.row_size + offset;
        Some(decode_cell(desc, &self.data[start..start + desc.item_size()]))
    }
}
