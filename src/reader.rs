use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::array::Array;
use crate::config::{ByteConversionMode, Comment, ParserConfig};
use crate::convert::{self, Value};
use crate::error::{BoxError, Error, Result};
use crate::field_types::{FieldDescriptor, Schema};
use crate::stream::{ByteStream, Encoding, LinesStream, Stream};
use crate::tokenizer::Tokenizer;

/// Minimum size to grow the allocation by (or ~25%). With 8 KiB blocks the
/// first speculative allocation lands between 8 and 16 KiB depending on
/// the row size.
const MIN_BLOCK_SIZE: usize = 1 << 13;

/// What a user converter receives: the field text, or its Latin-1 encoding
/// when byte converters are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterArg<'a> {
    Str(&'a str),
    Bytes(&'a [u8]),
}

/// A per-column user conversion callback. Whatever it returns is packed
/// into the column through the descriptor, in place of the built-in
/// text conversion.
pub type Converter = Box<dyn Fn(ConverterArg<'_>) -> std::result::Result<Value, BoxError>>;

/// Builds configured readers, in the spirit of `csv`-style reader
/// builders: set options, then read from a path, reader, byte slice,
/// line iterable, or any [`Stream`].
///
/// ```no_run
/// use typed_csv::{FieldType, ReaderBuilder, Schema};
///
/// let schema = Schema::scalar(FieldType::Int64);
/// let array = ReaderBuilder::new()
///     .skip_lines(1)
///     .from_path("data.csv", &schema)?;
/// # Ok::<(), typed_csv::Error>(())
/// ```
pub struct ReaderBuilder {
    delimiter: Option<char>,
    comment: String,
    quote: Option<char>,
    imaginary_unit: char,
    allow_embedded_newline: bool,
    ignore_leading_whitespace: bool,
    allow_float_for_int: bool,
    byte_converters: bool,
    c_byte_converters: bool,
    encoding: Encoding,
    buffer_capacity: Option<usize>,
    usecols: Option<Vec<isize>>,
    skip_lines: usize,
    max_rows: Option<usize>,
    converters: Vec<(isize, Converter)>,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self {
            delimiter: Some(','),
            comment: "#".to_string(),
            quote: Some('"'),
            imaginary_unit: 'j',
            allow_embedded_newline: true,
            ignore_leading_whitespace: false,
            allow_float_for_int: false,
            byte_converters: false,
            c_byte_converters: false,
            encoding: Encoding::Utf8,
            buffer_capacity: None,
            usecols: None,
            skip_lines: 0,
            max_rows: None,
            converters: Vec::new(),
        }
    }
}

impl ReaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field delimiter. `None` selects whitespace-delimited mode: any run
    /// of spaces or tabs separates fields and leading whitespace skipping
    /// is forced on.
    pub fn delimiter(&mut self, delimiter: Option<char>) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    /// Comment marker: empty disables comments, one or two codepoints
    /// otherwise. Defaults to `"#"`.
    pub fn comment(&mut self, comment: &str) -> &mut Self {
        self.comment = comment.to_string();
        self
    }

    /// Quote character, or `None` to disable quoting.
    pub fn quote(&mut self, quote: Option<char>) -> &mut Self {
        self.quote = quote;
        self
    }

    /// Codepoint marking the imaginary part of complex fields.
    pub fn imaginary_unit(&mut self, unit: char) -> &mut Self {
        self.imaginary_unit = unit;
        self
    }

    /// Whether newlines inside quoted fields are kept (default) or end
    /// the row.
    pub fn embedded_newlines(&mut self, yes: bool) -> &mut Self {
        self.allow_embedded_newline = yes;
        self
    }

    /// Trim spaces at the start of every field.
    pub fn ignore_leading_whitespace(&mut self, yes: bool) -> &mut Self {
        self.ignore_leading_whitespace = yes;
        self
    }

    /// Retry failed integer fields as floats, truncating toward zero.
    pub fn allow_float_for_int(&mut self, yes: bool) -> &mut Self {
        self.allow_float_for_int = yes;
        self
    }

    /// Hand user converters the Latin-1 encoding of each field instead of
    /// the field text.
    pub fn byte_converters(&mut self, yes: bool) -> &mut Self {
        self.byte_converters = yes;
        self
    }

    /// Request Latin-1 routing for the built-in default path as well.
    pub fn c_byte_converters(&mut self, yes: bool) -> &mut Self {
        self.c_byte_converters = yes;
        self
    }

    /// Encoding of byte sources. Defaults to UTF-8.
    pub fn encoding(&mut self, encoding: Encoding) -> &mut Self {
        self.encoding = encoding;
        self
    }

    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut Self {
        self.buffer_capacity = Some(capacity);
        self
    }

    /// Ordered selection of input columns; negative indices count from the
    /// end of each row.
    pub fn usecols(&mut self, cols: &[isize]) -> &mut Self {
        self.usecols = Some(cols.to_vec());
        self
    }

    /// Lines to discard before reading data.
    pub fn skip_lines(&mut self, lines: usize) -> &mut Self {
        self.skip_lines = lines;
        self
    }

    /// Read at most this many rows. The output is allocated up front for
    /// exactly this count.
    pub fn max_rows(&mut self, rows: usize) -> &mut Self {
        self.max_rows = Some(rows);
        self
    }

    /// Register a user converter for an input column (negative indices
    /// allowed). With `usecols`, keys are matched against the selection
    /// and unmatched keys are silently ignored.
    pub fn converter<F>(&mut self, column: isize, func: F) -> &mut Self
    where
        F: Fn(ConverterArg<'_>) -> std::result::Result<Value, BoxError> + 'static,
    {
        self.converters.push((column, Box::new(func)));
        self
    }

    fn config(&self) -> Result<ParserConfig> {
        let comment = {
            let mut chars = self.comment.chars();
            match (chars.next(), chars.next(), chars.next()) {
                (None, ..) => Comment::Disabled,
                (Some(first), None, _) => Comment::Single(first),
                (Some(first), Some(second), None) => Comment::Double(first, second),
                _ => {
                    return Err(Error::invalid_argument(
                        "comment markers longer than two codepoints are not supported",
                    ))
                }
            }
        };

        for (name, c) in [
            ("delimiter", self.delimiter),
            ("quote", self.quote),
            ("comment", comment.first()),
            ("comment", comment.second()),
        ] {
            if matches!(c, Some('\r') | Some('\n')) {
                return Err(Error::invalid_argument(format!(
                    "{name} cannot be a line terminator"
                )));
            }
        }

        let byte_mode = if self.byte_converters {
            ByteConversionMode::Latin1Callback
        } else if self.c_byte_converters {
            ByteConversionMode::Latin1Default
        } else {
            ByteConversionMode::None
        };

        Ok(ParserConfig {
            delimiter: self.delimiter,
            comment,
            quote: self.quote,
            imaginary_unit: self.imaginary_unit,
            allow_embedded_newline: self.allow_embedded_newline,
            // Forced on in whitespace-delimited mode.
            ignore_leading_whitespace: self.ignore_leading_whitespace
                || self.delimiter.is_none(),
            allow_float_for_int: self.allow_float_for_int,
            byte_mode,
        })
    }

    fn validate_schema(&self, schema: &Schema) -> Result<()> {
        if schema.num_fields() == 0 {
            return Err(Error::invalid_argument(
                "the schema must have at least one field",
            ));
        }

        if !schema.is_homogeneous() {
            for i in 0..schema.num_fields() {
                if schema.field(i).dtype.is_variable_width() {
                    return Err(Error::invalid_argument(
                        "string fields of a structured schema need an explicit width",
                    ));
                }
            }

            if let Some(cols) = &self.usecols {
                if cols.len() != schema.num_fields() {
                    return Err(Error::invalid_argument(format!(
                        "length of usecols ({}) and number of fields in the schema ({}) \
                         do not match",
                        cols.len(),
                        schema.num_fields()
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn from_path(&self, path: impl AsRef<Path>, schema: &Schema) -> Result<Array> {
        let mut stream = match self.buffer_capacity {
            None => ByteStream::from_path(path, self.encoding)?,
            Some(capacity) => {
                ByteStream::with_capacity(capacity, File::open(path)?, self.encoding)
            }
        };
        self.from_stream(&mut stream, schema)
    }

    pub fn from_reader<R: Read>(&self, reader: R, schema: &Schema) -> Result<Array> {
        let mut stream = match self.buffer_capacity {
            None => ByteStream::new(reader, self.encoding),
            Some(capacity) => ByteStream::with_capacity(capacity, reader, self.encoding),
        };
        self.from_stream(&mut stream, schema)
    }

    pub fn from_bytes(&self, bytes: &[u8], schema: &Schema) -> Result<Array> {
        self.from_reader(bytes, schema)
    }

    pub fn from_lines<T>(&self, lines: T, schema: &Schema) -> Result<Array>
    where
        T: IntoIterator,
        T::Item: Into<String>,
    {
        let mut stream = LinesStream::new(lines);
        self.from_stream(&mut stream, schema)
    }

    pub fn from_stream<S: Stream + ?Sized>(&self, stream: &mut S, schema: &Schema) -> Result<Array> {
        let config = self.config()?;
        self.validate_schema(schema)?;
        read_rows(
            stream,
            &config,
            schema,
            self.usecols.as_deref(),
            self.skip_lines,
            self.max_rows,
            &self.converters,
        )
    }
}

/// ~25% growth, rounded up to a whole block (`block` is a power of two).
fn grow_size(rows: usize, block: usize) -> usize {
    let growth = rows >> 2;
    if growth <= block {
        rows + block
    } else {
        rows + ((growth + block - 1) & !(block - 1))
    }
}

/// Resolve the user converter mapping to one optional slot per output
/// column. Keys refer to input columns: with a selection they are matched
/// against it (unmatched keys are silently ignored, matching the legacy
/// semantics); without one, negative keys count from the end.
fn bind_converters<'c>(
    converters: &'c [(isize, Converter)],
    num_fields: usize,
    usecols: Option<&[isize]>,
) -> Result<Vec<Option<&'c Converter>>> {
    let mut slots: Vec<Option<&'c Converter>> = vec![None; num_fields];

    for (key, func) in converters {
        let column = match usecols {
            Some(cols) => match cols.iter().position(|col| col == key) {
                Some(i) => i,
                None => continue,
            },
            None => {
                let n = num_fields as isize;
                if *key < -n || *key >= n {
                    return Err(Error::invalid_argument(format!(
                        "converter specified for column {key}, which is invalid \
                         for the number of fields {num_fields}"
                    )));
                }
                (if *key < 0 { *key + n } else { *key }) as usize
            }
        };
        slots[column] = Some(func);
    }

    Ok(slots)
}

fn parse_error(row: usize, column: usize, desc: &FieldDescriptor, field: &[char]) -> Error {
    Error::Parse {
        row,
        column,
        dtype: desc.dtype.name(),
        field: field.iter().collect(),
    }
}

/// The generic path: build the converter argument from the field, call the
/// callback, and pack whatever it returned through the descriptor.
fn convert_with_converter(
    desc: &FieldDescriptor,
    field: &[char],
    out: &mut [u8],
    config: &ParserConfig,
    func: &Converter,
    row: usize,
    column: usize,
) -> Result<()> {
    let value = if config.byte_mode == ByteConversionMode::Latin1Callback {
        let mut bytes = Vec::with_capacity(field.len());
        for &c in field {
            if c as u32 > 255 {
                return Err(parse_error(row, column, desc, field));
            }
            bytes.push(c as u8);
        }
        func(ConverterArg::Bytes(&bytes))
    } else {
        let text: String = field.iter().collect();
        func(ConverterArg::Str(&text))
    };

    let value = value.map_err(|source| Error::Converter {
        row,
        column,
        source,
    })?;

    convert::pack_value(desc, &value, out).map_err(|_| parse_error(row, column, desc, field))
}

fn read_rows<S: Stream + ?Sized>(
    stream: &mut S,
    config: &ParserConfig,
    schema: &Schema,
    usecols: Option<&[isize]>,
    skip_lines: usize,
    max_rows: Option<usize>,
    converters: &[(isize, Converter)],
) -> Result<Array> {
    let mut tokenizer = Tokenizer::new();
    let homogeneous = schema.is_homogeneous();

    let mut eof = false;
    for _ in 0..skip_lines {
        if tokenizer.skip_line(stream, config)? {
            // Fewer lines than requested is acceptable.
            eof = true;
            break;
        }
    }

    // Known up front with a selection or a structured schema; otherwise
    // discovered from the first non-empty row.
    let mut actual_num_fields = match usecols {
        Some(cols) => Some(cols.len()),
        None if !homogeneous => Some(schema.num_fields()),
        None => None,
    };

    let mut fixed_schema = schema.clone();
    let mut slots: Vec<Option<&Converter>> = Vec::new();
    let mut data: Vec<u8> = Vec::new();
    let mut row_size = 0;
    let mut rows_per_block = 1;
    let mut allocated_rows = 0;
    let mut started = false;
    let mut row_count = 0;

    while !eof && max_rows.map_or(true, |max| row_count < max) {
        eof = tokenizer.tokenize(stream, config)?;
        let current_num_fields = tokenizer.num_fields();
        if current_num_fields == 0 {
            // Empty or fully commented line.
            continue;
        }

        if !started {
            // The first row settles everything that had to wait for the
            // column count: converter binding, string widths, row size and
            // the initial allocation.
            started = true;
            let num_fields = *actual_num_fields.get_or_insert(current_num_fields);

            slots = bind_converters(converters, num_fields, usecols)?;

            if fixed_schema.has_variable_width() {
                let width = (0..current_num_fields)
                    .map(|i| tokenizer.field(i).len())
                    .max()
                    .unwrap_or(0);
                fixed_schema.fix_width(width);
            }

            row_size = fixed_schema.item_row_size();
            if homogeneous {
                row_size *= num_fields;
            }

            allocated_rows = match max_rows {
                Some(max) => max,
                None => {
                    // Speculative geometric blocks targeting at least
                    // MIN_BLOCK_SIZE bytes; a power of two, which the
                    // growth rounding relies on.
                    if row_size == 0 {
                        rows_per_block = 512;
                    } else {
                        let min_rows = (MIN_BLOCK_SIZE + row_size - 1) / row_size;
                        while rows_per_block < min_rows {
                            rows_per_block *= 2;
                        }
                    }
                    rows_per_block
                }
            };

            data.try_reserve(allocated_rows * row_size)?;
            data.resize(allocated_rows * row_size, 0);
        }

        if usecols.is_none() {
            if let Some(expected) = actual_num_fields {
                if expected != current_num_fields {
                    return Err(Error::RaggedRow {
                        row: row_count + 1,
                        expected,
                        found: current_num_fields,
                    });
                }
            }
        }

        if allocated_rows == row_count {
            let new_rows = grow_size(allocated_rows, rows_per_block);
            data.try_reserve(new_rows * row_size - data.len())?;
            data.resize(new_rows * row_size, 0);
            allocated_rows = new_rows;
        }

        let row_base = row_count * row_size;
        for i in 0..slots.len() {
            let (desc, item_offset) = if homogeneous {
                let desc = fixed_schema.field(0);
                (desc, i * desc.item_size())
            } else {
                let desc = fixed_schema.field(i);
                (desc, desc.offset)
            };

            let col = match usecols {
                None => i,
                Some(cols) => {
                    let mut col = cols[i];
                    if col < 0 {
                        col += current_num_fields as isize;
                    }
                    if col < 0 || col as usize >= current_num_fields {
                        return Err(Error::InvalidColumnIndex {
                            index: cols[i],
                            row: row_count + 1,
                            num_fields: current_num_fields,
                        });
                    }
                    col as usize
                }
            };

            let field = tokenizer.field(col);
            let start = row_base + item_offset;
            let item = &mut data[start..start + desc.item_size()];

            match slots[i] {
                Some(func) => convert_with_converter(
                    desc,
                    field,
                    item,
                    config,
                    func,
                    row_count + 1,
                    col + 1,
                )?,
                None => convert::convert_field(desc, field, item, config)
                    .map_err(|_| parse_error(row_count + 1, col + 1, desc, field))?,
            }
        }

        row_count += 1;
    }

    if !started {
        // Nothing was read; if the column count was never discovered we
        // have no choice but to report one column.
        let cols = actual_num_fields.unwrap_or(1);
        let mut row_size = fixed_schema.item_row_size();
        if homogeneous {
            row_size *= cols;
        }
        return Ok(Array::new(fixed_schema, 0, cols, row_size, Vec::new()));
    }

    // Single final trim of the speculative allocation.
    data.truncate(row_count * row_size);
    data.shrink_to_fit();

    let cols = slots.len();
    Ok(Array::new(fixed_schema, row_count, cols, row_size, data))
}
