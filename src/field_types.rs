/// Byte order of one output column.
///
/// `Native` resolves to the target's order; the converters honor `Little`
/// and `Big` by writing swapped bytes for one element at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Native,
    Little,
    Big,
}

impl ByteOrder {
    #[inline(always)]
    pub(crate) fn is_little(self) -> bool {
        match self {
            ByteOrder::Native => cfg!(target_endian = "little"),
            ByteOrder::Little => true,
            ByteOrder::Big => false,
        }
    }
}

/// Element type of an output column.
///
/// `Bytes` holds Latin-1 codepoints, one byte each; `Ucs4` holds raw
/// codepoints, four bytes each. For both, the width is a field count and a
/// width of zero in a homogeneous schema means "fix the width from the
/// first row".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Bytes(usize),
    Ucs4(usize),
}

impl FieldType {
    /// Size in bytes of one element of this type.
    pub fn item_size(&self) -> usize {
        match *self {
            FieldType::Bool | FieldType::Int8 | FieldType::UInt8 => 1,
            FieldType::Int16 | FieldType::UInt16 => 2,
            FieldType::Int32 | FieldType::UInt32 | FieldType::Float32 => 4,
            FieldType::Int64 | FieldType::UInt64 | FieldType::Float64 | FieldType::Complex64 => 8,
            FieldType::Complex128 => 16,
            FieldType::Bytes(n) => n,
            FieldType::Ucs4(n) => 4 * n,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match *self {
            FieldType::Bool => "bool",
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::UInt8 => "uint8",
            FieldType::UInt16 => "uint16",
            FieldType::UInt32 => "uint32",
            FieldType::UInt64 => "uint64",
            FieldType::Float32 => "float32",
            FieldType::Float64 => "float64",
            FieldType::Complex64 => "complex64",
            FieldType::Complex128 => "complex128",
            FieldType::Bytes(_) => "bytes",
            FieldType::Ucs4(_) => "ucs4",
        }
    }

    #[inline(always)]
    pub(crate) fn is_variable_width(&self) -> bool {
        matches!(*self, FieldType::Bytes(0) | FieldType::Ucs4(0))
    }
}

/// One column of the output: element type, byte order and, for structured
/// output, the byte offset of the column inside a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub dtype: FieldType,
    pub order: ByteOrder,
    pub(crate) offset: usize,
}

impl FieldDescriptor {
    #[inline(always)]
    pub fn item_size(&self) -> usize {
        self.dtype.item_size()
    }
}

/// The output element layout derived from the caller's dtype.
///
/// A scalar schema describes a homogeneous 2-D result where every column
/// shares the single descriptor; a structured schema describes a 1-D result
/// of fixed tuples with one descriptor per column, packed without padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
    homogeneous: bool,
}

impl Schema {
    pub fn scalar(dtype: FieldType) -> Self {
        Self {
            fields: vec![FieldDescriptor {
                dtype,
                order: ByteOrder::Native,
                offset: 0,
            }],
            homogeneous: true,
        }
    }

    pub fn structured<I: IntoIterator<Item = FieldType>>(dtypes: I) -> Self {
        let mut fields = Vec::new();
        let mut offset = 0;

        for dtype in dtypes {
            fields.push(FieldDescriptor {
                dtype,
                order: ByteOrder::Native,
                offset,
            });
            offset += dtype.item_size();
        }

        Self {
            fields,
            homogeneous: false,
        }
    }

    /// Apply `order` to every column.
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        for field in &mut self.fields {
            field.order = order;
        }
        self
    }

    #[inline(always)]
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    #[inline(always)]
    pub fn is_homogeneous(&self) -> bool {
        self.homogeneous
    }

    #[inline(always)]
    pub fn field(&self, i: usize) -> &FieldDescriptor {
        &self.fields[i]
    }

    /// Byte size of one structured row, or of one element if homogeneous.
    pub(crate) fn item_row_size(&self) -> usize {
        if self.homogeneous {
            self.fields[0].item_size()
        } else {
            self.fields
                .iter()
                .map(|field| field.item_size())
                .sum()
        }
    }

    #[inline(always)]
    pub(crate) fn has_variable_width(&self) -> bool {
        self.homogeneous && self.fields[0].dtype.is_variable_width()
    }

    /// Fix the width of a variable-width scalar element, in codepoints.
    pub(crate) fn fix_width(&mut self, width: usize) {
        let field = &mut self.fields[0];
        field.dtype = match field.dtype {
            FieldType::Bytes(0) => FieldType::Bytes(width),
            FieldType::Ucs4(0) => FieldType::Ucs4(width),
            other => other,
        };
    }
}
