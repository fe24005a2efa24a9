//! A high-throughput reader turning delimited text (CSV and friends) into
//! dense, typed arrays.
//!
//! The input is tokenized by a small state machine that understands
//! quoting, doubled quotes, comments, universal newlines and
//! whitespace-delimited mode; each field is then converted straight into
//! its binary representation (integers with exact overflow bounds, floats,
//! complex numbers, fixed-width byte and wide strings) inside one
//! contiguous output buffer. The caller provides the schema up front;
//! nothing is sniffed from the data.
//!
//! ```
//! use typed_csv::{FieldType, ReaderBuilder, Schema, Value};
//!
//! let schema = Schema::scalar(FieldType::Int64);
//! let array = ReaderBuilder::new()
//!     .from_bytes(b"1,2,3\n4,5,6\n", &schema)
//!     .unwrap();
//!
//! assert_eq!(array.shape(), (2, 3));
//! assert_eq!(array.get(1, 2), Some(Value::Int(6)));
//! ```

mod array;
mod config;
mod convert;
mod error;
mod field_types;
mod reader;
mod stream;
mod tokenizer;

pub use array::Array;
pub use convert::Value;
pub use error::{BoxError, Error, Result};
pub use field_types::{ByteOrder, FieldDescriptor, FieldType, Schema};
pub use reader::{Converter, ConverterArg, ReaderBuilder};
pub use stream::{BufferState, ByteStream, Encoding, LinesStream, Stream};
