use std::io::Write;

use typed_csv::{
    Array, ByteOrder, Encoding, Error, FieldType, ReaderBuilder, Schema, Value,
};

fn int_matrix(array: &Array) -> Vec<Vec<i64>> {
    (0..array.row_count())
        .map(|r| {
            (0..array.column_count())
                .map(|c| match array.get(r, c) {
                    Some(Value::Int(v)) => v,
                    other => panic!("expected an integer at ({r}, {c}), got {other:?}"),
                })
                .collect()
        })
        .collect()
}

#[test]
fn reads_int64_matrix() {
    let schema = Schema::scalar(FieldType::Int64);
    let array = ReaderBuilder::new()
        .from_bytes(b"1,2,3\n4,5,6\n", &schema)
        .unwrap();

    assert_eq!(array.shape(), (2, 3));
    assert!(!array.is_structured());
    assert_eq!(int_matrix(&array), vec![vec![1, 2, 3], vec![4, 5, 6]]);

    // The final allocation is exactly rows x row_size.
    assert_eq!(array.as_bytes().len(), 2 * 3 * 8);
    assert_eq!(array.row_size(), 24);
}

#[test]
fn skip_lines_drops_header() {
    let schema = Schema::scalar(FieldType::Int32);
    let array = ReaderBuilder::new()
        .skip_lines(1)
        .from_bytes(b"a,b,c\n1,2,3\n", &schema)
        .unwrap();

    assert_eq!(array.shape(), (1, 3));
    assert_eq!(int_matrix(&array), vec![vec![1, 2, 3]]);
}

#[test]
fn skip_lines_past_end_is_not_an_error() {
    let schema = Schema::scalar(FieldType::Int64);
    let array = ReaderBuilder::new()
        .skip_lines(10)
        .from_bytes(b"1\n2\n", &schema)
        .unwrap();

    assert_eq!(array.shape(), (0, 1));
    assert!(array.as_bytes().is_empty());
}

#[test]
fn structured_row_with_quoted_bytes() {
    let schema = Schema::structured([FieldType::Int32, FieldType::Bytes(8), FieldType::Int32])
        .with_byte_order(ByteOrder::Little);
    let array = ReaderBuilder::new()
        .from_bytes(b"1,\"a,b\",3\n", &schema)
        .unwrap();

    assert_eq!(array.shape(), (1, 3));
    assert!(array.is_structured());
    assert_eq!(array.get(0, 0), Some(Value::Int(1)));
    assert_eq!(array.get(0, 1), Some(Value::Bytes(b"a,b".to_vec())));
    assert_eq!(array.get(0, 2), Some(Value::Int(3)));

    // One packed 16-byte row, string padded with NULs.
    let mut expected = Vec::new();
    expected.extend_from_slice(&1i32.to_le_bytes());
    expected.extend_from_slice(b"a,b\0\0\0\0\0");
    expected.extend_from_slice(&3i32.to_le_bytes());
    assert_eq!(array.as_bytes(), expected.as_slice());
}

#[test]
fn whitespace_delimited_mode() {
    let schema = Schema::scalar(FieldType::Int64);
    let builder = {
        let mut b = ReaderBuilder::new();
        b.delimiter(None);
        b
    };

    let array = builder.from_bytes(b"1 2 3\n", &schema).unwrap();
    assert_eq!(int_matrix(&array), vec![vec![1, 2, 3]]);

    // Runs of spaces and tabs are one boundary; leading and trailing
    // whitespace produce no extra fields.
    let array = builder.from_bytes(b"   1   2\t3\n", &schema).unwrap();
    assert_eq!(int_matrix(&array), vec![vec![1, 2, 3]]);
}

#[test]
fn complex_and_float_columns() {
    let schema = Schema::structured([FieldType::Complex128, FieldType::Float64]);
    let array = ReaderBuilder::new()
        .from_bytes(b"1+2j,3.5\n", &schema)
        .unwrap();

    assert_eq!(array.get(0, 0), Some(Value::Complex(1.0, 2.0)));
    assert_eq!(array.get(0, 1), Some(Value::Float(3.5)));
}

#[test]
fn custom_imaginary_unit() {
    let schema = Schema::scalar(FieldType::Complex64);
    let array = ReaderBuilder::new()
        .imaginary_unit('i')
        .from_bytes(b"2-3i\n", &schema)
        .unwrap();

    assert_eq!(array.get(0, 0), Some(Value::Complex(2.0, -3.0)));
}

#[test]
fn ragged_row_fails_with_row_number() {
    let schema = Schema::scalar(FieldType::Int64);
    let err = ReaderBuilder::new()
        .from_bytes(b"1,2,3\n1,2\n", &schema)
        .unwrap_err();

    match err {
        Error::RaggedRow {
            row,
            expected,
            found,
        } => {
            assert_eq!(row, 2);
            assert_eq!(expected, 3);
            assert_eq!(found, 2);
        }
        other => panic!("expected a ragged-row error, got {other}"),
    }
}

#[test]
fn int64_overflow_is_exact() {
    let schema = Schema::scalar(FieldType::Int64);
    let array = ReaderBuilder::new()
        .from_bytes(b"9223372036854775807\n", &schema)
        .unwrap();
    assert_eq!(array.get(0, 0), Some(Value::Int(i64::MAX)));

    let err = ReaderBuilder::new()
        .from_bytes(b"9223372036854775807\n9223372036854775808\n", &schema)
        .unwrap_err();

    match err {
        Error::Parse { row, column, dtype, field } => {
            assert_eq!(row, 2);
            assert_eq!(column, 1);
            assert_eq!(dtype, "int64");
            assert_eq!(field, "9223372036854775808");
        }
        other => panic!("expected a parse error, got {other}"),
    }
}

#[test]
fn allow_float_for_int_truncates() {
    let schema = Schema::scalar(FieldType::Int32);

    let err = ReaderBuilder::new().from_bytes(b"3.7\n", &schema).unwrap_err();
    assert!(matches!(err, Error::Parse { row: 1, .. }));

    let array = ReaderBuilder::new()
        .allow_float_for_int(true)
        .from_bytes(b"3.7,-3.7,1e2\n", &schema)
        .unwrap();
    assert_eq!(int_matrix(&array), vec![vec![3, -3, 100]]);
}

#[test]
fn comments_and_empty_lines_are_skipped() {
    let schema = Schema::scalar(FieldType::Int64);
    let array = ReaderBuilder::new()
        .from_bytes(b"# header\n1,2\n\n# mid\n3,4 # trailing\n", &schema)
        .unwrap();

    // The default '#' comment also strips trailing parts of data lines.
    let err = array.get(0, 0);
    assert_eq!(err, Some(Value::Int(1)));
    assert_eq!(array.row_count(), 2);
    assert_eq!(array.get(1, 0), Some(Value::Int(3)));
}

#[test]
fn two_codepoint_comment_marker() {
    let schema = Schema::scalar(FieldType::Int64);
    let array = ReaderBuilder::new()
        .comment("//")
        .from_bytes(b"1,2//tail\n3,4\n", &schema)
        .unwrap();

    assert_eq!(int_matrix(&array), vec![vec![1, 2], vec![3, 4]]);
}

#[test]
fn usecols_select_and_reorder() {
    let schema = Schema::scalar(FieldType::Int64);
    let array = ReaderBuilder::new()
        .usecols(&[2, 0])
        .from_bytes(b"1,2,3\n4,5,6\n", &schema)
        .unwrap();
    assert_eq!(int_matrix(&array), vec![vec![3, 1], vec![6, 4]]);

    // Negative indices count from the end of each row.
    let array = ReaderBuilder::new()
        .usecols(&[-1])
        .from_bytes(b"1,2,3\n4,5\n", &schema)
        .unwrap();
    assert_eq!(int_matrix(&array), vec![vec![3], vec![5]]);

    let err = ReaderBuilder::new()
        .usecols(&[4])
        .from_bytes(b"1,2,3\n", &schema)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidColumnIndex {
            index: 4,
            row: 1,
            num_fields: 3,
        }
    ));
}

#[test]
fn user_converters_apply_per_column() {
    let schema = Schema::scalar(FieldType::Int64);
    let array = ReaderBuilder::new()
        .converter(1, |arg| {
            let text = match arg {
                typed_csv::ConverterArg::Str(s) => s.to_string(),
                typed_csv::ConverterArg::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            };
            Ok(Value::Int(text.trim().parse::<i64>()? * 10))
        })
        .from_bytes(b"1,2\n3,4\n", &schema)
        .unwrap();

    assert_eq!(int_matrix(&array), vec![vec![1, 20], vec![3, 40]]);
}

#[test]
fn converter_keys_follow_usecols() {
    let schema = Schema::scalar(FieldType::Int64);

    // The key lives in input-column space and is remapped to the selected
    // output position.
    let array = ReaderBuilder::new()
        .usecols(&[1])
        .converter(1, |_| Ok(Value::Int(99)))
        .from_bytes(b"1,2,3\n", &schema)
        .unwrap();
    assert_eq!(int_matrix(&array), vec![vec![99]]);

    // Keys that match nothing in the selection are silently ignored.
    let array = ReaderBuilder::new()
        .usecols(&[1])
        .converter(0, |_| Ok(Value::Int(99)))
        .from_bytes(b"1,2,3\n", &schema)
        .unwrap();
    assert_eq!(int_matrix(&array), vec![vec![2]]);
}

#[test]
fn converter_failure_aborts_with_context() {
    let schema = Schema::scalar(FieldType::Int64);
    let err = ReaderBuilder::new()
        .converter(0, |_| Err("not today".into()))
        .from_bytes(b"1,2\n", &schema)
        .unwrap_err();

    match err {
        Error::Converter { row, column, source } => {
            assert_eq!(row, 1);
            assert_eq!(column, 1);
            assert_eq!(source.to_string(), "not today");
        }
        other => panic!("expected a converter error, got {other}"),
    }
}

#[test]
fn byte_converters_receive_latin1() {
    let schema = Schema::scalar(FieldType::Int64);
    let array = ReaderBuilder::new()
        .byte_converters(true)
        .converter(0, |arg| match arg {
            typed_csv::ConverterArg::Bytes(b) => Ok(Value::Int(b.len() as i64)),
            typed_csv::ConverterArg::Str(_) => Err("expected bytes".into()),
        })
        .encoding(Encoding::Latin1)
        .from_bytes(b"caf\xe9\n", &schema)
        .unwrap();

    assert_eq!(int_matrix(&array), vec![vec![4]]);
}

#[test]
fn max_rows_limits_and_preallocates() {
    let schema = Schema::scalar(FieldType::Int64);
    let array = ReaderBuilder::new()
        .max_rows(2)
        .from_bytes(b"1\n2\n3\n4\n", &schema)
        .unwrap();
    assert_eq!(int_matrix(&array), vec![vec![1], vec![2]]);

    // Fewer rows than requested trims the allocation.
    let array = ReaderBuilder::new()
        .max_rows(10)
        .from_bytes(b"1\n2\n", &schema)
        .unwrap();
    assert_eq!(array.shape(), (2, 1));
    assert_eq!(array.as_bytes().len(), 16);
}

#[test]
fn unbounded_read_grows_geometrically() {
    let mut input = String::new();
    for i in 0..3000 {
        input.push_str(&format!("{i}\n"));
    }

    let schema = Schema::scalar(FieldType::Int64);
    let array = ReaderBuilder::new()
        .from_bytes(input.as_bytes(), &schema)
        .unwrap();

    assert_eq!(array.shape(), (3000, 1));
    assert_eq!(array.as_bytes().len(), 3000 * 8);
    assert_eq!(array.get(0, 0), Some(Value::Int(0)));
    assert_eq!(array.get(1234, 0), Some(Value::Int(1234)));
    assert_eq!(array.get(2999, 0), Some(Value::Int(2999)));
}

#[test]
fn reads_from_line_iterables() {
    let schema = Schema::scalar(FieldType::Int64);
    let array = ReaderBuilder::new()
        .from_lines(vec!["1,2", "3,4\n", "5,6\r\n"], &schema)
        .unwrap();

    assert_eq!(int_matrix(&array), vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
}

#[test]
fn reads_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"1.5,2.5\n-0.5,3.25\n").unwrap();

    let schema = Schema::scalar(FieldType::Float64);
    let array = ReaderBuilder::new()
        .from_path(file.path(), &schema)
        .unwrap();

    assert_eq!(array.shape(), (2, 2));
    assert_eq!(array.get(0, 0), Some(Value::Float(1.5)));
    assert_eq!(array.get(1, 1), Some(Value::Float(3.25)));
}

#[test]
fn missing_file_is_an_io_error() {
    let schema = Schema::scalar(FieldType::Int64);
    let err = ReaderBuilder::new()
        .from_path("/definitely/not/here.csv", &schema)
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn latin1_bytes_column() {
    let schema = Schema::structured([FieldType::Bytes(4), FieldType::Int8]);
    let array = ReaderBuilder::new()
        .encoding(Encoding::Latin1)
        .from_bytes(b"caf\xe9,1\n", &schema)
        .unwrap();

    assert_eq!(array.get(0, 0), Some(Value::Bytes(b"caf\xe9".to_vec())));
    assert_eq!(array.get(0, 1), Some(Value::Int(1)));
}

#[test]
fn wide_string_width_is_fixed_by_first_row() {
    let schema = Schema::scalar(FieldType::Ucs4(0));
    let array = ReaderBuilder::new()
        .from_bytes("日本,x\nab,cd\n".as_bytes(), &schema)
        .unwrap();

    assert_eq!(array.shape(), (2, 2));
    assert_eq!(array.schema().field(0).dtype, FieldType::Ucs4(2));
    assert_eq!(array.row_size(), 16);
    assert_eq!(array.get(0, 0), Some(Value::Str("日本".to_string())));
    assert_eq!(array.get(0, 1), Some(Value::Str("x".to_string())));
    assert_eq!(array.get(1, 1), Some(Value::Str("cd".to_string())));
}

#[test]
fn bytes_width_discovery_truncates_later_rows() {
    let schema = Schema::scalar(FieldType::Bytes(0));
    let array = ReaderBuilder::new()
        .from_bytes(b"abc,de\nlonger,x\n", &schema)
        .unwrap();

    assert_eq!(array.schema().field(0).dtype, FieldType::Bytes(3));
    assert_eq!(array.get(0, 0), Some(Value::Bytes(b"abc".to_vec())));
    assert_eq!(array.get(1, 0), Some(Value::Bytes(b"lon".to_vec())));
}

#[test]
fn bool_columns_parse_through_integers() {
    let schema = Schema::scalar(FieldType::Bool);
    let array = ReaderBuilder::new()
        .from_bytes(b"1,0\n17,0\n", &schema)
        .unwrap();

    assert_eq!(array.get(0, 0), Some(Value::Bool(true)));
    assert_eq!(array.get(0, 1), Some(Value::Bool(false)));
    assert_eq!(array.get(1, 0), Some(Value::Bool(true)));

    let err = ReaderBuilder::new().from_bytes(b"yes\n", &schema).unwrap_err();
    assert!(matches!(err, Error::Parse { dtype: "bool", .. }));
}

#[test]
fn non_native_byte_order_is_honoured() {
    let schema = Schema::scalar(FieldType::Int32).with_byte_order(ByteOrder::Big);
    let array = ReaderBuilder::new().from_bytes(b"1,2\n", &schema).unwrap();

    assert_eq!(array.as_bytes(), &[0, 0, 0, 1, 0, 0, 0, 2]);
    assert_eq!(array.get(0, 1), Some(Value::Int(2)));
}

#[test]
fn disabled_quoting_keeps_quotes() {
    let schema = Schema::scalar(FieldType::Bytes(4));
    let array = ReaderBuilder::new()
        .quote(None)
        .from_bytes(b"\"a\",b\n", &schema)
        .unwrap();

    assert_eq!(array.get(0, 0), Some(Value::Bytes(b"\"a\"".to_vec())));
    assert_eq!(array.get(0, 1), Some(Value::Bytes(b"b".to_vec())));
}

#[test]
fn empty_input_yields_empty_array() {
    let schema = Schema::scalar(FieldType::Int64);

    let array = ReaderBuilder::new().from_bytes(b"", &schema).unwrap();
    assert_eq!(array.shape(), (0, 1));

    let array = ReaderBuilder::new()
        .from_bytes(b"# nothing\n# here\n", &schema)
        .unwrap();
    assert_eq!(array.shape(), (0, 1));
    assert!(array.as_bytes().is_empty());

    // A structured schema keeps its column count even with no data.
    let structured = Schema::structured([FieldType::Int64, FieldType::Float64]);
    let array = ReaderBuilder::new().from_bytes(b"", &structured).unwrap();
    assert_eq!(array.shape(), (0, 2));
}

#[test]
fn crlf_input_parses_like_lf() {
    let schema = Schema::scalar(FieldType::Int64);
    let array = ReaderBuilder::new()
        .from_bytes(b"1,2\r\n3,4\r\n", &schema)
        .unwrap();
    assert_eq!(int_matrix(&array), vec![vec![1, 2], vec![3, 4]]);
}
