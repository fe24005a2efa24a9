/// Comment marker recognised by the tokenizer.
///
/// A two-codepoint marker only triggers when both codepoints match; the
/// second one is checked with a single codepoint of look-ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comment {
    Disabled,
    Single(char),
    Double(char, char),
}

impl Comment {
    #[inline(always)]
    pub(crate) fn first(&self) -> Option<char> {
        match *self {
            Comment::Disabled => None,
            Comment::Single(c) => Some(c),
            Comment::Double(c, _) => Some(c),
        }
    }

    #[inline(always)]
    pub(crate) fn second(&self) -> Option<char> {
        match *self {
            Comment::Double(_, c) => Some(c),
            _ => None,
        }
    }
}

/// Routing of field text when building converter arguments.
///
/// `Latin1Callback` hands user converters the Latin-1 encoding of the field
/// instead of a string. `Latin1Default` requests the same routing for the
/// built-in path, which already operates in the Latin-1 range for byte
/// string columns, so it only changes what user converters receive when
/// both are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteConversionMode {
    #[default]
    None,
    Latin1Callback,
    Latin1Default,
}

/// Immutable parsing configuration shared by the tokenizer and the
/// converters for the duration of one read.
///
/// `delimiter == None` selects whitespace-delimited mode: any run of spaces
/// or tabs is a single field boundary and `ignore_leading_whitespace` is
/// forced on.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub(crate) delimiter: Option<char>,
    pub(crate) comment: Comment,
    pub(crate) quote: Option<char>,
    pub(crate) imaginary_unit: char,
    pub(crate) allow_embedded_newline: bool,
    pub(crate) ignore_leading_whitespace: bool,
    pub(crate) allow_float_for_int: bool,
    pub(crate) byte_mode: ByteConversionMode,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            delimiter: Some(','),
            comment: Comment::Disabled,
            quote: Some('"'),
            imaginary_unit: 'j',
            allow_embedded_newline: true,
            ignore_leading_whitespace: false,
            allow_float_for_int: false,
            byte_mode: ByteConversionMode::None,
        }
    }
}

impl ParserConfig {
    /// True if `c` ends a field in the current delimiter mode.
    #[inline(always)]
    pub(crate) fn is_delimiter(&self, c: char) -> bool {
        match self.delimiter {
            Some(d) => c == d,
            None => c == ' ' || c == '\t',
        }
    }

    #[inline(always)]
    pub(crate) fn whitespace_delimited(&self) -> bool {
        self.delimiter.is_none()
    }

    /// Leading codepoints skipped at the start of a field.
    #[inline(always)]
    pub(crate) fn is_leading_whitespace(&self, c: char) -> bool {
        if self.whitespace_delimited() {
            c == ' ' || c == '\t'
        } else {
            c == ' '
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_mode() {
        let mut config = ParserConfig::default();
        assert!(config.is_delimiter(','));
        assert!(!config.is_delimiter('\t'));

        config.delimiter = None;
        assert!(config.is_delimiter(' '));
        assert!(config.is_delimiter('\t'));
        assert!(!config.is_delimiter(','));
        assert!(config.is_leading_whitespace('\t'));
    }

    #[test]
    fn test_comment_markers() {
        assert_eq!(Comment::Disabled.first(), None);
        assert_eq!(Comment::Single('#').first(), Some('#'));
        assert_eq!(Comment::Single('#').second(), None);
        assert_eq!(Comment::Double('/', '/').second(), Some('/'));
    }
}
