use crate::config::ParserConfig;
use crate::error::{Error, Result};
use crate::stream::{BufferState, Stream};

// How quoted fields are parsed: quoting is only activated when the first
// codepoint of a field (after optional leading-whitespace skipping) is the
// quote character. While active, delimiters are plain data. A second quote
// deactivates it, except that two consecutive quotes stand for one literal
// quote. Codepoints between a closing quote and the next delimiter are
// appended to the field unquoted, so `12.3,"ABC"DEF,XY"Z` has the fields
// `12.3`, `ABCDEF` and `XY"Z`. There is no option to trim whitespace at
// the end of a field.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Start of a new field.
    Init,
    Unquoted,
    Quoted,
    /// Just saw a quote inside a quoted field; is it doubled?
    QuotedCheckDoubleQuote,
    /// First codepoint of a two-codepoint comment marker matched.
    CheckComment,
    /// Consume the (possibly two-codepoint) line terminator and end the row.
    EatNewline,
    /// Discard everything up to the end of the line.
    FinalizeLine,
    /// Flush the last field once the stream is exhausted.
    FinalizeFile,
}

impl State {
    /// States in which no field is currently being accumulated.
    #[inline(always)]
    fn outside_field(self) -> bool {
        matches!(
            self,
            State::Init | State::EatNewline | State::FinalizeLine | State::FinalizeFile
        )
    }
}

/// Location of one field inside the tokenizer's row buffer.
///
/// The table always carries one extra trailing span, so the length of
/// field `i` is `spans[i + 1].offset - spans[i].offset - 1` and every
/// field is NUL-terminated without further bookkeeping.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldSpan {
    pub(crate) offset: usize,
    pub(crate) quoted: bool,
}

enum Chunk {
    Range(usize, usize),
    Literal(char),
}

#[inline(always)]
fn next_size(size: usize) -> usize {
    (size + 3) & !3
}

/// Splits a stream of codepoints into rows of NUL-separated fields.
///
/// The row buffer and the span table are allocated on first use and reused
/// across rows; the current word is copied out of the stream buffer chunk
/// by chunk, so nothing has to survive a `next_buffer` call.
pub(crate) struct Tokenizer {
    state: State,
    buf: Vec<char>,
    pos: usize,
    buf_state: BufferState,
    row: Vec<char>,
    spans: Vec<FieldSpan>,
    num_fields: usize,
}

impl Tokenizer {
    pub(crate) fn new() -> Self {
        Self {
            state: State::Init,
            buf: Vec::new(),
            pos: 0,
            buf_state: BufferState::MayContainNewline,
            row: Vec::new(),
            spans: Vec::new(),
            num_fields: 0,
        }
    }

    #[inline(always)]
    pub(crate) fn num_fields(&self) -> usize {
        self.num_fields
    }

    #[inline(always)]
    pub(crate) fn field(&self, i: usize) -> &[char] {
        let start = self.spans[i].offset;
        let end = self.spans[i + 1].offset - 1;
        &self.row[start..end]
    }

    #[inline(always)]
    pub(crate) fn field_quoted(&self, i: usize) -> bool {
        self.spans[i].quoted
    }

    fn reserve_row(&mut self, chunk_len: usize) -> Result<()> {
        // Room for the chunk plus the NUL sentinel, rounded up to the next
        // multiple of four.
        let needed = self.row.len() + chunk_len + 1;
        if self.row.capacity() < needed {
            let target = next_size(needed);
            self.row.try_reserve(target - self.row.len())?;
        }
        Ok(())
    }

    fn copy_range(&mut self, start: usize, end: usize) -> Result<()> {
        self.reserve_row(end - start)?;
        self.row.extend_from_slice(&self.buf[start..end]);
        Ok(())
    }

    fn copy_literal(&mut self, c: char) -> Result<()> {
        self.reserve_row(1)?;
        self.row.push(c);
        Ok(())
    }

    fn push_span(&mut self, offset: usize, quoted: bool) -> Result<()> {
        if self.spans.len() == self.spans.capacity() {
            let target = next_size(self.spans.len() + 1);
            self.spans.try_reserve(target - self.spans.len())?;
        }
        self.spans.push(FieldSpan { offset, quoted });
        Ok(())
    }

    fn add_field(&mut self, word_start: usize, quoted: bool) -> Result<()> {
        // reserve_row already guaranteed room for the sentinel.
        self.row.push('\0');
        self.push_span(word_start, quoted)?;
        self.num_fields += 1;
        Ok(())
    }

    /// Fast-forward to the end of the current line, discarding it.
    pub(crate) fn skip_line<S: Stream + ?Sized>(
        &mut self,
        stream: &mut S,
        config: &ParserConfig,
    ) -> Result<bool> {
        self.state = State::FinalizeLine;
        self.tokenize(stream, config)
    }

    /// Tokenize one row. Returns `true` once the end of the stream has
    /// been reached; the final row's fields (if any) are still available
    /// in that case.
    pub(crate) fn tokenize<S: Stream + ?Sized>(
        &mut self,
        stream: &mut S,
        config: &ParserConfig,
    ) -> Result<bool> {
        let comment_first = config.comment.first();
        let comment_second = config.comment.second();

        self.row.clear();
        self.spans.clear();
        self.num_fields = 0;

        let mut quoted = false;
        let mut started = false;
        let mut word_start = 0;
        let mut reached_eof = false;

        'row: loop {
            if self.pos >= self.buf.len() {
                self.buf_state = stream.next_buffer(&mut self.buf)?;
                self.pos = 0;

                if self.buf.is_empty() {
                    if self.buf_state != BufferState::Eof {
                        return Err(Error::EmptyBuffer);
                    }
                    if self.state.outside_field() {
                        reached_eof = true;
                        break 'row;
                    }
                    // The last field may still need to be flushed.
                    self.state = State::FinalizeFile;
                }
            }

            let mut chunk: Option<Chunk> = None;

            match self.state {
                State::Init => {
                    if config.ignore_leading_whitespace {
                        while self.pos < self.buf.len()
                            && config.is_leading_whitespace(self.buf[self.pos])
                        {
                            self.pos += 1;
                        }
                        if self.pos == self.buf.len() {
                            continue 'row;
                        }
                    }

                    let c = self.buf[self.pos];
                    if config.whitespace_delimited() && (c == '\r' || c == '\n') {
                        // Whitespace before the terminator is not another
                        // (empty) field.
                        self.state = State::EatNewline;
                    } else if Some(c) == config.quote {
                        quoted = true;
                        self.state = State::Quoted;
                        self.pos += 1;
                    } else {
                        quoted = false;
                        self.state = State::Unquoted;
                    }
                }

                State::Unquoted => {
                    let start = self.pos;
                    let mut i = self.pos;
                    let mut matched = false;

                    while i < self.buf.len() {
                        let c = self.buf[i];
                        if c == '\r' || c == '\n' {
                            self.state = State::EatNewline;
                            matched = true;
                            break;
                        } else if config.is_delimiter(c) {
                            self.state = State::Init;
                            matched = true;
                            break;
                        } else if Some(c) == comment_first {
                            self.state = if comment_second.is_some() {
                                State::CheckComment
                            } else {
                                State::FinalizeLine
                            };
                            matched = true;
                            break;
                        }
                        i += 1;
                    }

                    chunk = Some(Chunk::Range(start, i));
                    self.pos = if matched { i + 1 } else { i };
                }

                State::Quoted => {
                    let start = self.pos;
                    let mut i = self.pos;
                    let mut matched = false;

                    while i < self.buf.len() {
                        let c = self.buf[i];
                        if !config.allow_embedded_newline && (c == '\r' || c == '\n') {
                            self.state = State::EatNewline;
                            matched = true;
                            break;
                        } else if Some(c) == config.quote {
                            self.state = State::QuotedCheckDoubleQuote;
                            matched = true;
                            break;
                        }
                        i += 1;
                    }

                    chunk = Some(Chunk::Range(start, i));
                    self.pos = if matched { i + 1 } else { i };
                }

                State::CheckComment => {
                    if Some(self.buf[self.pos]) == comment_second {
                        self.state = State::FinalizeLine;
                        self.pos += 1;
                    } else {
                        // Not a comment after all; the first marker
                        // codepoint belongs to the field.
                        self.state = State::Unquoted;
                        if let Some(c) = comment_first {
                            chunk = Some(Chunk::Literal(c));
                        }
                    }
                }

                State::QuotedCheckDoubleQuote => {
                    if Some(self.buf[self.pos]) == config.quote {
                        // Doubled quote: one literal quote joins the field.
                        if let Some(c) = config.quote {
                            chunk = Some(Chunk::Literal(c));
                        }
                        self.state = State::Quoted;
                        self.pos += 1;
                    } else {
                        // The earlier quote was the closing one; continue
                        // unquoted up to the delimiter.
                        self.state = State::Unquoted;
                    }
                }

                State::FinalizeLine => {
                    if self.buf_state != BufferState::MayContainNewline {
                        // The buffer is a single line: drop the rest of it.
                        self.state = State::Init;
                        self.pos = self.buf.len();
                        break 'row;
                    }

                    let mut i = self.pos;
                    while i < self.buf.len() {
                        let c = self.buf[i];
                        if c == '\r' || c == '\n' {
                            self.state = State::EatNewline;
                            break;
                        }
                        i += 1;
                    }
                    self.pos = i;
                }

                State::EatNewline => {
                    // Universal newlines: `\n` alone, `\r` alone, or either
                    // following the other is a single line break.
                    self.state = State::Init;
                    let c = self.buf[self.pos];
                    if c == '\n' || c == '\r' {
                        self.pos += 1;
                    }
                    break 'row;
                }

                State::FinalizeFile => {
                    // Nothing to scan; the last word is flushed below.
                }
            }

            match chunk {
                Some(Chunk::Range(start, end)) => {
                    if !started {
                        started = true;
                        word_start = self.row.len();
                    }
                    self.copy_range(start, end)?;
                }
                Some(Chunk::Literal(c)) => {
                    if !started {
                        started = true;
                        word_start = self.row.len();
                    }
                    self.copy_literal(c)?;
                }
                None => {}
            }

            if started && self.state.outside_field() {
                self.add_field(word_start, quoted)?;
                started = false;
            }
        }

        self.push_span(self.row.len(), false)?;

        // A lone empty field is an empty row; callers skip those.
        if self.num_fields == 1 && self.field(0).is_empty() {
            self.num_fields = 0;
        }

        Ok(reached_eof)
    }
}
