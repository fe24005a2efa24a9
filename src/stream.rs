use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::iter::Fuse;
use std::path::Path;

use memchr::memchr2;

use crate::error::{Error, Result};

/// Encoding of a byte source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

impl Encoding {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Latin1 => "latin-1",
        }
    }
}

/// What the tokenizer may assume about a delivered buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// The buffer can hold any number of line terminators.
    MayContainNewline,
    /// The buffer is exactly one line, terminated at its end. Lets the
    /// tokenizer skip a commented line by dropping the rest of the buffer.
    NoNewline,
    /// No more data.
    Eof,
}

/// A source of Unicode codepoints, delivered one buffer at a time.
///
/// `\r\n` is collapsed to `\n` on read. The tokenizer consumes the buffer
/// it was handed until exhaustion, then asks for the next one; anything it
/// wants to keep across that call it must copy out first.
pub trait Stream {
    /// Replace the contents of `buf` with the next run of codepoints.
    ///
    /// An empty `buf` is only valid together with [`BufferState::Eof`];
    /// after that, every further call reports `Eof` again.
    fn next_buffer(&mut self, buf: &mut Vec<char>) -> Result<BufferState>;

    /// 1-based line number, advanced once per logical newline delivered.
    fn line_number(&self) -> usize;
}

#[inline(always)]
fn utf8_sequence_len(byte: u8) -> Option<usize> {
    match byte {
        0x00..=0x7f => Some(1),
        0xc0..=0xdf => Some(2),
        0xe0..=0xef => Some(3),
        0xf0..=0xf7 => Some(4),
        _ => None,
    }
}

/// Incremental byte-to-codepoint decoder with `\r\n` collapsing and line
/// accounting. Kept apart from the reader so buffers borrowed from the
/// inner `BufReader` can be fed to it without aliasing trouble.
struct Decoder {
    encoding: Encoding,
    line: usize,
    /// Leading bytes of a codepoint split across two chunks.
    pending: Vec<u8>,
    /// A `\r` was seen and may pair with a `\n` in the next chunk.
    pending_cr: bool,
    last_newline: Option<char>,
    at_start: bool,
}

impl Decoder {
    fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            line: 1,
            pending: Vec::new(),
            pending_cr: false,
            last_newline: None,
            at_start: true,
        }
    }

    fn decode_error(&self) -> Error {
        Error::Decode {
            encoding: self.encoding.name(),
            line: self.line,
        }
    }

    fn feed(&mut self, mut bytes: &[u8], out: &mut Vec<char>) -> Result<()> {
        if !self.pending.is_empty() {
            let width = match utf8_sequence_len(self.pending[0]) {
                Some(width) => width,
                None => return Err(self.decode_error()),
            };
            while self.pending.len() < width && !bytes.is_empty() {
                self.pending.push(bytes[0]);
                bytes = &bytes[1..];
            }
            if self.pending.len() < width {
                return Ok(());
            }

            let mut seq = [0u8; 4];
            seq[..width].copy_from_slice(&self.pending);
            self.pending.clear();
            match std::str::from_utf8(&seq[..width]) {
                Ok(s) => self.emit_str(s, out),
                Err(_) => return Err(self.decode_error()),
            }
        }

        match self.encoding {
            Encoding::Utf8 => self.feed_utf8(bytes, out),
            Encoding::Latin1 => {
                self.feed_latin1(bytes, out);
                Ok(())
            }
        }
    }

    fn feed_utf8(&mut self, bytes: &[u8], out: &mut Vec<char>) -> Result<()> {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                self.emit_str(s, out);
                Ok(())
            }
            Err(err) => {
                let valid = err.valid_up_to();
                let head = std::str::from_utf8(&bytes[..valid]).map_err(|_| self.decode_error())?;
                self.emit_str(head, out);
                match err.error_len() {
                    Some(_) => Err(self.decode_error()),
                    None => {
                        // A codepoint was split across chunks.
                        self.pending.extend_from_slice(&bytes[valid..]);
                        Ok(())
                    }
                }
            }
        }
    }

    fn feed_latin1(&mut self, bytes: &[u8], out: &mut Vec<char>) {
        let mut pos = 0;
        while pos < bytes.len() {
            match memchr2(b'\r', b'\n', &bytes[pos..]) {
                None => {
                    self.flush_latin1_plain(&bytes[pos..], out);
                    break;
                }
                Some(offset) => {
                    self.flush_latin1_plain(&bytes[pos..pos + offset], out);
                    self.push_terminator(bytes[pos + offset], out);
                    pos += offset + 1;
                }
            }
        }
    }

    fn emit_str(&mut self, mut s: &str, out: &mut Vec<char>) {
        if s.is_empty() {
            return;
        }
        if self.at_start {
            self.at_start = false;
            if let Some(rest) = s.strip_prefix('\u{feff}') {
                s = rest;
            }
        }

        let bytes = s.as_bytes();
        let mut pos = 0;
        while pos < bytes.len() {
            match memchr2(b'\r', b'\n', &bytes[pos..]) {
                None => {
                    self.flush_plain(&s[pos..], out);
                    break;
                }
                Some(offset) => {
                    self.flush_plain(&s[pos..pos + offset], out);
                    self.push_terminator(bytes[pos + offset], out);
                    pos += offset + 1;
                }
            }
        }
    }

    fn flush_plain(&mut self, s: &str, out: &mut Vec<char>) {
        if s.is_empty() {
            return;
        }
        if self.pending_cr {
            self.pending_cr = false;
            self.push_lone_cr(out);
        }
        out.extend(s.chars());
        self.last_newline = None;
    }

    fn flush_latin1_plain(&mut self, bytes: &[u8], out: &mut Vec<char>) {
        if bytes.is_empty() {
            return;
        }
        if self.pending_cr {
            self.pending_cr = false;
            self.push_lone_cr(out);
        }
        out.extend(bytes.iter().map(|&b| b as char));
        self.last_newline = None;
    }

    /// A carriage return not followed by a line feed is a line terminator
    /// of its own, unless it trails a line feed (the `\n\r` pair counts as
    /// one logical newline).
    fn push_lone_cr(&mut self, out: &mut Vec<char>) {
        if self.last_newline != Some('\n') {
            self.line += 1;
        }
        self.last_newline = Some('\r');
        out.push('\r');
    }

    fn push_terminator(&mut self, byte: u8, out: &mut Vec<char>) {
        if byte == b'\r' {
            if self.pending_cr {
                self.push_lone_cr(out);
            }
            self.pending_cr = true;
        } else {
            // Plain `\n`, or the second half of a collapsed `\r\n`.
            self.pending_cr = false;
            self.line += 1;
            self.last_newline = Some('\n');
            out.push('\n');
        }
    }

    fn finish(&mut self, out: &mut Vec<char>) {
        if self.pending_cr {
            self.pending_cr = false;
            self.push_lone_cr(out);
        }
    }
}

/// Stream over any [`Read`] source with a configurable encoding.
pub struct ByteStream<R> {
    inner: BufReader<R>,
    decoder: Decoder,
}

impl ByteStream<File> {
    pub fn from_path(path: impl AsRef<Path>, encoding: Encoding) -> Result<Self> {
        Ok(Self::new(File::open(path)?, encoding))
    }
}

impl<R: Read> ByteStream<R> {
    pub fn new(reader: R, encoding: Encoding) -> Self {
        Self {
            inner: BufReader::new(reader),
            decoder: Decoder::new(encoding),
        }
    }

    pub fn with_capacity(capacity: usize, reader: R, encoding: Encoding) -> Self {
        Self {
            inner: BufReader::with_capacity(capacity, reader),
            decoder: Decoder::new(encoding),
        }
    }
}

impl<R: Read> Stream for ByteStream<R> {
    fn next_buffer(&mut self, buf: &mut Vec<char>) -> Result<BufferState> {
        buf.clear();

        loop {
            let chunk = self.inner.fill_buf()?;

            if chunk.is_empty() {
                if !self.decoder.pending.is_empty() {
                    return Err(self.decoder.decode_error());
                }
                self.decoder.finish(buf);
                if buf.is_empty() {
                    return Ok(BufferState::Eof);
                }
                return Ok(BufferState::MayContainNewline);
            }

            let len = chunk.len();
            let fed = self.decoder.feed(chunk, buf);
            self.inner.consume(len);
            fed?;

            if !buf.is_empty() {
                return Ok(BufferState::MayContainNewline);
            }
            // The whole chunk went into carry-over state; read more.
        }
    }

    #[inline(always)]
    fn line_number(&self) -> usize {
        self.decoder.line
    }
}

/// Stream over an iterable of lines; each item becomes one buffer ending
/// in a single `\n` (any trailing terminator of the item is normalised).
pub struct LinesStream<I: Iterator> {
    iter: Fuse<I>,
    line: usize,
}

impl<I: Iterator> LinesStream<I>
where
    I::Item: Into<String>,
{
    pub fn new<T: IntoIterator<IntoIter = I>>(lines: T) -> Self {
        Self {
            iter: lines.into_iter().fuse(),
            line: 1,
        }
    }
}

impl<I: Iterator> Stream for LinesStream<I>
where
    I::Item: Into<String>,
{
    fn next_buffer(&mut self, buf: &mut Vec<char>) -> Result<BufferState> {
        buf.clear();

        match self.iter.next() {
            None => Ok(BufferState::Eof),
            Some(item) => {
                let line: String = item.into();
                let text = line
                    .strip_suffix("\r\n")
                    .or_else(|| line.strip_suffix('\n'))
                    .or_else(|| line.strip_suffix('\r'))
                    .unwrap_or(&line);

                buf.extend(text.chars());
                buf.push('\n');
                self.line += 1;

                Ok(BufferState::NoNewline)
            }
        }
    }

    #[inline(always)]
    fn line_number(&self) -> usize {
        self.line
    }
}
