//! Byte-offset index of line boundaries.
//!
//! The index is built in one streaming pass over at most [`WINDOW_BYTES`] of
//! content at a time and stores only offsets, so it is usable for files far
//! larger than memory. Lines end at `\n` or `\r\n`; content that contains
//! carriage returns but no line feed at all is split on bare `\r` instead. A
//! trailing line without a terminator is still a line, and an empty file has
//! none.
//!
//! A bare `\r` inside line-feed terminated content is tolerated unless a
//! request covers the line that holds it; splitting on it would change the
//! result, so [`LineIndex::check_terminators`] reports it as
//! [`TextError::MalformedLineEnding`].

mod scanner;

use std::io::{ErrorKind, Read};
use std::ops::Range;

use serde::Serialize;

use crate::encoding::TextEncoding;
use crate::error::TextError;
use crate::range::{LineRange, ResolvedRange};

use scanner::{Break, Scanner};

/// Size of the buffering window used while scanning.
pub const WINDOW_BYTES: usize = 64 * 1024;

/// Line terminator convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminator {
    /// `\n`.
    Lf,
    /// `\r\n`.
    CrLf,
    /// A bare `\r`.
    Cr,
    /// The final line of a file with no trailing terminator.
    None,
}

impl Terminator {
    /// Terminator text, empty for [`Terminator::None`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
            Self::None => "",
        }
    }
}

/// Byte extent of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    start: u64,
    content_end: u64,
    end: u64,
    terminator: Terminator,
}

impl LineSpan {
    /// Offset of the first byte of the line.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Offset one past the last content byte, excluding the terminator.
    #[must_use]
    pub const fn content_end(&self) -> u64 {
        self.content_end
    }

    /// Offset one past the terminator.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.end
    }

    /// Terminator closing this line.
    #[must_use]
    pub const fn terminator(&self) -> Terminator {
        self.terminator
    }
}

/// Line boundaries of one file or buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    spans: Vec<LineSpan>,
    byte_len: u64,
    bom_len: u64,
    encoding: TextEncoding,
    bare_cr_lines: Vec<usize>,
}

impl LineIndex {
    /// Scans `reader` window by window.
    ///
    /// A byte-order mark matching `encoding` at the very start is excluded
    /// from line 1.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Io`] when reading fails.
    pub fn build<R: Read>(mut reader: R, encoding: TextEncoding) -> Result<Self, TextError> {
        let mut window = vec![0u8; WINDOW_BYTES];
        let first = fill_window(&mut reader, &mut window)?;
        let head = window.get(..first).unwrap_or_default();
        let bom_len = encoding.bom_len(head) as u64;
        let mut scanner = Scanner::new(bom_len, encoding.unit_width(), encoding.is_big_endian());
        scanner.feed(head.get(encoding.bom_len(head)..).unwrap_or_default());
        loop {
            let filled = fill_window(&mut reader, &mut window)?;
            if filled == 0 {
                break;
            }
            scanner.feed(window.get(..filled).unwrap_or_default());
        }
        Ok(Self::assemble(scanner, bom_len, encoding))
    }

    /// Indexes an in-memory buffer.
    #[must_use]
    pub fn from_bytes(bytes: &[u8], encoding: TextEncoding) -> Self {
        let bom = encoding.bom_len(bytes);
        let mut scanner = Scanner::new(bom as u64, encoding.unit_width(), encoding.is_big_endian());
        scanner.feed(bytes.get(bom..).unwrap_or_default());
        Self::assemble(scanner, bom as u64, encoding)
    }

    fn assemble(mut scanner: Scanner, bom_len: u64, encoding: TextEncoding) -> Self {
        scanner.finish();
        let byte_len = scanner.fed();
        let cr_only = scanner.breaks.is_empty() && !scanner.bare_crs.is_empty();
        let breaks: Vec<Break> = if cr_only {
            let width = encoding.unit_width();
            scanner
                .bare_crs
                .iter()
                .map(|&cr| Break {
                    content_end: cr,
                    end: cr + width,
                    terminator: Terminator::Cr,
                })
                .collect()
        } else {
            std::mem::take(&mut scanner.breaks)
        };

        let mut spans = Vec::with_capacity(breaks.len() + 1);
        let mut start = bom_len;
        for brk in breaks {
            spans.push(LineSpan {
                start,
                content_end: brk.content_end,
                end: brk.end,
                terminator: brk.terminator,
            });
            start = brk.end;
        }
        if start < byte_len {
            spans.push(LineSpan {
                start,
                content_end: byte_len,
                end: byte_len,
                terminator: Terminator::None,
            });
        }

        let bare_cr_lines = if cr_only {
            Vec::new()
        } else {
            let mut lines: Vec<usize> = scanner
                .bare_crs
                .iter()
                .map(|&cr| spans.partition_point(|span| span.end <= cr) + 1)
                .collect();
            lines.dedup();
            lines
        };

        Self {
            spans,
            byte_len,
            bom_len,
            encoding,
            bare_cr_lines,
        }
    }

    /// Number of lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.spans.len()
    }

    /// Total size in bytes, including any byte-order mark.
    #[must_use]
    pub const fn byte_len(&self) -> u64 {
        self.byte_len
    }

    /// Length of the byte-order mark skipped before line 1.
    #[must_use]
    pub const fn bom_len(&self) -> u64 {
        self.bom_len
    }

    /// Encoding the index was built for.
    #[must_use]
    pub const fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Span of the one-based `line`.
    #[must_use]
    pub fn span(&self, line: usize) -> Option<&LineSpan> {
        line.checked_sub(1).and_then(|index| self.spans.get(index))
    }

    /// All spans in file order.
    #[must_use]
    pub fn spans(&self) -> &[LineSpan] {
        &self.spans
    }

    /// True when the last line carries a terminator.
    #[must_use]
    pub fn ends_with_terminator(&self) -> bool {
        self.spans
            .last()
            .is_some_and(|span| span.terminator != Terminator::None)
    }

    /// Most common terminator, preferring `\n` on ties and for content with
    /// no terminator at all.
    #[must_use]
    pub fn dominant_terminator(&self) -> Terminator {
        let mut counts = [0usize; 3];
        for span in &self.spans {
            let slot = match span.terminator {
                Terminator::Lf => counts.get_mut(0),
                Terminator::CrLf => counts.get_mut(1),
                Terminator::Cr => counts.get_mut(2),
                Terminator::None => None,
            };
            if let Some(count) = slot {
                *count += 1;
            }
        }
        let [lf, crlf, cr] = counts;
        if crlf > lf && crlf >= cr {
            Terminator::CrLf
        } else if cr > lf && cr > crlf {
            Terminator::Cr
        } else {
            Terminator::Lf
        }
    }

    /// Checks `range` against the line count, clamping an overlong end.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::RangeOutOfBounds`] when the range starts past
    /// the last line.
    pub fn resolve(&self, range: LineRange) -> Result<ResolvedRange, TextError> {
        let total = self.line_count();
        if range.start() > total {
            return Err(TextError::RangeOutOfBounds {
                start: range.start(),
                total,
            });
        }
        let end = range.end().min(total);
        Ok(ResolvedRange::new(range.start(), end, end != range.end()))
    }

    /// Checks `range` without clamping: the whole range must exist.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::RangeOutOfBounds`] when either end lies past the
    /// last line.
    pub fn resolve_exact(&self, range: LineRange) -> Result<ResolvedRange, TextError> {
        let total = self.line_count();
        if range.end() > total {
            return Err(TextError::RangeOutOfBounds {
                start: range.start(),
                total,
            });
        }
        Ok(ResolvedRange::new(range.start(), range.end(), false))
    }

    /// Rejects a range covering a line with a bare carriage return.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::MalformedLineEnding`] naming the first such line.
    pub fn check_terminators(&self, range: ResolvedRange) -> Result<(), TextError> {
        match self
            .bare_cr_lines
            .iter()
            .find(|&&line| line >= range.start() && line <= range.end())
        {
            Some(&line) => Err(TextError::MalformedLineEnding { line }),
            None => Ok(()),
        }
    }

    /// Byte range from the start of the first line to the end of the last
    /// line's terminator.
    #[must_use]
    pub fn byte_range(&self, range: ResolvedRange) -> Range<u64> {
        let start = self.span(range.start()).map_or(self.byte_len, LineSpan::start);
        let end = self.span(range.end()).map_or(self.byte_len, LineSpan::end);
        start..end
    }
}

/// Reads until `window` is full or the reader is exhausted.
fn fill_window<R: Read>(reader: &mut R, window: &mut [u8]) -> Result<usize, TextError> {
    let mut filled = 0;
    while filled < window.len() {
        let Some(rest) = window.get_mut(filled..) else {
            break;
        };
        match reader.read(rest) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(error) => return Err(error.into()),
        }
    }
    Ok(filled)
}
