//! Incremental terminator scanner fed one window at a time.

use super::Terminator;

const LF: u16 = 0x0A;
const CR: u16 = 0x0D;

/// A recognised `\n` or `\r\n` terminator.
#[derive(Debug, Clone, Copy)]
pub(super) struct Break {
    pub(super) content_end: u64,
    pub(super) end: u64,
    pub(super) terminator: Terminator,
}

/// Collects terminator positions across windows.
///
/// Carriage returns are held back until the next unit is known so a `\r\n`
/// split across two windows is still recognised as one terminator.
#[derive(Debug)]
pub(super) struct Scanner {
    width: u64,
    big_endian: bool,
    position: u64,
    carry: Option<u8>,
    pending_cr: Option<u64>,
    pub(super) breaks: Vec<Break>,
    pub(super) bare_crs: Vec<u64>,
}

impl Scanner {
    pub(super) const fn new(start: u64, width: u64, big_endian: bool) -> Self {
        Self {
            width,
            big_endian,
            position: start,
            carry: None,
            pending_cr: None,
            breaks: Vec::new(),
            bare_crs: Vec::new(),
        }
    }

    /// Absolute offset one past the last byte fed so far.
    pub(super) fn fed(&self) -> u64 {
        self.position + u64::from(self.carry.is_some())
    }

    pub(super) fn feed(&mut self, window: &[u8]) {
        if self.width == 1 {
            self.feed_bytes(window);
        } else {
            self.feed_units(window);
        }
    }

    pub(super) fn finish(&mut self) {
        if let Some(cr) = self.pending_cr.take() {
            self.bare_crs.push(cr);
        }
    }

    fn feed_bytes(&mut self, window: &[u8]) {
        let base = self.position;
        for index in memchr::memchr2_iter(b'\n', b'\r', window) {
            let unit = window.get(index).copied().map_or(0, u16::from);
            self.on_unit(base + index as u64, unit);
        }
        self.position = base + window.len() as u64;
    }

    fn feed_units(&mut self, window: &[u8]) {
        let mut bytes = window.iter().copied();
        loop {
            let first = match self.carry.take() {
                Some(byte) => byte,
                None => match bytes.next() {
                    Some(byte) => byte,
                    None => return,
                },
            };
            let Some(second) = bytes.next() else {
                self.carry = Some(first);
                return;
            };
            let unit = if self.big_endian {
                (u16::from(first) << 8) | u16::from(second)
            } else {
                (u16::from(second) << 8) | u16::from(first)
            };
            if unit == LF || unit == CR {
                self.on_unit(self.position, unit);
            }
            self.position += self.width;
        }
    }

    fn on_unit(&mut self, at: u64, unit: u16) {
        let joined_cr = match self.pending_cr.take() {
            Some(cr) if unit == LF && cr + self.width == at => Some(cr),
            Some(cr) => {
                self.bare_crs.push(cr);
                None
            }
            None => None,
        };
        if unit == CR {
            self.pending_cr = Some(at);
            return;
        }
        let end = at + self.width;
        let brk = match joined_cr {
            Some(cr) => Break {
                content_end: cr,
                end,
                terminator: Terminator::CrLf,
            },
            None => Break {
                content_end: at,
                end,
                terminator: Terminator::Lf,
            },
        };
        self.breaks.push(brk);
    }
}
