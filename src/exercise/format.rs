//! printf-style formatting with two backends
//!
//! The engine ([`format_into`]) walks a format string and hands every byte it
//! produces, and every argument it needs, to a [`Backend`]. It never rejects
//! a format: unknown conversions are copied through verbatim, the way libc
//! does. What is trusted and what is not lives entirely in the backend:
//!
//! - [`TrustedArgs`]: a typed argument list chosen by the program. Missing or
//!   mistyped arguments are errors and `%n` is refused. [`render`] uses it for
//!   every message the exercises print.
//! - [`StackArgs`]: the `sprintf(dest, line)` model. Output is stored into the
//!   memory image at `dest` with no capacity check, and arguments are whatever
//!   the calling convention leaves lying around: four register words, then
//!   8-byte words of the caller's frame. `%s` reads through those words and
//!   `%n` writes through them.
//!
//! # Supported directives
//!
//! `%[pos$][flags][width][.precision][length]conversion`
//!
//! - flags: `-`, `0`, `+`, space, `#`
//! - width / precision: digits, `*` or `*pos$`
//! - length: `hh`, `h`, `l`, `ll`, `z`, `j`, `t`
//! - conversions: `d i u x X o c s p n %`

use super::constants::REGISTER_ARGS;
use super::errors::{Fault, FormatError};
use crate::memory::image::MemoryImage;
use crate::memory::{Address, ByteOrder, POINTER_SIZE};

/// Length modifier of a directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Default,
    Char,
    Short,
    Long,
    LongLong,
    Size,
    Max,
    Ptrdiff,
}

impl Length {
    /// Bytes a `%n` with this modifier stores
    pub fn store_width(self) -> usize {
        match self {
            Length::Char => 1,
            Length::Short => 2,
            Length::Default => 4,
            _ => 8,
        }
    }

    fn signed(self, raw: u64) -> i64 {
        match self {
            Length::Char => raw as u8 as i8 as i64,
            Length::Short => raw as u16 as i16 as i64,
            Length::Default => raw as u32 as i32 as i64,
            _ => raw as i64,
        }
    }

    fn unsigned(self, raw: u64) -> u64 {
        match self {
            Length::Char => raw as u8 as u64,
            Length::Short => raw as u16 as u64,
            Length::Default => raw as u32 as u64,
            _ => raw,
        }
    }
}

/// Width or precision of a directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Amount {
    Fixed(usize),
    /// `*` (next argument) or `*N$`
    FromArg(Option<usize>),
}

#[derive(Debug, Clone, Default)]
struct Flags {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alt: bool,
}

#[derive(Debug, Clone)]
struct Directive {
    position: Option<usize>,
    flags: Flags,
    width: Option<Amount>,
    precision: Option<Amount>,
    length: Length,
    conversion: u8,
}

impl Directive {
    /// A known conversion whose `*N$` amounts name real arguments.
    /// Anything else is copied through verbatim.
    fn is_valid(&self) -> bool {
        let star_zero = |amount: Option<Amount>| amount == Some(Amount::FromArg(Some(0)));
        is_conversion(self.conversion) && !star_zero(self.width) && !star_zero(self.precision)
    }
}

/// Receiver of formatted output and supplier of arguments
pub trait Backend {
    type Error;

    /// Store one output byte
    fn emit(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Argument for an integer, char or pointer conversion, as a raw word.
    /// `position` is 1-based; `None` means "the next one".
    fn int_arg(&mut self, position: Option<usize>, conversion: u8) -> Result<u64, Self::Error>;

    /// Argument for `%s`
    fn str_arg(&mut self, position: Option<usize>) -> Result<Vec<u8>, Self::Error>;

    /// `%n`: store the number of bytes produced so far
    fn store_count(
        &mut self,
        position: Option<usize>,
        count: u64,
        length: Length,
    ) -> Result<(), Self::Error>;

    /// Bytes `emit` still stores. Output past this is only counted.
    fn remaining(&self) -> Option<usize> {
        None
    }
}

/// Largest width, precision or output count, as in libc (`INT_MAX`)
const MAX_AMOUNT: usize = i32::MAX as usize;

fn parse_number(format: &[u8], i: &mut usize) -> Option<usize> {
    let start = *i;
    let mut value: usize = 0;
    while *i < format.len() && format[*i].is_ascii_digit() {
        value = value
            .saturating_mul(10)
            .saturating_add((format[*i] - b'0') as usize)
            .min(MAX_AMOUNT);
        *i += 1;
    }
    (*i > start).then_some(value)
}

/// Parse `*` or `*N$` at `i`
fn parse_star(format: &[u8], i: &mut usize) -> Amount {
    *i += 1;
    let save = *i;
    if let Some(n) = parse_number(format, i) {
        if format.get(*i) == Some(&b'$') {
            *i += 1;
            return Amount::FromArg(Some(n));
        }
    }
    *i = save;
    Amount::FromArg(None)
}

/// Parse a directive starting right after its `%`. Returns the directive and
/// the index just past it, or `None` if no conversion byte was found.
fn parse_directive(format: &[u8], start: usize) -> Option<(Directive, usize)> {
    let mut i = start;

    let mut position = None;
    let save = i;
    if let Some(n) = parse_number(format, &mut i) {
        if format.get(i) == Some(&b'$') && n > 0 {
            position = Some(n);
            i += 1;
        } else {
            i = save;
        }
    }

    let mut flags = Flags::default();
    while let Some(&b) = format.get(i) {
        match b {
            b'-' => flags.left = true,
            b'0' => flags.zero = true,
            b'+' => flags.plus = true,
            b' ' => flags.space = true,
            b'#' => flags.alt = true,
            _ => break,
        }
        i += 1;
    }

    let width = match format.get(i) {
        Some(b'*') => Some(parse_star(format, &mut i)),
        _ => parse_number(format, &mut i).map(Amount::Fixed),
    };

    let precision = if format.get(i) == Some(&b'.') {
        i += 1;
        match format.get(i) {
            Some(b'*') => Some(parse_star(format, &mut i)),
            _ => Some(Amount::Fixed(parse_number(format, &mut i).unwrap_or(0))),
        }
    } else {
        None
    };

    let length = match (format.get(i), format.get(i + 1)) {
        (Some(b'h'), Some(b'h')) => {
            i += 2;
            Length::Char
        }
        (Some(b'l'), Some(b'l')) => {
            i += 2;
            Length::LongLong
        }
        (Some(b'h'), _) => {
            i += 1;
            Length::Short
        }
        (Some(b'l'), _) | (Some(b'L'), _) => {
            i += 1;
            Length::Long
        }
        (Some(b'z'), _) => {
            i += 1;
            Length::Size
        }
        (Some(b'j'), _) => {
            i += 1;
            Length::Max
        }
        (Some(b't'), _) => {
            i += 1;
            Length::Ptrdiff
        }
        _ => Length::Default,
    };

    let conversion = *format.get(i).filter(|&&b| b != 0)?;
    Some((
        Directive {
            position,
            flags,
            width,
            precision,
            length,
            conversion,
        },
        i + 1,
    ))
}

struct Engine<'b, B: Backend> {
    backend: &'b mut B,
    count: usize,
    /// Output went past `MAX_AMOUNT`; formatting stops
    overflowed: bool,
}

impl<B: Backend> Engine<'_, B> {
    fn emit(&mut self, byte: u8) -> Result<(), B::Error> {
        if self.count >= MAX_AMOUNT {
            self.overflowed = true;
            return Ok(());
        }
        self.backend.emit(byte)?;
        self.count += 1;
        Ok(())
    }

    /// Count output the backend would drop anyway
    fn skip(&mut self, n: usize) {
        self.count = self.count.saturating_add(n);
        if self.count > MAX_AMOUNT {
            self.count = MAX_AMOUNT;
            self.overflowed = true;
        }
    }

    fn emit_all(&mut self, bytes: &[u8]) -> Result<(), B::Error> {
        for &b in bytes {
            self.emit(b)?;
        }
        Ok(())
    }

    fn pad(&mut self, byte: u8, n: usize) -> Result<(), B::Error> {
        let stored = self.backend.remaining().map_or(n, |left| left.min(n));
        for _ in 0..stored {
            if self.overflowed {
                return Ok(());
            }
            self.emit(byte)?;
        }
        self.skip(n - stored);
        Ok(())
    }

    /// Resolve a width/precision; a negative `*` width means left-justify
    fn amount(
        &mut self,
        amount: Option<Amount>,
        flags: &mut Flags,
        is_width: bool,
    ) -> Result<Option<usize>, B::Error> {
        match amount {
            None => Ok(None),
            Some(Amount::Fixed(n)) => Ok(Some(n)),
            Some(Amount::FromArg(position)) => {
                let raw = self.backend.int_arg(position, b'*')? as u32 as i32;
                if raw < 0 {
                    if is_width {
                        flags.left = true;
                        Ok(Some(raw.unsigned_abs() as usize))
                    } else {
                        Ok(None)
                    }
                } else {
                    Ok(Some(raw as usize))
                }
            }
        }
    }

    /// Emit `prefix`, `zeros` precision zeros and `body`, padded to `width`
    fn field(
        &mut self,
        flags: &Flags,
        width: Option<usize>,
        prefix: &[u8],
        zeros: usize,
        body: &[u8],
        zero_pad: bool,
    ) -> Result<(), B::Error> {
        let len = zeros.saturating_add(prefix.len() + body.len());
        let fill = width.unwrap_or(0).saturating_sub(len);
        if flags.left {
            self.emit_all(prefix)?;
            self.pad(b'0', zeros)?;
            self.emit_all(body)?;
            self.pad(b' ', fill)
        } else if zero_pad {
            self.emit_all(prefix)?;
            self.pad(b'0', fill)?;
            self.pad(b'0', zeros)?;
            self.emit_all(body)
        } else {
            self.pad(b' ', fill)?;
            self.emit_all(prefix)?;
            self.pad(b'0', zeros)?;
            self.emit_all(body)
        }
    }

    fn directive(&mut self, d: Directive) -> Result<(), B::Error> {
        let mut flags = d.flags.clone();
        let width = self.amount(d.width, &mut flags, true)?;
        let precision = self.amount(d.precision, &mut flags, false)?;
        let zero_pad = flags.zero && !flags.left && precision.is_none();

        match d.conversion {
            b'%' => self.emit(b'%'),
            b'd' | b'i' => {
                let value = d.length.signed(self.backend.int_arg(d.position, d.conversion)?);
                let digits = number_digits(value.unsigned_abs(), 10, false, precision);
                let zeros = precision_zeros(&digits, precision);
                let sign: &[u8] = if value < 0 {
                    b"-"
                } else if flags.plus {
                    b"+"
                } else if flags.space {
                    b" "
                } else {
                    b""
                };
                self.field(&flags, width, sign, zeros, &digits, zero_pad)
            }
            b'u' | b'x' | b'X' | b'o' => {
                let value = d.length.unsigned(self.backend.int_arg(d.position, d.conversion)?);
                let (radix, upper) = match d.conversion {
                    b'u' => (10, false),
                    b'x' => (16, false),
                    b'X' => (16, true),
                    _ => (8, false),
                };
                let mut digits = number_digits(value, radix, upper, precision);
                let zeros = precision_zeros(&digits, precision);
                let mut prefix: &[u8] = b"";
                if flags.alt && value != 0 {
                    match d.conversion {
                        b'x' => prefix = b"0x",
                        b'X' => prefix = b"0X",
                        b'o' if zeros == 0 => digits.insert(0, b'0'),
                        _ => {}
                    }
                }
                self.field(&flags, width, prefix, zeros, &digits, zero_pad)
            }
            b'c' => {
                let byte = self.backend.int_arg(d.position, d.conversion)? as u8;
                self.field(&flags, width, b"", 0, &[byte], false)
            }
            b's' => {
                let mut bytes = self.backend.str_arg(d.position)?;
                if let Some(p) = precision {
                    bytes.truncate(p);
                }
                self.field(&flags, width, b"", 0, &bytes, false)
            }
            b'p' => {
                let addr = self.backend.int_arg(d.position, d.conversion)?;
                if addr == 0 {
                    self.field(&flags, width, b"", 0, b"(nil)", false)
                } else {
                    let digits = number_digits(addr, 16, false, precision);
                    let zeros = precision_zeros(&digits, precision);
                    self.field(&flags, width, b"0x", zeros, &digits, zero_pad)
                }
            }
            b'n' => {
                let count = self.count as u64;
                self.backend.store_count(d.position, count, d.length)
            }
            // Anything else never reaches here, see `is_conversion`
            _ => Ok(()),
        }
    }
}

fn number_digits(value: u64, radix: u64, upper: bool, precision: Option<usize>) -> Vec<u8> {
    let table: &[u8; 16] = if upper {
        b"0123456789ABCDEF"
    } else {
        b"0123456789abcdef"
    };
    let mut digits = Vec::new();
    let mut v = value;
    while v > 0 {
        digits.push(table[(v % radix) as usize]);
        v /= radix;
    }
    match precision {
        // "%.0d" of zero prints nothing
        Some(0) if value == 0 => {}
        _ if digits.is_empty() => digits.push(b'0'),
        _ => {}
    }
    digits.reverse();
    digits
}

/// Leading zeros a precision adds in front of `digits`
fn precision_zeros(digits: &[u8], precision: Option<usize>) -> usize {
    precision.unwrap_or(0).saturating_sub(digits.len())
}

fn is_conversion(byte: u8) -> bool {
    matches!(
        byte,
        b'%' | b'd' | b'i' | b'u' | b'x' | b'X' | b'o' | b'c' | b's' | b'p' | b'n'
    )
}

/// Run the format engine over `format` (up to its first nul).
///
/// Returns the number of bytes produced.
pub fn format_into<B: Backend>(format: &[u8], backend: &mut B) -> Result<usize, B::Error> {
    let end = format.iter().position(|&b| b == 0).unwrap_or(format.len());
    let format = &format[..end];
    let mut engine = Engine {
        backend,
        count: 0,
        overflowed: false,
    };
    let mut i = 0;

    while i < format.len() && !engine.overflowed {
        let byte = format[i];
        if byte != b'%' {
            engine.emit(byte)?;
            i += 1;
            continue;
        }
        match parse_directive(format, i + 1) {
            Some((directive, next)) if directive.is_valid() => {
                engine.directive(directive)?;
                i = next;
            }
            Some((_, next)) => {
                // Unknown conversion or `*0$`: copy the directive text through
                engine.emit_all(&format[i..next])?;
                i = next;
            }
            None => {
                engine.emit_all(&format[i..])?;
                i = format.len();
            }
        }
    }

    if engine.overflowed {
        log::warn!("format output exceeds {} bytes, stopped", MAX_AMOUNT);
    }
    Ok(engine.count)
}

/// A typed argument for the trusted backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg<'a> {
    Int(i64),
    Uint(u64),
    Char(u8),
    Str(&'a [u8]),
    Ptr(Address),
}

/// Trusted backend: program-chosen format, typed arguments, host output
pub struct TrustedArgs<'a> {
    args: &'a [Arg<'a>],
    next: usize,
    out: Vec<u8>,
}

impl<'a> TrustedArgs<'a> {
    pub fn new(args: &'a [Arg<'a>]) -> Self {
        TrustedArgs {
            args,
            next: 0,
            out: Vec::new(),
        }
    }

    pub fn into_output(self) -> Vec<u8> {
        self.out
    }

    fn take(&mut self, position: Option<usize>) -> Result<(usize, Arg<'a>), FormatError> {
        let index = match position {
            Some(p) => p,
            None => {
                self.next += 1;
                self.next
            }
        };
        index
            .checked_sub(1)
            .and_then(|slot| self.args.get(slot))
            .map(|arg| (index, *arg))
            .ok_or(FormatError::MissingArgument { index })
    }
}

impl Backend for TrustedArgs<'_> {
    type Error = FormatError;

    fn emit(&mut self, byte: u8) -> Result<(), FormatError> {
        self.out.push(byte);
        Ok(())
    }

    fn int_arg(&mut self, position: Option<usize>, conversion: u8) -> Result<u64, FormatError> {
        let (_, arg) = self.take(position)?;
        match (conversion, arg) {
            (b'p', Arg::Ptr(addr)) => Ok(addr),
            (b'p', other) => Err(FormatError::TypeMismatch {
                directive: 'p',
                got: format!("{:?}", other),
            }),
            (_, Arg::Int(n)) => Ok(n as u64),
            (_, Arg::Uint(n)) => Ok(n),
            (_, Arg::Char(c)) => Ok(c as u64),
            (_, other) => Err(FormatError::TypeMismatch {
                directive: conversion as char,
                got: format!("{:?}", other),
            }),
        }
    }

    fn str_arg(&mut self, position: Option<usize>) -> Result<Vec<u8>, FormatError> {
        match self.take(position)? {
            (_, Arg::Str(s)) => Ok(s.to_vec()),
            (_, other) => Err(FormatError::TypeMismatch {
                directive: 's',
                got: format!("{:?}", other),
            }),
        }
    }

    fn store_count(&mut self, _: Option<usize>, _: u64, _: Length) -> Result<(), FormatError> {
        Err(FormatError::Forbidden { directive: 'n' })
    }
}

/// Render a trusted format with typed arguments
pub fn render_bytes(format: &[u8], args: &[Arg]) -> Result<Vec<u8>, FormatError> {
    let mut backend = TrustedArgs::new(args);
    format_into(format, &mut backend)?;
    Ok(backend.into_output())
}

/// Render a trusted format with typed arguments into text
pub fn render(format: &str, args: &[Arg]) -> Result<String, FormatError> {
    let bytes = render_bytes(format.as_bytes(), args)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Where an untrusted `sprintf` finds its variadic arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    /// Words left in the argument registers (rdx, rcx, r8, r9)
    pub registers: [u64; REGISTER_ARGS],
    /// Lowest address of the caller's frame; argument 5 onwards lives here
    pub stack_args: Address,
    pub order: ByteOrder,
}

/// Untrusted backend: output and arguments both live in the memory image
pub struct StackArgs<'i> {
    image: &'i mut MemoryImage,
    site: CallSite,
    cursor: Address,
    /// Output bytes kept before the terminator (`snprintf` size - 1)
    limit: Option<usize>,
    stored: usize,
    next: usize,
}

impl<'i> StackArgs<'i> {
    pub fn new(image: &'i mut MemoryImage, dest: Address, site: CallSite) -> Self {
        StackArgs {
            image,
            site,
            cursor: dest,
            limit: None,
            stored: 0,
            next: 0,
        }
    }

    /// Keep at most `size - 1` output bytes, as `snprintf(dest, size, ...)`
    pub fn with_limit(mut self, size: usize) -> Self {
        self.limit = Some(size.saturating_sub(1));
        self
    }

    /// Word at 1-based variadic position `index`
    fn word(&self, index: usize) -> Result<u64, Fault> {
        match index.checked_sub(1) {
            Some(slot) if slot < REGISTER_ARGS => Ok(self.site.registers[slot]),
            Some(slot) => {
                let offset = ((slot - REGISTER_ARGS) * POINTER_SIZE) as u64;
                let addr = self.site.stack_args.saturating_add(offset);
                self.image.read_u64(addr, self.site.order)
            }
            // Position 0 names no argument; the parser never produces it
            None => Err(Fault::Segfault { address: 0 }),
        }
    }

    fn take(&mut self, position: Option<usize>) -> Result<u64, Fault> {
        let index = match position {
            Some(p) => p,
            None => {
                self.next += 1;
                self.next
            }
        };
        self.word(index)
    }

    /// Store the terminator right after the last kept output byte
    fn terminate(&mut self) -> Result<(), Fault> {
        self.image.write_byte(self.cursor, 0)
    }
}

impl Backend for StackArgs<'_> {
    type Error = Fault;

    fn emit(&mut self, byte: u8) -> Result<(), Fault> {
        if self.limit.is_some_and(|limit| self.stored >= limit) {
            return Ok(());
        }
        self.image.write_byte(self.cursor, byte)?;
        self.cursor += 1;
        self.stored += 1;
        Ok(())
    }

    fn int_arg(&mut self, position: Option<usize>, _: u8) -> Result<u64, Fault> {
        self.take(position)
    }

    fn remaining(&self) -> Option<usize> {
        self.limit.map(|limit| limit.saturating_sub(self.stored))
    }

    fn str_arg(&mut self, position: Option<usize>) -> Result<Vec<u8>, Fault> {
        let addr = self.take(position)?;
        if addr == 0 {
            return Ok(b"(null)".to_vec());
        }
        self.image.read_c_string(addr)
    }

    fn store_count(
        &mut self,
        position: Option<usize>,
        count: u64,
        length: Length,
    ) -> Result<(), Fault> {
        let addr = self.take(position)?;
        let bytes = self.site.order.encode_truncated(count, length.store_width());
        log::debug!("%n stores {} ({} bytes) at 0x{:x}", count, bytes.len(), addr);
        self.image.write(addr, &bytes)
    }
}

/// `sprintf(dest, format)` where `format` is attacker-controlled.
///
/// Returns the number of bytes the format produced (terminator excluded).
pub fn sprintf_untrusted(
    image: &mut MemoryImage,
    dest: Address,
    format: &[u8],
    site: CallSite,
) -> Result<usize, Fault> {
    let mut backend = StackArgs::new(image, dest, site);
    let count = format_into(format, &mut backend)?;
    backend.terminate()?;
    Ok(count)
}

/// `snprintf(dest, size, format)` where `format` is attacker-controlled.
///
/// The output is bounded, but arguments are still read and `%n` still writes.
pub fn snprintf_untrusted(
    image: &mut MemoryImage,
    dest: Address,
    size: usize,
    format: &[u8],
    site: CallSite,
) -> Result<usize, Fault> {
    let mut backend = StackArgs::new(image, dest, site).with_limit(size);
    let count = format_into(format, &mut backend)?;
    if size > 0 {
        backend.terminate()?;
    }
    Ok(count)
}
