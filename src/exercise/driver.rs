//! The exercise driver
//!
//! One [`Driver`] performs one run of one exercise:
//!
//! ```text
//! Start -> AwaitInput -> Corrupt -> Evaluate -> {Success | Incomplete | Transferred} -> Exit
//! ```
//!
//! After reporting, the vulnerable routine returns. The driver unwinds the
//! frame's return slots innermost first and goes wherever each slot points,
//! which is how a corrupted return address takes over control.
//!
//! Every phase leaves a [`Snapshot`] behind for the inspector.

use std::fmt;
use std::io::{self, BufRead};

use super::capability::{land, ArbitraryJump, Landing};
use super::config::{BoundsPolicy, CopyKind, ExerciseConfig, FormatPolicy, InputSource};
use super::constants::{LINE_READ_LIMIT, REGISTER_ARGS, SNAPSHOT_MEMORY_LIMIT};
use super::copy::{bounded_copy, line_copy, string_copy};
use super::errors::{ExerciseError, Fault};
use super::evaluator::{evaluate, Classification, Evaluation};
use super::format::{render, render_bytes, snprintf_untrusted, sprintf_untrusted, Arg, CallSite};
use crate::memory::code::CodeMap;
use crate::memory::image::{MemoryImage, Region};
use crate::memory::layout::MemoryLayout;
use crate::snapshot::{Snapshot, SnapshotManager, Terminal};

/// Where the run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    AwaitInput,
    Corrupt,
    Evaluate,
    Success,
    Incomplete,
    /// Control left the expected path (function pointer call or a `ret`
    /// through an overwritten slot)
    Transferred,
    Exit,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Start => "START",
            Phase::AwaitInput => "AWAIT_INPUT",
            Phase::Corrupt => "CORRUPT",
            Phase::Evaluate => "EVALUATE",
            Phase::Success => "SUCCESS",
            Phase::Incomplete => "INCOMPLETE",
            Phase::Transferred => "TRANSFERRED",
            Phase::Exit => "EXIT",
        };
        write!(f, "{}", name)
    }
}

/// How the simulated process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Crashed(Fault),
}

impl Termination {
    pub fn exit_status(&self) -> i32 {
        match self {
            Termination::Exited(status) => *status,
            Termination::Crashed(fault) => fault.exit_status(),
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exited(status) => write!(f, "exited with status {}", status),
            Termination::Crashed(fault) => write!(f, "{}", fault),
        }
    }
}

/// Everything a finished run leaves behind
#[derive(Debug, Clone)]
pub struct RunReport {
    pub exercise: String,
    /// `None` when the process died before the sentinel was read
    pub evaluation: Option<Evaluation>,
    pub termination: Termination,
    pub layout: MemoryLayout,
    pub image: MemoryImage,
    pub terminal: Terminal,
    pub snapshots: SnapshotManager,
}

impl RunReport {
    pub fn output(&self) -> &str {
        &self.terminal.text
    }

    pub fn classification(&self) -> Option<Classification> {
        self.evaluation.map(|e| e.classification())
    }

    pub fn exit_status(&self) -> i32 {
        self.termination.exit_status()
    }
}

/// Runs one exercise against one payload
pub struct Driver {
    config: ExerciseConfig,
    layout: MemoryLayout,
    code: CodeMap,
    image: MemoryImage,
    terminal: Terminal,
    snapshots: SnapshotManager,
    jump: Option<ArbitraryJump>,
    phase: Phase,
}

impl Driver {
    pub fn new(config: ExerciseConfig) -> Self {
        let layout = MemoryLayout::new(&config);
        let image = layout.instantiate();
        let code = config.code_map();
        let jump = ArbitraryJump::grant(config.control_transfer);
        Driver {
            config,
            layout,
            code,
            image,
            terminal: Terminal::new(),
            snapshots: SnapshotManager::new(SNAPSHOT_MEMORY_LIMIT),
            jump,
            phase: Phase::Start,
        }
    }

    /// Mirror the exercise's output to stdout while it runs
    pub fn echo(mut self) -> Self {
        self.terminal = Terminal::echoing();
        self
    }

    pub fn config(&self) -> &ExerciseConfig {
        &self.config
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the exercise. `arg` is `argv[1]`, `stdin` feeds line input.
    pub fn run<R: BufRead>(
        mut self,
        arg: Option<&[u8]>,
        mut stdin: R,
    ) -> Result<RunReport, ExerciseError> {
        log::info!(
            "{}: buffer '{}' ({} bytes) @ 0x{:x}, {} '{}' @ 0x{:x}",
            self.config.id,
            self.layout.buffer().name,
            self.layout.buffer().len,
            self.layout.buffer_address(),
            self.layout.sentinel_kind(),
            self.layout.sentinel().name,
            self.layout.sentinel_address()
        );

        let banner = format!("{}\n", self.config.messages.banner);
        self.terminal.print(&banner);
        if self.config.input == InputSource::Argument && arg.is_none() {
            self.record(Phase::Exit, "missing argument".to_string());
            return Err(self.usage_error());
        }
        self.record(Phase::Start, "banner printed".to_string());

        let payload = self.await_input(arg, &mut stdin)?;

        if let Some(fault) = self.corrupt(&payload)? {
            return Ok(self.finish(None, Termination::Crashed(fault)));
        }

        let evaluation = match evaluate(&self.layout, &self.image, self.config.predicate) {
            Ok(evaluation) if self.jump.is_none() => evaluation.withhold(),
            Ok(evaluation) => evaluation,
            Err(fault) => return Ok(self.finish(None, Termination::Crashed(fault))),
        };
        self.record(Phase::Evaluate, format!("{:?}", evaluation));

        let termination = match self.report(evaluation)? {
            Some(termination) => termination,
            None => self.unwind(),
        };
        Ok(self.finish(Some(evaluation), termination))
    }

    fn usage_error(&self) -> ExerciseError {
        ExerciseError::Usage {
            message: self.config.messages.usage.clone(),
        }
    }

    fn await_input<R: BufRead>(
        &mut self,
        arg: Option<&[u8]>,
        stdin: &mut R,
    ) -> Result<Vec<u8>, ExerciseError> {
        let payload = match (self.config.input, self.config.copy) {
            (InputSource::Argument, _) => match arg {
                Some(arg) => arg.to_vec(),
                None => return Err(self.usage_error()),
            },
            (InputSource::StdinLine, CopyKind::Format) => self.read_format_line(stdin)?,
            (InputSource::StdinLine, _) => {
                let mut line = Vec::new();
                stdin.read_until(b'\n', &mut line)?;
                line
            }
        };
        log::debug!("payload is {} bytes", payload.len());
        self.record(Phase::AwaitInput, format!("read {} bytes", payload.len()));
        Ok(payload)
    }

    /// `fgets(line, 15, stdin)` into the 16-byte `line` local, then
    /// `line[15] = 0`. The format is whatever string that leaves.
    fn read_format_line<R: BufRead>(&mut self, stdin: &mut R) -> Result<Vec<u8>, ExerciseError> {
        let read = match read_line_bounded(stdin, LINE_READ_LIMIT)? {
            Some(read) => read,
            None => {
                return Err(ExerciseError::InputUnavailable {
                    message: self.config.messages.input_unavailable.clone(),
                })
            }
        };
        let (Some(region), Some(addr)) = (self.layout.line().cloned(), self.layout.line_address())
        else {
            return Ok(read);
        };
        let mut stored = read;
        stored.push(0);
        let written = self
            .image
            .write_within(&region, 0, &stored)
            .and_then(|()| self.image.write_within(&region, region.len - 1, &[0]));
        debug_assert_eq!(written, Ok(()), "fgets overran '{}'", region.name);
        let line = self.image.read_c_string(addr);
        debug_assert!(line.is_ok(), "'{}' is unterminated", region.name);
        Ok(line.unwrap_or_default())
    }

    /// Fill the buffer with the copy primitive the policies select. Returns
    /// the fault if the copy killed the process.
    fn corrupt(&mut self, payload: &[u8]) -> Result<Option<Fault>, ExerciseError> {
        let dest = self.layout.buffer_address();
        let buffer = self.layout.buffer().clone();
        let bounds = self.config.bounds;

        let result = match (self.config.copy, self.config.format, bounds) {
            (CopyKind::Format, FormatPolicy::Untrusted, BoundsPolicy::Unchecked) => {
                let site = self.call_site();
                sprintf_untrusted(&mut self.image, dest, payload, site).map(|_| ())
            }
            (CopyKind::Format, FormatPolicy::Untrusted, BoundsPolicy::Checked) => {
                let site = self.call_site();
                snprintf_untrusted(&mut self.image, dest, buffer.len, payload, site).map(|_| ())
            }
            (CopyKind::Format, FormatPolicy::Trusted, _) => {
                let rendered = render_bytes(b"%s", &[Arg::Str(payload)])?;
                self.store_string(&buffer, &rendered)
            }
            (CopyKind::String, _, _) => self.store_string(&buffer, payload),
            (CopyKind::Line, _, BoundsPolicy::Unchecked) => {
                line_copy(&mut self.image, dest, payload).map(|_| ())
            }
            (CopyKind::Line, _, BoundsPolicy::Checked) => {
                let body = payload.strip_suffix(b"\n").unwrap_or(payload);
                bounded_copy(&mut self.image, &buffer, body);
                Ok(())
            }
        };

        let changed = self
            .snapshots
            .last()
            .map(|s| s.image.diff(&self.image).len())
            .unwrap_or(0);
        match result {
            Ok(()) => {
                self.record(Phase::Corrupt, format!("{} bytes changed", changed));
                Ok(None)
            }
            Err(fault) => {
                log::warn!("copy faulted: {}", fault);
                self.record(Phase::Corrupt, fault.to_string());
                Ok(Some(fault))
            }
        }
    }

    /// `strcpy`, or `strlcpy` when bounds are checked
    fn store_string(&mut self, buffer: &Region, bytes: &[u8]) -> Result<(), Fault> {
        match self.config.bounds {
            BoundsPolicy::Unchecked => {
                string_copy(&mut self.image, self.layout.buffer_address(), bytes).map(|_| ())
            }
            BoundsPolicy::Checked => {
                bounded_copy(&mut self.image, buffer, bytes);
                Ok(())
            }
        }
    }

    /// Variadic arguments as `sprintf` finds them: the `line` address left in
    /// the first argument register, the caller's frame above.
    fn call_site(&self) -> CallSite {
        let mut registers = [0; REGISTER_ARGS];
        registers[0] = self.layout.line_address().unwrap_or(0);
        CallSite {
            registers,
            stack_args: self.layout.base(),
            order: self.layout.byte_order(),
        }
    }

    /// Print the outcome. Returns a termination if reporting already ended
    /// the process (a called function pointer).
    fn report(&mut self, evaluation: Evaluation) -> Result<Option<Termination>, ExerciseError> {
        let messages = self.config.messages.clone();
        match evaluation {
            Evaluation::Success { value } => {
                self.terminal.print(&render(&messages.completion, &[Arg::Uint(value as u64)])?);
                self.record(Phase::Success, format!("sentinel = 0x{:08x}", value));
                Ok(None)
            }
            Evaluation::Changed { value } | Evaluation::Incomplete { value } => {
                self.terminal.print(&render(&messages.retry, &[Arg::Uint(value as u64)])?);
                self.record(Phase::Incomplete, format!("sentinel = 0x{:08x}", value));
                Ok(None)
            }
            Evaluation::Unmodified => {
                self.terminal.print(&render(&messages.retry, &[])?);
                self.record(Phase::Incomplete, "function pointer is null".to_string());
                Ok(None)
            }
            Evaluation::Jump { target } | Evaluation::Withheld { target } => {
                if let Some(template) = &messages.report {
                    self.terminal.print(&render(template, &[Arg::Ptr(target)])?);
                }
                let jump = match evaluation {
                    Evaluation::Jump { .. } => self.jump.take(),
                    _ => None,
                };
                let Some(jump) = jump else {
                    log::warn!("control transfer to 0x{:x} withheld", target);
                    self.record(Phase::Incomplete, format!("not calling 0x{:x}", target));
                    return Ok(None);
                };
                let landing = jump.invoke(target, &self.code, &self.image, &mut self.terminal);
                self.record(Phase::Transferred, format!("called 0x{:x}", target));
                Ok(match landing {
                    Landing::Exited(status) => Some(Termination::Exited(status)),
                    Landing::Crashed(fault) => Some(Termination::Crashed(fault)),
                    Landing::Resumed => None,
                })
            }
            Evaluation::Observed { resume_address } => {
                if let Some(template) = &messages.report {
                    self.terminal.print(&render(template, &[Arg::Ptr(resume_address)])?);
                }
                Ok(None)
            }
        }
    }

    /// Return through every slot of the frame, innermost first
    fn unwind(&mut self) -> Termination {
        let slots = self.layout.return_slots().to_vec();
        for slot in &slots {
            let target = match self.layout.read_return_slot(&self.image, slot) {
                Ok(target) => target,
                Err(fault) => return Termination::Crashed(fault),
            };
            if target == slot.expected {
                log::debug!("{} returns to 0x{:x}", slot.owner, target);
            } else {
                log::warn!(
                    "{} returns through '{}' to 0x{:x} instead of 0x{:x}",
                    slot.owner,
                    slot.region.name,
                    target,
                    slot.expected
                );
                self.record(
                    Phase::Transferred,
                    format!("{} returned to 0x{:x}", slot.owner, target),
                );
            }
            match land(target, &self.code, &self.image, &mut self.terminal) {
                Landing::Resumed => continue,
                Landing::Exited(status) => return Termination::Exited(status),
                Landing::Crashed(fault) => return Termination::Crashed(fault),
            }
        }
        Termination::Exited(0)
    }

    fn record(&mut self, phase: Phase, note: String) {
        log::debug!("{}: {}", phase, note);
        self.phase = phase;
        let snapshot = Snapshot {
            phase,
            image: self.image.clone(),
            terminal: self.terminal.clone(),
            note,
        };
        if let Err(e) = self.snapshots.push(snapshot) {
            log::warn!("{}", e);
        }
    }

    fn finish(mut self, evaluation: Option<Evaluation>, termination: Termination) -> RunReport {
        log::info!("{}: {}", self.config.id, termination);
        self.record(Phase::Exit, termination.to_string());
        RunReport {
            exercise: self.config.id,
            evaluation,
            termination,
            layout: self.layout,
            image: self.image,
            terminal: self.terminal,
            snapshots: self.snapshots,
        }
    }
}

/// `fgets(s, size, stream)`: up to `size - 1` bytes, stopping after a
/// newline. `None` if end of input came before any byte.
pub fn read_line_bounded<R: BufRead>(stdin: &mut R, size: usize) -> io::Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    while line.len() + 1 < size {
        let byte = match stdin.fill_buf()?.first() {
            Some(&byte) => byte,
            None => break,
        };
        stdin.consume(1);
        line.push(byte);
        if byte == b'\n' {
            break;
        }
    }
    if line.is_empty() && size > 1 {
        return Ok(None);
    }
    Ok(Some(line))
}
