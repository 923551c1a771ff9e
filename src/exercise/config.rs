//! Exercise configuration and presets
//!
//! An [`ExerciseConfig`] is the static description of one exercise: buffer
//! capacity, which sentinel sits after the buffer, how input arrives, which
//! copy primitive fills the buffer and what counts as success. The four
//! presets reproduce the course exercises:
//!
//! | id           | buffer | sentinel          | input   | copy           |
//! |--------------|--------|-------------------|---------|----------------|
//! | `hw1-level1` | 32     | `int changeme`    | argv[1] | `strcpy`       |
//! | `hw1-level2` | 32     | function pointer  | stdin   | `gets`         |
//! | `hw1-level3` | 64     | return address    | stdin   | `gets`         |
//! | `hw2-level1` | 64     | `int changeme`    | stdin   | `sprintf(dest, line)` |
//!
//! Policies toggle the safe counterparts: [`BoundsPolicy::Checked`] swaps the
//! unbounded copy for a bounded one, [`FormatPolicy::Trusted`] stops passing
//! the input as the format, [`ControlTransferPolicy::Disabled`] withholds the
//! arbitrary-jump capability.

use super::constants::{LIBC_START_CALL_MAIN, MAGIC, MAX_BUFFER_CAPACITY};
use crate::memory::code::{CodeMap, Routine};
use crate::memory::value::SentinelKind;
use crate::memory::{Address, ByteOrder};

/// Where the payload comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// `argv[1]`; missing argument is a usage error
    Argument,
    /// One line of standard input
    StdinLine,
}

/// The primitive that moves the payload into the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyKind {
    /// `strcpy`: up to the first nul, terminator included
    String,
    /// `gets`: the whole line, newline replaced by a terminator
    Line,
    /// `sprintf(dest, line)`: a bounded `fgets` line rendered as a format
    Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundsPolicy {
    #[default]
    Unchecked,
    Checked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatPolicy {
    /// The input is the format
    #[default]
    Untrusted,
    /// The input is rendered through a fixed `"%s"`
    Trusted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlTransferPolicy {
    #[default]
    Enabled,
    Disabled,
}

/// What the evaluator checks the sentinel against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessPredicate {
    /// Integer sentinel equals the constant
    Equals(u32),
    /// Integer sentinel is anything but zero
    NonZero,
    /// Function pointer is non-null (and gets called)
    NonNull,
    /// Nothing is judged; the resume address is only reported
    ObserveOnly,
}

/// Text the exercise prints. Templates are rendered through the trusted
/// formatter with the sentinel as their only argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Messages {
    pub banner: String,
    /// Printed on success, either by the driver or by `complete_level`
    pub completion: String,
    /// Printed when the sentinel did not satisfy the predicate
    pub retry: String,
    /// Printed before acting on a pointer sentinel (`%p` of the pointer)
    pub report: Option<String>,
    pub usage: String,
    pub input_unavailable: String,
}

/// Static description of one exercise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseConfig {
    pub id: String,
    pub description: String,
    pub buffer_capacity: usize,
    pub sentinel: SentinelKind,
    pub predicate: SuccessPredicate,
    pub input: InputSource,
    pub copy: CopyKind,
    pub bounds: BoundsPolicy,
    pub format: FormatPolicy,
    pub control_transfer: ControlTransferPolicy,
    pub byte_order: ByteOrder,
    pub messages: Messages,
    /// Address of `complete_level`, for exercises that have one
    pub complete_level: Option<Address>,
    /// Address inside `main` right after the call to the vulnerable routine
    pub caller_resume: Option<Address>,
}

const USAGE: &str = "Please specify an argument.";
const INPUT_UNAVAILABLE: &str = "Unable to get buffer";

fn completion(level: u32) -> String {
    format!(
        "Congratulations, you've finished level {}:-) Well done!\n",
        level
    )
}

impl ExerciseConfig {
    /// Identifiers of all presets, in course order
    pub const PRESET_IDS: [&'static str; 4] =
        ["hw1-level1", "hw1-level2", "hw1-level3", "hw2-level1"];

    /// Look up a preset by identifier
    pub fn preset(id: &str) -> Option<Self> {
        match id {
            "hw1-level1" => Some(Self::hw1_level1()),
            "hw1-level2" => Some(Self::hw1_level2()),
            "hw1-level3" => Some(Self::hw1_level3()),
            "hw2-level1" => Some(Self::hw2_level1()),
            _ => None,
        }
    }

    pub fn presets() -> Vec<Self> {
        Self::PRESET_IDS
            .iter()
            .filter_map(|id| Self::preset(id))
            .collect()
    }

    /// `strcpy` of argv[1] into a 32-byte buffer followed by `int changeme`
    pub fn hw1_level1() -> Self {
        ExerciseConfig {
            id: "hw1-level1".to_string(),
            description: "strcpy(argv[1]) over an int; make it 0x61626364".to_string(),
            buffer_capacity: 32,
            sentinel: SentinelKind::Integer,
            predicate: SuccessPredicate::Equals(MAGIC),
            input: InputSource::Argument,
            copy: CopyKind::String,
            bounds: BoundsPolicy::Unchecked,
            format: FormatPolicy::Untrusted,
            control_transfer: ControlTransferPolicy::Enabled,
            byte_order: ByteOrder::Little,
            messages: Messages {
                banner: "Welcome to CS487 hw1 Level1".to_string(),
                completion: completion(1),
                retry: "Try again, you got 0x%08x\n".to_string(),
                report: None,
                usage: USAGE.to_string(),
                input_unavailable: INPUT_UNAVAILABLE.to_string(),
            },
            complete_level: None,
            caller_resume: None,
        }
    }

    /// `gets` into a 32-byte buffer followed by a function pointer
    pub fn hw1_level2() -> Self {
        ExerciseConfig {
            id: "hw1-level2".to_string(),
            description: "gets() over a function pointer; call complete_level".to_string(),
            buffer_capacity: 32,
            sentinel: SentinelKind::FunctionPointer,
            predicate: SuccessPredicate::NonNull,
            input: InputSource::StdinLine,
            copy: CopyKind::Line,
            bounds: BoundsPolicy::Unchecked,
            format: FormatPolicy::Untrusted,
            control_transfer: ControlTransferPolicy::Enabled,
            byte_order: ByteOrder::Little,
            messages: Messages {
                banner: "Welcome to CS487 hw1 Level2".to_string(),
                completion: completion(2),
                retry: "function pointer remains unmodified :~( better luck next time!\n"
                    .to_string(),
                report: Some("calling function pointer @ %p\n".to_string()),
                usage: USAGE.to_string(),
                input_unavailable: INPUT_UNAVAILABLE.to_string(),
            },
            complete_level: Some(0x0040_1196),
            caller_resume: None,
        }
    }

    /// `gets` into a 64-byte buffer directly below the return address
    pub fn hw1_level3() -> Self {
        ExerciseConfig {
            id: "hw1-level3".to_string(),
            description: "gets() over the saved return address; return into complete_level"
                .to_string(),
            buffer_capacity: 64,
            sentinel: SentinelKind::ReturnAddress,
            predicate: SuccessPredicate::ObserveOnly,
            input: InputSource::StdinLine,
            copy: CopyKind::Line,
            bounds: BoundsPolicy::Unchecked,
            format: FormatPolicy::Untrusted,
            control_transfer: ControlTransferPolicy::Enabled,
            byte_order: ByteOrder::Little,
            messages: Messages {
                banner: "Welcome to CS487 hw1 Level3".to_string(),
                completion: completion(3),
                retry: String::new(),
                report: Some("and will be returning to %p\n".to_string()),
                usage: USAGE.to_string(),
                input_unavailable: INPUT_UNAVAILABLE.to_string(),
            },
            complete_level: Some(0x0040_11a6),
            caller_resume: Some(0x0040_1231),
        }
    }

    /// A bounded line read, then `sprintf(dest, line)` over `int changeme`
    pub fn hw2_level1() -> Self {
        ExerciseConfig {
            id: "hw2-level1".to_string(),
            description: "sprintf(dest, line) with an untrusted format; change changeme"
                .to_string(),
            buffer_capacity: 64,
            sentinel: SentinelKind::Integer,
            predicate: SuccessPredicate::NonZero,
            input: InputSource::StdinLine,
            copy: CopyKind::Format,
            bounds: BoundsPolicy::Unchecked,
            format: FormatPolicy::Untrusted,
            control_transfer: ControlTransferPolicy::Enabled,
            byte_order: ByteOrder::Little,
            messages: Messages {
                banner: "Welcome to CS487 hw2 level1".to_string(),
                completion: "Congratulations, the 'changeme' variable has been changed!\n"
                    .to_string(),
                retry: "'changeme' has not yet been changed. Would you like to try again?\n"
                    .to_string(),
                report: None,
                usage: USAGE.to_string(),
                input_unavailable: INPUT_UNAVAILABLE.to_string(),
            },
            complete_level: None,
            caller_resume: None,
        }
    }

    /// Capacities above [`MAX_BUFFER_CAPACITY`] are capped
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.min(MAX_BUFFER_CAPACITY);
        self
    }

    pub fn with_bounds(mut self, bounds: BoundsPolicy) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_format(mut self, format: FormatPolicy) -> Self {
        self.format = format;
        self
    }

    pub fn with_control_transfer(mut self, policy: ControlTransferPolicy) -> Self {
        self.control_transfer = policy;
        self
    }

    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    /// Name of the buffer local (`dest` next to a format copy)
    pub fn buffer_name(&self) -> &'static str {
        match self.copy {
            CopyKind::Format => "dest",
            _ => "buffer",
        }
    }

    /// Whether the exercise reads a separate bounded `line` before copying
    pub fn has_line_buffer(&self) -> bool {
        self.copy == CopyKind::Format
    }

    /// Entry points reachable by a control transfer in this exercise
    pub fn code_map(&self) -> CodeMap {
        let mut code = CodeMap::new();
        code.insert(
            "__libc_start_call_main",
            LIBC_START_CALL_MAIN,
            Routine::ProcessExit,
        );
        if let Some(addr) = self.complete_level {
            code.insert(
                "complete_level",
                addr,
                Routine::CompleteLevel {
                    message: self.messages.completion.clone(),
                },
            );
        }
        if let Some(addr) = self.caller_resume {
            code.insert("main+resume", addr, Routine::ResumeCaller);
        }
        code
    }
}
