//! Error and fault types for the exercises
//!
//! This module separates two very different things:
//!
//! - [`ExerciseError`]: problems driving a run (missing argument, no input,
//!   bad command line). These are reported and end the run.
//! - [`Fault`]: the simulated process dying from the corruption it was fed.
//!   A fault is an outcome of the exercise, not an error of the harness, and
//!   travels inside [`Termination::Crashed`](super::driver::Termination).
//!
//! [`FormatError`] covers the trusted format backend, which rejects what it
//! cannot render. The untrusted backend has no errors, only faults.

use crate::memory::Address;
use std::fmt;
use std::io;

/// Abnormal termination of the simulated process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Access to an address outside the mapped image (SIGSEGV)
    Segfault { address: Address },

    /// Control transferred into mapped, non-executable memory (SIGSEGV on NX)
    NonExecutable { address: Address },
}

impl Fault {
    pub fn address(&self) -> Address {
        match self {
            Fault::Segfault { address } | Fault::NonExecutable { address } => *address,
        }
    }

    /// Exit status a shell reports for the fault (128 + SIGSEGV)
    pub fn exit_status(&self) -> i32 {
        139
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Segfault { address } => {
                write!(f, "Segmentation fault (invalid access at 0x{:x})", address)
            }
            Fault::NonExecutable { address } => {
                write!(
                    f,
                    "Segmentation fault (jump to non-executable 0x{:x})",
                    address
                )
            }
        }
    }
}

/// Errors that end a run before or around the exercise itself
#[derive(Debug)]
pub enum ExerciseError {
    /// A required command-line argument is missing
    Usage { message: String },

    /// Standard input ended before the exercise got its line
    InputUnavailable { message: String },

    /// No preset with this identifier
    UnknownExercise { id: String },

    /// A command-line option was malformed
    InvalidOption { option: String, message: String },

    /// A message template could not be rendered
    Format(FormatError),

    /// Reading standard input failed
    Io(io::Error),
}

impl ExerciseError {
    /// Exit status for the error, matching `errx(1, ...)`
    pub fn exit_status(&self) -> i32 {
        match self {
            ExerciseError::Usage { .. } | ExerciseError::InputUnavailable { .. } => 1,
            ExerciseError::UnknownExercise { .. } | ExerciseError::InvalidOption { .. } => 2,
            ExerciseError::Format(_) | ExerciseError::Io(_) => 1,
        }
    }
}

impl fmt::Display for ExerciseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExerciseError::Usage { message } => write!(f, "{}", message),
            ExerciseError::InputUnavailable { message } => write!(f, "{}", message),
            ExerciseError::UnknownExercise { id } => {
                write!(f, "Unknown exercise '{}' (try --list)", id)
            }
            ExerciseError::InvalidOption { option, message } => {
                write!(f, "Invalid option {}: {}", option, message)
            }
            ExerciseError::Format(e) => write!(f, "Bad message template: {}", e),
            ExerciseError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ExerciseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExerciseError::Format(e) => Some(e),
            ExerciseError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ExerciseError {
    fn from(e: io::Error) -> Self {
        ExerciseError::Io(e)
    }
}

impl From<FormatError> for ExerciseError {
    fn from(e: FormatError) -> Self {
        ExerciseError::Format(e)
    }
}

/// Errors raised while rendering a format string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A directive asked for an argument that was not supplied
    MissingArgument { index: usize },

    /// The supplied argument does not fit the directive
    TypeMismatch { directive: char, got: String },

    /// The directive is refused by the trusted backend
    Forbidden { directive: char },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::MissingArgument { index } => {
                write!(f, "Not enough arguments for format string (argument {})", index)
            }
            FormatError::TypeMismatch { directive, got } => {
                write!(f, "%{} does not accept {}", directive, got)
            }
            FormatError::Forbidden { directive } => {
                write!(f, "%{} is not allowed in a trusted format", directive)
            }
        }
    }
}

impl std::error::Error for FormatError {}
