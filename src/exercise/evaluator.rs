//! Outcome evaluation
//!
//! [`evaluate`] reads the sentinel once, after the copy, and classifies it
//! against the exercise's [`SuccessPredicate`]. The result is a plain value
//! except for one case: a non-null function pointer yields
//! [`Evaluation::Jump`], which the driver can only act on by spending an
//! [`ArbitraryJump`](super::capability::ArbitraryJump). Without one the
//! jump is [`withheld`](Evaluation::withhold) and the run is not a success.

use super::config::SuccessPredicate;
use super::errors::Fault;
use crate::memory::image::MemoryImage;
use crate::memory::layout::MemoryLayout;
use crate::memory::value::SentinelValue;
use crate::memory::Address;

/// What the sentinel looked like after the copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Integer sentinel satisfies the predicate
    Success { value: u32 },

    /// Integer sentinel was altered but is not the expected constant
    Changed { value: u32 },

    /// Integer sentinel still fails the predicate (normally still zero)
    Incomplete { value: u32 },

    /// Function pointer is non-null: control goes wherever it points
    Jump { target: Address },

    /// Function pointer is non-null but control transfers are disabled
    Withheld { target: Address },

    /// Function pointer is still null
    Unmodified,

    /// Return-address sentinel: reported, not judged
    Observed { resume_address: Address },
}

/// Coarse classification, stable across reruns of the same payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    Incomplete,
    Unjudged,
}

impl Evaluation {
    pub fn classification(&self) -> Classification {
        match self {
            Evaluation::Success { .. } | Evaluation::Jump { .. } => Classification::Success,
            Evaluation::Changed { .. }
            | Evaluation::Incomplete { .. }
            | Evaluation::Unmodified
            | Evaluation::Withheld { .. } => Classification::Incomplete,
            Evaluation::Observed { .. } => Classification::Unjudged,
        }
    }

    pub fn is_success(&self) -> bool {
        self.classification() == Classification::Success
    }

    /// The same outcome when nothing may act on a corrupted pointer
    pub fn withhold(self) -> Self {
        match self {
            Evaluation::Jump { target } => Evaluation::Withheld { target },
            other => other,
        }
    }
}

/// Classify a decoded sentinel against a predicate
pub fn classify(value: SentinelValue, predicate: SuccessPredicate) -> Evaluation {
    match (predicate, value) {
        (SuccessPredicate::Equals(magic), SentinelValue::Int(n)) => {
            if n == magic {
                Evaluation::Success { value: n }
            } else if n != 0 {
                Evaluation::Changed { value: n }
            } else {
                Evaluation::Incomplete { value: n }
            }
        }
        (SuccessPredicate::NonZero, SentinelValue::Int(n)) => {
            if n != 0 {
                Evaluation::Success { value: n }
            } else {
                Evaluation::Incomplete { value: n }
            }
        }
        (SuccessPredicate::ObserveOnly, SentinelValue::Pointer(addr)) => Evaluation::Observed {
            resume_address: addr,
        },
        (_, SentinelValue::Pointer(0)) => Evaluation::Unmodified,
        (_, SentinelValue::Pointer(addr)) => Evaluation::Jump { target: addr },
        (_, SentinelValue::Int(n)) => Evaluation::Incomplete { value: n },
    }
}

/// Read the sentinel of `layout` out of `image` and classify it
pub fn evaluate(
    layout: &MemoryLayout,
    image: &MemoryImage,
    predicate: SuccessPredicate,
) -> Result<Evaluation, Fault> {
    let value = layout.read_sentinel(image)?;
    log::debug!("sentinel {} reads {}", layout.sentinel().name, value);
    Ok(classify(value, predicate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::constants::MAGIC;

    #[test]
    fn test_magic_match() {
        assert_eq!(
            classify(SentinelValue::Int(MAGIC), SuccessPredicate::Equals(MAGIC)),
            Evaluation::Success { value: MAGIC }
        );
    }

    #[test]
    fn test_changed_is_distinct_from_incomplete() {
        let changed = classify(SentinelValue::Int(0x41414141), SuccessPredicate::Equals(MAGIC));
        assert_eq!(changed, Evaluation::Changed { value: 0x41414141 });
        assert_eq!(changed.classification(), Classification::Incomplete);

        let untouched = classify(SentinelValue::Int(0), SuccessPredicate::Equals(MAGIC));
        assert_eq!(untouched, Evaluation::Incomplete { value: 0 });
    }

    #[test]
    fn test_any_nonzero() {
        assert!(classify(SentinelValue::Int(1), SuccessPredicate::NonZero).is_success());
        assert!(!classify(SentinelValue::Int(0), SuccessPredicate::NonZero).is_success());
    }

    #[test]
    fn test_function_pointer() {
        assert_eq!(
            classify(SentinelValue::Pointer(0), SuccessPredicate::NonNull),
            Evaluation::Unmodified
        );
        assert_eq!(
            classify(SentinelValue::Pointer(0x401196), SuccessPredicate::NonNull),
            Evaluation::Jump { target: 0x401196 }
        );
    }

    #[test]
    fn test_withheld_jump_is_not_success() {
        let withheld = Evaluation::Jump { target: 0x401196 }.withhold();
        assert_eq!(withheld, Evaluation::Withheld { target: 0x401196 });
        assert_eq!(withheld.classification(), Classification::Incomplete);
        assert_eq!(Evaluation::Unmodified.withhold(), Evaluation::Unmodified);
    }

    #[test]
    fn test_return_address_is_only_observed() {
        let observed = classify(SentinelValue::Pointer(0x401231), SuccessPredicate::ObserveOnly);
        assert_eq!(
            observed,
            Evaluation::Observed {
                resume_address: 0x401231
            }
        );
        assert_eq!(observed.classification(), Classification::Unjudged);
    }
}
