//! The arbitrary-jump capability
//!
//! Calling a function pointer that was read back from attacker-controlled
//! bytes is not ordinary dynamic dispatch, so it is not modeled as a trait
//! object or a closure. It takes an [`ArbitraryJump`], which the driver holds
//! only when the exercise's [`ControlTransferPolicy`] allows it, and which is
//! consumed by the single jump it permits.
//!
//! Where the jump lands is decided by the [`CodeMap`]: known entry points run,
//! everything else faults.

use super::config::ControlTransferPolicy;
use super::errors::Fault;
use crate::memory::code::{CodeMap, Routine};
use crate::memory::image::MemoryImage;
use crate::memory::Address;
use crate::snapshot::Terminal;

/// What happened after control reached an address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    /// The routine called `exit(status)`
    Exited(i32),
    /// Execution resumed in a caller, which keeps unwinding
    Resumed,
    /// The target was not code
    Crashed(Fault),
}

/// Permission to transfer control to an address taken from the image
#[derive(Debug)]
pub struct ArbitraryJump {
    _sealed: (),
}

impl ArbitraryJump {
    /// Grant the capability if the policy allows control transfers
    pub fn grant(policy: ControlTransferPolicy) -> Option<Self> {
        match policy {
            ControlTransferPolicy::Enabled => Some(ArbitraryJump { _sealed: () }),
            ControlTransferPolicy::Disabled => None,
        }
    }

    /// Call `target`. The capability is spent; control does not come back
    /// to whoever evaluated the pointer.
    pub fn invoke(
        self,
        target: Address,
        code: &CodeMap,
        image: &MemoryImage,
        terminal: &mut Terminal,
    ) -> Landing {
        log::info!("control transfer to 0x{:x}", target);
        land(target, code, image, terminal)
    }
}

/// Run whatever lives at `target`. Shared by calls and by `ret`.
pub(crate) fn land(
    target: Address,
    code: &CodeMap,
    image: &MemoryImage,
    terminal: &mut Terminal,
) -> Landing {
    match code.resolve(target, image) {
        Ok(symbol) => {
            log::debug!("landed in {} @ 0x{:x}", symbol.name, symbol.address);
            match &symbol.routine {
                Routine::CompleteLevel { message } => {
                    terminal.print(message);
                    Landing::Exited(0)
                }
                Routine::ResumeCaller => Landing::Resumed,
                Routine::ProcessExit => Landing::Exited(0),
            }
        }
        Err(fault) => {
            log::warn!("{}", fault);
            Landing::Crashed(fault)
        }
    }
}
