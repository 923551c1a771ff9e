//! Simulated text segment
//!
//! Control transfers (a called function pointer, a `ret` through a return
//! slot) land in a [`CodeMap`]. Only the entry points listed here are valid
//! targets; anything else faults, the way jumping into a random address or
//! into the non-executable stack kills a real process.

use super::image::MemoryImage;
use super::value::Address;
use crate::exercise::errors::Fault;
use rustc_hash::FxHashMap;

/// Behavior of a routine once control reaches it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routine {
    /// Prints its message and calls `exit(0)`
    CompleteLevel { message: String },

    /// The instruction after a call site; the caller carries on and returns
    ResumeCaller,

    /// The C runtime after `main` returns; exits with `main`'s status
    ProcessExit,
}

/// A named entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: Address,
    pub routine: Routine,
}

/// Entry points of the simulated program, keyed by address
#[derive(Debug, Clone, Default)]
pub struct CodeMap {
    symbols: FxHashMap<Address, Symbol>,
}

impl CodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, address: Address, routine: Routine) {
        self.symbols.insert(
            address,
            Symbol {
                name: name.into(),
                address,
                routine,
            },
        );
    }

    pub fn get(&self, address: Address) -> Option<&Symbol> {
        self.symbols.get(&address)
    }

    /// Address of the entry point named `name`
    pub fn address_of(&self, name: &str) -> Option<Address> {
        self.symbols
            .values()
            .find(|s| s.name == name)
            .map(|s| s.address)
    }

    /// Resolve a transfer target, faulting if it is not an entry point.
    ///
    /// Targets inside the stack image fault as non-executable; everything
    /// else that is not a known entry point faults as an invalid access.
    pub fn resolve(&self, target: Address, image: &MemoryImage) -> Result<&Symbol, Fault> {
        if let Some(symbol) = self.symbols.get(&target) {
            return Ok(symbol);
        }
        if image.is_mapped(target) {
            Err(Fault::NonExecutable { address: target })
        } else {
            Err(Fault::Segfault { address: target })
        }
    }

    /// All symbols sorted by address
    pub fn symbols(&self) -> Vec<&Symbol> {
        let mut symbols: Vec<_> = self.symbols.values().collect();
        symbols.sort_by_key(|s| s.address);
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_and_unknown_targets() {
        let mut code = CodeMap::new();
        code.insert("complete_level", 0x401176, Routine::ResumeCaller);
        let image = MemoryImage::new(0x7fff_0000, 16);

        assert_eq!(code.resolve(0x401176, &image).unwrap().name, "complete_level");
        assert_eq!(
            code.resolve(0x7fff_0004, &image),
            Err(Fault::NonExecutable {
                address: 0x7fff_0004
            })
        );
        assert_eq!(
            code.resolve(0x4141_4141, &image),
            Err(Fault::Segfault {
                address: 0x4141_4141
            })
        );
    }

    #[test]
    fn test_address_of() {
        let mut code = CodeMap::new();
        code.insert("__libc_start_call_main", 0x7fff_f7c2_9d90, Routine::ProcessExit);
        assert_eq!(code.address_of("__libc_start_call_main"), Some(0x7fff_f7c2_9d90));
        assert_eq!(code.address_of("missing"), None);
    }
}
