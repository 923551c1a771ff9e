// Snapshot management for stepping back through a run

use crate::exercise::driver::Phase;
use crate::memory::image::MemoryImage;
use std::io::{self, Write};

/// Captures everything the exercise prints
#[derive(Debug, Clone, Default)]
pub struct Terminal {
    pub text: String,
    /// Also write through to the real stdout as output happens
    echo: bool,
}

impl Terminal {
    pub fn new() -> Self {
        Terminal {
            text: String::new(),
            echo: false,
        }
    }

    /// A terminal that mirrors every print to stdout
    pub fn echoing() -> Self {
        Terminal {
            text: String::new(),
            echo: true,
        }
    }

    /// Print without adding a newline
    pub fn print(&mut self, text: &str) {
        self.text.push_str(text);
        if self.echo {
            let mut out = io::stdout().lock();
            // A closed stdout must not stop the exercise
            let _ = out.write_all(text.as_bytes());
            let _ = out.flush();
        }
    }

    /// Get all lines as a vector of strings
    pub fn get_output(&self) -> Vec<String> {
        let mut result: Vec<String> = self.text.split('\n').map(|s| s.to_string()).collect();
        // Remove trailing empty string if text ended with newline
        if result.last().is_some_and(|s| s.is_empty()) {
            result.pop();
        }
        result
    }
}

/// State of the run when a phase was entered
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub phase: Phase,
    pub image: MemoryImage,
    pub terminal: Terminal,
    /// One-line description of what the phase did
    pub note: String,
}

impl Snapshot {
    /// Estimate the memory usage of this snapshot in bytes
    pub fn estimated_size(&self) -> usize {
        // Region table: assume 64 bytes per region
        let regions = self.image.regions().len() * 64;
        self.image.len() + regions + self.terminal.text.len() + self.note.len()
    }
}

/// Ordered history of one run
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    snapshots: Vec<Snapshot>,
    max_memory: usize,
    current_memory: usize,
}

impl SnapshotManager {
    pub fn new(max_memory: usize) -> Self {
        SnapshotManager {
            snapshots: Vec::new(),
            max_memory,
            current_memory: 0,
        }
    }

    /// Add a snapshot to history
    pub fn push(&mut self, snapshot: Snapshot) -> Result<(), String> {
        let snapshot_size = snapshot.estimated_size();

        if self.current_memory + snapshot_size > self.max_memory {
            return Err(format!(
                "Snapshot memory limit exceeded: {} + {} > {}",
                self.current_memory, snapshot_size, self.max_memory
            ));
        }

        self.current_memory += snapshot_size;
        self.snapshots.push(snapshot);
        Ok(())
    }

    /// Get a snapshot by index
    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    /// Get the number of snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }

    pub fn memory_limit(&self) -> usize {
        self.max_memory
    }
}
