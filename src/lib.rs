//! # Introduction
//!
//! overflow-lab runs small, intentionally vulnerable programs that teach
//! stack-based memory corruption. Each exercise places a fixed-size buffer
//! right below a sentinel (an `int`, a function pointer or a saved return
//! address) and fills the buffer with an unchecked copy of outside input.
//! Whether the input reached the sentinel decides the outcome.
//!
//! Process memory is simulated: the activation record is a flat byte image at
//! fixed addresses, so overflows are deterministic and only ever corrupt the
//! image, never the host process.
//!
//! ## Run pipeline
//!
//! ```text
//! ExerciseConfig → MemoryLayout → Copy → Evaluator → Report / Unwind → Snapshots → TUI
//! ```
//!
//! 1. [`exercise`]: presets, copy primitives, format engine, evaluator and
//!    the driver that runs one exercise.
//! 2. [`memory`]: byte order, the memory image, frame layout and the
//!    simulated code map.
//! 3. [`snapshot`]: captured output and per-phase snapshots.
//! 4. [`ui`]: ratatui-based inspector; not part of the stable library API.
//!
//! ## Exercises
//!
//! `hw1-level1` (`strcpy` over an `int`), `hw1-level2` (`gets` over a function
//! pointer), `hw1-level3` (`gets` over the return address) and `hw2-level1`
//! (`sprintf` with an untrusted format over an `int`).

pub mod exercise;
pub mod memory;
pub mod snapshot;
pub mod ui;
