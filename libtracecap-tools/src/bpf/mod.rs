//! Classic BPF programs and a user-space interpreter
//!
//! Programs are pre-assembled: either built from instructions, or parsed from
//! the output of `tcpdump -ddd` (or `-dd`).

mod instruction;
mod vm;

pub use instruction::*;
pub use vm::*;
