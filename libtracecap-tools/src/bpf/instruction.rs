use crate::error::Error;
use std::fmt;

// instruction classes
pub const BPF_LD: u16 = 0x00;
pub const BPF_LDX: u16 = 0x01;
pub const BPF_ST: u16 = 0x02;
pub const BPF_STX: u16 = 0x03;
pub const BPF_ALU: u16 = 0x04;
pub const BPF_JMP: u16 = 0x05;
pub const BPF_RET: u16 = 0x06;
pub const BPF_MISC: u16 = 0x07;

// ld/ldx sizes
pub const BPF_W: u16 = 0x00;
pub const BPF_H: u16 = 0x08;
pub const BPF_B: u16 = 0x10;

// ld/ldx modes
pub const BPF_IMM: u16 = 0x00;
pub const BPF_ABS: u16 = 0x20;
pub const BPF_IND: u16 = 0x40;
pub const BPF_MEM: u16 = 0x60;
pub const BPF_LEN: u16 = 0x80;
pub const BPF_MSH: u16 = 0xa0;

// alu operations
pub const BPF_ADD: u16 = 0x00;
pub const BPF_SUB: u16 = 0x10;
pub const BPF_MUL: u16 = 0x20;
pub const BPF_DIV: u16 = 0x30;
pub const BPF_OR: u16 = 0x40;
pub const BPF_AND: u16 = 0x50;
pub const BPF_LSH: u16 = 0x60;
pub const BPF_RSH: u16 = 0x70;
pub const BPF_NEG: u16 = 0x80;
pub const BPF_MOD: u16 = 0x90;
pub const BPF_XOR: u16 = 0xa0;

// jump conditions
pub const BPF_JA: u16 = 0x00;
pub const BPF_JEQ: u16 = 0x10;
pub const BPF_JGT: u16 = 0x20;
pub const BPF_JGE: u16 = 0x30;
pub const BPF_JSET: u16 = 0x40;

// operand source
pub const BPF_K: u16 = 0x00;
pub const BPF_X: u16 = 0x08;
/// Return value taken from the accumulator
pub const BPF_A: u16 = 0x10;

// misc operations
pub const BPF_TAX: u16 = 0x00;
pub const BPF_TXA: u16 = 0x80;

/// Number of scratch memory words
pub const BPF_MEMWORDS: usize = 16;
/// Largest accepted program
pub const BPF_MAXINSNS: usize = 4096;

#[inline]
pub const fn bpf_class(code: u16) -> u16 {
    code & 0x07
}

#[inline]
pub const fn bpf_size(code: u16) -> u16 {
    code & 0x18
}

#[inline]
pub const fn bpf_mode(code: u16) -> u16 {
    code & 0xe0
}

#[inline]
pub const fn bpf_op(code: u16) -> u16 {
    code & 0xf0
}

#[inline]
pub const fn bpf_src(code: u16) -> u16 {
    code & 0x08
}

#[inline]
pub const fn bpf_rval(code: u16) -> u16 {
    code & 0x18
}

#[inline]
pub const fn bpf_miscop(code: u16) -> u16 {
    code & 0xf8
}

/// A classic BPF instruction, laid out like the kernel `sock_filter`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BpfInstruction {
    pub code: u16,
    pub jt: u8,
    pub jf: u8,
    pub k: u32,
}

impl BpfInstruction {
    pub const fn new(code: u16, jt: u8, jf: u8, k: u32) -> Self {
        BpfInstruction { code, jt, jf, k }
    }

    /// Non-jump instruction
    pub const fn stmt(code: u16, k: u32) -> Self {
        BpfInstruction::new(code, 0, 0, k)
    }

    /// Conditional jump
    pub const fn jump(code: u16, k: u32, jt: u8, jf: u8) -> Self {
        BpfInstruction::new(code, jt, jf, k)
    }
}

impl fmt::Display for BpfInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.code, self.jt, self.jf, self.k)
    }
}

/// A sequence of BPF instructions
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BpfProgram {
    instructions: Vec<BpfInstruction>,
}

impl BpfProgram {
    pub fn new(instructions: Vec<BpfInstruction>) -> Self {
        BpfProgram { instructions }
    }

    /// Program accepting every packet, keeping at most `snaplen` bytes
    pub fn accept_all(snaplen: u32) -> Self {
        BpfProgram::new(vec![BpfInstruction::stmt(BPF_RET | BPF_K, snaplen)])
    }

    pub fn instructions(&self) -> &[BpfInstruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Parse an assembled program, as printed by `tcpdump -ddd` or `tcpdump -dd`
    ///
    /// `-ddd` output starts with the instruction count, followed by one
    /// `code jt jf k` line per instruction, in decimal. `-dd` lines look like
    /// `{ 0x28, 0, 0, 0x0000000c },`. Empty lines and lines starting with `#`
    /// are ignored.
    pub fn from_ddd(text: &str) -> Result<Self, Error> {
        let mut count = None;
        let mut instructions = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line
                .split(|c: char| c.is_whitespace() || c == ',' || c == '{' || c == '}')
                .filter(|s| !s.is_empty())
                .collect();
            let bad_line = || Error::Bpf(format!("line {}: cannot parse '{}'", lineno + 1, line));
            match fields[..] {
                [n] if count.is_none() && instructions.is_empty() => {
                    count = Some(parse_number(n).ok_or_else(bad_line)? as usize);
                }
                [code, jt, jf, k] => {
                    let code = parse_number(code)
                        .and_then(|v| u16::try_from(v).ok())
                        .ok_or_else(bad_line)?;
                    let jt = parse_number(jt)
                        .and_then(|v| u8::try_from(v).ok())
                        .ok_or_else(bad_line)?;
                    let jf = parse_number(jf)
                        .and_then(|v| u8::try_from(v).ok())
                        .ok_or_else(bad_line)?;
                    let k = parse_number(k).ok_or_else(bad_line)?;
                    instructions.push(BpfInstruction::new(code, jt, jf, k));
                }
                _ => return Err(bad_line()),
            }
        }
        if let Some(n) = count {
            if n != instructions.len() {
                return Err(Error::Bpf(format!(
                    "program announces {} instructions, found {}",
                    n,
                    instructions.len()
                )));
            }
        }
        Ok(BpfProgram::new(instructions))
    }
}

fn parse_number(s: &str) -> Option<u32> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

impl From<Vec<BpfInstruction>> for BpfProgram {
    fn from(instructions: Vec<BpfInstruction>) -> Self {
        BpfProgram::new(instructions)
    }
}
