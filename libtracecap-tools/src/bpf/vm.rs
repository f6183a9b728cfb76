use super::instruction::*;
use crate::error::Error;

/// Interpreter for a validated classic BPF program
///
/// `run` returns the program verdict: 0 drops the packet, any other value keeps it
/// (the value is the number of bytes to keep).
#[derive(Clone, Debug)]
pub struct BpfVm {
    program: BpfProgram,
}

impl BpfVm {
    /// Validate `program` and build an interpreter
    pub fn new(program: BpfProgram) -> Result<Self, Error> {
        validate(&program)?;
        Ok(BpfVm { program })
    }

    pub fn program(&self) -> &BpfProgram {
        &self.program
    }

    /// True if the program keeps the packet
    #[inline]
    pub fn matches(&self, data: &[u8]) -> bool {
        self.run(data) > 0
    }

    /// Execute the program over `data`
    ///
    /// Loads out of bounds and divisions by zero terminate the program with 0.
    pub fn run(&self, data: &[u8]) -> u32 {
        let insns = self.program.instructions();
        let mut a: u32 = 0;
        let mut x: u32 = 0;
        let mut mem = [0u32; BPF_MEMWORDS];
        let mut pc = 0usize;
        while let Some(insn) = insns.get(pc) {
            pc += 1;
            let k = insn.k;
            match bpf_class(insn.code) {
                BPF_LD => {
                    a = match bpf_mode(insn.code) {
                        BPF_IMM => k,
                        BPF_LEN => data.len() as u32,
                        BPF_MEM => mem[k as usize],
                        BPF_ABS => match load(data, Some(k), bpf_size(insn.code)) {
                            Some(v) => v,
                            None => return 0,
                        },
                        BPF_IND => match load(data, x.checked_add(k), bpf_size(insn.code)) {
                            Some(v) => v,
                            None => return 0,
                        },
                        _ => return 0,
                    }
                }
                BPF_LDX => {
                    x = match bpf_mode(insn.code) {
                        BPF_IMM => k,
                        BPF_LEN => data.len() as u32,
                        BPF_MEM => mem[k as usize],
                        BPF_MSH => match data.get(k as usize) {
                            Some(b) => u32::from(b & 0x0f) << 2,
                            None => return 0,
                        },
                        _ => return 0,
                    }
                }
                BPF_ST => mem[k as usize] = a,
                BPF_STX => mem[k as usize] = x,
                BPF_ALU => {
                    let operand = if bpf_src(insn.code) == BPF_X { x } else { k };
                    a = match bpf_op(insn.code) {
                        BPF_ADD => a.wrapping_add(operand),
                        BPF_SUB => a.wrapping_sub(operand),
                        BPF_MUL => a.wrapping_mul(operand),
                        BPF_DIV => match a.checked_div(operand) {
                            Some(v) => v,
                            None => return 0,
                        },
                        BPF_MOD => match a.checked_rem(operand) {
                            Some(v) => v,
                            None => return 0,
                        },
                        BPF_AND => a & operand,
                        BPF_OR => a | operand,
                        BPF_XOR => a ^ operand,
                        BPF_LSH => a.checked_shl(operand).unwrap_or(0),
                        BPF_RSH => a.checked_shr(operand).unwrap_or(0),
                        BPF_NEG => a.wrapping_neg(),
                        _ => return 0,
                    }
                }
                BPF_JMP => {
                    let operand = if bpf_src(insn.code) == BPF_X { x } else { k };
                    let cond = match bpf_op(insn.code) {
                        BPF_JA => {
                            pc += k as usize;
                            continue;
                        }
                        BPF_JEQ => a == operand,
                        BPF_JGT => a > operand,
                        BPF_JGE => a >= operand,
                        BPF_JSET => a & operand != 0,
                        _ => return 0,
                    };
                    pc += usize::from(if cond { insn.jt } else { insn.jf });
                }
                BPF_RET => {
                    return if bpf_rval(insn.code) == BPF_A { a } else { k };
                }
                BPF_MISC => match bpf_miscop(insn.code) {
                    BPF_TAX => x = a,
                    BPF_TXA => a = x,
                    _ => return 0,
                },
                _ => return 0,
            }
        }
        0
    }
}

/// Big-endian load of 1, 2 or 4 bytes at `offset`
fn load(data: &[u8], offset: Option<u32>, size: u16) -> Option<u32> {
    let offset = offset? as usize;
    let width = match size {
        BPF_W => 4,
        BPF_H => 2,
        BPF_B => 1,
        _ => return None,
    };
    let bytes = data.get(offset..offset.checked_add(width)?)?;
    Some(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
}

fn validate(program: &BpfProgram) -> Result<(), Error> {
    let insns = program.instructions();
    if insns.is_empty() || insns.len() > BPF_MAXINSNS {
        return Err(Error::Bpf(format!(
            "program length {} not in 1..={}",
            insns.len(),
            BPF_MAXINSNS
        )));
    }
    let invalid = |pc: usize, what: &str| Error::Bpf(format!("instruction {}: {}", pc, what));
    for (pc, insn) in insns.iter().enumerate() {
        let code = insn.code;
        if code > 0xff {
            return Err(invalid(pc, "unknown opcode"));
        }
        let mem_ok = (insn.k as usize) < BPF_MEMWORDS;
        match bpf_class(code) {
            BPF_LD | BPF_LDX => {
                let ldx = bpf_class(code) == BPF_LDX;
                let ok = match (bpf_mode(code), bpf_size(code)) {
                    (BPF_IMM, BPF_W) | (BPF_LEN, BPF_W) => true,
                    (BPF_MEM, BPF_W) => mem_ok,
                    (BPF_ABS, BPF_W | BPF_H | BPF_B) | (BPF_IND, BPF_W | BPF_H | BPF_B) => !ldx,
                    (BPF_MSH, BPF_B) => ldx,
                    _ => false,
                };
                if !ok {
                    return Err(invalid(pc, "invalid load"));
                }
            }
            BPF_ST | BPF_STX => {
                if code & !0x07 != 0 || !mem_ok {
                    return Err(invalid(pc, "invalid store"));
                }
            }
            BPF_ALU => {
                match bpf_op(code) {
                    BPF_ADD | BPF_SUB | BPF_MUL | BPF_OR | BPF_AND | BPF_LSH | BPF_RSH
                    | BPF_XOR | BPF_NEG => (),
                    BPF_DIV | BPF_MOD => {
                        if bpf_src(code) == BPF_K && insn.k == 0 {
                            return Err(invalid(pc, "division by zero"));
                        }
                    }
                    _ => return Err(invalid(pc, "invalid alu opcode")),
                }
            }
            BPF_JMP => {
                let next = pc + 1;
                if bpf_op(code) == BPF_JA {
                    let target = next.checked_add(insn.k as usize);
                    if target.map_or(true, |t| t >= insns.len()) {
                        return Err(invalid(pc, "jump out of program"));
                    }
                } else {
                    match bpf_op(code) {
                        BPF_JEQ | BPF_JGT | BPF_JGE | BPF_JSET => (),
                        _ => return Err(invalid(pc, "invalid jump opcode")),
                    }
                    if next + usize::from(insn.jt) >= insns.len()
                        || next + usize::from(insn.jf) >= insns.len()
                    {
                        return Err(invalid(pc, "jump out of program"));
                    }
                }
            }
            BPF_RET => match bpf_rval(code) {
                BPF_K | BPF_A => (),
                _ => return Err(invalid(pc, "invalid return")),
            },
            BPF_MISC => match bpf_miscop(code) {
                BPF_TAX | BPF_TXA => (),
                _ => return Err(invalid(pc, "invalid misc opcode")),
            },
            _ => return Err(invalid(pc, "unknown instruction class")),
        }
    }
    match insns.last() {
        Some(last) if bpf_class(last.code) == BPF_RET => Ok(()),
        _ => Err(Error::Bpf("program does not end with a return".to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ldb [0]; jeq #0x41; ret #0xffff; ret #0
    fn first_byte_is_0x41() -> BpfProgram {
        BpfProgram::new(vec![
            BpfInstruction::stmt(BPF_LD | BPF_B | BPF_ABS, 0),
            BpfInstruction::jump(BPF_JMP | BPF_JEQ | BPF_K, 0x41, 0, 1),
            BpfInstruction::stmt(BPF_RET | BPF_K, 0xffff),
            BpfInstruction::stmt(BPF_RET | BPF_K, 0),
        ])
    }

    #[test]
    fn bpf_first_byte() {
        let vm = BpfVm::new(first_byte_is_0x41()).unwrap();
        assert_eq!(vm.run(&[0x41]), 0xffff);
        assert_eq!(vm.run(&[0x42]), 0);
        // out of bounds load
        assert_eq!(vm.run(&[]), 0);
        assert!(vm.matches(&[0x41, 0x00]));
    }

    #[test]
    fn bpf_ipv4_tcp_port() {
        // tcpdump -ddd 'ip and tcp dst port 80' (simplified, no fragment check)
        let text = "\
            40 0 0 12\n\
            21 0 6 2048\n\
            48 0 0 23\n\
            21 0 4 6\n\
            177 0 0 14\n\
            72 0 0 16\n\
            21 0 1 80\n\
            6 0 0 262144\n\
            6 0 0 0\n";
        let vm = BpfVm::new(BpfProgram::from_ddd(text).unwrap()).unwrap();
        let mut frame = vec![0u8; 14 + 20 + 20];
        frame[12] = 0x08;
        frame[14] = 0x45;
        frame[23] = 6;
        frame[14 + 20 + 3] = 80;
        assert_eq!(vm.run(&frame), 262144);
        frame[14 + 20 + 3] = 81;
        assert_eq!(vm.run(&frame), 0);
        frame[14 + 20 + 3] = 80;
        frame[23] = 17;
        assert_eq!(vm.run(&frame), 0);
    }

    #[test]
    fn bpf_alu_and_scratch() {
        let prog = BpfProgram::new(vec![
            BpfInstruction::stmt(BPF_LD | BPF_W | BPF_LEN, 0),
            BpfInstruction::stmt(BPF_ALU | BPF_MUL | BPF_K, 3),
            BpfInstruction::stmt(BPF_ST, 2),
            BpfInstruction::stmt(BPF_LDX | BPF_W | BPF_IMM, 4),
            BpfInstruction::stmt(BPF_LD | BPF_W | BPF_MEM, 2),
            BpfInstruction::stmt(BPF_ALU | BPF_SUB | BPF_X, 0),
            BpfInstruction::stmt(BPF_ALU | BPF_LSH | BPF_K, 1),
            BpfInstruction::stmt(BPF_MISC | BPF_TAX, 0),
            BpfInstruction::stmt(BPF_MISC | BPF_TXA, 0),
            BpfInstruction::stmt(BPF_RET | BPF_A, 0),
        ]);
        let vm = BpfVm::new(prog).unwrap();
        // (10 * 3 - 4) << 1
        assert_eq!(vm.run(&[0; 10]), 52);
    }

    #[test]
    fn bpf_runtime_division_by_zero() {
        let prog = BpfProgram::new(vec![
            BpfInstruction::stmt(BPF_LD | BPF_W | BPF_IMM, 8),
            BpfInstruction::stmt(BPF_ALU | BPF_DIV | BPF_X, 0),
            BpfInstruction::stmt(BPF_RET | BPF_K, 1),
        ]);
        assert_eq!(BpfVm::new(prog).unwrap().run(&[]), 0);
    }

    #[test]
    fn bpf_validation() {
        let reject = |insns: Vec<BpfInstruction>| {
            assert!(matches!(BpfVm::new(BpfProgram::new(insns)), Err(Error::Bpf(_))))
        };
        reject(vec![]);
        // no final return
        reject(vec![BpfInstruction::stmt(BPF_LD | BPF_W | BPF_IMM, 0)]);
        // jump beyond the end
        reject(vec![
            BpfInstruction::jump(BPF_JMP | BPF_JEQ | BPF_K, 0, 0, 2),
            BpfInstruction::stmt(BPF_RET | BPF_K, 0),
        ]);
        reject(vec![
            BpfInstruction::stmt(BPF_JMP | BPF_JA, 5),
            BpfInstruction::stmt(BPF_RET | BPF_K, 0),
        ]);
        // scratch index out of range
        reject(vec![
            BpfInstruction::stmt(BPF_ST, 16),
            BpfInstruction::stmt(BPF_RET | BPF_K, 0),
        ]);
        // constant division by zero
        reject(vec![
            BpfInstruction::stmt(BPF_ALU | BPF_DIV | BPF_K, 0),
            BpfInstruction::stmt(BPF_RET | BPF_K, 0),
        ]);
        // unknown opcode
        reject(vec![
            BpfInstruction::stmt(BPF_ALU | 0xb0, 1),
            BpfInstruction::stmt(BPF_RET | BPF_K, 0),
        ]);
        assert!(BpfVm::new(BpfProgram::accept_all(65535)).is_ok());
    }
}
