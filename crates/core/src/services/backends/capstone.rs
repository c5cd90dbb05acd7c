use capstone::arch::x86::X86OperandType;
use capstone::arch::{self, ArchOperand};
use capstone::prelude::*;
use capstone::{Capstone, Insn, InsnDetail, RegId};

use super::{DecodeError, InstructionDecoder};
use crate::model::{InstructionRecord, MemOperand, Operand};

/// 32-bit x86 decoder backed by Capstone with instruction detail enabled.
pub struct CapstoneDecoder {
    cs: Capstone,
}

fn capstone_version() -> String {
    let (major, minor) = Capstone::lib_version();
    format!("{major}.{minor}")
}

impl CapstoneDecoder {
    pub fn new() -> Result<Self, DecodeError> {
        let cs = Capstone::new()
            .x86()
            .mode(arch::x86::ArchMode::Mode32)
            .detail(true)
            .build()
            .map_err(|e| DecodeError::Init(format!("capstone init failed: {e}")))?;
        tracing::trace!(version = %capstone_version(), "capstone decoder ready");
        Ok(Self { cs })
    }

    fn reg_name(&self, reg: RegId) -> Option<String> {
        if reg.0 == 0 {
            return None;
        }
        self.cs.reg_name(reg)
    }

    fn operands(&self, detail: &InsnDetail) -> Vec<Operand> {
        detail
            .arch_detail()
            .operands()
            .into_iter()
            .filter_map(|op| match op {
                ArchOperand::X86Operand(op) => match op.op_type {
                    X86OperandType::Reg(reg) => {
                        self.reg_name(reg).map(|name| Operand::Reg { name })
                    }
                    X86OperandType::Imm(value) => Some(Operand::Imm { value, size: op.size }),
                    X86OperandType::Mem(mem) => Some(Operand::Mem(MemOperand {
                        base: self.reg_name(mem.base()),
                        index: self.reg_name(mem.index()),
                        scale: mem.scale(),
                        disp: mem.disp(),
                        size: op.size,
                    })),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }

    fn record(&self, insn: &Insn) -> InstructionRecord {
        let operands =
            self.cs.insn_detail(insn).map(|detail| self.operands(&detail)).unwrap_or_default();
        InstructionRecord::new(
            insn.address(),
            insn.mnemonic().unwrap_or(""),
            insn.op_str().unwrap_or(""),
            operands,
        )
    }
}

impl InstructionDecoder for CapstoneDecoder {
    fn decode(&self, bytes: &[u8], address: u64) -> Vec<InstructionRecord> {
        if bytes.is_empty() {
            return Vec::new();
        }
        match self.cs.disasm_all(bytes, address) {
            Ok(insns) => insns.iter().map(|insn| self.record(insn)).collect(),
            Err(e) => {
                tracing::debug!(address = %format!("0x{address:08x}"), error = %e, "decode failed");
                Vec::new()
            }
        }
    }

    fn name(&self) -> &'static str {
        "capstone"
    }
}
