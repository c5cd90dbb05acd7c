//! Bounded operand evidence around a call site.
//!
//! Only the trailing window of instructions ending at the call is inspected.
//! Every category keeps a short tail so rows stay small and auditable across a
//! whole binary. Matching works on the decoder's structured operands.

use crate::config::AnalysisConfig;
use crate::model::{Hints, InstructionRecord, MemOperand, Operand};

const PUSHES_TAIL: usize = 10;
const PUSH_IMMEDIATES_TAIL: usize = 6;
const SOURCES_TAIL: usize = 4;
const CONTEXT_TAIL: usize = 16;

const FRAME_REG: &str = "ebp";
const INDEX_BASE_REG: &str = "esi";

/// `[ebp - N]`
fn is_frame_slot(mem: &MemOperand) -> bool {
    mem.base.as_deref() == Some(FRAME_REG) && mem.index.is_none() && mem.disp < 0
}

/// `[esi + N]` or `[esi + reg*S (+ N)]`
fn is_indexed_slot(mem: &MemOperand) -> bool {
    mem.base.as_deref() == Some(INDEX_BASE_REG) && (mem.index.is_some() || mem.disp > 0)
}

fn is_address_source(insn: &InstructionRecord, registers: &[String]) -> bool {
    if insn.mnemonic != "mov" && insn.mnemonic != "movzx" {
        return false;
    }
    match insn.operands.as_slice() {
        [Operand::Reg { name }, Operand::Mem(mem)] => {
            registers.iter().any(|r| r == name) && mem.size == 2 && is_frame_slot(mem)
        }
        _ => false,
    }
}

fn is_count_source(insn: &InstructionRecord) -> bool {
    insn.mnemonic == "cmp" && matches!(insn.operands.last(), Some(Operand::Imm { .. }))
}

fn is_pointer_source(insn: &InstructionRecord) -> bool {
    insn.mnemonic == "push"
        && insn.operands.iter().any(|op| match op {
            Operand::Mem(mem) => is_frame_slot(mem) || is_indexed_slot(mem),
            _ => false,
        })
}

fn mentions_magic(insn: &InstructionRecord, magic_hex: &str) -> bool {
    insn.operands.iter().any(|op| {
        let value = match op {
            Operand::Imm { .. } => op.imm_unsigned(),
            Operand::Mem(mem) if mem.disp != 0 => Some(mem.disp.unsigned_abs()),
            _ => None,
        };
        value.is_some_and(|v| format!("{v:x}").starts_with(magic_hex))
    })
}

fn keep_tail<T>(mut items: Vec<T>, n: usize) -> Vec<T> {
    if items.len() > n {
        items.drain(..items.len() - n);
    }
    items
}

/// Collect hints from the last `config.hint_window` instructions of `context`.
///
/// `context` is expected to end with the call instruction itself. A window of
/// zero is treated as one so the call is always inspected.
pub fn collect_hints(context: &[InstructionRecord], config: &AnalysisConfig) -> Hints {
    let window = &context[context.len().saturating_sub(config.hint_window.max(1))..];
    let magic_hex = format!("{:x}", config.magic_constant);

    let mut pushes = Vec::new();
    let mut push_immediates = Vec::new();
    let mut address_sources = Vec::new();
    let mut count_sources = Vec::new();
    let mut pointer_sources = Vec::new();
    let mut magic_nearby = false;

    for insn in window {
        if insn.mnemonic == "push" {
            pushes.push(insn.op_str.clone());
            if let [imm @ Operand::Imm { .. }] = insn.operands.as_slice() {
                if let Some(value) = imm.imm_unsigned() {
                    push_immediates.push(format!("0x{value:x}"));
                }
            }
        }
        if is_address_source(insn, &config.address_registers) {
            address_sources.push(insn.op_str.clone());
        }
        if is_count_source(insn) {
            count_sources.push(insn.op_str.clone());
        }
        if is_pointer_source(insn) {
            pointer_sources.push(insn.op_str.clone());
        }
        if mentions_magic(insn, &magic_hex) {
            magic_nearby = true;
        }
    }

    Hints {
        pushes_tail: keep_tail(pushes, PUSHES_TAIL),
        push_immediates_tail: keep_tail(push_immediates, PUSH_IMMEDIATES_TAIL),
        address_sources: keep_tail(address_sources, SOURCES_TAIL),
        count_sources: keep_tail(count_sources, SOURCES_TAIL),
        pointer_sources: keep_tail(pointer_sources, SOURCES_TAIL),
        magic_nearby,
        context_tail: window[window.len().saturating_sub(CONTEXT_TAIL)..].to_vec(),
    }
}
