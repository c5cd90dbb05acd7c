//! Raw byte scans over the code section: direct `E8 rel32` calls and
//! backward prologue search.
//!
//! Neither scan validates instruction boundaries. An `E8` byte inside some
//! other instruction's encoding can produce a false call site; that is the
//! accepted price of a linear byte sweep.

use crate::model::{PrologueSearch, REL32_CALL_LEN};

const CALL_REL32_OPCODE: u8 = 0xE8;

/// Return every address in `code` holding an `E8 rel32` whose target is `target`.
///
/// `code_address` is the virtual address of `code[0]`. Targets wrap into the
/// 32-bit address space. Results are in discovery (ascending offset) order.
pub fn find_rel32_calls(code: &[u8], code_address: u64, target: u64) -> Vec<u64> {
    code.windows(REL32_CALL_LEN as usize)
        .enumerate()
        .filter(|(_, window)| window[0] == CALL_REL32_OPCODE)
        .filter_map(|(offset, window)| {
            let rel = i32::from_le_bytes([window[1], window[2], window[3], window[4]]);
            let site = code_address + offset as u64;
            let resolved = rel32_target(site, rel);
            (resolved == target).then_some(site)
        })
        .collect()
}

/// `site + 5 + rel`, truncated to 32 bits.
pub fn rel32_target(site: u64, rel: i32) -> u64 {
    site.wrapping_add(REL32_CALL_LEN).wrapping_add(rel as i64 as u64) & 0xFFFF_FFFF
}

/// Search backwards from `call_site - 3` for `signature`, no further than
/// `window` bytes before the call site and never before `code_address`.
///
/// The first hit (highest address) wins.
pub fn find_nearest_prologue(
    code: &[u8],
    code_address: u64,
    call_site: u64,
    signature: &[u8],
    window: u64,
) -> PrologueSearch {
    if signature.is_empty() || call_site < code_address {
        return PrologueSearch::NotFound;
    }
    let floor = code_address.max(call_site.saturating_sub(window));
    let Some(mut vma) = call_site.checked_sub(3) else {
        return PrologueSearch::NotFound;
    };
    while vma >= floor {
        let offset = (vma - code_address) as usize;
        if code.get(offset..offset + signature.len()) == Some(signature) {
            return PrologueSearch::Found(vma);
        }
        if vma == 0 {
            break;
        }
        vma -= 1;
    }
    PrologueSearch::NotFound
}
