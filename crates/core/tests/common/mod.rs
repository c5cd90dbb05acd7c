//! Shared fixtures: a synthetic 64 KB code section with known call sites and
//! a minimal PE32 writer to wrap it in a loadable image.
#![allow(dead_code)]

pub const IMAGE_BASE: u32 = 0x0040_0000;
pub const TEXT_RVA: u32 = 0x1000;
pub const CODE_ADDRESS: u64 = (IMAGE_BASE + TEXT_RVA) as u64;
pub const CODE_SIZE: usize = 0x10000;

/// Offsets inside the code section.
pub const FUNC_ONE: usize = 0x1000;
pub const FUNC_ONE_CALL_A: usize = 0x1010;
pub const FUNC_ONE_CALL_B: usize = 0x1020;
pub const FUNC_TWO: usize = 0x3000;
pub const FUNC_TWO_CALL: usize = 0x3010;
pub const PRIM_WRITE: usize = 0x8000;
pub const PRIM_READ: usize = 0x9000;

pub fn va(offset: usize) -> u64 {
    CODE_ADDRESS + offset as u64
}

/// Encode `call rel32` at `offset` targeting `target` (both code offsets).
pub fn put_call(code: &mut [u8], offset: usize, target: usize) {
    let rel = target as i64 - (offset as i64 + 5);
    code[offset] = 0xE8;
    code[offset + 1..offset + 5].copy_from_slice(&(rel as i32).to_le_bytes());
}

pub fn put(code: &mut [u8], offset: usize, bytes: &[u8]) {
    code[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// Two caller functions and two primitives:
///
/// ```text
/// FUNC_ONE:  push ebp; mov ebp, esp
///            mov word ptr [ebp - 4], 0xa4a4
///            movzx edx, word ptr [ebp - 8]
///            push 0x20; nop
///            call PRIM_WRITE
///            push dword ptr [ebp - 0xc]
///            cmp ecx, 0x10; nop x5
///            call PRIM_WRITE
/// FUNC_TWO:  push ebp; mov ebp, esp; push 1; nop..
///            call PRIM_READ
/// ```
pub fn sample_code() -> Vec<u8> {
    let mut code = vec![0u8; CODE_SIZE];

    put(&mut code, FUNC_ONE, &[0x55, 0x8B, 0xEC]);
    put(&mut code, FUNC_ONE + 3, &[0x66, 0xC7, 0x45, 0xFC, 0xA4, 0xA4]);
    put(&mut code, FUNC_ONE + 9, &[0x0F, 0xB7, 0x55, 0xF8]);
    put(&mut code, FUNC_ONE + 0xD, &[0x6A, 0x20, 0x90]);
    put_call(&mut code, FUNC_ONE_CALL_A, PRIM_WRITE);
    put(&mut code, FUNC_ONE_CALL_A + 5, &[0xFF, 0x75, 0xF4]);
    put(&mut code, FUNC_ONE_CALL_A + 8, &[0x83, 0xF9, 0x10]);
    put(&mut code, FUNC_ONE_CALL_A + 11, &[0x90; 5]);
    put_call(&mut code, FUNC_ONE_CALL_B, PRIM_WRITE);
    put(&mut code, FUNC_ONE_CALL_B + 5, &[0x5D, 0xC3]);

    put(&mut code, FUNC_TWO, &[0x55, 0x8B, 0xEC, 0x6A, 0x01]);
    put(&mut code, FUNC_TWO + 5, &[0x90; 11]);
    put_call(&mut code, FUNC_TWO_CALL, PRIM_READ);
    put(&mut code, FUNC_TWO_CALL + 5, &[0x5D, 0xC3]);

    put(&mut code, PRIM_WRITE, &[0x55, 0x8B, 0xEC, 0x5D, 0xC3]);
    put(&mut code, PRIM_READ, &[0x55, 0x8B, 0xEC, 0x5D, 0xC3]);
    code
}

fn put_u16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn align_up(v: usize, a: usize) -> usize {
    (v + a - 1) / a * a
}

const FILE_ALIGN: usize = 0x200;
const SECT_ALIGN: usize = 0x1000;
const PE_OFFSET: usize = 0x80;
const OPT_HEADER_SIZE: usize = 0xE0;

/// Minimal PE32 (i386) with `.text` holding `code` and, when `exports` is
/// non-empty, an `.edata` export directory. Export addresses are code offsets.
pub fn build_pe32(code: &[u8], exports: &[(&str, usize)]) -> Vec<u8> {
    let text_raw = align_up(code.len().max(1), FILE_ALIGN);
    let edata_rva = TEXT_RVA as usize + align_up(code.len().max(1), SECT_ALIGN);
    let edata = build_export_dir(edata_rva as u32, exports);
    let edata_raw = align_up(edata.len().max(1), FILE_ALIGN);
    let edata_ptr = FILE_ALIGN + text_raw;
    let size_of_image = edata_rva + align_up(edata.len().max(1), SECT_ALIGN);

    let mut buf = vec![0u8; edata_ptr + edata_raw];

    // DOS header
    buf[0] = b'M';
    buf[1] = b'Z';
    put_u32(&mut buf, 0x3C, PE_OFFSET as u32);

    // PE signature + COFF header
    buf[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");
    let coff = PE_OFFSET + 4;
    put_u16(&mut buf, coff, 0x014C);
    put_u16(&mut buf, coff + 2, 2);
    put_u16(&mut buf, coff + 16, OPT_HEADER_SIZE as u16);
    put_u16(&mut buf, coff + 18, 0x0102);

    // Optional header (PE32)
    let opt = coff + 20;
    put_u16(&mut buf, opt, 0x010B);
    put_u32(&mut buf, opt + 4, text_raw as u32);
    put_u32(&mut buf, opt + 8, edata_raw as u32);
    put_u32(&mut buf, opt + 16, TEXT_RVA);
    put_u32(&mut buf, opt + 20, TEXT_RVA);
    put_u32(&mut buf, opt + 24, edata_rva as u32);
    put_u32(&mut buf, opt + 28, IMAGE_BASE);
    put_u32(&mut buf, opt + 32, SECT_ALIGN as u32);
    put_u32(&mut buf, opt + 36, FILE_ALIGN as u32);
    put_u16(&mut buf, opt + 40, 4);
    put_u16(&mut buf, opt + 48, 4);
    put_u32(&mut buf, opt + 56, size_of_image as u32);
    put_u32(&mut buf, opt + 60, FILE_ALIGN as u32);
    put_u16(&mut buf, opt + 68, 3);
    put_u32(&mut buf, opt + 72, 0x0010_0000);
    put_u32(&mut buf, opt + 76, 0x1000);
    put_u32(&mut buf, opt + 80, 0x0010_0000);
    put_u32(&mut buf, opt + 84, 0x1000);
    put_u32(&mut buf, opt + 92, 16);
    if !exports.is_empty() {
        put_u32(&mut buf, opt + 96, edata_rva as u32);
        put_u32(&mut buf, opt + 100, edata.len() as u32);
    }

    // Section table
    let sections = opt + OPT_HEADER_SIZE;
    buf[sections..sections + 5].copy_from_slice(b".text");
    put_u32(&mut buf, sections + 8, code.len() as u32);
    put_u32(&mut buf, sections + 12, TEXT_RVA);
    put_u32(&mut buf, sections + 16, text_raw as u32);
    put_u32(&mut buf, sections + 20, FILE_ALIGN as u32);
    put_u32(&mut buf, sections + 36, 0x6000_0020);

    let edata_hdr = sections + 40;
    buf[edata_hdr..edata_hdr + 6].copy_from_slice(b".edata");
    put_u32(&mut buf, edata_hdr + 8, edata.len().max(1) as u32);
    put_u32(&mut buf, edata_hdr + 12, edata_rva as u32);
    put_u32(&mut buf, edata_hdr + 16, edata_raw as u32);
    put_u32(&mut buf, edata_hdr + 20, edata_ptr as u32);
    put_u32(&mut buf, edata_hdr + 36, 0x4000_0040);

    buf[FILE_ALIGN..FILE_ALIGN + code.len()].copy_from_slice(code);
    buf[edata_ptr..edata_ptr + edata.len()].copy_from_slice(&edata);
    buf
}

fn build_export_dir(edata_rva: u32, exports: &[(&str, usize)]) -> Vec<u8> {
    if exports.is_empty() {
        return Vec::new();
    }
    let mut sorted: Vec<(&str, usize)> = exports.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let n = sorted.len();

    let eat = 40;
    let npt = eat + 4 * n;
    let ot = npt + 4 * n;
    let dll_name = ot + 2 * n;
    let dll = b"fixture.exe\0";
    let mut names_at = dll_name + dll.len();

    let mut strings: Vec<u8> = dll.to_vec();
    let mut name_rvas = Vec::with_capacity(n);
    for (name, _) in &sorted {
        name_rvas.push(edata_rva + names_at as u32);
        strings.extend_from_slice(name.as_bytes());
        strings.push(0);
        names_at += name.len() + 1;
    }

    let mut out = vec![0u8; dll_name];
    put_u32(&mut out, 12, edata_rva + dll_name as u32);
    put_u32(&mut out, 16, 1);
    put_u32(&mut out, 20, n as u32);
    put_u32(&mut out, 24, n as u32);
    put_u32(&mut out, 28, edata_rva + eat as u32);
    put_u32(&mut out, 32, edata_rva + npt as u32);
    put_u32(&mut out, 36, edata_rva + ot as u32);
    for (i, (_, offset)) in sorted.iter().enumerate() {
        put_u32(&mut out, eat + 4 * i, TEXT_RVA + *offset as u32);
        put_u32(&mut out, npt + 4 * i, name_rvas[i]);
        put_u16(&mut out, ot + 2 * i, i as u16);
    }
    out.extend_from_slice(&strings);
    out
}

/// Write `bytes` under a fresh temp dir; the dir guard must outlive the path.
pub fn write_temp(name: &str, bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    (dir, path)
}
