//! Executable image loading.
//!
//! Only the pieces the call-site pipeline needs are kept: load base, the
//! code section's address and bytes, and named exports.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ExportEntry;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Missing executable: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read executable {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unsupported image format: {0}")]
    Format(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Pe,
    Elf,
    Raw,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImageFormat::Pe => "pe",
            ImageFormat::Elf => "elf",
            ImageFormat::Raw => "raw",
        };
        f.write_str(s)
    }
}

/// Loaded executable. Immutable for the rest of the run.
#[derive(Debug, Clone)]
pub struct ExecutableImage {
    pub format: ImageFormat,
    pub base: u64,
    pub code_section: String,
    pub code_address: u64,
    code: Vec<u8>,
    exports: Vec<ExportEntry>,
    sha256: Option<String>,
}

impl ExecutableImage {
    /// Build an image from an already-extracted code section.
    pub fn from_parts(base: u64, code_address: u64, code: Vec<u8>) -> Self {
        Self {
            format: ImageFormat::Raw,
            base,
            code_section: ".text".to_string(),
            code_address,
            code,
            exports: Vec::new(),
            sha256: None,
        }
    }

    pub fn with_exports(mut self, exports: Vec<ExportEntry>) -> Self {
        self.exports = exports;
        self
    }

    /// Read and parse an executable, locating the code section by `section_name`.
    #[cfg(feature = "capstone-backend")]
    pub fn load(path: &Path, section_name: &str) -> Result<Self, ImageError> {
        if !path.is_file() {
            return Err(ImageError::NotFound(path.to_path_buf()));
        }
        let bytes =
            fs::read(path).map_err(|source| ImageError::Io { path: path.to_path_buf(), source })?;
        let mut image = parse::parse_image(&bytes, section_name)?;
        image.sha256 = Some(sha256_hex(&bytes));
        tracing::debug!(
            path = %path.display(),
            format = %image.format,
            base = %format!("0x{:08x}", image.base),
            code_address = %format!("0x{:08x}", image.code_address),
            code_len = image.code.len(),
            exports = image.exports.len(),
            "loaded image"
        );
        Ok(image)
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Exclusive end address of the code section.
    pub fn code_end(&self) -> u64 {
        self.code_address.saturating_add(self.code.len() as u64)
    }

    pub fn exports(&self) -> &[ExportEntry] {
        &self.exports
    }

    pub fn sha256(&self) -> Option<&str> {
        self.sha256.as_deref()
    }
}

/// Read an entire file for consumers that want raw bytes (e.g. string scans).
pub fn read_image_bytes(path: &Path) -> Result<Vec<u8>, ImageError> {
    if !path.is_file() {
        return Err(ImageError::NotFound(path.to_path_buf()));
    }
    fs::read(path).map_err(|source| ImageError::Io { path: path.to_path_buf(), source })
}

#[cfg(feature = "capstone-backend")]
fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(feature = "capstone-backend")]
mod parse {
    use goblin::{elf, pe, Object};

    use super::{ExecutableImage, ImageError, ImageFormat};
    use crate::model::ExportEntry;

    const IMAGE_SCN_CNT_CODE: u32 = 0x0000_0020;

    pub(super) fn parse_image(
        bytes: &[u8],
        section_name: &str,
    ) -> Result<ExecutableImage, ImageError> {
        match Object::parse(bytes) {
            Ok(Object::PE(pe)) => from_pe(&pe, bytes, section_name),
            Ok(Object::Elf(elf)) => from_elf(&elf, bytes, section_name),
            Ok(_) => Err(ImageError::Format("not a PE or ELF executable".into())),
            Err(e) => Err(ImageError::Format(format!("parse failed: {e}"))),
        }
    }

    fn file_slice(bytes: &[u8], offset: usize, size: usize) -> &[u8] {
        let start = offset.min(bytes.len());
        let end = offset.saturating_add(size).min(bytes.len());
        &bytes[start..end]
    }

    fn from_pe(
        pe: &pe::PE,
        bytes: &[u8],
        section_name: &str,
    ) -> Result<ExecutableImage, ImageError> {
        if pe.is_64 || pe.header.coff_header.machine != pe::header::COFF_MACHINE_X86 {
            return Err(ImageError::Format(format!(
                "unsupported PE machine 0x{:04x}; only 32-bit x86 is handled",
                pe.header.coff_header.machine
            )));
        }
        let section = pe
            .sections
            .iter()
            .find(|s| s.name().map(|n| n == section_name).unwrap_or(false))
            .or_else(|| pe.sections.iter().find(|s| s.characteristics & IMAGE_SCN_CNT_CODE != 0))
            .ok_or_else(|| ImageError::Format("could not find a code section".into()))?;

        let base = pe.image_base as u64;
        let code = file_slice(
            bytes,
            section.pointer_to_raw_data as usize,
            section.size_of_raw_data as usize,
        )
        .to_vec();
        if code.is_empty() {
            return Err(ImageError::Format("code section has no raw data".into()));
        }

        let exports = pe
            .exports
            .iter()
            .filter(|exp| exp.rva != 0)
            .filter_map(|exp| {
                let name = exp.name?;
                if name.is_empty() {
                    return None;
                }
                Some(ExportEntry { address: base + exp.rva as u64, name: name.to_string() })
            })
            .collect();

        Ok(ExecutableImage {
            format: ImageFormat::Pe,
            base,
            code_section: section.name().unwrap_or_default().to_string(),
            code_address: base + section.virtual_address as u64,
            code,
            exports,
            sha256: None,
        })
    }

    fn from_elf(
        elf: &elf::Elf,
        bytes: &[u8],
        section_name: &str,
    ) -> Result<ExecutableImage, ImageError> {
        if elf.is_64 || elf.header.e_machine != elf::header::EM_386 {
            return Err(ImageError::Format(format!(
                "unsupported ELF machine {}; only 32-bit x86 is handled",
                elf.header.e_machine
            )));
        }
        let named = |sh: &elf::SectionHeader| elf.shdr_strtab.get_at(sh.sh_name).unwrap_or("");
        let section = elf
            .section_headers
            .iter()
            .find(|sh| named(*sh) == section_name)
            .or_else(|| {
                elf.section_headers.iter().find(|sh| {
                    (sh.sh_flags & elf::section_header::SHF_EXECINSTR as u64) != 0
                        && sh.sh_type == elf::section_header::SHT_PROGBITS
                })
            })
            .ok_or_else(|| ImageError::Format("could not find a code section".into()))?;

        let code = file_slice(bytes, section.sh_offset as usize, section.sh_size as usize).to_vec();
        if code.is_empty() {
            return Err(ImageError::Format("code section has no file data".into()));
        }

        let base = elf
            .program_headers
            .iter()
            .filter(|ph| ph.p_type == elf::program_header::PT_LOAD)
            .map(|ph| ph.p_vaddr)
            .min()
            .unwrap_or(0);

        let (symtab, strtab) = if elf.dynsyms.is_empty() {
            (&elf.syms, &elf.strtab)
        } else {
            (&elf.dynsyms, &elf.dynstrtab)
        };
        let exports = symtab
            .iter()
            .filter(|sym| {
                sym.is_function()
                    && sym.st_shndx != elf::section_header::SHN_UNDEF as usize
                    && matches!(sym.st_bind(), elf::sym::STB_GLOBAL | elf::sym::STB_WEAK)
            })
            .filter_map(|sym| {
                let name = strtab.get_at(sym.st_name)?;
                if name.is_empty() {
                    return None;
                }
                Some(ExportEntry { address: sym.st_value, name: name.to_string() })
            })
            .collect();

        Ok(ExecutableImage {
            format: ImageFormat::Elf,
            base,
            code_section: named(section).to_string(),
            code_address: section.sh_addr,
            code,
            exports,
            sha256: None,
        })
    }
}
