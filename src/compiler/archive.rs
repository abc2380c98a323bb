//! Runtime function archives: named machine-code blobs bundled into a
//! single file.
//!
//! Grounded on the same read/write discipline the build file uses for the
//! binary image (`build_file::BuildFile::save`): fixed-order sections,
//! little-endian fields, everything read back into owned `Vec<u8>`s rather
//! than borrowed slices so the archive can outlive the file it came from.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::diagnostics::CompileError;

const ARCHIVE_MAGIC: [u8; 4] = [0x03, b'o', b'a', b'r'];
const VERSION_MAJOR: u8 = 1;
const VERSION_MINOR: u8 = 0;

/// A single named machine-code blob.
#[derive(Debug, Clone)]
pub struct ArchiveFunction {
    pub name: String,
    pub code: Vec<u8>,
}

/// An in-memory archive: a name-keyed map of machine-code blobs, in the
/// order they were inserted (so `save` round-trips deterministically).
#[derive(Debug, Clone, Default)]
pub struct Archive {
    functions: Vec<ArchiveFunction>,
    by_name: BTreeMap<String, usize>,
}

impl Archive {
    pub fn new() -> Self {
        Archive::default()
    }

    pub fn get(&self, name: &str) -> Option<&ArchiveFunction> {
        self.by_name.get(name).map(|&i| &self.functions[i])
    }

    pub fn insert(&mut self, name: impl Into<String>, code: Vec<u8>) {
        let name = name.into();
        if let Some(&i) = self.by_name.get(&name) {
            self.functions[i].code = code;
            return;
        }
        self.by_name.insert(name.clone(), self.functions.len());
        self.functions.push(ArchiveFunction { name, code });
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Reads header + records + name pool + code blobs, validating the
    /// magic and reconstructing every function into an in-memory map.
    pub fn load(bytes: &[u8]) -> Result<Archive, CompileError> {
        if bytes.len() < 16 || bytes[0..4] != ARCHIVE_MAGIC {
            return Err(CompileError::Archive("bad archive magic".to_string()));
        }
        let count = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
        let _name_pool_size = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;

        let record_bytes = count.checked_mul(12).ok_or_else(|| CompileError::Archive("function count overflow".to_string()))?;
        let records_start = 16;
        let records_end = records_start + record_bytes;
        if bytes.len() < records_end {
            return Err(CompileError::Archive("archive truncated in record table".to_string()));
        }

        let mut archive = Archive::new();
        for i in 0..count {
            let base = records_start + i * 12;
            let name_offset = u32::from_le_bytes(bytes[base..base + 4].try_into().unwrap()) as usize;
            let code_offset = u32::from_le_bytes(bytes[base + 4..base + 8].try_into().unwrap()) as usize;
            let code_size = u32::from_le_bytes(bytes[base + 8..base + 12].try_into().unwrap()) as usize;

            let name = read_c_string(bytes, name_offset)?;
            let code_end = code_offset
                .checked_add(code_size)
                .ok_or_else(|| CompileError::Archive("code blob overflow".to_string()))?;
            if code_end > bytes.len() {
                return Err(CompileError::Archive(format!("code blob for '{name}' out of bounds")));
            }
            archive.insert(name, bytes[code_offset..code_end].to_vec());
        }
        Ok(archive)
    }

    /// Writes header, records, name pool, then code blobs, in that order.
    pub fn save(&self) -> Vec<u8> {
        let header_size = 16;
        let records_size = self.functions.len() * 12;

        let mut name_pool = Vec::new();
        let mut name_offsets = Vec::with_capacity(self.functions.len());
        let name_pool_start = header_size + records_size;
        for f in &self.functions {
            name_offsets.push(name_pool_start + name_pool.len());
            name_pool.extend_from_slice(f.name.as_bytes());
            name_pool.push(0);
        }

        let code_start = name_pool_start + name_pool.len();
        let mut code_blob = Vec::new();
        let mut code_offsets = Vec::with_capacity(self.functions.len());
        for f in &self.functions {
            code_offsets.push(code_start + code_blob.len());
            code_blob.extend_from_slice(&f.code);
        }

        let mut out = Vec::with_capacity(code_start + code_blob.len());
        out.extend_from_slice(&ARCHIVE_MAGIC);
        out.push(VERSION_MAJOR);
        out.push(VERSION_MINOR);
        out.extend_from_slice(&[0u8; 2]); // pad
        out.extend_from_slice(&(self.functions.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name_pool.len() as u32).to_le_bytes());

        for (i, f) in self.functions.iter().enumerate() {
            out.extend_from_slice(&(name_offsets[i] as u32).to_le_bytes());
            out.extend_from_slice(&(code_offsets[i] as u32).to_le_bytes());
            out.extend_from_slice(&(f.code.len() as u32).to_le_bytes());
        }
        out.extend_from_slice(&name_pool);
        out.extend_from_slice(&code_blob);
        out
    }

    /// Resolves glob-ish `patterns` (brace expansion, leading `~`, and `*`
    /// wildcards; anything else that fails to resolve is ignored) and
    /// imports each matching file as a function, stripping a leading `rt_`
    /// from the derived name.
    pub fn create(patterns: &[String]) -> Result<Archive, CompileError> {
        let mut archive = Archive::new();
        for pattern in patterns {
            for expanded in expand_braces(pattern) {
                let expanded = expand_tilde(&expanded);
                for path in match_glob(&expanded) {
                    if let Ok(code) = fs::read(&path) {
                        let name = function_name_from_path(&path);
                        archive.insert(name, code);
                    }
                }
            }
        }
        Ok(archive)
    }
}

fn read_c_string(bytes: &[u8], offset: usize) -> Result<String, CompileError> {
    let slice = bytes.get(offset..).ok_or_else(|| CompileError::Archive("name offset out of bounds".to_string()))?;
    let end = slice.iter().position(|&b| b == 0).ok_or_else(|| CompileError::Archive("unterminated name".to_string()))?;
    String::from_utf8(slice[..end].to_vec()).map_err(|e| CompileError::Archive(e.to_string()))
}

fn function_name_from_path(path: &Path) -> String {
    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    stem.strip_prefix("rt_").map(str::to_string).unwrap_or(stem)
}

fn expand_tilde(pattern: &str) -> String {
    if let Some(rest) = pattern.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}{rest}");
        }
    }
    pattern.to_string()
}

/// Expands a single `{a,b,c}` group (non-nested). Patterns without braces
/// pass through unchanged.
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let Some(close) = pattern[open..].find('}').map(|i| i + open) else {
        return vec![pattern.to_string()];
    };
    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    pattern[open + 1..close].split(',').map(|alt| format!("{prefix}{alt}{suffix}")).collect()
}

/// Minimal single-`*`-per-segment glob match over directory entries; no
/// external crate in the retrieved corpus covers this, so entries are
/// walked with `std::fs::read_dir` instead.
fn match_glob(pattern: &str) -> Vec<PathBuf> {
    let path = Path::new(pattern);
    if !pattern.contains('*') {
        return if path.exists() { vec![path.to_path_buf()] } else { vec![] };
    }
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let file_pattern = path.file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let mut matches = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if glob_segment_matches(&file_pattern, &name) {
                matches.push(entry.path());
            }
        }
    }
    matches.sort();
    matches
}

fn glob_segment_matches(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == name,
        Some((prefix, suffix)) => name.starts_with(prefix) && name.ends_with(suffix) && name.len() >= prefix.len() + suffix.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_save_and_load() {
        let mut archive = Archive::new();
        archive.insert("power", vec![0x90, 0x90, 0xC3]);
        archive.insert("modulo", vec![0x48, 0x99]);

        let bytes = archive.save();
        let loaded = Archive::load(&bytes).expect("archive should parse");

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("power").unwrap().code, vec![0x90, 0x90, 0xC3]);
        assert_eq!(loaded.get("modulo").unwrap().code, vec![0x48, 0x99]);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![0u8; 20];
        assert!(Archive::load(&bytes).is_err());
    }

    #[test]
    fn brace_expansion_produces_one_pattern_per_alternative() {
        let expanded = expand_braces("rt_{add,sub}.bin");
        assert_eq!(expanded, vec!["rt_add.bin".to_string(), "rt_sub.bin".to_string()]);
    }

    #[test]
    fn function_name_strips_rt_prefix() {
        assert_eq!(function_name_from_path(Path::new("/lib/rt_power.bin")), "power");
        assert_eq!(function_name_from_path(Path::new("/lib/custom.bin")), "custom");
    }
}
