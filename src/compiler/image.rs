//! Loads and runs a compiled image: `mmap`s the bytes, flips the page to
//! executable on first run, and exposes named variables to the host.
//!
//! Uses raw `libc` bindings over a higher-level memory-mapping crate — no
//! `memmap2`/`region` crate appears anywhere in the retrieved corpus for
//! this kind of raw executable-buffer allocation.

use std::ffi::c_void;
use std::fs;
use std::io;
use std::path::Path;

use crate::compiler::build_file::IMAGE_MAGIC;
use crate::diagnostics::CompileError;

const HEADER_SIZE: usize = 24;
const VARIABLE_RECORD_SIZE: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    Boolean,
    Integer,
    FloatingPoint,
    String,
    Range,
    Array,
}

impl VariableType {
    fn from_wire(tag: u16) -> Option<Self> {
        Some(match tag {
            0 => VariableType::Boolean,
            1 => VariableType::Integer,
            2 => VariableType::FloatingPoint,
            3 => VariableType::String,
            4 => VariableType::Range,
            5 => VariableType::Array,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct VariableInfo {
    pub name: String,
    pub ty: VariableType,
    pub record_offset: usize,
}

struct Header {
    version_major: u8,
    version_minor: u8,
    variable_count: u16,
    variables_offset: u32,
    start: u32,
    file_size: u32,
    #[allow(dead_code)]
    return_type: u16,
    #[allow(dead_code)]
    private_variable_count: u16,
}

fn parse_header(bytes: &[u8]) -> Result<Header, CompileError> {
    if bytes.len() < HEADER_SIZE || bytes[0..4] != IMAGE_MAGIC {
        return Err(CompileError::Image("bad image magic".to_string()));
    }
    Ok(Header {
        version_major: bytes[4],
        version_minor: bytes[5],
        variable_count: u16::from_le_bytes(bytes[6..8].try_into().unwrap()),
        variables_offset: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
        start: u32::from_le_bytes(bytes[12..16].try_into().unwrap()),
        file_size: u32::from_le_bytes(bytes[16..20].try_into().unwrap()),
        return_type: u16::from_le_bytes(bytes[20..22].try_into().unwrap()),
        private_variable_count: u16::from_le_bytes(bytes[22..24].try_into().unwrap()),
    })
}

/// A loaded, page-mapped image. Owns its anonymous `mmap` region and
/// frees it (and any allocated string variables) on drop.
pub struct RunningFile {
    buffer: *mut u8,
    len: usize,
    header: Header,
    variables: Vec<VariableInfo>,
    protected: bool,
    allocated_strings: Vec<*mut u8>,
}

impl RunningFile {
    pub fn load(path: &Path) -> Result<Self, CompileError> {
        let bytes = fs::read(path).map_err(CompileError::Io)?;
        Self::load_bytes(&bytes)
    }

    pub fn load_bytes(bytes: &[u8]) -> Result<Self, CompileError> {
        let header = parse_header(bytes)?;
        if bytes.len() < header.file_size as usize {
            return Err(CompileError::Image("image truncated".to_string()));
        }

        let page_size = page_size();
        let alloc_len = bytes.len().div_ceil(page_size) * page_size;

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                alloc_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(CompileError::Image(format!("mmap failed: {}", io::Error::last_os_error())));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, bytes.len());
        }

        let variables = Self::read_variable_table(bytes, &header)?;

        Ok(RunningFile {
            buffer: ptr as *mut u8,
            len: alloc_len,
            header,
            variables,
            protected: false,
            allocated_strings: Vec::new(),
        })
    }

    fn read_variable_table(bytes: &[u8], header: &Header) -> Result<Vec<VariableInfo>, CompileError> {
        let mut variables = Vec::with_capacity(header.variable_count as usize);
        for i in 0..header.variable_count as usize {
            let base = header.variables_offset as usize + i * VARIABLE_RECORD_SIZE;
            if base + VARIABLE_RECORD_SIZE > bytes.len() {
                return Err(CompileError::Image("variable table out of bounds".to_string()));
            }
            let type_tag = u16::from_le_bytes(bytes[base..base + 2].try_into().unwrap());
            let ty = VariableType::from_wire(type_tag).ok_or_else(|| CompileError::Image("unknown variable type tag".to_string()))?;
            let name_size = u16::from_le_bytes(bytes[base + 6..base + 8].try_into().unwrap()) as usize;
            let name = if name_size <= 4 {
                let raw = &bytes[base + 8..base + 8 + name_size];
                String::from_utf8_lossy(raw).trim_end_matches('\0').to_string()
            } else {
                let offset = u32::from_le_bytes(bytes[base + 8..base + 12].try_into().unwrap()) as usize;
                read_c_string(bytes, offset)
            };
            variables.push(VariableInfo { name, ty, record_offset: base });
        }
        variables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(variables)
    }

    /// Binary-searches the sorted variable table by name.
    pub fn find_variable(&self, name: &str) -> Option<&VariableInfo> {
        self.variables.binary_search_by(|v| v.name.as_str().cmp(name)).ok().map(|i| &self.variables[i])
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn get_variable(&self, index: usize) -> Option<&VariableInfo> {
        self.variables.get(index)
    }

    pub fn get_version(&self) -> (u8, u8) {
        (self.header.version_major, self.header.version_minor)
    }

    fn data_slice(&self, info: &VariableInfo) -> &[u8] {
        let data_offset = info.record_offset + 16;
        unsafe { std::slice::from_raw_parts(self.buffer.add(data_offset), 8) }
    }

    fn data_slice_mut(&mut self, info: &VariableInfo) -> &mut [u8] {
        let data_offset = info.record_offset + 16;
        unsafe { std::slice::from_raw_parts_mut(self.buffer.add(data_offset), 8) }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        let info = self.find_variable(name)?;
        if info.ty != VariableType::Boolean {
            return None;
        }
        Some(self.data_slice(info)[0] != 0)
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> bool {
        let Some(info) = self.find_variable(name).cloned() else { return false };
        if info.ty != VariableType::Boolean {
            return false;
        }
        self.data_slice_mut(&info)[0] = value as u8;
        true
    }

    pub fn get_integer(&self, name: &str) -> Option<i64> {
        let info = self.find_variable(name)?;
        if info.ty != VariableType::Integer {
            return None;
        }
        Some(i64::from_le_bytes(self.data_slice(info).try_into().unwrap()))
    }

    pub fn set_integer(&mut self, name: &str, value: i64) -> bool {
        let Some(info) = self.find_variable(name).cloned() else { return false };
        if info.ty != VariableType::Integer {
            return false;
        }
        self.data_slice_mut(&info).copy_from_slice(&value.to_le_bytes());
        true
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        let info = self.find_variable(name)?;
        if info.ty != VariableType::FloatingPoint {
            return None;
        }
        Some(f64::from_le_bytes(self.data_slice(info).try_into().unwrap()))
    }

    pub fn set_float(&mut self, name: &str, value: f64) -> bool {
        let Some(info) = self.find_variable(name).cloned() else { return false };
        if info.ty != VariableType::FloatingPoint {
            return false;
        }
        self.data_slice_mut(&info).copy_from_slice(&value.to_le_bytes());
        true
    }

    /// Reads a string variable. Inline (≤ 8 bytes) strings are read
    /// directly out of the data field; longer ones dereference the file
    /// offset stored there.
    pub fn get_string(&self, name: &str) -> Option<String> {
        let info = self.find_variable(name)?;
        if info.ty != VariableType::String {
            return None;
        }
        let data_size = u32::from_le_bytes(
            unsafe { std::slice::from_raw_parts(self.buffer.add(info.record_offset + 12), 4) }.try_into().unwrap(),
        ) as usize;
        if data_size <= 8 {
            let slice = self.data_slice(info);
            Some(String::from_utf8_lossy(&slice[..data_size.min(8)]).trim_end_matches('\0').to_string())
        } else {
            let offset = u32::from_le_bytes(self.data_slice(info)[0..4].try_into().unwrap()) as usize;
            let slice = unsafe { std::slice::from_raw_parts(self.buffer.add(offset), data_size) };
            Some(String::from_utf8_lossy(slice).to_string())
        }
    }

    /// Writes a string variable. Strings longer than 8 bytes are
    /// allocated out-of-band and the `Allocated` flag is set so `clean`
    /// frees them.
    pub fn set_string(&mut self, name: &str, value: &str) -> bool {
        let Some(info) = self.find_variable(name).cloned() else { return false };
        if info.ty != VariableType::String {
            return false;
        }
        let bytes = value.as_bytes();
        unsafe {
            let size_ptr = self.buffer.add(info.record_offset + 12) as *mut u32;
            std::ptr::write_unaligned(size_ptr, bytes.len() as u32);
        }
        if bytes.len() <= 8 {
            let slice = self.data_slice_mut(&info);
            slice.fill(0);
            slice[..bytes.len()].copy_from_slice(bytes);
        } else {
            let layout = std::alloc::Layout::array::<u8>(bytes.len()).unwrap();
            let allocated = unsafe { std::alloc::alloc(layout) };
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), allocated, bytes.len()) };
            self.allocated_strings.push(allocated);
            let slice = self.data_slice_mut(&info);
            slice[0..8].copy_from_slice(&(allocated as u64).to_le_bytes());
            unsafe {
                let flags_ptr = self.buffer.add(info.record_offset + 2) as *mut u16;
                std::ptr::write_unaligned(flags_ptr, 1); // bit 0 = Allocated
            }
        }
        true
    }

    /// Flips the mapped region to executable on first call and invokes
    /// the entry point, which is assumed to return an integer (the
    /// header's `return_type` field is recorded but not otherwise
    /// consulted by this host).
    pub fn run(&mut self) -> Result<i64, CompileError> {
        if !self.protected {
            let result = unsafe { libc::mprotect(self.buffer as *mut c_void, self.len, libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC) };
            if result != 0 {
                return Err(CompileError::Image(format!("mprotect failed: {}", io::Error::last_os_error())));
            }
            self.protected = true;
        }
        let entry = unsafe { self.buffer.add(self.header.start as usize) };
        let entry_fn: extern "C" fn() -> i64 = unsafe { std::mem::transmute(entry) };
        Ok(entry_fn())
    }

    /// Frees every string allocated via `set_string` whose `Allocated`
    /// flag is set. Idempotent.
    pub fn clean(&mut self) {
        for ptr in self.allocated_strings.drain(..) {
            unsafe {
                let layout = std::alloc::Layout::new::<u8>();
                std::alloc::dealloc(ptr, layout);
            }
        }
    }
}

impl Drop for RunningFile {
    fn drop(&mut self) {
        self.clean();
        if !self.buffer.is_null() {
            unsafe {
                libc::munmap(self.buffer as *mut c_void, self.len);
            }
        }
    }
}

fn read_c_string(bytes: &[u8], offset: usize) -> String {
    let slice = &bytes[offset.min(bytes.len())..];
    let end = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
    String::from_utf8_lossy(&slice[..end]).to_string()
}

fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::build_file::{BuildFile, NativeType};

    #[test]
    fn load_and_find_an_extern_variable() {
        let mut bf = BuildFile::new();
        bf.add_extern_variable("counter", NativeType::Integer);
        bf.add_text(&[0xB8, 0x2A, 0, 0, 0, 0xC3]); // mov eax, 42; ret (32-bit form, illustrative)
        let bytes = bf.save().expect("save should succeed");

        let running = RunningFile::load_bytes(&bytes).expect("image should load");
        assert_eq!(running.get_version(), (1, 0));
        assert!(running.find_variable("counter").is_some());
        assert_eq!(running.variable_count(), 1);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![0u8; 32];
        assert!(RunningFile::load_bytes(&bytes).is_err());
    }
}
