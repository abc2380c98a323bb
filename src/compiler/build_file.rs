//! Accumulates emission state for one compile and serializes it to the
//! binary image format.
//!
//! Single-pass sequencing: collect every variable, constant, relocation and
//! text byte first, then walk once to resolve offsets and write sections in
//! a fixed order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::compiler::archive::Archive;
use crate::diagnostics::CompileError;

pub const IMAGE_MAGIC: [u8; 4] = [0xBA, 0xDC, 0x0D, 0xE1];
pub const TRAILING_MAGIC: [u8; 4] = *b"END!";
const VERSION_MAJOR: u8 = 1;
const VERSION_MINOR: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeType {
    Boolean,
    Integer,
    Double,
    String,
}

impl NativeType {
    /// Boolean payloads are 1 byte; everything else is 8.
    fn is_byte_sized(self) -> bool {
        matches!(self, NativeType::Boolean)
    }

    fn wire_tag(self) -> u16 {
        match self {
            NativeType::Boolean => 0,
            NativeType::Integer => 1,
            NativeType::Double => 2,
            NativeType::String => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationKind {
    Variable32,
    RT32,
    Label32,
}

#[derive(Debug, Clone)]
pub struct Relocation {
    pub name: String,
    pub kind: RelocationKind,
    pub position_in_text: u32,
    pub rip_anchor: u32,
}

#[derive(Debug, Clone)]
struct Variable {
    name: String,
    ty: NativeType,
    /// Stack-frame offset for temporaries/private slots, relative to rbp.
    offset: Option<i32>,
}

#[derive(Debug, Default)]
pub struct BuildFile {
    extern_variables: Vec<Variable>,
    temporaries: Vec<Variable>,

    // Private (non-host-visible) variables share the number/string/boolean
    // pools with literal constants, as as2js's own build file does — they
    // are not `binary_variable` records.
    private_numbers: Vec<(String, f64)>,
    private_strings: Vec<(String, String)>,
    private_booleans: Vec<(String, bool)>,

    constant_doubles: Vec<(String, f64)>,
    constant_double_index: HashMap<String, usize>,
    constant_strings: Vec<(String, String)>,
    constant_string_index: HashMap<String, usize>,

    labels: HashMap<String, u32>,
    text: Vec<u8>,
    relocations: Vec<Relocation>,

    temp_bool_count: u32,
    temp_wide_count: u32,

    rt_archive: Option<Archive>,
    rt_archive_path: Option<PathBuf>,
    rt_offsets: HashMap<String, u32>,

    return_type: u16,
}

impl BuildFile {
    pub fn new() -> Self {
        BuildFile::default()
    }

    pub fn set_return_type(&mut self, return_type: u16) {
        self.return_type = return_type;
    }

    /// Sorted insertion of an externally-visible variable, keyed by name.
    pub fn add_extern_variable(&mut self, name: impl Into<String>, ty: NativeType) {
        let name = name.into();
        let pos = self.extern_variables.partition_point(|v| v.name < name);
        if self.extern_variables.get(pos).map(|v| v.name.as_str()) != Some(name.as_str()) {
            self.extern_variables.insert(pos, Variable { name, ty, offset: None });
        }
    }

    /// Assigns a stack slot: 1-byte booleans get `-(index+1)`, 8-byte
    /// types get `-8*(index+1)`, both relative to rbp.
    pub fn add_temporary_variable(&mut self, name: impl Into<String>, ty: NativeType) -> i32 {
        let name = name.into();
        let offset = if ty.is_byte_sized() {
            self.temp_bool_count += 1;
            -(self.temp_bool_count as i32)
        } else {
            self.temp_wide_count += 1;
            -8 * (self.temp_wide_count as i32)
        };
        self.temporaries.push(Variable { name, ty, offset: Some(offset) });
        offset
    }

    /// Declares a module-private variable, zero-initialized, into the pool
    /// matching its type. Unlike `add_constant_*`, entries here are never
    /// deduplicated by value — each declaration gets its own slot.
    pub fn add_private_variable(&mut self, name: impl Into<String>, ty: NativeType) {
        let name = name.into();
        match ty {
            NativeType::Boolean => self.private_booleans.push((name, false)),
            NativeType::Integer | NativeType::Double => self.private_numbers.push((name, 0.0)),
            NativeType::String => self.private_strings.push((name, String::new())),
        }
    }

    /// Deduplicated by the decimal rendering of the double's bit pattern —
    /// deliberately under-deduplicates `-0.0` vs `0.0` (see DESIGN.md).
    pub fn add_constant_double(&mut self, value: f64) -> String {
        let key = format!("{}", value.to_bits());
        if let Some(&i) = self.constant_double_index.get(&key) {
            return self.constant_doubles[i].0.clone();
        }
        let name = format!("@{key}");
        let index = self.constant_doubles.len();
        self.constant_doubles.push((name.clone(), value));
        self.constant_double_index.insert(key, index);
        name
    }

    pub fn add_constant_string(&mut self, value: impl Into<String>) -> String {
        let value = value.into();
        if let Some(&i) = self.constant_string_index.get(&value) {
            return self.constant_strings[i].0.clone();
        }
        let name = format!("@str{}", self.constant_strings.len());
        let index = self.constant_strings.len();
        self.constant_strings.push((name.clone(), value.clone()));
        self.constant_string_index.insert(value, index);
        name
    }

    pub fn add_label(&mut self, name: impl Into<String>) {
        self.labels.insert(name.into(), self.text.len() as u32);
    }

    pub fn label_offset(&self, name: &str) -> Option<u32> {
        self.labels.get(name).copied()
    }

    pub fn add_text(&mut self, bytes: &[u8]) {
        self.text.extend_from_slice(bytes);
    }

    pub fn get_current_text_offset(&self) -> u32 {
        self.text.len() as u32
    }

    pub fn add_relocation(&mut self, name: impl Into<String>, kind: RelocationKind, position_in_text: u32, rip_anchor: u32) {
        self.relocations.push(Relocation { name: name.into(), kind, position_in_text, rip_anchor });
    }

    /// Total bytes the temporary frame needs, for the prologue's `sub rsp`.
    pub fn temporary_frame_size(&self) -> i32 {
        self.temp_bool_count as i32 + 8 * self.temp_wide_count as i32
    }

    /// Lazily opens `<path>/rt.oar`, copies `name`'s code into the text
    /// section (if not already copied), and returns its text offset.
    pub fn add_rt_function(&mut self, path: &Path, name: &str) -> Result<u32, CompileError> {
        if let Some(&offset) = self.rt_offsets.get(name) {
            return Ok(offset);
        }
        if self.rt_archive.is_none() || self.rt_archive_path.as_deref() != Some(path) {
            let archive_path = path.join("rt.oar");
            let bytes = std::fs::read(&archive_path).map_err(CompileError::Io)?;
            self.rt_archive = Some(Archive::load(&bytes)?);
            self.rt_archive_path = Some(path.to_path_buf());
        }
        let code = self
            .rt_archive
            .as_ref()
            .unwrap()
            .get(name)
            .map(|f| f.code.clone())
            .ok_or_else(|| CompileError::MissingRuntimeFunction(name.to_string()))?;
        let offset = self.get_current_text_offset();
        self.add_text(&code);
        self.rt_offsets.insert(name.to_string(), offset);
        Ok(offset)
    }

    /// Lays out every section in the fixed order, resolves relocations,
    /// and returns the final image bytes.
    pub fn save(&self) -> Result<Vec<u8>, CompileError> {
        let header_size = 24u32;
        let mut text = self.text.clone();
        pad_to(&mut text, 8);

        let rt_functions_offset = header_size + text.len() as u32;
        // Runtime function code is already folded into `text` by
        // `add_rt_function`, so this section is empty by construction; the
        // offset is kept for layout-order fidelity with the contract.
        let rt_functions: Vec<u8> = Vec::new();

        let mut data_addresses: HashMap<String, u32> = HashMap::new();

        let variables_offset = rt_functions_offset + rt_functions.len() as u32;
        let mut variable_records = Vec::new();
        for (i, v) in self.extern_variables.iter().enumerate() {
            variable_records.extend_from_slice(&encode_variable(v));
            let record_offset = variables_offset + (i * 24) as u32;
            data_addresses.insert(v.name.clone(), record_offset + 16); // +16: the record's data field
        }

        // Constants and private variables share the number/string/boolean
        // pools (constants first, then private slots), mirroring as2js's
        // build file.
        let numbers_offset = variables_offset + variable_records.len() as u32;
        let mut numbers = Vec::new();
        for (name, value) in self.constant_doubles.iter().chain(self.private_numbers.iter()) {
            data_addresses.insert(name.clone(), numbers_offset + numbers.len() as u32);
            numbers.extend_from_slice(&value.to_le_bytes());
        }

        let strings_desc_offset = numbers_offset + numbers.len() as u32;
        let all_strings: Vec<&(String, String)> = self.constant_strings.iter().chain(self.private_strings.iter()).collect();
        let string_descs_len = (all_strings.len() * 8) as u32;
        let mut string_pool = Vec::new();
        let mut string_descs = Vec::new();
        for (i, (name, value)) in all_strings.iter().enumerate() {
            data_addresses.insert(name.clone(), strings_desc_offset + (i * 8) as u32);
            let str_offset = strings_desc_offset + string_descs_len + string_pool.len() as u32;
            string_descs.extend_from_slice(&str_offset.to_le_bytes());
            string_descs.extend_from_slice(&(value.len() as u32).to_le_bytes());
            string_pool.extend_from_slice(value.as_bytes());
            string_pool.push(0);
        }

        let booleans_offset = strings_desc_offset + string_descs.len() as u32;
        let mut booleans = Vec::new();
        for (i, (name, value)) in self.private_booleans.iter().enumerate() {
            data_addresses.insert(name.clone(), booleans_offset + i as u32);
            booleans.push(*value as u8);
        }

        let mut body = Vec::new();
        body.extend_from_slice(&text);
        body.extend_from_slice(&rt_functions);
        body.extend_from_slice(&variable_records);
        body.extend_from_slice(&numbers);
        body.extend_from_slice(&string_descs);
        body.extend_from_slice(&booleans);
        body.extend_from_slice(&string_pool);
        pad_to(&mut body, 4);

        for reloc in &self.relocations {
            let target = match reloc.kind {
                RelocationKind::Label32 => self.labels.get(&reloc.name).copied(),
                RelocationKind::Variable32 => data_addresses.get(&reloc.name).copied(),
                RelocationKind::RT32 => self.rt_offsets.get(&reloc.name).map(|&o| header_size + o),
            };
            let Some(target) = target else {
                return Err(CompileError::Image(format!("unresolved relocation target '{}'", reloc.name)));
            };
            let displacement = target as i64 - reloc.rip_anchor as i64;
            let pos = reloc.position_in_text as usize;
            if pos + 4 > body.len() {
                return Err(CompileError::Image("relocation position out of bounds".to_string()));
            }
            body[pos..pos + 4].copy_from_slice(&(displacement as i32).to_le_bytes());
        }

        let file_size = header_size + body.len() as u32 + TRAILING_MAGIC.len() as u32;

        let mut out = Vec::with_capacity(file_size as usize);
        out.extend_from_slice(&IMAGE_MAGIC);
        out.push(VERSION_MAJOR);
        out.push(VERSION_MINOR);
        out.extend_from_slice(&(self.extern_variables.len() as u16).to_le_bytes());
        out.extend_from_slice(&variables_offset.to_le_bytes());
        out.extend_from_slice(&header_size.to_le_bytes()); // start: text begins right after header
        out.extend_from_slice(&file_size.to_le_bytes());
        out.extend_from_slice(&self.return_type.to_le_bytes());
        let private_variable_count =
            self.private_numbers.len() + self.private_strings.len() + self.private_booleans.len();
        out.extend_from_slice(&(private_variable_count as u16).to_le_bytes());
        out.extend_from_slice(&body);
        out.extend_from_slice(&TRAILING_MAGIC);
        Ok(out)
    }
}

fn encode_variable(v: &Variable) -> [u8; 24] {
    let mut record = [0u8; 24];
    record[0..2].copy_from_slice(&v.ty.wire_tag().to_le_bytes());
    let flags: u16 = 0;
    record[2..4].copy_from_slice(&flags.to_le_bytes());
    let name_bytes = v.name.as_bytes();
    let name_size = name_bytes.len().min(u16::MAX as usize) as u16;
    record[6..8].copy_from_slice(&name_size.to_le_bytes());
    let mut inline_name = [0u8; 4];
    let take = name_bytes.len().min(4);
    inline_name[..take].copy_from_slice(&name_bytes[..take]);
    record[8..12].copy_from_slice(&inline_name);
    record
}

fn pad_to(buf: &mut Vec<u8>, align: usize) {
    let remainder = buf.len() % align;
    if remainder != 0 {
        buf.resize(buf.len() + (align - remainder), 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporary_offsets_grow_by_type_width() {
        let mut bf = BuildFile::new();
        assert_eq!(bf.add_temporary_variable("%temp0", NativeType::Boolean), -1);
        assert_eq!(bf.add_temporary_variable("%temp1", NativeType::Boolean), -2);
        assert_eq!(bf.add_temporary_variable("%temp2", NativeType::Integer), -8);
        assert_eq!(bf.add_temporary_variable("%temp3", NativeType::Double), -16);
    }

    #[test]
    fn extern_variables_stay_sorted_by_name() {
        let mut bf = BuildFile::new();
        bf.add_extern_variable("zeta", NativeType::Integer);
        bf.add_extern_variable("alpha", NativeType::Integer);
        bf.add_extern_variable("mu", NativeType::Integer);
        assert_eq!(bf.extern_variables.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(), vec!["alpha", "mu", "zeta"]);
    }

    #[test]
    fn double_constants_dedup_by_bit_pattern_not_value() {
        let mut bf = BuildFile::new();
        let zero = bf.add_constant_double(0.0);
        let neg_zero = bf.add_constant_double(-0.0);
        let zero_again = bf.add_constant_double(0.0);
        assert_ne!(zero, neg_zero);
        assert_eq!(zero, zero_again);
        assert_eq!(bf.constant_doubles.len(), 2);
    }

    #[test]
    fn string_constants_dedup_by_content() {
        let mut bf = BuildFile::new();
        let a = bf.add_constant_string("hi");
        let b = bf.add_constant_string("hi");
        let c = bf.add_constant_string("bye");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn save_produces_image_with_trailing_magic_and_exact_file_size() {
        let mut bf = BuildFile::new();
        bf.add_extern_variable("x", NativeType::Integer);
        bf.add_text(&[0x90, 0x90, 0xC3]);
        let bytes = bf.save().expect("save should succeed");
        assert_eq!(&bytes[0..4], &IMAGE_MAGIC);
        assert_eq!(&bytes[bytes.len() - 4..], &TRAILING_MAGIC);
        let file_size = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        assert_eq!(file_size as usize, bytes.len());
    }

    #[test]
    fn label_relocations_resolve_to_recorded_offset() {
        let mut bf = BuildFile::new();
        bf.add_text(&[0xE9, 0, 0, 0, 0]); // jmp rel32 placeholder
        bf.add_relocation("after", RelocationKind::Label32, 1, 5);
        bf.add_label("after");
        bf.add_text(&[0xC3]);
        let bytes = bf.save().expect("save should succeed");
        let header_size = 24usize;
        let displacement = i32::from_le_bytes(bytes[header_size + 1..header_size + 5].try_into().unwrap());
        assert_eq!(displacement, 5 - 5);
    }
}
