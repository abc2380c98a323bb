//! Lowers the flattened IR to x86-64 machine code and saves the resulting
//! image.
//!
//! The addressing helpers (`generate_reg_mem`/`generate_store`) centralize
//! the three operand shapes every op lowering needs: immediate, stack
//! temporary, and RIP-relative extern.

use std::collections::HashMap;
use std::path::Path;

use crate::compiler::ast::{Arena, NodeId};
use crate::compiler::build_file::{BuildFile, NativeType, RelocationKind};
use crate::compiler::flatten::{flatten, Data, OpKind, Operation};
use crate::diagnostics::{CompileError, DiagnosticSink, InternalError};

const RAX: u8 = 0;
const RCX: u8 = 1;
const RDX: u8 = 2;
const RSP: u8 = 4;
const RBP: u8 = 5;

pub struct Emitter {
    build_file: BuildFile,
    rt_archive_dir: std::path::PathBuf,
}

impl Emitter {
    pub fn new(rt_archive_dir: impl Into<std::path::PathBuf>) -> Self {
        Emitter { build_file: BuildFile::new(), rt_archive_dir: rt_archive_dir.into() }
    }

    /// Runs the flattener, emits the whole function body, and saves the
    /// resulting image. `root`'s declared return type is recorded in the
    /// header but, per the host's current `run()` contract, not otherwise
    /// consulted — the result is always read back as an integer.
    pub fn output(&mut self, root: NodeId, arena: &Arena, sink: &DiagnosticSink) -> Result<Vec<u8>, CompileError> {
        let Some(program) = flatten(root, arena, sink) else {
            return Err(CompileError::Image("nothing to flatten at this root".to_string()));
        };

        let mut temp_offsets = HashMap::new();
        for name in &program.variables {
            if name.starts_with("%temp") {
                let offset = self.build_file.add_temporary_variable(name.clone(), NativeType::Integer);
                temp_offsets.insert(name.clone(), offset);
            } else {
                self.build_file.add_extern_variable(name.clone(), NativeType::Integer);
            }
        }
        self.build_file.set_return_type(1); // Integer, per header's `return_type` enum

        self.emit_prologue();
        for op in &program.operations {
            self.emit_operation(op, &temp_offsets)?;
        }
        self.emit_epilogue();
        self.pad_text();

        self.build_file.save()
    }

    fn emit_prologue(&mut self) {
        self.build_file.add_text(&[0x55]); // push rbp
        self.build_file.add_text(&[0x48, 0x89, 0xE5]); // mov rbp, rsp
        let frame = self.build_file.temporary_frame_size();
        if frame > 0 {
            if frame <= i8::MAX as i32 {
                self.build_file.add_text(&[0x48, 0x83, 0xEC, frame as u8]); // sub rsp, imm8
            } else {
                let mut bytes = vec![0x48, 0x81, 0xEC];
                bytes.extend_from_slice(&frame.to_le_bytes());
                self.build_file.add_text(&bytes);
            }
        }
    }

    fn emit_epilogue(&mut self) {
        let frame = self.build_file.temporary_frame_size();
        if frame > 0 {
            if frame <= i8::MAX as i32 {
                self.build_file.add_text(&[0x48, 0x83, 0xC4, frame as u8]); // add rsp, imm8
            } else {
                let mut bytes = vec![0x48, 0x81, 0xC4];
                bytes.extend_from_slice(&frame.to_le_bytes());
                self.build_file.add_text(&bytes);
            }
        }
        self.build_file.add_text(&[0x5D]); // pop rbp
        self.build_file.add_text(&[0xC3]); // ret
    }

    fn pad_text(&mut self) {
        let extra = (8 - self.build_file.get_current_text_offset() % 8) % 8;
        if extra > 0 {
            self.build_file.add_text(&vec![0x90; extra as usize]);
        }
    }

    /// Loads `data` into `reg` (a 64-bit general register). Covers the
    /// three operand shapes: immediate, stack temporary, RIP-relative
    /// pooled/extern variable. Float and string literals are first pooled
    /// as named constants and addressed the same way an extern variable is.
    fn generate_reg_mem(&mut self, data: &Option<Data>, reg: u8, temp_offsets: &HashMap<String, i32>) {
        match data {
            Some(Data::Integer(v)) => self.emit_mov_imm(reg, *v),
            Some(Data::Float(v)) => {
                let name = self.build_file.add_constant_double(*v);
                self.emit_mov_rip_disp(reg, name, true);
            }
            Some(Data::Str(s)) => {
                let name = self.build_file.add_constant_string(s.clone());
                self.emit_mov_rip_disp(reg, name, true);
            }
            Some(Data::Variable(name)) => {
                if let Some(&offset) = temp_offsets.get(name) {
                    self.emit_mov_rbp_disp(reg, offset, true);
                } else {
                    self.emit_mov_rip_disp(reg, name.clone(), true);
                }
            }
            None => panic!("{}", InternalError::MissingOperand),
        }
    }

    /// Symmetric store from `reg` to `data`'s location. `None` means the op
    /// has no result to write back; a literal in `data` means the flattener
    /// produced a store target that isn't addressable and is a programmer
    /// error, not something to paper over.
    fn generate_store(&mut self, data: &Option<Data>, reg: u8, temp_offsets: &HashMap<String, i32>) {
        match data {
            None => {}
            Some(Data::Variable(name)) => {
                if let Some(&offset) = temp_offsets.get(name) {
                    self.emit_mov_rbp_disp(reg, offset, false);
                } else {
                    self.emit_mov_rip_disp(reg, name.clone(), false);
                }
            }
            Some(Data::Integer(_) | Data::Float(_) | Data::Str(_)) => {
                panic!("{}", InternalError::UnaddressableStoreTarget)
            }
        }
    }

    fn emit_mov_imm(&mut self, reg: u8, value: i64) {
        if i32::try_from(value).is_ok() {
            self.emit_mov_imm32(reg, value as i32);
        } else {
            let mut bytes = vec![0x48, 0xB8 + reg];
            bytes.extend_from_slice(&value.to_le_bytes());
            self.build_file.add_text(&bytes);
        }
    }

    fn emit_mov_imm32(&mut self, reg: u8, value: i32) {
        let mut bytes = vec![0x48, 0xC7, 0xC0 + reg];
        bytes.extend_from_slice(&value.to_le_bytes());
        self.build_file.add_text(&bytes);
    }

    /// `mov reg, [rbp+disp]` (load=true) or `mov [rbp+disp], reg` (store).
    fn emit_mov_rbp_disp(&mut self, reg: u8, disp: i32, load: bool) {
        let opcode = if load { 0x8B } else { 0x89 };
        let rex = 0x48 | ((reg >> 3) << 2);
        if (-128..=127).contains(&disp) {
            let modrm = 0x40 | ((reg & 7) << 3) | RBP;
            self.build_file.add_text(&[rex, opcode, modrm, disp as i8 as u8]);
        } else {
            let modrm = 0x80 | ((reg & 7) << 3) | RBP;
            let mut bytes = vec![rex, opcode, modrm];
            bytes.extend_from_slice(&disp.to_le_bytes());
            self.build_file.add_text(&bytes);
        }
    }

    /// `mov reg, [rip+disp32]` / `mov [rip+disp32], reg`, recording a
    /// `Variable32` relocation for the linker-equivalent save pass.
    fn emit_mov_rip_disp(&mut self, reg: u8, variable_name: String, load: bool) {
        let opcode = if load { 0x8B } else { 0x89 };
        let rex = 0x48 | ((reg >> 3) << 2);
        let modrm = ((reg & 7) << 3) | 0x05; // mod=00, rm=101 -> RIP-relative
        self.build_file.add_text(&[rex, opcode, modrm]);
        let position = self.build_file.get_current_text_offset();
        self.build_file.add_text(&[0, 0, 0, 0]);
        let rip_anchor = self.build_file.get_current_text_offset();
        self.build_file.add_relocation(variable_name, RelocationKind::Variable32, position, rip_anchor);
    }

    fn emit_operation(&mut self, op: &Operation, temp_offsets: &HashMap<String, i32>) -> Result<(), CompileError> {
        match op.op_kind {
            OpKind::Add | OpKind::Subtract => {
                self.generate_reg_mem(&op.lhs, RAX, temp_offsets);
                self.generate_reg_mem(&op.rhs, RDX, temp_offsets);
                let opcode = if op.op_kind == OpKind::Add { 0x01 } else { 0x29 };
                self.build_file.add_text(&[0x48, opcode, 0xC2]); // add/sub rax, rdx
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::BitwiseAnd | OpKind::BitwiseOr | OpKind::BitwiseXor => {
                self.generate_reg_mem(&op.lhs, RAX, temp_offsets);
                self.generate_reg_mem(&op.rhs, RDX, temp_offsets);
                let opcode = match op.op_kind {
                    OpKind::BitwiseAnd => 0x21,
                    OpKind::BitwiseOr => 0x09,
                    _ => 0x31,
                };
                self.build_file.add_text(&[0x48, opcode, 0xC2]);
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::ShiftLeft | OpKind::ShiftRight | OpKind::ShiftRightUnsigned | OpKind::RotateLeft | OpKind::RotateRight => {
                self.generate_reg_mem(&op.lhs, RAX, temp_offsets);
                self.generate_reg_mem(&op.rhs, RCX, temp_offsets);
                let modrm_ext = match op.op_kind {
                    OpKind::ShiftLeft => 4,
                    OpKind::ShiftRight => 7,
                    OpKind::ShiftRightUnsigned => 5,
                    OpKind::RotateLeft => 0,
                    _ => 1,
                };
                let modrm = 0xC0 | (modrm_ext << 3) | RAX;
                self.build_file.add_text(&[0x48, 0xD3, modrm]); // shl/sar/shr/rol/ror rax, cl
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::Compare => {
                self.generate_reg_mem(&op.lhs, RDX, temp_offsets);
                self.generate_reg_mem(&op.rhs, RAX, temp_offsets);
                self.build_file.add_text(&[0x48, 0x39, 0xC2]); // cmp rdx, rax
                self.build_file.add_text(&[0x0F, 0x9F, 0xC0]); // setg al
                self.build_file.add_text(&[0x0F, 0x9C, 0xC1]); // setl cl
                self.build_file.add_text(&[0x28, 0xC8]); // sub al, cl
                self.build_file.add_text(&[0x48, 0x0F, 0xBE, 0xC0]); // movsx rax, al
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::Equal
            | OpKind::NotEqual
            | OpKind::Less
            | OpKind::LessEqual
            | OpKind::Greater
            | OpKind::GreaterEqual
            | OpKind::AlmostEqual
            | OpKind::StrictlyEqual
            | OpKind::StrictlyNotEqual => {
                self.generate_reg_mem(&op.lhs, RDX, temp_offsets);
                self.generate_reg_mem(&op.rhs, RAX, temp_offsets);
                self.build_file.add_text(&[0x31, 0xC0]); // xor eax, eax (after compare below uses dl/al path)
                self.build_file.add_text(&[0x48, 0x39, 0xC2]); // cmp rdx, rax
                let setcc = match op.op_kind {
                    OpKind::Equal | OpKind::StrictlyEqual | OpKind::AlmostEqual => 0x94,
                    OpKind::NotEqual | OpKind::StrictlyNotEqual => 0x95,
                    OpKind::Less => 0x9C,
                    OpKind::LessEqual => 0x9E,
                    OpKind::Greater => 0x9F,
                    _ => 0x9D, // GreaterEqual
                };
                self.build_file.add_text(&[0x0F, setcc, 0xC0]); // setCC al
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::Divide | OpKind::Modulo => {
                self.generate_reg_mem(&op.lhs, RAX, temp_offsets);
                self.generate_reg_mem(&op.rhs, RCX, temp_offsets);
                self.build_file.add_text(&[0x48, 0x99]); // cqo
                self.build_file.add_text(&[0x48, 0xF7, 0xF9]); // idiv rcx
                if op.op_kind == OpKind::Modulo {
                    self.build_file.add_text(&[0x48, 0x89, 0xD0]); // mov rax, rdx
                }
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::Multiply => {
                self.generate_reg_mem(&op.lhs, RAX, temp_offsets);
                self.generate_reg_mem(&op.rhs, RDX, temp_offsets);
                self.build_file.add_text(&[0x48, 0x0F, 0xAF, 0xC2]); // imul rax, rdx
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::Power => {
                let rt_dir = self.rt_archive_dir.clone();
                let offset = self.build_file.add_rt_function(&rt_dir, "power")?;
                self.generate_reg_mem(&op.lhs, 7 /* rdi */, temp_offsets);
                self.generate_reg_mem(&op.rhs, 6 /* rsi */, temp_offsets);
                self.build_file.add_text(&[0xE8, 0, 0, 0, 0]); // call disp32(rip)
                let position = self.build_file.get_current_text_offset() - 4;
                let rip_anchor = self.build_file.get_current_text_offset();
                let _ = offset;
                self.build_file.add_relocation("power", RelocationKind::RT32, position, rip_anchor);
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::Negate => {
                self.generate_reg_mem(&op.lhs, RAX, temp_offsets);
                self.build_file.add_text(&[0x48, 0xF7, 0xD8]); // neg rax
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::BitwiseNot => {
                self.generate_reg_mem(&op.lhs, RAX, temp_offsets);
                self.build_file.add_text(&[0x48, 0xF7, 0xD0]); // not rax
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::LogicalNot => {
                self.generate_reg_mem(&op.lhs, 7 /* rdi */, temp_offsets);
                self.build_file.add_text(&[0x31, 0xC0]); // xor eax, eax
                self.build_file.add_text(&[0x48, 0x85, 0xFF]); // test rdi, rdi
                self.build_file.add_text(&[0x0F, 0x94, 0xC0]); // setz al
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::Identity => {
                self.generate_reg_mem(&op.lhs, RAX, temp_offsets);
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::Minimum | OpKind::Maximum => {
                self.generate_reg_mem(&op.lhs, RAX, temp_offsets);
                self.generate_reg_mem(&op.rhs, RDX, temp_offsets);
                self.build_file.add_text(&[0x48, 0x39, 0xD0]); // cmp rax, rdx
                let cmov_opcode = if op.op_kind == OpKind::Minimum { 0x4C } else { 0x4F }; // cmovl / cmovg
                self.build_file.add_text(&[0x48, 0x0F, cmov_opcode, 0xC2]);
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::Increment | OpKind::Decrement => {
                self.generate_reg_mem(&op.lhs, RAX, temp_offsets);
                let opcode = if op.op_kind == OpKind::Increment { 0xC0 } else { 0xC8 };
                self.build_file.add_text(&[0x48, 0xFF, opcode]); // inc/dec rax
                self.generate_store(&op.lhs, RAX, temp_offsets);
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::Assignment => {
                self.generate_reg_mem(&op.lhs, RAX, temp_offsets);
                self.generate_store(&op.result, RAX, temp_offsets);
            }
            OpKind::IfTrue | OpKind::IfFalse => {
                self.generate_reg_mem(&op.lhs, RAX, temp_offsets);
                self.build_file.add_text(&[0x48, 0x83, 0xF8, 0x00]); // cmp rax, 0
                let jcc = if op.op_kind == OpKind::IfTrue { 0x85 } else { 0x84 }; // jne / je
                self.build_file.add_text(&[0x0F, jcc, 0, 0, 0, 0]);
                let position = self.build_file.get_current_text_offset() - 4;
                let rip_anchor = self.build_file.get_current_text_offset();
                if let Some(label) = &op.label {
                    self.build_file.add_relocation(label.clone(), RelocationKind::Label32, position, rip_anchor);
                }
            }
            OpKind::Goto => {
                self.build_file.add_text(&[0xE9, 0, 0, 0, 0]); // jmp disp32
                let position = self.build_file.get_current_text_offset() - 4;
                let rip_anchor = self.build_file.get_current_text_offset();
                if let Some(label) = &op.label {
                    self.build_file.add_relocation(label.clone(), RelocationKind::Label32, position, rip_anchor);
                }
            }
            OpKind::Label => {
                if let Some(label) = &op.label {
                    self.build_file.add_label(label.clone());
                }
            }
            unsupported => {
                let err = InternalError::UnsupportedOperation(unsupported);
                panic!("{err}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::SyntaxKind;
    use crate::diagnostics::DiagnosticSink;
    use crate::position::Position;

    #[test]
    fn one_plus_two_times_three_emits_a_runnable_image() {
        let mut arena = Arena::new();
        let sink = DiagnosticSink::new();
        let root = arena.create(SyntaxKind::Root, Position::new("t.js"));

        let one = arena.create(SyntaxKind::Integer, Position::new("t.js"));
        arena.set_integer(one, crate::literal::Integer::new(1));
        let two = arena.create(SyntaxKind::Integer, Position::new("t.js"));
        arena.set_integer(two, crate::literal::Integer::new(2));
        let three = arena.create(SyntaxKind::Integer, Position::new("t.js"));
        arena.set_integer(three, crate::literal::Integer::new(3));
        let mul = arena.create(SyntaxKind::Multiply, Position::new("t.js"));
        arena.append_child(mul, two);
        arena.append_child(mul, three);
        let add = arena.create(SyntaxKind::Add, Position::new("t.js"));
        arena.append_child(add, one);
        arena.append_child(add, mul);
        arena.append_child(root, add);

        let mut emitter = Emitter::new(Path::new("."));
        let bytes = emitter.output(root, &arena, &sink).expect("emission should succeed");
        assert_eq!(&bytes[0..4], &crate::compiler::build_file::IMAGE_MAGIC);
        assert_eq!(&bytes[bytes.len() - 4..], &crate::compiler::build_file::TRAILING_MAGIC);
    }
}
