/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use adasm::assemble;
use adasm::errors::AssemblyError;
use adasm::file_reader::MockFileReader;
use adasm::output::ObjectWriter;
use std::path::Path;

const TWO_FIELD_SPEC: &str = "\
// minimal two-field layout
.BIT_FIELDS
name: op
size: 4
name: imm
size: 4

.ASM_INSTRUCTIONS
REG =
    | r0 ::op=0000
    | r1 ::op=0001
;
INSTRUCTION =
    | nop ::op=1111::imm=0000
    | mov %REG% ::imm=1010
;
";

const X86_LIKE_SPEC: &str = "\
.BIT_FIELDS
name: opcode
size: 8
name: imm
size: 32

.ASM_INSTRUCTIONS
INSTRUCTION =
    | nop ::opcode=10010000
    | jmp label_x86_imm_32_bits ::opcode=11101001::imm=%label_x86_imm_32_bits%
    | jr label_x86_rel_32_bit_branch ::opcode=11101001::imm=%label_x86_rel_32_bit_branch%
    | push int_32_bits ::opcode=01101000::imm=%int_32_bits%
;
";

const SIGMA16_SPEC: &str = "\
.BIT_FIELDS
name: op
size: 16
name: disp
size: 16

.ASM_INSTRUCTIONS
INSTRUCTION =
    | data int_sigma16_data ::op=%int_sigma16_data%
    | jump label_sigma16 ::op=1111000000000011::disp=%label_sigma16%
;
";

fn run(spec: &str, source: &str, imagebase: u64) -> anyhow::Result<Vec<u8>> {
    run_with_labels(spec, source, imagebase, false)
}

fn run_with_labels(
    spec: &str,
    source: &str,
    imagebase: u64,
    sigma16_labels: bool,
) -> anyhow::Result<Vec<u8>> {
    let mut reader = MockFileReader::default();
    reader.add_file("arch.spec", spec);
    reader.add_file("test.asm", source);

    assemble(
        Path::new("arch.spec"),
        Path::new("test.asm"),
        imagebase,
        sigma16_labels,
        &reader,
    )
}

#[test]
fn test_literal_only_instruction() {
    let result = run(TWO_FIELD_SPEC, "nop\n", 0x1000).unwrap();
    assert_eq!(result, vec![0xF0]);
}

#[test]
fn test_placeholder_expansion() {
    let result = run(TWO_FIELD_SPEC, "mov r1\n", 0x1000).unwrap();
    assert_eq!(result, vec![0x1A]);
}

#[test]
fn test_int_placeholder() {
    let spec = "\
.BIT_FIELDS
name: op
size: 4
name: imm
size: 8
.ASM_INSTRUCTIONS
INSTRUCTION =
    | li int_8_bits ::op=0010::imm=%int_8_bits%
;
";
    let result = run(spec, "li -1\n", 0x1000).unwrap();
    assert_eq!(result, vec![0x2F, 0xF0]);
}

#[test]
fn test_multiple_lines_concatenate() {
    let result = run(TWO_FIELD_SPEC, "nop\nmov r0\nmov r1\n", 0x1000).unwrap();
    assert_eq!(result, vec![0xF0, 0x0A, 0x1A]);
}

#[test]
fn test_absolute_label() {
    let result = run(X86_LIKE_SPEC, "l: nop\njmp l\n", 0x1000).unwrap();
    assert_eq!(result, vec![0x90, 0xE9, 0x00, 0x10, 0x00, 0x00]);
}

#[test]
fn test_relative_label() {
    let source = "l: nop\nnop\nnop\nnop\nnop\njr l\n";
    let result = run(X86_LIKE_SPEC, source, 0x1000).unwrap();
    // jr at 0x1005: l - 0x1005 - 5 = -10
    assert_eq!(result[..5], [0x90, 0x90, 0x90, 0x90, 0x90]);
    assert_eq!(result[5], 0xE9);
    assert_eq!(result[6..], [0xF6, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn test_forward_label_reference() {
    let result = run(X86_LIKE_SPEC, "jmp l\nl: nop\n", 0x1000).unwrap();
    // jmp is 5 bytes, so l sits at 0x1005
    assert_eq!(result, vec![0xE9, 0x05, 0x10, 0x00, 0x00, 0x90]);
}

#[test]
fn test_hex_operand_literal() {
    let result = run(X86_LIKE_SPEC, "push 0deadbeefh\n", 0x1000).unwrap();
    assert_eq!(result, vec![0x68, 0xEF, 0xBE, 0xAD, 0xDE]);
}

#[test]
fn test_comments_and_blank_lines() {
    let source = "; leading comment\n\nnop ; trailing comment\n\n; done\n";
    let result = run(TWO_FIELD_SPEC, source, 0x1000).unwrap();
    assert_eq!(result, vec![0xF0]);
}

#[test]
fn test_label_on_blank_line_attaches_forward() {
    let source = "jmp l\n\nl:\n; comment\nnop\n";
    let result = run(X86_LIKE_SPEC, source, 0x1000).unwrap();
    assert_eq!(result, vec![0xE9, 0x05, 0x10, 0x00, 0x00, 0x90]);
}

#[test]
fn test_sigma16_program() {
    let source = "\
     jump done
done data $0001
";
    let result = run_with_labels(SIGMA16_SPEC, source, 0, true).unwrap();
    // jump is 4 bytes, so done sits at byte 4 = word 2
    assert_eq!(result, vec![0xF0, 0x03, 0x00, 0x02, 0x00, 0x01]);
}

#[test]
fn test_sigma16_data_dump() {
    let source = "\
x    data $0007
y    data 12
";
    let bytes = run_with_labels(SIGMA16_SPEC, source, 0, true).unwrap();
    assert_eq!(bytes, vec![0x00, 0x07, 0x00, 0x0C]);

    let writer = ObjectWriter::new(&bytes);
    assert_eq!(
        writer.to_sigma16_data().unwrap(),
        "    data $0007\n    data $000c\n"
    );
}

#[test]
fn test_parse_error_reports_location_and_expectation() {
    let spec = "\
.BIT_FIELDS
name: op
size: 4
.ASM_INSTRUCTIONS
REG =
    | r0 ::op=0000
    | r1 ::op=0001
;
INSTRUCTION =
    | add %REG%, %REG%
;
";
    let err = run(spec, "; regs must be comma separated\nadd r0 r1\n", 0x1000).unwrap_err();
    let assembly_error = err.downcast::<AssemblyError>().unwrap();
    match assembly_error {
        AssemblyError::ParseError {
            line,
            parsed,
            expected,
            got,
        } => {
            assert_eq!(line, 2);
            assert_eq!(parsed, "'add' ' ' %REG% ','");
            assert_eq!(expected, "','");
            assert_eq!(got, " r1");
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn test_unknown_mnemonic_is_rejected() {
    let err = run(TWO_FIELD_SPEC, "frobnicate\n", 0x1000).unwrap_err();
    assert!(matches!(
        err.downcast::<AssemblyError>().unwrap(),
        AssemblyError::ParseError { line: 1, .. }
    ));
}

#[test]
fn test_duplicate_label_is_rejected() {
    let err = run(TWO_FIELD_SPEC, "x: nop\nx: nop\n", 0x1000).unwrap_err();
    assert!(matches!(
        err.downcast::<AssemblyError>().unwrap(),
        AssemblyError::SemanticError { line: 2, .. }
    ));
}

#[test]
fn test_dangling_label_is_rejected() {
    let err = run(TWO_FIELD_SPEC, "nop\nend:\n", 0x1000).unwrap_err();
    assert!(matches!(
        err.downcast::<AssemblyError>().unwrap(),
        AssemblyError::SemanticError { line: 2, .. }
    ));
}

#[test]
fn test_undefined_label_reference_is_rejected() {
    let err = run(X86_LIKE_SPEC, "jmp nowhere\n", 0x1000).unwrap_err();
    assert!(matches!(
        err.downcast::<AssemblyError>().unwrap(),
        AssemblyError::ParseError { line: 1, .. }
    ));
}

#[test]
fn test_spec_missing_start_symbol_is_rejected() {
    let spec = "\
.BIT_FIELDS
name: op
size: 4
.ASM_INSTRUCTIONS
NOP =
    | nop ::op=1111
;
";
    let err = run(spec, "nop\n", 0x1000).unwrap_err();
    assert!(matches!(
        err.downcast::<AssemblyError>().unwrap(),
        AssemblyError::SpecValidationError { .. }
    ));
}

#[test]
fn test_rerun_is_byte_identical() {
    let source = "l: nop\njmp l\njr l\n";
    let first = run(X86_LIKE_SPEC, source, 0x1000).unwrap();
    let second = run(X86_LIKE_SPEC, source, 0x1000).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unused_trailing_alternative_does_not_change_output() {
    let extended = "\
// minimal two-field layout
.BIT_FIELDS
name: op
size: 4
name: imm
size: 4

.ASM_INSTRUCTIONS
REG =
    | r0 ::op=0000
    | r1 ::op=0001
;
INSTRUCTION =
    | nop ::op=1111::imm=0000
    | mov %REG% ::imm=1010
    | halt ::op=0111
;
";
    let base = run(TWO_FIELD_SPEC, "mov r1\n", 0x1000).unwrap();
    let with_extra = run(extended, "mov r1\n", 0x1000).unwrap();
    assert_eq!(base, with_extra);
}

#[test]
fn test_swapping_disjoint_definitions_does_not_change_output() {
    let reordered = "\
// minimal two-field layout
.BIT_FIELDS
name: op
size: 4
name: imm
size: 4

.ASM_INSTRUCTIONS
INSTRUCTION =
    | nop ::op=1111::imm=0000
    | mov %REG% ::imm=1010
;
REG =
    | r0 ::op=0000
    | r1 ::op=0001
;
";
    let base = run(TWO_FIELD_SPEC, "mov r0\n", 0x1000).unwrap();
    let swapped = run(reordered, "mov r0\n", 0x1000).unwrap();
    assert_eq!(base, swapped);
}

#[test]
fn test_template_patching_end_to_end() {
    let bytes = run(TWO_FIELD_SPEC, "nop\n", 0x1000).unwrap();
    let writer = ObjectWriter::new(&bytes);
    let template = vec![0x90u8; 16];
    let patched = writer.patch_template(&template, "0x4\n0x8\n").unwrap();
    assert_eq!(patched.len(), 16);
    assert_eq!(patched[4], 0xF0);
    assert_eq!(patched[3], 0x90);
    assert_eq!(patched[5], 0x90);
}

#[test]
fn test_write_object_uses_template_info() {
    let bytes = run(TWO_FIELD_SPEC, "nop\n", 0x1000).unwrap();
    let mut reader = MockFileReader::default();
    reader.add_template("HelloWorld32", &[0x90u8; 8], "2\n4\n");

    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("out.exe");
    ObjectWriter::new(&bytes)
        .write_object(Path::new("HelloWorld32"), &out_path, &reader)
        .unwrap();

    let written = std::fs::read(&out_path).unwrap();
    assert_eq!(
        written,
        vec![0x90, 0x90, 0xF0, 0x90, 0x90, 0x90, 0x90, 0x90]
    );
}

#[test]
fn test_write_bin_to_disk() {
    let bytes = run(TWO_FIELD_SPEC, "nop\nmov r1\n", 0x1000).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("out.bin");

    ObjectWriter::new(&bytes).write_bin(&out_path).unwrap();

    assert_eq!(std::fs::read(&out_path).unwrap(), vec![0xF0, 0x1A]);
}
