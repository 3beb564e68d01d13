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

// The builtin x86 operand types: 8/16/32-bit integer literals emitted as
// little-endian two's complement, plus absolute and PC-relative 32-bit
// label references.
//
// Integer literals are decimal, or hex written MASM-style: a hex literal
// must start with `0` and end with `h` (`0FFh`). Negative hex is rejected.

use super::{IntOperandType, LabelOperandType, OperandRegistry, bit_string};
use crate::errors::AssemblyError;

pub fn register(registry: &mut OperandRegistry) -> Result<(), AssemblyError> {
    registry.register_int_type(
        "int_32_bits",
        IntOperandType {
            is_valid_char,
            validate: validate_int_32_bits,
            emit: emit_int_32_bits,
        },
    )?;
    registry.register_int_type(
        "int_16_bits",
        IntOperandType {
            is_valid_char,
            validate: validate_int_16_bits,
            emit: emit_int_16_bits,
        },
    )?;
    registry.register_int_type(
        "int_8_bits",
        IntOperandType {
            is_valid_char,
            validate: validate_int_8_bits,
            emit: emit_int_8_bits,
        },
    )?;
    registry.register_label_type(
        "label_x86_imm_32_bits",
        LabelOperandType {
            calc: calc_label_x86_imm_32_bits,
        },
    )?;
    registry.register_label_type(
        "label_x86_rel_32_bit_branch",
        LabelOperandType {
            calc: calc_label_x86_rel_32_bit_branch,
        },
    )?;
    Ok(())
}

fn is_valid_char(c: char) -> bool {
    matches!(c, '0'..='9' | 'a'..='f' | 'A'..='F' | '-' | 'h')
}

fn parse_int(text: &str) -> Option<i64> {
    if text.starts_with('-') && text.ends_with('h') {
        return None;
    }

    if text.ends_with('h') {
        if !text.starts_with('0') {
            return None;
        }
        i64::from_str_radix(&text[1..text.len() - 1], 16).ok()
    } else {
        text.parse::<i64>().ok()
    }
}

fn validate_int_32_bits(text: &str) -> bool {
    matches!(parse_int(text), Some(v) if (-2147483648..=4294967295).contains(&v))
}

fn validate_int_16_bits(text: &str) -> bool {
    matches!(parse_int(text), Some(v) if (-32768..=65535).contains(&v))
}

fn validate_int_8_bits(text: &str) -> bool {
    matches!(parse_int(text), Some(v) if (-128..=255).contains(&v))
}

fn emit_int_32_bits(text: &str) -> Option<String> {
    let v = parse_int(text)?;
    Some(bit_string(&(v as u32).to_le_bytes()))
}

fn emit_int_16_bits(text: &str) -> Option<String> {
    let v = parse_int(text)?;
    Some(bit_string(&(v as u16).to_le_bytes()))
}

fn emit_int_8_bits(text: &str) -> Option<String> {
    let v = parse_int(text)?;
    Some(bit_string(&[v as u8]))
}

fn calc_label_x86_imm_32_bits(_source_address: u64, label_address: u64) -> Option<String> {
    Some(bit_string(&(label_address as u32).to_le_bytes()))
}

// Relative branch displacement is measured from the end of the 5-byte
// opcode+rel32 instruction.
fn calc_label_x86_rel_32_bit_branch(source_address: u64, label_address: u64) -> Option<String> {
    let rel = label_address as i64 - source_address as i64 - 5;
    Some(bit_string(&(rel as i32 as u32).to_le_bytes()))
}
