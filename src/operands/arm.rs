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

// ARM immediate operand types. Literals are `#`-prefixed decimal.

use super::{IntOperandType, OperandRegistry, bit_string};
use crate::errors::AssemblyError;

pub fn register(registry: &mut OperandRegistry) -> Result<(), AssemblyError> {
    registry.register_int_type(
        "int_8_bits_absolute",
        IntOperandType {
            is_valid_char,
            validate: validate_int_8_bits_absolute,
            emit: emit_int_8_bits_absolute,
        },
    )?;
    registry.register_int_type(
        "int_12_bits_offset",
        IntOperandType {
            is_valid_char,
            validate: validate_int_12_bits_offset,
            emit: emit_int_12_bits_offset,
        },
    )?;
    registry.register_int_type(
        "int_12_bits_constrained",
        IntOperandType {
            is_valid_char,
            validate: validate_int_12_bits_constrained,
            emit: emit_int_12_bits_constrained,
        },
    )?;
    Ok(())
}

fn is_valid_char(c: char) -> bool {
    matches!(c, '0'..='9' | '-' | '#')
}

fn parse_int(text: &str) -> Option<i64> {
    let stripped = text.strip_prefix('#')?;
    stripped.parse::<i64>().ok()
}

fn validate_int_8_bits_absolute(text: &str) -> bool {
    matches!(parse_int(text), Some(v) if (-128..=255).contains(&v))
}

/// 4 zero bits of padding followed by the 8-bit two's complement value.
fn emit_int_8_bits_absolute(text: &str) -> Option<String> {
    let v = parse_int(text)?;
    Some(format!("0000{}", bit_string(&[v as u8])))
}

fn validate_int_12_bits_offset(text: &str) -> bool {
    matches!(parse_int(text), Some(v) if v.unsigned_abs() <= 4095)
}

/// Load/store offsets carry their sign in the U bit of the instruction, so
/// only the magnitude is emitted here.
fn emit_int_12_bits_offset(text: &str) -> Option<String> {
    let v = parse_int(text)?;
    Some(format!("{:012b}", v.unsigned_abs() & 0xFFF))
}

fn validate_int_12_bits_constrained(text: &str) -> bool {
    emit_int_12_bits_constrained(text).is_some()
}

/// The ARM data-processing immediate: an 8-bit base rotated right by twice
/// the 4-bit rotation field. Slide an 8-bit window (wrapping, step 2) over
/// the 32-bit pattern and take the first window with no set bits outside it.
fn emit_int_12_bits_constrained(text: &str) -> Option<String> {
    let v = parse_int(text)?;
    let bits = format!("{:032b}", v as i32 as u32);
    let b = bits.as_str();

    for i in 0..16 {
        let window_start = i * 2;
        let mut window_end = window_start + 8;

        let bits_in_window;
        let bits_outside_window;
        if window_end >= 32 {
            window_end -= 32;
            bits_in_window = format!("{}{}", &b[window_start..32], &b[0..window_end]);
            bits_outside_window = b[window_end..window_start].to_string();
        } else {
            bits_in_window = b[window_start..window_end].to_string();
            bits_outside_window = format!("{}{}", &b[0..window_start], &b[window_end..32]);
        }

        if !bits_outside_window.contains('1') {
            let rotation = if window_end > window_start {
                4 + i
            } else {
                window_end / 2
            };
            return Some(format!("{:04b}{}", rotation, bits_in_window));
        }
    }

    None
}
