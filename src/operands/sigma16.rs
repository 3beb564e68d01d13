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

// Operand types for the Sigma16 teaching architecture. Data words are
// decimal or `$hhhh` hex; labels resolve to word addresses.

use super::{IntOperandType, LabelOperandType, OperandRegistry, bit_string};
use crate::errors::AssemblyError;

pub fn register(registry: &mut OperandRegistry) -> Result<(), AssemblyError> {
    registry.register_int_type(
        "int_sigma16_data",
        IntOperandType {
            is_valid_char,
            validate: validate_int_sigma16_data,
            emit: emit_int_sigma16_data,
        },
    )?;
    registry.register_label_type(
        "label_sigma16",
        LabelOperandType {
            calc: calc_label_sigma16,
        },
    )?;
    Ok(())
}

fn is_valid_char(c: char) -> bool {
    matches!(c, '0'..='9' | 'a'..='f' | 'A'..='F' | '-' | '$')
}

fn parse_int(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix('$') {
        if hex.len() != 4 {
            return None;
        }
        i64::from_str_radix(hex, 16).ok()
    } else {
        text.parse::<i64>().ok()
    }
}

fn validate_int_sigma16_data(text: &str) -> bool {
    matches!(parse_int(text), Some(v) if (-32768..=65535).contains(&v))
}

fn emit_int_sigma16_data(text: &str) -> Option<String> {
    let v = parse_int(text)?;
    Some(bit_string(&(v as u16).to_be_bytes()))
}

// Sigma16 memory is word addressed; the byte stream is word granular.
fn calc_label_sigma16(_source_address: u64, label_address: u64) -> Option<String> {
    Some(bit_string(&((label_address / 2) as u16).to_be_bytes()))
}
