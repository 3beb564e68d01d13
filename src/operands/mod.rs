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

// Operand type registry. This is the only extension surface of the
// assembler: spec files refer to operand types by name (`int_*` types
// consume an integer literal and emit its bits, `label_*` types turn a
// resolved label address into bits), and all of them are looked up here.
//
// Types are plain function tables. Registration checks the name prefix
// against the table the type is registered into, so a loaded registry
// always has the full method set required for each prefix.

mod arm;
mod builtin;
mod sigma16;

use crate::errors::AssemblyError;
use std::collections::HashMap;

pub const INT_TYPE_PREFIX: &str = "int_";
pub const LABEL_TYPE_PREFIX: &str = "label_";

/// An integer operand type: which characters may appear in the literal,
/// whether a scanned literal is acceptable, and the bits it encodes to.
#[derive(Clone, Copy)]
pub struct IntOperandType {
    pub is_valid_char: fn(char) -> bool,
    pub validate: fn(&str) -> bool,
    pub emit: fn(&str) -> Option<String>,
}

/// A label operand type: computes the bits that express a label reference,
/// given the address of the referencing instruction and of the label.
#[derive(Clone, Copy)]
pub struct LabelOperandType {
    pub calc: fn(u64, u64) -> Option<String>,
}

#[derive(Default)]
pub struct OperandRegistry {
    int_types: HashMap<String, IntOperandType>,
    label_types: HashMap<String, LabelOperandType>,
}

impl OperandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the x86, ARM and Sigma16 type sets.
    pub fn with_builtin_types() -> Result<Self, AssemblyError> {
        let mut registry = Self::new();
        builtin::register(&mut registry)?;
        arm::register(&mut registry)?;
        sigma16::register(&mut registry)?;
        Ok(registry)
    }

    pub fn register_int_type(
        &mut self,
        name: &str,
        op_type: IntOperandType,
    ) -> Result<(), AssemblyError> {
        if !name.starts_with(INT_TYPE_PREFIX) {
            return Err(AssemblyError::OperandTypeError {
                reason: format!(
                    "integer operand type '{}' must be named with the '{}' prefix",
                    name, INT_TYPE_PREFIX
                ),
            });
        }
        if self.is_defined_type(name) {
            return Err(AssemblyError::OperandTypeError {
                reason: format!("duplicate operand type registration: '{}'", name),
            });
        }
        self.int_types.insert(name.to_string(), op_type);
        Ok(())
    }

    pub fn register_label_type(
        &mut self,
        name: &str,
        op_type: LabelOperandType,
    ) -> Result<(), AssemblyError> {
        if !name.starts_with(LABEL_TYPE_PREFIX) {
            return Err(AssemblyError::OperandTypeError {
                reason: format!(
                    "label operand type '{}' must be named with the '{}' prefix",
                    name, LABEL_TYPE_PREFIX
                ),
            });
        }
        if self.is_defined_type(name) {
            return Err(AssemblyError::OperandTypeError {
                reason: format!("duplicate operand type registration: '{}'", name),
            });
        }
        self.label_types.insert(name.to_string(), op_type);
        Ok(())
    }

    pub fn is_defined_type(&self, name: &str) -> bool {
        self.int_types.contains_key(name) || self.label_types.contains_key(name)
    }

    /// Whether `c` may appear in a literal of the named integer type.
    pub fn is_valid_char(&self, type_name: &str, c: char) -> bool {
        match self.int_types.get(type_name) {
            Some(t) => (t.is_valid_char)(c),
            None => false,
        }
    }

    pub fn validate_integer(&self, type_name: &str, text: &str) -> bool {
        match self.int_types.get(type_name) {
            Some(t) => (t.validate)(text),
            None => false,
        }
    }

    pub fn emit_bits(&self, type_name: &str, text: &str) -> Option<String> {
        (self.int_types.get(type_name)?.emit)(text)
    }

    pub fn calc_label_bits(
        &self,
        type_name: &str,
        source_address: u64,
        label_address: u64,
    ) -> Option<String> {
        (self.label_types.get(type_name)?.calc)(source_address, label_address)
    }
}

/// Render bytes as a bit string, most significant bit of each byte first.
pub(crate) fn bit_string(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 8);
    for b in bytes {
        let _ = write!(s, "{:08b}", b);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_has_all_types() {
        let registry = OperandRegistry::with_builtin_types().unwrap();
        for name in [
            "int_32_bits",
            "int_16_bits",
            "int_8_bits",
            "label_x86_imm_32_bits",
            "label_x86_rel_32_bit_branch",
            "int_8_bits_absolute",
            "int_12_bits_offset",
            "int_12_bits_constrained",
            "int_sigma16_data",
            "label_sigma16",
        ] {
            assert!(registry.is_defined_type(name), "missing type {}", name);
        }
    }

    #[test]
    fn test_register_int_type_rejects_wrong_prefix() {
        let mut registry = OperandRegistry::new();
        let result = registry.register_int_type(
            "label_oops",
            IntOperandType {
                is_valid_char: |_| true,
                validate: |_| true,
                emit: |_| None,
            },
        );
        assert!(matches!(
            result,
            Err(AssemblyError::OperandTypeError { .. })
        ));
    }

    #[test]
    fn test_register_label_type_rejects_wrong_prefix() {
        let mut registry = OperandRegistry::new();
        let result = registry.register_label_type("int_oops", LabelOperandType { calc: |_, _| None });
        assert!(matches!(
            result,
            Err(AssemblyError::OperandTypeError { .. })
        ));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = OperandRegistry::with_builtin_types().unwrap();
        let result = registry.register_int_type(
            "int_8_bits",
            IntOperandType {
                is_valid_char: |_| true,
                validate: |_| true,
                emit: |_| None,
            },
        );
        assert!(matches!(
            result,
            Err(AssemblyError::OperandTypeError { .. })
        ));
    }

    #[test]
    fn test_unknown_type_lookups() {
        let registry = OperandRegistry::new();
        assert!(!registry.is_valid_char("int_nope", '1'));
        assert!(!registry.validate_integer("int_nope", "1"));
        assert_eq!(registry.emit_bits("int_nope", "1"), None);
        assert_eq!(registry.calc_label_bits("label_nope", 0, 0), None);
    }

    #[test]
    fn test_bit_string() {
        assert_eq!(bit_string(&[0xF0]), "11110000");
        assert_eq!(bit_string(&[0x12, 0x34]), "0001001000110100");
        assert_eq!(bit_string(&[]), "");
    }
}
