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

// Turns the matched tree into the final machine-code byte stream.
//
// Pass 1 composes each instruction's bitfields, measures it, and assigns
// addresses from the image base (recording label addresses as it goes).
// Pass 2 rewrites every label placeholder into literal bits computed by
// the label's operand type. Pass 3 recomposes and concatenates.

mod bitstream;

pub use bitstream::BitBuffer;

use crate::adl::{Grammar, Modifier};
use crate::errors::AssemblyError;
use crate::operands::OperandRegistry;
use crate::parser::{AssemblyLine, NodeKind, TreeNode};
use std::collections::HashMap;
use std::fmt::Write;

/// One slot of an instruction's layout. A slot never written stays absent
/// and contributes no bits.
#[derive(Debug, Clone)]
pub struct BitfieldSlot {
    pub name: String,
    pub width: usize,
    pub value: Option<String>,
}

pub struct BitstreamGenerator<'a> {
    grammar: &'a Grammar,
    registry: &'a OperandRegistry,
    imagebase: u64,
}

impl<'a> BitstreamGenerator<'a> {
    pub fn new(grammar: &'a Grammar, registry: &'a OperandRegistry, imagebase: u64) -> Self {
        Self {
            grammar,
            registry,
            imagebase,
        }
    }

    /// Run all three passes and return the packed byte stream. Addresses
    /// are written back onto the lines, and label placeholders are
    /// rewritten in place, so a second run is a no-op producing the same
    /// bytes.
    pub fn generate(&self, ast: &mut [AssemblyLine]) -> Result<Vec<u8>, AssemblyError> {
        let mut current_address = self.imagebase;
        let mut label_addresses: HashMap<String, u64> = HashMap::new();

        for line in ast.iter_mut() {
            let slots = self.compose_line(line)?;
            line.address = Some(current_address);
            for label in &line.labels {
                label_addresses.insert(label.clone(), current_address);
            }
            current_address += total_bits(&slots).div_ceil(8) as u64;
        }

        for line in ast.iter_mut() {
            let source_address = line.address.unwrap_or(self.imagebase);
            let line_number = line.line_number;
            self.resolve_labels(&mut line.root, source_address, &label_addresses, line_number)?;
        }

        let mut buffer = BitBuffer::new();
        for line in ast.iter() {
            let slots = self.compose_line(line)?;
            for slot in &slots {
                if let Some(bits) = &slot.value {
                    buffer.push_bits(bits);
                }
            }
        }

        Ok(buffer.to_bytes())
    }

    /// Compose the bitfield layout of one instruction by walking its tree
    /// and applying every modifier to a fresh slot array.
    pub fn compose_line(&self, line: &AssemblyLine) -> Result<Vec<BitfieldSlot>, AssemblyError> {
        let mut slots: Vec<BitfieldSlot> = self
            .grammar
            .bitfields
            .iter()
            .map(|b| BitfieldSlot {
                name: b.name.clone(),
                width: b.width,
                value: None,
            })
            .collect();

        self.apply_node(&mut slots, &line.root, line.line_number)?;
        Ok(slots)
    }

    fn apply_node(
        &self,
        slots: &mut [BitfieldSlot],
        node: &TreeNode,
        line_number: usize,
    ) -> Result<(), AssemblyError> {
        for modifier in &node.modifiers {
            match modifier {
                Modifier::Const { field, bits } => {
                    let idx = self.slot_index(field, line_number)?;
                    slots[idx].value = Some(bits.clone());
                }
                Modifier::LabelPlaceholder { field, .. } => {
                    // reserve the field; overwritten once addresses exist
                    let idx = self.slot_index(field, line_number)?;
                    slots[idx].value = Some("0".repeat(slots[idx].width));
                }
                Modifier::IntPlaceholder { type_name, .. } => {
                    return Err(AssemblyError::EncodingError {
                        line: line_number + 1,
                        reason: format!(
                            "unprocessed int placeholder '{}' reached bitstream generation",
                            type_name
                        ),
                    });
                }
            }
        }

        for child in &node.children {
            self.apply_node(slots, child, line_number)?;
        }

        Ok(())
    }

    fn slot_index(&self, field: &str, line_number: usize) -> Result<usize, AssemblyError> {
        self.grammar
            .bitfield_index(field)
            .ok_or_else(|| AssemblyError::EncodingError {
                line: line_number + 1,
                reason: format!("unknown bitfield named '{}'", field),
            })
    }

    /// Replace every label placeholder under `node` with the bits computed
    /// by its operand type. The source address is the address of the
    /// containing top-level instruction.
    fn resolve_labels(
        &self,
        node: &mut TreeNode,
        source_address: u64,
        label_addresses: &HashMap<String, u64>,
        line_number: usize,
    ) -> Result<(), AssemblyError> {
        let TreeNode {
            modifiers,
            children,
            ..
        } = node;

        for modifier in modifiers.iter_mut() {
            let (field, type_name) = match &*modifier {
                Modifier::LabelPlaceholder { field, type_name } => {
                    (field.clone(), type_name.clone())
                }
                _ => continue,
            };

            let prefix = format!("{} ", type_name);
            let child = children
                .iter()
                .find(|c| c.kind == NodeKind::Label && c.value.starts_with(&prefix))
                .ok_or_else(|| AssemblyError::EncodingError {
                    line: line_number + 1,
                    reason: format!(
                        "bitfield modifier references label placeholder '{}', but no matched label of that type is present",
                        type_name
                    ),
                })?;
            let label_name = &child.value[prefix.len()..];

            let label_address =
                label_addresses
                    .get(label_name)
                    .ok_or_else(|| AssemblyError::EncodingError {
                        line: line_number + 1,
                        reason: format!("unknown label '{}' in bitfield modifier", label_name),
                    })?;

            let bits = self
                .registry
                .calc_label_bits(&type_name, source_address, *label_address)
                .ok_or_else(|| AssemblyError::EncodingError {
                    line: line_number + 1,
                    reason: format!(
                        "label emitter for '{}' rejected label '{}' (source address 0x{:x}, label address 0x{:x})",
                        type_name, label_name, source_address, label_address
                    ),
                })?;

            let width = self.grammar.bitfield_width(&field).unwrap_or(0);
            if bits.is_empty() || bits.chars().any(|c| c != '0' && c != '1') {
                return Err(AssemblyError::EncodingError {
                    line: line_number + 1,
                    reason: format!(
                        "label emitter for '{}' returned bitstring '{}', which is invalid; bitstrings may only contain 1 and 0 characters",
                        type_name, bits
                    ),
                });
            }
            if bits.len() != width {
                return Err(AssemblyError::EncodingError {
                    line: line_number + 1,
                    reason: format!(
                        "label emitter for '{}' returned a bitstring of length {}, but bitfield '{}' expects length {}",
                        type_name,
                        bits.len(),
                        field,
                        width
                    ),
                });
            }

            *modifier = Modifier::Const { field, bits };
        }

        for child in children.iter_mut() {
            self.resolve_labels(child, source_address, label_addresses, line_number)?;
        }

        Ok(())
    }

    /// Per-line debug listing: the source line, a table of the present
    /// bitfields, and the padded bytes the line packs to. Runs a full
    /// generation first so label fields show their final values.
    pub fn debug_bitstream(&self, ast: &mut [AssemblyLine]) -> Result<String, AssemblyError> {
        self.generate(ast)?;

        let mut out = String::new();
        for line in ast.iter() {
            if !line.source.is_empty() {
                let _ = writeln!(out, "{}", line.source);
            }

            let slots = self.compose_line(line)?;
            let present: Vec<&BitfieldSlot> =
                slots.iter().filter(|s| s.value.is_some()).collect();

            let widths: Vec<usize> = present
                .iter()
                .map(|s| s.name.len().max(s.value.as_deref().unwrap_or("").len()))
                .collect();

            let mut header = String::new();
            let mut rule = String::new();
            let mut values = String::new();
            for (slot, width) in present.iter().zip(widths.iter().copied()) {
                let _ = write!(header, "{:<w$}  ", slot.name, w = width);
                let _ = write!(rule, "{}  ", "-".repeat(width));
                let _ = write!(values, "{:<w$}  ", slot.value.as_deref().unwrap_or(""), w = width);
            }
            let _ = writeln!(out, "{}", header.trim_end());
            let _ = writeln!(out, "{}", rule.trim_end());
            let _ = writeln!(out, "{}", values.trim_end());

            let mut buffer = BitBuffer::new();
            for slot in &present {
                if let Some(bits) = &slot.value {
                    buffer.push_bits(bits);
                }
            }
            let bytes: String = buffer
                .to_bytes()
                .iter()
                .map(|b| format!("{:02X} ", b))
                .collect();
            let _ = writeln!(out, "Bytes (padded):");
            let _ = writeln!(out, "{}", bytes.trim_end());
            let _ = writeln!(out);
        }

        Ok(out)
    }
}

fn total_bits(slots: &[BitfieldSlot]) -> usize {
    slots
        .iter()
        .filter_map(|s| s.value.as_ref().map(|v| v.len()))
        .sum()
}

// ------------- unit tests -------------
