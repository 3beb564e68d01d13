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

// In-memory model of a parsed architecture description: the bitfield
// layout, the instruction definitions, and the pattern alternatives that
// make up the matching grammar.

pub mod parser;
mod pattern;

use crate::errors::AssemblyError;
use serde::Serialize;
use std::collections::HashMap;

/// The distinguished start symbol every description must define.
pub const START_SYMBOL: &str = "INSTRUCTION";

/// One named slot of an instruction's bit layout. The declaration order of
/// bitfields is also their emission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BitfieldDef {
    pub name: String,
    pub width: usize,
}

/// The smallest matchable element of a pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Atom {
    /// One or more spaces/tabs in the source.
    Whitespace,
    /// An exact literal, stored lowercase and matched case-insensitively.
    Raw(String),
    /// A reference to another instruction definition, expanded recursively.
    Placeholder(String),
    /// An integer operand handled by the named `int_*` operand type.
    Int(String),
    /// A label operand handled by the named `label_*` operand type.
    Label(String),
}

/// A bitfield assignment attached to a pattern alternative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Modifier {
    /// Assign a literal bit string.
    Const { field: String, bits: String },
    /// Assign the bits emitted for a matched integer operand.
    IntPlaceholder { field: String, type_name: String },
    /// Assign the bits computed for a matched label reference.
    LabelPlaceholder { field: String, type_name: String },
}

/// One `|` line of a definition: an atom sequence plus its modifiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternAlt {
    pub atoms: Vec<Atom>,
    pub modifiers: Vec<Modifier>,
}

/// A named instruction definition. Alternatives are tried in declaration
/// order; the first that matches wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrDef {
    pub name: String,
    pub line: usize,
    pub patterns: Vec<PatternAlt>,
}

/// The full parsed architecture description.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    pub defs: HashMap<String, InstrDef>,
    pub bitfields: Vec<BitfieldDef>,
    pub field_indexes: HashMap<String, usize>,
}

impl Grammar {
    pub fn add_bitfield(&mut self, def: BitfieldDef) {
        self.field_indexes
            .insert(def.name.clone(), self.bitfields.len());
        self.bitfields.push(def);
    }

    pub fn bitfield_index(&self, name: &str) -> Option<usize> {
        self.field_indexes.get(name).copied()
    }

    pub fn bitfield_width(&self, name: &str) -> Option<usize> {
        self.bitfield_index(name).map(|i| self.bitfields[i].width)
    }

    pub fn defn(&self, name: &str) -> Option<&InstrDef> {
        self.defs.get(name)
    }

    /// Cross-reference checks run after the whole description is parsed.
    pub fn validate(&self) -> Result<(), AssemblyError> {
        if !self.defs.contains_key(START_SYMBOL) {
            return Err(AssemblyError::SpecValidationError {
                reason: format!("'{}' instruction definition is not present in spec", START_SYMBOL),
            });
        }

        for defn in self.defs.values() {
            for alt in &defn.patterns {
                for atom in &alt.atoms {
                    if let Atom::Placeholder(target) = atom {
                        if !self.defs.contains_key(target) {
                            return Err(AssemblyError::SpecValidationError {
                                reason: format!(
                                    "instruction definition '{}' defined on line {} uses placeholder for undefined instruction definition '{}'",
                                    defn.name, defn.line, target
                                ),
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
