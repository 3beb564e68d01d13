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

// Tokenizer for the interior of a `|` pattern line. Whitespace between
// atoms is significant (it becomes a Whitespace atom), so this runs over
// the verbatim text captured by the line-level parser.

use super::{Atom, Grammar, Modifier, PatternAlt};
use crate::errors::AssemblyError;
use crate::operands::{INT_TYPE_PREFIX, LABEL_TYPE_PREFIX, OperandRegistry};
use crate::scan;

// Characters that end a bare token. A lone `,`, `[` or `]` forms a
// one-character raw atom instead; `:` only ever introduces modifiers.
const BARE_TOKEN_BREAKS: &[char] = &[' ', '\t', '%', '[', ']', ':'];

/// Parse one pattern line (without its leading `|`) into atoms + modifiers.
pub fn parse_pattern(
    text: &str,
    line_num: usize,
    grammar: &Grammar,
    registry: &OperandRegistry,
) -> Result<PatternAlt, AssemblyError> {
    let chars: Vec<char> = text.trim().chars().collect();
    let mut atoms: Vec<Atom> = Vec::new();
    let mut modifiers: Vec<Modifier> = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];

        if c == '%' {
            pos += 1;
            let (name, next) = scan::read_identifier(&chars, pos);
            pos = next;
            if scan::next_char(&chars, pos) != Some('%') {
                return Err(AssemblyError::SpecError {
                    line: line_num,
                    reason: format!("placeholder '%{}' is not terminated with a '%' character", name),
                });
            }
            pos += 1;
            atoms.push(Atom::Placeholder(name));
        } else if scan::is_line_space(c) {
            atoms.push(Atom::Whitespace);
            pos = scan::skip_whitespace(&chars, pos);
        } else if c == ':' {
            if scan::next_char(&chars, pos + 1) != Some(':') {
                return Err(AssemblyError::SpecError {
                    line: line_num,
                    reason: "unexpected ':' character in pattern".to_string(),
                });
            }
            let rest: String = chars[pos + 2..].iter().collect();
            modifiers = parse_modifiers(&rest, line_num, grammar, registry)?;

            // trailing whitespace before '::' is not part of the pattern
            if atoms.last() == Some(&Atom::Whitespace) {
                atoms.pop();
            }
            break;
        } else if c == ',' || c == '[' || c == ']' {
            pos += 1;
            atoms.push(Atom::Raw(c.to_string()));
        } else {
            let (token, next) = scan::read_token(&chars, pos, BARE_TOKEN_BREAKS, None);
            pos = next;
            if token.starts_with(INT_TYPE_PREFIX) {
                if !registry.is_defined_type(&token) {
                    return Err(AssemblyError::SpecError {
                        line: line_num,
                        reason: format!("int of type '{}' is not a registered operand type", token),
                    });
                }
                atoms.push(Atom::Int(token));
            } else if token.starts_with(LABEL_TYPE_PREFIX) {
                if !registry.is_defined_type(&token) {
                    return Err(AssemblyError::SpecError {
                        line: line_num,
                        reason: format!("label of type '{}' is not a registered operand type", token),
                    });
                }
                atoms.push(Atom::Label(token));
            } else {
                // raw literals are matched case-insensitively; fold here so
                // uppercase spec text behaves the same as lowercase
                atoms.push(Atom::Raw(token.to_lowercase()));
            }
        }
    }

    Ok(PatternAlt { atoms, modifiers })
}

fn parse_modifiers(
    raw: &str,
    line_num: usize,
    grammar: &Grammar,
    registry: &OperandRegistry,
) -> Result<Vec<Modifier>, AssemblyError> {
    raw.split("::")
        .map(|segment| {
            let compact: String = segment.chars().filter(|c| !scan::is_line_space(*c)).collect();
            parse_modifier(&compact, line_num, grammar, registry)
        })
        .collect()
}

fn parse_modifier(
    text: &str,
    line_num: usize,
    grammar: &Grammar,
    registry: &OperandRegistry,
) -> Result<Modifier, AssemblyError> {
    let parts: Vec<&str> = text.split('=').collect();
    if parts.len() != 2 {
        return Err(AssemblyError::SpecError {
            line: line_num,
            reason: format!("unable to parse bitfield modifier '{}'", text),
        });
    }

    let field = parts[0];
    let value = parts[1];

    if grammar.bitfield_index(field).is_none() {
        return Err(AssemblyError::SpecError {
            line: line_num,
            reason: format!("trying to assign to unknown bitfield '{}' in bitfield modifier", field),
        });
    }

    if value.len() >= 2 && value.starts_with('%') && value.ends_with('%') {
        let type_name = &value[1..value.len() - 1];
        if type_name.starts_with(INT_TYPE_PREFIX) {
            if !registry.is_defined_type(type_name) {
                return Err(AssemblyError::SpecError {
                    line: line_num,
                    reason: format!(
                        "unknown int placeholder '{}' in bitfield modifier; no such operand type is registered",
                        value
                    ),
                });
            }
            return Ok(Modifier::IntPlaceholder {
                field: field.to_string(),
                type_name: type_name.to_string(),
            });
        }
        if type_name.starts_with(LABEL_TYPE_PREFIX) {
            if !registry.is_defined_type(type_name) {
                return Err(AssemblyError::SpecError {
                    line: line_num,
                    reason: format!(
                        "unknown label placeholder '{}' in bitfield modifier; no such operand type is registered",
                        value
                    ),
                });
            }
            return Ok(Modifier::LabelPlaceholder {
                field: field.to_string(),
                type_name: type_name.to_string(),
            });
        }
        return Err(AssemblyError::SpecError {
            line: line_num,
            reason: format!("unknown type of bitfield modifier placeholder '{}'", value),
        });
    }

    if value.chars().any(|c| c != '0' && c != '1') {
        return Err(AssemblyError::SpecError {
            line: line_num,
            reason: format!("unable to parse bitfield modifier value '{}'", value),
        });
    }

    Ok(Modifier::Const {
        field: field.to_string(),
        bits: value.to_string(),
    })
}
