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

// Parser for the architecture description file. The line structure
// (directives, bitfield records, definition headers, pattern lines) is
// recognized by the pest grammar; pattern-line interiors are handed to
// the whitespace-sensitive tokenizer in `adl::pattern`.

use super::pattern::parse_pattern;
use super::{BitfieldDef, Grammar, InstrDef, PatternAlt};
use crate::errors::AssemblyError;
use crate::operands::OperandRegistry;
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "./grammar.pest"]
pub struct SpecFileParser;

/// Parse and validate a full architecture description.
pub fn parse_spec(source: &str, registry: &OperandRegistry) -> Result<Grammar, AssemblyError> {
    // the grammar expects every line to be newline terminated
    let mut text = source.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }

    let mut pairs = SpecFileParser::parse(Rule::spec_file, &text)?;
    let spec_pair = pairs.next().unwrap();

    let mut grammar = Grammar::default();

    for section in spec_pair.into_inner() {
        match section.as_rule() {
            Rule::bitfields_section => build_bitfields(section, &mut grammar)?,
            Rule::instructions_section => build_instructions(section, &mut grammar, registry)?,
            Rule::EOI => {}
            _ => unreachable!("Unknown spec section: {:?}", section.as_rule()),
        }
    }

    grammar.validate()?;
    Ok(grammar)
}

fn line_of(pair: &Pair<Rule>) -> usize {
    pair.as_span().start_pos().line_col().0
}

fn build_bitfields(section: Pair<Rule>, grammar: &mut Grammar) -> Result<(), AssemblyError> {
    for def in section.into_inner() {
        let line = line_of(&def);
        let mut inner = def.into_inner();
        let name = inner.next().unwrap().as_str().to_string();
        let size_pair = inner.next().unwrap();

        if grammar.bitfield_index(&name).is_some() {
            return Err(AssemblyError::SpecError {
                line,
                reason: format!("duplicate bitfield definition: '{}'", name),
            });
        }

        let width: usize = size_pair.as_str().parse().map_err(|_| AssemblyError::SpecError {
            line: line_of(&size_pair),
            reason: format!("unable to parse the number for bitfield size '{}'", size_pair.as_str()),
        })?;
        if width == 0 {
            return Err(AssemblyError::SpecError {
                line: line_of(&size_pair),
                reason: format!("bitfield '{}' must have a non-zero size", name),
            });
        }

        grammar.add_bitfield(BitfieldDef { name, width });
    }

    Ok(())
}

fn build_instructions(
    section: Pair<Rule>,
    grammar: &mut Grammar,
    registry: &OperandRegistry,
) -> Result<(), AssemblyError> {
    for def in section.into_inner() {
        let line = line_of(&def);
        let mut inner = def.into_inner();
        let name = inner.next().unwrap().as_str().to_string();

        let mut patterns: Vec<PatternAlt> = Vec::new();
        for pattern_line in inner {
            let pattern_line_num = line_of(&pattern_line);
            let text = pattern_line.into_inner().next().unwrap();
            patterns.push(parse_pattern(
                text.as_str(),
                pattern_line_num,
                grammar,
                registry,
            )?);
        }

        if grammar.defs.contains_key(&name) {
            return Err(AssemblyError::SpecError {
                line,
                reason: format!("duplicate instruction definition found: '{}'", name),
            });
        }

        grammar.defs.insert(
            name.clone(),
            InstrDef {
                name,
                line,
                patterns,
            },
        );
    }

    Ok(())
}

// ------------- unit tests -------------
