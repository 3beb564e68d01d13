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

// Recursive-descent matcher for assembly source, driven by the loaded
// grammar. Each line is parsed against the `INSTRUCTION` start symbol:
// alternatives are tried in spec order, with the cursor, token buffer and
// diagnostic stack snapshotted before each attempt and restored on
// failure. Raw tokens are matched a character at a time with
// no/partial/exact classification against the literal.

mod tree;

pub use tree::{AssemblyLine, NodeKind, TreeNode};

use crate::adl::{Atom, Grammar, InstrDef, Modifier, START_SYMBOL};
use crate::errors::AssemblyError;
use crate::operands::OperandRegistry;
use crate::scan;
use std::collections::BTreeMap;
use std::collections::HashSet;

// Caps placeholder expansion so a cyclic grammar turns into a diagnostic
// instead of unbounded recursion.
const MAX_EXPANSION_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
enum TokenMatch {
    NoMatch,
    PartialMatch,
    ExactMatch,
}

pub struct AsmParser<'a> {
    grammar: &'a Grammar,
    registry: &'a OperandRegistry,
    sigma16_labels: bool,

    raw_lines: Vec<String>,
    lines: Vec<String>,
    line_num: usize,
    chars: Vec<char>,
    pos: usize,
    token_buffer: String,

    labels_by_line: BTreeMap<usize, String>,
    label_names: HashSet<String>,
    ast: Vec<AssemblyLine>,

    expected_stack: Vec<String>,
    max_parsed_depth: usize,
    error_parsed: String,
    error_expected: String,
    error_got: String,
}

impl<'a> AsmParser<'a> {
    pub fn new(grammar: &'a Grammar, registry: &'a OperandRegistry, sigma16_labels: bool) -> Self {
        Self {
            grammar,
            registry,
            sigma16_labels,
            raw_lines: Vec::new(),
            lines: Vec::new(),
            line_num: 0,
            chars: Vec::new(),
            pos: 0,
            token_buffer: String::new(),
            labels_by_line: BTreeMap::new(),
            label_names: HashSet::new(),
            ast: Vec::new(),
            expected_stack: Vec::new(),
            max_parsed_depth: 0,
            error_parsed: String::new(),
            error_expected: String::new(),
            error_got: String::new(),
        }
    }

    /// Parse a whole assembly listing into top-level instruction nodes.
    /// Runs the label pre-pass, then the instruction pass, then attaches
    /// labels to the instructions they address.
    pub fn parse_source(mut self, source: &str) -> Result<Vec<AssemblyLine>, AssemblyError> {
        self.raw_lines = source.lines().map(|l| l.to_string()).collect();
        self.lines = self.raw_lines.iter().map(|l| l.trim().to_string()).collect();

        self.collect_labels()?;
        self.parse_listing()?;
        self.assign_labels()?;

        Ok(self.ast)
    }

    fn skip_line(line: &str) -> bool {
        line.is_empty() || line.starts_with(';')
    }

    // ---- pass A: label collection ----

    fn collect_labels(&mut self) -> Result<(), AssemblyError> {
        for line_num in 0..self.lines.len() {
            if Self::skip_line(&self.lines[line_num]) {
                continue;
            }

            let label = if self.sigma16_labels {
                self.read_sigma16_label(line_num)
            } else {
                self.read_default_label(line_num)
            };

            if let Some(label) = label {
                if !self.label_names.insert(label.clone()) {
                    return Err(AssemblyError::SemanticError {
                        line: line_num + 1,
                        reason: format!("Duplicate label definition: {}", label),
                    });
                }
                self.labels_by_line.insert(line_num, label);
            }
        }

        Ok(())
    }

    /// Default style: `name:` at the start of the (stripped) line.
    fn read_default_label(&self, line_num: usize) -> Option<String> {
        let line = &self.lines[line_num];
        if !line.contains(':') {
            return None;
        }

        let chars: Vec<char> = line.chars().collect();
        let (candidate, pos) =
            scan::read_token(&chars, 0, &[' ', ':'], Some(scan::is_identifier_char));
        if candidate.is_empty() {
            return None;
        }

        match scan::next_char(&chars, pos) {
            Some(':') => Some(candidate),
            _ => None,
        }
    }

    /// Sigma16 style: any line that does not start with whitespace begins
    /// with a label.
    fn read_sigma16_label(&self, line_num: usize) -> Option<String> {
        let raw = &self.raw_lines[line_num];
        match raw.chars().next() {
            Some(c) if !scan::is_line_space(c) => {}
            _ => return None,
        }

        let chars: Vec<char> = self.lines[line_num].chars().collect();
        let (candidate, _) = scan::read_identifier(&chars, 0);
        if candidate.is_empty() {
            None
        } else {
            Some(candidate)
        }
    }

    // ---- pass B: instruction parse ----

    fn parse_listing(&mut self) -> Result<(), AssemblyError> {
        for line_num in 0..self.lines.len() {
            self.line_num = line_num;
            if Self::skip_line(&self.lines[line_num]) {
                continue;
            }
            self.parse_current_line()?;
        }
        Ok(())
    }

    fn parse_current_line(&mut self) -> Result<(), AssemblyError> {
        self.reset_error_state();
        self.reset_token_buffer();
        self.chars = self.lines[self.line_num].chars().collect();
        self.pos = 0;

        // Position the cursor past the label, if this line carries one.
        if let Some(label) = self.labels_by_line.get(&self.line_num) {
            self.pos = label.chars().count();
            if !self.sigma16_labels {
                self.pos += 1; // the ':'
            }
            self.pos = scan::skip_whitespace(&self.chars, self.pos);
            if self.pos == self.chars.len() {
                // label-only line
                return Ok(());
            }
        }

        let root = self.parse_instruction()?;
        self.ast.push(AssemblyLine {
            line_number: self.line_num,
            source: self.lines[self.line_num].clone(),
            labels: Vec::new(),
            root,
            address: None,
        });

        Ok(())
    }

    fn parse_instruction(&mut self) -> Result<TreeNode, AssemblyError> {
        let defn = self.defn(START_SYMBOL);
        match self.match_defn(defn, true, 0)? {
            Some((children, modifiers)) => {
                Ok(TreeNode::group(START_SYMBOL.to_string(), children, modifiers))
            }
            None => Err(AssemblyError::ParseError {
                line: self.line_num + 1,
                parsed: self.error_parsed.clone(),
                expected: self.error_expected.clone(),
                got: self.error_got.clone(),
            }),
        }
    }

    fn defn(&self, name: &str) -> &'a InstrDef {
        // placeholder targets are checked during spec validation
        let grammar: &'a Grammar = self.grammar;
        &grammar.defs[name]
    }

    /// Try a definition's alternatives in order. `Ok(None)` means no
    /// alternative matched and the cursor is back where it started.
    fn match_defn(
        &mut self,
        defn: &'a InstrDef,
        top_level: bool,
        depth: usize,
    ) -> Result<Option<(Vec<TreeNode>, Vec<Modifier>)>, AssemblyError> {
        if depth > MAX_EXPANSION_DEPTH {
            return Err(AssemblyError::SemanticError {
                line: self.line_num + 1,
                reason: format!(
                    "maximum placeholder expansion depth ({}) exceeded while matching '{}'; the grammar is likely recursive",
                    MAX_EXPANSION_DEPTH, defn.name
                ),
            });
        }

        for alt in &defn.patterns {
            let save_pos = self.pos;
            let save_buffer = self.token_buffer.clone();
            let save_stack = self.expected_stack.clone();

            let mut matched = self.try_match_pattern(&alt.atoms, depth)?;

            if top_level && matched.is_some() && !self.rest_is_empty() {
                self.note_nonempty_rest();
                matched = None;
            }

            match matched {
                Some(children) => {
                    let modifiers = self.process_int_placeholders(&alt.modifiers, &children)?;
                    return Ok(Some((children, modifiers)));
                }
                None => {
                    self.pos = save_pos;
                    self.token_buffer = save_buffer;
                    self.expected_stack = save_stack;
                }
            }
        }

        Ok(None)
    }

    /// Match every atom of one alternative in sequence. Returns the child
    /// nodes produced, or `None` as soon as an atom fails.
    fn try_match_pattern(
        &mut self,
        atoms: &[Atom],
        depth: usize,
    ) -> Result<Option<Vec<TreeNode>>, AssemblyError> {
        let mut matched_any = false;
        let mut children: Vec<TreeNode> = Vec::new();

        for atom in atoms {
            self.push_expected(atom);

            let produced = match atom {
                Atom::Whitespace => {
                    if self.try_match_whitespace() {
                        Some(None)
                    } else {
                        None
                    }
                }
                Atom::Raw(literal) => self.try_match_raw(literal).map(Some),
                Atom::Int(type_name) => self.try_match_int(type_name).map(Some),
                Atom::Label(type_name) => self.try_match_label(type_name).map(Some),
                Atom::Placeholder(name) => {
                    // hide the sub-definition's internals from diagnostics
                    // once it has matched
                    let stack_mark = self.expected_stack.len();
                    let defn = self.defn(name);
                    match self.match_defn(defn, false, depth + 1)? {
                        Some((sub_children, modifiers)) => {
                            self.expected_stack.truncate(stack_mark);
                            Some(Some(TreeNode::group(name.clone(), sub_children, modifiers)))
                        }
                        None => None,
                    }
                }
            };

            match produced {
                Some(node) => {
                    matched_any = true;
                    if let Some(node) = node {
                        children.push(node);
                    }
                    self.reset_token_buffer();
                }
                None => {
                    self.pop_expected();
                    return Ok(None);
                }
            }
        }

        Ok(if matched_any { Some(children) } else { None })
    }

    // ---- per-atom matching ----

    fn try_match_whitespace(&mut self) -> bool {
        if !self.read_line_char() {
            return false;
        }
        let c = self.token_buffer.chars().last();
        if matches!(c, Some(' ') | Some('\t')) {
            self.pos = scan::skip_whitespace(&self.chars, self.pos);
            true
        } else {
            false
        }
    }

    fn try_match_raw(&mut self, literal: &str) -> Option<TreeNode> {
        if !self.read_line_char() {
            return None;
        }

        let mut kind = self.match_token(literal);
        while kind == TokenMatch::PartialMatch {
            if !self.read_line_char() {
                kind = TokenMatch::NoMatch;
                break;
            }
            kind = self.match_token(literal);
        }

        match kind {
            TokenMatch::ExactMatch => Some(TreeNode::leaf(NodeKind::Raw, literal.to_string())),
            _ => None,
        }
    }

    fn try_match_int(&mut self, type_name: &str) -> Option<TreeNode> {
        let registry = self.registry;
        if !self.read_line_char_if(|c| registry.is_valid_char(type_name, c)) {
            return None;
        }
        while self.read_line_char_if(|c| registry.is_valid_char(type_name, c)) {}

        if registry.validate_integer(type_name, &self.token_buffer) {
            Some(TreeNode::leaf(
                NodeKind::Int,
                format!("{} {}", type_name, self.token_buffer),
            ))
        } else {
            None
        }
    }

    fn try_match_label(&mut self, type_name: &str) -> Option<TreeNode> {
        if !self.read_line_char_if(scan::is_identifier_char) {
            return None;
        }
        while self.read_line_char_if(scan::is_identifier_char) {}

        if self.label_names.contains(&self.token_buffer) {
            Some(TreeNode::leaf(
                NodeKind::Label,
                format!("{} {}", type_name, self.token_buffer),
            ))
        } else {
            None
        }
    }

    fn match_token(&self, literal: &str) -> TokenMatch {
        if literal.is_empty() {
            return TokenMatch::NoMatch;
        }

        if literal == self.token_buffer {
            TokenMatch::ExactMatch
        } else if literal.starts_with(&self.token_buffer) {
            TokenMatch::PartialMatch
        } else {
            TokenMatch::NoMatch
        }
    }

    // ---- cursor / token buffer ----

    /// Read the next char into the token buffer, folded to lowercase.
    /// Raw literals are stored lowercase, so matching is case-insensitive.
    fn read_line_char(&mut self) -> bool {
        match scan::next_char(&self.chars, self.pos) {
            Some(c) => {
                self.token_buffer.extend(c.to_lowercase());
                self.pos += 1;
                true
            }
            None => false,
        }
    }

    /// Read the next char verbatim if the predicate accepts it. Operand
    /// and label text keeps its original case.
    fn read_line_char_if(&mut self, pred: impl Fn(char) -> bool) -> bool {
        match scan::next_char(&self.chars, self.pos) {
            Some(c) if pred(c) => {
                self.token_buffer.push(c);
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn reset_token_buffer(&mut self) {
        self.token_buffer.clear();
    }

    /// A top-level match must leave nothing but blanks or a `;` comment.
    fn rest_is_empty(&mut self) -> bool {
        while self.read_line_char() {
            match self.token_buffer.chars().last() {
                Some(';') => return true,
                Some(' ') | Some('\t') => continue,
                _ => return false,
            }
        }
        true
    }

    // ---- int placeholder resolution ----

    /// Resolve `IntPlaceholder` modifiers at the alternative's return site:
    /// find the matched INT child, run the operand type's emitter, and
    /// replace the placeholder with the literal bits. Label placeholders
    /// stay as-is until addresses are known.
    fn process_int_placeholders(
        &self,
        modifiers: &[Modifier],
        children: &[TreeNode],
    ) -> Result<Vec<Modifier>, AssemblyError> {
        let mut processed = Vec::with_capacity(modifiers.len());

        for modifier in modifiers {
            match modifier {
                Modifier::Const { .. } | Modifier::LabelPlaceholder { .. } => {
                    processed.push(modifier.clone());
                }
                Modifier::IntPlaceholder { field, type_name } => {
                    let prefix = format!("{} ", type_name);
                    let child = children
                        .iter()
                        .find(|c| c.kind == NodeKind::Int && c.value.starts_with(&prefix))
                        .ok_or_else(|| AssemblyError::EncodingError {
                            line: self.line_num + 1,
                            reason: format!(
                                "bitfield modifier references int placeholder '{}', but no matched operand of that type is present",
                                type_name
                            ),
                        })?;

                    let text = &child.value[prefix.len()..];
                    let bits = self.registry.emit_bits(type_name, text).ok_or_else(|| {
                        AssemblyError::EncodingError {
                            line: self.line_num + 1,
                            reason: format!(
                                "emitter for '{}' rejected operand value '{}'",
                                type_name, text
                            ),
                        }
                    })?;

                    self.check_emitted_bits(&bits, field, type_name, text)?;

                    processed.push(Modifier::Const {
                        field: field.clone(),
                        bits,
                    });
                }
            }
        }

        Ok(processed)
    }

    fn check_emitted_bits(
        &self,
        bits: &str,
        field: &str,
        type_name: &str,
        text: &str,
    ) -> Result<(), AssemblyError> {
        if bits.is_empty() || bits.chars().any(|c| c != '0' && c != '1') {
            return Err(AssemblyError::EncodingError {
                line: self.line_num + 1,
                reason: format!(
                    "emit of a '{}' with value '{}' returned bitstring '{}', which is invalid; bitstrings may only contain 1 and 0 characters",
                    type_name, text, bits
                ),
            });
        }

        let width = self.grammar.bitfield_width(field).unwrap_or(0);
        if bits.len() != width {
            return Err(AssemblyError::EncodingError {
                line: self.line_num + 1,
                reason: format!(
                    "emit of a '{}' with value '{}' returned a bitstring of length {}, but bitfield '{}' expects length {}",
                    type_name,
                    text,
                    bits.len(),
                    field,
                    width
                ),
            });
        }

        Ok(())
    }

    // ---- diagnostics ----

    fn reset_error_state(&mut self) {
        self.max_parsed_depth = 0;
        self.error_parsed.clear();
        self.error_expected.clear();
        self.error_got.clear();
        self.expected_stack.clear();
    }

    fn push_expected(&mut self, atom: &Atom) {
        let entry = match atom {
            Atom::Whitespace => "' '".to_string(),
            Atom::Raw(literal) => format!("'{}'", literal),
            Atom::Int(type_name) => type_name.clone(),
            Atom::Label(type_name) => type_name.clone(),
            Atom::Placeholder(name) => format!("%{}%", name),
        };
        self.expected_stack.push(entry);
    }

    fn pop_expected(&mut self) {
        if self.expected_stack.len() > self.max_parsed_depth {
            self.snapshot_failure();
        }
        self.expected_stack.pop();
    }

    /// Record the deepest failure seen on this line; it becomes the parse
    /// error if no alternative matches.
    fn snapshot_failure(&mut self) {
        self.max_parsed_depth = self.expected_stack.len();
        self.error_parsed = self.expected_stack.join(" ");
        self.error_expected = self.expected_stack.last().cloned().unwrap_or_default();
        self.error_got = format!("{}{}", self.token_buffer, self.rest_of_line());
    }

    fn note_nonempty_rest(&mut self) {
        if self.expected_stack.len() > self.max_parsed_depth {
            self.max_parsed_depth = self.expected_stack.len();
            self.error_parsed = self.expected_stack.join(" ");
            self.error_expected = "<< rest of line should be empty >>".to_string();
            let last: String = self
                .token_buffer
                .chars()
                .last()
                .map(|c| c.to_string())
                .unwrap_or_default();
            self.error_got = format!("{}{}", last, self.rest_of_line());
        }
    }

    fn rest_of_line(&self) -> String {
        self.chars[self.pos..].iter().collect()
    }

    // ---- label attachment ----

    /// Attach each collected label to the first instruction at or below
    /// its line. Labels with no following instruction are fatal.
    fn assign_labels(&mut self) -> Result<(), AssemblyError> {
        let mut assignment: Vec<Option<usize>> = vec![None; self.lines.len()];

        for (ast_index, line) in self.ast.iter().enumerate() {
            let mut idx = line.line_number as isize;
            while idx >= 0 && assignment[idx as usize].is_none() {
                assignment[idx as usize] = Some(ast_index);
                idx -= 1;
            }
        }

        for (&label_line, label) in &self.labels_by_line {
            match assignment[label_line] {
                Some(ast_index) => self.ast[ast_index].labels.push(label.clone()),
                None => {
                    return Err(AssemblyError::SemanticError {
                        line: label_line + 1,
                        reason: format!(
                            "dangling label '{}': no instruction follows it",
                            label
                        ),
                    });
                }
            }
        }

        Ok(())
    }
}

// ------------- unit tests -------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adl::parser::parse_spec;

    fn registry() -> OperandRegistry {
        OperandRegistry::with_builtin_types().unwrap()
    }

    fn grammar(spec: &str, registry: &OperandRegistry) -> Grammar {
        parse_spec(spec, registry).unwrap()
    }

    const TWO_FIELD_SPEC: &str = "\
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

    #[test]
    fn test_parse_single_raw_instruction() {
        let registry = registry();
        let grammar = grammar(TWO_FIELD_SPEC, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let ast = parser.parse_source("nop\n").unwrap();

        assert_eq!(ast.len(), 1);
        assert_eq!(ast[0].line_number, 0);
        assert_eq!(ast[0].source, "nop");
        assert_eq!(ast[0].root.kind, NodeKind::Group);
        assert_eq!(ast[0].root.value, START_SYMBOL);
        assert_eq!(
            ast[0].root.modifiers,
            vec![
                Modifier::Const {
                    field: "op".to_string(),
                    bits: "1111".to_string(),
                },
                Modifier::Const {
                    field: "imm".to_string(),
                    bits: "0000".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let registry = registry();
        let grammar = grammar(TWO_FIELD_SPEC, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let ast = parser.parse_source("NOP\n").unwrap();
        assert_eq!(ast.len(), 1);
    }

    #[test]
    fn test_placeholder_expansion() {
        let registry = registry();
        let grammar = grammar(TWO_FIELD_SPEC, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let ast = parser.parse_source("mov r1\n").unwrap();

        let root = &ast[0].root;
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].kind, NodeKind::Raw);
        assert_eq!(root.children[0].value, "mov");
        assert_eq!(root.children[1].kind, NodeKind::Group);
        assert_eq!(root.children[1].value, "REG");
        assert_eq!(
            root.children[1].modifiers,
            vec![Modifier::Const {
                field: "op".to_string(),
                bits: "0001".to_string(),
            }]
        );
    }

    #[test]
    fn test_alternatives_are_tried_in_spec_order() {
        let registry = registry();
        // both alternatives match "add"; the first must win
        let spec = "\
.BIT_FIELDS
name: op
size: 4
.ASM_INSTRUCTIONS
INSTRUCTION =
    | add ::op=0001
    | add ::op=0010
;
";
        let grammar = grammar(spec, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let ast = parser.parse_source("add\n").unwrap();
        assert_eq!(
            ast[0].root.modifiers,
            vec![Modifier::Const {
                field: "op".to_string(),
                bits: "0001".to_string(),
            }]
        );
    }

    #[test]
    fn test_backtracking_across_shared_prefix() {
        let registry = registry();
        // "add" is a prefix of "addc"; the matcher must back off and take
        // the second alternative
        let spec = "\
.BIT_FIELDS
name: op
size: 4
.ASM_INSTRUCTIONS
INSTRUCTION =
    | add ::op=0001
    | addc ::op=0010
;
";
        let grammar = grammar(spec, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let ast = parser.parse_source("addc\n").unwrap();
        assert_eq!(
            ast[0].root.modifiers,
            vec![Modifier::Const {
                field: "op".to_string(),
                bits: "0010".to_string(),
            }]
        );
    }

    #[test]
    fn test_int_operand_resolution() {
        let registry = registry();
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
        let grammar = grammar(spec, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let ast = parser.parse_source("li -1\n").unwrap();

        assert_eq!(ast[0].root.children[1].kind, NodeKind::Int);
        assert_eq!(ast[0].root.children[1].value, "int_8_bits -1");
        assert_eq!(
            ast[0].root.modifiers,
            vec![
                Modifier::Const {
                    field: "op".to_string(),
                    bits: "0010".to_string(),
                },
                Modifier::Const {
                    field: "imm".to_string(),
                    bits: "11111111".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_int_operand_out_of_range_fails() {
        let registry = registry();
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
        let grammar = grammar(spec, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let result = parser.parse_source("li 300\n");
        assert!(matches!(result, Err(AssemblyError::ParseError { .. })));
    }

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        let registry = registry();
        let grammar = grammar(TWO_FIELD_SPEC, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let ast = parser.parse_source("; comment\n\nnop\n").unwrap();
        assert_eq!(ast.len(), 1);
        assert_eq!(ast[0].line_number, 2);
    }

    #[test]
    fn test_trailing_comment_after_instruction() {
        let registry = registry();
        let grammar = grammar(TWO_FIELD_SPEC, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let ast = parser.parse_source("nop ; does nothing\n").unwrap();
        assert_eq!(ast.len(), 1);
    }

    #[test]
    fn test_residue_after_match_is_rejected() {
        let registry = registry();
        let grammar = grammar(TWO_FIELD_SPEC, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let result = parser.parse_source("nop junk\n");
        match result {
            Err(AssemblyError::ParseError { expected, .. }) => {
                assert_eq!(expected, "<< rest of line should be empty >>");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_diagnostics() {
        let registry = registry();
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
        let grammar = grammar(spec, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let result = parser.parse_source("add r0 r1\n");

        match result {
            Err(AssemblyError::ParseError {
                line,
                parsed,
                expected,
                got,
            }) => {
                assert_eq!(line, 1);
                assert_eq!(parsed, "'add' ' ' %REG% ','");
                assert_eq!(expected, "','");
                assert_eq!(got, " r1");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_default_label_collection_and_attachment() {
        let registry = registry();
        let grammar = grammar(TWO_FIELD_SPEC, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let ast = parser.parse_source("start: nop\nmov r0\n").unwrap();

        assert_eq!(ast.len(), 2);
        assert_eq!(ast[0].labels, vec!["start".to_string()]);
        assert!(ast[1].labels.is_empty());
    }

    #[test]
    fn test_label_only_line_attaches_to_next_instruction() {
        let registry = registry();
        let grammar = grammar(TWO_FIELD_SPEC, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let ast = parser.parse_source("start:\n; comment\nnop\n").unwrap();

        assert_eq!(ast.len(), 1);
        assert_eq!(ast[0].labels, vec!["start".to_string()]);
    }

    #[test]
    fn test_duplicate_label_is_rejected() {
        let registry = registry();
        let grammar = grammar(TWO_FIELD_SPEC, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let result = parser.parse_source("x: nop\nx: nop\n");
        assert!(matches!(
            result,
            Err(AssemblyError::SemanticError { line: 2, .. })
        ));
    }

    #[test]
    fn test_dangling_label_is_rejected() {
        let registry = registry();
        let grammar = grammar(TWO_FIELD_SPEC, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let result = parser.parse_source("nop\nend:\n");
        assert!(matches!(
            result,
            Err(AssemblyError::SemanticError { line: 2, .. })
        ));
    }

    #[test]
    fn test_sigma16_label_collection() {
        let registry = registry();
        let grammar = grammar(TWO_FIELD_SPEC, &registry);
        let parser = AsmParser::new(&grammar, &registry, true);
        let ast = parser.parse_source("loop nop\n     mov r1\n").unwrap();

        assert_eq!(ast.len(), 2);
        assert_eq!(ast[0].labels, vec!["loop".to_string()]);
        assert!(ast[1].labels.is_empty());
    }

    #[test]
    fn test_sigma16_label_only_line() {
        let registry = registry();
        let grammar = grammar(TWO_FIELD_SPEC, &registry);
        let parser = AsmParser::new(&grammar, &registry, true);
        let ast = parser.parse_source("done\n     nop\n").unwrap();

        assert_eq!(ast.len(), 1);
        assert_eq!(ast[0].labels, vec!["done".to_string()]);
    }

    #[test]
    fn test_label_operand_matching() {
        let registry = registry();
        let spec = "\
.BIT_FIELDS
name: op
size: 8
name: imm
size: 32
.ASM_INSTRUCTIONS
INSTRUCTION =
    | nop ::op=10010000
    | jmp label_x86_imm_32_bits ::op=11101001::imm=%label_x86_imm_32_bits%
;
";
        let grammar = grammar(spec, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let ast = parser.parse_source("start: nop\njmp start\n").unwrap();

        let jmp = &ast[1].root;
        assert_eq!(jmp.children[1].kind, NodeKind::Label);
        assert_eq!(jmp.children[1].value, "label_x86_imm_32_bits start");
        // label placeholders survive parsing untouched
        assert_eq!(
            jmp.modifiers[1],
            Modifier::LabelPlaceholder {
                field: "imm".to_string(),
                type_name: "label_x86_imm_32_bits".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_label_operand_fails_to_match() {
        let registry = registry();
        let spec = "\
.BIT_FIELDS
name: op
size: 8
name: imm
size: 32
.ASM_INSTRUCTIONS
INSTRUCTION =
    | jmp label_x86_imm_32_bits ::op=11101001::imm=%label_x86_imm_32_bits%
;
";
        let grammar = grammar(spec, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let result = parser.parse_source("jmp nowhere\n");
        assert!(matches!(result, Err(AssemblyError::ParseError { .. })));
    }

    #[test]
    fn test_recursive_grammar_is_reported() {
        let registry = registry();
        let spec = "\
.BIT_FIELDS
name: op
size: 4
.ASM_INSTRUCTIONS
INSTRUCTION =
    | %INSTRUCTION%
;
";
        let grammar = grammar(spec, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let result = parser.parse_source("nop\n");
        assert!(matches!(
            result,
            Err(AssemblyError::SemanticError { line: 1, .. })
        ));
    }

    #[test]
    fn test_whitespace_atom_accepts_tabs() {
        let registry = registry();
        let grammar = grammar(TWO_FIELD_SPEC, &registry);
        let parser = AsmParser::new(&grammar, &registry, false);
        let ast = parser.parse_source("mov\tr1\n").unwrap();
        assert_eq!(ast.len(), 1);
    }
}
