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

// Debug views of the annotated tree: an indented text listing with the
// bitfield modifiers aligned in a common column, and a JSON dump.

use crate::adl::Modifier;
use crate::parser::{AssemblyLine, NodeKind, TreeNode};

const INDENT_STEP: usize = 4;

/// Render the whole listing. A first pass measures the longest node row so
/// every modifier column lines up; the second pass renders.
pub fn pretty_print_ast(ast: &[AssemblyLine]) -> String {
    let measure = render(ast, 0);
    let longest = measure.lines().map(|l| l.len()).max().unwrap_or(0);
    let column = longest + (4 - (longest % 4)) + 4;
    render(ast, column)
}

/// The annotated tree as pretty-printed JSON.
pub fn ast_to_json(ast: &[AssemblyLine]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(ast)
}

fn render(ast: &[AssemblyLine], column: usize) -> String {
    let mut buffer: Vec<String> = Vec::new();
    for line in ast {
        if !line.source.is_empty() {
            buffer.push(line.source.clone());
        }
        render_node(&line.root, 0, column, &mut buffer);
        buffer.push(String::new());
    }
    buffer.join("\n")
}

fn render_node(node: &TreeNode, indentation: usize, column: usize, buffer: &mut Vec<String>) {
    let mut row = " ".repeat(indentation);
    match node.kind {
        NodeKind::Raw | NodeKind::Int | NodeKind::Label => {
            row.push('\'');
            row.push_str(&node.value);
            row.push('\'');
        }
        NodeKind::Group => {
            row.push_str(&node.value);
        }
    }

    if !node.modifiers.is_empty() {
        let pad = if row.len() < column {
            column - row.len()
        } else {
            4
        };
        row.push_str(&" ".repeat(pad));
        row.push_str(&render_modifiers(&node.modifiers));
    }
    buffer.push(row.trim_end().to_string());

    for child in &node.children {
        render_node(child, indentation + INDENT_STEP, column, buffer);
    }
}

fn render_modifiers(modifiers: &[Modifier]) -> String {
    let mut out = String::new();
    for modifier in modifiers {
        out.push_str(":: ");
        match modifier {
            Modifier::Const { field, bits } => {
                out.push_str(field);
                out.push('=');
                out.push_str(bits);
            }
            Modifier::IntPlaceholder { field, type_name }
            | Modifier::LabelPlaceholder { field, type_name } => {
                out.push_str(field);
                out.push_str("=%");
                out.push_str(type_name);
                out.push('%');
            }
        }
        out.push(' ');
    }
    out
}

// ------------- unit tests -------------
