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

use crate::adl::Modifier;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum NodeKind {
    /// An exactly-matched literal token.
    Raw,
    /// A matched integer operand; the value is "<type_name> <text>".
    Int,
    /// A matched label reference; the value is "<type_name> <name>".
    Label,
    /// A matched instruction definition; the value is the definition name
    /// and the children are the nodes its winning alternative produced.
    Group,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub value: String,
    pub children: Vec<TreeNode>,
    pub modifiers: Vec<Modifier>,
}

impl TreeNode {
    pub fn leaf(kind: NodeKind, value: String) -> Self {
        Self {
            kind,
            value,
            children: Vec::new(),
            modifiers: Vec::new(),
        }
    }

    pub fn group(value: String, children: Vec<TreeNode>, modifiers: Vec<Modifier>) -> Self {
        Self {
            kind: NodeKind::Group,
            value,
            children,
            modifiers,
        }
    }
}

/// One assembled source line: the matched tree plus the line-level state
/// (labels, source text, and the address assigned by the first encoder
/// pass).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssemblyLine {
    /// 0-based index into the source file.
    pub line_number: usize,
    pub source: String,
    pub labels: Vec<String>,
    pub root: TreeNode,
    pub address: Option<u64>,
}
