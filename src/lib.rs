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

pub mod adl;
pub mod encoder;
pub mod errors;
pub mod file_reader;
pub mod operands;
pub mod output;
pub mod parser;
pub mod printer;
pub mod scan;

use std::path::Path;

use anyhow::{Context, Result};
use encoder::BitstreamGenerator;
use file_reader::FileReader;
use operands::OperandRegistry;
use parser::AsmParser;

extern crate pest;
extern crate pest_derive;

/// Assemble a source file against an architecture description using the
/// builtin operand type sets.
pub fn assemble<F: FileReader>(
    spec_path: &Path,
    asm_path: &Path,
    imagebase: u64,
    sigma16_labels: bool,
    reader: &F,
) -> Result<Vec<u8>> {
    let registry =
        OperandRegistry::with_builtin_types().context("Failed to load operand types")?;
    assemble_with_types(spec_path, asm_path, imagebase, sigma16_labels, &registry, reader)
}

/// Assemble with a caller-provided operand type registry. This is the
/// entry point for embedders that register their own `int_*`/`label_*`
/// types.
pub fn assemble_with_types<F: FileReader>(
    spec_path: &Path,
    asm_path: &Path,
    imagebase: u64,
    sigma16_labels: bool,
    registry: &OperandRegistry,
    reader: &F,
) -> Result<Vec<u8>> {
    let spec_text = reader
        .read_to_string(spec_path)
        .with_context(|| format!("Failed to read spec file: {}", spec_path.display()))?;
    let grammar = adl::parser::parse_spec(&spec_text, registry)
        .context("Failed during spec parsing stage")?;

    let asm_text = reader
        .read_to_string(asm_path)
        .with_context(|| format!("Failed to read asm file: {}", asm_path.display()))?;
    let asm_parser = AsmParser::new(&grammar, registry, sigma16_labels);
    let mut ast = asm_parser
        .parse_source(&asm_text)
        .context("Failed during asm parsing stage")?;

    let generator = BitstreamGenerator::new(&grammar, registry, imagebase);
    let machine_code = generator
        .generate(&mut ast)
        .context("Failed during bitstream generation stage")?;

    Ok(machine_code)
}
