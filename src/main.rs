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

use adasm::adl;
use adasm::encoder::BitstreamGenerator;
use adasm::file_reader::{DiskFileReader, FileReader};
use adasm::operands::OperandRegistry;
use adasm::output::ObjectWriter;
use adasm::parser::AsmParser;
use adasm::printer;
use anyhow::{Context, Result, bail};
use clap::Parser as clap_parser;
use std::fs;
use std::path::PathBuf;

#[derive(clap_parser)]
#[clap(version = "0.1.0", author = "Connor Nolan")]
struct Opts {
    /// Spec file of the architecture being assembled
    #[clap(short, long)]
    spec_file: PathBuf,
    /// Assembly source code file to be assembled
    #[clap(short, long)]
    asm_file: PathBuf,
    /// Memory address the generated code will be loaded at (decimal or 0x hex)
    #[clap(long, value_parser = parse_address, default_value = "0x1000")]
    imagebase: u64,
    /// Parse labels as Sigma16 labels
    #[clap(long)]
    sigma16_labels: bool,
    /// Print the annotated tree of the parsed assembly code
    #[clap(long)]
    print_ast: bool,
    /// Print debug info about the generated bitstream
    #[clap(long)]
    print_bitstream: bool,
    /// Write the annotated tree as JSON to a file
    #[clap(long)]
    dump_ast: Option<PathBuf>,
    /// Write the raw bytes of the assembled machine code to a file
    #[clap(long)]
    write_bin: Option<PathBuf>,
    /// Write the assembled code as Sigma16 data statements to a file
    #[clap(long)]
    write_sigma16: Option<PathBuf>,
    /// Insert the assembled code into a template binary and write the result
    #[clap(long)]
    write_object: Option<PathBuf>,
    /// Template binary used by --write-object (needs a <template>.info file)
    #[clap(long)]
    template_path: Option<PathBuf>,
}

fn parse_address(text: &str) -> Result<u64, String> {
    let parsed = if let Some(hex) = text.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else {
        text.parse::<u64>()
    };
    parsed.map_err(|_| format!("'{}' is not a valid address", text))
}

fn main() -> Result<()> {
    let opts: Opts = Opts::parse();

    if opts.write_object.is_some() && opts.template_path.is_none() {
        bail!("If --write-object is set, --template-path must also be set");
    }

    let reader = DiskFileReader;

    let registry = OperandRegistry::with_builtin_types().context("Failed to load operand types")?;

    let spec_text = reader
        .read_to_string(&opts.spec_file)
        .with_context(|| format!("Failed to read spec file: {}", opts.spec_file.display()))?;
    let grammar = adl::parser::parse_spec(&spec_text, &registry)
        .context("Failed during spec parsing stage")?;
    println!("Read asm grammar spec ok");

    let asm_text = reader
        .read_to_string(&opts.asm_file)
        .with_context(|| format!("Failed to read asm file: {}", opts.asm_file.display()))?;
    let asm_parser = AsmParser::new(&grammar, &registry, opts.sigma16_labels);
    let mut ast = asm_parser
        .parse_source(&asm_text)
        .context("Failed during asm parsing stage")?;
    println!("Parsed asm listing ok");

    if opts.print_ast {
        println!("\n{}", printer::pretty_print_ast(&ast));
    }

    if let Some(dump_path) = &opts.dump_ast {
        let json = printer::ast_to_json(&ast).context("Failed to serialize the tree")?;
        fs::write(dump_path, json)
            .with_context(|| format!("Failed to write tree dump to {}", dump_path.display()))?;
    }

    let generator = BitstreamGenerator::new(&grammar, &registry, opts.imagebase);

    if opts.print_bitstream {
        let listing = generator
            .debug_bitstream(&mut ast)
            .context("Failed during bitstream generation stage")?;
        println!("\n{}", listing);
    }

    let machine_code = generator
        .generate(&mut ast)
        .context("Failed during bitstream generation stage")?;

    let writer = ObjectWriter::new(&machine_code);

    // when no output is requested, the raw bytes go to default.out
    let default_bin: Option<PathBuf> = if opts.write_bin.is_none()
        && opts.write_sigma16.is_none()
        && opts.write_object.is_none()
    {
        Some(PathBuf::from("default.out"))
    } else {
        None
    };

    if let Some(bin_path) = opts.write_bin.as_ref().or(default_bin.as_ref()) {
        writer.write_bin(bin_path)?;
        println!(
            "Successfully assembled {} to {}",
            opts.asm_file.display(),
            bin_path.display()
        );
    }
    if let Some(sigma16_path) = &opts.write_sigma16 {
        writer.write_sigma16_data(sigma16_path)?;
        println!(
            "Successfully assembled {} to {}",
            opts.asm_file.display(),
            sigma16_path.display()
        );
    }
    if let (Some(object_path), Some(template_path)) = (&opts.write_object, &opts.template_path) {
        writer.write_object(template_path, object_path, &reader)?;
        println!(
            "Successfully assembled {} to {}",
            opts.asm_file.display(),
            object_path.display()
        );
    }

    Ok(())
}
