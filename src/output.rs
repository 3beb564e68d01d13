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

// Output formats for the assembled byte stream: a raw binary file, a
// Sigma16 `data` text listing, or injection into a template binary. A
// template has a sibling `<template>.info` file whose two lines give the
// injection offset and the maximum code size.

use crate::errors::AssemblyError;
use crate::file_reader::FileReader;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub struct ObjectWriter<'a> {
    raw_bytes: &'a [u8],
}

impl<'a> ObjectWriter<'a> {
    pub fn new(raw_bytes: &'a [u8]) -> Self {
        Self { raw_bytes }
    }

    pub fn write_bin(&self, output_path: &Path) -> Result<()> {
        fs::write(output_path, self.raw_bytes)
            .with_context(|| format!("Failed to write binary to {}", output_path.display()))
    }

    pub fn write_sigma16_data(&self, output_path: &Path) -> Result<()> {
        let text = self.to_sigma16_data()?;
        fs::write(output_path, text)
            .with_context(|| format!("Failed to write Sigma16 data to {}", output_path.display()))
    }

    /// Render the byte stream as Sigma16 `data` statements, one 16-bit
    /// big-endian word per line.
    pub fn to_sigma16_data(&self) -> Result<String, AssemblyError> {
        if self.raw_bytes.len() % 2 != 0 {
            return Err(AssemblyError::OutputError {
                reason: format!(
                    "Sigma16 has 16 bit words, so the buffer length should be divisible by 2; instead it has a length of {}",
                    self.raw_bytes.len()
                ),
            });
        }

        let mut text = String::new();
        for word in self.raw_bytes.chunks(2) {
            let _ = writeln!(text, "    data ${:02x}{:02x}", word[0], word[1]);
        }

        Ok(text)
    }

    pub fn write_object<F: FileReader>(
        &self,
        template_path: &Path,
        output_path: &Path,
        reader: &F,
    ) -> Result<()> {
        let template = reader.read_template(template_path)?;
        let patched = self.patch_template(&template.image, &template.info)?;
        fs::write(output_path, patched)
            .with_context(|| format!("Failed to write object to {}", output_path.display()))
    }

    /// Overwrite the template's code cave with the assembled bytes. The
    /// result is always exactly as long as the template.
    pub fn patch_template(
        &self,
        template: &[u8],
        info: &str,
    ) -> Result<Vec<u8>, AssemblyError> {
        let (offset, max_size) = parse_template_info(info)?;

        if self.raw_bytes.len() > max_size {
            return Err(AssemblyError::OutputError {
                reason: format!(
                    "size of assembled code ({}) is larger than the available space ({}) in the binary template",
                    self.raw_bytes.len(),
                    max_size
                ),
            });
        }

        let mut patched = Vec::with_capacity(template.len());
        for (position, byte) in template.iter().enumerate() {
            if position >= offset && position < offset + self.raw_bytes.len() {
                patched.push(self.raw_bytes[position - offset]);
            } else {
                patched.push(*byte);
            }
        }

        Ok(patched)
    }
}

/// The first info line is the injection offset, the second the code cave
/// size; both decimal or `0x` hex.
fn parse_template_info(info: &str) -> Result<(usize, usize), AssemblyError> {
    let lines: Vec<&str> = info.lines().map(|l| l.trim()).collect();
    if lines.len() != 2 {
        return Err(AssemblyError::OutputError {
            reason: format!(
                "template info file should have exactly two lines (offset and maximum size), found {}",
                lines.len()
            ),
        });
    }

    let offset = parse_info_int(lines[0])?;
    let size = parse_info_int(lines[1])?;
    Ok((offset, size))
}

fn parse_info_int(text: &str) -> Result<usize, AssemblyError> {
    let parsed = if let Some(hex) = text.strip_prefix("0x") {
        usize::from_str_radix(hex, 16)
    } else {
        text.parse::<usize>()
    };

    parsed.map_err(|_| AssemblyError::OutputError {
        reason: format!("unable to parse int '{}' in template info file", text),
    })
}

// ------------- unit tests -------------
