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

// Input abstraction for the assembler. It consumes exactly two shapes of
// input: line-oriented text (the architecture spec and the assembly
// listing) and binary templates, which always travel with a sibling
// `<template>.info` side-file describing their code cave. read_template
// resolves the side-file itself so callers never assemble that path.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A template binary together with the contents of its `.info` side-file.
#[derive(Clone)]
pub struct BinTemplate {
    pub image: Vec<u8>,
    pub info: String,
}

pub trait FileReader {
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn read_template(&self, template_path: &Path) -> Result<BinTemplate>;
}

fn info_path_for(template_path: &Path) -> PathBuf {
    let mut info_path = PathBuf::from(template_path);
    let file_name = template_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info_path.set_file_name(format!("{}.info", file_name));
    info_path
}

// production file reader
pub struct DiskFileReader;

impl FileReader for DiskFileReader {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }

    fn read_template(&self, template_path: &Path) -> Result<BinTemplate> {
        let image = fs::read(template_path)
            .with_context(|| format!("Failed to read template {}", template_path.display()))?;

        let info_path = info_path_for(template_path);
        let info = fs::read_to_string(&info_path).with_context(|| {
            format!(
                "Failed to read template info {} (every template needs a .info side-file)",
                info_path.display()
            )
        })?;

        Ok(BinTemplate { image, info })
    }
}

// in-memory file reader for testing; templates are registered together
// with their info text instead of as a second file
#[derive(Default)]
pub struct MockFileReader {
    texts: HashMap<PathBuf, String>,
    templates: HashMap<PathBuf, BinTemplate>,
}

impl MockFileReader {
    pub fn add_file(&mut self, path: &str, content: &str) {
        self.texts
            .insert(PathBuf::from(path), content.to_string());
    }

    pub fn add_template(&mut self, path: &str, image: &[u8], info: &str) {
        self.templates.insert(
            PathBuf::from(path),
            BinTemplate {
                image: image.to_vec(),
                info: info.to_string(),
            },
        );
    }
}

impl FileReader for MockFileReader {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.texts
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Mock file not found: {}", path.display()))
    }

    fn read_template(&self, template_path: &Path) -> Result<BinTemplate> {
        self.templates
            .get(template_path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Mock template not found: {}", template_path.display()))
    }
}

// ------------- unit tests -------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_text_read() {
        let mut reader = MockFileReader::default();
        reader.add_file("arch.spec", ".BIT_FIELDS\n");
        assert_eq!(
            reader.read_to_string(Path::new("arch.spec")).unwrap(),
            ".BIT_FIELDS\n"
        );
        assert!(reader.read_to_string(Path::new("missing.spec")).is_err());
    }

    #[test]
    fn test_mock_template_read() {
        let mut reader = MockFileReader::default();
        reader.add_template("HelloWorld32", &[0x90, 0x90], "0x1\n0x1\n");
        let template = reader.read_template(Path::new("HelloWorld32")).unwrap();
        assert_eq!(template.image, vec![0x90, 0x90]);
        assert_eq!(template.info, "0x1\n0x1\n");
        assert!(reader.read_template(Path::new("missing")).is_err());
    }

    #[test]
    fn test_info_path_sits_next_to_template() {
        let info = info_path_for(Path::new("bin_templates/osx/HelloWorld32"));
        assert_eq!(info, PathBuf::from("bin_templates/osx/HelloWorld32.info"));
    }
}
