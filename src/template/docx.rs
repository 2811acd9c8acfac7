//! DOCX package rendering.
//!
//! Only `.xml` parts are rewritten; media, relationships stored as other extensions and
//! anything else is copied raw so its compressed bytes and metadata are untouched.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use super::placeholder::render_xml_part;
use super::Replacements;
use crate::error::PipelineError;

fn is_xml_part(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".xml")
}

/// Render `template` (the bytes of a `.docx`) with `replacements`.
pub fn render_docx(template: &[u8], replacements: &Replacements) -> Result<Vec<u8>, PipelineError> {
    let mut archive = ZipArchive::new(Cursor::new(template))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(template.len())));

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() || !is_xml_part(entry.name()) {
            writer.raw_copy_file(entry)?;
            continue;
        }

        let name = entry.name().to_string();
        let mut options = FileOptions::default()
            .compression_method(entry.compression())
            .last_modified_time(entry.last_modified());
        if let Some(mode) = entry.unix_mode() {
            options = options.unix_permissions(mode);
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;

        let rendered = match String::from_utf8(data) {
            Ok(text) => {
                let output = render_xml_part(&text, replacements);
                if output != text {
                    ensure_well_formed(&name, &output)?;
                }
                output.into_bytes()
            }
            Err(e) => {
                log::warn!("template part {} is not UTF-8, copying unchanged", name);
                e.into_bytes()
            }
        };

        writer.start_file(name, options)?;
        writer.write_all(&rendered)?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// Read the template at `template_path`, render it and write the result to `output_path`.
pub fn render_docx_file(
    template_path: &Path,
    output_path: &Path,
    replacements: &Replacements,
) -> Result<(), PipelineError> {
    let template = match fs::read(template_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::not_found(format!(
                "template file not found: {}",
                template_path.display()
            )))
        }
        Err(e) => return Err(e.into()),
    };

    let rendered = render_docx(&template, replacements)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(output_path, rendered)?;
    Ok(())
}

fn ensure_well_formed(name: &str, xml: &str) -> Result<(), PipelineError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => return Ok(()),
            Ok(_) => {}
            Err(e) => {
                return Err(PipelineError::Template(format!(
                    "{} is malformed after substitution at position {}: {}",
                    name,
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }
}
