//! Format-specific text decoders.
//!
//! Each decoder delegates the actual parsing to its format crate and
//! only shapes the output into prompt-friendly plain text.

use super::DocumentError;
use calamine::{Data, Reader as _, Xlsx};
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use serde_json::Value;
use std::io::{Cursor, Read as _};

fn corrupt(reason: impl ToString) -> DocumentError {
    DocumentError::Corrupt {
        reason: reason.to_string(),
    }
}

/// Extract text from a PDF.
pub(super) fn pdf_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(corrupt)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        // Scanned PDFs carry no text layer
        Ok("[PDF contains no extractable text - may be image-based]".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Extract text from a Word document.
///
/// A DOCX is a zip archive; the body lives in `word/document.xml` with
/// visible text inside `<w:t>` runs. Paragraphs and explicit breaks
/// become newlines, tabs stay tabs.
pub(super) fn docx_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| corrupt("missing word/document.xml"))?
        .read_to_string(&mut xml)
        .map_err(corrupt)?;

    let mut reader = XmlReader::from_str(&xml);
    let mut out = String::new();
    let mut in_run = false;

    loop {
        match reader.read_event().map_err(corrupt)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_run = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"br" => out.push('\n'),
                b"tab" => out.push('\t'),
                _ => {}
            },
            Event::Text(t) if in_run => out.push_str(&t.unescape().map_err(corrupt)?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out.trim().to_string())
}

/// Extract text from an Excel workbook: one header line per sheet,
/// rows rendered as ` | `-joined cells.
pub(super) fn xlsx_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let mut workbook = Xlsx::new(Cursor::new(bytes.to_vec())).map_err(corrupt)?;

    let mut sections = Vec::new();
    for (sheet_name, range) in workbook.worksheets() {
        let mut lines = vec![format!("--- Sheet: {sheet_name} ---")];
        for row in range.rows() {
            let cells: Vec<String> = row
                .iter()
                .filter(|cell| !matches!(cell, &&Data::Empty))
                .map(ToString::to_string)
                .collect();
            if !cells.is_empty() {
                lines.push(cells.join(" | "));
            }
        }
        sections.push(lines.join("\n"));
    }

    Ok(sections.join("\n\n"))
}

/// Extract text from a CSV file as `Row N: header: value | …` lines.
pub(super) fn csv_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
    let headers = rdr.headers().map_err(corrupt)?.clone();

    let mut lines = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record.map_err(corrupt)?;
        let fields: Vec<String> = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(header, value)| format!("{header}: {value}"))
            .collect();
        if !fields.is_empty() {
            lines.push(format!("Row {}: {}", idx + 1, fields.join(" | ")));
        }
    }

    Ok(lines.join("\n"))
}

/// Extract text from a JSON document by flattening scalar leaves to
/// `key: value` lines.
pub(super) fn json_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let data: Value = serde_json::from_slice(bytes).map_err(corrupt)?;
    let mut lines = Vec::new();
    flatten_json(&data, &mut lines);
    Ok(lines.join("\n"))
}

fn flatten_json(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match child {
                    Value::String(s) => out.push(format!("{key}: {s}")),
                    Value::Number(n) => out.push(format!("{key}: {n}")),
                    Value::Bool(b) => out.push(format!("{key}: {b}")),
                    Value::Null => {}
                    _ => flatten_json(child, out),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten_json(item, out);
            }
        }
        _ => {}
    }
}

/// Decode plain text or Markdown, replacing invalid UTF-8.
pub(super) fn plain_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
