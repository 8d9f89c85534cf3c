//! Per-file-type text extraction for uploaded documents.
//!
//! [`load`] dispatches on the file extension (pdf, docx, pptx, xlsx,
//! markdown, else plain text) and returns one or more plain-text
//! [`Segment`]s with their provenance (body, slide N, sheet N).
//!
//! Extraction failures never abort an upload: a corrupt or unreadable
//! file degrades to a single placeholder segment naming the failure, so
//! the document still produces a retrievable record.

use std::io::Read;

use tracing::warn;

/// Maximum worksheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per worksheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb bound).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// A plain-text piece of a document plus where in the file it came from.
#[derive(Debug, Clone)]
pub struct Segment {
    pub text: String,
    /// Provenance within the file: `"body"`, `"slide 3"`, `"sheet 2"`.
    pub origin: String,
}

impl Segment {
    fn body(text: String) -> Self {
        Self {
            text,
            origin: "body".to_string(),
        }
    }
}

/// Extraction failure, absorbed at the [`load`] boundary.
#[derive(Debug)]
pub enum ExtractError {
    Pdf(String),
    Ooxml(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Ooxml(e) => write!(f, "OOXML extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract text segments from a file's raw bytes, dispatching on the
/// lowercased extension of `file_name`.
///
/// Never fails: on extraction error the result is a single placeholder
/// segment naming the file, and the error is logged.
pub fn load(file_name: &str, bytes: &[u8]) -> Vec<Segment> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();

    let result = match ext.as_str() {
        "pdf" => extract_pdf(bytes),
        "docx" => extract_docx(bytes),
        "pptx" => extract_pptx(bytes),
        "xlsx" => extract_xlsx(bytes),
        // markdown and anything else: treat as plain text
        _ => Ok(vec![Segment::body(
            String::from_utf8_lossy(bytes).into_owned(),
        )]),
    };

    match result {
        Ok(segments) if !segments.is_empty() => segments,
        Ok(_) => vec![Segment::body(String::new())],
        Err(e) => {
            warn!(file_name, error = %e, "extraction failed, storing placeholder");
            vec![Segment::body(format!(
                "[could not extract text from {}]",
                file_name
            ))]
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<Vec<Segment>, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(vec![Segment::body(text)])
}

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_entry_bounded(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit",
            name
        )));
    }
    Ok(out)
}

/// Sort OOXML part names (`<prefix><n>.xml`) by their numeric suffix.
fn numbered_parts(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Collect the text content of every `<t>` element (`w:t` in docx,
/// `a:t` in pptx share the local name).
fn collect_t_elements(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) if e.local_name().as_ref() == b"t" => {
                if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf) {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<Vec<Segment>, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry_bounded(&mut archive, "word/document.xml")?;
    Ok(vec![Segment::body(collect_t_elements(&xml)?)])
}

fn extract_pptx(bytes: &[u8]) -> Result<Vec<Segment>, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let slides = numbered_parts(&archive, "ppt/slides/slide");
    let mut segments = Vec::with_capacity(slides.len());
    for (i, name) in slides.iter().enumerate() {
        let xml = read_entry_bounded(&mut archive, name)?;
        segments.push(Segment {
            text: collect_t_elements(&xml)?,
            origin: format!("slide {}", i + 1),
        });
    }
    Ok(segments)
}

fn extract_xlsx(bytes: &[u8]) -> Result<Vec<Segment>, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared = read_shared_strings(&mut archive)?;
    let sheets = numbered_parts(&archive, "xl/worksheets/sheet");
    let mut segments = Vec::new();
    for (i, name) in sheets.iter().take(XLSX_MAX_SHEETS).enumerate() {
        let xml = read_entry_bounded(&mut archive, name)?;
        segments.push(Segment {
            text: collect_sheet_cells(&xml, &shared)?,
            origin: format!("sheet {}", i + 1),
        });
    }
    Ok(segments)
}

fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, ExtractError> {
    let xml = read_entry_bounded(archive, "xl/sharedStrings.xml")?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_si = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"si" {
                    in_si = true;
                } else if in_si && e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        strings.push(te.unescape().unwrap_or_default().into_owned());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"si" {
                    in_si = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn collect_sheet_cells(xml: &[u8], shared: &[String]) -> Result<String, ExtractError> {
    let mut cells: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_value = false;
    let mut cell_is_shared = false;
    loop {
        if cells.len() >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"c" {
                    cell_is_shared = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                } else if e.local_name().as_ref() == b"v" {
                    in_value = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_value => {
                let raw = te.unescape().unwrap_or_default();
                let v = raw.trim();
                if !v.is_empty() {
                    if cell_is_shared {
                        if let Some(s) = v.parse::<usize>().ok().and_then(|i| shared.get(i)) {
                            cells.push(s.clone());
                        }
                    } else {
                        cells.push(v.to_string());
                    }
                }
                in_value = false;
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"v" {
                    in_value = false;
                } else if e.local_name().as_ref() == b"c" {
                    cell_is_shared = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(cells.join(" "))
}
