use crate::error::IngestError;
use crate::models::SourceType;
use lopdf::Document as PdfDocument;
use regex::Regex;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub content: String,
    pub source_type: SourceType,
    /// Pages for PDFs, paragraphs for DOCX, lines for TXT.
    pub units: usize,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            PdfDocument::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

pub fn extract_page_texts(path: &Path) -> Result<Vec<PageText>, IngestError> {
    LopdfExtractor.extract_pages(path)
}

/// Extracts plain text, dispatching on the file extension.
pub fn extract_text(path: &Path) -> Result<ExtractedText, IngestError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let source_type = SourceType::from_extension(extension)
        .ok_or_else(|| IngestError::UnsupportedFileType(format!(".{}", extension.to_lowercase())))?;

    let extracted = match source_type {
        SourceType::Pdf => extract_pdf(path),
        SourceType::Docx => extract_docx(path),
        SourceType::Txt => extract_txt(path),
    };

    extracted.map_err(|error| IngestError::Extraction {
        path: path.display().to_string(),
        details: error.to_string(),
    })
}

fn extract_pdf(path: &Path) -> Result<ExtractedText, IngestError> {
    let pages = extract_page_texts(path)?;
    let mut content = String::new();
    for page in &pages {
        content.push_str(&page.text);
        content.push('\n');
    }
    Ok(ExtractedText {
        content,
        source_type: SourceType::Pdf,
        units: pages.len(),
    })
}

fn extract_docx(path: &Path) -> Result<ExtractedText, IngestError> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")?
        .read_to_string(&mut xml)?;

    let paragraphs = docx_paragraphs(&xml)?;
    let mut content = String::new();
    for paragraph in &paragraphs {
        content.push_str(paragraph);
        content.push('\n');
    }
    Ok(ExtractedText {
        content,
        source_type: SourceType::Docx,
        units: paragraphs.len(),
    })
}

/// One string per `<w:p>` element, concatenating its `<w:t>` runs.
/// `<w:tab/>` becomes a tab, `<w:br/>` and `<w:cr/>` a newline.
fn docx_paragraphs(xml: &str) -> Result<Vec<String>, IngestError> {
    let paragraph_re = Regex::new(r"(?s)<w:p[ >].*?</w:p>|<w:p/>")?;
    let run_re = Regex::new(
        r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab\s*/>|<w:(?:br|cr)(?:\s[^>]*)?/>",
    )?;

    if !xml.contains("<w:body") {
        return Err(IngestError::DocxParse(
            "word/document.xml has no document body".to_string(),
        ));
    }

    Ok(paragraph_re
        .find_iter(xml)
        .map(|paragraph| {
            run_re
                .captures_iter(paragraph.as_str())
                .map(|capture| match capture.get(1) {
                    Some(run) => unescape_xml(run.as_str()),
                    None if capture[0].starts_with("<w:tab") => "\t".to_string(),
                    None => "\n".to_string(),
                })
                .collect::<String>()
        })
        .collect())
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn extract_txt(path: &Path) -> Result<ExtractedText, IngestError> {
    let content = fs::read_to_string(path)?;
    let units = content.lines().count();
    Ok(ExtractedText {
        content,
        source_type: SourceType::Txt,
        units,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn write_docx(path: &Path, body: &str) -> Result<(), Box<dyn std::error::Error>> {
        let mut writer = zip::ZipWriter::new(File::create(path)?);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file("word/document.xml", options)?;
        writer.write_all(
            format!(
                r#"<?xml version="1.0"?><w:document xmlns:w="x"><w:body>{body}</w:body></w:document>"#
            )
            .as_bytes(),
        )?;
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn txt_is_read_verbatim() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("notes.txt");
        fs::write(&path, "line one\nline two\n")?;

        let extracted = extract_text(&path)?;
        assert_eq!(extracted.content, "line one\nline two\n");
        assert_eq!(extracted.source_type, SourceType::Txt);
        assert_eq!(extracted.units, 2);
        Ok(())
    }

    #[test]
    fn docx_paragraphs_become_lines() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("lecture.docx");
        write_docx(
            &path,
            r#"<w:p><w:r><w:t>Big O</w:t></w:r><w:r><w:t xml:space="preserve"> &amp; growth</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t></w:r></w:p>"#,
        )?;

        let extracted = extract_text(&path)?;
        assert_eq!(extracted.content, "Big O & growth\nSecond\n");
        assert_eq!(extracted.source_type, SourceType::Docx);
        assert_eq!(extracted.units, 2);
        Ok(())
    }

    #[test]
    fn tabs_and_breaks_separate_words() -> Result<(), Box<dyn std::error::Error>> {
        let paragraphs = docx_paragraphs(
            "<w:body><w:p><w:pPr><w:tabs><w:tab w:val=\"left\" w:pos=\"720\"/></w:tabs></w:pPr>\
             <w:r><w:t>alpha</w:t><w:tab/><w:t>beta</w:t><w:br/><w:t>gamma</w:t>\
             <w:br w:type=\"page\"/><w:t>delta</w:t><w:cr/><w:t>epsilon</w:t></w:r></w:p></w:body>",
        )?;

        assert_eq!(paragraphs, vec!["alpha\tbeta\ngamma\ndelta\nepsilon"]);
        assert_eq!(
            paragraphs[0].split_whitespace().collect::<Vec<_>>(),
            vec!["alpha", "beta", "gamma", "delta", "epsilon"]
        );
        Ok(())
    }

    #[test]
    fn pptx_is_unsupported() {
        let result = extract_text(Path::new("slides.pptx"));
        assert!(matches!(result, Err(IngestError::UnsupportedFileType(ext)) if ext == ".pptx"));
    }

    #[test]
    fn invalid_utf8_text_is_an_extraction_failure() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("binary.txt");
        fs::write(&path, [0xffu8, 0xfe, 0x00])?;
        assert!(matches!(
            extract_text(&path),
            Err(IngestError::Extraction { .. })
        ));
        Ok(())
    }

    #[test]
    fn legacy_doc_fails_as_extraction_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("old.doc");
        fs::write(&path, b"\xd0\xcf\x11\xe0 not a zip container")?;
        assert!(matches!(
            extract_text(&path),
            Err(IngestError::Extraction { .. })
        ));
        Ok(())
    }

    #[test]
    fn broken_pdf_is_an_extraction_failure() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;
        assert!(matches!(
            extract_text(&path),
            Err(IngestError::Extraction { .. })
        ));
        Ok(())
    }
}
