//! Word (.docx) text extraction: the text runs of `word/document.xml`.

use std::io::{Cursor, Read};

use pp_domain::error::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

pub fn extract(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::Extraction(format!("could not open the Word document: {e}")))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| Error::Extraction(format!("not a Word document: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| Error::Extraction(format!("could not read the Word document: {e}")))?;

    let text = document_text(&xml)?;
    if text.is_empty() {
        return Err(Error::Extraction("the Word document is empty".into()));
    }
    Ok(text)
}

/// Concatenate `<w:t>` runs; paragraphs end a line, `<w:tab/>` and
/// `<w:br/>` become whitespace.
fn document_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::Extraction(format!("malformed Word XML: {e}")))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Extraction(format!(
                    "malformed Word XML at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(out.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Summer Gala brief</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">Budget: </w:t></w:r><w:r><w:t>$25,000 &amp; catering</w:t></w:r></w:p>
    <w:p><w:r><w:t>Venue</w:t><w:tab/><w:t>Riverside Hall</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn paragraphs_become_lines() {
        let text = document_text(BODY).unwrap();
        assert_eq!(
            text,
            "Summer Gala brief\nBudget: $25,000 & catering\nVenue\tRiverside Hall"
        );
    }

    #[test]
    fn extracts_from_a_zipped_document() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(BODY.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        let text = extract(&buf).unwrap();
        assert!(text.starts_with("Summer Gala brief"));
    }

    #[test]
    fn non_zip_input_is_an_extraction_error() {
        assert!(matches!(extract(b"plain text"), Err(Error::Extraction(_))));
    }
}
