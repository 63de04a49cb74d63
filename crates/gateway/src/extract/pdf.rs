use pp_domain::error::{Error, Result};

pub fn extract(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::Extraction(format!("could not read the PDF: {e}")))?;
    let text = collapse_blank_lines(&text);
    if text.is_empty() {
        return Err(Error::Extraction(
            "the PDF contains no selectable text (is it a scan?)".into(),
        ));
    }
    Ok(text)
}

/// pdf-extract emits a blank line per layout gap; keep at most one.
fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank = false;
    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            if !blank && !out.is_empty() {
                out.push('\n');
            }
            blank = true;
        } else {
            out.push_str(line);
            out.push('\n');
            blank = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_runs_collapse() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb  \n\n"), "a\n\nb");
    }
}
