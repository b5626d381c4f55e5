use super::{DecodeError, PageContent};

pub fn extract_md(bytes: &[u8]) -> Result<Vec<PageContent>, DecodeError> {
    let text = String::from_utf8(bytes.to_vec())
        .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned());

    Ok(vec![PageContent {
        page_number: 1,
        text: text.trim().to_string(),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_full_content() {
        let content = b"# Hello\n\nParagraph one.\n\n## World\n\nParagraph two.";
        let pages = extract_md(content).unwrap();
        assert!(pages[0].text.contains("Paragraph one."));
        assert!(pages[0].text.contains("Paragraph two."));
    }
}
