use super::ExtractError;

/// Returns the text of every page, one page per line block, and the page count.
///
/// Pages whose text cannot be decoded (unsupported font encodings) are
/// skipped rather than failing the whole document.
pub fn extract_pdf(bytes: &[u8]) -> Result<(String, u32), ExtractError> {
    let _span = tracing::info_span!("extractor.pdf").entered();

    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| ExtractError::Pdf(format!("Failed to load PDF: {}", e)))?;

    let page_numbers: Vec<u32> = doc.get_pages().into_keys().collect();
    let mut blocks = Vec::with_capacity(page_numbers.len());

    for &page in &page_numbers {
        match doc.extract_text(&[page]) {
            Ok(page_text) => blocks.push(page_text),
            Err(e) => tracing::debug!(page, error = %e, "Could not extract page text"),
        }
    }

    let unreadable = page_numbers.len() - blocks.len();
    if unreadable > 0 {
        tracing::warn!(
            unreadable,
            pages = page_numbers.len(),
            "Some PDF pages had no extractable text"
        );
    }

    let mut text = blocks.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    Ok((text, page_numbers.len() as u32))
}
