// src/extract/pdf.rs — PDF text layer extraction

use lopdf::Document;

/// Concatenate the text of every page that has any, in page order.
pub fn pdf_text(bytes: &[u8]) -> anyhow::Result<String> {
    let doc = Document::load_mem(bytes)?;
    let mut pages = Vec::new();

    for page_number in doc.get_pages().into_keys() {
        match doc.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => pages.push(text.trim().to_string()),
            Ok(_) => tracing::debug!(page = page_number, "Page has no text, skipped"),
            Err(e) => tracing::debug!(page = page_number, "Page text unreadable, skipped: {}", e),
        }
    }

    Ok(pages.join("\n\n"))
}
