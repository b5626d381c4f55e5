//! Chunking strategies: markdown (heading-aware), PDF (page-aware), and plain text.

use veridoc_core::config::ChunkingConfig;
use veridoc_core::document::Chunk;

use super::helpers::{merge_tiny, split_oversized};
use crate::document::DecodedDocument;

/// Chunk a document using a strategy appropriate for its file type.
///
/// Natural boundaries come first (pages, headings, paragraphs); fixed-size
/// slicing is the fallback for units that exceed the bound. Indices are
/// dense and 0-based across the whole document.
pub fn chunk_document(doc: &DecodedDocument, config: &ChunkingConfig) -> Vec<Chunk> {
    match doc.file_type.as_str() {
        "md" | "markdown" => chunk_markdown(doc, config),
        "pdf" => chunk_pdf(doc, config),
        _ => chunk_text(doc, config),
    }
}

// ── Markdown strategy ───────────────────────────────────────────────────────

fn chunk_markdown(doc: &DecodedDocument, config: &ChunkingConfig) -> Vec<Chunk> {
    let full = doc.full_text();
    let mut sections: Vec<(Option<String>, String)> = Vec::new();

    let mut current_heading: Option<String> = None;
    let mut current_text = String::new();

    for line in full.lines() {
        if line.starts_with('#') {
            // Flush previous section.
            let text = current_text.trim().to_string();
            if !text.is_empty() {
                sections.push((current_heading.clone(), text));
            }
            current_heading = Some(line.trim_start_matches('#').trim().to_string());
            current_text = String::new();
        } else {
            if !current_text.is_empty() {
                current_text.push('\n');
            }
            current_text.push_str(line);
        }
    }
    // Flush last section.
    let text = current_text.trim().to_string();
    if !text.is_empty() {
        sections.push((current_heading, text));
    }

    let mut all_chunks = Vec::new();
    let mut char_offset = 0usize;

    for (heading, text) in &sections {
        let pieces = split_oversized(text, config.max_chunk_tokens);
        let pieces = merge_tiny(pieces, config.min_chunk_tokens, config.max_chunk_tokens);
        for frag in pieces {
            let len = frag.len();
            all_chunks.push(Chunk {
                index: 0,
                content: frag,
                page_number: Some(1),
                section_heading: heading.clone(),
                char_offset,
            });
            char_offset += len + 2;
        }
        char_offset += 2; // section gap
    }

    assign_indices(all_chunks)
}

// ── Text strategy ───────────────────────────────────────────────────────────

fn chunk_text(doc: &DecodedDocument, config: &ChunkingConfig) -> Vec<Chunk> {
    let full = doc.full_text();
    let pieces = split_oversized(&full, config.max_chunk_tokens);
    let pieces = merge_tiny(pieces, config.min_chunk_tokens, config.max_chunk_tokens);

    let mut chunks = Vec::new();
    let mut char_offset = 0usize;
    for frag in pieces {
        let len = frag.len();
        chunks.push(Chunk {
            index: 0,
            content: frag,
            page_number: Some(1),
            section_heading: None,
            char_offset,
        });
        char_offset += len + 2;
    }
    assign_indices(chunks)
}

// ── PDF strategy ────────────────────────────────────────────────────────────

fn chunk_pdf(doc: &DecodedDocument, config: &ChunkingConfig) -> Vec<Chunk> {
    let mut all_chunks = Vec::new();
    let mut char_offset = 0usize;

    for page in &doc.pages {
        let pieces = split_oversized(&page.text, config.max_chunk_tokens);
        let pieces = merge_tiny(pieces, config.min_chunk_tokens, config.max_chunk_tokens);

        // Chunks never span page boundaries.
        for frag in pieces {
            let len = frag.len();
            all_chunks.push(Chunk {
                index: 0,
                content: frag,
                page_number: Some(page.page_number),
                section_heading: None,
                char_offset,
            });
            char_offset += len + 2;
        }
        char_offset += 2; // page gap
    }

    assign_indices(all_chunks)
}

/// Assign dense global indices in document order.
fn assign_indices(mut chunks: Vec<Chunk>) -> Vec<Chunk> {
    for (i, c) in chunks.iter_mut().enumerate() {
        c.index = i;
    }
    chunks
}
