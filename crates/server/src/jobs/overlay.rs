//! Overlay rendering.
//!
//! Produces an SVG marking each chunk's strip on its page: red for tampered
//! chunks, green for clean ones. Strips divide each page evenly among the
//! chunks that came from it, mirroring how the document was sliced.

use veridoc_core::document::Chunk;

const PAGE_WIDTH: usize = 850;
const PAGE_HEIGHT: usize = 1100;
const PAGE_GAP: usize = 20;

const CLEAN_FILL: &str = "#00cc44";
const TAMPERED_FILL: &str = "#dd2222";

/// Render the overlay for a chunked document. Deterministic for identical
/// inputs.
pub fn render_overlay(chunks: &[Chunk], tampered: &[usize]) -> String {
    let mut pages: Vec<usize> = chunks.iter().filter_map(|c| c.page_number).collect();
    pages.sort_unstable();
    pages.dedup();
    if pages.is_empty() {
        pages.push(1);
    }

    let total_height = pages.len() * PAGE_HEIGHT + pages.len().saturating_sub(1) * PAGE_GAP;
    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{PAGE_WIDTH}\" height=\"{total_height}\" \
         viewBox=\"0 0 {PAGE_WIDTH} {total_height}\">\n"
    ));

    for (page_slot, page) in pages.iter().enumerate() {
        let page_top = page_slot * (PAGE_HEIGHT + PAGE_GAP);
        svg.push_str(&format!(
            "  <rect x=\"0\" y=\"{page_top}\" width=\"{PAGE_WIDTH}\" height=\"{PAGE_HEIGHT}\" \
             fill=\"#ffffff\" stroke=\"#000000\"/>\n"
        ));

        let page_chunks: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| c.page_number == Some(*page))
            .collect();
        if page_chunks.is_empty() {
            continue;
        }

        let strip_height = PAGE_HEIGHT / page_chunks.len();
        for (slot, chunk) in page_chunks.iter().enumerate() {
            let y = page_top + slot * strip_height;
            let fill = if tampered.contains(&chunk.index) {
                TAMPERED_FILL
            } else {
                CLEAN_FILL
            };
            svg.push_str(&format!(
                "  <rect data-chunk=\"{}\" x=\"0\" y=\"{y}\" width=\"{PAGE_WIDTH}\" \
                 height=\"{strip_height}\" fill=\"{fill}\" fill-opacity=\"0.5\" \
                 stroke=\"#000000\" stroke-opacity=\"0.5\"/>\n",
                chunk.index
            ));
        }
    }

    svg.push_str("</svg>\n");
    svg
}
