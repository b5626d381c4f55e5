//! Text splitting and merging utilities used by chunking strategies.

/// Approximate token count via whitespace splitting.
pub(crate) fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split `text` at sentence boundaries (`. `, `! `, `? ` followed by uppercase
/// or newline). Returns non-empty fragments.
pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    let mut i = 0;
    while i < bytes.len() {
        let is_terminal = bytes[i] == b'.' || bytes[i] == b'!' || bytes[i] == b'?';
        if is_terminal {
            // Look ahead: must be followed by a space then uppercase or newline.
            if i + 1 < bytes.len() && bytes[i + 1] == b' ' {
                let after_space = if i + 2 < bytes.len() {
                    bytes[i + 2]
                } else {
                    b'\n' // end-of-string acts like newline
                };
                if after_space.is_ascii_uppercase() || after_space == b'\n' {
                    let end = i + 1; // include the terminal punctuation
                    let s = text[start..end].trim();
                    if !s.is_empty() {
                        sentences.push(s.to_string());
                    }
                    start = end + 1; // skip the space
                    i = start;
                    continue;
                }
            }
        }
        i += 1;
    }

    // Remainder
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Split text that exceeds `max_tokens` first by `\n\n`, then by sentence,
/// finally by fixed word windows. Every returned piece fits the bound.
pub(crate) fn split_oversized(text: &str, max_tokens: usize) -> Vec<String> {
    let mut pieces = Vec::new();

    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        if count_tokens(para) <= max_tokens {
            pieces.push(para.to_string());
        } else {
            // Try sentence-level splitting.
            let sentences = split_sentences(para);
            let mut buf = String::new();
            for sent in sentences {
                if buf.is_empty() {
                    buf = sent;
                } else if count_tokens(&buf) + count_tokens(&sent) + 1 <= max_tokens {
                    buf.push(' ');
                    buf.push_str(&sent);
                } else {
                    flush_bounded(&mut pieces, std::mem::take(&mut buf), max_tokens);
                    buf = sent;
                }
            }
            if !buf.is_empty() {
                flush_bounded(&mut pieces, buf, max_tokens);
            }
        }
    }
    pieces
}

/// Push `piece`, slicing it into word windows when no sentence boundary kept
/// it under the bound.
fn flush_bounded(pieces: &mut Vec<String>, piece: String, max_tokens: usize) {
    if count_tokens(&piece) <= max_tokens {
        pieces.push(piece);
        return;
    }
    let words: Vec<&str> = piece.split_whitespace().collect();
    for window in words.chunks(max_tokens) {
        pieces.push(window.join(" "));
    }
}

/// Merge adjacent fragments smaller than `min_tokens` into their neighbour,
/// but never past `max_tokens`: the size bound always wins over the merge.
pub(crate) fn merge_tiny(fragments: Vec<String>, min_tokens: usize, max_tokens: usize) -> Vec<String> {
    if fragments.is_empty() {
        return fragments;
    }
    let mut merged: Vec<String> = Vec::with_capacity(fragments.len());
    for frag in fragments {
        if let Some(last) = merged.last_mut() {
            if count_tokens(last) < min_tokens
                && count_tokens(last) + count_tokens(&frag) <= max_tokens
            {
                last.push('\n');
                last.push_str(&frag);
                continue;
            }
        }
        merged.push(frag);
    }
    // Final pass: if the last element is tiny, merge it backwards.
    if merged.len() >= 2 {
        let last_tokens = count_tokens(merged.last().unwrap());
        let prev_tokens = count_tokens(&merged[merged.len() - 2]);
        if last_tokens < min_tokens && prev_tokens + last_tokens <= max_tokens {
            let last = merged.pop().unwrap();
            merged.last_mut().unwrap().push('\n');
            merged.last_mut().unwrap().push_str(&last);
        }
    }
    merged
}
