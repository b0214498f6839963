//! Fixed-window text chunker.
//!
//! Splits document text into windows of `chunk_size` characters, each
//! starting `chunk_size - overlap` characters after the previous one.
//! Windows ignore word and sentence boundaries. Offsets count Unicode
//! scalar values, never bytes, so multi-byte text is never split inside
//! a character.
//!
//! # Example
//!
//! ```rust
//! use minutes_qa::chunk::chunk_text;
//!
//! let chunks = chunk_text("abcdefghij", 4, 1);
//! assert_eq!(chunks, vec!["abcd", "defg", "ghij", "j"]);
//! ```

/// Split `text` into overlapping windows.
///
/// Callers guarantee `0 < overlap < chunk_size` (enforced by config
/// validation); out-of-range values are clamped so the walk always advances.
/// Empty text yields no chunks.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let step = chunk_size.saturating_sub(overlap).max(1);

    // Byte offset of every char, plus the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < char_len {
        let end = (start + chunk_size).min(char_len);
        chunks.push(text[bounds[start]..bounds[end]].to_string());
        start += step;
    }
    chunks
}

/// Inverse of [`chunk_text`]: drop the overlapping prefix of each window
/// after the first and concatenate.
pub fn reassemble(chunks: &[String], chunk_size: usize, overlap: usize) -> String {
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(chunk);
            continue;
        }
        // Window i starts at i*step; everything before (i-1)*step+chunk_size
        // has already been written.
        let written_end = (i - 1) * step + chunk_size;
        let skip = written_end.saturating_sub(i * step);
        out.extend(chunk.chars().skip(skip));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 1000, 200).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 1000, 200);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_window_overlap() {
        let text = "a".repeat(4500);
        let chunks = chunk_text(&text, 2000, 400);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], text[..2000]);
        assert!(chunks[1].starts_with(&text[1600..1610]));
        assert_eq!(chunks[2].len(), 4500 - 3200);
    }

    #[test]
    fn test_all_but_last_are_full_width() {
        let text: String = (0..2345).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = chunk_text(&text, 300, 70);
        let (last, rest) = chunks.split_last().unwrap();
        for c in rest {
            assert_eq!(c.chars().count(), 300);
        }
        assert!(last.chars().count() <= 300);
    }

    #[test]
    fn test_reassemble_reconstructs_text() {
        let samples = [
            "A reuniao ocorreu em 12/01/2024. Participou Joao Silva.".to_string(),
            "x".repeat(1001),
            "ação, reunião e orçamento. ".repeat(40),
        ];
        for text in &samples {
            for (size, overlap) in [(10, 3), (50, 49), (1000, 200), (7, 1)] {
                let chunks = chunk_text(text, size, overlap);
                assert_eq!(
                    &reassemble(&chunks, size, overlap),
                    text,
                    "size={size} overlap={overlap}"
                );
            }
        }
    }

    #[test]
    fn test_chunk_count() {
        // Windows start at 0, step, 2*step, ... while start < len.
        let text = "z".repeat(1000);
        for (size, overlap) in [(100, 20), (300, 299), (999, 1), (1000, 10)] {
            let step = size - overlap;
            let expected = 1000_usize.div_ceil(step);
            assert_eq!(chunk_text(&text, size, overlap).len(), expected);
        }
    }

    #[test]
    fn test_multibyte_chars_counted_once() {
        let text = "ção".repeat(5);
        let chunks = chunk_text(&text, 4, 1);
        assert_eq!(chunks[0], "ção\u{e7}");
        for c in &chunks {
            assert!(c.chars().count() <= 4);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta";
        assert_eq!(chunk_text(text, 10, 4), chunk_text(text, 10, 4));
    }
}
