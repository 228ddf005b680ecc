//! Splitting long text into message-sized chunks.

/// Lazily split `text` into chunks of at most `max_len` characters.
///
/// Each cut happens at the last newline within the limit, or exactly at the
/// limit when there is none. The newline at a cut and any newlines directly
/// after it are dropped. Empty input yields no chunks.
pub fn chunk_text(text: &str, max_len: usize) -> Chunks<'_> {
    Chunks {
        remaining: text,
        max_len: max_len.max(1),
    }
}

/// Iterator returned by [`chunk_text`]. Cloning it restarts from the same
/// position.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    remaining: &'a str,
    max_len: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.remaining.is_empty() {
            return None;
        }

        // Byte offset of the first character past the limit, if any.
        let Some((limit, _)) = self.remaining.char_indices().nth(self.max_len) else {
            let last = self.remaining;
            self.remaining = "";
            return Some(last);
        };

        let split_at = match self.remaining[..limit].rfind('\n') {
            Some(0) | None => limit,
            Some(idx) => idx,
        };

        let chunk = &self.remaining[..split_at];
        self.remaining = self.remaining[split_at..].trim_start_matches('\n');
        Some(chunk)
    }
}
