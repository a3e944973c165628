/// Splits text into chunks no longer than `max_chunk_size` characters,
/// preferring sentence boundaries (`.`/`!`/`?` followed by whitespace) and
/// falling back to word boundaries for oversized sentences. A single word
/// longer than the limit is emitted as-is; that is the only permitted
/// overflow.
pub fn split_text_into_chunks(text: &str, max_chunk_size: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let joiner = if current.is_empty() { 0 } else { 1 };
        if char_len(&current) + joiner + char_len(&sentence) > max_chunk_size {
            if !current.is_empty() {
                chunks.push(current.trim().to_string());
                current.clear();
            }
            if char_len(&sentence) > max_chunk_size {
                // Sentence alone exceeds the limit, force-split on words.
                for word in sentence.split_whitespace() {
                    if char_len(&current) + 1 + char_len(word) > max_chunk_size
                        && !current.is_empty()
                    {
                        chunks.push(current.trim().to_string());
                        current = word.to_string();
                    } else {
                        if !current.is_empty() {
                            current.push(' ');
                        }
                        current.push_str(word);
                    }
                }
            } else {
                current = sentence;
            }
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&sentence);
        }
    }

    if !current.is_empty() {
        chunks.push(current.trim().to_string());
    }
    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Sentence split on `. ! ?` followed by whitespace, keeping the terminator
/// with its sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            if chars.peek().map_or(false, |next| next.is_whitespace()) {
                // Consume the boundary whitespace.
                while chars.peek().map_or(false, |next| next.is_whitespace()) {
                    chars.next();
                }
                sentences.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}
