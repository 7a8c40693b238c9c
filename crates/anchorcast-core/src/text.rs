//! Text preprocessing for spoken lines.
//!
//! Redacts sensitive words, normalises whitespace and splits long lines into
//! sentence-sized chunks that can be synthesized independently.

/// Default character count above which a line is split.
pub const DEFAULT_SPLIT_THRESHOLD: usize = 100;

/// Default upper bound on characters per chunk.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 100;

/// Replacement written in place of every sensitive word.
pub const REDACTION: &str = "**";

/// Characters that always end a sentence.
const HARD_TERMINATORS: &[char] = &['。', '！', '？', '~', '～', '．'];

/// ASCII characters that end a sentence only when followed by a boundary.
const SOFT_TERMINATORS: &[char] = &['.', '!', '?'];

/// Clause separators used when a single sentence is still too long.
const CLAUSE_MARKS: &[char] = &['，', '、', '；', '：', ',', ';', ':'];

/// Replace each occurrence of every word in `words` with `**`.
///
/// Empty words are ignored.
#[must_use]
pub fn redact<S: AsRef<str>>(text: &str, words: &[S]) -> String {
    words
        .iter()
        .map(AsRef::as_ref)
        .filter(|w| !w.is_empty())
        .fold(text.to_string(), |acc, word| acc.replace(word, REDACTION))
}

/// Collapse runs of whitespace into a single space and trim the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else {
            result.push(c);
            prev_space = false;
        }
    }

    result.trim().to_string()
}

/// First keyword from `keywords` that occurs in `text`, in configuration order.
#[must_use]
pub fn find_trigger_keyword<'a, S: AsRef<str>>(text: &str, keywords: &'a [S]) -> Option<&'a str> {
    keywords
        .iter()
        .map(AsRef::as_ref)
        .find(|kw| !kw.is_empty() && text.contains(kw))
}

/// Splits lines into chunks bounded by a character count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    split_threshold: usize,
    max_chunk_chars: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_SPLIT_THRESHOLD, DEFAULT_MAX_CHUNK_CHARS)
    }
}

impl TextSplitter {
    /// A zero `max_chunk_chars` is treated as 1.
    #[must_use]
    pub fn new(split_threshold: usize, max_chunk_chars: usize) -> Self {
        Self {
            split_threshold,
            max_chunk_chars: max_chunk_chars.max(1),
        }
    }

    #[must_use]
    pub const fn split_threshold(&self) -> usize {
        self.split_threshold
    }

    #[must_use]
    pub const fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars
    }

    /// Split `text` into non-empty chunks.
    ///
    /// Text at or under the split threshold comes back as a single chunk.
    /// Longer text is cut at sentence terminators and short sentences are
    /// merged back together up to `max_chunk_chars`. A sentence that alone
    /// exceeds the limit is cut at clause marks, then hard-split.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        let text = collapse_whitespace(text);
        if text.is_empty() {
            return Vec::new();
        }

        if char_len(&text) <= self.split_threshold {
            return vec![text];
        }

        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();

        for sentence in split_sentences(&text) {
            let sentence_len = char_len(&sentence);

            if !current.is_empty()
                && char_len(&current) + joiner(&current).len() + sentence_len
                    > self.max_chunk_chars
            {
                chunks.push(std::mem::take(&mut current));
            }

            if sentence_len > self.max_chunk_chars {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                chunks.extend(self.split_long_sentence(&sentence));
                continue;
            }

            push_joined(&mut current, &sentence);
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }

    fn split_long_sentence(&self, sentence: &str) -> Vec<String> {
        let mut parts = Vec::new();
        let mut current = String::new();

        for part in sentence.split_inclusive(CLAUSE_MARKS) {
            if !current.is_empty() && char_len(&current) + char_len(part) > self.max_chunk_chars {
                push_trimmed(&mut parts, &std::mem::take(&mut current));
            }
            current.push_str(part);
        }
        push_trimmed(&mut parts, &current);

        parts
            .into_iter()
            .flat_map(|part| {
                if char_len(&part) > self.max_chunk_chars {
                    self.hard_split(&part)
                } else {
                    vec![part]
                }
            })
            .collect()
    }

    fn hard_split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(self.max_chunk_chars)
            .map(|piece| piece.iter().collect::<String>().trim().to_string())
            .filter(|piece| !piece.is_empty())
            .collect()
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Append `next` to `out`, separated by a space when `out` ends in ASCII.
///
/// Chinese text runs on without a gap; English sentences keep theirs.
pub fn push_joined(out: &mut String, next: &str) {
    if !out.is_empty() {
        let separator = joiner(out);
        out.push_str(separator);
    }
    out.push_str(next);
}

/// Separator between merged sentences: a space after ASCII text, nothing after CJK.
fn joiner(previous: &str) -> &'static str {
    match previous.chars().last() {
        Some(c) if c.is_ascii() => " ",
        _ => "",
    }
}

fn push_trimmed(out: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        let boundary = if HARD_TERMINATORS.contains(&c) {
            true
        } else if SOFT_TERMINATORS.contains(&c) {
            // "3.5" and "v1.2" stay together
            chars
                .peek()
                .is_none_or(|next| next.is_whitespace() || !next.is_ascii_alphanumeric())
        } else {
            false
        };

        // Keep runs like "？！" or "..." attached to the sentence they end
        let run_continues = chars
            .peek()
            .is_some_and(|next| HARD_TERMINATORS.contains(next) || SOFT_TERMINATORS.contains(next));

        if boundary && !run_continues {
            push_trimmed(&mut sentences, &std::mem::take(&mut current));
        }
    }

    push_trimmed(&mut sentences, &current);
    sentences
}
