//! Tag placeholders: tags are swapped for `(%N%)` markers before a string is
//! cached or sent for translation, and put back afterwards.

use regex::Regex;

pub struct PlaceholderCodec {
    tag_re: Regex,
    placeholder_re: Regex,
}

impl Default for PlaceholderCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaceholderCodec {
    pub fn new() -> Self {
        Self {
            // {#itemEntry} {=amount1/V} {@keyword ...}, innermost first
            tag_re: Regex::new(r"\{[#@=][^{}]*?\}").unwrap(),
            placeholder_re: Regex::new(r"\(%\d+%\)").unwrap(),
        }
    }

    /// Replace every tag with a positional placeholder.
    ///
    /// Nested tags are extracted inner first: once the inner tag is a
    /// placeholder, the outer one no longer contains braces and matches on
    /// the next scan.
    pub fn extract(&self, text: &str) -> (String, Vec<String>) {
        let mut text = text.to_string();
        let mut tags = Vec::new();

        while let Some(m) = self.tag_re.find(&text) {
            let range = m.range();
            tags.push(m.as_str().to_string());
            text.replace_range(range, &placeholder(tags.len() - 1));
        }

        (text, tags)
    }

    /// Put the tags back, highest index first so that outer tags are expanded
    /// before the placeholders they contain.
    pub fn restore(&self, text: &str, tags: &[String]) -> String {
        let mut text = text.to_string();
        for (idx, tag) in tags.iter().enumerate().rev() {
            text = text.replace(&placeholder(idx), tag);
        }
        text
    }

    /// Remove every placeholder marker.
    pub fn strip(&self, text: &str) -> String {
        self.placeholder_re.replace_all(text, "").into_owned()
    }

    /// Remove every tag, nested ones included.
    pub fn strip_tags(&self, text: &str) -> String {
        let (stripped, _) = self.extract(text);
        self.strip(&stripped)
    }
}

fn placeholder(idx: usize) -> String {
    format!("(%{}%)", idx)
}
