//! Inline rules-markup tags: `{@keyword segment|segment|...}`
//!
//! A tag is decomposed into its keyword and its pipe-separated segments so that
//! only the human-readable segments get translated. Which segments are safe is
//! decided by a static per-keyword policy table.

/// A parsed markup tag.
///
/// `{@highlight You can cast {@spell Mage Hand|PHB|mage hand} twice|Hello}`
/// parses to keyword `highlight` with two segments, the nested spell tag being
/// kept whole inside the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub keyword_char: char,
    pub keyword: String,
    pub content: Vec<String>,
    pub translatable: Vec<bool>,
}

impl Tag {
    /// Parse a single tag. Never fails: malformed input yields whatever
    /// structure could be recovered.
    pub fn parse(tag: &str) -> Self {
        let chars: Vec<char> = tag.chars().collect();
        let keyword_char = chars.get(1).copied().unwrap_or_default();

        // `{=amount1/v}` has no arguments: the keyword runs up to the brace
        let keyword_end = chars
            .iter()
            .position(|&c| c == ' ')
            .unwrap_or(chars.len().saturating_sub(1));
        let keyword: String = chars
            .get(2..keyword_end)
            .map(|s| s.iter().collect())
            .unwrap_or_default();

        let body = chars.get(keyword_end + 1..).unwrap_or(&[]);
        let content = split_segments(body);
        let translatable = translatable_flags(&keyword, content.len());

        Self {
            keyword_char,
            keyword,
            content,
            translatable,
        }
    }

    pub fn unparse(&self) -> String {
        let mut tag = String::from("{");
        tag.push(self.keyword_char);
        tag.push_str(&self.keyword);
        if !self.content.is_empty() {
            tag.push(' ');
        }
        tag.push_str(&self.content.join("|"));
        tag.push('}');
        tag
    }

    /// Indices of the segments that may be machine translated.
    pub fn translatable_segments(&self) -> impl Iterator<Item = usize> + '_ {
        self.translatable
            .iter()
            .enumerate()
            .filter(|(_, t)| **t)
            .map(|(i, _)| i)
    }
}

/// Split the tag body (everything after the keyword, closing brace included)
/// on `|`, keeping nested `{@...}` spans whole.
fn split_segments(body: &[char]) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let last = body.len().saturating_sub(1);

    for (i, &c) in body.iter().enumerate() {
        if i == last {
            // Closing brace of the tag itself
            segments.push(std::mem::take(&mut current));
            break;
        }

        match c {
            '{' if body.get(i + 1) == Some(&'@') => {
                current.push(c);
                depth += 1;
            }
            '}' => {
                current.push(c);
                depth = depth.saturating_sub(1);
            }
            '|' if depth == 0 => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    segments
}

fn translatable_flags(keyword: &str, segments: usize) -> Vec<bool> {
    let policy = classify(keyword);
    (0..segments)
        .map(|i| policy.get(i).copied().unwrap_or(false))
        .collect()
}

struct TagPolicy {
    keywords: &'static [&'static str],
    segments: &'static [bool],
}

// Which `|` segments are display text rather than references, roll
// expressions or entity names. Entity tags are deliberately left alone: their
// display text is usually a noun that other records refer to.
static TAG_POLICIES: &[TagPolicy] = &[
    TagPolicy {
        keywords: &[
            "b",
            "bold",
            "i",
            "italic",
            "s",
            "strike",
            "u",
            "underline",
            "sup",
            "sub",
            "kbd",
            "code",
            "note",
            "comic",
            "comicH1",
            "comicH2",
            "comicH3",
            "comicH4",
            "comicNote",
            "dcYourSpellSave",
            "hitYourSpellAttack",
        ],
        segments: &[true],
    },
    // {@tag displayText|value}
    TagPolicy {
        keywords: &[
            "font",
            "style",
            "color",
            "highlight",
            "filter",
            "link",
            "5etools",
        ],
        segments: &[true, false],
    },
    // {@help text|title}
    TagPolicy {
        keywords: &["help"],
        segments: &[true, true],
    },
    // {@dice rollText|displayText|name}
    TagPolicy {
        keywords: &[
            "dice",
            "autodice",
            "damage",
            "hit",
            "d20",
            "chance",
            "recharge",
            "ability",
            "savingThrow",
            "skillCheck",
            "dc",
        ],
        segments: &[false, true],
    },
    // {@coinflip display text|rollee name|success text|failure text}
    TagPolicy {
        keywords: &["coinflip"],
        segments: &[true, false, true, true],
    },
    // {@unit {=amount1/v}|singular|plural}
    TagPolicy {
        keywords: &["unit"],
        segments: &[false, true, true],
    },
    // {@footnote displayText|footnoteText|optTitle}
    TagPolicy {
        keywords: &["footnote"],
        segments: &[true, true, true],
    },
    TagPolicy {
        keywords: &["table"],
        segments: &[false, false, true],
    },
    // {@quickref Adventuring Gear|PHB|1|0|Display Text}
    TagPolicy {
        keywords: &["quickref"],
        segments: &[false, false, false, false, true],
    },
    TagPolicy {
        keywords: &[
            "area",
            "book",
            "adventure",
            "class",
            "action",
            "background",
            "boon",
            "charoption",
            "condition",
            "creature",
            "cult",
            "disease",
            "feat",
            "hazard",
            "item",
            "itemMastery",
            "language",
            "legroup",
            "object",
            "optfeature",
            "psionic",
            "race",
            "recipe",
            "reward",
            "vehicle",
            "vehicleupgrade",
            "sense",
            "skill",
            "spell",
            "status",
            "trap",
            "variantrule",
            "card",
            "deity",
            "classFeature",
            "subclassFeature",
            "loader",
            "atk",
            "homebrew",
            "scaledamage",
            "scaledice",
            "m",
            "h",
            "amount",
            "deck",
        ],
        segments: &[],
    },
];

/// Translation policy for a tag keyword, one flag per `|` segment.
///
/// Unknown keywords are reported and treated as having nothing translatable.
pub fn classify(keyword: &str) -> &'static [bool] {
    match TAG_POLICIES
        .iter()
        .find(|p| p.keywords.contains(&keyword))
    {
        Some(policy) => policy.segments,
        None => {
            tracing::warn!("Unknown tag keyword: {}", keyword);
            &[]
        }
    }
}
