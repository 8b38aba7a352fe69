use crate::gcode::{ParsedToolpath, ToolpathParser};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use tracing::debug;

/// Last parse result, keyed by a hash of the text and parser settings.
#[derive(Debug, Default, Clone)]
pub struct ToolpathCache {
    content_hash: u64,
    parsed: Option<Rc<ParsedToolpath>>,
    hits: u64,
}

impl ToolpathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_hash(text: &str, parser: &ToolpathParser) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        parser.arc_segments().hash(&mut hasher);
        hasher.finish()
    }

    pub fn needs_update(&self, new_hash: u64) -> bool {
        self.content_hash != new_hash || self.parsed.is_none()
    }

    pub fn update(&mut self, new_hash: u64, parsed: ParsedToolpath) -> Rc<ParsedToolpath> {
        let parsed = Rc::new(parsed);
        self.content_hash = new_hash;
        self.parsed = Some(Rc::clone(&parsed));
        parsed
    }

    /// Parse `text` unless the same text was parsed last time.
    pub fn get_or_parse(&mut self, text: &str, parser: &ToolpathParser) -> Rc<ParsedToolpath> {
        let hash = Self::content_hash(text, parser);
        if let (false, Some(parsed)) = (self.needs_update(hash), &self.parsed) {
            self.hits += 1;
            debug!("Toolpath cache hit ({} segments)", parsed.len());
            return Rc::clone(parsed);
        }
        self.update(hash, parser.parse(text))
    }

    pub fn parsed(&self) -> Option<&Rc<ParsedToolpath>> {
        self.parsed.as_ref()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn clear(&mut self) {
        self.content_hash = 0;
        self.parsed = None;
    }
}
