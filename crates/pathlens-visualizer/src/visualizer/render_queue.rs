//! Draw ordering
//!
//! Visible objects are stably sorted by shader and material so consecutive
//! draws share GPU state. Ordering changes only switching cost, never what
//! ends up on screen: opaque shaders sort before the blended one.

use serde::Serialize;

/// GPU state identity of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MaterialKey {
    /// Shader program; blended programs use higher ids than opaque ones
    pub shader: u32,
    pub material: u64,
}

impl MaterialKey {
    pub const OPAQUE_SHADER: u32 = 0;
    pub const BLENDED_SHADER: u32 = 1;

    pub fn new(shader: u32, material: u64) -> Self {
        Self { shader, material }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderObject<T> {
    pub key: MaterialKey,
    pub visible: bool,
    pub item: T,
}

impl<T> RenderObject<T> {
    pub fn new(key: MaterialKey, item: T) -> Self {
        Self {
            key,
            visible: true,
            item,
        }
    }
}

/// Counters for a performance overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Key transitions between consecutive draws after sorting
    pub state_changes: usize,
    /// Key transitions in submission order
    pub unsorted_state_changes: usize,
    pub draw_calls: usize,
}

/// Number of positions where the key differs from the previous one.
pub fn count_state_changes<'a, I>(keys: I) -> usize
where
    I: IntoIterator<Item = &'a MaterialKey>,
{
    let mut changes = 0;
    let mut previous: Option<&MaterialKey> = None;
    for key in keys {
        if previous.is_some_and(|p| p != key) {
            changes += 1;
        }
        previous = Some(key);
    }
    changes
}

#[derive(Debug)]
pub struct RenderQueue<T> {
    pending: Vec<RenderObject<T>>,
    last_stats: QueueStats,
}

impl<T> Default for RenderQueue<T> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            last_stats: QueueStats::default(),
        }
    }
}

impl<T> RenderQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, object: RenderObject<T>) {
        self.pending.push(object);
    }

    pub fn submit_all<I: IntoIterator<Item = RenderObject<T>>>(&mut self, objects: I) {
        self.pending.extend(objects);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drain the queue in draw order.
    pub fn flush(&mut self) -> (Vec<RenderObject<T>>, QueueStats) {
        let mut visible: Vec<RenderObject<T>> =
            self.pending.drain(..).filter(|o| o.visible).collect();
        let unsorted_state_changes = count_state_changes(visible.iter().map(|o| &o.key));

        // sort_by_key is stable
        visible.sort_by_key(|o| o.key);

        let stats = QueueStats {
            state_changes: count_state_changes(visible.iter().map(|o| &o.key)),
            unsorted_state_changes,
            draw_calls: visible.len(),
        };
        self.last_stats = stats;
        (visible, stats)
    }

    pub fn last_stats(&self) -> QueueStats {
        self.last_stats
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
