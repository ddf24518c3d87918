//! # positional-trie
//!
//! A character-indexed associative container whose depth grows only where
//! keys collide.
//!
//! Every node indexes its slots by the character at its own depth. A key is
//! stored directly in a slot until a second key needs the same slot, at
//! which point the slot is split into a child node one level deeper. Removing
//! keys collapses a child node back into a plain slot entry as soon as it
//! holds a single pair, so the tree stays as shallow as the key set allows.
//!
//! ## Example
//!
//! ```rust
//! use positional_trie::{PositionalTrie, SearchResult};
//!
//! let mut trie: PositionalTrie<u32> = PositionalTrie::new();
//! trie.insert("cat", 1).unwrap();
//! trie.insert("car", 2).unwrap();
//! trie.insert("dog", 3).unwrap();
//!
//! assert_eq!(trie.search_exact("cat"), Some(&1));
//! assert!(matches!(trie.search("ca"), SearchResult::Ambiguous(_)));
//! assert!(matches!(trie.search("do"), SearchResult::Found(&3)));
//! ```

use std::borrow::Cow;
use std::collections::hash_map::{self, Entry as MapEntry};
use std::collections::HashMap;
use std::fmt;
use std::io;

use tracing::{debug, trace};

mod error;

pub use error::{Result, TrieError};

/// Pairs listed by [`Matches`]'s `Display` before it gives up and prints a
/// placeholder.
const MAX_LISTED_MATCHES: usize = 20;

// =============================================================================
// Key folding
// =============================================================================

#[inline]
fn char_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_uppercase().eq(b.to_uppercase()) || a.to_lowercase().eq(b.to_lowercase())
}

/// Character-wise case-insensitive equality; lengths must match.
fn chars_eq_ignore_case(a: impl IntoIterator<Item = char>, b: impl IntoIterator<Item = char>) -> bool {
    let mut a = a.into_iter();
    let mut b = b.into_iter();
    loop {
        match (a.next(), b.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if char_eq_ignore_case(x, y) => {}
            _ => return false,
        }
    }
}

// =============================================================================
// Node arena
// =============================================================================

/// Handle of a node inside the trie's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct NodeId(u32);

impl NodeId {
    const ROOT: NodeId = NodeId(0);

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A stored key/value pair. `key` is already folded.
#[derive(Clone, Debug)]
struct Entry<V> {
    key: String,
    value: V,
}

#[derive(Clone, Debug)]
enum Slot<V> {
    /// A single pair that has not collided with anything at this depth.
    Leaf(Entry<V>),
    /// Node one level deeper, owned by the node holding this slot.
    Child(NodeId),
}

impl<V> Slot<V> {
    #[inline]
    fn into_leaf(self) -> Option<Entry<V>> {
        match self {
            Slot::Leaf(entry) => Some(entry),
            Slot::Child(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
struct Node<V> {
    /// Characters consumed from the root to reach this node.
    depth: usize,
    /// Node that created this one on a split; `None` only for the root.
    parent: Option<NodeId>,
    /// Pair whose folded key has exactly `depth` characters.
    terminal: Option<Entry<V>>,
    slots: HashMap<char, Slot<V>>,
}

impl<V> Node<V> {
    fn new(depth: usize, parent: Option<NodeId>) -> Self {
        Self {
            depth,
            parent,
            terminal: None,
            slots: HashMap::new(),
        }
    }
}

/// Node arena with a free list of vacated handles.
#[derive(Clone)]
struct NodeArena<V> {
    nodes: Vec<Option<Node<V>>>,
    free: Vec<NodeId>,
}

impl<V> NodeArena<V> {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
        }
    }

    fn alloc(&mut self, node: Node<V>) -> NodeId {
        if let Some(id) = self.free.pop() {
            debug_assert!(self.nodes[id.index()].is_none());
            self.nodes[id.index()] = Some(node);
            return id;
        }
        let id = NodeId(u32::try_from(self.nodes.len()).expect("node arena exceeds u32 handles"));
        self.nodes.push(Some(node));
        id
    }

    fn release(&mut self, id: NodeId) -> Node<V> {
        debug_assert_ne!(id, NodeId::ROOT, "the root node is never released");
        let node = self.nodes[id.index()].take().expect("released node must be live");
        self.free.push(id);
        node
    }

    #[inline]
    fn get(&self, id: NodeId) -> &Node<V> {
        self.nodes[id.index()].as_ref().expect("node handle must be live")
    }

    #[inline]
    fn get_mut(&mut self, id: NodeId) -> &mut Node<V> {
        self.nodes[id.index()].as_mut().expect("node handle must be live")
    }

    #[inline]
    fn live(&self) -> usize {
        self.nodes.len() - self.free.len()
    }
}

// =============================================================================
// PositionalTrie
// =============================================================================

/// A string-keyed map whose nodes branch on one character per level.
///
/// Keys are folded to upper case before any comparison when the trie is
/// built case-insensitive; the choice is fixed for the lifetime of the trie.
/// Enumeration follows internal hash-map order and is not sorted.
#[derive(Clone)]
pub struct PositionalTrie<V> {
    nodes: NodeArena<V>,
    case_sensitive: bool,
    count: usize,
}

/// Outcome of a prefix lookup with [`PositionalTrie::search`].
#[derive(Debug)]
pub enum SearchResult<'a, V> {
    /// A single pair matched the query.
    Found(&'a V),
    /// The query ends on a node without a terminal pair; every pair below it
    /// shares the queried prefix. Only an empty root yields zero matches.
    Ambiguous(Matches<'a, V>),
    NotFound,
}

impl<'a, V> SearchResult<'a, V> {
    /// The matched value, if the lookup found a single pair.
    pub fn found(&self) -> Option<&'a V> {
        match self {
            SearchResult::Found(value) => Some(*value),
            _ => None,
        }
    }

    /// Whether the lookup stopped on a node shared by several pairs.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, SearchResult::Ambiguous(_))
    }

    /// Whether nothing matched the query.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SearchResult::NotFound)
    }
}

/// Outcome of [`PositionalTrie::prefix`].
#[derive(Debug)]
pub enum Prefix<'a, V> {
    /// The node the prefix ends on, terminal pair included.
    Node(Matches<'a, V>),
    /// The single pair stored in the slot the prefix leads to.
    Value(&'a V),
}

impl<V> PositionalTrie<V> {
    /// Creates an empty case-sensitive trie.
    pub fn new() -> Self {
        Self::with_case_sensitivity(true)
    }

    /// Creates an empty trie; `false` folds every key to upper case.
    pub fn with_case_sensitivity(case_sensitive: bool) -> Self {
        let mut nodes = NodeArena::new();
        let root = nodes.alloc(Node::new(0, None));
        debug_assert_eq!(root, NodeId::ROOT);
        Self {
            nodes,
            case_sensitive,
            count: 0,
        }
    }

    #[inline]
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of stored pairs.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of nodes in the tree, root included.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.live()
    }

    /// Mean depth of the node each pair is stored on.
    ///
    /// A pair kept in a slot counts at the depth of the node owning the slot.
    /// Returns `0.0` for an empty trie.
    pub fn average_depth(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.depth_sum(NodeId::ROOT) as f64 / self.count as f64
    }

    fn depth_sum(&self, id: NodeId) -> usize {
        let node = self.nodes.get(id);
        let mut sum = if node.terminal.is_some() { node.depth } else { 0 };
        for slot in node.slots.values() {
            sum += match slot {
                Slot::Leaf(_) => node.depth,
                Slot::Child(child) => self.depth_sum(*child),
            };
        }
        sum
    }

    fn fold<'k>(&self, key: &'k str) -> Cow<'k, str> {
        if self.case_sensitive {
            Cow::Borrowed(key)
        } else {
            Cow::Owned(key.to_uppercase())
        }
    }

    /// Number of pairs stored under `id`.
    fn count_at(&self, id: NodeId) -> usize {
        let node = self.nodes.get(id);
        let mut count = usize::from(node.terminal.is_some());
        for slot in node.slots.values() {
            count += match slot {
                Slot::Leaf(_) => 1,
                Slot::Child(child) => self.count_at(*child),
            };
        }
        count
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter::new(self, NodeId::ROOT)
    }

    /// All stored values, in internal order.
    pub fn values(&self) -> Values<'_, V> {
        Values { inner: self.iter() }
    }

    /// Every folded key followed by a single space.
    pub fn contents(&self) -> String {
        contents_of(self.iter())
    }

    /// Writes an indented view of the tree.
    ///
    /// Lines are indented by the depth of the node they belong to. A child
    /// node is introduced by its slot character in brackets.
    pub fn dump<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        self.dump_node(NodeId::ROOT, out)
    }

    fn dump_node<W: io::Write>(&self, id: NodeId, out: &mut W) -> io::Result<()> {
        let node = self.nodes.get(id);
        let pad = node.depth;
        if let Some(entry) = &node.terminal {
            writeln!(out, "{:pad$}{}", "", entry.key)?;
        }
        for (c, slot) in &node.slots {
            match slot {
                Slot::Leaf(entry) => writeln!(out, "{:pad$}{}", "", entry.key)?,
                Slot::Child(child) => {
                    writeln!(out, "{:pad$}[{c}]", "")?;
                    self.dump_node(*child, out)?;
                }
            }
        }
        Ok(())
    }
}

impl<V> PositionalTrie<V> {
    /// Inserts `value` under `key`.
    ///
    /// Fails with [`TrieError::DuplicateKey`] if the folded key is already
    /// present; the trie is left untouched in that case.
    pub fn insert(&mut self, key: &str, value: V) -> Result<()> {
        let folded = self.fold(key).into_owned();
        let chars: Vec<char> = folded.chars().collect();
        self.insert_at(NodeId::ROOT, &chars, folded, value)?;
        self.count += 1;
        Ok(())
    }

    fn insert_at(&mut self, id: NodeId, chars: &[char], key: String, value: V) -> Result<()> {
        let node = self.nodes.get_mut(id);
        let depth = node.depth;

        if chars.len() == depth {
            if node.terminal.is_some() {
                return Err(TrieError::DuplicateKey { key });
            }
            trace!(depth, key = %key, "storing terminal");
            node.terminal = Some(Entry { key, value });
            return Ok(());
        }

        let c = chars[depth];
        let slot = match node.slots.entry(c) {
            MapEntry::Vacant(vacant) => {
                trace!(depth, slot = %c, key = %key, "storing leaf");
                vacant.insert(Slot::Leaf(Entry { key, value }));
                return Ok(());
            }
            MapEntry::Occupied(occupied) => occupied,
        };

        match slot.get() {
            Slot::Child(child) => {
                let child = *child;
                return self.insert_at(child, chars, key, value);
            }
            Slot::Leaf(existing) if existing.key == key => {
                return Err(TrieError::DuplicateKey { key });
            }
            Slot::Leaf(_) => {}
        }
        let Some(existing) = slot.remove().into_leaf() else {
            unreachable!("slot was checked to hold a leaf");
        };

        debug!(depth, slot = %c, "collision; splitting slot into child node");
        let child = self.nodes.alloc(Node::new(depth + 1, Some(id)));
        let existing_chars: Vec<char> = existing.key.chars().collect();
        self.insert_at(child, &existing_chars, existing.key, existing.value)?;
        self.insert_at(child, chars, key, value)?;
        self.nodes.get_mut(id).slots.insert(c, Slot::Child(child));
        Ok(())
    }

    /// Prefix lookup.
    ///
    /// Returns the value of the single pair matching `key`, a view over the
    /// node holding several candidates when `key` ends on a node that has no
    /// terminal pair, or [`SearchResult::NotFound`].
    ///
    /// A query that runs past the deepest node along its path resolves to
    /// that node's terminal pair if it has one.
    pub fn search(&self, key: &str) -> SearchResult<'_, V> {
        let folded = self.fold(key);
        let chars: Vec<char> = folded.chars().collect();

        let mut id = NodeId::ROOT;
        loop {
            let node = self.nodes.get(id);
            if chars.len() == node.depth {
                return match &node.terminal {
                    Some(entry) => SearchResult::Found(&entry.value),
                    None => SearchResult::Ambiguous(Matches { trie: self, id }),
                };
            }

            match node.slots.get(&chars[node.depth]) {
                None => {
                    return match &node.terminal {
                        Some(entry) => SearchResult::Found(&entry.value),
                        None => SearchResult::NotFound,
                    };
                }
                Some(Slot::Child(child)) => id = *child,
                Some(Slot::Leaf(entry)) => {
                    return if entry.key.starts_with(&*folded) {
                        SearchResult::Found(&entry.value)
                    } else {
                        SearchResult::NotFound
                    };
                }
            }
        }
    }

    /// Exact lookup that never reports ambiguity.
    ///
    /// A slot entry is compared case-insensitively against both the whole
    /// folded key and its first `depth + 1` characters, whatever the trie's
    /// case sensitivity.
    pub fn search_exact(&self, key: &str) -> Option<&V> {
        let folded = self.fold(key);
        let chars: Vec<char> = folded.chars().collect();

        let mut id = NodeId::ROOT;
        loop {
            let node = self.nodes.get(id);
            if chars.len() == node.depth {
                return node.terminal.as_ref().map(|entry| &entry.value);
            }

            match node.slots.get(&chars[node.depth]) {
                None => return node.terminal.as_ref().map(|entry| &entry.value),
                Some(Slot::Child(child)) => id = *child,
                Some(Slot::Leaf(entry)) => {
                    let prefix_len = node.depth + 1;
                    if prefix_len < chars.len()
                        && chars_eq_ignore_case(chars[..prefix_len].iter().copied(), entry.key.chars())
                    {
                        return Some(&entry.value);
                    }
                    return chars_eq_ignore_case(chars.iter().copied(), entry.key.chars())
                        .then_some(&entry.value);
                }
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.search_exact(key).is_some()
    }

    /// Sub-trie lookup.
    ///
    /// Returns the node `key` ends on even when that node holds a terminal
    /// pair, or the value of a slot pair whose key starts with `key`. Unlike
    /// [`search`](Self::search), a missing slot never falls back to the
    /// terminal pair of the node above it.
    pub fn prefix(&self, key: &str) -> Option<Prefix<'_, V>> {
        let folded = self.fold(key);
        let chars: Vec<char> = folded.chars().collect();

        let mut id = NodeId::ROOT;
        loop {
            let node = self.nodes.get(id);
            if chars.len() == node.depth {
                return Some(Prefix::Node(Matches { trie: self, id }));
            }

            match node.slots.get(&chars[node.depth])? {
                Slot::Child(child) => id = *child,
                Slot::Leaf(entry) => {
                    return entry
                        .key
                        .starts_with(&*folded)
                        .then_some(Prefix::Value(&entry.value));
                }
            }
        }
    }

    /// Removes the pair stored under `key`.
    ///
    /// Returns `Ok(Some(value))` when a pair was removed. A key whose slot
    /// holds a pair with a different key removes nothing and returns
    /// `Ok(None)`. A key whose path ends at a missing slot or at a node
    /// without a terminal pair fails with [`TrieError::NotFound`].
    pub fn remove(&mut self, key: &str) -> Result<Option<V>> {
        let folded = self.fold(key).into_owned();
        let chars: Vec<char> = folded.chars().collect();
        let removed = self.remove_at(NodeId::ROOT, &chars, &folded)?;
        if removed.is_some() {
            self.count -= 1;
        }
        Ok(removed)
    }

    fn remove_at(&mut self, id: NodeId, chars: &[char], key: &str) -> Result<Option<V>> {
        let depth = self.nodes.get(id).depth;

        if chars.len() == depth {
            return match self.nodes.get_mut(id).terminal.take() {
                Some(entry) => Ok(Some(entry.value)),
                None => Err(TrieError::NotFound { key: key.to_owned() }),
            };
        }

        let c = chars[depth];
        let child = match self.nodes.get(id).slots.get(&c) {
            None => return Err(TrieError::NotFound { key: key.to_owned() }),
            Some(Slot::Child(child)) => Some(*child),
            Some(Slot::Leaf(entry)) if entry.key != key => {
                trace!(depth, slot = %c, stored = %entry.key, "slot holds another key; nothing removed");
                return Ok(None);
            }
            Some(Slot::Leaf(_)) => None,
        };

        let Some(child) = child else {
            let removed = self.nodes.get_mut(id).slots.remove(&c);
            return Ok(removed.and_then(Slot::into_leaf).map(|entry| entry.value));
        };

        let removed = self.remove_at(child, chars, key)?;
        if removed.is_some() {
            self.collapse(id, c, child);
        }
        Ok(removed)
    }

    /// Folds `child` back into its parent's slot once it holds fewer than two pairs.
    fn collapse(&mut self, parent: NodeId, c: char, child: NodeId) {
        debug_assert_eq!(self.nodes.get(child).parent, Some(parent));

        let remaining = self.count_at(child);
        if remaining > 1 {
            return;
        }

        let survivor = if remaining == 1 {
            self.take_sole_entry(child)
        } else {
            None
        };
        self.release_subtree(child);

        let node = self.nodes.get_mut(parent);
        match survivor {
            Some(entry) => {
                debug!(depth = node.depth, slot = %c, key = %entry.key, "collapsing single-pair child node");
                node.slots.insert(c, Slot::Leaf(entry));
            }
            None => {
                debug!(depth = node.depth, slot = %c, "dropping empty child node");
                node.slots.remove(&c);
            }
        }
    }

    /// Takes the only pair held directly by `id`, if it has one.
    fn take_sole_entry(&mut self, id: NodeId) -> Option<Entry<V>> {
        let node = self.nodes.get_mut(id);
        if let Some(entry) = node.terminal.take() {
            return Some(entry);
        }
        let c = node
            .slots
            .iter()
            .find_map(|(c, slot)| matches!(slot, Slot::Leaf(_)).then_some(*c))?;
        node.slots.remove(&c).and_then(Slot::into_leaf)
    }

    fn release_subtree(&mut self, id: NodeId) {
        let node = self.nodes.release(id);
        for slot in node.slots.into_values() {
            if let Slot::Child(child) = slot {
                self.release_subtree(child);
            }
        }
    }
}

impl<V> Default for PositionalTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for PositionalTrie<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

fn contents_of<'a, V: 'a>(pairs: impl Iterator<Item = (&'a str, &'a V)>) -> String {
    let mut out = String::new();
    for (key, _) in pairs {
        out.push_str(key);
        out.push(' ');
    }
    out
}

// =============================================================================
// Ambiguous matches
// =============================================================================

/// Borrowed view of the node a [`PositionalTrie::search`] stopped on when
/// several pairs share the queried prefix.
pub struct Matches<'a, V> {
    trie: &'a PositionalTrie<V>,
    id: NodeId,
}

impl<'a, V> Matches<'a, V> {
    /// Length of the shared prefix, in characters.
    pub fn depth(&self) -> usize {
        self.trie.nodes.get(self.id).depth
    }

    /// Number of pairs sharing the prefix.
    pub fn len(&self) -> usize {
        self.trie.count_at(self.id)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Iter<'a, V> {
        Iter::new(self.trie, self.id)
    }

    /// Folded keys of the matching pairs.
    pub fn keys(&self) -> impl Iterator<Item = &'a str> {
        self.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> Values<'a, V> {
        Values { inner: self.iter() }
    }
}

impl<V> Clone for Matches<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Matches<'_, V> {}

impl<V> fmt::Display for Matches<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len() > MAX_LISTED_MATCHES {
            write!(f, "Multiple matches: <too many to list (>{MAX_LISTED_MATCHES})>")
        } else {
            write!(f, "Multiple matches: {}", contents_of(self.iter()))
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Matches<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// Iteration
// =============================================================================

/// Pre-order walk: a node's terminal pair, then its slots in map order.
pub struct Iter<'a, V> {
    trie: &'a PositionalTrie<V>,
    stack: Vec<hash_map::Values<'a, char, Slot<V>>>,
    terminal: Option<&'a Entry<V>>,
}

impl<'a, V> Iter<'a, V> {
    fn new(trie: &'a PositionalTrie<V>, id: NodeId) -> Self {
        let mut iter = Self {
            trie,
            stack: Vec::new(),
            terminal: None,
        };
        iter.enter(id);
        iter
    }

    fn enter(&mut self, id: NodeId) {
        let trie = self.trie;
        let node = trie.nodes.get(id);
        self.terminal = node.terminal.as_ref();
        self.stack.push(node.slots.values());
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.terminal.take() {
                return Some((entry.key.as_str(), &entry.value));
            }
            let slots = self.stack.last_mut()?;
            match slots.next() {
                None => {
                    self.stack.pop();
                }
                Some(Slot::Leaf(entry)) => return Some((entry.key.as_str(), &entry.value)),
                Some(Slot::Child(child)) => self.enter(*child),
            }
        }
    }
}

pub struct Values<'a, V> {
    inner: Iter<'a, V>,
}

impl<'a, V> Iterator for Values<'a, V> {
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }
}


#[cfg(test)]
mod proptests;
