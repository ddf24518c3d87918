use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

/// Walks the whole tree and checks every structural invariant.
pub(crate) fn validate_trie<V>(t: &PositionalTrie<V>) {
    fn walk<V>(t: &PositionalTrie<V>, id: NodeId, path: &mut Vec<char>, nodes: &mut usize) -> usize {
        *nodes += 1;
        let node = t.nodes.get(id);
        assert_eq!(node.depth, path.len(), "node depth must match its path length");

        let mut pairs = 0usize;
        if let Some(entry) = &node.terminal {
            let key: Vec<char> = entry.key.chars().collect();
            assert_eq!(key, *path, "terminal key must spell the node's path");
            pairs += 1;
        }

        for (c, slot) in &node.slots {
            match slot {
                Slot::Leaf(entry) => {
                    let key: Vec<char> = entry.key.chars().collect();
                    assert!(key.len() > node.depth, "leaf key must continue past its node");
                    assert_eq!(&key[..node.depth], &path[..], "leaf key must agree with the path");
                    assert_eq!(key[node.depth], *c, "leaf key must match its slot character");
                    pairs += 1;
                }
                Slot::Child(child) => {
                    let child_node = t.nodes.get(*child);
                    assert_eq!(child_node.parent, Some(id), "child must point back at its owner");
                    path.push(*c);
                    let below = walk(t, *child, path, nodes);
                    path.pop();
                    assert!(below >= 2, "child node with {below} pairs must have been collapsed");
                    pairs += below;
                }
            }
        }
        pairs
    }

    let root = t.nodes.get(NodeId::ROOT);
    assert_eq!(root.depth, 0);
    assert!(root.parent.is_none());

    let mut nodes = 0usize;
    let pairs = walk(t, NodeId::ROOT, &mut Vec::new(), &mut nodes);
    assert_eq!(pairs, t.len(), "reachable pair count must match PositionalTrie::len");
    assert_eq!(pairs, t.count_at(NodeId::ROOT));
    assert_eq!(nodes, t.node_count(), "every live arena node must be reachable");
    assert_eq!(t.iter().count(), pairs);
}

/// Whether `search_exact(key)` may legitimately answer for a key that is not
/// stored: some stored key is a proper prefix of it, or equals it ignoring case.
fn may_alias<'a>(stored: impl Iterator<Item = &'a String>, key: &str) -> bool {
    let key_len = key.chars().count();
    stored.into_iter().any(|s| {
        (key.starts_with(s.as_str()) && s.chars().count() < key_len)
            || chars_eq_ignore_case(s.chars(), key.chars())
    })
}

fn key_strategy() -> impl Strategy<Value = String> {
    // A tiny alphabet with mixed case forces deep collision chains.
    prop::collection::vec(prop::sample::select(vec!['a', 'b', 'c', 'A', 'B', 'ß']), 0..=6)
        .prop_map(|chars| chars.into_iter().collect())
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 5)]
    Insert(#[proptest(strategy = "key_strategy()")] String, u32),
    #[proptest(weight = 3)]
    Remove(#[proptest(strategy = "key_strategy()")] String),
    #[proptest(weight = 2)]
    Search(#[proptest(strategy = "key_strategy()")] String),
}

fn run_against_model(case_sensitive: bool, ops: Vec<Op>) -> std::result::Result<(), TestCaseError> {
    let mut t: PositionalTrie<u32> = PositionalTrie::with_case_sensitivity(case_sensitive);
    let mut m: HashMap<String, u32> = HashMap::new();
    let fold = |k: &str| if case_sensitive { k.to_owned() } else { k.to_uppercase() };

    for op in ops {
        match op {
            Op::Insert(key, value) => {
                let folded = fold(&key);
                let result = t.insert(&key, value);
                if m.contains_key(&folded) {
                    prop_assert_eq!(result, Err(TrieError::DuplicateKey { key: folded }));
                } else {
                    prop_assert_eq!(result, Ok(()));
                    m.insert(folded, value);
                }
            }
            Op::Remove(key) => {
                let folded = fold(&key);
                let node_count = t.node_count();
                match m.remove(&folded) {
                    Some(value) => {
                        prop_assert_eq!(t.remove(&key), Ok(Some(value)));
                        prop_assert!(t.node_count() <= node_count);
                        if !may_alias(m.keys(), &folded) {
                            prop_assert_eq!(t.search_exact(&key), None);
                        }
                    }
                    None => {
                        let result = t.remove(&key);
                        prop_assert!(!matches!(result, Ok(Some(_))), "removed an absent key");
                        prop_assert_eq!(t.node_count(), node_count);
                    }
                }
            }
            Op::Search(key) => {
                let folded = fold(&key);
                match m.get(&folded) {
                    Some(value) => {
                        prop_assert_eq!(t.search_exact(&key), Some(value));
                        prop_assert_eq!(t.search(&key).found(), Some(value));
                    }
                    None => {
                        if t.search_exact(&key).is_some() {
                            prop_assert!(may_alias(m.keys(), &folded));
                        }
                        if let SearchResult::Ambiguous(matches) = t.search(&key) {
                            prop_assert!(matches.len() >= 2 || matches.depth() == 0);
                            for k in matches.keys() {
                                prop_assert!(k.starts_with(folded.as_str()));
                            }
                        }
                    }
                }
            }
        }

        prop_assert_eq!(t.len(), m.len());
    }

    validate_trie(&t);
    let mut got: Vec<(String, u32)> = t.iter().map(|(k, v)| (k.to_owned(), *v)).collect();
    got.sort();
    let mut expected: Vec<(String, u32)> = m.into_iter().collect();
    expected.sort();
    prop_assert_eq!(got, expected);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_case_sensitive(ops in prop::collection::vec(any::<Op>(), 0..=500)) {
        run_against_model(true, ops)?;
    }

    #[test]
    fn prop_equivalence_case_insensitive(ops in prop::collection::vec(any::<Op>(), 0..=500)) {
        run_against_model(false, ops)?;
    }

    #[test]
    fn prop_insert_then_search_exact(key in key_strategy(), value in any::<u32>()) {
        let mut t: PositionalTrie<u32> = PositionalTrie::new();
        t.insert(&key, value).unwrap();
        prop_assert_eq!(t.search_exact(&key), Some(&value));
        prop_assert_eq!(t.remove(&key), Ok(Some(value)));
        prop_assert_eq!(t.search_exact(&key), None);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

const SMALL_SET: [&str; 6] = ["a", "b", "ab", "abc", "abd", "ba"];

#[test]
fn exhaustive_insert_order_small_set() {
    let mut shapes: Option<(usize, u64)> = None;

    for_each_permutation(&SMALL_SET, |perm| {
        let mut t: PositionalTrie<u64> = PositionalTrie::new();
        for (i, k) in perm.iter().enumerate() {
            t.insert(k, i as u64).unwrap();
        }

        validate_trie(&t);
        for (i, k) in perm.iter().enumerate() {
            assert_eq!(t.search_exact(k), Some(&(i as u64)));
        }

        // The shape is independent of insertion order.
        let shape = (t.node_count(), (t.average_depth() * 1000.0).round() as u64);
        match shapes {
            None => shapes = Some(shape),
            Some(expected) => assert_eq!(shape, expected),
        }
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    // Insert in a fixed order, then remove in all permutations.
    let mut base: PositionalTrie<u64> = PositionalTrie::new();
    for (i, k) in SMALL_SET.iter().enumerate() {
        base.insert(k, i as u64).unwrap();
    }

    for_each_permutation(&SMALL_SET, |perm| {
        let mut t = base.clone();
        let mut remaining = SMALL_SET.len();

        for k in perm {
            let expected = SMALL_SET.iter().position(|s| *s == k).unwrap() as u64;
            assert_eq!(t.remove(k), Ok(Some(expected)));
            remaining -= 1;
            assert_eq!(t.len(), remaining);
            validate_trie(&t);
        }
        assert!(t.is_empty());
        assert_eq!(t.node_count(), 1);
    });
}
