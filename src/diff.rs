//! Sequence alignment
//!
//! [`SequenceMatcher`] is the Ratcliff/Obershelp "gestalt" matcher: find the
//! longest common block, recurse on both sides, and describe the result as
//! equal/replace/insert/delete opcodes. It never treats any element as junk,
//! so results depend only on the two sequences. The alignment is not
//! guaranteed minimal; [`longest_common_subsequence`] is the exact (quadratic)
//! routine for when optimality matters.

use rustc_hash::FxHashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edit {
    Equal,
    Replace,
    Insert,
    Delete,
}

impl Edit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Edit::Equal => "equal",
            Edit::Replace => "replace",
            Edit::Insert => "insert",
            Edit::Delete => "delete",
        }
    }
}

/// `a[a_lo..a_hi]` should be changed into `b[b_lo..b_hi]` by `tag`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub tag: Edit,
    pub a_lo: usize,
    pub a_hi: usize,
    pub b_lo: usize,
    pub b_hi: usize,
}

impl Opcode {
    pub fn new(tag: Edit, a_lo: usize, a_hi: usize, b_lo: usize, b_hi: usize) -> Self {
        Self {
            tag,
            a_lo,
            a_hi,
            b_lo,
            b_hi,
        }
    }
}

/// `a[a..a + size] == b[b..b + size]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub a: usize,
    pub b: usize,
    pub size: usize,
}

pub struct SequenceMatcher<'a, T> {
    a: &'a [T],
    b: &'a [T],
    /// Positions of each element of `b`, ascending
    b2j: FxHashMap<&'a T, Vec<usize>>,
}

impl<'a, T: Hash + Eq> SequenceMatcher<'a, T> {
    pub fn new(a: &'a [T], b: &'a [T]) -> Self {
        let mut b2j: FxHashMap<&T, Vec<usize>> = FxHashMap::default();
        for (j, elt) in b.iter().enumerate() {
            b2j.entry(elt).or_default().push(j);
        }
        Self { a, b, b2j }
    }

    /// Longest matching block in `a[alo..ahi]` and `b[blo..bhi]`
    ///
    /// Of all maximal blocks, returns the one that starts earliest in `a`,
    /// and of those the one that starts earliest in `b`.
    pub fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> Match {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
        // j2len[j] = length of the longest match ending with a[i-1] and b[j]
        let mut j2len: FxHashMap<usize, usize> = FxHashMap::default();
        for i in alo..ahi {
            let mut new_j2len = FxHashMap::default();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = match j.checked_sub(1) {
                        Some(prev) => j2len.get(&prev).copied().unwrap_or(0) + 1,
                        None => 1,
                    };
                    new_j2len.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = new_j2len;
        }
        Match {
            a: best_i,
            b: best_j,
            size: best_size,
        }
    }

    /// Non-overlapping matching blocks in increasing order, adjacent blocks
    /// merged, ending with the sentinel `(len(a), len(b), 0)`
    pub fn matching_blocks(&self) -> Vec<Match> {
        let (la, lb) = (self.a.len(), self.b.len());
        let mut queue = vec![(0, la, 0, lb)];
        let mut blocks = Vec::new();
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let m = self.find_longest_match(alo, ahi, blo, bhi);
            if m.size == 0 {
                continue;
            }
            if alo < m.a && blo < m.b {
                queue.push((alo, m.a, blo, m.b));
            }
            if m.a + m.size < ahi && m.b + m.size < bhi {
                queue.push((m.a + m.size, ahi, m.b + m.size, bhi));
            }
            blocks.push(m);
        }
        blocks.sort_by_key(|m| (m.a, m.b, m.size));

        let mut collapsed: Vec<Match> = Vec::with_capacity(blocks.len() + 1);
        for m in blocks {
            match collapsed.last_mut() {
                Some(last) if last.a + last.size == m.a && last.b + last.size == m.b => {
                    last.size += m.size;
                }
                _ => collapsed.push(m),
            }
        }
        collapsed.push(Match {
            a: la,
            b: lb,
            size: 0,
        });
        collapsed
    }

    /// Edits turning `a` into `b`
    pub fn opcodes(&self) -> Vec<Opcode> {
        let (mut i, mut j) = (0, 0);
        let mut opcodes = Vec::new();
        for m in self.matching_blocks() {
            let tag = match (i < m.a, j < m.b) {
                (true, true) => Some(Edit::Replace),
                (true, false) => Some(Edit::Delete),
                (false, true) => Some(Edit::Insert),
                (false, false) => None,
            };
            if let Some(tag) = tag {
                opcodes.push(Opcode::new(tag, i, m.a, j, m.b));
            }
            i = m.a + m.size;
            j = m.b + m.size;
            if m.size > 0 {
                opcodes.push(Opcode::new(Edit::Equal, m.a, i, m.b, j));
            }
        }
        opcodes
    }

    /// Similarity in `[0, 1]`: twice the matched elements over the total
    pub fn ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        let matches: usize = self.matching_blocks().iter().map(|m| m.size).sum();
        2.0 * matches as f64 / total as f64
    }
}

/// Exact longest common subsequence
///
/// A shared prefix is consumed directly; the rest is solved with the usual
/// dynamic-programming table.
pub fn longest_common_subsequence<T: PartialEq + Clone>(x: &[T], y: &[T]) -> Vec<T> {
    let prefix = x.iter().zip(y).take_while(|(a, b)| a == b).count();
    let mut lcs: Vec<T> = x[..prefix].to_vec();
    let (x, y) = (&x[prefix..], &y[prefix..]);
    let (m, n) = (x.len(), y.len());
    if m == 0 || n == 0 {
        return lcs;
    }

    let mut table = vec![vec![0usize; n + 1]; m + 1];
    for i in 1..=m {
        for j in 1..=n {
            table[i][j] = if x[i - 1] == y[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i][j - 1].max(table[i - 1][j])
            };
        }
    }

    let mut tail = Vec::with_capacity(table[m][n]);
    let (mut i, mut j) = (m, n);
    while i > 0 && j > 0 {
        if x[i - 1] == y[j - 1] {
            tail.push(x[i - 1].clone());
            i -= 1;
            j -= 1;
        } else if table[i - 1][j] > table[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    tail.reverse();
    lcs.extend(tail);
    lcs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn tags(opcodes: &[Opcode]) -> Vec<(&'static str, usize, usize, usize, usize)> {
        opcodes
            .iter()
            .map(|o| (o.tag.as_str(), o.a_lo, o.a_hi, o.b_lo, o.b_hi))
            .collect()
    }

    #[test]
    fn test_find_longest_match() {
        let (a, b) = (chars(" abcd"), chars("abcd abcd"));
        let matcher = SequenceMatcher::new(&a, &b);
        assert_eq!(
            matcher.find_longest_match(0, 5, 0, 9),
            Match { a: 0, b: 4, size: 5 }
        );
        // Restricting b drops the leading space
        assert_eq!(
            matcher.find_longest_match(0, 5, 0, 4),
            Match { a: 1, b: 0, size: 4 }
        );
    }

    #[test]
    fn test_no_match() {
        let (a, b) = (chars("ab"), chars("cd"));
        let matcher = SequenceMatcher::new(&a, &b);
        assert_eq!(matcher.find_longest_match(0, 2, 0, 2).size, 0);
        assert_eq!(matcher.matching_blocks(), vec![Match { a: 2, b: 2, size: 0 }]);
        assert_eq!(tags(&matcher.opcodes()), vec![("replace", 0, 2, 0, 2)]);
    }

    #[test]
    fn test_matching_blocks() {
        let (a, b) = (chars("abxcd"), chars("abcd"));
        let matcher = SequenceMatcher::new(&a, &b);
        assert_eq!(
            matcher.matching_blocks(),
            vec![
                Match { a: 0, b: 0, size: 2 },
                Match { a: 3, b: 2, size: 2 },
                Match { a: 5, b: 4, size: 0 },
            ]
        );
    }

    #[test]
    fn test_opcodes() {
        let (a, b) = (chars("qabxcd"), chars("abycdf"));
        let matcher = SequenceMatcher::new(&a, &b);
        assert_eq!(
            tags(&matcher.opcodes()),
            vec![
                ("delete", 0, 1, 0, 0),
                ("equal", 1, 3, 0, 2),
                ("replace", 3, 4, 2, 3),
                ("equal", 4, 6, 3, 5),
                ("insert", 6, 6, 5, 6),
            ]
        );
    }

    #[test]
    fn test_opcodes_on_words() {
        let a = ["a", "b", "c"];
        let b = ["a", "x", "c"];
        let opcodes = SequenceMatcher::new(&a, &b).opcodes();
        assert_eq!(
            tags(&opcodes),
            vec![("equal", 0, 1, 0, 1), ("replace", 1, 2, 1, 2), ("equal", 2, 3, 2, 3)]
        );
    }

    #[test]
    fn test_empty_sequences() {
        let empty: Vec<char> = Vec::new();
        let b = chars("ab");
        assert_eq!(
            tags(&SequenceMatcher::new(&empty, &b).opcodes()),
            vec![("insert", 0, 0, 0, 2)]
        );
        assert!(SequenceMatcher::new(&empty, &empty).opcodes().is_empty());
        assert_eq!(SequenceMatcher::new(&empty, &empty).ratio(), 1.0);
    }

    #[test]
    fn test_ratio() {
        let (a, b) = (chars("abcd"), chars("bcde"));
        assert_eq!(SequenceMatcher::new(&a, &b).ratio(), 0.75);
    }

    #[test]
    fn test_deterministic() {
        let (a, b) = (chars("the cat sat on the mat"), chars("a cat sat on a mat"));
        let first = SequenceMatcher::new(&a, &b).opcodes();
        let second = SequenceMatcher::new(&a, &b).opcodes();
        assert_eq!(first, second);
    }

    #[test]
    fn test_lcs() {
        assert_eq!(longest_common_subsequence(&chars("ABCBDAB"), &chars("BDCABA")).len(), 4);
        assert_eq!(
            longest_common_subsequence(&chars("abcde"), &chars("abxde")),
            chars("abde")
        );
        assert_eq!(longest_common_subsequence(&chars("abc"), &chars("abc")), chars("abc"));
        assert!(longest_common_subsequence(&chars(""), &chars("abc")).is_empty());
        assert_eq!(
            longest_common_subsequence(&["a", "b", "c"], &["a", "x", "c"]),
            vec!["a", "c"]
        );
    }
}
