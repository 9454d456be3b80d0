//! Comparing predicted trees with gold trees
//!
//! Predicted and gold tokenizations may differ, so words are first aligned by
//! their lowercased forms; only words inside equal runs of that alignment are
//! compared.

use crate::diff::{Edit, SequenceMatcher, longest_common_subsequence};
use crate::error::Result;
use crate::node::NodeId;
use crate::tree::Root;
use rustc_hash::FxHashMap;
use std::fmt;

/// Pairs `(pred index, gold index)` of words in equal runs
///
/// A pure function of the two form sequences.
pub fn align_forms<S: AsRef<str>>(pred: &[S], gold: &[S]) -> Vec<(usize, usize)> {
    let pred: Vec<String> = pred.iter().map(|f| f.as_ref().to_lowercase()).collect();
    let gold: Vec<String> = gold.iter().map(|f| f.as_ref().to_lowercase()).collect();
    SequenceMatcher::new(&pred, &gold)
        .opcodes()
        .into_iter()
        .filter(|op| op.tag == Edit::Equal)
        .flat_map(|op| (op.a_lo..op.a_hi).zip(op.b_lo..op.b_hi))
        .collect()
}

fn forms(tree: &Root) -> Vec<String> {
    tree.descendants()
        .into_iter()
        .map(|id| tree[id].form.clone())
        .collect()
}

/// Precision, recall and F1 of one metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub correct: usize,
    pub pred: usize,
    pub gold: usize,
}

impl Score {
    pub fn precision(&self) -> f64 {
        ratio(self.correct, self.pred)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.correct, self.gold)
    }

    pub fn f1(&self) -> f64 {
        ratio(2 * self.correct, self.pred + self.gold)
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P={:.2}% R={:.2}% F1={:.2}%",
            100.0 * self.precision(),
            100.0 * self.recall(),
            100.0 * self.f1()
        )
    }
}

/// Unlabeled and labeled attachment over aligned words
///
/// A word is attached correctly when its predicted parent is aligned with
/// its gold parent (virtual roots count as aligned). LAS also requires the
/// same universal relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachmentScore {
    pub pred: usize,
    pub gold: usize,
    pub aligned: usize,
    pub uas: usize,
    pub las: usize,
}

impl AttachmentScore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tree(&mut self, pred: &Root, gold: &Root) -> Result<()> {
        let pred_words = pred.descendants();
        let gold_words = gold.descendants();
        self.pred += pred_words.len();
        self.gold += gold_words.len();

        let pairs = align_forms(&forms(pred), &forms(gold));
        let mut to_gold: FxHashMap<NodeId, NodeId> = pairs
            .iter()
            .map(|&(p, g)| (pred_words[p], gold_words[g]))
            .collect();
        to_gold.insert(pred.root_id(), gold.root_id());

        for &(p, g) in &pairs {
            let (p, g) = (pred_words[p], gold_words[g]);
            self.aligned += 1;
            let (Some(p_parent), Some(g_parent)) = (pred.parent(p)?, gold.parent(g)?) else {
                continue;
            };
            if to_gold.get(&p_parent) == Some(&g_parent) {
                self.uas += 1;
                if pred[p].udeprel() == gold[g].udeprel() {
                    self.las += 1;
                }
            }
        }
        Ok(())
    }

    pub fn uas(&self) -> Score {
        Score {
            correct: self.uas,
            pred: self.pred,
            gold: self.gold,
        }
    }

    pub fn las(&self) -> Score {
        Score {
            correct: self.las,
            pred: self.pred,
            gold: self.gold,
        }
    }

    /// How many words could be aligned at all
    pub fn words(&self) -> Score {
        Score {
            correct: self.aligned,
            pred: self.pred,
            gold: self.gold,
        }
    }
}

/// Word-level F1 over the exact longest common subsequence of forms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenF1 {
    pub correct: usize,
    pub pred: usize,
    pub gold: usize,
}

impl TokenF1 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tree(&mut self, pred: &Root, gold: &Root) {
        let (pred, gold) = (forms(pred), forms(gold));
        self.correct += longest_common_subsequence(&pred, &gold).len();
        self.pred += pred.len();
        self.gold += gold.len();
    }

    pub fn score(&self) -> Score {
        Score {
            correct: self.correct,
            pred: self.pred,
            gold: self.gold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeAttrs;

    /// First word is the root, the rest hang on it
    fn flat(forms: &[&str], deprel: &str) -> Root {
        let mut root = Root::new("");
        let mut head = None;
        for form in forms {
            let parent = head.unwrap_or(root.root_id());
            let id = root
                .create_child(parent, NodeAttrs::new(form).deprel(deprel))
                .unwrap();
            head.get_or_insert(id);
        }
        root
    }

    #[test]
    fn test_align_forms() {
        assert_eq!(align_forms(&["a", "b", "c"], &["a", "x", "c"]), vec![(0, 0), (2, 2)]);
        assert_eq!(align_forms(&["The", "DOG"], &["the", "dog"]), vec![(0, 0), (1, 1)]);
        assert!(align_forms::<&str>(&[], &["a"]).is_empty());
    }

    #[test]
    fn test_alignment_is_deterministic() {
        let pred = ["a", "b", "a", "b", "c"];
        let gold = ["b", "a", "b", "a", "c"];
        assert_eq!(align_forms(&pred, &gold), align_forms(&pred, &gold));
    }

    #[test]
    fn test_attachment_over_aligned_words() {
        let pred = flat(&["a", "b", "c"], "dep");
        let gold = flat(&["a", "x", "c"], "dep");
        let mut score = AttachmentScore::new();
        score.add_tree(&pred, &gold).unwrap();

        assert_eq!(score.aligned, 2);
        assert_eq!((score.pred, score.gold), (3, 3));
        assert_eq!(score.uas, 2);
        assert_eq!(score.las, 2);
        assert!((score.uas().precision() - 2.0 / 3.0).abs() < 1e-9);
        assert!((score.las().recall() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_wrong_head_and_label() {
        let pred = flat(&["a", "b", "c"], "obj");
        let mut gold = flat(&["a", "b", "c"], "obj:x");
        let ids = gold.descendants();
        gold.set_parent(ids[2], ids[1]).unwrap();

        let mut score = AttachmentScore::new();
        score.add_tree(&pred, &gold).unwrap();
        assert_eq!(score.uas, 2);
        // obj vs obj:x share the universal relation
        assert_eq!(score.las, 2);
        assert_eq!(score.words().f1(), 1.0);
    }

    #[test]
    fn test_token_f1() {
        let mut f1 = TokenF1::new();
        f1.add_tree(&flat(&["a", "b", "c"], ""), &flat(&["a", "c"], ""));
        assert_eq!(f1.correct, 2);
        let score = f1.score();
        assert!((score.precision() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(score.recall(), 1.0);
        assert!((score.f1() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_empty_score() {
        let score = AttachmentScore::new().uas();
        assert_eq!(score.f1(), 0.0);
        assert_eq!(score.to_string(), "P=0.00% R=0.00% F1=0.00%");
    }
}
