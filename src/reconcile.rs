//! Reconciling a tokenized tree with its raw sentence text
//!
//! The tree's forms are laid out as a character string (one space between
//! tokens unless `SpaceAfter=No`) and aligned with the raw text by
//! [`SequenceMatcher`]. The resulting edits are cleaned up so that each one
//! starts on a token boundary, then resolved one by one: punctuation is
//! added or deleted, forms are corrected, split tokens become multiword
//! tokens or `goeswith` chains. Whatever cannot be resolved is logged and
//! counted. Finally `SpaceAfter` is recomputed by walking the text.

use crate::diff::{Edit, Opcode, SequenceMatcher};
use crate::error::{Error, Result, parse_flag};
use crate::mwt::Token;
use crate::node::{NodeAttrs, NodeId};
use crate::tree::{OrphanPolicy, Placement, Root};
use once_cell::sync::Lazy;
use regex::Regex;

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\p{P}+$").expect("valid regex"));
static SPACED_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9 ]+([,.][0-9]+)?$").expect("valid regex"));

/// Language-dependent decisions made during reconciliation
pub trait TextPolicy {
    /// Whether `s` is made of punctuation only
    fn is_punctuation(&self, s: &str) -> bool {
        PUNCTUATION.is_match(s)
    }

    /// Whether a single token may keep the spaces of `form` (e.g. "1 000")
    fn allows_space(&self, form: &str) -> bool {
        SPACED_NUMBER.is_match(form)
    }

    /// Whether the form being replaced is worth recording in MISC
    ///
    /// PTB-style quotes (`` and '') are tokenizer artifacts, not spelling.
    fn keeps_previous_form(&self, previous: &str) -> bool {
        previous != "``" && previous != "''"
    }
}

/// Unicode punctuation classes, no language-specific exceptions
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodePolicy;

impl TextPolicy for UnicodePolicy {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Rewrite the stored text to match the tree when they still differ
    pub fix_text: bool,
    /// Prefer a multiword token over `SpaceAfter=No` for exact splits
    pub prefer_mwt: bool,
    /// Split a token with a space into a `goeswith` chain
    pub allow_goeswith: bool,
    /// Longest multiword token that may be created
    pub max_mwt_length: usize,
    pub allow_add_punct: bool,
    pub allow_delete_punct: bool,
    /// Treat "e-mail" vs "e mail" as a `goeswith` split
    pub allow_hyphen_goeswith: bool,
    /// MISC key for the form before correction; empty disables it
    pub previous_form_label: String,
    /// Comment key for the text before rewriting; empty disables it
    pub previous_text_label: String,
    /// MISC key marking added nodes; empty disables it
    pub added_label: String,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            fix_text: true,
            prefer_mwt: true,
            allow_goeswith: true,
            max_mwt_length: 4,
            allow_add_punct: true,
            allow_delete_punct: true,
            allow_hyphen_goeswith: true,
            previous_form_label: "CorrectForm".to_string(),
            previous_text_label: "OrigText".to_string(),
            added_label: "Added".to_string(),
        }
    }
}

impl ReconcileOptions {
    /// Set one option from its string form
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "fix_text" => self.fix_text = parse_flag(key, value)?,
            "prefer_mwt" => self.prefer_mwt = parse_flag(key, value)?,
            "allow_goeswith" => self.allow_goeswith = parse_flag(key, value)?,
            "allow_add_punct" => self.allow_add_punct = parse_flag(key, value)?,
            "allow_delete_punct" => self.allow_delete_punct = parse_flag(key, value)?,
            "allow_hyphen_goeswith" => self.allow_hyphen_goeswith = parse_flag(key, value)?,
            "max_mwt_length" => {
                self.max_mwt_length = value.trim().parse().map_err(|_| {
                    Error::configuration(format!(
                        "parameter {key}: expected a non-negative integer, found {value:?}"
                    ))
                })?;
            }
            "previous_form_label" => self.previous_form_label = value.to_string(),
            "previous_text_label" => self.previous_text_label = value.to_string(),
            "added_label" => self.added_label = value.to_string(),
            other => {
                return Err(Error::configuration(format!(
                    "unknown reconciliation parameter {other:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Edit segments left as they were
    pub unresolved: usize,
    /// Whether `SpaceAfter` could be set for every token
    pub spacing_complete: bool,
    /// Whether the stored text was replaced
    pub text_rewritten: bool,
    /// Whether anything in the tree or its text changed
    pub changed: bool,
}

/// The tree rendered as characters, with the token starting at each position
struct Layout {
    chars: Vec<char>,
    owners: Vec<Option<Token>>,
}

impl Layout {
    fn new(root: &Root) -> Result<Self> {
        let tokens = root.token_descendants();
        let mut chars = Vec::new();
        let mut owners = Vec::new();
        for (i, &token) in tokens.iter().enumerate() {
            let mut form: Vec<char> = root.token_form(token)?.chars().collect();
            if i + 1 < tokens.len() && root.token_misc(token)?.value("SpaceAfter") != Some("No") {
                form.push(' ');
            }
            if form.is_empty() {
                continue;
            }
            owners.push(Some(token));
            owners.extend(std::iter::repeat_n(None, form.len() - 1));
            chars.extend(form);
        }
        Ok(Self { chars, owners })
    }

    fn is_token_start(&self, i: usize) -> bool {
        matches!(self.owners.get(i), Some(Some(_)))
    }

    /// Tokens starting within `lo..hi`
    fn tokens(&self, lo: usize, hi: usize) -> Vec<Token> {
        self.owners[lo..hi].iter().flatten().copied().collect()
    }

    /// First token starting at or after `i`
    fn next_token(&self, i: usize) -> Option<Token> {
        self.owners.get(i..)?.iter().flatten().copied().next()
    }
}

fn span(chars: &[char], lo: usize, hi: usize) -> String {
    chars[lo..hi].iter().collect()
}

/// Move edit boundaries off the spaces between tokens
fn unspace(diffs: &[Opcode], tree: &[char], text: &[char]) -> Vec<Opcode> {
    let mut result = Vec::with_capacity(diffs.len());
    for d in diffs {
        let (mut a_lo, mut a_hi, mut b_lo, mut b_hi) = (d.a_lo, d.a_hi, d.b_lo, d.b_hi);
        if d.tag != Edit::Insert {
            if tree.get(a_lo) == Some(&' ') {
                a_lo += 1;
            }
            if a_hi > a_lo && tree.get(a_hi - 1) == Some(&' ') {
                a_hi -= 1;
            }
        }
        if d.tag != Edit::Delete {
            if text.get(b_lo) == Some(&' ') {
                b_lo += 1;
            }
            if b_hi > b_lo && text.get(b_hi - 1) == Some(&' ') {
                b_hi -= 1;
            }
        }
        let (a_hi, b_hi) = (a_hi.max(a_lo), b_hi.max(b_lo));
        let (old, new) = (&tree[a_lo..a_hi], &text[b_lo..b_hi]);
        let tag = if old.is_empty() && new.is_empty() {
            continue;
        } else if old == new {
            Edit::Equal
        } else if old.is_empty() {
            Edit::Insert
        } else if new.is_empty() {
            Edit::Delete
        } else {
            d.tag
        };
        result.push(Opcode::new(tag, a_lo, a_hi, b_lo, b_hi));
    }
    result
}

/// Extend edits so that none of them starts inside a token
fn merge(diffs: &[Opcode], layout: &Layout) -> Vec<Opcode> {
    let mut merged: Vec<Opcode> = Vec::with_capacity(diffs.len());
    for &d in diffs {
        if d.tag != Edit::Insert && layout.is_token_start(d.a_lo) {
            merged.push(d);
            continue;
        }
        if d.tag == Edit::Equal {
            let Some(prev) = merged.last_mut() else {
                merged.push(d);
                continue;
            };
            let (mut a, mut b) = (d.a_lo, d.b_lo);
            while a < d.a_hi && !layout.is_token_start(a) {
                a += 1;
                b += 1;
            }
            *prev = Opcode::new(Edit::Replace, prev.a_lo, a, prev.b_lo, b);
            if a < d.a_hi {
                merged.push(Opcode::new(Edit::Equal, a, d.a_hi, b, d.b_hi));
            }
            continue;
        }
        match merged.last().copied() {
            None => merged.push(d),
            Some(prev) if prev.tag != Edit::Equal => {
                if let Some(last) = merged.last_mut() {
                    *last = Opcode::new(Edit::Replace, prev.a_lo, d.a_hi, prev.b_lo, d.b_hi);
                }
            }
            Some(prev) => {
                // Give the tail of the preceding token back to this edit
                let (mut a, mut b) = (prev.a_hi - 1, prev.b_hi - 1);
                while a > prev.a_lo && !layout.is_token_start(a) {
                    a -= 1;
                    b -= 1;
                }
                merged.pop();
                if a > prev.a_lo {
                    merged.push(Opcode::new(Edit::Equal, prev.a_lo, a, prev.b_lo, b));
                }
                merged.push(Opcode::new(Edit::Replace, a, d.a_hi, b, d.b_hi));
            }
        }
    }
    merged
}

pub struct Reconciler<P = UnicodePolicy> {
    pub options: ReconcileOptions,
    policy: P,
}

impl Reconciler<UnicodePolicy> {
    pub fn new(options: ReconcileOptions) -> Self {
        Self {
            options,
            policy: UnicodePolicy,
        }
    }
}

impl Default for Reconciler<UnicodePolicy> {
    fn default() -> Self {
        Self::new(ReconcileOptions::default())
    }
}

impl<P: TextPolicy> Reconciler<P> {
    pub fn with_policy(options: ReconcileOptions, policy: P) -> Self {
        Self { options, policy }
    }

    /// Make the tree agree with its stored text
    ///
    /// Fails when the tree has no text, on structural errors from the tree,
    /// and when every edit was resolved but the tokens still cannot be found
    /// in the text.
    pub fn reconcile(&self, root: &mut Root) -> Result<ReconcileReport> {
        let Some(original) = root.text.clone() else {
            return Err(Error::precondition(format!(
                "tree {} has no text to reconcile with",
                root.address()
            )));
        };
        let mut report = ReconcileReport {
            spacing_complete: true,
            ..ReconcileReport::default()
        };

        let text = original.split_whitespace().collect::<Vec<_>>().join(" ");
        if text != original && self.options.fix_text {
            self.note_previous_text(root, &original);
            root.text = Some(text.clone());
            report.text_rewritten = true;
            report.changed = true;
        }
        if text == root.compute_text(true) {
            return Ok(report);
        }

        let layout = Layout::new(root)?;
        let text_chars: Vec<char> = text.chars().collect();
        let diffs = SequenceMatcher::new(&layout.chars, &text_chars).opcodes();
        tracing::debug!(stage = "matcher", ?diffs);
        let diffs = unspace(&diffs, &layout.chars, &text_chars);
        tracing::debug!(stage = "unspace", ?diffs);
        let diffs = merge(&diffs, &layout);
        tracing::debug!(stage = "merge", ?diffs);

        for d in &diffs {
            let resolved = match d.tag {
                Edit::Equal => true,
                Edit::Insert => self.solve_insert(root, &layout, &text_chars, d)?,
                Edit::Delete => self.solve_delete(root, &layout, d)?,
                Edit::Replace => {
                    let tokens = layout.tokens(d.a_lo, d.a_hi);
                    if tokens.is_empty() {
                        self.solve_insert(root, &layout, &text_chars, d)?
                    } else {
                        let form = span(&text_chars, d.b_lo, d.b_hi);
                        self.solve_replace(root, &tokens, form.trim())?
                    }
                }
            };
            if resolved {
                report.changed |= d.tag != Edit::Equal;
            } else {
                report.unresolved += 1;
            }
        }

        let (complete, spacing_changed) = self.fill_space_after(root, &text)?;
        report.spacing_complete = complete;
        report.changed |= spacing_changed;
        if !complete && report.unresolved == 0 {
            return Err(Error::structural(format!(
                "tokens of {} do not match its text although all differences were resolved",
                root.address()
            )));
        }

        if self.options.fix_text {
            let computed = root.compute_text(true);
            if text != computed {
                let current = root.text.clone().unwrap_or_default();
                self.note_previous_text(root, &current);
                root.text = Some(computed);
                report.text_rewritten = true;
                report.changed = true;
            }
        }
        Ok(report)
    }

    fn note_previous_text(&self, root: &mut Root, previous: &str) {
        if !self.options.previous_text_label.is_empty() {
            root.add_comment(&format!("{} = {previous}", self.options.previous_text_label));
        }
    }

    fn unresolved(&self, root: &Root, what: &str, tokens: &[Token], form: &str) -> bool {
        let forms: Vec<&str> = tokens
            .iter()
            .filter_map(|&t| root.token_form(t).ok())
            .collect();
        tracing::warn!(
            "{}: unable to solve {what} diff: {:?} -> {form:?}",
            root.address(),
            forms.join(" ")
        );
        false
    }

    fn punct_attrs(&self, form: &str) -> NodeAttrs {
        let mut attrs = NodeAttrs::new(form).lemma(form).upos("PUNCT").deprel("punct");
        if !self.options.added_label.is_empty() {
            attrs.misc.set(&self.options.added_label, Some("1"));
        }
        attrs
    }

    fn solve_insert(
        &self,
        root: &mut Root,
        layout: &Layout,
        text: &[char],
        d: &Opcode,
    ) -> Result<bool> {
        let inserted = span(text, d.b_lo, d.b_hi);
        let pieces: Vec<&str> = inserted.split(' ').filter(|p| !p.is_empty()).collect();
        let all_punct = !pieces.is_empty() && pieces.iter().all(|p| self.policy.is_punctuation(p));
        if !(self.options.allow_add_punct && all_punct) {
            return Ok(self.unresolved(root, "insert", &[], &inserted));
        }

        match layout.next_token(d.a_lo) {
            Some(next) => {
                let first = root
                    .token_words(next)?
                    .first()
                    .copied()
                    .ok_or_else(|| Error::structural("token without words"))?;
                for piece in pieces {
                    root.create_child_at(first, self.punct_attrs(piece), Placement::Before(first))?;
                }
            }
            None => {
                let words = root.descendants();
                let parent = words.last().copied().unwrap_or(root.root_id());
                let mut anchor = words.last().copied();
                for piece in pieces {
                    let placement = anchor.map_or(Placement::End, Placement::After);
                    anchor = Some(root.create_child_at(parent, self.punct_attrs(piece), placement)?);
                }
            }
        }
        Ok(true)
    }

    fn solve_delete(&self, root: &mut Root, layout: &Layout, d: &Opcode) -> Result<bool> {
        let tokens = layout.tokens(d.a_lo, d.a_hi);
        let all_punct = !tokens.is_empty()
            && tokens.iter().all(|&t| {
                root.token_form(t)
                    .is_ok_and(|form| self.policy.is_punctuation(form))
            });
        if !(self.options.allow_delete_punct && all_punct) {
            return Ok(self.unresolved(root, "delete", &tokens, ""));
        }
        for token in tokens {
            for word in root.token_words(token)? {
                root.remove(word, OrphanPolicy::Rehang)?;
            }
        }
        Ok(true)
    }

    fn store_previous_form(&self, root: &mut Root, token: Token, form: &str) -> Result<()> {
        let previous = root.token_form(token)?.to_string();
        if previous == form {
            return Ok(());
        }
        let label = &self.options.previous_form_label;
        if !label.is_empty() && self.policy.keeps_previous_form(&previous) {
            root.token_misc_mut(token)?.set(label, Some(&previous));
        }
        root.set_token_form(token, form)
    }

    /// Add punctuation nodes right after `token`, hanging on its last word
    fn add_punct_after(&self, root: &mut Root, token: Token, pieces: &[&str]) -> Result<()> {
        let last = root
            .token_words(token)?
            .last()
            .copied()
            .ok_or_else(|| Error::structural("token without words"))?;
        let mut anchor = last;
        for piece in pieces {
            anchor = root.create_child_at(last, self.punct_attrs(piece), Placement::After(anchor))?;
        }
        Ok(())
    }

    /// Whether `rest` is punctuation, possibly several pieces separated by spaces
    fn is_spaced_punctuation(&self, rest: &str) -> bool {
        !rest.is_empty()
            && rest
                .split(' ')
                .filter(|p| !p.is_empty())
                .all(|p| self.policy.is_punctuation(p))
    }

    fn solve_replace(&self, root: &mut Root, tokens: &[Token], form: &str) -> Result<bool> {
        let token = tokens[0];
        let node_form = root.token_form(token)?.to_string();

        if form.contains(' ') {
            if tokens.len() > 1 {
                return Ok(self.unresolved(root, "n:m", tokens, form));
            }
            let mut joined = node_form.clone();
            if self.options.allow_hyphen_goeswith && node_form.replace('-', " ") == form {
                joined = node_form.replace('-', "");
            }
            if joined == form.replace(' ', "") {
                if self.policy.allows_space(form) {
                    self.store_previous_form(root, token, form)?;
                } else if let (true, Token::Word(id)) = (self.options.allow_goeswith, token) {
                    self.split_goeswith(root, id, form)?;
                } else {
                    return Ok(self.unresolved(root, "1:m", tokens, form));
                }
            } else if self.options.allow_add_punct
                && form
                    .strip_prefix(node_form.as_str())
                    .is_some_and(|rest| self.is_spaced_punctuation(rest))
            {
                let rest = &form[node_form.len()..];
                let pieces: Vec<&str> = rest.split(' ').filter(|p| !p.is_empty()).collect();
                self.add_punct_after(root, token, &pieces)?;
            } else {
                return Ok(self.unresolved(root, "1:m", tokens, form));
            }
            return Ok(true);
        }

        if tokens.len() > 1 {
            let mut concatenated = String::new();
            for &t in tokens {
                concatenated.push_str(root.token_form(t)?);
            }
            if !self.options.prefer_mwt && concatenated == form {
                // SpaceAfter=No is enough
                return Ok(true);
            }
            if tokens.iter().any(Token::is_mwt) {
                return Ok(self.unresolved(root, "partial multiword token", tokens, form));
            }
            if tokens.len() > self.options.max_mwt_length {
                tracing::warn!(
                    "{}: not creating a multiword token of {} > {} words",
                    root.address(),
                    tokens.len(),
                    self.options.max_mwt_length
                );
                return Ok(false);
            }
            let mut words = Vec::with_capacity(tokens.len());
            for &t in tokens {
                words.extend(root.token_words(t)?);
            }
            root.create_multiword_token(&words, form)?;
            return Ok(true);
        }

        match form.strip_prefix(node_form.as_str()) {
            Some(rest)
                if self.options.allow_add_punct
                    && !rest.is_empty()
                    && self.policy.is_punctuation(rest) =>
            {
                self.add_punct_after(root, token, &[rest])?;
            }
            _ => self.store_previous_form(root, token, form)?,
        }
        Ok(true)
    }

    /// "ab" written as "a b": keep "a" with `Typo=Yes`, hang "b" on it as `goeswith`
    fn split_goeswith(&self, root: &mut Root, id: NodeId, form: &str) -> Result<()> {
        let mut pieces = form.split(' ').filter(|p| !p.is_empty());
        let Some(head) = pieces.next() else {
            return Ok(());
        };
        self.store_previous_form(root, Token::Word(id), head)?;
        root.node_mut(id)?.feats.set("Typo", Some("Yes"));
        let mut anchor = id;
        for piece in pieces {
            let attrs = NodeAttrs::new(piece).upos("X").deprel("goeswith");
            anchor = root.create_child_at(id, attrs, Placement::After(anchor))?;
        }
        Ok(())
    }

    /// Set `SpaceAfter` from the text; returns (every token found, anything changed)
    fn fill_space_after(&self, root: &mut Root, text: &str) -> Result<(bool, bool)> {
        let mut rest = text;
        let mut changed = false;
        for token in root.token_descendants() {
            let form = root.token_form(token)?.to_string();
            let Some(after) = rest.strip_prefix(form.as_str()) else {
                let preview: String = rest.chars().take(20).collect();
                tracing::warn!(
                    "{}: token {form:?} does not match text {preview:?}",
                    root.address()
                );
                return Ok((false, changed));
            };
            let misc = root.token_misc_mut(token)?;
            let before = misc.clone();
            misc.remove("SpacesAfter");
            if after.is_empty() || after.starts_with(char::is_whitespace) {
                misc.remove("SpaceAfter");
                rest = after.trim_start();
            } else {
                misc.set("SpaceAfter", Some("No"));
                rest = after;
            }
            changed |= *misc != before;
        }
        Ok((true, changed))
    }
}
