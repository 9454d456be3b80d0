//! CoNLL-U reading and writing
//!
//! Reads CoNLL-U text into a [`Document`] and writes it back. Multiword token
//! ranges become [`MultiwordToken`](crate::mwt::MultiwordToken)s; empty nodes
//! (decimal IDs) are not modelled and are skipped. DEPS is stored unparsed
//! until first use.
//!
//! Sentence ids of the form `bundle/zone` put consecutive trees with the same
//! bundle id into one bundle.
//!
//! CoNLL-U format: https://universaldependencies.org/format.html

use crate::bundle::Bundle;
use crate::document::Document;
use crate::dualdict::DualDict;
use crate::error::Error;
use crate::links::parse_ord;
use crate::node::{NodeAttrs, NodeId};
use crate::tree::Root;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error while reading or writing CoNLL-U
#[derive(Debug, Error)]
pub enum ConlluError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error at line {line_num}: {message}")]
    Parse { line_num: usize, message: String },

    #[error(transparent)]
    Tree(#[from] Error),
}

fn parse_error(line_num: usize, message: impl Into<String>) -> ConlluError {
    ConlluError::Parse {
        line_num,
        message: message.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowId {
    Word(usize),
    Range(usize, usize),
    Empty,
}

struct Row<'a> {
    line_num: usize,
    id: RowId,
    fields: [&'a str; 10],
}

#[derive(Default)]
struct Sentence<'a> {
    sent_id: Option<&'a str>,
    text: Option<&'a str>,
    newdoc: Option<&'a str>,
    newpar: Option<&'a str>,
    comment: Vec<&'a str>,
    rows: Vec<Row<'a>>,
}

impl Sentence<'_> {
    fn is_empty(&self) -> bool {
        self.rows.is_empty()
            && self.comment.is_empty()
            && self.sent_id.is_none()
            && self.text.is_none()
            && self.newdoc.is_none()
            && self.newpar.is_none()
    }
}

/// Split a token line into its ten tab-separated columns
fn split_fields(line: &str) -> Option<[&str; 10]> {
    let mut fields = [""; 10];
    let mut start = 0;
    let mut n = 0;
    for tab in memchr::memchr_iter(b'\t', line.as_bytes()) {
        if n == 9 {
            return None;
        }
        fields[n] = &line[start..tab];
        n += 1;
        start = tab + 1;
    }
    if n != 9 {
        return None;
    }
    fields[9] = &line[start..];
    Some(fields)
}

fn parse_id(id: &str, line_num: usize) -> Result<RowId, ConlluError> {
    if let Some((start, end)) = id.split_once('-') {
        return match (parse_ord(start), parse_ord(end)) {
            (Some(start), Some(end)) if 0 < start && start < end => Ok(RowId::Range(start, end)),
            _ => Err(parse_error(line_num, format!("invalid range ID {id:?}"))),
        };
    }
    if id.contains('.') {
        return Ok(RowId::Empty);
    }
    match parse_ord(id) {
        Some(ord) if ord > 0 => Ok(RowId::Word(ord)),
        _ => Err(parse_error(line_num, format!("invalid ID {id:?}"))),
    }
}

fn parse_row(line: &str, line_num: usize) -> Result<Row<'_>, ConlluError> {
    let fields = split_fields(line).ok_or_else(|| {
        let found = memchr::memchr_iter(b'\t', line.as_bytes()).count() + 1;
        parse_error(line_num, format!("expected 10 fields, found {found}"))
    })?;
    Ok(Row {
        line_num,
        id: parse_id(fields[0], line_num)?,
        fields,
    })
}

/// `key = value` or a bare `key`
fn split_comment(comment: &str) -> (&str, Option<&str>) {
    match comment.split_once('=') {
        Some((key, value)) => (key.trim(), Some(value.trim())),
        None => (comment.trim(), None),
    }
}

fn add_comment<'a>(sentence: &mut Sentence<'a>, comment: &'a str, meta: &mut rustc_hash::FxHashMap<String, String>) {
    match split_comment(comment) {
        ("sent_id", Some(id)) => sentence.sent_id = Some(id),
        ("text", Some(text)) => sentence.text = Some(text),
        ("newdoc", None) => sentence.newdoc = Some(""),
        ("newdoc id", Some(id)) => sentence.newdoc = Some(id),
        ("newpar", None) => sentence.newpar = Some(""),
        ("newpar id", Some(id)) => sentence.newpar = Some(id),
        (key, Some(value)) if key.starts_with("global.") => {
            meta.insert(key.to_string(), value.to_string());
        }
        _ => sentence.comment.push(comment),
    }
}

/// Empty columns are `_` in CoNLL-U and empty strings in memory
fn column(value: &str) -> String {
    if value == "_" { String::new() } else { value.to_string() }
}

/// DEPS without edges to empty nodes
fn basic_deps(raw: &str, line_num: usize) -> String {
    if !raw.contains('.') {
        return raw.to_string();
    }
    tracing::warn!("line {line_num}: dropping enhanced dependencies on empty nodes in {raw:?}");
    let kept: Vec<&str> = raw
        .split('|')
        .filter(|pair| pair.split_once(':').is_some_and(|(head, _)| !head.contains('.')))
        .collect();
    if kept.is_empty() { "_".to_string() } else { kept.join("|") }
}

fn build_tree(sentence: &Sentence<'_>, zone: &str) -> Result<Root, ConlluError> {
    let mut root = Root::new(zone);
    root.text = sentence.text.map(str::to_string);
    root.newdoc = sentence.newdoc.map(str::to_string);
    root.newpar = sentence.newpar.map(str::to_string);
    for line in &sentence.comment {
        root.add_comment(line);
    }

    let root_id = root.root_id();
    let mut words: Vec<(&Row<'_>, NodeId)> = Vec::with_capacity(sentence.rows.len());
    let mut ranges = Vec::new();
    let mut skipped = 0;
    for row in &sentence.rows {
        match row.id {
            RowId::Empty => skipped += 1,
            RowId::Range(start, end) => ranges.push((row, start, end)),
            RowId::Word(ord) => {
                if ord != words.len() + 1 {
                    return Err(parse_error(
                        row.line_num,
                        format!("expected word {}, found {ord}", words.len() + 1),
                    ));
                }
                let f = &row.fields;
                let attrs = NodeAttrs {
                    form: f[1].to_string(),
                    lemma: column(f[2]),
                    upos: column(f[3]),
                    xpos: column(f[4]),
                    feats: DualDict::from_string(f[5]),
                    deprel: column(f[7]),
                    misc: DualDict::from_string(f[9]),
                };
                words.push((row, root.create_child(root_id, attrs)?));
            }
        }
    }
    if skipped > 0 {
        tracing::warn!(
            "sentence {:?}: skipped {skipped} empty nodes",
            sentence.sent_id.unwrap_or_default()
        );
    }

    for &(row, id) in &words {
        let head = row.fields[6];
        if head != "_" {
            let parent = parse_ord(head)
                .and_then(|ord| root.node_at(ord))
                .ok_or_else(|| parse_error(row.line_num, format!("invalid HEAD {head:?}")))?;
            root.set_parent(id, parent)?;
        }
        root.set_raw_deps(id, &basic_deps(row.fields[8], row.line_num))?;
    }

    for (row, start, end) in ranges {
        let ids: Option<Vec<NodeId>> = (start..=end).map(|ord| root.node_at(ord)).collect();
        let ids = ids.ok_or_else(|| {
            parse_error(row.line_num, format!("range {start}-{end} goes past the last word"))
        })?;
        let mwt = root.create_multiword_token(&ids, row.fields[1])?;
        let token = root.multiword_token_mut(mwt)?;
        token.feats = DualDict::from_string(row.fields[5]);
        if row.fields[9] != "_" {
            token.misc = DualDict::from_string(row.fields[9]);
        }
    }
    Ok(root)
}

fn add_sentence(doc: &mut Document, sentence: &Sentence<'_>) -> Result<(), ConlluError> {
    let (bundle_id, zone) = match sentence.sent_id {
        Some(id) => id.rsplit_once('/').unwrap_or((id, "")),
        None => ("", ""),
    };
    let root = build_tree(sentence, zone)?;

    if let Some(last) = doc.bundles_mut().last_mut() {
        if !bundle_id.is_empty() && last.bundle_id() == bundle_id && !last.has_tree(zone) {
            last.add_tree(root)?;
            return Ok(());
        }
    }
    let bundle_id = if bundle_id.is_empty() {
        doc.next_bundle_id()
    } else {
        bundle_id.to_string()
    };
    doc.add_bundle(Bundle::new(&bundle_id)).add_tree(root)?;
    Ok(())
}

/// Parse a whole CoNLL-U document
pub fn read_document(input: &str) -> Result<Document, ConlluError> {
    let mut doc = Document::new();
    let mut sentence = Sentence::default();
    for (i, line) in input.lines().enumerate() {
        let line_num = i + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !sentence.is_empty() {
                add_sentence(&mut doc, &std::mem::take(&mut sentence))?;
            }
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            add_comment(&mut sentence, comment, &mut doc.meta);
            continue;
        }
        sentence.rows.push(parse_row(line, line_num)?);
    }
    if !sentence.is_empty() {
        add_sentence(&mut doc, &sentence)?;
    }
    Ok(doc)
}

/// Read a CoNLL-U file, gunzipping `*.gz` files on the fly
pub fn read_file(path: impl AsRef<Path>) -> Result<Document, ConlluError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ConlluError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let mut input = String::new();
    if path.extension().is_some_and(|ext| ext == "gz") {
        MultiGzDecoder::new(BufReader::new(file)).read_to_string(&mut input)?;
    } else {
        BufReader::new(file).read_to_string(&mut input)?;
    }
    let mut doc = read_document(&input)?;
    doc.meta
        .insert("loaded_from".to_string(), path.display().to_string());
    Ok(doc)
}

fn or_underscore(value: &str) -> &str {
    if value.is_empty() { "_" } else { value }
}

fn marker(out: &mut String, name: &str, id: &str) {
    if id.is_empty() {
        out.push_str(&format!("# {name}\n"));
    } else {
        out.push_str(&format!("# {name} id = {id}\n"));
    }
}

fn write_tree(out: &mut String, tree: &Root, globals: &[(&String, &String)]) -> Result<(), ConlluError> {
    if let Some(newdoc) = &tree.newdoc {
        marker(out, "newdoc", newdoc);
    }
    for (key, value) in globals {
        out.push_str(&format!("# {key} = {value}\n"));
    }
    if let Some(newpar) = &tree.newpar {
        marker(out, "newpar", newpar);
    }
    let sent_id = tree.sent_id();
    if !sent_id.is_empty() {
        out.push_str(&format!("# sent_id = {sent_id}\n"));
    }
    match &tree.text {
        Some(text) => out.push_str(&format!("# text = {text}\n")),
        None if !tree.is_empty() => {
            out.push_str(&format!("# text = {}\n", tree.compute_text(true)));
        }
        None => {}
    }
    for line in tree.comment.lines() {
        out.push('#');
        out.push_str(line);
        out.push('\n');
    }

    for id in tree.descendants() {
        let node = &tree[id];
        if let Some(mwt) = node.multiword_token() {
            let token = tree.multiword_token(mwt)?;
            if token.first_word() == Some(id) {
                let last = token.last_word().map_or(node.ord(), |w| tree[w].ord());
                out.push_str(&format!(
                    "{}-{}\t{}\t_\t_\t_\t{}\t_\t_\t_\t{}\n",
                    node.ord(),
                    last,
                    or_underscore(&token.form),
                    token.feats,
                    token.misc
                ));
            }
        }
        let head = node.parent().map_or(0, |p| tree[p].ord());
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            node.ord(),
            or_underscore(&node.form),
            or_underscore(&node.lemma),
            or_underscore(&node.upos),
            or_underscore(&node.xpos),
            node.feats,
            head,
            or_underscore(&node.deprel),
            tree.raw_deps(id)?,
            node.misc
        ));
    }
    out.push('\n');
    Ok(())
}

/// Serialize a document as CoNLL-U
pub fn write_document(doc: &Document) -> Result<String, ConlluError> {
    let mut globals: Vec<(&String, &String)> = doc
        .meta
        .iter()
        .filter(|(key, _)| key.starts_with("global."))
        .collect();
    globals.sort();

    let mut out = String::new();
    for (i, tree) in doc.trees().enumerate() {
        let globals = if i == 0 { globals.as_slice() } else { &[] };
        write_tree(&mut out, tree, globals)?;
    }
    Ok(out)
}

pub fn write_file(doc: &Document, path: impl AsRef<Path>) -> Result<(), ConlluError> {
    std::fs::write(path, write_document(doc)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mwt::Token;

    const SAMPLE: &str = "# newdoc id = d1
# sent_id = s1
# text = Vamos al mar.
1\tVamos\tir\tVERB\t_\tMood=Imp\t0\troot\t0:root\t_
2-3\tal\t_\t_\t_\t_\t_\t_\t_\t_
2\ta\ta\tADP\t_\t_\t4\tcase\t4:case\t_
3\tel\tel\tDET\t_\t_\t4\tdet\t4:det\t_
4\tmar\tmar\tNOUN\t_\t_\t1\tobl\t1:obl\tSpaceAfter=No
5\t.\t.\tPUNCT\t_\t_\t1\tpunct\t1:punct\t_

# sent_id = s2
# text = Hola
# translator = someone
1\tHola\thola\tINTJ\t_\t_\t0\troot\t_\t_

";

    #[test]
    fn test_parse_simple_sentence() {
        let conllu = "# text = The dog runs.
1\tThe\tthe\tDET\tDT\t_\t2\tdet\t_\t_
2\tdog\tdog\tNOUN\tNN\t_\t3\tnsubj\t_\t_
3\truns\trun\tVERB\tVBZ\t_\t0\troot\t_\tSpaceAfter=No
4\t.\t.\tPUNCT\t.\t_\t3\tpunct\t_\t_
";
        let doc = read_document(conllu).unwrap();
        let tree = doc.trees().next().unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.text.as_deref(), Some("The dog runs."));
        assert_eq!(tree.sent_id(), "1");

        let runs = tree.syntactic_root().unwrap();
        assert_eq!(tree[runs].form, "runs");
        assert_eq!(tree[runs].lemma, "run");
        assert_eq!(tree.children(runs).unwrap().len(), 2);
        assert!(!tree[runs].space_after());
        assert_eq!(tree.compute_text(true), "The dog runs.");
        tree.validate().unwrap();
    }

    #[test]
    fn test_round_trip() {
        let doc = read_document(SAMPLE).unwrap();
        assert_eq!(write_document(&doc).unwrap(), SAMPLE);
    }

    #[test]
    fn test_multiword_tokens() {
        let doc = read_document(SAMPLE).unwrap();
        let tree = doc.trees().next().unwrap();
        let tokens = tree.token_descendants();
        assert_eq!(tokens.len(), 4);
        assert!(matches!(tokens[1], Token::Multiword(_)));
        assert_eq!(tree.token_form(tokens[1]).unwrap(), "al");
        assert_eq!(tree.compute_text(true), "Vamos al mar.");
        assert_eq!(tree.newdoc.as_deref(), Some("d1"));
    }

    #[test]
    fn test_comments_and_deps() {
        let doc = read_document(SAMPLE).unwrap();
        let second = doc.trees().nth(1).unwrap();
        assert_eq!(second.comment, " translator = someone\n");

        let first = doc.trees().next().unwrap();
        let mar = first.node_at(4).unwrap();
        let deps = first.deps(mar).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].parent, first.node_at(1).unwrap());
        assert_eq!(deps[0].deprel, "obl");
    }

    #[test]
    fn test_zones_share_bundles() {
        let conllu = "# sent_id = s1/gold
1\ta\ta\tX\t_\t_\t0\troot\t_\t_

# sent_id = s1/pred
1\ta\ta\tX\t_\t_\t0\troot\t_\t_

# sent_id = s2/gold
1\tb\tb\tX\t_\t_\t0\troot\t_\t_

";
        let doc = read_document(conllu).unwrap();
        assert_eq!(doc.len(), 2);
        let first = &doc.bundles()[0];
        assert_eq!(first.bundle_id(), "s1");
        assert_eq!(first.trees().len(), 2);
        assert_eq!(first.get_tree("pred").unwrap().sent_id(), "s1/pred");
        assert_eq!(doc.bundles()[1].get_tree("gold").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_nodes_are_skipped() {
        let conllu = "1\tSue\tSue\tPROPN\t_\t_\t2\tnsubj\t2:nsubj|2.1:nsubj\t_
2\tlikes\tlike\tVERB\t_\t_\t0\troot\t0:root\t_
2.1\tlikes\tlike\tVERB\t_\t_\t_\t_\t0:root\t_
";
        let doc = read_document(conllu).unwrap();
        let tree = doc.trees().next().unwrap();
        assert_eq!(tree.len(), 2);
        let sue = tree.node_at(1).unwrap();
        assert_eq!(tree.raw_deps(sue).unwrap(), "2:nsubj");
    }

    #[test]
    fn test_parse_errors() {
        let err = read_document("1\ta\tb\n").unwrap_err();
        assert!(matches!(err, ConlluError::Parse { line_num: 1, .. }));

        let err = read_document("1\ta\t_\t_\t_\t_\t0\troot\t_\t_\n3\tb\t_\t_\t_\t_\t1\tdep\t_\t_\n")
            .unwrap_err();
        assert!(matches!(err, ConlluError::Parse { line_num: 2, .. }));

        let err = read_document("1\ta\t_\t_\t_\t_\t9\troot\t_\t_\n").unwrap_err();
        assert!(err.to_string().contains("invalid HEAD"));

        // Cycle between the two words
        let cyclic = "1\ta\t_\t_\t_\t_\t2\tdep\t_\t_\n2\tb\t_\t_\t_\t_\t1\tdep\t_\t_\n";
        assert!(matches!(
            read_document(cyclic).unwrap_err(),
            ConlluError::Tree(Error::StructuralIntegrity(_))
        ));
    }

    #[test]
    fn test_split_fields() {
        let fields = split_fields("1\ta\tb\tc\td\te\tf\tg\th\ti").unwrap();
        assert_eq!(fields[9], "i");
        assert!(split_fields("1\ta").is_none());
        assert!(split_fields("1\ta\tb\tc\td\te\tf\tg\th\ti\tj").is_none());
        assert_eq!(parse_id("2-3", 1).unwrap(), RowId::Range(2, 3));
        assert_eq!(parse_id("8.1", 1).unwrap(), RowId::Empty);
        assert!(parse_id("3-2", 1).is_err());
        assert!(parse_id("0", 1).is_err());
    }

    #[test]
    fn test_edited_tree_serializes() {
        let mut doc = read_document(SAMPLE).unwrap();
        let tree = doc.trees_mut().next().unwrap();
        let vamos = tree.node_at(1).unwrap();
        let mar = tree.node_at(4).unwrap();
        tree.shift_after_node(vamos, mar).unwrap();

        let out = write_document(&doc).unwrap();
        assert!(out.contains("1-2\tal\t"));
        assert!(out.contains("3\tmar\tmar\tNOUN\t_\t_\t4\tobl\t4:obl\tSpaceAfter=No\n"));
        assert!(out.contains("4\tVamos\tir\tVERB\t_\tMood=Imp\t0\troot\t0:root\t_\n"));

        let reread = read_document(&out).unwrap();
        reread.trees().next().unwrap().validate().unwrap();
    }

    #[test]
    fn test_round_trip_after_removing_mwt_word() {
        let conllu = "1-2\tdel\t_\t_\t_\t_\t_\t_\t_\t_
1\tde\tde\tADP\t_\t_\t3\tcase\t_\t_
2\tel\tel\tDET\t_\t_\t3\tdet\t_\t_
3\tmar\tmar\tNOUN\t_\t_\t0\troot\t_\t_

";
        let mut doc = read_document(conllu).unwrap();
        let tree = doc.trees_mut().next().unwrap();
        let el = tree.node_at(2).unwrap();
        tree.remove(el, crate::tree::OrphanPolicy::Refuse).unwrap();
        tree.validate().unwrap();

        let out = write_document(&doc).unwrap();
        assert!(!out.contains("1-1"));
        assert!(out.contains("1\tde\tde\tADP\t_\t_\t2\tcase\t_\t_\n"));

        let reread = read_document(&out).unwrap();
        let tree = reread.trees().next().unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree.multiword_tokens().is_empty());
        tree.validate().unwrap();
    }

    mod files {
        use super::SAMPLE;
        use crate::conllu::*;
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::fs::File;
        use std::io::Write;

        #[test]
        fn test_read_plain_and_gz() {
            let dir = tempfile::tempdir().unwrap();
            let plain = dir.path().join("sample.conllu");
            std::fs::write(&plain, SAMPLE).unwrap();

            let gz = dir.path().join("sample.conllu.gz");
            let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
            encoder.write_all(SAMPLE.as_bytes()).unwrap();
            encoder.finish().unwrap();

            for path in [&plain, &gz] {
                let doc = read_file(path).unwrap();
                assert_eq!(doc.len(), 2);
                assert_eq!(doc.meta["loaded_from"], path.display().to_string());
            }
        }

        #[test]
        fn test_write_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("out.conllu");
            let doc = read_document(SAMPLE).unwrap();
            write_file(&doc, &path).unwrap();
            assert_eq!(std::fs::read_to_string(&path).unwrap(), SAMPLE);
        }

        #[test]
        fn test_missing_file() {
            let err = read_file("/nonexistent/file.conllu").unwrap_err();
            assert!(matches!(err, ConlluError::FileOpen { .. }));
        }
    }
}
