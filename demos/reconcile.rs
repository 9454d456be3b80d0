//! Fit the tokens of a CoNLL-U file to its `# text` comments
//!
//! Run with: cargo run --example reconcile -- [FILE.conllu[.gz]] [key=value ...]
//!
//! Options are reconciliation parameters such as `allow_goeswith=0` or
//! `max_mwt_length=3`. Without a file, a small built-in sample is used.
//! The reconciled document goes to stdout, a summary to stderr.

use udtree::{Document, ReconcileOptions, Reconciler, read_document, read_file, write_document};

const SAMPLE: &str = "# sent_id = 1
# text = I can't go, alot of work.
1\tI\tI\tPRON\t_\t_\t3\tnsubj\t_\t_
2\tcan\tcan\tAUX\t_\t_\t3\taux\t_\t_
3\tgo\tgo\tVERB\t_\t_\t0\troot\t_\t_
4\talot\talot\tNOUN\t_\t_\t3\tobj\t_\t_
5\tof\tof\tADP\t_\t_\t6\tcase\t_\t_
6\twork\twork\tNOUN\t_\t_\t4\tnmod\t_\t_

";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut path = None;
    let mut options = ReconcileOptions::default();
    for arg in std::env::args().skip(1) {
        match arg.split_once('=') {
            Some((key, value)) => options.set(key, value)?,
            None => path = Some(arg),
        }
    }

    let mut doc: Document = match &path {
        Some(path) => read_file(path)?,
        None => read_document(SAMPLE)?,
    };

    let reconciler = Reconciler::new(options);
    let (mut trees, mut changed, mut unresolved) = (0, 0, 0);
    for tree in doc.trees_mut() {
        if tree.text.is_none() {
            continue;
        }
        let report = reconciler.reconcile(tree)?;
        trees += 1;
        changed += usize::from(report.changed);
        unresolved += report.unresolved;
        if !report.spacing_complete {
            eprintln!("{}: SpaceAfter could not be completed", tree.sent_id());
        }
    }

    print!("{}", write_document(&doc)?);
    eprintln!("{trees} trees, {changed} changed, {unresolved} unresolved edits");
    Ok(())
}
