//! Open documents and linked views.
//!
//! A [`Workspace`] owns [`Document`]s by [`DocId`]. Documents can be linked: a linked document
//! is a view over the same text (optionally only a line range of it). Every change applied
//! through the workspace is replayed on all documents reachable over links.
//!
//! Linked documents either share one undo history or keep their own. Own histories are
//! rebased over changes that came from elsewhere so they stay applicable.
//!
//! ```rust
//! use codeview_core::{DocConfig, LinkOptions, Pos, Workspace};
//!
//! let mut ws = Workspace::new();
//! let main = ws.open("a\nb\nc\nd", DocConfig::default());
//! let part = ws
//!     .link(main, LinkOptions { from: Some(2), to: Some(4), ..LinkOptions::default() })
//!     .unwrap();
//!
//! ws.replace_range(main, "new\n", Pos::new(0, 0), Pos::new(0, 0), None).unwrap();
//! let part_doc = ws.doc(part).unwrap();
//! assert_eq!(part_doc.first_line(), 3);
//! assert_eq!(part_doc.get_value(None), "c\nd");
//! ```

use crate::change::Change;
use crate::config::DocConfig;
use crate::document::Document;
use crate::error::DocError;
use crate::history::History;
use crate::mode::ModeHandle;
use crate::pos::Pos;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

/// Opaque identifier of a document in a [`Workspace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId(u64);

impl DocId {
    /// Get the underlying numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Options of [`Workspace::link`].
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    /// First line of the new view (defaults to the source's first line).
    pub from: Option<usize>,
    /// Line after the last one of the new view (defaults to the source's end).
    pub to: Option<usize>,
    /// Share the undo history with the source.
    pub shared_history: bool,
    /// Mode of the new view (defaults to the source's mode).
    pub mode: Option<ModeHandle>,
}

#[derive(Debug, Clone, Copy)]
struct Link {
    target: DocId,
    shared_history: bool,
}

#[derive(Debug)]
struct DocEntry {
    doc: Document,
    links: Vec<Link>,
}

type SharedHistory = Rc<RefCell<History>>;

/// A collection of documents and the links between them.
#[derive(Default)]
pub struct Workspace {
    next_doc_id: u64,
    docs: BTreeMap<DocId, DocEntry>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let links: usize = self.docs.values().map(|e| e.links.len()).sum();
        f.debug_struct("Workspace")
            .field("doc_count", &self.docs.len())
            .field("link_count", &(links / 2))
            .finish()
    }
}

impl Workspace {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Returns `true` if no document is open.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Open a new document.
    pub fn open(&mut self, text: &str, config: DocConfig) -> DocId {
        self.insert(Document::with_config(text, config))
    }

    /// Take ownership of an existing document.
    pub fn insert(&mut self, doc: Document) -> DocId {
        let id = DocId(self.next_doc_id);
        self.next_doc_id = self.next_doc_id.saturating_add(1);
        self.docs.insert(id, DocEntry { doc, links: Vec::new() });
        id
    }

    /// Close a document, unlinking it from everything first, and hand it back.
    pub fn close(&mut self, id: DocId) -> Result<Document, DocError> {
        let targets: Vec<DocId> = self.entry(id)?.links.iter().map(|l| l.target).collect();
        for target in targets {
            self.unlink(id, target)?;
        }
        let entry = self.docs.remove(&id).ok_or(DocError::UnknownDocument(id))?;
        debug!(doc = id.get(), "document closed");
        Ok(entry.doc)
    }

    fn entry(&self, id: DocId) -> Result<&DocEntry, DocError> {
        self.docs.get(&id).ok_or(DocError::UnknownDocument(id))
    }

    fn entry_mut(&mut self, id: DocId) -> Result<&mut DocEntry, DocError> {
        self.docs.get_mut(&id).ok_or(DocError::UnknownDocument(id))
    }

    /// Read access to a document.
    pub fn doc(&self, id: DocId) -> Result<&Document, DocError> {
        Ok(&self.entry(id)?.doc)
    }

    /// Run `f` on a document, then replay the changes it made on every linked document.
    ///
    /// Mutating a linked document directly (outside this method) does not propagate.
    pub fn with_doc<R>(&mut self, id: DocId, f: impl FnOnce(&mut Document) -> R) -> Result<R, DocError> {
        let result = f(&mut self.entry_mut(id)?.doc);
        self.propagate(id);
        Ok(result)
    }

    /// Create a view over lines `from..to` of `source`, linked to it.
    pub fn link(&mut self, source: DocId, options: LinkOptions) -> Result<DocId, DocError> {
        let src = &self.entry(source)?.doc;
        let from = options.from.unwrap_or(src.first_line());
        let to = options.to.unwrap_or(src.first_line() + src.line_count());
        if from < src.first_line() || to > src.first_line() + src.line_count() || from >= to {
            return Err(DocError::LineOutOfRange {
                line: from.max(to),
                first: src.first_line(),
                end: src.first_line() + src.line_count(),
            });
        }
        let last = to - 1;
        let text = src.get_range(Pos::new(from, 0), Pos::new(last, usize::MAX), Some("\n"));
        let config = DocConfig {
            line_separator: None,
            ..src.config().clone()
        };
        let mode = options.mode.unwrap_or_else(|| src.mode().clone());
        let mut doc = Document::with_mode(&text, config, mode).with_first_line(from);
        doc.config.line_separator = src.config().line_separator.clone();
        if options.shared_history {
            doc.history = Rc::clone(&src.history);
            doc.clean_generation = src.clean_generation;
        }
        doc.set_linked(true);

        let id = self.insert(doc);
        let shared_history = options.shared_history;
        let src = self.entry_mut(source)?;
        src.doc.set_linked(true);
        src.links.push(Link { target: id, shared_history });
        self.entry_mut(id)?.links.push(Link {
            target: source,
            shared_history,
        });
        debug!(source = source.get(), doc = id.get(), from, to, shared_history, "linked document created");
        Ok(id)
    }

    /// Remove the link between `a` and `b`. Returns `false` if they were not linked.
    ///
    /// If the pair shared a history, `b` (and every document still sharing through it) gets its
    /// own copy.
    pub fn unlink(&mut self, a: DocId, b: DocId) -> Result<bool, DocError> {
        self.entry(b)?;
        let entry_a = self.entry_mut(a)?;
        let Some(index) = entry_a.links.iter().position(|l| l.target == b) else {
            return Ok(false);
        };
        entry_a.links.remove(index);
        if entry_a.links.is_empty() {
            entry_a.doc.set_linked(false);
        }
        let history_a = Rc::clone(&entry_a.doc.history);

        let entry_b = self.entry_mut(b)?;
        entry_b.links.retain(|l| l.target != a);
        if entry_b.links.is_empty() {
            entry_b.doc.set_linked(false);
        }
        if Rc::ptr_eq(&history_a, &entry_b.doc.history) {
            let copy: SharedHistory = Rc::new(RefCell::new(history_a.borrow().clone()));
            for id in self.shared_group(b) {
                if let Some(entry) = self.docs.get_mut(&id) {
                    entry.doc.history = Rc::clone(&copy);
                }
            }
        }
        debug!(a = a.get(), b = b.get(), "documents unlinked");
        Ok(true)
    }

    /// `id` and every document reachable from it over shared-history links.
    fn shared_group(&self, id: DocId) -> Vec<DocId> {
        let mut group = vec![id];
        let mut i = 0;
        while i < group.len() {
            if let Some(entry) = self.docs.get(&group[i]) {
                for link in entry.links.iter().filter(|l| l.shared_history) {
                    if !group.contains(&link.target) {
                        group.push(link.target);
                    }
                }
            }
            i += 1;
        }
        group
    }

    /// Documents directly linked to `id`.
    pub fn linked(&self, id: DocId) -> Result<Vec<DocId>, DocError> {
        Ok(self.entry(id)?.links.iter().map(|l| l.target).collect())
    }

    /// Apply a change to a document and its linked documents.
    pub fn apply_change(&mut self, id: DocId, change: Change) -> Result<(), DocError> {
        self.with_doc(id, |doc| doc.apply_change(change))?
    }

    /// Replace a range of a document and its linked documents.
    pub fn replace_range(
        &mut self,
        id: DocId,
        text: &str,
        from: Pos,
        to: Pos,
        origin: Option<&str>,
    ) -> Result<(), DocError> {
        self.with_doc(id, |doc| doc.replace_range(text, from, to, origin))?
    }

    /// Undo in a document; the reverted changes reach linked documents.
    pub fn undo(&mut self, id: DocId) -> Result<bool, DocError> {
        self.with_doc(id, Document::undo)
    }

    /// Redo in a document; the changes reach linked documents.
    pub fn redo(&mut self, id: DocId) -> Result<bool, DocError> {
        self.with_doc(id, Document::redo)
    }

    fn propagate(&mut self, source: DocId) {
        let Some(entry) = self.docs.get_mut(&source) else {
            return;
        };
        let changes = entry.doc.take_outbox();
        if changes.is_empty() {
            return;
        }
        let source_history = Rc::clone(&entry.doc.history);
        for change in &changes {
            let mut rebased = vec![Rc::clone(&source_history)];
            self.propagate_change(source, None, true, change, &mut rebased);
        }
        debug!(doc = source.get(), changes = changes.len(), "changes propagated to linked documents");
    }

    fn propagate_change(
        &mut self,
        at: DocId,
        came_from: Option<DocId>,
        shared: bool,
        change: &Change,
        rebased: &mut Vec<SharedHistory>,
    ) {
        let links = match self.docs.get(&at) {
            Some(entry) => entry.links.clone(),
            None => return,
        };
        for link in links {
            if Some(link.target) == came_from {
                continue;
            }
            let shared = shared && link.shared_history;
            let Some(entry) = self.docs.get_mut(&link.target) else {
                continue;
            };
            let doc = &mut entry.doc;
            if !shared && !rebased.iter().any(|h| Rc::ptr_eq(h, &doc.history)) {
                doc.history.borrow_mut().rebase(change);
                rebased.push(Rc::clone(&doc.history));
            }
            doc.operation(|d| d.apply_linked_change(change));
            self.propagate_change(link.target, Some(at), shared, change, rebased);
        }
    }
}
