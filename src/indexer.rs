//! Content indexing: turns sanitized HTML into an ordered word-unit table
//! plus an annotated copy of the markup with one inline marker per word.
//!
//! The annotated document is an immutable value the rendering layer consumes
//! declaratively; nothing here touches a live tree. Offsets live in the
//! `title + ". " + body` coordinate space produced by
//! [`crate::normalizer::compose_full_text`].

use crate::normalizer::{self, normalized_word};
use anyhow::{Context, Result};
use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node};
use std::fmt::Write as _;
use tracing::{debug, warn};

/// One tokenized, indexed, offset-tracked word of the rendered content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordUnit {
    /// Sequence position in document order, 0-based.
    pub index: usize,
    /// Original token including trailing punctuation.
    pub text: String,
    /// Lowercased, punctuation-free matching form.
    pub normalized: String,
    /// Char offset of the token's first character within the full text.
    pub char_offset: usize,
}

#[derive(Debug, Clone)]
pub struct IndexedDocument {
    /// Body markup with every word wrapped in a marker span. The marker's
    /// `data-word-index` attribute is the anchor the highlight effects refer
    /// to; it is owned by the rendered tree and never persisted.
    pub annotated_html: String,
    pub units: Vec<WordUnit>,
    /// Content version this table was computed for. Results whose version no
    /// longer matches the session must be discarded.
    pub version: u64,
}

/// Elements whose subtrees are dropped outright (a trusted sanitizer should
/// have removed them already).
const SKIPPED_ELEMENTS: [&str; 2] = ["script", "style"];
/// Elements re-emitted verbatim: their text must not be re-tokenized, but it
/// still advances the offset counter so later units stay aligned.
const VERBATIM_ELEMENTS: [&str; 2] = ["pre", "code"];
const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Index `(title, html)` into word units and annotated markup.
///
/// Never fails: if the walk goes wrong the original markup is returned
/// unannotated with an empty unit table, so the content still renders.
pub fn index_document(title: &str, html: &str, version: u64) -> IndexedDocument {
    match try_index(title, html, version) {
        Ok(doc) => {
            debug!(version, units = doc.units.len(), "Indexed content");
            doc
        }
        Err(err) => {
            warn!(version, "Content indexing failed; rendering without word anchors: {err:#}");
            IndexedDocument {
                annotated_html: html.to_string(),
                units: Vec::new(),
                version,
            }
        }
    }
}

/// Plain text of `html` under the same traversal rules as indexing, so the
/// spoken text and the unit offsets share a coordinate space.
pub fn extract_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    for child in fragment.root_element().children() {
        collect_text(child, &mut out);
    }
    out
}

struct IndexContext {
    out: String,
    units: Vec<WordUnit>,
    /// Running char counter over the full-text coordinate space.
    counter: usize,
}

fn try_index(title: &str, html: &str, version: u64) -> Result<IndexedDocument> {
    let mut ctx = IndexContext {
        out: String::with_capacity(html.len() * 2),
        units: Vec::new(),
        counter: 0,
    };

    index_title(&mut ctx, title);

    let fragment = Html::parse_fragment(html);
    for child in fragment.root_element().children() {
        walk(child, &mut ctx)?;
    }

    Ok(IndexedDocument {
        annotated_html: ctx.out,
        units: ctx.units,
        version,
    })
}

/// The title is spoken first, so its words are indexed at offset 0. They get
/// no markers here; the host renders the title outside the annotated body.
fn index_title(ctx: &mut IndexContext, title: &str) {
    let title = normalizer::normalize(title);
    let title = title.trim_end_matches('.').trim_end();
    if title.is_empty() {
        return;
    }
    let prefix = format!("{title}. ");
    for run in tokenize_runs(&prefix) {
        if run.is_word {
            ctx.units.push(WordUnit {
                index: ctx.units.len(),
                text: run.text.to_string(),
                normalized: normalized_word(run.text),
                char_offset: run.char_start,
            });
        }
    }
    ctx.counter = prefix.chars().count();
}

fn walk(node: NodeRef<'_, Node>, ctx: &mut IndexContext) -> Result<()> {
    match node.value() {
        Node::Text(text) => annotate_text(ctx, &text),
        Node::Element(element) => {
            let name = element.name();
            if SKIPPED_ELEMENTS.contains(&name) {
                return Ok(());
            }
            if VERBATIM_ELEMENTS.contains(&name) {
                let element_ref =
                    ElementRef::wrap(node).context("element node lost its element value")?;
                ctx.out.push_str(&element_ref.html());
                ctx.counter += element_ref.text().map(|t| t.chars().count()).sum::<usize>();
                return Ok(());
            }
            ctx.out.push('<');
            ctx.out.push_str(name);
            for (attr, value) in element.attrs() {
                let _ = write!(ctx.out, " {attr}=\"{}\"", escape_attr(value));
            }
            ctx.out.push('>');
            for child in node.children() {
                walk(child, ctx)?;
            }
            if !VOID_ELEMENTS.contains(&name) {
                let _ = write!(ctx.out, "</{name}>");
            }
        }
        Node::Document | Node::Fragment => {
            for child in node.children() {
                walk(child, ctx)?;
            }
        }
        Node::Comment(_) | Node::Doctype(_) | Node::ProcessingInstruction(_) => {}
    }
    Ok(())
}

/// Tokenize one text node into alternating space/word runs; word runs become
/// units wrapped in marker spans. The counter advances by the node's full
/// length afterwards so offsets track the un-tokenized source text.
fn annotate_text(ctx: &mut IndexContext, raw: &str) {
    let node_start = ctx.counter;
    for run in tokenize_runs(raw) {
        if run.is_word {
            let unit = WordUnit {
                index: ctx.units.len(),
                text: run.text.to_string(),
                normalized: normalized_word(run.text),
                char_offset: node_start + run.char_start,
            };
            let _ = write!(
                ctx.out,
                "<span class=\"lect-word\" data-word-index=\"{}\" data-word=\"{}\" data-norm=\"{}\" data-offset=\"{}\">{}</span>",
                unit.index,
                escape_attr(&unit.text),
                escape_attr(&unit.normalized),
                unit.char_offset,
                escape_text(&unit.text)
            );
            ctx.units.push(unit);
        } else {
            ctx.out.push_str(&escape_text(run.text));
        }
    }
    ctx.counter = node_start + raw.chars().count();
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(&text),
        Node::Element(element) => {
            if SKIPPED_ELEMENTS.contains(&element.name()) {
                return;
            }
            for child in node.children() {
                collect_text(child, out);
            }
        }
        Node::Document | Node::Fragment => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
        Node::Comment(_) | Node::Doctype(_) | Node::ProcessingInstruction(_) => {}
    }
}

struct Run<'a> {
    text: &'a str,
    char_start: usize,
    is_word: bool,
}

/// Maximal non-space run vs maximal space run, with char-based start offsets.
fn tokenize_runs(raw: &str) -> Vec<Run<'_>> {
    let mut runs = Vec::new();
    let mut run_start_byte = 0usize;
    let mut run_start_char = 0usize;
    let mut char_pos = 0usize;
    let mut current: Option<bool> = None;

    for (byte_idx, ch) in raw.char_indices() {
        let is_word = !ch.is_whitespace();
        match current {
            None => {
                current = Some(is_word);
                run_start_byte = byte_idx;
                run_start_char = char_pos;
            }
            Some(prev) if prev != is_word => {
                runs.push(Run {
                    text: &raw[run_start_byte..byte_idx],
                    char_start: run_start_char,
                    is_word: prev,
                });
                current = Some(is_word);
                run_start_byte = byte_idx;
                run_start_char = char_pos;
            }
            Some(_) => {}
        }
        char_pos += 1;
    }
    if let Some(prev) = current {
        runs.push(Run {
            text: &raw[run_start_byte..],
            char_start: run_start_char,
            is_word: prev,
        });
    }
    runs
}

fn escape_text(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(raw: &str) -> String {
    escape_text(raw).replace('"', "&quot;")
}
