// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text flows: paragraph-sized runs of lines, and the annotations inside them.

use std::collections::BTreeMap;
use std::ops::Range;

use lesewerk_core::Rectangle;
use lesewerk_core::config::FlowConfig;
use lesewerk_core::types::{ReconciledPage, ReconciledWord, TextFlow};
use tracing::{debug, instrument, warn};

/// Split reading-ordered words into flows.
///
/// A line joins the flow of the line above when the vertical gap between them
/// is at most `line_gap` times the taller line's height and the two lines
/// overlap horizontally. Returned ranges index into `words`.
pub fn page_flows(words: &[ReconciledWord], line_gap: f64) -> Vec<Range<usize>> {
    let mut flows: Vec<Range<usize>> = Vec::new();
    let mut previous: Option<Rectangle> = None;

    let mut start = 0;
    while start < words.len() {
        let line = words[start].order.line;
        let end = words[start..]
            .iter()
            .position(|w| w.order.line != line)
            .map_or(words.len(), |n| start + n);
        let bounds = words[start + 1..end]
            .iter()
            .fold(*words[start].rect(), |acc, w| acc.union(w.rect()));

        let continues = previous.is_some_and(|above| {
            let gap = bounds.y_min - above.y_max;
            let height = above.height().max(bounds.height());
            gap <= line_gap * height && bounds.x_min <= above.x_max && bounds.x_max >= above.x_min
        });
        match flows.last_mut() {
            Some(flow) if continues => flow.end = end,
            _ => flows.push(start..end),
        }

        previous = Some(bounds);
        start = end;
    }
    flows
}

/// Collect every page's flows and record, for each matched annotation, the
/// flow-relative indices of its words under `describe(contents)`.
///
/// Annotations whose words fall into more than one flow, or that carry no
/// contents, are skipped with a warning. Flows are numbered across the whole
/// document in page and reading order.
#[instrument(skip_all, fields(pages = pages.len()))]
pub fn flows_with_annotations<F>(pages: &[ReconciledPage], config: &FlowConfig, describe: F) -> Vec<TextFlow>
where
    F: Fn(&str) -> String,
{
    let total_words: usize = pages.iter().map(|p| p.words.len()).sum();
    if total_words < config.min_document_words {
        warn!(
            words = total_words,
            required = config.min_document_words,
            "too little text to build flows"
        );
        return Vec::new();
    }

    let mut flows: Vec<TextFlow> = Vec::new();
    let mut annotated = Vec::new();

    for page in pages {
        let mut flow_of_word = vec![0; page.words.len()];
        for range in page_flows(&page.words, config.line_gap) {
            let index = flows.len();
            flow_of_word[range.clone()].fill(index);
            flows.push(TextFlow {
                index,
                page: page.page,
                first_word: range.start,
                words: page.words[range].iter().map(|w| w.text().to_string()).collect(),
                annotated: BTreeMap::new(),
            });
        }
        annotated.resize(flows.len(), false);

        for m in page.matches.iter().filter(|m| !m.words.is_empty()) {
            let id = &m.annotation.id;
            let mut touched: Vec<usize> = m
                .words
                .iter()
                .filter_map(|w| flow_of_word.get(w.word_index).copied())
                .collect();
            touched.sort_unstable();
            touched.dedup();
            let flow_index = match touched.as_slice() {
                [single] => *single,
                [] => continue,
                _ => {
                    warn!(annotation = %id, page = page.page, flows = touched.len(), "annotated words span several flows");
                    continue;
                }
            };
            annotated[flow_index] = true;

            let Some(contents) = m.annotation.contents.as_deref().filter(|c| !c.trim().is_empty()) else {
                warn!(annotation = %id, page = page.page, "annotation without contents");
                continue;
            };

            let flow = &mut flows[flow_index];
            let mut indices: Vec<usize> = m.words.iter().map(|w| w.word_index - flow.first_word).collect();
            indices.sort_unstable();
            indices.dedup();
            if indices.windows(2).any(|pair| pair[1] != pair[0] + 1) {
                warn!(annotation = %id, page = page.page, "annotated words are not contiguous");
            }

            let entry = flow.annotated.entry(describe(contents)).or_default();
            entry.extend(indices);
            entry.sort_unstable();
            entry.dedup();
        }
    }

    if !config.include_unannotated {
        flows.retain(|flow| annotated[flow.index]);
    }
    debug!(flows = flows.len(), "text flows collected");
    flows
}
