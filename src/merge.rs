use similar::{ChangeTag, TextDiff};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MergeKind {
    Same,
    Added,
    Removed,
}

/// One run of equally-classified text in a merged preview.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct MergeSpan {
    pub(crate) kind: MergeKind,
    pub(crate) text: String,
}

/// Word-level merge of a streaming rewrite against the previous document.
///
/// While `is_complete` is false and `new_text` is still a shorter prefix, the
/// baseline is `old_text` truncated to `new_text`'s length so the unseen tail
/// of the old document is not flagged as deleted; that tail is appended
/// unmarked after the diff. Pure and deterministic: callers re-invoke it on
/// every incremental update.
pub(crate) fn merge_spans(old_text: &str, new_text: &str, is_complete: bool) -> Vec<MergeSpan> {
    let truncated = !is_complete && old_text.len() > new_text.len();
    let baseline = if truncated {
        let cut = floor_char_boundary(old_text, new_text.len());
        &old_text[..cut]
    } else {
        old_text
    };

    let diff = TextDiff::from_words(baseline, new_text);
    let mut spans: Vec<MergeSpan> = Vec::new();
    for change in diff.iter_all_changes() {
        let kind = match change.tag() {
            ChangeTag::Equal => MergeKind::Same,
            ChangeTag::Insert => MergeKind::Added,
            ChangeTag::Delete => MergeKind::Removed,
        };
        push_span(&mut spans, kind, change.value());
    }

    if truncated {
        let cut = floor_char_boundary(old_text, new_text.len());
        push_span(&mut spans, MergeKind::Same, &old_text[cut..]);
    }

    spans
}

/// String form of [`merge_spans`]: additions wrapped in `{+...+}`, removals in
/// `[-...-]`, unchanged text passed through.
pub(crate) fn merge_partial(old_text: &str, new_text: &str, is_complete: bool) -> String {
    let mut out = String::with_capacity(new_text.len());
    for span in merge_spans(old_text, new_text, is_complete) {
        match span.kind {
            MergeKind::Same => out.push_str(&span.text),
            MergeKind::Added => {
                out.push_str("{+");
                out.push_str(&span.text);
                out.push_str("+}");
            }
            MergeKind::Removed => {
                out.push_str("[-");
                out.push_str(&span.text);
                out.push_str("-]");
            }
        }
    }
    out
}

fn push_span(spans: &mut Vec<MergeSpan>, kind: MergeKind, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = spans.last_mut() {
        if last.kind == kind {
            last.text.push_str(text);
            return;
        }
    }
    spans.push(MergeSpan {
        kind,
        text: text.to_string(),
    });
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut cut = index;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}
