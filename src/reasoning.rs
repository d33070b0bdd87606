//! Splitting inline reasoning out of streamed content.
//!
//! Many local models (Qwen3, DeepSeek-R1 distills, QwQ) emit their chain of thought
//! inline, wrapped in a marker pair:
//!
//! ```text
//! <think>The user wants a capital city...</think>Paris.
//! ```
//!
//! The markers arrive as ordinary content deltas and can be cut anywhere:
//!
//! ```text
//! Chunk 1: "<thi"
//! Chunk 2: "nk>The user wants...</thi"
//! Chunk 3: "nk>Paris."
//! ```
//!
//! [`ReasoningSplitter`] routes every byte of content to either the reasoning or the
//! answer side. A tail that could still grow into a marker is held back until the
//! next fragment decides it, so markers never leak into either side.

use crate::{Error, Result};

/// The opening/closing marker pair that delimits reasoning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningMarkers {
    pub open: String,
    pub close: String,
}

impl Default for ReasoningMarkers {
    fn default() -> Self {
        Self::new("<think>", "</think>")
    }
}

impl ReasoningMarkers {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.open.is_empty() || self.close.is_empty() {
            return Err(Error::config("reasoning markers must not be empty"));
        }
        if self.open == self.close {
            return Err(Error::config(
                "opening and closing reasoning markers must differ",
            ));
        }
        Ok(())
    }
}

/// A routed piece of content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Reasoning(String),
    Answer(String),
}

/// Incremental router for marker-delimited reasoning.
///
/// Feed fragments with [`push`](Self::push) in arrival order and call
/// [`finish`](Self::finish) once at end of stream. Text outside the markers is
/// answer, text between them is reasoning, the markers themselves are dropped.
/// A closing marker seen outside reasoning is kept as literal answer text.
#[derive(Debug, Clone)]
pub struct ReasoningSplitter {
    markers: ReasoningMarkers,
    /// Unresolved tail: a possible marker prefix
    pending: String,
    inside: bool,
}

impl ReasoningSplitter {
    pub fn new(markers: ReasoningMarkers) -> Self {
        Self {
            markers,
            pending: String::new(),
            inside: false,
        }
    }

    /// Whether the splitter is currently between an opening and closing marker
    pub fn is_inside(&self) -> bool {
        self.inside
    }

    /// Route one fragment, returning the segments it resolved.
    pub fn push(&mut self, fragment: &str) -> Vec<Segment> {
        let mut out = Vec::new();
        if fragment.is_empty() {
            return out;
        }
        self.pending.push_str(fragment);

        loop {
            let marker = if self.inside {
                self.markers.close.as_str()
            } else {
                self.markers.open.as_str()
            };

            if let Some(pos) = self.pending.find(marker) {
                let before: String = self.pending.drain(..pos).collect();
                push_segment(&mut out, self.inside, before);
                self.pending.drain(..marker.len());
                self.inside = !self.inside;
                continue;
            }

            let held = partial_marker_len(&self.pending, marker);
            let resolved_len = self.pending.len() - held;
            let resolved: String = self.pending.drain(..resolved_len).collect();
            push_segment(&mut out, self.inside, resolved);
            return out;
        }
    }

    /// Flush whatever is held back. A dangling marker prefix is literal text.
    pub fn finish(&mut self) -> Vec<Segment> {
        let mut out = Vec::new();
        let rest = std::mem::take(&mut self.pending);
        push_segment(&mut out, self.inside, rest);
        out
    }
}

/// Split a complete text into `(reasoning, answer)`
pub fn split_reasoning(text: &str, markers: &ReasoningMarkers) -> (String, String) {
    let mut splitter = ReasoningSplitter::new(markers.clone());
    let mut reasoning = String::new();
    let mut answer = String::new();
    let segments = splitter.push(text).into_iter().chain(splitter.finish());
    for segment in segments {
        match segment {
            Segment::Reasoning(text) => reasoning.push_str(&text),
            Segment::Answer(text) => answer.push_str(&text),
        }
    }
    (reasoning, answer)
}

fn push_segment(out: &mut Vec<Segment>, inside: bool, text: String) {
    if text.is_empty() {
        return;
    }
    match (out.last_mut(), inside) {
        (Some(Segment::Reasoning(prev)), true) | (Some(Segment::Answer(prev)), false) => {
            prev.push_str(&text)
        }
        (_, true) => out.push(Segment::Reasoning(text)),
        (_, false) => out.push(Segment::Answer(text)),
    }
}

/// Length of the longest suffix of `haystack` that is a proper prefix of `marker`
fn partial_marker_len(haystack: &str, marker: &str) -> usize {
    let max = marker.len().saturating_sub(1).min(haystack.len());
    (1..=max)
        .rev()
        .find(|&len| {
            marker
                .get(..len)
                .is_some_and(|prefix| haystack.ends_with(prefix))
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(chunks: &[&str]) -> (String, String) {
        let mut splitter = ReasoningSplitter::new(ReasoningMarkers::default());
        let mut reasoning = String::new();
        let mut answer = String::new();
        let mut segments = Vec::new();
        for chunk in chunks {
            segments.extend(splitter.push(chunk));
        }
        segments.extend(splitter.finish());
        for segment in segments {
            match segment {
                Segment::Reasoning(t) => reasoning.push_str(&t),
                Segment::Answer(t) => answer.push_str(&t),
            }
        }
        (reasoning, answer)
    }

    /// Every way of cutting `text` into three pieces
    fn all_three_way_splits(text: &str) -> Vec<Vec<&str>> {
        let bounds: Vec<usize> = (0..=text.len())
            .filter(|&i| text.is_char_boundary(i))
            .collect();
        let mut splits = Vec::new();
        for &a in &bounds {
            for &b in bounds.iter().filter(|&&b| b >= a) {
                splits.push(vec![&text[..a], &text[a..b], &text[b..]]);
            }
        }
        splits
    }

    #[test]
    fn test_no_markers_is_all_answer() {
        assert_eq!(
            run(&["The answer is ", "8"]),
            (String::new(), "The answer is 8".to_string())
        );
    }

    #[test]
    fn test_marker_split_across_fragments() {
        let (reasoning, answer) = run(&["<thi", "nk>reasoning here</thi", "nk>answer"]);
        assert_eq!(reasoning, "reasoning here");
        assert_eq!(answer, "answer");
    }

    #[test]
    fn test_marker_mid_fragment() {
        let (reasoning, answer) = run(&["intro <think>plan</think> result"]);
        assert_eq!(reasoning, "plan");
        assert_eq!(answer, "intro  result");
    }

    #[test]
    fn test_every_chunking_gives_same_split() {
        let text = "a<think>b<c</think>d</e<think>f</think>g<thin";
        let expected = ("b<cf".to_string(), "ad</eg<thin".to_string());
        for chunks in all_three_way_splits(text) {
            assert_eq!(run(&chunks), expected, "chunks: {:?}", chunks);
        }
        let chars: Vec<String> = text.chars().map(String::from).collect();
        let refs: Vec<&str> = chars.iter().map(String::as_str).collect();
        assert_eq!(run(&refs), expected);
    }

    #[test]
    fn test_unterminated_marker_keeps_reasoning() {
        let mut splitter = ReasoningSplitter::new(ReasoningMarkers::default());
        let mut segments = splitter.push("ok <think>still thinking");
        segments.extend(splitter.finish());
        assert!(splitter.is_inside());
        assert_eq!(
            segments,
            vec![
                Segment::Answer("ok ".to_string()),
                Segment::Reasoning("still thinking".to_string())
            ]
        );
    }

    #[test]
    fn test_held_prefix_is_released_when_disproved() {
        let mut splitter = ReasoningSplitter::new(ReasoningMarkers::default());
        assert_eq!(splitter.push("1 <"), vec![Segment::Answer("1 ".to_string())]);
        assert_eq!(splitter.push(" 2"), vec![Segment::Answer("< 2".to_string())]);
    }

    #[test]
    fn test_multibyte_text_around_markers() {
        let (reasoning, answer) = run(&["héllo <thi", "nk>ünïcødé</think>ß"]);
        assert_eq!(reasoning, "ünïcødé");
        assert_eq!(answer, "héllo ß");
    }

    #[test]
    fn test_custom_markers() {
        let markers = ReasoningMarkers::new("[[", "]]");
        let (reasoning, answer) = split_reasoning("x[[y]]z", &markers);
        assert_eq!(reasoning, "y");
        assert_eq!(answer, "xz");
    }

    #[test]
    fn test_partial_marker_len() {
        assert_eq!(partial_marker_len("hello world", "<think>"), 0);
        assert_eq!(partial_marker_len("hello <th", "<think>"), 3);
        assert_eq!(partial_marker_len("hello <", "<think>"), 1);
        assert_eq!(partial_marker_len("<think", "<think>"), 6);
        assert_eq!(partial_marker_len("", "<think>"), 0);
    }

    #[test]
    fn test_marker_validation() {
        assert!(ReasoningMarkers::default().validate().is_ok());
        assert!(ReasoningMarkers::new("", "x").validate().is_err());
        assert!(ReasoningMarkers::new("x", "x").validate().is_err());
    }
}
