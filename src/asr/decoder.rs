//! Greedy CTC decoding of per-frame label scores.

use std::sync::LazyLock;

use ndarray::ArrayView2;
use regex::Regex;

use crate::asr::recognizer::{AsrError, BLANK_LABEL};

static WHITESPACE_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\s+"));

#[derive(Debug, Clone)]
pub struct CtcVocabulary {
    labels: Vec<String>,
    blank_idx: usize,
}

impl CtcVocabulary {
    pub fn new(labels: Vec<String>) -> Result<Self, AsrError> {
        let blank_idx = labels
            .iter()
            .position(|l| l == BLANK_LABEL)
            .ok_or_else(|| AsrError::Labels(format!("missing blank label '{BLANK_LABEL}'")))?;
        Ok(Self { labels, blank_idx })
    }

    pub fn from_json(content: &str) -> Result<Self, AsrError> {
        let labels: Vec<String> =
            serde_json::from_str(content).map_err(|e| AsrError::Labels(e.to_string()))?;
        Self::new(labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Argmax per frame, collapse repeats, drop blanks.
    pub fn decode_greedy(&self, logits: ArrayView2<f32>) -> Result<String, AsrError> {
        let mut text = String::new();
        let mut previous: Option<usize> = None;

        for row in logits.rows() {
            let best = row
                .iter()
                .take(self.labels.len())
                .enumerate()
                .fold(None::<(usize, f32)>, |best, (idx, &score)| match best {
                    Some((_, s)) if s >= score => best,
                    _ => Some((idx, score)),
                })
                .map(|(idx, _)| idx)
                .ok_or_else(|| AsrError::Decoder("empty logits row".into()))?;

            if previous != Some(best) && best != self.blank_idx {
                text.push_str(&self.labels[best]);
            }
            previous = Some(best);
        }

        Ok(clean_text(&text))
    }
}

fn clean_text(text: &str) -> String {
    match &*WHITESPACE_RE {
        Ok(re) => re.replace_all(text.trim(), " ").into_owned(),
        Err(_) => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn vocab() -> CtcVocabulary {
        CtcVocabulary::new(
            ["_", " ", "a", "b", "न", "म"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn collapses_repeats_and_blanks() {
        // a a _ a b _ _ " " b
        let logits = array![
            [0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        ];
        assert_eq!(vocab().decode_greedy(logits.view()).unwrap(), "aab b");
    }

    #[test]
    fn output_is_trimmed_and_unicode_safe() {
        let logits = array![
            [0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
        ];
        assert_eq!(vocab().decode_greedy(logits.view()).unwrap(), "नम");
    }

    #[test]
    fn all_blank_is_empty() {
        let logits = array![
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        ];
        assert_eq!(vocab().decode_greedy(logits.view()).unwrap(), "");
    }

    #[test]
    fn labels_require_blank() {
        assert!(matches!(
            CtcVocabulary::from_json(r#"["a", "b"]"#),
            Err(AsrError::Labels(_))
        ));
        assert_eq!(CtcVocabulary::from_json(r#"["_", " ", "a"]"#).unwrap().blank_idx, 0);
    }
}
