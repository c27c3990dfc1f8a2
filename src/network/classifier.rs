//! 挑战页识别
//!
//! 大小写不敏感的子串匹配。宁可误报：误判只会让编排器换下一个策略。

use std::fmt;

const DEFAULT_MARKERS: &[&str] = &[
    "captcha",
    "robot check",
    "verify you're a human",
    "checking your browser",
    "sorry, we just need to make sure you're not a robot",
    "to discuss automated access to amazon data please contact",
];

/// 判定为挑战页的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeReason {
    /// 内容为空
    Empty,
    /// 命中的标记短语
    Marker(String),
}

impl fmt::Display for ChallengeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeReason::Empty => f.write_str("empty content"),
            ChallengeReason::Marker(m) => write!(f, "marker '{}'", m),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Challenge(ChallengeReason),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

/// 挑战页分类器
#[derive(Debug, Clone)]
pub struct ChallengeClassifier {
    /// 统一存为小写
    markers: Vec<String>,
}

impl ChallengeClassifier {
    pub fn new() -> Self {
        Self::with_markers(DEFAULT_MARKERS.iter().copied())
    }

    pub fn with_markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classifier = Self {
            markers: Vec::new(),
        };
        classifier.extend(markers);
        classifier
    }

    /// 追加标记
    pub fn extend<I, S>(&mut self, markers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.markers.extend(
            markers
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty()),
        );
    }

    pub fn classify(&self, content: &str) -> Verdict {
        if content.trim().is_empty() {
            return Verdict::Challenge(ChallengeReason::Empty);
        }

        let haystack = content.to_lowercase();
        match self.markers.iter().find(|m| haystack.contains(m.as_str())) {
            Some(marker) => Verdict::Challenge(ChallengeReason::Marker(marker.clone())),
            None => Verdict::Valid,
        }
    }
}

impl Default for ChallengeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_default_marker_is_a_challenge_in_any_case() {
        let classifier = ChallengeClassifier::new();
        for marker in DEFAULT_MARKERS {
            let upper = format!("<html><body>{}</body></html>", marker.to_uppercase());
            assert!(
                !classifier.classify(&upper).is_valid(),
                "marker not detected: {}",
                marker
            );
        }
    }

    #[test]
    fn content_without_markers_is_valid() {
        let classifier = ChallengeClassifier::new();
        assert_eq!(classifier.classify("<html>OK</html>"), Verdict::Valid);
        assert_eq!(
            classifier.classify("<div id=\"productTitle\">USB cable</div>"),
            Verdict::Valid
        );
    }

    #[test]
    fn empty_or_blank_content_is_a_challenge() {
        let classifier = ChallengeClassifier::new();
        assert_eq!(
            classifier.classify(""),
            Verdict::Challenge(ChallengeReason::Empty)
        );
        assert_eq!(
            classifier.classify(" \n\t "),
            Verdict::Challenge(ChallengeReason::Empty)
        );
    }

    #[test]
    fn reason_names_the_matched_marker() {
        let classifier = ChallengeClassifier::new();
        let verdict = classifier.classify("Type the characters: CAPTCHA");
        assert_eq!(
            verdict,
            Verdict::Challenge(ChallengeReason::Marker("captcha".into()))
        );
    }

    #[test]
    fn markers_are_extensible() {
        let mut classifier = ChallengeClassifier::with_markers(["Just a moment"]);
        assert!(!classifier.classify("<title>just a moment...</title>").is_valid());
        assert!(classifier.classify("access denied").is_valid());

        classifier.extend(["Access Denied", "  "]);
        assert!(!classifier.classify("ACCESS DENIED").is_valid());
    }
}
