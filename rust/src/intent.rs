//! Keyword-based intent classification and decomposition into stage tasks.
//!
//! This is the producer side of the scheduler: it turns free text into a
//! batch of tagged tasks. Dependencies are left empty on purpose; the tag
//! rules of the graph builder order the stages.

use pyo3::prelude::*;
use serde::Serialize;

use crate::models::{Priority, Task, TaskStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentType {
    Feature,
    Bugfix,
    Refactor,
    Research,
    Deployment,
    Testing,
}

impl IntentType {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentType::Feature => "feature",
            IntentType::Bugfix => "bugfix",
            IntentType::Refactor => "refactor",
            IntentType::Research => "research",
            IntentType::Deployment => "deployment",
            IntentType::Testing => "testing",
        }
    }

    fn from_label(label: &str) -> Self {
        INTENT_KEYWORDS
            .iter()
            .map(|(intent, _)| *intent)
            .find(|intent| intent.as_str() == label)
            .unwrap_or(IntentType::Feature)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    Small,
    Medium,
    Large,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Small => "small",
            Scope::Medium => "medium",
            Scope::Large => "large",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn as_str(self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        }
    }

    fn from_label(label: &str) -> Self {
        match label {
            "complex" => Complexity::Complex,
            "moderate" => Complexity::Moderate,
            _ => Complexity::Simple,
        }
    }

    fn duration_multiplier(self) -> f64 {
        match self {
            Complexity::Simple => 1.0,
            Complexity::Moderate => 1.5,
            Complexity::Complex => 2.5,
        }
    }
}

// Order matters: on equal hit counts the earlier intent wins.
// Keys ending in `*` are stems and match any word they prefix; other keys
// match whole words, allowing a plural or verb ending.
const INTENT_KEYWORDS: &[(IntentType, &[&str])] = &[
    (
        IntentType::Bugfix,
        &["fix", "bug", "error", "crash", "broken", "regression", "fail*"],
    ),
    (
        IntentType::Refactor,
        &["refactor", "clean*", "restructur*", "simplif*", "rename", "extract"],
    ),
    (
        IntentType::Deployment,
        &["deploy*", "release", "ship", "publish", "rollout"],
    ),
    (
        IntentType::Testing,
        &["test", "coverage", "verify", "validat*"],
    ),
    (
        IntentType::Research,
        &["investigat*", "research", "explor*", "analy*", "understand", "compare"],
    ),
    (
        IntentType::Feature,
        &["add", "implement", "create", "build", "support", "new", "feature"],
    ),
];

const LARGE_SCOPE: &[&str] = &["system", "architecture", "entire", "across", "platform", "all"];
const MEDIUM_SCOPE: &[&str] = &["module", "service", "component", "api", "endpoint", "pipeline"];
const COMPLEXITY_HINTS: &[&str] = &[
    "migrat*",
    "distributed",
    "concurren*",
    "security",
    "performance",
    "redesign",
    "scal*",
];

const WORD_ENDINGS: &[&str] = &["s", "es", "d", "ed", "ing"];

fn keyword_matches(word: &str, key: &str) -> bool {
    match key.strip_suffix('*') {
        Some(stem) => word.starts_with(stem),
        None => match word.strip_prefix(key) {
            Some("") => true,
            Some(ending) => WORD_ENDINGS.contains(&ending),
            None => false,
        },
    }
}

/// Classification of one free-text intent.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParsedIntent {
    #[pyo3(get)]
    pub text: String,
    #[pyo3(get)]
    pub intent_type: String,
    #[pyo3(get)]
    pub scope: String,
    #[pyo3(get)]
    pub complexity: String,
    /// Words of the text that matched an intent keyword, in text order.
    #[pyo3(get)]
    pub keywords: Vec<String>,
}

#[pymethods]
impl ParsedIntent {
    fn __repr__(&self) -> String {
        format!(
            "ParsedIntent(type={}, scope={}, complexity={})",
            self.intent_type, self.scope, self.complexity
        )
    }
}

/// One stage of a decomposition: (tag, title, base minutes).
type Stage = (&'static str, &'static str, i64);

fn stages(intent: IntentType) -> &'static [Stage] {
    match intent {
        IntentType::Feature => &[
            ("analysis", "Analyze requirements", 30),
            ("design", "Design the solution", 45),
            ("implementation", "Implement the changes", 120),
            ("testing", "Write and run tests", 60),
            ("documentation", "Update documentation", 30),
        ],
        IntentType::Bugfix => &[
            ("analysis", "Reproduce and diagnose", 30),
            ("implementation", "Fix the defect", 60),
            ("testing", "Add a regression test", 30),
        ],
        IntentType::Refactor => &[
            ("analysis", "Map the affected code", 30),
            ("implementation", "Restructure the code", 90),
            ("testing", "Verify behavior is unchanged", 45),
            ("review", "Review the refactor", 30),
        ],
        IntentType::Research => &[
            ("analysis", "Survey existing material", 60),
            ("documentation", "Write up findings", 45),
        ],
        IntentType::Deployment => &[
            ("testing", "Run release checks", 30),
            ("review", "Approve the release", 15),
            ("deployment", "Deploy", 30),
        ],
        IntentType::Testing => &[
            ("analysis", "Identify coverage gaps", 30),
            ("testing", "Write the tests", 90),
        ],
    }
}

/// Stateless keyword classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentParser;

impl IntentParser {
    pub fn parse(&self, text: &str) -> ParsedIntent {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        let mut best = (IntentType::Feature, 0usize);
        let mut keywords: Vec<String> = Vec::new();
        for (intent, table) in INTENT_KEYWORDS {
            let hits: Vec<&String> = words
                .iter()
                .filter(|w| table.iter().any(|k| keyword_matches(w, k)))
                .collect();
            if hits.len() > best.1 {
                best = (*intent, hits.len());
            }
            for hit in hits {
                if !keywords.contains(hit) {
                    keywords.push(hit.clone());
                }
            }
        }
        // Report keywords in the order they appear in the text.
        keywords.sort_by_key(|k| words.iter().position(|w| w == k));

        let has_any =
            |table: &[&str]| words.iter().any(|w| table.iter().any(|k| keyword_matches(w, k)));
        let scope = if has_any(LARGE_SCOPE) {
            Scope::Large
        } else if has_any(MEDIUM_SCOPE) {
            Scope::Medium
        } else {
            Scope::Small
        };

        let mut score = match scope {
            Scope::Small => 0,
            Scope::Medium => 1,
            Scope::Large => 2,
        };
        if words.len() > 25 {
            score += 1;
        }
        if has_any(COMPLEXITY_HINTS) {
            score += 1;
        }
        let complexity = match score {
            0 => Complexity::Simple,
            1 | 2 => Complexity::Moderate,
            _ => Complexity::Complex,
        };

        ParsedIntent {
            text: text.to_string(),
            intent_type: best.0.as_str().to_string(),
            scope: scope.as_str().to_string(),
            complexity: complexity.as_str().to_string(),
            keywords,
        }
    }

    /// Expand an intent into stage tasks with ids `<prefix>-1`, `<prefix>-2`, ...
    ///
    /// Each task carries its stage tag plus an `intent:<type>` tag that no tag
    /// rule matches.
    /// Bugfixes are P0, research is P2, everything else P1; documentation
    /// stages drop one tier below their intent. Durations scale with complexity.
    pub fn decompose(&self, intent: &ParsedIntent, prefix: &str) -> Vec<Task> {
        let intent_type = IntentType::from_label(&intent.intent_type);
        let complexity = Complexity::from_label(&intent.complexity);
        let priority = match intent_type {
            IntentType::Bugfix => Priority::P0,
            IntentType::Research => Priority::P2,
            _ => Priority::P1,
        };

        stages(intent_type)
            .iter()
            .enumerate()
            .map(|(i, (tag, title, minutes))| {
                let scaled = (*minutes as f64 * complexity.duration_multiplier()).round() as i64;
                let stage_priority = if *tag == "documentation" {
                    match priority {
                        Priority::P0 => Priority::P1,
                        _ => Priority::P2,
                    }
                } else {
                    priority
                };
                Task {
                    id: format!("{}-{}", prefix, i + 1),
                    title: title.to_string(),
                    priority: stage_priority,
                    dependencies: Vec::new(),
                    estimated_time: Some(format!("{}min", scaled)),
                    tags: vec![tag.to_string(), format!("intent:{}", intent_type.as_str())],
                    status: TaskStatus::Queued,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_bugfix() {
        let intent = IntentParser.parse("Fix the crash when saving an empty note");
        assert_eq!(intent.intent_type, "bugfix");
        assert_eq!(intent.keywords, vec!["fix", "crash"]);
        assert_eq!(intent.scope, "small");
        assert_eq!(intent.complexity, "simple");
    }

    #[test]
    fn test_short_keywords_match_whole_words() {
        let intent = IntentParser.parse("Fix the address form");
        assert_eq!(intent.intent_type, "bugfix");
        assert_eq!(intent.keywords, vec!["fix"]);

        let intent = IntentParser.parse("Allow users to export a note");
        assert_eq!(intent.scope, "small");
        assert!(intent.keywords.is_empty());

        let intent = IntentParser.parse("Apply all fixes and add tests");
        assert_eq!(intent.scope, "large");
        assert_eq!(intent.keywords, vec!["fixes", "add", "tests"]);
    }

    #[test]
    fn test_stems_match_word_prefixes() {
        assert!(keyword_matches("analyzing", "analy*"));
        assert!(keyword_matches("migration", "migrat*"));
        assert!(keyword_matches("testing", "test"));
        assert!(!keyword_matches("address", "add"));
        assert!(!keyword_matches("allow", "all"));
    }

    #[test]
    fn test_defaults_to_feature() {
        let intent = IntentParser.parse("a dashboard for goals");
        assert_eq!(intent.intent_type, "feature");
        assert!(intent.keywords.is_empty());
    }

    #[test]
    fn test_scope_and_complexity() {
        let intent =
            IntentParser.parse("Refactor the search service to improve performance");
        assert_eq!(intent.intent_type, "refactor");
        assert_eq!(intent.scope, "medium");
        assert_eq!(intent.complexity, "moderate");

        let intent = IntentParser
            .parse("Migrate the entire system architecture to a distributed task queue");
        assert_eq!(intent.scope, "large");
        assert_eq!(intent.complexity, "complex");
    }

    #[test]
    fn test_decompose_feature_stages() {
        let intent = IntentParser.parse("Add tagging support to notes");
        let tasks = IntentParser.decompose(&intent, "notes");

        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["notes-1", "notes-2", "notes-3", "notes-4", "notes-5"]);
        assert_eq!(tasks[0].tags, vec!["analysis", "intent:feature"]);
        assert_eq!(tasks[2].estimated_time.as_deref(), Some("120min"));
        assert_eq!(tasks[4].priority, Priority::P2);
        assert!(tasks.iter().all(|t| t.dependencies.is_empty()));
    }

    #[test]
    fn test_decompose_scales_durations_and_priority() {
        let intent = ParsedIntent {
            text: String::new(),
            intent_type: "bugfix".to_string(),
            scope: "large".to_string(),
            complexity: "complex".to_string(),
            keywords: vec![],
        };
        let tasks = IntentParser.decompose(&intent, "bug");
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.priority == Priority::P0));
        assert_eq!(tasks[1].estimated_time.as_deref(), Some("150min"));
    }
}
