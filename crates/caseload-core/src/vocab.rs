use serde::{Deserialize, Serialize};

// ── TaskCategory ──────────────────────────────────────────────────────────────

/// Coarse classification of a canonical task, used to split evaluation work
/// from administrative overhead in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskCategory {
    /// Work attributable to assessment cases.
    Evaluation,
    /// Practice overhead (onboarding, internal communication, ...).
    Admin,
    /// Anything the vocabulary could not place, including `"Other"`.
    Uncategorized,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Evaluation => "Evaluation",
            TaskCategory::Admin => "Admin",
            TaskCategory::Uncategorized => "Uncategorized",
        }
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical tasks that count as evaluation work.
const EVALUATION_TASKS: &[&str] = &[
    "Eval Planning",
    "Eval Prep",
    "Scheduling",
    "Guardian Contact",
    "Teacher Contact",
    "School Staff Contact",
    "Rating Scales",
    "Waiting",
    "Testing",
    "Interview and Observation",
    "Scoring and Uploading",
    "Report Writing",
    "Post Eval School Consultation",
    "Meeting Prep",
    "IEP Meeting Attendance",
];

/// Canonical tasks that count as practice administration.
const ADMIN_TASKS: &[&str] = &[
    "Onboarding",
    "Internal Communication",
    "Professional Development",
    "Caseload Organization",
    "Troubleshooting",
];

/// Classify a canonical task name.
pub fn category_of(task: &str) -> TaskCategory {
    if EVALUATION_TASKS.contains(&task) {
        TaskCategory::Evaluation
    } else if ADMIN_TASKS.contains(&task) {
        TaskCategory::Admin
    } else {
        TaskCategory::Uncategorized
    }
}

// ── TaskVocabulary ────────────────────────────────────────────────────────────

/// One keyword rule: if any keyword appears in the case-folded raw task text,
/// the task canonicalizes to `canonical`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRule {
    pub keywords: Vec<String>,
    pub canonical: String,
}

fn default_task_rules() -> Vec<TaskRule> {
    const RULES: &[(&[&str], &str)] = &[
        (&["report"], "Report Writing"),
        (&["testing"], "Testing"),
        (&["interview", "observation"], "Interview and Observation"),
        (&["eval", "planning"], "Eval Planning"),
        (&["scoring", "upload"], "Scoring and Uploading"),
        (&["meeting prep"], "Meeting Prep"),
        (&["iep"], "IEP Meeting Attendance"),
        (&["rating"], "Rating Scales"),
        (&["guardian", "parent"], "Guardian Contact"),
        (&["teacher"], "Teacher Contact"),
        (&["staff"], "School Staff Contact"),
        (&["scheduling"], "Scheduling"),
        (&["onboarding"], "Onboarding"),
        (&["caseload"], "Caseload Organization"),
        (&["pd", "development"], "Professional Development"),
        (&["email", "communication"], "Internal Communication"),
        (&["troubleshoot", "tech"], "Troubleshooting"),
        (&["waiting"], "Waiting"),
    ];
    RULES
        .iter()
        .map(|(keywords, canonical)| TaskRule {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            canonical: canonical.to_string(),
        })
        .collect()
}

/// Ordered keyword rules mapping raw task text to the controlled task
/// vocabulary. First matching rule wins, so rule order is significant
/// ("report writing" must hit Report Writing before "writing" could drift
/// elsewhere).
#[derive(Debug, Clone)]
pub struct TaskVocabulary {
    rules: Vec<TaskRule>,
}

impl TaskVocabulary {
    /// Build the vocabulary, with optional custom rules checked before the
    /// compiled-in defaults.
    pub fn new(custom_rules: Option<Vec<TaskRule>>) -> Self {
        let mut rules = custom_rules.unwrap_or_default();
        rules.extend(default_task_rules());
        Self { rules }
    }

    /// Canonical task for `raw`, or `None` when no rule matched. Callers map
    /// `None` to `"Other"` and keep the original text in the details field.
    pub fn canonicalize(&self, raw: &str) -> Option<String> {
        let folded = raw.to_lowercase();
        let folded = folded.trim();
        if folded.is_empty() {
            return None;
        }
        for rule in &self.rules {
            if rule.keywords.iter().any(|k| folded.contains(k.as_str())) {
                return Some(rule.canonical.clone());
            }
        }
        None
    }
}

impl Default for TaskVocabulary {
    fn default() -> Self {
        Self::new(None)
    }
}

// ── ServiceVocabulary ─────────────────────────────────────────────────────────

/// Extracts service components and the primary service type from accounting
/// line-item descriptions.
pub struct ServiceVocabulary;

impl ServiceVocabulary {
    /// All service components recognizable in a description, in a stable
    /// order. A description can carry several (a base evaluation plus
    /// add-ons).
    pub fn components(description: &str) -> Vec<String> {
        let desc = description.to_lowercase();
        let mut components: Vec<String> = Vec::new();

        if desc.contains("bilingual") {
            if desc.contains("spanish & haitian creole") || desc.contains("spanish and haitian creole")
            {
                components.push("Multilingual Evaluation".to_string());
            } else if desc.contains("haitian creole") {
                components.push("Haitian Creole Evaluation".to_string());
            } else if desc.contains("spanish") {
                components.push("Spanish Evaluation".to_string());
            } else {
                components.push("Bilingual Evaluation".to_string());
            }
        } else if [
            "psychoeducational evaluation",
            "psychoed eval",
            "psychoed evaluation",
            "psychological eval",
            "psychological evaluation",
        ]
        .iter()
        .any(|term| desc.contains(term))
        {
            if desc.contains("cognitive only") {
                components.push("Cognitive Only".to_string());
            } else if desc.contains("educational only") {
                components.push("Educational Only".to_string());
            } else {
                components.push("Full Evaluation".to_string());
            }
        } else if desc.contains("evaluation")
            && !["academic", "iep", "set-up", "setup"]
                .iter()
                .any(|term| desc.contains(term))
        {
            components.push("Full Evaluation".to_string());
        }

        let has_base_evaluation = components.iter().any(|c| {
            matches!(
                c.as_str(),
                "Full Evaluation"
                    | "Cognitive Only"
                    | "Educational Only"
                    | "Bilingual Evaluation"
                    | "Multilingual Evaluation"
                    | "Haitian Creole Evaluation"
                    | "Spanish Evaluation"
            )
        });

        let academic = desc.contains("academic")
            && (desc.contains("assessment") || desc.contains("testing"));
        if academic && !has_base_evaluation {
            components.push("Academic Testing (Add-on)".to_string());
        }
        if desc.contains("iep")
            && (desc.contains("meeting") || desc.contains("presentation"))
            && !has_base_evaluation
        {
            components.push("IEP Meeting (Add-on)".to_string());
        }
        if desc.contains("rating scales") {
            components.push("Rating Scales".to_string());
        }
        if desc.contains("set-up") || desc.contains("setup") {
            components.push("Remote Setup".to_string());
        }

        components
    }

    /// Primary service type for the extracted components, in priority order.
    /// `None` when no component was recognized at all.
    pub fn primary(components: &[String]) -> Option<String> {
        const PRIORITY: &[(&str, &str)] = &[
            ("Multilingual Evaluation", "Multilingual Evaluation"),
            ("Haitian Creole Evaluation", "Haitian Creole Evaluation"),
            ("Spanish Evaluation", "Spanish Evaluation"),
            ("Bilingual Evaluation", "Bilingual Evaluation"),
            ("Cognitive Only", "Cognitive Only"),
            ("Educational Only", "Educational Only"),
            ("Full Evaluation", "Full Evaluation"),
            ("Academic Testing (Add-on)", "Academic Testing (Add-on)"),
            ("IEP Meeting (Add-on)", "IEP Meeting (Add-on)"),
            ("Rating Scales", "Rating Scales"),
            ("Remote Setup", "Setup Fee"),
        ];
        for (component, service) in PRIORITY {
            if components.iter().any(|c| c == component) {
                return Some(service.to_string());
            }
        }
        None
    }

    /// Convenience: primary service type straight from a description.
    pub fn service_type(description: &str) -> Option<String> {
        Self::primary(&Self::components(description))
    }
}
