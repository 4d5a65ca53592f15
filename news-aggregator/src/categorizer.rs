use crate::types::UNCATEGORIZED;
use serde::{Deserialize, Serialize};

/// One category with the keywords that select it. Rules are evaluated in the
/// order they are configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Sources whose articles always land in this category.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl CategoryRule {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: &[&str]) -> Self {
        self.sources = sources.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Deterministic keyword classifier.
#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: Vec<CategoryRule>,
}

impl Categorizer {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|mut rule| {
                rule.keywords = rule
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                rule
            })
            .collect();
        Self { rules }
    }

    /// First rule with a keyword anywhere in the lower-cased title and body
    /// wins. Keywords match as plain substrings, so "rocket" also fires on
    /// "rockets".
    pub fn categorize(&self, title: &str, body: &str) -> String {
        let text = format!("{} {}", title, body).to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|rule| rule.name.clone())
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    }

    /// Source hints take precedence over keyword matching.
    pub fn categorize_for_source(&self, source: &str, title: &str, body: &str) -> String {
        if let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.sources.iter().any(|s| s.eq_ignore_ascii_case(source)))
        {
            return rule.name.clone();
        }
        self.categorize(title, body)
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

pub fn default_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new(
            "Motorsport",
            &[
                "f1", "formula 1", "racing", "driver", "lap", "podium", "qualifying",
                "grand prix", "verstappen", "hamilton", "ferrari", "mclaren",
                "red bull racing", "pit stop", "championship", "fia", "motorsport",
            ],
        )
        .with_sources(&["The Race", "Motorsport F1", "Racefans"]),
        CategoryRule::new(
            "Tech",
            &[
                "ai", "artificial intelligence", "software", "startup", "chip", "processor",
                "google", "microsoft", "amazon", "cloud", "developer", "programming", "tech",
                "nvidia", "amd", "intel", "semiconductor",
            ],
        )
        .with_sources(&["The Verge", "Ars Technica", "WCCF Tech", "Slashdot"]),
        CategoryRule::new(
            "Gaming",
            &[
                "game", "ps5", "xbox", "steam", "nintendo", "playstation", "gaming",
                "esports", "gamer", "rpg", "fps", "mmo", "release date", "trailer",
            ],
        )
        .with_sources(&["PC Gamer", "IGN"]),
        CategoryRule::new(
            "Security",
            &[
                "hack", "breach", "malware", "ransomware", "cve", "vulnerability",
                "cybersecurity", "phishing", "exploit", "zero-day", "patch", "security",
            ],
        )
        .with_sources(&["Bleeping Computer"]),
        CategoryRule::new(
            "Apple",
            &[
                "iphone", "mac", "ios", "macos", "apple", "ipad", "airpods", "watchos",
                "macbook", "imac", "apple watch", "app store", "tim cook",
            ],
        )
        .with_sources(&["Macrumors", "9to5 Mac"]),
        CategoryRule::new(
            "Hardware",
            &[
                "gpu", "graphics card", "rtx", "radeon", "geforce", "benchmark",
                "overclock", "motherboard", "ram", "ssd", "cpu cooler",
            ],
        )
        .with_sources(&["Videocardz"]),
    ]
}
