use news_aggregator::categorizer::{default_rules, CategoryRule, Categorizer};
use news_aggregator::types::UNCATEGORIZED;

#[test]
fn first_matching_rule_wins() {
    let categorizer = Categorizer::new(vec![
        CategoryRule::new("space", &["nasa", "rocket"]),
        CategoryRule::new("science", &["rocket", "physics"]),
    ]);

    assert_eq!(categorizer.categorize("NASA launches new rocket", ""), "space");
    assert_eq!(categorizer.categorize("New physics result", "Quarks"), "science");
}

#[test]
fn categorize_is_deterministic() {
    let categorizer = Categorizer::default();
    let title = "Nvidia announces new GPU";
    let body = "The graphics card ships next month.";
    let first = categorizer.categorize(title, body);
    for _ in 0..10 {
        assert_eq!(categorizer.categorize(title, body), first);
    }
}

#[test]
fn no_match_yields_uncategorized() {
    let categorizer = Categorizer::new(vec![CategoryRule::new("space", &["nasa"])]);
    assert_eq!(categorizer.categorize("Local bakery opens", "Fresh bread"), UNCATEGORIZED);
}

#[test]
fn keywords_match_anywhere_in_the_text() {
    let categorizer = Categorizer::new(vec![
        CategoryRule::new("space", &["nasa", "rocket"]),
        CategoryRule::new("security", &["hack"]),
    ]);
    assert_eq!(categorizer.categorize("Two rockets launched", ""), "space");
    assert_eq!(categorizer.categorize("Hackers leak data", ""), "security");
    assert_eq!(categorizer.categorize("Accounts hacked", "again"), "security");
    assert_eq!(categorizer.categorize("Local bakery opens", "Fresh bread"), UNCATEGORIZED);
}

#[test]
fn multi_word_keywords_match_across_title_and_body() {
    let categorizer = Categorizer::new(vec![CategoryRule::new("Motorsport", &["grand prix"])]);
    assert_eq!(
        categorizer.categorize("Weekend recap", "The Monaco Grand Prix was wet"),
        "Motorsport"
    );
}

#[test]
fn body_text_counts_and_keywords_are_case_insensitive() {
    let categorizer = Categorizer::new(vec![CategoryRule::new("Security", &["Ransomware"])]);
    assert_eq!(
        categorizer.categorize("Hospital systems down", "A RANSOMWARE gang claimed it"),
        "Security"
    );
}

#[test]
fn source_hints_take_precedence_over_keywords() {
    let categorizer = Categorizer::default();
    assert_eq!(
        categorizer.categorize_for_source("Macrumors", "Ferrari wins", "grand prix recap"),
        "Apple"
    );
    // Pure categorize never looks at sources.
    assert_eq!(categorizer.categorize("Ferrari wins", "grand prix recap"), "Motorsport");
}

#[test]
fn default_rules_keep_their_priority_order() {
    let names: Vec<String> = default_rules().into_iter().map(|r| r.name).collect();
    assert_eq!(
        names,
        vec!["Motorsport", "Tech", "Gaming", "Security", "Apple", "Hardware"]
    );
}
