//! Natural-language reference resolution against stored records.
//!
//! Resolution decides which existing record(s) a descriptor like "the taxi
//! expense" points at. It is a deterministic scoring function: the
//! completion service extracts, it never decides what gets deleted.
//!
//! Scoring: the descriptor and each record's category + description are
//! normalized (NFKC, lowercased) and tokenized into words plus CJK character
//! bigrams; the base score is the fraction of descriptor tokens found in the
//! record, boosted by exact amount or date mentions. "last"/"most recent"
//! (or the CJK equivalents) bypasses scoring entirely and selects the record
//! with the maximum `created_at`.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use unicode_normalization::UnicodeNormalization;

use crate::{Money, TransactionRecord};

/// Records older than this many days are out of scope unless the query names
/// an explicit date; callers apply the window when listing candidates.
pub const RECENCY_WINDOW_DAYS: i64 = 30;

/// Minimum score a record must reach to be considered a match at all.
pub const MIN_SCORE: f64 = 0.2;

/// Two candidates within this margin of the top score are a tie and must be
/// clarified by the user, never guessed between.
pub const TIE_MARGIN: f64 = 0.1;

const AMOUNT_BOOST: f64 = 0.5;
const DATE_BOOST: f64 = 0.5;

/// A natural-language reference to existing record(s).
#[derive(Clone, Debug)]
pub struct MatchQuery {
    pub descriptor: String,
    /// Set only for the explicitly-recognized bulk form ("delete all taxi
    /// expenses this month"); a singular descriptor never becomes bulk.
    pub bulk: bool,
}

/// One scored candidate.
#[derive(Clone, Debug)]
pub struct ScoredMatch {
    pub record: TransactionRecord,
    pub score: f64,
}

/// Outcome of a resolution pass.
#[derive(Clone, Debug)]
pub enum Resolution {
    /// Nothing scored above [`MIN_SCORE`]; no record may be altered.
    NoMatch,
    /// A single candidate scored uniquely highest.
    Unique(ScoredMatch),
    /// Two or more candidates tied within [`TIE_MARGIN`]; the caller must ask
    /// the user which one was meant.
    Ambiguous(Vec<ScoredMatch>),
    /// The explicit bulk form matched this set.
    Bulk(Vec<ScoredMatch>),
}

/// Resolves `query` against `candidates` (already scoped to the recency
/// window or the explicitly named period by the caller).
pub fn resolve(query: &MatchQuery, candidates: &[TransactionRecord]) -> Resolution {
    if candidates.is_empty() {
        return Resolution::NoMatch;
    }

    if !query.bulk && is_last_reference(&query.descriptor) {
        // Deterministic rule: newest `created_at` wins, text similarity is
        // not consulted.
        let newest = candidates
            .iter()
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .cloned();
        return match newest {
            Some(record) => Resolution::Unique(ScoredMatch { record, score: 1.0 }),
            None => Resolution::NoMatch,
        };
    }

    let query_tokens = tokenize(&query.descriptor, true);
    if query_tokens.is_empty() {
        return Resolution::NoMatch;
    }

    let mut scored: Vec<ScoredMatch> = candidates
        .iter()
        .map(|record| ScoredMatch {
            score: score(&query_tokens, &query.descriptor, record),
            record: record.clone(),
        })
        .filter(|m| m.score >= MIN_SCORE)
        .collect();

    if scored.is_empty() {
        return Resolution::NoMatch;
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.record.created_at.cmp(&a.record.created_at))
    });

    if query.bulk {
        return Resolution::Bulk(scored);
    }

    let top = scored[0].score;
    let tied: Vec<ScoredMatch> = scored
        .into_iter()
        .take_while(|m| top - m.score <= TIE_MARGIN)
        .collect();

    if tied.len() == 1 {
        let Some(only) = tied.into_iter().next() else {
            return Resolution::NoMatch;
        };
        return Resolution::Unique(only);
    }
    Resolution::Ambiguous(tied)
}

fn score(query_tokens: &BTreeSet<String>, descriptor: &str, record: &TransactionRecord) -> f64 {
    let haystack = format!("{} {}", record.category, record.description);
    let record_tokens = tokenize(&haystack, false);

    let hits = query_tokens
        .iter()
        .filter(|t| record_tokens.contains(*t))
        .count();
    let mut score = hits as f64 / query_tokens.len() as f64;

    if mentions_amount(descriptor, record) {
        score += AMOUNT_BOOST;
    }
    if mentions_date(descriptor, record.occurred_on) {
        score += DATE_BOOST;
    }
    score
}

/// True when the descriptor names the record's exact amount, in the record's
/// own currency.
fn mentions_amount(descriptor: &str, record: &TransactionRecord) -> bool {
    descriptor.split_whitespace().any(|token| {
        let token = token.trim_matches(|c: char| !c.is_ascii_digit() && c != '.' && c != ',');
        !token.is_empty()
            && Money::parse_major(token, record.currency)
                .map(|m| m.minor() == record.amount_minor)
                .unwrap_or(false)
    })
}

fn mentions_date(descriptor: &str, occurred_on: NaiveDate) -> bool {
    descriptor
        .split_whitespace()
        .filter_map(|token| NaiveDate::parse_from_str(token, "%Y-%m-%d").ok())
        .any(|d| d == occurred_on)
}

const LAST_KEYWORDS: [&str; 4] = ["last", "latest", "previous", "recent"];
const LAST_KEYWORDS_CJK: [&str; 3] = ["最后", "上一笔", "刚才"];

fn is_last_reference(descriptor: &str) -> bool {
    let normalized = normalize(descriptor);
    if LAST_KEYWORDS_CJK.iter().any(|k| normalized.contains(k)) {
        return true;
    }
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| LAST_KEYWORDS.contains(&word))
}

fn normalize(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

/// Stop words stripped from query text so "delete the taxi entry" scores on
/// "taxi" alone. Record text keeps every token.
const STOP_WORDS: [&str; 18] = [
    "the", "a", "an", "my", "that", "this", "one", "of", "for", "delete", "remove", "drop",
    "entry", "record", "transaction", "expense", "income", "please",
];

fn tokenize(text: &str, strip_stop_words: bool) -> BTreeSet<String> {
    let normalized = normalize(text);
    let mut tokens = BTreeSet::new();

    for word in normalized.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        if word.chars().any(is_cjk) {
            // CJK text has no word boundaries; index single characters and
            // bigrams so partial phrases still overlap.
            let chars: Vec<char> = word.chars().collect();
            for c in &chars {
                tokens.insert(c.to_string());
            }
            for pair in chars.windows(2) {
                tokens.insert(pair.iter().collect());
            }
        } else {
            if strip_stop_words && STOP_WORDS.contains(&word) {
                continue;
            }
            tokens.insert(word.to_string());
        }
    }
    tokens
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::{Currency, RecordKind};

    fn record(category: &str, description: &str, amount_minor: i64, age_minutes: i64) -> TransactionRecord {
        let created_at = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
            - Duration::minutes(age_minutes);
        TransactionRecord {
            id: uuid::Uuid::new_v4(),
            kind: RecordKind::Expense,
            amount_minor,
            currency: Currency::Cny,
            category: category.to_string(),
            description: description.to_string(),
            occurred_on: created_at.date_naive(),
            created_at,
        }
    }

    fn query(descriptor: &str) -> MatchQuery {
        MatchQuery {
            descriptor: descriptor.to_string(),
            bulk: false,
        }
    }

    #[test]
    fn last_selects_max_created_at_regardless_of_text() {
        let mut records: Vec<TransactionRecord> = (1..=10)
            .map(|i| record("Transport", &format!("taxi ride {i}"), 1500, i * 10))
            .collect();
        let newest = record("Food", "midnight noodles", 2000, 0);
        records.push(newest.clone());

        let resolution = resolve(&query("delete the last one"), &records);
        let Resolution::Unique(m) = resolution else {
            panic!("expected unique match");
        };
        assert_eq!(m.record.id, newest.id);
    }

    #[test]
    fn single_distinct_match_is_unique() {
        let records = vec![
            record("Transport", "taxi to airport", 3500, 10),
            record("Food", "lunch", 2000, 20),
        ];
        let resolution = resolve(&query("the taxi expense"), &records);
        let Resolution::Unique(m) = resolution else {
            panic!("expected unique match");
        };
        assert_eq!(m.record.description, "taxi to airport");
    }

    #[test]
    fn two_similar_records_are_ambiguous() {
        let records = vec![
            record("Transport", "taxi to airport", 3500, 10),
            record("Transport", "taxi home", 1500, 20),
            record("Food", "lunch", 2000, 30),
        ];
        let resolution = resolve(&query("the taxi expense"), &records);
        let Resolution::Ambiguous(set) = resolution else {
            panic!("expected ambiguity");
        };
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn amount_mention_breaks_the_tie() {
        let records = vec![
            record("Transport", "taxi to airport", 3500, 10),
            record("Transport", "taxi home", 1500, 20),
        ];
        let resolution = resolve(&query("the 15 taxi"), &records);
        let Resolution::Unique(m) = resolution else {
            panic!("expected unique match");
        };
        assert_eq!(m.record.amount_minor, 1500);
    }

    #[test]
    fn nothing_similar_is_no_match() {
        let records = vec![record("Food", "lunch", 2000, 10)];
        assert!(matches!(
            resolve(&query("the gym membership"), &records),
            Resolution::NoMatch
        ));
    }

    #[test]
    fn cjk_descriptor_matches_cjk_record() {
        let records = vec![
            record("餐饮", "午饭面条", 2000, 10),
            record("交通", "出租车", 1500, 20),
        ];
        let resolution = resolve(&query("删除出租车"), &records);
        let Resolution::Unique(m) = resolution else {
            panic!("expected unique match");
        };
        assert_eq!(m.record.category, "交通");
    }

    #[test]
    fn bulk_returns_every_qualifying_record() {
        let records = vec![
            record("Transport", "taxi to airport", 3500, 10),
            record("Transport", "taxi home", 1500, 20),
            record("Food", "lunch", 2000, 30),
        ];
        let resolution = resolve(
            &MatchQuery {
                descriptor: "taxi".to_string(),
                bulk: true,
            },
            &records,
        );
        let Resolution::Bulk(set) = resolution else {
            panic!("expected bulk set");
        };
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn empty_candidates_is_no_match() {
        assert!(matches!(resolve(&query("taxi"), &[]), Resolution::NoMatch));
    }
}
