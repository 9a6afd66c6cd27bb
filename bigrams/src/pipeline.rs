//! Bigram histogram: how many distinct word bigrams share each occurrence count.
//!
//! lines -> bigram records -> counted bigrams -> histogram groups -> histogram entries

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        context::Context,
        rdd::RddIndex,
        spark::{hash_partitioner::HashPartitioner, Spark},
    },
    error::{Error, Result},
};

pub const TOY_CORPUS: [&str; 6] = [
    "the cat sat on the mat every day",
    "the cat ate a mouse every day",
    "the cat and the man became friends",
    "I like to eat pizza, but so does the cat.",
    "my cat has a meme coin named after him",
    "I eat pizza every day",
];

// letters, numbers and underscore; combining marks and other connectors split words
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}_]+").unwrap());

/// One occurrence of a bigram. Not deduplicated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigramRecord {
    pub bigram: String,
    pub count: u64,
}

impl BigramRecord {
    fn into_pair(self) -> (String, u64) {
        (self.bigram, self.count)
    }
}

/// Total occurrences of one distinct bigram.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CountedBigram {
    pub bigram: String,
    pub count: u64,
}

/// All distinct bigrams sharing one total count. The order of `bigrams` is not defined.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramGroup {
    pub count: u64,
    pub bigrams: Vec<String>,
}

impl HistogramGroup {
    pub fn project(self) -> HistogramEntry {
        HistogramEntry {
            count: self.count,
            num_bigrams: self.bigrams.len(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HistogramEntry {
    pub count: u64,
    pub num_bigrams: usize,
}

/// Maximal runs of letters, numbers and `_` of the lower-cased line.
pub fn tokenize(line: &str) -> Vec<String> {
    let line = line.to_lowercase();
    WORD.find_iter(&line)
        .map(|token| token.as_str().to_string())
        .collect()
}

/// Every pair of adjacent tokens of `line`, left to right. Lines with fewer than two tokens
/// yield nothing.
pub fn extract_bigrams(line: String) -> Vec<BigramRecord> {
    tokenize(&line)
        .windows(2)
        .map(|pair| BigramRecord {
            bigram: format!("{} {}", pair[0], pair[1]),
            count: 1,
        })
        .collect()
}

fn counted_bigrams_rdd(
    spark: &mut Spark,
    lines: Vec<String>,
    partitions: usize,
) -> RddIndex<CountedBigram> {
    let lines = spark.parallelize(lines, partitions);
    let records = spark.flat_map(lines, extract_bigrams);
    let pairs = spark.map(records, BigramRecord::into_pair);
    let summed = spark.sum_by_key(pairs, HashPartitioner::new(partitions));
    spark.map(summed, |(bigram, count)| CountedBigram { bigram, count })
}

/// Total occurrences of every distinct bigram, in no particular order.
pub async fn count_bigrams(
    spark: &mut Spark,
    lines: Vec<String>,
    partitions: usize,
) -> Result<Vec<CountedBigram>> {
    let counted = counted_bigrams_rdd(spark, lines, partitions);
    spark.collect(counted).await
}

/// Bigram groups keyed by their shared count, in no particular order.
pub async fn histogram_groups(
    spark: &mut Spark,
    lines: Vec<String>,
    partitions: usize,
) -> Result<Vec<HistogramGroup>> {
    let groups = histogram_groups_rdd(spark, lines, partitions);
    spark.collect(groups).await
}

fn histogram_groups_rdd(
    spark: &mut Spark,
    lines: Vec<String>,
    partitions: usize,
) -> RddIndex<HistogramGroup> {
    let counted = counted_bigrams_rdd(spark, lines, partitions);
    let by_count = spark.map(counted, |c: CountedBigram| (c.count, c.bigram));
    let grouped = spark.group_by(by_count, HashPartitioner::new(partitions));
    spark.map(grouped, |(count, bigrams)| HistogramGroup { count, bigrams })
}

/// Runs the whole pipeline on the engine. Entries come back in no particular order.
pub async fn run(
    spark: &mut Spark,
    lines: Vec<String>,
    partitions: usize,
) -> Result<Vec<HistogramEntry>> {
    info!(
        "counting bigrams of {} lines in {partitions} partitions",
        lines.len()
    );
    let groups = histogram_groups_rdd(spark, lines, partitions);
    let entries = spark.map(groups, HistogramGroup::project);
    let entries = spark.collect(entries).await?;
    info!("histogram has {} distinct counts", entries.len());
    Ok(entries)
}

/// Single threaded rendition of `run`, sorted by count.
pub fn run_sequential(lines: &[String]) -> Vec<HistogramEntry> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for record in lines.iter().cloned().flat_map(extract_bigrams) {
        *counts.entry(record.bigram).or_default() += record.count;
    }
    let mut groups: BTreeMap<u64, Vec<String>> = BTreeMap::new();
    for (bigram, count) in counts {
        groups.entry(count).or_default().push(bigram);
    }
    groups
        .into_iter()
        .map(|(count, bigrams)| HistogramGroup { count, bigrams }.project())
        .collect()
}

/// Splits `bytes` on `\n` (dropping a trailing `\r`), one line per record. A final newline
/// doesn't start another line.
pub fn parse_lines(bytes: &[u8]) -> Result<Vec<String>> {
    let mut raw_lines: Vec<&[u8]> = bytes.split(|b| *b == b'\n').collect();
    if raw_lines.last().map_or(false, |last| last.is_empty()) {
        raw_lines.pop();
    }
    raw_lines
        .into_iter()
        .enumerate()
        .map(|(i, raw)| {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            String::from_utf8(raw.to_vec()).map_err(|_| Error::MalformedLine { line: i + 1 })
        })
        .collect()
}

pub async fn read_lines(path: &Path) -> Result<Vec<String>> {
    let bytes = tokio::fs::read(path).await?;
    parse_lines(&bytes)
}

pub fn toy_corpus() -> Vec<String> {
    TOY_CORPUS.iter().map(|line| line.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, io::Write};

    use proptest::prelude::*;

    use super::*;
    use crate::Config;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|line| line.to_string()).collect()
    }

    async fn engine(workers: usize) -> Spark {
        Spark::new(&Config {
            workers,
            partitions: 4,
        })
        .await
    }

    fn sorted(mut entries: Vec<HistogramEntry>) -> Vec<HistogramEntry> {
        entries.sort();
        entries
    }

    fn entry(count: u64, num_bigrams: usize) -> HistogramEntry {
        HistogramEntry { count, num_bigrams }
    }

    #[test]
    fn test_tokenize_folds_case_and_drops_punctuation() {
        assert_eq!(tokenize("THE Cat, sat."), vec!["the", "cat", "sat"]);
        assert_eq!(tokenize("snake_case and x2"), vec!["snake_case", "and", "x2"]);
        assert!(tokenize("  ...  ").is_empty());
    }

    #[test]
    fn test_tokenize_unicode_word_boundaries() {
        // combining acute accent ends the word
        assert_eq!(tokenize("cafe\u{301} au lait"), vec!["cafe", "au", "lait"]);
        // superscript two is a number
        assert_eq!(tokenize("x\u{b2} y z"), vec!["x\u{b2}", "y", "z"]);
        // undertie is punctuation, not part of a word
        assert_eq!(tokenize("a\u{203f}b c"), vec!["a", "b", "c"]);
        assert_eq!(tokenize("ÉTÉ Über"), vec!["été", "über"]);
        assert_eq!(
            extract_bigrams("x\u{b2} y".to_string())[0].bigram,
            "x\u{b2} y"
        );
    }

    #[test]
    fn test_extract_bigrams() {
        let records = extract_bigrams("The cat sat".to_string());
        assert_eq!(
            records,
            vec![
                BigramRecord {
                    bigram: "the cat".to_string(),
                    count: 1
                },
                BigramRecord {
                    bigram: "cat sat".to_string(),
                    count: 1
                },
            ]
        );
        assert!(extract_bigrams("alone".to_string()).is_empty());
        assert!(extract_bigrams(String::new()).is_empty());
    }

    #[test]
    fn test_case_insensitive_bigrams() {
        assert_eq!(
            extract_bigrams("THE CAT".to_string()),
            extract_bigrams("the cat".to_string())
        );
    }

    #[test]
    fn test_sequential_example() {
        assert_eq!(
            run_sequential(&lines(&["the cat sat", "the cat ate"])),
            vec![entry(1, 2), entry(2, 1)]
        );
    }

    #[tokio::test]
    async fn test_engine_example() {
        let mut spark = engine(2).await;
        let result = run(&mut spark, lines(&["the cat sat", "the cat ate"]), 2)
            .await
            .unwrap();
        assert_eq!(sorted(result), vec![entry(1, 2), entry(2, 1)]);
    }

    #[tokio::test]
    async fn test_toy_corpus() {
        let mut spark = engine(4).await;
        let result = run(&mut spark, toy_corpus(), 3).await.unwrap();
        let expected = vec![entry(1, 31), entry(2, 1), entry(3, 1), entry(4, 1)];
        assert_eq!(sorted(result), expected);
        assert_eq!(run_sequential(&toy_corpus()), expected);
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let mut spark = engine(2).await;
        assert!(run(&mut spark, Vec::new(), 4).await.unwrap().is_empty());
        assert!(run(&mut spark, lines(&["one", "", "!!"]), 2)
            .await
            .unwrap()
            .is_empty());
        assert!(run_sequential(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_counts_add_up() {
        let corpus = toy_corpus();
        let total_pairs: u64 = corpus
            .iter()
            .map(|line| tokenize(line).len().saturating_sub(1) as u64)
            .sum();

        let mut spark = engine(3).await;
        let counted = count_bigrams(&mut spark, corpus.clone(), 4).await.unwrap();
        assert_eq!(counted.iter().map(|c| c.count).sum::<u64>(), total_pairs);
        let mut distinct: Vec<_> = counted.iter().map(|c| c.bigram.clone()).collect();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), counted.len());

        let entries = run(&mut spark, corpus, 4).await.unwrap();
        assert_eq!(
            entries.iter().map(|e| e.num_bigrams).sum::<usize>(),
            counted.len()
        );
        assert_eq!(
            entries
                .iter()
                .map(|e| e.count * e.num_bigrams as u64)
                .sum::<u64>(),
            total_pairs
        );
    }

    #[tokio::test]
    async fn test_every_bigram_lands_in_its_count_group() {
        let mut spark = engine(2).await;
        let counted = count_bigrams(&mut spark, toy_corpus(), 2).await.unwrap();
        let groups = histogram_groups(&mut spark, toy_corpus(), 3).await.unwrap();
        for c in &counted {
            let holding: Vec<_> = groups
                .iter()
                .filter(|g| g.bigrams.contains(&c.bigram))
                .collect();
            assert_eq!(holding.len(), 1);
            assert_eq!(holding[0].count, c.count);
        }
    }

    #[tokio::test]
    async fn test_result_independent_of_partitioning() {
        let corpus = toy_corpus();
        let expected = run_sequential(&corpus);
        for (workers, partitions) in [(1, 1), (2, 5), (8, 16)] {
            let mut spark = engine(workers).await;
            let result = run(&mut spark, corpus.clone(), partitions).await.unwrap();
            assert_eq!(sorted(result), expected, "{workers} workers {partitions} partitions");
        }
    }

    #[tokio::test]
    async fn test_running_twice_is_idempotent() {
        let mut spark = engine(2).await;
        let first = run(&mut spark, toy_corpus(), 3).await.unwrap();
        let second = run(&mut spark, toy_corpus(), 3).await.unwrap();
        assert_eq!(sorted(first), sorted(second));
    }

    #[test]
    fn test_parse_lines() {
        assert_eq!(
            parse_lines(b"the cat\r\nsat\n\non it\n").unwrap(),
            lines(&["the cat", "sat", "", "on it"])
        );
        assert!(parse_lines(b"").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_line_aborts() {
        match parse_lines(b"fine\nbro\xffken\n") {
            Err(Error::MalformedLine { line }) => assert_eq!(line, 2),
            other => panic!("expected malformed line, got {other:?}"),
        }
    }

    #[test]
    fn test_read_lines_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"The cat sat\nthe CAT ate\n").unwrap();
        let read = tokio_test::block_on(read_lines(file.path())).unwrap();
        assert_eq!(run_sequential(&read), vec![entry(1, 2), entry(2, 1)]);
    }

    fn any_corpus() -> impl Strategy<Value = Vec<String>> {
        let word = prop::sample::select(vec![
            "the", "cat", "THE", "Cat", "sat", "x\u{b2}", "cafe\u{301}", "snake_case", "été",
            "...", "",
        ]);
        let line = prop_oneof![
            prop::collection::vec(word, 0..10).prop_map(|words| words.join(" ")),
            ".{0,40}",
        ];
        prop::collection::vec(line, 0..12)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn histogram_invariants_hold_for_any_corpus(
            corpus in any_corpus(),
            workers in 1usize..5,
            partitions in 1usize..7,
        ) {
            let total_pairs: u64 = corpus
                .iter()
                .map(|line| tokenize(line).len().saturating_sub(1) as u64)
                .sum();
            let distinct_bigrams = corpus
                .iter()
                .cloned()
                .flat_map(extract_bigrams)
                .map(|record| record.bigram)
                .collect::<HashSet<_>>()
                .len();

            let (counted, entries) = tokio_test::block_on(async {
                let mut spark = engine(workers).await;
                let counted = count_bigrams(&mut spark, corpus.clone(), partitions)
                    .await
                    .unwrap();
                let entries = run(&mut spark, corpus.clone(), partitions).await.unwrap();
                (counted, entries)
            });

            prop_assert_eq!(counted.iter().map(|c| c.count).sum::<u64>(), total_pairs);
            prop_assert_eq!(counted.len(), distinct_bigrams);
            prop_assert_eq!(
                entries.iter().map(|e| e.num_bigrams).sum::<usize>(),
                distinct_bigrams
            );
            prop_assert_eq!(
                entries
                    .iter()
                    .map(|e| e.count * e.num_bigrams as u64)
                    .sum::<u64>(),
                total_pairs
            );
            prop_assert_eq!(sorted(entries), run_sequential(&corpus));
        }
    }
}
