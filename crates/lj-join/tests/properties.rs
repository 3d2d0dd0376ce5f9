use std::collections::{HashMap, HashSet};
use std::io;
use std::num::NonZeroUsize;

use lj_io::LineReader;
use lj_join::join_sources;
use lj_record::{ColumnIndex, Delimiter};
use lj_runtime::{CancellationToken, RunConfig, Strategy as Algorithm};
use proptest::prelude::*;

fn base_config() -> RunConfig {
    let colon = Delimiter::new(":").expect("delimiter");
    RunConfig::default().with_delimiters(colon.clone(), colon)
}

fn to_bytes(lines: &[String]) -> Vec<u8> {
    lines.iter().flat_map(|line| format!("{line}\n").into_bytes()).collect()
}

fn run(config: &RunConfig, file1: &[String], file2: &[String]) -> (Vec<String>, Vec<String>) {
    let mut left = LineReader::from_bytes("file1", to_bytes(file1));
    let mut right = LineReader::from_bytes("file2", to_bytes(file2));
    let mut out = Vec::new();
    let mut diag = Vec::new();
    join_sources(
        config,
        &mut left,
        &mut right,
        &mut out,
        &mut diag,
        &CancellationToken::new(),
    )
    .expect("join");
    let split = |bytes: Vec<u8>| {
        String::from_utf8(bytes)
            .expect("utf8")
            .lines()
            .map(str::to_owned)
            .collect::<Vec<_>>()
    };
    (split(out), split(diag))
}

fn key(line: &str) -> &str {
    line.split(':').next().unwrap_or_default()
}

fn group_sizes(lines: &[String]) -> HashMap<&str, usize> {
    let mut sizes = HashMap::new();
    for line in lines {
        *sizes.entry(key(line)).or_insert(0) += 1;
    }
    sizes
}

fn sorted(mut lines: Vec<String>) -> Vec<String> {
    lines.sort();
    lines
}

fn lines_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(("[a-e]", "[0-9xy]{0,3}"), 0..24).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(key, value)| format!("{key}:{value}"))
            .collect()
    })
}

proptest! {
    #[test]
    fn hash_output_is_the_cross_product_of_shared_groups(
        file1 in lines_strategy(),
        file2 in lines_strategy(),
    ) {
        let (out, diag) = run(&base_config(), &file1, &file2);
        let left = group_sizes(&file1);
        let right = group_sizes(&file2);
        let expected: usize = left
            .iter()
            .map(|(key, n)| n * right.get(key).copied().unwrap_or(0))
            .sum();
        prop_assert_eq!(out.len(), expected);
        prop_assert!(diag.is_empty());
    }

    #[test]
    fn chunked_matches_hash_as_a_multiset(
        file1 in lines_strategy(),
        file2 in lines_strategy(),
        chunks in 1usize..7,
    ) {
        let hash = run(&base_config(), &file1, &file2).0;
        let chunks = NonZeroUsize::new(chunks).expect("non-zero");
        let config = base_config().with_strategy(Algorithm::Chunked { chunks });
        let chunked = run(&config, &file1, &file2).0;
        prop_assert_eq!(sorted(hash), sorted(chunked));
    }

    #[test]
    fn filter_mode_echoes_each_first_line_once_per_matching_second_line(
        file1 in lines_strategy(),
        file2 in lines_strategy(),
    ) {
        let config = base_config().with_filter_mode(true);
        let (out, _) = run(&config, &file1, &file2);
        let left = group_sizes(&file1);
        let expected: usize = file2
            .iter()
            .map(|line| left.get(key(line)).copied().unwrap_or(0))
            .sum();
        prop_assert_eq!(out.len(), expected);
        let first: HashSet<&String> = file1.iter().collect();
        prop_assert!(out.iter().all(|line| first.contains(line)));
    }

    #[test]
    fn missing_mode_is_exactly_the_anti_join(
        file1 in lines_strategy(),
        file2 in lines_strategy(),
    ) {
        let config = base_config().with_missing_mode(true);
        let (out, _) = run(&config, &file1, &file2);
        let keys: HashSet<&str> = file1.iter().map(|line| key(line)).collect();
        let expected: Vec<String> = file2
            .iter()
            .filter(|line| !keys.contains(key(line)))
            .cloned()
            .collect();
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn merge_equals_hash_on_sorted_input(
        file1 in lines_strategy(),
        file2 in lines_strategy(),
        filter_mode in any::<bool>(),
    ) {
        let mut file1 = file1;
        let mut file2 = file2;
        file1.sort_by(|a, b| key(a).cmp(key(b)));
        file2.sort_by(|a, b| key(a).cmp(key(b)));

        let config = base_config().with_filter_mode(filter_mode);
        let hash = run(&config, &file1, &file2).0;
        let merge = run(&config.clone().with_strategy(Algorithm::SortedMerge), &file1, &file2).0;
        prop_assert_eq!(sorted(hash), sorted(merge));
    }

    #[test]
    fn short_lines_add_one_diagnostic_and_nothing_else(
        file1 in lines_strategy(),
        file2 in lines_strategy(),
        insert_at in any::<prop::sample::Index>(),
    ) {
        let second = ColumnIndex::new(2).expect("column");
        let config = base_config().with_columns(second, ColumnIndex::FIRST);
        let file2: Vec<String> = file2
            .iter()
            .map(|line| format!("{}:{}", line.split(':').nth(1).unwrap_or_default(), key(line)))
            .collect();
        let (baseline, baseline_diag) = run(&config, &file1, &file2);
        prop_assert!(baseline_diag.is_empty());

        let mut with_short = file1.clone();
        let position = insert_at.index(with_short.len() + 1);
        with_short.insert(position, "nocolon".to_owned());
        let (out, diag) = run(&config, &with_short, &file2);

        prop_assert_eq!(sorted(out), sorted(baseline));
        prop_assert_eq!(diag, vec![format!("file1 line {}: column missing", position + 1)]);
    }
}

#[test]
fn cancellation_between_lines_keeps_whole_lines_only() {
    struct CancelAfter<'a> {
        inner: Vec<u8>,
        token: &'a CancellationToken,
    }

    impl io::Write for CancelAfter<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.inner.extend_from_slice(buf);
            self.token.cancel();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let token = CancellationToken::new();
    let file1: Vec<String> = (0..5).map(|n| format!("k:{n}")).collect();
    let file2 = vec!["k:a".to_owned(), "k:b".to_owned()];
    let mut left = LineReader::from_bytes("file1", to_bytes(&file1));
    let mut right = LineReader::from_bytes("file2", to_bytes(&file2));
    let mut sink = CancelAfter {
        inner: Vec::new(),
        token: &token,
    };

    let report = join_sources(
        &base_config(),
        &mut left,
        &mut right,
        &mut sink,
        io::sink(),
        &token,
    )
    .expect("cancellation is not an error");

    assert!(report.cancelled);
    // The whole group for `k:a` is written before the next checkpoint.
    assert_eq!(report.emitted, 5);
    let text = String::from_utf8(sink.inner).expect("utf8");
    assert!(text.ends_with('\n'));
    assert_eq!(text.lines().count(), 5);
}
