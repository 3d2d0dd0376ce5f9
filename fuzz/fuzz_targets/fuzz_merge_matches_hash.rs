#![no_main]

use libfuzzer_sys::fuzz_target;
use lj_io::LineReader;
use lj_join::join_sources;
use lj_record::Delimiter;
use lj_runtime::{CancellationToken, RunConfig, Strategy};

fn sorted_lines(text: &str) -> Vec<u8> {
    let mut lines: Vec<&str> = text.lines().map(|line| line.trim_end_matches('\r')).collect();
    lines.sort_by(|a, b| a.split(':').next().cmp(&b.split(':').next()));
    lines.iter().flat_map(|line| format!("{line}\n").into_bytes()).collect()
}

fn run(config: &RunConfig, file1: &[u8], file2: &[u8]) -> Vec<String> {
    let mut left = LineReader::from_bytes("file1", file1.to_vec());
    let mut right = LineReader::from_bytes("file2", file2.to_vec());
    let mut out = Vec::new();
    join_sources(
        config,
        &mut left,
        &mut right,
        &mut out,
        std::io::sink(),
        &CancellationToken::new(),
    )
    .expect("in-memory join");
    let mut lines: Vec<String> = String::from_utf8(out)
        .expect("utf8 output")
        .lines()
        .map(str::to_owned)
        .collect();
    lines.sort();
    lines
}

// Input is `file1 \0 file2`; both sides are key-sorted before joining.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Some((first, second)) = text.split_once('\0') else {
        return;
    };
    let file1 = sorted_lines(first);
    let file2 = sorted_lines(second);

    let Ok(colon) = Delimiter::new(":") else {
        return;
    };
    let config = RunConfig::default().with_delimiters(colon.clone(), colon);
    let hash = run(&config, &file1, &file2);
    let merge = run(&config.clone().with_strategy(Strategy::SortedMerge), &file1, &file2);
    assert_eq!(hash, merge);
});
