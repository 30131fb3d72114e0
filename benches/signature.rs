use divan::AllocProfiler;
use divan::{Bencher, black_box};
use shardquery::{apply_case_insensitive, derive_signature, normalize};

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

const PATTERNS: &[&str] = &[
    r#"//node[@cat="np"]"#,
    r#"//node[@cat="smain" and node[@rel="su" and @cat="np"] and node[@rel="hd" and @pt="ww"]]"#,
    r#"//node[@cat="np" and count(node[@rel="mod" and @pt="adj"]) > 2 and node[@rel="hd" and @word="Huis" and @caseinsensitive="yes"]]"#,
    r#"//node[@cat="ssub" and node[@rel="obj1" and @cat="np" and node[@rel="det" and @pt="lid"]] and node[@rel="su" and @pt="vnw"] and node[@rel="hd"] and number(@begin) < number(../node[@rel="hd"]/@begin)]"#,
];

#[divan::bench(args = PATTERNS)]
fn signature(bencher: Bencher, pattern: &str) {
    bencher.bench(|| black_box(derive_signature(black_box(pattern))));
}

#[divan::bench(args = PATTERNS)]
fn normalize_pattern(bencher: Bencher, pattern: &str) {
    bencher.bench(|| black_box(normalize(black_box(pattern), black_box(pattern), true)));
}

#[divan::bench]
fn case_insensitive(bencher: Bencher) {
    bencher.bench(|| black_box(apply_case_insensitive(black_box(PATTERNS[2]))));
}
