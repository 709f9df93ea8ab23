use criterion::{Criterion, criterion_group, criterion_main};
use redline_engine::matching::{MatcherConfig, NormalizedIndex, SearchQuery, find_matches};
mod common;

fn bench_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching");
    group.sample_size(10);

    let doc = common::generate_brief(20, 10);
    let config = MatcherConfig::default();

    group.bench_function("build_index", |b| {
        b.iter(|| {
            let index = NormalizedIndex::build(std::hint::black_box(&doc.content), &config);
            std::hint::black_box(index);
        });
    });

    let index = NormalizedIndex::build(&doc.content, &config);

    group.bench_function("find_with_context", |b| {
        let query = SearchQuery::new("Exhibit 19-9").with_context(Some("relief.".to_string()), None);
        b.iter(|| {
            let matches = find_matches(&index, std::hint::black_box(&query), &config);
            std::hint::black_box(matches);
        });
    });

    group.bench_function("fuzzy_block", |b| {
        // long enough for head/tail matching, with an interior edit
        let query = SearchQuery::new(common::CLAUSE.repeat(2).replace("plausible", "believable"));
        b.iter(|| {
            let matches = find_matches(&index, std::hint::black_box(&query), &config);
            std::hint::black_box(matches);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_matching);
criterion_main!(benches);
