use criterion::{Criterion, black_box, criterion_group, criterion_main};
use marginalia_core::{
    Document, HighlightItem, HighlightKind, extract_paragraphs, place_highlights, strip_annotations,
};

fn fixture_html() -> String {
    std::fs::read_to_string("../../tests/fixtures/article.html").unwrap()
}

fn bench_extract(c: &mut Criterion) {
    let html = fixture_html();

    c.bench_function("extract_paragraphs", |b| {
        b.iter(|| {
            let doc = Document::parse(black_box(&html)).unwrap();
            extract_paragraphs(&doc).unwrap()
        })
    });
}

fn bench_placement(c: &mut Criterion) {
    let html = fixture_html();
    let doc = Document::parse(&html).unwrap();
    let content = extract_paragraphs(&doc).unwrap();

    let items: Vec<HighlightItem> = content
        .paragraphs
        .iter()
        .map(|p| HighlightItem {
            text: p.text.split_whitespace().take(4).collect::<Vec<_>>().join(" "),
            paragraph: p.number,
            kind: HighlightKind::KeyTerm,
        })
        .collect();

    c.bench_function("place_highlights", |b| {
        b.iter(|| place_highlights(black_box(&content), black_box(&items)))
    });
}

fn bench_strip(c: &mut Criterion) {
    let html = fixture_html();

    c.bench_function("strip_annotations", |b| b.iter(|| strip_annotations(black_box(&html))));
}

criterion_group!(benches, bench_extract, bench_placement, bench_strip);
criterion_main!(benches);
