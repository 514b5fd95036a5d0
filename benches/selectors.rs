//! Benchmarks for parsing, selector queries and delegated dispatch.
//!
//! Run with: cargo bench

use std::fmt::Write;

use criterion::{Criterion, criterion_group, criterion_main};

use elementkit::{Document, ElementWrapper, Event, EventInit, Listener};

/// A list of `rows` items, every third one marked `.hot`.
fn sample_html(rows: usize) -> String {
    let mut html = String::from(r#"<ul id="list">"#);
    for i in 0..rows {
        let class = if i % 3 == 0 { "item hot" } else { "item" };
        write!(html, r#"<li class="{class}" data-row="{i}"><span>Row {i}</span></li>"#)
            .expect("writing to a String cannot fail");
    }
    html.push_str("</ul>");
    html
}

// ============================================================================
// Parsing
// ============================================================================

fn bench_parse_document(c: &mut Criterion) {
    let html = sample_html(500);

    c.bench_function("parse_document", |b| {
        b.iter(|| Document::parse(&html));
    });
}

// ============================================================================
// Queries
// ============================================================================

fn bench_query_last_match(c: &mut Criterion) {
    let doc = Document::parse(&sample_html(500));

    c.bench_function("query_last_match", |b| {
        b.iter(|| ElementWrapper::query(&doc, r#"li[data-row="499"] > span"#).unwrap());
    });
}

fn bench_query_all(c: &mut Criterion) {
    let doc = Document::parse(&sample_html(500));

    c.bench_function("query_all_hot", |b| {
        b.iter(|| doc.query_selector_all("ul > li.hot").unwrap());
    });
}

// ============================================================================
// Events
// ============================================================================

fn bench_delegated_click(c: &mut Criterion) {
    let doc = Document::parse(&sample_html(100));
    let list = ElementWrapper::query(&doc, "#list").unwrap();
    list.add_event_delegate(".hot", "click", &Listener::new(|_| {}))
        .unwrap();
    let target = doc.query_selector(".hot").unwrap().unwrap();
    let init = EventInit {
        bubbles: true,
        cancelable: false,
    };

    c.bench_function("delegated_click", |b| {
        b.iter(|| target.dispatch_event(&Event::with_init("click", init)));
    });
}

criterion_group!(
    benches,
    // Parsing
    bench_parse_document,
    // Queries
    bench_query_last_match,
    bench_query_all,
    // Events
    bench_delegated_click,
);
criterion_main!(benches);
