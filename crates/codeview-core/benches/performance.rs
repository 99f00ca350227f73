use codeview_core::{
    Collapse, DocConfig, Document, HighlightProgress, MarkerOptions, Mode, ModeHandle, Pos,
    StringStream, StyleId,
};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

fn large_text(line_count: usize) -> String {
    let mut out = String::with_capacity(line_count * 64);
    for i in 0..line_count {
        out.push_str(&format!(
            "{i:06} <div class=\"row\">the quick brown fox jumps over the lazy dog</div>\n"
        ));
    }
    out.pop();
    out
}

/// Splits lines into words and punctuation, alternating two styles.
struct Words;

impl Mode for Words {
    type State = usize;

    fn name(&self) -> &str {
        "words"
    }

    fn start_state(&self) -> usize {
        0
    }

    fn token(&self, stream: &mut StringStream<'_>, count: &mut usize) -> Option<StyleId> {
        *count += 1;
        if stream.eat_while(|c: char| c.is_alphanumeric()) {
            return Some(1);
        }
        stream.next();
        Some(2)
    }
}

fn bench_large_file_open(c: &mut Criterion) {
    let text = large_text(50_000);
    c.bench_function("large_file_open/50k_lines", |b| {
        b.iter(|| {
            let doc = Document::new(black_box(&text));
            black_box(doc.line_count());
        })
    });
}

fn bench_typing_in_middle(c: &mut Criterion) {
    let text = large_text(50_000);
    c.bench_function("typing_middle/100_inserts", |b| {
        b.iter_batched(
            || {
                let mut doc = Document::new(&text);
                doc.set_cursor(Pos::new(25_000, 10));
                doc
            },
            |mut doc| {
                for _ in 0..100 {
                    doc.replace_selection("x", Collapse::End, Some("+input"))
                        .unwrap();
                }
                black_box(doc.history_size());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_edit_with_markers(c: &mut Criterion) {
    let text = large_text(10_000);
    c.bench_function("edit_with_markers/1k_markers", |b| {
        b.iter_batched(
            || {
                let mut doc = Document::new(&text);
                for line in (0..10_000).step_by(10) {
                    doc.mark_text(Pos::new(line, 7), Pos::new(line + 1, 3), MarkerOptions::default())
                        .unwrap();
                }
                doc
            },
            |mut doc| {
                for line in (0..1_000).step_by(10) {
                    doc.replace_range("\n", Pos::new(line * 2, 5), Pos::new(line * 2, 5), None)
                        .unwrap();
                }
                black_box(doc.all_marks().len());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_highlight_full_document(c: &mut Criterion) {
    let text = large_text(5_000);
    c.bench_function("highlight/5k_lines", |b| {
        b.iter_batched(
            || Document::with_mode(&text, DocConfig::default(), ModeHandle::new(Words)),
            |mut doc| {
                let budget = doc.config().work_time();
                while let HighlightProgress::Yielded { .. } = doc.highlight_step(budget) {}
                black_box(doc.frontiers());
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_large_file_open,
    bench_typing_in_middle,
    bench_edit_with_markers,
    bench_highlight_full_document
);
criterion_main!(benches);
