//! Render-path benchmarks: full repaints, steady-state no-op diffs, and a
//! simulated typing session.

use criterion::{criterion_group, criterion_main, Criterion};
use inkline::prelude::*;
use std::hint::black_box;

fn request<'a>(
    commandline: &'a str,
    colors: &'a [Style],
    indent: &'a [usize],
    pager: &'a Grid,
) -> RenderRequest<'a> {
    RenderRequest {
        left_prompt: "user@host ~/src> ",
        right_prompt: "12:34",
        commandline,
        explicit_len: commandline.chars().count(),
        colors,
        indent,
        cursor_pos: commandline.chars().count(),
        pager,
        cursor_in_pager: false,
    }
}

fn bench_full_repaint(c: &mut Criterion) {
    let caps = Capabilities::xterm_256color();
    let size = TermSize::new(100, 40);
    let commandline = "for file in src/*.rs; do wc -l $file; done # and a tail that wraps the line";
    let n = commandline.chars().count();
    let colors = vec![Style::plain().with_fg(4); n];
    let indent = vec![0usize; n];
    let pager = Grid::new();

    c.bench_function("full_repaint", |b| {
        b.iter(|| {
            let mut screen = Screen::new();
            let mut sink = Vec::with_capacity(4096);
            screen
                .write(
                    &mut sink,
                    &caps,
                    size,
                    &request(commandline, &colors, &indent, &pager),
                )
                .unwrap();
            black_box(sink)
        })
    });
}

fn bench_noop_rerender(c: &mut Criterion) {
    let caps = Capabilities::xterm_256color();
    let size = TermSize::new(100, 40);
    let commandline = "git log --oneline --graph --decorate";
    let n = commandline.chars().count();
    let colors = vec![Style::plain(); n];
    let indent = vec![0usize; n];
    let pager = Grid::new();

    let mut screen = Screen::new();
    let mut sink = Vec::with_capacity(4096);
    screen
        .write(
            &mut sink,
            &caps,
            size,
            &request(commandline, &colors, &indent, &pager),
        )
        .unwrap();

    c.bench_function("noop_rerender", |b| {
        b.iter(|| {
            sink.clear();
            screen
                .write(
                    &mut sink,
                    &caps,
                    size,
                    &request(commandline, &colors, &indent, &pager),
                )
                .unwrap();
            black_box(sink.len())
        })
    });
}

fn bench_typing_session(c: &mut Criterion) {
    let caps = Capabilities::xterm_256color();
    let size = TermSize::new(100, 40);
    let full = "cargo test --workspace --release -- --nocapture";
    let pager = Grid::new();

    c.bench_function("typing_session", |b| {
        b.iter(|| {
            let mut screen = Screen::new();
            let mut sink = Vec::with_capacity(4096);
            for end in 1..=full.len() {
                let commandline = &full[..end];
                let n = commandline.chars().count();
                let colors = vec![Style::plain(); n];
                let indent = vec![0usize; n];
                sink.clear();
                screen
                    .write(
                        &mut sink,
                        &caps,
                        size,
                        &request(commandline, &colors, &indent, &pager),
                    )
                    .unwrap();
            }
            black_box(sink.len())
        })
    });
}

criterion_group!(
    benches,
    bench_full_repaint,
    bench_noop_rerender,
    bench_typing_session
);
criterion_main!(benches);
