use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stencil::config::Indicators;
use stencil::template::statement::classify;
use stencil::Interpreter;

fn make_plain(repeats: usize) -> String {
    let chunk = "The quick brown fox jumps over the lazy dog.\n";
    chunk.repeat(repeats)
}

fn make_directives(rows: usize) -> String {
    let records: Vec<String> = (0..rows)
        .map(|i| format!("{{\"n\":\"item{i}\",\"q\":\"{}\"}}", i % 3))
        .collect();
    format!(
        "_#MACRO cell label value\n| _label | _value |\n_#END_MACRO\n\
         _#LOOP r over [{}]\n\
         _#IF q > 0\n_cell _r.n _r.q\n_#ELSE\n_r.n is out\n_#END_IF\n\
         _#END_LOOP\n",
        records.join(",")
    )
}

fn bench_classify(c: &mut Criterion) {
    let ind = Indicators::default();
    let lines = [
        "plain text line with several words",
        "_#IF count > 3 && name =~ \"a*\"",
        "_#LOOP row over [{\"n\":\"a\"}]",
        "  _greet name=\"Bob Smith\" greeting=Hi",
        "_{summary",
    ];

    let mut g = c.benchmark_group("classify");
    for (i, line) in lines.iter().enumerate() {
        g.bench_function(format!("line_{i}"), |b| {
            b.iter(|| classify(black_box(line), &ind, |n| n == "greet"))
        });
    }
    g.finish();
}

fn bench_render(c: &mut Criterion) {
    let plain_small = make_plain(100);
    let plain_large = make_plain(10000);
    let loops_small = make_directives(10);
    let loops_large = make_directives(1000);

    let mut g = c.benchmark_group("render");

    g.bench_function("plain_small", |b| {
        b.iter(|| Interpreter::default().render_str("bench", black_box(&plain_small)))
    });
    g.bench_function("plain_large", |b| {
        b.iter(|| Interpreter::default().render_str("bench", black_box(&plain_large)))
    });
    g.bench_function("loop_macro_small", |b| {
        b.iter(|| Interpreter::default().render_str("bench", black_box(&loops_small)))
    });
    g.bench_function("loop_macro_large", |b| {
        b.iter(|| Interpreter::default().render_str("bench", black_box(&loops_large)))
    });

    g.finish();
}

criterion_group!(benches, bench_classify, bench_render);
criterion_main!(benches);
