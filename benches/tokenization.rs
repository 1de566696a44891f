use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use zero_tokenizer::bpe::BpeTokenizer;

fn sample_corpus() -> Vec<String> {
    (0..200)
        .map(|i| format!("the quick brown fox jumps over the lazy dog number {i}"))
        .collect()
}

fn trained_tokenizer() -> BpeTokenizer {
    let mut tokenizer = BpeTokenizer::new();
    let corpus = sample_corpus();
    tokenizer
        .train(corpus, 512, &["<unk>"])
        .expect("training on the sample corpus should succeed");
    tokenizer
}

fn bench_train(c: &mut Criterion) {
    c.bench_function("bpe_train_512_vocab", |b| {
        b.iter(|| {
            let mut tokenizer = BpeTokenizer::new();
            tokenizer
                .train(black_box(sample_corpus()), 512, &["<unk>"])
                .unwrap();
        });
    });
}

fn bench_encode(c: &mut Criterion) {
    let tokenizer = trained_tokenizer();
    let mut group = c.benchmark_group("encode");

    for size in &[10, 100, 1000] {
        let text = "the quick brown fox ".repeat(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| tokenizer.encode(black_box(&text)));
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let tokenizer = trained_tokenizer();
    let ids = tokenizer.encode(&"the quick brown fox ".repeat(200)).unwrap();

    c.bench_function("decode_tokens", |b| {
        b.iter(|| tokenizer.decode(black_box(&ids)));
    });
}

fn bench_encode_batch(c: &mut Criterion) {
    let tokenizer = trained_tokenizer();
    let mut group = c.benchmark_group("encode_batch");

    for batch_size in &[1, 10, 100] {
        let texts: Vec<String> = (0..*batch_size)
            .map(|i| format!("this is test string number {i} with some content"))
            .collect();
        let text_refs: Vec<&str> = texts.iter().map(std::string::String::as_str).collect();

        group.bench_with_input(BenchmarkId::from_parameter(batch_size), batch_size, |b, _| {
            b.iter(|| tokenizer.encode_batch(black_box(&text_refs)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_train, bench_encode, bench_decode, bench_encode_batch);
criterion_main!(benches);
