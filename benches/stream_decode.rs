use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sherpa::core::chat_stream::Utf8ChunkDecoder;
use sherpa::core::dispatch::parse_function_call;

fn make_body(approx_bytes: usize) -> Vec<u8> {
    let sentence = "Le café coûte 3 € — naïve résumé, 東京 and plain ASCII text. ";
    let mut body = String::with_capacity(approx_bytes + sentence.len());
    while body.len() < approx_bytes {
        body.push_str(sentence);
    }
    body.into_bytes()
}

fn decode_in_chunks(body: &[u8], chunk_size: usize) -> usize {
    let mut decoder = Utf8ChunkDecoder::default();
    let mut accumulated = String::new();
    for chunk in body.chunks(chunk_size) {
        accumulated.push_str(&decoder.decode(chunk));
    }
    accumulated.push_str(&decoder.finish());
    accumulated.len()
}

fn bench_utf8_decode(c: &mut Criterion) {
    let body = make_body(64 * 1024);
    let mut group = c.benchmark_group("utf8_chunk_decode");
    group.throughput(Throughput::Bytes(body.len() as u64));
    // Odd sizes split multi-byte code points at most boundaries.
    for chunk_size in [7_usize, 61, 1021, 16 * 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &chunk_size| b.iter(|| decode_in_chunks(&body, chunk_size)),
        );
    }
    group.finish();
}

fn bench_envelope_parse(c: &mut Criterion) {
    let code = "import pandas as pd\\nprint(pd.__version__)\\n".repeat(200);
    let call = format!(
        r#"{{"function_call":{{"name":"execute_code","arguments":"{{\"code\":\"{code}\"}}"}}}}"#
    );
    let plain = String::from_utf8(make_body(call.len())).unwrap_or_default();

    let mut group = c.benchmark_group("parse_function_call");
    group.bench_function("envelope", |b| b.iter(|| parse_function_call(&call)));
    group.bench_function("plain_answer", |b| b.iter(|| parse_function_call(&plain)));
    group.finish();
}

criterion_group!(benches, bench_utf8_decode, bench_envelope_parse);
criterion_main!(benches);
