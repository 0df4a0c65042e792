use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::io::Cursor;
use chanio::prelude::*;

const PAYLOAD: usize = 1 << 20;

fn bench_stream_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_reader");
    group.throughput(Throughput::Bytes(PAYLOAD as u64));

    for buffer_size in [512, 4096, 65536].iter() {
        group.bench_with_input(
            BenchmarkId::new("drain", buffer_size),
            buffer_size,
            |b, &buffer_size| {
                b.iter(|| {
                    tokio::runtime::Runtime::new().unwrap().block_on(async {
                        let source = Cursor::new(vec![0u8; PAYLOAD]);
                        let config = StreamConfig::new().buffer_size(buffer_size);
                        let mut reader =
                            StreamReader::with_config(source, config, CancellationToken::new())
                                .unwrap();

                        let mut total = 0;
                        while let Some(chunk) = reader.output().recv().await {
                            total += black_box(chunk).len();
                        }
                        assert_eq!(total, PAYLOAD);
                    })
                });
            },
        );
    }

    group.finish();
}

fn bench_stream_writer(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_writer");
    group.throughput(Throughput::Bytes(PAYLOAD as u64));

    for chunk_size in [512, 4096, 65536].iter() {
        group.bench_with_input(
            BenchmarkId::new("fill", chunk_size),
            chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    tokio::runtime::Runtime::new().unwrap().block_on(async {
                        let sink = WriteSink::new(std::io::sink());
                        let writer = StreamWriter::new(sink, CancellationToken::new()).unwrap();

                        for _ in 0..PAYLOAD / chunk_size {
                            writer.input().send(vec![1u8; chunk_size]).await.unwrap();
                        }
                        writer.close();
                        writer.finished().await;
                    })
                });
            },
        );
    }

    group.finish();
}

fn bench_multi_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_reader");
    group.throughput(Throughput::Bytes(PAYLOAD as u64));

    for sources in [1, 4, 16].iter() {
        group.bench_with_input(
            BenchmarkId::new("fan_in", sources),
            sources,
            |b, &sources| {
                b.iter(|| {
                    tokio::runtime::Runtime::new().unwrap().block_on(async {
                        let inputs: Vec<_> = (0..sources)
                            .map(|_| Cursor::new(vec![0u8; PAYLOAD / sources]))
                            .collect();
                        let mut multi = MultiReader::new(inputs, CancellationToken::new()).unwrap();

                        let mut total = 0;
                        while let Some(chunk) = multi.output().recv().await {
                            total += black_box(chunk).len();
                        }
                        assert_eq!(total, PAYLOAD / sources * sources);
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_stream_reader,
    bench_stream_writer,
    bench_multi_reader
);
criterion_main!(benches);
