use callsum::transcript::{ChunkTranscript, Segment, Transcript, merge};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

/// Chunk transcripts of a long call, in reverse completion order.
fn chunks(count: usize, segments_per_chunk: usize) -> Vec<ChunkTranscript> {
    let chunk_duration = 600.0;
    let step = chunk_duration / segments_per_chunk as f64;
    (0..count)
        .rev()
        .map(|order| {
            let segments = (0..segments_per_chunk)
                .map(|id| Segment {
                    id,
                    start: id as f64 * step,
                    end: (id + 1) as f64 * step,
                    text: format!("phrase {id} of chunk {order}"),
                })
                .collect::<Vec<_>>();
            let text = segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            ChunkTranscript::new(
                order,
                Transcript {
                    text,
                    language: "english".to_string(),
                    duration: chunk_duration,
                    segments,
                },
            )
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("transcript_merge");
    for count in [2usize, 8, 32] {
        let input = chunks(count, 200);
        group.bench_with_input(BenchmarkId::from_parameter(count), &input, |b, input| {
            b.iter(|| merge(black_box(input.clone())))
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
