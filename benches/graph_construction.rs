use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use helix::graph::condense::{condense, CondenseParams};
use helix::kmer::extension::ExtensionIndex;
use helix::kmer::index::KmerIndex;
use rand::Rng;

/// Reads sampled uniformly from a random genome.
fn generate_reads(genome_len: usize, num_reads: usize, read_len: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::thread_rng();
    let bases = b"ACGT";
    let genome: Vec<u8> = (0..genome_len).map(|_| bases[rng.gen_range(0..4)]).collect();
    (0..num_reads)
        .map(|_| {
            let start = rng.gen_range(0..=genome_len - read_len);
            genome[start..start + read_len].to_vec()
        })
        .collect()
}

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");
    for num_reads in [1_000, 10_000] {
        let reads = generate_reads(50_000, num_reads, 150);
        group.throughput(Throughput::Bytes((num_reads * 150) as u64));

        group.bench_with_input(BenchmarkId::new("counted", num_reads), &reads, |b, reads| {
            b.iter(|| {
                let index = KmerIndex::new(31);
                for read in reads {
                    index.insert_read(read);
                }
                black_box(index.len())
            })
        });

        group.bench_with_input(BenchmarkId::new("extension", num_reads), &reads, |b, reads| {
            b.iter(|| {
                let index = ExtensionIndex::new(31);
                for read in reads {
                    index.insert_read(read);
                }
                black_box(index.vertex_count())
            })
        });
    }
    group.finish();
}

fn bench_condense(c: &mut Criterion) {
    let mut group = c.benchmark_group("condense");
    let reads = generate_reads(50_000, 5_000, 150);
    let counted = KmerIndex::new(31);
    let extension = ExtensionIndex::new(31);
    for read in &reads {
        counted.insert_read(read);
        extension.insert_read(read);
    }
    let params = CondenseParams::default();

    group.bench_function("counted", |b| b.iter(|| black_box(condense(&counted, &params).edge_count())));
    group.bench_function("extension", |b| {
        b.iter(|| black_box(condense(&extension, &params).edge_count()))
    });
    group.finish();
}

criterion_group!(benches, bench_index_build, bench_condense);
criterion_main!(benches);
