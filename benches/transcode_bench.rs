// benches/transcode_bench.rs
// ============================================================================
// Transcode Benchmark
// ============================================================================

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use vrma_convert::fixtures::{MotionArchive, ZipMethod};
use vrma_convert::rotation::convert_joint_track;
use vrma_convert::{read_archive, ArchiveStrategy, TranscodeOptions, Transcoder};

fn generate_rot6d(frames: usize, joints: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..frames * joints * 6).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn bench_rotation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Rotation");

    for frames in [60, 600, 6000].iter() {
        let data = generate_rot6d(*frames, 22);

        group.bench_with_input(BenchmarkId::new("joint_track", frames), &data, |b, d| {
            b.iter(|| black_box(convert_joint_track(d, *frames, 22, 9)))
        });
    }

    group.finish();
}

fn bench_archive(c: &mut Criterion) {
    let mut group = c.benchmark_group("Archive");

    let fixture = MotionArchive::new(600, 22).with_translation().with_text("walk in a circle");
    let central = fixture.clone().build();
    let walked = fixture.without_central_directory().build();

    group.bench_function("central_directory", |b| {
        b.iter(|| black_box(read_archive(&central, ArchiveStrategy::CentralDirectory, true)))
    });
    group.bench_function("local_headers", |b| {
        b.iter(|| black_box(read_archive(&walked, ArchiveStrategy::LocalHeaders, true)))
    });

    group.finish();
}

fn bench_transcode(c: &mut Criterion) {
    let mut group = c.benchmark_group("Transcode");
    let transcoder = Transcoder::new(TranscodeOptions::default()).expect("default options");

    for frames in [30, 120, 600].iter() {
        for (method, label) in [(ZipMethod::Stored, "stored"), (ZipMethod::Deflate, "deflate")] {
            let archive = MotionArchive::new(*frames, 22).with_translation().method(method).build();

            group.bench_with_input(BenchmarkId::new(label, frames), &archive, |b, a| {
                b.iter(|| black_box(transcoder.transcode(a, "bench")))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_rotation, bench_archive, bench_transcode);
criterion_main!(benches);
