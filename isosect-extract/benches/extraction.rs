//! Benchmarks for whole-volume and sectioned marching cubes extraction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use isosect_core::{Point3f, Volume};
use isosect_extract::{
    create_sphere_volume, extract_sections_parallel, Decomposition, DecompositionConfig, MarchingCubes,
};

fn sphere(resolution: usize) -> Volume {
    create_sphere_volume(Point3f::new(0.5, 0.5, 0.5), 0.35, [resolution; 3], [1.0; 3]).expect("Failed to build volume")
}

fn cube_count(volume: &Volume) -> u64 {
    volume.dims().iter().map(|&d| (d - 1) as u64).product()
}

fn benchmark_full_volume(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_volume");
    let mc = MarchingCubes::default();

    for resolution in [32, 64, 128] {
        let volume = sphere(resolution);
        group.throughput(Throughput::Elements(cube_count(&volume)));
        group.bench_with_input(BenchmarkId::from_parameter(resolution), &volume, |b, volume| {
            b.iter(|| black_box(mc.extract(volume).expect("Extraction failed")));
        });
    }

    group.finish();
}

fn benchmark_sections(c: &mut Criterion) {
    let mut group = c.benchmark_group("sections");
    let mc = MarchingCubes::default();
    let volume = sphere(96);
    group.throughput(Throughput::Elements(cube_count(&volume)));

    for count in [1, 4, 16] {
        let decomposition = Decomposition::new(volume.dims(), &DecompositionConfig::along_z(count))
            .expect("Failed to decompose volume");
        let sections = decomposition.sections();

        group.bench_with_input(BenchmarkId::new("sequential", count), &sections, |b, sections| {
            b.iter(|| black_box(mc.extract_sections(&volume, sections).expect("Extraction failed")));
        });
        group.bench_with_input(BenchmarkId::new("parallel", count), &sections, |b, sections| {
            b.iter(|| black_box(extract_sections_parallel(&mc, &volume, sections).expect("Extraction failed")));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_full_volume, benchmark_sections);
criterion_main!(benches);
