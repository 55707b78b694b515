use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use deltasat::{
    change::extract_regions, config::RegionParams, BandSet, Raster, Sentinel2Band, SpatialMeta,
};
use geo::AffineTransform;
use ndarray::Array2;
use std::hint::black_box;

const SIZES: [usize; 3] = [256, 512, 1024];

fn meta(resolution: f64) -> SpatialMeta {
    SpatialMeta::new(
        "EPSG:32633",
        AffineTransform::new(resolution, 0., 500000., 0., -resolution, 5000000.),
    )
}

fn band(size: usize, resolution: f64, seed: usize) -> Raster<u16> {
    let values = Array2::from_shape_fn((size, size), |(r, c)| ((r * 7 + c * 13 + seed) % 4000) as u16);
    Raster::from_band(values, meta(resolution), "band")
}

fn scene(size: usize) -> BandSet<u16> {
    let scl = Array2::from_shape_fn((size / 2, size / 2), |(r, c)| if (r + c) % 17 == 0 { 9 } else { 4 });
    [
        (Sentinel2Band::Blue, band(size, 10., 1)),
        (Sentinel2Band::Green, band(size, 10., 2)),
        (Sentinel2Band::Red, band(size, 10., 3)),
        (Sentinel2Band::Nir, band(size, 10., 4)),
        (Sentinel2Band::Swir1, band(size / 2, 20., 5)),
        (
            Sentinel2Band::SceneClassification,
            Raster::from_band(scl, meta(20.), "SCL"),
        ),
    ]
    .into_iter()
    .collect()
}

fn bench_compute_indices(c: &mut Criterion) {
    let mut group = c.benchmark_group("indices/compute");
    for size in SIZES {
        let bands = scene(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(bands.clone()).compute_indices().unwrap())
        });
    }
    group.finish();
}

fn bench_extract_regions(c: &mut Criterion) {
    let mut group = c.benchmark_group("change/extract_regions");
    let params = RegionParams {
        denoise: true,
        ..RegionParams::default()
    };
    for size in SIZES {
        let mask = Array2::from_shape_fn((size, size), |(r, c)| (r / 8 + c / 8) % 5 == 0 && (r + c) % 3 != 0);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| extract_regions(black_box(mask.view()), &params))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compute_indices, bench_extract_regions);
criterion_main!(benches);
