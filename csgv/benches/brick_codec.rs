#[macro_use]
extern crate criterion;

use criterion::{BatchSize, Criterion};

use csgv::synth::{create_dummy_segmentation_volume, SyntheticVolumeConfig};
use csgv::{CompressedVolume, Configuration, EncodingMode, OpMask};

fn synthetic_volume() -> (Vec<u32>, [u32; 3]) {
    let cfg = SyntheticVolumeConfig {
        dim: [64, 64, 64],
        ..Default::default()
    };
    create_dummy_segmentation_volume(&cfg)
}

fn bench_encode_nibble_serial(c: &mut Criterion) {
    let (volume, dim) = synthetic_volume();
    c.bench_function("encode nibble serial", move |b| {
        b.iter_batched(
            || {
                let mut cfg = Configuration::default();
                cfg.brick_side = 32;
                cfg.encoding_mode = EncodingMode::Nibble;
                cfg
            },
            |cfg| {
                CompressedVolume::encode(cfg, &volume, dim).unwrap();
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_encode_nibble_random_access(c: &mut Criterion) {
    let (volume, dim) = synthetic_volume();
    c.bench_function("encode nibble random access", move |b| {
        b.iter_batched(
            || {
                let mut cfg = Configuration::default();
                cfg.brick_side = 32;
                cfg.encoding_mode = EncodingMode::Nibble;
                cfg.random_access = true;
                cfg.op_mask = OpMask::default() & !OpMask::PALETTE_D & !OpMask::PALETTE_D_LEGACY;
                cfg
            },
            |cfg| {
                CompressedVolume::encode(cfg, &volume, dim).unwrap();
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_encode_single_table_vbl(c: &mut Criterion) {
    let (volume, dim) = synthetic_volume();
    let mut profiling_cfg = Configuration::default();
    profiling_cfg.brick_side = 32;
    let (base_frequencies, _) = CompressedVolume::profile_frequencies(&profiling_cfg, &volume, dim)
        .unwrap();
    c.bench_function("encode single table vbl", move |b| {
        b.iter_batched(
            || {
                let mut cfg = Configuration::default();
                cfg.brick_side = 32;
                cfg.encoding_mode = EncodingMode::SingleTableVBL;
                cfg.base_frequencies = Some(base_frequencies);
                cfg
            },
            |cfg| {
                CompressedVolume::encode(cfg, &volume, dim).unwrap();
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_encode_wavelet_matrix(c: &mut Criterion) {
    let (volume, dim) = synthetic_volume();
    c.bench_function("encode wavelet matrix", move |b| {
        b.iter_batched(
            || {
                let mut cfg = Configuration::default();
                cfg.brick_side = 32;
                cfg.encoding_mode = EncodingMode::WaveletMatrix;
                cfg.random_access = true;
                cfg
            },
            |cfg| {
                CompressedVolume::encode(cfg, &volume, dim).unwrap();
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_encode_huffman_wavelet_matrix(c: &mut Criterion) {
    let (volume, dim) = synthetic_volume();
    c.bench_function("encode huffman wavelet matrix", move |b| {
        b.iter_batched(
            || {
                let mut cfg = Configuration::default();
                cfg.brick_side = 32;
                cfg.encoding_mode = EncodingMode::HuffmanWaveletMatrix;
                cfg.random_access = true;
                cfg.op_mask = OpMask::default() & !OpMask::PALETTE_D & !OpMask::PALETTE_D_LEGACY;
                cfg
            },
            |cfg| {
                CompressedVolume::encode(cfg, &volume, dim).unwrap();
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_decode_full_resolution_random_access(c: &mut Criterion) {
    let (volume, dim) = synthetic_volume();
    let mut cfg = Configuration::default();
    cfg.brick_side = 32;
    cfg.encoding_mode = EncodingMode::WaveletMatrix;
    cfg.random_access = true;
    let vol = CompressedVolume::encode(cfg, &volume, dim).unwrap();
    let finest_lod = vol.lods_per_brick() - 1;
    c.bench_function("decode full resolution, random access", move |b| {
        b.iter(|| vol.decode_lod(finest_lod).unwrap());
    });
}

fn bench_decode_full_resolution_serial(c: &mut Criterion) {
    let (volume, dim) = synthetic_volume();
    let mut cfg = Configuration::default();
    cfg.brick_side = 32;
    let vol = CompressedVolume::encode(cfg, &volume, dim).unwrap();
    let finest_lod = vol.lods_per_brick() - 1;
    c.bench_function("decode full resolution, serial", move |b| {
        b.iter(|| vol.decode_lod(finest_lod).unwrap());
    });
}

criterion_group!(
    benches,
    bench_encode_nibble_serial,
    bench_encode_nibble_random_access,
    bench_encode_single_table_vbl,
    bench_encode_wavelet_matrix,
    bench_encode_huffman_wavelet_matrix,
    bench_decode_full_resolution_random_access,
    bench_decode_full_resolution_serial,
);
criterion_main!(benches);
