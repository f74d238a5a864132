//! Timeline arithmetic on the per-frame path of an export.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vidoverlay_core::{FrameRate, RationalTime, TimeRange};

fn frame_stepping(c: &mut Criterion) {
    let step = FrameRate::FPS_29_97.frame_duration();
    let start = RationalTime::from_secs(12);

    c.bench_function("nth_frame_time_ntsc", |b| {
        b.iter(|| black_box(start) + black_box(step) * black_box(107_892))
    });

    c.bench_function("frame_index_of_one_hour", |b| {
        let hour = RationalTime::from_secs(3600);
        b.iter(|| black_box(hour).to_frames(black_box(FrameRate::FPS_29_97)))
    });
}

fn overlay_text(c: &mut Criterion) {
    let time = RationalTime::new(3723 * 30 + 4, 30);

    c.bench_function("timecode_30fps", |b| {
        b.iter(|| black_box(time).to_timecode(black_box(FrameRate::FPS_30)))
    });
}

fn instruction_lookup(c: &mut Criterion) {
    let active = TimeRange::new(RationalTime::ZERO, RationalTime::new(5, 2));
    let probe = RationalTime::new(1001, 1000);

    c.bench_function("range_contains", |b| {
        b.iter(|| black_box(active).contains(black_box(probe)))
    });
}

criterion_group!(benches, frame_stepping, overlay_text, instruction_lookup);
criterion_main!(benches);
