use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use stripchart_rs::core::{ColumnType, TimeSeriesStore};
use stripchart_rs::render::{Color, LineRenderer, PixelRing, PixelSurface, SeriesRenderer};
use stripchart_rs::task::RenderRequest;

fn filled_store(rows: usize) -> TimeSeriesStore {
    let store = TimeSeriesStore::with_capacity(&[ColumnType::Double, ColumnType::UInt32], rows)
        .expect("valid store");
    for row in 0..rows {
        let cursor = store.append_at(1.0 + row as f64);
        store.set(cursor, 0, (row % 100) as f64).expect("set double");
        store.set(cursor, 1, row as u32).expect("set uint32");
    }
    store
}

fn bench_store_append_wraparound(c: &mut Criterion) {
    let store = filled_store(1_024);
    let mut timestamp = 2_000.0;

    c.bench_function("store_append_wraparound", |b| {
        b.iter(|| {
            timestamp += 1.0;
            let cursor = store.append_at(black_box(timestamp));
            store.set(cursor, 0, black_box(42.0)).expect("set");
        })
    });
}

fn bench_store_range_scan_1k(c: &mut Criterion) {
    let store = filled_store(1_024);

    c.bench_function("store_range_scan_1k", |b| {
        b.iter(|| {
            let cursor = store
                .cursor_for_range(black_box(200.0), black_box(900.0), 1.0)
                .expect("range");
            let sum = store
                .rows(cursor)
                .filter_map(|(_, row)| store.get_f64(row, 0).ok())
                .sum::<f64>();
            black_box(sum)
        })
    });
}

fn bench_pixel_ring_push_and_draw(c: &mut Criterion) {
    let mut ring = PixelRing::allocate(610, 100).expect("ring");
    let mut destination = PixelSurface::new(610, 100).expect("destination");
    let color = Color::rgb(0.2, 0.4, 0.6);

    c.bench_function("pixel_ring_push_and_draw", |b| {
        b.iter(|| {
            ring.push(black_box(10)).expect("push").fill(color);
            ring.draw(&mut destination).expect("draw");
        })
    });
}

fn bench_line_render_slice(c: &mut Criterion) {
    let store = Arc::new(filled_store(1_024));
    let mut renderer = SeriesRenderer::Line(LineRenderer::default());
    renderer.append_line(store, 0).expect("line");
    let request = RenderRequest::new(960.0, 1_024.0, 640.0, 100.0).expect("request");

    c.bench_function("line_render_slice_64s", |b| {
        b.iter(|| {
            let mut surface = PixelSurface::new(640, 100).expect("surface");
            renderer.paint(&mut surface, black_box(&request)).expect("paint");
            black_box(surface)
        })
    });
}

criterion_group!(
    benches,
    bench_store_append_wraparound,
    bench_store_range_scan_1k,
    bench_pixel_ring_push_and_draw,
    bench_line_render_slice
);
criterion_main!(benches);
