use crate::color::Color;
use crate::error::Cancelled;
use crate::integrator;
use crate::rng::Rng;
use crate::scene::Scene;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

// One rectangular region of the frame buffer, in pixel coordinates.
#[derive(Clone, Copy)]
struct Tile {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

fn tiles_for(width: u32, height: u32, tile_size: u32) -> Vec<Tile> {
    let mut tiles = Vec::new();
    let mut y0 = 0;
    while y0 < height {
        let y1 = (y0 + tile_size).min(height);
        let mut x0 = 0;
        while x0 < width {
            let x1 = (x0 + tile_size).min(width);
            tiles.push(Tile { x0, y0, x1, y1 });
            x0 = x1;
        }
        y0 = y1;
    }
    tiles
}

// Progress snapshot handed to the caller's telemetry callback after every
// completed tile.
#[derive(Clone, Copy)]
pub struct Telemetry {
    pub completed_tiles: u64,
    pub total_tiles: u64,
    pub tiles_per_sec: f64,
}

pub struct RenderResult {
    pub pixels: Vec<Color>,
    pub cancelled: Option<Cancelled>,
}

// Splits `pixels` into one exclusive, non-overlapping `&mut [Color]` row
// group per tile, so that once a worker receives its tile's rows, writing
// into them needs no further synchronization. Column boundaries are the same
// for every tile row (each row band is split into columns the same way), so
// every physical row only needs to be carved into column chunks once;
// afterward each chunk is handed to exactly the one tile that claims it.
fn carve_tile_rows<'a>(
    pixels: &'a mut [Color],
    width: u32,
    tiles: &[Tile],
) -> Vec<Vec<&'a mut [Color]>> {
    let row_stride = width as usize;

    let mut col_bounds: Vec<u32> = tiles.iter().filter(|t| t.y0 == 0).map(|t| t.x0).collect();
    col_bounds.push(width);

    let mut rows_by_col: Vec<Vec<Option<&'a mut [Color]>>> = pixels
        .chunks_mut(row_stride)
        .map(|mut row| {
            let mut chunks = Vec::with_capacity(col_bounds.len() - 1);
            for bounds in col_bounds.windows(2) {
                let chunk_width = (bounds[1] - bounds[0]) as usize;
                let (chunk, rest) = row.split_at_mut(chunk_width);
                chunks.push(Some(chunk));
                row = rest;
            }
            chunks
        })
        .collect();

    tiles
        .iter()
        .map(|tile| {
            let col = col_bounds
                .iter()
                .position(|&b| b == tile.x0)
                .expect("tile x0 must land on a column boundary");
            (tile.y0..tile.y1)
                .map(|y| {
                    rows_by_col[y as usize][col]
                        .take()
                        .expect("tile row claimed by more than one tile")
                })
                .collect()
        })
        .collect()
}

struct Job<'a> {
    index: u64,
    tile: Tile,
    rows: Vec<&'a mut [Color]>,
}

// Renders `scene` using `thread_count` worker threads (the calling thread
// contributes too, rather than idling while it waits on the pool). Every
// tile's pixel rows are carved out of the frame buffer once, up front, via
// `carve_tile_rows`, so each `Job` owns a disjoint `&mut [Color]` slice per
// row with no overlap against any other tile; a worker that has received a
// job writes its pixels with no locking at all. The jobs themselves are
// dynamically claimed through a channel (guarded by one `Mutex` for the
// `recv` call) so tiles of uneven cost still load-balance across threads;
// that lock is taken once per tile, never once per pixel.
// `on_progress` is called from whichever thread finishes a tile; it must
// tolerate concurrent calls. `cancel`, if set before a tile starts, stops the
// render and returns the partial buffer alongside `RenderResult::cancelled`.
pub fn render(
    scene: &Scene,
    thread_count: u32,
    cancel: Option<&AtomicBool>,
    on_progress: Option<&(dyn Fn(Telemetry) + Send + Sync)>,
) -> RenderResult {
    let width = scene.config.width;
    let height = scene.config.height;
    let samples = scene.config.samples_per_pixel;
    let seed = scene.config.seed;

    let tiles = tiles_for(width, height, scene.config.tile_size);
    let total_tiles = tiles.len() as u64;
    let completed = AtomicU64::new(0);
    let started = Instant::now();

    let mut pixels = vec![Color::black(); (width * height) as usize];

    {
        let mut tile_rows = carve_tile_rows(&mut pixels, width, &tiles);

        let (tx, rx) = mpsc::channel::<Job<'_>>();
        let rx = Mutex::new(rx);
        for (index, (tile, rows)) in tiles.iter().zip(tile_rows.drain(..)).enumerate() {
            tx.send(Job {
                index: index as u64,
                tile: *tile,
                rows,
            })
            .expect("job queue receiver dropped before all tiles were sent");
        }
        drop(tx);

        let worker = || {
            loop {
                if let Some(c) = cancel {
                    if c.load(Ordering::Relaxed) {
                        return;
                    }
                }
                let job = {
                    let rx = rx.lock().expect("job queue lock poisoned");
                    rx.recv()
                };
                let job = match job {
                    Ok(job) => job,
                    Err(_) => return,
                };

                render_tile(scene, &job.tile, job.index, seed, samples, width, height, job.rows);

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(cb) = on_progress {
                    let elapsed = started.elapsed().as_secs_f64().max(1e-9);
                    cb(Telemetry {
                        completed_tiles: done,
                        total_tiles,
                        tiles_per_sec: done as f64 / elapsed,
                    });
                }
            }
        };

        thread::scope(|s| {
            let mut handles = Vec::new();
            for _ in 0..thread_count.saturating_sub(1) {
                handles.push(s.spawn(worker));
            }
            worker();
            for h in handles {
                h.join().expect("a render worker thread panicked");
            }
        });
    }

    let cancelled = match cancel {
        Some(c) if c.load(Ordering::Relaxed) => Some(Cancelled),
        _ => None,
    };

    RenderResult { pixels, cancelled }
}

fn render_tile(
    scene: &Scene,
    tile: &Tile,
    tile_index: u64,
    seed: u64,
    samples: u32,
    width: u32,
    height: u32,
    mut rows: Vec<&mut [Color]>,
) {
    for (row_offset, row) in rows.iter_mut().enumerate() {
        let y = tile.y0 + row_offset as u32;
        for (col, x) in (tile.x0..tile.x1).enumerate() {
            let mut accum = Color::black();
            for sample in 0..samples {
                let mut rng = Rng::for_draw(seed, tile_index, (y as u64) * (width as u64) + (x as u64), sample as u64);
                let su = (x as f64 + rng_unit(&mut rng)) / width as f64;
                let sv = ((height - 1 - y) as f64 + rng_unit(&mut rng)) / height as f64;
                let r = scene.camera.ray_for(su, sv);
                accum = accum + integrator::trace(&r, scene, 0, &mut rng);
            }
            row[col] = (accum / samples as f64).clamped_finite();
        }
    }
}

fn rng_unit(rng: &mut Rng) -> f64 {
    use rand::Rng as _;
    rng.gen()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::material::Lambertian;
    use crate::point::Point3;
    use crate::scene::{Acceleration, Environment, Lighting, RenderConfig};
    use crate::shape::{Sphere, SyncHittable};
    use crate::texture::SolidColor;
    use crate::vector::Vector3;
    use std::sync::Arc;

    fn small_scene() -> Scene {
        let camera = Camera::new(
            Point3::new(0.0, 0.0, 3.0),
            Point3::origin(),
            Vector3::new(0.0, 1.0, 0.0),
            40.0,
            1.0,
        );
        let mut config = RenderConfig::new(8, 8, 2, 3);
        config.acceleration = Acceleration::Linear;
        config.tile_size = 4;
        let prims: Vec<Arc<SyncHittable>> = vec![Arc::new(Sphere::new(
            Point3::origin(),
            1.0,
            Arc::new(Lambertian::new(Arc::new(SolidColor::new(Color::new(
                0.6, 0.6, 0.6,
            ))))),
        ))];
        Scene::build(
            camera,
            Lighting::new(Environment::Gradient {
                bottom: Color::white(),
                top: Color::new(0.5, 0.7, 1.0),
            }),
            config,
            prims,
        )
        .unwrap()
    }

    #[test]
    fn renders_full_buffer_with_a_single_thread() {
        let scene = small_scene();
        let result = render(&scene, 1, None, None);
        assert_eq!(result.pixels.len(), 64);
        assert!(result.cancelled.is_none());
    }

    #[test]
    fn renders_identically_regardless_of_thread_count() {
        let scene = small_scene();
        let one = render(&scene, 1, None, None);
        let four = render(&scene, 4, None, None);
        for (a, b) in one.pixels.iter().zip(four.pixels.iter()) {
            assert!((a.r() - b.r()).abs() < 1e-12);
            assert!((a.g() - b.g()).abs() < 1e-12);
            assert!((a.b() - b.b()).abs() < 1e-12);
        }
    }

    #[test]
    fn cancelling_before_start_yields_an_empty_progress_but_no_panic() {
        let scene = small_scene();
        let cancel = AtomicBool::new(true);
        let result = render(&scene, 2, Some(&cancel), None);
        assert!(result.cancelled.is_some());
        assert_eq!(result.pixels.len(), 64);
    }

    #[test]
    fn telemetry_callback_observes_every_tile() {
        let scene = small_scene();
        let seen = Mutex::new(0u64);
        let cb = |t: Telemetry| {
            let mut count = seen.lock().unwrap();
            *count += 1;
            assert!(t.completed_tiles <= t.total_tiles);
        };
        let result = render(&scene, 2, None, Some(&cb));
        assert_eq!(*seen.lock().unwrap(), tiles_for(8, 8, 4).len() as u64);
        assert_eq!(result.pixels.len(), 64);
    }

    #[test]
    fn carved_tile_rows_cover_every_pixel_exactly_once() {
        let width = 10;
        let height = 7;
        let tiles = tiles_for(width, height, 4);
        let mut pixels = vec![Color::black(); (width * height) as usize];
        let tile_rows = carve_tile_rows(&mut pixels, width, &tiles);
        let total_pixels: usize = tile_rows
            .iter()
            .map(|rows| rows.iter().map(|r| r.len()).sum::<usize>())
            .sum();
        assert_eq!(total_pixels, (width * height) as usize);
    }
}
