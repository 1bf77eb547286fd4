// Demo binary: builds a fixed scene programmatically (scene file parsing is
// an explicit core non-goal) and drives the library's tile renderer to a PNG.
use clap::{App, Arg};
use image::png::PNGEncoder;
use image::ColorType;
use std::{fs::OpenOptions, process, sync::atomic::AtomicBool, sync::Arc, time::Instant};

use pathtracer_core::camera::Camera;
use pathtracer_core::color::Color;
use pathtracer_core::material::{
    Dielectric, Emissive, Ggx, Lambertian, Metal, Pbr, Sss, SyncMaterial,
};
use pathtracer_core::point::Point3;
use pathtracer_core::render::{self, Telemetry};
use pathtracer_core::scene::{Acceleration, Environment, Lighting, RenderConfig, Scene, Sun};
use pathtracer_core::shape::{Quad, Sphere, SyncHittable};
use pathtracer_core::texture::SolidColor;
use pathtracer_core::vector::Vector3;

const COLOR_SPACE: f64 = 255.999;

fn main() {
    let matches = App::new("pathtracer-core")
        .arg(
            Arg::with_name("thread-count")
                .short("t")
                .long("thread-count")
                .value_name("THREAD_COUNT")
                .help("Number of threads to use while tracing")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("width")
                .short("w")
                .long("width")
                .value_name("WIDTH")
                .help("Output image width in pixels")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("height")
                .long("height")
                .value_name("HEIGHT")
                .help("Output image height in pixels")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("samples")
                .short("s")
                .long("samples")
                .value_name("SAMPLES")
                .help("Samples per pixel")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("depth")
                .short("d")
                .long("depth")
                .value_name("MAX_DEPTH")
                .help("Maximum bounce depth")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("linear")
                .long("linear")
                .help("Use a linear scan instead of a BVH (debugging aid)"),
        )
        .arg(
            Arg::with_name("OUT_FILEPATH")
                .help("The relative filepath to write the output image to")
                .required(true)
                .index(1),
        )
        .get_matches();

    let program_start = Instant::now();

    let num_threads = matches
        .value_of("thread-count")
        .unwrap_or("4")
        .parse::<u32>()
        .expect("thread-count requires a valid positive integer");
    if num_threads == 0 {
        panic!("need a thread count greater than zero");
    }
    let width = matches
        .value_of("width")
        .unwrap_or("400")
        .parse::<u32>()
        .expect("width requires a valid positive integer");
    let height = matches
        .value_of("height")
        .unwrap_or("300")
        .parse::<u32>()
        .expect("height requires a valid positive integer");
    let samples = matches
        .value_of("samples")
        .unwrap_or("64")
        .parse::<u32>()
        .expect("samples requires a valid positive integer");
    let max_depth = matches
        .value_of("depth")
        .unwrap_or("12")
        .parse::<u32>()
        .expect("depth requires a valid positive integer");

    let mut config = RenderConfig::new(width, height, samples, max_depth);
    if matches.is_present("linear") {
        config.acceleration = Acceleration::Linear;
    }

    let scene = build_demo_scene(config).expect("failed to build demo scene");

    let out_path = matches.value_of("OUT_FILEPATH").unwrap();
    let out_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(out_path)
        .expect("failed to create output file");

    let cancel = AtomicBool::new(false);
    let on_progress = |t: Telemetry| {
        print!(
            "\rProgress: {}/{} tiles ({:.1} tiles/sec)   ",
            t.completed_tiles, t.total_tiles, t.tiles_per_sec
        );
        use std::io::Write;
        std::io::stdout().flush().ok();
    };
    let result = render::render(&scene, num_threads, Some(&cancel), Some(&on_progress));
    println!();

    if result.cancelled.is_some() {
        eprintln!("render was cancelled; writing partial image");
    }

    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for pixel in &result.pixels {
        let gamma_corrected = Color::new(
            pixel.r().max(0.0).sqrt(),
            pixel.g().max(0.0).sqrt(),
            pixel.b().max(0.0).sqrt(),
        );
        data.push((gamma_corrected.r().min(1.0) * COLOR_SPACE) as u8);
        data.push((gamma_corrected.g().min(1.0) * COLOR_SPACE) as u8);
        data.push((gamma_corrected.b().min(1.0) * COLOR_SPACE) as u8);
    }

    let png_encoder = PNGEncoder::new(out_file);
    match png_encoder.encode(&data, width, height, ColorType::RGB(8)) {
        Ok(()) => println!(
            "wrote {} in {:.2}s",
            out_path,
            program_start.elapsed().as_secs_f64()
        ),
        Err(e) => {
            eprintln!("failed to encode output png: {}", e);
            process::exit(1);
        }
    }
}

// A small Cornell-box-style room (ground, back wall, ceiling light) holding a
// metal sphere, a dielectric sphere, a PBR/GGX pair, and an SSS sphere, plus
// a scattered field of small Lambertian spheres — enough to exercise every
// material and primitive variant in one render.
fn build_demo_scene(config: RenderConfig) -> Result<Scene, pathtracer_core::error::BuildError> {
    let mut prims: Vec<Arc<SyncHittable>> = Vec::new();

    let ground_albedo = Arc::new(SolidColor::new(Color::new(0.48, 0.48, 0.5)));
    prims.push(Arc::new(Sphere::new(
        Point3::new(0.0, -1000.0, 0.0),
        1000.0,
        Arc::new(Lambertian::new(ground_albedo)),
    )));

    prims.push(Arc::new(Sphere::new(
        Point3::new(0.0, 1.0, 0.0),
        1.0,
        Arc::new(Dielectric::new(1.5)),
    )));
    prims.push(Arc::new(Sphere::new(
        Point3::new(-2.4, 1.0, 0.0),
        1.0,
        Arc::new(Metal::new(
            Arc::new(SolidColor::new(Color::new(0.8, 0.6, 0.2))),
            0.05,
        )),
    )));
    prims.push(Arc::new(Sphere::new(
        Point3::new(2.4, 1.0, 0.0),
        1.0,
        Arc::new(Pbr::new(
            Arc::new(SolidColor::new(Color::new(0.3, 0.4, 0.9))),
            0.3,
            0.25,
        )),
    )));
    prims.push(Arc::new(Sphere::new(
        Point3::new(0.0, 1.0, -2.8),
        1.0,
        Arc::new(Sss::new(
            Arc::new(SolidColor::new(Color::new(0.9, 0.8, 0.75))),
            Color::new(0.85, 0.25, 0.2),
            0.5,
            0.3,
        )),
    )));
    prims.push(Arc::new(Sphere::new(
        Point3::new(0.0, 1.0, 2.8),
        1.0,
        Arc::new(Ggx::new(
            Arc::new(SolidColor::new(Color::new(0.9, 0.9, 0.9))),
            0.15,
        )),
    )));

    let light_material: Arc<SyncMaterial> = Arc::new(Emissive::new(Color::white(), 6.0));
    prims.push(Arc::new(Quad::new(
        Point3::new(-2.0, 8.0, -2.0),
        Vector3::new(4.0, 0.0, 0.0),
        Vector3::new(0.0, 0.0, 4.0),
        light_material,
    )));

    let mut seed_rng = pathtracer_core::rng::Rng::new(42, 0);
    use rand::Rng as _;
    for a in -6..6 {
        for b in -6..6 {
            let center = Point3::new(
                a as f64 + 0.9 * seed_rng.gen_range(0.0, 1.0),
                0.2,
                b as f64 + 0.9 * seed_rng.gen_range(0.0, 1.0),
            );
            if (center - Point3::new(0.0, 0.2, 0.0)).length() < 1.6
                || (center - Point3::new(-2.4, 0.2, 0.0)).length() < 1.6
                || (center - Point3::new(2.4, 0.2, 0.0)).length() < 1.6
                || (center - Point3::new(0.0, 0.2, 2.8)).length() < 1.6
                || (center - Point3::new(0.0, 0.2, -2.8)).length() < 1.6
            {
                continue;
            }
            let albedo = Color::new(
                seed_rng.gen_range(0.0, 1.0) * seed_rng.gen_range(0.0, 1.0),
                seed_rng.gen_range(0.0, 1.0) * seed_rng.gen_range(0.0, 1.0),
                seed_rng.gen_range(0.0, 1.0) * seed_rng.gen_range(0.0, 1.0),
            );
            prims.push(Arc::new(Sphere::new(
                center,
                0.2,
                Arc::new(Lambertian::new(Arc::new(SolidColor::new(albedo)))),
            )));
        }
    }

    let camera = Camera::new(
        Point3::new(13.0, 3.0, 4.0),
        Point3::new(0.0, 1.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        22.0,
        config.aspect_ratio(),
    );

    let lighting = Lighting::new(Environment::Gradient {
        bottom: Color::white(),
        top: Color::new(0.5, 0.7, 1.0),
    })
    .with_sun(Sun::new(
        Vector3::new(-0.4, 0.8, -0.3),
        Color::new(1.0, 0.96, 0.9),
        3.0,
        0.01,
    ));

    Scene::build(camera, lighting, config, prims)
}
