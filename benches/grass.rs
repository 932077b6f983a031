use criterion::{criterion_group, criterion_main, Criterion, black_box};

use veldt::core::camera::Camera;
use veldt::grass::blade::build_blade_mesh;
use veldt::grass::bounds::camera_bounds;
use veldt::grass::culling_pass::GrassGrid;
use veldt::terrain::generator::{TerrainGenerator, TerrainParams};
use veldt::terrain::mesh::build_terrain_mesh;

use glam::{Vec2, Vec3};

fn bench_blade_mesh(c: &mut Criterion) {
    c.bench_function("blade_mesh_s5", |b| {
        b.iter(|| build_blade_mesh(black_box(5)));
    });

    c.bench_function("blade_mesh_s16", |b| {
        b.iter(|| build_blade_mesh(black_box(16)));
    });
}

fn bench_bounds_and_grid(c: &mut Criterion) {
    let mut camera = Camera::new(Vec3::new(10.0, 20.0, -5.0), 60.0, 16.0 / 9.0);
    camera.set_rotation_euler(0.8, -0.25);

    c.bench_function("camera_bounds_and_grid", |b| {
        b.iter(|| {
            let bounds = camera_bounds(black_box(&camera), black_box(300.0));
            GrassGrid::from_bounds(&bounds, black_box(0.5))
        });
    });
}

fn bench_terrain_mesh(c: &mut Criterion) {
    let generator = TerrainGenerator::new(TerrainParams::default());

    c.bench_function("terrain_mesh_128", |b| {
        b.iter(|| {
            build_terrain_mesh(
                black_box(&generator),
                Vec2::ZERO,
                black_box(400.0),
                black_box(128),
            )
        });
    });
}

criterion_group!(benches, bench_blade_mesh, bench_bounds_and_grid, bench_terrain_mesh);
criterion_main!(benches);
