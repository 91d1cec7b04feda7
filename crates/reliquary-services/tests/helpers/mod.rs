//! Test helpers: assemble a whole pipeline on temporary directories and a
//! temporary index database.
//!
//! Run from the workspace root: `cargo test -p reliquary-services`.

use reliquary_core::PipelineConfig;
use reliquary_services::MediaPipeline;
use reliquary_storage::PathCodec;
use sqlx::SqlitePool;
use std::io::Cursor;
use tempfile::TempDir;

/// Test pipeline: facade, codec, pool, and the owned temp tree.
pub struct TestPipeline {
    pub pipeline: MediaPipeline,
    pub codec: PathCodec,
    pub pool: SqlitePool,
    pub _temp_dir: TempDir,
}

pub async fn setup_pipeline() -> TestPipeline {
    let temp_dir = TempDir::new().unwrap();

    let config = PipelineConfig {
        staging_root: temp_dir.path().join("temporary"),
        durable_root: temp_dir.path().join("synced"),
        database_url: format!(
            "sqlite://{}",
            temp_dir.path().join("index.db").display()
        ),
        public_base_url: "http://localhost:8000/media".to_string(),
        thumbnail_width: 800,
        thumbnail_height: 600,
        thumbnail_quality: 85,
        max_file_size_bytes: 10 * 1024 * 1024,
        allowed_extensions: vec![],
        staged_retention_hours: 24,
        sweep_interval_secs: 3600,
    };

    let pool = reliquary_db::connect(&config.database_url).await.unwrap();
    let codec = PathCodec::from_config(&config);
    let pipeline = MediaPipeline::new(config, pool.clone());

    TestPipeline {
        pipeline,
        codec,
        pool,
        _temp_dir: temp_dir,
    }
}

/// A valid JPEG of the given dimensions
pub fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([40, 90, 200]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Jpeg)
        .unwrap();
    buffer
}

/// A valid PNG of the given dimensions
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 90, 255]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    buffer
}
