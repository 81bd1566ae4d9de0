use std::collections::HashSet;
use std::fs;

use galatea::application::thumbnails::{
    CACHE_HIT_TOTAL, CACHE_MISS_TOTAL, PLACEHOLDER_TOTAL, RENDER_MS, ThumbnailConfig,
    ThumbnailError, ThumbnailService,
};
use galatea::domain::thumbnail::{Quality, SourceId, ThumbnailSpecError};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Rgba, RgbaImage};
use metrics_util::debugging::DebuggingRecorder;
use tempfile::TempDir;

const PLACEHOLDER: &str = "/static/images/no-image.png";

fn config(root: &TempDir) -> ThumbnailConfig {
    ThumbnailConfig {
        source_root: root.path().join("store").join("shop"),
        cache_dir: root.path().join("cache"),
        cache_url: "/media/cache".to_string(),
        placeholder_url: PLACEHOLDER.to_string(),
        default_quality: Quality::default(),
        max_dimension: 2048,
    }
}

fn service(root: &TempDir) -> ThumbnailService {
    ThumbnailService::new(config(root)).expect("cache directory should be created")
}

fn store_source(service: &ThumbnailService, id: &str, width: u32, height: u32) {
    let path = SourceId::parse(id)
        .expect("valid source id")
        .store_path(&service.config().source_root);
    fs::create_dir_all(path.parent().expect("partitioned path")).expect("store dirs");
    let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 200, 255])
    }));
    image
        .save_with_format(&path, ImageFormat::Png)
        .expect("source written");
}

fn artifact_reader(service: &ThumbnailService, url: &str) -> ImageReader<std::io::BufReader<fs::File>> {
    let name = url
        .strip_prefix("/media/cache/")
        .expect("artifact url under the cache url");
    ImageReader::open(service.artifact_path(name))
        .expect("artifact exists")
        .with_guessed_format()
        .expect("artifact readable")
}

fn artifact(service: &ThumbnailService, url: &str) -> DynamicImage {
    artifact_reader(service, url).decode().expect("artifact decodes")
}

#[test]
fn fit_crop_produces_exact_dimensions() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);
    store_source(&service, "ab12cd34ef", 400, 300);

    let url = service
        .thumbnail("ab12cd34ef", "photo.jpg", "100x100", Some("fit"), None, None)
        .expect("thumbnail renders");

    assert_eq!(url, "/media/cache/photo_100x100_fit.jpg");
    assert_eq!(artifact(&service, &url).dimensions(), (100, 100));
}

#[test]
fn bounded_resize_preserves_aspect_ratio() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);
    store_source(&service, "ab12cd34ef", 400, 300);

    let url = service
        .thumbnail("ab12cd34ef", "photo.png", "200x200", None, None, None)
        .expect("thumbnail renders");

    assert_eq!(artifact(&service, &url).dimensions(), (200, 150));
}

#[test]
fn bounded_resize_touches_one_side_of_a_wide_box() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);
    store_source(&service, "ab12cd34ef", 400, 300);

    let url = service
        .thumbnail("ab12cd34ef", "photo.png", "100x50", None, None, None)
        .expect("thumbnail renders");

    let (width, height) = artifact(&service, &url).dimensions();
    assert!(width <= 100, "width {width}");
    assert_eq!(height, 50);
    assert_eq!(width, 67);
}

#[test]
fn artifacts_keep_the_source_format() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);
    store_source(&service, "ab12cd34", 200, 100);

    let url = service
        .thumbnail("ab12cd34", "photo.jpg", "50x50", None, None, None)
        .expect("thumbnail renders");

    assert_eq!(url, "/media/cache/photo_50x50.jpg");
    assert_eq!(artifact_reader(&service, &url).format(), Some(ImageFormat::Png));
}

#[cfg(unix)]
#[test]
fn artifacts_are_world_readable() {
    use std::os::unix::fs::PermissionsExt;

    let root = TempDir::new().expect("tempdir");
    let service = service(&root);
    store_source(&service, "ab12cd34", 40, 40);

    service
        .thumbnail("ab12cd34", "photo.png", "20x20", None, None, None)
        .expect("thumbnail renders");

    let mode = fs::metadata(service.artifact_path("photo_20x20.png"))
        .expect("artifact exists")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o644);
}

#[test]
fn background_pads_to_a_square_canvas() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);
    store_source(&service, "ab12cd34ef", 240, 99);

    let url = service
        .thumbnail("ab12cd34ef", "banner.png", "80x80", None, Some("ff0000"), None)
        .expect("thumbnail renders");

    assert_eq!(url, "/media/cache/banner_80x80_ff0000.png");
    let image = artifact(&service, &url).to_rgba8();
    assert_eq!(image.dimensions(), (80, 80));

    // 80x33 thumbnail, offset (80 - 33) / 2 = 23.
    let red = Rgba([255, 0, 0, 255]);
    let first_image_row = (0..80).find(|&y| image.get_pixel(40, y) != &red);
    let last_image_row = (0..80).rev().find(|&y| image.get_pixel(40, y) != &red);
    assert_eq!(first_image_row, Some(23));
    assert_eq!(last_image_row, Some(55));
    assert!((0..80).all(|x| image.get_pixel(x, 23) != &red));
}

#[test]
fn cached_artifacts_are_served_without_the_source() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);
    store_source(&service, "ab12cd34ef", 120, 120);

    let first = service
        .thumbnail("ab12cd34ef", "photo.jpg", "60x60", None, None, Some(70))
        .expect("first render");
    let written = fs::metadata(service.artifact_path("photo_60x60_70.jpg"))
        .expect("artifact exists")
        .modified()
        .expect("mtime");

    let source = SourceId::parse("ab12cd34ef")
        .expect("valid id")
        .store_path(&service.config().source_root);
    fs::remove_file(source).expect("source removed");

    let second = service
        .thumbnail("ab12cd34ef", "photo.jpg", "60x60", None, None, Some(70))
        .expect("cache hit");
    assert_eq!(first, second);
    assert_eq!(
        fs::metadata(service.artifact_path("photo_60x60_70.jpg"))
            .expect("artifact still exists")
            .modified()
            .expect("mtime"),
        written
    );
}

#[test]
fn unreadable_sources_fall_back_to_the_placeholder() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);

    let missing = service
        .thumbnail("ffee0011", "photo.jpg", "100x100", None, None, None)
        .expect("placeholder, not an error");
    assert_eq!(missing, PLACEHOLDER);

    let path = SourceId::parse("aabbccdd")
        .expect("valid id")
        .store_path(&service.config().source_root);
    fs::create_dir_all(path.parent().expect("parent")).expect("dirs");
    fs::write(&path, b"definitely not an image").expect("garbage written");
    let garbage = service
        .thumbnail("aabbccdd", "photo.jpg", "100x100", None, None, None)
        .expect("placeholder, not an error");
    assert_eq!(garbage, PLACEHOLDER);

    let entries = fs::read_dir(&service.config().cache_dir)
        .expect("cache dir")
        .count();
    assert_eq!(entries, 0, "no artifact should be written for a placeholder");
}

#[test]
fn configured_default_quality_is_left_out_of_names() {
    let root = TempDir::new().expect("tempdir");
    let service = ThumbnailService::new(ThumbnailConfig {
        default_quality: Quality::new(90).expect("quality"),
        ..config(&root)
    })
    .expect("cache directory should be created");

    let implicit = service
        .request("ab12cd34ef", "photo.jpg", "100x100", None, None, None)
        .expect("valid request");
    assert_eq!(implicit.quality.get(), 90);
    assert_eq!(implicit.artifact_name(), "photo_100x100.jpg");

    let explicit = service
        .request("ab12cd34ef", "photo.jpg", "100x100", None, None, Some(90))
        .expect("valid request");
    assert_eq!(explicit.artifact_name(), "photo_100x100.jpg");

    let builtin = service
        .request("ab12cd34ef", "photo.jpg", "100x100", None, None, Some(85))
        .expect("valid request");
    assert_eq!(builtin.artifact_name(), "photo_100x100_85.jpg");
}

#[test]
fn malformed_requests_are_caller_errors() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);

    let err = service
        .thumbnail("ab12cd34ef", "photo.jpg", "100by100", None, None, None)
        .expect_err("malformed size");
    assert!(err.is_caller_error());
    assert!(matches!(
        err,
        ThumbnailError::Spec(ThumbnailSpecError::MalformedSize(_))
    ));

    let err = service
        .thumbnail("ab12cd34ef", "photo.jpg", "4000x10", None, None, None)
        .expect_err("beyond the configured limit");
    assert!(matches!(
        err,
        ThumbnailError::Spec(ThumbnailSpecError::SizeTooLarge { limit: 2048, .. })
    ));
}

#[tokio::test]
async fn blocking_render_runs_off_the_runtime() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);
    store_source(&service, "ab12cd34ef", 64, 64);

    let request = service
        .request("ab12cd34ef", "icon.png", "32x32", Some("fit"), None, None)
        .expect("valid request");
    let url = service.render(request).await.expect("render succeeds");
    assert!(service.artifact_path("icon_32x32_fit.png").exists());
    assert_eq!(url, "/media/cache/icon_32x32_fit.png");
}

#[test]
fn generator_emits_cache_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let root = TempDir::new().expect("tempdir");
    let service = service(&root);
    store_source(&service, "ab12cd34ef", 50, 50);

    metrics::with_local_recorder(&recorder, || {
        service
            .thumbnail("ab12cd34ef", "photo.png", "20x20", None, None, None)
            .expect("miss renders");
        service
            .thumbnail("ab12cd34ef", "photo.png", "20x20", None, None, None)
            .expect("hit");
        service
            .thumbnail("00000000", "missing.png", "20x20", None, None, None)
            .expect("placeholder");
    });

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for metric in [CACHE_HIT_TOTAL, CACHE_MISS_TOTAL, PLACEHOLDER_TOTAL, RENDER_MS] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
