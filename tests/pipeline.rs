//! End-to-end runs through the library API with the real imaging backend.

use image::{GenericImageView, ImageEncoder, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use variant_forge::config::{self, AppConfig};
use variant_forge::process::{self, CancelFlag, Mode, ProcessError};
use variant_forge::report::MISSING_IMAGES_FILE;

const MARKUP: &str = r#"<ul class="top_carousel">
<li>
<picture>
<source media="(min-width: 1562px) and (min-resolution:2dppx)" data-srcset="/img/hero-01.jpg">
<img data-src="/img/hero-01.jpg" alt="">
</picture>
</li>
</ul>
<div class="mCommonsectionImgitem">
<picture>
<source media="(min-width: 1562px) and (min-resolution:2dppx)" data-srcset="/img/hero-01.jpg">
</picture>
</div>
"#;

const REWRITTEN: &str = r#"<ul class="top_carousel">
<li>
<picture>
<source media="(min-width: 1562px) and (min-resolution:2dppx)" data-srcset="/img/hero-011800.webp">
<img data-src="/img/hero-01900.webp" alt="">
</picture>
</li>
</ul>
<div class="mCommonsectionImgitem">
<picture>
<source media="(min-width: 1562px) and (min-resolution:2dppx)" data-srcset="/img/hero-011200.webp">
</picture>
</div>
"#;

/// Write a config rooted in `root` and load it the way the binary does.
fn load(root: &Path) -> AppConfig {
    let toml = format!(
        r#"
[directories]
documents = '{root}/documents'
images = '{root}/images'
markup = '{root}/html'
output = '{root}/output'
logs = '{root}/.logs'

[images]
quality = 90
method = 4

[sizes]
ALPHA09 = [[1800, 1200]]

[breakpoints.ALPHA09]
1562 = [1800, 1200]
source_default = 900
img_default = 900

[carousel.sensitive]
ALPHA09 = [1562]
"#,
        root = root.display()
    );
    let path = root.join("config.toml");
    fs::write(&path, toml).unwrap();
    config::load_config(&path).unwrap()
}

fn write_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 200) as u8, (y % 200) as u8, 60])
    });
    let writer = std::io::BufWriter::new(fs::File::create(path).unwrap());
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

fn workspace() -> (TempDir, AppConfig) {
    let tmp = TempDir::new().unwrap();
    let config = load(tmp.path());
    for dir in [
        &config.directories.documents,
        &config.directories.images,
        &config.directories.markup,
    ] {
        fs::create_dir_all(dir).unwrap();
    }
    fs::write(
        config.directories.documents.join("doc1.json"),
        r#"{"tables": [[["ALPHA09 hero", "＜画像＞hero-01\n画像名：gone-01"]]]}"#,
    )
    .unwrap();
    write_jpeg(&config.directories.images.join("hero-01.jpg"), 600, 300);
    fs::write(config.directories.markup.join("doc1.html"), MARKUP).unwrap();
    (tmp, config)
}

fn variant(config: &AppConfig) -> PathBuf {
    config.directories.output.join("doc1").join("hero-011800.webp")
}

#[test]
fn full_run_writes_letterboxed_variant() {
    let (_tmp, config) = workspace();

    let report = process::process(&config, Mode::Run, &CancelFlag::new(), None).unwrap();

    assert_eq!(report.documents, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.missing_images, 1);

    let img = image::open(variant(&config)).unwrap();
    assert_eq!(img.dimensions(), (1800, 1200));
    // 600x300 scales to 1800x900, leaving 150px of white above and below
    let top = img.get_pixel(900, 10);
    assert!(top.0[..3].iter().all(|&c| c > 240), "padding pixel {top:?}");
}

#[test]
fn full_run_rewrites_markup_by_carousel_context() {
    let (_tmp, config) = workspace();

    let report = process::process(&config, Mode::Run, &CancelFlag::new(), None).unwrap();

    let markup = fs::read_to_string(config.directories.markup.join("doc1.html")).unwrap();
    assert_eq!(markup, REWRITTEN);
    assert_eq!(report.substitutions, 3);
}

#[test]
fn missing_image_is_logged_and_others_continue() {
    let (_tmp, config) = workspace();

    process::process(&config, Mode::Variants, &CancelFlag::new(), None).unwrap();

    let log = fs::read_to_string(config.directories.logs.join(MISSING_IMAGES_FILE)).unwrap();
    assert!(log.starts_with("# missing image files\n"));
    let entries: Vec<&str> = log
        .lines()
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();
    assert_eq!(entries, vec!["doc1: gone-01"]);
    assert!(variant(&config).exists());
}

#[test]
fn second_run_encodes_nothing() {
    let (_tmp, config) = workspace();

    process::process(&config, Mode::Variants, &CancelFlag::new(), None).unwrap();
    let before = fs::metadata(variant(&config)).unwrap().modified().unwrap();
    let report = process::process(&config, Mode::Variants, &CancelFlag::new(), None).unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(report.existing, 1);
    let after = fs::metadata(variant(&config)).unwrap().modified().unwrap();
    assert_eq!(before, after);

    let converted =
        fs::read_to_string(config.directories.logs.join(process::CONVERTED_IMAGES_FILE)).unwrap();
    assert!(converted.ends_with("hero-011800.webp"));
}

#[test]
fn check_identifies_sources_without_writing() {
    let (_tmp, config) = workspace();

    let checked = process::check(&config).unwrap();

    let records = &checked[0].records;
    assert_eq!(records.len(), 2);
    let dims = records[0].dimensions.unwrap();
    assert_eq!((dims.width, dims.height), (600, 300));
    assert!(records[1].source.is_none());
    assert!(!config.directories.output.exists());
}

#[test]
fn empty_documents_dir_fails_the_run() {
    let tmp = TempDir::new().unwrap();
    let config = load(tmp.path());

    let result = process::process(&config, Mode::Run, &CancelFlag::new(), None);
    assert!(matches!(result, Err(ProcessError::NoSourceDocuments(_))));
}
