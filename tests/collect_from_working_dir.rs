//! Collecting inputs from the working directory, the way the CLI is usually run.
//!
//! Changing the working directory is process-wide, so this binary holds a
//! single test.

use image::RgbImage;
use std::path::{Path, PathBuf};
use upload_shrink::batch::collect_inputs;

fn write_jpeg(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::new(8, 8).save(path).unwrap();
}

#[test]
fn dot_root_skips_relative_output_directory() {
    let tmp = tempfile::TempDir::new().unwrap();
    write_jpeg(&tmp.path().join("keep.jpg"));
    write_jpeg(&tmp.path().join("shrunk/old.jpg"));
    std::env::set_current_dir(tmp.path()).unwrap();

    let inputs = collect_inputs(&[PathBuf::from(".")], Path::new("shrunk")).unwrap();

    let relative: Vec<_> = inputs.iter().map(|i| i.relative.clone()).collect();
    assert_eq!(relative, vec![PathBuf::from("keep.jpg")]);
}
