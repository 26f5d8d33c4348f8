use crate::sketch::{Sketch, SketchId};

use itertools::Itertools;
use rayon::prelude::*;
use tempfile::NamedTempFile;

use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Read the filelist: one sketch path per line. Lines are taken verbatim,
/// so a blank line is just a path that will fail to open and be reported as
/// an empty sketch.
pub fn sketch_paths_from_filelist<P: AsRef<Path>>(filelist: P) -> io::Result<Vec<String>> {
    let contents = fs::read_to_string(filelist)?;
    Ok(contents.lines().map(|line| line.to_string()).collect())
}

/// Asynchronously download to a temporary file. Using tokio::main here so
/// callers can just treat this function as sync.
#[tokio::main]
async fn download_to_tempfile(url: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut tmpfile = NamedTempFile::new()?;
    let response = reqwest::get(url).await?;
    tmpfile.write_all(&response.bytes().await?)?;
    Ok(tmpfile)
}

/// Load one sketch. Paths beginning with http refer to remote files and are
/// downloaded first; everything else is read from the local filesystem. Any
/// failure to open, download, or parse yields an empty sketch carrying the
/// path, never an error: per-sketch problems are reported after loading and
/// must not kill the run.
pub fn load_sketch(path: &str) -> Sketch {
    let contents = if path.starts_with("http") {
        match download_to_tempfile(path) {
            Ok(download) => fs::read_to_string(download.path()),
            Err(err) => {
                eprintln!("Could not download the sketch file {}: {}", path, err);
                return Sketch::empty(path.to_string());
            }
        }
    } else {
        fs::read_to_string(path)
    };
    let contents = match contents {
        Ok(contents) => contents,
        Err(err) => {
            eprintln!("Could not open the sketch file {}: {}", path, err);
            return Sketch::empty(path.to_string());
        }
    };
    match Sketch::from_json_str(&contents, path) {
        Ok(sketch) => sketch,
        Err(err) => {
            eprintln!("Could not parse the sketch file {}: {}", path, err);
            Sketch::empty(path.to_string())
        }
    }
}

/// Load every sketch in `paths` on a pool of `num_threads` workers. Returns
/// the sketches in filelist order together with the ids of the empty ones.
pub fn load_sketches(
    paths: &[String],
    num_threads: usize,
) -> Result<(Vec<Sketch>, Vec<SketchId>), Box<dyn Error>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .build()?;
    let sketches: Vec<Sketch> =
        pool.install(|| paths.par_iter().map(|path| load_sketch(path)).collect());
    let empty_sketch_ids = sketches
        .iter()
        .enumerate()
        .filter(|(_, sketch)| sketch.is_empty())
        .map(|(id, _)| id)
        .collect();
    Ok((sketches, empty_sketch_ids))
}

pub fn report_empty_sketches(empty_sketch_ids: &[SketchId]) {
    println!("Number of empty sketches: {}", empty_sketch_ids.len());
    if empty_sketch_ids.is_empty() {
        return;
    }
    println!(
        "Empty sketch ids: {}",
        empty_sketch_ids.iter().map(|id| id.to_string()).join(" ")
    );
}
