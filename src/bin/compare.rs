use sketch_search::builder::build_index;
use sketch_search::index::ShardedHashIndex;
use sketch_search::loader::{load_sketches, report_empty_sketches, sketch_paths_from_filelist};
use sketch_search::pairwise::{compute_pairwise, concatenate_pass_files};

use structopt::StructOpt;

use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

#[derive(StructOpt)]
#[structopt(
    name = "sketch-compare",
    about = "All-vs-all containment over a collection of MinHash sketches"
)]
struct Cli {
    /// File containing one sketch path per line
    #[structopt(parse(from_os_str))]
    filelist: PathBuf,
    /// Directory for the per-(pass, thread) tile files
    #[structopt(parse(from_os_str))]
    working_dir: PathBuf,
    /// Final concatenated output
    #[structopt(parse(from_os_str))]
    output_filename: PathBuf,
    /// Minimum containment of the query row in the reference to emit a pair
    #[structopt(short = "c", long = "containment-threshold", default_value = "0.5")]
    containment_threshold: f64,
    #[structopt(short = "t", long = "threads", default_value = "1")]
    threads: usize,
    #[structopt(short = "n", long = "num-hashtables", default_value = "4096")]
    num_hashtables: usize,
    #[structopt(short = "p", long = "num-passes", default_value = "1")]
    num_passes: usize,
}

fn show_args(args: &Cli) {
    println!("Filelist: {}", args.filelist.display());
    println!("Working directory: {}", args.working_dir.display());
    println!("Output filename: {}", args.output_filename.display());
    println!("Containment threshold: {}", args.containment_threshold);
    println!("Number of threads: {}", args.threads);
    println!("Number of hash tables: {}", args.num_hashtables);
    println!("Number of passes: {}", args.num_passes);
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::from_args();
    show_args(&args);
    if !args.working_dir.is_dir() {
        return Err(format!(
            "working directory {} does not exist or is not a directory",
            args.working_dir.display()
        )
        .into());
    }

    let start = Instant::now();
    let sketch_paths = sketch_paths_from_filelist(&args.filelist)?;
    let (sketches, empty_sketch_ids) = load_sketches(&sketch_paths, args.threads)?;
    report_empty_sketches(&empty_sketch_ids);
    println!("Time elapsed in loading sketches is: {:?}", start.elapsed());

    let start = Instant::now();
    let index = ShardedHashIndex::new(args.num_hashtables);
    build_index(&sketches, &index, args.threads);
    println!("Time elapsed in building the index is: {:?}", start.elapsed());

    let start = Instant::now();
    compute_pairwise(
        &sketches,
        &sketches,
        &index,
        &args.working_dir,
        args.containment_threshold,
        args.num_passes,
        args.threads,
    )?;
    concatenate_pass_files(
        &args.working_dir,
        args.num_passes,
        args.threads,
        &args.output_filename,
    )?;
    println!("Time elapsed in pairwise comparison is: {:?}", start.elapsed());
    Ok(())
}
