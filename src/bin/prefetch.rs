use sketch_search::builder::build_index;
use sketch_search::index::ShardedHashIndex;
use sketch_search::loader::{
    load_sketch, load_sketches, report_empty_sketches, sketch_paths_from_filelist,
};
use sketch_search::prefetch::{prefetch, write_prefetch_csv};

use structopt::StructOpt;

use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

#[derive(StructOpt)]
#[structopt(
    name = "sketch-prefetch",
    about = "Rank references by overlap with a query sketch"
)]
struct Cli {
    /// Path or URL of the query sketch
    query_path: String,
    /// File containing one reference sketch path per line
    #[structopt(parse(from_os_str))]
    ref_filelist: PathBuf,
    #[structopt(parse(from_os_str))]
    output_filename: PathBuf,
    #[structopt(short = "t", long = "threads", default_value = "1")]
    threads: usize,
    /// Minimum number of shared hashes for a reference to be reported
    #[structopt(short = "b", long = "threshold-bp", default_value = "50")]
    threshold_bp: u64,
    #[structopt(short = "n", long = "num-hashtables", default_value = "4096")]
    num_hashtables: usize,
}

fn show_args(args: &Cli) {
    println!("Query path: {}", args.query_path);
    println!("Ref filelist: {}", args.ref_filelist.display());
    println!("Output filename: {}", args.output_filename.display());
    println!("Number of threads: {}", args.threads);
    println!("Threshold bp: {}", args.threshold_bp);
    println!("Number of hash tables: {}", args.num_hashtables);
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::from_args();
    show_args(&args);

    let start = Instant::now();
    let query = load_sketch(&args.query_path);
    println!(
        "Query sketch {} has {} hashes",
        query.name,
        query.size()
    );
    let ref_paths = sketch_paths_from_filelist(&args.ref_filelist)?;
    let (refs, empty_sketch_ids) = load_sketches(&ref_paths, args.threads)?;
    report_empty_sketches(&empty_sketch_ids);
    println!("Time elapsed in loading sketches is: {:?}", start.elapsed());

    let start = Instant::now();
    let index = ShardedHashIndex::new(args.num_hashtables);
    build_index(&refs, &index, args.threads);
    println!("Time elapsed in building the index is: {:?}", start.elapsed());

    let num_hashes_in_ref = query
        .hashes
        .iter()
        .filter(|&&hash| index.contains(hash))
        .count();
    println!("Number of query hashes in the reference index: {}", num_hashes_in_ref);

    let start = Instant::now();
    let records = prefetch(&query, &refs, &index, args.threshold_bp);
    write_prefetch_csv(&records, &args.output_filename)?;
    println!(
        "{} matches written to {}",
        records.len(),
        args.output_filename.display()
    );
    println!("Time elapsed in prefetch is: {:?}", start.elapsed());
    Ok(())
}
