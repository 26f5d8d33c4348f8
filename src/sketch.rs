use serde::Deserialize;

use std::string::String;

/// Hash values are the 64-bit outputs of the MinHash function that produced
/// the sketch; we never recompute them, only compare them.
pub type HashValue = u64;

/// Index of a sketch in the ambient sketch vector. Stable for the duration
/// of a run.
pub type SketchId = usize;

/// A MinHash sketch: the sorted, deduplicated hash values of one sequence
/// plus the metadata carried in the sketch file. Created once at load time
/// and read-only afterwards.
#[derive(Clone, Debug)]
pub struct Sketch {
    pub hashes: Vec<HashValue>,
    pub file_path: String,
    pub name: String,
    pub md5: String,
    pub ksize: u32,
    pub max_hash: HashValue,
    pub seed: u64,
}

impl Sketch {
    pub fn new(
        mut hashes: Vec<HashValue>,
        file_path: String,
        name: String,
        md5: String,
        ksize: u32,
        max_hash: HashValue,
        seed: u64,
    ) -> Self {
        hashes.sort_unstable();
        hashes.dedup();
        Sketch {
            hashes,
            file_path,
            name,
            md5,
            ksize,
            max_hash,
            seed,
        }
    }

    /// A sketch with no hashes, standing in for a file that could not be
    /// read or parsed. The path is kept so the empty-sketch report can name
    /// the offender.
    pub fn empty(file_path: String) -> Self {
        Sketch {
            hashes: Vec::new(),
            file_path,
            name: String::new(),
            md5: String::new(),
            ksize: 0,
            max_hash: 0,
            seed: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Parse the sourmash-style JSON document: top level is an array, the
    /// first element has `name` and `signatures`, and `signatures[0]` holds
    /// the hashes and sketch parameters. Anything missing falls back to its
    /// default, so a truncated record degrades to an empty sketch.
    pub fn from_json_str(contents: &str, file_path: &str) -> Result<Self, serde_json::Error> {
        let records: Vec<SignatureRecord> = serde_json::from_str(contents)?;
        let record = match records.into_iter().next() {
            Some(record) => record,
            None => return Ok(Sketch::empty(file_path.to_string())),
        };
        let signature = match record.signatures.into_iter().next() {
            Some(signature) => signature,
            None => return Ok(Sketch::empty(file_path.to_string())),
        };
        Ok(Sketch::new(
            signature.mins,
            file_path.to_string(),
            record.name,
            signature.md5sum,
            signature.ksize,
            signature.max_hash,
            signature.seed,
        ))
    }
}

#[derive(Deserialize)]
struct SignatureRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    signatures: Vec<SignatureSketch>,
}

#[derive(Deserialize)]
struct SignatureSketch {
    #[serde(default)]
    mins: Vec<HashValue>,
    #[serde(default)]
    md5sum: String,
    #[serde(default)]
    ksize: u32,
    #[serde(default)]
    max_hash: HashValue,
    #[serde(default)]
    seed: u64,
}
