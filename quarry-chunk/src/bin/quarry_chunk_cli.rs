use clap::Parser;
use quarry_chunk::Chunker;
use std::fs;
use std::io::{self, Read};

/// A CLI tool to chunk document text into JSON output using quarry-chunk.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Target size for each chunk in characters.
    #[arg(short, long, default_value_t = 2000)]
    chunk_size: usize,

    /// Number of characters to overlap between consecutive chunks.
    #[arg(short = 'o', long, default_value_t = 200)]
    chunk_overlap: usize,

    /// Minimum chunk size in characters; smaller trailing buffers are dropped.
    #[arg(short, long, default_value_t = 100)]
    min_chunk_size: usize,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let text = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let chunker = Chunker::new(args.chunk_size, args.chunk_overlap, args.min_chunk_size);
    let chunks = chunker.chunk(&text);

    let json_output = serde_json::to_string_pretty(&chunks)?;
    println!("{json_output}");

    Ok(())
}
