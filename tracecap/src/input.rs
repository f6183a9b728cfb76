use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Open a trace for reading. `-` is stdin; `.gz` files are decompressed.
pub fn open_input(name: &str) -> io::Result<Box<dyn Read + Send>> {
    if name == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(Path::new(name))?;
    if name.ends_with(".gz") {
        Ok(Box::new(GzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Open an output file. `-` is stdout.
pub fn open_output(name: &str) -> io::Result<Box<dyn io::Write + Send>> {
    if name == "-" {
        Ok(Box::new(io::stdout()))
    } else {
        Ok(Box::new(File::create(Path::new(name))?))
    }
}
