//! Composite a content image over a style image.
//!
//! Usage:
//! ```sh
//! cargo run --example composite -- content.png style.jpg output.jpg
//! ```

use std::env;
use std::process;

use style_composite::{CompositeConfig, CompositeEngine};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <content> <style> <output>", args[0]);
        process::exit(1);
    }

    let engine = CompositeEngine::new(CompositeConfig::default()).expect("default config is valid");
    let result = engine.process_file(args[1].as_ref(), args[2].as_ref(), args[3].as_ref());

    if result.success() {
        println!("Done: {}", result.message());
    } else {
        eprintln!("Error: {}", result.message());
        process::exit(1);
    }
}
