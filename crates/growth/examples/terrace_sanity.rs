//! Quick sanity run of the terrace engine.
//!
//! Usage:
//!   cargo run -p growth --example terrace_sanity -- [seed]
//!
//! Prints the terrace count and how the run stopped.

use growth::prelude::*;

fn main() {
    let seed = std::env::args()
        .nth(1)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(1);
    let params = TerraceParams {
        seed: Some(seed),
        ..TerraceParams::default()
    };
    match TerraceGrowth::new(params) {
        Ok(run) => {
            let out = run.grow();
            println!("terraces: {}", out.history.len());
            println!("stop: {:?}", out.stop);
        }
        Err(err) => eprintln!("{err}"),
    }
}
