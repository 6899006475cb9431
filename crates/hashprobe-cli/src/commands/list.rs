use hashprobe_core::{HashAlgorithm, HashFactory};

pub fn run() {
    println!("Built-in hash algorithms:\n");
    for algo in HashAlgorithm::ALL {
        println!("  {:<12} {:>4}-bit digest", algo.name(), algo.bit_width());
    }
}
