//! Partitions command implementation

use crate::cli::partition_table;

/// Print the built-in partition table
pub fn run_partitions() {
    println!("{}", partition_table());
}
