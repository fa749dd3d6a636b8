//! bgswap CLI tool
//!
//! Command-line interface for removing and replacing image backgrounds using
//! the bgswap library with support for ONNX Runtime and Tract backends.

#[cfg(feature = "cli")]
use bgswap::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
