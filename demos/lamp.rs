//! Lamp switch - minimal command example.
//!
//! Turns a lamp on, dims it, and turns it off again.
//!
//! ```sh
//! cargo run --example lamp -- /dev/ttyUSB0
//! ```

use std::time::Duration;

use powerwire::{Bridge, House, Unit};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let bridge = Bridge::builder()
        .on_closed(|| println!("interface closed"))
        .open(&path)?;

    let lamp = [Unit::new(1).expect("valid unit")];

    println!("on");
    bridge.turn_on(House::A, &lamp).await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    println!("dim");
    bridge.dim(House::A, &lamp, 11).await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    println!("off");
    bridge.turn_off(House::A, &lamp).await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    bridge.stop().await;
    bridge.closed().await;
    Ok(())
}
