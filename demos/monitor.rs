//! Line monitor - prints everything the interface reports.
//!
//! Services device polls (buffered events, clock loss, programming
//! addresses) and logs decoded activity until interrupted.
//!
//! ```sh
//! RUST_LOG=powerwire=debug cargo run --example monitor -- /dev/ttyUSB0
//! ```

use powerwire::Bridge;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let bridge = Bridge::builder()
        .on_unit_status(|status| {
            println!(
                "{:?} {:?} units {:?} dims {:?}",
                status.house, status.function, status.units, status.dims
            );
        })
        .on_controller_status(|status| {
            println!(
                "interface clock {:02}:{:02}:{:02}, day {}, on {:?}",
                status.hours,
                status.minutes,
                status.seconds,
                status.year_day,
                status.on_units()
            );
        })
        .on_closed(|| println!("interface closed"))
        .open(&path)?;

    // Kick off one status request, then just service the line.
    bridge.status().await;

    tokio::signal::ctrl_c().await?;
    bridge.stop().await;
    bridge.closed().await;
    Ok(())
}
