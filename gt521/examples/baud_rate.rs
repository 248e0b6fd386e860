//! Switch a module to another line speed
//!
//! The new rate is remembered, so the next run opens at it directly.

use gt521::Reader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let port = std::env::var("GT521_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());
    let rate: u32 = std::env::args()
        .nth(1)
        .map(|arg| arg.parse())
        .transpose()?
        .unwrap_or(115200);

    let mut reader = Reader::serial(port)?;
    reader.open().await?;

    println!("Currently at {}", reader.store().baud_rate());
    let rate = reader.change_baud_rate(rate).await?;
    println!("Now at {}", rate);

    println!("Finger on sensor: {}", reader.is_finger_pressed().await?);

    reader.close().await?;
    Ok(())
}
