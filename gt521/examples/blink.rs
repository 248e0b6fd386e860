//! Open a module, print its info and blink the backlight

use std::time::Duration;

use gt521::Reader;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gt521=info".into()),
        )
        .init();

    let port = std::env::var("GT521_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());

    println!("Available ports: {:?}", gt521::available_ports()?);

    let mut reader = Reader::serial(port)?;
    let info = reader.open().await?;
    println!("Opened: {}", info);
    println!("Enrolled: {}", reader.enroll_count().await?);

    for _ in 0..3 {
        reader.led_on().await?;
        sleep(Duration::from_millis(500)).await;
        reader.led_off().await?;
        sleep(Duration::from_millis(500)).await;
    }

    reader.close().await?;
    println!("Done!");

    Ok(())
}
