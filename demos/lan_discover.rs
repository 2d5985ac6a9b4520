/**
 * LAN Discovery Example
 *
 * Listens for mDNS announcements of eWeLink devices on the local network and
 * prints every discovered device with its decoded state. Pass `ID=KEY` pairs
 * as arguments to decrypt announcements of devices in encrypted LAN mode.
 */
use futures_util::StreamExt;
use rusonoff::{LanApi, LanEvent};

#[tokio::main]
async fn main() -> rusonoff::Result<()> {
    env_logger::init();
    println!("--- Rusonoff - LAN Discovery ---");

    let lan = LanApi::new();
    for pair in std::env::args().skip(1) {
        if let Some((id, key)) = pair.split_once('=') {
            lan.register_device_key(id, key);
        }
    }

    let stream = lan.stream();
    tokio::pin!(stream);
    lan.connect().await?;
    println!("[INFO] Listening for devices, Ctrl+C to stop");

    let mut count = 0;
    while let Some(event) = stream.next().await {
        if let LanEvent::Discovered(device) = event {
            count += 1;
            println!(
                "[{}] Found Device: ID={}, IP={}:{}, Type={}, Encrypted={}",
                count, device.id, device.ip_address, device.port, device.kind, device.encrypt
            );
            if let Some(data) = device.data {
                println!("  {}", serde_json::to_string(&data.to_states())?);
            }
        }
    }
    Ok(())
}
