/**
 * Cloud Things Example
 *
 * Logs into the eWeLink cloud with SONOFF_* credentials, lists the devices of
 * the current home and prints their normalized states. Afterwards it listens
 * on the sockets connection for state pushes.
 */
use futures_util::StreamExt;
use rusonoff::{Connections, CloudConfig, WsEvent};

#[tokio::main]
async fn main() -> rusonoff::Result<()> {
    env_logger::init();
    println!("--- Rusonoff - Cloud Things ---");

    // 1. Create the connection context with credentials from the environment
    let connections = Connections::with_cloud(CloudConfig::from_env()?);
    let api = connections.cloud_api()?;
    api.connect().await?;

    // 2. List devices of the current home
    let family = api.get_family().await?;
    let Some(home) = family.current() else {
        println!("[INFO] No home found on this account");
        return Ok(());
    };
    let things = api.get_family_things(&home.id).await?;
    for device in &things.devices {
        println!(
            "Device: ID={}, Name={}, UIID={}, Online={}",
            device.device_id,
            device.name,
            device.uiid(),
            device.online
        );
        match device.to_states() {
            Ok(Some(states)) => println!("  {}", serde_json::to_string(&states)?),
            Ok(None) => println!("  (unsupported UIID)"),
            Err(e) => println!("  invalid state: {}", e),
        }
    }

    // 3. Follow state pushes
    let ws = connections.cloud_ws()?;
    let stream = ws.stream();
    tokio::pin!(stream);
    ws.connect().await?;
    println!("[INFO] Listening for updates, Ctrl+C to stop");
    while let Some(event) = stream.next().await {
        match event {
            WsEvent::Message(message) => println!("Message: {:?}", message),
            WsEvent::Lost | WsEvent::Disconnected => break,
            other => println!("Event: {:?}", other),
        }
    }

    connections.shutdown();
    Ok(())
}
