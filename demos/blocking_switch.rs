/**
 * Blocking Switch Example
 *
 * Toggles a switch without an async runtime. Usage:
 *   blocking_switch DEVICE_ID IP_ADDRESS [on|off] [DEVICE_KEY]
 * With SONOFF_* credentials in the environment the write falls back to the
 * cloud when the device does not answer on the LAN.
 */
use rusonoff::blocking::Connections;
use rusonoff::{CloudConfig, Parameter, WriteTarget};
use serde_json::Value;

fn main() -> rusonoff::Result<()> {
    env_logger::init();
    println!("--- Rusonoff - Switch (Blocking) ---");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (Some(id), Some(ip)) = (args.first(), args.get(1)) else {
        println!("usage: blocking_switch DEVICE_ID IP_ADDRESS [on|off] [DEVICE_KEY]");
        return Ok(());
    };
    let state = args.get(2).map(String::as_str).unwrap_or("on");

    let connections = match CloudConfig::from_env() {
        Ok(config) => Connections::with_cloud(config),
        Err(_) => Connections::new(),
    };
    let mut target = WriteTarget::device(id.as_str()).with_lan(ip.as_str(), 8081);
    if let Some(key) = args.get(3) {
        target = target.with_key(key.as_str());
    }

    let mode = connections.write_state(&target, Parameter::Switch, Value::from(state), None, None)?;
    println!("[INFO] Switch of {} set to {} via {}", id, state, mode);

    connections.shutdown();
    Ok(())
}
