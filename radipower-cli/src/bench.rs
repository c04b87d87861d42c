//! Where the heads come from: serial ports or simulated heads

use std::collections::HashMap;

use anyhow::bail;
use radipower_detect::{enumerate, enumerate_with, Enumeration, IdTable, PortScanner};
use radipower_head::{HeadError, Transport};
use radipower_sim::{spawn_virtual_head, VirtualHead, VirtualHeadConfig};
use tokio::io::DuplexStream;
use tokio_serial::SerialStream;
use tracing::info;

use crate::settings::Settings;

/// Models and acquisition speeds handed out to simulated heads in turn
const SIMULATED_MODELS: [(&str, u16); 3] = [("RPR2006C", 20), ("RPR1018A", 1000), ("RPR1006C", 10)];

/// Enumerate heads on the given ports, or on every candidate port
pub async fn serial(
    ports: &[String],
    table: &IdTable,
    settings: &Settings,
) -> anyhow::Result<Enumeration<SerialStream>> {
    let ports = if ports.is_empty() {
        PortScanner::with_config(settings.scan.clone()).candidate_ports()?
    } else {
        ports.to_vec()
    };
    Ok(enumerate(&ports, table, &settings.scan, &settings.link).await)
}

/// Enumerate `count` simulated heads carrying serial numbers from `table`
pub async fn simulated(
    count: usize,
    table: &IdTable,
    settings: &Settings,
) -> anyhow::Result<Enumeration<DuplexStream>> {
    if count > table.len() {
        bail!(
            "Cannot simulate {} heads, the ID table has {} entries",
            count,
            table.len()
        );
    }

    let mut streams = HashMap::with_capacity(count);
    let mut ports = Vec::with_capacity(count);
    for (i, entry) in table.entries().iter().take(count).enumerate() {
        let (model, acq_speed_ksps) = SIMULATED_MODELS[i % SIMULATED_MODELS.len()];
        let head = VirtualHead::from_config(VirtualHeadConfig {
            serial_number: entry.serial_number.clone(),
            model: model.to_string(),
            acq_speed_ksps,
            power_dbm: -5.0 - 3.0 * i as f64,
            ..Default::default()
        });
        let port = format!("sim{i}");
        streams.insert(port.clone(), spawn_virtual_head(head).stream);
        ports.push(port);
    }
    info!("Simulating {} head(s)", count);

    let link = settings.link.clone();
    Ok(enumerate_with(&ports, table, &settings.scan, |port| {
        let stream = streams.remove(&port);
        let link = link.clone();
        async move {
            match stream {
                Some(stream) => Ok(Transport::open(port, stream, &link).await),
                None => Err(HeadError::Closed { port }),
            }
        }
    })
    .await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use radipower_detect::Channel;

    #[tokio::test]
    async fn test_simulated_heads_take_table_channels() {
        let table = IdTable::builtin();
        let found = simulated(3, &table, &Settings::default()).await.unwrap();

        let channels: Vec<Channel> = found.sessions.keys().copied().collect();
        let expected: Vec<Channel> = table.entries()[..3].iter().map(|e| e.channel).collect();
        assert_eq!(channels, expected);
        assert!(found.failures.is_empty());
    }

    #[tokio::test]
    async fn test_too_many_simulated_heads() {
        let table = IdTable::builtin();
        let result = simulated(table.len() + 1, &table, &Settings::default()).await;
        assert!(result.is_err());
    }
}
