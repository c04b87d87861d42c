//! Subcommand bodies, shared by serial and simulated heads

use std::time::Instant;

use anyhow::{bail, Context};
use radipower_detect::{Channel, Enumeration};
use radipower_head::{HeadError, Identity, Link, Mirror, Session};
use radipower_protocol::{BaudCode, FilterSetting};
use serde::Serialize;
use tracing::{info, warn};

use crate::{Commands, ConfigureArgs};

/// Run one subcommand against every head found, then close them
pub async fn run<L: Link>(command: &Commands, mut found: Enumeration<L>) -> anyhow::Result<()> {
    for failure in found.unknown_ids() {
        warn!("{}: {}", failure.port, failure.error);
    }
    for collision in &found.collisions {
        warn!("Ignored duplicate head: {}", collision);
    }
    if found.is_empty() {
        bail!(
            "No heads found ({} port(s) skipped)",
            found.failures.len()
        );
    }

    let result = match command {
        Commands::Scan { json } => scan(&found, *json),
        Commands::Read { count, temperature } => read(&mut found, *count, *temperature).await,
        Commands::Configure(args) => configure(&mut found, args).await,
        Commands::Settings { .. } => Ok(()),
    };

    for (channel, session) in found.sessions {
        if let Err(e) = session.close().await {
            warn!("{}: close failed: {}", channel, e);
        }
    }
    result
}

#[derive(Serialize)]
struct HeadRow<'a> {
    channel: Channel,
    port: &'a str,
    identity: &'a Identity,
    settings: &'a Mirror,
}

fn scan<L: Link>(found: &Enumeration<L>, json: bool) -> anyhow::Result<()> {
    if json {
        let rows: Vec<HeadRow<'_>> = found
            .sessions
            .iter()
            .map(|(channel, session)| HeadRow {
                channel: *channel,
                port: session.port(),
                identity: session.identity(),
                settings: session.mirror(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for (channel, session) in &found.sessions {
        let identity = session.identity();
        let mirror = session.mirror();
        println!(
            "{}  {:<14} {}  {}  fw {}  {}-{} Hz  filter {}  {} kS/s  {}",
            channel,
            session.port(),
            identity.model,
            identity.serial_number,
            identity.firmware_version,
            identity.min_frequency_hz,
            identity.max_frequency_hz,
            mirror.filter,
            mirror.acq_speed_ksps,
            mirror.baud
        );
    }
    Ok(())
}

async fn read<L: Link>(
    found: &mut Enumeration<L>,
    count: u32,
    temperature: bool,
) -> anyhow::Result<()> {
    let started = Instant::now();
    let mut readings = 0u32;
    let mut failed = 0usize;

    for (channel, session) in found.sessions.iter_mut() {
        match read_head(session, count, temperature).await {
            Ok(line) => {
                readings += count;
                println!("{}  {}", channel, line);
            }
            Err(e) => {
                failed += 1;
                println!("{}  error: {}", channel, e);
            }
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    if readings > 0 && elapsed > 0.0 {
        println!(
            "{} reading(s) in {:.3} s, {:.1} readings/s",
            readings,
            elapsed,
            f64::from(readings) / elapsed
        );
    }
    if failed > 0 {
        bail!("{} head(s) could not be read", failed);
    }
    Ok(())
}

async fn read_head<L: Link>(
    session: &mut Session<L>,
    count: u32,
    temperature: bool,
) -> Result<String, HeadError> {
    let mut last = None;
    for _ in 0..count {
        last = Some(session.read_power().await?);
    }
    let mut line = match last {
        Some(reading) => reading.to_string(),
        None => "-".to_string(),
    };

    let samples = session
        .resolve_sample_count()
        .map(|n| n.to_string())
        .unwrap_or_else(|_| "?".to_string());
    line.push_str(&format!(
        "  ({} samples, ~{} ms per reading)",
        samples,
        session.estimated_exchange_time().as_millis()
    ));

    if temperature {
        let celsius = session.temperature().await?;
        line.push_str(&format!("  {:.1} °C", celsius));
    }
    Ok(line)
}

async fn configure<L: Link>(found: &mut Enumeration<L>, args: &ConfigureArgs) -> anyhow::Result<()> {
    let baud = match args.baud {
        Some(bps) => Some(
            BaudCode::from_bps(bps).with_context(|| format!("Unsupported bit rate {bps}"))?,
        ),
        None => None,
    };

    let mut failed = 0usize;
    for (channel, session) in found.sessions.iter_mut() {
        match configure_head(session, args, baud).await {
            Ok(()) => {
                let mirror = session.mirror();
                let frequency = mirror
                    .frequency_hz
                    .map(|hz| format!("{hz} Hz"))
                    .unwrap_or_else(|| "unset".to_string());
                let vbw = session
                    .video_bandwidth()
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  frequency {}  filter {}  {} kS/s  VBW {}  {}",
                    channel, frequency, mirror.filter, mirror.acq_speed_ksps, vbw, mirror.baud
                );
            }
            Err(e) => {
                failed += 1;
                println!("{}  error: {}", channel, e);
            }
        }
    }

    if let Some(baud) = baud {
        info!(
            "Heads now run at {}; set link.baud_rate to {} in the settings file",
            baud,
            baud.bits_per_second()
        );
    }
    if failed > 0 {
        bail!("{} head(s) could not be configured", failed);
    }
    Ok(())
}

/// Frequency first, baud last so the earlier commands use the known rate
async fn configure_head<L: Link>(
    session: &mut Session<L>,
    args: &ConfigureArgs,
    baud: Option<BaudCode>,
) -> Result<(), HeadError> {
    if let Some(hz) = args.frequency {
        session.set_frequency(hz).await?;
    } else {
        session.frequency().await?;
    }
    if let Some(ksps) = args.acq_speed {
        session.set_acq_speed(ksps).await?;
    }
    if let Some(setting) = args.vbw {
        session.set_vbw(setting).await?;
    }
    match (args.filter, args.averages) {
        (Some(setting), _) => session.set_filter(setting).await?,
        (None, Some(target)) => {
            session.apply_averaging(target, args.policy).await?;
        }
        (None, None) => {
            session.filter().await?;
        }
    }
    if let Some(baud) = baud {
        session.set_baud(baud).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench;
    use crate::settings::Settings;
    use radipower_detect::IdTable;
    use radipower_protocol::{AveragingPolicy, FilterCode, VbwCode, VbwSetting};

    fn args() -> ConfigureArgs {
        ConfigureArgs {
            frequency: None,
            filter: None,
            averages: None,
            policy: AveragingPolicy::Closest,
            acq_speed: None,
            vbw: None,
            baud: None,
        }
    }

    #[tokio::test]
    async fn test_configure_averaging_per_family() {
        let mut found = bench::simulated(3, &IdTable::builtin(), &Settings::default())
            .await
            .unwrap();
        let args = ConfigureArgs {
            frequency: Some(2_400_000_000),
            averages: Some(100),
            vbw: Some(VbwSetting::Fixed(VbwCode::Mhz1)),
            ..args()
        };
        configure(&mut found, &args).await.unwrap();

        for session in found.sessions.values() {
            let mirror = session.mirror();
            assert_eq!(mirror.frequency_hz, Some(2_400_000_000));
            let code = match mirror.filter {
                FilterSetting::Fixed(code) => code,
                FilterSetting::Auto => panic!("filter left on AUTO"),
            };
            assert_eq!(session.family().samples_for(code), 100);
            assert_eq!(session.video_bandwidth(), Some(VbwCode::Mhz1));
        }
    }

    #[tokio::test]
    async fn test_configure_reports_refused_speed() {
        let mut found = bench::simulated(2, &IdTable::builtin(), &Settings::default())
            .await
            .unwrap();
        // 20 kS/s exists on RPR2006 only
        let args = ConfigureArgs {
            acq_speed: Some(20),
            filter: Some(FilterSetting::Fixed(FilterCode::MIN)),
            ..args()
        };
        assert!(configure(&mut found, &args).await.is_err());
    }

    #[tokio::test]
    async fn test_read_every_head() {
        let found = bench::simulated(2, &IdTable::builtin(), &Settings::default())
            .await
            .unwrap();
        run(
            &Commands::Read {
                count: 2,
                temperature: true,
            },
            found,
        )
        .await
        .unwrap();
    }
}
