//! Serial port scanner
//!
//! This module lists the serial ports worth probing for heads.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialport::{available_ports, SerialPortType};
use tracing::{debug, info};

use crate::error::DetectError;

/// Information about a serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    /// Create from serialport crate's port info
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product.clone(),
            },
            _ => Self {
                port: name,
                vid: None,
                pid: None,
                product: None,
            },
        }
    }

    pub fn is_usb(&self) -> bool {
        self.vid.is_some()
    }
}

/// Scan and identification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Only try ports whose name contains one of these (empty = all)
    #[serde(default)]
    pub include_patterns: Vec<String>,
    /// Never try ports whose name contains one of these
    #[serde(default = "default_skip_patterns")]
    pub skip_patterns: Vec<String>,
    /// `ID_NUMBER?` attempts per port
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Upper bound on opening and identifying one port
    #[serde(default = "default_port_timeout_ms")]
    pub port_timeout_ms: u64,
}

fn default_skip_patterns() -> Vec<String> {
    vec![
        // Bluetooth ports on macOS
        "Bluetooth".to_string(),
        // Debug/logging ports
        "debug".to_string(),
    ]
}

fn default_attempts() -> u32 {
    3
}

fn default_port_timeout_ms() -> u64 {
    15_000
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            skip_patterns: default_skip_patterns(),
            attempts: default_attempts(),
            port_timeout_ms: default_port_timeout_ms(),
        }
    }
}

impl ScanConfig {
    pub fn port_timeout(&self) -> Duration {
        Duration::from_millis(self.port_timeout_ms)
    }

    /// Check if a port name passes the include and skip patterns
    pub fn accepts(&self, port: &str) -> bool {
        if self.skip_patterns.iter().any(|p| port.contains(p.as_str())) {
            return false;
        }
        self.include_patterns.is_empty()
            || self.include_patterns.iter().any(|p| port.contains(p.as_str()))
    }
}

/// Serial port scanner
pub struct PortScanner {
    config: ScanConfig,
}

impl PortScanner {
    /// Create a new scanner with default configuration
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
        }
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Enumerate all available serial ports that pass the filters
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        info!("Enumerating serial ports...");
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;

        let mut result: Vec<_> = ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .filter(|p| {
                let keep = self.config.accepts(&p.port);
                if !keep {
                    debug!("Skipping {}", p.port);
                }
                keep
            })
            .collect();
        sort_candidates(&mut result);

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
            for port in &result {
                let desc = port.product.as_deref().unwrap_or("Unknown");
                info!("  {} - {}", port.port, desc);
            }
        }

        Ok(result)
    }

    /// Port names to try, USB ports first
    pub fn candidate_ports(&self) -> Result<Vec<String>, DetectError> {
        Ok(self
            .enumerate_ports()?
            .into_iter()
            .map(|p| p.port)
            .collect())
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// USB adapters first, then by name
fn sort_candidates(ports: &mut [SerialPortInfo]) {
    ports.sort_by(|a, b| {
        b.is_usb()
            .cmp(&a.is_usb())
            .then_with(|| a.port.cmp(&b.port))
    });
}
