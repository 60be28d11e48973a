// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `profiles` and `ports` commands.

use crate::error::{BinError, BinResult};
use crate::runtime::HarnessRuntime;

/// Lists profiles on the search path. Later directories shadow earlier ones.
pub fn profiles(runtime: &HarnessRuntime) -> BinResult<()> {
    let locator = runtime.locator();
    let entries = locator.list();
    if entries.is_empty() {
        println!("No profiles found. Searched:");
        for dir in locator.paths() {
            println!("  {}", dir.display());
        }
        return Ok(());
    }

    let width = entries.iter().map(|e| e.file_name.len()).max().unwrap_or(0);
    for entry in &entries {
        println!("{:width$}  {}", entry.file_name, entry.dir.display());
    }
    Ok(())
}

/// Lists serial ports known to the operating system.
pub fn ports() -> BinResult<()> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| BinError::io(format!("failed to enumerate serial ports: {e}")))?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        let kind = match port.port_type {
            tokio_serial::SerialPortType::UsbPort(usb) => match usb.product {
                Some(product) => format!("USB {product}"),
                None => format!("USB {:04x}:{:04x}", usb.vid, usb.pid),
            },
            tokio_serial::SerialPortType::PciPort => "PCI".to_string(),
            tokio_serial::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
            tokio_serial::SerialPortType::Unknown => "-".to_string(),
        };
        println!("{}  {}", port.port_name, kind);
    }
    Ok(())
}
