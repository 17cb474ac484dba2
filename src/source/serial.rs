// src/source/serial.rs  -  Scanner in USB-COM / RS-232 mode
//
// Many scanners can be switched from HID-keyboard emulation to a virtual
// serial port.  They then send the code as plain bytes followed by CR and/or
// LF.  Each byte is replayed as a press + release so the aggregator sees the
// same stream a keyboard-wedge scanner would produce.
//
// Linux:  /dev/ttyACM0 or /dev/ttyUSB0 (add yourself to `dialout`)
// Windows: COM3, COM4, …
// macOS:  /dev/cu.usbmodem*

use super::KeySource;
use crate::event::{KeyPhase, RawKeyEvent, KEY_ENTER, NON_PRINTABLE_BASE};
use anyhow::{anyhow, Result};
use serialport::SerialPort;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// USB vendor IDs of scanner makers whose devices enumerate as CDC-ACM ports
pub const SCANNER_VENDOR_IDS: &[(u16, &str)] = &[
    (0x0C2E, "Honeywell / Metrologic"),
    (0x05E0, "Zebra / Symbol"),
    (0x05F9, "Datalogic"),
    (0x1EAB, "Newland"),
];

type Queue = Arc<Mutex<VecDeque<RawKeyEvent>>>;

/// First serial port whose USB vendor is a known scanner maker
pub fn autodetect_port() -> Option<String> {
    let ports = serialport::available_ports().ok()?;
    for p in &ports {
        if let serialport::SerialPortType::UsbPort(info) = &p.port_type {
            if let Some((_, maker)) = SCANNER_VENDOR_IDS.iter().find(|(v, _)| info.vid == *v) {
                log::info!(
                    "[serial] autodetect: {} (VID:{:04x} PID:{:04x} {})",
                    p.port_name, info.vid, info.pid, maker
                );
                return Some(p.port_name.clone());
            }
        }
    }
    None
}

pub struct SerialScanner {
    queue:   Queue,
    name:    String,
    _reader: thread::JoinHandle<()>,  // background serial reader
}

impl SerialScanner {
    /// Open `port_path` (empty = autodetect) at `baud_rate`, 8N1
    pub fn open(port_path: &str, baud_rate: u32) -> Result<Self> {
        let resolved = if port_path.is_empty() {
            autodetect_port().ok_or_else(|| anyhow!(
                "No serial scanner found automatically.\n  \
                 Plug it in (USB-COM mode), then pass --port <device>.\n  \
                 Run `scan-wedge --list-devices` to see all serial ports."
            ))?
        } else {
            port_path.to_string()
        };

        let port: Box<dyn SerialPort> = serialport::new(&resolved, baud_rate)
            .timeout(Duration::from_millis(50))
            .open()
            .map_err(|e| anyhow!(
                "Cannot open serial port '{}': {e}\n  \
                 Check that the scanner is plugged in and you have read/write permission.\n  \
                 Linux: sudo usermod -aG dialout $USER  (then re-login)",
                resolved
            ))?;

        log::info!("[serial] Opened {} at {} baud", resolved, baud_rate);

        let queue: Queue = Arc::new(Mutex::new(VecDeque::new()));
        let queue_rd = Arc::clone(&queue);
        let handle = thread::spawn(move || serial_reader(port, queue_rd));

        Ok(Self { queue, name: format!("Serial scanner ({resolved})"), _reader: handle })
    }
}

impl KeySource for SerialScanner {
    fn name(&self) -> &str { &self.name }

    fn poll(&mut self) -> Option<RawKeyEvent> {
        self.queue.lock().ok()?.pop_front()
    }
}

fn serial_reader(mut port: Box<dyn SerialPort>, queue: Queue) {
    let mut buf = [0u8; 64];
    loop {
        match port.read(&mut buf) {
            Ok(0) => {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(n) => {
                log::debug!("[serial] {} bytes", n);
                let Ok(mut q) = queue.lock() else { return };
                for &byte in &buf[..n] {
                    q.extend(byte_events(byte));
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                log::error!("[serial] read error: {e}");
                thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

/// One received byte → press + release.
/// CR/LF map to Enter, other control bytes to identities above 255.
pub fn byte_events(byte: u8) -> [RawKeyEvent; 2] {
    let (key_id, character) = match byte {
        b'\r' | b'\n'       => (KEY_ENTER, Some("\n".to_string())),
        0x00..=0x1f | 0x7f  => (NON_PRINTABLE_BASE + byte as u64, None),
        _                   => (byte as u64, Some(char::from(byte).to_string())),
    };
    [
        RawKeyEvent::new(key_id, KeyPhase::Down, character.clone()),
        RawKeyEvent::new(key_id, KeyPhase::Up,   character),
    ]
}

// ── List serial ports (for --list-devices) ───────────────────────────────────

pub fn list_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.iter().map(|p| {
            let detail = match &p.port_type {
                serialport::SerialPortType::UsbPort(info) => format!(
                    "USB VID:{:04x} PID:{:04x}{}",
                    info.vid, info.pid,
                    info.product.as_deref()
                        .map(|s| format!(" \"{}\"", s))
                        .unwrap_or_default()
                ),
                serialport::SerialPortType::BluetoothPort => "Bluetooth".into(),
                _ => "Serial".into(),
            };
            format!("Serial {}  ({})", p.port_name, detail)
        }).collect(),
        Err(e) => vec![format!("Serial port enumeration failed: {e}")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_bytes_become_keystrokes() {
        let [down, up] = byte_events(b'7');
        assert_eq!(down, RawKeyEvent::down('7'));
        assert_eq!(up, RawKeyEvent::up('7'));
    }

    #[test]
    fn line_endings_become_enter() {
        assert_eq!(byte_events(b'\r')[1].key_id, KEY_ENTER);
        assert_eq!(byte_events(b'\n')[0].key_id, KEY_ENTER);
    }

    #[test]
    fn control_bytes_carry_no_payload() {
        let [down, _] = byte_events(0x02);
        assert!(down.key_id > 255);
        assert!(down.character.is_none());
    }
}
