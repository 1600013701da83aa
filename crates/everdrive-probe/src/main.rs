//! Scenario runner for the EverDrive driver.
//!
//! Runs the driver through a fixed set of scenarios against the simulated
//! cartridge and prints a JSON report to stdout. Exit code 0 when every
//! scenario passes, 1 otherwise. Useful as a quick smoke check and as a
//! worked example of driving the packet protocol.

use std::process::ExitCode;

use serde::Serialize;

use n64_everdrive::sim::SimCart;
use n64_everdrive::{Everdrive, PACKET_LEN, Variant};

#[derive(Serialize)]
struct Scenario {
    name: &'static str,
    passed: bool,
    detail: String,
}

#[derive(Serialize)]
struct Report {
    total: usize,
    passed: usize,
    scenarios: Vec<Scenario>,
}

fn check(name: &'static str, result: Result<String, String>) -> Scenario {
    match result {
        Ok(detail) => Scenario {
            name,
            passed: true,
            detail,
        },
        Err(detail) => Scenario {
            name,
            passed: false,
            detail,
        },
    }
}

fn detect_series_v() -> Result<String, String> {
    let mut ed = Everdrive::new(SimCart::present(Variant::SeriesV));
    if !ed.detect() {
        return Err("V-series cartridge not detected".into());
    }
    match ed.variant() {
        Some(Variant::SeriesV) => Ok("detected V-series".into()),
        other => Err(format!("wrong variant: {other:?}")),
    }
}

fn detect_series_x() -> Result<String, String> {
    let mut ed = Everdrive::new(SimCart::present(Variant::SeriesX).with_sys_cfg(0xFFFF_FFFF));
    if !ed.detect() {
        return Err("X-series cartridge not detected".into());
    }
    if ed.bus().sys_cfg() != 0 {
        return Err("SYS_CFG not zeroed after unlock".into());
    }
    Ok("detected X-series, USB bridge enabled".into())
}

fn detect_absent() -> Result<String, String> {
    let mut ed = Everdrive::new(SimCart::absent());
    if ed.detect() {
        return Err("phantom cartridge detected in empty slot".into());
    }
    Ok("empty slot reported not present".into())
}

fn packet_loopback() -> Result<String, String> {
    let mut ed = Everdrive::new(SimCart::present(Variant::SeriesV));
    if !ed.detect() {
        return Err("cartridge not detected".into());
    }

    let outbound: [u8; PACKET_LEN] = *b"probe-loopback!!";
    if !ed.try_write_packet(&outbound) {
        return Err("write packet refused".into());
    }
    let Some(sent) = ed.bus_mut().take_sent_packet() else {
        return Err("host saw no packet".into());
    };
    ed.bus_mut().push_host_packet(sent);

    let mut inbound = [0u8; PACKET_LEN];
    if !ed.try_read_packet(&mut inbound) {
        return Err("read packet refused".into());
    }
    if inbound != outbound {
        return Err("loopback payload mismatch".into());
    }
    Ok("16-byte packet round-tripped through the host".into())
}

fn stall_timeout() -> Result<String, String> {
    let mut ed = Everdrive::new(SimCart::present(Variant::SeriesV));
    if !ed.detect() {
        return Err("cartridge not detected".into());
    }
    ed.bus_mut().stall_usb(true);

    if ed.try_write_packet(&[0u8; PACKET_LEN]) {
        return Err("stalled transfer reported success".into());
    }
    if ed.bus().access_depth() != 0 {
        return Err("lock leaked on timeout path".into());
    }
    if !ed.bus().interrupts_enabled() {
        return Err("interrupts left masked on timeout path".into());
    }
    Ok("stall surfaced as failure with the lock released".into())
}

fn link_power_loss() -> Result<String, String> {
    let mut ed = Everdrive::new(SimCart::present(Variant::SeriesV));
    if !ed.detect() {
        return Err("cartridge not detected".into());
    }
    ed.bus_mut().set_link_powered(false);

    let commands = ed.bus().usb_cfg_writes();
    let mut buf = [0u8; PACKET_LEN];
    if ed.try_read_packet(&mut buf) {
        return Err("read succeeded with the link down".into());
    }
    if ed.bus().usb_cfg_writes() != commands {
        return Err("command issued to an unpowered link".into());
    }
    Ok("unpowered link fails fast with no command traffic".into())
}

fn main() -> ExitCode {
    let scenarios = vec![
        check("detect_series_v", detect_series_v()),
        check("detect_series_x", detect_series_x()),
        check("detect_absent", detect_absent()),
        check("packet_loopback", packet_loopback()),
        check("stall_timeout", stall_timeout()),
        check("link_power_loss", link_power_loss()),
    ];

    let report = Report {
        total: scenarios.len(),
        passed: scenarios.iter().filter(|s| s.passed).count(),
        scenarios,
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("report serialization failed: {err}");
            return ExitCode::FAILURE;
        }
    }

    if report.passed == report.total {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
