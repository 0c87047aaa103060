// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! NVM Express command line utility.
//!
//! Issues admin and I/O commands to an NVMe controller through the Linux
//! passthrough ioctls and decodes what comes back.

// UNSAFETY: Issuing ioctls and mapping PCI resources.
#![expect(unsafe_code)]

mod commands;
mod device;
mod dump;
mod encode;
mod ioctl;
mod render;
mod xfer;

use clap::Parser;
use std::process::ExitCode;

/// NVM Express management tool.
///
/// The device may be either an NVMe character device (ex: /dev/nvme0) or
/// an nvme block device (ex: /dev/nvme0n1).
#[derive(Parser)]
#[clap(name = "nvmectl", version)]
struct Cli {
    /// Print debug-level tracing to stderr.
    #[clap(long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Send NVMe Identify Controller, display structure.
    IdCtrl(commands::identify::IdCtrlArgs),
    /// Send NVMe Identify Namespace, display structure.
    IdNs(commands::identify::IdNsArgs),
    /// Send NVMe Identify List, display structure.
    ListNs(commands::identify::ListNsArgs),
    /// Retrieve the namespace ID of an opened block device.
    GetNsId(commands::identify::GetNsIdArgs),
    /// Generic NVMe get log, returns log in raw format.
    GetLog(commands::logs::GetLogArgs),
    /// Retrieve FW Log, show it.
    FwLog(commands::logs::FwLogArgs),
    /// Retrieve SMART Log, show it.
    SmartLog(commands::logs::SmartLogArgs),
    /// Retrieve Error Log, show it.
    ErrorLog(commands::logs::ErrorLogArgs),
    /// Get feature and show the resulting value.
    GetFeature(commands::features::GetFeatureArgs),
    /// Set a feature and show the resulting value.
    SetFeature(commands::features::SetFeatureArgs),
    /// Format namespace with new block format.
    Format(commands::format::FormatArgs),
    /// Activate new firmware slot.
    FwActivate(commands::firmware::FwActivateArgs),
    /// Download new firmware.
    FwDownload(commands::firmware::FwDownloadArgs),
    /// Submit arbitrary admin command, return results.
    AdminPassthru(commands::passthru::PassthruArgs),
    /// Submit an arbitrary IO command, return results.
    IoPassthru(commands::passthru::PassthruArgs),
    /// Submit a Security Send command, return results.
    SecuritySend(commands::security::SecuritySendArgs),
    /// Submit a Security Receive command, return results.
    SecurityRecv(commands::security::SecurityRecvArgs),
    /// Submit a Reservation Acquire, return results.
    ResvAcquire(commands::resv::ResvAcquireArgs),
    /// Submit a Reservation Register, return results.
    ResvRegister(commands::resv::ResvRegisterArgs),
    /// Submit a Reservation Release, return results.
    ResvRelease(commands::resv::ResvReleaseArgs),
    /// Submit a Reservation Report, return results.
    ResvReport(commands::resv::ResvReportArgs),
    /// Submit a Flush command, return results.
    Flush(commands::io::FlushArgs),
    /// Submit a Compare command, return results.
    Compare(commands::io::SubmitIoArgs),
    /// Submit a read command, return results.
    Read(commands::io::SubmitIoArgs),
    /// Submit a write command, return results.
    Write(commands::io::SubmitIoArgs),
    /// Show the controller registers. Requires the admin character device.
    ShowRegs(commands::regs::ShowRegsArgs),
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::level_filters::LevelFilter::DEBUG
    } else {
        tracing::level_filters::LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .compact()
        .with_ansi(false)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: &Command) -> anyhow::Result<i32> {
    match command {
        Command::IdCtrl(args) => commands::identify::id_ctrl(args),
        Command::IdNs(args) => commands::identify::id_ns(args),
        Command::ListNs(args) => commands::identify::list_ns(args),
        Command::GetNsId(args) => commands::identify::get_ns_id(args),
        Command::GetLog(args) => commands::logs::get_log_cmd(args),
        Command::FwLog(args) => commands::logs::fw_log(args),
        Command::SmartLog(args) => commands::logs::smart_log(args),
        Command::ErrorLog(args) => commands::logs::error_log(args),
        Command::GetFeature(args) => commands::features::get_feature(args),
        Command::SetFeature(args) => commands::features::set_feature(args),
        Command::Format(args) => commands::format::format(args),
        Command::FwActivate(args) => commands::firmware::fw_activate(args),
        Command::FwDownload(args) => commands::firmware::fw_download(args),
        Command::AdminPassthru(args) => commands::passthru::admin(args),
        Command::IoPassthru(args) => commands::passthru::io(args),
        Command::SecuritySend(args) => commands::security::send(args),
        Command::SecurityRecv(args) => commands::security::recv(args),
        Command::ResvAcquire(args) => commands::resv::acquire(args),
        Command::ResvRegister(args) => commands::resv::register(args),
        Command::ResvRelease(args) => commands::resv::release(args),
        Command::ResvReport(args) => commands::resv::report(args),
        Command::Flush(args) => commands::io::flush(args),
        Command::Compare(args) => commands::io::compare(args),
        Command::Read(args) => commands::io::read(args),
        Command::Write(args) => commands::io::write(args),
        Command::ShowRegs(args) => commands::regs::show_regs(args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli.command) {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(err) => {
            eprintln!("nvmectl: {err:#}");
            ExitCode::FAILURE
        }
    }
}
