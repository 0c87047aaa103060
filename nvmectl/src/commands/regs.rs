// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Controller register snapshot via the device's PCI resource mapping.

use crate::device::DeviceContext;
use crate::ioctl::PAGE_SIZE;
use crate::render;
use anyhow::Context;
use nix::sys::mman::MapFlags;
use nix::sys::mman::ProtFlags;
use nix::sys::mman::mmap;
use nix::sys::mman::munmap;
use nvme_defs::RegisterBank;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use zerocopy::FromBytes;

const MAP_LEN: NonZeroUsize = NonZeroUsize::new(PAGE_SIZE).unwrap();

#[derive(clap::Args)]
pub struct ShowRegsArgs {
    /// Admin character device node (/dev/nvmeX).
    pub device: PathBuf,
}

/// Copies one read-only page out of the controller's BAR0 resource. The
/// mapping is private to this call and released before decoding.
fn snapshot_bar(pci: &fs::File) -> anyhow::Result<[u8; PAGE_SIZE]> {
    // SAFETY: Mapping a file the caller owns; the mapping is not handed
    //         out and is unmapped below.
    let mapping = unsafe {
        mmap(
            None,
            MAP_LEN,
            ProtFlags::PROT_READ,
            MapFlags::MAP_SHARED,
            pci,
            0,
        )
    }
    .context("failed to map pci resource")?;

    let mut page = [0u8; PAGE_SIZE];
    // SAFETY: The mapping is valid for PAGE_SIZE bytes until the munmap
    //         below.
    unsafe {
        std::ptr::copy_nonoverlapping(mapping.as_ptr().cast::<u8>(), page.as_mut_ptr(), PAGE_SIZE);
        if let Err(errno) = munmap(mapping, PAGE_SIZE) {
            tracing::debug!(%errno, "munmap pci resource");
        }
    }
    Ok(page)
}

pub fn show_regs(args: &ShowRegsArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    if dev.is_block() {
        anyhow::bail!("{} is not a character device", dev.name());
    }

    let base = dev
        .path()
        .file_name()
        .with_context(|| format!("{}: no device base name", dev.name()))?
        .to_string_lossy()
        .into_owned();
    let resource = PathBuf::from(format!("/sys/class/misc/{base}/device/resource0"));
    let pci = fs::File::open(&resource)
        .with_context(|| format!("{} did not find a pci resource", dev.name()))?;

    let page = snapshot_bar(&pci)?;
    let bank = RegisterBank::read_from_prefix(&page).unwrap().0;
    render::registers(&mut io::stdout().lock(), &bank)?;
    Ok(0)
}
