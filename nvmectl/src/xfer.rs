// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Chunked firmware image transfer.
//!
//! A firmware image of arbitrary length is pushed to the controller in
//! page-multiple chunks, one admin command per chunk, tracking the dword
//! offset as the wire sees it. A failed chunk ends the transfer; there is
//! no resume, the caller restarts from offset zero.

use crate::device::DeviceContext;
use crate::encode;
use crate::encode::EncodeError;
use crate::ioctl;
use crate::ioctl::CommandError;
use nvme_defs::AdminOpcode;
use zerocopy::IntoBytes;

/// One planned download command: `offset` and `len` are in bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub offset: usize,
    pub len: usize,
}

/// Coerces a requested per-command transfer size up to a whole number of
/// pages.
fn coerce_xfer(xfer: usize) -> usize {
    if xfer == 0 {
        ioctl::PAGE_SIZE
    } else {
        xfer.next_multiple_of(ioctl::PAGE_SIZE)
    }
}

/// Splits an image into transfer chunks. The image length must be a
/// multiple of 4 bytes, since the wire carries dword counts; this is
/// rejected before anything is submitted.
pub fn plan(image_len: usize, xfer: usize) -> Result<Vec<Chunk>, EncodeError> {
    if image_len % 4 != 0 {
        return Err(EncodeError::BadImageSize(image_len as u64));
    }
    let xfer = coerce_xfer(xfer);
    let mut chunks = Vec::with_capacity(image_len.div_ceil(xfer));
    let mut offset = 0;
    let mut remaining = image_len;
    while remaining > 0 {
        let len = xfer.min(remaining);
        chunks.push(Chunk { offset, len });
        offset += len;
        remaining -= len;
    }
    Ok(chunks)
}

/// A download that did not run to completion.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// A chunk submission failed; everything before `offset` has already
    /// been transferred and is not rolled back.
    #[error("firmware download failed at offset {offset:#x}")]
    Chunk {
        offset: usize,
        #[source]
        err: CommandError,
    },
}

/// Downloads a firmware image, one admin command per chunk. Stops at the
/// first failure; a partial download is reported, not rolled back.
pub fn download(dev: &DeviceContext, image: &[u8], xfer: usize) -> Result<(), DownloadError> {
    let chunks = plan(image.len(), xfer)?;
    let mut buf = ioctl::alloc_pages(coerce_xfer(xfer));
    let buf = buf.as_mut_bytes();

    for chunk in &chunks {
        let data = &mut buf[..chunk.len];
        data.copy_from_slice(&image[chunk.offset..chunk.offset + chunk.len]);
        let fields = encode::firmware_download(chunk.len as u32, chunk.offset as u32);

        tracing::debug!(offset = chunk.offset, len = chunk.len, "firmware download chunk");
        ioctl::submit_admin(
            dev.file(),
            AdminOpcode::FIRMWARE_IMAGE_DOWNLOAD,
            data,
            &fields,
        )
        .map_err(|err| DownloadError::Chunk {
            offset: chunk.offset,
            err,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_covers_the_image_exactly() {
        let image_len = 3 * 4096 + 1024;
        let chunks = plan(image_len, 4096).unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.last().unwrap().len, 1024);
        assert_eq!(chunks.iter().map(|c| c.len).sum::<usize>(), image_len);
        // Offsets are cumulative byte positions.
        assert_eq!(chunks[2].offset, 2 * 4096);
    }

    #[test]
    fn plan_with_divisible_image_uses_full_chunks() {
        let chunks = plan(2 * 8192, 8192).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len == 8192));
    }

    #[test]
    fn plan_rejects_unaligned_image_before_any_submission() {
        assert_eq!(plan(4097, 4096), Err(EncodeError::BadImageSize(4097)));
        assert_eq!(plan(2, 4096), Err(EncodeError::BadImageSize(2)));
    }

    #[test]
    fn transfer_size_is_coerced_up_to_pages() {
        assert_eq!(coerce_xfer(0), 4096);
        assert_eq!(coerce_xfer(1), 4096);
        assert_eq!(coerce_xfer(4096), 4096);
        assert_eq!(coerce_xfer(5000), 8192);

        // A sub-page transfer request still moves page-sized chunks.
        let chunks = plan(8192, 100).unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn empty_image_plans_no_chunks() {
        assert!(plan(0, 4096).unwrap().is_empty());
    }

    #[test]
    fn chunk_fields_carry_dword_counts() {
        let chunks = plan(4096 + 512, 4096).unwrap();
        let first = encode::firmware_download(chunks[0].len as u32, chunks[0].offset as u32);
        assert_eq!(first.cdw10, 4096 / 4 - 1);
        assert_eq!(first.cdw11, 0);
        let last = encode::firmware_download(chunks[1].len as u32, chunks[1].offset as u32);
        assert_eq!(last.cdw10, 512 / 4 - 1);
        assert_eq!(last.cdw11, 4096 / 4);
    }
}
