//! Multipart part planning
//!
//! Splits a large file into the byte ranges uploaded as individual parts.

/// Minimum part size (5MB) - S3 requirement
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size (5GB) - S3 requirement
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum parts allowed
pub const MAX_PARTS: u64 = 10000;

/// One part of a multipart upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    /// 1-based, as S3 expects
    pub part_number: i32,
    pub offset: u64,
    pub len: u64,
}

/// Clamp the requested chunk size to S3 limits and grow it until the file
/// fits in `MAX_PARTS` parts.
pub fn adjust_chunksize(requested: u64, file_size: u64) -> u64 {
    let mut chunksize = requested.clamp(MIN_PART_SIZE, MAX_PART_SIZE);

    while file_size.div_ceil(chunksize) > MAX_PARTS && chunksize < MAX_PART_SIZE {
        chunksize = (chunksize * 2).min(MAX_PART_SIZE);
    }

    chunksize
}

/// Byte ranges covering `file_size` in `chunksize` steps; the last part may
/// be shorter. An empty file still gets one empty part.
pub fn plan_parts(file_size: u64, chunksize: u64) -> Vec<PartRange> {
    let chunksize = chunksize.max(1);
    let count = file_size.div_ceil(chunksize).max(1);

    (0..count)
        .map(|index| {
            let offset = index * chunksize;
            PartRange {
                part_number: (index + 1) as i32,
                offset,
                len: chunksize.min(file_size - offset.min(file_size)),
            }
        })
        .collect()
}
