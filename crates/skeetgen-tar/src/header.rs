//! ustar header layout, checksums and field codecs

use crate::error::{ArchiveError, Result};
use smol_str::SmolStr;

/// Size of a header record and the alignment unit for entry payloads
pub const BLOCK_SIZE: usize = 512;

/// Checksum contribution of the checksum field when treated as eight spaces
pub const INITIAL_CHECKSUM: u64 = 8 * 32;

const NAME: (usize, usize) = (0, 100);
const MODE: (usize, usize) = (100, 8);
const UID: (usize, usize) = (108, 8);
const GID: (usize, usize) = (116, 8);
const SIZE: (usize, usize) = (124, 12);
const MTIME: (usize, usize) = (136, 12);
const CHECKSUM: (usize, usize) = (148, 8);
const TYPEFLAG: usize = 156;
const LINKNAME: (usize, usize) = (157, 100);
const MAGIC: (usize, usize) = (257, 6);
const VERSION: (usize, usize) = (263, 2);
const UNAME: (usize, usize) = (265, 32);
const GNAME: (usize, usize) = (297, 32);
const PREFIX: (usize, usize) = (345, 155);

/// Entry type from the header's type flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// Regular file (`'0'` or NUL)
    File,
    /// Hard link
    Link,
    /// Symbolic link
    Symlink,
    /// Character device
    CharDevice,
    /// Block device
    BlockDevice,
    /// Directory
    Directory,
    /// Named pipe
    Fifo,
    /// Contiguous file
    Contiguous,
    /// Anything else, carrying the raw flag byte
    Unknown(u8),
}

impl EntryType {
    /// Map a type flag byte to an entry type
    pub fn from_byte(flag: u8) -> Self {
        match flag {
            b'0' | 0 => EntryType::File,
            b'1' => EntryType::Link,
            b'2' => EntryType::Symlink,
            b'3' => EntryType::CharDevice,
            b'4' => EntryType::BlockDevice,
            b'5' => EntryType::Directory,
            b'6' => EntryType::Fifo,
            b'7' => EntryType::Contiguous,
            other => EntryType::Unknown(other),
        }
    }

    /// Type flag byte written for this entry type
    pub fn as_byte(&self) -> u8 {
        match self {
            EntryType::File => b'0',
            EntryType::Link => b'1',
            EntryType::Symlink => b'2',
            EntryType::CharDevice => b'3',
            EntryType::BlockDevice => b'4',
            EntryType::Directory => b'5',
            EntryType::Fifo => b'6',
            EntryType::Contiguous => b'7',
            EntryType::Unknown(b) => *b,
        }
    }

    /// Short lowercase name, as shown in listings
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::File => "file",
            EntryType::Link => "link",
            EntryType::Symlink => "symlink",
            EntryType::CharDevice => "character_device",
            EntryType::BlockDevice => "block_device",
            EntryType::Directory => "directory",
            EntryType::Fifo => "fifo",
            EntryType::Contiguous => "contiguous_file",
            EntryType::Unknown(_) => "unknown",
        }
    }
}

/// Decoded metadata of one archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Full path, with the ustar prefix joined back on
    pub name: SmolStr,
    /// Permission bits
    pub mode: u32,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
    /// Payload size in bytes
    pub size: u64,
    /// Modification time, seconds since the epoch
    pub mtime: u64,
    /// Entry type
    pub entry_type: EntryType,
    /// Link target for link entries
    pub link_name: SmolStr,
    /// Owner user name
    pub owner: SmolStr,
    /// Owner group name
    pub group: SmolStr,
}

impl EntryHeader {
    /// Payload size rounded up to the record boundary
    pub fn entry_size(&self) -> u64 {
        padded_len(self.size)
    }

    /// Decode a header record.
    ///
    /// Returns `Ok(None)` for the all-zero terminator record.
    pub fn decode(block: &[u8; BLOCK_SIZE]) -> Result<Option<Self>> {
        let actual = checksum(block);
        let expected = read_octal(block, CHECKSUM, "checksum").ok();

        if expected != Some(actual) {
            // everything outside the checksum field is zero
            if actual == INITIAL_CHECKSUM {
                return Ok(None);
            }
            return Err(ArchiveError::ChecksumMismatch { expected, actual });
        }

        let magic = read_str(block, MAGIC);
        if !magic.starts_with("ustar") {
            return Err(ArchiveError::UnsupportedFormat {
                magic: magic.to_string(),
            });
        }

        let name = read_str(block, NAME);
        let prefix = read_str(block, PREFIX);
        let name = if prefix.is_empty() {
            SmolStr::new(name)
        } else {
            smol_str::format_smolstr!("{}/{}", prefix, name)
        };

        Ok(Some(Self {
            name,
            mode: read_octal(block, MODE, "mode")? as u32,
            uid: read_octal(block, UID, "uid")? as u32,
            gid: read_octal(block, GID, "gid")? as u32,
            size: read_octal(block, SIZE, "size")?,
            mtime: read_octal(block, MTIME, "mtime")?,
            entry_type: EntryType::from_byte(block[TYPEFLAG]),
            link_name: SmolStr::new(read_str(block, LINKNAME)),
            owner: SmolStr::new(read_str(block, UNAME)),
            group: SmolStr::new(read_str(block, GNAME)),
        }))
    }
}

/// Attributes written into encoded headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryAttributes {
    /// Permission bits, default `0o664`
    pub mode: u32,
    /// Owner user id, default 1000
    pub uid: u32,
    /// Owner group id, default 1000
    pub gid: u32,
    /// Modification time in seconds, default now
    pub mtime: u64,
    /// Owner user name, default empty
    pub user: SmolStr,
    /// Owner group name, default empty
    pub group: SmolStr,
}

impl Default for EntryAttributes {
    fn default() -> Self {
        Self {
            mode: 0o664,
            uid: 1000,
            gid: 1000,
            mtime: chrono::Utc::now().timestamp().max(0) as u64,
            user: SmolStr::default(),
            group: SmolStr::default(),
        }
    }
}

/// Split a filename into ustar `(prefix, name)` fields.
///
/// Names of at most 100 bytes are stored as is. Longer names are split on the
/// last `/` that keeps the prefix within 155 bytes, provided the remaining
/// name fits in 100 bytes.
pub fn split_name(filename: &str) -> Result<(&str, &str)> {
    let len = filename.len();

    if len <= NAME.1 {
        return Ok(("", filename));
    }

    filename
        .match_indices('/')
        .map(|(idx, _)| idx)
        .filter(|&idx| idx <= PREFIX.1 && len - idx - 1 <= NAME.1 && idx + 1 < len)
        .last()
        .map(|idx| (&filename[..idx], &filename[idx + 1..]))
        .ok_or(ArchiveError::NameTooLong { len })
}

/// Encode a header record for a regular file of `size` bytes
pub fn encode_header(
    filename: &str,
    size: u64,
    attrs: &EntryAttributes,
) -> Result<[u8; BLOCK_SIZE]> {
    let (prefix, name) = split_name(filename)?;

    let mut block = [0u8; BLOCK_SIZE];

    write_str(&mut block, name, NAME, "name")?;
    write_octal(&mut block, attrs.mode as u64, MODE, "mode")?;
    write_octal(&mut block, attrs.uid as u64, UID, "uid")?;
    write_octal(&mut block, attrs.gid as u64, GID, "gid")?;
    write_octal(&mut block, size, SIZE, "size")?;
    write_octal(&mut block, attrs.mtime, MTIME, "mtime")?;
    block[TYPEFLAG] = EntryType::File.as_byte();
    block[MAGIC.0..MAGIC.0 + MAGIC.1].copy_from_slice(b"ustar\0");
    block[VERSION.0..VERSION.0 + VERSION.1].copy_from_slice(b"00");
    write_str(&mut block, &attrs.user, UNAME, "user")?;
    write_str(&mut block, &attrs.group, GNAME, "group")?;
    write_str(&mut block, prefix, PREFIX, "prefix")?;

    // six digits, NUL, space
    let sum = format!("{:06o}\0 ", checksum(&block));
    block[CHECKSUM.0..CHECKSUM.0 + CHECKSUM.1].copy_from_slice(sum.as_bytes());

    Ok(block)
}

/// Sum of all header bytes with the checksum field counted as spaces
pub fn checksum(block: &[u8; BLOCK_SIZE]) -> u64 {
    let (start, len) = CHECKSUM;
    block
        .iter()
        .enumerate()
        .filter(|(i, _)| *i < start || *i >= start + len)
        .map(|(_, b)| *b as u64)
        .sum::<u64>()
        + INITIAL_CHECKSUM
}

/// Round a payload length up to the record boundary
pub fn padded_len(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE as u64) * BLOCK_SIZE as u64
}

fn read_str(block: &[u8], (offset, len): (usize, usize)) -> String {
    let field = &block[offset..offset + len];
    let end = field.iter().position(|b| *b == 0).unwrap_or(len);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn read_octal(block: &[u8], range: (usize, usize), field: &'static str) -> Result<u64> {
    let raw = read_str(block, range);
    let digits = raw.trim_matches(|c: char| c == ' ' || c == '\0');

    if digits.is_empty() {
        return Ok(0);
    }

    u64::from_str_radix(digits, 8).map_err(|_| ArchiveError::InvalidOctal { field })
}

fn write_str(
    block: &mut [u8],
    value: &str,
    (offset, len): (usize, usize),
    field: &'static str,
) -> Result<()> {
    if value.len() > len {
        return Err(ArchiveError::FieldOverflow { field });
    }
    block[offset..offset + value.len()].copy_from_slice(value.as_bytes());
    Ok(())
}

fn write_octal(
    block: &mut [u8],
    value: u64,
    (offset, len): (usize, usize),
    field: &'static str,
) -> Result<()> {
    // one byte is left for the terminating NUL
    let digits = format!("{:0width$o}", value, width = len - 1);
    if digits.len() > len - 1 {
        return Err(ArchiveError::FieldOverflow { field });
    }
    block[offset..offset + digits.len()].copy_from_slice(digits.as_bytes());
    Ok(())
}
