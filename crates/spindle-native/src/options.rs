//! Open options, seek origins and their translation to platform open flags.

use std::fs::OpenOptions;
use std::io::{self, SeekFrom};

bitflags::bitflags! {
    /// Access, sharing, attribute and behaviour bits a file is opened with.
    ///
    /// The layout is stable: each flag occupies one bit, in declaration order,
    /// starting at bit 0.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileOptions: u32 {
        /// Open for reading.
        const ACCESS_READ = 1 << 0;
        /// Open for writing. Missing files are created.
        const ACCESS_WRITE = 1 << 1;
        /// Let other handles read the file while it is open.
        const SHARED_READ = 1 << 2;
        /// Let other handles write the file while it is open.
        const SHARED_WRITE = 1 << 3;
        /// Request an encrypted file.
        const ATTRIBUTE_ENCRYPTED = 1 << 4;
        /// Request a hidden file.
        const ATTRIBUTE_HIDDEN = 1 << 5;
        /// Create the file read-only.
        const ATTRIBUTE_READONLY = 1 << 6;
        /// Mark the file as short-lived scratch data.
        const ATTRIBUTE_TEMPORARY = 1 << 7;
        /// Access pattern hint: random access.
        const FLAG_RANDOM_ACCESS = 1 << 8;
        /// Access pattern hint: sequential scan.
        const FLAG_SEQUENTIAL = 1 << 9;
        /// Remove the file when the handle is closed.
        const FLAG_DELETE_ON_CLOSE = 1 << 10;
        /// Never close the underlying descriptor (standard devices).
        const FLAG_NO_CLOSE = 1 << 11;

        /// Read and write access.
        const ACCESS_RW = Self::ACCESS_READ.bits() | Self::ACCESS_WRITE.bits();
        /// Shared read and write.
        const SHARED_RW = Self::SHARED_READ.bits() | Self::SHARED_WRITE.bits();
        /// All attribute bits.
        const ATTRIBUTE_MASK = Self::ATTRIBUTE_ENCRYPTED.bits()
            | Self::ATTRIBUTE_HIDDEN.bits()
            | Self::ATTRIBUTE_READONLY.bits()
            | Self::ATTRIBUTE_TEMPORARY.bits();
        /// All behaviour flag bits except no-close.
        const FLAG_MASK = Self::FLAG_RANDOM_ACCESS.bits()
            | Self::FLAG_SEQUENTIAL.bits()
            | Self::FLAG_DELETE_ON_CLOSE.bits();
    }
}

impl FileOptions {
    /// Whether at least one access bit is set.
    pub fn has_access(self) -> bool {
        self.intersects(Self::ACCESS_RW)
    }

    /// Whether the handle may be read.
    pub fn can_read(self) -> bool {
        self.contains(Self::ACCESS_READ)
    }

    /// Whether the handle may be written.
    pub fn can_write(self) -> bool {
        self.contains(Self::ACCESS_WRITE)
    }

    /// Translate into `std` open options for the current platform.
    ///
    /// Read-write and write-only handles open an existing file or create a new
    /// one; read-only handles require the file to exist. Nothing is truncated.
    pub fn to_open_options(self) -> OpenOptions {
        let mut open = OpenOptions::new();
        open.read(self.can_read()).write(self.can_write());
        if self.can_write() {
            open.create(true);
        }
        platform::apply(self, &mut open);
        open
    }
}

/// Reference point for a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeekOrigin {
    /// From the start of the file.
    #[default]
    Begin,
    /// From the current file pointer.
    Current,
    /// From the end of the file.
    End,
}

impl SeekOrigin {
    /// Build the `SeekFrom` for `offset` relative to this origin.
    ///
    /// Negative offsets from [`SeekOrigin::Begin`] are rejected.
    pub fn seek_from(self, offset: i64) -> io::Result<SeekFrom> {
        match self {
            Self::Begin => u64::try_from(offset).map(SeekFrom::Start).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "negative offset from file start")
            }),
            Self::Current => Ok(SeekFrom::Current(offset)),
            Self::End => Ok(SeekFrom::End(offset)),
        }
    }
}

/// Standard process devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StdDevice {
    Input,
    Output,
    Error,
}

#[cfg(windows)]
mod platform {
    use std::fs::OpenOptions;
    use std::os::windows::fs::OpenOptionsExt;

    use super::FileOptions;

    const FILE_SHARE_READ: u32 = 0x0000_0001;
    const FILE_SHARE_WRITE: u32 = 0x0000_0002;

    const FILE_ATTRIBUTE_READONLY: u32 = 0x0000_0001;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x0000_0002;
    const FILE_ATTRIBUTE_NORMAL: u32 = 0x0000_0080;
    const FILE_ATTRIBUTE_TEMPORARY: u32 = 0x0000_0100;
    const FILE_ATTRIBUTE_NOT_CONTENT_INDEXED: u32 = 0x0000_2000;
    const FILE_ATTRIBUTE_ENCRYPTED: u32 = 0x0000_4000;

    const FILE_FLAG_DELETE_ON_CLOSE: u32 = 0x0400_0000;
    const FILE_FLAG_SEQUENTIAL_SCAN: u32 = 0x0800_0000;
    const FILE_FLAG_RANDOM_ACCESS: u32 = 0x1000_0000;

    pub(super) fn apply(options: FileOptions, open: &mut OpenOptions) {
        let mut share = 0;
        if options.contains(FileOptions::SHARED_READ) {
            share |= FILE_SHARE_READ;
        }
        if options.contains(FileOptions::SHARED_WRITE) {
            share |= FILE_SHARE_WRITE;
        }
        open.share_mode(share);

        let mut flags = 0;
        if options.contains(FileOptions::FLAG_RANDOM_ACCESS) {
            flags |= FILE_FLAG_RANDOM_ACCESS;
        } else if options.contains(FileOptions::FLAG_SEQUENTIAL) {
            flags |= FILE_FLAG_SEQUENTIAL_SCAN;
        }
        if options.contains(FileOptions::FLAG_DELETE_ON_CLOSE) {
            flags |= FILE_FLAG_DELETE_ON_CLOSE;
        }
        open.custom_flags(flags);

        let mut attributes = 0;
        if options.contains(FileOptions::ATTRIBUTE_ENCRYPTED) {
            attributes |= FILE_ATTRIBUTE_ENCRYPTED;
        }
        if options.contains(FileOptions::ATTRIBUTE_HIDDEN) {
            attributes |= FILE_ATTRIBUTE_HIDDEN;
        }
        if options.contains(FileOptions::ATTRIBUTE_READONLY) {
            attributes |= FILE_ATTRIBUTE_READONLY;
        }
        if options.contains(FileOptions::ATTRIBUTE_TEMPORARY) {
            attributes |= FILE_ATTRIBUTE_TEMPORARY | FILE_ATTRIBUTE_NOT_CONTENT_INDEXED;
        }
        if attributes == 0 {
            attributes = FILE_ATTRIBUTE_NORMAL;
        }
        open.attributes(attributes);
    }

    /// Delete-on-close is handled by the OS.
    pub(crate) const EMULATE_DELETE_ON_CLOSE: bool = false;
}

#[cfg(unix)]
mod platform {
    use std::fs::OpenOptions;
    use std::os::unix::fs::OpenOptionsExt;

    use super::FileOptions;

    pub(super) fn apply(options: FileOptions, open: &mut OpenOptions) {
        // Only honoured when the file is created by this open.
        if options.contains(FileOptions::ATTRIBUTE_READONLY) {
            open.mode(0o444);
        }
        // Sharing, hidden, encrypted, temporary and access hints have no
        // portable open-time equivalent here and are advisory.
    }

    pub(crate) const EMULATE_DELETE_ON_CLOSE: bool = true;
}

#[cfg(not(any(unix, windows)))]
mod platform {
    use std::fs::OpenOptions;

    use super::FileOptions;

    pub(super) fn apply(_options: FileOptions, _open: &mut OpenOptions) {}

    pub(crate) const EMULATE_DELETE_ON_CLOSE: bool = true;
}

pub(crate) use platform::EMULATE_DELETE_ON_CLOSE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_layout() {
        assert_eq!(FileOptions::ACCESS_READ.bits(), 0x001);
        assert_eq!(FileOptions::ACCESS_WRITE.bits(), 0x002);
        assert_eq!(FileOptions::SHARED_READ.bits(), 0x004);
        assert_eq!(FileOptions::SHARED_WRITE.bits(), 0x008);
        assert_eq!(FileOptions::ATTRIBUTE_TEMPORARY.bits(), 0x080);
        assert_eq!(FileOptions::FLAG_DELETE_ON_CLOSE.bits(), 0x400);
        assert_eq!(FileOptions::FLAG_NO_CLOSE.bits(), 0x800);
        assert_eq!(FileOptions::ACCESS_RW.bits(), 0x003);
        assert_eq!(FileOptions::ATTRIBUTE_MASK.bits(), 0x0f0);
        assert_eq!(FileOptions::FLAG_MASK.bits(), 0x700);
    }

    #[test]
    fn test_access_queries() {
        assert!(!FileOptions::SHARED_RW.has_access());
        assert!(FileOptions::ACCESS_WRITE.has_access());

        let rw = FileOptions::ACCESS_RW | FileOptions::SHARED_READ;
        assert!(rw.can_read());
        assert!(rw.can_write());
        assert!(!FileOptions::ACCESS_READ.can_write());
    }

    #[test]
    fn test_seek_from() {
        assert_eq!(SeekOrigin::Begin.seek_from(10).unwrap(), SeekFrom::Start(10));
        assert_eq!(SeekOrigin::Current.seek_from(-4).unwrap(), SeekFrom::Current(-4));
        assert_eq!(SeekOrigin::End.seek_from(-1).unwrap(), SeekFrom::End(-1));

        let err = SeekOrigin::Begin.seek_from(-1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
