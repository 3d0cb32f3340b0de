//! Compression format detection by magic number and file extension.

use std::path::Path;

use super::CompressionMethod;

/// Detect compression format from the first bytes of a stream
///
/// # Magic Numbers Used
/// - Gzip: `1f 8b` (RFC 1952)
/// - Bzip2: `42 5a 68` ("BZh" with block size)
/// - XZ: `fd 37 7a 58 5a 00` (XZ format specification)
/// - Zstd: `28 b5 2f fd` (Zstandard frame format)
pub fn detect_compression_method(magic: &[u8]) -> Option<CompressionMethod> {
    if magic.len() < 2 {
        return None;
    }

    // Check magic numbers in order of common usage
    if magic.starts_with(&[0x1f, 0x8b]) {
        Some(CompressionMethod::Gzip)
    } else if magic.starts_with(&[0x42, 0x5a, 0x68]) {
        Some(CompressionMethod::Bzip2)
    } else if magic.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
        Some(CompressionMethod::Zstd)
    } else if magic.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
        Some(CompressionMethod::Xz)
    } else {
        None
    }
}

/// Detect compression format from file extension
pub fn detect_by_extension(path: &Path) -> Option<CompressionMethod> {
    let ext = path.extension()?.to_str()?;
    match ext.to_lowercase().as_str() {
        "gz" | "tgz" => Some(CompressionMethod::Gzip),
        "bz2" => Some(CompressionMethod::Bzip2),
        "xz" => Some(CompressionMethod::Xz),
        "lzma" => Some(CompressionMethod::Lzma),
        "zst" | "zstd" => Some(CompressionMethod::Zstd),
        "zz" => Some(CompressionMethod::Zlib),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_gzip_magic() {
        let magic = [0x1f, 0x8b, 0x08, 0x00];
        assert_eq!(detect_compression_method(&magic), Some(CompressionMethod::Gzip));
    }

    #[test]
    fn test_detect_bzip2_magic() {
        let magic = [0x42, 0x5a, 0x68, 0x39];
        assert_eq!(detect_compression_method(&magic), Some(CompressionMethod::Bzip2));
    }

    #[test]
    fn test_detect_xz_magic() {
        let magic = [0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];
        assert_eq!(detect_compression_method(&magic), Some(CompressionMethod::Xz));
    }

    #[test]
    fn test_detect_zstd_magic() {
        let magic = [0x28, 0xb5, 0x2f, 0xfd];
        assert_eq!(detect_compression_method(&magic), Some(CompressionMethod::Zstd));
    }

    #[test]
    fn test_detect_no_compression() {
        assert_eq!(detect_compression_method(&[0x00, 0x00, 0x00, 0x00]), None);
        assert_eq!(detect_compression_method(&[0x1f]), None);
        // Truncated xz signature
        assert_eq!(detect_compression_method(&[0xfd, 0x37, 0x7a]), None);
    }

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(
            detect_by_extension(Path::new("file.gz")),
            Some(CompressionMethod::Gzip)
        );
        assert_eq!(
            detect_by_extension(Path::new("file.BZ2")),
            Some(CompressionMethod::Bzip2)
        );
        assert_eq!(
            detect_by_extension(Path::new("file.lzma")),
            Some(CompressionMethod::Lzma)
        );
        assert_eq!(
            detect_by_extension(Path::new("file.zstd")),
            Some(CompressionMethod::Zstd)
        );
        assert_eq!(detect_by_extension(Path::new("file.txt")), None);
        assert_eq!(detect_by_extension(Path::new("noext")), None);
    }
}
