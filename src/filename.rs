//! FAT32 8.3 Filename Codec
//!
//! Converts host filenames to the fixed 11-byte directory-name field and
//! matches queries against stored fields. Truncation to 8+3 is silent:
//! two long names that truncate to the same 11 bytes will collide, and
//! this writer does not detect that.

use crate::types::EntryKind;

/// Encode a host filename into the fixed 11-byte directory-name field.
///
/// Directories take the first 11 bytes of the name verbatim. Files split
/// at the last '.': up to 8 name bytes, up to 3 extension bytes. Both
/// forms are space padded and ASCII uppercased.
pub fn format_name(host_name: &str, kind: EntryKind) -> [u8; 11] {
    let mut field = [b' '; 11];
    let bytes = host_name.as_bytes();

    match kind {
        EntryKind::Directory => {
            let len = bytes.len().min(11);
            field[..len].copy_from_slice(&bytes[..len]);
        }
        EntryKind::File => match host_name.rfind('.') {
            Some(dot) => {
                let name_len = dot.min(8);
                field[..name_len].copy_from_slice(&bytes[..name_len]);
                let ext = &bytes[dot + 1..];
                let ext_len = ext.len().min(3);
                field[8..8 + ext_len].copy_from_slice(&ext[..ext_len]);
            }
            None => {
                let len = bytes.len().min(8);
                field[..len].copy_from_slice(&bytes[..len]);
            }
        },
    }

    for byte in &mut field {
        *byte = byte.to_ascii_uppercase();
    }
    field
}

/// Case-insensitive positional match of a query against a stored name field.
///
/// Every stored byte beyond the query length must be a space, so a short
/// query cannot falsely match a longer stored name.
pub fn name_matches(entry_name: &[u8; 11], query: &str) -> bool {
    let query = query.as_bytes();
    if query.len() > 11 {
        return false;
    }

    for (i, &byte) in query.iter().enumerate() {
        if entry_name[i] != byte.to_ascii_uppercase() {
            return false;
        }
    }

    entry_name[query.len()..].iter().all(|&b| b == b' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_with_extension() {
        assert_eq!(&format_name("bootx64.efi", EntryKind::File), b"BOOTX64 EFI");
        assert_eq!(&format_name("a.efi", EntryKind::File), b"A       EFI");
    }

    #[test]
    fn test_format_file_without_extension() {
        assert_eq!(&format_name("data", EntryKind::File), b"DATA       ");
    }

    #[test]
    fn test_format_file_truncation() {
        // Name part drops to 8 bytes, extension to 3
        assert_eq!(
            &format_name("verylongname.conf", EntryKind::File),
            b"VERYLONGCON"
        );
        // Split happens at the last dot
        assert_eq!(&format_name("a.b.efi", EntryKind::File), b"A.B     EFI");
    }

    #[test]
    fn test_format_directory() {
        assert_eq!(&format_name("boot", EntryKind::Directory), b"BOOT       ");
        assert_eq!(
            &format_name("averylongdirname", EntryKind::Directory),
            b"AVERYLONGDI"
        );
    }

    #[test]
    fn test_match_roundtrip() {
        for name in ["EFI", "boot", "drivers", "DATA"] {
            let field = format_name(name, EntryKind::Directory);
            assert!(name_matches(&field, name), "{name} should match itself");
        }
    }

    #[test]
    fn test_match_case_insensitive() {
        let field = format_name("BOOT", EntryKind::Directory);
        assert!(name_matches(&field, "boot"));
        assert!(name_matches(&field, "Boot"));
    }

    #[test]
    fn test_short_query_rejects_longer_stored_name() {
        let field = *b"BOOTX64 EFI";
        assert!(!name_matches(&field, "BOOT"));
        assert!(!name_matches(&field, "BOOTX64"));
    }

    #[test]
    fn test_overlong_query_never_matches() {
        let field = *b"BOOTX64 EFI";
        assert!(!name_matches(&field, "BOOTX64.EFI12"));
    }

    #[test]
    fn test_dotted_query_does_not_match_stored_83_form() {
        // The stored form spells "BOOTX64 EFI"; a dotted query compares
        // '.' against the pad space and misses. Directory re-descent never
        // hits this because directory names keep their bytes verbatim.
        let field = *b"BOOTX64 EFI";
        assert!(!name_matches(&field, "BOOTX64.EFI"));
    }
}
