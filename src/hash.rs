use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{IoResultExt, Result};

/// hash algorithm identifier, uniform across one index document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMode {
    /// SHA-256 rendered in Nix's base32 alphabet
    #[default]
    Nix,
}

impl HashMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashMode::Nix => "nix",
        }
    }
}

impl fmt::Display for HashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nix's base32 alphabet, omits e o t u
const NIX_ALPHABET: &[u8; 32] = b"0123456789abcdfghijklmnpqrsvwxyz";

/// encode bytes in Nix base32: 5-bit groups taken from the end of the
/// input backwards, no padding
fn nixbase32(input: &[u8]) -> String {
    if input.is_empty() {
        return String::new();
    }
    let output_len = (input.len() * 8 - 1) / 5 + 1;
    let mut output = String::with_capacity(output_len);
    for n in (0..output_len).rev() {
        let b = n * 5;
        let i = b / 8;
        let j = b % 8;
        let mut c = input[i] >> j;
        if i + 1 < input.len() {
            c |= ((input[i + 1] as u16) << (8 - j as u16)) as u8;
        }
        output.push(NIX_ALPHABET[(c & 0x1f) as usize] as char);
    }
    output
}

/// hash a byte slice
pub fn hash_bytes(bytes: &[u8], mode: HashMode) -> String {
    match mode {
        HashMode::Nix => nixbase32(&Sha256::digest(bytes)),
    }
}

/// hash a string
pub fn hash_text(text: &str, mode: HashMode) -> String {
    hash_bytes(text.as_bytes(), mode)
}

/// hash a file's entire content without loading it into memory
pub fn hash_file(path: &Path, mode: HashMode) -> Result<String> {
    let mut file = File::open(path).with_path(path)?;
    match mode {
        HashMode::Nix => {
            let mut hasher = Sha256::new();
            let mut buf = [0u8; 64 * 1024];
            loop {
                let n = file.read(&mut buf).with_path(path)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            Ok(nixbase32(&hasher.finalize()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    #[test]
    fn test_nixbase32_empty() {
        assert_eq!(nixbase32(&[]), "");
    }

    #[test]
    fn test_nixbase32_one_byte() {
        assert_eq!(nixbase32(&[0x1f]), "0z");
    }

    #[test]
    fn test_nixbase32_twenty_bytes() {
        let input = [
            0x8a, 0x12, 0x32, 0x15, 0x22, 0xfd, 0x91, 0xef,
            0xbd, 0x60, 0xeb, 0xb2, 0x48, 0x1a, 0xf8, 0x85,
            0x80, 0xf6, 0x16, 0x00,
        ];
        assert_eq!(nixbase32(&input), "00bgd045z0d4icpbc2yyz4gx48ak44la");
    }

    #[test]
    fn test_nixbase32_thirty_two_bytes() {
        let input = [
            0xb3, 0xa2, 0x4d, 0xe9, 0x7a, 0x8f, 0xdb, 0xc8,
            0x35, 0xb9, 0x83, 0x31, 0x69, 0x50, 0x10, 0x30,
            0xb8, 0x97, 0x70, 0x31, 0xbc, 0xb5, 0x4b, 0x3b,
            0x3a, 0xc1, 0x37, 0x40, 0xf8, 0x46, 0xab, 0x30,
        ];
        assert_eq!(
            nixbase32(&input),
            "0c5b8vw40dy178xlpddw65q9gf1h2186jcc3p4swinwggbllv8mk"
        );
    }

    #[test]
    fn test_hash_text_empty() {
        assert_eq!(
            hash_text("", HashMode::Nix),
            "0mdqa9w1p6cmli6976v4wi0sw9r4p5prkj7lzfd1877wk11c9c73"
        );
    }

    #[test]
    fn test_hash_text_known_value() {
        assert_eq!(
            hash_text("abc", HashMode::Nix),
            "1b8m03r63zqhnjf7l5wnldhh7c134ap5vpj0850ymkq1iyzicy5s"
        );
    }

    #[test]
    fn test_hash_length() {
        // 32 bytes always render to 52 characters
        assert_eq!(hash_text("", HashMode::Nix).len(), 52);
        assert_eq!(hash_bytes(&[0u8; 100], HashMode::Nix).len(), 52);
    }

    #[test]
    fn test_hash_bytes_determinism() {
        let h1 = hash_bytes(b"hello", HashMode::Nix);
        let h2 = hash_bytes(b"hello", HashMode::Nix);
        assert_eq!(h1, h2);

        let h3 = hash_bytes(b"world", HashMode::Nix);
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_hash_file_matches_hash_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, b"some file content").unwrap();

        assert_eq!(
            hash_file(&path, HashMode::Nix).unwrap(),
            hash_bytes(b"some file content", HashMode::Nix)
        );
    }

    #[test]
    fn test_hash_file_larger_than_read_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &content).unwrap();

        assert_eq!(
            hash_file(&path, HashMode::Nix).unwrap(),
            hash_bytes(&content, HashMode::Nix)
        );
    }

    #[test]
    fn test_hash_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(hash_file(&dir.path().join("absent"), HashMode::Nix).is_err());
    }

    #[test]
    fn test_hash_mode_serde() {
        assert_eq!(serde_json::to_string(&HashMode::Nix).unwrap(), "\"nix\"");
        let parsed: HashMode = serde_json::from_str("\"nix\"").unwrap();
        assert_eq!(parsed, HashMode::Nix);
        assert!(serde_json::from_str::<HashMode>("\"md5\"").is_err());
    }
}
