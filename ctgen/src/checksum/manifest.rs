//! Locating a file's digest inside a vendor checksum manifest.
//!
//! Vendors publish digests in several layouts. Each layout is tried in a
//! fixed order over the whole manifest and the first hit wins:
//!
//! ```text
//! 1. line pair        <digest>  [*]<filename>
//! 2. block header     ## <filename>
//!                     SHA256: <digest>
//! 3. parenthesized    SHA256 (<filename>) = <digest>
//! 4. single token     <digest>            (manifest covers one file)
//! ```
//!
//! The algorithm is never read from the manifest; it is inferred from the
//! digest length afterwards.

use super::{ChecksumAlgorithm, ChecksumRecord};
use crate::errors::{CtgenError, CtgenResult};

/// Find the expected digest for `filename` and infer its algorithm.
pub fn parse_manifest(body: &str, filename: &str) -> CtgenResult<ChecksumRecord> {
    let lines: Vec<&str> = body.lines().collect();

    let digest = find_line_pair(&lines, filename)
        .or_else(|| find_block_header(&lines, filename))
        .or_else(|| find_parenthesized(&lines, filename))
        .or_else(|| find_single_token(body))
        .ok_or_else(|| {
            CtgenError::Checksum(format!("for {} not found in checksum file", filename))
        })?;

    let algorithm = ChecksumAlgorithm::from_digest_len(digest.len())?;

    Ok(ChecksumRecord {
        digest: digest.to_string(),
        algorithm,
    })
}

fn find_line_pair<'a>(lines: &[&'a str], filename: &str) -> Option<&'a str> {
    lines.iter().find_map(|line| {
        let mut fields = line.split_whitespace();
        let digest = fields.next()?;
        let name = fields.next()?;
        // Keeps "## <filename>" block headers out of this layout
        if !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        // '*' marks binary mode in coreutils output
        let name = name.strip_prefix('*').unwrap_or(name);
        (name == filename).then_some(digest)
    })
}

fn find_block_header<'a>(lines: &[&'a str], filename: &str) -> Option<&'a str> {
    lines.windows(2).find_map(|pair| {
        let name = pair[0].strip_prefix("## ")?;
        if name != filename {
            return None;
        }
        let digest = pair[1].strip_prefix("SHA256: ")?.trim();
        (!digest.is_empty()).then_some(digest)
    })
}

fn find_parenthesized<'a>(lines: &[&'a str], filename: &str) -> Option<&'a str> {
    let needle = format!("({})", filename);
    lines.iter().find_map(|line| {
        if !line.contains(&needle) {
            return None;
        }
        let parts: Vec<&str> = line.split("= ").collect();
        if parts.len() != 2 {
            return None;
        }
        let digest = parts[1].trim();
        (!digest.is_empty()).then_some(digest)
    })
}

fn find_single_token(body: &str) -> Option<&str> {
    let mut tokens = body.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}
