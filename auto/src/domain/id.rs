//! Stable content-derived identifiers
//!
//! Task ids are fingerprints of (description, target file, objective id) so
//! replanning the same work yields the same id instead of a duplicate task.
//! The fingerprint is deterministic across runs and platforms.

use sha2::{Digest, Sha256};

/// Field separator inside the hash input; prevents ("ab","c") and ("a","bc")
/// from colliding.
const SEP: &[u8] = &[0x1f];

fn hex_prefix(digest: &[u8], len: usize) -> String {
    let mut out = String::with_capacity(len);
    for byte in digest {
        if out.len() >= len {
            break;
        }
        out.push_str(&format!("{:02x}", byte));
    }
    out.truncate(len);
    out
}

/// Fingerprint a task from its identity fields
pub fn task_fingerprint(description: &str, target_file: Option<&str>, objective_id: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(description.trim().as_bytes());
    hasher.update(SEP);
    hasher.update(target_file.unwrap_or("").as_bytes());
    hasher.update(SEP);
    hasher.update(objective_id.unwrap_or("").as_bytes());
    format!("task-{}", hex_prefix(&hasher.finalize(), 12))
}

/// Fingerprint an objective from its title and level
pub fn objective_fingerprint(title: &str, level: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.trim().as_bytes());
    hasher.update(SEP);
    hasher.update(level.as_bytes());
    format!("obj-{}", hex_prefix(&hasher.finalize(), 12))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_fingerprint_deterministic() {
        let a = task_fingerprint("implement parser", Some("src/parser.py"), Some("obj-1"));
        let b = task_fingerprint("implement parser", Some("src/parser.py"), Some("obj-1"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_task_fingerprint_distinguishes_fields() {
        let a = task_fingerprint("implement parser", Some("src/parser.py"), None);
        let b = task_fingerprint("implement parser", Some("src/lexer.py"), None);
        let c = task_fingerprint("implement lexer", Some("src/parser.py"), None);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_task_fingerprint_no_field_bleed() {
        // Separator keeps adjacent fields from merging
        let a = task_fingerprint("ab", Some("c"), None);
        let b = task_fingerprint("a", Some("bc"), None);
        assert_ne!(a, b);
    }

    #[test]
    fn test_task_fingerprint_trims_description() {
        let a = task_fingerprint("  implement parser  ", None, None);
        let b = task_fingerprint("implement parser", None, None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_shape() {
        let id = task_fingerprint("x", None, None);
        assert!(id.starts_with("task-"));
        assert_eq!(id.len(), "task-".len() + 12);

        let id = objective_fingerprint("build the thing", "primary");
        assert!(id.starts_with("obj-"));
    }
}
