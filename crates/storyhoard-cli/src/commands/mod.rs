//! Command handlers

pub mod chapter;
pub mod choice;
pub mod config;
pub mod remote;
pub mod status;
pub mod story;

use anyhow::{bail, Result};
use uuid::Uuid;

/// Resolve a full UUID or an unambiguous prefix against known ids
///
/// `candidates` pairs each id with a label shown when the prefix is ambiguous.
pub(crate) fn resolve_id<'a, I>(input: &str, what: &str, candidates: I) -> Result<Uuid>
where
    I: IntoIterator<Item = (Uuid, &'a str)>,
{
    // Try full UUID first
    if let Ok(uuid) = Uuid::parse_str(input) {
        return Ok(uuid);
    }

    let matches: Vec<(Uuid, &str)> = candidates
        .into_iter()
        .filter(|(id, _)| id.to_string().starts_with(input))
        .collect();

    match matches.as_slice() {
        [] => bail!("No {} found matching: {}", what, input),
        [(id, _)] => Ok(*id),
        _ => {
            eprintln!("Multiple {}s match '{}':", what, input);
            for (id, label) in &matches {
                eprintln!("  {} - {}", id, label);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_full_uuid_skips_lookup() {
        let id = Uuid::new_v4();
        let resolved = resolve_id(&id.to_string(), "story", Vec::<(Uuid, &str)>::new()).unwrap();
        assert_eq!(resolved, id);
    }

    #[test]
    fn test_resolve_unique_prefix() {
        let a = Uuid::parse_str("aaaaaaaa-0000-0000-0000-000000000000").unwrap();
        let b = Uuid::parse_str("bbbbbbbb-0000-0000-0000-000000000000").unwrap();
        let resolved = resolve_id("aaa", "story", vec![(a, "one"), (b, "two")]).unwrap();
        assert_eq!(resolved, a);
    }

    #[test]
    fn test_resolve_rejects_missing_and_ambiguous() {
        let a = Uuid::parse_str("abcdef00-0000-0000-0000-000000000000").unwrap();
        let b = Uuid::parse_str("abcdef11-0000-0000-0000-000000000000").unwrap();

        let missing = resolve_id("ff", "chapter", vec![(a, "one")]).unwrap_err();
        assert!(missing.to_string().contains("No chapter found"));

        let ambiguous = resolve_id("abcdef", "chapter", vec![(a, "one"), (b, "two")]).unwrap_err();
        assert!(ambiguous.to_string().contains("Ambiguous"));
    }
}
