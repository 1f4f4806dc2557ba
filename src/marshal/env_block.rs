// Unicode environment blocks for `CreateProcessW` + `CREATE_UNICODE_ENVIRONMENT`:
//   KEY=VALUE\0KEY=VALUE\0\0
// Windows expects the entries sorted by key, case-insensitively.

use crate::error::{Error, Result};

/// The form two keys are compared and sorted in.  Windows folds case over
/// the whole Unicode range for environment names.
pub fn fold_key(key: &str) -> String {
    key.to_uppercase()
}

/// Build an environment block from `(key, value)` pairs.
///
/// A later duplicate of a key (compared by [`fold_key`]) replaces the
/// earlier entry, spelling included.  Keys may start with `=` (the per-drive `=C:` entries) but may not
/// otherwise contain it.
pub fn build<I, K, V>(vars: I) -> Result<Vec<u16>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    // (folded key, key, value)
    let mut entries: Vec<(String, String, String)> = Vec::new();
    for (k, v) in vars {
        let (k, v) = (k.as_ref(), v.as_ref());
        if k.is_empty() || k.chars().skip(1).any(|c| c == '=') {
            return Err(Error::Unsupported("environment key is empty or contains '='"));
        }
        let folded = fold_key(k);
        match entries.iter_mut().find(|(fk, _, _)| *fk == folded) {
            Some(slot) => {
                slot.1 = k.to_owned();
                slot.2 = v.to_owned();
            }
            None => entries.push((folded, k.to_owned(), v.to_owned())),
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut block = Vec::new();
    for (_, k, v) in &entries {
        let start = block.len();
        block.extend(k.encode_utf16());
        block.push(u16::from(b'='));
        block.extend(v.encode_utf16());
        if let Some(offset) = block[start..].iter().position(|&c| c == 0) {
            return Err(Error::InteriorNul { position: start + offset });
        }
        block.push(0);
    }
    if block.is_empty() {
        block.push(0);
    }
    block.push(0);
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::multi_sz;

    #[test]
    fn entries_are_sorted_case_insensitively() {
        let block = build([("path", "C:\\bin"), ("ComSpec", "cmd.exe"), ("A", "1")]).unwrap();
        assert_eq!(
            multi_sz::decode(&block),
            vec!["A=1", "ComSpec=cmd.exe", "path=C:\\bin"]
        );
    }

    #[test]
    fn empty_block_is_two_nuls() {
        let block = build(Vec::<(&str, &str)>::new()).unwrap();
        assert_eq!(block, vec![0, 0]);
    }

    #[test]
    fn duplicate_keys_keep_last_value() {
        let block = build([("Path", "a"), ("PATH", "b")]).unwrap();
        assert_eq!(multi_sz::decode(&block), vec!["PATH=b"]);
    }

    #[test]
    fn non_ascii_keys_fold_case_too() {
        let block = build([("ÄPFEL", "1"), ("äpfel", "2")]).unwrap();
        assert_eq!(multi_sz::decode(&block), vec!["äpfel=2"]);
    }

    #[test]
    fn non_ascii_keys_sort_by_folded_form() {
        let block = build([("ñu", "1"), ("NA", "2"), ("Nz", "3")]).unwrap();
        assert_eq!(multi_sz::decode(&block), vec!["NA=2", "Nz=3", "ñu=1"]);
    }

    #[test]
    fn drive_entries_keep_leading_equals() {
        let block = build([("=C:", "C:\\work")]).unwrap();
        assert_eq!(multi_sz::decode(&block), vec!["=C:=C:\\work"]);
    }

    #[test]
    fn bad_keys_are_rejected() {
        assert!(build([("", "x")]).is_err());
        assert!(build([("A=B", "x")]).is_err());
    }

    #[test]
    fn nul_in_value_is_rejected() {
        assert!(matches!(build([("K", "a\0b")]), Err(Error::InteriorNul { position: 3 })));
    }
}
