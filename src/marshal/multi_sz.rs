// Double-NUL-terminated string lists ("item\0item\0\0"), as used by common
// dialog filters, REG_MULTI_SZ values and shell file-operation paths.

use crate::error::{Error, Result};

/// Encode `items` as a double-NUL list.  An empty list is `[0, 0]`.
///
/// Empty items are rejected: their terminator would end the list early.
pub fn encode<I, S>(items: I) -> Result<Vec<u16>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Vec::new();
    for item in items {
        let item = item.as_ref();
        if item.is_empty() {
            return Err(Error::Unsupported("empty string in a double-NUL list"));
        }
        let start = out.len();
        out.extend(item.encode_utf16());
        if let Some(offset) = out[start..].iter().position(|&c| c == 0) {
            return Err(Error::InteriorNul { position: start + offset });
        }
        out.push(0);
    }
    if out.is_empty() {
        out.push(0);
    }
    out.push(0);
    Ok(out)
}

/// Decode a double-NUL list, stopping at the first empty item or the end of
/// the slice.
pub fn decode(buf: &[u16]) -> Vec<String> {
    buf.split(|&c| c == 0)
        .take_while(|item| !item.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn encodes_filter_pairs() {
        let list = encode(["Text Files", "*.txt"]).unwrap();
        assert_eq!(list, units("Text Files\0*.txt\0\0"));
    }

    #[test]
    fn empty_list_is_two_nuls() {
        let list = encode(Vec::<String>::new()).unwrap();
        assert_eq!(list, vec![0, 0]);
        assert!(decode(&list).is_empty());
    }

    #[test]
    fn empty_item_is_rejected() {
        assert!(matches!(encode(["a", "", "b"]), Err(Error::Unsupported(_))));
    }

    #[test]
    fn interior_nul_reports_offset_in_list() {
        let err = encode(["ab", "c\0d"]).unwrap_err();
        assert!(matches!(err, Error::InteriorNul { position: 4 }));
    }

    #[test]
    fn decode_stops_at_double_nul() {
        let buf = units("one\0two\0\0garbage\0");
        assert_eq!(decode(&buf), vec!["one", "two"]);
    }

    #[test]
    fn decode_tolerates_missing_final_terminator() {
        let buf = units("one\0two");
        assert_eq!(decode(&buf), vec!["one", "two"]);
    }
}
