use std::collections::BTreeSet;

/// Applies prefix filtering and delimiter grouping to a set of keys.
///
/// Output is sorted and de-duplicated, with common prefixes interleaved
/// among object keys by their sort order.
pub fn group_keys<I, S>(keys: I, prefix: &str, delimiter: &str, recursive: bool) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut entries = BTreeSet::new();

    for key in keys {
        let key = key.as_ref();
        let Some(suffix) = key.strip_prefix(prefix) else {
            continue;
        };

        if recursive || delimiter.is_empty() {
            entries.insert(key.to_string());
            continue;
        }

        match suffix.find(delimiter) {
            Some(idx) => {
                entries.insert(format!("{}{}", prefix, &suffix[..idx + delimiter.len()]));
            }
            None => {
                entries.insert(key.to_string());
            }
        }
    }

    entries.into_iter().collect()
}
