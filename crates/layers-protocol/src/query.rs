//! Query-string helpers.
//!
//! Values are percent-encoded like a browser's URI component encoder, except
//! that `{`, `}`, `,`, `:`, `@`, `$` and `;` stay literal so engine-side
//! placeholders such as `{westProjected}` survive.

fn is_unreserved(c: u8) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')'
        )
        || matches!(c, b'{' | b'}' | b',' | b':' | b'@' | b'$' | b';')
}

/// Percent-encode one query key or value.
pub fn encode_query_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Serialize key/value pairs as `k1=v1&k2=v2`, in the given order.
pub fn to_key_value<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    params
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                encode_query_component(k.as_ref()),
                encode_query_component(v.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Append an already encoded query string to a URL.
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let sep = match url.find('?') {
        None => "?",
        Some(_) if url.ends_with('?') || url.ends_with('&') => "",
        Some(_) => "&",
    };
    format!("{}{}{}", url, sep, query)
}

/// Remove the given keys from a URL's query string.
pub fn remove_query_keys(url: &str, keys: &[&str], ignore_case: bool) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };

    let matches = |k: &str| {
        keys.iter().any(|key| {
            if ignore_case {
                key.eq_ignore_ascii_case(k)
            } else {
                *key == k
            }
        })
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split_once('=').map(|(k, _)| k).unwrap_or(pair);
            !matches(key)
        })
        .collect();

    if kept.is_empty() {
        format!("{}?", base)
    } else {
        format!("{}?{}", base, kept.join("&"))
    }
}
