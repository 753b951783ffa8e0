//! Line-level relabeling of Prometheus exposition text.
//!
//! Injects a `target` label into every sample line so federated series
//! stay distinguishable per peer. Comment and blank lines pass through
//! untouched.

/// Rewrite `text`, adding `target="{target}"` to each sample.
pub fn relabel_exposition(text: &str, target: &str) -> String {
    let mut out = String::with_capacity(text.len() + 32);
    for line in text.lines() {
        if line.is_empty() || line.starts_with('#') {
            out.push_str(line);
        } else {
            out.push_str(&inject_label(line, target));
        }
        out.push('\n');
    }
    out
}

/// Insert the label into one sample line, which is either
/// `name{labels...} value` or `name value`.
fn inject_label(line: &str, target: &str) -> String {
    if let Some(open) = line.find('{') {
        let rest = &line[open + 1..];
        if rest.starts_with('}') {
            format!("{}target=\"{}\"{}", &line[..=open], target, rest)
        } else {
            format!("{}target=\"{}\",{}", &line[..=open], target, rest)
        }
    } else if let Some(space) = line.find(char::is_whitespace) {
        format!(
            "{}{{target=\"{}\"}}{}",
            &line[..space],
            target,
            &line[space..]
        )
    } else {
        line.to_string()
    }
}
