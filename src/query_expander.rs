//! Query Expander (§4.G): extracts error-specific cues from a raw query/log.

use regex::Regex;
use std::sync::OnceLock;

use crate::tokenizer::strip_comments_and_collapse;

const CODE_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "py", "java", "c", "cc", "cpp", "cxx", "h", "hpp", "go", "rb",
    "php", "cs", "scala", "swift", "rs", "kt", "kts", "sh", "bash", "sql",
];

struct ExpanderRegexes {
    error: Regex,
    exception: Regex,
    failed: Regex,
    cannot: Regex,
    undefined: Regex,
    null: Regex,
    stack_frame: Regex,
    filename: Regex,
    call_expr: Regex,
    import_stmt: Regex,
    require_stmt: Regex,
}

fn regexes() -> &'static ExpanderRegexes {
    static RE: OnceLock<ExpanderRegexes> = OnceLock::new();
    RE.get_or_init(|| {
        let ext_alt = CODE_EXTENSIONS.join("|");
        ExpanderRegexes {
            error: Regex::new(r"(?i)error:?\s+([^:]+)").unwrap(),
            exception: Regex::new(r"(?i)exception:?\s+([^:]+)").unwrap(),
            failed: Regex::new(r"(?i)failed:?\s+([^:]+)").unwrap(),
            cannot: Regex::new(r"(?i)cannot\s+([^:]+)").unwrap(),
            undefined: Regex::new(r"(?i)undefined\s+([^:]+)").unwrap(),
            null: Regex::new(r"(?i)null\s+([^:]+)").unwrap(),
            stack_frame: Regex::new(r"at\s+([\w$.]+)\s").unwrap(),
            filename: Regex::new(&format!(r"(?i)[\w./\\-]+\.(?:{ext_alt})\b")).unwrap(),
            call_expr: Regex::new(r"([A-Za-z0-9_]+)\(.*\)").unwrap(),
            import_stmt: Regex::new(r"import\s+([A-Za-z0-9_{}]+)").unwrap(),
            require_stmt: Regex::new(r#"require\(['"](.*)['"]\)"#).unwrap(),
        }
    })
}

fn capture_first_group(re: &Regex, text: &str, out: &mut Vec<String>) {
    if let Some(caps) = re.captures(text) {
        if let Some(m) = caps.get(1) {
            out.push(m.as_str().trim().to_string());
        }
    }
}

fn capture_all_group(re: &Regex, text: &str, group: usize, out: &mut Vec<String>) {
    for caps in re.captures_iter(text) {
        if let Some(m) = caps.get(group) {
            out.push(m.as_str().to_string());
        }
    }
}

/// Filenames (basename only) in `raw_query` matching a recognized extension.
pub fn extract_filenames(raw_query: &str) -> Vec<String> {
    let re = &regexes().filename;
    re.find_iter(raw_query)
        .map(|m| m.as_str().rsplit(['/', '\\']).next().unwrap_or(m.as_str()).to_string())
        .collect()
}

/// Build an enriched query: original text + all extracted cues, then run the
/// index-time code preprocessor (strip comments, collapse whitespace).
pub fn expand_query(raw_query: &str) -> String {
    let re = regexes();
    let mut cues = Vec::new();

    capture_first_group(&re.error, raw_query, &mut cues);
    capture_first_group(&re.exception, raw_query, &mut cues);
    capture_first_group(&re.failed, raw_query, &mut cues);
    capture_first_group(&re.cannot, raw_query, &mut cues);
    capture_first_group(&re.undefined, raw_query, &mut cues);
    capture_first_group(&re.null, raw_query, &mut cues);

    capture_all_group(&re.stack_frame, raw_query, 1, &mut cues);
    cues.extend(extract_filenames(raw_query));
    capture_all_group(&re.call_expr, raw_query, 1, &mut cues);
    capture_all_group(&re.import_stmt, raw_query, 1, &mut cues);
    capture_all_group(&re.require_stmt, raw_query, 1, &mut cues);

    let combined = if cues.is_empty() {
        raw_query.to_string()
    } else {
        format!("{} {}", raw_query, cues.join(" "))
    };

    strip_comments_and_collapse(&combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_error_message_and_stack_frame() {
        let log = "Error: cannot read property 'foo' of undefined\n    at processRequest (router.ts:42:10)";
        let expanded = expand_query(log);
        assert!(expanded.contains("processRequest"), "{expanded}");
        assert!(expanded.contains("router.ts"), "{expanded}");
    }

    #[test]
    fn extracts_require_and_import_identifiers() {
        let log = "require('./database') failed; import {Client} failed";
        let expanded = expand_query(log);
        assert!(expanded.contains("./database"));
        assert!(expanded.contains("Client"));
    }

    #[test]
    fn filenames_are_basename_only() {
        let names = extract_filenames("stack trace at src/routes/router.ts line 1");
        assert_eq!(names, vec!["router.ts"]);
    }

    #[test]
    fn query_with_no_cues_is_unchanged_besides_preprocessing() {
        let q = "why is the cache slow";
        assert_eq!(expand_query(q), strip_comments_and_collapse(q));
    }
}
