//! Project `.env` reader. Values are only collected here; `load_and_apply` decides
//! which ones reach the process environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn dotenv_path(override_dir: Option<&Path>) -> Option<PathBuf> {
    let dir = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().ok()?,
    };
    let path = dir.join(".env");
    path.is_file().then_some(path)
}

/// Strips one pair of matching quotes. Double quotes understand `\"`; unquoted
/// values end at ` #`.
fn parse_value(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return raw[1..raw.len() - 1].replace("\\\"", "\"");
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return raw[1..raw.len() - 1].to_string();
    }
    match raw.find(" #") {
        Some(i) => raw[..i].trim_end().to_string(),
        None => raw.to_string(),
    }
}

/// `KEY=VALUE` per line; blank lines, `#` comments and lines without `=` are skipped.
/// An optional leading `export ` is accepted.
fn parse_dotenv(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), parse_value(value)))
        })
        .collect()
}

/// Reads `.env` from `override_dir` or the current directory. Missing file → empty map.
pub fn load_env_map(override_dir: Option<&Path>) -> std::io::Result<HashMap<String, String>> {
    match dotenv_path(override_dir) {
        Some(path) => Ok(parse_dotenv(&std::fs::read_to_string(path)?)),
        None => Ok(HashMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get<'a>(m: &'a HashMap<String, String>, k: &str) -> Option<&'a str> {
        m.get(k).map(String::as_str)
    }

    #[test]
    fn parses_plain_pairs_and_skips_noise() {
        let m = parse_dotenv("\n# comment\nOPENAI_API_KEY=sk-1\nNOT_A_PAIR\n=orphan\n  \n");
        assert_eq!(get(&m, "OPENAI_API_KEY"), Some("sk-1"));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn quoted_values() {
        let m = parse_dotenv("A=\"hello world\"\nB='single # kept'\nC=\"say \\\"hi\\\"\"\nD=\"\"\n");
        assert_eq!(get(&m, "A"), Some("hello world"));
        assert_eq!(get(&m, "B"), Some("single # kept"));
        assert_eq!(get(&m, "C"), Some("say \"hi\""));
        assert_eq!(get(&m, "D"), Some(""));
    }

    #[test]
    fn export_prefix_and_inline_comment() {
        let m = parse_dotenv("export RAG_URL=http://localhost:9621 # local server\nEMPTY=\n");
        assert_eq!(get(&m, "RAG_URL"), Some("http://localhost:9621"));
        assert_eq!(get(&m, "EMPTY"), Some(""));
    }

    #[test]
    fn load_env_map_reads_file_or_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_env_map(Some(dir.path())).unwrap().is_empty());
        std::fs::write(dir.path().join(".env"), "A=1\nB=2\n").unwrap();
        let m = load_env_map(Some(dir.path())).unwrap();
        assert_eq!(get(&m, "A"), Some("1"));
        assert_eq!(get(&m, "B"), Some("2"));
    }
}
