//! GitHub contents API wire types.

use serde::Deserialize;

/// Response of `GET /repos/{owner}/{repo}/contents/{file}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentFile {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: String,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentItem {
    pub r#type: String,
    pub name: String,
    pub path: String,
}

/// Render a listing as one `"<path> (<type>)"` line per entry.
pub fn render_listing(items: &[ContentItem]) -> String {
    items
        .iter()
        .map(|item| format!("{} ({})\n", item.path, item.r#type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_listing() {
        let items: Vec<ContentItem> = serde_json::from_str(
            r#"[
                {"type": "file", "name": "README.md", "path": "README.md", "sha": "abc"},
                {"type": "dir", "name": "src", "path": "src"}
            ]"#,
        )
        .unwrap();
        assert_eq!(render_listing(&items), "README.md (file)\nsrc (dir)\n");
    }

    #[test]
    fn test_render_empty_listing() {
        assert_eq!(render_listing(&[]), "");
    }
}
