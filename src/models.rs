//! Catalog data structures.

use serde::{Deserialize, Serialize};

/// Installer package that registers MCP servers with a client.
pub const INSTALLER_PACKAGE: &str = "@smithery/cli@latest";

/// Catalog response body: `{"servers": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub servers: Vec<CatalogServer>,
}

/// One server entry from the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogServer {
    #[serde(default)]
    pub qualified_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
}

impl CatalogServer {
    /// Name shown to users; falls back to the qualified name.
    pub fn title(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.qualified_name
        } else {
            &self.display_name
        }
    }

    /// The plain installer invocation, without launcher resolution or client.
    pub fn install_command(&self) -> String {
        format!("npx -y {} install {}", INSTALLER_PACKAGE, self.qualified_name)
    }

    pub fn page_url(&self) -> String {
        format!("https://smithery.ai/server/{}", self.qualified_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_entries_with_missing_fields() {
        let page: CatalogPage = serde_json::from_str(
            r#"{"servers": [
                {"qualifiedName": "@acme/weather", "displayName": "Weather", "description": "Forecasts"},
                {"qualifiedName": "bare"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(page.servers.len(), 2);
        assert_eq!(page.servers[0].display_name, "Weather");
        assert_eq!(page.servers[1].description, "");
        assert_eq!(page.servers[1].title(), "bare");
    }

    #[test]
    fn missing_servers_array_is_empty() {
        let page: CatalogPage = serde_json::from_str(r#"{"total": 0}"#).unwrap();
        assert!(page.servers.is_empty());
    }

    #[test]
    fn install_command_and_page_url() {
        let server = CatalogServer {
            qualified_name: "@acme/weather".to_string(),
            ..CatalogServer::default()
        };
        assert_eq!(
            server.install_command(),
            "npx -y @smithery/cli@latest install @acme/weather"
        );
        assert_eq!(server.page_url(), "https://smithery.ai/server/@acme/weather");
    }
}
