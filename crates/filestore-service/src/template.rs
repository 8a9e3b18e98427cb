use filestore_core::MARKER_FILE_NAME;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::batch::{BatchResult, FileOperation};
use crate::service::StoreService;

/// Directories and files to scaffold under a base path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectStructure {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub directories: Vec<String>,
    /// Project kind, used in generated README and package.json content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

fn collapse_slashes(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Starter content for `file_path`, chosen by extension.
pub fn template_content(file_path: &str, template: Option<&str>) -> String {
    let file_name = file_path.rsplit('/').next().unwrap_or_default();
    let stem = file_name
        .rfind('.')
        .map_or(file_name, |dot| &file_name[..dot]);
    let extension = file_path
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let kind = template.unwrap_or("project");

    match extension.as_str() {
        "ts" | "tsx" => format!(
            "// {file_name}\n\nexport default function {stem}() {{\n  // Implementation here\n}}\n"
        ),
        "js" | "jsx" => format!(
            "// {file_name}\n\nfunction {stem}() {{\n  // Implementation here\n}}\n\nmodule.exports = {stem};\n"
        ),
        "md" => format!(
            "# {stem}\n\nDescription of this {kind}.\n\n## Getting Started\n\nInstructions here.\n"
        ),
        "json" if file_name.eq_ignore_ascii_case("package.json") => format!(
            "{{\n  \"name\": \"{kind}\",\n  \"version\": \"1.0.0\",\n  \"description\": \"\",\n  \"main\": \"index.js\",\n  \"scripts\": {{\n    \"start\": \"node index.js\"\n  }}\n}}\n"
        ),
        "json" => "{\n  \n}\n".to_string(),
        "css" => format!(
            "/* {file_name} */\n\nbody {{\n  margin: 0;\n  padding: 0;\n  font-family: Arial, sans-serif;\n}}\n"
        ),
        "html" => format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n  <meta charset=\"UTF-8\">\n  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n  <title>{stem}</title>\n</head>\n<body>\n  <h1>Hello, World!</h1>\n</body>\n</html>\n"
        ),
        _ => format!("# {file_name}\n\n"),
    }
}

impl StoreService {
    /// Scaffold `structure` under `base` as one batch: a marker per
    /// directory, then a templated file per file.
    #[instrument(skip(self, structure), level = "debug")]
    pub async fn create_project_structure(
        &self,
        base: &str,
        structure: &ProjectStructure,
    ) -> BatchResult {
        let template = structure.template.as_deref();

        let directories = structure.directories.iter().map(|dir| {
            let path = collapse_slashes(&format!("{}/{}/{}", base, dir, MARKER_FILE_NAME));
            FileOperation::create(path, "").with_message(format!("Create directory {}", dir))
        });
        let files = structure.files.iter().map(|file| {
            let path = collapse_slashes(&format!("{}/{}", base, file));
            FileOperation::create(path, template_content(file, template))
                .with_message(format!("Create {}", file))
        });

        self.batch_operations(directories.chain(files).collect())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_by_extension() {
        assert_eq!(
            template_content("src/index.ts", None),
            "// index.ts\n\nexport default function index() {\n  // Implementation here\n}\n"
        );
        assert!(template_content("app.js", None).ends_with("module.exports = app;\n"));
        assert_eq!(
            template_content("README.md", Some("library")),
            "# README\n\nDescription of this library.\n\n## Getting Started\n\nInstructions here.\n"
        );
        assert!(template_content("package.json", Some("demo")).contains("\"name\": \"demo\""));
        assert_eq!(template_content("tsconfig.json", None), "{\n  \n}\n");
        assert!(template_content("site.css", None).starts_with("/* site.css */"));
        assert!(template_content("index.HTML", None).contains("<title>index</title>"));
        assert_eq!(template_content("Makefile", None), "# Makefile\n\n");
    }

    #[test]
    fn slashes_collapse() {
        assert_eq!(collapse_slashes("proj//src/"), "proj/src");
        assert_eq!(collapse_slashes("/a///b"), "a/b");
    }
}
