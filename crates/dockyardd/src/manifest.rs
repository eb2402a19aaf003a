//! Deployment manifest files.
//!
//! ```toml
//! [[resources]]
//! id = "db"
//! type = "database"
//! provider = "neon"
//! configuration = { region = "eu-central-1" }
//!
//! [[resources]]
//! id = "web"
//! type = "web-service"
//! provider = "vercel"
//! depends_on = ["db"]
//! ```

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use dockyard_orchestrator::DeploymentResource;

#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub resources: Vec<DeploymentResource>,
}

impl Manifest {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing manifest {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MANIFEST: &str = r#"
[[resources]]
id = "db"
type = "database"
provider = "neon"
configuration = { region = "eu-central-1", replicas = 2 }

[[resources]]
id = "web"
type = "web-service"
provider = "vercel"
depends_on = ["db"]
"#;

    #[test]
    fn parses_resources() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.resources.len(), 2);

        let db = &manifest.resources[0];
        assert_eq!(db.resource_type, "database");
        assert!(db.depends_on.is_empty());
        assert_eq!(db.configuration["region"], "eu-central-1");
        assert_eq!(db.configuration["replicas"], 2);

        assert_eq!(manifest.resources[1].depends_on, ["db"]);
    }

    #[test]
    fn empty_manifest_has_no_resources() {
        assert!(Manifest::parse("").unwrap().resources.is_empty());
    }

    #[test]
    fn missing_type_is_an_error() {
        let err = Manifest::parse("[[resources]]\nid = \"x\"\nprovider = \"p\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn from_file_reads_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();
        let manifest = Manifest::from_file(file.path()).unwrap();
        assert_eq!(manifest.resources.len(), 2);
    }
}
