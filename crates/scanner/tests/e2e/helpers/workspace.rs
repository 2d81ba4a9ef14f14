//! Workspace and vulnerability database fixtures.

use std::fs;
use std::path::Path;

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// A single-module pom depending on a vulnerable log4j-core.
pub const VULNERABLE_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>com.example</groupId>
  <artifactId>demo-app</artifactId>
  <version>1.0.0</version>
  <dependencies>
    <dependency>
      <groupId>org.apache.logging.log4j</groupId>
      <artifactId>log4j-core</artifactId>
      <version>2.14.1</version>
    </dependency>
  </dependencies>
</project>
"#;

/// A minimal package.json.
#[allow(dead_code)]
pub fn package_json(name: &str) -> String {
    format!(r#"{{ "name": "{name}", "version": "1.0.0", "dependencies": {{}} }}"#)
}

/// Write a local vulnerability database with one log4j-core finding and a
/// license entry for it.
pub fn write_vuln_db(dir: &Path) {
    write_file(
        dir,
        "maven.json",
        r#"[
  {
    "id": "CVE-2021-44228",
    "package": "org.apache.logging.log4j:log4j-core",
    "ecosystem": "maven",
    "affected_ranges": [{ "introduced": "2.0.0", "fixed": "2.15.0" }],
    "fixed_versions": ["2.15.0"],
    "severity": "Critical",
    "summary": "Remote code execution via JNDI lookup"
  }
]"#,
    );
    write_file(
        dir,
        "licenses.json",
        r#"{ "gav://org.apache.logging.log4j:log4j-core": ["Apache-2.0"] }"#,
    );
}
