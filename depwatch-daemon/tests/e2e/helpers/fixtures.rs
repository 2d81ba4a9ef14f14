//! Workspace and vulnerability database fixtures.

use std::fs;
use std::path::Path;

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("should create parent directory");
    }
    fs::write(path, content).expect("should write fixture file");
}

/// A single-module pom depending on log4j-core 2.14.1.
pub const VULNERABLE_POM: &str = r#"<project>
  <groupId>com.example</groupId>
  <artifactId>billing</artifactId>
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

/// A go.mod with one direct requirement.
#[allow(dead_code)]
pub const GO_MOD: &str = "module github.com/example/gateway\n\ngo 1.22\n\nrequire github.com/example/router v1.4.0\n";

/// A minimal package.json.
#[allow(dead_code)]
pub fn package_json(name: &str) -> String {
    format!(r#"{{ "name": "{name}", "version": "1.0.0", "dependencies": {{}} }}"#)
}

/// Write a database with one Critical log4j-core finding, one Medium Go
/// finding and a license entry.
pub fn write_vuln_db(dir: &Path) {
    write_file(
        dir,
        "maven.json",
        r#"[{
  "id": "CVE-2021-44228",
  "package": "org.apache.logging.log4j:log4j-core",
  "ecosystem": "maven",
  "affected_ranges": [{ "introduced": "2.0.0", "fixed": "2.15.0" }],
  "fixed_versions": ["2.15.0"],
  "severity": "Critical",
  "summary": "Remote code execution via JNDI lookup"
}]"#,
    );
    write_file(
        dir,
        "go.json",
        r#"[{
  "id": "GO-2024-0001",
  "package": "github.com/example/router",
  "ecosystem": "go",
  "affected_ranges": [{ "introduced": "1.0.0", "fixed": "1.5.0" }],
  "fixed_versions": ["1.5.0"],
  "severity": "Medium",
  "summary": "Path traversal in route matching"
}]"#,
    );
    write_file(
        dir,
        "licenses.json",
        r#"{ "gav://org.apache.logging.log4j:log4j-core": ["Apache-2.0"] }"#,
    );
}
