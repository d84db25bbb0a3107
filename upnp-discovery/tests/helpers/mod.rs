//! Test helpers for fixture-based description tests

use std::fs;
use std::path::PathBuf;

/// A device description document stored under `tests/fixtures`
#[derive(Debug, Clone)]
pub struct DeviceFixture {
    pub name: String,
    pub xml_content: String,
}

impl DeviceFixture {
    pub fn load(filename: &str) -> Self {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("tests/fixtures");
        path.push(filename);

        let xml_content = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", filename, e));

        Self {
            name: filename.to_string(),
            xml_content,
        }
    }

    /// Serve the fixture from a mock HTTP server and return its location URL
    pub fn serve(&self, server: &mut mockito::Server, path: &str) -> (mockito::Mock, String) {
        let mock = server
            .mock("GET", path)
            .with_status(200)
            .with_header("content-type", "text/xml; charset=\"utf-8\"")
            .with_body(&self.xml_content)
            .create();
        (mock, format!("{}{}", server.url(), path))
    }
}
